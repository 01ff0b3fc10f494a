use clap::{Parser, Subcommand, ValueEnum};
use knowflow_core::{SessionId, UserId};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

/// Log level options for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    Off,
    /// Error messages only
    Error,
    /// Warnings and errors
    Warn,
    /// Informational messages
    Info,
    /// Debug messages
    Debug,
    /// Trace-level messages (most verbose)
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable tables
    #[default]
    Table,
    /// JSON for programmatic consumption
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "knowflow")]
#[command(about = "knowflow - hybrid vector and knowledge-graph question answering over your documents")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Set log level (off, error, warn, info, debug, trace)
    /// If not specified, uses RUST_LOG or the config file value
    #[arg(short = 'l', long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Enable verbose logging (shortcut for --log-level=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (defaults to ~/.config/knowflow/config.toml)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'f', long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Upload a text or markdown file and index it
    Ingest {
        /// File to ingest
        path: PathBuf,

        /// Owning user id
        #[arg(short, long)]
        owner: UserId,

        /// MIME type (guessed from the extension when omitted)
        #[arg(long)]
        content_type: Option<String>,

        /// Re-index even if the document is already indexed
        #[arg(long)]
        force: bool,
    },

    /// Ask a question over your documents
    Ask {
        query: String,

        #[arg(short, long)]
        owner: UserId,

        /// Record the exchange in this chat session
        #[arg(short, long)]
        session: Option<SessionId>,

        /// Restrict retrieval to these documents (can be repeated)
        #[arg(long = "doc", value_name = "DOC_ID")]
        documents: Vec<String>,

        /// Answer the query as a single question
        #[arg(long)]
        no_decompose: bool,

        /// Skip retrieval quality evaluation and refinement
        #[arg(long)]
        no_evaluate: bool,
    },

    /// Continue a chat session from the knowledge graph
    #[command(name = "follow-up")]
    FollowUp {
        message: String,

        #[arg(short, long)]
        owner: UserId,

        #[arg(short, long)]
        session: SessionId,

        /// Anchor node ids (defaults to the session's recent nodes)
        #[arg(long = "node", value_name = "NODE_ID")]
        nodes: Vec<String>,

        /// Traversal depth in hops
        #[arg(short, long)]
        window: Option<usize>,
    },

    /// Manage chat sessions
    #[command(subcommand)]
    Session(SessionCommands),
}

#[derive(Debug, Subcommand)]
pub enum SessionCommands {
    /// Create a new session
    Create {
        #[arg(short, long)]
        owner: UserId,

        /// Title (defaults to the creation time)
        #[arg(short, long)]
        title: Option<String>,
    },

    /// List sessions, most recently active first
    List {
        #[arg(short, long)]
        owner: UserId,
    },

    /// Rename a session
    Rename {
        id: SessionId,

        title: String,

        #[arg(short, long)]
        owner: UserId,
    },

    /// Delete a session and its messages
    Delete {
        id: SessionId,

        #[arg(short, long)]
        owner: UserId,
    },

    /// Show the messages of a session
    Messages {
        id: SessionId,

        #[arg(short, long)]
        owner: UserId,
    },
}
