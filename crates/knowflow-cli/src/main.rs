use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use knowflow_cli::cli::{Cli, Commands};
use knowflow_cli::commands::{self, ask::AskArgs};
use knowflow_cli::{logging, App};
use knowflow_config::ConfigLoader;
use knowflow_core::KnowflowError;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = ConfigLoader::load(cli.config.as_deref()).await?;
    logging::init(cli.log_level, cli.verbose, &config.logging);
    debug!(config = ?cli.config, "Loaded configuration");

    let app = App::from_config(config)?;
    let format = cli.format;

    // Ctrl-C aborts in-flight model and store calls
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    match cli.command {
        Commands::Ingest {
            path,
            owner,
            content_type,
            force,
        } => commands::ingest::execute(&app, format, path, owner, content_type, force).await,
        Commands::Ask {
            query,
            owner,
            session,
            documents,
            no_decompose,
            no_evaluate,
        } => {
            let args = AskArgs {
                query,
                owner,
                session,
                documents,
                no_decompose,
                no_evaluate,
            };
            commands::ask::execute(&app, format, args, cancel).await
        }
        Commands::FollowUp {
            message,
            owner,
            session,
            nodes,
            window,
        } => {
            commands::follow_up::execute(&app, format, message, owner, session, nodes, window, cancel)
                .await
        }
        Commands::Session(cmd) => commands::session::execute(&app, format, cmd).await,
    }
}

/// Pipeline errors print their user-facing payload; anything else prints its chain
fn report(err: &anyhow::Error) {
    match err.downcast_ref::<KnowflowError>() {
        Some(knowflow) => match serde_json::to_string_pretty(&knowflow.payload()) {
            Ok(payload) => eprintln!("{payload}"),
            Err(_) => eprintln!("Error: {knowflow}"),
        },
        None => eprintln!("Error: {err:#}"),
    }
}
