//! Default values shared by the component accessors

pub const DEFAULT_CHAT_MODEL: &str = "llama3.2";
pub const DEFAULT_OPENAI_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_CHAT_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 16;

pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_MAX_REFINEMENT_ROUNDS: usize = 2;
/// Hard ceiling: at most three retrieval rounds per sub-question
pub const MAX_REFINEMENT_ROUNDS: usize = 2;
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_CONTEXT_WINDOW: usize = 2;
/// Hard ceiling on follow-up traversal hops
pub const MAX_CONTEXT_WINDOW: usize = 5;

pub const DEFAULT_NEO4J_URI: &str = "http://localhost:7474";
pub const DEFAULT_NEO4J_USER: &str = "neo4j";
pub const DEFAULT_NEO4J_DATABASE: &str = "neo4j";
pub const DEFAULT_MAX_TRAVERSAL_NODES: usize = 1000;
pub const DEFAULT_ALLOWED_QUERY_KEYWORDS: [&str; 8] = [
    "MATCH", "OPTIONAL", "WITH", "UNWIND", "CALL", "RETURN", "CREATE", "MERGE",
];

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

pub const DEFAULT_LOG_LEVEL: &str = "info";
