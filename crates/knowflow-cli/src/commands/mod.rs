pub mod ask;
pub mod follow_up;
pub mod ingest;
pub mod session;
