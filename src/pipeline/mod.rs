pub mod classify;
pub mod ingest;
pub mod locks;
pub mod queue;
pub mod removal;
pub mod structuring;
