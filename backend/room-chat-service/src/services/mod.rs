pub mod encryption;
pub mod memory_store;
pub mod message_pipeline;
pub mod pg_store;
pub mod store;
