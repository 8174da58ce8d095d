mod aggregator;
mod engine;
mod key_mapping;
mod pipeline;
mod version_resolver;
mod worker_pool;

pub use engine::{BatchRequest, Registrar};
