pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod ingest;
pub mod matcher;
pub mod normalize;
pub mod parser;
pub mod sources;
pub mod store;
