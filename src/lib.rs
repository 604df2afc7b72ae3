pub mod config;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod runner;
pub mod source;
pub mod sqs;
