//! Concurrent collection pipeline: fetch, aggregate, acknowledge
//!
//! Three cooperating roles share two unbounded work queues and a single
//! wall-clock deadline. Data flows one way only:
//!
//!   fetcher -> { ingest buffer, ack buffer } -> { aggregator, acknowledger }
//!
//! Fetchers and acknowledgers can run with multiple instances; the
//! aggregator is always a single instance so the accumulator table has
//! exactly one owner.

pub mod acknowledger;
pub mod aggregator;
pub mod deadline;
pub mod fetcher;
pub mod types;
