//! Load generator for the shakesapp search service.
//!
//! This crate provides tools to:
//! - Generate `?q=<term>` requests from a fixed vocabulary
//! - Run a fixed pool of virtual users for a bounded duration
//! - Count how often each term was requested
//! - Output results in multiple formats (console, JSON, CSV)

pub mod config;
pub mod counter;
pub mod error;
pub mod generator;
pub mod metrics;
pub mod report;
pub mod runner;
pub mod transport;
pub mod user;

pub use config::TestConfig;
pub use counter::UsageCounter;
pub use error::{ConfigError, RequestFailure};
pub use generator::{generate, RequestDescriptor, RequestGenerator};
pub use metrics::{AggregateReport, MetricsCollector};
pub use report::ResultsReport;
pub use runner::LoadRunner;
pub use transport::{HttpTransport, Response, Transport, TransportFactory};
pub use user::VirtualUser;
