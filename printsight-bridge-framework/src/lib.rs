//! PrintSight Bridge Framework
//!
//! Common abstractions for building bridges that publish device telemetry to an MQTT broker.
//!
//! # Overview
//!
//! This framework provides:
//! - [`BridgeConfig`] trait for configuration loading and validation
//! - [`BridgeRunner`] for managing bridge lifecycle (broker connection, last will,
//!   inbound subscriptions, signal handling, cooperative shutdown)
//! - [`Publisher`], the rate-limited publish gateway with per-topic coalescing
//! - [`BrokerSink`] seam between the gateway and the broker client
//! - [`BridgeArgs`] for common CLI argument parsing
//! - [`StatusPublisher`] for availability reporting
//!
//! # Example
//!
//! ```ignore
//! use printsight_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = BridgeArgs::parse();
//!     let config = MyBridgeConfig::load_or_default(&args, "mybridge.json5")?;
//!
//!     let mut runner = BridgeRunner::new_with_args("mybridge", config, Some(&args)).await?;
//!
//!     // Spawn protocol-specific workers
//!     let publisher = runner.publisher();
//!     let shutdown = runner.shutdown_token();
//!     runner.spawn(my_worker(publisher, shutdown));
//!
//!     // Run until Ctrl+C
//!     runner.run().await?;
//!     Ok(())
//! }
//! ```

mod args;
mod config;
mod error;
mod publisher;
mod runner;
mod sink;
mod status;

pub use args::BridgeArgs;
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use publisher::{PublishOutcome, PublishStats, Publisher, ThrottleTable};
pub use runner::{BridgeRunner, InboundMessage, connect};
pub use sink::{BrokerSink, MemorySink, MqttSink};
pub use status::{Availability, StatusPublisher};

// Re-export commonly used types from printsight-common
pub use printsight_common::{LoggingConfig, MqttConfig, OutboundMessage, TopicBuilder};
