//! # Utility Modules
//!
//! Supporting utilities shared by the link and command layers.
//!
//! ## Components
//! - **Logging**: `tracing` subscriber setup from configuration
//! - **Metrics**: link and command counters
//! - **Timeout**: default bounds and a deadline helper for blocking calls

pub mod logging;
pub mod metrics;
pub mod timeout;

pub use metrics::{LinkMetrics, MetricsSnapshot};
