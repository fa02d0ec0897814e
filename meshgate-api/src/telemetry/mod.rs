//! MESHGATE Telemetry
//!
//! Structured logging for the API layer. Request spans come from
//! `tower_http::trace::TraceLayer` in the router; pipeline stages emit
//! their own events.

pub mod tracer;

pub use tracer::{init_tracing, TelemetryConfig, DEFAULT_FILTER};
