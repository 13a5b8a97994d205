/// Observability module for tracing setup
pub mod tracing_setup;
