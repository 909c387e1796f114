//! # esquads-observability
//!
//! Structured Logging fuer die Esquads-Binaries (Text oder JSON via
//! tracing-subscriber).

pub mod logging;

pub use logging::{logging_initialisieren, LogFormat};
