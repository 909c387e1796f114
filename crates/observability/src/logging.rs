//! Structured Logging via tracing-subscriber
//!
//! Umgebungsvariablen haben Vorrang vor der Konfigurationsdatei:
//! - `ESQ_LOG_LEVEL`: Filter-Direktive (z.B. `info`, `esquads_realtime=debug`)
//! - `ESQ_LOG_FORMAT`: `text` oder `json`
//!
//! Logs gehen nach stderr, damit stdout dem Dialog gehoert.

use std::fmt;
use std::str::FromStr;

use tracing_subscriber::{fmt as fmt_layer, EnvFilter};

pub const ENV_LEVEL: &str = "ESQ_LOG_LEVEL";
pub const ENV_FORMAT: &str = "ESQ_LOG_FORMAT";

/// Ausgabeformat der Logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            andere => Err(format!("Unbekanntes Log-Format: {andere}")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// Validiert einen einfachen Log-Level
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Bestimmt Filter und Format aus Konfiguration und Umgebung.
///
/// Ungueltige Werte fallen auf `info` bzw. `text` zurueck.
pub fn aufloesen(
    level: &str,
    format: &str,
    env_level: Option<String>,
    env_format: Option<String>,
) -> (String, LogFormat) {
    let level = env_level
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| level.to_owned());
    let level = if EnvFilter::try_new(&level).is_ok() {
        level
    } else {
        "info".to_owned()
    };

    let format = env_format
        .as_deref()
        .unwrap_or(format)
        .parse()
        .unwrap_or_default();

    (level, format)
}

/// Initialisiert das Logging einmalig.
///
/// Ein zweiter Aufruf aendert nichts.
pub fn logging_initialisieren(level: &str, format: &str) {
    let (level, format) = aufloesen(
        level,
        format,
        std::env::var(ENV_LEVEL).ok(),
        std::env::var(ENV_FORMAT).ok(),
    );
    let filter = EnvFilter::new(&level);

    let ergebnis = match format {
        LogFormat::Json => fmt_layer()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => fmt_layer()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .try_init(),
    };

    if ergebnis.is_ok() {
        tracing::debug!(level = %level, format = %format, "Logging initialisiert");
    }
}
