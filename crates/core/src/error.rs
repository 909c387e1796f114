//! Fehlertypen fuer Esquads
//!
//! Zentraler Fehler-Enum fuer Protokoll- und Konfigurationsfehler.
//! Untermodule (Audio, Realtime) definieren eigene Fehler und konvertieren
//! via `#[from]`.

use thiserror::Error;

/// Globaler Result-Alias fuer Esquads
pub type Result<T> = std::result::Result<T, EsquadsError>;

/// Fehler im gemeinsamen Protokoll- und Konfigurations-Layer
#[derive(Debug, Error)]
pub enum EsquadsError {
    // --- Protokoll ---
    #[error("Ungueltige Nachricht: {0}")]
    UngueltigeNachricht(String),

    #[error("Serialisierung fehlgeschlagen: {0}")]
    Serialisierung(#[from] serde_json::Error),

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),
}

impl EsquadsError {
    /// Erstellt einen Konfigurationsfehler aus einer beliebigen Nachricht
    pub fn konfiguration(msg: impl Into<String>) -> Self {
        Self::Konfiguration(msg.into())
    }
}
