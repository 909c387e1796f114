//! Fehlertypen fuer Capture, Playback und Kodierung

use thiserror::Error;

/// Alle moeglichen Fehler des Audio-Crates
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Audio-Geraet nicht gefunden: {0}")]
    GeraetNichtGefunden(String),

    #[error("Kein Standard-Eingabegeraet verfuegbar")]
    KeinStandardEingabegeraet,

    #[error("Kein Standard-Ausgabegeraet verfuegbar")]
    KeinStandardAusgabegeraet,

    #[error("Stream-Fehler: {0}")]
    StreamFehler(String),

    #[error("Codec-Fehler: {0}")]
    CodecFehler(String),

    #[error("Kodierungsfehler: {0}")]
    Kodierung(String),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error("Aufnahme laeuft bereits")]
    BereitsAktiv,

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

impl AudioError {
    /// Geraete- oder Berechtigungsfehler beim Oeffnen des Mikrofons
    pub fn ist_geraetefehler(&self) -> bool {
        matches!(
            self,
            Self::GeraetNichtGefunden(_) | Self::KeinStandardEingabegeraet | Self::StreamFehler(_)
        )
    }
}

pub type AudioResult<T> = Result<T, AudioError>;
