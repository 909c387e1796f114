//! Fehlertypen der Realtime-Bruecke

use esquads_audio::AudioError;
use esquads_core::EsquadsError;
use thiserror::Error;

/// Alle Fehler, die `RealtimeChat` an den Aufrufer meldet
#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("Session konnte nicht erstellt werden: {0}")]
    Broker(String),

    #[error("Session-Antwort enthaelt keinen Ephemeral Key (client_secret.value fehlt)")]
    FehlenderEphemeralKey,

    #[error("SDP-Handshake fehlgeschlagen (HTTP {status}): {body}")]
    Handshake { status: u16, body: String },

    #[error("Peer-Verbindung: {0}")]
    Peer(String),

    #[error("Audio: {0}")]
    Audio(#[from] AudioError),

    #[error("Data-Channel ist nicht offen")]
    KanalNichtOffen,

    #[error("Ungueltiger Zustand: erwartet {erwartet}, aktuell {aktuell}")]
    UngueltigerZustand {
        erwartet: &'static str,
        aktuell: &'static str,
    },

    #[error("Zeitlimit ueberschritten: {0}")]
    Zeitlimit(&'static str),

    #[error("Protokoll: {0}")]
    Protokoll(#[from] EsquadsError),

    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Konfiguration: {0}")]
    Konfiguration(String),
}

impl RealtimeError {
    pub fn peer(e: impl std::fmt::Display) -> Self {
        Self::Peer(e.to_string())
    }

    pub fn broker(e: impl std::fmt::Display) -> Self {
        Self::Broker(e.to_string())
    }
}

impl From<webrtc::Error> for RealtimeError {
    fn from(e: webrtc::Error) -> Self {
        Self::Peer(e.to_string())
    }
}

pub type RealtimeResult<T> = Result<T, RealtimeError>;
