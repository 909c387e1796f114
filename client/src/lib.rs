//! Esquads Konsolen-Client – Bibliothek
//!
//! Konfiguration und Event-Anzeige; `main.rs` verdrahtet beides mit der
//! Realtime-Bruecke.

pub mod anzeige;
pub mod config;

pub use anzeige::SprechAnzeige;
pub use config::ClientConfig;
