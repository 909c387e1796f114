//! Konsolen-Anzeige fuer Provider-Events
//!
//! Leitet aus dem Event-Strom den Sprech-Zustand des Assistenten ab und
//! meldet nur Aenderungen.

use esquads_core::{RealtimeEvent, SpeakingChange};

/// Verfolgt, ob der Assistent gerade spricht
#[derive(Debug, Default)]
pub struct SprechAnzeige {
    spricht: bool,
}

impl SprechAnzeige {
    pub fn spricht(&self) -> bool {
        self.spricht
    }

    /// Verarbeitet ein Event; liefert eine Zeile fuer die Konsole, wenn es
    /// etwas zu melden gibt
    pub fn verarbeiten(&mut self, event: &RealtimeEvent) -> Option<String> {
        if event.is_error() {
            let meldung = event
                .payload()
                .pointer("/error/message")
                .and_then(|m| m.as_str())
                .unwrap_or("unbekannter Fehler");
            return Some(format!("[Fehler] {meldung}"));
        }

        match event.speaking_change()? {
            SpeakingChange::Started if !self.spricht => {
                self.spricht = true;
                Some("[Assistent spricht]".into())
            }
            SpeakingChange::Stopped if self.spricht => {
                self.spricht = false;
                Some("[Assistent fertig]".into())
            }
            _ => None,
        }
    }
}
