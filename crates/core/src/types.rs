//! Gemeinsame Identifikationstypen
//!
//! Newtype-Pattern, damit Stimmen- und Session-Bezeichner zur Compilezeit
//! nicht verwechselt werden koennen.

use serde::{Deserialize, Serialize};

/// Vom Realtime-Provider vergebene Session-ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderSessionId(pub String);

impl ProviderSessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Gibt die innere ID zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProviderSessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

/// Stimme, mit der der Provider antworten soll (z.B. "alloy")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoiceId(pub String);

impl VoiceId {
    pub fn new(voice: impl Into<String>) -> Self {
        Self(voice.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VoiceId {
    fn default() -> Self {
        Self("alloy".into())
    }
}

impl std::fmt::Display for VoiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_anzeige() {
        let id = ProviderSessionId::new("sess_123");
        assert_eq!(id.to_string(), "session:sess_123");
        assert_eq!(id.as_str(), "sess_123");
    }

    #[test]
    fn voice_default() {
        assert_eq!(VoiceId::default().as_str(), "alloy");
    }

    #[test]
    fn voice_serde_transparent() {
        let json = serde_json::to_string(&VoiceId::new("verse")).unwrap();
        assert_eq!(json, "\"verse\"");
    }
}
