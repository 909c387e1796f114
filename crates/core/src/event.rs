//! JSON-Event-Schema des Realtime-Data-Channels
//!
//! Ausgehende Events (`ClientEvent`) sind fest typisiert. Eingehende Events
//! kommen vom Provider und werden nur minimal interpretiert: jedes Event ist
//! ein JSON-Objekt mit einem `type`-Feld, der Rest bleibt als
//! `serde_json::Value` erhalten.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EsquadsError, Result};

/// Event-Typ fuer einen Audio-Chunk der Antwort
pub const AUDIO_DELTA: &str = "response.audio.delta";
/// Event-Typ fuer das Ende der Audio-Antwort
pub const AUDIO_DONE: &str = "response.audio.done";

// ---------------------------------------------------------------------------
// Ausgehende Events
// ---------------------------------------------------------------------------

/// Events, die die Bridge an den Provider sendet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Haengt base64-kodiertes PCM16 an den Eingabe-Audiopuffer an
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },

    /// Legt ein neues Konversations-Element an
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },

    /// Fordert eine Antwort des Providers an
    #[serde(rename = "response.create")]
    ResponseCreate,
}

impl ClientEvent {
    pub fn audio_append(audio: impl Into<String>) -> Self {
        Self::InputAudioBufferAppend {
            audio: audio.into(),
        }
    }

    /// Textnachricht des Benutzers als Konversations-Element
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::ConversationItemCreate {
            item: ConversationItem::user_text(text),
        }
    }

    /// Serialisiert das Event fuer den Data-Channel
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Konversations-Element (`item` in `conversation.item.create`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationItem {
    #[serde(rename = "type")]
    pub typ: String,
    pub role: String,
    pub content: Vec<ContentPart>,
}

impl ConversationItem {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            typ: "message".into(),
            role: "user".into(),
            content: vec![ContentPart::InputText { text: text.into() }],
        }
    }
}

/// Inhaltsteil eines Konversations-Elements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "input_text")]
    InputText { text: String },
}

// ---------------------------------------------------------------------------
// Eingehende Events
// ---------------------------------------------------------------------------

/// Aenderung des Sprech-Zustands, abgeleitet aus Provider-Events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakingChange {
    /// Provider liefert Audio - Assistent spricht
    Started,
    /// Audio-Antwort abgeschlossen
    Stopped,
}

/// Vom Provider empfangenes Event
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeEvent {
    event_type: String,
    payload: Value,
}

impl RealtimeEvent {
    /// Parst eine rohe Data-Channel-Nachricht.
    ///
    /// Akzeptiert nur JSON-Objekte mit einem String-Feld `type`.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let payload: Value = serde_json::from_slice(raw)?;
        let event_type = payload
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| EsquadsError::UngueltigeNachricht("Feld 'type' fehlt".into()))?
            .to_owned();
        Ok(Self {
            event_type,
            payload,
        })
    }

    /// Wert des `type`-Felds
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Vollstaendiges Event als JSON
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn into_payload(self) -> Value {
        self.payload
    }

    /// Leitet eine Sprech-Zustandsaenderung ab (falls das Event eine traegt)
    pub fn speaking_change(&self) -> Option<SpeakingChange> {
        match self.event_type.as_str() {
            AUDIO_DELTA => Some(SpeakingChange::Started),
            AUDIO_DONE => Some(SpeakingChange::Stopped),
            _ => None,
        }
    }

    /// Fehler-Events des Providers (`type == "error"`)
    pub fn is_error(&self) -> bool {
        self.event_type == "error"
    }
}
