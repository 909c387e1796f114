//! esquads-core – Gemeinsame Typen, Event-Schema und Fehlertypen
//!
//! Dieses Crate stellt die Bausteine bereit, die Audio-Bridge und
//! Client gemeinsam nutzen: Identifikationstypen, das JSON-Event-Schema
//! des Realtime-Data-Channels und den zentralen Fehler-Enum.

pub mod error;
pub mod event;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{EsquadsError, Result};
pub use event::{ClientEvent, ContentPart, ConversationItem, RealtimeEvent, SpeakingChange};
pub use types::{ProviderSessionId, VoiceId};
