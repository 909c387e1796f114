//! esquads-realtime – Bruecke zwischen Mikrofon und Realtime-Sprach-API
//!
//! Ablauf einer Session:
//! 1. Ephemeral Key vom Session-Broker holen
//! 2. Peer-Verbindung mit Mikrofon-Track und Data-Channel `oai-events` aufbauen
//! 3. SDP Offer/Answer per HTTPS austauschen
//! 4. Mikrofon-Frames als `input_audio_buffer.append` senden, eingehende
//!    Events an den Aufrufer weiterreichen

pub mod broker;
pub mod buffer;
pub mod config;
pub mod error;
pub mod peer;
pub mod sdp;
pub mod session;

pub use broker::{
    broker_aus_config, ClientSecret, FunctionBroker, OpenAiBroker, SessionBroker,
    SessionCredential,
};
pub use buffer::FramePuffer;
pub use config::{BrokerArt, Geheimnis, RealtimeConfig};
pub use error::{RealtimeError, RealtimeResult};
pub use peer::{
    dispatch_inbound, EventHandler, PeerConnector, PeerTransport, WebRtcConnector,
    WebRtcEinstellungen, DATA_CHANNEL_LABEL,
};
pub use sdp::{HttpSdpExchange, SdpExchange};
pub use session::{ChatState, Komponenten, RealtimeChat};
