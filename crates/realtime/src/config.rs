//! Konfiguration der Realtime-Bruecke
//!
//! Alle Felder haben Standardwerte; Geheimnisse werden nie aus der Datei
//! gelesen, sondern vom Aufrufer (Umgebung) gesetzt.

use std::fmt;
use std::time::Duration;

use esquads_audio::CaptureConstraints;
use esquads_core::VoiceId;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{RealtimeError, RealtimeResult};

/// Standard-Modell fuer den SDP-Austausch
pub const STANDARD_MODELL: &str = "gpt-4o-realtime-preview-2024-12-17";
/// Realtime-Endpunkt des Providers
pub const STANDARD_ENDPUNKT: &str = "https://api.openai.com/v1/realtime";
/// Endpunkt fuer Ephemeral-Sessions
pub const STANDARD_SESSIONS_URL: &str = "https://api.openai.com/v1/realtime/sessions";

/// Geheimer Wert, der in Debug-Ausgaben nicht erscheint
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Geheimnis(String);

impl Geheimnis {
    pub fn new(wert: impl Into<String>) -> Self {
        Self(wert.into())
    }

    pub fn offenlegen(&self) -> &str {
        &self.0
    }

    pub fn ist_leer(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Geheimnis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Geheimnis(***)")
    }
}

/// Vollstaendige Konfiguration der Bruecke
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Modell-ID fuer `?model=` beim SDP-Austausch
    pub modell: String,
    pub stimme: VoiceId,
    /// Optionale System-Anweisungen fuer die Session
    pub anweisungen: Option<String>,
    /// Realtime-Endpunkt ohne Query
    pub endpunkt: String,
    pub broker: BrokerEinstellungen,
    pub zeitlimits: Zeitlimits,
    pub audio: AudioEinstellungen,
    /// STUN/TURN-URLs fuer ICE
    pub ice_server: Vec<String>,
    /// Frames, die vor dem Oeffnen des Data-Channels gepuffert werden (0 = verwerfen)
    pub frame_puffer: usize,
    /// Zweites Mikrofon als Media-Track an der Peer-Verbindung
    pub peer_mikrofon: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            modell: STANDARD_MODELL.into(),
            stimme: VoiceId::default(),
            anweisungen: None,
            endpunkt: STANDARD_ENDPUNKT.into(),
            broker: BrokerEinstellungen::default(),
            zeitlimits: Zeitlimits::default(),
            audio: AudioEinstellungen::default(),
            ice_server: vec!["stun:stun.l.google.com:19302".into()],
            frame_puffer: 4,
            peer_mikrofon: true,
        }
    }
}

impl RealtimeConfig {
    /// URL fuer den SDP-Austausch inkl. kodiertem `model`-Parameter
    pub fn sdp_url(&self) -> RealtimeResult<Url> {
        Url::parse_with_params(
            self.endpunkt.trim_end_matches('/'),
            &[("model", self.modell.as_str())],
        )
        .map_err(|e| {
            RealtimeError::Konfiguration(format!("Ungueltiger Endpunkt '{}': {e}", self.endpunkt))
        })
    }
}

/// Art des Session-Brokers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerArt {
    /// Serverless-Funktion, die den Provider-Key haelt
    Funktion,
    /// Direkter Aufruf des Provider-Sessions-Endpunkts
    OpenAi,
}

/// Session-Broker-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerEinstellungen {
    pub art: BrokerArt,
    /// URL der Funktion bzw. des Sessions-Endpunkts
    pub url: String,
    /// Anon-Key der Funktion oder Provider-Key (aus der Umgebung)
    #[serde(skip)]
    pub schluessel: Option<Geheimnis>,
}

impl Default for BrokerEinstellungen {
    fn default() -> Self {
        Self {
            art: BrokerArt::OpenAi,
            url: STANDARD_SESSIONS_URL.into(),
            schluessel: None,
        }
    }
}

/// Zeitlimits der Verhandlung in Sekunden
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Zeitlimits {
    pub broker_sek: u64,
    /// Offer-Erstellung inklusive ICE-Gathering
    pub offer_sek: u64,
    pub sdp_sek: u64,
}

impl Default for Zeitlimits {
    fn default() -> Self {
        Self {
            broker_sek: 10,
            offer_sek: 15,
            sdp_sek: 15,
        }
    }
}

impl Zeitlimits {
    pub fn broker(&self) -> Duration {
        Duration::from_secs(self.broker_sek)
    }

    pub fn offer(&self) -> Duration {
        Duration::from_secs(self.offer_sek)
    }

    pub fn sdp(&self) -> Duration {
        Duration::from_secs(self.sdp_sek)
    }
}

/// Geraete- und Verarbeitungswuensche
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioEinstellungen {
    /// Namensausschnitt des Mikrofons (leer = Standard)
    pub eingabegeraet: Option<String>,
    /// Namensausschnitt des Lautsprechers (leer = Standard)
    pub ausgabegeraet: Option<String>,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for AudioEinstellungen {
    fn default() -> Self {
        Self {
            eingabegeraet: None,
            ausgabegeraet: None,
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

impl AudioEinstellungen {
    pub fn constraints(&self) -> CaptureConstraints {
        CaptureConstraints {
            echo_cancellation: self.echo_cancellation,
            noise_suppression: self.noise_suppression,
            auto_gain_control: self.auto_gain_control,
        }
    }
}
