//! Client-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Fehlt die Datei, gelten die
//! Standardwerte. Schluessel kommen ausschliesslich aus der Umgebung.

use esquads_realtime::config::{BrokerArt, Geheimnis};
use esquads_realtime::RealtimeConfig;
use serde::{Deserialize, Serialize};

/// Umgebungsvariable fuer den Provider-Schluessel
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
/// Umgebungsvariable fuer den Anon-Key der Session-Funktion
pub const ENV_BROKER_KEY: &str = "ESQ_BROKER_KEY";
/// Umgebungsvariable fuer den Pfad der Konfigurationsdatei
pub const ENV_CONFIG: &str = "ESQUADS_CONFIG";

/// Vollstaendige Client-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub realtime: RealtimeConfig,
    pub logging: LoggingEinstellungen,
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Filter-Direktive, z.B. "info" oder "esquads_realtime=debug"
    pub level: String,
    /// "text" oder "json"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ClientConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}")),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Setzt den Broker-Schluessel passend zur Broker-Art
    pub fn geheimnisse_anwenden(&mut self, umgebung: impl Fn(&str) -> Option<String>) {
        let variable = match self.realtime.broker.art {
            BrokerArt::OpenAi => ENV_API_KEY,
            BrokerArt::Funktion => ENV_BROKER_KEY,
        };
        self.realtime.broker.schluessel = umgebung(variable)
            .map(Geheimnis::new)
            .filter(|g| !g.ist_leer());
    }

    pub fn geheimnisse_aus_env(&mut self) {
        self.geheimnisse_anwenden(|name| std::env::var(name).ok());
    }
}
