//! Session-Broker
//!
//! Tauscht einen langlebigen Schluessel gegen einen kurzlebigen Ephemeral Key
//! fuer genau eine Realtime-Session. Zwei Implementierungen:
//!
//! - `FunctionBroker`: ruft eine Serverless-Funktion auf, die den
//!   Provider-Key haelt (Anfrage `{"voice": ...}`).
//! - `OpenAiBroker`: spricht direkt mit dem Sessions-Endpunkt des Providers.
//!
//! Beide liefern die rohe Provider-Antwort als `SessionCredential`.

use std::sync::Arc;

use async_trait::async_trait;
use esquads_core::{ProviderSessionId, VoiceId};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{BrokerArt, Geheimnis, RealtimeConfig};
use crate::error::{RealtimeError, RealtimeResult};

/// Antwort des Brokers (Auszug der Provider-Session)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionCredential {
    pub id: Option<ProviderSessionId>,
    pub client_secret: Option<ClientSecret>,
}

/// `client_secret` der Provider-Session
#[derive(Clone, Default, Deserialize)]
pub struct ClientSecret {
    pub value: Option<String>,
    /// Ablaufzeitpunkt (Unix-Sekunden)
    pub expires_at: Option<i64>,
}

impl std::fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecret")
            .field("value", &self.value.as_ref().map(|_| "***"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl SessionCredential {
    /// Der Ephemeral Key aus `client_secret.value`
    pub fn ephemeral_key(&self) -> RealtimeResult<&str> {
        self.client_secret
            .as_ref()
            .and_then(|s| s.value.as_deref())
            .filter(|v| !v.is_empty())
            .ok_or(RealtimeError::FehlenderEphemeralKey)
    }

    pub fn expires_at(&self) -> Option<i64> {
        self.client_secret.as_ref().and_then(|s| s.expires_at)
    }
}

/// Liefert Ephemeral Credentials fuer eine Stimme
#[async_trait]
pub trait SessionBroker: Send + Sync {
    async fn create_session(&self, voice: &VoiceId) -> RealtimeResult<SessionCredential>;
}

// ---------------------------------------------------------------------------
// FunctionBroker
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct FunctionRequest<'a> {
    voice: &'a str,
}

/// Broker ueber eine Serverless-Funktion
pub struct FunctionBroker {
    client: Client,
    url: String,
    anon_key: Option<Geheimnis>,
}

impl FunctionBroker {
    pub fn new(url: impl Into<String>, anon_key: Option<Geheimnis>) -> Self {
        Self::with_client(Client::new(), url, anon_key)
    }

    pub fn with_client(client: Client, url: impl Into<String>, anon_key: Option<Geheimnis>) -> Self {
        Self {
            client,
            url: url.into(),
            anon_key: anon_key.filter(|k| !k.ist_leer()),
        }
    }
}

#[async_trait]
impl SessionBroker for FunctionBroker {
    async fn create_session(&self, voice: &VoiceId) -> RealtimeResult<SessionCredential> {
        debug!(url = %self.url, voice = %voice, "Rufe Session-Funktion auf");

        let mut request = self.client.post(&self.url).json(&FunctionRequest {
            voice: voice.as_str(),
        });
        if let Some(key) = &self.anon_key {
            request = request
                .bearer_auth(key.offenlegen())
                .header("apikey", key.offenlegen());
        }

        let credential = send_and_parse(request).await?;
        info!(session = ?credential.id, "Ephemeral Session ueber Funktion erstellt");
        Ok(credential)
    }
}

// ---------------------------------------------------------------------------
// OpenAiBroker
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct SessionRequest<'a> {
    model: &'a str,
    voice: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
}

/// Broker direkt gegen den Sessions-Endpunkt des Providers
pub struct OpenAiBroker {
    client: Client,
    url: String,
    api_key: Geheimnis,
    model: String,
    instructions: Option<String>,
}

impl OpenAiBroker {
    pub fn new(
        url: impl Into<String>,
        api_key: Geheimnis,
        model: impl Into<String>,
        instructions: Option<String>,
    ) -> RealtimeResult<Self> {
        if api_key.ist_leer() {
            return Err(RealtimeError::Konfiguration(
                "Provider-Schluessel fehlt (OPENAI_API_KEY)".into(),
            ));
        }
        Ok(Self {
            client: Client::new(),
            url: url.into(),
            api_key,
            model: model.into(),
            instructions,
        })
    }
}

#[async_trait]
impl SessionBroker for OpenAiBroker {
    async fn create_session(&self, voice: &VoiceId) -> RealtimeResult<SessionCredential> {
        debug!(url = %self.url, model = %self.model, voice = %voice, "Erstelle Provider-Session");

        let request = self
            .client
            .post(&self.url)
            .bearer_auth(self.api_key.offenlegen())
            .json(&SessionRequest {
                model: &self.model,
                voice: voice.as_str(),
                instructions: self.instructions.as_deref(),
            });

        let credential = send_and_parse(request).await?;
        info!(session = ?credential.id, "Ephemeral Session erstellt");
        Ok(credential)
    }
}

async fn send_and_parse(request: reqwest::RequestBuilder) -> RealtimeResult<SessionCredential> {
    let response = request.send().await.map_err(RealtimeError::broker)?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RealtimeError::Broker(format!(
            "HTTP {}: {}",
            status.as_u16(),
            body
        )));
    }
    response
        .json::<SessionCredential>()
        .await
        .map_err(RealtimeError::broker)
}

/// Baut den konfigurierten Broker
pub fn broker_aus_config(config: &RealtimeConfig) -> RealtimeResult<Arc<dyn SessionBroker>> {
    let einstellungen = &config.broker;
    match einstellungen.art {
        BrokerArt::Funktion => Ok(Arc::new(FunctionBroker::new(
            einstellungen.url.clone(),
            einstellungen.schluessel.clone(),
        ))),
        BrokerArt::OpenAi => Ok(Arc::new(OpenAiBroker::new(
            einstellungen.url.clone(),
            einstellungen.schluessel.clone().unwrap_or_default(),
            config.modell.clone(),
            config.anweisungen.clone(),
        )?)),
    }
}
