//! SDP Offer/Answer-Austausch mit dem Provider

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{RealtimeError, RealtimeResult};

/// Schickt ein SDP-Offer und liefert das Answer-SDP
#[async_trait]
pub trait SdpExchange: Send + Sync {
    async fn exchange(&self, offer_sdp: &str, ephemeral_key: &str) -> RealtimeResult<String>;
}

/// SDP-Austausch per HTTPS POST (`Content-Type: application/sdp`)
pub struct HttpSdpExchange {
    client: Client,
    /// Vollstaendige URL inklusive `?model=`
    url: String,
}

impl HttpSdpExchange {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SdpExchange for HttpSdpExchange {
    async fn exchange(&self, offer_sdp: &str, ephemeral_key: &str) -> RealtimeResult<String> {
        debug!(url = %self.url, offer_bytes = offer_sdp.len(), "Sende SDP-Offer");

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(ephemeral_key)
            .header(CONTENT_TYPE, "application/sdp")
            .body(offer_sdp.to_owned())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!(status = status.as_u16(), "SDP-Austausch abgelehnt");
            return Err(RealtimeError::Handshake {
                status: status.as_u16(),
                body,
            });
        }

        debug!(answer_bytes = body.len(), "SDP-Answer empfangen");
        Ok(body)
    }
}
