//! Realtime-Session-Bruecke
//!
//! `RealtimeChat` fuehrt die Verhandlung in fester Reihenfolge aus:
//! Ephemeral Key holen, Peer-Verbindung aufbauen, Offer erstellen,
//! SDP-Austausch, Answer setzen, Mikrofon starten. Schlaegt ein Schritt
//! fehl, werden alle bis dahin belegten Ressourcen freigegeben und die
//! Instanz steht wieder auf `Idle`.
//!
//! Zustaende: `Idle` -> `Negotiating` -> `Connected` -> `Closed`.
//!
//! Start und Stopp des Mikrofons blockieren bis das Geraet offen bzw. der
//! Capture-Thread beendet ist und laufen deshalb ueber `spawn_blocking`.

use std::fmt;
use std::sync::Arc;

use esquads_audio::{AudioFrame, AudioRecorder, EchoReferenz, FrameSource, RecorderConfig};
use esquads_core::{ClientEvent, ProviderSessionId, RealtimeEvent};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::broker::{broker_aus_config, SessionBroker};
use crate::buffer::FramePuffer;
use crate::config::RealtimeConfig;
use crate::error::{RealtimeError, RealtimeResult};
use crate::peer::{EventHandler, PeerConnector, PeerTransport, WebRtcConnector, WebRtcEinstellungen};
use crate::sdp::{HttpSdpExchange, SdpExchange};

/// Lebenszyklus einer Bruecke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    Idle,
    Negotiating,
    Connected,
    /// Endzustand nach `disconnect()`
    Closed,
}

impl ChatState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Negotiating => "Negotiating",
            Self::Connected => "Connected",
            Self::Closed => "Closed",
        }
    }
}

impl fmt::Display for ChatState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Austauschbare Bausteine der Bruecke
pub struct Komponenten {
    pub broker: Arc<dyn SessionBroker>,
    pub sdp: Arc<dyn SdpExchange>,
    pub connector: Arc<dyn PeerConnector>,
    /// Mikrofon fuer den Frame-Pfad ueber den Data-Channel
    pub recorder: Box<dyn FrameSource>,
}

impl Komponenten {
    /// Produktions-Bausteine aus der Konfiguration
    pub fn aus_config(config: &RealtimeConfig) -> RealtimeResult<Self> {
        // Beide Mikrofone ziehen ihr Echo aus derselben Wiedergabe
        let echo_referenz = config.audio.echo_cancellation.then(EchoReferenz::new);
        let connector = WebRtcConnector::new(WebRtcEinstellungen {
            ice_server: config.ice_server.clone(),
            peer_mikrofon: config.peer_mikrofon,
            eingabegeraet: config.audio.eingabegeraet.clone(),
            ausgabegeraet: config.audio.ausgabegeraet.clone(),
            constraints: config.audio.constraints(),
            echo_referenz: echo_referenz.clone(),
        });
        let recorder = AudioRecorder::new(RecorderConfig {
            device: config.audio.eingabegeraet.clone(),
            constraints: config.audio.constraints(),
            echo_referenz,
            ..Default::default()
        });

        Ok(Self {
            broker: broker_aus_config(config)?,
            sdp: Arc::new(HttpSdpExchange::new(config.sdp_url()?)),
            connector: Arc::new(connector),
            recorder: Box::new(recorder),
        })
    }
}

type GeteilteQuelle = Arc<Mutex<Box<dyn FrameSource>>>;

/// Bruecke zwischen Mikrofon und Realtime-Provider
///
/// Vor dem Verwerfen sollte `disconnect()` aufgerufen werden. Ein `Drop`
/// ohne `disconnect()` raeumt nur auf, wenn eine Tokio-Laufzeit aktiv ist,
/// und zwar im Hintergrund.
pub struct RealtimeChat {
    config: RealtimeConfig,
    broker: Arc<dyn SessionBroker>,
    sdp: Arc<dyn SdpExchange>,
    connector: Arc<dyn PeerConnector>,
    recorder: GeteilteQuelle,
    on_event: EventHandler,
    state: ChatState,
    transport: Option<Arc<dyn PeerTransport>>,
    sender_task: Option<JoinHandle<()>>,
    session_id: Option<ProviderSessionId>,
}

impl RealtimeChat {
    /// Bruecke mit Produktions-Bausteinen
    pub fn new<F>(config: RealtimeConfig, on_event: F) -> RealtimeResult<Self>
    where
        F: Fn(RealtimeEvent) + Send + Sync + 'static,
    {
        let komponenten = Komponenten::aus_config(&config)?;
        Ok(Self::with_components(config, komponenten, on_event))
    }

    pub fn with_components<F>(config: RealtimeConfig, komponenten: Komponenten, on_event: F) -> Self
    where
        F: Fn(RealtimeEvent) + Send + Sync + 'static,
    {
        Self {
            config,
            broker: komponenten.broker,
            sdp: komponenten.sdp,
            connector: komponenten.connector,
            recorder: Arc::new(Mutex::new(komponenten.recorder)),
            on_event: Arc::new(on_event),
            state: ChatState::Idle,
            transport: None,
            sender_task: None,
            session_id: None,
        }
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    /// Provider-Session-ID der aktuellen Verbindung
    pub fn session_id(&self) -> Option<&ProviderSessionId> {
        self.session_id.as_ref()
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Baut die Session auf. Nur aus `Idle` erlaubt.
    pub async fn init(&mut self) -> RealtimeResult<()> {
        if self.state != ChatState::Idle {
            return Err(RealtimeError::UngueltigerZustand {
                erwartet: ChatState::Idle.name(),
                aktuell: self.state.name(),
            });
        }

        self.state = ChatState::Negotiating;
        info!(modell = %self.config.modell, stimme = %self.config.stimme, "Starte Realtime-Session");

        match self.negotiate().await {
            Ok(()) => {
                self.state = ChatState::Connected;
                info!(session = ?self.session_id, "Realtime-Session verbunden");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Verhandlung fehlgeschlagen, gebe Ressourcen frei");
                self.release().await;
                self.state = ChatState::Idle;
                Err(e)
            }
        }
    }

    async fn negotiate(&mut self) -> RealtimeResult<()> {
        let limits = self.config.zeitlimits.clone();

        let credential = timeout(limits.broker(), self.broker.create_session(&self.config.stimme))
            .await
            .map_err(|_| RealtimeError::Zeitlimit("Session-Broker"))??;
        let key = credential.ephemeral_key()?.to_owned();
        self.session_id = credential.id.clone();
        debug!(session = ?self.session_id, "Ephemeral Key erhalten");

        let transport = self.connector.connect(Arc::clone(&self.on_event)).await?;
        self.transport = Some(Arc::clone(&transport));

        let offer = timeout(limits.offer(), transport.create_offer())
            .await
            .map_err(|_| RealtimeError::Zeitlimit("SDP-Offer"))??;

        let answer = timeout(limits.sdp(), self.sdp.exchange(&offer, &key))
            .await
            .map_err(|_| RealtimeError::Zeitlimit("SDP-Austausch"))??;
        transport.set_answer(answer).await?;

        let (frame_tx, frame_rx) = mpsc::unbounded_channel::<AudioFrame>();
        self.sender_task = Some(tokio::spawn(frame_sender(
            transport,
            frame_rx,
            self.config.frame_puffer,
        )));

        let recorder = Arc::clone(&self.recorder);
        tokio::task::spawn_blocking(move || {
            recorder.lock().start(Box::new(move |frame| {
                let _ = frame_tx.send(frame);
            }))
        })
        .await
        .map_err(RealtimeError::peer)??;

        Ok(())
    }

    /// Sendet eine Textnachricht des Benutzers und fordert eine Antwort an
    pub async fn send_message(&self, text: &str) -> RealtimeResult<()> {
        let transport = self
            .transport
            .as_ref()
            .filter(|t| t.is_channel_open())
            .ok_or(RealtimeError::KanalNichtOffen)?;

        transport
            .send_text(ClientEvent::user_text(text).to_json()?)
            .await?;
        transport
            .send_text(ClientEvent::ResponseCreate.to_json()?)
            .await?;
        debug!(zeichen = text.chars().count(), "Textnachricht gesendet");
        Ok(())
    }

    /// Beendet die Session. Vor `init()` und mehrfach aufrufbar.
    pub async fn disconnect(&mut self) {
        if self.state == ChatState::Closed {
            return;
        }
        self.release().await;
        self.state = ChatState::Closed;
        info!("Realtime-Session getrennt");
    }

    async fn release(&mut self) {
        stop_recorder(Arc::clone(&self.recorder)).await;
        if let Some(task) = self.sender_task.take() {
            task.abort();
        }
        if let Some(transport) = self.transport.take() {
            transport.close().await;
        }
        self.session_id = None;
    }
}

impl Drop for RealtimeChat {
    fn drop(&mut self) {
        if let Some(task) = self.sender_task.take() {
            task.abort();
        }
        let Some(transport) = self.transport.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("RealtimeChat ohne disconnect() verworfen, raeume im Hintergrund auf");
                let recorder = Arc::clone(&self.recorder);
                handle.spawn(async move {
                    stop_recorder(recorder).await;
                    transport.close().await;
                });
            }
            Err(_) => {
                warn!("RealtimeChat ausserhalb einer Laufzeit verworfen, Peer-Verbindung bleibt offen");
            }
        }
    }
}

async fn stop_recorder(recorder: GeteilteQuelle) {
    if let Err(e) = tokio::task::spawn_blocking(move || recorder.lock().stop()).await {
        warn!(error = %e, "Mikrofon-Stopp abgebrochen");
    }
}

/// Kodiert Frames und schreibt sie in Aufnahmereihenfolge in den Data-Channel.
///
/// Vor dem Oeffnen des Kanals landen sie im `FramePuffer`.
async fn frame_sender(
    transport: Arc<dyn PeerTransport>,
    mut frames: mpsc::UnboundedReceiver<AudioFrame>,
    puffer_kapazitaet: usize,
) {
    let mut open_rx = transport.channel_open();
    let mut beobachten = true;
    let mut puffer = FramePuffer::new(puffer_kapazitaet);

    loop {
        tokio::select! {
            biased;
            geaendert = open_rx.changed(), if beobachten => {
                if geaendert.is_err() {
                    beobachten = false;
                    continue;
                }
                let offen = *open_rx.borrow_and_update();
                if offen {
                    flush(transport.as_ref(), &mut puffer).await;
                }
            }
            frame = frames.recv() => {
                let Some(frame) = frame else { break };
                let payload = match encode_frame(&frame) {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(sequence = frame.sequence, error = %e, "Frame nicht kodierbar");
                        continue;
                    }
                };
                if transport.is_channel_open() {
                    flush(transport.as_ref(), &mut puffer).await;
                    send(transport.as_ref(), payload).await;
                } else if puffer.push(payload).is_some() {
                    debug!(verworfen = puffer.verworfen(), "Kanal noch zu, Frame verworfen");
                }
            }
        }
    }

    debug!("Frame-Sender beendet");
}

fn encode_frame(frame: &AudioFrame) -> RealtimeResult<String> {
    let audio = esquads_audio::encode_audio_frame(&frame.samples)?;
    Ok(ClientEvent::audio_append(audio).to_json()?)
}

async fn flush(transport: &dyn PeerTransport, puffer: &mut FramePuffer<String>) {
    if puffer.is_empty() {
        return;
    }
    let gepuffert: Vec<String> = puffer.drain().collect();
    debug!(frames = gepuffert.len(), "Sende gepufferte Frames");
    for payload in gepuffert {
        send(transport, payload).await;
    }
}

async fn send(transport: &dyn PeerTransport, payload: String) {
    if let Err(e) = transport.send_text(payload).await {
        debug!(error = %e, "Frame nicht gesendet");
    }
}
