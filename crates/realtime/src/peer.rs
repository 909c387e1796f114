//! Peer-Verbindung zum Realtime-Provider
//!
//! `PeerConnector` baut eine Verbindung mit Data-Channel `oai-events`,
//! optionalem Mikrofon-Track und Remote-Audio-Ausgabe auf. `PeerTransport`
//! ist die fertige Verbindung, ueber die die Bruecke Offer, Answer und
//! Events abwickelt. Die webrtc-Implementierung ist `WebRtcConnector`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use esquads_audio::{
    AudioFrame, AudioRecorder, CaptureConstraints, EchoReferenz, FrameSource, OpusConfig,
    OpusEncoder, OpusPlayback, RecorderConfig, OPUS_SAMPLE_RATE,
};
use esquads_core::RealtimeEvent;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_OPUS};
use webrtc::api::APIBuilder;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use crate::error::{RealtimeError, RealtimeResult};

/// Name des Event-Kanals
pub const DATA_CHANNEL_LABEL: &str = "oai-events";

/// Empfaenger fuer eingehende Provider-Events
pub type EventHandler = Arc<dyn Fn(RealtimeEvent) + Send + Sync>;

/// Parst eine rohe Data-Channel-Nachricht und reicht sie weiter.
///
/// Unlesbare Nachrichten werden verworfen; Rueckgabe `false`.
pub fn dispatch_inbound(raw: &[u8], handler: &EventHandler) -> bool {
    match RealtimeEvent::parse(raw) {
        Ok(event) => {
            handler(event);
            true
        }
        Err(e) => {
            debug!(bytes = raw.len(), error = %e, "Ungueltige Nachricht verworfen");
            false
        }
    }
}

/// Eine aufgebaute Peer-Verbindung
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Erstellt das Offer, setzt es lokal und wartet auf das ICE-Gathering
    async fn create_offer(&self) -> RealtimeResult<String>;

    async fn set_answer(&self, answer_sdp: String) -> RealtimeResult<()>;

    /// Beobachter fuer den Offen-Zustand des Data-Channels
    fn channel_open(&self) -> watch::Receiver<bool>;

    fn is_channel_open(&self) -> bool {
        *self.channel_open().borrow()
    }

    async fn send_text(&self, text: String) -> RealtimeResult<()>;

    /// Schliesst Data-Channel, Tracks und Verbindung. Mehrfacher Aufruf ist harmlos.
    async fn close(&self);
}

/// Baut Peer-Verbindungen auf
#[async_trait]
pub trait PeerConnector: Send + Sync {
    async fn connect(&self, on_event: EventHandler) -> RealtimeResult<Arc<dyn PeerTransport>>;
}

// ---------------------------------------------------------------------------
// webrtc
// ---------------------------------------------------------------------------

/// Einstellungen fuer `WebRtcConnector`
#[derive(Debug, Clone)]
pub struct WebRtcEinstellungen {
    pub ice_server: Vec<String>,
    /// Mikrofon als Opus-Media-Track anhaengen
    pub peer_mikrofon: bool,
    pub eingabegeraet: Option<String>,
    pub ausgabegeraet: Option<String>,
    pub constraints: CaptureConstraints,
    /// Remote-Audio wird hier eingespeist, der Mikrofon-Track liest daraus
    pub echo_referenz: Option<EchoReferenz>,
}

impl Default for WebRtcEinstellungen {
    fn default() -> Self {
        Self {
            ice_server: vec!["stun:stun.l.google.com:19302".into()],
            peer_mikrofon: true,
            eingabegeraet: None,
            ausgabegeraet: None,
            constraints: CaptureConstraints::default(),
            echo_referenz: None,
        }
    }
}

pub struct WebRtcConnector {
    einstellungen: WebRtcEinstellungen,
}

impl WebRtcConnector {
    pub fn new(einstellungen: WebRtcEinstellungen) -> Self {
        Self { einstellungen }
    }

    async fn peer_connection(&self) -> RealtimeResult<Arc<RTCPeerConnection>> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let ice_servers = self
            .einstellungen
            .ice_server
            .iter()
            .map(|url| RTCIceServer {
                urls: vec![url.clone()],
                ..Default::default()
            })
            .collect();

        let pc = api
            .new_peer_connection(RTCConfiguration {
                ice_servers,
                ..Default::default()
            })
            .await?;
        Ok(Arc::new(pc))
    }

    /// Oeffnet das zweite Mikrofon und speist es als Opus-Track ein
    async fn mikrofon_track(&self, pc: &Arc<RTCPeerConnection>) -> RealtimeResult<AudioRecorder> {
        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: OPUS_SAMPLE_RATE,
                channels: 1,
                ..Default::default()
            },
            "audio".to_owned(),
            "esquads-mikrofon".to_owned(),
        ));

        let sender = pc
            .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await?;

        // RTCP muss gelesen werden, sonst laufen die Interceptoren nicht
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while sender.read(&mut buf).await.is_ok() {}
        });

        let opus = OpusConfig::default();
        let frame_dauer = Duration::from_millis(opus.frame_ms as u64);
        let mut encoder = OpusEncoder::new(opus)?;
        let recorder_config = RecorderConfig {
            sample_rate: OPUS_SAMPLE_RATE,
            channels: 1,
            block_size: encoder.frame_size(),
            device: self.einstellungen.eingabegeraet.clone(),
            constraints: self.einstellungen.constraints,
            echo_referenz: self.einstellungen.echo_referenz.clone(),
        };

        let runtime = tokio::runtime::Handle::current();
        let callback = Box::new(move |frame: AudioFrame| {
            let packet = match encoder.encode(&frame.samples) {
                Ok(p) => p,
                Err(e) => {
                    debug!(error = %e, "Opus-Kodierung fehlgeschlagen");
                    return;
                }
            };
            let sample = Sample {
                data: Bytes::from(packet),
                duration: frame_dauer,
                ..Default::default()
            };
            if let Err(e) = runtime.block_on(track.write_sample(&sample)) {
                debug!(error = %e, "Mikrofon-Sample nicht geschrieben");
            }
        });

        let recorder = tokio::task::spawn_blocking(move || {
            let mut recorder = AudioRecorder::new(recorder_config);
            recorder.start(callback).map(|_| recorder)
        })
        .await
        .map_err(RealtimeError::peer)??;

        info!("Mikrofon-Track an Peer-Verbindung angehaengt");
        Ok(recorder)
    }
}

impl Default for WebRtcConnector {
    fn default() -> Self {
        Self::new(WebRtcEinstellungen::default())
    }
}

#[async_trait]
impl PeerConnector for WebRtcConnector {
    async fn connect(&self, on_event: EventHandler) -> RealtimeResult<Arc<dyn PeerTransport>> {
        let pc = self.peer_connection().await?;
        let playback: Arc<Mutex<Option<OpusPlayback>>> = Arc::new(Mutex::new(None));

        register_remote_audio(
            &pc,
            Arc::clone(&playback),
            self.einstellungen.ausgabegeraet.clone(),
            self.einstellungen.echo_referenz.clone(),
        );

        let mikrofon = if self.einstellungen.peer_mikrofon {
            match self.mikrofon_track(&pc).await {
                Ok(r) => Some(r),
                Err(e) => {
                    let _ = pc.close().await;
                    return Err(e);
                }
            }
        } else {
            debug!("Mikrofon-Track deaktiviert");
            None
        };

        let (open_tx, open_rx) = watch::channel(false);
        let open_tx = Arc::new(open_tx);
        let dc = match open_data_channel(&pc, open_tx, on_event).await {
            Ok(dc) => dc,
            Err(e) => {
                if let Some(r) = mikrofon {
                    stop_recorder(r).await;
                }
                let _ = pc.close().await;
                return Err(e);
            }
        };

        Ok(Arc::new(WebRtcTransport {
            pc,
            dc,
            open_rx,
            mikrofon: Mutex::new(mikrofon),
            playback,
        }))
    }
}

async fn open_data_channel(
    pc: &Arc<RTCPeerConnection>,
    open_tx: Arc<watch::Sender<bool>>,
    on_event: EventHandler,
) -> RealtimeResult<Arc<RTCDataChannel>> {
    let dc = pc.create_data_channel(DATA_CHANNEL_LABEL, None).await?;

    let tx = Arc::clone(&open_tx);
    dc.on_open(Box::new(move || {
        info!("Data-Channel {} offen", DATA_CHANNEL_LABEL);
        let _ = tx.send(true);
        Box::pin(async {})
    }));

    let tx = Arc::clone(&open_tx);
    dc.on_close(Box::new(move || {
        debug!("Data-Channel {} geschlossen", DATA_CHANNEL_LABEL);
        let _ = tx.send(false);
        Box::pin(async {})
    }));

    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        dispatch_inbound(&msg.data, &on_event);
        Box::pin(async {})
    }));

    Ok(dc)
}

/// Haengt den ersten Remote-Audio-Track an die Lautsprecher-Ausgabe
fn register_remote_audio(
    pc: &Arc<RTCPeerConnection>,
    playback: Arc<Mutex<Option<OpusPlayback>>>,
    ausgabegeraet: Option<String>,
    echo_referenz: Option<EchoReferenz>,
) {
    let angehaengt = Arc::new(AtomicBool::new(false));
    pc.on_track(Box::new(move |track: Arc<TrackRemote>, _receiver, _transceiver| {
        let angehaengt = Arc::clone(&angehaengt);
        let playback = Arc::clone(&playback);
        let geraet = ausgabegeraet.clone();
        let echo = echo_referenz.clone();
        Box::pin(async move {
            if track.kind() != RTPCodecType::Audio {
                return;
            }
            if angehaengt.swap(true, Ordering::SeqCst) {
                debug!("Weiterer Remote-Audio-Track ignoriert");
                return;
            }
            tokio::spawn(remote_audio_loop(track, playback, geraet, echo));
        })
    }));
}

async fn remote_audio_loop(
    track: Arc<TrackRemote>,
    playback: Arc<Mutex<Option<OpusPlayback>>>,
    geraet: Option<String>,
    echo: Option<EchoReferenz>,
) {
    let sender = match tokio::task::spawn_blocking(move || OpusPlayback::start(geraet, echo)).await {
        Ok(Ok(p)) => {
            let sender = p.sender();
            *playback.lock() = Some(p);
            sender
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Remote-Audio kann nicht abgespielt werden");
            return;
        }
        Err(e) => {
            warn!(error = %e, "Playback-Start abgebrochen");
            return;
        }
    };

    info!(codec = %track.codec().capability.mime_type, "Remote-Audio-Track angehaengt");
    while let Ok((packet, _)) = track.read_rtp().await {
        if packet.payload.is_empty() {
            continue;
        }
        if sender.try_send(packet.payload.to_vec()).is_err() {
            debug!("Playback-Kanal voll oder geschlossen, Paket verworfen");
        }
    }
    debug!("Remote-Audio-Track beendet");
}

async fn stop_recorder(mut recorder: AudioRecorder) {
    let _ = tokio::task::spawn_blocking(move || recorder.stop()).await;
}

/// Peer-Verbindung auf Basis von webrtc-rs
pub struct WebRtcTransport {
    pc: Arc<RTCPeerConnection>,
    dc: Arc<RTCDataChannel>,
    open_rx: watch::Receiver<bool>,
    mikrofon: Mutex<Option<AudioRecorder>>,
    playback: Arc<Mutex<Option<OpusPlayback>>>,
}

#[async_trait]
impl PeerTransport for WebRtcTransport {
    async fn create_offer(&self) -> RealtimeResult<String> {
        let offer = self.pc.create_offer(None).await?;
        let mut gathering = self.pc.gathering_complete_promise().await;
        self.pc.set_local_description(offer).await?;
        let _ = gathering.recv().await;

        let local = self
            .pc
            .local_description()
            .await
            .ok_or_else(|| RealtimeError::Peer("Keine lokale Beschreibung nach dem Offer".into()))?;
        debug!(bytes = local.sdp.len(), "SDP-Offer erstellt");
        Ok(local.sdp)
    }

    async fn set_answer(&self, answer_sdp: String) -> RealtimeResult<()> {
        let answer = RTCSessionDescription::answer(answer_sdp)?;
        self.pc.set_remote_description(answer).await?;
        debug!("SDP-Answer gesetzt");
        Ok(())
    }

    fn channel_open(&self) -> watch::Receiver<bool> {
        self.open_rx.clone()
    }

    fn is_channel_open(&self) -> bool {
        self.dc.ready_state() == RTCDataChannelState::Open
    }

    async fn send_text(&self, text: String) -> RealtimeResult<()> {
        if !self.is_channel_open() {
            return Err(RealtimeError::KanalNichtOffen);
        }
        self.dc.send_text(text).await?;
        Ok(())
    }

    async fn close(&self) {
        let mikrofon = self.mikrofon.lock().take();
        if let Some(r) = mikrofon {
            stop_recorder(r).await;
        }
        if let Err(e) = self.dc.close().await {
            debug!(error = %e, "Data-Channel liess sich nicht schliessen");
        }
        if let Err(e) = self.pc.close().await {
            debug!(error = %e, "Peer-Verbindung liess sich nicht schliessen");
        }
        let playback = self.playback.lock().take();
        if let Some(mut p) = playback {
            let _ = tokio::task::spawn_blocking(move || p.stop()).await;
        }
        info!("Peer-Verbindung geschlossen");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn zaehlender_handler() -> (EventHandler, Arc<AtomicUsize>) {
        let zaehler = Arc::new(AtomicUsize::new(0));
        let z = Arc::clone(&zaehler);
        let handler: EventHandler = Arc::new(move |_| {
            z.fetch_add(1, Ordering::SeqCst);
        });
        (handler, zaehler)
    }

    #[test]
    fn gueltige_nachricht_wird_weitergereicht() {
        let (handler, zaehler) = zaehlender_handler();
        assert!(dispatch_inbound(br#"{"type":"response.audio.delta","delta":"AA=="}"#, &handler));
        assert_eq!(zaehler.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn kaputte_nachricht_wird_verworfen() {
        let (handler, zaehler) = zaehlender_handler();
        assert!(!dispatch_inbound(b"{nicht json", &handler));
        assert!(!dispatch_inbound(br#"{"ohne":"typ"}"#, &handler));
        assert!(!dispatch_inbound(b"", &handler));
        assert_eq!(zaehler.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn standard_einstellungen() {
        let e = WebRtcEinstellungen::default();
        assert!(e.peer_mikrofon);
        assert!(!e.ice_server.is_empty());
    }

    #[tokio::test]
    async fn offer_ohne_mikrofon() {
        let connector = WebRtcConnector::new(WebRtcEinstellungen {
            ice_server: vec![],
            peer_mikrofon: false,
            ..Default::default()
        });
        let (handler, _) = zaehlender_handler();
        let transport = connector.connect(handler).await.unwrap();
        assert!(!transport.is_channel_open());

        let offer = transport.create_offer().await.unwrap();
        assert!(offer.starts_with("v=0"));
        assert!(offer.contains("webrtc-datachannel"));

        assert!(matches!(
            transport.send_text("{}".into()).await,
            Err(RealtimeError::KanalNichtOffen)
        ));
        transport.close().await;
        transport.close().await;
    }
}
