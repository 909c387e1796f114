//! Attrappen fuer Broker, SDP-Austausch, Peer-Verbindung und Mikrofon

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use esquads_audio::{AudioError, AudioFrame, AudioResult, FrameCallback, FrameSource};
use esquads_core::{RealtimeEvent, VoiceId};
use esquads_realtime::{
    dispatch_inbound, ClientSecret, EventHandler, Komponenten, PeerConnector, PeerTransport,
    RealtimeChat, RealtimeConfig, RealtimeError, RealtimeResult, SdpExchange, SessionBroker,
    SessionCredential,
};
use parking_lot::Mutex;
use tokio::sync::watch;

// ---------------------------------------------------------------------------
// Broker
// ---------------------------------------------------------------------------

pub struct FakeBroker {
    pub credential: SessionCredential,
    pub verzoegerung: Option<Duration>,
    pub aufrufe: AtomicUsize,
}

impl FakeBroker {
    pub fn mit_key(key: &str) -> Self {
        Self {
            credential: SessionCredential {
                id: Some(esquads_core::ProviderSessionId::new("sess_test")),
                client_secret: Some(ClientSecret {
                    value: Some(key.into()),
                    expires_at: Some(1_700_000_000),
                }),
            },
            verzoegerung: None,
            aufrufe: AtomicUsize::new(0),
        }
    }

    pub fn ohne_secret() -> Self {
        Self {
            credential: SessionCredential {
                id: Some(esquads_core::ProviderSessionId::new("sess_test")),
                client_secret: None,
            },
            verzoegerung: None,
            aufrufe: AtomicUsize::new(0),
        }
    }

    pub fn haengend() -> Self {
        Self {
            verzoegerung: Some(Duration::from_secs(60)),
            ..Self::mit_key("ek_test")
        }
    }
}

#[async_trait]
impl SessionBroker for FakeBroker {
    async fn create_session(&self, _voice: &VoiceId) -> RealtimeResult<SessionCredential> {
        self.aufrufe.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.verzoegerung {
            tokio::time::sleep(d).await;
        }
        Ok(self.credential.clone())
    }
}

// ---------------------------------------------------------------------------
// SDP
// ---------------------------------------------------------------------------

pub struct FakeSdp {
    /// Anzahl der ersten Aufrufe, die mit HTTP 500 scheitern
    pub fehlschlaege: usize,
    pub verzoegerung: Option<Duration>,
    pub aufrufe: AtomicUsize,
    pub letzter_key: Mutex<Option<String>>,
}

impl FakeSdp {
    pub fn ok() -> Self {
        Self::scheitert(0)
    }

    pub fn scheitert(fehlschlaege: usize) -> Self {
        Self {
            fehlschlaege,
            verzoegerung: None,
            aufrufe: AtomicUsize::new(0),
            letzter_key: Mutex::new(None),
        }
    }

    pub fn haengend() -> Self {
        Self {
            verzoegerung: Some(Duration::from_secs(60)),
            ..Self::ok()
        }
    }
}

#[async_trait]
impl SdpExchange for FakeSdp {
    async fn exchange(&self, _offer_sdp: &str, ephemeral_key: &str) -> RealtimeResult<String> {
        let nr = self.aufrufe.fetch_add(1, Ordering::SeqCst);
        *self.letzter_key.lock() = Some(ephemeral_key.to_owned());
        if let Some(d) = self.verzoegerung {
            tokio::time::sleep(d).await;
        }
        if nr < self.fehlschlaege {
            return Err(RealtimeError::Handshake {
                status: 500,
                body: "internal error".into(),
            });
        }
        Ok("v=0\r\nanswer".into())
    }
}

// ---------------------------------------------------------------------------
// Peer
// ---------------------------------------------------------------------------

pub struct FakeTransport {
    open_tx: watch::Sender<bool>,
    pub gesendet: Mutex<Vec<String>>,
    pub answer: Mutex<Option<String>>,
    pub schliessungen: AtomicUsize,
    /// `create_offer` kehrt nicht zurueck (ICE-Gathering haengt)
    pub offer_haengt: AtomicBool,
    handler: Mutex<Option<EventHandler>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        let (open_tx, _) = watch::channel(false);
        Self {
            open_tx,
            gesendet: Mutex::new(Vec::new()),
            answer: Mutex::new(None),
            schliessungen: AtomicUsize::new(0),
            offer_haengt: AtomicBool::new(false),
            handler: Mutex::new(None),
        }
    }

    /// Simuliert das Oeffnen des Data-Channels
    pub fn oeffnen(&self) {
        self.open_tx.send_replace(true);
    }

    /// Simuliert eine eingehende Data-Channel-Nachricht
    pub fn eingehend(&self, raw: &[u8]) -> bool {
        let handler = self.handler.lock().clone();
        match handler {
            Some(h) => dispatch_inbound(raw, &h),
            None => false,
        }
    }

    pub fn gesendete_events(&self) -> Vec<serde_json::Value> {
        self.gesendet
            .lock()
            .iter()
            .map(|s| serde_json::from_str(s).expect("gesendetes Event ist JSON"))
            .collect()
    }
}

#[async_trait]
impl PeerTransport for FakeTransport {
    async fn create_offer(&self) -> RealtimeResult<String> {
        if self.offer_haengt.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        Ok("v=0\r\noffer".into())
    }

    async fn set_answer(&self, answer_sdp: String) -> RealtimeResult<()> {
        *self.answer.lock() = Some(answer_sdp);
        Ok(())
    }

    fn channel_open(&self) -> watch::Receiver<bool> {
        self.open_tx.subscribe()
    }

    async fn send_text(&self, text: String) -> RealtimeResult<()> {
        if !self.is_channel_open() {
            return Err(RealtimeError::KanalNichtOffen);
        }
        self.gesendet.lock().push(text);
        Ok(())
    }

    async fn close(&self) {
        self.schliessungen.fetch_add(1, Ordering::SeqCst);
        self.open_tx.send_replace(false);
    }
}

pub struct FakeConnector {
    pub transport: Arc<FakeTransport>,
    pub verbindungen: AtomicUsize,
}

#[async_trait]
impl PeerConnector for FakeConnector {
    async fn connect(&self, on_event: EventHandler) -> RealtimeResult<Arc<dyn PeerTransport>> {
        self.verbindungen.fetch_add(1, Ordering::SeqCst);
        *self.transport.handler.lock() = Some(on_event);
        Ok(Arc::clone(&self.transport) as Arc<dyn PeerTransport>)
    }
}

// ---------------------------------------------------------------------------
// Mikrofon
// ---------------------------------------------------------------------------

/// Gemeinsamer Zustand des Fake-Mikrofons (bleibt beim Test)
#[derive(Clone, Default)]
pub struct MikrofonSonde {
    pub starts: Arc<AtomicUsize>,
    pub stops: Arc<AtomicUsize>,
    callback: Arc<Mutex<Option<FrameCallback>>>,
    sequenz: Arc<AtomicUsize>,
}

impl MikrofonSonde {
    /// Liefert einen Frame mit konstantem Wert an die Bruecke
    pub fn frame(&self, wert: f32) {
        let seq = self.sequenz.fetch_add(1, Ordering::SeqCst) as u64;
        if let Some(cb) = self.callback.lock().as_mut() {
            cb(AudioFrame {
                samples: vec![wert; 4096],
                sequence: seq,
            });
        }
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

pub struct FakeRecorder {
    sonde: MikrofonSonde,
    fehler: bool,
    /// Blockiert `start` wie ein langsam oeffnendes Geraet
    oeffnungsdauer: Option<Duration>,
}

impl FakeRecorder {
    pub fn new(sonde: MikrofonSonde) -> Self {
        Self {
            sonde,
            fehler: false,
            oeffnungsdauer: None,
        }
    }

    pub fn ohne_geraet(sonde: MikrofonSonde) -> Self {
        Self {
            fehler: true,
            ..Self::new(sonde)
        }
    }

    pub fn langsam(sonde: MikrofonSonde, dauer: Duration) -> Self {
        Self {
            oeffnungsdauer: Some(dauer),
            ..Self::new(sonde)
        }
    }
}

impl FrameSource for FakeRecorder {
    fn start(&mut self, on_frame: FrameCallback) -> AudioResult<()> {
        self.sonde.starts.fetch_add(1, Ordering::SeqCst);
        if let Some(dauer) = self.oeffnungsdauer {
            std::thread::sleep(dauer);
        }
        if self.fehler {
            return Err(AudioError::KeinStandardEingabegeraet);
        }
        *self.sonde.callback.lock() = Some(on_frame);
        Ok(())
    }

    fn stop(&mut self) {
        self.sonde.stops.fetch_add(1, Ordering::SeqCst);
        self.sonde.callback.lock().take();
    }

    fn is_active(&self) -> bool {
        self.sonde.callback.lock().is_some()
    }
}

// ---------------------------------------------------------------------------
// Aufbau
// ---------------------------------------------------------------------------

pub struct Aufbau {
    pub chat: RealtimeChat,
    pub broker: Arc<FakeBroker>,
    pub sdp: Arc<FakeSdp>,
    pub connector: Arc<FakeConnector>,
    pub transport: Arc<FakeTransport>,
    pub mikrofon: MikrofonSonde,
    pub events: Arc<Mutex<Vec<RealtimeEvent>>>,
}

pub fn aufbau(broker: FakeBroker, sdp: FakeSdp) -> Aufbau {
    aufbau_mit(RealtimeConfig::default(), broker, sdp, false)
}

pub fn aufbau_mit(
    config: RealtimeConfig,
    broker: FakeBroker,
    sdp: FakeSdp,
    mikrofon_kaputt: bool,
) -> Aufbau {
    aufbau_mit_recorder(config, broker, sdp, |sonde| {
        if mikrofon_kaputt {
            FakeRecorder::ohne_geraet(sonde)
        } else {
            FakeRecorder::new(sonde)
        }
    })
}

pub fn aufbau_mit_recorder(
    config: RealtimeConfig,
    broker: FakeBroker,
    sdp: FakeSdp,
    recorder: impl FnOnce(MikrofonSonde) -> FakeRecorder,
) -> Aufbau {
    let broker = Arc::new(broker);
    let sdp = Arc::new(sdp);
    let transport = Arc::new(FakeTransport::new());
    let connector = Arc::new(FakeConnector {
        transport: Arc::clone(&transport),
        verbindungen: AtomicUsize::new(0),
    });
    let mikrofon = MikrofonSonde::default();
    let recorder: Box<dyn FrameSource> = Box::new(recorder(mikrofon.clone()));

    let events = Arc::new(Mutex::new(Vec::new()));
    let sammler = Arc::clone(&events);
    let chat = RealtimeChat::with_components(
        config,
        Komponenten {
            broker: Arc::clone(&broker) as Arc<dyn SessionBroker>,
            sdp: Arc::clone(&sdp) as Arc<dyn SdpExchange>,
            connector: Arc::clone(&connector) as Arc<dyn PeerConnector>,
            recorder,
        },
        move |ev| sammler.lock().push(ev),
    );

    Aufbau {
        chat,
        broker,
        sdp,
        connector,
        transport,
        mikrofon,
        events,
    }
}

/// Laesst den Frame-Sender-Task laufen
pub async fn abarbeiten() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

/// Wartet (echte Zeit) bis die Bedingung gilt, hoechstens zwei Sekunden
pub async fn warten_bis(bedingung: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if bedingung() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    bedingung()
}

/// Erster PCM16-Wert eines gesendeten `input_audio_buffer.append`
pub fn erster_sample(event: &serde_json::Value) -> i16 {
    let audio = event["audio"].as_str().expect("audio-Feld");
    esquads_audio::decode_pcm16(audio).expect("gueltiges PCM16")[0]
}
