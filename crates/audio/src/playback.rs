//! Audio-Playback via cpal
//!
//! `open_playback_stream` oeffnet einen OutputStream, der aus einem
//! lock-free Ring-Buffer liest. `OpusPlayback` haelt Stream und Decoder in
//! einem eigenen Thread und spielt empfangene Opus-Pakete sofort ab. Das
//! dekodierte Signal geht zusaetzlich an eine optionale `EchoReferenz`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tracing::{debug, error, info, warn};

use crate::codec::{OpusDecoder, OPUS_SAMPLE_RATE};
use crate::device::load_cpal_output_device;
use crate::dsp::echo_cancel::EchoReferenz;
use crate::error::{AudioError, AudioResult};

/// Konfiguration fuer den Audio-Playback
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Ring-Buffer Kapazitaet in Samples
    pub buffer_size: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            sample_rate: OPUS_SAMPLE_RATE,
            channels: 1,
            buffer_size: OPUS_SAMPLE_RATE as usize * 2,
        }
    }
}

/// Produziert Samples fuer den Playback-Callback
pub type PlaybackProducer = HeapProd<f32>;
/// Konsumiert Samples im cpal-Callback
pub type PlaybackConsumer = HeapCons<f32>;

/// Audio-Playback-Stream
pub struct PlaybackStream {
    _stream: Stream,
    config: PlaybackConfig,
}

impl PlaybackStream {
    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }
}

/// Oeffnet einen Playback-Stream auf dem gegebenen Geraet.
pub fn open_playback_stream(
    device: &Device,
    config: PlaybackConfig,
) -> AudioResult<(PlaybackStream, PlaybackProducer)> {
    let stream_config = StreamConfig {
        channels: config.channels,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let rb = HeapRb::<f32>::new(config.buffer_size);
    let (producer, mut consumer) = rb.split();

    let err_fn = |err| error!("Playback-Fehler: {}", err);

    let supported = device
        .supported_output_configs()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?
        .find(|c| {
            c.min_sample_rate().0 <= config.sample_rate
                && c.max_sample_rate().0 >= config.sample_rate
                && c.channels() >= config.channels
        });

    let sample_format = supported
        .map(|c| c.sample_format())
        .unwrap_or(SampleFormat::F32);

    let stream = match sample_format {
        SampleFormat::F32 => device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _| {
                    let read = consumer.pop_slice(data);
                    // Stille fuer fehlende Samples
                    data[read..].fill(0.0);
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?,
        SampleFormat::I16 => device
            .build_output_stream(
                &stream_config,
                move |data: &mut [i16], _| {
                    let mut float_buf = vec![0.0f32; data.len()];
                    consumer.pop_slice(&mut float_buf);
                    for (out, s) in data.iter_mut().zip(float_buf.iter()) {
                        *out = (*s * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32)
                            as i16;
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?,
        _ => {
            return Err(AudioError::StreamFehler(format!(
                "Nicht unterstuetztes Sample-Format: {:?}",
                sample_format
            )))
        }
    };

    stream
        .play()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    debug!(
        "Playback-Stream geoeffnet: {}Hz {}ch",
        config.sample_rate, config.channels
    );

    Ok((PlaybackStream { _stream: stream, config }, producer))
}

// ---------------------------------------------------------------------------
// OpusPlayback
// ---------------------------------------------------------------------------

/// Spielt Opus-Pakete ueber das Ausgabegeraet ab.
///
/// Stream und Decoder leben im Thread "esquads-playback", weil
/// `cpal::Stream` nicht `Send` ist. Pakete kommen ueber einen Kanal.
pub struct OpusPlayback {
    tx: Sender<Vec<u8>>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl OpusPlayback {
    /// Oeffnet das Ausgabegeraet und startet den Playback-Thread.
    ///
    /// Geraetefehler werden synchron zurueckgegeben.
    pub fn start(device: Option<String>, echo_referenz: Option<EchoReferenz>) -> AudioResult<Self> {
        let (tx, rx) = bounded::<Vec<u8>>(256);
        let (ready_tx, ready_rx) = bounded::<AudioResult<()>>(1);
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);

        let thread = std::thread::Builder::new()
            .name("esquads-playback".to_string())
            .spawn(move || playback_thread(device, echo_referenz, rx, ready_tx, thread_running))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("Remote-Audio-Ausgabe gestartet");
                Ok(Self {
                    tx,
                    running,
                    thread: Some(thread),
                })
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(AudioError::StreamFehler(
                    "Playback-Thread vorzeitig beendet".into(),
                ))
            }
        }
    }

    /// Sender fuer Opus-Pakete (z.B. fuer einen RTP-Lese-Task)
    pub fn sender(&self) -> Sender<Vec<u8>> {
        self.tx.clone()
    }

    /// Beendet den Playback-Thread. Mehrfacher Aufruf ist harmlos.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
            info!("Remote-Audio-Ausgabe gestoppt");
        }
    }
}

impl Drop for OpusPlayback {
    fn drop(&mut self) {
        self.stop();
    }
}

fn playback_thread(
    device: Option<String>,
    echo_referenz: Option<EchoReferenz>,
    rx: Receiver<Vec<u8>>,
    ready_tx: Sender<AudioResult<()>>,
    running: Arc<AtomicBool>,
) {
    let opened = load_cpal_output_device(device.as_deref()).and_then(|dev| {
        let stream = open_playback_stream(&dev, PlaybackConfig::default())?;
        let decoder = OpusDecoder::new(1)?;
        Ok((stream, decoder))
    });

    let ((_stream, mut producer), mut decoder) = match opened {
        Ok(ok) => ok,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    if ready_tx.send(Ok(())).is_err() {
        return;
    }

    while running.load(Ordering::Relaxed) {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(packet) => match decoder.decode(&packet) {
                Ok(pcm) => {
                    if let Some(referenz) = &echo_referenz {
                        referenz.einspeisen(&pcm, OPUS_SAMPLE_RATE);
                    }
                    let written = producer.push_slice(&pcm);
                    if written < pcm.len() {
                        warn!("Playback Ring-Buffer voll, {} Samples verworfen", pcm.len() - written);
                    }
                }
                Err(e) => debug!("Opus-Paket nicht dekodierbar: {}", e),
            },
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    debug!("Playback-Thread beendet, cpal-Stream wird gedroppt");
}
