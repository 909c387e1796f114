//! Mikrofon-Recorder
//!
//! Der Recorder oeffnet das Eingabegeraet in einem eigenen Thread, schickt
//! die Samples durch die Capture-Pipeline und liefert Frames fester Groesse
//! an einen Callback. Frames werden in Aufnahmereihenfolge ausgeliefert.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use ringbuf::traits::Consumer;
use tracing::{debug, error, info};

use crate::capture::{first_channel, open_capture_stream, CaptureConfig, FrameAssembler};
use crate::device::load_cpal_input_device;
use crate::dsp::echo_cancel::EchoReferenz;
use crate::error::{AudioError, AudioResult};
use crate::pipeline::build_capture_pipeline;

/// Verarbeitungswuensche an die Aufnahme (analog zu Browser-Constraints)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// Konfiguration des Recorders
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Samples pro ausgeliefertem Frame
    pub block_size: usize,
    /// Namensausschnitt des Mikrofons, `None` fuer das Standardgeraet
    pub device: Option<String>,
    pub constraints: CaptureConstraints,
    /// Lautsprecher-Signal fuer die Echo-Unterdrueckung
    pub echo_referenz: Option<EchoReferenz>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 24000,
            channels: 1,
            block_size: 4096,
            device: None,
            constraints: CaptureConstraints::default(),
            echo_referenz: None,
        }
    }
}

/// Ein aufbereiteter Mono-Frame
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub samples: Vec<f32>,
    /// Fortlaufende Nummer ab 0
    pub sequence: u64,
}

/// Empfaenger fuer fertige Frames (laeuft im Capture-Thread)
pub type FrameCallback = Box<dyn FnMut(AudioFrame) + Send>;

/// Quelle fuer Audio-Frames
///
/// `AudioRecorder` ist die Mikrofon-Implementierung; Tests setzen eigene
/// Quellen ein.
pub trait FrameSource: Send {
    /// Startet die Quelle. Geraete- und Berechtigungsfehler kommen synchron.
    fn start(&mut self, on_frame: FrameCallback) -> AudioResult<()>;

    /// Stoppt die Quelle und gibt das Geraet frei. Idempotent.
    fn stop(&mut self);

    fn is_active(&self) -> bool;
}

/// Mikrofon-Recorder auf Basis von cpal
pub struct AudioRecorder {
    config: RecorderConfig,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl AudioRecorder {
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }
}

impl FrameSource for AudioRecorder {
    fn start(&mut self, on_frame: FrameCallback) -> AudioResult<()> {
        if self.thread.is_some() {
            return Err(AudioError::BereitsAktiv);
        }

        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel::<AudioResult<()>>(1);
        let config = self.config.clone();
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::Relaxed);

        let spawned = std::thread::Builder::new()
            .name("esquads-capture".to_string())
            .spawn(move || capture_thread(config, on_frame, running, ready_tx));

        let handle = match spawned {
            Ok(h) => h,
            Err(e) => {
                self.running.store(false, Ordering::Relaxed);
                return Err(e.into());
            }
        };

        let ready = ready_rx.recv().unwrap_or_else(|_| {
            Err(AudioError::StreamFehler(
                "Capture-Thread vorzeitig beendet".into(),
            ))
        });

        match ready {
            Ok(()) => {
                self.thread = Some(handle);
                info!(
                    rate = self.config.sample_rate,
                    block = self.config.block_size,
                    "Mikrofon-Aufnahme gestartet"
                );
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Relaxed);
                let _ = handle.join();
                Err(e)
            }
        }
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
            info!("Mikrofon-Aufnahme gestoppt");
        }
    }

    fn is_active(&self) -> bool {
        self.thread.is_some() && self.running.load(Ordering::Relaxed)
    }
}

impl Drop for AudioRecorder {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_thread(
    config: RecorderConfig,
    mut on_frame: FrameCallback,
    running: Arc<AtomicBool>,
    ready_tx: std::sync::mpsc::SyncSender<AudioResult<()>>,
) {
    let capture_config = CaptureConfig {
        sample_rate: config.sample_rate,
        channels: config.channels,
        buffer_size: config.sample_rate as usize * config.channels.max(1) as usize * 2,
    };

    // cpal::Stream lebt nur in diesem Thread
    let opened = load_cpal_input_device(config.device.as_deref())
        .and_then(|device| open_capture_stream(&device, capture_config));
    let (_stream, mut consumer) = match opened {
        Ok(ok) => ok,
        Err(e) => {
            error!("Mikrofon konnte nicht geoeffnet werden: {}", e);
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    if ready_tx.send(Ok(())).is_err() {
        return;
    }

    let mut pipeline = build_capture_pipeline(
        &config.constraints,
        config.sample_rate,
        config.echo_referenz.as_ref(),
    );
    let mut assembler = FrameAssembler::new(config.block_size);
    let mut sequence = 0u64;
    let mut temp = vec![0.0f32; config.block_size.max(1) * config.channels.max(1) as usize];

    while running.load(Ordering::Relaxed) {
        let read = consumer.pop_slice(&mut temp);
        if read == 0 {
            std::thread::sleep(Duration::from_millis(5));
            continue;
        }

        let mono = first_channel(&temp[..read], config.channels);
        assembler.push(&mono, |mut block| {
            pipeline.process(&mut block);
            on_frame(AudioFrame {
                samples: block,
                sequence,
            });
            sequence += 1;
        });
    }

    debug!(frames = sequence, "Capture-Thread beendet, cpal-Stream wird gedroppt");
}
