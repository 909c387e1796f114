//! Mikrofon-Capture via cpal
//!
//! Oeffnet einen cpal InputStream und schreibt Samples in einen
//! lock-free Ring-Buffer. Der `FrameAssembler` schneidet den Sample-Strom
//! danach in Bloecke fester Groesse.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use ringbuf::traits::{Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tracing::{debug, error, warn};

use crate::error::{AudioError, AudioResult};

/// Konfiguration fuer den cpal-Eingabestream
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Abtastrate in Hz
    pub sample_rate: u32,
    /// Kanalanzahl (1 = Mono, 2 = Stereo)
    pub channels: u16,
    /// Ring-Buffer Kapazitaet in Samples
    pub buffer_size: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 24000,
            channels: 1,
            buffer_size: 24000 * 2, // 2 Sekunden Puffer
        }
    }
}

/// Produziert Samples aus dem Mikrofon-Callback
pub type CaptureProducer = HeapProd<f32>;
/// Konsumiert Samples fuer die Verarbeitung
pub type CaptureConsumer = HeapCons<f32>;

/// Audio-Capture-Stream
///
/// Haelt den cpal-Stream am Leben. Wird der CaptureStream gedroppt,
/// stoppt die Aufnahme automatisch.
pub struct CaptureStream {
    _stream: Stream,
    config: CaptureConfig,
}

impl CaptureStream {
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }
}

/// Oeffnet einen Capture-Stream auf dem gegebenen Geraet.
///
/// Gibt den Stream und den Ring-Buffer Consumer zurueck.
/// Der Producer laeuft im cpal-Callback-Thread.
pub fn open_capture_stream(
    device: &Device,
    config: CaptureConfig,
) -> AudioResult<(CaptureStream, CaptureConsumer)> {
    let stream_config = StreamConfig {
        channels: config.channels,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let rb = HeapRb::<f32>::new(config.buffer_size);
    let (mut producer, consumer) = rb.split();

    let err_fn = |err| error!("Capture-Fehler: {}", err);

    let supported = device
        .supported_input_configs()
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
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _| push_samples(&mut producer, data),
                err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?,
        SampleFormat::I16 => device
            .build_input_stream(
                &stream_config,
                move |data: &[i16], _| {
                    let floats: Vec<f32> =
                        data.iter().map(|&s| s as f32 / i16::MAX as f32).collect();
                    push_samples(&mut producer, &floats);
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?,
        SampleFormat::U16 => device
            .build_input_stream(
                &stream_config,
                move |data: &[u16], _| {
                    let floats: Vec<f32> = data
                        .iter()
                        .map(|&s| (s as f32 - 32768.0) / 32768.0)
                        .collect();
                    push_samples(&mut producer, &floats);
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
        "Capture-Stream geoeffnet: {}Hz {}ch",
        config.sample_rate, config.channels
    );

    Ok((
        CaptureStream {
            _stream: stream,
            config,
        },
        consumer,
    ))
}

fn push_samples(producer: &mut CaptureProducer, data: &[f32]) {
    let written = producer.push_slice(data);
    if written < data.len() {
        warn!(
            "Capture Ring-Buffer voll, {} Samples verworfen",
            data.len() - written
        );
    }
}

/// Extrahiert Kanal 0 aus interleavten Samples
pub fn first_channel(interleaved: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .iter()
        .step_by(channels as usize)
        .copied()
        .collect()
}

/// Schneidet einen kontinuierlichen Sample-Strom in Bloecke fester Groesse.
///
/// Reste bleiben bis zum naechsten `push` im Puffer; Bloecke werden in
/// Eingangsreihenfolge ausgegeben.
#[derive(Debug)]
pub struct FrameAssembler {
    block_size: usize,
    pending: Vec<f32>,
}

impl FrameAssembler {
    pub fn new(block_size: usize) -> Self {
        let block_size = block_size.max(1);
        Self {
            block_size,
            pending: Vec::with_capacity(block_size * 2),
        }
    }

    /// Nimmt Samples auf und ruft `emit` fuer jeden vollstaendigen Block
    pub fn push(&mut self, samples: &[f32], mut emit: impl FnMut(Vec<f32>)) {
        self.pending.extend_from_slice(samples);
        while self.pending.len() >= self.block_size {
            let block: Vec<f32> = self.pending.drain(..self.block_size).collect();
            emit(block);
        }
    }

    /// Anzahl gepufferter Samples, die noch keinen Block fuellen
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
