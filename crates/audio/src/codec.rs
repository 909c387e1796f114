//! Opus Encoder/Decoder fuer den Media-Track der Peer-Verbindung
//!
//! WebRTC verhandelt Opus immer mit 48 kHz Takt. Der Encoder speist den
//! lokalen Mikrofon-Track, der Decoder das Remote-Audio des Providers.

use audiopus::{
    coder::{Decoder, Encoder},
    Application, Bitrate, Channels, SampleRate,
};
use tracing::debug;

use crate::error::{AudioError, AudioResult};

/// Opus-Takt fuer WebRTC
pub const OPUS_SAMPLE_RATE: u32 = 48000;
/// Maximale Opus-Paketdauer (120 ms) in Samples pro Kanal
const MAX_FRAME_SAMPLES: usize = 5760;

/// Encoder-Einstellungen
#[derive(Debug, Clone)]
pub struct OpusConfig {
    pub channels: u16,
    /// Frame-Dauer in Millisekunden (10, 20, 40 oder 60)
    pub frame_ms: u32,
    pub bitrate_kbps: u32,
}

impl Default for OpusConfig {
    fn default() -> Self {
        Self {
            channels: 1,
            frame_ms: 20,
            bitrate_kbps: 32,
        }
    }
}

impl OpusConfig {
    /// Prueft die Einstellungen gegen die Opus-Grenzen
    pub fn validieren(&self) -> AudioResult<()> {
        if !matches!(self.frame_ms, 10 | 20 | 40 | 60) {
            return Err(AudioError::Konfiguration(format!(
                "Ungueltige Opus-Frame-Dauer: {} ms",
                self.frame_ms
            )));
        }
        if !(6..=510).contains(&self.bitrate_kbps) {
            return Err(AudioError::Konfiguration(format!(
                "Opus-Bitrate ausserhalb 6..510 kbit/s: {}",
                self.bitrate_kbps
            )));
        }
        channels_to_audiopus(self.channels)?;
        Ok(())
    }

    /// Samples pro Frame und Kanal
    pub fn frame_size(&self) -> usize {
        (OPUS_SAMPLE_RATE * self.frame_ms / 1000) as usize
    }
}

/// Opus-Encoder: kodiert f32-PCM zu Opus-Paketen
pub struct OpusEncoder {
    encoder: Encoder,
    config: OpusConfig,
}

impl OpusEncoder {
    pub fn new(config: OpusConfig) -> AudioResult<Self> {
        config.validieren()?;

        let mut encoder = Encoder::new(
            SampleRate::Hz48000,
            channels_to_audiopus(config.channels)?,
            Application::Voip,
        )
        .map_err(|e| AudioError::CodecFehler(e.to_string()))?;

        encoder
            .set_bitrate(Bitrate::BitsPerSecond(config.bitrate_kbps as i32 * 1000))
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;

        debug!(
            "OpusEncoder erstellt: {}kbps, {}ms, {}ch",
            config.bitrate_kbps, config.frame_ms, config.channels
        );

        Ok(Self { encoder, config })
    }

    /// Kodiert genau einen Frame (`frame_size() * channels` Samples)
    pub fn encode(&mut self, pcm: &[f32]) -> AudioResult<Vec<u8>> {
        let erwartet = self.config.frame_size() * self.config.channels as usize;
        if pcm.len() != erwartet {
            return Err(AudioError::Konfiguration(format!(
                "PCM-Frame muss {} Samples lang sein, war {}",
                erwartet,
                pcm.len()
            )));
        }

        let mut output = vec![0u8; 4000];
        let written = self
            .encoder
            .encode_float(pcm, &mut output)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;
        output.truncate(written);
        Ok(output)
    }

    pub fn frame_size(&self) -> usize {
        self.config.frame_size()
    }

    pub fn config(&self) -> &OpusConfig {
        &self.config
    }
}

/// Opus-Decoder: dekodiert Opus-Pakete zu f32-PCM (interleaved)
pub struct OpusDecoder {
    decoder: Decoder,
    channels: u16,
}

impl OpusDecoder {
    pub fn new(channels: u16) -> AudioResult<Self> {
        let decoder = Decoder::new(SampleRate::Hz48000, channels_to_audiopus(channels)?)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;
        debug!("OpusDecoder erstellt: {}ch", channels);
        Ok(Self { decoder, channels })
    }

    pub fn decode(&mut self, packet: &[u8]) -> AudioResult<Vec<f32>> {
        let mut output = vec![0.0f32; MAX_FRAME_SAMPLES * self.channels as usize];
        let decoded = self
            .decoder
            .decode_float(Some(packet), &mut output, false)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;
        output.truncate(decoded * self.channels as usize);
        Ok(output)
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

fn channels_to_audiopus(channels: u16) -> AudioResult<Channels> {
    match channels {
        1 => Ok(Channels::Mono),
        2 => Ok(Channels::Stereo),
        n => Err(AudioError::Konfiguration(format!(
            "Opus unterstuetzt nur 1 oder 2 Kanaele, nicht {}",
            n
        ))),
    }
}
