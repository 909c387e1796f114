//! Capture-Pipeline
//!
//! Verkettet die DSP-Prozessoren, die zu den angeforderten
//! `CaptureConstraints` passen, und wendet sie auf jeden Frame an.

use tracing::{debug, warn};

use crate::dsp::agc::{Agc, AgcConfig};
use crate::dsp::echo_cancel::{EchoCancelConfig, EchoCanceller, EchoReferenz};
use crate::dsp::noise_suppression::{NoiseSuppressor, SuppressionLevel};
use crate::dsp::AudioProcessor;
use crate::recorder::CaptureConstraints;

/// Kette von `AudioProcessor`-Implementierungen
pub struct AudioPipeline {
    processors: Vec<Box<dyn AudioProcessor>>,
}

impl AudioPipeline {
    pub fn new(processors: Vec<Box<dyn AudioProcessor>>) -> Self {
        Self { processors }
    }

    /// Leere Pipeline ohne Prozessoren
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Wendet alle Prozessoren in Reihenfolge in-place an
    pub fn process(&mut self, samples: &mut [f32]) {
        for processor in self.processors.iter_mut() {
            processor.process(samples);
        }
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Namen der Prozessoren in Reihenfolge
    pub fn names(&self) -> Vec<&'static str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    pub fn reset_all(&mut self) {
        for p in self.processors.iter_mut() {
            p.reset();
        }
    }
}

/// Baut die Pipeline fuer die gegebenen Constraints.
///
/// Reihenfolge: EchoCancellation -> NoiseSuppression -> AGC. Ohne
/// `EchoReferenz` fehlt das Lautsprechersignal; der Wunsch wird dann nur
/// gemeldet.
pub fn build_capture_pipeline(
    constraints: &CaptureConstraints,
    sample_rate: u32,
    echo_referenz: Option<&EchoReferenz>,
) -> AudioPipeline {
    let mut processors: Vec<Box<dyn AudioProcessor>> = Vec::new();

    if constraints.echo_cancellation {
        match echo_referenz {
            Some(referenz) => processors.push(Box::new(EchoCanceller::mit_referenz(
                EchoCancelConfig::fuer_rate(sample_rate),
                referenz.abonnieren(sample_rate),
            ))),
            None => warn!("Echo-Cancellation angefordert, aber keine Lautsprecher-Referenz vorhanden"),
        }
    }
    if constraints.noise_suppression {
        processors.push(Box::new(NoiseSuppressor::new(SuppressionLevel::Medium)));
    }
    if constraints.auto_gain_control {
        processors.push(Box::new(Agc::new(AgcConfig::speech(sample_rate))));
    }
    let pipeline = AudioPipeline::new(processors);
    debug!(prozessoren = ?pipeline.names(), "Capture-Pipeline gebaut");
    pipeline
}
