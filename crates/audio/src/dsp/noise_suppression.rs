//! Rauschunterdrueckung (spektrale Subtraktion, Zeitbereich-Naeherung)
//!
//! Der Rauschpegel wird waehrend leiser Frames per exponentieller Glaettung
//! geschaetzt; jeder Frame wird mit `max(floor, 1 - alpha * noise/rms)`
//! skaliert.

use super::AudioProcessor;

/// Stufe der Rauschunterdrueckung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuppressionLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl SuppressionLevel {
    /// Subtraktions-Faktor
    fn alpha(self) -> f32 {
        match self {
            Self::Low => 1.5,
            Self::Medium => 2.5,
            Self::High => 4.0,
        }
    }

    /// Minimaler Gain nach Subtraktion (gegen musical noise)
    fn floor(self) -> f32 {
        match self {
            Self::Low => 0.2,
            Self::Medium => 0.1,
            Self::High => 0.05,
        }
    }
}

pub struct NoiseSuppressor {
    level: SuppressionLevel,
    noise_estimate: f32,
    smoothing: f32,
    /// Frames unterhalb dieses RMS gelten als Rauschen
    silence_threshold: f32,
}

impl NoiseSuppressor {
    pub fn new(level: SuppressionLevel) -> Self {
        Self {
            level,
            noise_estimate: 0.0,
            smoothing: 0.95,
            silence_threshold: 0.02,
        }
    }

    pub fn noise_estimate(&self) -> f32 {
        self.noise_estimate
    }

    fn rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
        (sum_sq / samples.len() as f32).sqrt()
    }
}

impl AudioProcessor for NoiseSuppressor {
    fn process(&mut self, samples: &mut [f32]) {
        let frame_rms = Self::rms(samples);

        if frame_rms < self.silence_threshold {
            self.noise_estimate =
                self.smoothing * self.noise_estimate + (1.0 - self.smoothing) * frame_rms;
        }

        if self.noise_estimate < 1e-7 {
            return;
        }

        let gain = if frame_rms > 1e-7 {
            (1.0 - self.level.alpha() * (self.noise_estimate / frame_rms)).max(self.level.floor())
        } else {
            self.level.floor()
        };

        for sample in samples.iter_mut() {
            *sample *= gain;
        }
    }

    fn reset(&mut self) {
        self.noise_estimate = 0.0;
    }

    fn name(&self) -> &'static str {
        "noise_suppression"
    }
}
