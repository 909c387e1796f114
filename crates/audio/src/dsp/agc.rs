//! Automatic Gain Control (AGC)
//!
//! Regelt den Eingangspegel auf einen Zielwert, mit Attack/Release-Glaettung
//! und einem harten Limiter.

use super::AudioProcessor;

/// Konfiguration fuer den AGC
#[derive(Debug, Clone)]
pub struct AgcConfig {
    /// Ziel-Pegel (normalisiert, 0.1 entspricht ca. -20 dBFS)
    pub target_level: f32,
    pub max_gain: f32,
    /// Minimaler Gain (verhindert Aufblasen von Stille)
    pub min_gain: f32,
    /// Glaettung beim Absenken des Gains
    pub attack_coeff: f32,
    /// Glaettung beim Anheben des Gains
    pub release_coeff: f32,
    pub limiter_threshold: f32,
}

impl AgcConfig {
    /// Sprach-Voreinstellung fuer die gegebene Abtastrate
    pub fn speech(sample_rate: u32) -> Self {
        let rate = sample_rate.max(1) as f32;
        Self {
            target_level: 0.1,
            max_gain: 20.0,
            min_gain: 0.1,
            attack_coeff: smoothing(0.01, rate),
            release_coeff: smoothing(0.15, rate),
            limiter_threshold: 0.95,
        }
    }
}

impl Default for AgcConfig {
    fn default() -> Self {
        Self::speech(24000)
    }
}

/// Glaettungskoeffizient pro Sample fuer eine Zeitkonstante
fn smoothing(time_secs: f32, sample_rate: f32) -> f32 {
    if time_secs <= 0.0 {
        return 0.0;
    }
    (-1.0 / (time_secs * sample_rate)).exp()
}

pub struct Agc {
    config: AgcConfig,
    gain: f32,
}

impl Agc {
    pub fn new(config: AgcConfig) -> Self {
        Self { config, gain: 1.0 }
    }

    pub fn current_gain(&self) -> f32 {
        self.gain
    }
}

impl AudioProcessor for Agc {
    fn process(&mut self, samples: &mut [f32]) {
        let cfg = &self.config;
        for sample in samples.iter_mut() {
            let abs = sample.abs();
            let desired = if abs > 1e-6 {
                (cfg.target_level / abs).clamp(cfg.min_gain, cfg.max_gain)
            } else {
                cfg.max_gain
            };

            // schnell runter, langsam hoch
            let coeff = if desired < self.gain {
                cfg.attack_coeff
            } else {
                cfg.release_coeff
            };
            self.gain = coeff * self.gain + (1.0 - coeff) * desired;

            *sample = (*sample * self.gain).clamp(-cfg.limiter_threshold, cfg.limiter_threshold);
        }
    }

    fn reset(&mut self) {
        self.gain = 1.0;
    }

    fn name(&self) -> &'static str {
        "agc"
    }
}
