//! Echo Cancellation (AEC) - vereinfachte Implementierung
//!
//! Die Wiedergabe speist das dekodierte Remote-Audio in eine
//! `EchoReferenz`. Jeder `EchoCanceller` abonniert sie mit seiner eigenen
//! Sample-Rate und zieht pro Frame genau so viele Referenz-Samples, wie das
//! Mikrofon liefert. Subtrahiert wird eine verzoegerte, skalierte Kopie.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::AudioProcessor;

/// Lautsprecher-Signal, das die Capture-Seite als Echo-Referenz nutzt.
///
/// Klone teilen denselben Zustand. Die Wiedergabe schreibt, Canceller lesen.
#[derive(Clone, Default)]
pub struct EchoReferenz {
    abos: Arc<Mutex<Vec<Weak<Mutex<AboPuffer>>>>>,
}

struct AboPuffer {
    rate: u32,
    samples: VecDeque<f32>,
    kapazitaet: usize,
    /// Nachkommaanteil der Resampling-Position
    phase: f64,
}

/// Lesende Seite einer `EchoReferenz` mit fester Sample-Rate
pub struct EchoAbo {
    puffer: Arc<Mutex<AboPuffer>>,
}

impl EchoReferenz {
    pub fn new() -> Self {
        Self::default()
    }

    /// Neues Abo; gepuffert wird hoechstens eine Sekunde Referenz.
    pub fn abonnieren(&self, sample_rate: u32) -> EchoAbo {
        let puffer = Arc::new(Mutex::new(AboPuffer {
            rate: sample_rate.max(1),
            samples: VecDeque::new(),
            kapazitaet: sample_rate.max(1) as usize,
            phase: 0.0,
        }));
        self.abos.lock().push(Arc::downgrade(&puffer));
        EchoAbo { puffer }
    }

    /// Anzahl lebender Abos
    pub fn abonnenten(&self) -> usize {
        let mut abos = self.abos.lock();
        abos.retain(|a| a.strong_count() > 0);
        abos.len()
    }

    /// Speist abgespielte Samples (bei `quell_rate`) in alle Abos ein.
    pub fn einspeisen(&self, samples: &[f32], quell_rate: u32) {
        if samples.is_empty() || quell_rate == 0 {
            return;
        }
        let mut abos = self.abos.lock();
        abos.retain(|weak| match weak.upgrade() {
            Some(puffer) => {
                puffer.lock().schreiben(samples, quell_rate);
                true
            }
            None => false,
        });
    }
}

impl fmt::Debug for EchoReferenz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EchoReferenz")
            .field("abonnenten", &self.abos.lock().len())
            .finish()
    }
}

impl AboPuffer {
    /// Lineare Interpolation auf die Abo-Rate
    fn schreiben(&mut self, samples: &[f32], quell_rate: u32) {
        let schritt = quell_rate as f64 / self.rate as f64;
        let mut pos = self.phase;
        while pos < samples.len() as f64 {
            let i = pos as usize;
            let frac = (pos - i as f64) as f32;
            let a = samples[i];
            let b = samples.get(i + 1).copied().unwrap_or(a);
            self.samples.push_back(a + (b - a) * frac);
            pos += schritt;
        }
        self.phase = pos - samples.len() as f64;

        let ueberschuss = self.samples.len().saturating_sub(self.kapazitaet);
        self.samples.drain(..ueberschuss);
    }
}

impl EchoAbo {
    /// Entnimmt genau `out.len()` Samples; fehlende werden mit Stille gefuellt.
    pub fn entnehmen(&self, out: &mut [f32]) {
        let mut puffer = self.puffer.lock();
        for slot in out.iter_mut() {
            *slot = puffer.samples.pop_front().unwrap_or(0.0);
        }
    }

    pub fn gepuffert(&self) -> usize {
        self.puffer.lock().samples.len()
    }
}

/// Konfiguration fuer Echo Cancellation
#[derive(Debug, Clone)]
pub struct EchoCancelConfig {
    /// Maximale Echo-Verzoegerung in Samples die beruecksichtigt wird
    pub max_delay_samples: usize,
    /// Verstaerkungsfaktor fuer Echo-Subtraktion (0.0..1.0)
    pub cancellation_strength: f32,
}

impl EchoCancelConfig {
    /// 100ms maximale Verzoegerung bei der gegebenen Rate
    pub fn fuer_rate(sample_rate: u32) -> Self {
        Self {
            max_delay_samples: (sample_rate / 10).max(1) as usize,
            cancellation_strength: 0.7,
        }
    }
}

impl Default for EchoCancelConfig {
    fn default() -> Self {
        Self::fuer_rate(24000)
    }
}

/// Vereinfachter Echo Canceller
pub struct EchoCanceller {
    config: EchoCancelConfig,
    /// Ring-Buffer fuer das Referenzsignal (Lautsprecher-Output)
    reference_buffer: Vec<f32>,
    write_pos: usize,
    /// Geschaetzte Echo-Verzoegerung in Samples
    estimated_delay: usize,
    quelle: Option<EchoAbo>,
    scratch: Vec<f32>,
}

impl EchoCanceller {
    pub fn new(config: EchoCancelConfig) -> Self {
        Self {
            reference_buffer: vec![0.0; config.max_delay_samples.max(1)],
            write_pos: 0,
            estimated_delay: 0,
            config,
            quelle: None,
            scratch: Vec::new(),
        }
    }

    /// Canceller, der sich pro Frame selbst aus dem Abo versorgt
    pub fn mit_referenz(config: EchoCancelConfig, quelle: EchoAbo) -> Self {
        Self {
            quelle: Some(quelle),
            ..Self::new(config)
        }
    }

    /// Fuegt Referenz-Samples (Lautsprecher) in den Buffer ein.
    pub fn feed_reference(&mut self, samples: &[f32]) {
        for &s in samples {
            self.reference_buffer[self.write_pos] = s;
            self.write_pos = (self.write_pos + 1) % self.reference_buffer.len();
        }
    }

    /// Referenzsample `offset` Schritte vor dem zuletzt geschriebenen (1 = juengstes)
    fn reference_sample(&self, offset: usize) -> f32 {
        let len = self.reference_buffer.len();
        if offset == 0 || offset > len {
            return 0.0;
        }
        self.reference_buffer[(self.write_pos + len - offset) % len]
    }

    /// Setzt die geschaetzte Echo-Verzoegerung manuell
    pub fn set_delay(&mut self, delay_samples: usize) {
        self.estimated_delay = delay_samples.min(self.config.max_delay_samples.saturating_sub(1));
    }

    fn ensure_capacity(&mut self, frame_len: usize) {
        let benoetigt = self.config.max_delay_samples + frame_len;
        if self.reference_buffer.len() < benoetigt {
            // Inhalt in zeitlicher Reihenfolge umkopieren
            let mut neu = Vec::with_capacity(benoetigt);
            neu.extend_from_slice(&self.reference_buffer[self.write_pos..]);
            neu.extend_from_slice(&self.reference_buffer[..self.write_pos]);
            self.write_pos = neu.len() % benoetigt;
            neu.resize(benoetigt, 0.0);
            self.reference_buffer = neu;
        }
    }
}

impl AudioProcessor for EchoCanceller {
    fn process(&mut self, samples: &mut [f32]) {
        let n = samples.len();
        self.ensure_capacity(n);

        if let Some(quelle) = &self.quelle {
            self.scratch.resize(n, 0.0);
            quelle.entnehmen(&mut self.scratch);
            let frame = std::mem::take(&mut self.scratch);
            self.feed_reference(&frame);
            self.scratch = frame;
        }

        for (i, sample) in samples.iter_mut().enumerate() {
            // zeitgleich abgespieltes Referenzsample, um die Verzoegerung versetzt
            let echo_estimate = self.reference_sample(n - i + self.estimated_delay);
            *sample -= echo_estimate * self.config.cancellation_strength;
        }
    }

    fn reset(&mut self) {
        self.reference_buffer.fill(0.0);
        self.write_pos = 0;
    }

    fn name(&self) -> &'static str {
        "echo_cancellation"
    }
}
