//! DSP-Module fuer die Mikrofon-Aufbereitung
//!
//! Ersetzen die Verarbeitungs-Constraints, die ein Browser bei
//! `getUserMedia` anbietet: Echo-Unterdrueckung, Rauschunterdrueckung und
//! automatische Verstaerkungsregelung.

pub mod agc;
pub mod echo_cancel;
pub mod noise_suppression;

/// Gemeinsames Trait fuer alle Audio-Prozessoren
///
/// Prozessoren arbeiten in-place und laufen im Capture-Thread.
pub trait AudioProcessor: Send {
    /// Verarbeitet einen Puffer von Samples in-place
    fn process(&mut self, samples: &mut [f32]);

    /// Setzt den internen Zustand zurueck (z.B. Gain-Historie)
    fn reset(&mut self);

    /// Kurzname fuer Logs
    fn name(&self) -> &'static str;
}
