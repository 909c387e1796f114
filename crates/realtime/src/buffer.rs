//! Puffer fuer Frames, die vor dem Oeffnen des Data-Channels anfallen

use std::collections::VecDeque;

/// Begrenzter FIFO-Puffer, der bei Ueberlauf das aelteste Element verwirft.
///
/// Kapazitaet 0 puffert nichts.
#[derive(Debug)]
pub struct FramePuffer<T> {
    kapazitaet: usize,
    frames: VecDeque<T>,
    verworfen: u64,
}

impl<T> FramePuffer<T> {
    pub fn new(kapazitaet: usize) -> Self {
        Self {
            kapazitaet,
            frames: VecDeque::with_capacity(kapazitaet),
            verworfen: 0,
        }
    }

    /// Legt ein Element ab; gibt das verdraengte Element zurueck
    pub fn push(&mut self, frame: T) -> Option<T> {
        if self.kapazitaet == 0 {
            self.verworfen += 1;
            return Some(frame);
        }
        let verdraengt = if self.frames.len() == self.kapazitaet {
            self.verworfen += 1;
            self.frames.pop_front()
        } else {
            None
        };
        self.frames.push_back(frame);
        verdraengt
    }

    /// Entnimmt alle Elemente in Ablagereihenfolge
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.frames.drain(..)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Anzahl bisher verworfener Elemente
    pub fn verworfen(&self) -> u64 {
        self.verworfen
    }
}
