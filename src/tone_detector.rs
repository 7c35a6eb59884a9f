//! Goertzel single-bin tone detector.
//!
//! Computes the squared magnitude of one DFT bin per block via the
//! second-order Goertzel recurrence and exposes a hysteretic
//! activated/deactivated edge so callers don't have to debounce a noisy
//! detection value themselves.

use crate::reactor::Signal;

/// How incoming 16-bit PCM-ish samples are mapped onto the detector's
/// internal `f64` sample domain.
///
/// One option shifts 16-bit samples down by 8 bits before feeding the
/// Goertzel recurrence, trading headroom for running the filter at 8-bit
/// effective resolution. Both variants are kept so a caller can opt into
/// full precision when they don't need that headroom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputScaling {
    /// Samples are taken as-is: full `i16` range feeds the recurrence.
    SignedPcm16Full,
    /// Samples are shifted right by 8 bits before feeding the recurrence,
    /// trading dynamic range for headroom.
    SignedPcm16Shifted,
}

impl InputScaling {
    fn scale(self, sample: i16) -> f64 {
        match self {
            InputScaling::SignedPcm16Full => sample as f64,
            InputScaling::SignedPcm16Shifted => (sample >> 8) as f64,
        }
    }
}

/// Single-bin Goertzel tone detector.
///
/// `activated` fires exactly once on each idle→active or active→idle edge;
/// `value_changed` fires once per processed block with the raw magnitude
/// squared, regardless of whether the edge changed.
pub struct ToneDetector {
    tone_hz: f64,
    sample_rate: u32,
    block_size: usize,
    threshold: f64,
    release_blocks: u32,
    scaling: InputScaling,

    coeff: f64,
    q1: f64,
    q2: f64,
    block_pos: usize,

    active: bool,
    blocks_below_threshold: u32,

    activated: Signal<bool>,
    value_changed: Signal<f64>,
}

impl ToneDetector {
    /// `release_blocks` is how many consecutive below-threshold blocks are
    /// required before `activated(false)` fires; it absorbs brief dips
    /// inside an otherwise-present tone.
    pub fn new(
        tone_hz: f64,
        sample_rate: u32,
        block_size: usize,
        threshold: f64,
        release_blocks: u32,
        scaling: InputScaling,
    ) -> Self {
        let k = block_size as f64 * tone_hz / sample_rate as f64;
        let omega = 2.0 * std::f64::consts::PI * k / block_size as f64;
        let coeff = 2.0 * omega.cos();
        Self {
            tone_hz,
            sample_rate,
            block_size,
            threshold,
            release_blocks,
            scaling,
            coeff,
            q1: 0.0,
            q2: 0.0,
            block_pos: 0,
            active: false,
            blocks_below_threshold: 0,
            activated: Signal::new(),
            value_changed: Signal::new(),
        }
    }

    pub fn tone_hz(&self) -> f64 {
        self.tone_hz
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn activated(&self) -> &Signal<bool> {
        &self.activated
    }

    pub fn value_changed(&self) -> &Signal<f64> {
        &self.value_changed
    }

    /// Feed raw PCM samples through the recurrence, completing a block
    /// (and evaluating threshold/hysteresis) every `block_size` samples. A
    /// partial trailing block is retained across calls.
    pub fn process(&mut self, samples: &[i16]) {
        for &raw in samples {
            let x = self.scaling.scale(raw);
            let q0 = self.coeff * self.q1 - self.q2 + x;
            self.q2 = self.q1;
            self.q1 = q0;
            self.block_pos += 1;
            if self.block_pos >= self.block_size {
                self.complete_block();
            }
        }
    }

    fn complete_block(&mut self) {
        let magnitude_sq = self.q1 * self.q1 + self.q2 * self.q2 - self.coeff * self.q1 * self.q2;
        self.q1 = 0.0;
        self.q2 = 0.0;
        self.block_pos = 0;

        self.value_changed.emit(magnitude_sq);

        if magnitude_sq >= self.threshold {
            self.blocks_below_threshold = 0;
            if !self.active {
                self.active = true;
                self.activated.emit(true);
            }
        } else {
            if self.active {
                self.blocks_below_threshold += 1;
                if self.blocks_below_threshold >= self.release_blocks {
                    self.active = false;
                    self.blocks_below_threshold = 0;
                    self.activated.emit(false);
                }
            }
        }
    }
}
