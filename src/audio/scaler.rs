use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::{Tuner, TunerStatus};
use crate::packet::PacketQueue;

/// PI-controller gains and bounds. Grounded on the `KP`/`KI`/`MAX_INTEGRAL`
/// constants of `input/stream.rs::read_samples`, rescaled for this
/// Scaler's per-tick cadence (the teacher recomputes its correction once
/// per output frame; this Scaler's `update()` runs once per server tick,
/// so reaching the same cumulative correction over the "500 ticks" window
/// of spec scenario 3 needs a wider per-update gain and clamp).
const KP: f64 = 0.01;
const KI: f64 = 0.0005;
const MAX_INTEGRAL: f64 = 200.0;
const RATIO_MIN: f64 = 0.9;
const RATIO_MAX: f64 = 1.1;
const MAX_RATIO_STEP_PER_TICK: f64 = 0.002;

/// Observes one session's audio [`PacketQueue`] fill level as a proxy for
/// sender/receiver clock drift and drives every attached
/// [`Resampler`](super::Resampler) to a common ratio (spec §4.9).
pub struct Scaler {
    queue: Rc<RefCell<PacketQueue>>,
    setpoint: f64,
    integral: f64,
    ratio: f64,
    resamplers: Vec<Rc<Cell<f64>>>,
    saturated_ticks: u64,
    saturation_tolerance_ticks: u64,
}

impl Scaler {
    /// `setpoint` is the target queue fill level in packets (typically the
    /// same latency the session's Delayer was configured with).
    pub fn new(queue: Rc<RefCell<PacketQueue>>, setpoint: f64, saturation_tolerance_ticks: u64) -> Self {
        Self {
            queue,
            setpoint,
            integral: 0.0,
            ratio: 1.0,
            resamplers: Vec::new(),
            saturated_ticks: 0,
            saturation_tolerance_ticks,
        }
    }

    /// Registers a Resampler to receive this Scaler's ratio. Spec §4.10:
    /// "registered with the Scaler" at Session construction time.
    pub fn add_resampler(&mut self, ratio_cell: Rc<Cell<f64>>) {
        ratio_cell.set(self.ratio);
        self.resamplers.push(ratio_cell);
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }
}

impl Tuner for Scaler {
    fn update(&mut self) -> TunerStatus {
        let fill = self.queue.borrow().len() as f64;
        let error = fill - self.setpoint;
        self.integral = (self.integral + error).clamp(-MAX_INTEGRAL, MAX_INTEGRAL);

        let correction = KP * error + KI * self.integral;
        let target_ratio = (1.0 - correction).clamp(RATIO_MIN, RATIO_MAX);

        let step = (target_ratio - self.ratio).clamp(-MAX_RATIO_STEP_PER_TICK, MAX_RATIO_STEP_PER_TICK);
        self.ratio += step;
        self.ratio = self.ratio.clamp(RATIO_MIN, RATIO_MAX);

        if self.ratio <= RATIO_MIN || self.ratio >= RATIO_MAX {
            self.saturated_ticks += 1;
        } else {
            self.saturated_ticks = 0;
        }

        for resampler in &self.resamplers {
            resampler.set(self.ratio);
        }

        if self.saturated_ticks > self.saturation_tolerance_ticks {
            log::debug!("scaler: ratio saturated for {} ticks, aborting session", self.saturated_ticks);
            TunerStatus::Broken
        } else {
            TunerStatus::Alive
        }
    }
}
