//! C4: the demodulator pool contract — a hardware-agnostic `Receiver` trait
//! plus the per-slot bookkeeping the scheduler needs to assign, track, and
//! release demodulators across scan cycles.
//!
//! Grounded on `Demod`/`DemodState` (`original_source/apps/demodulators/BaseTuner.py`)
//! for the slot state machine, and on the `PhyIo` trait (`src/soapyio.rs`)
//! for the shape of a hardware-abstracting async trait:
//! one `retune` entry point per cycle, one `samples`/`spectrum` pull, `Send
//! + Sync` so it can live behind an `Arc` shared with the tokio scan loop.

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::HardwareError;
use crate::types::{baseband_to_rf_mhz, ChannelMessage, ChannelState};

/// Hardware-facing contract a concrete backend (file playback, SoapySDR)
/// implements. One instance drives the whole pool; demodulator slots are a
/// scheduling concept layered on top, not separate receiver instances.
#[async_trait]
pub trait Receiver: Send + Sync {
    /// Retune to a new hardware center frequency, in Hz.
    async fn retune(&self, center_freq_hz: i64) -> Result<(), HardwareError>;

    /// Pull one FFT magnitude spectrum for channel estimation.
    async fn spectrum(&self) -> Result<Vec<f32>, HardwareError>;

    /// Sample rate, in Hz, this receiver was configured with.
    fn sample_rate_hz(&self) -> i64;
}

/// One entry in the fixed-size demodulator pool. `bb == 0` means idle.
///
/// `last_heard` and `time_stamp` are real clock readings (not scan-cycle
/// counters): hang-time and max-recording are wall-clock deadlines per §4.5,
/// compared against the same monotonic clock the scheduler reads each cycle.
#[derive(Debug)]
pub struct DemodSlot {
    index: usize,
    bb: i64,
    state: ChannelState,
    last_heard: Instant,
    time_stamp: Instant,
    file: Option<String>,
}

impl DemodSlot {
    fn new(index: usize, now: Instant) -> Self {
        Self { index, bb: 0, state: ChannelState::Off, last_heard: now, time_stamp: now, file: None }
    }

    pub fn is_idle(&self) -> bool {
        self.bb == 0
    }

    pub fn bb(&self) -> i64 {
        self.bb
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// 1-based slot index, matching [`ChannelMessage::channel`].
    pub fn channel_number(&self) -> usize {
        self.index + 1
    }

    pub fn last_heard(&self) -> Instant {
        self.last_heard
    }

    pub fn time_stamp(&self) -> Instant {
        self.time_stamp
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    /// Refresh the hang-time deadline for a slot that is still being heard.
    pub fn set_last_heard(&mut self, now: Instant) {
        self.last_heard = now;
    }

    /// C4's `set_center_freq(bb, rf_center)`: emits an `off` event for the
    /// slot's previous assignment (if any), retunes, stamps `time_stamp` and
    /// `last_heard`, and emits an `on` event for the new assignment (if
    /// non-idle). Returns the events to hand to the activity pipeline, in
    /// emission order.
    fn set_center_freq(&mut self, new_bb: i64, rf_center_hz: i64, now: Instant) -> Vec<ChannelMessage> {
        let mut events = Vec::with_capacity(2);

        if !self.is_idle() {
            let rf = baseband_to_rf_mhz(self.bb, rf_center_hz);
            let mut off = ChannelMessage::new(ChannelState::Off, rf, self.bb, self.channel_number());
            off.file = self.file.take();
            events.push(off);
        }

        self.bb = new_bb;
        self.time_stamp = now;
        self.last_heard = now;

        if new_bb == 0 {
            self.state = ChannelState::Off;
        } else {
            self.state = ChannelState::On;
            let rf = baseband_to_rf_mhz(new_bb, rf_center_hz);
            events.push(ChannelMessage::new(ChannelState::On, rf, new_bb, self.channel_number()));
        }

        events
    }
}

/// Fixed-size collection of demodulator slots, indexed 0..N-1 internally;
/// `channel` in [`crate::types::ChannelMessage`] is the 1-based slot number.
pub struct DemodulatorPool {
    slots: Vec<DemodSlot>,
}

impl DemodulatorPool {
    pub fn new(count: usize) -> Self {
        assert!(count > 0, "demodulator pool requires at least one slot");
        let now = Instant::now();
        Self { slots: (0..count).map(|i| DemodSlot::new(i, now)).collect() }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[DemodSlot] {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut [DemodSlot] {
        &mut self.slots
    }

    pub fn find_by_bb(&self, bb: i64) -> Option<&DemodSlot> {
        self.slots.iter().find(|s| s.bb == bb)
    }

    pub fn find_idle(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.is_idle())
    }

    /// Retune slot `idx` to `new_bb`, returning the `off`/`on` events its
    /// state transition produces (see [`DemodSlot::set_center_freq`]).
    pub fn tune(&mut self, idx: usize, new_bb: i64, rf_center_hz: i64, now: Instant) -> Vec<ChannelMessage> {
        self.slots[idx].set_center_freq(new_bb, rf_center_hz, now)
    }
}
