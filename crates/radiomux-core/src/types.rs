//! Shared data types: frequency entries, runtime channels, and demodulator events.

use crate::error::FrequencyError;

/// A user-facing mutation request, as it arrives from config load, the CLI, or
/// the UI. Identifying fields (`single` or `lo`/`hi`) select which entry an
/// operation targets; `label`/`priority`/`locked` carry the values to apply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFrequencyEntry {
    pub single: Option<f64>,
    pub lo: Option<f64>,
    pub hi: Option<f64>,
    pub label: Option<String>,
    pub locked: bool,
    pub priority: Option<i64>,
}

impl RawFrequencyEntry {
    pub fn single(rf_mhz: f64) -> Self {
        Self { single: Some(rf_mhz), ..Default::default() }
    }

    pub fn range(lo_mhz: f64, hi_mhz: f64) -> Self {
        Self { lo: Some(lo_mhz), hi: Some(hi_mhz), ..Default::default() }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }
}

/// A single frequency or frequency range the user cares about, with derived
/// baseband fields recomputed on every `set_center`.
#[derive(Debug, Clone)]
pub struct FrequencyEntry {
    pub single: Option<f64>,
    pub lo: Option<f64>,
    pub hi: Option<f64>,
    pub label: Option<String>,
    pub locked: bool,
    pub priority: Option<u32>,
    /// True for entries that came from the configuration file; false for
    /// ones added at runtime (e.g. through a lockout or auto-priority action).
    pub saved: bool,

    bb_single: Option<i64>,
    bb_lo: Option<i64>,
    bb_hi: Option<i64>,
}

impl FrequencyEntry {
    pub(crate) fn from_raw(raw: RawFrequencyEntry, saved: bool) -> Result<Self, FrequencyError> {
        let has_single = raw.single.is_some();
        let has_lo = raw.lo.is_some();
        let has_hi = raw.hi.is_some();

        if !has_single && !has_lo && !has_hi {
            return Err(FrequencyError::AmbiguousSpecification);
        }
        if has_single && (has_lo || has_hi) {
            return Err(FrequencyError::AmbiguousSpecification);
        }
        if has_lo != has_hi {
            return Err(FrequencyError::AmbiguousSpecification);
        }

        if let Some(single) = raw.single {
            if single < 0.0 {
                return Err(FrequencyError::NegativeFrequency(single));
            }
        }
        if let (Some(lo), Some(hi)) = (raw.lo, raw.hi) {
            if lo < 0.0 {
                return Err(FrequencyError::NegativeFrequency(lo));
            }
            if lo >= hi {
                return Err(FrequencyError::InvalidRange { lo, hi });
            }
        }

        let priority = match raw.priority {
            None => None,
            Some(p) if p >= 1 => Some(p as u32),
            Some(p) => return Err(FrequencyError::InvalidPriority(p)),
        };

        Ok(Self {
            single: raw.single,
            lo: raw.lo,
            hi: raw.hi,
            label: raw.label,
            locked: raw.locked,
            priority,
            saved,
            bb_single: None,
            bb_lo: None,
            bb_hi: None,
        })
    }

    pub fn is_single(&self) -> bool {
        self.single.is_some()
    }

    /// `bb = round((rf_hz - center)/spacing) * spacing`
    pub(crate) fn calculate_baseband(&mut self, center_hz: i64, channel_spacing: i64) {
        if let Some(single) = self.single {
            self.bb_single = Some(to_baseband(single, center_hz, channel_spacing));
        } else if let (Some(lo), Some(hi)) = (self.lo, self.hi) {
            self.bb_lo = Some(to_baseband(lo, center_hz, channel_spacing));
            self.bb_hi = Some(to_baseband(hi, center_hz, channel_spacing));
        }
    }

    pub fn bb_single(&self) -> Option<i64> {
        self.bb_single
    }

    pub fn bb_range(&self) -> Option<(i64, i64)> {
        match (self.bb_lo, self.bb_hi) {
            (Some(lo), Some(hi)) => Some((lo, hi)),
            _ => None,
        }
    }

    pub(crate) fn locks_out(&self, bb: i64) -> bool {
        if !self.locked {
            return false;
        }
        self.covers(bb)
    }

    pub(crate) fn covers(&self, bb: i64) -> bool {
        if self.is_single() {
            self.bb_single == Some(bb)
        } else if let Some((lo, hi)) = self.bb_range() {
            lo <= bb && bb <= hi
        } else {
            false
        }
    }

    pub(crate) fn get_priority_at(&self, bb: i64) -> Option<u32> {
        if !self.covers(bb) {
            return None;
        }
        self.priority
    }
}

/// Identifying fields are `single`, or the `(lo, hi)` pair — never label,
/// priority, or lockout. This lets `change()` locate an entry without the
/// caller restating mutable fields.
impl PartialEq for FrequencyEntry {
    fn eq(&self, other: &Self) -> bool {
        match (self.single, other.single) {
            (Some(a), Some(b)) => return a == b,
            _ => {}
        }
        match (self.lo, self.hi, other.lo, other.hi) {
            (Some(a_lo), Some(a_hi), Some(b_lo), Some(b_hi)) => a_lo == b_lo && a_hi == b_hi,
            _ => false,
        }
    }
}

fn to_baseband(rf_mhz: f64, center_hz: i64, channel_spacing: i64) -> i64 {
    let rf_hz = rf_mhz * 1_000_000.0;
    let offset = rf_hz - center_hz as f64;
    round_to_spacing(offset, channel_spacing)
}

pub(crate) fn round_to_spacing(value_hz: f64, channel_spacing: i64) -> i64 {
    if channel_spacing == 0 {
        return value_hz.round() as i64;
    }
    let spacing = channel_spacing as f64;
    ((value_hz / spacing).round() as i64) * channel_spacing
}

/// Runtime view of a single baseband offset, produced once per scan cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub bb: i64,
    /// RF frequency in MHz.
    pub rf: f64,
    pub locked: bool,
    pub active: bool,
    pub hanging: bool,
    pub priority: Option<u32>,
    pub label: Option<String>,
}

/// `bb_to_rf_mhz(bb, center_hz) = (bb + center_hz) / 1e6`
pub fn baseband_to_rf_mhz(bb: i64, center_hz: i64) -> f64 {
    (bb + center_hz) as f64 / 1_000_000.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    On,
    Off,
    Act,
}

impl ChannelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelState::On => "on",
            ChannelState::Off => "off",
            ChannelState::Act => "act",
        }
    }
}

/// Classification of a recorded transmission, returned by the (out of scope)
/// audio classifier: voice, data, or skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Voice,
    Data,
    Skip,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Voice => "V",
            Classification::Data => "D",
            Classification::Skip => "S",
        }
    }
}

/// Event emitted by a demodulator slot and enriched by the activity pipeline
/// before being handed to the logger.
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub state: ChannelState,
    /// RF frequency in MHz.
    pub rf: f64,
    pub bb: i64,
    /// 1-based demodulator slot index.
    pub channel: usize,
    pub file: Option<String>,
    pub classification: Option<Classification>,
    pub detail: Option<String>,
    pub label: Option<String>,
    pub priority: Option<u32>,
}

impl ChannelMessage {
    pub fn new(state: ChannelState, rf: f64, bb: i64, channel: usize) -> Self {
        Self {
            state,
            rf,
            bb,
            channel,
            file: None,
            classification: None,
            detail: None,
            label: None,
            priority: None,
        }
    }
}
