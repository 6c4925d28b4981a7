//! C1: FrequencyRegistry — the user-declared list of singles and ranges, and
//! the authority for lockout/priority/label queries in baseband space.
//!
//! Grounded on `FrequencyManager` (`original_source/apps/frequency_manager.py`):
//! same operations (`load`, `add`, `change`, `set_center`, `locked_out`,
//! `is_priority`/`priority_at`, `is_higher_priority`, `get_label`/`label_for`),
//! reshaped into typed Rust with validation at construction instead of
//! dataclass `__post_init__`.

use crate::error::RegistryError;
use crate::types::{FrequencyEntry, RawFrequencyEntry};

pub struct FrequencyRegistry {
    channel_spacing: i64,
    center_freq: Option<i64>,
    frequencies: Vec<FrequencyEntry>,
    disable_lockout: bool,
    disable_priority: bool,
}

impl FrequencyRegistry {
    pub fn new(channel_spacing: i64, disable_lockout: bool, disable_priority: bool) -> Self {
        Self {
            channel_spacing,
            center_freq: None,
            frequencies: Vec::new(),
            disable_lockout,
            disable_priority,
        }
    }

    pub fn entries(&self) -> &[FrequencyEntry] {
        &self.frequencies
    }

    pub fn channel_spacing(&self) -> i64 {
        self.channel_spacing
    }

    pub fn center_freq(&self) -> Option<i64> {
        self.center_freq
    }

    pub fn lockout_disabled(&self) -> bool {
        self.disable_lockout
    }

    pub fn priority_disabled(&self) -> bool {
        self.disable_priority
    }

    /// Replace the registry contents with freshly loaded entries (e.g. at
    /// startup, or on a "clear lockout" reload). Each entry is marked `saved`.
    pub fn load(&mut self, raw_entries: Vec<RawFrequencyEntry>) -> Result<(), RegistryError> {
        self.frequencies.clear();
        for raw in raw_entries {
            self.add_entry(FrequencyEntry::from_raw(raw, true)?)?;
        }
        Ok(())
    }

    /// Append a runtime addition (e.g. from the UI), rejecting duplicates.
    /// Always marks the entry unsaved.
    pub fn add(&mut self, raw: RawFrequencyEntry) -> Result<(), RegistryError> {
        let entry = FrequencyEntry::from_raw(raw, false)?;
        self.add_entry(entry)
    }

    fn add_entry(&mut self, mut entry: FrequencyEntry) -> Result<(), RegistryError> {
        if self.frequencies.iter().any(|existing| existing == &entry) {
            return Err(RegistryError::DuplicateEntry);
        }
        if let Some(center) = self.center_freq {
            entry.calculate_baseband(center, self.channel_spacing);
        }
        self.frequencies.push(entry);
        Ok(())
    }

    /// Locate an entry equal to `raw` (by identifying fields) and overwrite
    /// its mutable fields (`label`, `priority`, `locked`) with `raw`'s.
    /// With `mode_add`, falls back to adding `raw` as a new entry instead of
    /// failing when no match is found.
    pub fn change(&mut self, raw: RawFrequencyEntry, mode_add: bool) -> Result<(), RegistryError> {
        let candidate = FrequencyEntry::from_raw(raw.clone(), false)?;

        if let Some(existing) = self.frequencies.iter_mut().find(|e| **e == candidate) {
            existing.label = candidate.label;
            existing.priority = candidate.priority;
            existing.locked = candidate.locked;
            if let Some(center) = self.center_freq {
                existing.calculate_baseband(center, self.channel_spacing);
            }
            return Ok(());
        }

        if mode_add {
            return self.add_entry(candidate);
        }

        Err(RegistryError::NotFound)
    }

    /// Auto-priority promotion/demotion (§4.6): mutate only the `priority`
    /// field of a matching single entry, or add a synthetic priority-only
    /// single when none exists. Unlike `change`, this never touches
    /// `label`/`locked` on an existing entry — the auto-priority feedback
    /// loop's only permitted effect on the registry is inserting or
    /// removing a synthetic priority.
    pub fn set_auto_priority(&mut self, rf_mhz: f64, priority: Option<u32>) -> Result<(), RegistryError> {
        if let Some(existing) = self.frequencies.iter_mut().find(|e| e.single == Some(rf_mhz)) {
            existing.priority = priority;
            return Ok(());
        }

        if let Some(priority) = priority {
            let mut raw = RawFrequencyEntry::single(rf_mhz);
            raw.priority = Some(priority as i64);
            self.add(raw)?;
        }
        Ok(())
    }

    /// Recompute every entry's baseband fields for a new hardware center
    /// frequency: `bb = round((rf_hz - center)/spacing) * spacing`.
    pub fn set_center(&mut self, center_hz: i64) {
        self.center_freq = Some(center_hz);
        for entry in &mut self.frequencies {
            entry.calculate_baseband(center_hz, self.channel_spacing);
        }
    }

    pub fn locked_out(&self, bb: i64) -> bool {
        if self.disable_lockout {
            return false;
        }
        self.frequencies.iter().any(|e| e.locks_out(bb))
    }

    /// A matching single always wins over a matching range, even if the
    /// range's priority number is smaller. Among covering ranges, the
    /// smallest priority number wins.
    pub fn priority_at(&self, bb: i64) -> Option<u32> {
        let mut lowest: Option<u32> = None;
        for entry in &self.frequencies {
            if let Some(priority) = entry.get_priority_at(bb) {
                if entry.is_single() {
                    return Some(priority);
                }
                if lowest.map_or(true, |l| priority < l) {
                    lowest = Some(priority);
                }
            }
        }
        lowest
    }

    /// Always true when `demod_bb == 0` (idle slot). False when priority is
    /// disabled. Otherwise "has-priority beats has-none", "smaller wins",
    /// ties are false.
    pub fn is_higher_priority(&self, channel_bb: i64, demod_bb: i64) -> bool {
        if demod_bb == 0 {
            return true;
        }
        if self.disable_priority {
            return false;
        }

        let Some(channel_priority) = self.priority_at(channel_bb) else {
            return false;
        };

        match self.priority_at(demod_bb) {
            None => true,
            Some(demod_priority) => channel_priority < demod_priority,
        }
    }

    /// The single-match label wins; otherwise the label of the containing
    /// range (last match wins among overlapping ranges).
    pub fn label_for(&self, rf_mhz: f64) -> Option<String> {
        let mut range_label = None;
        for entry in &self.frequencies {
            if entry.is_single() {
                if entry.single == Some(rf_mhz) {
                    return entry.label.clone();
                }
            } else if let (Some(lo), Some(hi)) = (entry.lo, entry.hi) {
                if lo <= rf_mhz && rf_mhz <= hi {
                    range_label = entry.label.clone();
                }
            }
        }
        range_label
    }
}
