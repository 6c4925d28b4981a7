//! C7: UIProjection — a read-only snapshot of scheduler + registry state,
//! shaped for a terminal or web front end to render without touching
//! internal locks directly.
//!
//! Grounded on the `channels`/`frequencies`/`step`/`steps` attributes the
//! teacher's and the original `Scanner` both expose to their front ends
//! (`original_source/apps/scanner.py`, fields `channels`, `frequencies`,
//! `step`, `steps`), collapsed into one snapshot struct instead of several
//! loose attributes. The lockout view mirrors `LockoutManager.__str__`
//! (`original_source/apps/lockout_manager.py`), which renders each locked
//! frequency alongside whether it currently has a demodulator on it.

use crate::registry::FrequencyRegistry;
use crate::types::Channel;

/// One locked-out entry, annotated with whether it currently overlaps an
/// active or hanging channel.
#[derive(Debug, Clone)]
pub struct LockoutEntry {
    pub label: Option<String>,
    pub single: Option<f64>,
    pub lo: Option<f64>,
    pub hi: Option<f64>,
    pub has_current_activity: bool,
}

/// Everything a front end needs to render one refresh: the current channel
/// sweep, the hardware center frequency, where the frequency provider is in
/// its step sequence, and the lockout list.
#[derive(Debug, Clone)]
pub struct UiSnapshot {
    pub center_freq_hz: i64,
    pub channels: Vec<Channel>,
    pub step: usize,
    pub steps: Vec<i64>,
    pub lockout_disabled: bool,
    pub priority_disabled: bool,
    pub lockout_entries: Vec<LockoutEntry>,
}

impl UiSnapshot {
    /// Build a snapshot from a scan cycle's channel list and the registry it
    /// was enriched against.
    pub fn new(
        center_freq_hz: i64,
        channels: Vec<Channel>,
        step: usize,
        steps: Vec<i64>,
        registry: &FrequencyRegistry,
    ) -> Self {
        let lockout_entries = registry
            .entries()
            .iter()
            .filter(|entry| entry.locked)
            .map(|entry| LockoutEntry {
                label: entry.label.clone(),
                single: entry.single,
                lo: entry.lo,
                hi: entry.hi,
                has_current_activity: channels
                    .iter()
                    .any(|c| (c.active || c.hanging) && entry_covers(entry, c.bb)),
            })
            .collect();

        Self {
            center_freq_hz,
            channels,
            step,
            steps,
            lockout_disabled: registry.lockout_disabled(),
            priority_disabled: registry.priority_disabled(),
            lockout_entries,
        }
    }

    pub fn active_count(&self) -> usize {
        self.channels.iter().filter(|c| c.active).count()
    }

    pub fn hanging_count(&self) -> usize {
        self.channels.iter().filter(|c| c.hanging).count()
    }

    /// Channels actively or recently demodulated, in display order (priority
    /// channels already sorted to the front by the scheduler).
    pub fn displayed(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter().filter(|c| c.active || c.hanging)
    }
}

fn entry_covers(entry: &crate::types::FrequencyEntry, bb: i64) -> bool {
    entry.bb_single() == Some(bb) || entry.bb_range().is_some_and(|(lo, hi)| lo <= bb && bb <= hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawFrequencyEntry;

    fn channel(bb: i64, active: bool, hanging: bool) -> Channel {
        Channel { bb, rf: 146.0, locked: false, active, hanging, priority: None, label: None }
    }

    #[test]
    fn active_and_hanging_counts_are_independent() {
        let registry = FrequencyRegistry::new(5_000, false, false);
        let snap = UiSnapshot::new(
            146_000_000,
            vec![channel(1, true, false), channel(2, false, true), channel(3, false, false)],
            0,
            vec![146_000_000],
            &registry,
        );
        assert_eq!(snap.active_count(), 1);
        assert_eq!(snap.hanging_count(), 1);
        assert_eq!(snap.displayed().count(), 2);
    }

    #[test]
    fn lockout_entries_flag_current_activity() {
        let mut registry = FrequencyRegistry::new(5_000, false, false);
        registry.add(RawFrequencyEntry::single(146.125).with_locked(true).with_label("busy")).unwrap();
        registry.add(RawFrequencyEntry::single(146.200).with_locked(true).with_label("quiet")).unwrap();
        registry.set_center(146_000_000);

        let channels = vec![channel(125_000, true, false)];
        let snap = UiSnapshot::new(146_000_000, channels, 0, vec![146_000_000], &registry);

        assert_eq!(snap.lockout_entries.len(), 2);
        let busy = snap.lockout_entries.iter().find(|e| e.label.as_deref() == Some("busy")).unwrap();
        let quiet = snap.lockout_entries.iter().find(|e| e.label.as_deref() == Some("quiet")).unwrap();
        assert!(busy.has_current_activity);
        assert!(!quiet.has_current_activity);
    }
}
