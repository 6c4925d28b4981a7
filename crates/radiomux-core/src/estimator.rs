//! C3: ChannelEstimator — turns one FFT magnitude vector into a set of
//! baseband channel offsets.
//!
//! Grounded on `estimate.channel_estimate` + `Scanner._get_raw_channels`
//! (`original_source/apps/scanner.py`): contiguous-run detection above a
//! linear threshold, one peak per run, then quantization to channel spacing
//! in RF-relative space.

use std::collections::BTreeSet;

use crate::types::round_to_spacing;

/// Detect contiguous runs of `spectrum` bins above the linear threshold
/// derived from `threshold_db`, emit the bin index of each run's maximum,
/// map it to a baseband offset, and quantize to `channel_spacing`. `bb == 0`
/// is reserved for an idle demodulator and is dropped from the result.
pub fn estimate_channels(
    spectrum: &[f32],
    threshold_db: f64,
    sample_rate: i64,
    center_freq: i64,
    channel_spacing: i64,
) -> BTreeSet<i64> {
    let len = spectrum.len();
    if len == 0 {
        return BTreeSet::new();
    }

    let threshold = 10f64.powf(threshold_db / 10.0);
    let mut result = BTreeSet::new();
    let mut i = 0;
    while i < len {
        if (spectrum[i] as f64) <= threshold {
            i += 1;
            continue;
        }

        let mut max_idx = i;
        let mut max_val = spectrum[i];
        let mut j = i;
        while j < len && (spectrum[j] as f64) > threshold {
            if spectrum[j] > max_val {
                max_val = spectrum[j];
                max_idx = j;
            }
            j += 1;
        }

        if let Some(bb) = bin_to_channel(max_idx, len, sample_rate, center_freq, channel_spacing) {
            result.insert(bb);
        }

        i = j;
    }

    result
}

fn bin_to_channel(
    bin: usize,
    len: usize,
    sample_rate: i64,
    center_freq: i64,
    channel_spacing: i64,
) -> Option<i64> {
    let bb_raw_hz = (bin as f64 - (len as f64) / 2.0) * (sample_rate as f64) / (len as f64);
    let real = round_to_spacing(bb_raw_hz + center_freq as f64, channel_spacing);
    let bb = real - center_freq;
    if bb == 0 {
        None
    } else {
        Some(bb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: i64 = 4_000_000;
    const CENTER: i64 = 146_000_000;
    const SPACING: i64 = 5_000;
    const LEN: usize = 256;

    fn flat(len: usize) -> Vec<f32> {
        vec![0.0; len]
    }

    #[test]
    fn quiet_spectrum_yields_no_channels() {
        let spectrum = flat(LEN);
        let channels = estimate_channels(&spectrum, 10.0, SAMPLE_RATE, CENTER, SPACING);
        assert!(channels.is_empty());
    }

    #[test]
    fn single_peak_maps_to_expected_baseband() {
        // bin 136 at center 146.0 MHz, spacing 5000, sample_rate 4e6, L=256 sits at
        // bb_raw = (136 - 128) * 4e6/256 = 125000 Hz, already on the channel grid.
        let mut spectrum = flat(LEN);
        spectrum[136] = 100.0;
        let channels = estimate_channels(&spectrum, 10.0, SAMPLE_RATE, CENTER, SPACING);
        assert_eq!(channels.len(), 1);
        let bb = *channels.iter().next().unwrap();
        assert_eq!(bb, 125_000);
    }

    #[test]
    fn contiguous_run_collapses_to_one_peak() {
        let mut spectrum = flat(LEN);
        for bin in 130..140 {
            spectrum[bin] = 50.0;
        }
        spectrum[135] = 200.0; // the run's maximum
        let channels = estimate_channels(&spectrum, 10.0, SAMPLE_RATE, CENTER, SPACING);
        assert_eq!(channels.len(), 1);
    }

    #[test]
    fn center_bin_is_dropped_as_idle_sentinel() {
        let mut spectrum = flat(LEN);
        spectrum[LEN / 2] = 100.0;
        let channels = estimate_channels(&spectrum, 10.0, SAMPLE_RATE, CENTER, SPACING);
        assert!(channels.is_empty());
    }

    #[test]
    fn two_separated_peaks_yield_two_channels() {
        let mut spectrum = flat(LEN);
        spectrum[50] = 100.0;
        spectrum[200] = 100.0;
        let channels = estimate_channels(&spectrum, 10.0, SAMPLE_RATE, CENTER, SPACING);
        assert_eq!(channels.len(), 2);
    }

    #[test]
    fn empty_spectrum_yields_no_channels() {
        let channels = estimate_channels(&[], 10.0, SAMPLE_RATE, CENTER, SPACING);
        assert!(channels.is_empty());
    }
}
