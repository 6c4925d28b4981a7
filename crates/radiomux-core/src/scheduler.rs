//! C5: the Scheduler — the scan-cycle driver tying the estimator, registry,
//! frequency provider, activity pipeline, and demodulator pool together.
//!
//! Grounded on `Scanner.scan_cycle`/`_get_raw_channels`/`_process_current_demodulators`/
//! `_assign_channels_to_demodulators`/`_add_metadata` (`original_source/apps/scanner.py`):
//! same five-step cycle (estimate, enrich, release, assign, publish), same
//! wall-clock `last_heard`/hang-time comparison (via `tokio::time::Instant`
//! so it honors a paused test clock), and the same literal linear-scan
//! assign algorithm — idle slots trivially satisfy `is_higher_priority`, so
//! no separate "prefer idle" branch is needed.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::HardwareError;
use crate::estimator::estimate_channels;
use crate::pipeline::ActivityPipeline;
use crate::receiver::{DemodulatorPool, Receiver};
use crate::registry::FrequencyRegistry;
use crate::types::{baseband_to_rf_mhz, Channel, ChannelMessage};

/// Static scan parameters that don't change across cycles.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub threshold_db: f64,
    pub channel_spacing: i64,
    /// Wall-clock grace period a channel may go quiet before its
    /// demodulator is released.
    pub hang_time: Duration,
    /// Maximum wall-clock time a demodulator may stay assigned to a single
    /// channel before being forcibly released, or `None` for no limit.
    pub max_recording: Option<Duration>,
}

pub struct Scheduler {
    receiver: Arc<dyn Receiver>,
    registry: Arc<Mutex<FrequencyRegistry>>,
    pipeline: Arc<ActivityPipeline>,
    pool: DemodulatorPool,
    config: ScanConfig,
}

impl Scheduler {
    pub fn new(
        receiver: Arc<dyn Receiver>,
        registry: Arc<Mutex<FrequencyRegistry>>,
        pipeline: Arc<ActivityPipeline>,
        demod_count: usize,
        config: ScanConfig,
    ) -> Self {
        Self { receiver, registry, pipeline, pool: DemodulatorPool::new(demod_count), config }
    }

    pub fn pool(&self) -> &DemodulatorPool {
        &self.pool
    }

    /// Run one scan cycle: estimate active baseband channels, enrich them
    /// with registry metadata, release demodulators that should stop, assign
    /// demodulators to channels that need one, and forward every on/off
    /// event produced along the way to the activity pipeline. Returns the
    /// cycle's channel list (for logging/UI).
    pub async fn scan_cycle(&mut self) -> Result<Vec<Channel>, HardwareError> {
        let spectrum = self.receiver.spectrum().await?;
        let sample_rate = self.receiver.sample_rate_hz();
        let now = Instant::now();

        let mut events = Vec::new();
        let channels = {
            let registry = self.registry.lock().await;
            let center_freq = registry.center_freq().unwrap_or(0);
            let raw = estimate_channels(
                &spectrum,
                self.config.threshold_db,
                sample_rate,
                center_freq,
                self.config.channel_spacing,
            );

            let channels = self.add_metadata(&registry, &raw, center_freq);
            self.process_current_demodulators(&registry, &raw, center_freq, now, &mut events);
            self.assign_channels_to_demodulators(&registry, &channels, center_freq, now, &mut events);
            channels
        };

        for event in events {
            self.pipeline.got_channel_activity(event, None).await;
        }

        Ok(channels)
    }

    /// Build the cycle's channel list: active channels from the estimator,
    /// plus any demodulator still assigned but not currently active (hanging
    /// on its tail). Priority channels are sorted to the front.
    fn add_metadata(&self, registry: &FrequencyRegistry, active: &BTreeSet<i64>, center_freq: i64) -> Vec<Channel> {
        let mut all_bbs: Vec<i64> = active.iter().copied().collect();
        for slot in self.pool.slots() {
            if !slot.is_idle() && !active.contains(&slot.bb()) {
                all_bbs.push(slot.bb());
            }
        }

        let mut sweep: Vec<Channel> = Vec::with_capacity(all_bbs.len());
        for bb in all_bbs {
            let rf = baseband_to_rf_mhz(bb, center_freq);
            let priority = registry.priority_at(bb);
            let assigned = self.pool.find_by_bb(bb).is_some();
            let channel = Channel {
                bb,
                rf,
                locked: registry.locked_out(bb),
                active: assigned && active.contains(&bb),
                hanging: assigned && !active.contains(&bb),
                priority,
                label: registry.label_for(rf),
            };
            if priority.is_some() {
                sweep.insert(0, channel);
            } else {
                sweep.push(channel);
            }
        }
        sweep
    }

    /// Release demodulators that got locked out, that have been quiet past
    /// `hang_time`, or (independently) that have run past `max_recording`;
    /// refresh `last_heard` for the rest. Mirrors the branch order in
    /// `_process_current_demodulators`.
    fn process_current_demodulators(
        &mut self,
        registry: &FrequencyRegistry,
        active: &BTreeSet<i64>,
        center_freq: i64,
        now: Instant,
        events: &mut Vec<ChannelMessage>,
    ) {
        for idx in 0..self.pool.len() {
            let slot_bb = self.pool.slots()[idx].bb();
            if slot_bb == 0 {
                continue;
            }

            if registry.locked_out(slot_bb) {
                events.extend(self.pool.tune(idx, 0, center_freq, now));
                continue;
            }

            if active.contains(&slot_bb) {
                self.pool.slots_mut()[idx].set_last_heard(now);
            } else if now.duration_since(self.pool.slots()[idx].last_heard()) > self.config.hang_time {
                events.extend(self.pool.tune(idx, 0, center_freq, now));
                continue;
            }

            if let Some(max_recording) = self.config.max_recording {
                if now.duration_since(self.pool.slots()[idx].time_stamp()) >= max_recording {
                    events.extend(self.pool.tune(idx, 0, center_freq, now));
                }
            }
        }
    }

    /// Assign demodulators to every non-hanging, non-locked channel not
    /// already assigned: first slot index (scanning low to high) whose
    /// current occupant `is_higher_priority` yields to `channel` wins —
    /// idle slots (`bb == 0`) always yield, so this single scan covers both
    /// "take an idle slot" and "preempt an earlier lower-priority occupant".
    fn assign_channels_to_demodulators(
        &mut self,
        registry: &FrequencyRegistry,
        channels: &[Channel],
        center_freq: i64,
        now: Instant,
        events: &mut Vec<ChannelMessage>,
    ) {
        for channel in channels {
            if channel.hanging || channel.locked {
                continue;
            }
            if self.pool.find_by_bb(channel.bb).is_some() {
                continue;
            }

            let target = (0..self.pool.len())
                .find(|&idx| registry.is_higher_priority(channel.bb, self.pool.slots()[idx].bb()));

            if let Some(idx) = target {
                events.extend(self.pool.tune(idx, channel.bb, center_freq, now));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::{ChannelLogParams, ChannelLogger, LogKind};
    use crate::provider::{CenterFrequencyProvider, FrequencyGroup, SingleStep};
    use crate::types::RawFrequencyEntry;
    use async_trait::async_trait;

    struct FixedSpectrum {
        spectrum: Vec<f32>,
        sample_rate: i64,
    }

    #[async_trait]
    impl Receiver for FixedSpectrum {
        async fn retune(&self, _center_freq_hz: i64) -> Result<(), HardwareError> {
            Ok(())
        }
        async fn spectrum(&self) -> Result<Vec<f32>, HardwareError> {
            Ok(self.spectrum.clone())
        }
        fn sample_rate_hz(&self) -> i64 {
            self.sample_rate
        }
    }

    fn spectrum_with_peak(bin: usize, len: usize) -> Vec<f32> {
        let mut spectrum = vec![0.0; len];
        spectrum[bin] = 100.0;
        spectrum
    }

    async fn registry_at(center: i64) -> Arc<Mutex<FrequencyRegistry>> {
        let mut registry = FrequencyRegistry::new(5_000, false, false);
        registry.set_center(center);
        Arc::new(Mutex::new(registry))
    }

    fn harness_pipeline(registry: Arc<Mutex<FrequencyRegistry>>) -> Arc<ActivityPipeline> {
        let group = FrequencyGroup {
            singles: vec![SingleStep { freq_hz: 146_000_000 }],
            ranges: vec![],
            sample_rate_hz: 4_000_000,
            quiet_timeout: Duration::from_secs(10),
            active_timeout: Duration::from_secs(16),
        };
        let provider = Arc::new(CenterFrequencyProvider::new(group, Arc::new(|_| {})));
        let logger = Arc::new(ChannelLogger::new(&ChannelLogParams { kind: LogKind::NoOp, target: None, active_timeout: 0 }));
        Arc::new(ActivityPipeline::new(registry, provider, logger, false, false))
    }

    #[tokio::test]
    async fn scan_cycle_assigns_an_idle_demodulator() {
        let receiver: Arc<dyn Receiver> =
            Arc::new(FixedSpectrum { spectrum: spectrum_with_peak(136, 256), sample_rate: 4_000_000 });
        let registry = registry_at(146_000_000).await;
        let pipeline = harness_pipeline(Arc::clone(&registry));
        let config = ScanConfig {
            threshold_db: 10.0,
            channel_spacing: 5_000,
            hang_time: Duration::from_secs(3),
            max_recording: None,
        };
        let mut scheduler = Scheduler::new(receiver, registry, pipeline, 2, config);

        let channels = scheduler.scan_cycle().await.unwrap();
        assert_eq!(channels.len(), 1);
        // freshly assigned this cycle: enrichment ran before assignment saw it
        assert!(!channels[0].active);
        assert!(scheduler.pool().find_by_bb(channels[0].bb).is_some());
    }

    #[tokio::test]
    async fn second_cycle_reports_the_assigned_channel_as_active() {
        let receiver: Arc<dyn Receiver> =
            Arc::new(FixedSpectrum { spectrum: spectrum_with_peak(136, 256), sample_rate: 4_000_000 });
        let registry = registry_at(146_000_000).await;
        let pipeline = harness_pipeline(Arc::clone(&registry));
        let config = ScanConfig {
            threshold_db: 10.0,
            channel_spacing: 5_000,
            hang_time: Duration::from_secs(3),
            max_recording: None,
        };
        let mut scheduler = Scheduler::new(receiver, registry, pipeline, 2, config);

        scheduler.scan_cycle().await.unwrap();
        let channels = scheduler.scan_cycle().await.unwrap();
        assert!(channels[0].active);
        assert!(!channels[0].hanging);
    }

    #[tokio::test]
    async fn locked_channel_is_not_assigned() {
        let receiver: Arc<dyn Receiver> =
            Arc::new(FixedSpectrum { spectrum: spectrum_with_peak(136, 256), sample_rate: 4_000_000 });
        let mut registry = FrequencyRegistry::new(5_000, false, false);
        registry.add(RawFrequencyEntry::single(146.125).with_locked(true)).unwrap();
        registry.set_center(146_000_000);
        let registry = Arc::new(Mutex::new(registry));
        let pipeline = harness_pipeline(Arc::clone(&registry));
        let config = ScanConfig {
            threshold_db: 10.0,
            channel_spacing: 5_000,
            hang_time: Duration::from_secs(3),
            max_recording: None,
        };
        let mut scheduler = Scheduler::new(receiver, registry, pipeline, 2, config);

        let channels = scheduler.scan_cycle().await.unwrap();
        assert!(channels[0].locked);
        assert!(scheduler.pool().slots().iter().all(|s| s.is_idle()));
    }

    #[tokio::test(start_paused = true)]
    async fn demodulator_hangs_after_activity_stops_then_releases() {
        let registry = registry_at(146_000_000).await;
        let pipeline = harness_pipeline(Arc::clone(&registry));
        let config = ScanConfig {
            threshold_db: 10.0,
            channel_spacing: 5_000,
            hang_time: Duration::from_secs(1),
            max_recording: None,
        };

        let active: Arc<dyn Receiver> =
            Arc::new(FixedSpectrum { spectrum: spectrum_with_peak(136, 256), sample_rate: 4_000_000 });
        let mut scheduler = Scheduler::new(active, Arc::clone(&registry), pipeline, 1, config.clone());
        scheduler.scan_cycle().await.unwrap();
        assert!(!scheduler.pool().slots()[0].is_idle());

        let quiet: Arc<dyn Receiver> = Arc::new(FixedSpectrum { spectrum: vec![0.0; 256], sample_rate: 4_000_000 });
        scheduler.receiver = quiet;

        tokio::time::advance(Duration::from_millis(500)).await;
        scheduler.scan_cycle().await.unwrap();
        assert!(!scheduler.pool().slots()[0].is_idle(), "still within hang_time");

        tokio::time::advance(Duration::from_millis(600)).await;
        scheduler.scan_cycle().await.unwrap();
        assert!(scheduler.pool().slots()[0].is_idle(), "released once past hang_time");
    }

    #[tokio::test(start_paused = true)]
    async fn max_recording_forces_a_release_even_while_active() {
        let registry = registry_at(146_000_000).await;
        let pipeline = harness_pipeline(Arc::clone(&registry));
        let config = ScanConfig {
            threshold_db: 10.0,
            channel_spacing: 5_000,
            hang_time: Duration::from_secs(60),
            max_recording: Some(Duration::from_secs(1)),
        };
        let active: Arc<dyn Receiver> =
            Arc::new(FixedSpectrum { spectrum: spectrum_with_peak(136, 256), sample_rate: 4_000_000 });
        let mut scheduler = Scheduler::new(active, registry, pipeline, 1, config);

        scheduler.scan_cycle().await.unwrap();
        assert!(!scheduler.pool().slots()[0].is_idle());

        tokio::time::advance(Duration::from_millis(1_200)).await;
        scheduler.scan_cycle().await.unwrap();
        assert!(scheduler.pool().slots()[0].is_idle(), "max_recording exceeded despite ongoing activity");
    }

    struct SwitchableSpectrum {
        spectrum: Mutex<Vec<f32>>,
        sample_rate: i64,
    }

    #[async_trait]
    impl Receiver for SwitchableSpectrum {
        async fn retune(&self, _center_freq_hz: i64) -> Result<(), HardwareError> {
            Ok(())
        }
        async fn spectrum(&self) -> Result<Vec<f32>, HardwareError> {
            Ok(self.spectrum.lock().await.clone())
        }
        fn sample_rate_hz(&self) -> i64 {
            self.sample_rate
        }
    }

    #[tokio::test]
    async fn higher_priority_channel_preempts_a_lower_priority_occupant() {
        let mut registry = FrequencyRegistry::new(5_000, false, false);
        registry.add(RawFrequencyEntry::single(146.125).with_priority(5)).unwrap();
        registry.add(RawFrequencyEntry::single(146.14).with_priority(1)).unwrap();
        registry.set_center(146_000_000);
        let low_bb = registry.entries()[0].bb_single().unwrap();
        let registry = Arc::new(Mutex::new(registry));
        let pipeline = harness_pipeline(Arc::clone(&registry));

        let receiver = Arc::new(SwitchableSpectrum {
            spectrum: Mutex::new(spectrum_with_peak(136, 256)),
            sample_rate: 4_000_000,
        });
        let config = ScanConfig {
            threshold_db: 10.0,
            channel_spacing: 5_000,
            hang_time: Duration::from_secs(60),
            max_recording: None,
        };
        let mut scheduler =
            Scheduler::new(receiver.clone() as Arc<dyn Receiver>, Arc::clone(&registry), pipeline, 1, config);

        scheduler.scan_cycle().await.unwrap();
        assert_eq!(scheduler.pool().slots()[0].bb(), low_bb);

        let mut both = spectrum_with_peak(136, 256);
        both[137] = 100.0;
        *receiver.spectrum.lock().await = both;

        scheduler.scan_cycle().await.unwrap();
        assert_ne!(scheduler.pool().slots()[0].bb(), low_bb, "higher-priority channel preempted the slot");
    }
}
