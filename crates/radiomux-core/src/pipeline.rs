//! C6 (pipeline half): reacts to a demodulator slot's activity — enriches
//! the event, forwards it to the configured logger, feeds the frequency
//! provider's dwell extension, and (optionally) tracks classification
//! statistics to auto-promote a frequency to priority.
//!
//! Grounded on `Scanner.got_channel_activity`/`interesting`/`priority_assess`
//! (`original_source/apps/scanner.py`): same three-step reaction and the
//! same voice/data/skip majority vote for auto-priority, with the Python
//! `dict[float, ClassificationCount]` replaced by a keyed map on the
//! quantized RF frequency.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::logger::ChannelLogger;
use crate::provider::CenterFrequencyProvider;
use crate::registry::FrequencyRegistry;
use crate::types::{ChannelMessage, ChannelState, Classification};

#[derive(Debug, Clone, Copy, Default)]
struct ClassificationCount {
    voice: u32,
    data: u32,
    skip: u32,
}

/// Whether recordings are being produced, controlling the definition of
/// "interesting" activity (mirrors `Scanner.record`).
pub struct ActivityPipeline {
    registry: Arc<Mutex<FrequencyRegistry>>,
    provider: Arc<CenterFrequencyProvider>,
    logger: Arc<ChannelLogger>,
    recording_enabled: bool,
    auto_priority: bool,
    stats: Mutex<HashMap<u64, ClassificationCount>>,
}

impl ActivityPipeline {
    pub fn new(
        registry: Arc<Mutex<FrequencyRegistry>>,
        provider: Arc<CenterFrequencyProvider>,
        logger: Arc<ChannelLogger>,
        recording_enabled: bool,
        auto_priority: bool,
    ) -> Self {
        Self {
            registry,
            provider,
            logger,
            recording_enabled,
            auto_priority,
            stats: Mutex::new(HashMap::new()),
        }
    }

    /// Called by a demodulator slot whenever it has something to report.
    pub async fn got_channel_activity(&self, mut msg: ChannelMessage, classification: Option<Classification>) {
        msg.classification = classification;

        {
            let registry = self.registry.lock().await;
            msg.label = registry.label_for(msg.rf);
            msg.priority = registry.priority_at(msg.bb);
        }

        if let Err(e) = self.logger.handle(&msg).await {
            tracing::error!(error = %e, "failed to deliver channel log");
        }

        if self.interesting(&msg) {
            Arc::clone(&self.provider).interesting_activity().await;
        }

        if let Some(classification) = msg.classification {
            self.priority_assess(msg.rf, classification).await;
        }
    }

    /// A recording was produced, or (when not recording) the channel simply
    /// went active — either counts as activity worth extending the dwell for.
    fn interesting(&self, msg: &ChannelMessage) -> bool {
        (self.recording_enabled && msg.file.is_some()) || (!self.recording_enabled && msg.state == ChannelState::On)
    }

    /// Track a rolling voice/data/skip tally per frequency and flip priority
    /// on or off depending on which classification leads.
    async fn priority_assess(&self, rf: f64, classification: Classification) {
        if !self.auto_priority {
            return;
        }

        let key = rf.to_bits();
        let mut stats = self.stats.lock().await;
        let counts = stats.entry(key).or_default();
        match classification {
            Classification::Voice => counts.voice += 1,
            Classification::Data => counts.data += 1,
            Classification::Skip => counts.skip += 1,
        }
        let counts = *counts;
        drop(stats);

        let mut registry = self.registry.lock().await;
        let bb = {
            let center = registry.center_freq().unwrap_or(0);
            let spacing = registry.channel_spacing();
            ((rf * 1_000_000.0 - center as f64) / spacing as f64).round() as i64 * spacing
        };
        let currently_priority = registry.priority_at(bb).is_some();
        let wants_priority = counts.voice > counts.data && counts.voice > counts.skip;

        if wants_priority && !currently_priority {
            tracing::debug!(rf, "auto-priority: promoting frequency");
            let _ = registry.set_auto_priority(rf, Some(1));
        } else if !wants_priority && currently_priority {
            tracing::debug!(rf, "auto-priority: demoting frequency");
            let _ = registry.set_auto_priority(rf, None);
        }
    }
}
