//! C2: CenterFrequencyProvider — generates the cyclic sequence of hardware
//! center frequencies covering the configured singles/ranges, and advances
//! through them with activity-aware dwell times.
//!
//! Grounded on `FrequencyProvider` (`original_source/apps/frequency_provider.py`):
//! same step-generation formula and the same cancel-then-rearm dance for
//! `interesting_activity`, translated from an `asyncio.Task` handle into a
//! `tokio::task::JoinHandle` guarded by a `Mutex` since the provider is
//! shared between the scan loop and the activity pipeline callback.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// A single frequency, in Hz, that becomes one hardware center-frequency step.
#[derive(Debug, Clone, Copy)]
pub struct SingleStep {
    pub freq_hz: i64,
}

/// A frequency range, in Hz, wide enough that the receiver must sweep across
/// it in multiple steps.
#[derive(Debug, Clone, Copy)]
pub struct RangeStep {
    pub lower_hz: i64,
    pub upper_hz: i64,
}

/// Parameters the provider needs: the user's singles/ranges, the hardware
/// sample rate, and the two dwell timeouts.
#[derive(Debug, Clone)]
pub struct FrequencyGroup {
    pub singles: Vec<SingleStep>,
    pub ranges: Vec<RangeStep>,
    pub sample_rate_hz: i64,
    pub quiet_timeout: Duration,
    pub active_timeout: Duration,
}

/// Derive the ordered list of hardware center frequencies: singles first (in
/// configured order), then each range's centers (in configured order).
pub fn generate_steps(group: &FrequencyGroup) -> Vec<i64> {
    let mut centers: Vec<i64> = group.singles.iter().map(|s| s.freq_hz).collect();

    for range in &group.ranges {
        let sample_rate = group.sample_rate_hz;
        let width = range.upper_hz - range.lower_hz;

        if width <= sample_rate {
            centers.push(range.lower_hz + width / 2);
            continue;
        }

        let start_at = range.lower_hz + sample_rate / 2;
        let end_at = range.upper_hz - sample_rate / 2;
        let number_of_moves = (end_at - start_at) / sample_rate + 2;
        let distance = (end_at - start_at) / (number_of_moves - 1);

        let mut center = start_at;
        for _ in 0..number_of_moves {
            centers.push(center);
            center += distance;
        }
    }

    centers
}

/// Callback invoked (outside any provider lock) whenever the provider
/// advances to a new step.
pub type NotifyScanner = Arc<dyn Fn(i64) + Send + Sync>;

struct ProviderState {
    steps: Vec<i64>,
    step: usize,
    center_freq: i64,
    dwell_task: Option<JoinHandle<()>>,
}

/// Drives the advance state machine described in §4.2. Static (never
/// advances) when there is exactly one step.
pub struct CenterFrequencyProvider {
    state: Arc<Mutex<ProviderState>>,
    quiet_timeout: Duration,
    active_timeout: Duration,
    notify: NotifyScanner,
}

impl CenterFrequencyProvider {
    pub fn new(group: FrequencyGroup, notify: NotifyScanner) -> Self {
        let steps = generate_steps(&group);
        assert!(!steps.is_empty(), "frequency provider requires at least one step");
        let center_freq = steps[0];

        Self {
            state: Arc::new(Mutex::new(ProviderState { steps, step: 0, center_freq, dwell_task: None })),
            quiet_timeout: group.quiet_timeout,
            active_timeout: group.active_timeout,
            notify,
        }
    }

    /// Start the dwell timer. A no-op when there is only one step.
    pub async fn start(self: Arc<Self>) {
        if self.not_stepping().await {
            return;
        }
        let timeout = self.quiet_timeout;
        self.arm(timeout).await;
    }

    pub async fn not_stepping(&self) -> bool {
        self.state.lock().await.steps.len() == 1
    }

    pub async fn center_freq(&self) -> i64 {
        self.state.lock().await.center_freq
    }

    pub async fn step(&self) -> usize {
        self.state.lock().await.step
    }

    pub async fn steps(&self) -> Vec<i64> {
        self.state.lock().await.steps.clone()
    }

    async fn arm(self: Arc<Self>, timeout: Duration) {
        let this = Arc::clone(&self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            this.advance().await;
        });
        self.state.lock().await.dwell_task = Some(handle);
    }

    async fn advance(self: Arc<Self>) {
        let (new_center, new_step) = {
            let mut state = self.state.lock().await;
            state.step = if state.step + 1 == state.steps.len() { 0 } else { state.step + 1 };
            state.center_freq = state.steps[state.step];
            (state.center_freq, state.step)
        };
        tracing::debug!(step = new_step, center_freq = new_center, "frequency provider advanced");
        (self.notify)(new_center);
        let timeout = self.quiet_timeout;
        self.arm(timeout).await;
    }

    /// Cancel the pending dwell and rearm with `active_timeout` instead of
    /// `quiet_timeout`. A no-op for a single-step (static) provider.
    pub async fn interesting_activity(self: Arc<Self>) {
        if self.not_stepping().await {
            return;
        }

        let handle = self.state.lock().await.dwell_task.take();
        if let Some(handle) = handle {
            handle.abort();
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::error!(error = %e, "frequency provider dwell task did not cancel cleanly");
                }
            }
        } else {
            tracing::error!("could not cancel dwell task in frequency provider: none was armed");
        }

        let timeout = self.active_timeout;
        self.arm(timeout).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_frequency_is_its_own_step() {
        let group = FrequencyGroup {
            singles: vec![SingleStep { freq_hz: 356_000_000 }],
            ranges: vec![],
            sample_rate_hz: 3_000_000,
            quiet_timeout: Duration::from_secs(10),
            active_timeout: Duration::from_secs(16),
        };
        assert_eq!(generate_steps(&group), vec![356_000_000]);
    }

    #[test]
    fn narrow_range_collapses_to_single_center() {
        let group = FrequencyGroup {
            singles: vec![],
            ranges: vec![RangeStep { lower_hz: 460_000_000, upper_hz: 460_000_002 }],
            sample_rate_hz: 3_000_000,
            quiet_timeout: Duration::from_secs(10),
            active_timeout: Duration::from_secs(16),
        };
        assert_eq!(generate_steps(&group).len(), 1);
    }

    #[test]
    fn wide_range_centers_on_first_step() {
        let lower = 450_000_000;
        let upper = 459_000_000;
        let sample_rate = 3_000_000;
        let group = FrequencyGroup {
            singles: vec![],
            ranges: vec![RangeStep { lower_hz: lower, upper_hz: upper }],
            sample_rate_hz: sample_rate,
            quiet_timeout: Duration::from_secs(10),
            active_timeout: Duration::from_secs(16),
        };
        let steps = generate_steps(&group);
        assert_eq!(steps[0], lower + sample_rate / 2);
    }

    #[test]
    fn range_sweep_produces_four_steps() {
        let group = FrequencyGroup {
            singles: vec![],
            ranges: vec![RangeStep { lower_hz: 450_000_000, upper_hz: 459_000_000 }],
            sample_rate_hz: 3_000_000,
            quiet_timeout: Duration::from_secs(10),
            active_timeout: Duration::from_secs(16),
        };
        assert_eq!(generate_steps(&group).len(), 4);
    }

    #[test]
    fn singles_precede_ranges_in_configured_order() {
        let group = FrequencyGroup {
            singles: vec![SingleStep { freq_hz: 100 }, SingleStep { freq_hz: 200 }],
            ranges: vec![RangeStep { lower_hz: 1_000, upper_hz: 1_100 }],
            sample_rate_hz: 1_000_000,
            quiet_timeout: Duration::from_secs(1),
            active_timeout: Duration::from_secs(1),
        };
        let steps = generate_steps(&group);
        assert_eq!(&steps[0..2], &[100, 200]);
    }

    #[tokio::test(start_paused = true)]
    async fn static_provider_never_advances() {
        let group = FrequencyGroup {
            singles: vec![SingleStep { freq_hz: 356_000_000 }],
            ranges: vec![],
            sample_rate_hz: 3_000_000,
            quiet_timeout: Duration::from_millis(10),
            active_timeout: Duration::from_millis(10),
        };
        let notified = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let notified2 = Arc::clone(&notified);
        let provider = Arc::new(CenterFrequencyProvider::new(
            group,
            Arc::new(move |_| notified2.store(true, std::sync::atomic::Ordering::SeqCst)),
        ));
        Arc::clone(&provider).start().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!notified.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn stepping_provider_advances_and_wraps() {
        let group = FrequencyGroup {
            singles: vec![SingleStep { freq_hz: 1 }, SingleStep { freq_hz: 2 }],
            ranges: vec![],
            sample_rate_hz: 1_000_000,
            quiet_timeout: Duration::from_millis(10),
            active_timeout: Duration::from_millis(10),
        };
        let provider = Arc::new(CenterFrequencyProvider::new(group, Arc::new(|_| {})));
        Arc::clone(&provider).start().await;

        tokio::time::sleep(Duration::from_millis(15)).await;
        assert_eq!(provider.step().await, 1);

        tokio::time::sleep(Duration::from_millis(15)).await;
        assert_eq!(provider.step().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn interesting_activity_extends_the_dwell() {
        let group = FrequencyGroup {
            singles: vec![SingleStep { freq_hz: 1 }, SingleStep { freq_hz: 2 }],
            ranges: vec![],
            sample_rate_hz: 1_000_000,
            quiet_timeout: Duration::from_millis(10),
            active_timeout: Duration::from_millis(1000),
        };
        let provider = Arc::new(CenterFrequencyProvider::new(group, Arc::new(|_| {})));
        Arc::clone(&provider).start().await;

        tokio::time::sleep(Duration::from_millis(5)).await;
        Arc::clone(&provider).interesting_activity().await;

        // well past quiet_timeout but nowhere near active_timeout
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(provider.step().await, 0);
    }
}
