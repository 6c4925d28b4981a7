//! C6 (logger half): delivery of [`ChannelMessage`] events to one of the
//! configured sinks, plus the per-channel "still active" timer each sink
//! shares.
//!
//! Grounded on `ChannelLogger`/`get_logger` (`original_source/apps/channel_loggers.py`):
//! the same four variants (no-op, debug, fixed-field file, JSON-over-HTTP),
//! selected by the same `type` string, reshaped as an enum instead of a class
//! hierarchy since there is no open set of loggers to extend at runtime. The
//! per-channel repeating timer is this crate's reading of the otherwise
//! unused `timeout` field every one of the Python loggers is constructed
//! with: armed on `on`, cancelled on `off`, per §4.6.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::LogDeliveryError;
use crate::types::{ChannelMessage, ChannelState, Classification};

/// Command-line parameters selecting and configuring a logger, mirroring
/// `ChannelLogParams`.
#[derive(Debug, Clone)]
pub struct ChannelLogParams {
    pub kind: LogKind,
    pub target: Option<String>,
    /// Per-channel "still active" repeat interval, in seconds; 0 disables it.
    pub active_timeout: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    NoOp,
    Debug,
    FixedField,
    JsonHttp,
}

impl LogKind {
    pub fn from_str_flag(s: &str) -> Self {
        match s {
            "fixed-field" => LogKind::FixedField,
            "json-http" => LogKind::JsonHttp,
            "debug" => LogKind::Debug,
            _ => LogKind::NoOp,
        }
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    state: &'a str,
    rf: f64,
    bb: i64,
    channel: usize,
    file: &'a Option<String>,
    classification: Option<&'static str>,
    detail: &'a Option<String>,
    label: &'a Option<String>,
    priority: Option<u32>,
}

impl<'a> From<&'a ChannelMessage> for WireMessage<'a> {
    fn from(msg: &'a ChannelMessage) -> Self {
        Self {
            state: msg.state.as_str(),
            rf: msg.rf,
            bb: msg.bb,
            channel: msg.channel,
            file: &msg.file,
            classification: msg.classification.map(Classification::as_str),
            detail: &msg.detail,
            label: &msg.label,
            priority: msg.priority,
        }
    }
}

/// The delivery side of a logger: one concrete sink, constructed once at
/// startup via [`ChannelLogger::new`].
enum ChannelSink {
    NoOp,
    Debug,
    FixedField { path: PathBuf },
    JsonHttp { endpoint: String, client: reqwest::Client },
    /// Test-only sink that records every message for later assertions.
    Recording(Mutex<Vec<ChannelMessage>>),
}

/// One channel-event sink plus the per-channel repeating "act" timers it
/// arms on `on` and cancels on `off`. Shared (behind an `Arc`) across every
/// demodulator slot's per-event calls.
pub struct ChannelLogger {
    sink: ChannelSink,
    active_timeout: Duration,
    timers: Mutex<HashMap<usize, JoinHandle<()>>>,
}

impl ChannelLogger {
    /// Factory mirroring `ChannelLogger.get_logger`.
    pub fn new(params: &ChannelLogParams) -> Self {
        tracing::debug!(?params.kind, target = ?params.target, "creating channel logger");
        let sink = match params.kind {
            LogKind::NoOp => ChannelSink::NoOp,
            LogKind::Debug => ChannelSink::Debug,
            LogKind::FixedField => ChannelSink::FixedField {
                path: PathBuf::from(params.target.clone().unwrap_or_default()),
            },
            LogKind::JsonHttp => ChannelSink::JsonHttp {
                endpoint: params.target.clone().unwrap_or_default(),
                client: reqwest::Client::builder()
                    .timeout(Duration::from_secs(params.active_timeout.max(1)))
                    .build()
                    .expect("reqwest client config is always valid"),
            },
        };
        Self {
            sink,
            active_timeout: Duration::from_secs(params.active_timeout),
            timers: Mutex::new(HashMap::new()),
        }
    }

    /// A sink that records every message instead of delivering it anywhere,
    /// for use by tests that need to assert on what was logged.
    pub fn recording() -> Self {
        Self {
            sink: ChannelSink::Recording(Mutex::new(Vec::new())),
            active_timeout: Duration::ZERO,
            timers: Mutex::new(HashMap::new()),
        }
    }

    /// Same as [`Self::recording`], but arms the per-channel `act` timer at
    /// `active_timeout` seconds, for tests exercising §4.6.
    pub fn recording_with_timeout(active_timeout_secs: u64) -> Self {
        Self {
            sink: ChannelSink::Recording(Mutex::new(Vec::new())),
            active_timeout: Duration::from_secs(active_timeout_secs),
            timers: Mutex::new(HashMap::new()),
        }
    }

    /// Drain the messages recorded so far. Panics if this isn't a
    /// recording sink.
    pub async fn recorded(&self) -> Vec<ChannelMessage> {
        match &self.sink {
            ChannelSink::Recording(messages) => messages.lock().await.clone(),
            _ => panic!("recorded() called on a non-recording channel logger"),
        }
    }

    /// Deliver `msg`, then arm or cancel its channel's repeating `act` timer
    /// depending on whether this is an `on` or `off` event (§4.6).
    pub async fn handle(self: &std::sync::Arc<Self>, msg: &ChannelMessage) -> Result<(), LogDeliveryError> {
        let result = self.deliver(msg).await;

        match msg.state {
            ChannelState::On => self.arm_timer(msg.channel, msg.rf, msg.bb).await,
            ChannelState::Off => self.cancel_timer(msg.channel).await,
            ChannelState::Act => {}
        }

        result
    }

    async fn arm_timer(self: &std::sync::Arc<Self>, channel: usize, rf: f64, bb: i64) {
        if self.active_timeout.is_zero() {
            return;
        }

        let logger = std::sync::Arc::clone(self);
        let interval = self.active_timeout;
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let act = ChannelMessage::new(ChannelState::Act, rf, bb, channel);
                if let Err(e) = logger.deliver(&act).await {
                    tracing::error!(error = %e, channel, "failed to deliver synthetic act event");
                }
            }
        });

        let previous = self.timers.lock().await.insert(channel, handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    async fn cancel_timer(&self, channel: usize) {
        let handle = self.timers.lock().await.remove(&channel);
        let Some(handle) = handle else { return };
        handle.abort();
        if let Err(e) = handle.await {
            if !e.is_cancelled() {
                tracing::error!(error = %e, channel, "channel log timer did not cancel cleanly");
            }
        }
    }

    pub async fn log(&self, msg: &ChannelMessage) -> Result<(), LogDeliveryError> {
        self.deliver(msg).await
    }

    async fn deliver(&self, msg: &ChannelMessage) -> Result<(), LogDeliveryError> {
        match &self.sink {
            ChannelSink::NoOp => Ok(()),
            ChannelSink::Debug => {
                tracing::debug!(?msg.state, rf = msg.rf, bb = msg.bb, channel = msg.channel, "channel event");
                Ok(())
            }
            ChannelSink::FixedField { path } => self.write_fixed_field(path, msg).await,
            ChannelSink::JsonHttp { endpoint, client } => self.post_json(endpoint, client, msg).await,
            ChannelSink::Recording(messages) => {
                messages.lock().await.push(msg.clone());
                Ok(())
            }
        }
    }

    async fn write_fixed_field(&self, path: &PathBuf, msg: &ChannelMessage) -> Result<(), LogDeliveryError> {
        let now = chrono::Local::now();
        let state_field = format!("{:<4}", msg.state.as_str());
        let rf_field = format!("{:<10.4}", msg.rf);
        let line = format!(
            "{}: {}{}{:<2}\n",
            now.format("%Y-%m-%d, %H:%M:%S%.6f"),
            state_field,
            rf_field,
            msg.channel,
        );

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| LogDeliveryError::Io(e.to_string()))?;
        file.write_all(line.as_bytes()).await.map_err(|e| LogDeliveryError::Io(e.to_string()))?;
        Ok(())
    }

    async fn post_json(
        &self,
        endpoint: &str,
        client: &reqwest::Client,
        msg: &ChannelMessage,
    ) -> Result<(), LogDeliveryError> {
        let wire: WireMessage = msg.into();
        tracing::debug!(?wire.state, "posting channel event");
        let response = client
            .post(endpoint)
            .json(&wire)
            .send()
            .await
            .map_err(|e| LogDeliveryError::Transport(e.to_string()))?;

        if let Err(e) = response.error_for_status_ref() {
            return Err(LogDeliveryError::Transport(e.to_string()));
        }
        Ok(())
    }
}
