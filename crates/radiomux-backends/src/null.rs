//! A hardware-free [`Receiver`] for tests and demos: replays a fixed or
//! scripted spectrum instead of talking to a device.
//!
//! Grounded on the file-backed `PhyIo` test double used in
//! `crates/tetra-entities/tests/test_phy_bs.rs`: a deterministic stand-in
//! that implements the same trait contract as the real hardware backend so
//! the rest of the scan engine can't tell the difference.

use async_trait::async_trait;
use std::sync::Mutex;

use radiomux_core::error::HardwareError;
use radiomux_core::receiver::Receiver;

/// Replays a cyclic sequence of FFT magnitude spectra.
pub struct NullReceiver {
    sample_rate_hz: i64,
    frames: Vec<Vec<f32>>,
    cursor: Mutex<usize>,
}

impl NullReceiver {
    pub fn new(sample_rate_hz: i64, frames: Vec<Vec<f32>>) -> Self {
        assert!(!frames.is_empty(), "null receiver requires at least one frame");
        Self { sample_rate_hz, frames, cursor: Mutex::new(0) }
    }

    /// A receiver that only ever reports silence, for pure dwell/lockout tests.
    pub fn silent(sample_rate_hz: i64, bins: usize) -> Self {
        Self::new(sample_rate_hz, vec![vec![0.0; bins]])
    }
}

#[async_trait]
impl Receiver for NullReceiver {
    async fn retune(&self, center_freq_hz: i64) -> Result<(), HardwareError> {
        tracing::debug!(center_freq_hz, "null receiver retune (no-op)");
        Ok(())
    }

    async fn spectrum(&self) -> Result<Vec<f32>, HardwareError> {
        let mut cursor = self.cursor.lock().unwrap();
        let frame = self.frames[*cursor].clone();
        *cursor = (*cursor + 1) % self.frames.len();
        Ok(frame)
    }

    fn sample_rate_hz(&self) -> i64 {
        self.sample_rate_hz
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn silent_receiver_reports_a_flat_spectrum() {
        let receiver = NullReceiver::silent(4_000_000, 32);
        let spectrum = receiver.spectrum().await.unwrap();
        assert_eq!(spectrum.len(), 32);
        assert!(spectrum.iter().all(|&v| v == 0.0));
    }

    #[tokio::test]
    async fn multi_frame_receiver_cycles() {
        let receiver = NullReceiver::new(4_000_000, vec![vec![1.0], vec![2.0]]);
        assert_eq!(receiver.spectrum().await.unwrap(), vec![1.0]);
        assert_eq!(receiver.spectrum().await.unwrap(), vec![2.0]);
        assert_eq!(receiver.spectrum().await.unwrap(), vec![1.0]);
    }
}
