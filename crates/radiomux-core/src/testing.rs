//! Deterministic test harness shared by this crate's integration tests and
//! downstream crates (`radiomux-backends`, `bins/radiomux`). Not compiled
//! into release builds of dependents unless they opt in via `dev-dependencies`.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::HardwareError;
use crate::receiver::Receiver;

/// A flat (silent) spectrum of `len` bins.
pub fn flat_spectrum(len: usize) -> Vec<f32> {
    vec![0.0; len]
}

/// A spectrum with a single peak bin set to `magnitude`.
pub fn spectrum_with_peak(len: usize, bin: usize, magnitude: f32) -> Vec<f32> {
    let mut spectrum = flat_spectrum(len);
    spectrum[bin] = magnitude;
    spectrum
}

/// A [`Receiver`] that replays a scripted sequence of spectra, one per call
/// to [`Receiver::spectrum`], repeating the last one once the script runs
/// out. Retune calls are recorded but otherwise ignored.
pub struct ScriptedReceiver {
    sample_rate_hz: i64,
    script: Mutex<Vec<Vec<f32>>>,
    tuned: Mutex<Vec<i64>>,
}

impl ScriptedReceiver {
    pub fn new(sample_rate_hz: i64, script: Vec<Vec<f32>>) -> Self {
        Self { sample_rate_hz, script: Mutex::new(script), tuned: Mutex::new(Vec::new()) }
    }

    pub fn retunes(&self) -> Vec<i64> {
        self.tuned.lock().unwrap().clone()
    }
}

#[async_trait]
impl Receiver for ScriptedReceiver {
    async fn retune(&self, center_freq_hz: i64) -> Result<(), HardwareError> {
        self.tuned.lock().unwrap().push(center_freq_hz);
        Ok(())
    }

    async fn spectrum(&self) -> Result<Vec<f32>, HardwareError> {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            Ok(script.remove(0))
        } else {
            Ok(script.first().cloned().unwrap_or_default())
        }
    }

    fn sample_rate_hz(&self) -> i64 {
        self.sample_rate_hz
    }
}
