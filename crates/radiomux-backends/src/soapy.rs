//! Live SoapySDR hardware backend.
//!
//! Grounded on `SoapyIo::new`/`receive` (`tetra-entities/src/phy/components/soapyio.rs`):
//! same `soapysdr::Device` setup sequence (sample rate, center frequency,
//! antenna, gains, stream activation) and the same "read a block, check for
//! sample loss" receive loop. The device and its stream are not `Send`, so
//! they're owned here by a dedicated OS thread and driven through a small
//! command channel, giving the rest of the scan engine the `Send + Sync`
//! async `Receiver` it needs. FFT magnitude spectrum computation via
//! `rustfft` follows the same `FftPlanner` usage as `soapy_dev.rs`.

use std::sync::mpsc as std_mpsc;
use std::thread;

use num_complex::Complex32;
use rustfft::FftPlanner;
use tokio::sync::oneshot;

use radiomux_core::error::HardwareError;
use radiomux_core::receiver::Receiver;

enum Command {
    Retune { center_freq_hz: i64, reply: oneshot::Sender<Result<(), String>> },
    Spectrum { reply: oneshot::Sender<Result<Vec<f32>, String>> },
}

/// Settings needed to open the device, mirroring `SdrConfig`.
#[derive(Debug, Clone)]
pub struct SoapyConfig {
    /// SoapySDR device arguments string, e.g. `"driver=rtlsdr"`.
    pub dev_args: String,
    pub sample_rate_hz: f64,
    pub initial_center_freq_hz: f64,
    pub gain_db: Option<f64>,
    pub antenna: Option<String>,
    /// FFT size used for the spectrum handed to the channel estimator.
    pub fft_size: usize,
}

pub struct SoapySdrReceiver {
    sample_rate_hz: i64,
    commands: std_mpsc::Sender<Command>,
}

impl SoapySdrReceiver {
    pub fn open(config: SoapyConfig) -> Result<Self, HardwareError> {
        let (commands, rx) = std_mpsc::channel::<Command>();
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<i64, String>>();

        let fft_size = config.fft_size;
        thread::Builder::new()
            .name("soapysdr-io".into())
            .spawn(move || device_thread(config, rx, ready_tx))
            .map_err(|e| HardwareError::Init(e.to_string()))?;

        let sample_rate_hz = ready_rx
            .recv()
            .map_err(|e| HardwareError::Init(e.to_string()))?
            .map_err(HardwareError::Init)?;

        let _ = fft_size;
        Ok(Self { sample_rate_hz, commands })
    }
}

#[async_trait::async_trait]
impl Receiver for SoapySdrReceiver {
    async fn retune(&self, center_freq_hz: i64) -> Result<(), HardwareError> {
        let (reply, recv) = oneshot::channel();
        self.commands
            .send(Command::Retune { center_freq_hz, reply })
            .map_err(|_| HardwareError::Tune("device thread is gone".into()))?;
        recv.await
            .map_err(|_| HardwareError::Tune("device thread dropped the reply".into()))?
            .map_err(HardwareError::Tune)
    }

    async fn spectrum(&self) -> Result<Vec<f32>, HardwareError> {
        let (reply, recv) = oneshot::channel();
        self.commands
            .send(Command::Spectrum { reply })
            .map_err(|_| HardwareError::Tune("device thread is gone".into()))?;
        recv.await
            .map_err(|_| HardwareError::Tune("device thread dropped the reply".into()))?
            .map_err(HardwareError::Tune)
    }

    fn sample_rate_hz(&self) -> i64 {
        self.sample_rate_hz
    }
}

fn device_thread(
    config: SoapyConfig,
    commands: std_mpsc::Receiver<Command>,
    ready: std_mpsc::Sender<Result<i64, String>>,
) {
    let mut args = soapysdr::Args::new();
    for pair in config.dev_args.split(',') {
        if let Some((key, value)) = pair.split_once('=') {
            args.set(key.trim(), value.trim());
        }
    }

    let device = match soapysdr::Device::new(args) {
        Ok(dev) => dev,
        Err(e) => {
            let _ = ready.send(Err(format!("failed to open SoapySDR device: {e}")));
            return;
        }
    };

    let channel = 0usize;
    if let Err(e) = device.set_sample_rate(soapysdr::Direction::Rx, channel, config.sample_rate_hz) {
        let _ = ready.send(Err(format!("failed to set sample rate: {e}")));
        return;
    }
    let actual_rate = device.sample_rate(soapysdr::Direction::Rx, channel).unwrap_or(config.sample_rate_hz);

    if let Err(e) = device.set_frequency(
        soapysdr::Direction::Rx,
        channel,
        config.initial_center_freq_hz,
        soapysdr::Args::new(),
    ) {
        let _ = ready.send(Err(format!("failed to set center frequency: {e}")));
        return;
    }

    if let Some(ref antenna) = config.antenna {
        if let Err(e) = device.set_antenna(soapysdr::Direction::Rx, channel, antenna.as_str()) {
            tracing::warn!(error = %e, "failed to set antenna, continuing with driver default");
        }
    }
    if let Some(gain) = config.gain_db {
        if let Err(e) = device.set_gain(soapysdr::Direction::Rx, channel, gain) {
            tracing::warn!(error = %e, "failed to set gain, continuing with driver default");
        }
    }

    let mut stream = match device.rx_stream::<Complex32>(&[channel]) {
        Ok(s) => s,
        Err(e) => {
            let _ = ready.send(Err(format!("failed to set up RX stream: {e}")));
            return;
        }
    };
    if let Err(e) = stream.activate(None) {
        let _ = ready.send(Err(format!("failed to activate RX stream: {e}")));
        return;
    }

    let _ = ready.send(Ok(actual_rate as i64));

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(config.fft_size);
    let mut buffer = vec![Complex32::new(0.0, 0.0); config.fft_size];

    for command in commands {
        match command {
            Command::Retune { center_freq_hz, reply } => {
                let result = device
                    .set_frequency(soapysdr::Direction::Rx, channel, center_freq_hz as f64, soapysdr::Args::new())
                    .map_err(|e| e.to_string());
                let _ = reply.send(result);
            }
            Command::Spectrum { reply } => {
                let result = read_one_spectrum(&mut stream, &mut buffer, fft.as_ref());
                let _ = reply.send(result);
            }
        }
    }
}

fn read_one_spectrum(
    stream: &mut soapysdr::RxStream<Complex32>,
    buffer: &mut [Complex32],
    fft: &dyn rustfft::Fft<f32>,
) -> Result<Vec<f32>, String> {
    let mut filled = 0;
    while filled < buffer.len() {
        let read = stream
            .read(&mut [&mut buffer[filled..]], 1_000_000)
            .map_err(|e| format!("RX stream read failed: {e}"))?;
        if read == 0 {
            return Err("RX stream read timed out".into());
        }
        filled += read;
    }

    fft.process(buffer);

    let len = buffer.len();
    let mut magnitudes: Vec<f32> = buffer.iter().map(|c| c.norm_sqr()).collect();
    magnitudes.rotate_left(len / 2);
    Ok(magnitudes)
}
