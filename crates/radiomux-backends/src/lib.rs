//! Concrete [`radiomux_core::receiver::Receiver`] implementations: a
//! hardware-free test/demo backend and a live SoapySDR backend.

pub mod null;
pub mod soapy;

pub use null::NullReceiver;
pub use soapy::{SoapyConfig, SoapySdrReceiver};
