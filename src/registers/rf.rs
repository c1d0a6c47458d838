//! RF-related registers
//!
//! Both registers here are patched by the driver rather than configured by the
//! application; see datasheet section 15.

use core::convert::Infallible;

use regiface::{register, FromByteArray, ReadableRegister, ToByteArray, WritableRegister};

/// TX modulation register (address: 0x0889)
///
/// Errata 15.1: bit 2 must be cleared before transmitting with LoRa BW500
/// and set for every other bandwidth and for FSK. Must be applied before each
/// packet transmission.
#[register(0x0889u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister)]
pub struct TxModulation {
    /// Raw register value
    pub value: u8,
}

impl TxModulation {
    const NOT_BW500: u8 = 1 << 2;

    /// Register value adjusted for the bandwidth of the next transmission
    pub fn for_bw500(self, bw500: bool) -> Self {
        let value = if bw500 {
            self.value & !Self::NOT_BW500
        } else {
            self.value | Self::NOT_BW500
        };
        Self { value }
    }
}

/// TX clamp configuration register (address: 0x08D8)
///
/// Errata 15.2: the SX1262 PA clamp threshold (bits 4:1) must be raised to
/// 0xF to survive antenna mismatch. Required after every cold start.
#[register(0x08D8u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister)]
pub struct TxClampConfig {
    /// Raw register value
    pub value: u8,
}

impl TxClampConfig {
    const THRESHOLD_MAX: u8 = 0x1E;

    /// Register value with the clamp threshold at its maximum
    pub fn with_max_threshold(self) -> Self {
        Self {
            value: self.value | Self::THRESHOLD_MAX,
        }
    }
}

impl FromByteArray for TxModulation {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self { value: bytes[0] })
    }
}

impl ToByteArray for TxModulation {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.value])
    }
}

impl FromByteArray for TxClampConfig {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self { value: bytes[0] })
    }
}

impl ToByteArray for TxClampConfig {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.value])
    }
}
