//! System-related registers
//!
//! Errata 15.3: in implicit header mode, RX with a timeout leaves the RTC
//! running after the timeout fires. Stopping it takes a write to the RTC
//! control register followed by clearing the timeout event.

use core::convert::Infallible;

use regiface::{register, FromByteArray, ReadableRegister, ToByteArray, WritableRegister};

/// RTC control register (address: 0x0902)
#[register(0x0902u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister, Default)]
pub struct RtcControl {
    /// Raw register value, 0 stops the RTC
    pub value: u8,
}

impl RtcControl {
    /// Value that stops the RTC
    pub const STOPPED: Self = Self { value: 0x00 };
}

/// Event mask register (address: 0x0944)
#[register(0x0944u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister, Default)]
pub struct EventMask {
    /// Raw register value
    pub value: u8,
}

impl EventMask {
    const TIMEOUT_EVENT: u8 = 1 << 1;

    /// Register value with the pending RTC timeout event cleared
    pub fn with_timeout_cleared(self) -> Self {
        Self {
            value: self.value | Self::TIMEOUT_EVENT,
        }
    }
}

impl FromByteArray for RtcControl {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self { value: bytes[0] })
    }
}

impl ToByteArray for RtcControl {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.value])
    }
}

impl FromByteArray for EventMask {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self { value: bytes[0] })
    }
}

impl ToByteArray for EventMask {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.value])
    }
}
