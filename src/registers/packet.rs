//! Packet handling related registers
//!
//! - IQ polarity fix for inverted IQ operation
//! - LoRa sync word

use core::convert::Infallible;

use regiface::{register, FromByteArray, ReadableRegister, ToByteArray, WritableRegister};

/// IQ polarity setup register (address: 0x0736)
///
/// Datasheet errata 15.4: with inverted IQ the reset value of bit 2 degrades
/// reception. Bit 2 must be cleared for inverted IQ and set for standard IQ.
/// The remaining bits are preserved with a read-modify-write.
#[register(0x0736u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister)]
pub struct IqPolaritySetup {
    /// Raw register value
    pub value: u8,
}

impl IqPolaritySetup {
    const STANDARD_IQ: u8 = 1 << 2;

    /// Register value adjusted for the requested IQ polarity
    pub fn with_inverted_iq(self, inverted: bool) -> Self {
        let value = if inverted {
            self.value & !Self::STANDARD_IQ
        } else {
            self.value | Self::STANDARD_IQ
        };
        Self { value }
    }
}

/// LoRa sync word register (address: 0x0740)
///
/// # Standard Values
/// - Public Network: 0x3444
/// - Private Network: 0x1424 (reset value)
///
/// The MSB reads back 0x14 after every reset, which makes it the register of
/// choice for checking that the SPI link works.
#[register(0x0740u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister)]
pub struct LoraSyncWord {
    /// Sync word value
    pub value: u16,
}

impl LoraSyncWord {
    /// Sync word used by public LoRaWAN networks
    pub const PUBLIC: Self = Self { value: 0x3444 };
    /// Sync word used by private networks
    pub const PRIVATE: Self = Self { value: 0x1424 };
    /// Most significant byte after reset
    pub const RESET_MSB: u8 = 0x14;

    /// Most significant byte, at 0x0740
    pub fn msb(self) -> u8 {
        self.value.to_be_bytes()[0]
    }
}

impl Default for LoraSyncWord {
    fn default() -> Self {
        Self::PRIVATE
    }
}

impl FromByteArray for IqPolaritySetup {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self { value: bytes[0] })
    }
}

impl ToByteArray for IqPolaritySetup {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.value])
    }
}

impl FromByteArray for LoraSyncWord {
    type Error = Infallible;
    type Array = [u8; 2];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            value: u16::from_be_bytes(bytes),
        })
    }
}

impl ToByteArray for LoraSyncWord {
    type Error = Infallible;
    type Array = [u8; 2];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok(self.value.to_be_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iq_polarity_only_touches_bit_2() {
        let reset = IqPolaritySetup { value: 0x0D };
        assert_eq!(reset.with_inverted_iq(true).value, 0x09);
        assert_eq!(reset.with_inverted_iq(false).value, 0x0D);
        assert_eq!(IqPolaritySetup { value: 0x09 }.with_inverted_iq(false).value, 0x0D);
    }

    #[test]
    fn sync_word_msb() {
        assert_eq!(LoraSyncWord::PRIVATE.msb(), LoraSyncWord::RESET_MSB);
        assert_eq!(LoraSyncWord::PUBLIC.to_bytes().unwrap(), [0x34, 0x44]);
    }
}
