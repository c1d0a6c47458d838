use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;

use super::{check_status, Radio};
use crate::error::{ConfigError, RadioError};
use crate::state::{ConfigFlags, RadioMode};
use crate::{
    BufferBaseAddressConfig, BufferStatus, GetPacketStatus, GetRxBufferStatus, LoRaPacketStatus,
    SetBufferBaseAddress,
};

/// Size of the data buffer shared by TX and RX, in bytes
pub const BUFFER_CAPACITY: usize = 256;

/// Absolute address of `offset..offset + len` within a region starting at
/// `base`, or the overflow error when it would run off the end.
fn region_address(base: u8, offset: usize, len: usize) -> Result<u8, RadioError> {
    let capacity = BUFFER_CAPACITY - base as usize;
    match offset.checked_add(len) {
        Some(end) if end <= capacity => Ok(base.wrapping_add(offset as u8)),
        _ => Err(RadioError::BufferOverflow {
            offset,
            len,
            capacity,
        }),
    }
}

impl<SPI, BUSY, RESET, DELAY> Radio<SPI, BUSY, RESET, DELAY>
where
    SPI: SpiDevice,
    BUSY: InputPin,
    RESET: OutputPin,
    DELAY: DelayNs,
{
    /// Splits the data buffer into TX and RX regions.
    ///
    /// A received packet longer than `256 - rx_base` wraps around and may
    /// overwrite the TX region.
    pub fn set_buffer_base_address(&mut self, tx_base: u8, rx_base: u8) -> Result<(), RadioError> {
        self.ensure_standby()?;
        let config = BufferBaseAddressConfig {
            tx_base_addr: tx_base,
            rx_base_addr: rx_base,
        };
        self.command(SetBufferBaseAddress { config })?;

        if config.tx_base_addr != self.buffer_base.tx_base_addr {
            self.applied.remove(ConfigFlags::TX_PAYLOAD);
        }
        self.buffer_base = config;
        self.applied.insert(ConfigFlags::BUFFER_BASE);
        Ok(())
    }

    /// Writes `bytes` at `offset` from the TX base.
    ///
    /// An empty write touches nothing and does not count as a payload.
    ///
    /// # Errors
    /// * `ConfigError::InvalidMode` - a transmission is reading the TX region
    /// * `RadioError::BufferOverflow` - the write would cross the end of the buffer
    pub fn write_buffer(&mut self, offset: usize, bytes: &[u8]) -> Result<(), RadioError> {
        self.ensure_buffer_access()?;
        if self.mode == RadioMode::Tx {
            warn!("tx region is busy");
            return Err(ConfigError::InvalidMode { mode: self.mode }.into());
        }
        let address = region_address(self.buffer_base.tx_base_addr, offset, bytes.len())?;
        if bytes.is_empty() {
            return Ok(());
        }

        self.wait_busy()?;
        self.device.write_buffer(address, bytes)?;
        self.applied.insert(ConfigFlags::TX_PAYLOAD);
        Ok(())
    }

    /// Fills `bytes` from `offset` past the RX base.
    ///
    /// Only meaningful after a receive has completed; see
    /// [`Radio::get_rx_buffer_status`].
    pub fn read_buffer(&mut self, offset: usize, bytes: &mut [u8]) -> Result<(), RadioError> {
        self.ensure_buffer_access()?;
        let address = region_address(self.buffer_base.rx_base_addr, offset, bytes.len())?;

        if !bytes.is_empty() {
            self.wait_busy()?;
            self.device.read_buffer(address, bytes)?;
        }
        Ok(())
    }

    /// Length and start address of the last received payload.
    ///
    /// Before the first RxDone the values are whatever the device last
    /// latched. Calling it then is a caller error the driver cannot detect.
    pub fn get_rx_buffer_status(&mut self) -> Result<BufferStatus, RadioError> {
        self.ensure_awake()?;
        let response = self.command(GetRxBufferStatus)?;
        check_status(response.status)?;
        Ok(response.buffer_status)
    }

    /// Link quality of the last received packet.
    pub fn get_packet_status(&mut self) -> Result<LoRaPacketStatus, RadioError> {
        self.ensure_awake()?;
        self.ensure_lora()?;
        let response = self.command(GetPacketStatus)?;
        check_status(response.status)?;
        Ok(response.packet_status)
    }

    fn ensure_buffer_access(&self) -> Result<(), ConfigError> {
        self.ensure_awake()?;
        if !self.applied.contains(ConfigFlags::BUFFER_BASE) {
            return Err(ConfigError::MissingPrerequisite {
                missing: ConfigFlags::BUFFER_BASE,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{standby_radio, FakeChip};

    #[test]
    fn buffer_round_trips_at_every_length() {
        let chip = FakeChip::new();
        let mut radio = standby_radio(&chip);
        radio.set_buffer_base_address(0, 0).unwrap();

        let pattern: Vec<u8> = (0..=255u8).rev().collect();
        for len in [0, 1, 6, 64, 255, 256] {
            radio.write_buffer(0, &pattern[..len]).unwrap();
            let mut out = vec![0u8; len];
            radio.read_buffer(0, &mut out).unwrap();
            assert_eq!(out, pattern[..len], "length {len}");
        }
    }

    #[test]
    fn overflow_is_caught_before_the_bus() {
        let chip = FakeChip::new();
        let mut radio = standby_radio(&chip);
        radio.set_buffer_base_address(128, 0).unwrap();
        let frames = chip.frame_count();

        assert_eq!(
            radio.write_buffer(100, &[0; 29]),
            Err(RadioError::BufferOverflow {
                offset: 100,
                len: 29,
                capacity: 128
            })
        );
        assert_eq!(
            radio.read_buffer(0, &mut [0; 257]),
            Err(RadioError::BufferOverflow {
                offset: 0,
                len: 257,
                capacity: 256
            })
        );
        assert!(matches!(
            radio.write_buffer(usize::MAX, &[1]),
            Err(RadioError::BufferOverflow { .. })
        ));
        assert_eq!(chip.frame_count(), frames);

        radio.write_buffer(100, &[7; 28]).unwrap();
        assert_eq!(chip.buffer()[228..256], [7; 28]);
    }

    #[test]
    fn regions_are_relative_to_their_base() {
        let chip = FakeChip::new();
        let mut radio = standby_radio(&chip);
        radio.set_buffer_base_address(0x80, 0x10).unwrap();

        radio.write_buffer(2, &[0xAA, 0xBB]).unwrap();
        assert_eq!(chip.buffer()[0x82..0x84], [0xAA, 0xBB]);

        chip.write_buffer_at(0x15, &[1, 2, 3]);
        let mut out = [0u8; 3];
        radio.read_buffer(5, &mut out).unwrap();
        assert_eq!(out, [1, 2, 3]);
    }

    #[test]
    fn buffer_needs_base_address() {
        let chip = FakeChip::new();
        let mut radio = standby_radio(&chip);

        assert_eq!(
            radio.write_buffer(0, &[1]),
            Err(RadioError::Config(ConfigError::MissingPrerequisite {
                missing: ConfigFlags::BUFFER_BASE
            }))
        );
    }

    #[test]
    fn empty_write_is_not_a_payload() {
        let chip = FakeChip::new();
        let mut radio = standby_radio(&chip);
        radio.set_buffer_base_address(0, 0).unwrap();
        let frames = chip.frame_count();

        radio.write_buffer(0, &[]).unwrap();

        assert!(!radio.applied_config().contains(ConfigFlags::TX_PAYLOAD));
        assert_eq!(chip.frame_count(), frames);
    }

    #[test]
    fn tx_region_is_locked_while_transmitting() {
        let chip = FakeChip::new();
        let mut radio = standby_radio(&chip);
        radio.set_buffer_base_address(0, 0).unwrap();
        radio.write_buffer(0, &[1, 2]).unwrap();
        radio.force_state(RadioMode::Tx, radio.applied_config());
        let frames = chip.frame_count();

        assert_eq!(
            radio.write_buffer(0, &[9]),
            Err(RadioError::Config(ConfigError::InvalidMode {
                mode: RadioMode::Tx
            }))
        );
        assert_eq!(chip.frame_count(), frames);
        assert_eq!(chip.buffer()[..2], [1, 2]);

        let mut out = [0u8; 2];
        radio.read_buffer(0, &mut out).unwrap();
        assert_eq!(out, [1, 2]);
    }

    #[test]
    fn moving_tx_base_drops_payload() {
        let chip = FakeChip::new();
        let mut radio = standby_radio(&chip);
        radio.set_buffer_base_address(0, 0).unwrap();
        radio.write_buffer(0, &[1]).unwrap();
        assert!(radio.applied_config().contains(ConfigFlags::TX_PAYLOAD));

        radio.set_buffer_base_address(0, 0x80).unwrap();
        assert!(radio.applied_config().contains(ConfigFlags::TX_PAYLOAD));

        radio.set_buffer_base_address(0x40, 0x80).unwrap();
        assert!(!radio.applied_config().contains(ConfigFlags::TX_PAYLOAD));
    }
}
