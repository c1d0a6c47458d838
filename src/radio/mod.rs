//! SX126x radio driver
//!
//! [`Radio`] owns the bus transport and the BUSY and RESET lines, and keeps
//! the driver-side mirror of the device: its operating mode, which
//! configuration steps have been applied, and the parameters last written.
//! Every operation that changes mode goes through
//! [`check_transition`](crate::state::check_transition) first, so a rejected
//! request never reaches the bus.
//!
//! The operations are grouped by concern:
//! - bring-up: reset, sanity check, calibration and power setup
//! - mode control: standby, FS, TX, RX, CAD, sleep, abort
//! - configuration: packet type, frequency, modulation, packet, PA
//! - buffer: base addresses, payload write and readback
//! - dispatch: IRQ handling and the application-facing surface
//!
//! # Example
//! ```no_run
//! # use embedded_hal::{delay::DelayNs, digital::{InputPin, OutputPin}, spi::SpiDevice};
//! # fn demo<SPI: SpiDevice, BUSY: InputPin, RESET: OutputPin, DELAY: DelayNs>(
//! #     spi: SPI, busy: BUSY, reset: RESET, delay: DELAY,
//! # ) -> Result<(), sx126x_core::RadioError> {
//! use sx126x_core::*;
//!
//! let mut radio = Radio::new(spi, busy, reset, delay);
//! radio.init(&BringUpConfig::default())?;
//!
//! let modulation = LoRaModulationParams::new(
//!     SpreadingFactor::Sf7,
//!     LoRaBandwidth::Bw250,
//!     CodingRate::Cr4_5,
//! );
//! let packet = LoRaPacketParams::new(12, HeaderType::Variable, 1, CrcMode::Off, IqMode::Normal)?;
//! radio.configure(PacketType::LoRa, &modulation, &packet, 915_000_000)?;
//! radio.transmit(&[3])?;
//!
//! // later, once DIO1 fired
//! if let Some(RadioEvent::TxDone) = radio.dispatch_irq()? {
//!     // back in standby
//! }
//! # Ok(())
//! # }
//! ```

mod bringup;
mod buffer;
mod config;
mod dispatch;
mod mode;

pub use bringup::BringUpConfig;
pub use buffer::BUFFER_CAPACITY;

use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;
use regiface::{Command, ToByteArray};

use crate::error::{BusError, ConfigError, RadioError};
use crate::irq::{RadioEvent, RxMetadata};
use crate::state::{check_transition, ConfigFlags, RadioMode};
use crate::{
    BufferBaseAddressConfig, CadExitMode, DeviceSelect, Device, FallbackMode, ImageCalibConfig,
    LoRaModulationParams, LoRaPacketParams, PacketType, RxMode, Status, Timeout,
};

/// Default BUSY wait limit, in microseconds
pub const DEFAULT_BUSY_TIMEOUT_US: u32 = 100_000;

const BUSY_POLL_US: u32 = 10;

/// SX126x driver
pub struct Radio<SPI, BUSY, RESET, DELAY> {
    device: Device<SPI>,
    busy: BUSY,
    reset: RESET,
    delay: DELAY,
    busy_timeout_us: u32,

    mode: RadioMode,
    applied: ConfigFlags,
    packet_type: Option<PacketType>,
    frequency_hz: Option<u32>,
    image_calibration: Option<ImageCalibConfig>,
    modulation: Option<LoRaModulationParams>,
    packet: Option<LoRaPacketParams>,
    packet_on_device: Option<LoRaPacketParams>,
    buffer_base: BufferBaseAddressConfig,
    pa_device: Option<DeviceSelect>,
    fallback: FallbackMode,
    tx_timeout: Timeout,
    rx_mode: Option<RxMode>,
    cad_exit: CadExitMode,
    last_rx: Option<RxMetadata>,
    handler: Option<fn(RadioEvent)>,
}

impl<SPI, BUSY, RESET, DELAY> Radio<SPI, BUSY, RESET, DELAY> {
    /// Wraps the bus and control lines. No transaction is issued; call
    /// [`Radio::init`] or [`Radio::reset`] before anything else.
    ///
    /// The driver assumes the device is asleep until a reset says otherwise.
    pub fn new(spi: SPI, busy: BUSY, reset: RESET, delay: DELAY) -> Self {
        Self {
            device: Device::new(spi),
            busy,
            reset,
            delay,
            busy_timeout_us: DEFAULT_BUSY_TIMEOUT_US,
            mode: RadioMode::Sleep,
            applied: ConfigFlags::empty(),
            packet_type: None,
            frequency_hz: None,
            image_calibration: None,
            modulation: None,
            packet: None,
            packet_on_device: None,
            buffer_base: BufferBaseAddressConfig {
                tx_base_addr: 0,
                rx_base_addr: 0,
            },
            pa_device: None,
            fallback: FallbackMode::default(),
            tx_timeout: Timeout::NONE,
            rx_mode: None,
            cad_exit: CadExitMode::CadOnly,
            last_rx: None,
            handler: None,
        }
    }

    /// Sets how long to wait for BUSY to drop before giving up.
    pub fn with_busy_timeout_us(mut self, timeout_us: u32) -> Self {
        self.busy_timeout_us = timeout_us;
        self
    }

    /// Releases the bus, pins and delay.
    pub fn release(self) -> (SPI, BUSY, RESET, DELAY) {
        (self.device.release(), self.busy, self.reset, self.delay)
    }

    /// Mode the driver believes the device is in
    pub fn mode(&self) -> RadioMode {
        self.mode
    }

    /// Configuration steps applied since the last reset or wake-up
    pub fn applied_config(&self) -> ConfigFlags {
        self.applied
    }

    /// Last frequency set, in Hz
    pub fn frequency_hz(&self) -> Option<u32> {
        self.frequency_hz
    }

    /// Last modulation parameters written
    pub fn modulation_params(&self) -> Option<LoRaModulationParams> {
        self.modulation
    }

    /// Packet parameters applied by configuration. [`Radio::transmit`]
    /// overrides the payload length on the device without changing these.
    pub fn packet_params(&self) -> Option<LoRaPacketParams> {
        self.packet
    }

    /// Timeout armed by [`Radio::transmit`]
    pub fn set_tx_timeout(&mut self, timeout: Timeout) {
        self.tx_timeout = timeout;
    }

    /// Forgets everything learned about the device.
    fn invalidate(&mut self) {
        self.applied = ConfigFlags::empty();
        self.packet_type = None;
        self.frequency_hz = None;
        self.image_calibration = None;
        self.modulation = None;
        self.packet = None;
        self.packet_on_device = None;
        self.rx_mode = None;
        self.last_rx = None;
    }

    fn set_mode(&mut self, mode: RadioMode) {
        if self.mode != mode {
            debug!("mode {:?} -> {:?}", self.mode, mode);
        }
        self.mode = mode;
    }

    fn ensure_transition(&self, to: RadioMode) -> Result<(), ConfigError> {
        check_transition(self.mode, to, self.applied).inspect_err(|e| {
            warn!("rejected {:?} -> {:?}: {:?}", self.mode, to, e);
        })
    }

    fn ensure_standby(&self) -> Result<(), ConfigError> {
        if self.mode.is_standby() {
            Ok(())
        } else {
            warn!("configuration rejected in {:?}", self.mode);
            Err(ConfigError::InvalidMode { mode: self.mode })
        }
    }

    fn ensure_awake(&self) -> Result<(), ConfigError> {
        match self.mode {
            RadioMode::Sleep => Err(ConfigError::InvalidMode { mode: self.mode }),
            _ => Ok(()),
        }
    }

    fn ensure_lora(&self) -> Result<(), ConfigError> {
        match self.packet_type {
            Some(PacketType::LoRa) => Ok(()),
            Some(PacketType::Gfsk) => Err(ConfigError::PacketTypeMismatch),
            None => Err(ConfigError::MissingPrerequisite {
                missing: ConfigFlags::PACKET_TYPE,
            }),
        }
    }
}

impl<SPI, BUSY, RESET, DELAY> Radio<SPI, BUSY, RESET, DELAY>
where
    SPI: SpiDevice,
    BUSY: InputPin,
    RESET: OutputPin,
    DELAY: DelayNs,
{
    /// Blocks until BUSY is low or the timeout elapses.
    fn wait_busy(&mut self) -> Result<(), RadioError> {
        let mut waited_us = 0;
        while self.busy.is_high().map_err(|_| BusError::Pin)? {
            if waited_us >= self.busy_timeout_us {
                error!("busy line stuck high for {} us", waited_us);
                return Err(BusError::BusyTimeout.into());
            }
            self.delay.delay_us(BUSY_POLL_US);
            waited_us += BUSY_POLL_US;
        }
        Ok(())
    }

    /// Waits for BUSY, then runs a command.
    fn command<C>(&mut self, command: C) -> Result<C::ResponseParameters, RadioError>
    where
        C: Command<IdType = u8>,
        C::CommandParameters: ToByteArray<Error = Infallible>,
    {
        self.wait_busy()?;
        trace!("command {:#x}", C::id());
        Ok(self.device.execute_command(command)?)
    }

    fn read_register<R>(&mut self) -> Result<R, RadioError>
    where
        R: regiface::ReadableRegister<IdType = u16>,
    {
        self.wait_busy()?;
        Ok(self.device.read_register()?)
    }

    fn write_register<R>(&mut self, register: R) -> Result<(), RadioError>
    where
        R: regiface::WritableRegister<IdType = u16, Error = Infallible>,
    {
        self.wait_busy()?;
        Ok(self.device.write_register(register)?)
    }
}

/// Fails when the status byte reports that the device rejected a command.
fn check_status(status: Status) -> Result<(), RadioError> {
    match status.command_status() {
        Ok(command_status) if command_status.is_failure() => {
            warn!("device reported {:?}", command_status);
            Err(RadioError::Command(command_status))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
impl<SPI, BUSY, RESET, DELAY> Radio<SPI, BUSY, RESET, DELAY> {
    pub(crate) fn force_state(&mut self, mode: RadioMode, applied: ConfigFlags) {
        self.mode = mode;
        self.applied = applied;
        if applied.contains(ConfigFlags::PACKET_TYPE) {
            self.packet_type = Some(PacketType::LoRa);
        }
    }
}
