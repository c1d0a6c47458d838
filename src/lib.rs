#![cfg_attr(not(test), no_std)]
//! SX126x LoRa control core
//!
//! A blocking, `no_std` driver core for the Semtech SX1261/2 sub-GHz
//! transceivers, built on the `embedded-hal` 1.0 traits. It encodes the
//! command set, tracks the device's operating mode and applied
//! configuration, manages the shared 256-byte data buffer and turns the IRQ
//! status word into one event at a time.
//!
//! # Architecture
//! - [`commands`]: typed command frames (opcode, parameters, response)
//! - [`registers`]: the few registers the driver patches directly
//! - [`device`]: SPI framing for commands, registers and the data buffer
//! - [`state`]: operating modes, configuration flags and the transition table
//! - [`irq`]: IRQ snapshot interpretation and the ISR-to-foreground signal
//! - [`radio`]: the [`Radio`] driver tying it all together
//! - [`error`]: configuration, bus and radio error types
//!
//! # Configuration order
//! 1. [`Radio::init`] resets, checks and calibrates the device
//! 2. [`Radio::configure`] applies packet type, frequency, modulation,
//!    packet parameters, buffer layout and IRQ routing in one go
//! 3. [`Radio::transmit`] or [`Radio::start_receive`]
//! 4. [`Radio::dispatch_irq`] each time DIO1 rises
//!
//! Any step can also be applied on its own; the driver refuses TX, RX and
//! CAD until everything they depend on has been written since the last
//! reset or wake-up.
//!
//! # Features
//! - `log` (default): diagnostics through the `log` facade
//! - `defmt`: diagnostics through `defmt`, taking precedence over `log`
//! - `thiserror`: `core::error::Error` and `Display` for the error types
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
//!     SpreadingFactor::Sf9,
//!     LoRaBandwidth::Bw125,
//!     CodingRate::Cr4_5,
//! );
//! let packet = LoRaPacketParams::new(8, HeaderType::Variable, 64, CrcMode::On, IqMode::Normal)?;
//! radio.configure(PacketType::LoRa, &modulation, &packet, 868_100_000)?;
//! radio.start_receive(RxMode::Continuous)?;
//!
//! let mut payload = [0u8; 255];
//! while let Some(event) = radio.dispatch_irq()? {
//!     if let RadioEvent::RxDone(_) = event {
//!         let (length, metadata) = radio.read_last_received(&mut payload)?;
//!         # let _ = (length, metadata);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#[macro_use]
mod fmt;

pub mod commands;
pub mod device;
pub mod error;
pub mod irq;
pub mod radio;
pub mod registers;
pub mod state;

#[cfg(test)]
mod test_support;

pub use regiface::errors::Error;
use regiface::{Command, NoParameters, ToByteArray};

pub use commands::*;
pub use device::Device;
pub use error::{BusError, ConfigError, RadioError};
pub use irq::{decide, IrqDecision, IrqOutcome, IrqSignal, RadioEvent, RxMetadata};
pub use radio::{BringUpConfig, Radio, BUFFER_CAPACITY, DEFAULT_BUSY_TIMEOUT_US};
pub use registers::*;
pub use state::{check_transition, ConfigFlags, RadioMode};
