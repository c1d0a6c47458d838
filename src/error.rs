//! Error taxonomy
//!
//! Every [`crate::Radio`] operation returns [`RadioError`]. Configuration
//! errors and buffer overflows are raised before anything is written to the
//! device; bus and device errors are reported as they happen and never retried.
//! CRC, header and timeout outcomes are not errors: they arrive as
//! [`crate::RadioEvent`]s.

use regiface::errors::Error as RegifaceError;

use crate::state::{ConfigFlags, RadioMode};
use crate::{CommandStatus, DeviceErrors};

/// Driver configuration was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "thiserror", derive(thiserror::Error))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Requested mode cannot be entered from the current one
    #[cfg_attr(
        feature = "thiserror",
        error("cannot enter {to:?} from {from:?}")
    )]
    InvalidStateTransition {
        /// Mode the driver believes the device is in
        from: RadioMode,
        /// Mode that was requested
        to: RadioMode,
    },
    /// Operation is not accepted in the current mode
    #[cfg_attr(feature = "thiserror", error("not allowed in {mode:?}"))]
    InvalidMode {
        /// Mode the driver believes the device is in
        mode: RadioMode,
    },
    /// A configuration step the target mode depends on has not been performed
    #[cfg_attr(feature = "thiserror", error("missing configuration: {missing:?}"))]
    MissingPrerequisite {
        /// Steps still outstanding
        missing: ConfigFlags,
    },
    /// A parameter is outside the range the device accepts
    #[cfg_attr(feature = "thiserror", error("invalid parameter: {0}"))]
    InvalidParameter(&'static str),
    /// Operation requires the LoRa packet type
    #[cfg_attr(feature = "thiserror", error("operation requires LoRa packet type"))]
    PacketTypeMismatch,
}

/// Bus transport or control line failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "thiserror", derive(thiserror::Error))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// BUSY stayed high past the configured timeout
    #[cfg_attr(feature = "thiserror", error("busy line timeout"))]
    BusyTimeout,
    /// SPI transaction failed
    #[cfg_attr(feature = "thiserror", error("spi transaction failed"))]
    Transaction,
    /// Response bytes could not be decoded
    #[cfg_attr(feature = "thiserror", error("malformed response"))]
    Response,
    /// BUSY or RESET pin reported an error
    #[cfg_attr(feature = "thiserror", error("control pin error"))]
    Pin,
}

impl From<RegifaceError> for BusError {
    fn from(error: RegifaceError) -> Self {
        match error {
            RegifaceError::BusError => Self::Transaction,
            _ => Self::Response,
        }
    }
}

/// Error returned by the radio driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "thiserror", derive(thiserror::Error))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioError {
    /// Rejected before touching the device
    #[cfg_attr(feature = "thiserror", error("configuration error: {0}"))]
    Config(ConfigError),
    /// Bus transport failure
    #[cfg_attr(feature = "thiserror", error("bus error: {0}"))]
    Bus(BusError),
    /// Hardware faults reported by GetDeviceErrors
    #[cfg_attr(feature = "thiserror", error("device errors: {0:?}"))]
    Device(DeviceErrors),
    /// Device rejected a command
    #[cfg_attr(feature = "thiserror", error("command failed: {0:?}"))]
    Command(CommandStatus),
    /// Buffer access would cross the end of the data buffer
    #[cfg_attr(
        feature = "thiserror",
        error("buffer overflow: {len} bytes at offset {offset}, capacity {capacity}")
    )]
    BufferOverflow {
        /// Requested offset, relative to the region base
        offset: usize,
        /// Requested length
        len: usize,
        /// Bytes available from the region base
        capacity: usize,
    },
    /// Device did not return the expected value after reset
    #[cfg_attr(
        feature = "thiserror",
        error("sanity check failed: read {found:#x}, expected {expected:#x}")
    )]
    SanityCheck {
        /// Expected register value
        expected: u8,
        /// Value read back
        found: u8,
    },
    /// Device reports a different mode than the driver tracks
    #[cfg_attr(
        feature = "thiserror",
        error("mode mismatch: tracking {expected:?}, device reports {reported:#x}")
    )]
    ModeMismatch {
        /// Mode the driver tracks
        expected: RadioMode,
        /// Raw status byte returned by the device
        reported: u8,
    },
    /// No received packet is available
    #[cfg_attr(feature = "thiserror", error("no packet received"))]
    NoPacket,
}

impl From<ConfigError> for RadioError {
    fn from(error: ConfigError) -> Self {
        Self::Config(error)
    }
}

impl From<BusError> for RadioError {
    fn from(error: BusError) -> Self {
        Self::Bus(error)
    }
}

impl From<RegifaceError> for RadioError {
    fn from(error: RegifaceError) -> Self {
        Self::Bus(error.into())
    }
}
