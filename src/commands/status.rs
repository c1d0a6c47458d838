//! Status commands
//!
//! This module contains commands for monitoring device status and performance:
//! - Chip mode and command status decoding
//! - Receive buffer status after RxDone
//! - Per-packet link quality (RSSI/SNR)
//! - Device error flags
//! - Packet statistics
//!
//! Every response begins with the status byte clocked out while the host
//! sends the first NOP, so each response type carries a decoded [`Status`].

use bitflags::bitflags;
use core::convert::Infallible;

use regiface::FromByteArray;

use crate::{Command, NoParameters, ToByteArray};

/// Error type for status byte fields that do not map to a documented value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StatusError {
    /// Chip mode field (bits 6:4) holds an undocumented value
    InvalidMode(u8),
    /// Command status field (bits 3:1) holds an undocumented value
    InvalidCommandStatus(u8),
}

/// Chip mode reported in bits 6:4 of the status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChipMode {
    /// STDBY_RC mode: RC oscillator running
    StandbyRc = 0x2,
    /// STDBY_XOSC mode: Crystal oscillator running
    StandbyXosc = 0x3,
    /// FS mode: Frequency synthesizer running
    FrequencySynthesis = 0x4,
    /// RX mode
    Receive = 0x5,
    /// TX mode
    Transmit = 0x6,
}

impl TryFrom<u8> for ChipMode {
    type Error = StatusError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x2 => Ok(Self::StandbyRc),
            0x3 => Ok(Self::StandbyXosc),
            0x4 => Ok(Self::FrequencySynthesis),
            0x5 => Ok(Self::Receive),
            0x6 => Ok(Self::Transmit),
            invalid => Err(StatusError::InvalidMode(invalid)),
        }
    }
}

/// Command processing status reported in bits 3:1 of the status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandStatus {
    /// Reserved value, returned by most devices after a command completes normally
    Rfu = 0x1,
    /// Data is available to be read from the radio
    DataAvailable = 0x2,
    /// Command timed out during execution
    Timeout = 0x3,
    /// Opcode or parameters could not be processed
    ProcessingError = 0x4,
    /// Command was understood but could not be executed
    ExecutionFailure = 0x5,
    /// TX operation completed successfully
    TxDone = 0x6,
}

impl CommandStatus {
    /// Returns true for the statuses a caller must treat as a failed command.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::ProcessingError | Self::ExecutionFailure)
    }
}

impl TryFrom<u8> for CommandStatus {
    type Error = StatusError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x1 => Ok(Self::Rfu),
            0x2 => Ok(Self::DataAvailable),
            0x3 => Ok(Self::Timeout),
            0x4 => Ok(Self::ProcessingError),
            0x5 => Ok(Self::ExecutionFailure),
            0x6 => Ok(Self::TxDone),
            invalid => Err(StatusError::InvalidCommandStatus(invalid)),
        }
    }
}

/// Raw status byte
///
/// # Status Byte Format
/// - Bit 7: Reserved
/// - Bits 6:4: Chip mode
/// - Bits 3:1: Command status
/// - Bit 0: Reserved
///
/// Decoding is deferred so that a response carrying an undocumented status
/// value still delivers its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status(pub u8);

impl Status {
    /// Chip mode field
    pub fn chip_mode(self) -> Result<ChipMode, StatusError> {
        ChipMode::try_from((self.0 >> 4) & 0x7)
    }

    /// Command status field
    pub fn command_status(self) -> Result<CommandStatus, StatusError> {
        CommandStatus::try_from((self.0 >> 1) & 0x7)
    }

    /// Decodes both fields at once.
    pub fn decode(self) -> Result<(ChipMode, CommandStatus), StatusError> {
        Ok((self.chip_mode()?, self.command_status()?))
    }
}

impl FromByteArray for Status {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self(bytes[0]))
    }
}

/// GetStatus command (0xC0)
///
/// Returns the current chip mode and the status of the last command.
/// Also used to wake the device from sleep: the falling edge of NSS is
/// what wakes it, the opcode itself is harmless.
#[derive(Debug, Clone)]
pub struct GetStatus;

impl Command for GetStatus {
    type IdType = u8;
    type CommandParameters = NoParameters;
    type ResponseParameters = Status;

    fn id() -> Self::IdType {
        0xC0
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        NoParameters::default()
    }
}

/// GetRssiInst response
#[derive(Debug, Clone, Copy)]
pub struct GetRssiInstResponse {
    /// Device status from the first response byte
    pub status: Status,
    /// Instantaneous RSSI, signal power in dBm = -value/2
    pub rssi: u8,
}

impl GetRssiInstResponse {
    /// RSSI in dBm
    pub fn rssi_dbm(&self) -> i16 {
        -(self.rssi as i16) / 2
    }
}

impl FromByteArray for GetRssiInstResponse {
    type Error = Infallible;
    type Array = [u8; 2];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            status: Status(bytes[0]),
            rssi: bytes[1],
        })
    }
}

/// GetRssiInst command (0x15)
///
/// Only meaningful while in RX.
#[derive(Debug, Clone)]
pub struct GetRssiInst;

impl Command for GetRssiInst {
    type IdType = u8;
    type CommandParameters = NoParameters;
    type ResponseParameters = GetRssiInstResponse;

    fn id() -> Self::IdType {
        0x15
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        NoParameters::default()
    }
}

/// Location of the most recently received payload in the data buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BufferStatus {
    /// Length of received payload in bytes
    pub payload_length: u8,
    /// Absolute buffer address of the first payload byte
    pub rx_start_buffer_pointer: u8,
}

/// GetRxBufferStatus response
#[derive(Debug, Clone, Copy)]
pub struct GetRxBufferStatusResponse {
    /// Device status from the first response byte
    pub status: Status,
    /// RX buffer information
    pub buffer_status: BufferStatus,
}

impl FromByteArray for GetRxBufferStatusResponse {
    type Error = Infallible;
    type Array = [u8; 3];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            status: Status(bytes[0]),
            buffer_status: BufferStatus {
                payload_length: bytes[1],
                rx_start_buffer_pointer: bytes[2],
            },
        })
    }
}

/// GetRxBufferStatus command (0x13)
///
/// # Important Notes
/// - Only meaningful after an RxDone interrupt
/// - Before any reception the values are stale; the driver does not detect this
#[derive(Debug, Clone)]
pub struct GetRxBufferStatus;

impl Command for GetRxBufferStatus {
    type IdType = u8;
    type CommandParameters = NoParameters;
    type ResponseParameters = GetRxBufferStatusResponse;

    fn id() -> Self::IdType {
        0x13
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        NoParameters::default()
    }
}

/// LoRa packet status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LoRaPacketStatus {
    /// Average RSSI over the last packet, in dBm
    pub rssi_pkt: i16,
    /// SNR of the last packet, in steps of 0.25 dB
    pub snr_pkt: i8,
    /// RSSI of the despread LoRa signal, in dBm
    pub signal_rssi_pkt: i16,
}

/// GetPacketStatus response
#[derive(Debug, Clone, Copy)]
pub struct GetPacketStatusResponse {
    /// Device status from the first response byte
    pub status: Status,
    /// Link quality of the last received packet
    pub packet_status: LoRaPacketStatus,
}

impl FromByteArray for GetPacketStatusResponse {
    type Error = Infallible;
    type Array = [u8; 4];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            status: Status(bytes[0]),
            packet_status: LoRaPacketStatus {
                rssi_pkt: -(bytes[1] as i16) / 2,
                snr_pkt: bytes[2] as i8,
                signal_rssi_pkt: -(bytes[3] as i16) / 2,
            },
        })
    }
}

/// GetPacketStatus command (0x14)
///
/// Valid after RxDone. Decoded here for LoRa packets only.
#[derive(Debug, Clone)]
pub struct GetPacketStatus;

impl Command for GetPacketStatus {
    type IdType = u8;
    type CommandParameters = NoParameters;
    type ResponseParameters = GetPacketStatusResponse;

    fn id() -> Self::IdType {
        0x14
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        NoParameters::default()
    }
}

bitflags! {
    /// Hardware fault flags reported by GetDeviceErrors
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DeviceErrors: u16 {
        /// RC64k calibration failed
        const RC64K_CALIB = 1 << 0;
        /// RC13M calibration failed
        const RC13M_CALIB = 1 << 1;
        /// PLL calibration failed
        const PLL_CALIB = 1 << 2;
        /// ADC calibration failed
        const ADC_CALIB = 1 << 3;
        /// Image calibration failed
        const IMG_CALIB = 1 << 4;
        /// XOSC failed to start (expected once at startup with a TCXO)
        const XOSC_START = 1 << 5;
        /// PLL failed to lock
        const PLL_LOCK = 1 << 6;
        /// PA ramping failed
        const PA_RAMP = 1 << 8;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for DeviceErrors {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "DeviceErrors({=u16:#x})", self.bits())
    }
}

/// GetDeviceErrors response
#[derive(Debug, Clone, Copy)]
pub struct GetDeviceErrorsResponse {
    /// Device status from the first response byte
    pub status: Status,
    /// Device error flags
    pub errors: DeviceErrors,
}

impl FromByteArray for GetDeviceErrorsResponse {
    type Error = Infallible;
    type Array = [u8; 3];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            status: Status(bytes[0]),
            errors: DeviceErrors::from_bits_retain(u16::from_be_bytes([bytes[1], bytes[2]])),
        })
    }
}

/// GetDeviceErrors command (0x17)
///
/// # Important Notes
/// - Errors persist until explicitly cleared
/// - XOSC_START is normal with a TCXO at startup
#[derive(Debug, Clone)]
pub struct GetDeviceErrors;

impl Command for GetDeviceErrors {
    type IdType = u8;
    type CommandParameters = NoParameters;
    type ResponseParameters = GetDeviceErrorsResponse;

    fn id() -> Self::IdType {
        0x17
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        NoParameters::default()
    }
}

/// Two NOP bytes required after the ClearDeviceErrors opcode
#[derive(Debug, Clone, Copy, Default)]
pub struct ClearDeviceErrorsParams;

impl ToByteArray for ClearDeviceErrorsParams {
    type Error = Infallible;
    type Array = [u8; 2];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([0x00, 0x00])
    }
}

/// ClearDeviceErrors command (0x07)
///
/// Clears all device error flags. Errors cannot be cleared individually.
#[derive(Debug, Clone)]
pub struct ClearDeviceErrors;

impl Command for ClearDeviceErrors {
    type IdType = u8;
    type CommandParameters = ClearDeviceErrorsParams;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x07
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        ClearDeviceErrorsParams
    }
}

/// Packet reception statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Stats {
    /// Number of packets received
    pub packets_received: u16,
    /// Number of packets with CRC error
    pub packets_crc_error: u16,
    /// Number of packets with header error
    pub packets_header_error: u16,
}

/// GetStats response
#[derive(Debug, Clone, Copy)]
pub struct GetStatsResponse {
    /// Device status from the first response byte
    pub status: Status,
    /// Packet reception statistics
    pub stats: Stats,
}

impl FromByteArray for GetStatsResponse {
    type Error = Infallible;
    type Array = [u8; 7];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            status: Status(bytes[0]),
            stats: Stats {
                packets_received: u16::from_be_bytes([bytes[1], bytes[2]]),
                packets_crc_error: u16::from_be_bytes([bytes[3], bytes[4]]),
                packets_header_error: u16::from_be_bytes([bytes[5], bytes[6]]),
            },
        })
    }
}

/// GetStats command (0x10)
#[derive(Debug, Clone)]
pub struct GetStats;

impl Command for GetStats {
    type IdType = u8;
    type CommandParameters = NoParameters;
    type ResponseParameters = GetStatsResponse;

    fn id() -> Self::IdType {
        0x10
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        NoParameters::default()
    }
}

/// Six zero bytes that follow the ResetStats opcode
#[derive(Debug, Clone, Copy, Default)]
pub struct ResetStatsParams;

impl ToByteArray for ResetStatsParams {
    type Error = Infallible;
    type Array = [u8; 6];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([0; 6])
    }
}

/// ResetStats command (0x00)
#[derive(Debug, Clone)]
pub struct ResetStats;

impl Command for ResetStats {
    type IdType = u8;
    type CommandParameters = ResetStatsParams;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x00
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        ResetStatsParams
    }
}
