//! RF, modulation and packet commands
//!
//! This module contains commands for configuring RF parameters, modulation settings,
//! and packet handling. These commands control:
//! - RF frequency configuration
//! - Packet type selection (LoRa/FSK)
//! - TX power and ramping
//! - LoRa modulation parameters
//! - LoRa packet formatting
//! - Channel Activity Detection (CAD)
//! - Buffer base addresses
//!
//! Most configuration commands must be issued while in STDBY_RC mode.
//! The LoRa parameter types validate their fields at construction so a value
//! that reaches the wire is always one the device accepts.

use core::convert::Infallible;

use regiface::FromByteArray;

use crate::error::ConfigError;
use crate::{Command, NoParameters, Status, ToByteArray};

/// Crystal frequency the PLL step is derived from
pub const XTAL_FREQ_HZ: u32 = 32_000_000;

/// Lowest RF frequency the SX126x synthesizes
pub const RF_FREQUENCY_MIN_HZ: u32 = 150_000_000;

/// Highest RF frequency the SX126x synthesizes
pub const RF_FREQUENCY_MAX_HZ: u32 = 960_000_000;

const PLL_STEP_SHIFT: u32 = 14;
const PLL_STEP_SCALED: u64 = (XTAL_FREQ_HZ >> (25 - PLL_STEP_SHIFT)) as u64;

/// RF frequency in PLL steps
///
/// RF = pll_steps * FXTAL / 2^25. Conversion from Hz rounds to the nearest
/// step, giving a worst-case error of half a step (~0.48 Hz).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RfFrequencyConfig {
    /// Frequency register value
    pub pll_steps: u32,
}

impl RfFrequencyConfig {
    /// Converts a frequency in Hz to the nearest PLL step.
    pub fn from_hz(hz: u32) -> Self {
        let steps = (((hz as u64) << PLL_STEP_SHIFT) + (PLL_STEP_SCALED >> 1)) / PLL_STEP_SCALED;
        Self {
            pll_steps: steps as u32,
        }
    }

    /// Frequency in Hz represented by this register value, rounded to the nearest Hz.
    pub fn to_hz(self) -> u32 {
        ((self.pll_steps as u64 * PLL_STEP_SCALED + (1 << (PLL_STEP_SHIFT - 1))) >> PLL_STEP_SHIFT)
            as u32
    }
}

impl ToByteArray for RfFrequencyConfig {
    type Error = Infallible;
    type Array = [u8; 4];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok(self.pll_steps.to_be_bytes())
    }
}

/// SetRfFrequency command (0x86)
///
/// # Important Notes
/// - Must be called while in STDBY_RC mode
/// - Image calibration for the band should precede it
#[derive(Debug, Clone)]
pub struct SetRfFrequency {
    /// RF frequency configuration
    pub config: RfFrequencyConfig,
}

impl Command for SetRfFrequency {
    type IdType = u8;
    type CommandParameters = RfFrequencyConfig;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x86
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.config
    }
}

/// Packet type, fixing how modulation and packet parameters are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketType {
    /// GFSK packet type
    Gfsk = 0x00,
    /// LoRa packet type
    LoRa = 0x01,
}

impl TryFrom<u8> for PacketType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::Gfsk),
            0x01 => Ok(Self::LoRa),
            other => Err(other),
        }
    }
}

impl ToByteArray for PacketType {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self as u8])
    }
}

/// SetPacketType command (0x8A)
///
/// # Important Notes
/// - Must be the first command in the radio configuration sequence
/// - Must be called while in STDBY_RC mode
/// - Modulation and packet parameters must be re-applied afterwards
#[derive(Debug, Clone)]
pub struct SetPacketType {
    /// Packet type selection
    pub packet_type: PacketType,
}

impl Command for SetPacketType {
    type IdType = u8;
    type CommandParameters = PacketType;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x8A
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.packet_type
    }
}

/// GetPacketType response
#[derive(Debug, Clone, Copy)]
pub struct GetPacketTypeResponse {
    /// Device status from the first response byte
    pub status: Status,
    /// Raw packet type byte
    pub raw: u8,
}

impl GetPacketTypeResponse {
    /// Decoded packet type, or the raw byte when undocumented
    pub fn packet_type(&self) -> Result<PacketType, u8> {
        PacketType::try_from(self.raw)
    }
}

impl FromByteArray for GetPacketTypeResponse {
    type Error = Infallible;
    type Array = [u8; 2];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            status: Status(bytes[0]),
            raw: bytes[1],
        })
    }
}

/// GetPacketType command (0x11)
#[derive(Debug, Clone)]
pub struct GetPacketType;

impl Command for GetPacketType {
    type IdType = u8;
    type CommandParameters = NoParameters;
    type ResponseParameters = GetPacketTypeResponse;

    fn id() -> Self::IdType {
        0x11
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        NoParameters::default()
    }
}

/// Power amplifier ramp time options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RampTime {
    /// 10 μs ramp time
    Micros10 = 0x00,
    /// 20 μs ramp time
    Micros20 = 0x01,
    /// 40 μs ramp time
    Micros40 = 0x02,
    /// 80 μs ramp time
    Micros80 = 0x03,
    /// 200 μs ramp time
    Micros200 = 0x04,
    /// 800 μs ramp time
    Micros800 = 0x05,
    /// 1700 μs ramp time
    Micros1700 = 0x06,
    /// 3400 μs ramp time
    Micros3400 = 0x07,
}

/// TX parameters configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxParams {
    /// Output power in dBm
    /// - SX1261: -17 to +14 dBm
    /// - SX1262: -9 to +22 dBm
    pub power: i8,
    /// Power amplifier ramp time
    pub ramp_time: RampTime,
}

impl ToByteArray for TxParams {
    type Error = Infallible;
    type Array = [u8; 2];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.power as u8, self.ramp_time as u8])
    }
}

/// SetTxParams command (0x8E)
///
/// Must be configured after SetPaConfig.
#[derive(Debug, Clone)]
pub struct SetTxParams {
    /// TX parameters configuration
    pub params: TxParams,
}

impl Command for SetTxParams {
    type IdType = u8;
    type CommandParameters = TxParams;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x8E
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.params
    }
}

/// LoRa spreading factor, SF5 to SF12
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpreadingFactor {
    /// SF5
    Sf5 = 5,
    /// SF6
    Sf6 = 6,
    /// SF7
    Sf7 = 7,
    /// SF8
    Sf8 = 8,
    /// SF9
    Sf9 = 9,
    /// SF10
    Sf10 = 10,
    /// SF11
    Sf11 = 11,
    /// SF12
    Sf12 = 12,
}

impl TryFrom<u8> for SpreadingFactor {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            5 => Self::Sf5,
            6 => Self::Sf6,
            7 => Self::Sf7,
            8 => Self::Sf8,
            9 => Self::Sf9,
            10 => Self::Sf10,
            11 => Self::Sf11,
            12 => Self::Sf12,
            _ => {
                return Err(ConfigError::InvalidParameter(
                    "spreading factor must be within 5..=12",
                ))
            }
        })
    }
}

/// LoRa bandwidth, encoded as in datasheet table 13-48
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoRaBandwidth {
    /// 7.81 kHz
    Bw7 = 0x00,
    /// 10.42 kHz
    Bw10 = 0x08,
    /// 15.63 kHz
    Bw15 = 0x01,
    /// 20.83 kHz
    Bw20 = 0x09,
    /// 31.25 kHz
    Bw31 = 0x02,
    /// 41.67 kHz
    Bw41 = 0x0A,
    /// 62.5 kHz
    Bw62 = 0x03,
    /// 125 kHz
    Bw125 = 0x04,
    /// 250 kHz
    Bw250 = 0x05,
    /// 500 kHz
    Bw500 = 0x06,
}

impl LoRaBandwidth {
    /// Nominal bandwidth in Hz
    pub fn hz(self) -> u32 {
        match self {
            Self::Bw7 => 7_810,
            Self::Bw10 => 10_420,
            Self::Bw15 => 15_630,
            Self::Bw20 => 20_830,
            Self::Bw31 => 31_250,
            Self::Bw41 => 41_670,
            Self::Bw62 => 62_500,
            Self::Bw125 => 125_000,
            Self::Bw250 => 250_000,
            Self::Bw500 => 500_000,
        }
    }
}

/// LoRa forward error correction coding rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodingRate {
    /// 4/5
    Cr4_5 = 0x01,
    /// 4/6
    Cr4_6 = 0x02,
    /// 4/7
    Cr4_7 = 0x03,
    /// 4/8
    Cr4_8 = 0x04,
}

/// LoRa modulation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LoRaModulationParams {
    /// Spreading factor
    pub spreading_factor: SpreadingFactor,
    /// Bandwidth
    pub bandwidth: LoRaBandwidth,
    /// Coding rate
    pub coding_rate: CodingRate,
    /// Low data rate optimization
    pub low_data_rate_optimize: bool,
}

impl LoRaModulationParams {
    /// Builds modulation parameters, enabling low data rate optimization when
    /// the symbol time reaches 16.38 ms as the datasheet recommends.
    pub fn new(
        spreading_factor: SpreadingFactor,
        bandwidth: LoRaBandwidth,
        coding_rate: CodingRate,
    ) -> Self {
        let symbol_time_us = (1u64 << spreading_factor as u8) * 1_000_000 / bandwidth.hz() as u64;
        Self {
            spreading_factor,
            bandwidth,
            coding_rate,
            low_data_rate_optimize: symbol_time_us >= 16_380,
        }
    }

    /// Overrides the automatically chosen low data rate optimization.
    pub fn with_low_data_rate_optimize(mut self, enable: bool) -> Self {
        self.low_data_rate_optimize = enable;
        self
    }
}

impl ToByteArray for LoRaModulationParams {
    type Error = Infallible;
    type Array = [u8; 4];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([
            self.spreading_factor as u8,
            self.bandwidth as u8,
            self.coding_rate as u8,
            self.low_data_rate_optimize as u8,
        ])
    }
}

/// SetModulationParams command (0x8B)
///
/// Must be called after SetPacketType and before SetPacketParams.
#[derive(Debug, Clone)]
pub struct SetModulationParams {
    /// Modulation parameters
    pub params: LoRaModulationParams,
}

impl Command for SetModulationParams {
    type IdType = u8;
    type CommandParameters = LoRaModulationParams;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x8B
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.params
    }
}

/// LoRa header mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HeaderType {
    /// Explicit header carrying the payload length
    Variable = 0x00,
    /// Implicit header; both ends must agree on the payload length
    Fixed = 0x01,
}

/// LoRa payload CRC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CrcMode {
    /// No payload CRC
    Off = 0x00,
    /// Payload CRC appended and checked
    On = 0x01,
}

/// LoRa IQ polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IqMode {
    /// Standard IQ
    Normal = 0x00,
    /// Inverted IQ, used on LoRaWAN downlinks
    Inverted = 0x01,
}

/// LoRa packet parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LoRaPacketParams {
    /// Preamble length in symbols
    pub preamble_length: u16,
    /// Header mode
    pub header_type: HeaderType,
    /// Payload length; in fixed mode the exact length expected by the receiver
    pub payload_length: u8,
    /// Payload CRC
    pub crc: CrcMode,
    /// IQ polarity
    pub invert_iq: IqMode,
}

impl LoRaPacketParams {
    /// Validates and builds LoRa packet parameters.
    ///
    /// # Errors
    /// * `ConfigError::InvalidParameter` - zero preamble, or fixed header with zero payload length
    pub fn new(
        preamble_length: u16,
        header_type: HeaderType,
        payload_length: u8,
        crc: CrcMode,
        invert_iq: IqMode,
    ) -> Result<Self, ConfigError> {
        if preamble_length == 0 {
            return Err(ConfigError::InvalidParameter(
                "preamble length must be at least one symbol",
            ));
        }
        if header_type == HeaderType::Fixed && payload_length == 0 {
            return Err(ConfigError::InvalidParameter(
                "fixed length header requires a non-zero payload length",
            ));
        }
        Ok(Self {
            preamble_length,
            header_type,
            payload_length,
            crc,
            invert_iq,
        })
    }

    /// Same parameters with a different payload length.
    pub fn with_payload_length(mut self, payload_length: u8) -> Self {
        self.payload_length = payload_length;
        self
    }
}

impl ToByteArray for LoRaPacketParams {
    type Error = Infallible;
    type Array = [u8; 6];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        let preamble = self.preamble_length.to_be_bytes();
        Ok([
            preamble[0],
            preamble[1],
            self.header_type as u8,
            self.payload_length,
            self.crc as u8,
            self.invert_iq as u8,
        ])
    }
}

/// SetPacketParams command (0x8C)
///
/// Must be called after SetModulationParams.
#[derive(Debug, Clone)]
pub struct SetPacketParams {
    /// Packet parameters
    pub params: LoRaPacketParams,
}

impl Command for SetPacketParams {
    type IdType = u8;
    type CommandParameters = LoRaPacketParams;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x8C
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.params
    }
}

/// Number of symbols used for CAD
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CadSymbols {
    /// 1 symbol
    On1 = 0x00,
    /// 2 symbols
    On2 = 0x01,
    /// 4 symbols
    On4 = 0x02,
    /// 8 symbols
    On8 = 0x03,
    /// 16 symbols
    On16 = 0x04,
}

/// Action taken when CAD completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CadExitMode {
    /// Return to STDBY_RC
    CadOnly = 0x00,
    /// Stay in RX when activity was detected, until a packet or the timeout
    CadRx = 0x01,
}

/// Channel Activity Detection parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CadParams {
    /// Number of symbols for detection
    pub symbols: CadSymbols,
    /// Detection peak threshold
    pub detect_peak: u8,
    /// Detection minimum threshold
    pub detect_min: u8,
    /// Exit mode
    pub exit_mode: CadExitMode,
    /// Timeout in 15.625μs steps, CadRx only
    pub timeout: u32,
}

impl CadParams {
    /// Thresholds recommended by Semtech for a CAD-only scan at `sf`.
    pub fn for_spreading_factor(sf: SpreadingFactor) -> Self {
        let (symbols, detect_peak) = match sf {
            SpreadingFactor::Sf5 | SpreadingFactor::Sf6 | SpreadingFactor::Sf7 => {
                (CadSymbols::On2, 22)
            }
            SpreadingFactor::Sf8 => (CadSymbols::On2, 22),
            SpreadingFactor::Sf9 => (CadSymbols::On4, 23),
            SpreadingFactor::Sf10 => (CadSymbols::On4, 24),
            SpreadingFactor::Sf11 => (CadSymbols::On4, 25),
            SpreadingFactor::Sf12 => (CadSymbols::On4, 28),
        };
        Self {
            symbols,
            detect_peak,
            detect_min: 10,
            exit_mode: CadExitMode::CadOnly,
            timeout: 0,
        }
    }
}

impl ToByteArray for CadParams {
    type Error = Infallible;
    type Array = [u8; 7];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        let timeout = self.timeout.to_be_bytes();
        Ok([
            self.symbols as u8,
            self.detect_peak,
            self.detect_min,
            self.exit_mode as u8,
            timeout[1],
            timeout[2],
            timeout[3],
        ])
    }
}

/// SetCadParams command (0x88)
///
/// Only available in LoRa packet type.
#[derive(Debug, Clone)]
pub struct SetCadParams {
    /// CAD parameters
    pub params: CadParams,
}

impl Command for SetCadParams {
    type IdType = u8;
    type CommandParameters = CadParams;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x88
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.params
    }
}

/// Buffer base addresses configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BufferBaseAddressConfig {
    /// TX base address in data buffer
    pub tx_base_addr: u8,
    /// RX base address in data buffer
    pub rx_base_addr: u8,
}

impl ToByteArray for BufferBaseAddressConfig {
    type Error = Infallible;
    type Array = [u8; 2];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.tx_base_addr, self.rx_base_addr])
    }
}

/// SetBufferBaseAddress command (0x8F)
///
/// # Important Notes
/// - Buffer content is lost in Sleep mode
/// - A received packet longer than the RX region overwrites the TX region
#[derive(Debug, Clone)]
pub struct SetBufferBaseAddress {
    /// Buffer base addresses configuration
    pub config: BufferBaseAddressConfig,
}

impl Command for SetBufferBaseAddress {
    type IdType = u8;
    type CommandParameters = BufferBaseAddressConfig;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x8F
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.config
    }
}
