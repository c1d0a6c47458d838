//! Operational mode commands
//!
//! This module contains commands for controlling the radio's operating modes:
//! - Sleep mode for minimum power consumption
//! - Standby modes (RC and XOSC) for configuration
//! - Frequency synthesis mode for PLL locking
//! - Transmit, receive and channel activity detection
//! - Power amplifier and regulator configuration
//! - Calibration procedures
//!
//! Most configuration commands must be issued in STDBY_RC mode.

use bitflags::bitflags;
use core::convert::Infallible;

use crate::{Command, NoParameters, ToByteArray};

bitflags! {
    /// Sleep configuration options
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SleepConfig: u8 {
        /// Configuration retained in sleep (warm start); cold start when clear
        const WARM_START = 1 << 2;
        /// Wake up on RTC timeout as well as on NSS
        const RTC_WAKEUP = 1;
    }
}

impl ToByteArray for SleepConfig {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.bits()])
    }
}

/// SetSleep command (0x84)
///
/// # Important Notes
/// - Can only be issued from STDBY mode
/// - Takes ~500μs to save configuration before sleep
/// - No SPI commands should be sent during this time
/// - BUSY stays high until the device is woken by NSS or RTC
#[derive(Debug, Clone)]
pub struct SetSleep {
    /// Sleep configuration
    pub config: SleepConfig,
}

impl Command for SetSleep {
    type IdType = u8;
    type CommandParameters = SleepConfig;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x84
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.config
    }
}

/// Standby mode configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StandbyConfig {
    /// Device running on RC13M, used for configuration
    Rc = 0,
    /// Device running on XTAL 32MHz, faster transition to TX/RX
    Xosc = 1,
}

impl ToByteArray for StandbyConfig {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self as u8])
    }
}

/// SetStandby command (0x80)
///
/// Default mode after power-up/reset is STDBY_RC. Issued from TX or RX it
/// aborts the ongoing operation.
#[derive(Debug, Clone)]
pub struct SetStandby {
    /// Standby mode configuration
    pub config: StandbyConfig,
}

impl Command for SetStandby {
    type IdType = u8;
    type CommandParameters = StandbyConfig;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x80
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.config
    }
}

/// SetFs command (0xC1)
///
/// Locks the PLL to the configured frequency. BUSY goes low when locked.
#[derive(Debug, Clone)]
pub struct SetFs;

impl Command for SetFs {
    type IdType = u8;
    type CommandParameters = NoParameters;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0xC1
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        NoParameters::default()
    }
}

/// 24-bit timeout in steps of 15.625 μs
///
/// Values above 0xFFFFFF are truncated to the low 24 bits on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timeout(pub u32);

impl Timeout {
    /// No timeout for TX; single-shot reception for RX
    pub const NONE: Self = Self(0x000000);
    /// Continuous reception sentinel
    pub const CONTINUOUS: Self = Self(0xFFFFFF);

    /// Converts milliseconds to timer steps (64 steps per ms), saturating at 24 bits.
    pub fn from_millis(ms: u32) -> Self {
        Self((ms as u64 * 64).min(0xFFFFFE) as u32)
    }
}

impl ToByteArray for Timeout {
    type Error = Infallible;
    type Array = [u8; 3];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        let bytes = self.0.to_be_bytes();
        Ok([bytes[1], bytes[2], bytes[3]])
    }
}

/// SetTx command (0x83)
///
/// # Important Notes
/// - BUSY low when PA ramped and transmission starts
/// - Returns to the fallback mode after TxDone or Timeout
/// - Timeout 0 disables the timer
#[derive(Debug, Clone)]
pub struct SetTx {
    /// Timeout in steps of 15.625 μs
    pub timeout: Timeout,
}

impl Command for SetTx {
    type IdType = u8;
    type CommandParameters = Timeout;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x83
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.timeout
    }
}

/// RX operation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxMode {
    /// Return after receiving a single packet
    Single,
    /// Stay in RX until commanded out
    Continuous,
    /// Return after a packet or after the timeout, in steps of 15.625 μs
    Timed(u32),
}

impl RxMode {
    /// Whether the device stays in RX after a packet
    pub fn is_continuous(self) -> bool {
        matches!(self, Self::Continuous)
    }
}

impl From<RxMode> for Timeout {
    fn from(mode: RxMode) -> Self {
        match mode {
            RxMode::Single => Timeout::NONE,
            RxMode::Continuous => Timeout::CONTINUOUS,
            RxMode::Timed(timeout) => Timeout(timeout & 0xFFFFFF),
        }
    }
}

/// SetRx command (0x82)
///
/// Timer is stopped once a valid header (LoRa) is detected.
#[derive(Debug, Clone)]
pub struct SetRx {
    /// RX operation mode
    pub mode: RxMode,
}

impl Command for SetRx {
    type IdType = u8;
    type CommandParameters = Timeout;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x82
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.mode.into()
    }
}

/// SetCad command (0xC5)
///
/// Starts Channel Activity Detection with the parameters from SetCadParams.
/// Raises CadDone, and CadDetected when activity was seen.
#[derive(Debug, Clone)]
pub struct SetCad;

impl Command for SetCad {
    type IdType = u8;
    type CommandParameters = NoParameters;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0xC5
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        NoParameters::default()
    }
}

/// Regulator mode configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegulatorMode {
    /// Only LDO used for all modes
    #[default]
    LdoOnly = 0,
    /// DC-DC+LDO used for STBY_XOSC, FS, RX and TX; requires the inductor
    DcDcLdo = 1,
}

impl ToByteArray for RegulatorMode {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self as u8])
    }
}

/// SetRegulatorMode command (0x96)
///
/// Must be issued in STDBY_RC.
#[derive(Debug, Clone)]
pub struct SetRegulatorMode {
    /// Regulator mode selection
    pub mode: RegulatorMode,
}

impl Command for SetRegulatorMode {
    type IdType = u8;
    type CommandParameters = RegulatorMode;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x96
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.mode
    }
}

bitflags! {
    /// Blocks selected for calibration
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CalibrationConfig: u8 {
        /// RC64k oscillator calibration
        const RC64K = 1 << 0;
        /// RC13M oscillator calibration
        const RC13M = 1 << 1;
        /// PLL calibration
        const PLL = 1 << 2;
        /// ADC pulse calibration
        const ADC_PULSE = 1 << 3;
        /// ADC bulk N calibration
        const ADC_BULK_N = 1 << 4;
        /// ADC bulk P calibration
        const ADC_BULK_P = 1 << 5;
        /// Image rejection calibration
        const IMAGE = 1 << 6;
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self::all()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for CalibrationConfig {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "CalibrationConfig({=u8:#x})", self.bits())
    }
}

impl ToByteArray for CalibrationConfig {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.bits()])
    }
}

/// Calibrate command (0x89)
///
/// # Important Notes
/// - Must be called in STDBY_RC mode
/// - Takes up to 3.5ms for full calibration, BUSY high meanwhile
#[derive(Debug, Clone)]
pub struct Calibrate {
    /// Calibration configuration
    pub config: CalibrationConfig,
}

impl Command for Calibrate {
    type IdType = u8;
    type CommandParameters = CalibrationConfig;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x89
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.config
    }
}

/// Image calibration band, as the pair of frequency codes from the datasheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ImageCalibConfig {
    /// Start frequency code
    pub freq1: u8,
    /// Stop frequency code
    pub freq2: u8,
}

impl ImageCalibConfig {
    /// Band containing `hz`, or `None` below 425 MHz where no table entry exists.
    pub fn for_frequency(hz: u32) -> Option<Self> {
        let (freq1, freq2) = match hz {
            f if f > 900_000_000 => (0xE1, 0xE9),
            f if f > 850_000_000 => (0xD7, 0xDB),
            f if f > 770_000_000 => (0xC1, 0xC5),
            f if f > 460_000_000 => (0x75, 0x81),
            f if f > 425_000_000 => (0x6B, 0x6F),
            _ => return None,
        };
        Some(Self { freq1, freq2 })
    }
}

impl ToByteArray for ImageCalibConfig {
    type Error = Infallible;
    type Array = [u8; 2];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.freq1, self.freq2])
    }
}

/// CalibrateImage command (0x98)
///
/// Must be called in STDBY_RC. Required after changing frequency band.
#[derive(Debug, Clone)]
pub struct CalibrateImage {
    /// Image calibration configuration
    pub config: ImageCalibConfig,
}

impl Command for CalibrateImage {
    type IdType = u8;
    type CommandParameters = ImageCalibConfig;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x98
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.config
    }
}

/// Device selection for PA configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceSelect {
    /// SX1262 device (+22dBm max)
    Sx1262 = 0,
    /// SX1261 device (+15dBm max)
    Sx1261 = 1,
}

/// PA configuration parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PaConfig {
    /// PA duty cycle, see datasheet table 13-21
    pub duty_cycle: u8,
    /// HP max (SX1262 only), 0x00-0x07
    pub hp_max: u8,
    /// Device selection
    pub device_sel: DeviceSelect,
    /// PA LUT, always 0x01
    pub pa_lut: u8,
}

impl PaConfig {
    /// SX1262 at +22 dBm
    pub const SX1262_22DBM: Self = Self {
        duty_cycle: 0x04,
        hp_max: 0x07,
        device_sel: DeviceSelect::Sx1262,
        pa_lut: 0x01,
    };

    /// SX1261 at +14 dBm
    pub const SX1261_14DBM: Self = Self {
        duty_cycle: 0x04,
        hp_max: 0x00,
        device_sel: DeviceSelect::Sx1261,
        pa_lut: 0x01,
    };
}

impl ToByteArray for PaConfig {
    type Error = Infallible;
    type Array = [u8; 4];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([
            self.duty_cycle,
            self.hp_max,
            self.device_sel as u8,
            self.pa_lut,
        ])
    }
}

/// SetPaConfig command (0x95)
///
/// Must be configured before SetTxParams.
#[derive(Debug, Clone)]
pub struct SetPaConfig {
    /// PA configuration
    pub config: PaConfig,
}

impl Command for SetPaConfig {
    type IdType = u8;
    type CommandParameters = PaConfig;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x95
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.config
    }
}

/// Mode entered after TX/RX completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FallbackMode {
    /// FS mode, fastest transition to next TX/RX
    Fs = 0x40,
    /// STDBY_XOSC mode
    StdbyXosc = 0x30,
    /// STDBY_RC mode (device default)
    #[default]
    StdbyRc = 0x20,
}

impl ToByteArray for FallbackMode {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self as u8])
    }
}

/// SetRxTxFallbackMode command (0x93)
#[derive(Debug, Clone)]
pub struct SetRxTxFallbackMode {
    /// Fallback mode selection
    pub mode: FallbackMode,
}

impl Command for SetRxTxFallbackMode {
    type IdType = u8;
    type CommandParameters = FallbackMode;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x93
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rx_modes_map_to_timeout_sentinels() {
        assert_eq!(Timeout::from(RxMode::Single).to_bytes().unwrap(), [0, 0, 0]);
        assert_eq!(
            Timeout::from(RxMode::Continuous).to_bytes().unwrap(),
            [0xFF, 0xFF, 0xFF]
        );
        assert_eq!(
            Timeout::from(RxMode::Timed(0x012345)).to_bytes().unwrap(),
            [0x01, 0x23, 0x45]
        );
    }

    #[test]
    fn timeout_from_millis_saturates_below_continuous() {
        assert_eq!(Timeout::from_millis(1), Timeout(64));
        assert_eq!(Timeout::from_millis(1_000), Timeout(64_000));
        assert_eq!(Timeout::from_millis(u32::MAX), Timeout(0xFFFFFE));
    }

    #[test]
    fn image_calibration_bands() {
        assert_eq!(
            ImageCalibConfig::for_frequency(915_000_000),
            Some(ImageCalibConfig { freq1: 0xE1, freq2: 0xE9 })
        );
        assert_eq!(
            ImageCalibConfig::for_frequency(868_100_000),
            Some(ImageCalibConfig { freq1: 0xD7, freq2: 0xDB })
        );
        assert_eq!(
            ImageCalibConfig::for_frequency(433_000_000),
            Some(ImageCalibConfig { freq1: 0x6B, freq2: 0x6F })
        );
        assert_eq!(ImageCalibConfig::for_frequency(169_000_000), None);
    }
}
