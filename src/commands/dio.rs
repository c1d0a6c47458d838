//! DIO and IRQ control commands
//!
//! This module contains commands for configuring and controlling:
//! - DIO pin mapping and functionality
//! - IRQ generation, readout and clearing
//! - RF switch control via DIO2
//! - TCXO control via DIO3
//!
//! The SX126x has 3 configurable DIO pins and 10 interrupt sources.
//! Each interrupt can be mapped to any DIO pin, and multiple interrupts
//! can be mapped to the same pin (OR function).

use bitflags::bitflags;
use core::convert::Infallible;

use regiface::FromByteArray;

use crate::{Command, NoParameters, Status, ToByteArray};

bitflags! {
    /// IRQ status bits, shared by the enable mask, the DIO mapping masks,
    /// GetIrqStatus and ClearIrqStatus.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct IrqMask: u16 {
        /// Packet transmission completed
        const TX_DONE = 1 << 0;
        /// Packet received
        const RX_DONE = 1 << 1;
        /// Preamble detected
        const PREAMBLE_DETECTED = 1 << 2;
        /// Valid sync word detected (FSK)
        const SYNC_WORD_VALID = 1 << 3;
        /// Valid LoRa header received
        const HEADER_VALID = 1 << 4;
        /// LoRa header CRC error
        const HEADER_ERROR = 1 << 5;
        /// Wrong CRC received
        const CRC_ERROR = 1 << 6;
        /// Channel activity detection finished
        const CAD_DONE = 1 << 7;
        /// Channel activity detected
        const CAD_DETECTED = 1 << 8;
        /// RX or TX timeout
        const TIMEOUT = 1 << 9;
    }
}

impl IrqMask {
    /// Bits that terminate an operation and are reported to the application.
    pub const OUTCOMES: Self = Self::TX_DONE
        .union(Self::RX_DONE)
        .union(Self::HEADER_ERROR)
        .union(Self::CRC_ERROR)
        .union(Self::CAD_DONE)
        .union(Self::CAD_DETECTED)
        .union(Self::TIMEOUT);

    /// Progress bits that never produce an event on their own.
    pub const INFORMATIONAL: Self = Self::PREAMBLE_DETECTED
        .union(Self::SYNC_WORD_VALID)
        .union(Self::HEADER_VALID);
}

#[cfg(feature = "defmt")]
impl defmt::Format for IrqMask {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "IrqMask({=u16:#x})", self.bits())
    }
}

/// DIO and IRQ configuration parameters
///
/// An IRQ is raised in the status register when enabled in `irq_mask`, and
/// drives a DIO pin when additionally set in that pin's mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DioIrqConfig {
    /// IRQ enable mask
    pub irq_mask: IrqMask,
    /// IRQs routed to DIO1
    pub dio1_mask: IrqMask,
    /// IRQs routed to DIO2, ignored when DIO2 drives an RF switch
    pub dio2_mask: IrqMask,
    /// IRQs routed to DIO3, ignored when DIO3 powers a TCXO
    pub dio3_mask: IrqMask,
}

impl Default for DioIrqConfig {
    /// Every source enabled, every outcome routed to DIO1.
    fn default() -> Self {
        Self {
            irq_mask: IrqMask::all(),
            dio1_mask: IrqMask::OUTCOMES,
            dio2_mask: IrqMask::empty(),
            dio3_mask: IrqMask::empty(),
        }
    }
}

impl ToByteArray for DioIrqConfig {
    type Error = Infallible;
    type Array = [u8; 8];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        let mut bytes = [0u8; 8];
        bytes[0..2].copy_from_slice(&self.irq_mask.bits().to_be_bytes());
        bytes[2..4].copy_from_slice(&self.dio1_mask.bits().to_be_bytes());
        bytes[4..6].copy_from_slice(&self.dio2_mask.bits().to_be_bytes());
        bytes[6..8].copy_from_slice(&self.dio3_mask.bits().to_be_bytes());
        Ok(bytes)
    }
}

/// SetDioIrqParams command (0x08)
///
/// Configures the mapping between interrupt sources and DIO pins.
#[derive(Debug, Clone)]
pub struct SetDioIrqParams {
    /// DIO and IRQ configuration parameters
    pub config: DioIrqConfig,
}

impl Command for SetDioIrqParams {
    type IdType = u8;
    type CommandParameters = DioIrqConfig;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x08
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.config
    }
}

/// GetIrqStatus response
#[derive(Debug, Clone, Copy)]
pub struct GetIrqStatusResponse {
    /// Device status from the first response byte
    pub status: Status,
    /// Pending IRQ flags
    pub irq: IrqMask,
}

impl FromByteArray for GetIrqStatusResponse {
    type Error = Infallible;
    type Array = [u8; 3];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            status: Status(bytes[0]),
            irq: IrqMask::from_bits_retain(u16::from_be_bytes([bytes[1], bytes[2]])),
        })
    }
}

/// GetIrqStatus command (0x12)
///
/// # Important Notes
/// - Flags remain set until explicitly cleared
/// - Reading status does not clear flags
#[derive(Debug, Clone)]
pub struct GetIrqStatus;

impl Command for GetIrqStatus {
    type IdType = u8;
    type CommandParameters = NoParameters;
    type ResponseParameters = GetIrqStatusResponse;

    fn id() -> Self::IdType {
        0x12
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        NoParameters::default()
    }
}

impl ToByteArray for IrqMask {
    type Error = Infallible;
    type Array = [u8; 2];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok(self.bits().to_be_bytes())
    }
}

/// ClearIrqStatus command (0x02)
///
/// Clears exactly the flags set in `mask`. A flag left set keeps its DIO asserted.
#[derive(Debug, Clone)]
pub struct ClearIrqStatus {
    /// Flags to clear
    pub mask: IrqMask,
}

impl Command for ClearIrqStatus {
    type IdType = u8;
    type CommandParameters = IrqMask;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x02
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.mask
    }
}

/// RF switch control configuration
#[derive(Debug, Clone, Copy)]
pub struct RfSwitchConfig {
    /// true = DIO2 is high in TX and low otherwise
    pub enable: bool,
}

impl ToByteArray for RfSwitchConfig {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.enable as u8])
    }
}

/// SetDio2AsRfSwitchCtrl command (0x9D)
#[derive(Debug, Clone)]
pub struct SetDio2AsRfSwitchCtrl {
    /// RF switch configuration
    pub config: RfSwitchConfig,
}

impl Command for SetDio2AsRfSwitchCtrl {
    type IdType = u8;
    type CommandParameters = RfSwitchConfig;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x9D
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.config
    }
}

/// TCXO supply voltage driven on DIO3
///
/// VBAT must be at least 200mV higher than the selected voltage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TcxoVoltage {
    /// 1.6V
    V1_6 = 0x00,
    /// 1.7V
    V1_7 = 0x01,
    /// 1.8V
    V1_8 = 0x02,
    /// 2.2V
    V2_2 = 0x03,
    /// 2.4V
    V2_4 = 0x04,
    /// 2.7V
    V2_7 = 0x05,
    /// 3.0V
    V3_0 = 0x06,
    /// 3.3V
    V3_3 = 0x07,
}

/// TCXO control configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TcxoConfig {
    /// TCXO supply voltage
    pub voltage: TcxoVoltage,
    /// Start-up delay in steps of 15.625 μs, 24 bits
    pub delay: u32,
}

impl ToByteArray for TcxoConfig {
    type Error = Infallible;
    type Array = [u8; 4];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        let delay = self.delay.to_be_bytes();
        Ok([self.voltage as u8, delay[1], delay[2], delay[3]])
    }
}

/// SetDio3AsTcxoCtrl command (0x97)
///
/// # Important Notes
/// - Chip waits `delay` after enabling the TCXO before using it
/// - XOSC_START error is raised at power-up when a TCXO is used; clear it
///   and recalibrate after issuing this command
/// - A full reset is required to return to XOSC operation
#[derive(Debug, Clone)]
pub struct SetDio3AsTcxoCtrl {
    /// TCXO configuration
    pub config: TcxoConfig,
}

impl Command for SetDio3AsTcxoCtrl {
    type IdType = u8;
    type CommandParameters = TcxoConfig;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x97
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dio_irq_config_layout() {
        let config = DioIrqConfig {
            irq_mask: IrqMask::all(),
            dio1_mask: IrqMask::TX_DONE | IrqMask::TIMEOUT,
            dio2_mask: IrqMask::empty(),
            dio3_mask: IrqMask::CAD_DETECTED,
        };
        assert_eq!(
            config.to_bytes().unwrap(),
            [0x03, 0xFF, 0x02, 0x01, 0x00, 0x00, 0x01, 0x00]
        );
    }

    #[test]
    fn irq_status_keeps_unknown_bits() {
        let response = GetIrqStatusResponse::from_bytes([0x52, 0x40, 0x42]).unwrap();
        assert!(response.irq.contains(IrqMask::RX_DONE | IrqMask::CRC_ERROR));
        assert_eq!(response.irq.bits(), 0x4042);
    }

    #[test]
    fn tcxo_delay_is_24_bits() {
        let config = TcxoConfig {
            voltage: TcxoVoltage::V3_3,
            delay: 0x000FFF,
        };
        assert_eq!(config.to_bytes().unwrap(), [0x07, 0x00, 0x0F, 0xFF]);
    }

    #[test]
    fn outcome_and_informational_masks_are_disjoint() {
        assert!(IrqMask::OUTCOMES.intersection(IrqMask::INFORMATIONAL).is_empty());
        assert_eq!(IrqMask::OUTCOMES | IrqMask::INFORMATIONAL, IrqMask::all());
    }
}
