//! Radio mode mirror and transition table
//!
//! The driver keeps its own belief of the device operating mode and of which
//! configuration steps have been applied since the last reset or wake-up.
//! [`check_transition`] is the single gate every mode change passes through;
//! it is pure so the table can be tested without a bus.

use bitflags::bitflags;

use crate::error::ConfigError;

/// Device operating mode as tracked by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioMode {
    /// Sleep, configuration lost unless warm start was requested
    Sleep,
    /// Standby on the 13 MHz RC oscillator
    StandbyRc,
    /// Standby on the crystal or TCXO
    StandbyXosc,
    /// Frequency synthesizer locked
    Fs,
    /// Transmitting
    Tx,
    /// Receiving
    Rx,
    /// Calibration in progress
    Calibrating,
    /// Channel activity detection in progress
    Cad,
}

impl RadioMode {
    /// Every mode, in declaration order.
    pub const ALL: [RadioMode; 8] = [
        RadioMode::Sleep,
        RadioMode::StandbyRc,
        RadioMode::StandbyXosc,
        RadioMode::Fs,
        RadioMode::Tx,
        RadioMode::Rx,
        RadioMode::Calibrating,
        RadioMode::Cad,
    ];

    /// True for either standby mode.
    pub fn is_standby(self) -> bool {
        matches!(self, Self::StandbyRc | Self::StandbyXosc)
    }

    /// True while a TX, RX or CAD operation is armed.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Tx | Self::Rx | Self::Cad)
    }

    /// Chip mode field of the status byte expected in this mode, if the
    /// device can report one.
    pub fn chip_mode(self) -> Option<crate::ChipMode> {
        use crate::ChipMode;
        match self {
            Self::StandbyRc | Self::Calibrating => Some(ChipMode::StandbyRc),
            Self::StandbyXosc => Some(ChipMode::StandbyXosc),
            Self::Fs => Some(ChipMode::FrequencySynthesis),
            Self::Tx => Some(ChipMode::Transmit),
            Self::Rx | Self::Cad => Some(ChipMode::Receive),
            Self::Sleep => None,
        }
    }
}

bitflags! {
    /// Configuration steps applied since the last reset or wake-up
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct ConfigFlags: u8 {
        /// SetPacketType
        const PACKET_TYPE = 1 << 0;
        /// SetRfFrequency
        const RF_FREQUENCY = 1 << 1;
        /// SetModulationParams
        const MODULATION = 1 << 2;
        /// SetPacketParams
        const PACKET = 1 << 3;
        /// SetBufferBaseAddress
        const BUFFER_BASE = 1 << 4;
        /// Payload written to the TX region
        const TX_PAYLOAD = 1 << 5;
        /// SetDioIrqParams
        const DIO_IRQ = 1 << 6;
    }
}

impl ConfigFlags {
    /// Needed to lock the synthesizer
    pub const FS_READY: Self = Self::PACKET_TYPE.union(Self::RF_FREQUENCY);

    /// Needed to receive
    pub const RX_READY: Self = Self::FS_READY
        .union(Self::MODULATION)
        .union(Self::PACKET)
        .union(Self::BUFFER_BASE)
        .union(Self::DIO_IRQ);

    /// Needed to transmit
    pub const TX_READY: Self = Self::RX_READY.union(Self::TX_PAYLOAD);

    /// Needed to run channel activity detection
    pub const CAD_READY: Self = Self::FS_READY
        .union(Self::MODULATION)
        .union(Self::DIO_IRQ);

    /// Steps invalidated by changing the packet type
    pub const PACKET_TYPE_DEPENDENT: Self = Self::MODULATION.union(Self::PACKET);
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConfigFlags {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "ConfigFlags({=u8:#x})", self.bits())
    }
}

fn required_source(to: RadioMode, from: RadioMode) -> bool {
    use RadioMode::*;
    match to {
        StandbyRc | StandbyXosc => from != Calibrating,
        Fs => from.is_standby(),
        Tx | Rx => from == Fs,
        Cad => from.is_standby() || from == Fs,
        Sleep => from.is_standby(),
        Calibrating => from == StandbyRc,
    }
}

fn required_flags(to: RadioMode) -> ConfigFlags {
    match to {
        RadioMode::Fs => ConfigFlags::FS_READY,
        RadioMode::Tx => ConfigFlags::TX_READY,
        RadioMode::Rx => ConfigFlags::RX_READY,
        RadioMode::Cad => ConfigFlags::CAD_READY,
        _ => ConfigFlags::empty(),
    }
}

/// Decides whether the device may move from `from` to `to` with the
/// configuration steps in `applied`.
///
/// # Errors
/// * `ConfigError::InvalidStateTransition` - `to` cannot be entered from `from`
/// * `ConfigError::MissingPrerequisite` - `to` needs configuration not yet applied
pub fn check_transition(
    from: RadioMode,
    to: RadioMode,
    applied: ConfigFlags,
) -> Result<(), ConfigError> {
    if !required_source(to, from) {
        return Err(ConfigError::InvalidStateTransition { from, to });
    }

    let missing = required_flags(to).difference(applied);
    if !missing.is_empty() {
        return Err(ConfigError::MissingPrerequisite { missing });
    }

    Ok(())
}
