use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;

use super::{check_status, Radio};
use crate::error::{BusError, RadioError};
use crate::state::RadioMode;
use crate::{
    Calibrate, CalibrationConfig, ClearDeviceErrors, DeviceErrors, GetStatus,
    LoraSyncWord, RegulatorMode, RfSwitchConfig, SetDio2AsRfSwitchCtrl, SetDio3AsTcxoCtrl,
    SetRegulatorMode, Status, TcxoConfig,
};

/// Board-level parameters applied once after reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BringUpConfig {
    /// TCXO powered from DIO3, `None` for a plain crystal
    pub tcxo: Option<TcxoConfig>,
    /// Blocks calibrated after the oscillator is up
    pub calibration: CalibrationConfig,
    /// Power regulator
    pub regulator: RegulatorMode,
    /// DIO2 drives the antenna switch
    pub rf_switch_on_dio2: bool,
}

impl Default for BringUpConfig {
    fn default() -> Self {
        Self {
            tcxo: None,
            calibration: CalibrationConfig::all(),
            regulator: RegulatorMode::default(),
            rf_switch_on_dio2: false,
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
    /// Pulses NRESET and waits for the device to boot into STDBY_RC.
    ///
    /// All tracked configuration is discarded.
    pub fn reset(&mut self) -> Result<(), RadioError> {
        debug!("hardware reset");
        self.reset.set_low().map_err(|_| BusError::Pin)?;
        self.delay.delay_ms(1);
        self.reset.set_high().map_err(|_| BusError::Pin)?;
        self.delay.delay_ms(10);
        self.wait_busy()?;

        self.invalidate();
        self.set_mode(RadioMode::StandbyRc);
        Ok(())
    }

    /// Reads the LoRa sync word MSB, which is 0x14 after every reset.
    ///
    /// A different value means the SPI link or the device is broken.
    pub fn sanity_check(&mut self) -> Result<(), RadioError> {
        let sync_word: LoraSyncWord = self.read_register()?;
        if sync_word.msb() != LoraSyncWord::RESET_MSB {
            error!(
                "sanity check failed: read {:#x}, expected {:#x}",
                sync_word.msb(),
                LoraSyncWord::RESET_MSB
            );
            return Err(RadioError::SanityCheck {
                expected: LoraSyncWord::RESET_MSB,
                found: sync_word.msb(),
            });
        }
        Ok(())
    }

    /// Resets and prepares the device for configuration.
    ///
    /// Sequence: reset, sanity check, clear device errors, TCXO, calibration,
    /// regulator, RF switch, then a final device error check. A failed sanity
    /// check aborts before any command is sent. On success the device is in
    /// STDBY_RC with no radio configuration applied.
    pub fn init(&mut self, config: &BringUpConfig) -> Result<(), RadioError> {
        info!("bringing up radio");
        self.reset()?;
        self.sanity_check()?;

        self.command(ClearDeviceErrors)?;

        if let Some(tcxo) = config.tcxo {
            debug!("tcxo on dio3: {:?}", tcxo);
            self.command(SetDio3AsTcxoCtrl { config: tcxo })?;
        }

        self.calibrate(config.calibration)?;

        self.command(SetRegulatorMode {
            mode: config.regulator,
        })?;

        if config.rf_switch_on_dio2 {
            self.command(SetDio2AsRfSwitchCtrl {
                config: RfSwitchConfig { enable: true },
            })?;
        }

        let status = self.status()?;
        check_status(status)?;

        let mut errors = self.get_device_errors()?;
        if config.tcxo.is_some() && errors.contains(DeviceErrors::XOSC_START) {
            // raised while the TCXO was still unpowered
            errors.remove(DeviceErrors::XOSC_START);
            self.clear_device_errors()?;
        }
        if !errors.is_empty() {
            error!("device errors after bring-up: {:?}", errors);
            return Err(RadioError::Device(errors));
        }

        info!("radio ready");
        Ok(())
    }

    /// Reads the status byte.
    ///
    /// From Sleep this also wakes the device; prefer [`Radio::set_standby`],
    /// which keeps the mode mirror in step.
    pub fn status(&mut self) -> Result<Status, RadioError> {
        if self.mode == RadioMode::Sleep {
            return Err(crate::ConfigError::InvalidMode { mode: self.mode }.into());
        }
        self.command(GetStatus)
    }

    /// Wakes the device with a GetStatus frame. BUSY is high while asleep,
    /// so the frame is sent without waiting on it.
    pub(super) fn wakeup(&mut self) -> Result<(), RadioError> {
        debug!("waking device");
        self.device.execute_command(GetStatus)?;
        self.wait_busy()
    }

    /// Sets the TCXO supply. Only takes effect from STDBY_RC and is undone
    /// only by a reset.
    pub fn set_tcxo(&mut self, config: TcxoConfig) -> Result<(), RadioError> {
        self.ensure_standby()?;
        self.command(SetDio3AsTcxoCtrl { config })?;
        Ok(())
    }

    /// Selects LDO or DC-DC regulation.
    pub fn set_regulator(&mut self, mode: RegulatorMode) -> Result<(), RadioError> {
        self.ensure_standby()?;
        self.command(SetRegulatorMode { mode })?;
        Ok(())
    }

    /// Lets DIO2 drive the antenna switch, high during TX.
    pub fn set_rf_switch(&mut self, enable: bool) -> Result<(), RadioError> {
        self.ensure_standby()?;
        self.command(SetDio2AsRfSwitchCtrl {
            config: RfSwitchConfig { enable },
        })?;
        Ok(())
    }

    /// Calibrates the selected blocks and returns to STDBY_RC.
    pub fn calibrate(&mut self, config: CalibrationConfig) -> Result<(), RadioError> {
        self.ensure_transition(RadioMode::Calibrating)?;
        self.set_mode(RadioMode::Calibrating);

        let result = self
            .command(Calibrate { config })
            .and_then(|_| self.wait_busy());

        // the device falls back to STDBY_RC whether or not calibration succeeded
        self.set_mode(RadioMode::StandbyRc);
        result
    }
}
