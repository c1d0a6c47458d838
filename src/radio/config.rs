use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;

use super::{check_status, Radio};
use crate::error::{ConfigError, RadioError};
use crate::state::{ConfigFlags, RadioMode};
use crate::{
    CalibrateImage, DeviceSelect, FallbackMode, GetPacketType, ImageCalibConfig, IqPolaritySetup,
    IqMode, LoRaModulationParams, LoRaPacketParams, LoraSyncWord, PaConfig, PacketType,
    RfFrequencyConfig, SetModulationParams, SetPaConfig, SetPacketParams, SetPacketType,
    SetRfFrequency, SetRxTxFallbackMode, SetTxParams, TxClampConfig, TxParams,
    RF_FREQUENCY_MAX_HZ, RF_FREQUENCY_MIN_HZ,
};

fn check_frequency(hz: u32) -> Result<(), ConfigError> {
    if (RF_FREQUENCY_MIN_HZ..=RF_FREQUENCY_MAX_HZ).contains(&hz) {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter(
            "rf frequency must be within 150-960 MHz",
        ))
    }
}

impl<SPI, BUSY, RESET, DELAY> Radio<SPI, BUSY, RESET, DELAY>
where
    SPI: SpiDevice,
    BUSY: InputPin,
    RESET: OutputPin,
    DELAY: DelayNs,
{
    /// Selects the packet type.
    ///
    /// Changing the type invalidates modulation and packet parameters.
    /// Setting the current type again changes nothing.
    pub fn set_packet_type(&mut self, packet_type: PacketType) -> Result<(), RadioError> {
        self.ensure_standby()?;
        self.command(SetPacketType { packet_type })?;

        if self.packet_type != Some(packet_type) {
            self.applied.remove(ConfigFlags::PACKET_TYPE_DEPENDENT);
            self.modulation = None;
            self.packet = None;
            self.packet_on_device = None;
        }
        self.packet_type = Some(packet_type);
        self.applied.insert(ConfigFlags::PACKET_TYPE);
        Ok(())
    }

    /// Reads the packet type back from the device.
    pub fn get_packet_type(&mut self) -> Result<PacketType, RadioError> {
        self.ensure_awake()?;
        let response = self.command(GetPacketType)?;
        check_status(response.status)?;
        response.packet_type().map_err(|raw| {
            warn!("undocumented packet type {:#x}", raw);
            RadioError::Bus(crate::BusError::Response)
        })
    }

    /// Sets the carrier frequency.
    ///
    /// The first frequency in a band after reset also calibrates the image
    /// rejection for that band.
    pub fn set_rf_frequency(&mut self, hz: u32) -> Result<(), RadioError> {
        check_frequency(hz)?;
        self.ensure_standby()?;

        match ImageCalibConfig::for_frequency(hz) {
            Some(config) if self.image_calibration != Some(config) => {
                debug!("image calibration for {} Hz", hz);
                self.command(CalibrateImage { config })?;
                self.wait_busy()?;
                self.image_calibration = Some(config);
            }
            _ => {}
        }

        let config = RfFrequencyConfig::from_hz(hz);
        trace!("{} Hz -> {:#x} steps", hz, config.pll_steps);
        self.command(SetRfFrequency { config })?;
        self.frequency_hz = Some(hz);
        self.applied.insert(ConfigFlags::RF_FREQUENCY);
        Ok(())
    }

    /// Writes LoRa modulation parameters. Requires the LoRa packet type.
    pub fn set_modulation_params(
        &mut self,
        params: &LoRaModulationParams,
    ) -> Result<(), RadioError> {
        self.ensure_standby()?;
        self.ensure_lora()?;

        self.command(SetModulationParams { params: *params })?;
        self.modulation = Some(*params);
        self.applied.insert(ConfigFlags::MODULATION);
        Ok(())
    }

    /// Writes LoRa packet parameters. Modulation parameters must come first.
    pub fn set_packet_params(&mut self, params: &LoRaPacketParams) -> Result<(), RadioError> {
        self.ensure_standby()?;
        self.ensure_lora()?;
        if !self.applied.contains(ConfigFlags::MODULATION) {
            return Err(ConfigError::MissingPrerequisite {
                missing: ConfigFlags::MODULATION,
            }
            .into());
        }

        self.write_packet_params(params)?;
        self.packet = Some(*params);
        self.applied.insert(ConfigFlags::PACKET);
        Ok(())
    }

    /// Sends packet parameters to the device without making them the
    /// configured ones. Used for the per-packet TX length.
    pub(super) fn write_packet_params(
        &mut self,
        params: &LoRaPacketParams,
    ) -> Result<(), RadioError> {
        self.command(SetPacketParams { params: *params })?;
        self.packet_on_device = None;

        let polarity: IqPolaritySetup = self.read_register()?;
        self.write_register(polarity.with_inverted_iq(params.invert_iq == IqMode::Inverted))?;

        self.packet_on_device = Some(*params);
        Ok(())
    }

    /// Puts the configured packet parameters back on the device if a
    /// transmission replaced its payload length.
    pub(super) fn restore_packet_params(&mut self) -> Result<(), RadioError> {
        let Some(packet) = self.packet else {
            return Ok(());
        };
        if self.packet_on_device == Some(packet) {
            return Ok(());
        }

        debug!("restoring payload length {}", packet.payload_length);
        if !self.mode.is_standby() {
            self.set_standby(crate::StandbyConfig::Rc)?;
        }
        self.write_packet_params(&packet)
    }

    /// Selects the power amplifier. For the SX1262 PA this also raises the
    /// clamp threshold.
    pub fn set_pa_config(&mut self, config: PaConfig) -> Result<(), RadioError> {
        self.ensure_standby()?;
        self.command(SetPaConfig { config })?;

        if config.device_sel == DeviceSelect::Sx1262 {
            let clamp: TxClampConfig = self.read_register()?;
            self.write_register(clamp.with_max_threshold())?;
        }
        self.pa_device = Some(config.device_sel);
        Ok(())
    }

    /// Sets output power and ramp time. The power range depends on the PA
    /// selected by [`Radio::set_pa_config`].
    pub fn set_tx_params(&mut self, params: TxParams) -> Result<(), RadioError> {
        let range = match self.pa_device {
            Some(DeviceSelect::Sx1261) => -17..=14,
            Some(DeviceSelect::Sx1262) => -9..=22,
            None => -17..=22,
        };
        if !range.contains(&params.power) {
            return Err(ConfigError::InvalidParameter("tx power out of range for the pa").into());
        }
        self.ensure_standby()?;
        self.command(SetTxParams { params })?;
        Ok(())
    }

    /// Selects the mode the device enters after TX or a single RX.
    pub fn set_fallback_mode(&mut self, mode: FallbackMode) -> Result<(), RadioError> {
        self.ensure_standby()?;
        self.command(SetRxTxFallbackMode { mode })?;
        self.fallback = mode;
        Ok(())
    }

    /// Writes the LoRa sync word.
    pub fn set_sync_word(&mut self, sync_word: LoraSyncWord) -> Result<(), RadioError> {
        self.ensure_standby()?;
        self.write_register(sync_word)
    }

    /// Prepares the device for LoRa TX and RX in one call.
    ///
    /// Returns to STDBY_RC, then applies packet type, frequency, modulation
    /// and packet parameters, buffer bases at 0 and the default DIO/IRQ
    /// routing. Refused while TX, RX or CAD is armed.
    pub fn configure(
        &mut self,
        packet_type: PacketType,
        modulation: &LoRaModulationParams,
        packet: &LoRaPacketParams,
        rf_frequency_hz: u32,
    ) -> Result<(), RadioError> {
        if self.mode.is_active() || self.mode == RadioMode::Calibrating {
            warn!("configure refused in {:?}", self.mode);
            return Err(ConfigError::InvalidMode { mode: self.mode }.into());
        }
        if packet_type != PacketType::LoRa {
            return Err(ConfigError::PacketTypeMismatch.into());
        }
        check_frequency(rf_frequency_hz)?;

        info!(
            "configuring LoRa at {} Hz: {:?} {:?}",
            rf_frequency_hz,
            modulation,
            packet
        );
        self.set_standby(crate::StandbyConfig::Rc)?;
        self.set_packet_type(packet_type)?;
        self.set_rf_frequency(rf_frequency_hz)?;
        self.set_modulation_params(modulation)?;
        self.set_packet_params(packet)?;
        self.set_buffer_base_address(0, 0)?;
        self.set_dio_irq_params(crate::DioIrqConfig::default())?;
        Ok(())
    }
}
