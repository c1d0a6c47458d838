use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;

use super::Radio;
use crate::error::RadioError;
use crate::state::RadioMode;
use crate::{
    CadParams, EventMask, FallbackMode, HeaderType, LoRaBandwidth, RtcControl, RxMode, SetCad,
    SetCadParams, SetFs, SetRx, SetSleep, SetStandby, SetTx, SleepConfig, StandbyConfig, Timeout,
    TxModulation,
};

impl From<FallbackMode> for RadioMode {
    fn from(mode: FallbackMode) -> Self {
        match mode {
            FallbackMode::Fs => RadioMode::Fs,
            FallbackMode::StdbyXosc => RadioMode::StandbyXosc,
            FallbackMode::StdbyRc => RadioMode::StandbyRc,
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
    /// Enters standby, waking the device first when it is asleep.
    ///
    /// Leaving TX, RX or CAD this way aborts the operation without an event.
    /// Waking from sleep discards all tracked configuration: packet type,
    /// frequency, modulation and packet parameters must be applied again.
    pub fn set_standby(&mut self, config: StandbyConfig) -> Result<(), RadioError> {
        let target = match config {
            StandbyConfig::Rc => RadioMode::StandbyRc,
            StandbyConfig::Xosc => RadioMode::StandbyXosc,
        };
        self.ensure_transition(target)?;

        if self.mode == RadioMode::Sleep {
            self.wakeup()?;
            self.invalidate();
        }

        let leaving_rx = self.mode == RadioMode::Rx;
        self.command(SetStandby { config })?;
        self.set_mode(target);

        if leaving_rx {
            self.stop_rx_timer()?;
        }
        self.rx_mode = None;
        Ok(())
    }

    /// Aborts any TX, RX or CAD and returns to STDBY_RC.
    ///
    /// Idempotent: in standby already, nothing is sent.
    pub fn abort(&mut self) -> Result<(), RadioError> {
        if self.mode.is_standby() {
            return Ok(());
        }
        info!("aborting {:?}", self.mode);
        self.set_standby(StandbyConfig::Rc)
    }

    /// Locks the frequency synthesizer.
    pub fn set_fs(&mut self) -> Result<(), RadioError> {
        self.ensure_transition(RadioMode::Fs)?;
        self.command(SetFs)?;
        self.set_mode(RadioMode::Fs);
        Ok(())
    }

    /// Puts the device to sleep. The data buffer and, without warm start,
    /// every setting is lost; the driver forgets its configuration either way.
    pub fn set_sleep(&mut self, config: SleepConfig) -> Result<(), RadioError> {
        self.ensure_transition(RadioMode::Sleep)?;
        self.command(SetSleep { config })?;
        // NSS must stay high for 500 us before the device can be woken
        self.delay.delay_us(500);
        self.invalidate();
        self.set_mode(RadioMode::Sleep);
        Ok(())
    }

    /// Starts transmitting whatever was written to the TX region.
    ///
    /// Requires FS and a complete configuration including a payload. The
    /// device leaves TX on TxDone or on `timeout`, into the fallback mode.
    pub fn start_tx(&mut self, timeout: Timeout) -> Result<(), RadioError> {
        self.ensure_transition(RadioMode::Tx)?;

        let bw500 = matches!(
            self.modulation,
            Some(params) if params.bandwidth == LoRaBandwidth::Bw500
        );
        let modulation: TxModulation = self.read_register()?;
        self.write_register(modulation.for_bw500(bw500))?;

        self.command(SetTx { timeout })?;
        self.set_mode(RadioMode::Tx);
        Ok(())
    }

    /// Starts receiving.
    ///
    /// In [`RxMode::Continuous`] the device stays in RX after each packet;
    /// otherwise it leaves RX after one packet or the timeout.
    pub fn start_rx(&mut self, mode: RxMode) -> Result<(), RadioError> {
        self.ensure_transition(RadioMode::Rx)?;
        self.command(SetRx { mode })?;
        self.rx_mode = Some(mode);
        self.set_mode(RadioMode::Rx);
        Ok(())
    }

    /// Runs channel activity detection, reported as
    /// [`RadioEvent::CadDone`](crate::RadioEvent::CadDone).
    pub fn start_cad(&mut self, params: CadParams) -> Result<(), RadioError> {
        self.ensure_transition(RadioMode::Cad)?;
        self.ensure_lora()?;
        self.command(SetCadParams { params })?;
        self.command(SetCad)?;
        self.cad_exit = params.exit_mode;
        self.set_mode(RadioMode::Cad);
        Ok(())
    }

    /// Compares the chip mode in the status byte with the tracked mode.
    ///
    /// Nothing is read while asleep, since the read would wake the device.
    pub fn verify_mode(&mut self) -> Result<(), RadioError> {
        let Some(expected) = self.mode.chip_mode() else {
            return Ok(());
        };
        let status = self.status()?;
        match status.chip_mode() {
            Ok(reported) if reported == expected => Ok(()),
            _ => {
                error!("device reports status {:#x} while in {:?}", status.0, self.mode);
                Err(RadioError::ModeMismatch {
                    expected: self.mode,
                    reported: status.0,
                })
            }
        }
    }

    /// Mode the device enters once TX or a single RX completes
    pub(super) fn fallback_mode(&self) -> RadioMode {
        self.fallback.into()
    }

    /// Implicit header RX with a timeout leaves the RTC running once RX
    /// ends; stop it and clear the pending timeout event.
    pub(super) fn stop_rx_timer(&mut self) -> Result<(), RadioError> {
        let implicit = matches!(self.packet, Some(p) if p.header_type == HeaderType::Fixed);
        let timed = matches!(self.rx_mode, Some(mode) if !mode.is_continuous());
        if !(implicit && timed) {
            return Ok(());
        }

        trace!("stopping rtc after implicit header rx");
        self.write_register(RtcControl::STOPPED)?;
        let events: EventMask = self.read_register()?;
        self.write_register(events.with_timeout_cleared())
    }
}
