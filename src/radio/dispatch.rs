use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;

use super::{check_status, Radio, BUFFER_CAPACITY};
use crate::error::{ConfigError, RadioError};
use crate::irq::{decide, IrqOutcome, RadioEvent, RxMetadata};
use crate::state::{check_transition, ConfigFlags, RadioMode};
use crate::{
    CadExitMode, ClearDeviceErrors, ClearIrqStatus, DeviceErrors, DioIrqConfig, GetDeviceErrors,
    GetIrqStatus, GetRssiInst, GetStats, IrqMask, ResetStats, RxMode, SetDioIrqParams,
    StandbyConfig, Stats,
};

impl<SPI, BUSY, RESET, DELAY> Radio<SPI, BUSY, RESET, DELAY>
where
    SPI: SpiDevice,
    BUSY: InputPin,
    RESET: OutputPin,
    DELAY: DelayNs,
{
    /// Enables IRQ sources and routes them to DIO pins.
    pub fn set_dio_irq_params(&mut self, config: DioIrqConfig) -> Result<(), RadioError> {
        self.ensure_standby()?;
        self.command(SetDioIrqParams { config })?;
        self.applied.insert(ConfigFlags::DIO_IRQ);
        Ok(())
    }

    /// Reads the pending IRQ flags without clearing them.
    pub fn get_irq_status(&mut self) -> Result<IrqMask, RadioError> {
        self.ensure_awake()?;
        let response = self.command(GetIrqStatus)?;
        check_status(response.status)?;
        Ok(response.irq)
    }

    /// Clears exactly the flags in `mask`.
    pub fn clear_irq_status(&mut self, mask: IrqMask) -> Result<(), RadioError> {
        self.ensure_awake()?;
        self.command(ClearIrqStatus { mask })?;
        Ok(())
    }

    /// Reads the hardware fault flags.
    pub fn get_device_errors(&mut self) -> Result<DeviceErrors, RadioError> {
        self.ensure_awake()?;
        let response = self.command(GetDeviceErrors)?;
        check_status(response.status)?;
        if !response.errors.is_empty() {
            warn!("device errors: {:?}", response.errors);
        }
        Ok(response.errors)
    }

    /// Clears every hardware fault flag.
    pub fn clear_device_errors(&mut self) -> Result<(), RadioError> {
        self.ensure_awake()?;
        self.command(ClearDeviceErrors)?;
        Ok(())
    }

    /// Reception counters since the last reset of the statistics.
    pub fn get_stats(&mut self) -> Result<Stats, RadioError> {
        self.ensure_awake()?;
        let response = self.command(GetStats)?;
        check_status(response.status)?;
        Ok(response.stats)
    }

    /// Zeroes the reception counters.
    pub fn reset_stats(&mut self) -> Result<(), RadioError> {
        self.ensure_awake()?;
        self.command(ResetStats)?;
        Ok(())
    }

    /// Instantaneous RSSI in dBm. Only available in RX.
    pub fn get_rssi_inst(&mut self) -> Result<i16, RadioError> {
        if self.mode != RadioMode::Rx {
            return Err(ConfigError::InvalidMode { mode: self.mode }.into());
        }
        let response = self.command(GetRssiInst)?;
        check_status(response.status)?;
        Ok(response.rssi_dbm())
    }

    /// Registers the function that receives every dispatched event.
    pub fn on_event(&mut self, handler: fn(RadioEvent)) {
        self.handler = Some(handler);
    }

    /// Services the IRQ line.
    ///
    /// Reads the IRQ status, decides on at most one event, updates the mode
    /// mirror, hands the event to the registered handler and only then
    /// clears the bits that produced it. Anything else still pending keeps
    /// DIO1 asserted, so the caller should dispatch again while this returns
    /// `Some`.
    pub fn dispatch_irq(&mut self) -> Result<Option<RadioEvent>, RadioError> {
        if self.mode == RadioMode::Sleep {
            trace!("irq ignored while asleep");
            return Ok(None);
        }

        let snapshot = self.get_irq_status()?;
        let decision = decide(snapshot);
        debug!(
            "irq {:?}: {:?}, clearing {:?}",
            snapshot,
            decision.outcome,
            decision.consumed
        );

        let event = match decision.outcome {
            Some(outcome) => Some(self.complete(outcome)?),
            None => None,
        };

        if let (Some(event), Some(handler)) = (event, self.handler) {
            handler(event);
        }

        if !decision.consumed.is_empty() {
            self.clear_irq_status(decision.consumed)?;
        }
        Ok(event)
    }

    /// Applies the effect of an outcome on the mirror and gathers its data.
    fn complete(&mut self, outcome: IrqOutcome) -> Result<RadioEvent, RadioError> {
        let was_active = self.mode.is_active();
        let continuous = matches!(self.rx_mode, Some(RxMode::Continuous));

        let event = match outcome {
            IrqOutcome::TxDone => RadioEvent::TxDone,
            IrqOutcome::RxDone => {
                let buffer = self.get_rx_buffer_status()?;
                let packet_status = self.get_packet_status()?;
                let metadata = RxMetadata {
                    length: buffer.payload_length,
                    buffer_offset: buffer.rx_start_buffer_pointer,
                    packet_status,
                };
                debug!("received {:?}", metadata);
                self.last_rx = Some(metadata);
                RadioEvent::RxDone(metadata)
            }
            IrqOutcome::CrcError => {
                self.last_rx = None;
                RadioEvent::CrcError
            }
            IrqOutcome::HeaderError => {
                self.last_rx = None;
                RadioEvent::HeaderError
            }
            IrqOutcome::Timeout => RadioEvent::Timeout,
            IrqOutcome::CadDone { detected } => RadioEvent::CadDone { detected },
        };

        if !was_active {
            // aborted or already settled, the event is stale for the mirror
            return Ok(event);
        }

        use IrqOutcome::*;
        match (self.mode, outcome) {
            (RadioMode::Rx, RxDone | CrcError | HeaderError) if continuous => {}
            (RadioMode::Rx, RxDone | CrcError | HeaderError | Timeout) => {
                let next = self.fallback_mode();
                self.set_mode(next);
                self.stop_rx_timer()?;
                self.rx_mode = None;
            }
            (RadioMode::Cad, CadDone { detected: true }) if self.cad_exit == CadExitMode::CadRx => {
                self.rx_mode = Some(RxMode::Single);
                self.set_mode(RadioMode::Rx);
            }
            (RadioMode::Cad, CadDone { .. } | Timeout) => self.set_mode(RadioMode::StandbyRc),
            (RadioMode::Tx, TxDone | Timeout) => {
                let next = self.fallback_mode();
                self.set_mode(next);
            }
            _ => {}
        }

        Ok(event)
    }

    fn ensure_ready_for(&self, to: RadioMode, supplied: ConfigFlags) -> Result<(), ConfigError> {
        if !(self.mode.is_standby() || self.mode == RadioMode::Fs) {
            warn!("cannot start {:?} from {:?}", to, self.mode);
            return Err(ConfigError::InvalidStateTransition {
                from: self.mode,
                to,
            });
        }
        check_transition(RadioMode::Fs, to, self.applied | supplied)
    }

    /// Sends one packet.
    ///
    /// Writes `payload` at the TX base, sets the payload length, locks the
    /// synthesizer and starts TX with the timeout from
    /// [`Radio::set_tx_timeout`]. Completion arrives as
    /// [`RadioEvent::TxDone`] or [`RadioEvent::Timeout`].
    ///
    /// Everything is checked before the first frame is sent: the mode, the
    /// configuration and that the payload fits.
    pub fn transmit(&mut self, payload: &[u8]) -> Result<(), RadioError> {
        self.ensure_ready_for(RadioMode::Tx, ConfigFlags::TX_PAYLOAD)?;
        let capacity = (BUFFER_CAPACITY - self.buffer_base.tx_base_addr as usize).min(255);
        if payload.len() > capacity {
            return Err(RadioError::BufferOverflow {
                offset: 0,
                len: payload.len(),
                capacity,
            });
        }
        let Some(packet) = self.packet else {
            return Err(ConfigError::MissingPrerequisite {
                missing: ConfigFlags::PACKET,
            }
            .into());
        };
        if payload.is_empty() {
            return Err(ConfigError::InvalidParameter("payload must not be empty").into());
        }

        info!("transmitting {} bytes", payload.len());
        if !self.mode.is_standby() {
            self.set_standby(StandbyConfig::Rc)?;
        }
        self.write_buffer(0, payload)?;
        self.write_packet_params(&packet.with_payload_length(payload.len() as u8))?;
        self.set_fs()?;
        self.start_tx(self.tx_timeout)
    }

    /// Starts receiving, single shot, timed or continuous.
    ///
    /// The configured payload length is written back first when the last
    /// [`Radio::transmit`] replaced it on the device.
    pub fn start_receive(&mut self, mode: RxMode) -> Result<(), RadioError> {
        self.ensure_ready_for(RadioMode::Rx, ConfigFlags::empty())?;

        info!("receiving, {:?}", mode);
        self.restore_packet_params()?;
        if self.mode.is_standby() {
            self.set_fs()?;
        }
        self.start_rx(mode)
    }

    /// Copies the last packet delivered with [`RadioEvent::RxDone`] into
    /// `payload` and returns its length and metadata.
    ///
    /// # Errors
    /// * `RadioError::NoPacket` - nothing received since configuration
    /// * `RadioError::BufferOverflow` - `payload` is shorter than the packet
    pub fn read_last_received(
        &mut self,
        payload: &mut [u8],
    ) -> Result<(usize, RxMetadata), RadioError> {
        let metadata = self.last_rx.ok_or(RadioError::NoPacket)?;
        let length = metadata.length as usize;
        let capacity = payload.len();
        let Some(destination) = payload.get_mut(..length) else {
            return Err(RadioError::BufferOverflow {
                offset: 0,
                len: length,
                capacity,
            });
        };

        if length > 0 {
            self.wait_busy()?;
            self.device.read_buffer(metadata.buffer_offset, destination)?;
        }
        Ok((length, metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{configured_radio, FakeChip};
    use crate::{
        CadParams, CodingRate, CrcMode, FallbackMode, HeaderType, IqMode, LoRaBandwidth,
        LoRaModulationParams, LoRaPacketParams, PacketType, SpreadingFactor,
    };
    use std::cell::RefCell;

    thread_local! {
        static SEEN: RefCell<Vec<RadioEvent>> = const { RefCell::new(Vec::new()) };
    }

    fn record(event: RadioEvent) {
        SEEN.with(|seen| seen.borrow_mut().push(event));
    }

    fn seen() -> Vec<RadioEvent> {
        SEEN.with(|seen| seen.borrow().clone())
    }

    #[test]
    fn tx_happy_path() {
        let chip = FakeChip::new();
        let mut radio = crate::test_support::radio(&chip);
        radio.init(&crate::BringUpConfig::default()).unwrap();
        radio.on_event(record);

        let modulation =
            LoRaModulationParams::new(SpreadingFactor::Sf7, LoRaBandwidth::Bw250, CodingRate::Cr4_5);
        let packet =
            LoRaPacketParams::new(0x0C, HeaderType::Variable, 1, CrcMode::Off, IqMode::Normal)
                .unwrap();
        radio
            .configure(PacketType::LoRa, &modulation, &packet, 915_000_000)
            .unwrap();
        radio.transmit(&[3]).unwrap();
        assert_eq!(radio.mode(), RadioMode::Tx);
        assert_eq!(chip.buffer()[0], 3);
        assert_eq!(chip.frame_for(0x83), Some(vec![0x83, 0x00, 0x00, 0x00]));

        chip.finish_tx();
        assert_eq!(radio.dispatch_irq(), Ok(Some(RadioEvent::TxDone)));

        assert_eq!(seen(), vec![RadioEvent::TxDone]);
        assert_eq!(radio.mode(), RadioMode::StandbyRc);
        assert_eq!(radio.get_device_errors(), Ok(DeviceErrors::empty()));
        assert!(chip.irq().is_empty());
        radio.verify_mode().unwrap();
    }

    #[test]
    fn receive_after_transmit_restores_configured_length() {
        let chip = FakeChip::new();
        let mut radio = crate::test_support::standby_radio(&chip);
        let modulation =
            LoRaModulationParams::new(SpreadingFactor::Sf7, LoRaBandwidth::Bw125, CodingRate::Cr4_5);
        let packet =
            LoRaPacketParams::new(8, HeaderType::Variable, 64, CrcMode::On, IqMode::Normal)
                .unwrap();
        radio
            .configure(PacketType::LoRa, &modulation, &packet, 868_100_000)
            .unwrap();

        radio.transmit(&[3]).unwrap();
        assert_eq!(
            chip.frame_for(0x8C),
            Some(vec![0x8C, 0x00, 0x08, 0x00, 0x01, 0x01, 0x00])
        );
        assert_eq!(radio.packet_params(), Some(packet));

        chip.finish_tx();
        assert_eq!(radio.dispatch_irq(), Ok(Some(RadioEvent::TxDone)));
        radio.start_receive(RxMode::Continuous).unwrap();

        assert_eq!(
            chip.frame_for(0x8C),
            Some(vec![0x8C, 0x00, 0x08, 0x00, 0x40, 0x01, 0x00])
        );
        let opcodes = chip.opcodes();
        let restored = opcodes.iter().rposition(|&op| op == 0x8C).unwrap();
        let armed = opcodes.iter().rposition(|&op| op == 0x82).unwrap();
        assert!(restored < armed);
        assert_eq!(radio.mode(), RadioMode::Rx);
    }

    #[test]
    fn receive_without_transmit_skips_packet_params() {
        let chip = FakeChip::new();
        let mut radio = configured_radio(&chip);
        let written = chip.opcodes().iter().filter(|&&op| op == 0x8C).count();

        radio.start_receive(RxMode::Single).unwrap();

        let after = chip.opcodes().iter().filter(|&&op| op == 0x8C).count();
        assert_eq!(after, written);
    }

    #[test]
    fn rx_continuous_fixed_length() {
        let chip = FakeChip::new();
        let mut radio = configured_radio(&chip);
        let packet =
            LoRaPacketParams::new(8, HeaderType::Fixed, 6, CrcMode::On, IqMode::Normal).unwrap();
        radio.set_packet_params(&packet).unwrap();

        radio.start_receive(RxMode::Continuous).unwrap();
        assert_eq!(chip.frame_for(0x82), Some(vec![0x82, 0xFF, 0xFF, 0xFF]));

        chip.deliver_packet(&[10, 20, 30, 40, 50, 60]);
        let event = radio.dispatch_irq().unwrap();

        let Some(RadioEvent::RxDone(metadata)) = event else {
            panic!("expected RxDone, got {event:?}");
        };
        assert_eq!(metadata.length, 6);
        assert_eq!(metadata.buffer_offset, 0);
        assert_eq!(radio.mode(), RadioMode::Rx);

        let mut payload = [0u8; 16];
        let (length, read_metadata) = radio.read_last_received(&mut payload).unwrap();
        assert_eq!(length, 6);
        assert_eq!(payload[..length], [10, 20, 30, 40, 50, 60]);
        assert_eq!(read_metadata, metadata);
    }

    #[test]
    fn crc_error_is_reported_alone() {
        let chip = FakeChip::new();
        let mut radio = configured_radio(&chip);
        radio.on_event(record);
        radio.start_receive(RxMode::Single).unwrap();

        chip.raise_irq(IrqMask::RX_DONE | IrqMask::CRC_ERROR);
        assert_eq!(radio.dispatch_irq(), Ok(Some(RadioEvent::CrcError)));
        assert_eq!(radio.dispatch_irq(), Ok(None));

        assert_eq!(seen(), vec![RadioEvent::CrcError]);
        assert_eq!(radio.read_last_received(&mut [0; 8]), Err(RadioError::NoPacket));
        assert_eq!(radio.mode(), RadioMode::StandbyRc);
    }

    #[test]
    fn timeout_returns_to_fallback_mode() {
        let chip = FakeChip::new();
        let mut radio = configured_radio(&chip);
        radio.set_fallback_mode(FallbackMode::StdbyXosc).unwrap();
        radio.start_receive(RxMode::Timed(6400)).unwrap();

        chip.raise_irq(IrqMask::TIMEOUT | IrqMask::PREAMBLE_DETECTED);
        assert_eq!(radio.dispatch_irq(), Ok(Some(RadioEvent::Timeout)));
        assert_eq!(radio.mode(), RadioMode::StandbyXosc);
        assert!(chip.irq().is_empty());
    }

    #[test]
    fn pending_outcomes_survive_for_the_next_dispatch() {
        let chip = FakeChip::new();
        let mut radio = configured_radio(&chip);
        radio.start_receive(RxMode::Continuous).unwrap();
        chip.deliver_packet(&[1, 2, 3]);
        chip.raise_irq(IrqMask::CAD_DONE);

        assert!(matches!(radio.dispatch_irq(), Ok(Some(RadioEvent::RxDone(_)))));
        assert_eq!(chip.irq(), IrqMask::CAD_DONE);
        assert_eq!(
            radio.dispatch_irq(),
            Ok(Some(RadioEvent::CadDone { detected: false }))
        );
        assert_eq!(radio.dispatch_irq(), Ok(None));
    }

    #[test]
    fn irq_arriving_during_dispatch_is_not_lost() {
        let chip = FakeChip::new();
        let mut radio = configured_radio(&chip);
        radio.start_receive(RxMode::Continuous).unwrap();

        chip.deliver_packet(&[1]);
        chip.raise_irq_on_next_clear(IrqMask::RX_DONE);
        assert!(matches!(radio.dispatch_irq(), Ok(Some(RadioEvent::RxDone(_)))));

        assert_eq!(chip.irq(), IrqMask::RX_DONE);
        assert!(matches!(radio.dispatch_irq(), Ok(Some(RadioEvent::RxDone(_)))));
    }

    #[test]
    fn cad_detection_with_cad_rx_stays_in_rx() {
        let chip = FakeChip::new();
        let mut radio = configured_radio(&chip);
        radio
            .start_cad(CadParams {
                exit_mode: CadExitMode::CadRx,
                ..CadParams::for_spreading_factor(SpreadingFactor::Sf7)
            })
            .unwrap();

        chip.raise_irq(IrqMask::CAD_DONE | IrqMask::CAD_DETECTED);
        assert_eq!(
            radio.dispatch_irq(),
            Ok(Some(RadioEvent::CadDone { detected: true }))
        );
        assert_eq!(radio.mode(), RadioMode::Rx);
    }

    #[test]
    fn transmit_checks_before_touching_the_bus() {
        let chip = FakeChip::new();
        let mut radio = configured_radio(&chip);
        let frames = chip.frame_count();

        assert_eq!(
            radio.transmit(&[0; 256]),
            Err(RadioError::BufferOverflow {
                offset: 0,
                len: 256,
                capacity: 255
            })
        );
        assert!(matches!(
            radio.transmit(&[]),
            Err(RadioError::Config(ConfigError::InvalidParameter(_)))
        ));

        radio.start_receive(RxMode::Continuous).unwrap();
        let frames_in_rx = chip.frame_count();
        assert_eq!(
            radio.transmit(&[1]),
            Err(RadioError::Config(ConfigError::InvalidStateTransition {
                from: RadioMode::Rx,
                to: RadioMode::Tx
            }))
        );
        assert_eq!(chip.frame_count(), frames_in_rx);
        assert!(frames_in_rx > frames);
    }

    #[test]
    fn receive_without_configuration_is_refused() {
        let chip = FakeChip::new();
        let mut radio = crate::test_support::standby_radio(&chip);

        assert_eq!(
            radio.start_receive(RxMode::Continuous),
            Err(RadioError::Config(ConfigError::MissingPrerequisite {
                missing: ConfigFlags::RX_READY
            }))
        );
        assert_eq!(chip.frame_count(), 0);
    }

    #[test]
    fn short_destination_is_an_overflow() {
        let chip = FakeChip::new();
        let mut radio = configured_radio(&chip);
        radio.start_receive(RxMode::Continuous).unwrap();
        chip.deliver_packet(&[1, 2, 3, 4]);
        radio.dispatch_irq().unwrap();

        assert_eq!(
            radio.read_last_received(&mut [0; 3]),
            Err(RadioError::BufferOverflow {
                offset: 0,
                len: 4,
                capacity: 3
            })
        );
    }

    #[test]
    fn packet_status_is_captured_with_the_packet() {
        let chip = FakeChip::new();
        let mut radio = configured_radio(&chip);
        radio.start_receive(RxMode::Single).unwrap();
        chip.set_packet_status([0x50, 0x28, 0x52]);
        chip.deliver_packet(&[9]);

        let Ok(Some(RadioEvent::RxDone(metadata))) = radio.dispatch_irq() else {
            panic!("expected RxDone");
        };
        assert_eq!(metadata.packet_status.rssi_pkt, -40);
        assert_eq!(metadata.packet_status.snr_pkt, 40);
        assert_eq!(metadata.packet_status.signal_rssi_pkt, -41);
        assert_eq!(radio.mode(), RadioMode::StandbyRc);
    }

    #[test]
    fn rssi_only_in_rx() {
        let chip = FakeChip::new();
        let mut radio = configured_radio(&chip);
        assert!(radio.get_rssi_inst().is_err());

        radio.start_receive(RxMode::Continuous).unwrap();
        assert_eq!(radio.get_rssi_inst(), Ok(-64));
    }

    #[test]
    fn stats_are_read_and_reset() {
        let chip = FakeChip::new();
        let mut radio = configured_radio(&chip);
        chip.set_stats([0, 5, 0, 1, 0, 2]);

        let stats = radio.get_stats().unwrap();
        assert_eq!(stats.packets_received, 5);
        assert_eq!(stats.packets_crc_error, 1);
        assert_eq!(stats.packets_header_error, 2);

        radio.reset_stats().unwrap();
        assert_eq!(radio.get_stats().unwrap(), Stats::default());
    }

    #[test]
    fn rejected_command_is_surfaced() {
        let chip = FakeChip::new();
        let mut radio = configured_radio(&chip);
        chip.set_command_status(crate::CommandStatus::ExecutionFailure);

        assert_eq!(
            radio.get_irq_status(),
            Err(RadioError::Command(crate::CommandStatus::ExecutionFailure))
        );
    }

    #[test]
    fn bus_failure_is_reported() {
        let chip = FakeChip::new();
        let mut radio = configured_radio(&chip);
        chip.fail_next_transaction();

        assert_eq!(
            radio.dispatch_irq(),
            Err(RadioError::Bus(crate::BusError::Transaction))
        );
        assert_eq!(radio.dispatch_irq(), Ok(None));
    }
}
