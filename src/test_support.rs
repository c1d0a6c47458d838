//! Register-level model of an SX126x behind the embedded-hal traits.
//!
//! The model answers the frames the driver sends, keeps the registers, the
//! data buffer and the IRQ word, and records every transaction so tests can
//! assert on the exact bytes that crossed the bus.

use std::cell::RefCell;
use std::collections::HashMap;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, InputPin, OutputPin};
use embedded_hal::spi::{self, ErrorKind, Operation, SpiDevice};

use crate::radio::{BringUpConfig, Radio};
use crate::{
    ChipMode, CodingRate, CommandStatus, CrcMode, DeviceErrors, HeaderType, IqMode, IrqMask,
    LoRaBandwidth, LoRaModulationParams, LoRaPacketParams, PacketType, SpreadingFactor,
};

const RESET_REGISTERS: [(u16, u8); 7] = [
    (0x0740, 0x14),
    (0x0741, 0x24),
    (0x0736, 0x0D),
    (0x0889, 0x04),
    (0x08D8, 0xC8),
    (0x0902, 0x00),
    (0x0944, 0x00),
];

struct ChipState {
    frames: Vec<Vec<u8>>,
    registers: HashMap<u16, u8>,
    reset_registers: HashMap<u16, u8>,
    buffer: [u8; 256],
    mode: ChipMode,
    sleeping: bool,
    command_status: CommandStatus,
    packet_type: u8,
    irq: IrqMask,
    irq_on_next_clear: Option<IrqMask>,
    errors: DeviceErrors,
    calibration_errors: DeviceErrors,
    rx_base: u8,
    rx_continuous: bool,
    rx_length: u8,
    rx_start: u8,
    packet_status: [u8; 3],
    stats: [u8; 6],
    rssi: u8,
    busy_stuck: bool,
    reset_count: usize,
    reset_asserted: bool,
    fail_next: bool,
}

impl ChipState {
    fn new() -> Self {
        let reset_registers: HashMap<u16, u8> = RESET_REGISTERS.into_iter().collect();
        Self {
            frames: Vec::new(),
            registers: reset_registers.clone(),
            reset_registers,
            buffer: [0; 256],
            mode: ChipMode::StandbyRc,
            sleeping: false,
            command_status: CommandStatus::Rfu,
            packet_type: 0,
            irq: IrqMask::empty(),
            irq_on_next_clear: None,
            errors: DeviceErrors::empty(),
            calibration_errors: DeviceErrors::empty(),
            rx_base: 0,
            rx_continuous: false,
            rx_length: 0,
            rx_start: 0,
            packet_status: [0; 3],
            stats: [0; 6],
            rssi: 128,
            busy_stuck: false,
            reset_count: 0,
            reset_asserted: false,
            fail_next: false,
        }
    }

    fn reset(&mut self) {
        self.registers = self.reset_registers.clone();
        self.mode = ChipMode::StandbyRc;
        self.sleeping = false;
        self.packet_type = 0;
        self.irq = IrqMask::empty();
        self.errors = DeviceErrors::empty();
        self.rx_base = 0;
        self.reset_count += 1;
    }

    fn status_byte(&self) -> u8 {
        ((self.mode as u8) << 4) | ((self.command_status as u8) << 1)
    }

    fn register(&self, address: u16) -> u8 {
        self.registers.get(&address).copied().unwrap_or(0)
    }

    fn respond(&self, frame: &[u8], out: &mut [u8]) {
        let status = self.status_byte();
        let response: Vec<u8> = match frame.first() {
            Some(0x1D) => {
                let address = u16::from_be_bytes([frame[1], frame[2]]);
                (0..out.len() as u16)
                    .map(|i| self.register(address + i))
                    .collect()
            }
            Some(0x1E) => (0..out.len())
                .map(|i| self.buffer[(frame[1] as usize + i) % 256])
                .collect(),
            Some(0xC0) => vec![status],
            Some(0x11) => vec![status, self.packet_type],
            Some(0x12) => [&[status][..], &self.irq.bits().to_be_bytes()[..]].concat(),
            Some(0x13) => vec![status, self.rx_length, self.rx_start],
            Some(0x14) => [&[status][..], &self.packet_status[..]].concat(),
            Some(0x15) => vec![status, self.rssi],
            Some(0x17) => [&[status][..], &self.errors.bits().to_be_bytes()[..]].concat(),
            Some(0x10) => [&[status][..], &self.stats[..]].concat(),
            _ => Vec::new(),
        };

        out.fill(0);
        let n = response.len().min(out.len());
        out[..n].copy_from_slice(&response[..n]);
    }

    fn apply(&mut self, frame: &[u8]) {
        let Some((&opcode, params)) = frame.split_first() else {
            return;
        };
        match opcode {
            0x80 => {
                self.mode = match params.first() {
                    Some(1) => ChipMode::StandbyXosc,
                    _ => ChipMode::StandbyRc,
                }
            }
            0xC1 => self.mode = ChipMode::FrequencySynthesis,
            0x83 => self.mode = ChipMode::Transmit,
            0x82 => {
                self.mode = ChipMode::Receive;
                self.rx_continuous = params == [0xFF, 0xFF, 0xFF];
            }
            0xC5 => self.mode = ChipMode::Receive,
            0x84 => self.sleeping = true,
            0x8A => self.packet_type = params[0],
            0x8F => self.rx_base = params[1],
            0x02 => {
                let mask = IrqMask::from_bits_retain(u16::from_be_bytes([params[0], params[1]]));
                self.irq.remove(mask);
                if let Some(raised) = self.irq_on_next_clear.take() {
                    self.irq.insert(raised);
                }
            }
            0x07 => self.errors = DeviceErrors::empty(),
            0x00 => self.stats = [0; 6],
            0x89 => self.errors.insert(self.calibration_errors),
            0x0D => {
                let address = u16::from_be_bytes([params[0], params[1]]);
                for (i, &value) in params[2..].iter().enumerate() {
                    self.registers.insert(address + i as u16, value);
                }
            }
            0x0E => {
                let offset = params[0] as usize;
                for (i, &value) in params[1..].iter().enumerate() {
                    self.buffer[(offset + i) % 256] = value;
                }
            }
            _ => {}
        }
    }
}

/// Shared handle to the model; the bus and pins hold clones.
#[derive(Clone)]
pub(crate) struct FakeChip {
    state: Rc<RefCell<ChipState>>,
}

impl FakeChip {
    pub(crate) fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(ChipState::new())),
        }
    }

    pub(crate) fn spi(&self) -> FakeSpi {
        FakeSpi { chip: self.clone() }
    }

    pub(crate) fn busy(&self) -> FakeBusy {
        FakeBusy { chip: self.clone() }
    }

    pub(crate) fn reset_pin(&self) -> FakeReset {
        FakeReset { chip: self.clone() }
    }

    /// Bytes written in each transaction, oldest first
    pub(crate) fn frames(&self) -> Vec<Vec<u8>> {
        self.state.borrow().frames.clone()
    }

    pub(crate) fn frame_count(&self) -> usize {
        self.state.borrow().frames.len()
    }

    pub(crate) fn opcodes(&self) -> Vec<u8> {
        self.state
            .borrow()
            .frames
            .iter()
            .filter_map(|frame| frame.first().copied())
            .collect()
    }

    /// Most recent frame starting with `opcode`
    pub(crate) fn frame_for(&self, opcode: u8) -> Option<Vec<u8>> {
        self.state
            .borrow()
            .frames
            .iter()
            .rev()
            .find(|frame| frame.first() == Some(&opcode))
            .cloned()
    }

    pub(crate) fn reset_count(&self) -> usize {
        self.state.borrow().reset_count
    }

    /// Errors raised by every Calibrate command
    pub(crate) fn fail_calibration(&self, errors: DeviceErrors) {
        self.state.borrow_mut().calibration_errors = errors;
    }

    pub(crate) fn device_errors(&self) -> DeviceErrors {
        self.state.borrow().errors
    }

    /// Value a register takes after the next reset
    pub(crate) fn set_reset_register(&self, address: u16, value: u8) {
        self.state
            .borrow_mut()
            .reset_registers
            .insert(address, value);
    }

    pub(crate) fn register(&self, address: u16) -> u8 {
        self.state.borrow().register(address)
    }

    pub(crate) fn set_register(&self, address: u16, value: u8) {
        self.state.borrow_mut().registers.insert(address, value);
    }

    pub(crate) fn set_busy_stuck(&self, stuck: bool) {
        self.state.borrow_mut().busy_stuck = stuck;
    }

    pub(crate) fn set_chip_mode(&self, mode: ChipMode) {
        self.state.borrow_mut().mode = mode;
    }

    pub(crate) fn set_command_status(&self, status: CommandStatus) {
        self.state.borrow_mut().command_status = status;
    }

    pub(crate) fn fail_next_transaction(&self) {
        self.state.borrow_mut().fail_next = true;
    }

    pub(crate) fn packet_type(&self) -> u8 {
        self.state.borrow().packet_type
    }

    pub(crate) fn buffer(&self) -> [u8; 256] {
        self.state.borrow().buffer
    }

    pub(crate) fn write_buffer_at(&self, address: u8, bytes: &[u8]) {
        let mut state = self.state.borrow_mut();
        for (i, &value) in bytes.iter().enumerate() {
            state.buffer[(address as usize + i) % 256] = value;
        }
    }

    pub(crate) fn irq(&self) -> IrqMask {
        self.state.borrow().irq
    }

    pub(crate) fn raise_irq(&self, irq: IrqMask) {
        self.state.borrow_mut().irq.insert(irq);
    }

    /// Raises `irq` right after the next ClearIrqStatus is applied.
    pub(crate) fn raise_irq_on_next_clear(&self, irq: IrqMask) {
        self.state.borrow_mut().irq_on_next_clear = Some(irq);
    }

    pub(crate) fn set_packet_status(&self, raw: [u8; 3]) {
        self.state.borrow_mut().packet_status = raw;
    }

    pub(crate) fn set_stats(&self, raw: [u8; 6]) {
        self.state.borrow_mut().stats = raw;
    }

    /// Completes a transmission into STDBY_RC.
    pub(crate) fn finish_tx(&self) {
        let mut state = self.state.borrow_mut();
        state.mode = ChipMode::StandbyRc;
        state.irq.insert(IrqMask::TX_DONE);
    }

    /// Lands a packet at the RX base and raises RxDone.
    pub(crate) fn deliver_packet(&self, payload: &[u8]) {
        let rx_base = self.state.borrow().rx_base;
        self.write_buffer_at(rx_base, payload);

        let mut state = self.state.borrow_mut();
        state.rx_length = payload.len() as u8;
        state.rx_start = rx_base;
        state.irq.insert(IrqMask::HEADER_VALID | IrqMask::RX_DONE);
        if !state.rx_continuous {
            state.mode = ChipMode::StandbyRc;
        }
    }
}

#[derive(Debug)]
pub(crate) struct FakeSpiError;

impl spi::Error for FakeSpiError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

pub(crate) struct FakeSpi {
    chip: FakeChip,
}

impl spi::ErrorType for FakeSpi {
    type Error = FakeSpiError;
}

impl SpiDevice for FakeSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        let mut state = self.chip.state.borrow_mut();
        if state.fail_next {
            state.fail_next = false;
            return Err(FakeSpiError);
        }

        // NSS going low wakes a sleeping device
        if state.sleeping {
            state.sleeping = false;
            state.mode = ChipMode::StandbyRc;
        }

        let mut frame = Vec::new();
        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(bytes) => frame.extend_from_slice(bytes),
                Operation::Read(out) => state.respond(&frame, out),
                Operation::Transfer(..) | Operation::TransferInPlace(_) => {
                    return Err(FakeSpiError)
                }
                Operation::DelayNs(_) => {}
            }
        }

        state.apply(&frame);
        state.frames.push(frame);
        Ok(())
    }
}

pub(crate) struct FakeBusy {
    chip: FakeChip,
}

impl digital::ErrorType for FakeBusy {
    type Error = Infallible;
}

impl InputPin for FakeBusy {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.chip.state.borrow().busy_stuck)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

pub(crate) struct FakeReset {
    chip: FakeChip,
}

impl digital::ErrorType for FakeReset {
    type Error = Infallible;
}

impl OutputPin for FakeReset {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.chip.state.borrow_mut().reset_asserted = true;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        let mut state = self.chip.state.borrow_mut();
        if state.reset_asserted {
            state.reset_asserted = false;
            state.reset();
        }
        Ok(())
    }
}

pub(crate) struct NoopDelay;

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

pub(crate) type TestRadio = Radio<FakeSpi, FakeBusy, FakeReset, NoopDelay>;

/// Driver attached to `chip`, believing the device asleep
pub(crate) fn radio(chip: &FakeChip) -> TestRadio {
    Radio::new(chip.spi(), chip.busy(), chip.reset_pin(), NoopDelay)
}

/// Driver after a reset: STDBY_RC, nothing applied, no frames sent
pub(crate) fn standby_radio(chip: &FakeChip) -> TestRadio {
    let mut radio = radio(chip);
    radio.reset().unwrap();
    radio
}

/// Driver brought up and configured for LoRa SF7/BW250 at 915 MHz
pub(crate) fn configured_radio(chip: &FakeChip) -> TestRadio {
    let mut radio = radio(chip);
    radio.init(&BringUpConfig::default()).unwrap();

    let modulation =
        LoRaModulationParams::new(SpreadingFactor::Sf7, LoRaBandwidth::Bw250, CodingRate::Cr4_5);
    let packet =
        LoRaPacketParams::new(12, HeaderType::Variable, 1, CrcMode::Off, IqMode::Normal).unwrap();
    radio
        .configure(PacketType::LoRa, &modulation, &packet, 915_000_000)
        .unwrap();
    radio
}
