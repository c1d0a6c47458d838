//! SX126x bus transport
//!
//! `Device<SPI>` frames the four kinds of SPI transaction the SX126x
//! understands: commands, register access, and data buffer access. Each
//! transaction is a single chip-select assertion and runs inside a critical
//! section, so an interrupt handler can never start a transaction while the
//! foreground is halfway through one.
//!
//! Device does not wait on BUSY; that is the job of the caller, which owns the
//! pin. See [`crate::Radio`].
//!
//! # Example
//! ```no_run
//! # fn demo<SPI: embedded_hal::spi::SpiDevice>(spi: SPI) -> Result<(), sx126x_core::Error> {
//! use sx126x_core::{Device, GetStatus, LoraSyncWord};
//!
//! let mut device = Device::new(spi);
//! let status = device.execute_command(GetStatus)?;
//! let sync_word: LoraSyncWord = device.read_register()?;
//! device.write_buffer(0, &[0x01, 0x02, 0x03])?;
//! # let _ = (status, sync_word);
//! # Ok(())
//! # }
//! ```

use core::convert::Infallible;

use embedded_hal::spi::Operation;
use regiface::{
    errors::Error as RegifaceError, ByteArray, Command, FromByteArray, ReadableRegister,
    ToByteArray, WritableRegister,
};

const OPCODE_WRITE_REGISTER: u8 = 0x0D;
const OPCODE_READ_REGISTER: u8 = 0x1D;
const OPCODE_WRITE_BUFFER: u8 = 0x0E;
const OPCODE_READ_BUFFER: u8 = 0x1E;

/// Bus-level interface to an SX126x.
pub struct Device<SPI> {
    spi: SPI,
}

impl<SPI> Device<SPI> {
    /// Creates a new Device instance wrapping the provided SPI interface.
    pub fn new(spi: SPI) -> Self {
        Self { spi }
    }

    /// Releases the underlying SPI device.
    pub fn release(self) -> SPI {
        self.spi
    }
}

impl<SPI> Device<SPI>
where
    SPI: embedded_hal::spi::SpiDevice,
{
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), RegifaceError> {
        critical_section::with(|_| self.spi.transaction(operations))
            .map_err(|_| RegifaceError::BusError)
    }

    /// Reads a register value from the device.
    ///
    /// # Errors
    /// * `RegifaceError::BusError` - SPI communication failed
    /// * `RegifaceError::DeserializationError` - Failed to parse register value
    pub fn read_register<R>(&mut self) -> Result<R, RegifaceError>
    where
        R: ReadableRegister<IdType = u16>,
    {
        let mut header = [OPCODE_READ_REGISTER, 0x00, 0x00, 0x00];
        header[1..3].copy_from_slice(&R::id().to_be_bytes());

        let mut raw_value = R::Array::new();

        self.transaction(&mut [
            Operation::Write(header.as_slice()),
            Operation::Read(raw_value.as_mut()),
        ])?;

        R::from_bytes(raw_value).map_err(|_| RegifaceError::DeserializationError)
    }

    /// Writes a value to a device register.
    ///
    /// # Errors
    /// * `RegifaceError::BusError` - SPI communication failed
    pub fn write_register<R>(&mut self, register: R) -> Result<(), RegifaceError>
    where
        R: WritableRegister<IdType = u16, Error = Infallible>,
    {
        let mut header = [OPCODE_WRITE_REGISTER, 0x00, 0x00];
        header[1..].copy_from_slice(&R::id().to_be_bytes());

        let raw_value = register.to_bytes().unwrap_or_else(|never| match never {});

        self.transaction(&mut [
            Operation::Write(header.as_slice()),
            Operation::Write(raw_value.as_ref()),
        ])
    }

    /// Writes bytes to the data buffer at an absolute address.
    ///
    /// The address wraps at 256; bounds are the caller's concern.
    pub fn write_buffer(&mut self, offset: u8, bytes: &[u8]) -> Result<(), RegifaceError> {
        let header = [OPCODE_WRITE_BUFFER, offset];

        self.transaction(&mut [Operation::Write(header.as_slice()), Operation::Write(bytes)])
    }

    /// Reads bytes from the data buffer starting at an absolute address.
    pub fn read_buffer(&mut self, offset: u8, bytes: &mut [u8]) -> Result<(), RegifaceError> {
        let header = [OPCODE_READ_BUFFER, offset, 0x00];

        self.transaction(&mut [Operation::Write(header.as_slice()), Operation::Read(bytes)])
    }

    /// Executes a command on the device.
    ///
    /// The frame is the opcode, the encoded parameters, then as many bytes
    /// clocked in as the response type needs.
    ///
    /// # Errors
    /// * `RegifaceError::BusError` - SPI communication failed
    /// * `RegifaceError::DeserializationError` - Failed to parse command response
    pub fn execute_command<C>(&mut self, command: C) -> Result<C::ResponseParameters, RegifaceError>
    where
        C: Command<IdType = u8>,
        C::CommandParameters: ToByteArray<Error = Infallible>,
    {
        let request = command
            .invoking_parameters()
            .to_bytes()
            .unwrap_or_else(|never| match never {});
        let mut raw_response = <C::ResponseParameters as FromByteArray>::Array::new();

        self.transaction(&mut [
            Operation::Write(&[C::id()]),
            Operation::Write(request.as_ref()),
            Operation::Read(raw_response.as_mut()),
        ])?;

        C::ResponseParameters::from_bytes(raw_response)
            .map_err(|_| RegifaceError::DeserializationError)
    }
}
