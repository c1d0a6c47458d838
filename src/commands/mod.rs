//! SX126x command set
//!
//! Every command is a unit or parameter struct implementing
//! [`regiface::Command`]: an opcode, parameters encoded big-endian, and a
//! response type that starts with the status byte when the command returns
//! data. Nothing here touches the bus; frames are sent by
//! [`Device::execute_command`](crate::Device::execute_command).
//!
//! - `dio`: IRQ enable and routing, IRQ status, RF switch on DIO2, TCXO on DIO3
//! - `operational`: sleep, standby, FS, TX, RX, CAD, calibration, regulator, PA
//! - `rf`: packet type, frequency, TX power, LoRa modulation and packet
//!   parameters, CAD parameters, buffer base addresses
//! - `status`: status byte, RX buffer status, packet status, device errors,
//!   statistics
//!
//! Commands that change configuration are only accepted by the device in
//! standby. The driver in [`crate::radio`] enforces that, along with the
//! order packet type, then modulation, then packet parameters.

mod dio;
mod operational;
mod rf;
mod status;

pub use dio::*;
pub use operational::*;
pub use rf::*;
pub use status::*;
