//! Register definitions for the SX126x radio
//!
//! Only the registers the driver touches directly are modelled: the LoRa sync
//! word (also the post-reset sanity check), and the handful of registers the
//! datasheet errata (section 15) require patching.

mod packet;
mod rf;
mod system;

pub use packet::*;
pub use rf::*;
pub use system::*;
