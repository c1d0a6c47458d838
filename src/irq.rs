//! Interrupt events
//!
//! DIO1 only says that something happened; the IRQ status word says what.
//! [`decide`] turns a status snapshot into at most one outcome plus the exact
//! set of bits the dispatcher clears once the outcome has been handled. Bits
//! not consumed stay pending on the device, keep DIO1 asserted and produce the
//! next dispatch.
//!
//! Priority, highest first:
//! 1. `TIMEOUT` (absorbs a concurrent TX/RX completion)
//! 2. `HEADER_ERROR`, then `CRC_ERROR` (absorb `RX_DONE` for the same packet)
//! 3. `RX_DONE`
//! 4. `TX_DONE`
//! 5. `CAD_DONE`, carrying `CAD_DETECTED`

use core::cell::Cell;

use critical_section::Mutex;

use crate::{IrqMask, LoRaPacketStatus};

/// Metadata of a received packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxMetadata {
    /// Payload length in bytes
    pub length: u8,
    /// Absolute data buffer address of the first payload byte
    pub buffer_offset: u8,
    /// Link quality
    pub packet_status: LoRaPacketStatus,
}

/// Outcome delivered to the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioEvent {
    /// Packet transmitted
    TxDone,
    /// Packet received intact
    RxDone(RxMetadata),
    /// Packet received with a payload CRC error
    CrcError,
    /// LoRa header failed its CRC
    HeaderError,
    /// TX or RX timer expired
    Timeout,
    /// Channel activity detection finished
    CadDone {
        /// Activity was detected on the channel
        detected: bool,
    },
}

/// Outcome decoded from an IRQ snapshot, before any metadata is fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IrqOutcome {
    /// TxDone
    TxDone,
    /// RxDone without error bits
    RxDone,
    /// CrcError
    CrcError,
    /// HeaderError
    HeaderError,
    /// Timeout
    Timeout,
    /// CadDone
    CadDone {
        /// CadDetected was set alongside
        detected: bool,
    },
}

/// Result of interpreting one IRQ status snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqDecision {
    /// Outcome to report, if any
    pub outcome: Option<IrqOutcome>,
    /// Bits to clear once the outcome has been handled
    pub consumed: IrqMask,
}

/// Interprets an IRQ status snapshot.
pub fn decide(snapshot: IrqMask) -> IrqDecision {
    let informational = snapshot.intersection(IrqMask::INFORMATIONAL);

    let (outcome, bits) = if snapshot.contains(IrqMask::TIMEOUT) {
        (
            IrqOutcome::Timeout,
            IrqMask::TIMEOUT
                | IrqMask::TX_DONE
                | IrqMask::RX_DONE
                | IrqMask::CRC_ERROR
                | IrqMask::HEADER_ERROR,
        )
    } else if snapshot.contains(IrqMask::HEADER_ERROR) {
        (
            IrqOutcome::HeaderError,
            IrqMask::HEADER_ERROR | IrqMask::CRC_ERROR | IrqMask::RX_DONE,
        )
    } else if snapshot.contains(IrqMask::CRC_ERROR) {
        (IrqOutcome::CrcError, IrqMask::CRC_ERROR | IrqMask::RX_DONE)
    } else if snapshot.contains(IrqMask::RX_DONE) {
        (IrqOutcome::RxDone, IrqMask::RX_DONE)
    } else if snapshot.contains(IrqMask::TX_DONE) {
        (IrqOutcome::TxDone, IrqMask::TX_DONE)
    } else if snapshot.contains(IrqMask::CAD_DONE) {
        (
            IrqOutcome::CadDone {
                detected: snapshot.contains(IrqMask::CAD_DETECTED),
            },
            IrqMask::CAD_DONE | IrqMask::CAD_DETECTED,
        )
    } else {
        // nothing reportable, drop whatever is latched so DIO1 deasserts
        return IrqDecision {
            outcome: None,
            consumed: snapshot,
        };
    };

    IrqDecision {
        outcome: Some(outcome),
        consumed: snapshot.intersection(bits).union(informational),
    }
}

/// Pending-interrupt flag shared between the DIO1 handler and the foreground.
///
/// The handler calls [`IrqSignal::signal`] and returns; the foreground calls
/// [`IrqSignal::take`] and, when it returns true, runs
/// [`crate::Radio::dispatch_irq`] until it reports no further event.
///
/// ```
/// use sx126x_core::IrqSignal;
///
/// static DIO1: IrqSignal = IrqSignal::new();
///
/// DIO1.signal();
/// assert!(DIO1.take());
/// assert!(!DIO1.take());
/// ```
pub struct IrqSignal {
    pending: Mutex<Cell<bool>>,
}

impl IrqSignal {
    /// Creates a signal with nothing pending.
    pub const fn new() -> Self {
        Self {
            pending: Mutex::new(Cell::new(false)),
        }
    }

    /// Marks an interrupt as pending. Safe to call from interrupt context.
    pub fn signal(&self) {
        critical_section::with(|cs| self.pending.borrow(cs).set(true));
    }

    /// Returns whether an interrupt was pending and clears the flag.
    pub fn take(&self) -> bool {
        critical_section::with(|cs| self.pending.borrow(cs).replace(false))
    }

    /// Returns whether an interrupt is pending without clearing it.
    pub fn is_pending(&self) -> bool {
        critical_section::with(|cs| self.pending.borrow(cs).get())
    }
}

impl Default for IrqSignal {
    fn default() -> Self {
        Self::new()
    }
}
