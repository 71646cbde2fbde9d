// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Single-byte UART transmit/receive, plus the composite line-idle sense the
//! bus engine needs to arbitrate.
//!
//! Grounded on Tock's `kernel::hil::uart::{Transmit, Receive}`, but using
//! their *word* members (`transmit_word`/`receive_word`, seen invoked from
//! `capsules/core/src/virtualizers/virtual_uart.rs` and declared in
//! `capsules/core/src/portals/teleportable_uart.rs`) instead of the
//! buffer-DMA members the console capsules use: the bus engine drives the
//! UART one byte at a time, comparing the transmitted byte against the
//! RX-echo before sending the next one, so there is never a multi-byte
//! buffer in flight.

use crate::ErrorCode;

/// Baud/format configuration. Unused by the bus engine itself (it fixes
/// 16,666 bit/s, 8N1 at construction time, mirroring `original_source/ln.c`'s
/// `setBrg1` hardcoding `SP1BRG = 59`), but kept as
/// a trait method so other integrations of this HAL (e.g. a host-side test
/// harness that also exercises a plain console) have a uniform `Configure`
/// surface, matching `kernel::hil::uart::Configure` as used by
/// `nrf51822_serialization.rs`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Parameters {
    pub baud_rate: u32,
    pub width: Width,
    pub stop_bits: StopBits,
    pub parity: Parity,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Width {
    Six,
    Seven,
    Eight,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StopBits {
    One,
    Two,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Parity {
    None,
    Odd,
    Even,
}

pub trait Configure {
    fn configure(&self, params: Parameters) -> Result<(), ErrorCode>;
}

/// Reason a receive completed other than successfully.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Error {
    None,
    /// A stop bit was not where expected — on this bus this is how a
    /// line-break is detected by the receiving node.
    FramingError,
    OverrunError,
    ParityError,
    Aborted,
}

pub trait TransmitClient {
    /// The byte handed to [`Transmit::transmit_word`] has left the shift
    /// register. `rcode` is `Err` only if the transmit was aborted.
    fn transmitted_word(&self, rcode: Result<(), ErrorCode>);
}

pub trait ReceiveClient {
    /// A byte was received (or a framing error occurred, in which case
    /// `word` is meaningless and `error` is not [`Error::None`]).
    fn received_word(&self, word: u8, rcode: Result<(), ErrorCode>, error: Error);
}

pub trait Transmit<'a>: Configure {
    fn set_transmit_client(&self, client: &'a dyn TransmitClient);
    /// Loads `word` into the transmit shift register. The callback fires
    /// once the byte has gone out; there is no queuing here, matching the
    /// bus engine's `tx_handler`, which only ever has one byte "in the
    /// register" at a time.
    fn transmit_word(&self, word: u8) -> Result<(), ErrorCode>;
}

pub trait Receive<'a>: Configure {
    fn set_receive_client(&self, client: &'a dyn ReceiveClient);
    /// Arms the receiver for one byte. Re-armed after every
    /// `received_word` callback — there is no continuous-receive mode.
    fn receive_word(&self) -> Result<(), ErrorCode>;
}

/// Shared-bus controls with no counterpart in Tock's HIL (Tock has no
/// multi-drop bus to arbitrate). Bundled separately from [`Transmit`] and
/// [`Receive`] because both directions and the line-break drive are all
/// properties of the single shared wire, not of one direction of traffic.
pub trait BusControl {
    /// Forces the TX line to the break (dominant) level and disables the
    /// receiver, per spec.md §4.4 LineBreak state ("UART disabled, TX line
    /// forced to the break level"); `false` releases the line and
    /// re-enables the receiver.
    fn set_break(&self, asserted: bool);
    /// Composite "is the bus free" sense spec.md §6 calls `lineIsIdle()`:
    /// RX line physically high AND the UART receiver is not mid-frame.
    fn line_is_idle(&self) -> bool;
}
