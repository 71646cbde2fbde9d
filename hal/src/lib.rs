// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hardware interface layer consumed by the bus, servo and turnout capsules.
//!
//! This plays the role Tock's `kernel::hil` module plays for its capsules:
//! a small set of traits a board/firmware integrator implements against real
//! registers, so the capsules above can be written and tested without ever
//! touching a register themselves. Unlike `kernel::hil` there is no process,
//! grant or syscall model behind these traits — this workspace has no
//! userspace, only a foreground loop and two interrupt priority classes, so
//! the traits are the entire surface.

#![no_std]

pub mod address;
pub mod critical;
pub mod debug;
pub mod gpio;
pub mod servo;
pub mod time;
pub mod uart;

pub use tock_cells::optional_cell::OptionalCell;
pub use tock_cells::take_cell::TakeCell;

/// Result code for the handful of fallible entry points in this workspace.
///
/// Mirrors the closed set Tock's `kernel::ErrorCode` exposes (as consumed by
/// `capsules/extra/src/pwm.rs`, `capsules/extra/src/sdcard.rs` and others);
/// not every variant has a caller here, but keeping the whole enum avoids
/// inventing a second, incompatible vocabulary for the same concept.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorCode {
    /// Generic failure condition.
    Fail,
    /// Underlying resource is busy.
    Busy,
    /// Resource is powered down.
    Off,
    /// Resource already reserved by someone else.
    Reserve,
    /// Argument is invalid.
    Inval,
    /// Size is invalid, or not large enough.
    Size,
    /// Operation is already in progress.
    Already,
    /// Operation was canceled.
    Cancel,
    /// Memory required was not available.
    NoMem,
    /// Operation is not supported.
    NoSupport,
    /// Device does not exist.
    NoDevice,
    /// Device is not responding / not acknowledging.
    NoAck,
}
