// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The single hardware compare channel the servo engine time-slices across
//! eight pins.
//!
//! `original_source/AW_driver/servo.c` runs this off one free-running timer
//! (`TMR3`) and one compare unit (`CCP1`) whose match value is reprogrammed
//! every 2500 µs tick relative to that same timer. This trait models that
//! relationship directly rather than reusing [`crate::time::Alarm`] twice,
//! because the compare match must be relative to the *current* tick's
//! start, not an independent countdown — a caller has to get the
//! compare-vs-timer race window right, which is exactly what a cooperative
//! scheduler over the eight slots buys: on target hardware an adapter over
//! the real timer pair, in tests a fake that just records the loaded value.

use crate::time::Ticks;

pub trait CompareClient {
    /// The compare match armed by [`CompareTimer::load_compare`] has fired.
    fn compare_fired(&self);
}

pub trait CompareTimer<'a> {
    fn set_compare_client(&self, client: &'a dyn CompareClient);
    /// Reprograms the compare match to fire `ticks_from_tick_start` ticks
    /// after the start of the current 2500 µs tick. Must be called before
    /// the frame timer is reloaded, so the compare is always armed strictly
    /// before the window it must fire within can elapse (§9.1).
    fn load_compare(&self, ticks_from_tick_start: Ticks);
}
