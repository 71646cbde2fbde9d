// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Level-triggered digital output.
//!
//! Grounded on `kernel::hil::gpio::Pin` as consumed by
//! `capsules/extra/src/hc_sr04.rs` (its `trig` pin). Only the output half is
//! needed here: line-idle sense comes through the UART adapter, not a
//! separate input pin, and the servo engine only ever drives its eight pins,
//! never reads them.

pub trait Pin {
    fn set(&self);
    fn clear(&self);
    /// Convenience matching `hc_sr04.rs`'s call sites (`pin.set()` /
    /// `pin.clear()` driven by a boolean elsewhere in the caller); kept so
    /// turnout/servo code can write `pin.write(bit)` without an `if`.
    fn write(&self, high: bool) {
        if high {
            self.set();
        } else {
            self.clear();
        }
    }
}
