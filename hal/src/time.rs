// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A one-shot, tick-granular alarm.
//!
//! Mirrors the shape of Tock's `kernel::hil::time::{Alarm, AlarmClient,
//! Ticks}` as consumed by `capsules/extra/src/hc_sr04.rs` and
//! `capsules/core/src/virtualizers/virtual_alarm.rs`. The bus engine and the
//! servo engine each own one of these; the tick base is fixed at 0.5 µs (an
//! 8x prescale of a 4 MHz instruction clock).

/// A tick count for an [`Alarm`]. `u32` is plenty: at 0.5 µs/tick this wraps
/// after roughly 35 minutes, far longer than any single delay this driver
/// ever schedules (the longest is the ~1 ms idle delay).
pub type Ticks = u32;

/// Converts between ticks and microseconds at this platform's fixed tick
/// rate (2 ticks per µs, i.e. 0.5 µs/tick).
pub trait ConvertTicks {
    fn ticks_from_us(&self, us: u32) -> Ticks;
    fn us_from_ticks(&self, ticks: Ticks) -> u32;
}

/// Receives the callback when an [`Alarm`] fires.
pub trait AlarmClient {
    fn alarm(&self);
}

/// A single-shot countdown timer.
///
/// `set_alarm` arms the timer to fire `dt` ticks after `reference`; callers
/// in this workspace always pass `self.now()` as `reference`, matching how
/// `hc_sr04.rs` calls `self.alarm.set_alarm(self.alarm.now(), ...)`. There is
/// no periodic mode: every state in the bus engine and every tick of the
/// servo engine re-arms the alarm explicitly before returning.
pub trait Alarm<'a>: ConvertTicks {
    fn set_alarm_client(&self, client: &'a dyn AlarmClient);
    fn set_alarm(&self, reference: Ticks, dt: Ticks);
    fn disarm(&self) -> Result<(), crate::ErrorCode>;
    fn now(&self) -> Ticks;
}
