// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! 8-channel software-multiplexed servo PWM engine (spec.md §4.5).
//!
//! One 2500 µs frame timer cycles a rotating pin index 0..7; each tick asks
//! the caller for that slot's target width, reprograms the single compare
//! channel relative to the tick's start, drives exactly that pin high and
//! every other pin low, then reloads. The compare match drives all pins low
//! again. Eight ticks make one 20 ms PWM frame.
//!
//! Grounded on `original_source/AW_driver/servo.c`'s `servoIsrTmr3` (free-
//! running `TMR3` plus one `CCP1` compare, reprogrammed every tick) and on
//! `capsules/extra/src/servo.rs`/`sg90.rs`'s `Servo` trait shape for the
//! pulse-width vocabulary, generalized here from one pin to eight
//! time-sliced ones.

#![no_std]

use core::cell::Cell;

use ln_hal::gpio::Pin;
use ln_hal::servo::{CompareClient, CompareTimer};
use ln_hal::time::{Alarm, AlarmClient, Ticks};
use ln_hal::OptionalCell;

/// One 2500 µs tick, in ticks at 0.5 µs/tick (`original_source/AW_driver/
/// servo.c`'s `TIMER3_2500us = 5000U`).
pub const FRAME_TICK_TICKS: Ticks = 5000;

/// Number of servo channels this engine time-slices (spec.md §4.5/§2).
pub const NUM_SLOTS: usize = 8;

/// Supplies the target pulse width for each slot once per 20 ms frame.
///
/// Invoked once per 2500 µs tick with that tick's slot index — since there
/// are 8 slots per 20 ms frame, each slot is asked exactly once per 20 ms,
/// which is exactly the cadence spec.md §4.6's turnout sweep needs ("walk
/// the current width ... by at most GRADIENT ticks" per 20 ms frame).
/// Implementations must return within the 2500 µs tick budget (spec.md
/// §4.5's contract).
pub trait ServoClient {
    fn width_for_slot(&self, slot: usize) -> Ticks;
}

/// The servo engine (spec.md component C5).
///
/// `min_ticks`/`max_ticks` bound every width this engine will ever program
/// into the compare channel; see DESIGN.md for why this is a
/// construction-time parameter rather than the fixed `[500, 2250]`-tick
/// literal spec.md §4.5 quotes (that literal is inconsistent with spec.md
/// §3's own servo slot domain of 750–2000 µs = 1500–4000 ticks).
pub struct ServoEngine<'a, A, C>
where
    A: Alarm<'a>,
    C: CompareTimer<'a>,
{
    alarm: &'a A,
    compare: &'a C,
    pins: [&'a dyn Pin; NUM_SLOTS],
    widths: [Cell<Ticks>; NUM_SLOTS],
    index: Cell<usize>,
    min_ticks: Ticks,
    max_ticks: Ticks,
    client: OptionalCell<&'a dyn ServoClient>,
}

impl<'a, A, C> ServoEngine<'a, A, C>
where
    A: Alarm<'a>,
    C: CompareTimer<'a>,
{
    pub fn new(
        alarm: &'a A,
        compare: &'a C,
        pins: [&'a dyn Pin; NUM_SLOTS],
        min_ticks: Ticks,
        max_ticks: Ticks,
    ) -> Self {
        let neutral = min_ticks + (max_ticks - min_ticks) / 2;
        ServoEngine {
            alarm,
            compare,
            pins,
            widths: core::array::from_fn(|_| Cell::new(neutral)),
            index: Cell::new(NUM_SLOTS - 1), // first tick advances to slot 0
            min_ticks,
            max_ticks,
            client: OptionalCell::empty(),
        }
    }

    pub fn set_client(&self, client: &'a dyn ServoClient) {
        self.client.set(client);
    }

    /// Arms the frame timer. Call once after registering `self` as both the
    /// alarm's and the compare channel's client.
    pub fn start(&self) {
        self.alarm.set_alarm(self.alarm.now(), FRAME_TICK_TICKS);
    }

    /// The width currently programmed for `slot`, for introspection/tests.
    pub fn current_width(&self, slot: usize) -> Ticks {
        self.widths[slot].get()
    }

    fn clamp(&self, width: Ticks) -> Ticks {
        width.clamp(self.min_ticks, self.max_ticks)
    }
}

impl<'a, A, C> AlarmClient for ServoEngine<'a, A, C>
where
    A: Alarm<'a>,
    C: CompareTimer<'a>,
{
    fn alarm(&self) {
        let slot = (self.index.get() + 1) % NUM_SLOTS;
        self.index.set(slot);

        let requested = self
            .client
            .map(|c| c.width_for_slot(slot))
            .unwrap_or_else(|| self.widths[slot].get());
        let width = self.clamp(requested);
        self.widths[slot].set(width);

        // Reload the compare for the new slot before driving its pin high
        // (SPEC_FULL.md §9.1: servo-timer ISR ordering).
        self.compare.load_compare(width);
        for (i, pin) in self.pins.iter().enumerate() {
            pin.write(i == slot);
        }

        self.alarm.set_alarm(self.alarm.now(), FRAME_TICK_TICKS);
    }
}

impl<'a, A, C> CompareClient for ServoEngine<'a, A, C>
where
    A: Alarm<'a>,
    C: CompareTimer<'a>,
{
    fn compare_fired(&self) {
        for pin in &self.pins {
            pin.clear();
        }
    }
}
