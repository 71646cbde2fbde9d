// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Eight independent servo-driven turnouts, commanded by bus messages and
//! reporting feedback changes back onto the bus (spec.md §4.6).
//!
//! Grounded on `original_source/AW_driver/main.c`'s `lnRxMessageHandler`
//! (opcode dispatch) and `awHandler` (status-byte composition), and on
//! `aw.h`'s `AWCON_t` record shape (`CAWL`/`CAWR`/`CAWL_mem`/`CAWR_mem`/
//! `KAWL`/`KAWR`). Plays the same "capsule built on two HIL-shaped
//! dependencies" role as `capsules/extra/src/nrf51822_serialization.rs`
//! plays over `hil::uart`, here over `ln-bus`'s [`BusClient`]/[`MessageSink`]
//! and `ln-servo`'s [`ServoClient`].

#![no_std]

use core::cell::Cell;

use ln_bus::framer::Opcode;
use ln_bus::{BusClient, MessageSink, RingQueue};
use ln_hal::address::ReadAddress;
use ln_hal::time::Ticks;
use ln_servo::{ServoClient, NUM_SLOTS};

/// Pulse width ticks at 0.5 µs/tick for `SERVO_MIN`/`SERVO_MAX`
/// (`original_source/AW_driver/aw.h`: 750 µs / 2000 µs).
pub const SERVO_MIN_TICKS: Ticks = 750 * 2;
pub const SERVO_MAX_TICKS: Ticks = 2000 * 2;
/// Initial pulse width (`original_source/AW_driver/servo.c`'s
/// `servoPortD[i] = 1500`).
const INITIAL_WIDTH_TICKS: Ticks = 1500 * 2;
/// Per-20ms-frame sweep step, in ticks. `aw.h`'s `GRADIENT =
/// (SERVO_MAX-SERVO_MIN)/(SWEEPTIME/20)` = 1250/75 = 16 (truncated, `uint8_t`),
/// doubled here to the tick domain.
const GRADIENT_TICKS: Ticks = 16 * 2;

/// One turnout's command/feedback state (`AWCON_t` in `aw.h`).
#[derive(Default)]
struct Turnout {
    cawl: Cell<bool>,
    cawr: Cell<bool>,
    cawl_mem: Cell<bool>,
    cawr_mem: Cell<bool>,
    kawl: Cell<bool>,
    kawr: Cell<bool>,
    width: Cell<Ticks>,
}

impl Turnout {
    fn set_cawl(&self, state: bool) {
        self.cawl.set(state);
        if state {
            self.cawl_mem.set(true);
        }
    }

    fn set_cawr(&self, state: bool) {
        self.cawr.set(state);
        if state {
            self.cawr_mem.set(true);
        }
    }
}

/// The turnout application (spec.md component C6), generic over whatever it
/// hands outbound status reports to.
pub struct TurnoutApp<'a, S: MessageSink> {
    address: u8,
    turnouts: [Turnout; NUM_SLOTS],
    sink: &'a S,
}

impl<'a, S: MessageSink> TurnoutApp<'a, S> {
    /// Reads the node address once from `address_source`
    /// (`original_source/AW_driver/main.c`'s `getDipSwitchAddress()`) and
    /// starts every turnout centered with both command and feedback bits
    /// clear.
    pub fn new(address_source: &dyn ReadAddress, sink: &'a S) -> Self {
        TurnoutApp {
            address: address_source.read_address(),
            turnouts: core::array::from_fn(|_| Turnout {
                width: Cell::new(INITIAL_WIDTH_TICKS),
                ..Turnout::default()
            }),
            sink,
        }
    }

    /// The local node address this app was constructed with.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Current commanded/feedback bits for `index` (0..7), for
    /// introspection/tests.
    pub fn commanded(&self, index: usize) -> (bool, bool) {
        (self.turnouts[index].cawl.get(), self.turnouts[index].cawr.get())
    }

    pub fn feedback(&self, index: usize) -> (bool, bool) {
        (self.turnouts[index].kawl.get(), self.turnouts[index].kawr.get())
    }

    fn handle_switch_request(&self, byte1: u8, byte2: u8) {
        let index = (byte1 & 0x07) as usize;
        let address = ((byte1 & 0x78) >> 3) | ((byte2 & 0x0F) << 4);
        if address != self.address {
            return;
        }
        let turnout = &self.turnouts[index];
        if byte2 & 0x20 != 0 {
            turnout.set_cawl(true);
            turnout.set_cawr(false);
        } else {
            turnout.set_cawl(false);
            turnout.set_cawr(true);
        }
    }

    fn handle_global_off(&self) {
        for turnout in &self.turnouts {
            turnout.cawl.set(false);
            turnout.cawr.set(false);
        }
    }

    fn handle_global_on(&self) {
        for turnout in &self.turnouts {
            turnout.cawl.set(turnout.cawl_mem.get());
            turnout.cawr.set(turnout.cawr_mem.get());
        }
    }

    /// `awHandler`: composes and sends the `0xB1` status report for `index`.
    fn emit_feedback(&self, index: usize, kawl: bool, kawr: bool) {
        let sn1 = (((self.address << 3) & 0x78) | (index as u8)) & 0x7F;
        let mut sn2 = (self.address >> 4) & 0x0F;
        if kawr {
            sn2 |= 1 << 4;
        }
        if kawl {
            sn2 |= 1 << 5;
        }
        self.sink
            .queue_message(&[Opcode::SwitchReport as u8, sn1, sn2]);
    }
}

impl<'a, S: MessageSink, const N: usize> BusClient<N> for TurnoutApp<'a, S> {
    fn message_received(&self, delivered: &mut RingQueue<N>) {
        let opcode = delivered.peek(0);
        match Opcode::from_byte(opcode) {
            Some(Opcode::SwitchRequest) => {
                self.handle_switch_request(delivered.peek(1), delivered.peek(2));
            }
            Some(Opcode::GlobalOff) => self.handle_global_off(),
            Some(Opcode::GlobalOn) => self.handle_global_on(),
            _ => {}
        }
    }
}

impl<'a, S: MessageSink> ServoClient for TurnoutApp<'a, S> {
    /// Per-frame servo update (spec.md §4.6): walk the held width toward
    /// `SERVO_MAX` (commanded left) or `SERVO_MIN` (commanded right) by at
    /// most `GRADIENT` ticks, holding when neither is commanded. A feedback
    /// bit flip emits a status report.
    fn width_for_slot(&self, slot: usize) -> Ticks {
        let turnout = &self.turnouts[slot];
        let mut width = turnout.width.get();
        let prev_kawl = turnout.kawl.get();
        let prev_kawr = turnout.kawr.get();

        if turnout.cawl.get() {
            width = (width + GRADIENT_TICKS).min(SERVO_MAX_TICKS);
        } else if turnout.cawr.get() {
            width = width.saturating_sub(GRADIENT_TICKS).max(SERVO_MIN_TICKS);
        }
        turnout.width.set(width);

        let kawl = width >= SERVO_MAX_TICKS;
        let kawr = width <= SERVO_MIN_TICKS;
        turnout.kawl.set(kawl);
        turnout.kawr.set(kawr);

        if kawl != prev_kawl || kawr != prev_kawr {
            self.emit_feedback(slot, kawl, kawr);
        }

        width
    }
}
