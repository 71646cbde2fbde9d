// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The bus engine: the timer/UART-RX-driven state machine of spec.md §4.4.
//!
//! Grounded on `capsules/extra/src/sdcard.rs`'s overall shape (a `Cell<Mode>`
//! plus client dispatch driven by an `AlarmClient`/SPI-client pair) and
//! `capsules/core/src/process_console.rs`'s byte-at-a-time RX re-arm
//! (`self.uart.receive_buffer(buffer, 1)` called again at the end of every
//! `received_buffer`). `BusEngine` implements [`AlarmClient`] and
//! [`ReceiveClient`] with `&self` methods, matching how Tock capsules are
//! registered as a single shared client object; the non-`Copy` queue state
//! this capsule owns is kept in `RefCell`s rather than Tock's
//! `Cell`/`TakeCell` pair, since those queues need in-place structural
//! mutation (push/pop) rather than whole-value replacement (see DESIGN.md).

use core::cell::{Cell, RefCell};

use ln_hal::time::{Alarm, AlarmClient, ConvertTicks, Ticks};
use ln_hal::uart::{BusControl, Configure, Error, Receive, ReceiveClient, Transmit};
use ln_hal::{ErrorCode, OptionalCell};

use crate::framer::{self, PushOutcome, RxAssembler};
use crate::lfsr;
use crate::ring::RingQueue;

/// `TMR1_MODE` in `original_source/ln.h`, as a tagged enum per spec.md §9's
/// re-architecture recommendation ("a tagged enum with explicit
/// transitions").
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Mode {
    Idle,
    CmpDelay,
    LineBreak,
    BrgSync,
}

/// 1 ms idle-poll delay (`original_source/ln.c`'s `startIdleDelay`,
/// `WRITETIMER1(~2000)`).
const IDLE_DELAY_TICKS: Ticks = 2000;
/// Carrier (1200 µs) + master (360 µs) portion of the CMP delay, in ticks
/// (`startCmpDelay`'s `delay += 3120U`).
const CMP_BASE_TICKS: Ticks = 3120;
/// Mask applied to the LFSR output for the CMP delay's random component
/// (`startCmpDelay`'s `delay &= 2048U - 1U`).
const CMP_JITTER_MASK: u16 = 0x07FF;
/// Baud-rate-generator resync delay (`startSyncBrg1`'s `WRITETIMER1(~42U)`).
const BRG_SYNC_TICKS: Ticks = 42;
/// Line-break duration after a framing error (`lnIsr`'s
/// `startLinebreak(600U)`).
const FRAMING_BREAK_TICKS: Ticks = 600;
/// Line-break duration after an echo mismatch or a busy line at TX time
/// (`lnIsrRc`/`txHandler`'s `startLinebreak(1800U)`).
const COLLISION_BREAK_TICKS: Ticks = 1800;

/// Receiver of complete, checksum-valid inbound messages.
///
/// Mirrors spec.md §9's re-architecture recommendation ("callback as a
/// trait object ... `onInbound(&mut self, &mut RxQueue)`"): `delivered`
/// holds exactly the bytes of one message (opcode through checksum); the
/// engine clears it the instant this call returns, so an implementation
/// that wants to keep the bytes must copy them out before returning.
pub trait BusClient<const N: usize> {
    fn message_received(&self, delivered: &mut RingQueue<N>);
}

/// A narrow capability view of [`BusEngine::queue_message`], so downstream
/// crates (`ln-turnout`) can depend on "something I can hand outbound
/// messages to" without depending on `BusEngine`'s concrete alarm/UART type
/// parameters.
pub trait MessageSink {
    fn queue_message(&self, payload: &[u8]);
}

/// The bus protocol engine (spec.md §4.4), generic over its alarm and UART
/// adapters and the shared ring-queue capacity `N`.
///
/// `N` backs every queue this engine owns (TX, TX-staging, RX-staging,
/// RX-delivered) with one capacity, sized to the true protocol maximum of
/// 127 bytes by default rather than spec.md §3's quoted educational minimum
/// of 16/8 — see DESIGN.md for why a smaller capacity would violate the "no
/// silent truncation of a valid message" invariant.
pub struct BusEngine<'a, A, U, const N: usize>
where
    A: Alarm<'a>,
    U: Transmit<'a> + Receive<'a> + BusControl,
{
    alarm: &'a A,
    uart: &'a U,
    irq: &'a dyn ln_hal::critical::InterruptControl,
    mode: Cell<Mode>,
    lfsr: Cell<u16>,
    tx: RefCell<RingQueue<N>>,
    staging: RefCell<RingQueue<N>>,
    rx: RefCell<RxAssembler<N>>,
    delivered: RefCell<RingQueue<N>>,
    client: OptionalCell<&'a dyn BusClient<N>>,
}

impl<'a, A, U, const N: usize> BusEngine<'a, A, U, N>
where
    A: Alarm<'a>,
    U: Transmit<'a> + Receive<'a> + BusControl,
{
    /// Builds an idle engine. `uart` is expected to already be configured
    /// for 16,666 bit/s 8N1 (spec.md §6) by the caller — this workspace
    /// fixes no baud rate parameter here, matching `original_source/ln.c`'s
    /// `setBrg1()` hardcoding `SP1BRG = 59` rather than taking it as an
    /// argument.
    pub fn new(
        alarm: &'a A,
        uart: &'a U,
        irq: &'a dyn ln_hal::critical::InterruptControl,
    ) -> Self {
        BusEngine {
            alarm,
            uart,
            irq,
            mode: Cell::new(Mode::Idle),
            lfsr: Cell::new(lfsr::DEFAULT_SEED),
            tx: RefCell::new(RingQueue::new()),
            staging: RefCell::new(RingQueue::new()),
            rx: RefCell::new(RxAssembler::new()),
            delivered: RefCell::new(RingQueue::new()),
            client: OptionalCell::empty(),
        }
    }

    pub fn set_client(&self, client: &'a dyn BusClient<N>) {
        self.client.set(client);
    }

    /// Arms the receiver and enters the idle poll. Call once after
    /// registering `self` as the alarm's and UART's client.
    pub fn start(&self) {
        let _ = self.uart.receive_word();
        self.start_idle_delay();
    }

    /// `lnTxMessageHandler`: appends `payload` plus its trailing checksum to
    /// the TX queue. Masks interrupts for the duration (spec.md §4.3).
    pub fn queue_message(&self, payload: &[u8]) {
        self.irq.disable_interrupts();
        framer::enqueue_outbound(&mut self.tx.borrow_mut(), payload);
        self.irq.enable_interrupts();
    }

    fn start_idle_delay(&self) {
        self.mode.set(Mode::Idle);
        self.alarm.set_alarm(self.alarm.now(), IDLE_DELAY_TICKS);
    }

    fn start_cmp_delay(&self) {
        let next = lfsr::next(self.lfsr.get());
        self.lfsr.set(next);
        let delay = Ticks::from(next & CMP_JITTER_MASK) + CMP_BASE_TICKS;
        self.mode.set(Mode::CmpDelay);
        self.alarm.set_alarm(self.alarm.now(), delay);
    }

    fn start_linebreak(&self, duration: Ticks) {
        self.uart.set_break(true);
        self.mode.set(Mode::LineBreak);
        self.alarm.set_alarm(self.alarm.now(), duration);
    }

    fn start_sync_brg(&self) {
        self.mode.set(Mode::BrgSync);
        self.alarm.set_alarm(self.alarm.now(), BRG_SYNC_TICKS);
    }

    /// `startLnTxMessage`: moves exactly one message (opcode through
    /// checksum) from the TX queue into TX-staging.
    fn start_ln_tx_message(&self) {
        let mut tx = self.tx.borrow_mut();
        if tx.is_empty() {
            return;
        }
        let mut staging = self.staging.borrow_mut();
        staging.enqueue(tx.dequeue());
        while !tx.is_empty() && tx.peek(0) & 0x80 == 0 {
            staging.enqueue(tx.dequeue());
        }
    }

    /// `txHandler`: writes the head of TX-staging to the UART if the line is
    /// free, else starts a collision line-break.
    fn tx_handler(&self) {
        if self.uart.line_is_idle() {
            let byte = self.staging.borrow().peek(0);
            let _ = self.uart.transmit_word(byte);
        } else {
            self.start_linebreak(COLLISION_BREAK_TICKS);
        }
    }

    fn handle_inbound_byte(&self, byte: u8) {
        let outcome = self.rx.borrow_mut().push_byte(byte);
        if outcome != PushOutcome::Complete {
            return;
        }
        {
            let mut rx = self.rx.borrow_mut();
            let mut delivered = self.delivered.borrow_mut();
            rx.take_into(&mut delivered);
        }
        self.client.map(|c| {
            let mut delivered = self.delivered.borrow_mut();
            c.message_received(&mut delivered);
        });
        self.delivered.borrow_mut().clear();
    }
}

impl<'a, A, U, const N: usize> MessageSink for BusEngine<'a, A, U, N>
where
    A: Alarm<'a>,
    U: Transmit<'a> + Receive<'a> + BusControl,
{
    fn queue_message(&self, payload: &[u8]) {
        BusEngine::queue_message(self, payload);
    }
}

impl<'a, A, U, const N: usize> AlarmClient for BusEngine<'a, A, U, N>
where
    A: Alarm<'a>,
    U: Transmit<'a> + Receive<'a> + BusControl,
{
    fn alarm(&self) {
        match self.mode.get() {
            Mode::Idle => {
                if self.uart.line_is_idle() {
                    if !self.staging.borrow().is_empty() {
                        self.start_sync_brg();
                    } else if !self.tx.borrow().is_empty() {
                        self.start_ln_tx_message();
                        self.start_sync_brg();
                    } else {
                        self.start_idle_delay();
                    }
                } else {
                    self.start_cmp_delay();
                }
            }
            Mode::CmpDelay => {
                if self.uart.line_is_idle() {
                    self.start_idle_delay();
                } else {
                    self.start_cmp_delay();
                }
            }
            Mode::LineBreak => {
                self.uart.set_break(false);
                let _ = self.uart.receive_word();
                self.start_cmp_delay();
            }
            Mode::BrgSync => {
                self.tx_handler();
            }
        }
    }
}

impl<'a, A, U, const N: usize> ReceiveClient for BusEngine<'a, A, U, N>
where
    A: Alarm<'a>,
    U: Transmit<'a> + Receive<'a> + BusControl,
{
    fn received_word(&self, word: u8, _rcode: Result<(), ErrorCode>, error: Error) {
        if error != Error::None {
            // recoverLnMessage(&lnTxTempQueue) is a no-op here — see
            // SPEC_FULL.md §9.1. TX-staging already holds exactly the
            // unacknowledged suffix of the in-flight message, untouched.
            self.start_linebreak(FRAMING_BREAK_TICKS);
            return;
        }

        let staging_empty = self.staging.borrow().is_empty();
        if !staging_empty {
            let matched = self.staging.borrow().peek(0) == word;
            if matched {
                self.staging.borrow_mut().dequeue();
                if self.staging.borrow().is_empty() {
                    self.start_cmp_delay();
                } else {
                    self.tx_handler();
                }
            } else {
                self.start_linebreak(COLLISION_BREAK_TICKS);
                return;
            }
        } else {
            self.handle_inbound_byte(word);
            self.start_cmp_delay();
        }
        let _ = self.uart.receive_word();
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use core::cell::RefCell as StdRefCell;

    pub struct FakeAlarm<'a> {
        now: Cell<Ticks>,
        armed_at: Cell<Ticks>,
        armed_dt: Cell<Ticks>,
        client: OptionalCell<&'a dyn AlarmClient>,
    }

    impl<'a> FakeAlarm<'a> {
        pub fn new() -> Self {
            FakeAlarm {
                now: Cell::new(0),
                armed_at: Cell::new(0),
                armed_dt: Cell::new(0),
                client: OptionalCell::empty(),
            }
        }

        pub fn armed_dt(&self) -> Ticks {
            self.armed_dt.get()
        }

        /// Advances simulated time to the armed deadline and fires the
        /// client, as a real interrupt would.
        pub fn fire(&self) {
            self.now.set(self.armed_at.get() + self.armed_dt.get());
            self.client.map(|c| c.alarm());
        }
    }

    impl<'a> ConvertTicks for FakeAlarm<'a> {
        fn ticks_from_us(&self, us: u32) -> Ticks {
            us * 2
        }
        fn us_from_ticks(&self, ticks: Ticks) -> u32 {
            ticks / 2
        }
    }

    impl<'a> Alarm<'a> for FakeAlarm<'a> {
        fn set_alarm_client(&self, client: &'a dyn AlarmClient) {
            self.client.set(client);
        }
        fn set_alarm(&self, reference: Ticks, dt: Ticks) {
            self.armed_at.set(reference);
            self.armed_dt.set(dt);
        }
        fn disarm(&self) -> Result<(), ErrorCode> {
            Ok(())
        }
        fn now(&self) -> Ticks {
            self.now.get()
        }
    }

    pub struct FakeUart {
        pub transmitted: StdRefCell<RingQueue<32>>,
        pub break_asserted: Cell<bool>,
        pub idle: Cell<bool>,
    }

    impl FakeUart {
        pub fn new() -> Self {
            FakeUart {
                transmitted: StdRefCell::new(RingQueue::new()),
                break_asserted: Cell::new(false),
                idle: Cell::new(true),
            }
        }
    }

    impl Configure for FakeUart {
        fn configure(&self, _params: ln_hal::uart::Parameters) -> Result<(), ErrorCode> {
            Ok(())
        }
    }

    impl<'a> Transmit<'a> for FakeUart {
        fn set_transmit_client(&self, _client: &'a dyn ln_hal::uart::TransmitClient) {}
        fn transmit_word(&self, word: u8) -> Result<(), ErrorCode> {
            self.transmitted.borrow_mut().enqueue(word);
            Ok(())
        }
    }

    impl<'a> Receive<'a> for FakeUart {
        fn set_receive_client(&self, _client: &'a dyn ReceiveClient) {}
        fn receive_word(&self) -> Result<(), ErrorCode> {
            Ok(())
        }
    }

    impl BusControl for FakeUart {
        fn set_break(&self, asserted: bool) {
            self.break_asserted.set(asserted);
        }
        fn line_is_idle(&self) -> bool {
            self.idle.get()
        }
    }

    pub struct FakeIrq {
        pub disabled: Cell<bool>,
    }

    impl FakeIrq {
        pub fn new() -> Self {
            FakeIrq {
                disabled: Cell::new(false),
            }
        }
    }

    impl ln_hal::critical::InterruptControl for FakeIrq {
        fn disable_interrupts(&self) {
            self.disabled.set(true);
        }
        fn enable_interrupts(&self) {
            self.disabled.set(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{FakeAlarm, FakeIrq, FakeUart};
    use super::*;

    #[derive(Default)]
    struct RecordingClient {
        received: RefCell<RingQueue<32>>,
    }

    impl BusClient<32> for RecordingClient {
        fn message_received(&self, delivered: &mut RingQueue<32>) {
            while !delivered.is_empty() {
                self.received.borrow_mut().enqueue(delivered.dequeue());
            }
        }
    }

    #[test]
    fn queue_message_appends_checksum() {
        let alarm = FakeAlarm::new();
        let uart = FakeUart::new();
        let irq = FakeIrq::new();
        let engine: BusEngine<'_, FakeAlarm<'_>, FakeUart, 32> = BusEngine::new(&alarm, &uart, &irq);
        engine.queue_message(&[0xB2, 0x00, 0x10]);
        assert!(!irq.disabled.get());
    }

    #[test]
    fn idle_to_brgsync_to_tx_on_free_line_with_queued_message() {
        let alarm = FakeAlarm::new();
        let uart = FakeUart::new();
        let irq = FakeIrq::new();
        let engine: BusEngine<'_, FakeAlarm<'_>, FakeUart, 32> = BusEngine::new(&alarm, &uart, &irq);
        alarm.set_alarm_client(&engine);
        engine.queue_message(&[0xB2, 0x00, 0x10]);
        engine.start();
        assert_eq!(alarm.armed_dt(), IDLE_DELAY_TICKS);

        uart.idle.set(true);
        alarm.fire(); // Idle -> BrgSync (message staged)
        assert_eq!(alarm.armed_dt(), BRG_SYNC_TICKS);

        alarm.fire(); // BrgSync -> tx_handler writes first byte
        assert_eq!(uart.transmitted.borrow_mut().dequeue(), 0xB2);
    }

    #[test]
    fn busy_line_at_idle_enters_cmp_delay() {
        let alarm = FakeAlarm::new();
        let uart = FakeUart::new();
        let irq = FakeIrq::new();
        let engine: BusEngine<'_, FakeAlarm<'_>, FakeUart, 32> = BusEngine::new(&alarm, &uart, &irq);
        alarm.set_alarm_client(&engine);
        engine.start();
        uart.idle.set(false);
        alarm.fire();
        assert!(
            alarm.armed_dt() >= CMP_BASE_TICKS,
            "CMP delay must be at least the fixed carrier+master component"
        );
    }

    #[test]
    fn echo_mismatch_triggers_collision_linebreak() {
        let alarm = FakeAlarm::new();
        let uart = FakeUart::new();
        let irq = FakeIrq::new();
        let engine: BusEngine<'_, FakeAlarm<'_>, FakeUart, 32> = BusEngine::new(&alarm, &uart, &irq);
        alarm.set_alarm_client(&engine);
        engine.queue_message(&[0xB2, 0x00, 0x10]);
        engine.start();
        alarm.fire(); // Idle -> BrgSync
        alarm.fire(); // BrgSync -> first byte transmitted

        // Something else drove the wire: echo comes back wrong.
        engine.received_word(0xFF, Ok(()), Error::None);
        assert!(uart.break_asserted.get());
        assert_eq!(alarm.armed_dt(), COLLISION_BREAK_TICKS);
    }

    #[test]
    fn clean_echo_of_whole_message_returns_to_cmp_delay() {
        let alarm = FakeAlarm::new();
        let uart = FakeUart::new();
        let irq = FakeIrq::new();
        let engine: BusEngine<'_, FakeAlarm<'_>, FakeUart, 32> = BusEngine::new(&alarm, &uart, &irq);
        alarm.set_alarm_client(&engine);
        engine.queue_message(&[0xB2, 0x00, 0x10]);
        engine.start();
        alarm.fire(); // Idle -> BrgSync
        alarm.fire(); // BrgSync -> byte 0 (0xB2) transmitted

        // Checksum is 0x5D, not the 0x2D spec.md §8 Scenario 1 quotes — see
        // the note on `framer.rs`'s `enqueue_outbound_appends_matching_checksum`.
        engine.received_word(0xB2, Ok(()), Error::None);
        engine.received_word(0x00, Ok(()), Error::None);
        engine.received_word(0x10, Ok(()), Error::None);
        engine.received_word(0x5D, Ok(()), Error::None);
        assert!(alarm.armed_dt() >= CMP_BASE_TICKS);
    }

    #[test]
    fn framing_error_starts_short_linebreak() {
        let alarm = FakeAlarm::new();
        let uart = FakeUart::new();
        let irq = FakeIrq::new();
        let engine: BusEngine<'_, FakeAlarm<'_>, FakeUart, 32> = BusEngine::new(&alarm, &uart, &irq);
        alarm.set_alarm_client(&engine);
        engine.start();
        engine.received_word(0, Ok(()), Error::FramingError);
        assert!(uart.break_asserted.get());
        assert_eq!(alarm.armed_dt(), FRAMING_BREAK_TICKS);
    }

    #[test]
    fn inbound_message_reaches_client() {
        let alarm = FakeAlarm::new();
        let uart = FakeUart::new();
        let irq = FakeIrq::new();
        let engine: BusEngine<'_, FakeAlarm<'_>, FakeUart, 32> = BusEngine::new(&alarm, &uart, &irq);
        let client = RecordingClient::default();
        engine.set_client(&client);
        engine.start();

        engine.received_word(0x82, Ok(()), Error::None);
        engine.received_word(0x7D, Ok(()), Error::None);

        let mut received = client.received.borrow_mut();
        assert_eq!(received.num_entries(), 2);
        assert_eq!(received.dequeue(), 0x82);
        assert_eq!(received.dequeue(), 0x7D);
    }
}
