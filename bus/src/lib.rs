// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Half-duplex, collision-aware LocoNet-compatible bus protocol engine.
//!
//! Frames and deframes messages, arbitrates the shared wire with CMP
//! back-off, detects contention by TX-echo mismatch, and recovers from
//! collisions with a line-break. See `ln-hal` for the traits an integrator
//! implements to supply the timer and UART.

#![no_std]

pub mod engine;
pub mod framer;
pub mod lfsr;
pub mod ring;

pub use engine::{BusClient, BusEngine, MessageSink};
pub use framer::{build_input_report, checksum, enqueue_outbound, message_length, Opcode};
pub use ring::RingQueue;
