// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Interrupt masking for the one critical section this workspace needs.
//!
//! Tock itself never exposes a raw enable/disable pair in its HIL — it
//! synchronizes through its scheduler and per-capsule `Cell`s instead. This
//! bus has no scheduler: disabling interrupts is its only mutual-exclusion
//! primitive, so this trait is the one HAL surface with no Tock HIL
//! counterpart, added directly over the hardware's raw mask/unmask pair.

/// Masks and unmasks the interrupt sources the bus/servo engines share with
/// their foreground caller. Calls never nest in this workspace — every
/// critical section here is a handful of ring-queue writes.
pub trait InterruptControl {
    fn disable_interrupts(&self);
    fn enable_interrupts(&self);
}
