// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node address provisioning. Has no Tock HIL counterpart — Tock capsules
//! don't address themselves on a shared bus — grounded on
//! `original_source/AW_driver/main.c`'s `getDipSwitchAddress()`. The actual
//! DIP-switch bit scatter is an external collaborator this crate never
//! implements itself.

/// Supplies this node's 8-bit address, read once at construction time.
/// There is no address-learning protocol; the address never changes after
/// construction.
pub trait ReadAddress {
    fn read_address(&self) -> u8;
}
