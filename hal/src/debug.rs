// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Diagnostic output.
//!
//! Tock's own `kernel::debug!` macro formats into a globally-registered
//! writer a board installs once at startup; that registration lives in the
//! unpublished `kernel` crate, so this workspace defines the same shape
//! standalone: an integrator supplies one [`DebugSink`], and the [`debug!`]
//! macro formats into it. There are no log levels — this bus has no
//! user-visible error surface beyond its indicator outputs, so this exists
//! purely for bring-up/trace use, matching how sparingly Tock capsules
//! themselves call `debug!` (a handful of framing-error and queue-overflow
//! sites, never on the steady-state path).

/// Anything that can receive formatted diagnostic text. Implemented by an
/// integrator over whatever the real debug UART or semihosting channel is.
pub trait DebugSink: core::fmt::Write {}
impl<T: core::fmt::Write> DebugSink for T {}

/// Formats `$($arg)*` into `$sink`, discarding the rare formatting error
/// (there is nowhere to report it to).
#[macro_export]
macro_rules! debug {
    ($sink:expr, $($arg:tt)*) => {{
        let _ = core::fmt::Write::write_fmt(&mut $sink, core::format_args!($($arg)*));
    }};
}
