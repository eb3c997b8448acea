// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Logging macros of the zilabrad crates.
//!
//! All records go through the `log` facade with a `zilabrad.rust::<module>`
//! target, so the host can route or filter the instrument layer as a whole.

use std::sync::{atomic::AtomicBool, atomic::Ordering};

#[doc(hidden)]
pub use log as _log;

/// Prefix of the target of every record emitted through these macros.
pub const TARGET_PREFIX: &str = "zilabrad.rust::";

#[macro_export]
macro_rules! info {
    ($msg:literal, $($arg:tt)+) => {
        $crate::_log::info!(target: concat!("zilabrad.rust::", module_path!()), $msg, $($arg)+);
    };
    ($msg:literal) => {
        $crate::_log::info!(target: concat!("zilabrad.rust::", module_path!()), $msg);
    };
}

#[macro_export]
macro_rules! warn {
    ($msg:literal, $($arg:tt)+) => {
        $crate::_log::warn!(target: concat!("zilabrad.rust::", module_path!()), $msg, $($arg)+);
    };
    ($msg:literal) => {
        $crate::_log::warn!(target: concat!("zilabrad.rust::", module_path!()), $msg);
    };
}

/// Log a diagnostic message at debug level if diagnostics logging is enabled.
///
/// Diagnostics cover the instrument bookkeeping (driver construction and reuse,
/// metadata refreshes) that is too chatty for an interactive session by default.
#[macro_export]
macro_rules! diagnostic {
    ($msg:literal, $($arg:tt)+) => {
        if $crate::is_diagnostics_enabled() {
            $crate::_log::debug!(target: concat!("zilabrad.rust::", module_path!()), $msg, $($arg)+);
        }
    };
    ($msg:literal) => {
        if $crate::is_diagnostics_enabled() {
            $crate::_log::debug!(target: concat!("zilabrad.rust::", module_path!()), $msg);
        }
    };
}

static DIAGNOSTICS_ENABLED: AtomicBool = AtomicBool::new(false);

#[inline]
pub fn is_diagnostics_enabled() -> bool {
    DIAGNOSTICS_ENABLED.load(Ordering::Acquire)
}

/// Switch the diagnostics records of the instrument layer on or off.
///
/// The lab host owns the logging setup: the interactive measurement shell, a
/// scripted calibration run or a test harness installs its `log` backend and
/// then calls this once with the `with_diagnostics` value of its session
/// settings. Experiment contexts never call it, so opening a second context
/// does not change what the first one logs.
///
/// The flag is process wide. Info and warning records (skipped zero
/// corrections, sanitized settings) are emitted regardless of it.
pub fn init_logging(with_diagnostics: bool) {
    DIAGNOSTICS_ENABLED.store(with_diagnostics, Ordering::Release);
}
