// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Device registry and zero correction for the qubit control setup.
//!
//! [`context::ExperimentContext`] reads the device directory of the lab registry,
//! connects the acquisition units and waveform generators through a
//! [`resolver::DeviceResolver`], and hands out the drivers. The
//! [`corrector::ZeroCorrection`] keeps the calibration tables of the AWG output
//! pairs and writes the carrier-dependent offsets.

pub mod context;
pub mod corrector;
pub mod driver;
pub mod error;
pub mod metadata;
pub mod qubit;
pub mod resolver;
pub mod settings;

pub use error::{Error, Result};
