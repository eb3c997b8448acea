// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Zero correction of the HDAWG I/Q outputs.
//!
//! The carrier leakage of an IQ mixer is nulled by DC offsets on the two AWG
//! outputs feeding it. The optimal offsets depend on the carrier frequency and
//! are calibrated per output pair; this module keeps the calibration tables and
//! writes the interpolated offsets to the instrument.

mod table;

pub use table::{CalibrationTable, parse_calibration_csv};

use anyhow::Context;
use indexmap::IndexMap;

use crate::driver::Driver;
use crate::qubit::Qubit;
use crate::{Error, Result};
use zilabrad_common::types::{AwgPairKey, Channel, DeviceId, DeviceKind};
use zilabrad_log::info;

/// Node path of the DC offset of a signal output.
pub fn sigout_offset_path(device: &DeviceId, sigout: u16) -> String {
    format!("/{device}/sigouts/{sigout}/offset")
}

#[derive(Debug, Default)]
pub struct ZeroCorrection {
    /// Device alias to serial, e.g. `hd_1 -> dev8334`.
    device_map: IndexMap<String, DeviceId>,
    tables: IndexMap<AwgPairKey, CalibrationTable>,
}

impl ZeroCorrection {
    pub fn new(device_map: IndexMap<String, DeviceId>) -> Self {
        ZeroCorrection {
            device_map,
            tables: IndexMap::new(),
        }
    }

    pub fn device_map(&self) -> &IndexMap<String, DeviceId> {
        &self.device_map
    }

    /// Replace the alias map, e.g. after the device metadata was refreshed.
    ///
    /// Registered tables are kept.
    pub fn set_device_map(&mut self, device_map: IndexMap<String, DeviceId>) {
        self.device_map = device_map;
    }

    /// The `(xy_I, xy_Q)` port combinations that form an output pair.
    pub fn valid_port_pairs() -> Vec<(u16, u16)> {
        let traits = DeviceKind::Hdawg.traits();
        (0..traits.awg_count())
            .filter_map(|awg| traits.awg_ports(awg))
            .collect()
    }

    pub fn resolve_pair_key(&self, qubit: &Qubit) -> Result<AwgPairKey> {
        let port_i = qubit.require_port(Channel::XyI)?;
        let port_q = qubit.require_port(Channel::XyQ)?;
        let awg_index = DeviceKind::Hdawg
            .traits()
            .awg_index_of_ports(port_i.port, port_q.port)
            .ok_or_else(|| Error::InvalidPortPairing {
                port_i: port_i.port,
                port_q: port_q.port,
                valid: Self::valid_port_pairs(),
            })?;
        if port_i.device != port_q.device {
            return Err(Error::new(format!(
                "xy_I and xy_Q of qubit '{}' are wired to different devices ({} and {})",
                qubit.name(),
                port_i.device,
                port_q.device
            )));
        }
        let device = self
            .device_map
            .get(&port_i.device)
            .ok_or_else(|| Error::UnknownDeviceAlias(port_i.device.clone()))?;
        Ok(AwgPairKey {
            device: device.clone(),
            awg_index,
        })
    }

    /// Register an empty table for the output pair of the qubit, unless one exists.
    pub fn register_table(&mut self, qubit: &Qubit) -> Result<AwgPairKey> {
        let key = self.resolve_pair_key(qubit)?;
        if !self.tables.contains_key(&key) {
            let table = CalibrationTable::new(key.clone())?;
            self.tables.insert(key.clone(), table);
        }
        Ok(key)
    }

    /// Register the table of the qubit's output pair and load calibration rows into it.
    pub fn load_table<R: AsRef<[f64]>>(
        &mut self,
        qubit: &Qubit,
        rows: impl IntoIterator<Item = R>,
    ) -> Result<AwgPairKey> {
        let key = self.register_table(qubit)?;
        if let Some(table) = self.tables.get_mut(&key) {
            table.load(rows)?;
        }
        Ok(key)
    }

    pub fn table(&self, key: &AwgPairKey) -> Option<&CalibrationTable> {
        self.tables.get(key)
    }

    pub fn tables(&self) -> impl Iterator<Item = &CalibrationTable> {
        self.tables.values()
    }

    /// Write the zero correction for the carrier frequency of the qubit.
    ///
    /// Returns the written `(I, Q)` offsets, or `None` when the correction was
    /// skipped: no table registered for the output pair, no carrier frequency
    /// configured, or no calibration data loaded.
    ///
    /// The two offsets are separate writes. When the Q write fails the I offset
    /// stays applied.
    pub fn apply_correction<'d, F>(&self, qubit: &Qubit, driver_for: F) -> Result<Option<(f64, f64)>>
    where
        F: FnOnce(&AwgPairKey) -> Result<&'d dyn Driver>,
    {
        let key = self.resolve_pair_key(qubit)?;
        let Some(table) = self.tables.get(&key) else {
            info!("Skip zero correction, no table for {}", key);
            return Ok(None);
        };
        let Some(frequency) = qubit.xy_mw_fc else {
            info!("Skip zero correction of {}, no carrier frequency configured", key);
            return Ok(None);
        };
        let Some((offset_i, offset_q)) = table.get_offset(frequency) else {
            return Ok(None);
        };
        let (sigout_i, sigout_q) = key
            .sigouts()
            .ok_or_else(|| Error::new(format!("No signal outputs for {key}")))?;
        let driver = driver_for(&key)?;
        for (sigout, offset) in [(sigout_i, offset_i), (sigout_q, offset_q)] {
            let path = sigout_offset_path(&key.device, sigout);
            driver
                .set_double(&path, offset)
                .with_context(|| format!("Failed to set {path} to {offset}"))?;
        }
        Ok(Some((offset_i, offset_q)))
    }
}
