// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::rc::Rc;

use indexmap::IndexMap;

use crate::corrector::ZeroCorrection;
use crate::driver::Driver;
use crate::metadata::{Connection, DeviceInfo, load_as};
use crate::qubit::Qubit;
use crate::resolver::DeviceResolver;
use crate::settings::Settings;
use crate::{Error, Result};
use zilabrad_common::types::{AwgPairKey, ChannelPortRef, DeviceId, DeviceKind};
use zilabrad_log::{diagnostic, warn};

/// Experiment context.
///
/// Provides the servers and the device information of one control session.
/// Construct it once per session and pass it to the routines that drive the
/// instruments; [`ExperimentContext::refresh`] picks up registry changes
/// without reconnecting devices that are already live.
pub struct ExperimentContext<C: Connection> {
    connection: C,
    settings: Settings,
    resolver: DeviceResolver,
    device_info: DeviceInfo,
    microwave_driver: Rc<dyn Driver>,
    microwave_addresses: IndexMap<String, String>,
    /// AWG ports of the current experiment, computed on first use.
    ports: Option<Vec<ChannelPortRef>>,
}

impl<C: Connection> ExperimentContext<C> {
    /// Load the device metadata and connect all listed devices.
    ///
    /// No context exists unless every device class and the microwave server resolved.
    /// The logging setup is left to the host, which passes
    /// `settings.with_diagnostics` to [`zilabrad_log::init_logging`].
    pub fn new(connection: C, mut resolver: DeviceResolver, mut settings: Settings) -> Result<Self> {
        for change in settings.sanitize()? {
            warn!(
                "Setting '{}' changed from {} to {}: {}",
                change.field,
                change.original,
                change.sanitized,
                change.reason
            );
        }
        let (device_info, microwave_driver) = Self::resolve(&connection, &mut resolver, &settings)?;
        Ok(ExperimentContext {
            connection,
            settings,
            resolver,
            microwave_addresses: device_info.microwave_source.clone(),
            device_info,
            microwave_driver,
            ports: None,
        })
    }

    fn resolve(
        connection: &C,
        resolver: &mut DeviceResolver,
        settings: &Settings,
    ) -> Result<(DeviceInfo, Rc<dyn Driver>)> {
        let device_info: DeviceInfo = load_as(connection, &settings.device_paths())?;
        for kind in DeviceKind::ALL {
            let drivers = resolver.get_drivers(kind.metadata_key(), &device_info)?;
            diagnostic!("Resolved {} {} driver(s)", drivers.len(), kind);
        }
        let microwave_driver = resolver.get_microwave_driver(connection, &device_info)?;
        Ok((device_info, microwave_driver))
    }

    /// Reload the device metadata and resolve the drivers again.
    ///
    /// Live drivers are reused. Drivers of devices no longer listed are not closed;
    /// they remain connected in the resolver. On error the previous state is kept.
    pub fn refresh(&mut self) -> Result<()> {
        let (device_info, microwave_driver) =
            Self::resolve(&self.connection, &mut self.resolver, &self.settings)?;
        self.microwave_addresses = device_info.microwave_source.clone();
        self.device_info = device_info;
        self.microwave_driver = microwave_driver;
        diagnostic!("Refreshed device metadata");
        Ok(())
    }

    /// The AWG ports of the qubits, per qubit in the order `dc, xy_I, xy_Q, z`.
    ///
    /// Computed on the first call and returned unchanged afterwards, whatever qubits
    /// are passed, until [`ExperimentContext::clear_temp_params`] is called.
    pub fn get_ports(&mut self, qubits: &[Qubit]) -> &[ChannelPortRef] {
        self.ports.get_or_insert_with(|| {
            qubits
                .iter()
                .flat_map(|qubit| qubit.routed_ports().cloned())
                .collect()
        })
    }

    /// Drop the parameters cached for the current experiment.
    pub fn clear_temp_params(&mut self) {
        self.ports = None;
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Mutable access to the connection, e.g. to edit the registry before a refresh.
    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.connection
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    pub fn resolver(&self) -> &DeviceResolver {
        &self.resolver
    }

    /// Drivers of a device class listed in the current metadata, keyed by device alias.
    pub fn drivers(&self, kind: DeviceKind) -> IndexMap<&str, &dyn Driver> {
        self.device_info
            .ids(kind)
            .iter()
            .filter_map(|(alias, id)| {
                self.resolver
                    .driver(kind, id)
                    .map(|driver| (alias.as_str(), driver))
            })
            .collect()
    }

    /// The first acquisition unit, whose data server session the experiment shares.
    pub fn primary_acquisition_unit(&self) -> Option<&dyn Driver> {
        let id = self.device_info.qa_ids.values().next()?;
        self.resolver.driver(DeviceKind::Uhfqa, id)
    }

    pub fn microwave_driver(&self) -> &dyn Driver {
        &*self.microwave_driver
    }

    /// Microwave source name to IP address.
    pub fn microwave_addresses(&self) -> &IndexMap<String, String> {
        &self.microwave_addresses
    }

    /// Device alias to serial for the acquisition units and waveform generators.
    pub fn channel_device_map(&self) -> IndexMap<String, DeviceId> {
        self.device_info
            .qa_ids
            .iter()
            .chain(&self.device_info.hd_ids)
            .map(|(alias, id)| (alias.clone(), id.clone()))
            .collect()
    }

    /// The waveform generator driving an output pair.
    pub fn awg_driver(&self, key: &AwgPairKey) -> Result<&dyn Driver> {
        let listed = self.device_info.hd_ids.values().any(|id| *id == key.device);
        listed
            .then(|| self.resolver.driver(DeviceKind::Hdawg, &key.device))
            .flatten()
            .ok_or_else(|| Error::UnknownDevice {
                kind: DeviceKind::Hdawg,
                id: key.device.clone(),
            })
    }

    /// Apply the zero correction of the qubit's xy output pair.
    pub fn correct_xy(
        &self,
        corrector: &ZeroCorrection,
        qubit: &Qubit,
    ) -> Result<Option<(f64, f64)>> {
        corrector.apply_correction(qubit, |key| self.awg_driver(key))
    }
}
