// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::rc::Rc;

use indexmap::IndexMap;

use crate::driver::{Driver, DriverConstructor, DriverRegistry};
use crate::metadata::{Connection, DeviceInfo};
use crate::{Error, Result};
use zilabrad_common::types::{DeviceId, DeviceKind};

/// Builds the drivers of the devices listed in the metadata.
///
/// Owns one [`DriverRegistry`] per registered device class, so a device is
/// connected at most once however often the metadata is resolved. Drivers of
/// devices that disappear from the metadata stay connected; nothing here closes
/// a driver.
#[derive(Default)]
pub struct DeviceResolver {
    registries: IndexMap<DeviceKind, DriverRegistry>,
}

impl DeviceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_constructor(
        mut self,
        kind: DeviceKind,
        constructor: impl DriverConstructor + 'static,
    ) -> Self {
        self.register_class(kind, Box::new(constructor));
        self
    }

    /// Register the constructor of a device class.
    ///
    /// Re-registering a class drops its live drivers.
    pub fn register_class(&mut self, kind: DeviceKind, constructor: Box<dyn DriverConstructor>) {
        self.registries
            .insert(kind, DriverRegistry::new(kind, constructor));
    }

    fn registry_mut(&mut self, class_name: &str) -> Result<&mut DriverRegistry> {
        DeviceKind::from_metadata_key(class_name)
            .and_then(|kind| self.registries.get_mut(&kind))
            .ok_or_else(|| Error::UnknownDeviceClass(class_name.to_string()))
    }

    /// Drivers for every device of the class listed in the metadata, keyed by serial.
    ///
    /// Devices already connected keep their driver; the others are connected through
    /// the data server at `labone_ip`.
    pub fn get_drivers(
        &mut self,
        class_name: &str,
        info: &DeviceInfo,
    ) -> Result<IndexMap<DeviceId, &dyn Driver>> {
        let registry = self.registry_mut(class_name)?;
        let ids = info.ids(registry.kind());
        for id in ids.values() {
            registry.get_or_construct(id, &info.labone_ip)?;
        }
        let registry: &DriverRegistry = registry;
        Ok(ids
            .values()
            .filter_map(|id| registry.get(id).map(|driver| (id.clone(), driver)))
            .collect())
    }

    /// The microwave source server named in the metadata.
    pub fn get_microwave_driver<C>(&self, connection: &C, info: &DeviceInfo) -> Result<Rc<dyn Driver>>
    where
        C: Connection + ?Sized,
    {
        connection
            .server(&info.microwave_server)
            .ok_or_else(|| Error::MissingServer(info.microwave_server.clone()))
    }

    pub fn driver(&self, kind: DeviceKind, id: &DeviceId) -> Option<&dyn Driver> {
        self.registries.get(&kind)?.get(id)
    }

    /// Serials of all live drivers of a class, including devices removed from the metadata.
    pub fn live_devices(&self, kind: DeviceKind) -> Vec<&DeviceId> {
        self.registries
            .get(&kind)
            .map(|registry| registry.live_devices().collect())
            .unwrap_or_default()
    }
}
