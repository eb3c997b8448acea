// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use anyhow::Context;
use indexmap::IndexMap;
use indexmap::map::Entry;

use crate::Result;
use zilabrad_common::types::{DeviceId, DeviceKind};
use zilabrad_log::diagnostic;

/// A live connection to one instrument.
pub trait Driver {
    fn device_id(&self) -> &DeviceId;

    /// Write a numeric node, e.g. `/dev8334/sigouts/4/offset`.
    ///
    /// The call blocks until the instrument acknowledges the write.
    fn set_double(&self, path: &str, value: f64) -> anyhow::Result<()>;
}

/// Opens the connection to one instrument of a device class.
pub trait DriverConstructor {
    fn construct(&self, device_id: &DeviceId, address: &str) -> anyhow::Result<Box<dyn Driver>>;
}

impl<F> DriverConstructor for F
where
    F: Fn(&DeviceId, &str) -> anyhow::Result<Box<dyn Driver>>,
{
    fn construct(&self, device_id: &DeviceId, address: &str) -> anyhow::Result<Box<dyn Driver>> {
        self(device_id, address)
    }
}

/// The live drivers of one device class.
///
/// At most one driver exists per device id: asking for a device that is
/// already connected returns the existing driver.
pub struct DriverRegistry {
    kind: DeviceKind,
    constructor: Box<dyn DriverConstructor>,
    drivers: IndexMap<DeviceId, Box<dyn Driver>>,
}

impl DriverRegistry {
    pub fn new(kind: DeviceKind, constructor: Box<dyn DriverConstructor>) -> Self {
        DriverRegistry {
            kind,
            constructor,
            drivers: IndexMap::new(),
        }
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn get_or_construct(&mut self, device_id: &DeviceId, address: &str) -> Result<&dyn Driver> {
        let driver = match self.drivers.entry(device_id.clone()) {
            Entry::Occupied(entry) => {
                diagnostic!("Reusing {} driver for {}", self.kind, device_id);
                entry.into_mut()
            }
            Entry::Vacant(entry) => {
                diagnostic!("Connecting {} driver for {} via {}", self.kind, device_id, address);
                let driver = self
                    .constructor
                    .construct(device_id, address)
                    .with_context(|| {
                        format!("Failed to connect {} driver for {}", self.kind, device_id)
                    })?;
                entry.insert(driver)
            }
        };
        Ok(&**driver)
    }

    pub fn get(&self, device_id: &DeviceId) -> Option<&dyn Driver> {
        self.drivers.get(device_id).map(|driver| &**driver)
    }

    /// Every device with a live driver, including devices no longer listed in the metadata.
    pub fn live_devices(&self) -> impl Iterator<Item = &DeviceId> {
        self.drivers.keys()
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}
