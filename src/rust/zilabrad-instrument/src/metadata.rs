// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Device metadata as stored in the lab registry, and the connection it is read from.

use std::hash::Hash;
use std::rc::Rc;

use anyhow::{Context, anyhow};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::driver::Driver;
use crate::{Error, Result};
use zilabrad_common::types::{DeviceId, DeviceKind};

/// Connection to the registry and the servers of the control system.
pub trait Connection {
    /// Read the key-value content of the registry directory at `paths`.
    ///
    /// The returned value is an owned snapshot; later registry updates must not show through.
    fn load(&self, paths: &[&str]) -> anyhow::Result<Value>;

    /// Look up a server by name in the connection namespace.
    fn server(&self, name: &str) -> Option<Rc<dyn Driver>>;
}

/// Load the registry directory at `paths` and decode it into `T`.
pub fn load_as<T, C>(connection: &C, paths: &[&str]) -> Result<T>
where
    T: DeserializeOwned,
    C: Connection + ?Sized,
{
    let value = connection
        .load(paths)
        .with_context(|| format!("Failed to load registry directory '{}'", paths.join("/")))?;
    serde_json::from_value(value).map_err(|source| Error::InvalidMetadata {
        path: paths.join("/"),
        source,
    })
}

/// The device directory of the registry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceInfo {
    /// Acquisition units, alias to serial, e.g. `qa_1 -> dev2592`.
    #[serde(rename = "ziQA_id", deserialize_with = "pairs_or_map")]
    pub qa_ids: IndexMap<String, DeviceId>,
    /// Waveform generators, alias to serial, e.g. `hd_1 -> dev8334`.
    #[serde(rename = "ziHD_id", deserialize_with = "pairs_or_map")]
    pub hd_ids: IndexMap<String, DeviceId>,
    /// Address of the data server every ZI driver connects through.
    pub labone_ip: String,
    pub microwave_server: String,
    /// Microwave source name to its IP address.
    #[serde(default, deserialize_with = "pairs_or_map")]
    pub microwave_source: IndexMap<String, String>,
}

impl DeviceInfo {
    pub fn ids(&self, kind: DeviceKind) -> &IndexMap<String, DeviceId> {
        match kind {
            DeviceKind::Uhfqa => &self.qa_ids,
            DeviceKind::Hdawg => &self.hd_ids,
        }
    }
}

#[derive(Deserialize)]
#[serde(
    untagged,
    bound(deserialize = "K: Deserialize<'de> + Eq + Hash, V: Deserialize<'de>")
)]
enum PairsOrMap<K, V> {
    Map(IndexMap<K, V>),
    Pairs(Vec<(K, V)>),
}

/// Deserialize a mapping stored either as an object or as a list of `[key, value]` pairs.
pub(crate) fn pairs_or_map<'de, D, K, V>(deserializer: D) -> Result<IndexMap<K, V>, D::Error>
where
    D: Deserializer<'de>,
    K: Deserialize<'de> + Eq + Hash,
    V: Deserialize<'de>,
{
    Ok(match PairsOrMap::<K, V>::deserialize(deserializer)? {
        PairsOrMap::Map(map) => map,
        PairsOrMap::Pairs(pairs) => pairs.into_iter().collect(),
    })
}

/// An in-memory registry backed by a JSON tree.
///
/// Stands in for the registry server in offline sessions, with the sample
/// and device directories kept as plain files.
#[derive(Default)]
pub struct JsonRegistry {
    root: Value,
    servers: IndexMap<String, Rc<dyn Driver>>,
}

impl JsonRegistry {
    pub fn new(root: Value) -> Self {
        JsonRegistry {
            root,
            servers: IndexMap::new(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let root = serde_json::from_str(json).map_err(|source| Error::InvalidMetadata {
            path: String::new(),
            source,
        })?;
        Ok(JsonRegistry::new(root))
    }

    pub fn add_server(&mut self, name: impl Into<String>, server: Rc<dyn Driver>) {
        self.servers.insert(name.into(), server);
    }

    pub fn remove_server(&mut self, name: &str) -> Option<Rc<dyn Driver>> {
        self.servers.shift_remove(name)
    }

    /// Replace the value at `paths`, creating intermediate directories.
    pub fn set(&mut self, paths: &[&str], value: Value) {
        let mut node = &mut self.root;
        for segment in paths {
            if !node.is_object() {
                *node = Value::Null;
            }
            node = &mut node[*segment];
        }
        *node = value;
    }
}

impl Connection for JsonRegistry {
    fn load(&self, paths: &[&str]) -> anyhow::Result<Value> {
        paths
            .iter()
            .filter(|segment| !segment.is_empty())
            .try_fold(&self.root, |node, segment| {
                node.get(segment)
                    .ok_or_else(|| anyhow!("No registry directory '{segment}'"))
            })
            .cloned()
    }

    fn server(&self, name: &str) -> Option<Rc<dyn Driver>> {
        self.servers.get(name).map(Rc::clone)
    }
}
