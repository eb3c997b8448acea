// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::metadata::pairs_or_map;
use crate::{Error, Result};
use zilabrad_common::types::{Channel, ChannelPortRef};

/// Qubit entries decoded into typed fields.
const TYPED_KEYS: [&str; 2] = ["channels", "xy_mw_fc"];

/// Qubit configuration as stored in the sample directory of the registry.
///
/// The wiring and the drive carrier are typed; every other parameter is kept as
/// stored and can be projected with [`Qubit::param`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Qubit {
    #[serde(skip)]
    name: String,
    /// Registry values of the typed fields, in the shape they were stored.
    #[serde(skip)]
    stored: IndexMap<String, Value>,
    #[serde(deserialize_with = "pairs_or_map")]
    pub channels: IndexMap<Channel, ChannelPortRef>,
    /// Carrier frequency of the xy microwave source in GHz.
    #[serde(default)]
    pub xy_mw_fc: Option<f64>,
    #[serde(flatten)]
    pub params: IndexMap<String, Value>,
}

impl Qubit {
    pub fn new(
        name: impl Into<String>,
        channels: impl IntoIterator<Item = (Channel, ChannelPortRef)>,
    ) -> Self {
        Qubit {
            name: name.into(),
            channels: channels.into_iter().collect(),
            stored: IndexMap::new(),
            xy_mw_fc: None,
            params: IndexMap::new(),
        }
    }

    pub fn from_value(name: impl Into<String>, value: Value) -> Result<Self> {
        let name = name.into();
        let stored = TYPED_KEYS
            .into_iter()
            .filter_map(|key| {
                let stored = value.get(key).filter(|stored| !stored.is_null())?;
                Some((key.to_string(), stored.clone()))
            })
            .collect();
        let mut qubit: Qubit =
            serde_json::from_value(value).map_err(|source| Error::InvalidMetadata {
                path: name.clone(),
                source,
            })?;
        qubit.name = name;
        qubit.stored = stored;
        Ok(qubit)
    }

    pub fn with_carrier(mut self, frequency: f64) -> Self {
        self.xy_mw_fc = Some(frequency);
        self.stored.shift_remove("xy_mw_fc");
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn port(&self, channel: Channel) -> Option<&ChannelPortRef> {
        self.channels.get(&channel)
    }

    pub(crate) fn require_port(&self, channel: Channel) -> Result<&ChannelPortRef> {
        self.port(channel).ok_or_else(|| Error::MissingChannel {
            qubit: self.name.clone(),
            channel: channel.to_string(),
        })
    }

    /// Ports of the declared channels in routing order `dc, xy_I, xy_Q, z`.
    pub fn routed_ports(&self) -> impl Iterator<Item = &ChannelPortRef> {
        Channel::ROUTING_ORDER
            .into_iter()
            .filter_map(|channel| self.port(channel))
    }

    /// The value of a qubit parameter.
    ///
    /// Parameters read from the registry come back exactly as stored, including
    /// the pair list form of `channels`. Typed fields set in code project in
    /// their decoded form: `channels` as an object of `{"device", "port"}`
    /// records keyed by channel name, `xy_mw_fc` as a float.
    pub fn param(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.stored.get(key) {
            return Some(value.clone());
        }
        match key {
            "xy_mw_fc" => self.xy_mw_fc.map(Value::from),
            "channels" => serde_json::to_value(&self.channels).ok(),
            _ => self.params.get(key).cloned(),
        }
    }
}

/// Project `key` out of every qubit, in order.
///
/// Values have the shape described on [`Qubit::param`]. A qubit without the
/// parameter is an error naming that qubit.
pub fn get_qubit_param(qubits: &[Qubit], key: &str) -> Result<Vec<Value>> {
    qubits
        .iter()
        .map(|qubit| {
            qubit
                .param(key)
                .ok_or_else(|| Error::missing_key(key, format!("qubit '{}'", qubit.name())))
        })
        .collect()
}

/// Copy the sample configuration and extract the qubits listed in its `config` entry.
///
/// Returns the copy of the sample together with the qubits in `config` order.
pub fn load_qubits(sample: &Value) -> Result<(Value, Vec<Qubit>)> {
    let sample = sample.clone();
    let names: Vec<String> = sample
        .get("config")
        .cloned()
        .ok_or_else(|| Error::missing_key("config", "sample"))
        .and_then(|config| {
            serde_json::from_value(config).map_err(|source| Error::InvalidMetadata {
                path: "config".to_string(),
                source,
            })
        })?;
    let qubits = names
        .into_iter()
        .map(|name| {
            let value = sample
                .get(&name)
                .cloned()
                .ok_or_else(|| Error::missing_key(name.as_str(), "sample"))?;
            Qubit::from_value(name, value)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((sample, qubits))
}
