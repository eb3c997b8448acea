// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;

use zilabrad_common::types::{AwgPairKey, DeviceId, DeviceKind};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Malformed calibration table: {0}")]
    MalformedTable(String),

    #[error("Calibration table {0} is already loaded")]
    TableAlreadyLoaded(AwgPairKey),

    #[error("Ports ({port_i}, {port_q}) of xy_I and xy_Q are not an output pair, expected one of {valid:?}")]
    InvalidPortPairing {
        port_i: u16,
        port_q: u16,
        valid: Vec<(u16, u16)>,
    },

    #[error("Device id '{0}' does not name a {1} device")]
    InvalidDeviceId(DeviceId, DeviceKind),

    #[error("No such device type '{0}'")]
    UnknownDeviceClass(String),

    #[error("Device alias '{0}' is not present in the device map")]
    UnknownDeviceAlias(String),

    #[error("No live {kind} driver for device '{id}'")]
    UnknownDevice { kind: DeviceKind, id: DeviceId },

    #[error("Server '{0}' is not available on the connection")]
    MissingServer(String),

    #[error("Missing key '{key}' in {owner}")]
    MissingKey { key: String, owner: String },

    #[error("Qubit '{qubit}' declares no '{channel}' channel")]
    MissingChannel { qubit: String, channel: String },

    #[error("Invalid metadata at '{path}'")]
    InvalidMetadata {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    pub fn new<T>(msg: T) -> Self
    where
        T: Display,
    {
        Error::Anyhow(anyhow::anyhow!(msg.to_string()))
    }

    pub(crate) fn missing_key(key: impl Into<String>, owner: impl Into<String>) -> Self {
        Error::MissingKey {
            key: key.into(),
            owner: owner.into(),
        }
    }
}

/// Create a formatted error message, listing the causes highest-level first.
pub fn create_error_message(error: &Error) -> String {
    let causes = std::iter::successors(std::error::Error::source(error), |e| e.source())
        .map(|cause| format!("{cause}"))
        .collect::<Vec<_>>();
    if causes.is_empty() {
        return format!("{error}");
    }
    format!("{error}\nCaused by:\n  {}", causes.join("\n  "))
}
