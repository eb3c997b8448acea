// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::device_traits::DeviceTraits;

/// Serial of a physical instrument, e.g. `dev8334`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        DeviceId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn has_prefix_of(&self, kind: &DeviceKind) -> bool {
        self.0
            .starts_with(DeviceTraits::from_device_kind(kind).device_id_prefix)
    }
}

impl Display for DeviceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        DeviceId::new(value)
    }
}

/// The device classes the lab drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// Quadrature demodulator digitizing the readout.
    Uhfqa,
    /// Arbitrary waveform generator producing the drive signals.
    Hdawg,
}

impl DeviceKind {
    pub const ALL: [DeviceKind; 2] = [DeviceKind::Uhfqa, DeviceKind::Hdawg];

    /// Key under which the ids of this class are listed in the device registry.
    pub fn metadata_key(&self) -> &'static str {
        match self {
            DeviceKind::Uhfqa => "ziQA_id",
            DeviceKind::Hdawg => "ziHD_id",
        }
    }

    pub fn from_metadata_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.metadata_key() == key)
    }

    pub fn traits(&self) -> &'static DeviceTraits {
        DeviceTraits::from_device_kind(self)
    }
}

impl Display for DeviceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceKind::Uhfqa => "UHFQA",
            DeviceKind::Hdawg => "HDAWG",
        };
        f.write_str(name)
    }
}

/// Logical channel of a qubit.
///
/// The declaration order is the order in which ports are routed to the AWG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Channel {
    #[serde(rename = "dc")]
    Dc,
    #[serde(rename = "xy_I")]
    XyI,
    #[serde(rename = "xy_Q")]
    XyQ,
    #[serde(rename = "z")]
    Z,
}

impl Channel {
    pub const ROUTING_ORDER: [Channel; 4] = [Channel::Dc, Channel::XyI, Channel::XyQ, Channel::Z];

    pub fn name(&self) -> &'static str {
        match self {
            Channel::Dc => "dc",
            Channel::XyI => "xy_I",
            Channel::XyQ => "xy_Q",
            Channel::Z => "z",
        }
    }
}

impl Display for Channel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A front panel port of a device, addressed by the device alias used in the
/// qubit configuration (e.g. `hd_1`) and the 1-based port number.
///
/// Deserializes from `["hd_1", 5]` as stored in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelPortRef {
    pub device: String,
    pub port: u16,
}

impl ChannelPortRef {
    pub fn new(device: impl Into<String>, port: u16) -> Self {
        ChannelPortRef {
            device: device.into(),
            port,
        }
    }
}

impl Display for ChannelPortRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.device, self.port)
    }
}

/// One I/Q output pair of a waveform generator, identified by the device and
/// the index of the AWG core driving it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AwgPairKey {
    pub device: DeviceId,
    pub awg_index: u16,
}

impl AwgPairKey {
    /// Zero-based signal output indices of the I and Q channel.
    ///
    /// `None` when the AWG index lies outside the node address range.
    pub fn sigouts(&self) -> Option<(u16, u16)> {
        let first = self
            .awg_index
            .checked_mul(DeviceKind::Hdawg.traits().channels_per_awg)?;
        Some((first, first.checked_add(1)?))
    }
}

impl Display for AwgPairKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "({}, awg {})", self.device, self.awg_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_kind_metadata_key() {
        assert_eq!(DeviceKind::from_metadata_key("ziHD_id"), Some(DeviceKind::Hdawg));
        assert_eq!(DeviceKind::from_metadata_key("ziQA_id"), Some(DeviceKind::Uhfqa));
        assert_eq!(DeviceKind::from_metadata_key("anritsu"), None);
    }

    #[test]
    fn test_port_ref_from_registry_tuple() {
        let port: ChannelPortRef = serde_json::from_str(r#"["hd_1", 5]"#).unwrap();
        assert_eq!(port, ChannelPortRef::new("hd_1", 5));
    }

    #[test]
    fn test_channel_names() {
        let channel: Channel = serde_json::from_str(r#""xy_Q""#).unwrap();
        assert_eq!(channel, Channel::XyQ);
        assert_eq!(channel.to_string(), "xy_Q");
        assert!(serde_json::from_str::<Channel>(r#""xy""#).is_err());
    }

    #[test]
    fn test_awg_pair_sigouts() {
        let key = AwgPairKey {
            device: DeviceId::new("dev8334"),
            awg_index: 2,
        };
        assert_eq!(key.sigouts(), Some((4, 5)));
        assert!(key.device.has_prefix_of(&DeviceKind::Hdawg));
    }

    #[test]
    fn test_awg_pair_sigouts_out_of_range() {
        let key = AwgPairKey {
            device: DeviceId::new("dev8334"),
            awg_index: u16::MAX,
        };
        assert_eq!(key.sigouts(), None);
        let key = AwgPairKey {
            device: DeviceId::new("dev8334"),
            awg_index: u16::MAX / 2,
        };
        assert_eq!(key.sigouts(), Some((u16::MAX - 1, u16::MAX)));
    }
}
