// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use crate::types::DeviceKind;

/// Commonly used device traits
pub struct DeviceTraits {
    /// Number of signal outputs driven by one AWG core
    pub channels_per_awg: u16,
    /// Number of signal outputs on the front panel
    pub output_count: u16,
    /// Prefix of the serial every device of this kind reports, e.g. `dev8334`
    pub device_id_prefix: &'static str,
}

impl DeviceTraits {
    pub fn from_device_kind(kind: &DeviceKind) -> &'static Self {
        match kind {
            DeviceKind::Hdawg => &HDAWG_TRAITS,
            DeviceKind::Uhfqa => &UHFQA_TRAITS,
        }
    }

    pub fn awg_count(&self) -> u16 {
        self.output_count / self.channels_per_awg
    }

    /// Front panel ports (1-based) of the output pair driven by AWG core `awg_index`.
    pub fn awg_ports(&self, awg_index: u16) -> Option<(u16, u16)> {
        if self.channels_per_awg != 2 || awg_index >= self.awg_count() {
            return None;
        }
        let first = awg_index * self.channels_per_awg + 1;
        Some((first, first + 1))
    }

    /// Index of the AWG core driving the I/Q port pair, if the ports form one of its output pairs.
    pub fn awg_index_of_ports(&self, port_i: u16, port_q: u16) -> Option<u16> {
        (0..self.awg_count()).find(|&awg| self.awg_ports(awg) == Some((port_i, port_q)))
    }
}

pub const HDAWG_TRAITS: DeviceTraits = DeviceTraits {
    channels_per_awg: 2,
    output_count: 8,
    device_id_prefix: "dev",
};

pub const UHFQA_TRAITS: DeviceTraits = DeviceTraits {
    channels_per_awg: 2,
    output_count: 2,
    device_id_prefix: "dev",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hdawg_output_pairs() {
        let traits = DeviceTraits::from_device_kind(&DeviceKind::Hdawg);
        let pairs: Vec<_> = (0..traits.awg_count())
            .filter_map(|awg| traits.awg_ports(awg))
            .collect();
        assert_eq!(pairs, vec![(1, 2), (3, 4), (5, 6), (7, 8)]);
        assert_eq!(traits.awg_ports(4), None);
    }

    #[test]
    fn test_awg_index_of_ports() {
        let traits = &HDAWG_TRAITS;
        assert_eq!(traits.awg_index_of_ports(1, 2), Some(0));
        assert_eq!(traits.awg_index_of_ports(5, 6), Some(2));
        assert_eq!(traits.awg_index_of_ports(7, 8), Some(3));
        assert_eq!(traits.awg_index_of_ports(2, 3), None);
        assert_eq!(traits.awg_index_of_ports(6, 5), None);
        assert_eq!(traits.awg_index_of_ports(9, 10), None);
    }
}
