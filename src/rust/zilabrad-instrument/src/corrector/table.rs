// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::io::BufRead;

use anyhow::Context;

use crate::{Error, Result};
use zilabrad_common::types::{AwgPairKey, DeviceKind};
use zilabrad_log::{info, warn};

/// Columns of a calibration row: carrier frequency, I offset, Q offset.
const ROW_WIDTH: usize = 3;

/// Zero calibration of one AWG output pair.
///
/// Maps the carrier frequency of the microwave source to the sigout offsets of
/// the I and Q channel that null the carrier leakage.
#[derive(Debug, Clone)]
pub struct CalibrationTable {
    key: AwgPairKey,
    frequencies: Vec<f64>,
    offsets_i: Vec<f64>,
    offsets_q: Vec<f64>,
    loaded: bool,
}

impl CalibrationTable {
    pub fn new(key: AwgPairKey) -> Result<Self> {
        if !key.device.has_prefix_of(&DeviceKind::Hdawg) {
            return Err(Error::InvalidDeviceId(key.device, DeviceKind::Hdawg));
        }
        Ok(CalibrationTable {
            key,
            frequencies: vec![],
            offsets_i: vec![],
            offsets_q: vec![],
            loaded: false,
        })
    }

    pub fn key(&self) -> &AwgPairKey {
        &self.key
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    /// Load rows of `(frequency, offset I, offset Q)`, in any order.
    ///
    /// A table is loaded once; the data is never replaced afterwards.
    pub fn load<R: AsRef<[f64]>>(&mut self, rows: impl IntoIterator<Item = R>) -> Result<()> {
        if self.loaded {
            return Err(Error::TableAlreadyLoaded(self.key.clone()));
        }
        let mut samples = Vec::new();
        for (index, row) in rows.into_iter().enumerate() {
            let row = row.as_ref();
            if row.len() != ROW_WIDTH {
                return Err(Error::MalformedTable(format!(
                    "row {index} of table {} has {} columns, expected {ROW_WIDTH}",
                    self.key,
                    row.len()
                )));
            }
            if row.iter().any(|value| !value.is_finite()) {
                return Err(Error::MalformedTable(format!(
                    "row {index} of table {} contains a non-finite value",
                    self.key
                )));
            }
            samples.push((row[0], row[1], row[2]));
        }
        if samples.is_empty() {
            return Err(Error::MalformedTable(format!(
                "table {} has no rows",
                self.key
            )));
        }
        samples.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (frequencies, (offsets_i, offsets_q)): (Vec<f64>, (Vec<f64>, Vec<f64>)) = samples
            .into_iter()
            .map(|(frequency, offset_i, offset_q)| (frequency, (offset_i, offset_q)))
            .unzip();
        self.frequencies = frequencies;
        self.offsets_i = offsets_i;
        self.offsets_q = offsets_q;
        self.loaded = true;
        Ok(())
    }

    /// The I and Q offsets for the carrier frequency.
    ///
    /// `None` when no data is loaded or the frequency is NaN: the correction is skipped.
    /// Frequencies outside the calibrated range take the offsets of the nearest end.
    pub fn get_offset(&self, frequency: f64) -> Option<(f64, f64)> {
        if !self.loaded {
            info!("Skip zero correction, no loaded data for {}", self.key);
            return None;
        }
        if frequency.is_nan() {
            warn!("Skip zero correction of {}, carrier frequency is NaN", self.key);
            return None;
        }
        Some((
            interpolate(frequency, &self.frequencies, &self.offsets_i),
            interpolate(frequency, &self.frequencies, &self.offsets_q),
        ))
    }
}

/// Piecewise linear interpolation over ascending `knots`, constant beyond either end.
fn interpolate(x: f64, knots: &[f64], values: &[f64]) -> f64 {
    let last = knots.len() - 1;
    if x <= knots[0] {
        return values[0];
    }
    if x >= knots[last] {
        return values[last];
    }
    let upper = knots.partition_point(|&knot| knot <= x);
    let lower = upper - 1;
    let t = (x - knots[lower]) / (knots[upper] - knots[lower]);
    values[lower] + t * (values[upper] - values[lower])
}

/// Parse the comma separated calibration files written by the zero calibration.
///
/// Blank lines and lines starting with `#` are skipped. The column count is checked on load.
pub fn parse_calibration_csv<R: BufRead>(reader: R) -> Result<Vec<Vec<f64>>> {
    let mut rows = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read calibration data")?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let row = line
            .split(',')
            .map(|field| field.trim().parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::MalformedTable(format!("line {}: {e}", line_no + 1)))?;
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use zilabrad_common::types::DeviceId;

    fn key() -> AwgPairKey {
        AwgPairKey {
            device: DeviceId::new("dev8334"),
            awg_index: 2,
        }
    }

    fn loaded_table(rows: &[[f64; 3]]) -> CalibrationTable {
        let mut table = CalibrationTable::new(key()).unwrap();
        table.load(rows).unwrap();
        table
    }

    fn assert_offset_near(actual: Option<(f64, f64)>, expected: (f64, f64)) {
        let (i, q) = actual.unwrap();
        assert!((i - expected.0).abs() < 1e-12, "{i} != {}", expected.0);
        assert!((q - expected.1).abs() < 1e-12, "{q} != {}", expected.1);
    }

    #[test]
    fn test_interpolates_between_samples() {
        let table = loaded_table(&[[5.0, 0.01, -0.02], [5.2, 0.03, -0.04]]);
        assert_offset_near(table.get_offset(5.1), (0.02, -0.03));
        assert_offset_near(table.get_offset(5.15), (0.025, -0.035));
    }

    #[test]
    fn test_unsorted_rows() {
        let table = loaded_table(&[[5.2, 0.03, -0.04], [4.8, 0.0, 0.0], [5.0, 0.01, -0.02]]);
        assert_eq!(table.frequencies(), &[4.8, 5.0, 5.2]);
        assert_eq!(table.get_offset(5.0), Some((0.01, -0.02)));
        assert_offset_near(table.get_offset(4.9), (0.005, -0.01));
    }

    #[test]
    fn test_single_sample_is_constant() {
        let table = loaded_table(&[[5.0, 0.01, -0.02]]);
        assert_eq!(table.get_offset(4.0), Some((0.01, -0.02)));
        assert_eq!(table.get_offset(6.0), Some((0.01, -0.02)));
    }

    #[test]
    fn test_nan_frequency_or_no_data() {
        let table = CalibrationTable::new(key()).unwrap();
        assert!(!table.is_loaded());
        assert_eq!(table.get_offset(5.0), None);

        let table = loaded_table(&[[5.0, 0.01, -0.02]]);
        assert_eq!(table.get_offset(f64::NAN), None);
    }

    #[test]
    fn test_malformed_rows() {
        let mut table = CalibrationTable::new(key()).unwrap();
        let err = table.load([vec![5.0, 0.01]]).unwrap_err();
        assert!(matches!(err, Error::MalformedTable(_)));
        let err = table.load([vec![5.0, 0.01, 0.02, 0.03]]).unwrap_err();
        assert!(matches!(err, Error::MalformedTable(_)));
        let err = table.load(Vec::<Vec<f64>>::new()).unwrap_err();
        assert!(matches!(err, Error::MalformedTable(_)));
        let err = table.load([[f64::INFINITY, 0.0, 0.0]]).unwrap_err();
        assert!(matches!(err, Error::MalformedTable(_)));
        assert!(!table.is_loaded());
    }

    #[test]
    fn test_loaded_once() {
        let mut table = loaded_table(&[[5.0, 0.01, -0.02]]);
        let err = table.load([[5.0, 0.5, 0.5]]).unwrap_err();
        assert!(matches!(err, Error::TableAlreadyLoaded(_)));
        assert_eq!(table.get_offset(5.0), Some((0.01, -0.02)));
    }

    #[test]
    fn test_device_prefix() {
        let key = AwgPairKey {
            device: DeviceId::new("hd_1"),
            awg_index: 0,
        };
        assert!(matches!(
            CalibrationTable::new(key),
            Err(Error::InvalidDeviceId(_, DeviceKind::Hdawg))
        ));
    }

    #[test]
    fn test_parse_calibration_csv() {
        let data = "# fc, I, Q\n5.0, 0.01, -0.02\n\n5.2,0.03,-0.04\n";
        let rows = parse_calibration_csv(data.as_bytes()).unwrap();
        assert_eq!(rows, vec![vec![5.0, 0.01, -0.02], vec![5.2, 0.03, -0.04]]);

        let err = parse_calibration_csv("5.0, 0.01, x\n".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::MalformedTable(ref msg) if msg.starts_with("line 1")));

        let rows = parse_calibration_csv("5.0, 0.01\n".as_bytes()).unwrap();
        let mut table = CalibrationTable::new(key()).unwrap();
        assert!(matches!(table.load(rows), Err(Error::MalformedTable(_))));
    }

    fn samples() -> impl Strategy<Value = Vec<[f64; 3]>> {
        prop::collection::btree_map(0u32..4000, (-0.1f64..0.1, -0.1f64..0.1), 1..24).prop_map(
            |map| {
                map.into_iter()
                    .rev()
                    .map(|(step, (i, q))| [4.0 + f64::from(step) * 1e-3, i, q])
                    .collect::<Vec<_>>()
            },
        )
    }

    proptest! {
        #[test]
        fn prop_exact_at_knots(rows in samples()) {
            let table = loaded_table(&rows);
            for [frequency, i, q] in &rows {
                prop_assert_eq!(table.get_offset(*frequency), Some((*i, *q)));
            }
        }

        #[test]
        fn prop_clamped_outside_range(rows in samples(), beyond in 1e-6f64..10.0) {
            let table = loaded_table(&rows);
            let first = rows.last().unwrap();
            let last = rows.first().unwrap();
            prop_assert_eq!(table.get_offset(first[0] - beyond), Some((first[1], first[2])));
            prop_assert_eq!(table.get_offset(last[0] + beyond), Some((last[1], last[2])));
        }

        #[test]
        fn prop_between_neighbouring_samples(rows in samples(), t in 0.0f64..1.0) {
            let table = loaded_table(&rows);
            for pair in rows.windows(2) {
                let (upper, lower) = (pair[0], pair[1]);
                let frequency = lower[0] + t * (upper[0] - lower[0]);
                let (i, q) = table.get_offset(frequency).unwrap();
                prop_assert!(i >= lower[1].min(upper[1]) - 1e-12 && i <= lower[1].max(upper[1]) + 1e-12);
                prop_assert!(q >= lower[2].min(upper[2]) - 1e-12 && q <= lower[2].max(upper[2]) + 1e-12);
            }
        }
    }
}
