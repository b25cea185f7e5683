// src/trc.rs
use crate::error::{MocapError, Result};
use crate::marker::MarkerMap;
use nalgebra::Vector3;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Number of free-form metadata lines before the two header rows.
const METADATA_LINES: usize = 3;

/// Leading columns that are not markers (frame counter and time).
pub const RESERVED_COLUMNS: usize = 2;

/// One fully-resolved column of the capture: the marker it belongs to and
/// its per-axis label (e.g. `X4`). Reserved columns carry an empty axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLabel {
    pub marker: String,
    pub axis: String,
}

/// Capture exports leave the marker name only on the first of each
/// marker's three coordinate columns; the rest are blank (or an
/// auto-generated `Unnamed*` placeholder when re-exported). Carry the last
/// seen name forward so every column has a concrete (marker, axis) pair.
///
/// Idempotent: reconstructing an already-filled header returns it unchanged.
pub fn reconstruct_header(
    path: &Path,
    marker_row: &[String],
    axis_row: &[String],
) -> Result<Vec<ColumnLabel>> {
    let mut header = Vec::with_capacity(marker_row.len());
    let mut carry: Option<&str> = None;

    for (idx, cell) in marker_row.iter().enumerate() {
        let name = if is_placeholder(cell) {
            carry.ok_or_else(|| MocapError::MalformedHeader {
                path: path.to_path_buf(),
                reason: format!("column {idx} has no marker name and nothing to forward-fill"),
            })?
        } else {
            carry = Some(cell.trim());
            cell.trim()
        };

        let axis = axis_row
            .get(idx)
            .map(|a| a.trim().to_string())
            .unwrap_or_default();

        header.push(ColumnLabel {
            marker: name.to_string(),
            axis,
        });
    }

    Ok(header)
}

fn is_placeholder(cell: &str) -> bool {
    let cell = cell.trim();
    cell.is_empty() || cell.starts_with("Unnamed")
}

/// One loaded capture file: column-major frame data, the marker-to-column
/// mapping resolved once at load time, and any angle series derived
/// afterwards.
#[derive(Debug)]
pub struct FrameTable {
    path: PathBuf,
    columns: Vec<Vec<f64>>,
    markers: MarkerMap,
    angles: BTreeMap<String, Vec<f64>>,
}

impl FrameTable {
    /// Load a `.trc` capture export: skip the metadata lines, reconstruct
    /// the two-row header, then read one frame per remaining row.
    pub fn load(path: impl AsRef<Path>) -> Result<FrameTable> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| MocapError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut lines = BufReader::new(file).lines().enumerate();

        let mut read_line = |expected: &str| -> Result<String> {
            match lines.next() {
                Some((_, Ok(line))) => Ok(line),
                Some((_, Err(source))) => Err(MocapError::Io {
                    path: path.to_path_buf(),
                    source,
                }),
                None => Err(MocapError::MalformedHeader {
                    path: path.to_path_buf(),
                    reason: format!("file ended before {expected}"),
                }),
            }
        };

        for _ in 0..METADATA_LINES {
            read_line("the metadata lines")?;
        }
        let marker_line = read_line("the marker-name header row")?;
        let axis_line = read_line("the axis-label header row")?;

        let mut marker_row = split_header_row(&marker_line);
        let axis_row = split_header_row(&axis_line);
        // The last marker's name sits only on its X column, so the marker
        // row legitimately ends in blank cells; restore them to the axis
        // row's width so forward-fill can resolve them.
        if marker_row.len() < axis_row.len() {
            marker_row.resize(axis_row.len(), String::new());
        }
        let header = reconstruct_header(path, &marker_row, &axis_row)?;
        let markers = MarkerMap::resolve(path, &header)?;

        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); header.len()];
        for (n, line) in lines {
            let line = line.map_err(|source| MocapError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let cells: Vec<&str> = line.trim_end().split('\t').collect();
            if cells.len() < header.len() {
                return Err(MocapError::BadRow {
                    path: path.to_path_buf(),
                    line: n + 1,
                    reason: format!(
                        "expected {} columns, found {}",
                        header.len(),
                        cells.len()
                    ),
                });
            }
            for (col, cell) in columns.iter_mut().zip(&cells) {
                let value: f64 = cell.trim().parse().map_err(|e| MocapError::BadRow {
                    path: path.to_path_buf(),
                    line: n + 1,
                    reason: format!("'{}': {e}", cell.trim()),
                })?;
                col.push(value);
            }
        }

        Ok(FrameTable {
            path: path.to_path_buf(),
            columns,
            markers,
            angles: BTreeMap::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn markers(&self) -> &MarkerMap {
        &self.markers
    }

    pub fn frame_count(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    /// Time column (the second reserved column).
    pub fn times(&self) -> &[f64] {
        &self.columns[1]
    }

    /// The marker's x/y/z sequences across all frames, in frame order.
    /// Always the same length as `frame_count`; no gap-filling.
    pub fn marker_coordinates(&self, marker: &str) -> Result<(&[f64], &[f64], &[f64])> {
        let axes = self
            .markers
            .get(marker)
            .ok_or_else(|| MocapError::UnknownMarker {
                path: self.path.clone(),
                marker: marker.to_string(),
            })?;
        Ok((
            &self.columns[axes.x.index],
            &self.columns[axes.y.index],
            &self.columns[axes.z.index],
        ))
    }

    /// The marker's per-frame 3D positions.
    pub fn marker_positions(&self, marker: &str) -> Result<Vec<Vector3<f64>>> {
        let (xs, ys, zs) = self.marker_coordinates(marker)?;
        Ok(xs
            .iter()
            .zip(ys)
            .zip(zs)
            .map(|((&x, &y), &z)| Vector3::new(x, y, z))
            .collect())
    }

    /// Attach a derived angle series. Series are write-once: a recompute
    /// under the same name replaces the old values wholesale.
    pub fn attach_series(&mut self, name: impl Into<String>, values: Vec<f64>) {
        debug_assert_eq!(values.len(), self.frame_count());
        self.angles.insert(name.into(), values);
    }

    pub fn series(&self, name: &str) -> Option<&[f64]> {
        self.angles.get(name).map(Vec::as_slice)
    }

    pub fn series_names(&self) -> impl Iterator<Item = &str> {
        self.angles.keys().map(String::as_str)
    }
}

/// Split a header row on tabs, trimming trailing empty cells left behind
/// by a trailing tab in the export.
fn split_header_row(line: &str) -> Vec<String> {
    let mut cells: Vec<String> = line
        .trim_end_matches(['\r', '\n'])
        .split('\t')
        .map(str::to_string)
        .collect();
    while cells.last().is_some_and(|c| c.trim().is_empty()) {
        cells.pop();
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn labels(row: &[&str]) -> Vec<String> {
        row.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn forward_fill_carries_marker_names() {
        let marker_row = labels(&["Frame#", "Time", "hip_r", "", "", "knee_r", "", ""]);
        let axis_row = labels(&["", "", "X1", "Y1", "Z1", "X2", "Y2", "Z2"]);
        let header = reconstruct_header(Path::new("t.trc"), &marker_row, &axis_row).unwrap();

        assert_eq!(header[3].marker, "hip_r");
        assert_eq!(header[3].axis, "Y1");
        assert_eq!(header[5].marker, "knee_r");
        assert_eq!(header[7].axis, "Z2");
    }

    #[test]
    fn unnamed_placeholders_count_as_blank() {
        let marker_row = labels(&["Frame#", "Time", "hip_r", "Unnamed: 3", "Unnamed: 4"]);
        let axis_row = labels(&["", "", "X1", "Y1", "Z1"]);
        let header = reconstruct_header(Path::new("t.trc"), &marker_row, &axis_row).unwrap();
        assert_eq!(header[4].marker, "hip_r");
    }

    #[test]
    fn reconstruction_is_idempotent() {
        let marker_row = labels(&["Frame#", "Time", "hip_r", "", ""]);
        let axis_row = labels(&["", "", "X1", "Y1", "Z1"]);
        let once = reconstruct_header(Path::new("t.trc"), &marker_row, &axis_row).unwrap();

        let filled: Vec<String> = once.iter().map(|c| c.marker.clone()).collect();
        let axes: Vec<String> = once.iter().map(|c| c.axis.clone()).collect();
        let twice = reconstruct_header(Path::new("t.trc"), &filled, &axes).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn leading_blank_with_nothing_to_fill_is_an_error() {
        let marker_row = labels(&["", "Time", "hip_r"]);
        let axis_row = labels(&["", "", "X1"]);
        let err = reconstruct_header(Path::new("t.trc"), &marker_row, &axis_row).unwrap_err();
        assert!(matches!(err, MocapError::MalformedHeader { .. }));
    }

    fn synthetic_trc() -> String {
        // 2 reserved columns + 2 markers, 3 frames.
        let mut s = String::new();
        s.push_str("PathFileType\t4\t(X/Y/Z)\tsynthetic.trc\n");
        s.push_str("DataRate\tCameraRate\tNumFrames\tNumMarkers\n");
        s.push_str("100.00\t100.00\t3\t2\n");
        s.push_str("Frame#\tTime\thip\t\t\tknee\t\t\n");
        s.push_str("\t\tX1\tY1\tZ1\tX2\tY2\tZ2\n");
        s.push_str("1\t0.00\t0.0\t0.0\t0.0\t0.0\t-1.0\t0.0\n");
        s.push_str("2\t0.01\t0.1\t0.0\t0.0\t0.1\t-1.0\t0.0\n");
        s.push_str("3\t0.02\t0.2\t0.0\t0.0\t0.2\t-1.0\t0.0\n");
        s
    }

    #[test]
    fn loads_synthetic_capture() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(synthetic_trc().as_bytes()).unwrap();

        let table = FrameTable::load(file.path()).unwrap();
        assert_eq!(table.frame_count(), 3);
        assert_eq!(table.times(), &[0.00, 0.01, 0.02]);

        let (xs, ys, zs) = table.marker_coordinates("knee").unwrap();
        assert_eq!(xs, &[0.0, 0.1, 0.2]);
        assert_eq!(ys, &[-1.0, -1.0, -1.0]);
        assert_eq!(zs, &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn marker_row_trailing_blanks_fill_to_axis_width() {
        // The final marker is named only on its X column, so the marker
        // row is two cells shorter than the axis row once the trailing
        // tabs are gone. Loading must still resolve every marker.
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(synthetic_trc().as_bytes()).unwrap();

        let table = FrameTable::load(file.path()).unwrap();
        assert_eq!(table.markers().names(), ["hip", "knee"]);

        let knee = table.markers().get("knee").unwrap();
        assert_eq!(knee.y.label, "Y2");
        assert_eq!(knee.z.index, 7);
    }

    #[test]
    fn reload_yields_identical_marker_mapping() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(synthetic_trc().as_bytes()).unwrap();

        let first = FrameTable::load(file.path()).unwrap();
        let second = FrameTable::load(file.path()).unwrap();
        assert_eq!(first.markers(), second.markers());
    }

    #[test]
    fn unknown_marker_is_a_distinct_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(synthetic_trc().as_bytes()).unwrap();

        let table = FrameTable::load(file.path()).unwrap();
        let err = table.marker_coordinates("elbow").unwrap_err();
        assert!(matches!(err, MocapError::UnknownMarker { marker, .. } if marker == "elbow"));
    }

    #[test]
    fn short_row_is_reported_with_line_number() {
        let mut content = synthetic_trc();
        content.push_str("4\t0.03\t1.0\n");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();

        let err = FrameTable::load(file.path()).unwrap_err();
        assert!(matches!(err, MocapError::BadRow { line: 9, .. }));
    }
}
