// src/marker.rs
use crate::error::{MocapError, Result};
use crate::trc::{ColumnLabel, RESERVED_COLUMNS};
use std::collections::HashMap;
use std::path::Path;

/// A single coordinate column: its axis label in the export (e.g. `X4`)
/// and its physical column index in the frame rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnHandle {
    pub label: String,
    pub index: usize,
}

/// The three coordinate columns owned by one marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisColumns {
    pub x: ColumnHandle,
    pub y: ColumnHandle,
    pub z: ColumnHandle,
}

/// Mapping from marker name to its coordinate columns, resolved once per
/// loaded table and reused for every lookup.
///
/// Markers are ranked by first appearance in the reconstructed header,
/// skipping the two reserved columns; the marker at ordinal `n` owns the
/// axis labels `X{n}`, `Y{n}`, `Z{n}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerMap {
    order: Vec<String>,
    columns: HashMap<String, AxisColumns>,
}

impl MarkerMap {
    /// Build the mapping from a reconstructed header, validating the
    /// expected capture layout (2 reserved columns, then 3 columns per
    /// marker whose axis labels match the marker's ordinal). Capture
    /// software variants with extra leading columns would silently shift
    /// every coordinate, so a mismatch is rejected here instead.
    pub fn resolve(path: &Path, header: &[ColumnLabel]) -> Result<MarkerMap> {
        let mut order: Vec<String> = Vec::new();
        for label in header {
            if order.last() != Some(&label.marker) && !order.contains(&label.marker) {
                order.push(label.marker.clone());
            }
        }
        if order.len() < RESERVED_COLUMNS {
            return Err(MocapError::MalformedHeader {
                path: path.to_path_buf(),
                reason: format!(
                    "expected at least {RESERVED_COLUMNS} reserved columns, found {}",
                    order.len()
                ),
            });
        }
        let markers: Vec<String> = order.split_off(RESERVED_COLUMNS);

        let expected_columns = RESERVED_COLUMNS + 3 * markers.len();
        if header.len() != expected_columns {
            return Err(MocapError::MalformedHeader {
                path: path.to_path_buf(),
                reason: format!(
                    "{} markers require {expected_columns} columns, found {}",
                    markers.len(),
                    header.len()
                ),
            });
        }

        let mut columns = HashMap::with_capacity(markers.len());
        for (rank, name) in markers.iter().enumerate() {
            let ordinal = rank + 1;
            let base = RESERVED_COLUMNS + 3 * rank;
            let mut handles = Vec::with_capacity(3);

            for (offset, axis) in ["X", "Y", "Z"].iter().enumerate() {
                let index = base + offset;
                let label = format!("{axis}{ordinal}");
                let column = &header[index];
                if column.marker != *name {
                    return Err(MocapError::MalformedHeader {
                        path: path.to_path_buf(),
                        reason: format!(
                            "column {index} belongs to '{}' but ordinal {ordinal} expects '{name}'",
                            column.marker
                        ),
                    });
                }
                if !column.axis.is_empty() && column.axis != label {
                    return Err(MocapError::MalformedHeader {
                        path: path.to_path_buf(),
                        reason: format!(
                            "marker '{name}' has axis label '{}' where '{label}' was expected",
                            column.axis
                        ),
                    });
                }
                handles.push(ColumnHandle { label, index });
            }

            let z = handles.pop().unwrap();
            let y = handles.pop().unwrap();
            let x = handles.pop().unwrap();
            columns.insert(name.clone(), AxisColumns { x, y, z });
        }

        Ok(MarkerMap {
            order: markers,
            columns,
        })
    }

    pub fn get(&self, marker: &str) -> Option<&AxisColumns> {
        self.columns.get(marker)
    }

    pub fn contains(&self, marker: &str) -> bool {
        self.columns.contains_key(marker)
    }

    /// Marker names in ordinal order.
    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
