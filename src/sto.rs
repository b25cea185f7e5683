// src/sto.rs
use crate::error::{MocapError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Marker line that terminates the free-form preamble of a kinematic
/// series export; the column header is the line that follows it.
const END_HEADER: &str = "endheader";

/// A pre-derived kinematic series file (`.sto`): a `time` column plus one
/// named metric column per joint or segment angle computed upstream.
#[derive(Debug)]
pub struct KinematicSeries {
    path: PathBuf,
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl KinematicSeries {
    pub fn load(path: impl AsRef<Path>) -> Result<KinematicSeries> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| MocapError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut lines = BufReader::new(file).lines().enumerate();

        // Skip the preamble up to and including the endheader marker.
        loop {
            match lines.next() {
                Some((_, Ok(line))) if line.contains(END_HEADER) => break,
                Some((_, Ok(_))) => continue,
                Some((_, Err(source))) => {
                    return Err(MocapError::Io {
                        path: path.to_path_buf(),
                        source,
                    })
                }
                None => {
                    return Err(MocapError::MalformedHeader {
                        path: path.to_path_buf(),
                        reason: format!("no '{END_HEADER}' line found"),
                    })
                }
            }
        }

        let names: Vec<String> = match lines.next() {
            Some((_, Ok(line))) => line
                .trim_end()
                .split('\t')
                .map(|c| c.trim().to_string())
                .collect(),
            Some((_, Err(source))) => {
                return Err(MocapError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
            None => {
                return Err(MocapError::MalformedHeader {
                    path: path.to_path_buf(),
                    reason: format!("file ended right after '{END_HEADER}'"),
                })
            }
        };
        if names.first().map(String::as_str) != Some("time") {
            return Err(MocapError::MalformedHeader {
                path: path.to_path_buf(),
                reason: format!(
                    "first column is '{}', expected 'time'",
                    names.first().cloned().unwrap_or_default()
                ),
            });
        }

        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
        for (n, line) in lines {
            let line = line.map_err(|source| MocapError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let cells: Vec<&str> = line.trim_end().split('\t').collect();
            if cells.len() < names.len() {
                return Err(MocapError::BadRow {
                    path: path.to_path_buf(),
                    line: n + 1,
                    reason: format!("expected {} columns, found {}", names.len(), cells.len()),
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

        Ok(KinematicSeries {
            path: path.to_path_buf(),
            names,
            columns,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sample_count(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn time(&self) -> &[f64] {
        &self.columns[0]
    }

    /// Metric names, excluding the leading `time` column.
    pub fn metrics(&self) -> impl Iterator<Item = &str> {
        self.names.iter().skip(1).map(String::as_str)
    }

    pub fn metric(&self, name: &str) -> Result<&[f64]> {
        self.names
            .iter()
            .position(|n| n == name)
            .filter(|&i| i > 0)
            .map(|i| self.columns[i].as_slice())
            .ok_or_else(|| MocapError::UnknownMetric {
                path: self.path.clone(),
                metric: name.to_string(),
            })
    }
}
