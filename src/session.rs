// src/session.rs
use crate::export::{FileSummary, SessionExporter};
use crate::pipeline::JointSet;
use crate::sto::KinematicSeries;
use crate::trc::FrameTable;
use anyhow::Result;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub output_dir: PathBuf,
    pub session_name: Option<String>,
    pub write_report: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            output_dir: directories::UserDirs::new()
                .and_then(|dirs| dirs.document_dir().map(|p| p.join("MocapAngles")))
                .unwrap_or_else(|| PathBuf::from("./output")),
            session_name: None,
            write_report: true,
        }
    }
}

/// What happened to each input file of a run.
#[derive(Debug, Default)]
pub struct SessionOutcome {
    pub exported: Vec<PathBuf>,
    pub failures: Vec<String>,
}

impl SessionOutcome {
    pub fn all_failed(&self) -> bool {
        self.exported.is_empty() && !self.failures.is_empty()
    }
}

/// Application state for one batch run, constructed once at startup:
/// the joint configuration, output settings, and the exporter. Files are
/// processed independently; one malformed capture never aborts its
/// siblings.
pub struct AnalysisSession {
    settings: SessionSettings,
    joints: JointSet,
    exporter: SessionExporter,
}

impl AnalysisSession {
    pub fn new(settings: SessionSettings, joints: JointSet) -> Self {
        let exporter =
            SessionExporter::new(&settings.output_dir, settings.session_name.clone());
        Self {
            settings,
            joints,
            exporter,
        }
    }

    pub fn session_dir(&self) -> PathBuf {
        self.exporter.session_dir()
    }

    /// Compute the requested joint angles for every capture file and write
    /// one CSV per file, plus the session report. A bad file is logged,
    /// recorded in the outcome, and skipped; an unknown joint name is a
    /// configuration error and fails the whole run up front.
    pub fn run_angles(&self, inputs: &[PathBuf], requested: &[String]) -> Result<SessionOutcome> {
        self.joints.validate(requested)?;

        let mut outcome = SessionOutcome::default();
        let mut summaries = Vec::new();

        for path in inputs {
            match self.process_capture(path, requested) {
                Ok((csv_path, summary)) => {
                    info!(file = %path.display(), output = %csv_path.display(), "exported angle series");
                    outcome.exported.push(csv_path);
                    summaries.push(summary);
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping capture");
                    outcome.failures.push(format!("{}: {e:#}", path.display()));
                }
            }
        }

        if self.settings.write_report {
            let report = self.exporter.write_report(&summaries, &outcome.failures)?;
            info!(report = %report.display(), "wrote session report");
        }
        Ok(outcome)
    }

    fn process_capture(
        &self,
        path: &Path,
        requested: &[String],
    ) -> Result<(PathBuf, FileSummary)> {
        let mut table = FrameTable::load(path)?;
        info!(
            file = %path.display(),
            frames = table.frame_count(),
            markers = table.markers().len(),
            "loaded capture"
        );

        self.joints.compute_angles(&mut table, requested)?;
        let csv_path = self.exporter.export_angles(&table)?;
        Ok((csv_path, FileSummary::from_table(&table)))
    }

    /// Export the selected pre-derived metrics from every series file into
    /// one combined CSV. Files that fail to load or are missing a metric
    /// are skipped with a warning.
    pub fn run_metrics(&self, inputs: &[PathBuf], metrics: &[String]) -> Result<SessionOutcome> {
        let mut outcome = SessionOutcome::default();
        let mut loaded = Vec::new();

        for path in inputs {
            match self.load_series(path, metrics) {
                Ok(series) => loaded.push(series),
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping series file");
                    outcome.failures.push(format!("{}: {e:#}", path.display()));
                }
            }
        }

        if !loaded.is_empty() {
            let csv_path = self.exporter.export_metrics(&loaded, metrics)?;
            info!(output = %csv_path.display(), files = loaded.len(), "exported metrics");
            outcome.exported.push(csv_path);
        }
        Ok(outcome)
    }

    fn load_series(&self, path: &Path, metrics: &[String]) -> Result<KinematicSeries> {
        let series = KinematicSeries::load(path)?;
        for metric in metrics {
            series.metric(metric)?;
        }
        Ok(series)
    }

    /// Union of metric names across the given series files, sorted.
    pub fn list_metrics(&self, inputs: &[PathBuf]) -> Result<Vec<String>> {
        let mut names = BTreeSet::new();
        for path in inputs {
            match KinematicSeries::load(path) {
                Ok(series) => {
                    names.extend(series.metrics().map(str::to_string));
                }
                Err(e) => warn!(file = %path.display(), error = %e, "skipping series file"),
            }
        }
        Ok(names.into_iter().collect())
    }
}

/// Expand directories into their contained files with the given extension;
/// plain file paths pass through. Sorted for deterministic processing
/// order.
pub fn discover_inputs(inputs: &[PathBuf], extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in std::fs::read_dir(input)? {
                let path = entry?.path();
                if path
                    .extension()
                    .is_some_and(|e| e.eq_ignore_ascii_case(extension))
                {
                    files.push(path);
                }
            }
        } else {
            files.push(input.clone());
        }
    }
    files.sort();
    Ok(files)
}
