// src/export.rs
use crate::error::Result as MocapResult;
use crate::sto::KinematicSeries;
use crate::trc::FrameTable;
use anyhow::Result;
use chrono::Local;
use csv::Writer;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};

/// One sample of a selected metric in the combined comparison export.
#[derive(Debug, Serialize)]
struct MetricRecord {
    file: String,
    time: f64,
    metric: String,
    value: f64,
}

/// Per-file statistics collected for the session report.
#[derive(Debug, Clone)]
pub struct FileSummary {
    pub file: String,
    pub frames: usize,
    pub joints: Vec<JointStats>,
}

#[derive(Debug, Clone)]
pub struct JointStats {
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl FileSummary {
    pub fn from_table(table: &FrameTable) -> FileSummary {
        let joints = table
            .series_names()
            .filter_map(|name| {
                let series = table.series(name)?;
                if series.is_empty() {
                    return None;
                }
                let min = series.iter().cloned().fold(f64::INFINITY, f64::min);
                let max = series.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let mean = series.iter().sum::<f64>() / series.len() as f64;
                Some(JointStats {
                    name: name.to_string(),
                    min,
                    max,
                    mean,
                })
            })
            .collect();

        FileSummary {
            file: display_name(table.path()),
            frames: table.frame_count(),
            joints,
        }
    }
}

/// Writes session output: one angle CSV per capture, an optional combined
/// metric CSV, and an HTML summary, all under a timestamped session
/// directory.
pub struct SessionExporter {
    output_dir: PathBuf,
    session_name: String,
}

impl SessionExporter {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        let session_name = session_name
            .unwrap_or_else(|| format!("session_{}", Local::now().format("%Y%m%d_%H%M%S")));

        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            session_name,
        }
    }

    pub fn session_dir(&self) -> PathBuf {
        self.output_dir.join(&self.session_name)
    }

    /// Write the table's time column and every attached angle series to
    /// `<stem>_angles.csv` inside the session directory.
    pub fn export_angles(&self, table: &FrameTable) -> Result<PathBuf> {
        let stem = table
            .path()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "capture".to_string());
        let csv_path = self.session_dir().join(format!("{stem}_angles.csv"));

        if let Some(parent) = csv_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let names: Vec<&str> = table.series_names().collect();
        let file = File::create(&csv_path)?;
        let mut writer = Writer::from_writer(file);

        let mut header = vec!["time".to_string()];
        header.extend(names.iter().map(|n| format!("{n}_angle")));
        writer.write_record(&header)?;

        let series: Vec<&[f64]> = names
            .iter()
            .filter_map(|name| table.series(name))
            .collect();
        for (frame, time) in table.times().iter().enumerate() {
            let mut record = vec![time.to_string()];
            record.extend(series.iter().map(|s| s[frame].to_string()));
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(csv_path)
    }

    /// Combine the selected metrics from every series file into one
    /// long-format CSV (file, time, metric, value). Each requested metric
    /// must exist in each file.
    pub fn export_metrics(
        &self,
        all_series: &[KinematicSeries],
        metrics: &[String],
    ) -> Result<PathBuf> {
        let csv_path = self.session_dir().join("metrics.csv");
        if let Some(parent) = csv_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(&csv_path)?;
        let mut writer = Writer::from_writer(file);

        for series in all_series {
            let columns: Vec<(&String, &[f64])> = metrics
                .iter()
                .map(|m| series.metric(m).map(|v| (m, v)))
                .collect::<MocapResult<_>>()?;

            let name = display_name(series.path());
            for (i, time) in series.time().iter().enumerate() {
                for (metric, values) in &columns {
                    writer.serialize(MetricRecord {
                        file: name.clone(),
                        time: *time,
                        metric: (*metric).clone(),
                        value: values[i],
                    })?;
                }
            }
        }

        writer.flush()?;
        Ok(csv_path)
    }

    pub fn write_report(&self, summaries: &[FileSummary], failures: &[String]) -> Result<PathBuf> {
        let report_path = self.session_dir().join("report.html");
        if let Some(parent) = report_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&report_path, self.create_html_report(summaries, failures))?;
        Ok(report_path)
    }

    fn create_html_report(&self, summaries: &[FileSummary], failures: &[String]) -> String {
        let mut body = String::new();
        for summary in summaries {
            body.push_str(&format!(
                "        <h3>{} ({} frames)</h3>\n        <table>\n            <tr><th>Joint</th><th>Min (deg)</th><th>Max (deg)</th><th>Mean (deg)</th></tr>\n",
                summary.file, summary.frames
            ));
            for joint in &summary.joints {
                body.push_str(&format!(
                    "            <tr><td>{}</td><td>{:.1}</td><td>{:.1}</td><td>{:.1}</td></tr>\n",
                    joint.name, joint.min, joint.max, joint.mean
                ));
            }
            body.push_str("        </table>\n");
        }

        let mut failure_block = String::new();
        if !failures.is_empty() {
            failure_block.push_str("        <h3>Failed files</h3>\n        <ul>\n");
            for failure in failures {
                failure_block.push_str(&format!("            <li>{failure}</li>\n"));
            }
            failure_block.push_str("        </ul>\n");
        }

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <title>Joint Angle Report - {}</title>
    <style>
        body {{ font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; margin: 40px; background: #f5f5f5; }}
        h1 {{ color: #333; }}
        .stats {{ background: white; padding: 20px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }}
        table {{ border-collapse: collapse; margin: 10px 0; }}
        th, td {{ border: 1px solid #ccc; padding: 6px 12px; text-align: right; }}
        th {{ background: #eee; color: #666; }}
        td:first-child, th:first-child {{ text-align: left; }}
    </style>
</head>
<body>
    <h1>Joint Angle Session Report</h1>
    <div class="stats">
        <h2>Session: {}</h2>
        <p>{} file(s) processed, {} failed.</p>
{}{}    </div>
</body>
</html>
"#,
            self.session_name,
            self.session_name,
            summaries.len(),
            failures.len(),
            body,
            failure_block,
        )
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{JointDefinition, JointSet};
    use std::io::Write;

    fn table_with_knee_series() -> FrameTable {
        let content = "PathFileType\t4\t(X/Y/Z)\tsquat.trc\n\
                       DataRate\tCameraRate\tNumFrames\tNumMarkers\n\
                       100.00\t100.00\t2\t3\n\
                       Frame#\tTime\thip\t\t\tknee\t\t\tankle\t\t\n\
                       \t\tX1\tY1\tZ1\tX2\tY2\tZ2\tX3\tY3\tZ3\n\
                       1\t0.00\t0.0\t0.0\t0.0\t0.0\t-1.0\t0.0\t1.0\t-1.0\t0.0\n\
                       2\t0.01\t0.0\t0.0\t0.0\t0.0\t-1.0\t0.0\t1.0\t-2.0\t0.0\n";
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let mut table = FrameTable::load(file.path()).unwrap();

        let mut set = JointSet::empty();
        set.insert("knee", JointDefinition::new("hip", "knee", "ankle"));
        set.compute_angles(&mut table, &["knee".to_string()]).unwrap();
        table
    }

    #[test]
    fn angle_csv_has_time_and_joint_columns() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = SessionExporter::new(dir.path(), Some("test_session".to_string()));

        let table = table_with_knee_series();
        let path = exporter.export_angles(&table).unwrap();
        assert!(path.to_string_lossy().contains("test_session"));
        assert!(path.to_string_lossy().ends_with("_angles.csv"));

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap(), "time,knee_angle");
        assert!(lines.next().unwrap().starts_with("0,90"));
    }

    #[test]
    fn report_lists_files_and_failures() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = SessionExporter::new(dir.path(), Some("test_session".to_string()));

        let table = table_with_knee_series();
        let summary = FileSummary::from_table(&table);
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.joints.len(), 1);
        assert!((summary.joints[0].min - 90.0).abs() < 1e-9);
        assert!((summary.joints[0].max - 135.0).abs() < 1e-9);

        let path = exporter
            .write_report(&[summary], &["broken.trc: malformed header".to_string()])
            .unwrap();
        let html = std::fs::read_to_string(path).unwrap();
        assert!(html.contains("1 file(s) processed, 1 failed."));
        assert!(html.contains("broken.trc"));
        assert!(html.contains("knee"));
    }

    #[test]
    fn metric_export_is_long_format() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = SessionExporter::new(dir.path(), Some("test_session".to_string()));

        let sto = "Kinematics\nendheader\ntime\tknee_angle_r\n0.0\t10.0\n0.1\t20.0\n";
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sto.as_bytes()).unwrap();
        let series = KinematicSeries::load(file.path()).unwrap();

        let path = exporter
            .export_metrics(&[series], &["knee_angle_r".to_string()])
            .unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap(), "file,time,metric,value");
        assert!(lines.next().unwrap().ends_with(",0.0,knee_angle_r,10.0"));
    }

    #[test]
    fn missing_metric_aborts_the_export() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = SessionExporter::new(dir.path(), Some("test_session".to_string()));

        let sto = "Kinematics\nendheader\ntime\tknee_angle_r\n0.0\t10.0\n";
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sto.as_bytes()).unwrap();
        let series = KinematicSeries::load(file.path()).unwrap();

        let err = exporter
            .export_metrics(&[series], &["hip_flexion_r".to_string()])
            .unwrap_err();
        assert!(err.to_string().contains("hip_flexion_r"));
    }
}
