// src/pipeline.rs
use crate::angle::{vertex_angle_deg, AngleConvention};
use crate::error::{MocapError, Result};
use crate::trc::FrameTable;
use anyhow::Context;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// A named joint: the angle is measured at `vertex` between the rays
/// toward `proximal` and `distal`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JointDefinition {
    pub proximal: String,
    pub vertex: String,
    pub distal: String,
    #[serde(default = "default_convention")]
    pub convention: AngleConvention,
}

fn default_convention() -> AngleConvention {
    AngleConvention::Inner
}

impl JointDefinition {
    pub fn new(proximal: &str, vertex: &str, distal: &str) -> JointDefinition {
        JointDefinition {
            proximal: proximal.to_string(),
            vertex: vertex.to_string(),
            distal: distal.to_string(),
            convention: AngleConvention::Inner,
        }
    }

    pub fn with_convention(mut self, convention: AngleConvention) -> JointDefinition {
        self.convention = convention;
        self
    }
}

/// The built-in joint set for the lab's standard right/left-side marker
/// protocol. The historical `wrist` entry used the same marker for both
/// endpoints and is deliberately absent until a correct triple is derived.
static BUILTIN_JOINTS: Lazy<BTreeMap<String, JointDefinition>> = Lazy::new(|| {
    let mut defs = BTreeMap::new();
    defs.insert(
        "shoulder".to_string(),
        JointDefinition::new("hip_r", "shoulder_r", "elbow_r"),
    );
    defs.insert(
        "elbow".to_string(),
        JointDefinition::new("shoulder_r", "elbow_r", "wrist_r"),
    );
    defs.insert(
        "hip".to_string(),
        JointDefinition::new("shoulder_r", "hip_r", "knee_r"),
    );
    defs.insert(
        "knee_r".to_string(),
        JointDefinition::new("hip_r", "knee_r", "ankle_r"),
    );
    defs.insert(
        "knee_l".to_string(),
        JointDefinition::new("hip_l", "knee_l", "ankle_l"),
    );
    defs.insert(
        "ankle".to_string(),
        JointDefinition::new("knee_r", "ankle_r", "foot_r_6"),
    );
    // Dorsiflexion is reported as the complement of the inner angle.
    defs.insert(
        "foot".to_string(),
        JointDefinition::new("ankle_r", "foot_r_6", "toes_r_6")
            .with_convention(AngleConvention::Complement),
    );
    defs
});

/// A set of joint definitions keyed by joint name. Fixed process-wide
/// configuration; never derived from capture data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JointSet {
    defs: BTreeMap<String, JointDefinition>,
}

impl JointSet {
    pub fn builtin() -> JointSet {
        JointSet {
            defs: BUILTIN_JOINTS.clone(),
        }
    }

    pub fn empty() -> JointSet {
        JointSet {
            defs: BTreeMap::new(),
        }
    }

    /// Load a joint set from a JSON file mapping joint names to
    /// definitions, e.g.
    /// `{"knee_r": {"proximal": "hip_r", "vertex": "knee_r", "distal": "ankle_r"}}`.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<JointSet> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading joint definitions from {}", path.display()))?;
        let defs: BTreeMap<String, JointDefinition> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing joint definitions in {}", path.display()))?;
        Ok(JointSet { defs })
    }

    pub fn insert(&mut self, name: impl Into<String>, def: JointDefinition) {
        self.defs.insert(name.into(), def);
    }

    pub fn get(&self, name: &str) -> Option<&JointDefinition> {
        self.defs.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.defs.keys().cloned().collect()
    }

    /// Reject any requested joint name that has no definition. Called
    /// before computation so a typo never produces a half-finished run.
    pub fn validate(&self, requested: &[String]) -> Result<()> {
        for name in requested {
            if !self.defs.contains_key(name) {
                return Err(MocapError::UnknownJoint {
                    joint: name.clone(),
                    available: self.defs.keys().cloned().collect::<Vec<_>>().join(", "),
                });
            }
        }
        Ok(())
    }

    /// Compute one angle series per requested joint and attach each to the
    /// table under the joint's name.
    ///
    /// All series are computed before any is attached, so a failure part
    /// way through (missing marker, degenerate frame) leaves the table
    /// exactly as it was.
    pub fn compute_angles(&self, table: &mut FrameTable, requested: &[String]) -> Result<()> {
        self.validate(requested)?;

        let mut computed: Vec<(String, Vec<f64>)> = Vec::with_capacity(requested.len());
        for name in requested {
            let def = &self.defs[name];
            let proximal = table.marker_positions(&def.proximal)?;
            let vertex = table.marker_positions(&def.vertex)?;
            let distal = table.marker_positions(&def.distal)?;

            let mut series = Vec::with_capacity(table.frame_count());
            for (frame, ((a, b), c)) in proximal.iter().zip(&vertex).zip(&distal).enumerate() {
                let degrees =
                    vertex_angle_deg(a, b, c).ok_or_else(|| MocapError::DegenerateGeometry {
                        path: table.path().to_path_buf(),
                        joint: name.clone(),
                        frame,
                    })?;
                series.push(def.convention.apply(degrees));
            }
            debug!(joint = %name, frames = series.len(), "computed angle series");
            computed.push((name.clone(), series));
        }

        for (name, series) in computed {
            table.attach_series(name, series);
        }
        Ok(())
    }
}
