// src/angle.rs
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Vectors shorter than this are treated as zero-length.
const DEGENERATE_EPS: f64 = 1e-12;

/// How a joint's raw vertex angle maps onto the reported measurement.
/// Flexion-framed joints report the inner angle directly; extension-framed
/// ones (ankle dorsiflexion style) report its complement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngleConvention {
    Inner,
    Complement,
}

impl AngleConvention {
    pub fn apply(self, degrees: f64) -> f64 {
        match self {
            AngleConvention::Inner => degrees,
            AngleConvention::Complement => 180.0 - degrees,
        }
    }
}

/// Angle at vertex `b` between the vectors b→a and b→c, in degrees
/// within [0, 180].
///
/// cosθ = (u·v) / (‖u‖‖v‖), clamped to [−1, 1] before the inverse cosine
/// to guard against floating-point drift. Depends only on direction, so
/// the result is invariant under uniform scaling of all three points.
///
/// Returns `None` when either vector is zero-length (coincident markers);
/// callers must surface that as a degenerate-geometry error rather than
/// letting NaN through.
pub fn vertex_angle_deg(
    a: &Vector3<f64>,
    b: &Vector3<f64>,
    c: &Vector3<f64>,
) -> Option<f64> {
    let u = a - b;
    let v = c - b;

    let norms = u.norm() * v.norm();
    if norms < DEGENERATE_EPS {
        return None;
    }

    let cos_angle = (u.dot(&v) / norms).clamp(-1.0, 1.0);
    Some(cos_angle.acos().to_degrees())
}
