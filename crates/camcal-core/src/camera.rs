//! Pinhole camera with Brown-Conrady or Kannala-Brandt (fisheye) distortion.
//!
//! Conventions follow the usual `x_cam = R * X + t` board-to-camera pose with
//! `R` given as a Rodrigues (scaled-axis) vector, and pixel coordinates
//! `u = fx * x_d + cx`, `v = fy * y_d + cy` (no skew).

use nalgebra::{Matrix3, Point2, Point3, Rotation3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Focal lengths and principal point in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraMatrix {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraMatrix {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    pub fn to_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0)
    }

    /// Row-major 3×3 layout, as written to reports.
    pub fn to_rows(&self) -> [[f64; 3]; 3] {
        [
            [self.fx, 0.0, self.cx],
            [0.0, self.fy, self.cy],
            [0.0, 0.0, 1.0],
        ]
    }

    #[inline]
    pub fn to_pixel(&self, n: Vector2<f64>) -> Point2<f64> {
        Point2::new(self.fx * n.x + self.cx, self.fy * n.y + self.cy)
    }

    pub fn is_finite(&self) -> bool {
        [self.fx, self.fy, self.cx, self.cy]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Radial-tangential distortion `k1, k2, p1, p2, k3`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BrownConrady5 {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl BrownConrady5 {
    pub fn from_slice(c: &[f64; 5]) -> Self {
        Self {
            k1: c[0],
            k2: c[1],
            p1: c[2],
            p2: c[3],
            k3: c[4],
        }
    }

    pub fn to_array(&self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    /// Distort a point on the normalized image plane.
    pub fn distort(&self, n: Vector2<f64>) -> Vector2<f64> {
        let (x, y) = (n.x, n.y);
        let r2 = x * x + y * y;
        let radial = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
        let xy = x * y;
        Vector2::new(
            x * radial + 2.0 * self.p1 * xy + self.p2 * (r2 + 2.0 * x * x),
            y * radial + self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * xy,
        )
    }
}

/// Equidistant fisheye model `theta_d = theta (1 + k1 θ² + k2 θ⁴ + k3 θ⁶ + k4 θ⁸)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KannalaBrandt4 {
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
    pub k4: f64,
}

impl KannalaBrandt4 {
    pub fn from_slice(c: &[f64; 4]) -> Self {
        Self {
            k1: c[0],
            k2: c[1],
            k3: c[2],
            k4: c[3],
        }
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.k1, self.k2, self.k3, self.k4]
    }

    /// Map a pinhole-normalized point `(x/z, y/z)` to its fisheye position.
    pub fn distort(&self, n: Vector2<f64>) -> Vector2<f64> {
        let r = n.norm();
        if r < 1e-12 {
            return n;
        }
        let theta = r.atan();
        let t2 = theta * theta;
        let theta_d = theta * (1.0 + t2 * (self.k1 + t2 * (self.k2 + t2 * (self.k3 + t2 * self.k4))));
        n * (theta_d / r)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistortionKind {
    Pinhole,
    Fisheye,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "lowercase")]
pub enum Distortion {
    Pinhole(BrownConrady5),
    Fisheye(KannalaBrandt4),
}

impl Distortion {
    pub fn kind(&self) -> DistortionKind {
        match self {
            Distortion::Pinhole(_) => DistortionKind::Pinhole,
            Distortion::Fisheye(_) => DistortionKind::Fisheye,
        }
    }

    /// Flat coefficient list: `[k1, k2, p1, p2, k3]` or `[k1, k2, k3, k4]`.
    pub fn coefficients(&self) -> Vec<f64> {
        match self {
            Distortion::Pinhole(d) => d.to_array().to_vec(),
            Distortion::Fisheye(d) => d.to_array().to_vec(),
        }
    }

    #[inline]
    pub fn distort(&self, n: Vector2<f64>) -> Vector2<f64> {
        match self {
            Distortion::Pinhole(d) => d.distort(n),
            Distortion::Fisheye(d) => d.distort(n),
        }
    }
}

/// Board-to-camera pose of one view.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewPose {
    /// Rodrigues rotation vector (axis * angle, radians).
    pub rvec: Vector3<f64>,
    pub tvec: Vector3<f64>,
}

impl ViewPose {
    pub fn new(rvec: Vector3<f64>, tvec: Vector3<f64>) -> Self {
        Self { rvec, tvec }
    }

    pub fn from_rotation(rot: &Rotation3<f64>, tvec: Vector3<f64>) -> Self {
        Self {
            rvec: rot.scaled_axis(),
            tvec,
        }
    }

    pub fn rotation(&self) -> Rotation3<f64> {
        Rotation3::new(self.rvec)
    }

    #[inline]
    pub fn transform_point(&self, p: &Point3<f64>) -> Point3<f64> {
        self.rotation() * p + self.tvec
    }
}

/// Project a board point into pixel coordinates.
pub fn project_point(
    k: &CameraMatrix,
    dist: &Distortion,
    pose: &ViewPose,
    p: &Point3<f64>,
) -> Point2<f64> {
    let pc = pose.transform_point(p);
    let n = Vector2::new(pc.x / pc.z, pc.y / pc.z);
    k.to_pixel(dist.distort(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn zero_distortion_is_plain_pinhole() {
        let k = CameraMatrix::new(800.0, 780.0, 320.0, 240.0);
        let pose = ViewPose::new(Vector3::zeros(), Vector3::new(0.0, 0.0, 2.0));
        let p = Point3::new(0.5, -0.25, 0.0);
        for dist in [
            Distortion::Pinhole(BrownConrady5::default()),
            Distortion::Fisheye(KannalaBrandt4::default()),
        ] {
            let uv = project_point(&k, &dist, &pose, &p);
            let expected_u = 800.0 * 0.25 + 320.0;
            let expected_v = 780.0 * -0.125 + 240.0;
            match dist.kind() {
                DistortionKind::Pinhole => {
                    assert_relative_eq!(uv.x, expected_u, epsilon = 1e-9);
                    assert_relative_eq!(uv.y, expected_v, epsilon = 1e-9);
                }
                // Equidistant projection bends rays towards the centre.
                DistortionKind::Fisheye => {
                    assert!(uv.x < expected_u && uv.x > 320.0);
                    assert!(uv.y > expected_v && uv.y < 240.0);
                }
            }
        }
    }

    #[test]
    fn barrel_distortion_pulls_points_inward() {
        let d = BrownConrady5 {
            k1: -0.2,
            ..Default::default()
        };
        let n = Vector2::new(0.3, 0.4);
        let nd = d.distort(n);
        assert!(nd.norm() < n.norm());
        assert_relative_eq!(nd.norm(), 0.5 * (1.0 - 0.2 * 0.25), epsilon = 1e-12);
    }

    #[test]
    fn pose_uses_rodrigues_vector() {
        let pose = ViewPose::new(
            Vector3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2),
            Vector3::zeros(),
        );
        let q = pose.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(q.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(q.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn coefficient_layout_matches_model() {
        let pin = Distortion::Pinhole(BrownConrady5::from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]));
        assert_eq!(pin.coefficients(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let fish = Distortion::Fisheye(KannalaBrandt4::from_slice(&[0.1, 0.2, 0.3, 0.4]));
        assert_eq!(fish.coefficients().len(), 4);
        assert_eq!(CameraMatrix::new(1.0, 2.0, 3.0, 4.0).to_rows()[1], [0.0, 2.0, 4.0]);
    }
}
