//! Calibration report: pretty JSON, which any YAML 1.2 reader also accepts.

use camcal_core::DistortionKind;
use camcal_solver::CalibrationResult;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    #[error("failed to write report {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize report {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// On-disk report layout; field order is the key order in the file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub rms: f64,
    pub camera_matrix: [[f64; 3]; 3],
    pub dist_coefs: Vec<f64>,
    pub model: DistortionKind,
    pub image_size: [u32; 2],
    pub num_views: usize,
}

impl From<&CalibrationResult> for CalibrationReport {
    fn from(res: &CalibrationResult) -> Self {
        Self {
            rms: res.rms,
            camera_matrix: res.camera_matrix.to_rows(),
            dist_coefs: res.dist_coefs(),
            model: res.model(),
            image_size: [res.image_size.width, res.image_size.height],
            num_views: res.num_views(),
        }
    }
}

/// Write the report for `result` to `path`, overwriting it.
pub fn write_report(path: &Path, result: &CalibrationResult) -> Result<(), ReportError> {
    let io_err = |source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    };
    let report = CalibrationReport::from(result);
    let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
    serde_json::to_writer_pretty(&mut writer, &report).map_err(|source| ReportError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    writer.write_all(b"\n").map_err(io_err)?;
    writer.flush().map_err(io_err)?;
    log::info!("wrote calibration report to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use camcal_core::{BrownConrady5, CameraMatrix, Distortion, ImageSize, ViewPose};
    use nalgebra::Vector3;

    fn result() -> CalibrationResult {
        CalibrationResult {
            camera_matrix: CameraMatrix::new(800.0, 790.0, 320.0, 240.0),
            distortion: Distortion::Pinhole(BrownConrady5 {
                k1: -0.1,
                k2: 0.02,
                p1: 0.0,
                p2: 0.0,
                k3: 0.0,
            }),
            poses: vec![ViewPose::new(Vector3::zeros(), Vector3::new(0.0, 0.0, 10.0)); 4],
            rms: 0.21,
            iterations: 7,
            image_size: ImageSize::new(640, 480),
        }
    }

    #[test]
    fn required_keys_come_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calib.yaml");
        write_report(&path, &result()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let rms = text.find("\"rms\"").unwrap();
        let k = text.find("\"camera_matrix\"").unwrap();
        let d = text.find("\"dist_coefs\"").unwrap();
        let m = text.find("\"model\"").unwrap();
        assert!(rms < k && k < d && d < m);
        assert!(!text.contains("rvecs"));

        let parsed: CalibrationReport = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.camera_matrix[0], [800.0, 0.0, 320.0]);
        assert_eq!(parsed.camera_matrix[2], [0.0, 0.0, 1.0]);
        assert_eq!(parsed.dist_coefs, vec![-0.1, 0.02, 0.0, 0.0, 0.0]);
        assert_eq!(parsed.model, DistortionKind::Pinhole);
        assert_eq!(parsed.num_views, 4);
    }

    #[test]
    fn report_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calib.yaml");
        std::fs::write(&path, "x".repeat(10_000)).unwrap();
        write_report(&path, &result()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with('{'));
        assert!(!text.contains("xxxx"));
    }
}
