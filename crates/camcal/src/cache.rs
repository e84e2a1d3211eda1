//! Correspondence cache: `[image_points, object_points, [width, height]]`
//! stored as one JSON array.

use camcal_core::{CorrespondenceError, CorrespondenceSet, ImageSize, PatternSpec, ViewCorrespondence};
use nalgebra::{Point2, Point3};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

type CacheRecord = (Vec<Vec<[f32; 2]>>, Vec<Vec<[f32; 3]>>, [u32; 2]);

#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("corner cache {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corner cache {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("corner cache holds {image} image-point views but {object} object-point views")]
    ViewCountMismatch { image: usize, object: usize },
    #[error("corner cache does not match the pattern: {0}")]
    Invalid(#[from] CorrespondenceError),
}

fn to_record(set: &CorrespondenceSet) -> CacheRecord {
    let image = set
        .views()
        .iter()
        .map(|v| v.image_points.iter().map(|p| [p.x, p.y]).collect())
        .collect();
    let object = set
        .views()
        .iter()
        .map(|v| v.object_points.iter().map(|p| [p.x, p.y, p.z]).collect())
        .collect();
    let size = set
        .image_size()
        .map(|s| [s.width, s.height])
        .unwrap_or([0, 0]);
    (image, object, size)
}

fn from_record(record: CacheRecord, pattern: PatternSpec) -> Result<CorrespondenceSet, CacheError> {
    let (image, object, [width, height]) = record;
    if image.len() != object.len() {
        return Err(CacheError::ViewCountMismatch {
            image: image.len(),
            object: object.len(),
        });
    }
    let views = image
        .into_iter()
        .zip(object)
        .map(|(img, obj)| ViewCorrespondence {
            object_points: obj.iter().map(|p| Point3::new(p[0], p[1], p[2])).collect(),
            image_points: img.iter().map(|p| Point2::new(p[0], p[1])).collect(),
        })
        .collect();
    let size = ImageSize::new(width, height);
    let size = (!size.is_empty()).then_some(size);
    Ok(CorrespondenceSet::from_parts(pattern, views, size)?)
}

/// Write `set` to `path`, replacing any existing file.
pub fn save_correspondences(path: &Path, set: &CorrespondenceSet) -> Result<(), CacheError> {
    let io_err = |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
    serde_json::to_writer(&mut writer, &to_record(set)).map_err(|source| CacheError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    writer.write_all(b"\n").map_err(io_err)?;
    writer.flush().map_err(io_err)?;
    log::info!("saved {} views to {}", set.len(), path.display());
    Ok(())
}

/// Restore a set written by [`save_correspondences`], validating every view
/// against `pattern`.
pub fn load_correspondences(path: &Path, pattern: PatternSpec) -> Result<CorrespondenceSet, CacheError> {
    let file = File::open(path).map_err(|source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let record: CacheRecord =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| CacheError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    let set = from_record(record, pattern)?;
    log::info!("loaded {} views from {}", set.len(), path.display());
    Ok(set)
}
