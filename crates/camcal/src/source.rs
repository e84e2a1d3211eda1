//! Frame acquisition: image directories, animated GIFs, and video files or
//! capture devices decoded by an `ffmpeg` child process.

use camcal_core::ImageSize;
use image::codecs::gif::GifDecoder;
use image::imageops::{self, FilterType};
use image::{AnimationDecoder, DynamicImage, GrayImage};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

/// Extensions (lowercase) accepted in an image directory.
pub const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("{0} is neither an image directory nor a readable video file or device")]
    InvalidInput(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("ffmpeg: {0}")]
    Ffmpeg(String),
}

/// One grayscale frame with its 0-based position in the source.
#[derive(Clone, Debug)]
pub struct Frame {
    pub index: usize,
    pub image: GrayImage,
}

impl Frame {
    pub fn size(&self) -> ImageSize {
        ImageSize::new(self.image.width(), self.image.height())
    }
}

/// Sequential producer of raw grayscale frames; `Ok(None)` ends the stream.
pub trait FrameReader {
    fn read_frame(&mut self) -> Result<Option<GrayImage>, SourceError>;
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_gif(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("gif"))
}

fn is_capture_device(path: &Path) -> bool {
    path.to_str().is_some_and(|s| s.starts_with("/dev/video"))
}

/// Sorted image files of `dir` with a supported extension.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let io_err = |source| SourceError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && has_image_extension(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Load an image file as 8-bit grayscale.
pub fn load_gray(path: &Path) -> Result<GrayImage, SourceError> {
    let reader = image::ImageReader::open(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = reader.with_guessed_format().map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let img = reader.decode().map_err(|source| SourceError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(img.to_luma8())
}

/// Adjust `img` to `target`, cropping symmetrically first when the aspect
/// ratios differ by more than 1%.
pub fn fit_to_size(img: &GrayImage, target: ImageSize) -> GrayImage {
    let (w, h) = img.dimensions();
    if (w, h) == (target.width, target.height) || target.is_empty() || w == 0 || h == 0 {
        return img.clone();
    }

    let src_aspect = w as f64 / h as f64;
    let dst_aspect = target.width as f64 / target.height as f64;
    let cropped = if ((src_aspect - dst_aspect) / dst_aspect).abs() > 0.01 {
        let (cw, ch) = if src_aspect > dst_aspect {
            (((h as f64 * dst_aspect).round() as u32).clamp(1, w), h)
        } else {
            (w, ((w as f64 / dst_aspect).round() as u32).clamp(1, h))
        };
        imageops::crop_imm(img, (w - cw) / 2, (h - ch) / 2, cw, ch).to_image()
    } else {
        img.clone()
    };

    if cropped.dimensions() == (target.width, target.height) {
        return cropped;
    }
    imageops::resize(&cropped, target.width, target.height, FilterType::Triangle)
}

enum SourceKind {
    List {
        paths: Vec<PathBuf>,
        next: usize,
    },
    Stream {
        reader: Box<dyn FrameReader>,
        framestep: usize,
        counter: usize,
        done: bool,
    },
}

/// Lazy, finite sequence of frames.
///
/// A list source yields every file in order. A stream source reads frames
/// sequentially and yields only those whose 0-based counter is a multiple of
/// `framestep`; the others are read and dropped.
pub struct FrameSource {
    kind: SourceKind,
    fit: Option<ImageSize>,
}

impl FrameSource {
    /// Dispatch on the input path: directory → image list, image file → list
    /// of one, `.gif` → in-process decoder, anything else → ffmpeg.
    pub fn open(input: &Path, framestep: usize) -> Result<Self, SourceError> {
        if input.is_dir() {
            return Self::from_directory(input);
        }
        if input.is_file() && has_image_extension(input) {
            return Ok(Self::from_paths(vec![input.to_path_buf()]));
        }
        if input.is_file() && is_gif(input) {
            return Ok(Self::from_reader(Box::new(GifReader::open(input)?), framestep));
        }
        if input.is_file() || (is_capture_device(input) && input.exists()) {
            return Ok(Self::from_reader(Box::new(FfmpegReader::open(input)?), framestep));
        }
        Err(SourceError::InvalidInput(input.to_path_buf()))
    }

    pub fn from_directory(dir: &Path) -> Result<Self, SourceError> {
        let paths = list_images(dir)?;
        log::info!("found {} images in {}", paths.len(), dir.display());
        Ok(Self::from_paths(paths))
    }

    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            kind: SourceKind::List { paths, next: 0 },
            fit: None,
        }
    }

    /// Stream source over `reader`; a `framestep` of 0 is treated as 1.
    pub fn from_reader(reader: Box<dyn FrameReader>, framestep: usize) -> Self {
        Self {
            kind: SourceKind::Stream {
                reader,
                framestep: framestep.max(1),
                counter: 0,
                done: false,
            },
            fit: None,
        }
    }

    pub fn with_fit(mut self, fit: Option<ImageSize>) -> Self {
        self.fit = fit;
        self
    }

    pub fn is_stream(&self) -> bool {
        matches!(self.kind, SourceKind::Stream { .. })
    }

    fn next_raw(&mut self) -> Option<Result<Frame, SourceError>> {
        match &mut self.kind {
            SourceKind::List { paths, next } => {
                let index = *next;
                let path = paths.get(index)?;
                *next += 1;
                Some(load_gray(path).map(|image| Frame { index, image }))
            }
            SourceKind::Stream {
                reader,
                framestep,
                counter,
                done,
            } => loop {
                if *done {
                    return None;
                }
                let image = match reader.read_frame() {
                    Ok(Some(img)) => img,
                    Ok(None) => {
                        *done = true;
                        return None;
                    }
                    Err(e) => {
                        *done = true;
                        return Some(Err(e));
                    }
                };
                let index = *counter;
                *counter += 1;
                if index % *framestep == 0 {
                    return Some(Ok(Frame { index, image }));
                }
            },
        }
    }
}

impl Iterator for FrameSource {
    type Item = Result<Frame, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        let fit = self.fit;
        self.next_raw().map(|res| {
            res.map(|frame| match fit {
                Some(size) => Frame {
                    image: fit_to_size(&frame.image, size),
                    index: frame.index,
                },
                None => frame,
            })
        })
    }
}

/// Frames of an animated GIF, converted to grayscale.
pub struct GifReader {
    path: PathBuf,
    frames: image::Frames<'static>,
}

impl GifReader {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let decoder = GifDecoder::new(BufReader::new(file)).map_err(|source| SourceError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            frames: decoder.into_frames(),
        })
    }
}

impl FrameReader for GifReader {
    fn read_frame(&mut self) -> Result<Option<GrayImage>, SourceError> {
        match self.frames.next() {
            None => Ok(None),
            Some(Ok(frame)) => Ok(Some(DynamicImage::ImageRgba8(frame.into_buffer()).to_luma8())),
            Some(Err(source)) => Err(SourceError::Decode {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// Raw grayscale frames piped from an `ffmpeg` child process.
///
/// Frame size comes from `ffprobe`; rotation metadata is ignored so that
/// frames keep that coded size. Paths under `/dev/video` are opened with the
/// `v4l2` input format. A non-zero ffmpeg exit at end of stream is
/// reported as an error carrying its stderr. The child is killed when the
/// reader is dropped.
pub struct FfmpegReader {
    child: Child,
    stdout: ChildStdout,
    stderr: Option<JoinHandle<String>>,
    size: ImageSize,
    finished: bool,
}

fn input_args(input: &Path) -> Vec<String> {
    let mut args = Vec::new();
    if is_capture_device(input) {
        args.extend(["-f".to_string(), "v4l2".to_string()]);
    }
    args.extend([
        "-noautorotate".to_string(),
        "-i".to_string(),
        input.display().to_string(),
    ]);
    args
}

/// `ffprobe` prints the first video stream's size as `WIDTHxHEIGHT`.
fn parse_size_line(text: &str) -> Option<ImageSize> {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty())?;
    let (w, h) = line.split_once('x')?;
    let size = ImageSize::new(w.trim().parse().ok()?, h.trim().parse().ok()?);
    (!size.is_empty()).then_some(size)
}

fn query_size(input: &Path) -> Result<ImageSize, SourceError> {
    let mut cmd = Command::new("ffprobe");
    cmd.args(["-v", "error"]);
    if is_capture_device(input) {
        cmd.args(["-f", "v4l2"]);
    }
    let output = cmd
        .args([
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=p=0:s=x",
        ])
        .arg(input)
        .output()
        .map_err(|e| SourceError::Ffmpeg(format!("failed to run ffprobe: {e}")))?;
    if !output.status.success() {
        return Err(SourceError::Ffmpeg(format!(
            "ffprobe failed on {}: {}",
            input.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    parse_size_line(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
        SourceError::Ffmpeg(format!("no video stream size reported for {}", input.display()))
    })
}

impl FfmpegReader {
    pub fn open(input: &Path) -> Result<Self, SourceError> {
        let size = query_size(input)?;
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-v", "error", "-nostdin"])
            .args(input_args(input))
            .args(["-f", "rawvideo", "-pix_fmt", "gray", "-"]);
        let reader = Self::spawn(cmd, size)?;
        log::info!(
            "streaming {} via ffmpeg at {}x{}",
            input.display(),
            size.width,
            size.height
        );
        Ok(reader)
    }

    /// Run `cmd` and read `size` gray frames from its stdout.
    fn spawn(mut cmd: Command, size: ImageSize) -> Result<Self, SourceError> {
        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SourceError::Ffmpeg(format!("failed to start ffmpeg: {e}")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SourceError::Ffmpeg("ffmpeg stdout not captured".into()))?;
        // stderr is drained concurrently; a full pipe would stall the decoder.
        let stderr = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut text = String::new();
                let _ = pipe.read_to_string(&mut text);
                text
            })
        });
        Ok(Self {
            child,
            stdout,
            stderr,
            size,
            finished: false,
        })
    }

    pub fn size(&self) -> ImageSize {
        self.size
    }

    /// Reap the child at end of stream; a failed exit is an error.
    fn finish(&mut self) -> Result<Option<GrayImage>, SourceError> {
        self.finished = true;
        let status = self
            .child
            .wait()
            .map_err(|e| SourceError::Ffmpeg(format!("waiting for ffmpeg: {e}")))?;
        let stderr = self
            .stderr
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        if status.success() {
            return Ok(None);
        }
        Err(SourceError::Ffmpeg(format!(
            "decoder exited with {status}: {}",
            stderr.trim()
        )))
    }
}

impl FrameReader for FfmpegReader {
    fn read_frame(&mut self) -> Result<Option<GrayImage>, SourceError> {
        if self.finished {
            return Ok(None);
        }
        let mut buf = vec![0u8; self.size.width as usize * self.size.height as usize];
        match self.stdout.read_exact(&mut buf) {
            Ok(()) => Ok(GrayImage::from_raw(self.size.width, self.size.height, buf)),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => self.finish(),
            Err(e) => Err(SourceError::Ffmpeg(format!("reading frame: {e}"))),
        }
    }
}

impl Drop for FfmpegReader {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
