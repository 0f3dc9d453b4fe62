// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Frame sources for the pose demo.
//!
//! A [`SourceIterator`] turns any of the three inputs (a video file, a
//! directory tree of images, a scene-graph JSON file) into a sequence of
//! [`Frame`]s. Videos are subsampled down to the requested inference rate
//! before frames reach the caller.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use image::{DynamicImage, ImageReader};
#[cfg(feature = "video")]
use image::RgbImage;

use crate::error::{PoseError, Result};
use crate::geometry::BoundingBox;
use crate::scene_graph::{SceneGraph, image_path_for};
#[cfg(feature = "video")]
use crate::warn;

/// Input of a demo run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Video file, decoded sequentially.
    Video(PathBuf),
    /// Directory walked recursively; every file is treated as an image.
    ImageDirectory(PathBuf),
    /// Scene-graph JSON file annotating the `.jpg` next to it.
    SceneGraph(PathBuf),
}

impl Source {
    /// Path of the input.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Video(p) | Self::ImageDirectory(p) | Self::SceneGraph(p) => p,
        }
    }

    /// Check if this source is a video.
    #[must_use]
    pub const fn is_video(&self) -> bool {
        matches!(self, Self::Video(_))
    }

    /// Check if frames of this source come with their own person boxes.
    #[must_use]
    pub const fn supplies_boxes(&self) -> bool {
        matches!(self, Self::SceneGraph(_))
    }
}

/// Metadata about a source frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMeta {
    /// 1-based frame (video) or image counter.
    pub frame_idx: usize,
    /// Total frames, when known.
    pub total_frames: Option<usize>,
    /// File the frame was read from.
    pub path: PathBuf,
    /// Name used for the output file: the image file name or the scene-graph image id.
    pub label: String,
    /// Native frame rate (video sources only).
    pub fps: Option<f64>,
    /// When reading this frame began; skipped video frames are not included.
    pub started: Instant,
}

/// One decoded frame ready for the pipeline.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Decoded image.
    pub image: DynamicImage,
    /// Where the frame came from.
    pub meta: SourceMeta,
    /// Person boxes supplied with the frame; `None` means run the detector.
    pub boxes: Option<Vec<BoundingBox>>,
}

/// Keeps every `skip`-th frame of a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSampler {
    skip: usize,
}

impl FrameSampler {
    /// Build a sampler that brings `native_fps` down to `inference_fps`.
    ///
    /// The step is `native_fps / inference_fps` rounded half to even.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::FrameRateError`] if the video is slower than the
    /// requested rate and [`PoseError::ConfigError`] for a zero rate.
    pub fn new(native_fps: f64, inference_fps: u32) -> Result<Self> {
        if inference_fps == 0 {
            return Err(PoseError::ConfigError(
                "inferenceFps must be greater than 0".to_string(),
            ));
        }
        if native_fps < f64::from(inference_fps) {
            return Err(PoseError::FrameRateError {
                desired: inference_fps,
                actual: native_fps,
            });
        }

        let ratio = (native_fps / f64::from(inference_fps)).round_ties_even();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let skip = (ratio as usize).max(1);
        Ok(Self { skip })
    }

    /// Sampling step.
    #[must_use]
    pub const fn skip(&self) -> usize {
        self.skip
    }

    /// Whether the frame with 1-based counter `count` is processed.
    #[must_use]
    pub const fn should_process(&self, count: usize) -> bool {
        count % self.skip == 0
    }
}

/// Iterator over frames from a source.
pub struct SourceIterator {
    source: Source,
    /// Frames decoded or images visited so far.
    count: usize,
    image_paths: Vec<PathBuf>,
    scene_graph: Option<SceneGraph>,
    sampler: Option<FrameSampler>,
    #[cfg(feature = "video")]
    decoder: Option<video_rs::decode::Decoder>,
    #[cfg(feature = "video")]
    total_frames: Option<usize>,
    #[cfg(feature = "video")]
    fps: Option<f64>,
    finished: bool,
}

impl std::fmt::Debug for SourceIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceIterator")
            .field("source", &self.source)
            .field("count", &self.count)
            .field("sampler", &self.sampler)
            .finish_non_exhaustive()
    }
}

impl SourceIterator {
    /// Open a source.
    ///
    /// Videos are opened here so that a frame-rate mismatch is reported
    /// before any output is produced.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be opened, a scene graph cannot
    /// be parsed or the video is slower than `inference_fps`.
    pub fn new(source: Source, inference_fps: u32) -> Result<Self> {
        let mut iter = Self {
            source,
            count: 0,
            image_paths: Vec::new(),
            scene_graph: None,
            sampler: None,
            #[cfg(feature = "video")]
            decoder: None,
            #[cfg(feature = "video")]
            total_frames: None,
            #[cfg(feature = "video")]
            fps: None,
            finished: false,
        };

        match iter.source.clone() {
            Source::Video(path) => iter.open_video(&path, inference_fps)?,
            Source::ImageDirectory(dir) => {
                if !dir.is_dir() {
                    return Err(PoseError::ImageError(format!(
                        "Not a directory: {}",
                        dir.display()
                    )));
                }
                collect_files(&dir, &mut iter.image_paths)?;
            }
            Source::SceneGraph(path) => {
                iter.scene_graph = Some(SceneGraph::from_file(&path)?);
            }
        }
        Ok(iter)
    }

    /// The source being iterated.
    #[must_use]
    pub const fn source(&self) -> &Source {
        &self.source
    }

    /// Video sampler, `None` for image sources.
    #[must_use]
    pub const fn sampler(&self) -> Option<&FrameSampler> {
        self.sampler.as_ref()
    }

    /// Native video frame rate, `None` for image sources.
    #[must_use]
    pub const fn fps(&self) -> Option<f64> {
        #[cfg(feature = "video")]
        {
            self.fps
        }
        #[cfg(not(feature = "video"))]
        {
            None
        }
    }

    #[cfg(feature = "video")]
    fn open_video(&mut self, path: &Path, inference_fps: u32) -> Result<()> {
        crate::io::init_video();
        let decoder = video_rs::decode::Decoder::new(path).map_err(|e| {
            PoseError::VideoError(format!("Failed to open {}: {e}", path.display()))
        })?;

        let fps = f64::from(decoder.frame_rate());
        self.sampler = Some(FrameSampler::new(fps, inference_fps)?);
        if let Ok(duration) = decoder.duration() {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                self.total_frames = Some((duration.as_secs_f64() * fps) as usize);
            }
        }
        self.fps = Some(fps);
        self.decoder = Some(decoder);
        Ok(())
    }

    #[cfg(not(feature = "video"))]
    fn open_video(&mut self, _path: &Path, _inference_fps: u32) -> Result<()> {
        Err(PoseError::FeatureNotEnabled(
            "Video support requires 'video' feature".to_string(),
        ))
    }

    /// Decode until the next sampled frame.
    #[cfg(feature = "video")]
    fn next_video_frame(&mut self) -> Option<Result<Frame>> {
        let sampler = self.sampler?;
        loop {
            let decoder = self.decoder.as_mut()?;
            let started = Instant::now();
            let frame = match decoder.decode() {
                Ok((_ts, frame)) => frame,
                Err(video_rs::Error::DecodeExhausted | video_rs::Error::ReadExhausted) => {
                    return None;
                }
                Err(e) if self.count == 0 => {
                    self.finished = true;
                    return Some(Err(PoseError::VideoError(format!(
                        "Failed to decode {}: {e}",
                        self.source.path().display()
                    ))));
                }
                Err(e) => {
                    warn!("Stopping at frame {}: {e}", self.count);
                    return None;
                }
            };

            self.count += 1;
            if !sampler.should_process(self.count) {
                continue;
            }

            let meta = SourceMeta {
                frame_idx: self.count,
                total_frames: self.total_frames,
                path: self.source.path().to_path_buf(),
                label: format!("{:08}", self.count),
                fps: self.fps,
                started,
            };
            return Some(video_frame_to_image(&frame).map(|image| Frame {
                image,
                meta,
                boxes: None,
            }));
        }
    }

    #[cfg(not(feature = "video"))]
    fn next_video_frame(&mut self) -> Option<Result<Frame>> {
        self.finished = true;
        Some(Err(PoseError::FeatureNotEnabled(
            "Video support requires 'video' feature".to_string(),
        )))
    }

    fn next_image(&mut self) -> Option<Result<Frame>> {
        let started = Instant::now();
        let path = self.image_paths.get(self.count)?.clone();
        self.count += 1;

        let meta = SourceMeta {
            frame_idx: self.count,
            total_frames: Some(self.image_paths.len()),
            label: file_label(&path),
            path,
            fps: None,
            started,
        };
        Some(load_image(&meta.path).map(|image| Frame {
            image,
            meta,
            boxes: None,
        }))
    }

    fn next_scene_graph(&mut self) -> Option<Result<Frame>> {
        let graph = self.scene_graph.take()?;
        self.count += 1;

        let path = image_path_for(self.source.path());
        let meta = SourceMeta {
            frame_idx: self.count,
            total_frames: Some(1),
            label: graph.image_id.to_string(),
            path,
            fps: None,
            started: Instant::now(),
        };
        let boxes = graph.person_boxes();
        Some(load_image(&meta.path).map(|image| Frame {
            image,
            meta,
            boxes: Some(boxes),
        }))
    }
}

impl Iterator for SourceIterator {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let item = match &self.source {
            Source::Video(_) => self.next_video_frame(),
            Source::ImageDirectory(_) => self.next_image(),
            Source::SceneGraph(_) => self.next_scene_graph(),
        };
        if item.is_none() {
            self.finished = true;
        }
        item
    }
}

/// Append every file under `dir`, files of a directory before its
/// subdirectories, both in name order.
///
/// Symlinked directories are not followed.
fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let mut files = Vec::new();
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)?.filter_map(std::result::Result::ok) {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            dirs.push(entry.path());
        } else if file_type.is_symlink() && entry.path().is_dir() {
            continue;
        } else {
            files.push(entry.path());
        }
    }
    files.sort();
    dirs.sort();

    out.extend(files);
    for sub in dirs {
        collect_files(&sub, out)?;
    }
    Ok(())
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Decode an image by content; the file extension is not trusted.
fn load_image(path: &Path) -> Result<DynamicImage> {
    let fail = |e: &dyn std::fmt::Display| {
        PoseError::ImageError(format!("Failed to load {}: {e}", path.display()))
    };
    ImageReader::open(path)
        .map_err(|e| fail(&e))?
        .with_guessed_format()
        .map_err(|e| fail(&e))?
        .decode()
        .map_err(|e| fail(&e))
}

/// Convert a decoded `video_rs` frame (HWC, RGB) to a `DynamicImage`.
#[cfg(feature = "video")]
fn video_frame_to_image(frame: &video_rs::Frame) -> Result<DynamicImage> {
    let shape = frame.shape();
    let height = u32::try_from(shape[0])
        .map_err(|_| PoseError::ImageError("Frame height exceeds u32::MAX".to_string()))?;
    let width = u32::try_from(shape[1])
        .map_err(|_| PoseError::ImageError("Frame width exceeds u32::MAX".to_string()))?;

    let raw: Vec<u8> = frame.iter().copied().collect();
    let buffer = RgbImage::from_raw(width, height, raw).ok_or_else(|| {
        PoseError::ImageError("Failed to create image from video frame".to_string())
    })?;
    Ok(DynamicImage::ImageRgb8(buffer))
}
