// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Output handling: the `pose/` directory, annotated JPEGs and the output video.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use image::{RgbImage, imageops};
#[cfg(feature = "video")]
use video_rs::{Encoder, Time, encode::Settings as EncoderSettings};

use crate::error::{PoseError, Result};
use crate::source::{Source, SourceMeta};
#[cfg(feature = "video")]
use crate::verbose;

#[cfg(feature = "video")]
use std::sync::Once;

#[cfg(feature = "video")]
static INIT: Once = Once::new();

/// Subdirectory of the output directory that receives every result.
pub const POSE_DIR: &str = "pose";

/// Initialize `video-rs` once per process. Safe to call multiple times.
#[allow(clippy::missing_const_for_fn)]
pub fn init_video() {
    #[cfg(feature = "video")]
    INIT.call_once(|| {
        if let Err(e) = video_rs::init() {
            crate::warn!("Failed to initialize video-rs: {e}");
        }
    });
}

/// Delete and recreate `<output_dir>/pose`, returning its path.
///
/// # Errors
///
/// Returns [`PoseError::Io`] if the directory cannot be removed or created.
pub fn prepare_output_dirs<P: AsRef<Path>>(output_dir: P) -> Result<PathBuf> {
    let pose_dir = output_dir.as_ref().join(POSE_DIR);
    if pose_dir.exists() {
        fs::remove_dir_all(&pose_dir)?;
    }
    fs::create_dir_all(&pose_dir)?;
    Ok(pose_dir)
}

/// File name of an annotated frame.
///
/// Video frames are numbered `pose_00000042.jpg`; images and scene graphs
/// keep their label, `<label>_pose.jpg`.
#[must_use]
pub fn frame_file_name(source: &Source, meta: &SourceMeta) -> String {
    if source.is_video() {
        format!("pose_{:08}.jpg", meta.frame_idx)
    } else {
        format!("{}_pose.jpg", meta.label)
    }
}

/// File name of the output video for the input at `video_path`.
#[must_use]
pub fn video_file_name(video_path: &Path) -> String {
    let stem = video_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{stem}_pose.avi")
}

/// Largest even size not exceeding `width` x `height`; yuv420p needs even sides.
#[must_use]
pub const fn even_frame_size(width: u32, height: u32) -> (u32, u32) {
    (width & !1, height & !1)
}

/// Drop the last column and row when a side is odd, so the frame fits
/// [`even_frame_size`].
#[must_use]
pub fn crop_to_even(frame: &RgbImage) -> Cow<'_, RgbImage> {
    let (width, height) = even_frame_size(frame.width(), frame.height());
    if (width, height) == frame.dimensions() {
        Cow::Borrowed(frame)
    } else {
        Cow::Owned(imageops::crop_imm(frame, 0, 0, width, height).to_image())
    }
}

/// Destination of annotated frames.
pub trait FrameSink {
    /// Store one annotated frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be written.
    fn write(&mut self, meta: &SourceMeta, image: &RgbImage) -> Result<()>;

    /// Flush and close everything opened by [`FrameSink::write`].
    ///
    /// # Errors
    ///
    /// Returns an error if a pending video cannot be finalized.
    fn finish(&mut self) -> Result<()>;
}

/// A wrapper around `video-rs` encoder to simplify video saving.
#[cfg(feature = "video")]
pub struct VideoWriter {
    encoder: Encoder,
    frame_duration: Time,
    position: Time,
    /// Size of the frames handed to [`VideoWriter::write_frame`].
    width: usize,
    height: usize,
    /// Encoded size, `width` and `height` rounded down to even.
    encoded: (u32, u32),
}

#[cfg(feature = "video")]
impl VideoWriter {
    /// Create a new `VideoWriter` (H.264, yuv420p) for frames of
    /// `width` x `height`.
    ///
    /// Odd sides are encoded one pixel smaller, see [`crop_to_even`].
    ///
    /// # Errors
    ///
    /// Returns an error if a side is smaller than two pixels or the encoder
    /// cannot be initialized.
    pub fn new<P: AsRef<Path>>(path: P, width: usize, height: usize, fps: f64) -> Result<Self> {
        init_video();
        let output_path = path.as_ref();
        let (Ok(w), Ok(h)) = (u32::try_from(width), u32::try_from(height)) else {
            return Err(PoseError::VideoError(format!(
                "Frame size {width}x{height} is too large to encode"
            )));
        };
        let encoded = even_frame_size(w, h);
        if encoded.0 == 0 || encoded.1 == 0 {
            return Err(PoseError::VideoError(format!(
                "Frame size {width}x{height} is too small to encode"
            )));
        }
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let settings = EncoderSettings::preset_h264_yuv420p(
            encoded.0 as usize,
            encoded.1 as usize,
            false,
        );
        let encoder = Encoder::new(output_path, settings).map_err(|e| {
            PoseError::VideoError(format!(
                "Failed to create video encoder for {}: {e}",
                output_path.display()
            ))
        })?;

        Ok(Self {
            encoder,
            frame_duration: Time::from_secs_f64(1.0 / fps),
            position: Time::zero(),
            width,
            height,
            encoded,
        })
    }

    /// Append a frame.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the frame size changed.
    pub fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        let width = frame.width() as usize;
        let height = frame.height() as usize;
        if width != self.width || height != self.height {
            return Err(PoseError::VideoError(format!(
                "Frame dimensions {width}x{height} do not match video dimensions {}x{}",
                self.width, self.height
            )));
        }

        let frame = crop_to_even(frame);
        let (enc_w, enc_h) = (self.encoded.0 as usize, self.encoded.1 as usize);
        let frame_array =
            video_rs::Frame::from_shape_vec((enc_h, enc_w, 3), frame.as_raw().clone())
                .map_err(|e| PoseError::VideoError(e.to_string()))?;
        self.encoder
            .encode(&frame_array, self.position)
            .map_err(|e| PoseError::VideoError(format!("Failed to encode frame: {e}")))?;

        self.position = self.position.aligned_with(self.frame_duration).add();
        Ok(())
    }

    /// Finish writing the video.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoder fails to finish.
    pub fn finish(mut self) -> Result<()> {
        self.encoder
            .finish()
            .map_err(|e| PoseError::VideoError(format!("Failed to finish video encoding: {e}")))
    }
}

/// Writes annotated frames under `<outputDir>/pose/`.
///
/// Every frame becomes a JPEG. Video sources additionally feed an output
/// video at the inference rate, opened on the first frame.
pub struct PoseSink {
    pose_dir: PathBuf,
    source: Source,
    #[cfg_attr(not(feature = "video"), allow(dead_code))]
    inference_fps: u32,
    written: usize,
    #[cfg(feature = "video")]
    video_writer: Option<VideoWriter>,
}

impl PoseSink {
    /// Create a sink for frames of `source`.
    #[must_use]
    pub fn new(pose_dir: PathBuf, source: Source, inference_fps: u32) -> Self {
        Self {
            pose_dir,
            source,
            inference_fps,
            written: 0,
            #[cfg(feature = "video")]
            video_writer: None,
        }
    }

    /// Directory the sink writes to.
    #[must_use]
    pub fn pose_dir(&self) -> &Path {
        &self.pose_dir
    }

    /// Number of JPEG frames written so far.
    #[must_use]
    pub const fn written(&self) -> usize {
        self.written
    }

    /// Path of the output video, for video sources.
    #[must_use]
    pub fn video_path(&self) -> Option<PathBuf> {
        match &self.source {
            Source::Video(path) => Some(self.pose_dir.join(video_file_name(path))),
            _ => None,
        }
    }

    #[cfg(feature = "video")]
    fn write_video_frame(&mut self, image: &RgbImage) -> Result<()> {
        if self.video_writer.is_none() {
            let Some(path) = self.video_path() else {
                return Ok(());
            };
            verbose!(
                "Writing video {} at {} fps",
                path.display(),
                self.inference_fps
            );
            self.video_writer = Some(VideoWriter::new(
                &path,
                image.width() as usize,
                image.height() as usize,
                f64::from(self.inference_fps),
            )?);
        }
        if let Some(writer) = &mut self.video_writer {
            writer.write_frame(image)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for PoseSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoseSink")
            .field("pose_dir", &self.pose_dir)
            .field("source", &self.source)
            .field("written", &self.written)
            .finish_non_exhaustive()
    }
}

impl FrameSink for PoseSink {
    fn write(&mut self, meta: &SourceMeta, image: &RgbImage) -> Result<()> {
        let path = self.pose_dir.join(frame_file_name(&self.source, meta));
        image
            .save(&path)
            .map_err(|e| PoseError::ImageError(format!("Failed to save {}: {e}", path.display())))?;
        self.written += 1;

        #[cfg(feature = "video")]
        if self.source.is_video() {
            self.write_video_frame(image)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        #[cfg(feature = "video")]
        if let Some(writer) = self.video_writer.take() {
            writer.finish()?;
            if let Some(path) = self.video_path() {
                verbose!("Video saved to {}", path.display());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::time::Instant;

    fn meta(frame_idx: usize, label: &str) -> SourceMeta {
        SourceMeta {
            frame_idx,
            total_frames: None,
            path: PathBuf::from(label),
            label: label.to_string(),
            fps: None,
            started: Instant::now(),
        }
    }

    #[test]
    fn test_prepare_output_dirs_clears_previous_results() {
        let out = tempfile::tempdir().unwrap();
        let stale = out.path().join(POSE_DIR).join("old.jpg");
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, b"stale").unwrap();
        let keep = out.path().join("keep.txt");
        fs::write(&keep, b"keep").unwrap();

        let pose_dir = prepare_output_dirs(out.path()).unwrap();
        assert_eq!(pose_dir, out.path().join(POSE_DIR));
        assert!(pose_dir.is_dir());
        assert!(!stale.exists());
        assert!(keep.exists());
    }

    #[test]
    fn test_prepare_output_dirs_creates_missing_parents() {
        let out = tempfile::tempdir().unwrap();
        let pose_dir = prepare_output_dirs(out.path().join("demo")).unwrap();
        assert!(pose_dir.ends_with("demo/pose"));
        assert!(pose_dir.is_dir());
    }

    #[test]
    fn test_file_names() {
        let video = Source::Video(PathBuf::from("clips/walk.mp4"));
        let images = Source::ImageDirectory(PathBuf::from("imgs"));
        let graph = Source::SceneGraph(PathBuf::from("2.json"));

        assert_eq!(frame_file_name(&video, &meta(42, "00000042")), "pose_00000042.jpg");
        assert_eq!(frame_file_name(&images, &meta(1, "a.png")), "a.png_pose.jpg");
        assert_eq!(frame_file_name(&graph, &meta(1, "2")), "2_pose.jpg");
        assert_eq!(video_file_name(Path::new("clips/walk.mp4")), "walk_pose.avi");
    }

    #[test]
    fn test_odd_frames_are_cropped_for_video() {
        assert_eq!(even_frame_size(641, 481), (640, 480));
        assert_eq!(even_frame_size(640, 480), (640, 480));
        assert_eq!(even_frame_size(1, 3), (0, 2));

        let mut frame = RgbImage::from_pixel(5, 3, Rgb([1, 2, 3]));
        frame.put_pixel(3, 1, Rgb([9, 9, 9]));
        let cropped = crop_to_even(&frame);
        assert_eq!(cropped.dimensions(), (4, 2));
        assert_eq!(*cropped.get_pixel(3, 1), Rgb([9, 9, 9]));

        let even = RgbImage::new(4, 2);
        assert!(matches!(crop_to_even(&even), Cow::Borrowed(_)));
    }

    #[test]
    fn test_sink_writes_images() {
        let out = tempfile::tempdir().unwrap();
        let pose_dir = prepare_output_dirs(out.path()).unwrap();
        let mut sink = PoseSink::new(
            pose_dir.clone(),
            Source::ImageDirectory(PathBuf::from("imgs")),
            20,
        );
        assert!(sink.video_path().is_none());

        let image = RgbImage::from_pixel(6, 4, Rgb([200, 100, 50]));
        sink.write(&meta(1, "a.png"), &image).unwrap();
        sink.write(&meta(2, "b.png"), &image).unwrap();
        sink.finish().unwrap();

        assert_eq!(sink.written(), 2);
        let saved = image::open(pose_dir.join("a.png_pose.jpg")).unwrap();
        assert_eq!((saved.width(), saved.height()), (6, 4));
        assert!(pose_dir.join("b.png_pose.jpg").exists());
    }
}
