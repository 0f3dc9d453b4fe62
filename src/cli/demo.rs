// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::time::Instant;
#[cfg(feature = "visualize")]
use std::time::Duration;

use crate::annotate::load_timer_font;
use crate::cli::args::{Cli, FileType};
use crate::cli::logging::{format_seconds, set_verbose};
use crate::detector::{PersonDetector, YoloPersonDetector};
use crate::error::{PoseError, Result};
use crate::estimator::HeatmapPoseEstimator;
use crate::io::{FrameSink, PoseSink, prepare_output_dirs};
use crate::pipeline::{FramePipeline, PipelineOptions};
use crate::results::TimingStats;
use crate::source::{Source, SourceIterator};
#[cfg(feature = "visualize")]
use crate::visualizer::Viewer;
use crate::{NAME, PoseConfig, VERSION};
use crate::{info, section, success, verbose, warn};

/// Load the cfg file and apply the trailing overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a value is invalid.
pub fn load_config(args: &Cli) -> Result<PoseConfig> {
    let mut config = PoseConfig::from_file(&args.cfg)?;
    config.apply_overrides(&args.opts)?;
    config.validate()?;
    Ok(config)
}

/// Run the pose demo described by `args`.
///
/// # Errors
///
/// Returns the first error of configuration, source, model loading,
/// inference or output.
pub fn run_demo(args: &Cli) -> Result<()> {
    let config = load_config(args)?;
    set_verbose(config.verbose);

    let source = args.source().ok_or_else(|| {
        PoseError::ConfigError(match args.file_type {
            FileType::Video => "--fileType vid requires --videoFile".to_string(),
            FileType::Image => "--fileType img requires --imagesDirectory".to_string(),
        })
    })?;

    info!("{NAME} {VERSION} 🚀 ONNX Runtime {}", config.device);
    verbose!(
        "{} {}x{}, style {}, detector threshold {}",
        config.model_name,
        config.image_size.0,
        config.image_size.1,
        config.style,
        config.detection_threshold
    );

    // Open the source first: a too slow video must fail before outputs are touched.
    let frames = SourceIterator::new(source.clone(), args.inference_fps)?;
    if let (Some(fps), Some(sampler)) = (frames.fps(), frames.sampler()) {
        verbose!(
            "{}: {fps:.2} fps, annotating every {} frame(s) for {} fps",
            source.path().display(),
            sampler.skip(),
            args.inference_fps
        );
    }
    let pose_dir = prepare_output_dirs(&args.output_dir)?;

    let detector: Option<Box<dyn PersonDetector>> = if source.supplies_boxes() {
        None
    } else {
        Some(Box::new(YoloPersonDetector::load(&config)?))
    };
    let estimator = HeatmapPoseEstimator::load(&config)?;
    let timer_font = if source.supplies_boxes() {
        None
    } else {
        load_timer_font()
    };
    let mut pipeline = FramePipeline::new(
        detector,
        Box::new(estimator),
        config.style.color_style(),
        PipelineOptions::from_config(&config, args.write_box_frames),
    )
    .with_timer_font(timer_font);
    let mut sink = PoseSink::new(pose_dir, source.clone(), args.inference_fps);

    let run_start = Instant::now();
    let mut stats = TimingStats::new();
    let outcome = annotate_frames(
        frames,
        &source,
        &mut pipeline,
        &mut sink,
        &mut stats,
        args.show_images,
    );
    // The video is finalized even when a frame failed.
    let finished = sink.finish();
    outcome?;
    finished?;

    section!("Summary");
    info!("Average time bbox {}", format_seconds(stats.average_bbox()));
    info!("Average time pose {}", format_seconds(stats.average_pose()));
    info!("Average time total {}", format_seconds(stats.average_total()));
    info!(
        "Time video end-start {}",
        format_seconds(Some(run_start.elapsed().as_secs_f64()))
    );
    success!(
        "{} frame(s) written to {}, {} annotated",
        sink.written(),
        sink.pose_dir().display(),
        stats.annotated_frames()
    );
    Ok(())
}

/// Drive frames from `frames` through `pipeline` into `sink` until the
/// source ends or the preview window is closed.
#[cfg_attr(not(feature = "visualize"), allow(unused_variables))]
fn annotate_frames(
    frames: SourceIterator,
    source: &Source,
    pipeline: &mut FramePipeline,
    sink: &mut PoseSink,
    stats: &mut TimingStats,
    show_images: bool,
) -> Result<()> {
    let unit = if source.is_video() { "frame" } else { "image" };

    #[cfg(feature = "visualize")]
    let mut preview = Preview::new(show_images);
    #[cfg(not(feature = "visualize"))]
    if show_images {
        warn!("--showImages requires the 'visualize' feature, preview disabled");
    }

    for item in frames {
        let frame = item?;
        verbose!("Handling {unit} number {}", frame.meta.frame_idx);

        let processed = pipeline.process(&frame)?;
        stats.record(&processed.timings);
        sink.write(&frame.meta, &processed.image)?;

        #[cfg(feature = "visualize")]
        if processed.has_people() && !preview.show(&processed.image, source.is_video()) {
            info!("Preview closed, stopping at {unit} {}", frame.meta.frame_idx);
            break;
        }
    }
    Ok(())
}

/// Optional preview window, opened on the first shown frame.
#[cfg(feature = "visualize")]
struct Preview {
    enabled: bool,
    viewer: Option<Viewer>,
}

#[cfg(feature = "visualize")]
impl Preview {
    const fn new(enabled: bool) -> Self {
        Self {
            enabled,
            viewer: None,
        }
    }

    /// Show `image`; `false` once the user asked to quit.
    fn show(&mut self, image: &image::RgbImage, is_video: bool) -> bool {
        if !self.enabled {
            return true;
        }
        if self.viewer.is_none() {
            match Viewer::new("pos", image.width() as usize, image.height() as usize) {
                Ok(viewer) => self.viewer = Some(viewer),
                Err(e) => {
                    warn!("{e}, preview disabled");
                    self.enabled = false;
                    return true;
                }
            }
        }

        let Some(viewer) = self.viewer.as_mut() else {
            return true;
        };
        let outcome = viewer.show(image).and_then(|keep_going| {
            if keep_going && !is_video {
                viewer.wait(Duration::from_millis(200))
            } else {
                Ok(keep_going)
            }
        });
        self.settle(outcome)
    }

    /// Turn a window outcome into keep-going; a failure disables the preview.
    fn settle(&mut self, outcome: Result<bool>) -> bool {
        match outcome {
            Ok(keep_going) => keep_going,
            Err(e) => {
                warn!("{e}, preview disabled");
                self.enabled = false;
                self.viewer = None;
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;

    fn cli(cfg: &std::path::Path, extra: &[&str]) -> Cli {
        let cfg = cfg.to_string_lossy().into_owned();
        let mut argv = vec!["app", "--cfg", cfg.as_str(), "--fileType", "img"];
        argv.extend_from_slice(extra);
        Cli::parse_from(argv)
    }

    #[test]
    fn test_load_config_with_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dir.path().join("cfg.yaml");
        fs::write(
            &cfg,
            "MODEL:\n  IMAGE_SIZE:\n  - 288\n  - 384\nTEST:\n  MODEL_FILE: ''\n",
        )
        .unwrap();

        let args = cli(&cfg, &["TEST.MODEL_FILE", "pose.onnx", "DEMO.STYLE", "xiaochu"]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.image_size, (288, 384));
        assert_eq!(config.model_file, "pose.onnx");
        assert_eq!(config.style.as_str(), "xiaochu");
    }

    #[test]
    fn test_empty_model_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dir.path().join("cfg.yaml");
        fs::write(&cfg, "TEST:\n  MODEL_FILE: ''\n").unwrap();

        let err = load_config(&cli(&cfg, &[])).unwrap_err();
        assert!(err.to_string().contains("TEST.MODEL_FILE"));
    }

    #[cfg(feature = "visualize")]
    #[test]
    fn test_window_failure_disables_preview() {
        let mut preview = Preview::new(true);
        assert!(!preview.settle(Ok(false)));
        assert!(preview.enabled);

        let failed = Err(PoseError::VisualizerError("Failed to update window".into()));
        assert!(preview.settle(failed));
        assert!(!preview.enabled);
        assert!(preview.viewer.is_none());
        assert!(preview.show(&image::RgbImage::new(2, 2), false));
    }

    #[test]
    fn test_missing_source_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dir.path().join("cfg.yaml");
        fs::write(&cfg, "TEST:\n  MODEL_FILE: pose.onnx\n").unwrap();

        let err = run_demo(&cli(&cfg, &[])).unwrap_err();
        assert!(matches!(err, PoseError::ConfigError(_)));
    }

    #[test]
    fn test_source_errors_leave_outputs_alone() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dir.path().join("cfg.yaml");
        fs::write(&cfg, "TEST:\n  MODEL_FILE: pose.onnx\n").unwrap();
        let out = dir.path().join("out");
        let missing = dir.path().join("missing");
        let (out_arg, missing_arg) = (
            out.to_string_lossy().into_owned(),
            missing.to_string_lossy().into_owned(),
        );

        let args = cli(
            &cfg,
            &[
                "--imagesDirectory",
                missing_arg.as_str(),
                "--outputDir",
                out_arg.as_str(),
            ],
        );
        assert!(run_demo(&args).is_err());
        assert!(!out.exists());
    }
}
