// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::source::Source;

/// Kind of input selected with `--fileType`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// A video file (`--videoFile`).
    #[value(name = "vid")]
    Video,
    /// A directory of images (`--imagesDirectory`).
    #[value(name = "img")]
    Image,
}

/// CLI arguments parser.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(after_help = r#"Examples:
    pose-demo --cfg inference-config.yaml --fileType vid --videoFile walk.mp4 --writeBoxFrames
    pose-demo --cfg inference-config.yaml --fileType img --imagesDirectory frames/ --outputDir out/
    pose-demo --cfg inference-config.yaml --fileType img --jsonDir scenes/2.json
    pose-demo --cfg inference-config.yaml --fileType vid --videoFile walk.mp4 TEST.MODEL_FILE pose_hrnet_w32.onnx DEVICE cuda:0"#)]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Experiment configuration file
    #[arg(long)]
    pub cfg: PathBuf,

    /// Input kind: vid or img
    #[arg(long = "fileType", value_enum)]
    pub file_type: FileType,

    /// Video to annotate (with --fileType vid)
    #[arg(long = "videoFile")]
    pub video_file: Option<PathBuf>,

    /// Directory of images to annotate (with --fileType img)
    #[arg(long = "imagesDirectory")]
    pub images_directory: Option<PathBuf>,

    /// Scene-graph JSON file; used instead of the detector when it exists
    #[arg(long = "jsonDir", default_value = "")]
    pub json_dir: String,

    /// Directory that receives pose/
    #[arg(long = "outputDir", default_value = "demo/")]
    pub output_dir: PathBuf,

    /// Frames per second to process from a video
    #[arg(long = "inferenceFps", default_value_t = 20)]
    pub inference_fps: u32,

    /// Draw the detected person boxes
    #[arg(long = "writeBoxFrames", default_value_t = false)]
    pub write_box_frames: bool,

    /// Show annotated frames in a window
    #[arg(long = "showImages", default_value_t = false, action = clap::ArgAction::Set)]
    pub show_images: bool,

    /// Configuration overrides as KEY VALUE pairs
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, num_args = 0..)]
    pub opts: Vec<String>,
}

impl Cli {
    /// Input selected by the arguments.
    ///
    /// An existing `--jsonDir` wins over `--fileType`. `None` when the file
    /// type's path argument is missing.
    #[must_use]
    pub fn source(&self) -> Option<Source> {
        if !self.json_dir.is_empty() {
            let json = PathBuf::from(&self.json_dir);
            if json.exists() {
                return Some(Source::SceneGraph(json));
            }
        }

        match self.file_type {
            FileType::Video => self.video_file.clone().map(Source::Video),
            FileType::Image => self.images_directory.clone().map(Source::ImageDirectory),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from([
            "app",
            "--cfg",
            "cfg.yaml",
            "--fileType",
            "vid",
            "--videoFile",
            "walk.mp4",
        ]);
        assert_eq!(cli.file_type, FileType::Video);
        assert_eq!(cli.output_dir, PathBuf::from("demo/"));
        assert_eq!(cli.inference_fps, 20);
        assert!(!cli.write_box_frames);
        assert!(!cli.show_images);
        assert!(cli.json_dir.is_empty());
        assert!(cli.opts.is_empty());
        assert_eq!(cli.source(), Some(Source::Video(PathBuf::from("walk.mp4"))));
    }

    #[test]
    fn test_custom_and_trailing_opts() {
        let cli = Cli::parse_from([
            "app",
            "--cfg",
            "cfg.yaml",
            "--fileType",
            "img",
            "--imagesDirectory",
            "frames",
            "--inferenceFps",
            "10",
            "--writeBoxFrames",
            "--showImages",
            "true",
            "TEST.MODEL_FILE",
            "pose.onnx",
            "DETECTOR.THRESHOLD",
            "-1",
        ]);
        assert_eq!(cli.file_type, FileType::Image);
        assert_eq!(cli.inference_fps, 10);
        assert!(cli.write_box_frames);
        assert!(cli.show_images);
        assert_eq!(
            cli.opts,
            vec!["TEST.MODEL_FILE", "pose.onnx", "DETECTOR.THRESHOLD", "-1"]
        );
        assert_eq!(
            cli.source(),
            Some(Source::ImageDirectory(PathBuf::from("frames")))
        );
    }

    #[test]
    fn test_missing_source_path() {
        let cli = Cli::parse_from(["app", "--cfg", "cfg.yaml", "--fileType", "vid"]);
        assert_eq!(cli.source(), None);
    }

    #[test]
    fn test_json_dir_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("2.json");
        std::fs::write(&json, "{}").unwrap();
        let json = json.to_string_lossy().into_owned();

        let cli = Cli::parse_from([
            "app",
            "--cfg",
            "cfg.yaml",
            "--fileType",
            "img",
            "--jsonDir",
            json.as_str(),
        ]);
        assert_eq!(cli.source(), Some(Source::SceneGraph(PathBuf::from(&json))));

        let cli = Cli::parse_from([
            "app",
            "--cfg",
            "cfg.yaml",
            "--fileType",
            "img",
            "--imagesDirectory",
            "frames",
            "--jsonDir",
            "missing.json",
        ]);
        assert_eq!(
            cli.source(),
            Some(Source::ImageDirectory(PathBuf::from("frames")))
        );
    }

    #[test]
    fn test_bad_file_type() {
        assert!(Cli::try_parse_from(["app", "--cfg", "c.yaml", "--fileType", "gif"]).is_err());
    }
}
