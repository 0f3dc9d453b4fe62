// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Asset downloads.
//!
//! The default person detector and the overlay font are fetched from the
//! Ultralytics asset releases the first time they are needed.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::{PoseError, Result};

/// Default person detector model name.
pub const DEFAULT_DETECTOR: &str = "yolo11n.onnx";

/// URL of the default person detector.
const DEFAULT_DETECTOR_URL: &str =
    "https://github.com/ultralytics/assets/releases/download/v8.3.0/yolo11n.onnx";

/// Release holding the overlay fonts.
const FONT_ASSETS_URL: &str = "https://github.com/ultralytics/assets/releases/download/v0.0.0";

/// Connection timeout in seconds.
const CONNECT_TIMEOUT: u64 = 30;

/// Read timeout in seconds.
const READ_TIMEOUT: u64 = 300;

/// Progress bar width in characters.
const BAR_WIDTH: usize = 12;

/// Minimum seconds between progress redraws.
const MIN_UPDATE_INTERVAL: f64 = 0.1;

/// Format bytes as human-readable string (e.g., "10.4MB").
#[allow(clippy::cast_precision_loss)]
fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let bytes = bytes as f64;
    if bytes >= GB {
        format!("{:.1}GB", bytes / GB)
    } else if bytes >= MB {
        format!("{:.1}MB", bytes / MB)
    } else if bytes >= KB {
        format!("{:.1}KB", bytes / KB)
    } else {
        format!("{bytes:.0}B")
    }
}

/// Format elapsed seconds as `5.5s` or `m:ss.s`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn format_time(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{seconds:.1}s")
    } else {
        let mins = (seconds / 60.0) as u32;
        let secs = seconds % 60.0;
        format!("{mins}:{secs:04.1}")
    }
}

/// Progress bar string for `progress` in `[0, 1]`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn generate_bar(progress: f64, width: usize) -> String {
    let filled = ((progress * width as f64) as usize).min(width);
    let partial = progress * width as f64 - filled as f64;

    let mut bar = "━".repeat(filled);
    if filled < width {
        if partial > 0.5 {
            bar.push('╸');
            bar.push_str(&"─".repeat(width - filled - 1));
        } else {
            bar.push_str(&"─".repeat(width - filled));
        }
    }
    bar
}

/// Single-line progress display on stderr.
struct Progress {
    desc: String,
    total: Option<u64>,
    downloaded: u64,
    start: Instant,
    last_update: Instant,
}

impl Progress {
    fn new(desc: String, total: Option<u64>) -> Self {
        let now = Instant::now();
        Self {
            desc,
            total: total.filter(|t| *t > 0),
            downloaded: 0,
            start: now,
            last_update: now,
        }
    }

    fn advance(&mut self, bytes: usize) {
        self.downloaded += bytes as u64;
        if self.last_update.elapsed().as_secs_f64() >= MIN_UPDATE_INTERVAL {
            self.last_update = Instant::now();
            eprint!("\r\x1b[K{}", self.line());
            std::io::stderr().flush().ok();
        }
    }

    fn finish(&self) {
        eprintln!("\r\x1b[K{}", self.line());
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn line(&self) -> String {
        let elapsed = self.start.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            (self.downloaded as f64 / elapsed) as u64
        } else {
            0
        };
        match self.total {
            Some(total) => {
                let progress = (self.downloaded as f64 / total as f64).min(1.0);
                format!(
                    "{}: {}% {} {}/{} {}/s {}",
                    self.desc,
                    (progress * 100.0) as u8,
                    generate_bar(progress, BAR_WIDTH),
                    format_bytes(self.downloaded),
                    format_bytes(total),
                    format_bytes(rate),
                    format_time(elapsed)
                )
            }
            None => format!(
                "{}: {} {}/s {}",
                self.desc,
                format_bytes(self.downloaded),
                format_bytes(rate),
                format_time(elapsed)
            ),
        }
    }
}

/// Download `url` to `dest` with a progress line.
///
/// The body is streamed into `<dest>.part` and renamed into place once complete,
/// so an interrupted download never leaves a truncated file at `dest`.
///
/// # Errors
///
/// Returns [`PoseError::ModelLoadError`] on network or file system failures.
pub fn download_file(url: &str, dest: &Path) -> Result<()> {
    let config = ureq::Agent::config_builder()
        .timeout_connect(Some(Duration::from_secs(CONNECT_TIMEOUT)))
        .timeout_recv_body(Some(Duration::from_secs(READ_TIMEOUT)))
        .build();
    let agent = ureq::Agent::new_with_config(config);

    let response = agent.get(url).call().map_err(|e| {
        let msg = match &e {
            ureq::Error::Timeout(_) => format!("Connection timed out while downloading {url}"),
            ureq::Error::Io(io_err) => format!("Network error downloading {url}: {io_err}"),
            _ => format!("Failed to download {url}: {e}"),
        };
        PoseError::ModelLoadError(msg)
    })?;

    let content_length: Option<u64> = response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok());

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let temp_path = dest.with_extension("part");
    let _ = fs::remove_file(&temp_path);

    let mut progress = Progress::new(
        format!("Downloading {url} to '{}'", dest.display()),
        content_length,
    );
    let mut reader = response.into_body().into_reader();

    let streamed = stream_to_file(&mut reader, &temp_path, &mut progress);
    if let Err(e) = streamed {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }
    progress.finish();

    fs::rename(&temp_path, dest).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        PoseError::ModelLoadError(format!(
            "Failed to move downloaded file to {}: {e}",
            dest.display()
        ))
    })
}

fn stream_to_file(reader: &mut impl Read, path: &Path, progress: &mut Progress) -> Result<()> {
    let file = File::create(path).map_err(|e| {
        PoseError::ModelLoadError(format!(
            "Failed to create temp file {}: {e}",
            path.display()
        ))
    })?;
    let mut writer = BufWriter::new(file);
    let mut buffer = [0u8; 65536];

    loop {
        let bytes_read = reader.read(&mut buffer).map_err(|e| {
            PoseError::ModelLoadError(format!("Failed to read from network: {e}"))
        })?;
        if bytes_read == 0 {
            break;
        }
        writer.write_all(&buffer[..bytes_read]).map_err(|e| {
            PoseError::ModelLoadError(format!("Failed to write to temp file: {e}"))
        })?;
        progress.advance(bytes_read);
    }

    writer
        .flush()
        .map_err(|e| PoseError::ModelLoadError(format!("Failed to flush temp file: {e}")))
}

/// Download the person detector if `model_path` names the default one.
///
/// # Errors
///
/// Returns an error for any other file name, or if the download fails.
pub fn try_download_detector<P: AsRef<Path>>(model_path: P) -> Result<PathBuf> {
    let path = model_path.as_ref();
    let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");

    if filename != DEFAULT_DETECTOR {
        return Err(PoseError::ModelLoadError(format!(
            "Model file not found: {}. Auto-download is only supported for {DEFAULT_DETECTOR}",
            path.display(),
        )));
    }

    download_file(DEFAULT_DETECTOR_URL, path)?;
    Ok(path.to_path_buf())
}

/// Download a font from the asset release into `dest`.
///
/// # Errors
///
/// Returns an error if the download fails.
pub fn download_font(font_name: &str, dest: &Path) -> Result<()> {
    download_file(&format!("{FONT_ASSETS_URL}/{font_name}"), dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_model_returns_error() {
        let err = try_download_detector("models/unknown_model.onnx")
            .unwrap_err()
            .to_string();
        assert!(err.contains("Auto-download is only supported"));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500B");
        assert_eq!(format_bytes(1024), "1.0KB");
        assert_eq!(format_bytes(1_048_576), "1.0MB");
        assert_eq!(format_bytes(1_073_741_824), "1.0GB");
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(5.5), "5.5s");
        assert_eq!(format_time(65.0), "1:05.0");
    }

    #[test]
    fn test_generate_bar() {
        assert_eq!(generate_bar(0.0, 10), "──────────");
        assert_eq!(generate_bar(1.0, 10), "━━━━━━━━━━");
        assert_eq!(generate_bar(0.5, 10), "━━━━━─────");
    }

    #[test]
    fn test_progress_line_with_total() {
        let mut progress = Progress::new("Downloading x".to_string(), Some(2048));
        progress.downloaded = 1024;
        let line = progress.line();
        assert!(line.starts_with("Downloading x: 50% "));
        assert!(line.contains("1.0KB/2.0KB"));
    }
}
