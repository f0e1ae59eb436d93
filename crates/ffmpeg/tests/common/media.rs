//! Sample media produced with the `ffmpeg` CLI. Shared by the integration tests and the crate's
//! own unit tests, so it must not depend on the crate.

#![allow(dead_code)]

use std::{
	path::PathBuf,
	process::{Command, Stdio},
};

use tempfile::{tempdir, TempDir};
use tracing::{info, warn};

/// A media file living in its own temporary directory.
pub struct Sample {
	pub path: PathBuf,
	_dir: TempDir,
}

/// MPEG-4 Part 2 test pattern at 25 fps with a keyframe every `gop` frames.
pub fn sample_video(width: u32, height: u32, seconds: u32, gop: u32) -> Option<Sample> {
	generate(
		"sample.mp4",
		&[
			"-f",
			"lavfi",
			"-i",
			&format!("testsrc=size={width}x{height}:rate=25:duration={seconds}"),
			"-c:v",
			"mpeg4",
			"-q:v",
			"5",
			"-g",
			&gop.to_string(),
			"-pix_fmt",
			"yuv420p",
		],
	)
}

/// Audio only file, nothing to take a thumbnail of.
pub fn sample_audio() -> Option<Sample> {
	generate(
		"tone.wav",
		&["-f", "lavfi", "-i", "sine=frequency=440:duration=1"],
	)
}

fn generate(file_name: &str, args: &[&str]) -> Option<Sample> {
	let dir = tempdir().ok()?;
	let path = dir.path().join(file_name);

	let status = Command::new("ffmpeg")
		.args(["-hide_banner", "-loglevel", "error", "-y"])
		.args(args)
		.arg(&path)
		.stdin(Stdio::null())
		.status();

	match status {
		Ok(status) if status.success() && path.exists() => {
			info!(path = %path.display(), "Generated sample media");
			Some(Sample { path, _dir: dir })
		}
		Ok(status) => {
			warn!(%status, "ffmpeg failed to generate sample media");
			None
		}
		Err(e) => {
			warn!(%e, "ffmpeg CLI not found");
			None
		}
	}
}
