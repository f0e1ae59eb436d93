#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	clippy::expect_used,
	trivial_casts,
	unused_allocation,
	clippy::dbg_macro
)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

//! Fast single frame thumbnails from video files.
//!
//! ```no_run
//! use flashthumb_ffmpeg::{initialize, HostContext, Thumbnailer};
//!
//! initialize(&HostContext::new());
//!
//! let thumbnailer = Thumbnailer::default();
//! if let Some(thumbnail) = thumbnailer.generate("clip.mp4", 12.0, 5)? {
//! 	println!("{}x{}", thumbnail.width, thumbnail.height);
//! }
//! # Ok::<(), flashthumb_ffmpeg::Error>(())
//! ```

mod codec_ctx;
mod dict;
mod error;
mod format_ctx;
mod frame_decoder;
mod init;
mod packet;
mod quality;
mod scaler;
mod seek;
mod thumbnailer;
mod utils;
mod video_frame;

#[cfg(test)]
#[path = "../tests/common/media.rs"]
mod test_media;

pub use error::{Error, FFmpegError};
pub use init::{initialize, is_initialized, FFmpegLogLevel, HostContext};
pub use quality::{
	DecodeStrategy, FrameMatch, ProbeBudget, QualityPreset, QualityProfile, QualityScale,
	QualitySelection, ScalingAlgorithm,
};
pub use thumbnailer::{
	BenchmarkReport, ThumbnailRequest, Thumbnailer, ThumbnailerBuilder, DECODER_THREADS_ENV,
	MAX_DECODE_FRAMES_ENV,
};
pub use video_frame::{PixelBuffer, PixelFormat};

use std::path::Path;

/// [`Thumbnailer::generate`] with default settings.
pub fn generate(
	path: impl AsRef<Path>,
	position: f64,
	quality_scale: u8,
) -> Result<Option<PixelBuffer>, Error> {
	Thumbnailer::default().generate(path, position, quality_scale)
}

/// [`Thumbnailer::generate_async`] with default settings.
pub async fn generate_async(
	path: impl AsRef<Path>,
	position: f64,
	quality_scale: u8,
) -> Result<Option<PixelBuffer>, Error> {
	Thumbnailer::default()
		.generate_async(path, position, quality_scale)
		.await
}

/// [`Thumbnailer::generate_multiple`] with default settings.
pub fn generate_multiple(
	path: impl AsRef<Path>,
	positions: &[f64],
	quality_scale: u8,
) -> Result<Vec<Option<PixelBuffer>>, Error> {
	Thumbnailer::default().generate_multiple(path, positions, quality_scale)
}

/// [`Thumbnailer::generate_multiple_async`] with default settings.
pub async fn generate_multiple_async(
	path: impl AsRef<Path>,
	positions: Vec<f64>,
	quality_scale: u8,
) -> Result<Vec<Option<PixelBuffer>>, Error> {
	Thumbnailer::default()
		.generate_multiple_async(path, positions, quality_scale)
		.await
}

/// [`Thumbnailer::benchmark`] with default settings.
pub fn benchmark(
	path: impl AsRef<Path>,
	position: f64,
	quality_scale: u8,
) -> Result<BenchmarkReport, Error> {
	Thumbnailer::default().benchmark(path, position, quality_scale)
}
