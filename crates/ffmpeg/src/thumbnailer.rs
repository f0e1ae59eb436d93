use crate::{
	error::Error,
	frame_decoder::{DecoderSettings, FrameDecoder, DEFAULT_MAX_DECODE_FRAMES},
	init::ensure_initialized,
	quality::{QualityScale, QualitySelection},
	scaler::scale,
	video_frame::{PixelBuffer, PixelFormat},
};

use std::{
	env,
	path::Path,
	time::{Duration, Instant},
};

use tokio::task::spawn_blocking;
use tracing::{debug, instrument, warn};

pub const DECODER_THREADS_ENV: &str = "FLASHTHUMB_DECODER_THREADS";
pub const MAX_DECODE_FRAMES_ENV: &str = "FLASHTHUMB_MAX_DECODE_FRAMES";

/// Where and how to extract a single thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ThumbnailRequest {
	/// Seconds from the start of the media.
	pub position: f64,
	pub quality: QualitySelection,
}

impl ThumbnailRequest {
	#[must_use]
	pub fn new(position: f64) -> Self {
		Self {
			position,
			..Default::default()
		}
	}

	#[must_use]
	pub fn with_quality(mut self, quality: impl Into<QualitySelection>) -> Self {
		self.quality = quality.into();
		self
	}
}

#[derive(Debug, Clone)]
pub struct BenchmarkReport {
	pub thumbnail: Option<PixelBuffer>,
	pub elapsed: Duration,
}

impl BenchmarkReport {
	#[must_use]
	pub const fn elapsed_millis(&self) -> u128 {
		self.elapsed.as_millis()
	}
}

/// `Thumbnailer` holds the settings from a [`ThumbnailerBuilder`] and extracts thumbnails with
/// them.
///
/// Every extraction runs in its own decode session, so a `Thumbnailer` can be cloned and shared
/// across threads freely. Only precondition failures surface as `Err`: a missing file, an
/// undecodable stream or an unreachable position all come back as `Ok(None)`.
#[derive(Debug, Clone, Default)]
pub struct Thumbnailer {
	builder: ThumbnailerBuilder,
}

impl Thumbnailer {
	/// Extracts the frame at `position` seconds, scaled to `quality_scale` tenths of its size.
	pub fn generate(
		&self,
		path: impl AsRef<Path>,
		position: f64,
		quality_scale: u8,
	) -> Result<Option<PixelBuffer>, Error> {
		ensure_initialized()?;
		let quality = QualityScale::new(quality_scale)?;

		self.generate_with(path, ThumbnailRequest::new(position).with_quality(quality))
	}

	/// Same as [`Thumbnailer::generate`], with any [`QualitySelection`].
	pub fn generate_with(
		&self,
		path: impl AsRef<Path>,
		request: ThumbnailRequest,
	) -> Result<Option<PixelBuffer>, Error> {
		ensure_initialized()?;
		let path = path.as_ref();

		Ok(assemble(path, self.extract(path, request)))
	}

	/// Runs [`Thumbnailer::generate`] on tokio's blocking pool.
	pub async fn generate_async(
		&self,
		path: impl AsRef<Path>,
		position: f64,
		quality_scale: u8,
	) -> Result<Option<PixelBuffer>, Error> {
		ensure_initialized()?;
		QualityScale::new(quality_scale)?;

		let thumbnailer = self.clone();
		let path = path.as_ref().to_path_buf();

		spawn_blocking(move || thumbnailer.generate(path, position, quality_scale)).await?
	}

	/// One thumbnail per position, in order. A failure at one position leaves only that slot
	/// empty.
	pub fn generate_multiple(
		&self,
		path: impl AsRef<Path>,
		positions: &[f64],
		quality_scale: u8,
	) -> Result<Vec<Option<PixelBuffer>>, Error> {
		ensure_initialized()?;
		let quality = QualityScale::new(quality_scale)?;

		self.generate_multiple_with(path, positions, quality.into())
	}

	pub fn generate_multiple_with(
		&self,
		path: impl AsRef<Path>,
		positions: &[f64],
		quality: QualitySelection,
	) -> Result<Vec<Option<PixelBuffer>>, Error> {
		ensure_initialized()?;
		let path = path.as_ref();

		Ok(positions
			.iter()
			.map(|&position| {
				let request = ThumbnailRequest { position, quality };
				assemble(path, self.extract(path, request))
			})
			.collect())
	}

	pub async fn generate_multiple_async(
		&self,
		path: impl AsRef<Path>,
		positions: Vec<f64>,
		quality_scale: u8,
	) -> Result<Vec<Option<PixelBuffer>>, Error> {
		ensure_initialized()?;
		QualityScale::new(quality_scale)?;

		let thumbnailer = self.clone();
		let path = path.as_ref().to_path_buf();

		spawn_blocking(move || thumbnailer.generate_multiple(path, &positions, quality_scale))
			.await?
	}

	/// [`Thumbnailer::generate`], timed with a monotonic clock.
	pub fn benchmark(
		&self,
		path: impl AsRef<Path>,
		position: f64,
		quality_scale: u8,
	) -> Result<BenchmarkReport, Error> {
		ensure_initialized()?;
		let quality = QualityScale::new(quality_scale)?;

		self.benchmark_with(path, ThumbnailRequest::new(position).with_quality(quality))
	}

	pub fn benchmark_with(
		&self,
		path: impl AsRef<Path>,
		request: ThumbnailRequest,
	) -> Result<BenchmarkReport, Error> {
		let start = Instant::now();
		let thumbnail = self.generate_with(path, request)?;
		let elapsed = start.elapsed();

		debug!(
			elapsed_ms = elapsed.as_millis(),
			hit = thumbnail.is_some(),
			"Benchmark run finished"
		);

		Ok(BenchmarkReport { thumbnail, elapsed })
	}

	#[instrument(
		skip_all,
		fields(path = %path.display(), position = request.position, quality = %request.quality)
	)]
	fn extract(&self, path: &Path, request: ThumbnailRequest) -> Result<PixelBuffer, Error> {
		let profile = request.quality.resolve();

		let mut decoder = FrameDecoder::open(path, &profile, self.builder.decoder_settings())?;
		let decoded = decoder.decode_at(request.position)?;

		debug!(frame_time = ?decoded.time, "Reached target frame");

		scale(
			&decoded,
			profile.dimension_fraction,
			profile.scaling_algorithm,
			self.builder.output_format,
		)
	}
}

/// Collapses extraction failures into an absent thumbnail.
fn assemble(path: &Path, result: Result<PixelBuffer, Error>) -> Option<PixelBuffer> {
	match result {
		Ok(buffer) => Some(buffer),
		Err(e @ Error::NotFound(_)) => {
			debug!(%e, "No thumbnail");
			None
		}
		Err(e) => {
			warn!(path = %path.display(), %e, "Failed to extract thumbnail");
			None
		}
	}
}

/// `ThumbnailerBuilder` holds the engine settings a [`Thumbnailer`] is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailerBuilder {
	max_decode_frames: u32,
	decoder_threads: usize,
	output_format: PixelFormat,
}

impl Default for ThumbnailerBuilder {
	fn default() -> Self {
		Self {
			max_decode_frames: DEFAULT_MAX_DECODE_FRAMES,
			decoder_threads: 0,
			output_format: PixelFormat::default(),
		}
	}
}

impl ThumbnailerBuilder {
	/// Creates a new `ThumbnailerBuilder` with default values:
	/// - `max_decode_frames`: 300
	/// - `decoder_threads`: 0, one per available core
	/// - `output_format`: RGBA
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Defaults overlaid with `FLASHTHUMB_DECODER_THREADS` and `FLASHTHUMB_MAX_DECODE_FRAMES`.
	/// Unparsable or out of range values are logged and ignored.
	#[must_use]
	pub fn from_env() -> Self {
		Self::new().overlay(
			env::var(DECODER_THREADS_ENV).ok().as_deref(),
			env::var(MAX_DECODE_FRAMES_ENV).ok().as_deref(),
		)
	}

	fn overlay(mut self, decoder_threads: Option<&str>, max_decode_frames: Option<&str>) -> Self {
		if let Some(raw) = decoder_threads {
			match raw.trim().parse() {
				Ok(threads) => self.decoder_threads = threads,
				Err(e) => warn!(env = DECODER_THREADS_ENV, %raw, %e, "Ignoring invalid value"),
			}
		}

		if let Some(raw) = max_decode_frames {
			match raw.trim().parse::<u32>() {
				Ok(frames) if frames > 0 => self.max_decode_frames = frames,
				_ => warn!(
					env = MAX_DECODE_FRAMES_ENV,
					%raw,
					"Ignoring invalid value, expected a positive integer"
				),
			}
		}

		self
	}

	/// Maximum frames decoded past the seek point before giving up, must be greater than zero
	pub fn max_decode_frames(mut self, max_decode_frames: u32) -> Result<Self, Error> {
		if max_decode_frames == 0 {
			return Err(Error::InvalidDecodeFrameLimit);
		}
		self.max_decode_frames = max_decode_frames;
		Ok(self)
	}

	/// Decoder threads per session, `0` picks one per available core
	#[must_use]
	pub const fn decoder_threads(mut self, decoder_threads: usize) -> Self {
		self.decoder_threads = decoder_threads;
		self
	}

	#[must_use]
	pub const fn output_format(mut self, output_format: PixelFormat) -> Self {
		self.output_format = output_format;
		self
	}

	const fn decoder_settings(&self) -> DecoderSettings {
		DecoderSettings {
			max_frames: self.max_decode_frames,
			threads: self.decoder_threads,
		}
	}

	/// Builds a `Thumbnailer`
	#[must_use]
	pub fn build(self) -> Thumbnailer {
		Thumbnailer { builder: self }
	}
}
