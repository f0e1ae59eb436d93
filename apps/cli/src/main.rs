use flashthumb_ffmpeg::{
	initialize, FFmpegLogLevel, HostContext, PixelBuffer, QualityPreset, QualityScale,
	QualitySelection, ThumbnailRequest, Thumbnailer, ThumbnailerBuilder,
};

use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::task::spawn_blocking;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod output;

use output::Encoding;

#[derive(Parser, Debug)]
#[command(name = "flashthumb", version, about = "Fast video thumbnails")]
struct Cli {
	/// Decoder threads per extraction, 0 picks one per core
	#[arg(long, global = true, env = flashthumb_ffmpeg::DECODER_THREADS_ENV)]
	threads: Option<usize>,

	/// Frames decoded past the seek point before giving up
	#[arg(long, global = true, env = flashthumb_ffmpeg::MAX_DECODE_FRAMES_ENV)]
	max_decode_frames: Option<u32>,

	/// How chatty FFmpeg itself is on stderr
	#[arg(long, global = true, value_enum, default_value = "error")]
	ffmpeg_log_level: LogLevelArg,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Extract a single thumbnail
	Generate {
		input: PathBuf,
		/// Output file, the extension picks the encoding (webp, png, jpg, ...)
		#[arg(short, long)]
		output: PathBuf,
		#[arg(short, long, default_value_t = 0.0)]
		position: f64,
		#[command(flatten)]
		quality: QualityArgs,
		#[command(flatten)]
		encoding: EncodingArgs,
	},
	/// Extract one thumbnail per position into a directory
	Batch {
		input: PathBuf,
		/// Comma separated positions in seconds
		#[arg(short, long, value_delimiter = ',', required = true)]
		positions: Vec<f64>,
		#[arg(short, long)]
		out_dir: PathBuf,
		/// Extension of the written files
		#[arg(long, default_value = "webp")]
		extension: String,
		#[command(flatten)]
		quality: QualityArgs,
		#[command(flatten)]
		encoding: EncodingArgs,
	},
	/// Time repeated extractions of the same frame
	Benchmark {
		input: PathBuf,
		#[arg(short, long, default_value_t = 0.0)]
		position: f64,
		#[arg(short, long, default_value_t = 10)]
		runs: u32,
		#[command(flatten)]
		quality: QualityArgs,
	},
}

#[derive(Args, Debug, Clone, Copy)]
struct QualityArgs {
	/// Thumbnail size in tenths of the video size, 1 to 10
	#[arg(short, long)]
	quality: Option<u8>,
	/// Speed and accuracy trade-off, keeps the full size unless --quality is also given
	#[arg(long, value_enum)]
	preset: Option<PresetArg>,
}

impl QualityArgs {
	fn selection(self) -> Result<QualitySelection> {
		let scale = self
			.quality
			.map(QualityScale::new)
			.transpose()
			.context("invalid --quality")?;

		Ok(match (scale, self.preset.map(QualityPreset::from)) {
			(Some(scale), Some(preset)) => QualitySelection::Composed { scale, preset },
			(None, Some(preset)) => QualitySelection::Preset(preset),
			(Some(scale), None) => QualitySelection::Scale(scale),
			(None, None) => QualitySelection::default(),
		})
	}
}

#[derive(Args, Debug, Clone, Copy)]
struct EncodingArgs {
	/// WebP encoder quality, 0 to 100
	#[arg(long, default_value_t = 80, value_parser = clap::value_parser!(u8).range(0..=100))]
	webp_quality: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PresetArg {
	Fast,
	Normal,
	Hq,
}

impl From<PresetArg> for QualityPreset {
	fn from(preset: PresetArg) -> Self {
		match preset {
			PresetArg::Fast => Self::Fast,
			PresetArg::Normal => Self::Normal,
			PresetArg::Hq => Self::Hq,
		}
	}
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevelArg {
	Quiet,
	Error,
	Warning,
	Info,
	Debug,
}

impl From<LogLevelArg> for FFmpegLogLevel {
	fn from(level: LogLevelArg) -> Self {
		match level {
			LogLevelArg::Quiet => Self::Quiet,
			LogLevelArg::Error => Self::Error,
			LogLevelArg::Warning => Self::Warning,
			LogLevelArg::Info => Self::Info,
			LogLevelArg::Debug => Self::Debug,
		}
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
		)
		.with_writer(std::io::stderr)
		.init();

	let cli = Cli::parse();

	initialize(&HostContext::new().with_ffmpeg_log_level(cli.ffmpeg_log_level.into()));

	let thumbnailer = build_thumbnailer(cli.threads, cli.max_decode_frames)?;

	match cli.command {
		Commands::Generate {
			input,
			output,
			position,
			quality,
			encoding,
		} => {
			let encoding = Encoding::from_path(&output, encoding.webp_quality)?;
			let request = ThumbnailRequest::new(position).with_quality(quality.selection()?);

			let thumbnail = extract(&thumbnailer, &input, request)
				.await?
				.with_context(|| {
					format!(
						"no thumbnail could be extracted from {} at {position}s",
						input.display()
					)
				})?;

			output::write(&thumbnail, &output, encoding).await?;
			info!(
				output = %output.display(),
				width = thumbnail.width,
				height = thumbnail.height,
				"Thumbnail written"
			);
		}

		Commands::Batch {
			input,
			positions,
			out_dir,
			extension,
			quality,
			encoding,
		} => {
			let encoding =
				Encoding::from_path(Path::new(&format!("x.{extension}")), encoding.webp_quality)?;
			let selection = quality.selection()?;

			tokio::fs::create_dir_all(&out_dir)
				.await
				.with_context(|| format!("failed to create {}", out_dir.display()))?;

			let thumbnails = {
				let thumbnailer = thumbnailer.clone();
				let input = input.clone();
				let positions = positions.clone();
				spawn_blocking(move || {
					thumbnailer.generate_multiple_with(&input, &positions, selection)
				})
				.await??
			};

			let mut written = 0;
			for (idx, (position, thumbnail)) in positions.iter().zip(thumbnails).enumerate() {
				let Some(thumbnail) = thumbnail else {
					warn!(position, "No thumbnail at this position");
					continue;
				};

				let path = out_dir.join(format!("{idx:03}.{}", encoding.extension()));
				output::write(&thumbnail, &path, encoding).await?;
				debug!(position, path = %path.display(), "Thumbnail written");
				written += 1;
			}

			info!(written, requested = positions.len(), "Batch finished");
			ensure!(written > 0, "no thumbnail could be extracted from {}", input.display());
		}

		Commands::Benchmark {
			input,
			position,
			runs,
			quality,
		} => {
			ensure!(runs > 0, "--runs must be greater than zero");
			let request = ThumbnailRequest::new(position).with_quality(quality.selection()?);

			let timings = spawn_blocking(move || {
				(0..runs)
					.map(|_| {
						thumbnailer.benchmark_with(&input, request).map(|report| {
							(report.elapsed_millis(), report.thumbnail.is_some())
						})
					})
					.collect::<Result<Vec<_>, _>>()
			})
			.await??;

			if timings.iter().all(|&(_, hit)| !hit) {
				bail!("no thumbnail could be extracted, nothing to benchmark");
			}

			let millis = timings.iter().map(|&(ms, _)| ms).collect::<Vec<_>>();
			let min = millis.iter().min().copied().unwrap_or_default();
			let max = millis.iter().max().copied().unwrap_or_default();
			let avg = millis.iter().sum::<u128>() / millis.len() as u128;

			println!("runs: {runs}  min: {min} ms  avg: {avg} ms  max: {max} ms");
		}
	}

	Ok(())
}

fn build_thumbnailer(threads: Option<usize>, max_decode_frames: Option<u32>) -> Result<Thumbnailer> {
	let mut builder = ThumbnailerBuilder::new();

	if let Some(threads) = threads {
		builder = builder.decoder_threads(threads);
	}

	if let Some(frames) = max_decode_frames {
		builder = builder.max_decode_frames(frames)?;
	}

	Ok(builder.build())
}

async fn extract(
	thumbnailer: &Thumbnailer,
	input: &Path,
	request: ThumbnailRequest,
) -> Result<Option<PixelBuffer>> {
	let thumbnailer = thumbnailer.clone();
	let input = input.to_path_buf();

	Ok(spawn_blocking(move || thumbnailer.generate_with(input, request)).await??)
}
