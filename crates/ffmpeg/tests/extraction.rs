use flashthumb_ffmpeg::{
	Error, PixelFormat, QualityPreset, QualityScale, QualitySelection, ThumbnailRequest,
	Thumbnailer, ThumbnailerBuilder,
};

use tempfile::tempdir;
use tracing_test::traced_test;

#[macro_use]
mod common;

use common::{init, sample_audio, sample_video};

fn assert_close(actual: u32, expected: u32) {
	assert!(
		actual.abs_diff(expected) <= 1,
		"expected {expected}±1, got {actual}"
	);
}

#[test]
#[traced_test]
fn quality_scale_sets_the_output_size() {
	init();
	let sample = sample_or_skip!(sample_video(1920, 1080, 2, 25));
	let thumbnailer = Thumbnailer::default();

	let full = thumbnailer.generate(&sample.path, 1.0, 10).unwrap().unwrap();
	assert_eq!(full.dimensions(), (1920, 1080));
	assert_eq!(full.format, PixelFormat::Rgba);
	assert_eq!(full.data.len(), 1920 * 1080 * 4);

	let half = thumbnailer.generate(&sample.path, 1.0, 5).unwrap().unwrap();
	assert_close(half.width, 960);
	assert_close(half.height, 540);

	let tenth = thumbnailer.generate(&sample.path, 1.0, 1).unwrap().unwrap();
	assert_close(tenth.width, 192);
	assert_close(tenth.height, 108);
}

#[test]
#[traced_test]
fn every_scale_is_proportional() {
	init();
	let sample = sample_or_skip!(sample_video(320, 240, 1, 25));
	let thumbnailer = Thumbnailer::default();

	for scale in 1..=10u8 {
		let thumbnail = thumbnailer
			.generate(&sample.path, 0.0, scale)
			.unwrap()
			.unwrap();

		assert_close(thumbnail.width, 32 * u32::from(scale));
		assert_close(thumbnail.height, 24 * u32::from(scale));
		assert_eq!(thumbnail.data.len(), thumbnail.stride() * thumbnail.height as usize);
	}
}

#[test]
fn out_of_range_quality_is_a_precondition_error() {
	init();
	let dir = tempdir().unwrap();
	let path = dir.path().join("whatever.mp4");
	let thumbnailer = Thumbnailer::default();

	for scale in [0, 11, u8::MAX] {
		for position in [0.0, 5.0, -1.0] {
			let err = thumbnailer.generate(&path, position, scale).unwrap_err();
			assert!(matches!(err, Error::InvalidQuality(s) if s == scale));
			assert!(err.is_precondition());
		}

		assert!(matches!(
			thumbnailer.generate_multiple(&path, &[0.0, 1.0], scale),
			Err(Error::InvalidQuality(_))
		));
		assert!(matches!(
			thumbnailer.benchmark(&path, 0.0, scale),
			Err(Error::InvalidQuality(_))
		));
	}
}

#[test]
#[traced_test]
fn missing_file_is_absent_not_an_error() {
	init();

	assert!(flashthumb_ffmpeg::generate("missing.mp4", 0.0, 10)
		.unwrap()
		.is_none());
}

#[test]
#[traced_test]
fn unreadable_and_audio_only_files_are_absent() {
	init();
	let dir = tempdir().unwrap();
	let garbage = dir.path().join("garbage.mp4");
	std::fs::write(&garbage, vec![0x42; 4096]).unwrap();

	assert!(flashthumb_ffmpeg::generate(&garbage, 0.0, 10)
		.unwrap()
		.is_none());

	let audio = sample_or_skip!(sample_audio());
	assert!(flashthumb_ffmpeg::generate(&audio.path, 0.0, 10)
		.unwrap()
		.is_none());
}

#[test]
#[traced_test]
fn batch_keeps_order_and_isolates_failures() {
	init();
	let sample = sample_or_skip!(sample_video(320, 240, 2, 25));

	let thumbnails =
		flashthumb_ffmpeg::generate_multiple(&sample.path, &[0.5, 3600.0, 1.5], 5).unwrap();

	assert_eq!(thumbnails.len(), 3);
	assert!(thumbnails[0].is_some());
	assert!(thumbnails[1].is_none());
	assert!(thumbnails[2].is_some());

	for thumbnail in thumbnails.iter().flatten() {
		assert_eq!(thumbnail.dimensions(), (160, 120));
	}

	assert!(flashthumb_ffmpeg::generate_multiple(&sample.path, &[], 5)
		.unwrap()
		.is_empty());
}

#[test]
#[traced_test]
fn repeated_calls_are_deterministic() {
	init();
	let sample = sample_or_skip!(sample_video(320, 240, 2, 25));
	let thumbnailer = Thumbnailer::default();

	let first = thumbnailer.generate(&sample.path, 1.2, 7).unwrap().unwrap();
	for _ in 0..3 {
		let again = thumbnailer.generate(&sample.path, 1.2, 7).unwrap().unwrap();
		assert_eq!(again.dimensions(), first.dimensions());
		assert_eq!(again.format, first.format);
	}
}

#[test]
#[traced_test]
fn positions_at_the_edges() {
	init();
	let sample = sample_or_skip!(sample_video(320, 240, 2, 25));
	let thumbnailer = Thumbnailer::default();

	// The end of the clip clamps to its last frame
	assert!(thumbnailer.generate(&sample.path, 2.0, 10).unwrap().is_some());
	assert!(thumbnailer.generate(&sample.path, 2.3, 10).unwrap().is_some());

	assert!(thumbnailer.generate(&sample.path, -1.0, 10).unwrap().is_none());
	assert!(thumbnailer
		.generate(&sample.path, f64::NAN, 10)
		.unwrap()
		.is_none());
	assert!(thumbnailer.generate(&sample.path, 60.0, 10).unwrap().is_none());
}

#[test]
#[traced_test]
fn presets_keep_the_decoded_size() {
	init();
	let sample = sample_or_skip!(sample_video(320, 240, 2, 25));
	let thumbnailer = Thumbnailer::default();

	for preset in [QualityPreset::Fast, QualityPreset::Normal, QualityPreset::Hq] {
		let thumbnail = thumbnailer
			.generate_with(&sample.path, ThumbnailRequest::new(1.0).with_quality(preset))
			.unwrap()
			.unwrap();

		assert_eq!(thumbnail.dimensions(), (320, 240), "preset {preset}");
	}

	let composed = QualitySelection::Composed {
		scale: QualityScale::new(5).unwrap(),
		preset: QualityPreset::Hq,
	};
	let thumbnail = thumbnailer
		.generate_with(&sample.path, ThumbnailRequest::new(1.0).with_quality(composed))
		.unwrap()
		.unwrap();
	assert_eq!(thumbnail.dimensions(), (160, 120));
}

#[test]
#[traced_test]
fn output_format_is_configurable() {
	init();
	let sample = sample_or_skip!(sample_video(320, 240, 1, 25));

	for (format, bytes_per_pixel) in [(PixelFormat::Bgra, 4), (PixelFormat::Rgb24, 3)] {
		let thumbnail = ThumbnailerBuilder::new()
			.output_format(format)
			.build()
			.generate(&sample.path, 0.0, 2)
			.unwrap()
			.unwrap();

		assert_eq!(thumbnail.format, format);
		assert_eq!(thumbnail.dimensions(), (64, 48));
		assert_eq!(thumbnail.data.len(), 64 * 48 * bytes_per_pixel);
	}
}

#[test]
#[traced_test]
fn decode_limit_gives_up_far_from_a_keyframe() {
	init();
	// A single keyframe at the very start, every later position needs a long forward decode
	let sample = sample_or_skip!(sample_video(320, 240, 3, 250));

	// Frame threading delays output by a frame per thread, pin a single one
	let impatient = ThumbnailerBuilder::new()
		.decoder_threads(1)
		.max_decode_frames(2)
		.unwrap()
		.build();

	assert!(impatient.generate(&sample.path, 0.0, 10).unwrap().is_some());
	assert!(impatient.generate(&sample.path, 2.5, 10).unwrap().is_none());

	assert!(Thumbnailer::default()
		.generate(&sample.path, 2.5, 10)
		.unwrap()
		.is_some());
}

#[tokio::test]
#[traced_test]
async fn async_variants_match_blocking_ones() {
	init();
	let sample = sample_or_skip!(sample_video(320, 240, 2, 25));
	let thumbnailer = Thumbnailer::default();

	let blocking = thumbnailer.generate(&sample.path, 1.0, 5).unwrap().unwrap();
	let non_blocking = thumbnailer
		.generate_async(&sample.path, 1.0, 5)
		.await
		.unwrap()
		.unwrap();
	assert_eq!(blocking.dimensions(), non_blocking.dimensions());

	let batch = flashthumb_ffmpeg::generate_multiple_async(&sample.path, vec![0.0, 99.0], 5)
		.await
		.unwrap();
	assert_eq!(batch.len(), 2);
	assert!(batch[0].is_some());
	assert!(batch[1].is_none());

	assert!(matches!(
		thumbnailer.generate_async(&sample.path, 0.0, 0).await,
		Err(Error::InvalidQuality(0))
	));
}

#[tokio::test(flavor = "multi_thread")]
#[traced_test]
async fn concurrent_sessions_are_independent() {
	init();
	let sample = sample_or_skip!(sample_video(320, 240, 2, 25));
	let thumbnailer = Thumbnailer::default();

	let handles = (1..=8u8)
		.map(|scale| {
			let thumbnailer = thumbnailer.clone();
			let path = sample.path.clone();
			tokio::spawn(async move {
				thumbnailer
					.generate_async(path, f64::from(scale) / 5.0, scale)
					.await
					.map(|thumbnail| (scale, thumbnail))
			})
		})
		.collect::<Vec<_>>();

	for handle in handles {
		let (scale, thumbnail) = handle.await.unwrap().unwrap();
		let thumbnail = thumbnail.unwrap();
		assert_close(thumbnail.width, 32 * u32::from(scale));
	}
}

#[test]
#[traced_test]
fn benchmark_reports_elapsed_time() {
	init();
	let sample = sample_or_skip!(sample_video(320, 240, 1, 25));

	let report = flashthumb_ffmpeg::benchmark(&sample.path, 0.5, 10).unwrap();
	assert!(report.thumbnail.is_some());
	assert_eq!(report.elapsed_millis(), report.elapsed.as_millis());

	let miss = flashthumb_ffmpeg::benchmark("missing.mp4", 0.0, 10).unwrap();
	assert!(miss.thumbnail.is_none());
}
