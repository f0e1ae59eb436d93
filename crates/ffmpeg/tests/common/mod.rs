#![allow(dead_code)]

use flashthumb_ffmpeg::{initialize, HostContext};

mod media;

pub use media::{sample_audio, sample_video, Sample};

/// Bails out of the current test when the `ffmpeg` CLI can't produce sample media.
macro_rules! sample_or_skip {
	($sample:expr) => {
		match $sample {
			Some(sample) => sample,
			None => {
				eprintln!("ffmpeg CLI unavailable, skipping test");
				return;
			}
		}
	};
}

pub fn init() {
	initialize(&HostContext::new());
}
