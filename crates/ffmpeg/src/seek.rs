use crate::{
	codec_ctx::FFmpegCodecContext,
	error::Error,
	format_ctx::{FFmpegFormatContext, VideoStream},
};

use std::ffi::c_int;

use ffmpeg_sys_next::{AVRational, AVSEEK_FLAG_BACKWARD};
use tracing::trace;

/// How far past the container duration a position may be and still count as "the end".
/// Containers often round their duration down to the last packet's timestamp.
const DURATION_TOLERANCE_SECS: f64 = 0.5;

/// Where the forward decode starts from and what it is looking for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SeekPoint {
	/// Requested presentation time, in seconds from the stream start.
	pub(crate) target: f64,
	/// Timestamp handed to the demuxer, in stream time base. `None` when decoding from the start.
	pub(crate) timestamp: Option<i64>,
}

/// Validates a requested position against the media duration.
pub(crate) fn plan_target(position: f64, duration: Option<f64>) -> Result<f64, Error> {
	if !position.is_finite() || position < 0.0 {
		return Err(Error::InvalidPosition(position));
	}

	if let Some(duration) = duration {
		if position > duration + DURATION_TOLERANCE_SECS {
			return Err(Error::BeyondDuration { position, duration });
		}
	}

	Ok(position)
}

pub(crate) fn seconds_to_stream_ts(seconds: f64, time_base: AVRational, start_time: i64) -> i64 {
	if time_base.num <= 0 || time_base.den <= 0 {
		return start_time;
	}

	// Saturating float to int conversion, positions are validated as finite beforehand
	#[allow(clippy::cast_possible_truncation)]
	let offset = (seconds * f64::from(time_base.den) / f64::from(time_base.num)).round() as i64;

	start_time.saturating_add(offset)
}

pub(crate) fn stream_ts_to_seconds(ts: i64, time_base: AVRational, start_time: i64) -> Option<f64> {
	if time_base.num <= 0 || time_base.den <= 0 {
		return None;
	}

	#[allow(clippy::cast_precision_loss)]
	let relative = ts.saturating_sub(start_time) as f64;

	Some(relative * f64::from(time_base.num) / f64::from(time_base.den))
}

/// Coarse seek to the closest keyframe at or before `position`.
///
/// Frame accurate positioning is left to the forward decode. Position `0` never touches the
/// demuxer, so streams that can't seek still produce their first frame.
pub(crate) fn seek(
	format_ctx: &mut FFmpegFormatContext,
	codec_ctx: &mut FFmpegCodecContext,
	stream: &VideoStream,
	position: f64,
) -> Result<SeekPoint, Error> {
	let target = plan_target(position, format_ctx.duration())?;

	if target == 0.0 {
		return Ok(SeekPoint {
			target,
			timestamp: None,
		});
	}

	let timestamp = seconds_to_stream_ts(target, stream.time_base, stream.start_time);
	trace!(position = target, timestamp, stream = stream.index, "Seeking");

	format_ctx
		.seek_frame(stream.index, timestamp, AVSEEK_FLAG_BACKWARD as c_int)
		.map_err(|source| Error::Seek {
			position: target,
			source,
		})?;

	codec_ctx.flush();

	Ok(SeekPoint {
		target,
		timestamp: Some(timestamp),
	})
}
