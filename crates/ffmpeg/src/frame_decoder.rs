use crate::{
	codec_ctx::FFmpegCodecContext,
	error::{Error, FFmpegError},
	format_ctx::{FFmpegFormatContext, VideoStream},
	packet::FFmpegPacket,
	quality::{FrameMatch, QualityProfile},
	seek::{seek, stream_ts_to_seconds},
	video_frame::{DecodedFrame, FFmpegFrame},
};

use std::{ffi::c_int, num::NonZeroUsize, path::Path, thread::available_parallelism};

use tracing::{debug, trace};

pub(crate) const DEFAULT_MAX_DECODE_FRAMES: u32 = 300;
/// Packets that may be read per decoded frame of budget before a stream counts as stuck.
const PACKETS_PER_FRAME_BUDGET: u32 = 8;
/// More threads than this stop paying off for a single frame and only cost setup time.
const MAX_DECODER_THREADS: usize = 16;
/// Timestamp slack for comparisons against the target, absorbs time base rounding.
const FRAME_TIME_EPSILON: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DecoderSettings {
	pub(crate) max_frames: u32,
	/// `0` lets the engine pick one thread per available core.
	pub(crate) threads: usize,
}

impl Default for DecoderSettings {
	fn default() -> Self {
		Self {
			max_frames: DEFAULT_MAX_DECODE_FRAMES,
			threads: 0,
		}
	}
}

impl DecoderSettings {
	fn thread_count(&self) -> c_int {
		let threads = if self.threads == 0 {
			available_parallelism().map_or(1, NonZeroUsize::get)
		} else {
			self.threads
		};

		c_int::try_from(threads.min(MAX_DECODER_THREADS)).unwrap_or(1)
	}

	const fn max_packets(&self) -> u32 {
		self.max_frames.saturating_mul(PACKETS_PER_FRAME_BUDGET)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Selection {
	Accept,
	/// The frame decoded just before the current one is closer to the target.
	AcceptPrevious,
	Skip,
}

/// Decides, frame by frame, when the forward decode has reached the target.
#[derive(Debug)]
pub(crate) struct FrameSelector {
	target: f64,
	rule: FrameMatch,
	previous: Option<f64>,
}

impl FrameSelector {
	pub(crate) const fn new(target: f64, rule: FrameMatch) -> Self {
		Self {
			target,
			rule,
			previous: None,
		}
	}

	/// `time` is the frame's presentation time in seconds, `None` when the stream carries no
	/// usable timestamps. Such frames can't be positioned and are taken as they come.
	pub(crate) fn offer(&mut self, time: Option<f64>) -> Selection {
		let Some(time) = time else {
			return Selection::Accept;
		};

		// Decoding from the start takes the first frame whatever its timestamp says
		let reached = self.target <= 0.0 || time + FRAME_TIME_EPSILON >= self.target;

		let selection = match self.rule {
			// Overshooting the target falls back to the last frame before it
			FrameMatch::Exact if reached => match self.previous {
				Some(_) if time > self.target + FRAME_TIME_EPSILON => Selection::AcceptPrevious,
				_ => Selection::Accept,
			},
			FrameMatch::Tolerance(tolerance)
				if reached || time + tolerance + FRAME_TIME_EPSILON >= self.target =>
			{
				Selection::Accept
			}
			FrameMatch::Nearest if reached => match self.previous {
				Some(previous) if self.target - previous < time - self.target => {
					Selection::AcceptPrevious
				}
				_ => Selection::Accept,
			},
			_ => Selection::Skip,
		};

		if selection == Selection::Skip {
			self.previous = Some(time);
		}

		selection
	}
}

/// One decode session: everything FFmpeg allocates for a single extraction.
///
/// Fields drop in declaration order, so frames and packets are released before the codec that
/// produced them and the codec before the container it reads from.
pub(crate) struct FrameDecoder {
	packet: FFmpegPacket,
	frame: FFmpegFrame,
	previous: FFmpegFrame,
	previous_time: Option<f64>,
	codec_ctx: FFmpegCodecContext,
	format_ctx: FFmpegFormatContext,
	stream: VideoStream,
	frame_match: FrameMatch,
	settings: DecoderSettings,
}

impl FrameDecoder {
	pub(crate) fn open(
		path: &Path,
		profile: &QualityProfile,
		settings: DecoderSettings,
	) -> Result<Self, Error> {
		let format_ctx = FFmpegFormatContext::open(path, profile.probe_budget)?;
		let stream = format_ctx.find_video_stream()?;

		let codec_params = format_ctx
			.codec_parameters(&stream)
			.ok_or(FFmpegError::NullError)?;

		let mut codec_ctx = FFmpegCodecContext::new(stream.codec)?;
		codec_ctx
			.parameters_to_context(codec_params)?
			.tune_for_thumbnail(settings.thread_count(), profile.decode_strategy)
			.open2(stream.codec)?;

		debug!(
			stream = stream.index,
			duration = ?format_ctx.duration(),
			width = codec_ctx.as_ref().width,
			height = codec_ctx.as_ref().height,
			threads = codec_ctx.as_ref().thread_count,
			"Opened decode session"
		);

		Ok(Self {
			packet: FFmpegPacket::new()?,
			frame: FFmpegFrame::new()?,
			previous: FFmpegFrame::new()?,
			previous_time: None,
			codec_ctx,
			format_ctx,
			stream,
			frame_match: profile.frame_match,
			settings,
		})
	}

	/// Seeks near `position` and decodes forward until the frame selection rule is satisfied.
	///
	/// Hitting the end of the stream first yields the last decoded frame, so positions equal to
	/// the duration still produce a thumbnail.
	pub(crate) fn decode_at(&mut self, position: f64) -> Result<DecodedFrame, Error> {
		let seek_point = seek(
			&mut self.format_ctx,
			&mut self.codec_ctx,
			&self.stream,
			position,
		)?;

		trace!(
			position = seek_point.target,
			timestamp = ?seek_point.timestamp,
			"Decoding forward"
		);

		let mut selector = FrameSelector::new(seek_point.target, self.frame_match);
		let mut frames = 0u32;
		let mut packets = 0u32;
		let mut pending_packet = false;
		let mut draining = false;

		loop {
			loop {
				match self.codec_ctx.receive_frame(&mut self.frame) {
					Ok(true) => {}
					Ok(false) => return self.take_previous(),
					Err(Error::Again) if draining => return self.take_previous(),
					Err(Error::Again) => break,
					Err(e) => return Err(e),
				}

				frames += 1;
				let time = self.frame_time();
				trace!(
					frame = frames,
					?time,
					key = self.frame.is_key_frame(),
					"Decoded frame"
				);

				match selector.offer(time) {
					Selection::Accept => return self.take_current(time),
					Selection::AcceptPrevious => return self.take_previous(),
					Selection::Skip => {
						self.frame.move_into(&mut self.previous);
						self.previous_time = time;
					}
				}

				if frames >= self.settings.max_frames {
					return Err(Error::DecodeLimitExceeded { frames, packets });
				}
			}

			if !pending_packet {
				if !self.read_packet_for_stream() {
					trace!(frames, packets, "End of stream, draining decoder");
					self.codec_ctx.send_packet(None)?;
					draining = true;
					continue;
				}

				packets += 1;
				if packets > self.settings.max_packets() {
					return Err(Error::DecodeLimitExceeded { frames, packets });
				}
			}

			match self.codec_ctx.send_packet(Some(&self.packet)) {
				Ok(_) => {
					pending_packet = false;
					self.packet.reset();
				}
				Err(Error::Again) => pending_packet = true,
				Err(Error::FFmpegWithReason(FFmpegError::InvalidData, _)) => {
					trace!(packet = packets, "Dropping corrupt packet");
					pending_packet = false;
					self.packet.reset();
				}
				Err(e) => return Err(e),
			}
		}
	}

	/// A demuxer error ends the stream the same way EOF does, whatever was decoded so far is
	/// still usable.
	fn read_packet_for_stream(&mut self) -> bool {
		loop {
			self.packet.reset();
			match self.format_ctx.read_frame(&mut self.packet) {
				Ok(true) if self.packet.stream_index() == self.stream.index => return true,
				Ok(true) => {}
				Ok(false) => return false,
				Err(e) => {
					debug!(?e, "Demuxer failed, treating as end of stream");
					return false;
				}
			}
		}
	}

	fn frame_time(&self) -> Option<f64> {
		self.frame.timestamp().and_then(|ts| {
			stream_ts_to_seconds(ts, self.stream.time_base, self.stream.start_time)
		})
	}

	fn take_current(&mut self, time: Option<f64>) -> Result<DecodedFrame, Error> {
		let mut frame = FFmpegFrame::new()?;
		self.frame.move_into(&mut frame);

		Ok(DecodedFrame { frame, time })
	}

	fn take_previous(&mut self) -> Result<DecodedFrame, Error> {
		if !self.previous.has_data() {
			return Err(Error::FrameDecodeError);
		}

		let mut frame = FFmpegFrame::new()?;
		self.previous.move_into(&mut frame);

		Ok(DecodedFrame {
			frame,
			time: self.previous_time.take(),
		})
	}
}
