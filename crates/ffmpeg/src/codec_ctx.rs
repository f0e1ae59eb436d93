use crate::{
	error::{Error, FFmpegError},
	packet::FFmpegPacket,
	quality::DecodeStrategy,
	utils::check_error,
	video_frame::FFmpegFrame,
};

use std::{
	ffi::c_int,
	ptr::{self, NonNull},
	sync::{Mutex, PoisonError},
};

use ffmpeg_sys_next::{
	avcodec_alloc_context3, avcodec_flush_buffers, avcodec_free_context, avcodec_open2,
	avcodec_parameters_to_context, avcodec_receive_frame, avcodec_send_packet, AVCodec,
	AVCodecContext, AVCodecParameters, AVDiscard, AVERROR, AVERROR_EOF,
	AV_CODEC_FLAG2_FAST, AV_CODEC_FLAG_LOW_DELAY, FF_THREAD_FRAME, FF_THREAD_SLICE,
};
use libc::EAGAIN;

/// Codec initialization is the one part of a decode session FFmpeg does not promise to be
/// thread safe for every codec, so it is serialized process-wide. Demuxing, decoding and scaling
/// run fully in parallel across sessions.
static CODEC_OPEN_LOCK: Mutex<()> = Mutex::new(());

pub(crate) struct FFmpegCodecContext(NonNull<AVCodecContext>);

impl FFmpegCodecContext {
	pub(crate) fn new(codec: &AVCodec) -> Result<Self, FFmpegError> {
		NonNull::new(unsafe { avcodec_alloc_context3(codec) })
			.map(Self)
			.ok_or(FFmpegError::VideoCodecAllocation)
	}

	pub(crate) fn as_ref(&self) -> &AVCodecContext {
		unsafe { self.0.as_ref() }
	}

	pub(crate) fn as_mut(&mut self) -> &mut AVCodecContext {
		unsafe { self.0.as_mut() }
	}

	pub(crate) fn parameters_to_context(
		&mut self,
		codec_params: &AVCodecParameters,
	) -> Result<&mut Self, Error> {
		check_error(
			unsafe { avcodec_parameters_to_context(self.0.as_ptr(), codec_params) },
			"Fail to fill the codec context with codec parameters",
		)?;

		Ok(self)
	}

	/// Speed policy for single frame extraction. Applied before [`Self::open2`].
	///
	/// Deblocking is skipped and non-reference frames are discarded: both only cost time for a
	/// still image. Frame and slice threading shorten the stretch between the keyframe and the
	/// target. Hardware decoding is never set up. `strategy` decides what else may be cut.
	pub(crate) fn tune_for_thumbnail(
		&mut self,
		threads: c_int,
		strategy: DecodeStrategy,
	) -> &mut Self {
		let ctx = self.as_mut();

		ctx.workaround_bugs = 1;
		ctx.skip_loop_filter = AVDiscard::AVDISCARD_ALL;
		ctx.skip_frame = AVDiscard::AVDISCARD_NONREF;
		ctx.thread_count = threads;
		ctx.thread_type = (FF_THREAD_FRAME | FF_THREAD_SLICE) as c_int;
		ctx.hw_device_ctx = ptr::null_mut();

		match strategy {
			DecodeStrategy::Aggressive => {
				ctx.flags |= AV_CODEC_FLAG_LOW_DELAY as c_int;
				ctx.flags2 |= AV_CODEC_FLAG2_FAST as c_int;
				ctx.skip_idct = AVDiscard::AVDISCARD_BIDIR;
			}
			DecodeStrategy::Balanced => {
				ctx.flags2 |= AV_CODEC_FLAG2_FAST as c_int;
				ctx.skip_idct = AVDiscard::AVDISCARD_DEFAULT;
			}
			DecodeStrategy::Careful => ctx.skip_idct = AVDiscard::AVDISCARD_DEFAULT,
		}

		self
	}

	pub(crate) fn open2(&mut self, codec: &AVCodec) -> Result<&mut Self, Error> {
		let _guard = CODEC_OPEN_LOCK
			.lock()
			.unwrap_or_else(PoisonError::into_inner);

		check_error(
			unsafe { avcodec_open2(self.0.as_ptr(), codec, ptr::null_mut()) },
			"Failed to open video codec",
		)?;

		Ok(self)
	}

	pub(crate) fn flush(&mut self) -> &mut Self {
		unsafe { avcodec_flush_buffers(self.0.as_ptr()) };

		self
	}

	/// Sends a packet to the decoder, or `None` to enter draining mode.
	///
	/// `Ok(false)` means the decoder was already drained, [`Error::Again`] that output has to be
	/// received before this packet can be accepted.
	pub(crate) fn send_packet(&mut self, packet: Option<&FFmpegPacket>) -> Result<bool, Error> {
		let packet = packet.map_or(ptr::null(), FFmpegPacket::as_ptr);

		match unsafe { avcodec_send_packet(self.0.as_ptr(), packet) } {
			AVERROR_EOF => Ok(false),
			ret if ret == AVERROR(EAGAIN) => Err(Error::Again),
			ret if ret < 0 => Err(Error::FFmpegWithReason(
				FFmpegError::from(ret),
				"Failed to send packet to decoder".to_string(),
			)),
			_ => Ok(true),
		}
	}

	/// `Ok(false)` once the decoder is fully drained, [`Error::Again`] when it needs more input.
	pub(crate) fn receive_frame(&mut self, frame: &mut FFmpegFrame) -> Result<bool, Error> {
		match unsafe { avcodec_receive_frame(self.0.as_ptr(), frame.as_mut_ptr()) } {
			AVERROR_EOF => Ok(false),
			ret if ret == AVERROR(EAGAIN) => Err(Error::Again),
			ret if ret < 0 => Err(Error::FFmpegWithReason(
				FFmpegError::from(ret),
				"Failed to receive frame from decoder".to_string(),
			)),
			_ => Ok(true),
		}
	}
}

impl Drop for FFmpegCodecContext {
	fn drop(&mut self) {
		let mut ptr = self.0.as_ptr();
		unsafe { avcodec_free_context(&mut ptr) };
	}
}

// SAFETY: the context is exclusively owned by one decode session and never shared
unsafe impl Send for FFmpegCodecContext {}

#[cfg(test)]
mod tests {
	use super::*;

	use ffmpeg_sys_next::{avcodec_find_decoder, AVCodecID, AVPixelFormat};

	fn rawvideo_decoder() -> &'static AVCodec {
		unsafe { avcodec_find_decoder(AVCodecID::AV_CODEC_ID_RAWVIDEO).as_ref() }
			.expect("rawvideo decoder is always built")
	}

	#[test]
	fn thumbnail_tuning_is_applied() {
		let mut ctx = FFmpegCodecContext::new(rawvideo_decoder()).unwrap();
		ctx.tune_for_thumbnail(4, DecodeStrategy::Balanced);

		let raw = ctx.as_ref();
		assert_eq!(raw.skip_loop_filter, AVDiscard::AVDISCARD_ALL);
		assert_eq!(raw.skip_frame, AVDiscard::AVDISCARD_NONREF);
		assert_eq!(raw.thread_count, 4);
		assert_eq!(
			raw.thread_type,
			(FF_THREAD_FRAME | FF_THREAD_SLICE) as c_int
		);
		assert_ne!(raw.flags2 & AV_CODEC_FLAG2_FAST as c_int, 0);
		assert_eq!(raw.flags & AV_CODEC_FLAG_LOW_DELAY as c_int, 0);
		assert_eq!(raw.skip_idct, AVDiscard::AVDISCARD_DEFAULT);
		assert!(raw.hw_device_ctx.is_null());
	}

	#[test]
	fn aggressive_tuning_skips_bidirectional_idct() {
		let mut ctx = FFmpegCodecContext::new(rawvideo_decoder()).unwrap();
		ctx.tune_for_thumbnail(2, DecodeStrategy::Aggressive);

		let raw = ctx.as_ref();
		assert_eq!(raw.skip_idct, AVDiscard::AVDISCARD_BIDIR);
		assert_ne!(raw.flags & AV_CODEC_FLAG_LOW_DELAY as c_int, 0);
		assert_ne!(raw.flags2 & AV_CODEC_FLAG2_FAST as c_int, 0);
		assert_eq!(raw.skip_frame, AVDiscard::AVDISCARD_NONREF);
		assert_eq!(raw.skip_loop_filter, AVDiscard::AVDISCARD_ALL);
	}

	#[test]
	fn careful_tuning_keeps_bit_exact_decoding() {
		let mut ctx = FFmpegCodecContext::new(rawvideo_decoder()).unwrap();
		ctx.tune_for_thumbnail(1, DecodeStrategy::Careful);

		let raw = ctx.as_ref();
		assert_eq!(raw.flags2 & AV_CODEC_FLAG2_FAST as c_int, 0);
		assert_eq!(raw.flags & AV_CODEC_FLAG_LOW_DELAY as c_int, 0);
		assert_eq!(raw.skip_idct, AVDiscard::AVDISCARD_DEFAULT);
		assert_eq!(raw.skip_frame, AVDiscard::AVDISCARD_NONREF);
	}

	#[test]
	fn opens_and_drains_an_idle_decoder() {
		let codec = rawvideo_decoder();
		let mut ctx = FFmpegCodecContext::new(codec).unwrap();
		{
			let raw = ctx.as_mut();
			raw.width = 16;
			raw.height = 16;
			raw.pix_fmt = AVPixelFormat::AV_PIX_FMT_RGB24;
		}
		ctx.tune_for_thumbnail(1, DecodeStrategy::Balanced).open2(codec).unwrap();

		let mut frame = FFmpegFrame::new().unwrap();
		assert!(matches!(ctx.receive_frame(&mut frame), Err(Error::Again)));

		assert!(ctx.send_packet(None).unwrap());
		assert!(!ctx.receive_frame(&mut frame).unwrap());
	}
}
