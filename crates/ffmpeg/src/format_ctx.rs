use crate::{
	dict::FFmpegDictionary,
	error::{Error, FFmpegError},
	packet::FFmpegPacket,
	quality::ProbeBudget,
	utils::{check_error, from_path, is_url},
};

use std::{
	ffi::{c_int, CStr},
	path::Path,
	ptr::{self, NonNull},
};

use ffmpeg_sys_next::{
	av_read_frame, av_seek_frame, avcodec_find_decoder, avformat_close_input,
	avformat_find_stream_info, avformat_open_input, AVCodec, AVCodecParameters, AVFormatContext,
	AVMediaType, AVRational, AVStream, AVERROR_EOF, AV_DISPOSITION_ATTACHED_PIC, AV_NOPTS_VALUE,
	AV_TIME_BASE,
};
use tracing::{debug, trace};

/// The video stream a session decodes from.
#[derive(Clone, Copy)]
pub(crate) struct VideoStream {
	pub(crate) index: c_int,
	pub(crate) time_base: AVRational,
	/// Stream start in `time_base` units, `0` when the container doesn't say.
	pub(crate) start_time: i64,
	pub(crate) codec: &'static AVCodec,
}

#[derive(Debug)]
pub(crate) struct FFmpegFormatContext(NonNull<AVFormatContext>);

impl FFmpegFormatContext {
	/// Opens `path` with a demuxer probing budget and reads stream information.
	pub(crate) fn open(path: &Path, budget: ProbeBudget) -> Result<Self, Error> {
		if !is_url(path) && !path.exists() {
			return Err(Error::NotFound(path.into()));
		}

		let filename = from_path(path)?;

		let mut options = FFmpegDictionary::new();
		options.set(c"probesize", budget.probe_size())?;
		options.set(c"analyzeduration", budget.analyze_duration())?;

		let mut format_ctx = Self::open_file(&filename, &mut options).map_err(|e| {
			Error::Unreadable {
				path: path.into(),
				source: e,
			}
		})?;

		if options.len() > 0 {
			debug!(
				ignored = ?(&options).into_iter().collect::<Vec<_>>(),
				"Demuxer ignored some options"
			);
		}

		format_ctx
			.find_stream_info()
			.map_err(|e| Error::Unreadable {
				path: path.into(),
				source: e,
			})?;

		Ok(format_ctx)
	}

	fn open_file(filename: &CStr, options: &mut FFmpegDictionary) -> Result<Self, FFmpegError> {
		let mut data = ptr::null_mut();

		// On failure FFmpeg frees the context it allocated and nulls `data`
		let ret = unsafe {
			avformat_open_input(
				&mut data,
				filename.as_ptr(),
				ptr::null(),
				options.as_mut_ptr(),
			)
		};
		if ret < 0 {
			return Err(FFmpegError::from(ret));
		}

		NonNull::new(data)
			.map(Self)
			.ok_or(FFmpegError::FormatContextAllocation)
	}

	fn find_stream_info(&mut self) -> Result<(), FFmpegError> {
		match unsafe { avformat_find_stream_info(self.as_mut_ptr(), ptr::null_mut()) } {
			ret if ret < 0 => Err(FFmpegError::from(ret)),
			_ => Ok(()),
		}
	}

	pub(crate) fn as_ref(&self) -> &AVFormatContext {
		unsafe { self.0.as_ref() }
	}

	pub(crate) fn as_mut_ptr(&mut self) -> *mut AVFormatContext {
		self.0.as_ptr()
	}

	fn streams(&self) -> impl Iterator<Item = &AVStream> {
		let ctx = self.as_ref();
		let streams = ctx.streams;
		(0..ctx.nb_streams as usize)
			.filter_map(move |idx| unsafe { (*streams.add(idx)).as_ref() })
	}

	/// First video stream that has a decoder available, skipping cover art.
	pub(crate) fn find_video_stream(&self) -> Result<VideoStream, Error> {
		self.streams()
			.find_map(|stream| {
				let codecpar = unsafe { stream.codecpar.as_ref() }?;
				if codecpar.codec_type != AVMediaType::AVMEDIA_TYPE_VIDEO
					|| stream.disposition & AV_DISPOSITION_ATTACHED_PIC as c_int != 0
				{
					return None;
				}

				let Some(codec) = (unsafe { avcodec_find_decoder(codecpar.codec_id).as_ref() })
				else {
					trace!(index = stream.index, codec_id = ?codecpar.codec_id, "No decoder for stream");
					return None;
				};

				Some(VideoStream {
					index: stream.index,
					time_base: stream.time_base,
					start_time: if stream.start_time == AV_NOPTS_VALUE {
						0
					} else {
						stream.start_time
					},
					codec,
				})
			})
			.ok_or(Error::NoVideoStream)
	}

	pub(crate) fn codec_parameters(&self, stream: &VideoStream) -> Option<&AVCodecParameters> {
		self.streams()
			.find(|candidate| candidate.index == stream.index)
			.and_then(|candidate| unsafe { candidate.codecpar.as_ref() })
	}

	/// Container duration in seconds, when the demuxer knows it.
	pub(crate) fn duration(&self) -> Option<f64> {
		let duration = self.as_ref().duration;
		// Lossy only beyond 2^53 microseconds, which is a couple hundred years of media
		#[allow(clippy::cast_precision_loss)]
		(duration != AV_NOPTS_VALUE && duration > 0)
			.then(|| duration as f64 / f64::from(AV_TIME_BASE))
	}

	pub(crate) fn seek_frame(
		&mut self,
		stream_index: c_int,
		timestamp: i64,
		flags: c_int,
	) -> Result<(), FFmpegError> {
		match unsafe { av_seek_frame(self.as_mut_ptr(), stream_index, timestamp, flags) } {
			ret if ret < 0 => Err(FFmpegError::from(ret)),
			_ => Ok(()),
		}
	}

	/// Reads the next packet of any stream, `Ok(false)` at end of input.
	pub(crate) fn read_frame(&mut self, packet: &mut FFmpegPacket) -> Result<bool, Error> {
		match unsafe { av_read_frame(self.as_mut_ptr(), packet.as_mut_ptr()) } {
			AVERROR_EOF => Ok(false),
			ret => check_error(ret, "Failed to read packet").map(|_| true),
		}
	}
}

impl Drop for FFmpegFormatContext {
	fn drop(&mut self) {
		let mut ptr = self.0.as_ptr();
		unsafe { avformat_close_input(&mut ptr) };
	}
}

// SAFETY: the context is exclusively owned by one decode session and never shared
unsafe impl Send for FFmpegFormatContext {}
