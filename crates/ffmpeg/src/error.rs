use std::{ffi::c_int, num::TryFromIntError, path::Path};

use ffmpeg_sys_next::{
	AVERROR_BSF_NOT_FOUND, AVERROR_BUFFER_TOO_SMALL, AVERROR_BUG, AVERROR_BUG2,
	AVERROR_DECODER_NOT_FOUND, AVERROR_DEMUXER_NOT_FOUND, AVERROR_ENCODER_NOT_FOUND, AVERROR_EOF,
	AVERROR_EXIT, AVERROR_EXTERNAL, AVERROR_FILTER_NOT_FOUND, AVERROR_HTTP_BAD_REQUEST,
	AVERROR_HTTP_FORBIDDEN, AVERROR_HTTP_NOT_FOUND, AVERROR_HTTP_OTHER_4XX,
	AVERROR_HTTP_SERVER_ERROR, AVERROR_HTTP_UNAUTHORIZED, AVERROR_INVALIDDATA,
	AVERROR_MUXER_NOT_FOUND, AVERROR_OPTION_NOT_FOUND, AVERROR_PATCHWELCOME,
	AVERROR_PROTOCOL_NOT_FOUND, AVERROR_STREAM_NOT_FOUND, AVERROR_UNKNOWN, AVUNERROR,
};
use thiserror::Error;
use tokio::task::JoinError;

/// Error type for the library.
///
/// Only [`Error::NotInitialized`] and [`Error::InvalidQuality`] (see [`Error::is_precondition`])
/// ever reach callers of the `generate*` family; everything else describes why a single
/// extraction missed and is collapsed into an absent thumbnail.
#[derive(Error, Debug)]
pub enum Error {
	#[error("thumbnailer is not initialized, call `flashthumb_ffmpeg::initialize` first")]
	NotInitialized,
	#[error("received an invalid quality scale, expected range [1, 10], received: {0}")]
	InvalidQuality(u8),
	#[error("received an invalid decode frame limit, it must be greater than zero")]
	InvalidDecodeFrameLimit,

	#[error("media resource not found: <path='{}'>", .0.display())]
	NotFound(Box<Path>),
	#[error("media resource is unreadable: <path='{}'>; {source}", .path.display())]
	Unreadable {
		path: Box<Path>,
		#[source]
		source: FFmpegError,
	},
	#[error("media resource has no decodable video stream")]
	NoVideoStream,
	#[error("Path conversion error: Path: {0:#?}")]
	PathConversion(Box<Path>),

	#[error("received an invalid position: {0}")]
	InvalidPosition(f64),
	#[error("position {position}s is beyond the media duration of {duration}s")]
	BeyondDuration { position: f64, duration: f64 },
	#[error("failed to seek to {position}s: {source}")]
	Seek {
		position: f64,
		#[source]
		source: FFmpegError,
	},

	#[error("Failed to decode video frame")]
	FrameDecodeError,
	#[error("gave up after decoding {frames} frames from {packets} packets without reaching the target")]
	DecodeLimitExceeded { frames: u32, packets: u32 },
	#[error("the decoder needs more input before producing output")]
	Again,

	#[error("FFmpeg internal error: {0}")]
	FFmpeg(#[from] FFmpegError),
	#[error("FFmpeg internal error: {0}; Reason: {1}")]
	FFmpegWithReason(FFmpegError, String),
	#[error("error while converting integers: {0}")]
	TryFromInt(#[from] TryFromIntError),
	#[error("Background task failed: {0}")]
	BackgroundTaskFailed(#[from] JoinError),
}

impl Error {
	/// Precondition failures signal a programming error on the caller side and are always
	/// propagated, never collapsed into a missing thumbnail.
	#[must_use]
	pub const fn is_precondition(&self) -> bool {
		matches!(self, Self::NotInitialized | Self::InvalidQuality(_))
	}
}

/// Enum to represent possible errors from FFmpeg library
///
/// Extracted from https://ffmpeg.org/doxygen/trunk/group__lavu__error.html
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FFmpegError {
	#[error("Bitstream filter not found")]
	BitstreamFilterNotFound,
	#[error("Internal bug, also see AVERROR_BUG2")]
	InternalBug,
	#[error("Buffer too small")]
	BufferTooSmall,
	#[error("Decoder not found")]
	DecoderNotFound,
	#[error("Demuxer not found")]
	DemuxerNotFound,
	#[error("Encoder not found")]
	EncoderNotFound,
	#[error("End of file")]
	Eof,
	#[error("Immediate exit was requested; the called function should not be restarted")]
	Exit,
	#[error("Generic error in an external library")]
	External,
	#[error("Filter not found")]
	FilterNotFound,
	#[error("Invalid data found when processing input")]
	InvalidData,
	#[error("Muxer not found")]
	MuxerNotFound,
	#[error("Option not found")]
	OptionNotFound,
	#[error("Not yet implemented in FFmpeg, patches welcome")]
	NotImplemented,
	#[error("Protocol not found")]
	ProtocolNotFound,
	#[error("Stream not found")]
	StreamNotFound,
	#[error("This is semantically identical to AVERROR_BUG it has been introduced in Libav after our AVERROR_BUG and with a modified value")]
	InternalBug2,
	#[error("Unknown error, typically from an external library")]
	Unknown,
	#[error("HTTP Bad Request: 400")]
	HttpBadRequest,
	#[error("HTTP Unauthorized: 401")]
	HttpUnauthorized,
	#[error("HTTP Forbidden: 403")]
	HttpForbidden,
	#[error("HTTP Not Found: 404")]
	HttpNotFound,
	#[error("Other HTTP error: 4xx")]
	HttpOther4xx,
	#[error("HTTP Internal Server Error: 500")]
	HttpServerError,
	#[error("Other OS error, errno = {0}")]
	OtherOSError(c_int),
	#[error("Frame allocation error")]
	FrameAllocation,
	#[error("Packet allocation error")]
	PacketAllocation,
	#[error("Video Codec allocation error")]
	VideoCodecAllocation,
	#[error("Scaler context allocation error")]
	ScalerAllocation,
	#[error("Format context allocation error")]
	FormatContextAllocation,
	#[error("Received a null pointer from FFmpeg")]
	NullError,
}

impl From<c_int> for FFmpegError {
	fn from(code: c_int) -> Self {
		match code {
			AVERROR_BSF_NOT_FOUND => Self::BitstreamFilterNotFound,
			AVERROR_BUG => Self::InternalBug,
			AVERROR_BUFFER_TOO_SMALL => Self::BufferTooSmall,
			AVERROR_DECODER_NOT_FOUND => Self::DecoderNotFound,
			AVERROR_DEMUXER_NOT_FOUND => Self::DemuxerNotFound,
			AVERROR_ENCODER_NOT_FOUND => Self::EncoderNotFound,
			AVERROR_EOF => Self::Eof,
			AVERROR_EXIT => Self::Exit,
			AVERROR_EXTERNAL => Self::External,
			AVERROR_FILTER_NOT_FOUND => Self::FilterNotFound,
			AVERROR_INVALIDDATA => Self::InvalidData,
			AVERROR_MUXER_NOT_FOUND => Self::MuxerNotFound,
			AVERROR_OPTION_NOT_FOUND => Self::OptionNotFound,
			AVERROR_PATCHWELCOME => Self::NotImplemented,
			AVERROR_PROTOCOL_NOT_FOUND => Self::ProtocolNotFound,
			AVERROR_STREAM_NOT_FOUND => Self::StreamNotFound,
			AVERROR_BUG2 => Self::InternalBug2,
			AVERROR_UNKNOWN => Self::Unknown,
			AVERROR_HTTP_BAD_REQUEST => Self::HttpBadRequest,
			AVERROR_HTTP_UNAUTHORIZED => Self::HttpUnauthorized,
			AVERROR_HTTP_FORBIDDEN => Self::HttpForbidden,
			AVERROR_HTTP_NOT_FOUND => Self::HttpNotFound,
			AVERROR_HTTP_OTHER_4XX => Self::HttpOther4xx,
			AVERROR_HTTP_SERVER_ERROR => Self::HttpServerError,
			other => Self::OtherOSError(AVUNERROR(other)),
		}
	}
}
