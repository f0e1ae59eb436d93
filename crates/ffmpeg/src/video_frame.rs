use crate::error::FFmpegError;

use std::{ffi::c_int, mem, ptr::NonNull};

use ffmpeg_sys_next::{
	av_frame_alloc, av_frame_free, av_frame_move_ref, av_frame_unref, AVFrame, AVPixelFormat,
	AV_FRAME_FLAG_KEY, AV_NOPTS_VALUE,
};

/// Pixel layout of a [`PixelBuffer`]. Every layout is packed, 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
	#[default]
	Rgba,
	/// Byte order expected by little-endian ARGB surfaces (Android `ARGB_8888`, Windows DIBs).
	Bgra,
	Rgb24,
}

impl PixelFormat {
	#[must_use]
	pub const fn bytes_per_pixel(self) -> usize {
		match self {
			Self::Rgba | Self::Bgra => 4,
			Self::Rgb24 => 3,
		}
	}

	pub(crate) const fn as_av_pixel_format(self) -> AVPixelFormat {
		match self {
			Self::Rgba => AVPixelFormat::AV_PIX_FMT_RGBA,
			Self::Bgra => AVPixelFormat::AV_PIX_FMT_BGRA,
			Self::Rgb24 => AVPixelFormat::AV_PIX_FMT_RGB24,
		}
	}
}

/// A scaled thumbnail, tightly packed (`stride == width * bytes_per_pixel`).
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
	pub width: u32,
	pub height: u32,
	pub format: PixelFormat,
	pub data: Vec<u8>,
}

impl PixelBuffer {
	#[must_use]
	pub const fn stride(&self) -> usize {
		self.width as usize * self.format.bytes_per_pixel()
	}

	#[must_use]
	pub const fn dimensions(&self) -> (u32, u32) {
		(self.width, self.height)
	}
}

impl std::fmt::Debug for PixelBuffer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PixelBuffer")
			.field("width", &self.width)
			.field("height", &self.height)
			.field("format", &self.format)
			.field("data_len", &self.data.len())
			.finish()
	}
}

pub(crate) struct FFmpegFrame(NonNull<AVFrame>);

impl FFmpegFrame {
	pub(crate) fn new() -> Result<Self, FFmpegError> {
		NonNull::new(unsafe { av_frame_alloc() })
			.map(Self)
			.ok_or(FFmpegError::FrameAllocation)
	}

	pub(crate) fn as_ref(&self) -> &AVFrame {
		unsafe { self.0.as_ref() }
	}

	#[cfg(test)]
	pub(crate) fn as_mut(&mut self) -> &mut AVFrame {
		unsafe { self.0.as_mut() }
	}

	pub(crate) fn as_mut_ptr(&mut self) -> *mut AVFrame {
		self.0.as_ptr()
	}

	pub(crate) fn is_key_frame(&self) -> bool {
		self.as_ref().flags & AV_FRAME_FLAG_KEY as c_int != 0
	}

	/// Presentation timestamp in stream time base units, falling back to FFmpeg's best effort
	/// guess when the container didn't carry one.
	pub(crate) fn timestamp(&self) -> Option<i64> {
		let frame = self.as_ref();
		[frame.pts, frame.best_effort_timestamp]
			.into_iter()
			.find(|&ts| ts != AV_NOPTS_VALUE)
	}

	/// Moves the frame references out of `self` into `dst`, leaving `self` blank and reusable.
	pub(crate) fn move_into(&mut self, dst: &mut Self) {
		unsafe {
			av_frame_unref(dst.as_mut_ptr());
			av_frame_move_ref(dst.as_mut_ptr(), self.as_mut_ptr());
		}
	}

	/// Layout of the decoded planes, read from the frame itself since a codec may change it
	/// mid-stream.
	pub(crate) fn pixel_format(&self) -> AVPixelFormat {
		let format = self.as_ref().format;

		if (AVPixelFormat::AV_PIX_FMT_NONE as c_int..AVPixelFormat::AV_PIX_FMT_NB as c_int)
			.contains(&format)
		{
			// SAFETY: `AVPixelFormat` is a `c_int` sized enum with no gaps in this range
			unsafe { mem::transmute::<c_int, AVPixelFormat>(format) }
		} else {
			AVPixelFormat::AV_PIX_FMT_NONE
		}
	}

	pub(crate) fn has_data(&self) -> bool {
		!self.as_ref().data[0].is_null()
	}
}

impl Drop for FFmpegFrame {
	fn drop(&mut self) {
		let mut ptr = self.0.as_ptr();
		unsafe { av_frame_free(&mut ptr) };
	}
}

// SAFETY: an `AVFrame` owns its refcounted buffers and is only touched through `&mut self`
unsafe impl Send for FFmpegFrame {}

/// A frame at native decode resolution, handed from the decode pipeline to the scaler.
pub(crate) struct DecodedFrame {
	pub(crate) frame: FFmpegFrame,
	/// Presentation time in seconds relative to the stream start, when known.
	pub(crate) time: Option<f64>,
}

impl DecodedFrame {
	pub(crate) fn width(&self) -> c_int {
		self.frame.as_ref().width
	}

	pub(crate) fn height(&self) -> c_int {
		self.frame.as_ref().height
	}

	pub(crate) fn pixel_format(&self) -> AVPixelFormat {
		self.frame.pixel_format()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn stride_follows_pixel_format() {
		let buffer = PixelBuffer {
			width: 10,
			height: 2,
			format: PixelFormat::Rgb24,
			data: vec![0; 60],
		};
		assert_eq!(buffer.stride(), 30);

		let buffer = PixelBuffer {
			format: PixelFormat::Bgra,
			data: vec![0; 80],
			..buffer
		};
		assert_eq!(buffer.stride(), 40);
		assert_eq!(buffer.dimensions(), (10, 2));
	}

	#[test]
	fn fresh_frames_are_empty() {
		let frame = FFmpegFrame::new().unwrap();
		assert!(!frame.has_data());
		assert_eq!(frame.timestamp(), None);
		assert!(!frame.is_key_frame());
		assert_eq!(frame.pixel_format(), AVPixelFormat::AV_PIX_FMT_NONE);
	}

	#[test]
	fn pixel_format_comes_from_the_frame() {
		let mut frame = FFmpegFrame::new().unwrap();

		frame.as_mut().format = AVPixelFormat::AV_PIX_FMT_YUV420P as c_int;
		assert_eq!(frame.pixel_format(), AVPixelFormat::AV_PIX_FMT_YUV420P);

		frame.as_mut().format = AVPixelFormat::AV_PIX_FMT_NV12 as c_int;
		let decoded = DecodedFrame { frame, time: None };
		assert_eq!(decoded.pixel_format(), AVPixelFormat::AV_PIX_FMT_NV12);

		let mut frame = FFmpegFrame::new().unwrap();
		frame.as_mut().format = c_int::MAX;
		assert_eq!(frame.pixel_format(), AVPixelFormat::AV_PIX_FMT_NONE);
	}
}
