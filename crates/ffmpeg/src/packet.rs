use crate::error::FFmpegError;

use std::ptr::NonNull;

use ffmpeg_sys_next::{av_packet_alloc, av_packet_free, av_packet_unref, AVPacket};

pub(crate) struct FFmpegPacket(NonNull<AVPacket>);

impl FFmpegPacket {
	pub(crate) fn new() -> Result<Self, FFmpegError> {
		NonNull::new(unsafe { av_packet_alloc() })
			.map(Self)
			.ok_or(FFmpegError::PacketAllocation)
	}

	pub(crate) fn as_ref(&self) -> &AVPacket {
		unsafe { self.0.as_ref() }
	}

	pub(crate) fn as_ptr(&self) -> *const AVPacket {
		self.0.as_ptr()
	}

	pub(crate) fn as_mut_ptr(&mut self) -> *mut AVPacket {
		self.0.as_ptr()
	}

	pub(crate) fn stream_index(&self) -> i32 {
		self.as_ref().stream_index
	}

	pub(crate) fn reset(&mut self) -> &mut Self {
		unsafe { av_packet_unref(self.0.as_ptr()) };
		self
	}
}

impl Drop for FFmpegPacket {
	fn drop(&mut self) {
		let mut ptr = self.0.as_ptr();
		unsafe { av_packet_free(&mut ptr) };
	}
}
