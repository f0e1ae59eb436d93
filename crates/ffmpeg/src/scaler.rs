use crate::{
	error::{Error, FFmpegError},
	quality::ScalingAlgorithm,
	utils::check_error,
	video_frame::{DecodedFrame, PixelBuffer, PixelFormat},
};

use std::{
	ffi::c_int,
	ptr::{self, NonNull},
};

use ffmpeg_sys_next::{sws_freeContext, sws_getContext, sws_scale, AVPixelFormat, SwsContext};
use tracing::trace;

/// Row alignment swscale's vectorized writers are happy with.
const ROW_ALIGNMENT: usize = 64;

struct FFmpegScaler(NonNull<SwsContext>);

impl FFmpegScaler {
	fn new(
		(src_width, src_height): (c_int, c_int),
		src_format: AVPixelFormat,
		(dst_width, dst_height): (c_int, c_int),
		dst_format: AVPixelFormat,
		algorithm: ScalingAlgorithm,
	) -> Result<Self, FFmpegError> {
		NonNull::new(unsafe {
			sws_getContext(
				src_width,
				src_height,
				src_format,
				dst_width,
				dst_height,
				dst_format,
				algorithm.sws_flags(),
				ptr::null_mut(),
				ptr::null_mut(),
				ptr::null(),
			)
		})
		.map(Self)
		.ok_or(FFmpegError::ScalerAllocation)
	}
}

impl Drop for FFmpegScaler {
	fn drop(&mut self) {
		unsafe { sws_freeContext(self.0.as_ptr()) };
	}
}

/// Output size for a source size and dimension fraction. Never below one pixel per side.
pub(crate) fn target_dimensions(width: u32, height: u32, fraction: f64) -> (u32, u32) {
	let scale = |side: u32| {
		// Sides are bounded by c_int and fractions by 1.0, the result always fits
		#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
		let scaled = (f64::from(side) * fraction).round() as u32;
		scaled.max(1)
	};

	(scale(width), scale(height))
}

/// Scales and converts a decoded frame into a tightly packed buffer.
///
/// A fraction of `1.0` keeps the decoded size but still converts the pixel format.
pub(crate) fn scale(
	decoded: &DecodedFrame,
	fraction: f64,
	algorithm: ScalingAlgorithm,
	format: PixelFormat,
) -> Result<PixelBuffer, Error> {
	if decoded.pixel_format() == AVPixelFormat::AV_PIX_FMT_NONE || !decoded.frame.has_data() {
		return Err(Error::FrameDecodeError);
	}

	let (src_width, src_height) = (decoded.width(), decoded.height());
	let (width, height) = target_dimensions(
		u32::try_from(src_width)?,
		u32::try_from(src_height)?,
		fraction,
	);

	trace!(
		src_width,
		src_height,
		width,
		height,
		?algorithm,
		?format,
		"Scaling frame"
	);

	let scaler = FFmpegScaler::new(
		(src_width, src_height),
		decoded.pixel_format(),
		(c_int::try_from(width)?, c_int::try_from(height)?),
		format.as_av_pixel_format(),
		algorithm,
	)?;

	let row_len = usize::try_from(width)? * format.bytes_per_pixel();
	let rows = usize::try_from(height)?;
	let padded_row_len = row_len.next_multiple_of(ROW_ALIGNMENT);

	let mut data = vec![0u8; padded_row_len * rows + ROW_ALIGNMENT];

	let src = decoded.frame.as_ref();
	// swscale always reads four plane pointers and strides, packed formats only use the first
	let dst_planes = [
		data.as_mut_ptr(),
		ptr::null_mut(),
		ptr::null_mut(),
		ptr::null_mut(),
	];
	let dst_strides = [c_int::try_from(padded_row_len)?, 0, 0, 0];

	let scaled_rows = check_error(
		unsafe {
			sws_scale(
				scaler.0.as_ptr(),
				src.data.as_ptr().cast(),
				src.linesize.as_ptr(),
				0,
				src_height,
				dst_planes.as_ptr(),
				dst_strides.as_ptr(),
			)
		},
		"Failed to scale frame",
	)?;

	if usize::try_from(scaled_rows)? != rows {
		return Err(Error::FFmpegWithReason(
			FFmpegError::InvalidData,
			format!("Scaler produced {scaled_rows} rows, expected {rows}"),
		));
	}

	if padded_row_len != row_len {
		for row in 1..rows {
			data.copy_within(
				row * padded_row_len..row * padded_row_len + row_len,
				row * row_len,
			);
		}
	}
	data.truncate(row_len * rows);

	Ok(PixelBuffer {
		width,
		height,
		format,
		data,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	use crate::video_frame::FFmpegFrame;

	use ffmpeg_sys_next::av_frame_get_buffer;

	#[test]
	fn target_dimensions_round_and_clamp() {
		assert_eq!(target_dimensions(1920, 1080, 1.0), (1920, 1080));
		assert_eq!(target_dimensions(1920, 1080, 0.5), (960, 540));
		assert_eq!(target_dimensions(1920, 1080, 0.1), (192, 108));
		assert_eq!(target_dimensions(1280, 720, 0.3), (384, 216));
		assert_eq!(target_dimensions(15, 5, 0.1), (2, 1));
		assert_eq!(target_dimensions(3, 3, 0.1), (1, 1));
	}

	/// Mid gray YUV420P frame, every plane set to 128.
	fn gray_frame(width: c_int, height: c_int) -> DecodedFrame {
		let mut frame = FFmpegFrame::new().unwrap();
		{
			let raw = frame.as_mut();
			raw.width = width;
			raw.height = height;
			raw.format = AVPixelFormat::AV_PIX_FMT_YUV420P as c_int;
		}
		assert!(unsafe { av_frame_get_buffer(frame.as_mut_ptr(), 0) } >= 0);

		let raw = frame.as_mut();
		for (plane, plane_height) in [(0, height), (1, height / 2), (2, height / 2)] {
			let len = usize::try_from(raw.linesize[plane] * plane_height).unwrap();
			unsafe { std::slice::from_raw_parts_mut(raw.data[plane], len) }.fill(128);
		}

		DecodedFrame {
			frame,
			time: Some(0.0),
		}
	}

	#[test]
	fn scales_into_a_tightly_packed_rgba_buffer() {
		let decoded = gray_frame(64, 48);

		let buffer = scale(
			&decoded,
			0.5,
			ScalingAlgorithm::FastBilinear,
			PixelFormat::Rgba,
		)
		.unwrap();

		assert_eq!(buffer.dimensions(), (32, 24));
		assert_eq!(buffer.stride(), 128);
		assert_eq!(buffer.data.len(), 32 * 24 * 4);

		for pixel in buffer.data.chunks_exact(4) {
			assert_eq!(pixel[3], u8::MAX);
			assert!(pixel[0].abs_diff(pixel[1]) <= 2);
			assert!(pixel[1].abs_diff(pixel[2]) <= 2);
		}
	}

	#[test]
	fn full_size_still_converts_the_pixel_format() {
		let decoded = gray_frame(30, 20);

		for algorithm in [
			ScalingAlgorithm::FastBilinear,
			ScalingAlgorithm::BalancedPoint,
			ScalingAlgorithm::HighQualityLanczos,
		] {
			let buffer = scale(&decoded, 1.0, algorithm, PixelFormat::Rgb24).unwrap();
			assert_eq!(buffer.dimensions(), (30, 20));
			assert_eq!(buffer.data.len(), 30 * 20 * 3);
		}
	}

	#[test]
	fn empty_frames_are_rejected() {
		let decoded = DecodedFrame {
			frame: FFmpegFrame::new().unwrap(),
			time: None,
		};

		assert!(matches!(
			scale(&decoded, 1.0, ScalingAlgorithm::FastBilinear, PixelFormat::Rgba),
			Err(Error::FrameDecodeError)
		));
	}
}
