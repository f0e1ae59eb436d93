use flashthumb_ffmpeg::{PixelBuffer, PixelFormat};

use std::{ffi::OsStr, io::Cursor, ops::Deref, path::Path};

use anyhow::{anyhow, bail, Context, Result};
use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
	WebP { quality: u8 },
	Image(ImageFormat),
}

impl Encoding {
	/// Picks the encoding from the output file extension.
	pub fn from_path(path: &Path, webp_quality: u8) -> Result<Self> {
		let Some(extension) = path
			.extension()
			.and_then(OsStr::to_str)
			.map(str::to_ascii_lowercase)
		else {
			bail!("output path has no extension: {}", path.display());
		};

		if extension == "webp" {
			return Ok(Self::WebP {
				quality: webp_quality.min(100),
			});
		}

		ImageFormat::from_extension(&extension)
			.filter(|format| format.can_write())
			.map(Self::Image)
			.ok_or_else(|| anyhow!("unsupported output format: .{extension}"))
	}

	pub fn extension(self) -> &'static str {
		match self {
			Self::WebP { .. } => "webp",
			Self::Image(format) => format.extensions_str().first().copied().unwrap_or("img"),
		}
	}
}

fn to_dynamic_image(thumbnail: &PixelBuffer) -> Result<DynamicImage> {
	let (width, height) = thumbnail.dimensions();

	let image = match thumbnail.format {
		PixelFormat::Rgba => {
			RgbaImage::from_raw(width, height, thumbnail.data.clone()).map(DynamicImage::from)
		}
		PixelFormat::Bgra => {
			let mut data = thumbnail.data.clone();
			data.chunks_exact_mut(4).for_each(|pixel| pixel.swap(0, 2));
			RgbaImage::from_raw(width, height, data).map(DynamicImage::from)
		}
		PixelFormat::Rgb24 => {
			RgbImage::from_raw(width, height, thumbnail.data.clone()).map(DynamicImage::from)
		}
	};

	image.ok_or_else(|| anyhow!("pixel buffer is smaller than {width}x{height}"))
}

pub fn encode(thumbnail: &PixelBuffer, encoding: Encoding) -> Result<Vec<u8>> {
	let image = to_dynamic_image(thumbnail)?;

	match encoding {
		// Type WebPMemory is !Send, so it is turned into an owned Vec right away
		Encoding::WebP { quality } => Ok(webp::Encoder::from_image(&image)
			.map_err(|e| anyhow!("webp encoder rejected the thumbnail: {e}"))?
			.encode(f32::from(quality))
			.deref()
			.to_vec()),
		Encoding::Image(format) => {
			let image = if format == ImageFormat::Jpeg {
				DynamicImage::from(image.to_rgb8())
			} else {
				image
			};

			let mut bytes = Vec::new();
			image
				.write_to(&mut Cursor::new(&mut bytes), format)
				.with_context(|| format!("failed to encode thumbnail as {format:?}"))?;

			Ok(bytes)
		}
	}
}

pub async fn write(thumbnail: &PixelBuffer, path: &Path, encoding: Encoding) -> Result<()> {
	let bytes = encode(thumbnail, encoding)?;

	tokio::fs::write(path, bytes)
		.await
		.with_context(|| format!("failed to write {}", path.display()))
}
