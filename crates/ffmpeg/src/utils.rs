use crate::error::{Error, FFmpegError};

use std::{
	ffi::{c_int, CString},
	path::Path,
};

pub(crate) fn check_error(return_code: c_int, error_message: &str) -> Result<c_int, Error> {
	if return_code < 0 {
		Err(Error::FFmpegWithReason(
			FFmpegError::from(return_code),
			error_message.to_string(),
		))
	} else {
		Ok(return_code)
	}
}

pub(crate) fn from_path(path: impl AsRef<Path>) -> Result<CString, Error> {
	let path = path.as_ref();
	path.to_str()
		.and_then(|path_str| CString::new(path_str.as_bytes()).ok())
		.ok_or_else(|| Error::PathConversion(path.into()))
}

/// Anything with a `scheme://` prefix is handed to FFmpeg's protocol layer untouched.
pub(crate) fn is_url(path: &Path) -> bool {
	path.to_str()
		.and_then(|path_str| path_str.split_once("://"))
		.is_some_and(|(scheme, _)| {
			!scheme.is_empty()
				&& scheme
					.chars()
					.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
		})
}
