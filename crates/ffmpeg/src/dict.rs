use crate::{
	error::{Error, FFmpegError},
	utils::check_error,
};

use std::{
	ffi::{c_int, CStr, CString},
	ptr,
};

use ffmpeg_sys_next::{
	av_dict_count, av_dict_free, av_dict_iterate, av_dict_set, AVDictionary,
	AVDictionaryEntry, AV_DICT_MATCH_CASE,
};

/// Owned `AVDictionary`, used to hand options to FFmpeg calls that take `AVDictionary **`.
///
/// FFmpeg consumes the entries it recognizes and leaves the rest behind, so whatever is still in
/// the dictionary after a call is, by definition, an option nobody used.
#[derive(Debug)]
pub(crate) struct FFmpegDictionary {
	dict: *mut AVDictionary,
}

impl FFmpegDictionary {
	pub(crate) const fn new() -> Self {
		Self {
			dict: ptr::null_mut(),
		}
	}

	pub(crate) fn set(&mut self, key: &CStr, value: impl ToString) -> Result<(), Error> {
		let value = CString::new(value.to_string()).map_err(|_| {
			Error::FFmpegWithReason(
				FFmpegError::InvalidData,
				format!("Dictionary value for {key:?} contains a nul byte"),
			)
		})?;

		check_error(
			unsafe {
				av_dict_set(
					&mut self.dict,
					key.as_ptr(),
					value.as_ptr(),
					AV_DICT_MATCH_CASE as c_int,
				)
			},
			"Fail to set dictionary key-value pair",
		)?;

		Ok(())
	}

	pub(crate) fn len(&self) -> usize {
		usize::try_from(unsafe { av_dict_count(self.dict) }).unwrap_or_default()
	}

	pub(crate) fn as_mut_ptr(&mut self) -> *mut *mut AVDictionary {
		&mut self.dict
	}
}

impl Drop for FFmpegDictionary {
	fn drop(&mut self) {
		if !self.dict.is_null() {
			unsafe { av_dict_free(&mut self.dict) };
			self.dict = ptr::null_mut();
		}
	}
}

impl<'a> IntoIterator for &'a FFmpegDictionary {
	type Item = (String, Option<String>);
	type IntoIter = FFmpegDictIter<'a>;

	#[inline]
	fn into_iter(self) -> FFmpegDictIter<'a> {
		FFmpegDictIter {
			dict: self.dict,
			prev: ptr::null(),
			_lifetime: std::marker::PhantomData,
		}
	}
}

pub(crate) struct FFmpegDictIter<'a> {
	dict: *mut AVDictionary,
	prev: *const AVDictionaryEntry,
	_lifetime: std::marker::PhantomData<&'a ()>,
}

impl Iterator for FFmpegDictIter<'_> {
	type Item = (String, Option<String>);

	fn next(&mut self) -> Option<(String, Option<String>)> {
		if self.dict.is_null() {
			return None;
		}

		unsafe { av_dict_iterate(self.dict, self.prev).as_ref() }.and_then(|prev| {
			self.prev = prev;
			let key = unsafe { prev.key.as_ref() }.map(|key| unsafe { CStr::from_ptr(key) });
			let value =
				unsafe { prev.value.as_ref() }.map(|value| unsafe { CStr::from_ptr(value) });

			match (key, value) {
				(None, _) => None,
				(Some(key), None) => {
					Some((String::from_utf8_lossy(key.to_bytes()).to_string(), None))
				}
				(Some(key), Some(value)) => Some((
					String::from_utf8_lossy(key.to_bytes()).to_string(),
					Some(String::from_utf8_lossy(value.to_bytes()).to_string()),
				)),
			}
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn set_and_iterate() {
		let mut dict = FFmpegDictionary::new();
		assert_eq!(dict.len(), 0);
		assert_eq!((&dict).into_iter().count(), 0);

		dict.set(c"probesize", 2_000_000).unwrap();
		dict.set(c"analyzeduration", 500_000).unwrap();

		assert_eq!(dict.len(), 2);

		let entries = (&dict).into_iter().collect::<Vec<_>>();
		assert_eq!(
			entries,
			vec![
				("probesize".to_string(), Some("2000000".to_string())),
				("analyzeduration".to_string(), Some("500000".to_string())),
			]
		);
	}

	#[test]
	fn setting_a_key_twice_overwrites_it() {
		let mut dict = FFmpegDictionary::new();
		dict.set(c"probesize", 1).unwrap();
		dict.set(c"probesize", 2).unwrap();

		assert_eq!(
			(&dict).into_iter().collect::<Vec<_>>(),
			vec![("probesize".to_string(), Some("2".to_string()))]
		);
	}
}
