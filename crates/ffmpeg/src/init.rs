use crate::error::Error;

use std::{ffi::c_int, sync::Once};

use ffmpeg_sys_next::{
	av_log_set_level, AV_LOG_DEBUG, AV_LOG_ERROR, AV_LOG_FATAL, AV_LOG_INFO, AV_LOG_PANIC,
	AV_LOG_QUIET, AV_LOG_TRACE, AV_LOG_VERBOSE, AV_LOG_WARNING,
};
use tracing::{debug, info};

static INIT: Once = Once::new();

/// How much FFmpeg itself prints to stderr. Independent from `tracing` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FFmpegLogLevel {
	Quiet,
	Panic,
	Fatal,
	#[default]
	Error,
	Warning,
	Info,
	Verbose,
	Debug,
	Trace,
}

impl FFmpegLogLevel {
	const fn as_av_log_level(self) -> c_int {
		match self {
			Self::Quiet => AV_LOG_QUIET as c_int,
			Self::Panic => AV_LOG_PANIC as c_int,
			Self::Fatal => AV_LOG_FATAL as c_int,
			Self::Error => AV_LOG_ERROR as c_int,
			Self::Warning => AV_LOG_WARNING as c_int,
			Self::Info => AV_LOG_INFO as c_int,
			Self::Verbose => AV_LOG_VERBOSE as c_int,
			Self::Debug => AV_LOG_DEBUG as c_int,
			Self::Trace => AV_LOG_TRACE as c_int,
		}
	}
}

/// Process-wide settings handed over by the host application on [`initialize`].
#[derive(Debug, Clone, Default)]
pub struct HostContext {
	ffmpeg_log_level: FFmpegLogLevel,
}

impl HostContext {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub const fn with_ffmpeg_log_level(mut self, level: FFmpegLogLevel) -> Self {
		self.ffmpeg_log_level = level;
		self
	}

	#[must_use]
	pub const fn ffmpeg_log_level(&self) -> FFmpegLogLevel {
		self.ffmpeg_log_level
	}
}

/// One-time, process-wide setup. Safe to call repeatedly and from several threads at once:
/// exactly one call performs the setup and returns `true`, every other call is a no-op.
///
/// Concurrent callers block until the setup is done, so [`is_initialized`] never reports a
/// half-finished setup.
pub fn initialize(host: &HostContext) -> bool {
	let mut performed = false;

	INIT.call_once(|| {
		unsafe { av_log_set_level(host.ffmpeg_log_level.as_av_log_level()) };
		performed = true;
	});

	if performed {
		info!(ffmpeg_log_level = ?host.ffmpeg_log_level, "Thumbnailer initialized");
	} else {
		debug!("Thumbnailer already initialized");
	}

	performed
}

#[must_use]
pub fn is_initialized() -> bool {
	INIT.is_completed()
}

pub(crate) fn ensure_initialized() -> Result<(), Error> {
	if is_initialized() {
		Ok(())
	} else {
		Err(Error::NotInitialized)
	}
}
