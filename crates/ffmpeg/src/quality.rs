//! Turns a caller's quality choice into the concrete knobs the decode pipeline and the scaler use.
//!
//! There are two ways to ask for quality: a numeric scale from 1 to 10, which decides how big the
//! thumbnail is, and a named [`QualityPreset`], which decides how hard the engine works for it.
//! Neither implies the other. [`QualitySelection`] names every allowed combination and
//! [`QualitySelection::resolve`] is the only place they turn into a [`QualityProfile`].

use crate::error::Error;

use std::{ffi::c_int, fmt};

use ffmpeg_sys_next::{SWS_FAST_BILINEAR, SWS_LANCZOS, SWS_POINT};

/// Size of the thumbnail relative to the decoded frame, in tenths. `10` keeps the decoded
/// resolution, `1` produces a thumbnail a tenth as wide and a tenth as tall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualityScale(u8);

impl QualityScale {
	pub const MIN: Self = Self(1);
	pub const MAX: Self = Self(10);

	pub const fn new(scale: u8) -> Result<Self, Error> {
		if scale >= Self::MIN.0 && scale <= Self::MAX.0 {
			Ok(Self(scale))
		} else {
			Err(Error::InvalidQuality(scale))
		}
	}

	#[must_use]
	pub const fn get(self) -> u8 {
		self.0
	}

	#[must_use]
	pub fn dimension_fraction(self) -> f64 {
		f64::from(self.0) / f64::from(Self::MAX.0)
	}
}

impl Default for QualityScale {
	fn default() -> Self {
		Self::MAX
	}
}

impl TryFrom<u8> for QualityScale {
	type Error = Error;

	fn try_from(scale: u8) -> Result<Self, Self::Error> {
		Self::new(scale)
	}
}

impl fmt::Display for QualityScale {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/10", self.0)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QualityPreset {
	/// Previews, strips and big batches.
	Fast,
	#[default]
	Normal,
	/// Posters and snapshots, where landing on the right frame matters more than latency.
	Hq,
}

impl fmt::Display for QualityPreset {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Fast => "fast",
			Self::Normal => "normal",
			Self::Hq => "hq",
		})
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalingAlgorithm {
	FastBilinear,
	/// Nearest neighbour.
	BalancedPoint,
	HighQualityLanczos,
}

impl ScalingAlgorithm {
	pub(crate) const fn sws_flags(self) -> c_int {
		(match self {
			Self::FastBilinear => SWS_FAST_BILINEAR,
			Self::BalancedPoint => SWS_POINT,
			Self::HighQualityLanczos => SWS_LANCZOS,
		}) as c_int
	}
}

/// How much of the input the demuxer may read before it has to commit to stream parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeBudget {
	Small,
	Default,
	Thorough,
}

impl ProbeBudget {
	/// Maximum bytes read while probing the container.
	#[must_use]
	pub const fn probe_size(self) -> i64 {
		match self {
			Self::Small => 2_000_000,
			Self::Default => 5_000_000,
			Self::Thorough => 10_000_000,
		}
	}

	/// Maximum stream duration analyzed while looking for codec parameters, in microseconds.
	#[must_use]
	pub const fn analyze_duration(self) -> i64 {
		match self {
			Self::Small => 500_000,
			Self::Default => 1_000_000,
			Self::Thorough => 5_000_000,
		}
	}
}

/// Rule deciding which decoded frame ends the forward decode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameMatch {
	/// Frame at the target, or the last one decoded before it when the target falls between two
	/// frames.
	Exact,
	/// First frame no more than this many seconds before the target.
	Tolerance(f64),
	/// Whichever of the two frames bracketing the target is closer to it.
	Nearest,
}

/// How many shortcuts the codec may take. Deblocking stays off and non-reference frames are
/// skipped whatever the strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeStrategy {
	/// Low delay output and no IDCT on bidirectional frames, on top of [`Self::Balanced`].
	Aggressive,
	/// Non bit-exact shortcuts (`AV_CODEC_FLAG2_FAST`).
	Balanced,
	/// Bit-exact decoding.
	Careful,
}

/// Everything a single extraction needs to know about the requested quality.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityProfile {
	pub dimension_fraction: f64,
	pub scaling_algorithm: ScalingAlgorithm,
	pub probe_budget: ProbeBudget,
	pub frame_match: FrameMatch,
	pub decode_strategy: DecodeStrategy,
}

impl QualityProfile {
	#[must_use]
	pub fn from_scale(scale: QualityScale) -> Self {
		Self {
			dimension_fraction: scale.dimension_fraction(),
			scaling_algorithm: ScalingAlgorithm::FastBilinear,
			probe_budget: ProbeBudget::Small,
			frame_match: FrameMatch::Exact,
			decode_strategy: DecodeStrategy::Balanced,
		}
	}

	#[must_use]
	pub const fn from_preset(preset: QualityPreset) -> Self {
		match preset {
			QualityPreset::Fast => Self {
				dimension_fraction: 1.0,
				scaling_algorithm: ScalingAlgorithm::FastBilinear,
				probe_budget: ProbeBudget::Small,
				frame_match: FrameMatch::Tolerance(2.0),
				decode_strategy: DecodeStrategy::Aggressive,
			},
			QualityPreset::Normal => Self {
				dimension_fraction: 1.0,
				scaling_algorithm: ScalingAlgorithm::BalancedPoint,
				probe_budget: ProbeBudget::Default,
				frame_match: FrameMatch::Tolerance(1.0),
				decode_strategy: DecodeStrategy::Balanced,
			},
			QualityPreset::Hq => Self {
				dimension_fraction: 1.0,
				scaling_algorithm: ScalingAlgorithm::HighQualityLanczos,
				probe_budget: ProbeBudget::Thorough,
				frame_match: FrameMatch::Nearest,
				decode_strategy: DecodeStrategy::Careful,
			},
		}
	}
}

/// The caller's quality choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualitySelection {
	Scale(QualityScale),
	Preset(QualityPreset),
	/// Size from the scale; algorithm, probing and frame selection from the preset.
	Composed {
		scale: QualityScale,
		preset: QualityPreset,
	},
}

impl QualitySelection {
	#[must_use]
	pub fn resolve(self) -> QualityProfile {
		match self {
			Self::Scale(scale) => QualityProfile::from_scale(scale),
			Self::Preset(preset) => QualityProfile::from_preset(preset),
			Self::Composed { scale, preset } => QualityProfile {
				dimension_fraction: scale.dimension_fraction(),
				..QualityProfile::from_preset(preset)
			},
		}
	}
}

impl Default for QualitySelection {
	fn default() -> Self {
		Self::Scale(QualityScale::default())
	}
}

impl From<QualityScale> for QualitySelection {
	fn from(scale: QualityScale) -> Self {
		Self::Scale(scale)
	}
}

impl From<QualityPreset> for QualitySelection {
	fn from(preset: QualityPreset) -> Self {
		Self::Preset(preset)
	}
}

impl fmt::Display for QualitySelection {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Scale(scale) => write!(f, "scale {scale}"),
			Self::Preset(preset) => write!(f, "preset {preset}"),
			Self::Composed { scale, preset } => write!(f, "scale {scale} with preset {preset}"),
		}
	}
}
