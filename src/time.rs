use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// A signed span of time in whole nanoseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration(i64);

impl Duration {
	pub const ZERO: Duration = Duration(0);

	pub const fn from_nanos(nanos: i64) -> Self {
		Duration(nanos)
	}

	pub fn from_nanos_f64(nanos: f64) -> Self {
		Duration(nanos.floor() as i64)
	}

	pub const fn nanos(&self) -> i64 {
		self.0
	}
}

impl fmt::Display for Duration {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		const UNITS: [(&str, f64); 6] = [
			("h", 3_600_000_000_000.0),
			("m", 60_000_000_000.0),
			("s", 1_000_000_000.0),
			("ms", 1_000_000.0),
			("μs", 1_000.0),
			("ns", 1.0),
		];

		let nanos = self.0 as f64;
		let (unit, scale) = UNITS
			.iter()
			.find(|(_, scale)| nanos.abs() >= *scale)
			.copied()
			.unwrap_or(("ns", 1.0));

		let scaled = format!("{:.3}", nanos / scale);
		let scaled = scaled.trim_end_matches('0').trim_end_matches('.');
		write!(f, "{scaled}{unit}")
	}
}

/// A point in time as seconds and nanoseconds since the Unix epoch.
/// `nanos` is kept within `0..1_000_000_000`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
	pub seconds: i64,
	pub nanos: i32,
}

impl Timestamp {
	pub const EPOCH: Timestamp = Timestamp {
		seconds: 0,
		nanos: 0,
	};

	/// Normalizes `nanos` into `[0, 1s)`, saturating `seconds` at the `i64`
	/// bounds.
	pub fn new(seconds: i64, nanos: i64) -> Self {
		Timestamp {
			seconds: seconds.saturating_add(nanos.div_euclid(NANOS_PER_SECOND)),
			nanos: nanos.rem_euclid(NANOS_PER_SECOND) as i32,
		}
	}

	/// Like `new`, but `None` when the carried seconds overflow.
	pub fn checked_new(seconds: i64, nanos: i64) -> Option<Self> {
		Some(Timestamp {
			seconds: seconds.checked_add(nanos.div_euclid(NANOS_PER_SECOND))?,
			nanos: nanos.rem_euclid(NANOS_PER_SECOND) as i32,
		})
	}
}

impl fmt::Display for Timestamp {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match DateTime::<Utc>::from_timestamp(self.seconds, self.nanos as u32) {
			Some(time) => f.write_str(&time.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
			None => write!(f, "{}s+{}ns", self.seconds, self.nanos),
		}
	}
}
