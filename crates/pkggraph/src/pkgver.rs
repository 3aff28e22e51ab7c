//! Versioned package descriptors and the interval arithmetic used by the
//! lookup tables.
//!
//! A [`PackageVer`] carries a package name plus up to two
//! condition/version pairs (`foo >= 1.0` with an optional `, < 2.0`).
//! [`PackageVer::interval`] turns the pair into a [`PkgVerInterval`] which
//! is what every query and sort in the graph actually compares.

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};

pub mod rpm_version;
pub use rpm_version::RpmVersion;

/// A package name with its version constraints.
///
/// `condition` is one of ``""``, `=`, `>=`, `<=`, `>`, `<`. An empty
/// condition with a non-empty version means `=`; an empty version means
/// any version at all. The secondary pair narrows the primary one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageVer {
	pub name: String,
	pub version: String,
	pub condition: String,
	pub s_version: String,
	pub s_condition: String,
}

impl PackageVer {
	pub fn interval(&self) -> Result<PkgVerInterval> {
		let mut interval = condition_interval(&self.condition, &self.version)?;
		if !self.s_condition.is_empty() || !self.s_version.is_empty() {
			interval = interval.intersect(&condition_interval(&self.s_condition, &self.s_version)?);
		}
		Ok(interval)
	}

	/// Implicit provides are file paths and parenthesised features, they
	/// are satisfied as a side effect of installing the owning package.
	pub fn is_implicit(&self) -> bool {
		self.name.starts_with('/') || (self.name.contains('(') && self.name.contains(')'))
	}
}

impl std::fmt::Display for PackageVer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.name)?;
		if !self.condition.is_empty() || !self.version.is_empty() {
			write!(f, "({}{}", self.condition, self.version)?;
			if !self.s_condition.is_empty() || !self.s_version.is_empty() {
				write!(f, ",{}{}", self.s_condition, self.s_version)?;
			}
			write!(f, ")")?;
		}
		Ok(())
	}
}

/// One end of a version interval.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VersionBound {
	Minimum,
	Ver(RpmVersion),
	Maximum,
}

/// The version range implied by a [`PackageVer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkgVerInterval {
	pub lower_bound: VersionBound,
	pub upper_bound: VersionBound,
	pub lower_inclusive: bool,
	pub upper_inclusive: bool,
}

impl Default for PkgVerInterval {
	fn default() -> Self {
		PkgVerInterval {
			lower_bound: VersionBound::Minimum,
			upper_bound: VersionBound::Maximum,
			lower_inclusive: true,
			upper_inclusive: true,
		}
	}
}

impl PkgVerInterval {
	pub fn intersect(&self, other: &PkgVerInterval) -> PkgVerInterval {
		let (lower_bound, lower_inclusive) = match self.lower_bound.cmp(&other.lower_bound) {
			std::cmp::Ordering::Less => (other.lower_bound.clone(), other.lower_inclusive),
			std::cmp::Ordering::Greater => (self.lower_bound.clone(), self.lower_inclusive),
			std::cmp::Ordering::Equal => (self.lower_bound.clone(), self.lower_inclusive && other.lower_inclusive),
		};
		let (upper_bound, upper_inclusive) = match self.upper_bound.cmp(&other.upper_bound) {
			std::cmp::Ordering::Less => (self.upper_bound.clone(), self.upper_inclusive),
			std::cmp::Ordering::Greater => (other.upper_bound.clone(), other.upper_inclusive),
			std::cmp::Ordering::Equal => (self.upper_bound.clone(), self.upper_inclusive && other.upper_inclusive),
		};
		PkgVerInterval { lower_bound, upper_bound, lower_inclusive, upper_inclusive }
	}

	fn is_empty(&self) -> bool {
		match self.lower_bound.cmp(&self.upper_bound) {
			std::cmp::Ordering::Less => false,
			std::cmp::Ordering::Equal => !(self.lower_inclusive && self.upper_inclusive),
			std::cmp::Ordering::Greater => true,
		}
	}

	/// True when some version lies in both intervals.
	pub fn satisfies(&self, requested: &PkgVerInterval) -> bool {
		!self.intersect(requested).is_empty()
	}
}

/// Intervals order by lower bound first (inclusive before exclusive), then
/// by upper bound (exclusive before inclusive). Only the bounds of the run
/// node matter to lookup sorting, so this is a plain total order.
impl Ord for PkgVerInterval {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		self.lower_bound
			.cmp(&other.lower_bound)
			.then_with(|| other.lower_inclusive.cmp(&self.lower_inclusive))
			.then_with(|| self.upper_bound.cmp(&other.upper_bound))
			.then_with(|| self.upper_inclusive.cmp(&other.upper_inclusive))
	}
}

impl PartialOrd for PkgVerInterval {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}

fn condition_interval(condition: &str, version: &str) -> Result<PkgVerInterval> {
	if version.is_empty() {
		return Ok(PkgVerInterval::default());
	}
	let ver = || VersionBound::Ver(RpmVersion::new(version));
	let interval = match condition {
		"" | "=" => PkgVerInterval {
			lower_bound: ver(),
			upper_bound: ver(),
			lower_inclusive: true,
			upper_inclusive: true,
		},
		">=" => PkgVerInterval {
			lower_bound: ver(),
			upper_bound: VersionBound::Maximum,
			lower_inclusive: true,
			upper_inclusive: true,
		},
		">" => PkgVerInterval {
			lower_bound: ver(),
			upper_bound: VersionBound::Maximum,
			lower_inclusive: false,
			upper_inclusive: true,
		},
		"<=" => PkgVerInterval {
			lower_bound: VersionBound::Minimum,
			upper_bound: ver(),
			lower_inclusive: true,
			upper_inclusive: true,
		},
		"<" => PkgVerInterval {
			lower_bound: VersionBound::Minimum,
			upper_bound: ver(),
			lower_inclusive: true,
			upper_inclusive: false,
		},
		other => return Err(GraphError::UnknownCondition(other.to_string())),
	};
	Ok(interval)
}

#[cfg(test)]
mod test {
	use super::*;

	fn pv(condition: &str, version: &str) -> PackageVer {
		PackageVer {
			name: "pkg".to_string(),
			version: version.to_string(),
			condition: condition.to_string(),
			..Default::default()
		}
	}

	fn pv2(condition: &str, version: &str, s_condition: &str, s_version: &str) -> PackageVer {
		PackageVer {
			s_version: s_version.to_string(),
			s_condition: s_condition.to_string(),
			..pv(condition, version)
		}
	}

	#[test]
	fn empty_version_is_any() {
		assert_eq!(pv("", "").interval().unwrap(), PkgVerInterval::default());
	}

	#[test]
	fn empty_condition_is_equality() {
		let interval = pv("", "1.0").interval().unwrap();
		assert_eq!(interval.lower_bound, interval.upper_bound);
		assert!(interval.lower_inclusive && interval.upper_inclusive);
	}

	#[test]
	fn unknown_condition_is_rejected() {
		assert!(matches!(pv("~=", "1.0").interval(), Err(GraphError::UnknownCondition(_))));
	}

	#[test]
	fn double_conditional_intersects() {
		let interval = pv2(">=", "1", "<", "2").interval().unwrap();
		assert_eq!(interval.lower_bound, VersionBound::Ver(RpmVersion::new("1")));
		assert_eq!(interval.upper_bound, VersionBound::Ver(RpmVersion::new("2")));
		assert!(interval.lower_inclusive);
		assert!(!interval.upper_inclusive);
	}

	#[test]
	fn exact_satisfies_range() {
		let range = pv2(">=", "1", "<", "2").interval().unwrap();
		assert!(pv("=", "1.5").interval().unwrap().satisfies(&range));
		assert!(!pv("=", "2.0").interval().unwrap().satisfies(&range));
		assert!(!pv("=", "0.9").interval().unwrap().satisfies(&range));
	}

	#[test]
	fn exclusive_bounds_do_not_touch() {
		let below = pv("<", "1").interval().unwrap();
		let above = pv(">", "1").interval().unwrap();
		let at = pv("=", "1").interval().unwrap();
		assert!(!below.satisfies(&above));
		assert!(!at.satisfies(&below));
		assert!(!at.satisfies(&above));
	}

	#[test]
	fn intervals_sort_by_lower_bound() {
		let mut intervals = vec![
			pv("=", "2.0").interval().unwrap(),
			pv("=", "1.0").interval().unwrap(),
			pv(">=", "1.5").interval().unwrap(),
		];
		intervals.sort();
		assert_eq!(intervals[0].lower_bound, VersionBound::Ver(RpmVersion::new("1.0")));
		assert_eq!(intervals[1].lower_bound, VersionBound::Ver(RpmVersion::new("1.5")));
	}

	#[test]
	fn implicit_provides_are_detected() {
		assert!(!pv("", "").is_implicit());
		let mut file = pv("", "");
		file.name = "/usr/bin/pkg".to_string();
		assert!(file.is_implicit());
		let mut feature = pv("", "");
		feature.name = "pkg(feature)".to_string();
		assert!(feature.is_implicit());
	}
}
