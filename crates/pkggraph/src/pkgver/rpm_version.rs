use serde::{Deserialize, Serialize};

/// An `[epoch:]version[-release]` string, ordered the way the package
/// manager orders it.
///
/// The version and release parts are compared by walking alternating
/// non-digit and digit segments from the left. Non-digit segments compare
/// lexically, digit segments compare numerically (with arbitrary length,
/// leading zeros ignored). When one string runs out first, the longer one
/// is the higher version. The epoch dominates everything else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpmVersion {
	epoch: i64,
	version: String,
	release: String,
}

impl RpmVersion {
	pub fn new(raw: &str) -> Self {
		let (epoch, rest) = match raw.split_once(':') {
			Some((e, rest)) => match e.parse::<i64>() {
				Ok(epoch) => (epoch, rest),
				/* Not a numeric epoch, keep the whole string as the version */
				Err(_) => (0, raw),
			},
			None => (0, raw),
		};
		let (version, release) = match rest.split_once('-') {
			Some((v, r)) => (v.to_string(), r.to_string()),
			None => (rest.to_string(), String::new()),
		};
		RpmVersion { epoch, version, release }
	}
}

impl Ord for RpmVersion {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		self.epoch
			.cmp(&other.epoch)
			.then_with(|| segment_cmp(&self.version, &other.version))
			.then_with(|| segment_cmp(&self.release, &other.release))
	}
}

impl PartialOrd for RpmVersion {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}

/// Equality follows the ordering, so `1.0` and `1.00` are the same version.
impl PartialEq for RpmVersion {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other) == std::cmp::Ordering::Equal
	}
}

impl Eq for RpmVersion {}

impl std::fmt::Display for RpmVersion {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		if self.epoch != 0 {
			write!(f, "{}:", self.epoch)?;
		}
		write!(f, "{}", self.version)?;
		if !self.release.is_empty() {
			write!(f, "-{}", self.release)?;
		}
		Ok(())
	}
}

fn split_non_digits(s: &str) -> (&str, &str) {
	let end = s.find(|c: char| c.is_ascii_digit()).unwrap_or(s.len());
	s.split_at(end)
}

fn split_digits(s: &str) -> (&str, &str) {
	let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
	s.split_at(end)
}

fn numeric_cmp(lhs: &str, rhs: &str) -> std::cmp::Ordering {
	let lhs = lhs.trim_start_matches('0');
	let rhs = rhs.trim_start_matches('0');
	/* Longer trimmed digit strings are always larger, equal lengths compare lexically */
	lhs.len().cmp(&rhs.len()).then_with(|| lhs.cmp(rhs))
}

fn segment_cmp(a: &str, b: &str) -> std::cmp::Ordering {
	let mut lhs = a;
	let mut rhs = b;
	loop {
		if lhs.is_empty() || rhs.is_empty() {
			return lhs.len().cmp(&rhs.len());
		}

		let (l_alpha, l_rest) = split_non_digits(lhs);
		let (r_alpha, r_rest) = split_non_digits(rhs);
		match l_alpha.cmp(r_alpha) {
			std::cmp::Ordering::Equal => {}
			ord => return ord,
		}

		let (l_num, l_rest) = split_digits(l_rest);
		let (r_num, r_rest) = split_digits(r_rest);
		if !l_num.is_empty() && !r_num.is_empty() {
			match numeric_cmp(l_num, r_num) {
				std::cmp::Ordering::Equal => {}
				ord => return ord,
			}
		} else if l_num.len() != r_num.len() {
			/* One side ended inside a digit run, the other kept going */
			return l_num.len().cmp(&r_num.len());
		}

		lhs = l_rest;
		rhs = r_rest;
	}
}
