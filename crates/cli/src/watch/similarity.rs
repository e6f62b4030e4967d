//! Product-name similarity in `0.0..=1.0`.

use similar::TextDiff;

/// Lowercases, maps non-alphanumerics to spaces and collapses whitespace.
pub fn normalize(name: &str) -> String {
	let mapped: String = name
		.chars()
		.map(|c| if c.is_alphanumeric() { c } else { ' ' })
		.flat_map(char::to_lowercase)
		.collect();
	mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn ratio(a: &str, b: &str) -> f64 {
	f64::from(TextDiff::from_chars(a, b).ratio())
}

/// Scores how closely `observed` names the same product as `target`.
///
/// The base score is the character match ratio of the normalized names.
/// When the shorter name is at least half as long as the longer one, its best
/// ratio against any equally long window of the longer name also counts, so a
/// truncated page title still matches the full catalog label.
pub fn similarity(observed: &str, target: &str) -> f64 {
	let a = normalize(observed);
	let b = normalize(target);
	if a.is_empty() || b.is_empty() {
		return 0.0;
	}
	if a == b {
		return 1.0;
	}

	let full = ratio(&a, &b);
	let (short, long) = if a.chars().count() <= b.chars().count() { (&a, &b) } else { (&b, &a) };
	let short_len = short.chars().count();
	let long_chars: Vec<char> = long.chars().collect();
	if short_len * 2 < long_chars.len() {
		return full;
	}

	let partial = long_chars
		.windows(short_len)
		.map(|w| ratio(short, &w.iter().collect::<String>()))
		.fold(0.0_f64, f64::max);
	full.max(partial)
}

/// Similarity gate with a single configurable threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchPolicy {
	pub threshold: f64,
}

impl MatchPolicy {
	pub fn new(threshold: f64) -> Self {
		Self { threshold }
	}

	pub fn is_match(&self, score: f64) -> bool {
		score >= self.threshold
	}

	/// Best score of `target` against any of `candidates`.
	pub fn best_score<'a>(candidates: impl IntoIterator<Item = &'a str>, target: &str) -> f64 {
		candidates.into_iter().map(|c| similarity(c, target)).fold(0.0, f64::max)
	}
}
