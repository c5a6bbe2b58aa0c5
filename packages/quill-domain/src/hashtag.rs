//! Hashtag extraction for post messages.
//!
//! A hashtag is `#` followed by a run of word characters. The `#` must open the text or follow a
//! non-word character, so `issue#12` and `a##` do not produce tags. Interior `-` and `.` are kept
//! when they join word characters (`#release-1.2`), trailing punctuation is not.

use std::sync::LazyLock;

use regex::Regex;

const HASHTAG_PATTERN: &str = r"(?:^|[^\w])#(\w+(?:[-.]\w+)*)";

static HASHTAG_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(HASHTAG_PATTERN).ok());

/// Comparison key of a tag. Extraction and search both match tags case-insensitively.
pub fn tag_key(tag: &str) -> String {
	tag.to_lowercase()
}

/// Returns the distinct hashtags of `message` in order of first occurrence, each as `#token`.
/// Later spellings of an already seen tag are dropped.
pub fn extract(message: &str) -> Vec<String> {
	let Some(re) = HASHTAG_RE.as_ref() else {
		return Vec::new();
	};
	let mut tags: Vec<String> = Vec::new();
	let mut seen: Vec<String> = Vec::new();

	for captures in re.captures_iter(message) {
		let Some(token) = captures.get(1) else {
			continue;
		};
		let tag = format!("#{}", token.as_str());
		let key = tag_key(&tag);

		if !seen.contains(&key) {
			seen.push(key);
			tags.push(tag);
		}
	}

	tags
}

/// The stored rendering of [`extract`]: tags joined by a single space, or an empty string.
pub fn render(message: &str) -> String {
	extract(message).join(" ")
}

/// Normalizes a single search term that looks like a hashtag.
///
/// Returns `None` unless the whole term is exactly one hashtag, ignoring trailing punctuation.
pub fn normalize_term(term: &str) -> Option<String> {
	if !term.starts_with('#') {
		return None;
	}

	let mut tags = extract(term);

	if tags.len() != 1 {
		return None;
	}

	let tag = tags.pop()?;
	let trimmed = term.trim_end_matches(|c: char| !c.is_alphanumeric() && c != '_');

	(trimmed == tag).then_some(tag)
}
