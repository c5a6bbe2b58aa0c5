//! Search query grammar.
//!
//! A query is whitespace-separated words. `channel:`, `in:` and `from:` (any case) are modifiers;
//! their value may follow directly or after exactly one whitespace character. A modifier without
//! a value is dropped. Double quotes group a phrase into one free-text term. Words made only of
//! `*` are wildcards and never match anything on their own.

use serde::Serialize;

use crate::hashtag;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Clause {
	FreeText(String),
	Hashtag(String),
	ChannelScope(String),
	AuthorScope(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SearchQuery {
	pub clauses: Vec<Clause>,
	/// AND across text terms when true, OR when false. Modifiers are always AND-combined.
	pub match_all_terms: bool,
	/// The free-text content was only wildcards.
	pub wildcard_only: bool,
}
impl SearchQuery {
	pub fn terms(&self) -> impl Iterator<Item = &str> {
		self.clauses.iter().filter_map(|clause| match clause {
			Clause::FreeText(term) => Some(term.as_str()),
			_ => None,
		})
	}

	pub fn hashtags(&self) -> impl Iterator<Item = &str> {
		self.clauses.iter().filter_map(|clause| match clause {
			Clause::Hashtag(tag) => Some(tag.as_str()),
			_ => None,
		})
	}

	pub fn channel_names(&self) -> impl Iterator<Item = &str> {
		self.clauses.iter().filter_map(|clause| match clause {
			Clause::ChannelScope(name) => Some(name.as_str()),
			_ => None,
		})
	}

	pub fn author_names(&self) -> impl Iterator<Item = &str> {
		self.clauses.iter().filter_map(|clause| match clause {
			Clause::AuthorScope(name) => Some(name.as_str()),
			_ => None,
		})
	}

	pub fn has_text(&self) -> bool {
		self.clauses.iter().any(|clause| matches!(clause, Clause::FreeText(_) | Clause::Hashtag(_)))
	}

	/// True when nothing survived parsing: no terms, no modifiers, no wildcard.
	pub fn is_empty(&self) -> bool {
		self.clauses.is_empty() && !self.wildcard_only
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
	#[error("Unterminated quoted phrase starting at character {offset}.")]
	UnterminatedPhrase { offset: usize },
}

#[derive(Clone, Copy)]
enum Modifier {
	Channel,
	Author,
}

pub fn parse(raw: &str, match_all_terms: bool) -> Result<SearchQuery, QueryError> {
	let chars: Vec<char> = raw.chars().collect();
	let mut clauses = Vec::new();
	let mut saw_wildcard = false;
	let mut pos = 0;

	while pos < chars.len() {
		if chars[pos].is_whitespace() {
			pos += 1;

			continue;
		}
		if chars[pos] == '"' {
			let Some(close) = chars[pos + 1..].iter().position(|c| *c == '"') else {
				return Err(QueryError::UnterminatedPhrase { offset: pos });
			};
			let phrase: String = chars[pos + 1..pos + 1 + close].iter().collect();
			let phrase = phrase.split_whitespace().collect::<Vec<_>>().join(" ");

			if !phrase.is_empty() {
				clauses.push(Clause::FreeText(phrase));
			}

			pos += close + 2;

			continue;
		}

		let (word, next) = read_word(&chars, pos);

		pos = next;

		if let Some((modifier, inline_value)) = split_modifier(&word) {
			let value = if inline_value.is_empty() {
				match spaced_value(&chars, pos) {
					Some((value, next)) => {
						pos = next;

						value
					},
					None => String::new(),
				}
			} else {
				inline_value
			};

			if let Some(clause) = modifier_clause(modifier, &value) {
				clauses.push(clause);
			}

			continue;
		}
		if word.chars().all(|c| c == '*') {
			saw_wildcard = true;

			continue;
		}
		if let Some(tag) = hashtag::normalize_term(&word) {
			clauses.push(Clause::Hashtag(tag));

			continue;
		}

		let term = word.trim_end_matches('*');

		if !term.is_empty() && term != "#" {
			clauses.push(Clause::FreeText(term.to_string()));
		}
	}

	let wildcard_only = saw_wildcard
		&& !clauses.iter().any(|clause| matches!(clause, Clause::FreeText(_) | Clause::Hashtag(_)));

	Ok(SearchQuery { clauses, match_all_terms, wildcard_only })
}

fn read_word(chars: &[char], start: usize) -> (String, usize) {
	let mut end = start;

	while end < chars.len() && !chars[end].is_whitespace() {
		end += 1;
	}

	(chars[start..end].iter().collect(), end)
}

fn split_modifier(word: &str) -> Option<(Modifier, String)> {
	let (prefix, value) = word.split_once(':')?;
	let modifier = match prefix.to_ascii_lowercase().as_str() {
		"channel" | "in" => Modifier::Channel,
		"from" => Modifier::Author,
		_ => return None,
	};

	Some((modifier, value.to_string()))
}

// `in: town` carries its value after exactly one whitespace character. A second modifier in that
// position is not a value.
fn spaced_value(chars: &[char], pos: usize) -> Option<(String, usize)> {
	if pos + 1 >= chars.len() || !chars[pos].is_whitespace() || chars[pos + 1].is_whitespace() {
		return None;
	}

	let (word, next) = read_word(chars, pos + 1);

	if split_modifier(&word).is_some() || word.starts_with('"') {
		return None;
	}

	Some((word, next))
}

fn modifier_clause(modifier: Modifier, value: &str) -> Option<Clause> {
	match modifier {
		Modifier::Channel => {
			let name = value.trim_start_matches('~');

			(!name.is_empty()).then(|| Clause::ChannelScope(name.to_string()))
		},
		Modifier::Author => {
			let name = value.trim_start_matches('@');

			(!name.is_empty()).then(|| Clause::AuthorScope(name.to_string()))
		},
	}
}
