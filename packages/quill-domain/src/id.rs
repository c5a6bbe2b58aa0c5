use uuid::Uuid;

/// Parses an identifier supplied by a caller. Whitespace is not trimmed; a padded id is malformed.
pub fn parse_id(raw: &str) -> Option<Uuid> {
	if raw.is_empty() {
		return None;
	}

	Uuid::parse_str(raw).ok()
}

pub fn is_valid_id(raw: &str) -> bool {
	parse_id(raw).is_some()
}

pub fn new_id() -> Uuid {
	Uuid::new_v4()
}
