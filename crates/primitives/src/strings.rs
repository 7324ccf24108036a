use unicode_segmentation::UnicodeSegmentation;

/// Escapes every regex metacharacter in `text` so it matches literally.
pub fn escape_regex(text: &str) -> String {
	regex::escape(text)
}

/// Returns the full grapheme cluster starting at byte offset `byte_idx`.
///
/// Surrogate-pair emoji and ZWJ sequences come back whole. `None` when the
/// offset is at or past the end, or not on a char boundary.
pub fn grapheme_at(text: &str, byte_idx: usize) -> Option<&str> {
	text.get(byte_idx..)?.graphemes(true).next()
}

/// Returns the full grapheme cluster that ends at byte offset `byte_idx`
/// (exclusive).
pub fn grapheme_before(text: &str, byte_idx: usize) -> Option<&str> {
	text.get(..byte_idx)?.graphemes(true).next_back()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn escapes_metacharacters() {
		assert_eq!(escape_regex("a.b*c"), r"a\.b\*c");
		assert_eq!(escape_regex("(1+1)=2?"), r"\(1\+1\)=2\?");
		assert_eq!(escape_regex("plain"), "plain");
	}

	#[test]
	fn escaped_text_matches_itself() {
		let raw = "price: $5.00 [tax] {x}|y^";
		let re = regex::Regex::new(&format!("^{}$", escape_regex(raw))).unwrap();
		assert!(re.is_match(raw));
	}

	#[test]
	fn ascii_characters_are_single() {
		assert_eq!(grapheme_at("test", 0), Some("t"));
		assert_eq!(grapheme_at("test", 1), Some("e"));
		assert_eq!(grapheme_before("test", 3), Some("s"));
	}

	#[test]
	fn surrogate_pair_comes_back_whole() {
		let text = "Hi😉there";
		assert_eq!(grapheme_at(text, 2), Some("😉"));
		assert_eq!(grapheme_before(text, 2 + "😉".len()), Some("😉"));
	}

	#[test]
	fn stops_after_a_normal_character() {
		assert_eq!(grapheme_at("Hi 😉 there", 2), Some(" "));
	}

	#[test]
	fn zwj_sequence_comes_back_whole() {
		let family = "👨\u{200d}👩\u{200d}👧\u{200d}👦";
		assert_eq!(grapheme_at(family, 0), Some(family));
	}

	#[test]
	fn first_character_backwards() {
		assert_eq!(grapheme_before("hello", 1), Some("h"));
		assert_eq!(grapheme_before("😉hello", "😉".len()), Some("😉"));
	}

	#[test]
	fn sequential_dashes_are_separate() {
		assert_eq!(grapheme_at("---", 0), Some("-"));
	}

	#[test]
	fn out_of_range_or_mid_char() {
		assert_eq!(grapheme_at("abc", 3), None);
		assert_eq!(grapheme_at("😉", 1), None);
		assert_eq!(grapheme_before("abc", 0), None);
		assert_eq!(grapheme_before("abc", 9), None);
	}
}
