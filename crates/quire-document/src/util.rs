//! Character-indexed string helpers.
//!
//! Columns throughout the crate count `char`s.

/// Number of characters in `text`.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte offset of the character at `column`, or `text.len()` past the end.
pub fn byte_offset(text: &str, column: usize) -> usize {
    text.char_indices()
        .nth(column)
        .map_or(text.len(), |(offset, _)| offset)
}

/// Split `text` at a character column.
pub fn split_at_column(text: &str, column: usize) -> (&str, &str) {
    text.split_at(byte_offset(text, column))
}

/// Substring by character range, clamped to the text.
pub fn slice(text: &str, column: usize, count: usize) -> &str {
    let start = byte_offset(text, column);
    let rest = &text[start..];
    &rest[..byte_offset(rest, count)]
}

/// The character at `column`.
pub fn char_at(text: &str, column: usize) -> Option<char> {
    text.chars().nth(column)
}

/// Last column a cursor can occupy on a line: before a trailing newline,
/// otherwise after the last character.
pub fn last_cursor_column(text: &str) -> usize {
    let len = char_len(text);
    if text.ends_with('\n') {
        len - 1
    } else {
        len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_cursor_column() {
        assert_eq!(last_cursor_column(""), 0);
        assert_eq!(last_cursor_column("abc"), 3);
        assert_eq!(last_cursor_column("abc\n"), 3);
        assert_eq!(last_cursor_column("\n"), 0);
    }

    #[test]
    fn test_multibyte_columns() {
        let text = "héllo\n";
        assert_eq!(char_len(text), 6);
        assert_eq!(split_at_column(text, 2), ("hé", "llo\n"));
        assert_eq!(slice(text, 1, 3), "éll");
        assert_eq!(slice(text, 4, 10), "o\n");
        assert_eq!(char_at(text, 1), Some('é'));
    }
}
