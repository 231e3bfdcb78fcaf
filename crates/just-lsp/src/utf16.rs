//
// utf16.rs
//
// Conversions between LSP UTF-16 columns and byte offsets within a line
//

/// Convert a UTF-16 column offset (from LSP Position.character) to a byte
/// offset within the given line. Spans are stored as byte offsets, not
/// UTF-16 code units.
///
/// Columns past the end of the line clamp to `line.len()`. A column that
/// falls between the two halves of a surrogate pair lands after that
/// code point.
pub fn utf16_to_byte(line: &str, utf16_col: u32) -> usize {
    let target = utf16_col as usize;
    let mut utf16_count = 0;
    for (byte_idx, ch) in line.char_indices() {
        if utf16_count >= target {
            return byte_idx;
        }
        utf16_count += ch.len_utf16();
    }
    line.len()
}

/// Convert a byte offset within a line to a UTF-16 column.
///
/// Offsets past the end clamp to the line's UTF-16 length. An offset inside
/// a multi-byte code point counts that code point as not yet reached.
pub fn byte_to_utf16(line: &str, byte_offset: usize) -> u32 {
    let mut utf16_count = 0u32;
    for (byte_idx, ch) in line.char_indices() {
        if byte_idx + ch.len_utf8() > byte_offset {
            break;
        }
        utf16_count += ch.len_utf16() as u32;
    }
    utf16_count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_is_identity() {
        let line = "build: test";
        for i in 0..=line.len() {
            assert_eq!(utf16_to_byte(line, i as u32), i);
            assert_eq!(byte_to_utf16(line, i), i as u32);
        }
    }

    #[test]
    fn multi_byte_code_points() {
        // 'é' is two bytes, one UTF-16 unit
        let line = "é := x";
        assert_eq!(utf16_to_byte(line, 1), 2);
        assert_eq!(utf16_to_byte(line, 2), 3);
        assert_eq!(byte_to_utf16(line, 2), 1);
        assert_eq!(byte_to_utf16(line, 3), 2);
    }

    #[test]
    fn surrogate_pairs_count_two_units() {
        // U+1F600 is four bytes, two UTF-16 units
        let line = "\u{1F600}ab";
        assert_eq!(utf16_to_byte(line, 2), 4);
        assert_eq!(utf16_to_byte(line, 3), 5);
        assert_eq!(byte_to_utf16(line, 4), 2);
        assert_eq!(byte_to_utf16(line, 5), 3);
    }

    #[test]
    fn column_inside_surrogate_pair_lands_after_it() {
        let line = "\u{1F600}ab";
        assert_eq!(utf16_to_byte(line, 1), 4);
    }

    #[test]
    fn out_of_range_input_clamps() {
        let line = "a\u{1F600}";
        assert_eq!(utf16_to_byte(line, 100), line.len());
        assert_eq!(byte_to_utf16(line, 100), 3);
        assert_eq!(utf16_to_byte("", 5), 0);
        assert_eq!(byte_to_utf16("", 5), 0);
    }

    #[test]
    fn byte_offset_inside_code_point_rounds_down() {
        let line = "éx";
        assert_eq!(byte_to_utf16(line, 1), 0);
    }
}
