//! Greedy window packing with overlap.

use super::Segment;

/// Pack contiguous `pieces` of `text` into segments of at most `max` chars.
///
/// The first window may hold `max` characters of fresh text; later windows
/// hold at most `max - overlap` and are prefixed with the `overlap`
/// characters preceding them. Each piece must be no longer than
/// `max - overlap`.
pub(super) fn pack_with_overlap(
    text: &str,
    pieces: &[&str],
    max: usize,
    overlap: usize,
) -> Vec<Segment> {
    // Fresh-content windows as (start byte, end byte, start char)
    let mut windows: Vec<(usize, usize, usize)> = Vec::new();
    let mut start_byte = 0;
    let mut end_byte = 0;
    let mut start_char = 0;
    let mut window_chars = 0;
    let mut budget = max;

    for piece in pieces {
        let piece_chars = piece.chars().count();
        if window_chars > 0 && window_chars + piece_chars > budget {
            windows.push((start_byte, end_byte, start_char));
            start_byte = end_byte;
            start_char += window_chars;
            window_chars = 0;
            budget = max - overlap;
        }
        end_byte += piece.len();
        window_chars += piece_chars;
    }
    windows.push((start_byte, end_byte, start_char));

    windows
        .into_iter()
        .enumerate()
        .map(|(index, (fresh_start, fresh_end, fresh_char))| {
            if index == 0 {
                return Segment {
                    text: text[fresh_start..fresh_end].to_string(),
                    index,
                    source_offset: fresh_char,
                };
            }
            let start = back_by_chars(text, fresh_start, overlap);
            Segment {
                text: text[start..fresh_end].to_string(),
                index,
                source_offset: fresh_char.saturating_sub(overlap),
            }
        })
        .collect()
}

/// Byte offset `chars` characters before `byte` (clamped to 0).
fn back_by_chars(text: &str, byte: usize, chars: usize) -> usize {
    if chars == 0 {
        return byte;
    }
    text[..byte]
        .char_indices()
        .rev()
        .nth(chars - 1)
        .map(|(i, _)| i)
        .unwrap_or(0)
}
