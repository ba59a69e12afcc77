//! Separator-driven splitting into contiguous pieces.

/// Cut `text` into contiguous pieces of at most `budget` characters.
///
/// The first separator present in the text is used; each separator stays
/// attached to the piece before it. Oversized pieces recurse with the
/// remaining separators. `""` splits between characters, and an exhausted
/// list falls back to hard cuts every `budget` characters.
pub(super) fn split_pieces<'a>(text: &'a str, budget: usize, separators: &[String]) -> Vec<&'a str> {
    let mut pieces = Vec::new();
    split_into(text, budget.max(1), separators, &mut pieces);
    pieces
}

fn split_into<'a>(text: &'a str, budget: usize, separators: &[String], out: &mut Vec<&'a str>) {
    if text.is_empty() {
        return;
    }
    if text.chars().count() <= budget {
        out.push(text);
        return;
    }

    let Some(position) = separators
        .iter()
        .position(|sep| sep.is_empty() || text.contains(sep.as_str()))
    else {
        hard_split(text, budget, out);
        return;
    };

    let separator = separators[position].as_str();
    if separator.is_empty() {
        split_chars(text, out);
        return;
    }

    let remaining = &separators[position + 1..];
    for piece in text.split_inclusive(separator) {
        if piece.chars().count() <= budget {
            out.push(piece);
        } else {
            split_into(piece, budget, remaining, out);
        }
    }
}

fn split_chars<'a>(text: &'a str, out: &mut Vec<&'a str>) {
    let mut indices = text.char_indices().map(|(i, _)| i).peekable();
    while let Some(start) = indices.next() {
        let end = indices.peek().copied().unwrap_or(text.len());
        out.push(&text[start..end]);
    }
}

fn hard_split<'a>(text: &'a str, budget: usize, out: &mut Vec<&'a str>) {
    let mut start = 0;
    let mut count = 0;
    for (i, _) in text.char_indices() {
        if count == budget {
            out.push(&text[start..i]);
            start = i;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
}
