// How far past the nominal cut we look for the end of a sentence.
const BOUNDARY_WINDOW: usize = 200;

/// Split `text` into pieces of about `chunk_chars` characters. A cut is moved
/// forward to just after the next `.`, `?` or `!` followed by whitespace when
/// one occurs within the boundary window. Empty pieces are dropped.
pub fn split_chunks(text: &str, chunk_chars: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    let chars: Vec<char> = text.chars().collect();
    if chunk_chars == 0 || chars.len() <= chunk_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let mut end = (start + chunk_chars).min(chars.len());
        if end < chars.len() {
            let window_end = (end + BOUNDARY_WINDOW).min(chars.len());
            if let Some(off) = sentence_break(&chars[end..window_end]) {
                end += off + 1;
            }
        }
        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }
        start = end;
    }
    chunks
}

fn sentence_break(window: &[char]) -> Option<usize> {
    window
        .windows(2)
        .position(|w| matches!(w[0], '.' | '?' | '!') && w[1].is_whitespace())
}
