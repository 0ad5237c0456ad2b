//! Fixed-budget character chunking with a sliding overlap.
//!
//! Page text is split with `semchunk-rs`, which prefers sentence and word
//! boundaries while honoring a hard character budget. A character-limited tail
//! of the previous chunk is then prepended to each subsequent chunk so spans
//! around the boundaries stay visible to retrieval.

use semchunk_rs::Chunker;

/// Split one page of text into chunks of at most `chunk_size` characters.
///
/// `overlap` characters from the tail of the previous chunk are carried into the
/// next one; the combined chunk is trimmed from the front so it never exceeds
/// the budget. Whitespace-only input yields no chunks.
pub fn chunk_page(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let chunk_size = chunk_size.max(1);
    let chunker = Chunker::new(chunk_size, Box::new(|segment: &str| segment.chars().count()));
    let base_chunks = chunker.chunk(text);
    apply_overlap(base_chunks, chunk_size, overlap)
}

fn apply_overlap(chunks: Vec<String>, chunk_size: usize, overlap: usize) -> Vec<String> {
    let effective_overlap = overlap.min(chunk_size.saturating_sub(1));
    if effective_overlap == 0 || chunks.is_empty() {
        return chunks;
    }

    let mut overlapped = Vec::with_capacity(chunks.len());
    let mut iter = chunks.into_iter();
    let Some(mut previous) = iter.next() else {
        return Vec::new();
    };
    overlapped.push(previous.clone());

    for current in iter {
        let tail = char_tail(&previous, effective_overlap);
        let mut combined = String::with_capacity(tail.len() + current.len() + 1);
        if !tail.is_empty() {
            combined.push_str(tail);
            if !tail.ends_with(char::is_whitespace) && !current.starts_with(char::is_whitespace) {
                combined.push(' ');
            }
        }
        combined.push_str(&current);
        overlapped.push(trim_to_char_budget(combined, chunk_size));
        previous = current;
    }

    overlapped
}

/// Last `limit` characters of `text`, trimmed of leading whitespace.
fn char_tail(text: &str, limit: usize) -> &str {
    let total = text.chars().count();
    if total <= limit {
        return text.trim_start();
    }
    let start = text
        .char_indices()
        .nth(total - limit)
        .map(|(offset, _)| offset)
        .unwrap_or(text.len());
    text[start..].trim_start()
}

/// Trim from the front until the text fits the budget, keeping the newest content.
fn trim_to_char_budget(text: String, budget: usize) -> String {
    let total = text.chars().count();
    if total <= budget {
        return text;
    }
    let start = text
        .char_indices()
        .nth(total - budget)
        .map(|(offset, _)| offset)
        .unwrap_or(0);
    text[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_only_input_yields_no_chunks() {
        assert!(chunk_page("   \n\t  ", 100, 10).is_empty());
    }

    #[test]
    fn short_text_stays_in_a_single_chunk() {
        let chunks = chunk_page("a small page of text", 1000, 150);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "a small page of text");
    }

    #[test]
    fn every_chunk_respects_the_character_budget() {
        let words: Vec<String> = (0..400).map(|i| format!("word{i}")).collect();
        let text = words.join(" ");
        let chunks = chunk_page(&text, 120, 30);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(
                chunk.chars().count() <= 120,
                "chunk exceeded budget: {} chars",
                chunk.chars().count()
            );
        }
    }

    #[test]
    fn later_chunks_carry_content_from_the_previous_chunk() {
        let words: Vec<String> = (0..200).map(|i| format!("tok{i}")).collect();
        let text = words.join(" ");
        let chunks = chunk_page(&text, 100, 40);
        assert!(chunks.len() > 2);

        // The second chunk must open with a word that already appeared in the first.
        let first_words: Vec<&str> = chunks[0].split_whitespace().collect();
        let second_start = chunks[1]
            .split_whitespace()
            .next()
            .expect("second chunk has content");
        assert!(
            first_words.contains(&second_start),
            "expected overlap word, got '{second_start}'"
        );
    }

    #[test]
    fn zero_overlap_leaves_chunks_untouched() {
        let text = "one two three four five six seven eight nine ten".repeat(10);
        let plain = chunk_page(&text, 80, 0);
        for chunk in &plain {
            assert!(chunk.chars().count() <= 80);
        }
    }
}
