//! Sentence-aware chunking of extracted text.
//!
//! Splits one text blob into overlapping, token-bounded windows. Boundaries
//! follow UAX#29 sentences so chunks avoid mid-sentence cuts; a single
//! sentence larger than the window is hard-split on word boundaries. PDF
//! pages never pass through here — each page is already a retrieval unit.

use unicode_segmentation::UnicodeSegmentation;

/// Approximate token count: UAX#29 word boundaries.
pub fn token_count(text: &str) -> usize {
    text.unicode_words().count()
}

/// Splits `text` into overlapping chunks of at most `max_tokens` tokens.
///
/// Consecutive chunks share up to `overlap_tokens` tokens of trailing
/// sentences from the previous chunk. Empty or whitespace-only input yields
/// an empty vec; callers decide whether that is an error.
pub fn chunk_text(text: &str, max_tokens: usize, overlap_tokens: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() || max_tokens == 0 {
        return Vec::new();
    }

    let mut units: Vec<(String, usize)> = Vec::new();
    for sentence in text.unicode_sentences() {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }
        let tokens = token_count(sentence);
        if tokens <= max_tokens {
            units.push((sentence.to_string(), tokens));
        } else {
            split_oversized(sentence, max_tokens, &mut units);
        }
    }

    let mut chunks = Vec::new();
    let mut window: Vec<(String, usize)> = Vec::new();
    let mut window_tokens = 0usize;

    for (sentence, tokens) in units {
        if window_tokens + tokens > max_tokens && !window.is_empty() {
            chunks.push(join_window(&window));

            // Carry trailing sentences into the next window, bounded by both
            // the overlap budget and the room the incoming sentence needs.
            let mut carried: Vec<(String, usize)> = Vec::new();
            let mut carried_tokens = 0usize;
            for unit in window.iter().rev() {
                if carried_tokens + unit.1 > overlap_tokens
                    || carried_tokens + unit.1 + tokens > max_tokens
                {
                    break;
                }
                carried_tokens += unit.1;
                carried.push(unit.clone());
            }
            carried.reverse();
            window = carried;
            window_tokens = carried_tokens;
        }
        window_tokens += tokens;
        window.push((sentence, tokens));
    }

    if !window.is_empty() {
        chunks.push(join_window(&window));
    }

    chunks
}

fn join_window(window: &[(String, usize)]) -> String {
    window
        .iter()
        .map(|(sentence, _)| sentence.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

fn split_oversized(sentence: &str, max_tokens: usize, units: &mut Vec<(String, usize)>) {
    let words: Vec<&str> = sentence.split_whitespace().collect();
    for piece in words.chunks(max_tokens) {
        let joined = piece.join(" ");
        let tokens = token_count(&joined);
        if tokens > 0 {
            units.push((joined, tokens));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_nothing() {
        assert!(chunk_text("", 64, 8).is_empty());
        assert!(chunk_text("   \n\t  ", 64, 8).is_empty());
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = chunk_text("A short note.", 64, 8);
        assert_eq!(chunks, vec!["A short note.".to_string()]);
    }

    #[test]
    fn chunks_respect_token_bound() {
        let text = "One two three four five. ".repeat(40);
        let chunks = chunk_text(&text, 20, 5);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(
                token_count(chunk) <= 20,
                "chunk exceeds bound: {chunk:?}"
            );
        }
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let text = "Alpha beta gamma delta. Epsilon zeta eta theta. \
                    Iota kappa lambda mu. Nu xi omicron pi. Rho sigma tau upsilon."
            .to_string();
        let chunks = chunk_text(&text, 8, 4);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let last_sentence = pair[0]
                .rsplit(". ")
                .next()
                .unwrap()
                .trim_end_matches('.');
            assert!(
                pair[1].contains(last_sentence),
                "expected overlap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn oversized_sentence_is_hard_split() {
        let long_sentence = format!("{} end", "word ".repeat(50));
        let chunks = chunk_text(&long_sentence, 10, 2);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(token_count(chunk) <= 10);
        }
    }

    #[test]
    fn sentences_stay_whole_when_they_fit() {
        let text = "First sentence here. Second sentence follows. Third one closes.";
        let chunks = chunk_text(text, 4, 0);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], "First sentence here.");
        assert_eq!(chunks[1], "Second sentence follows.");
        assert_eq!(chunks[2], "Third one closes.");
    }
}
