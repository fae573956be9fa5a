//! Property-Based Tests for chunking and condensation joining.
//!
//! - Chunks reconstruct the input word sequence once overlaps are removed
//! - Adjacent chunks share exactly `overlap` words
//! - Text at or below the threshold is one chunk equal to the input
//! - Joined condensations follow chunk order whatever the arrival order

use paperbrief::pipeline::summarize::{join_condensations, Condensation};
use paperbrief::Chunker;
use proptest::prelude::*;

/// Words separated by a mix of whitespace runs.
fn text_strategy(max_words: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(
        (
            "[a-zA-Z0-9éß.,]{1,8}",
            prop::sample::select(vec![" ", "  ", "\n", "\t", " \n "]),
        ),
        0..max_words,
    )
    .prop_map(|parts| {
        let mut s = String::new();
        for (word, sep) in parts {
            s.push_str(&word);
            s.push_str(sep);
        }
        s
    })
}

/// `(size, overlap)` with `overlap < size`.
fn window_strategy() -> impl Strategy<Value = (usize, usize)> {
    (1usize..40).prop_flat_map(|size| (Just(size), 0..size))
}

// ============================================================================
// Windowing
// ============================================================================

/// Property: dropping each chunk's leading overlap rebuilds the word sequence
#[test]
fn proptest_chunks_reconstruct_words() {
    proptest!(|(text in text_strategy(300), (size, overlap) in window_strategy(), threshold in 0usize..60)| {
        let chunker = Chunker::new(threshold, size, overlap).unwrap();
        let chunks = chunker.chunk(&text);
        let expected: Vec<&str> = text.split_whitespace().collect();

        let mut rebuilt: Vec<&str> = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let words: Vec<&str> = chunk.text.split_whitespace().collect();
            prop_assert_eq!(words.len(), chunk.word_count());
            if i == 0 {
                rebuilt.extend(words);
            } else {
                rebuilt.extend(words.into_iter().skip(overlap));
            }
        }
        prop_assert_eq!(rebuilt, expected);
    });
}

/// Property: adjacent chunks share exactly `overlap` words
#[test]
fn proptest_adjacent_chunks_share_overlap() {
    proptest!(|(text in text_strategy(300), (size, overlap) in window_strategy())| {
        let chunker = Chunker::new(0, size, overlap).unwrap();
        let chunks = chunker.chunk(&text);

        for pair in chunks.windows(2) {
            prop_assert_eq!(pair[1].start, pair[0].end - overlap);
            let left: Vec<&str> = pair[0].text.split_whitespace().collect();
            let right: Vec<&str> = pair[1].text.split_whitespace().collect();
            prop_assert_eq!(&left[left.len() - overlap..], &right[..overlap]);
        }
    });
}

/// Property: every window respects the size bound and the last one reaches the end
#[test]
fn proptest_windows_bounded_and_complete() {
    proptest!(|(text in text_strategy(300), (size, overlap) in window_strategy())| {
        let chunker = Chunker::new(0, size, overlap).unwrap();
        let chunks = chunker.chunk(&text);
        let total = text.split_whitespace().count();

        prop_assert!(!chunks.is_empty());
        for (i, chunk) in chunks.iter().enumerate() {
            prop_assert_eq!(chunk.index, i);
            prop_assert!(chunk.word_count() <= size);
        }
        prop_assert_eq!(chunks.last().map(|c| c.end), Some(total));
    });
}

/// Property: text at or below the threshold is a single chunk equal to the input
#[test]
fn proptest_short_text_single_chunk() {
    proptest!(|(text in text_strategy(50), (size, overlap) in window_strategy())| {
        let words = text.split_whitespace().count();
        let chunker = Chunker::new(words, size, overlap).unwrap();
        let chunks = chunker.chunk(&text);
        prop_assert_eq!(chunks.len(), 1);
        prop_assert_eq!(chunks[0].text, text.as_str());
    });
}

/// Property: chunking is deterministic
#[test]
fn proptest_chunking_is_deterministic() {
    proptest!(|(text in text_strategy(200), (size, overlap) in window_strategy())| {
        let chunker = Chunker::new(0, size, overlap).unwrap();
        prop_assert_eq!(chunker.chunk(&text), chunker.chunk(&text));
    });
}

// ============================================================================
// Condensation join order
// ============================================================================

/// Property: the structuring input is the index-ordered join for any arrival order
#[test]
fn proptest_join_ignores_arrival_order() {
    proptest!(|(order in Just((0..12usize).collect::<Vec<_>>()).prop_shuffle())| {
        let arrived: Vec<Condensation> = order
            .iter()
            .map(|&i| Condensation { index: i, text: format!("part {i}") })
            .collect();
        let expected = (0..12).map(|i| format!("part {i}")).collect::<Vec<_>>().join("\n\n");
        prop_assert_eq!(join_condensations(arrived), expected);
    });
}
