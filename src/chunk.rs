//! Fixed-width overlapping character chunker.
//!
//! Splits extracted text blocks into windows of at most `max_size`
//! characters with `overlap` characters shared between consecutive windows.
//! Chunk boundaries never span two input blocks, and the window indices are
//! character-based rather than token-based, so chunk size is only a rough
//! proxy for embedding-model token cost.

/// Collapse runs of whitespace (including newlines) to single spaces and
/// trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split blocks into ordered chunk texts. Pure and deterministic.
///
/// Each block is whitespace-normalized first. A block no longer than
/// `max_size` is emitted as a single chunk; longer blocks are sliced by a
/// sliding window that advances `max_size - overlap` characters per step.
/// The advance is clamped to at least 1 so the loop terminates even when
/// `overlap >= max_size`. Empty or whitespace-only slices are dropped.
pub fn split_blocks(blocks: &[String], max_size: usize, overlap: usize) -> Vec<String> {
    let step = max_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();

    for block in blocks {
        let normalized = normalize_whitespace(block);
        let chars: Vec<char> = normalized.chars().collect();
        if chars.is_empty() {
            continue;
        }
        if chars.len() <= max_size {
            chunks.push(normalized);
            continue;
        }

        let mut start = 0;
        loop {
            let end = (start + max_size).min(chars.len());
            let piece: String = chars[start..end].iter().collect();
            if !piece.trim().is_empty() {
                chunks.push(piece);
            }
            if end >= chars.len() {
                break;
            }
            start += step;
        }
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    /// Expected chunk count for an over-length block: ceil((L - overlap) / (max - overlap)).
    fn expected_count(len: usize, max_size: usize, overlap: usize) -> usize {
        (len - overlap).div_ceil(max_size - overlap)
    }

    #[test]
    fn short_block_is_one_normalized_chunk() {
        let chunks = split_blocks(&blocks(&["  hello\n\n  world  "]), 100, 10);
        assert_eq!(chunks, vec!["hello world"]);
    }

    #[test]
    fn empty_blocks_produce_nothing() {
        assert!(split_blocks(&blocks(&["", "   ", "\n\n\t"]), 100, 10).is_empty());
        assert!(split_blocks(&[], 100, 10).is_empty());
    }

    #[test]
    fn long_block_chunk_count_matches_formula() {
        for (len, max_size, overlap) in [(100, 30, 10), (1000, 120, 20), (57, 10, 3), (64, 32, 0)]
        {
            let text: String = std::iter::repeat('x').take(len).collect();
            let chunks = split_blocks(&blocks(&[&text]), max_size, overlap);
            assert_eq!(
                chunks.len(),
                expected_count(len, max_size, overlap),
                "len={} max={} overlap={}",
                len,
                max_size,
                overlap
            );
        }
    }

    #[test]
    fn consecutive_chunks_share_exactly_overlap_chars() {
        let text: String = ('a'..='z').cycle().take(100).collect();
        let max_size = 30;
        let overlap = 10;
        let chunks = split_blocks(&blocks(&[&text]), max_size, overlap);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let prev_tail: String = pair[0].chars().skip(max_size - overlap).collect();
            let next_head: String = pair[1].chars().take(overlap).collect();
            assert_eq!(prev_tail, next_head);
        }
    }

    #[test]
    fn final_chunk_may_be_shorter_but_never_empty() {
        let text: String = std::iter::repeat('y').take(95).collect();
        let chunks = split_blocks(&blocks(&[&text]), 30, 10);
        let last = chunks.last().unwrap();
        assert!(!last.is_empty());
        assert!(last.chars().count() <= 30);
        // Reassemble: stripping each chunk's overlap prefix reproduces the text.
        let mut rebuilt: String = chunks[0].clone();
        for c in &chunks[1..] {
            rebuilt.extend(c.chars().skip(10));
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn terminates_when_overlap_not_less_than_max_size() {
        let text: String = std::iter::repeat('z').take(50).collect();
        // overlap == max_size and overlap > max_size must both terminate
        let chunks = split_blocks(&blocks(&[&text]), 10, 10);
        assert!(!chunks.is_empty());
        let chunks = split_blocks(&blocks(&[&text]), 10, 25);
        assert!(!chunks.is_empty());
    }

    #[test]
    fn blocks_are_chunked_independently_in_order() {
        let chunks = split_blocks(&blocks(&["first block", "second block"]), 100, 10);
        assert_eq!(chunks, vec!["first block", "second block"]);

        // A boundary never spans two blocks even when both are long.
        let a: String = std::iter::repeat('a').take(40).collect();
        let b: String = std::iter::repeat('b').take(40).collect();
        let chunks = split_blocks(&blocks(&[&a, &b]), 25, 5);
        for c in &chunks {
            let mixed = c.contains('a') && c.contains('b');
            assert!(!mixed, "chunk spans block boundary: {}", c);
        }
    }

    #[test]
    fn multibyte_text_is_sliced_on_char_boundaries() {
        let text: String = std::iter::repeat('é').take(40).collect();
        let chunks = split_blocks(&blocks(&[&text]), 16, 4);
        assert_eq!(chunks.len(), expected_count(40, 16, 4));
        for c in &chunks {
            assert!(c.chars().count() <= 16);
        }
    }
}
