//! Splitting identifier lists into backend-sized batches

/// The suite-api rejects bulk queries carrying more than this many resource ids
pub const MAX_IDS_PER_REQUEST: usize = 1000;

/// Lazily split `items` into consecutive chunks of at most `size` elements
///
/// Chunks cover the input in its original order; only the last one may be
/// shorter. An empty input yields no chunks. A `size` of zero is treated as one.
pub fn chunk_list<T>(items: &[T], size: usize) -> std::slice::Chunks<'_, T> {
    items.chunks(size.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_count_and_sizes() {
        let items: Vec<u32> = (0..2500).collect();
        let chunks: Vec<&[u32]> = chunk_list(&items, 1000).collect();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 1000);
        assert_eq!(chunks[1].len(), 1000);
        assert_eq!(chunks[2].len(), 500);
    }

    #[test]
    fn test_exact_multiple_has_full_last_chunk() {
        let items: Vec<u32> = (0..2000).collect();
        let chunks: Vec<&[u32]> = chunk_list(&items, 1000).collect();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.len() == 1000));
    }

    #[test]
    fn test_concatenation_preserves_order() {
        for (len, size) in [(0usize, 3usize), (1, 3), (7, 3), (9, 3), (10, 1), (5, 10)] {
            let items: Vec<usize> = (0..len).collect();
            let chunks: Vec<&[usize]> = chunk_list(&items, size).collect();

            assert_eq!(chunks.len(), len.div_ceil(size), "len={len} size={size}");
            let flattened: Vec<usize> = chunks.concat();
            assert_eq!(flattened, items);
        }
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        let items: Vec<String> = Vec::new();
        assert_eq!(chunk_list(&items, MAX_IDS_PER_REQUEST).count(), 0);
    }

    #[test]
    fn test_zero_size_is_treated_as_one() {
        let items = ["a", "b"];
        assert_eq!(chunk_list(&items, 0).count(), 2);
    }
}
