use crate::executor::ChunkResult;

/// Index-ordered text of the successful chunks plus the indices that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedText {
    pub text: String,
    pub failed_chunks: Vec<usize>,
}

/// Concatenate successful chunk texts in index order with `separator`.
/// Failed chunks leave no placeholder; their indices are reported instead.
pub fn merge_results(results: &[ChunkResult], separator: &str) -> MergedText {
    let mut sorted: Vec<&ChunkResult> = results.iter().collect();
    sorted.sort_by_key(|r| r.index);

    let mut texts = Vec::with_capacity(sorted.len());
    let mut failed_chunks = Vec::new();
    for r in sorted {
        if r.success && !r.text.is_empty() {
            texts.push(r.text.as_str());
        } else {
            failed_chunks.push(r.index);
        }
    }
    if !failed_chunks.is_empty() {
        tracing::warn!(?failed_chunks, "merged transcript has gaps");
    }
    MergedText {
        text: texts.join(separator),
        failed_chunks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_index_ordered_regardless_of_input_order() {
        let results = vec![
            ChunkResult::succeeded(2, "c"),
            ChunkResult::succeeded(0, "a"),
            ChunkResult::succeeded(1, "b"),
        ];
        let merged = merge_results(&results, " ");
        assert_eq!(merged.text, "a b c");
        assert!(merged.failed_chunks.is_empty());
    }

    #[test]
    fn failed_chunks_are_reported_not_filled() {
        let results = vec![
            ChunkResult::succeeded(0, "a"),
            ChunkResult::failed(1, "boom"),
            ChunkResult::succeeded(2, "c"),
            ChunkResult::failed(3, "boom"),
        ];
        let merged = merge_results(&results, "\n");
        assert_eq!(merged.text, "a\nc");
        assert_eq!(merged.failed_chunks, vec![1, 3]);
    }
}
