/// Chunks handed to the pool per worker; more than one smooths out uneven file sizes
pub const CHUNKS_PER_WORKER: usize = 4;

/// Number of chunks to cut for `concurrency` workers, never zero
pub fn target_chunks(concurrency: usize) -> usize {
    CHUNKS_PER_WORKER * concurrency.max(1)
}

/// Splits `items` into at most `target_chunks` contiguous chunks of
/// `ceil(len / target_chunks)` items each; the last chunk may be shorter.
///
/// Order is preserved within and across chunks, so concatenating the result
/// reproduces the input. Empty input yields no chunks.
pub fn split_chunks<T: Clone>(items: &[T], target_chunks: usize) -> Vec<Vec<T>> {
    if items.is_empty() {
        return Vec::new();
    }

    let chunk_size = items.len().div_ceil(target_chunks.max(1));
    items.chunks(chunk_size).map(<[T]>::to_vec).collect()
}
