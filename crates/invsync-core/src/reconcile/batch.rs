//! Chunking of bulk writes

/// Split `items` into consecutive chunks of at most `size` entries
///
/// A `size` of zero is treated as one.
pub fn chunks<T>(items: &[T], size: usize) -> std::slice::Chunks<'_, T> {
    items.chunks(size.max(1))
}
