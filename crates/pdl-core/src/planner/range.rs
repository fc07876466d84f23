//! Chunk type and range planning.

/// One chunk: byte range `[start, end]` (inclusive end), indexed in offset order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub start: u64,
    pub end: u64,
}

impl Chunk {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// HTTP `Range` header value: `bytes=start-end`.
    pub fn range_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// Number of chunks [`plan_chunks`] produces for these arguments.
pub fn chunk_count(total_size: u64, max_chunk_size: u64) -> u64 {
    if max_chunk_size == 0 {
        return 0;
    }
    total_size.div_ceil(max_chunk_size)
}

/// Partition `[0, total_size - 1]` into chunks of at most `max_chunk_size`
/// bytes; the last one is clipped. Empty when either argument is 0.
///
/// The result holds [`chunk_count`] entries; bound that before calling with a
/// size taken from the network.
pub fn plan_chunks(total_size: u64, max_chunk_size: u64) -> Vec<Chunk> {
    if total_size == 0 || max_chunk_size == 0 {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut start = 0u64;
    while start < total_size {
        let end = start.saturating_add(max_chunk_size - 1).min(total_size - 1);
        out.push(Chunk {
            index: out.len(),
            start,
            end,
        });
        start = end + 1;
    }
    out
}
