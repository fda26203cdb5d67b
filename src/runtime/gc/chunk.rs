/// A free run of contiguous slots inside one block.
///
/// Chunks of a heap form its free list; allocation is first-fit over the list
/// in order and splits the winning chunk from the front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub block: u64,
    pub start: usize,
    pub len: usize,
}

impl Chunk {
    pub fn new(block: u64, start: usize, len: usize) -> Self {
        Self { block, start, len }
    }

    /// Takes `slots` from the front of the chunk, returning the start slot of
    /// the taken run. The chunk shrinks in place.
    pub fn split_front(&mut self, slots: usize) -> usize {
        debug_assert!(slots <= self.len);
        let start = self.start;
        self.start += slots;
        self.len -= slots;
        start
    }
}

/// First-fit free list.
#[derive(Debug, Default)]
pub struct FreeList {
    chunks: Vec<Chunk>,
}

impl FreeList {
    pub fn new() -> Self {
        Self { chunks: Vec::new() }
    }

    pub fn push(&mut self, chunk: Chunk) {
        if chunk.len > 0 {
            self.chunks.push(chunk);
        }
    }

    /// Removes `slots` from the first chunk large enough to hold them.
    ///
    /// Returns the block base and start slot of the reserved run.
    pub fn take_first_fit(&mut self, slots: usize) -> Option<(u64, usize)> {
        let mut i = 0;
        let len = self.chunks.len();
        while i < len {
            if self.chunks[i].len >= slots {
                let block = self.chunks[i].block;
                let start = self.chunks[i].split_front(slots);
                if self.chunks[i].len == 0 {
                    self.chunks.remove(i);
                }
                return Some((block, start));
            }
            i += 1;
        }
        None
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
    }

    pub fn extend(&mut self, other: FreeList) {
        self.chunks.extend(other.chunks);
    }

    /// Total number of free slots across all chunks.
    pub fn free_slots(&self) -> usize {
        self.chunks.iter().map(|chunk| chunk.len).sum()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_fit_skips_small_chunks() {
        let mut list = FreeList::new();
        list.push(Chunk::new(100, 0, 2));
        list.push(Chunk::new(200, 4, 8));
        list.push(Chunk::new(300, 0, 16));

        assert_eq!(list.take_first_fit(5), Some((200, 4)));
        assert_eq!(list.take_first_fit(3), Some((200, 9)));
        assert_eq!(list.free_slots(), 2 + 16);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn exhausted_chunks_are_removed() {
        let mut list = FreeList::new();
        list.push(Chunk::new(100, 0, 4));
        assert_eq!(list.take_first_fit(4), Some((100, 0)));
        assert!(list.is_empty());
        assert_eq!(list.take_first_fit(1), None);
    }

    #[test]
    fn empty_chunks_are_never_listed() {
        let mut list = FreeList::new();
        list.push(Chunk::new(100, 3, 0));
        assert!(list.is_empty());
    }
}
