use std::sync::atomic::{AtomicU64, Ordering};

/// Size in bytes of one heap slot. Every scalar occupies exactly one slot.
pub const SLOT_SIZE: u64 = 8;

/// Granularity of block base addresses.
const BLOCK_ALIGN: u64 = 4096;

/// First address handed out. Keeping the address space above 4 GiB means
/// small integers stored in memory never resolve into a block.
const ADDRESS_BASE: u64 = 1 << 32;

/// Tag bit carried by words that encode a heap link id.
pub const LINK_TAG: u64 = 1 << 63;

static NEXT_BLOCK_BASE: AtomicU64 = AtomicU64::new(ADDRESS_BASE);

/// Reserves a fresh, never reused, address range large enough for `slots`.
///
/// Ranges are unique across every heap in the process, so blocks keep their
/// addresses when one heap is merged into another.
pub(crate) fn reserve_block_range(slots: usize) -> u64 {
    let bytes = (slots as u64).saturating_mul(SLOT_SIZE);
    let span = bytes.div_ceil(BLOCK_ALIGN).max(1) * BLOCK_ALIGN;
    NEXT_BLOCK_BASE.fetch_add(span, Ordering::Relaxed)
}

/// Returns `true` when `word` could be a heap address.
pub fn is_address(word: u64) -> bool {
    word >= ADDRESS_BASE && word & LINK_TAG == 0
}

/// Encodes a link id as a memory word.
pub fn link_word(id: u64) -> u64 {
    id | LINK_TAG
}

/// Decodes a memory word into a link id, if it carries the link tag.
pub fn word_link(word: u64) -> Option<u64> {
    if word & LINK_TAG != 0 {
        Some(word & !LINK_TAG)
    } else {
        None
    }
}
