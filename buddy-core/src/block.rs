use core::fmt;

/// Stable identifier for a [`Block`] inside an [`Arena`](crate::Arena)'s slab.
///
/// A `BlockId` is only meaningful for the arena that produced it; nothing in
/// this crate hands one out except `Arena` itself, so there is no way to
/// construct a dangling or foreign id from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct BlockId(pub(crate) u32);

impl BlockId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Where a block sits in the split/coalesce lifecycle.
///
/// A block transitions `Free -> Used` on allocation, `Used -> Free` on a
/// plain free, `Free -> Split` when chosen as the parent of a split, and
/// back to a fresh `Free` when both of its children coalesce. `Split`
/// blocks are never members of either container in their `OrderIndex`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockState {
    Free,
    Used,
    Split,
}

/// One contiguous, power-of-two-sized sub-range of the arena's address
/// space.
///
/// `prev`/`next` thread this block through whichever intrusive list
/// (`OrderIndex::free` or `OrderIndex::used`) currently owns it; a block is
/// a member of at most one such list at a time, so a single pair of links
/// suffices instead of one pair per container.
#[derive(Debug, Clone)]
pub(crate) struct Block {
    pub(crate) start_addr: u64,
    pub(crate) order: u32,
    pub(crate) state: BlockState,
    pub(crate) buddy: Option<BlockId>,
    pub(crate) parent: Option<BlockId>,
    pub(crate) prev: Option<BlockId>,
    pub(crate) next: Option<BlockId>,
}

impl Block {
    pub(crate) fn new(
        start_addr: u64,
        order: u32,
        buddy: Option<BlockId>,
        parent: Option<BlockId>,
    ) -> Self {
        Self {
            start_addr,
            order,
            state: BlockState::Free,
            buddy,
            parent,
            prev: None,
            next: None,
        }
    }
}

/// A non-owning reference to a live block, returned by [`Arena::alloc`](crate::Arena::alloc)
/// and consumed by [`Arena::free`](crate::Arena::free).
///
/// Valid only until it is passed back to `free`. Holding on to a handle past
/// its `free` call and using it again is a double-free, reported as
/// [`FreeError`](crate::FreeError) rather than undefined behavior: even
/// though the slot it named may since have been destroyed and reused for an
/// unrelated block, `free` also checks the handle's `start_addr`/`order`
/// against that slot's current block, so a stale handle can't be mistaken
/// for a live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHandle {
    /// Base address of this block within the arena's managed range.
    pub start_addr: u64,
    /// This block's order; its size is `page_size * 2^order`.
    pub order: u32,
    pub(crate) id: BlockId,
}

impl fmt::Display for BlockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "order {} @ 0x{:x}", self.order, self.start_addr)
    }
}
