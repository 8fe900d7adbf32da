use crate::block::{Block, BlockHandle, BlockId, BlockState};
use crate::error::{ConfigError, FreeError};
use crate::order_index::{self, OrderIndex};

/// Read-only per-order snapshot returned by [`Arena::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderStats {
    /// Order this row describes; its block size is `page_size * 2^order`.
    pub order: u32,
    /// Number of blocks of this order currently free.
    pub free_count: usize,
    /// Number of blocks of this order currently allocated.
    pub used_count: usize,
}

/// Smallest `k` such that `2^k >= n`, for `n >= 1`.
fn ceil_log2(n: u64) -> u32 {
    if n <= 1 {
        0
    } else {
        u64::BITS - (n - 1).leading_zeros()
    }
}

/// An arena managing one contiguous abstract address range
/// `[start_addr, start_addr + page_size * 2^max_order)` with a binary buddy
/// allocator.
///
/// No real memory backs the range: `Arena` only tracks which sub-ranges are
/// free or used. Every live [`Block`] is owned by the arena's slab and
/// addressed by a [`BlockId`] index rather than a pointer, so splitting and
/// coalescing never needs `unsafe`.
///
/// ```text
///   order 2   |---------------- one block, 4 pages ----------------|
///   order 1   |------- block -------|------- block -------|
///   order 0   |-block-|-block-|-block-|-block-|
/// ```
///
/// Allocating descends from the requested order toward `max_order` until it
/// finds a free block, splitting each block it passes through on the way
/// back down (§4.3/§4.4 in the design notes this crate was built from).
/// Freeing walks back up: a freed block merges with its buddy whenever that
/// buddy is also free, cascading all the way to the root if every block
/// along the way turns out free too.
pub struct Arena {
    start_addr: u64,
    page_size: u64,
    max_order: u32,
    shift_count: u32,
    slab: Vec<Option<Block>>,
    free_slots: Vec<BlockId>,
    orders: Vec<OrderIndex>,
}

impl Arena {
    /// Construct an arena covering `page_size * 2^max_order` bytes starting
    /// at `start_addr`.
    ///
    /// `max_order` is taken as a signed value purely so a negative input can
    /// be rejected with [`ConfigError`] rather than silently wrapping; the
    /// arena itself only ever works with the validated, non-negative order.
    pub fn new(max_order: i32, page_size: u64, start_addr: u64) -> Result<Self, ConfigError> {
        if max_order < 0 {
            return Err(ConfigError::NegativeMaxOrder(max_order));
        }
        if page_size == 0 || !page_size.is_power_of_two() {
            return Err(ConfigError::InvalidPageSize(page_size));
        }
        let max_order = max_order as u32;
        let shift_count = page_size.trailing_zeros();

        let mut orders = vec![OrderIndex::new(); max_order as usize + 1];
        let mut slab = vec![Some(Block::new(start_addr, max_order, None, None))];
        let free_slots = Vec::new();

        let root = BlockId(0);
        let top = &mut orders[max_order as usize];
        order_index::push_front(&mut slab, &mut top.free_head, &mut top.free_count, root);

        Ok(Self {
            start_addr,
            page_size,
            max_order,
            shift_count,
            slab,
            free_slots,
            orders,
        })
    }

    /// Base address of the managed range.
    pub fn start_addr(&self) -> u64 {
        self.start_addr
    }

    /// Page size this arena was configured with.
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Largest order this arena can serve.
    pub fn max_order(&self) -> u32 {
        self.max_order
    }

    /// Target order for a request expressed as a *page count*, not a byte
    /// count: `size = 1` is order 0, but `size = page_size` is order 1, not
    /// order 0. This mirrors the reference allocator's `size >>
    /// shift_count` sizing convention; callers working in bytes should use
    /// [`Arena::order_for_byte_size`] instead.
    pub fn order_for_page_count(&self, size: u64) -> u32 {
        (size >> self.shift_count) as u32
    }

    /// Target order for a request expressed as a byte count: the smallest
    /// `k` such that `page_size * 2^k >= size`.
    pub fn order_for_byte_size(&self, size: u64) -> u32 {
        if size <= self.page_size {
            return 0;
        }
        let pages = size.div_ceil(self.page_size);
        ceil_log2(pages)
    }

    /// Allocate a block able to hold `size` pages (see
    /// [`Arena::order_for_page_count`] for what "size" means here).
    ///
    /// Returns `None` if no block of the computed order is available and
    /// none can be manufactured by splitting a larger one.
    pub fn alloc(&mut self, size: u64) -> Option<BlockHandle> {
        self.alloc_order(self.order_for_page_count(size))
    }

    /// Allocate a block of exactly the given order.
    pub fn alloc_order(&mut self, order: u32) -> Option<BlockHandle> {
        let id = self.alloc_at(order)?;
        Some(self.handle_of(id))
    }

    fn alloc_at(&mut self, order: u32) -> Option<BlockId> {
        if order > self.max_order {
            return None;
        }
        let oi = order as usize;
        if let Some(id) = self.orders[oi].free_head {
            self.move_to_used(order, id);
            log::trace!(
                "alloc: order {order} satisfied directly, block at 0x{:x}",
                self.slot(id).start_addr
            );
            return Some(id);
        }

        let parent = self.alloc_at(order + 1)?;
        let parent_addr = self.slot(parent).start_addr;
        let (low, _high) = self.split(parent);
        log::debug!(
            "alloc: split order {} block at 0x{parent_addr:x} to satisfy order {order}",
            order + 1
        );
        self.move_to_used(order, low);
        Some(low)
    }

    /// Split `parent` (currently accounted used at its order) into two
    /// order-1-lower children, both inserted into that order's free list.
    /// `parent` itself transitions to `Split` and leaves the used
    /// container (it is neither free nor used until its children
    /// eventually coalesce back into it).
    fn split(&mut self, parent: BlockId) -> (BlockId, BlockId) {
        let order = self.slot(parent).order;
        debug_assert!(order > 0, "cannot split an order-0 block");
        let parent_oi = order as usize;
        {
            let p = &mut self.orders[parent_oi];
            order_index::remove(&mut self.slab, &mut p.used_head, &mut p.used_count, parent);
        }
        self.slot_mut(parent).state = BlockState::Split;

        let start = self.slot(parent).start_addr;
        let child_order = order - 1;
        let child_size = self.page_size << child_order;

        let low = self.new_block(Block::new(start, child_order, None, Some(parent)));
        let high = self.new_block(Block::new(
            start + child_size,
            child_order,
            Some(low),
            Some(parent),
        ));
        self.slot_mut(low).buddy = Some(high);

        let child_oi = child_order as usize;
        let c = &mut self.orders[child_oi];
        order_index::push_front(&mut self.slab, &mut c.free_head, &mut c.free_count, high);
        order_index::push_front(&mut self.slab, &mut c.free_head, &mut c.free_count, low);

        (low, high)
    }

    fn move_to_used(&mut self, order: u32, id: BlockId) {
        let oi = order as usize;
        let o = &mut self.orders[oi];
        order_index::remove(&mut self.slab, &mut o.free_head, &mut o.free_count, id);
        order_index::push_front(&mut self.slab, &mut o.used_head, &mut o.used_count, id);
        self.slot_mut(id).state = BlockState::Used;
    }

    /// Return `handle` to the arena, coalescing it with its buddy (and that
    /// merge's buddy, and so on) as far as the tree allows.
    ///
    /// Fails with [`FreeError`] if `handle` does not currently name a block
    /// accounted as used (covers both double-frees and handles that were
    /// never produced by this arena's slot range). Also rejects a stale
    /// handle whose slot has since been destroyed and reused for an
    /// unrelated block (checked via `start_addr`/`order`, since a slot id
    /// alone can't tell the two apart): without that check, freeing a
    /// handle twice could free whatever new block the coalesce-then-split
    /// cycle put in its old slot instead of reporting the double free. The
    /// arena is left unchanged on error.
    pub fn free(&mut self, handle: BlockHandle) -> Result<(), FreeError> {
        let id = handle.id;
        let live_and_used = self
            .slab
            .get(id.index())
            .and_then(Option::as_ref)
            .is_some_and(|b| {
                b.state == BlockState::Used
                    && b.start_addr == handle.start_addr
                    && b.order == handle.order
            });
        if !live_and_used {
            return Err(FreeError::NotCurrentlyUsed);
        }

        let order = self.slot(id).order;
        let oi = order as usize;
        {
            let o = &mut self.orders[oi];
            order_index::remove(&mut self.slab, &mut o.used_head, &mut o.used_count, id);
        }
        self.reinstate(id);
        Ok(())
    }

    /// Insert `id` into its order's free list, coalescing upward as far as
    /// possible. `id` must not currently be a member of any container (the
    /// caller has just removed it from `used`, or it is a block freshly
    /// reassembled from a coalesce one level down).
    fn reinstate(&mut self, id: BlockId) {
        let order = self.slot(id).order;
        let buddy = self.slot(id).buddy;
        let buddy_is_free = buddy.is_some_and(|b| self.slot(b).state == BlockState::Free);

        if !buddy_is_free {
            self.slot_mut(id).state = BlockState::Free;
            let o = &mut self.orders[order as usize];
            order_index::push_front(&mut self.slab, &mut o.free_head, &mut o.free_count, id);
            log::trace!(
                "free: order {order} block at 0x{:x} returned without coalescing",
                self.slot(id).start_addr
            );
            return;
        }

        let buddy = match buddy {
            Some(b) => b,
            None => unreachable!("buddy_is_free implies a buddy exists"),
        };
        {
            let o = &mut self.orders[order as usize];
            order_index::remove(&mut self.slab, &mut o.free_head, &mut o.free_count, buddy);
        }
        let parent = self.slot(id).parent;
        self.destroy_block_slot(id);
        self.destroy_block_slot(buddy);

        match parent {
            Some(parent_id) => {
                log::debug!("free: coalesced order {order} pair, reinstating parent");
                self.reinstate(parent_id);
            }
            None => unreachable!("a block with a buddy always has a parent"),
        }
    }

    /// Per-order free/used counters. Does not mutate the arena; calling it
    /// twice in a row yields identical results.
    pub fn stats(&self) -> Vec<OrderStats> {
        self.orders
            .iter()
            .enumerate()
            .map(|(k, oi)| OrderStats {
                order: k as u32,
                free_count: oi.free_count,
                used_count: oi.used_count,
            })
            .collect()
    }

    /// Release every block and the order index. Equivalent to dropping the
    /// arena; spelled out as a method so callers mirroring the `arena_new` /
    /// `arena_alloc` / `arena_free` / `arena_stats` / `arena_destroy`
    /// surface have an explicit call site for the last one.
    pub fn destroy(self) {}

    fn new_block(&mut self, block: Block) -> BlockId {
        if let Some(id) = self.free_slots.pop() {
            self.slab[id.index()] = Some(block);
            id
        } else {
            debug_assert!(
                self.slab.len() < u32::MAX as usize,
                "slab grew past BlockId's u32 capacity"
            );
            let id = BlockId(self.slab.len() as u32);
            self.slab.push(Some(block));
            id
        }
    }

    fn destroy_block_slot(&mut self, id: BlockId) {
        self.slab[id.index()] = None;
        self.free_slots.push(id);
    }

    fn slot(&self, id: BlockId) -> &Block {
        match self.slab[id.index()].as_ref() {
            Some(block) => block,
            None => unreachable!("operation on a destroyed block id"),
        }
    }

    fn slot_mut(&mut self, id: BlockId) -> &mut Block {
        match self.slab[id.index()].as_mut() {
            Some(block) => block,
            None => unreachable!("operation on a destroyed block id"),
        }
    }

    fn handle_of(&self, id: BlockId) -> BlockHandle {
        let b = self.slot(id);
        BlockHandle {
            start_addr: b.start_addr,
            order: b.order,
            id,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn stats_row(arena: &Arena, order: u32) -> OrderStats {
        arena.stats()[order as usize]
    }

    #[test]
    fn init_leaves_single_free_root() {
        let arena = Arena::new(3, 4096, 0).unwrap();
        let expected: Vec<OrderStats> = (0..=3)
            .map(|k| OrderStats {
                order: k,
                free_count: if k == 3 { 1 } else { 0 },
                used_count: 0,
            })
            .collect();
        assert_eq!(arena.stats(), expected);
    }

    #[test]
    fn construction_rejects_bad_config() {
        assert_eq!(
            Arena::new(-1, 4096, 0).unwrap_err(),
            ConfigError::NegativeMaxOrder(-1)
        );
        assert_eq!(Arena::new(3, 0, 0).unwrap_err(), ConfigError::InvalidPageSize(0));
        assert_eq!(
            Arena::new(3, 3000, 0).unwrap_err(),
            ConfigError::InvalidPageSize(3000)
        );
    }

    #[test]
    fn alloc_order_zero_splits_down_from_root() {
        let mut arena = Arena::new(3, 4096, 0).unwrap();
        let block = arena.alloc_order(0).unwrap();
        assert_eq!(block.start_addr, 0);
        assert_eq!(block.order, 0);

        assert_eq!(stats_row(&arena, 0), OrderStats { order: 0, free_count: 1, used_count: 1 });
        assert_eq!(stats_row(&arena, 1), OrderStats { order: 1, free_count: 1, used_count: 0 });
        assert_eq!(stats_row(&arena, 2), OrderStats { order: 2, free_count: 1, used_count: 0 });
        assert_eq!(stats_row(&arena, 3), OrderStats { order: 3, free_count: 0, used_count: 0 });
    }

    #[test]
    fn free_after_single_alloc_restores_initial_state() {
        let mut arena = Arena::new(3, 4096, 0).unwrap();
        let block = arena.alloc_order(0).unwrap();
        arena.free(block).unwrap();

        for k in 0..3 {
            assert_eq!(stats_row(&arena, k), OrderStats { order: k, free_count: 0, used_count: 0 });
        }
        assert_eq!(stats_row(&arena, 3), OrderStats { order: 3, free_count: 1, used_count: 0 });
    }

    #[test]
    fn two_order_zero_allocs_exhaust_a_max_order_one_arena() {
        let mut arena = Arena::new(1, 4096, 0).unwrap();
        assert!(arena.alloc_order(0).is_some());
        assert!(arena.alloc_order(0).is_some());
        assert_eq!(stats_row(&arena, 0).used_count, 2);
        assert!(arena.alloc_order(0).is_none());
    }

    #[test]
    fn freeing_both_buddies_coalesces_all_the_way_to_root() {
        let mut arena = Arena::new(2, 4096, 0).unwrap();
        let a = arena.alloc_order(0).unwrap();
        let b = arena.alloc_order(0).unwrap();
        arena.free(a).unwrap();
        arena.free(b).unwrap();

        assert_eq!(stats_row(&arena, 2), OrderStats { order: 2, free_count: 1, used_count: 0 });
        assert_eq!(stats_row(&arena, 1), OrderStats { order: 1, free_count: 0, used_count: 0 });
        assert_eq!(stats_row(&arena, 0), OrderStats { order: 0, free_count: 0, used_count: 0 });
    }

    #[test]
    fn alloc_order_one_reuses_the_untouched_buddy_half() {
        let mut arena = Arena::new(2, 4096, 0).unwrap();
        let low = arena.alloc_order(0).unwrap();
        assert_eq!(low.start_addr, 0);

        let upper_half = arena.alloc_order(1).unwrap();
        assert_eq!(upper_half.start_addr, 8192);

        assert_eq!(stats_row(&arena, 0).free_count, 1);
        assert_eq!(stats_row(&arena, 1).used_count, 1);
        assert_eq!(stats_row(&arena, 2).free_count, 0);
    }

    #[test]
    fn double_free_is_rejected_without_mutating_state() {
        let mut arena = Arena::new(2, 4096, 0).unwrap();
        let block = arena.alloc_order(0).unwrap();
        arena.free(block).unwrap();

        let before = arena.stats();
        assert_eq!(arena.free(block), Err(FreeError::NotCurrentlyUsed));
        assert_eq!(arena.stats(), before);
    }

    #[test]
    fn stale_handle_into_a_reused_slot_is_rejected_not_silently_freed() {
        let mut arena = Arena::new(2, 4096, 0).unwrap();

        // Allocate and free an order-1 block; it coalesces all the way to
        // the root, destroying its slot and its buddy's slot.
        let stale = arena.alloc_order(1).unwrap();
        arena.free(stale).unwrap();

        // Split back down to an order-0 block, recycling those destroyed
        // slots for unrelated blocks along the way.
        let _order_zero = arena.alloc_order(0).unwrap();

        // Grab the other order-1 half left over from that split; its slot
        // happens to be the same one `stale` used to occupy, but at a
        // different address.
        let reused = arena.alloc_order(1).unwrap();
        assert_ne!(reused.start_addr, stale.start_addr);

        let before = arena.stats();
        assert_eq!(arena.free(stale), Err(FreeError::NotCurrentlyUsed));
        assert_eq!(arena.stats(), before);

        // The live block actually occupying that slot is untouched.
        arena.free(reused).unwrap();
    }

    #[test]
    fn exhaustion_is_monotonic_without_an_intervening_free() {
        let mut arena = Arena::new(1, 4096, 0).unwrap();
        assert!(arena.alloc_order(0).is_some());
        assert!(arena.alloc_order(0).is_some());
        assert!(arena.alloc_order(0).is_none());
        // Still exhausted at the same order; no free happened in between.
        assert!(arena.alloc_order(0).is_none());
        // A larger request is exhausted too.
        assert!(arena.alloc_order(1).is_none());
    }

    #[test]
    fn stats_is_idempotent() {
        let mut arena = Arena::new(2, 4096, 0).unwrap();
        let _block = arena.alloc_order(1).unwrap();
        assert_eq!(arena.stats(), arena.stats());
    }

    #[test]
    fn alloc_free_round_trip_restores_counters_for_arbitrary_order() {
        let mut arena = Arena::new(4, 4096, 0).unwrap();
        let before = arena.stats();
        let block = arena.alloc_order(2).unwrap();
        arena.free(block).unwrap();
        assert_eq!(arena.stats(), before);
    }

    #[test]
    fn allocating_and_freeing_in_reverse_order_leaks_nothing() {
        let mut arena = Arena::new(3, 4096, 0).unwrap();
        let initial = arena.stats();

        let mut handles = Vec::new();
        for _ in 0..4 {
            handles.push(arena.alloc_order(0).unwrap());
        }
        assert!(arena.alloc_order(0).is_none());

        for handle in handles.into_iter().rev() {
            arena.free(handle).unwrap();
        }
        assert_eq!(arena.stats(), initial);
    }

    #[test]
    fn page_count_convention_treats_size_as_page_count_not_bytes() {
        let arena = Arena::new(3, 4096, 0).unwrap();
        assert_eq!(arena.order_for_page_count(1), 0);
        assert_eq!(arena.order_for_page_count(4096), 1);
    }

    #[test]
    fn byte_size_convention_uses_ceiling_log() {
        let arena = Arena::new(3, 4096, 0).unwrap();
        assert_eq!(arena.order_for_byte_size(1), 0);
        assert_eq!(arena.order_for_byte_size(4096), 0);
        assert_eq!(arena.order_for_byte_size(4097), 1);
        assert_eq!(arena.order_for_byte_size(8192), 1);
        assert_eq!(arena.order_for_byte_size(8193), 2);
    }

    #[test]
    fn split_child_addresses_use_shifted_size_not_the_order_bug() {
        let mut arena = Arena::new(1, 4096, 0).unwrap();
        let low = arena.alloc_order(0).unwrap();
        let high = arena.alloc_order(0).unwrap();
        assert_eq!(low.start_addr, 0);
        assert_eq!(high.start_addr, 4096);
    }

    #[test]
    fn alloc_beyond_max_order_is_none() {
        let mut arena = Arena::new(2, 4096, 0).unwrap();
        assert_eq!(arena.alloc_order(3), None);
    }
}
