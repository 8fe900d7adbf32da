//! Runs a [`Operation`] script against one [`Arena`], tracking which script
//! slot holds which live handle and narrating each step at `info` level.

use anyhow::{bail, Result};
use buddy_core::{Arena, BlockHandle};

use crate::script::Operation;

/// Tracks the handles a script has allocated, indexed by the order `alloc`
/// calls occurred in. A `None` entry means that slot's block has already
/// been freed.
#[derive(Default)]
pub struct Slots(Vec<Option<BlockHandle>>);

impl Slots {
    fn record(&mut self, handle: BlockHandle) -> usize {
        let slot = self.0.len();
        self.0.push(Some(handle));
        slot
    }

    fn take(&mut self, slot: usize) -> Result<BlockHandle> {
        match self.0.get_mut(slot) {
            Some(entry) => entry
                .take()
                .ok_or_else(|| anyhow::anyhow!("slot {slot} has already been freed")),
            None => bail!("slot {slot} was never allocated"),
        }
    }
}

/// Run one operation, updating `slots` and printing a `stats` table when
/// requested. Returns an error only for script-level mistakes (an unknown
/// or already-freed slot); an exhausted allocation is logged and skipped.
pub fn run_one(arena: &mut Arena, slots: &mut Slots, op: Operation) -> Result<()> {
    match op {
        Operation::Alloc(size) => match arena.alloc(size) {
            Some(handle) => {
                let slot = slots.record(handle);
                log::info!("alloc {size} -> slot {slot} ({handle})");
            }
            None => {
                log::warn!("alloc {size} -> exhausted, no block available");
            }
        },
        Operation::Free(slot) => {
            let handle = slots.take(slot)?;
            arena.free(handle).map_err(|e| anyhow::anyhow!("free slot {slot}: {e}"))?;
            log::info!("free slot {slot} ({handle})");
        }
        Operation::Stats => print_stats(arena),
    }
    Ok(())
}

/// Run a full script in order, stopping at the first script-level error.
pub fn run_script(arena: &mut Arena, ops: &[Operation]) -> Result<()> {
    let mut slots = Slots::default();
    for op in ops {
        run_one(arena, &mut slots, *op)?;
    }
    Ok(())
}

/// Print the current per-order free/used table.
pub fn print_stats(arena: &Arena) {
    println!("{:>5}  {:>10}  {:>10}  {:>12}", "order", "free", "used", "block size");
    for row in arena.stats() {
        let block_size = arena.page_size() << row.order;
        println!(
            "{:>5}  {:>10}  {:>10}  {:>12}",
            row.order, row.free_count, row.used_count, block_size
        );
    }
}

/// The built-in script behind `buddy-sim demo`: allocate a handful of
/// differently sized blocks, free some out of order to show coalescing,
/// and print stats before and after.
pub fn run_demo(arena: &mut Arena) -> Result<()> {
    print_stats(arena);

    let mut slots = Slots::default();
    // Sizes are page counts (see `Arena::order_for_page_count`): the first
    // two land as order-0 buddies, the next two pull progressively larger
    // blocks off the free list above them.
    for size in [1, 1, 4096, 8192] {
        run_one(arena, &mut slots, Operation::Alloc(size))?;
    }

    println!("--- after allocating ---");
    print_stats(arena);

    // Free slots 1 and 0 (its buddy) out of order to demonstrate
    // coalescing; the loop walks exactly the slots the demo populated,
    // never one past the end.
    for slot in [1, 0] {
        run_one(arena, &mut slots, Operation::Free(slot))?;
    }

    println!("--- after freeing ---");
    print_stats(arena);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn free_tracks_slots_independently_of_arena_ids() {
        let mut arena = Arena::new(2, 4096, 0).unwrap();
        let mut slots = Slots::default();
        run_one(&mut arena, &mut slots, Operation::Alloc(1)).unwrap();
        run_one(&mut arena, &mut slots, Operation::Free(0)).unwrap();
        assert!(run_one(&mut arena, &mut slots, Operation::Free(0)).is_err());
    }

    #[test]
    fn freeing_unknown_slot_is_a_script_error() {
        let mut arena = Arena::new(1, 4096, 0).unwrap();
        let mut slots = Slots::default();
        assert!(run_one(&mut arena, &mut slots, Operation::Free(0)).is_err());
    }

    #[test]
    fn exhaustion_is_logged_not_errored() {
        let mut arena = Arena::new(0, 4096, 0).unwrap();
        let mut slots = Slots::default();
        run_one(&mut arena, &mut slots, Operation::Alloc(1)).unwrap();
        assert!(run_one(&mut arena, &mut slots, Operation::Alloc(1)).is_ok());
    }
}
