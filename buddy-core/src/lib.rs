//! Binary buddy allocator over an abstract address range.
//!
//! This crate tracks which power-of-two-sized sub-ranges of
//! `[start_addr, start_addr + page_size * 2^max_order)` are free or used. No
//! real memory is ever read, written, or returned to an OS; `alloc` and
//! `free` only manipulate the [`Arena`]'s internal bookkeeping and hand back
//! [`BlockHandle`]s carrying a base address and an order.
//!
//! Blocks are arranged in a binary tree keyed by "order": a block of order
//! `k` has size `page_size * 2^k` and, unless it is the tree's root, exactly
//! one buddy at the same order sharing a parent at order `k + 1`.
//!
//! ```text
//!   order 2        |------------------ one block --------------------|
//!   order 1        |-------- block --------|-------- block --------|
//!   order 0        |--block--|--block--|--block--|--block--|
//! ```
//!
//! Allocating a block of order `k` either takes one straight from the
//! order-`k` free list, or, if that list is empty, recursively obtains a
//! block of order `k + 1` and splits it into two order-`k` children,
//! keeping one and returning the other. Freeing a block checks whether its
//! buddy is also free; if so, both are destroyed and their parent is
//! recursively freed the same way, cascading the merge upward as far as it
//! will go.
//!
//! See [`Arena`] for the entry point.

mod arena;
mod block;
mod error;
mod order_index;

pub use arena::{Arena, OrderStats};
pub use block::BlockHandle;
pub use error::{ConfigError, FreeError};
