use core::fmt;

/// Raised by [`Arena::new`](crate::Arena::new) when the requested
/// configuration can't be satisfied. Never raised afterward (once an
/// `Arena` exists, it stays usable for the rest of its lifetime).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `page_size` was zero or not a power of two.
    InvalidPageSize(u64),
    /// `max_order` was negative.
    NegativeMaxOrder(i32),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPageSize(size) => {
                write!(f, "page size {size} is not a positive power of two")
            }
            ConfigError::NegativeMaxOrder(order) => {
                write!(f, "max_order {order} is negative")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Raised by [`Arena::free`](crate::Arena::free) when the handle passed in
/// does not currently name a block accounted as used.
///
/// The arena's state is left unchanged when this is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeError {
    /// The block has already been freed, or the handle was never produced
    /// by this arena.
    NotCurrentlyUsed,
}

impl fmt::Display for FreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FreeError::NotCurrentlyUsed => write!(f, "block is not currently allocated"),
        }
    }
}

impl std::error::Error for FreeError {}
