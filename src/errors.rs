use thiserror::Error;

/// Errors surfaced while declaring elements or finalizing a frame.
///
/// Any error poisons the current frame: every later declaration call
/// returns the same error, and `end_layout` reports it instead of render
/// commands. `begin_layout` clears the latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("{buffer} capacity of {capacity} exceeded")]
    CapacityExceeded {
        buffer: &'static str,
        capacity: usize,
    },
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: &'static str },
}
