//! Chunked list container
//!
//! A [`Chunklist`] stores an ordered sequence of byte strings and signed
//! 64-bit integers as a doubly linked chain of packed segments
//! ([`packlist::Packlist`]), keeping per-element overhead low while still
//! growing past any single segment's practical size. Mutating operations
//! take a caller-supplied *fill factor*: the advisory maximum number of
//! entries per segment, used as the split/merge threshold when
//! rebalancing.
//!
//! Pushes and pops at either end are O(1) amortised; global indexing and
//! mid-list insertion walk the segment chain. Iterators run in either
//! direction, and [`IterMut`] supports deleting the current entry in
//! place. Anchors and iterators are invalidated by any other mutation of
//! the list.

mod iter;
mod list;
mod node;
mod value;


pub use iter::{Direction, Iter, IterMut};
pub use list::Chunklist;
pub use value::{Entry, Value};

/// Upper bound on the per-segment fill factor accepted by mutating
/// operations; larger requests are clamped down to this.
pub const FILL_MAX: usize = 32 * 1024;
