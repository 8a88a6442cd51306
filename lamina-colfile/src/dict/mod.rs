//! Order-preserving dictionary compression support.

mod ordered;

pub use ordered::{bytes_per_entry_for, OrderedDictionary};
