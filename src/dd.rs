//! Decision-diagram kernel: complement-edge BDDs, integer-leaf MTBDDs and
//! zero-suppressed covers
//!
//! Everything is content-addressed in a single arena per store, so handles
//! are stable for the lifetime of the manager. This is what lets higher
//! layers key memo tables and bisimulation signatures on handles.

mod manager;
mod reference;
mod zdd;

pub use manager::Manager;
pub use reference::{Ref, ZRef};
pub use zdd::ZddStore;

pub(crate) use manager::value_lits;
