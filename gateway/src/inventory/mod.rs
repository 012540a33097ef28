//! Device inventory reconciliation

pub mod merge;

pub use merge::{add, apply_user_edits, merge, remove, update, UserEdit};
