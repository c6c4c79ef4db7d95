//! Determinism utilities.
//!
//! Everything under this module is pure and in-memory. These are the
//! primitives every artifact hash in the system ultimately reduces to.

pub mod canonical_json;
pub mod normalize;
pub mod stable_sort;
