//! Small helpers shared across modules
pub(crate) mod hashing;
pub(crate) mod parallel;
