//! Funnel stages
//!
//! Each stage is one scheduled batch pass: it reads its upstream
//! document(s), recomputes its single output feed from scratch, and saves
//! it. The pure `evaluate` cores take an explicit clock and never touch the
//! network, so every gate is testable deterministically; the `run` wrappers
//! do the I/O around them.

pub mod buffer;
pub mod certify;
pub mod discovery;
pub mod momentum;
pub mod opportunity;
pub mod outcome;
