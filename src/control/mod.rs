//! # Control Module
//!
//! RC override values and the timed sequences built on them.
//!
//! This module handles:
//! - The RC override vector and its `SET_RAW_RC` wire order
//! - Percentage to raw channel conversions
//! - Arm, disarm and auto-level hold sequences

pub mod rc;
pub mod sequence;

pub use rc::RcOverride;
pub use sequence::{HoldSequence, SequenceReport};
