//! The combinator library: ways to build a [`crate::rule::Rule`] out of
//! smaller rules.

pub mod choice;
pub mod empty_sequence;
pub mod map;
pub mod repetition;
pub mod sequence;

pub use choice::choice;
pub use empty_sequence::empty_sequence;
pub use map::map_rule;
pub use repetition::{option, repetition};
pub use sequence::sequence;
