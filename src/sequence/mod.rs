//! Sequence Generation
//!
//! Unique, increasing numbers backed by document versions. Counters live in
//! the store, so every process sharing the store shares the sequence.

mod generator;

pub use generator::SequenceGenerator;
