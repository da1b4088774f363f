//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the gateway expects from the text
//! generation capability. They contain no implementation details; concrete
//! backends live in `fmgate-runtime` and test doubles live next to the tests.

pub mod generation;

pub use generation::{Generation, GenerationError, GenerationPort, GenerationRequest, Generator};
