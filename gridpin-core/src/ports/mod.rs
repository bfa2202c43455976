//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external collaborators. The core domain
//! and services depend only on these traits, not on concrete implementations.

mod advisor;
mod repository;

pub use advisor::{AdviceProvider, SpeechProvider};
pub use repository::UserRepository;
