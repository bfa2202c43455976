//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the UserRepository port
//! - In-memory map for UserRepository (tests, throwaway sessions)
//! - Gemini HTTP client for AdviceProvider and SpeechProvider

pub mod duckdb;
pub mod gemini;
pub mod memory;

#[cfg(test)]
pub mod gemini_mock;
