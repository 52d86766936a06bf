//! Retrieval-augmented QA backend: ingests project documents into a local
//! vector index and asks a hosted chat model for grounded test cases and
//! Selenium scripts.

pub mod core;
pub mod llm;
pub mod qa;
pub mod rag;
pub mod server;
pub mod state;
pub mod vector_math;
