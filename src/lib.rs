#![deny(missing_docs)]

//! Core library for the studydeck PDF ingestion service.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Text-generation client abstraction and adapters.
pub mod generation;
/// PDF extraction, chunking, summarization and orchestration.
pub mod ingestion;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion metrics helpers.
pub mod metrics;
/// Storage for processed documents.
pub mod store;
