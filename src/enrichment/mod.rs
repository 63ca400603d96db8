// src/enrichment/mod.rs
pub mod merge;
pub mod processor;
