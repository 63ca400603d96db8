// src/matching/mod.rs
pub mod aggregate;
pub mod confidence;
pub mod name;
pub mod validate;
