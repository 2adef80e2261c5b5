//! Domain Layer
//!
//! Core scheduling logic.

pub mod task;
