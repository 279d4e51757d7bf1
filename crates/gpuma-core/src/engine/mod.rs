//! # Engine Module
//!
//! The stateful layer between the data models in [`crate::core`] and the public
//! entry points in [`crate::workflows`]. It decides where computation runs,
//! keeps loaded models alive, and drives both optimization back-ends.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - The `[optimization]` settings, batch mode and convergence criteria
//! - **Errors** ([`error`]) - Validation, configuration and engine failures as closed enums
//! - **Devices** ([`device`]) - Parsing and availability checks for `cpu` / `cuda[:N]` targets
//! - **Models** ([`models`]) - The `Calculator`, `BatchModel` and `ModelProvider` seams
//! - **Built-in models** ([`builtin`]) - Reference potentials that need no external weights
//! - **Model cache** ([`cache`]) - Process-wide, key-scoped memoization of loaded models
//! - **Single-structure back-end** ([`atoms`], [`minimize`]) - One atomic system relaxed by BFGS or FIRE
//! - **Batched back-end** ([`state`], [`batched`]) - Many systems stacked into one state and relaxed together
//! - **Context** ([`context`]) - Provider, device resolver, caches and progress reporter bundled per caller
//! - **Progress** ([`progress`]) - Callback-based progress events for front ends

pub mod atoms;
pub mod batched;
pub mod builtin;
pub mod cache;
pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod minimize;
pub mod models;
pub mod progress;
pub mod state;
