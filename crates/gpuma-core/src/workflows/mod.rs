//! # Workflows Module
//!
//! The public entry points of the library. A workflow takes structures and a
//! [`Config`](crate::engine::config::Config), validates everything up front,
//! and drives the engine to completion.
//!
//! - **Optimization** ([`optimize`]) - relax structures one by one with a local
//!   minimizer, or all at once through a batched model, as the configuration
//!   selects.
//!
//! Every entry point comes in two forms: a context-free function that uses the
//! process-wide [`OptimizationContext`](crate::engine::context::OptimizationContext),
//! and a `*_with` variant that takes an explicit context (custom model
//! providers, private caches, progress callbacks).

pub mod optimize;
