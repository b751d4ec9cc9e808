//! Shared foundation types for the Atoll placer.
//!
//! Currently this is only the abort/result split used across the
//! workspace; see [`result`] for the philosophy.

#![warn(missing_docs)]

pub mod result;

pub use result::{AbortError, AtollResult};
