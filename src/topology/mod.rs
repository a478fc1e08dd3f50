//! Top-level module for mesh topology abstractions.
//!
//! This module provides the handle types and the mesh trait the adaptation
//! engine is written against:
//! - [`PersistentId`] and [`DenseIndex`] for node identity and field positions
//! - The [`AdaptiveMesh`] trait with its marking and `prepare`/`adapt`/`finalize` protocol

pub mod mesh;
pub mod point;

pub use mesh::{AdaptPhase, AdaptiveMesh, Intersection, Mark};
pub use point::{DenseIndex, PersistentId};
