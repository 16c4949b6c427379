//! OpenMap core: shareable map view state and object selection.
//!
//! The view state (profile, camera, selected object) round-trips through
//! the URL hash, a path-and-query URL form and persisted storage. The
//! resolver decides which of those is authoritative at startup and keeps
//! them in sync afterwards; the selection tracker resolves object ids
//! against the rendered map once its data has loaded.

pub mod config;
pub mod geo;
pub mod poi;
pub mod state;
pub mod storage;
