//! Meshforge: a scene mutation engine for an interactive 3D editor.
//!
//! Mesh metadata is the single source of truth. Every change arrives as a
//! queued command, is applied once per tick and then projected onto a
//! render surface. The `app` layer adds scene management and undo/redo on
//! top.

pub mod app;
pub mod config;
pub mod engine;
pub mod render;
pub mod scene;
