//! Client-side state-synchronization core for a draggable, column-based
//! hiring board.
//!
//! The engine owns the board snapshot (the single source of mutable truth),
//! derives always-sorted views from it through a dirty-flagged cache, applies
//! user actions speculatively before the backend confirms them, turns drag
//! gestures into deterministic orderings, and keeps a bounded,
//! backend-token-based undo/redo history. Rendering, forms, transport and
//! persistence live behind the [`backend::BoardBackend`] trait.

pub mod backend;
pub mod cache;
pub mod drag;
pub mod engine;
pub mod history;
pub mod mutation;
pub mod reorder;
pub mod types;

pub use backend::{BoardBackend, TransportError};
pub use engine::{BoardEngine, BoardEvent, EngineError};
