//! Core types for the Twinsong notebook service.
//!
//! This crate is shared by the server process and the kernel subprocesses.
//! It provides:
//! - The editor-tree and notebook data model
//! - The scope-snapshot model and its diffing rules
//! - The framed-JSON wire codec and the kernel IPC message types
//! - The on-disk notebook store (`.tsnb` + `.tsnb.runs/`)

pub mod error;
pub mod ipc;
pub mod model;
pub mod scope;
pub mod store;

pub use error::{Error, Result};
pub use model::{
    EditorGroup, EditorNode, KernelState, Notebook, NotebookId, OutputCell, OutputFlag,
    OutputValue, Run, ScopeKind, validate_editor_tree,
};
pub use scope::{ScopeSnapshot, diff_snapshots};

/// Version string written into every `.tsnb` file.
pub const NOTEBOOK_FORMAT_VERSION: &str = "twinsong 0.0.1";
