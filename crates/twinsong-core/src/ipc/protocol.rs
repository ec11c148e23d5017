//! IPC messages between the server and kernel processes.
//!
//! These mirror the client-facing `Output` / `NewGlobals` shapes but carry
//! no notebook or run ids; the server adds those when forwarding.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{EditorNode, OutputFlag, OutputValue};
use crate::scope::ScopeSnapshot;

/// Request sent from the server to a kernel process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum KernelRequest {
    /// Execute an editor tree up to (and including) `called_id`.
    RunCode {
        /// Output cell collecting everything this request produces.
        cell_id: Uuid,
        /// Frozen copy of the submitted tree.
        editor_node: EditorNode,
        /// The node whose invocation the user requested.
        called_id: Uuid,
    },

    /// Serialize the kernel's live state to `path` for a fork handoff.
    SaveState { path: PathBuf },
}

/// Response sent from a kernel process to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum KernelResponse {
    /// One streamed or terminal output value for a cell.
    Output {
        cell_id: Uuid,
        flag: OutputFlag,
        value: OutputValue,
    },

    /// Full scope snapshot after an execution (or on resume).
    NewGlobals { globals: ScopeSnapshot },

    /// Outcome of a `SaveState` request.
    StateSaved { error: Option<String> },
}
