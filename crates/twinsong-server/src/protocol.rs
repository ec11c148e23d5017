//! WebSocket protocol messages.
//!
//! Every frame is a single JSON object discriminated by `type`. Variant
//! names are the wire names; only the `login` handshake is lowercase.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use twinsong_core::model::{EditorGroup, EditorNode, Notebook, NotebookId, OutputFlag, OutputValue};
use twinsong_core::scope::ScopeSnapshot;

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Session handshake; must be the first frame on a connection.
    #[serde(rename = "login")]
    Login,

    /// Create an empty notebook with a synthesized path.
    CreateNewNotebook,

    /// Load a notebook from disk (idempotent for already-loaded paths).
    LoadNotebook { path: String },

    /// Replace a notebook's editor tree and persist everything.
    SaveNotebook {
        notebook_id: NotebookId,
        editor_root: EditorGroup,
    },

    /// Spawn a kernel for a new run.
    CreateNewKernel {
        notebook_id: NotebookId,
        run_id: Uuid,
        run_title: String,
    },

    /// Fork a live run into a new run with a deep copy of its state.
    Fork {
        notebook_id: NotebookId,
        run_id: Uuid,
        new_run_id: Uuid,
        new_run_title: String,
    },

    /// Terminate a run's kernel.
    CloseRun {
        notebook_id: NotebookId,
        run_id: Uuid,
    },

    /// Execute an editor tree up to `called_id` in a run.
    ///
    /// `editor_node`/`called_id` may be omitted by minimal clients, in
    /// which case `code` is wrapped into a single synthetic cell.
    RunCode {
        notebook_id: NotebookId,
        run_id: Uuid,
        code: String,
        cell_id: Uuid,
        #[serde(default)]
        editor_node: Option<EditorNode>,
        #[serde(default)]
        called_id: Option<Uuid>,
    },

    /// Snapshot of all live kernels.
    KernelList,

    /// Explicit request for the current working-directory listing.
    QueryDir,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// A freshly created or loaded notebook.
    NewNotebook { notebook: Notebook },

    /// Outcome of `SaveNotebook`.
    SaveCompleted {
        notebook_id: NotebookId,
        error: Option<String>,
    },

    /// A kernel subprocess is up and its run accepts code.
    KernelReady {
        notebook_id: NotebookId,
        run_id: Uuid,
        pid: u32,
    },

    /// One streamed or terminal output value of a cell. The terminal
    /// frame (`Success`/`Fail`) carries the scope-snapshot delta.
    Output {
        notebook_id: NotebookId,
        run_id: Uuid,
        cell_id: Uuid,
        flag: OutputFlag,
        value: OutputValue,
        update: Option<ScopeSnapshot>,
    },

    /// Scope snapshot pushed outside of cell execution (fork/resume).
    NewGlobals {
        notebook_id: NotebookId,
        run_id: Uuid,
        globals: ScopeSnapshot,
    },

    /// Reply to `KernelList`.
    Kernels { kernels: Vec<KernelInfo> },

    /// Working-directory listing; also pushed asynchronously on change.
    DirList { entries: Vec<DirEntry> },

    /// Generic error reply.
    Error { message: String },
}

/// One live kernel in a `Kernels` reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelInfo {
    pub run_id: Uuid,
    pub notebook_id: NotebookId,
    pub pid: u32,
}

/// Classification of a working-directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirEntryType {
    File,
    Notebook,
    LoadedNotebook,
}

/// One entry of a `DirList`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub entry_type: DirEntryType,
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_is_lowercase_on_the_wire() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type": "login"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Login));
        let json = serde_json::to_value(&ClientMessage::Login).unwrap();
        assert_eq!(json, serde_json::json!({"type": "login"}));
    }

    #[test]
    fn test_client_message_wire_names() {
        let json = serde_json::to_string(&ClientMessage::CreateNewNotebook).unwrap();
        assert_eq!(json, r#"{"type":"CreateNewNotebook"}"#);

        let json = serde_json::to_string(&ClientMessage::QueryDir).unwrap();
        assert_eq!(json, r#"{"type":"QueryDir"}"#);
    }

    #[test]
    fn test_run_code_without_tree_fields() {
        let json = serde_json::json!({
            "type": "RunCode",
            "notebook_id": 1,
            "run_id": Uuid::new_v4(),
            "code": "1 + 2",
            "cell_id": Uuid::new_v4(),
        });
        let msg: ClientMessage = serde_json::from_value(json).unwrap();
        match msg {
            ClientMessage::RunCode {
                editor_node,
                called_id,
                ..
            } => {
                assert!(editor_node.is_none());
                assert!(called_id.is_none());
            }
            other => panic!("wrong message: {:?}", other),
        }
    }

    #[test]
    fn test_dir_list_shape() {
        let msg = ServerMessage::DirList {
            entries: vec![DirEntry {
                entry_type: DirEntryType::LoadedNotebook,
                path: "notebook_1.tsnb".to_string(),
            }],
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "DirList",
                "entries": [
                    {"entry_type": "LoadedNotebook", "path": "notebook_1.tsnb"}
                ]
            })
        );
    }

    #[test]
    fn test_output_message_shape() {
        let msg = ServerMessage::Output {
            notebook_id: NotebookId::new(3),
            run_id: Uuid::nil(),
            cell_id: Uuid::nil(),
            flag: OutputFlag::Running,
            value: OutputValue::Text {
                value: "Hello".to_string(),
            },
            update: None,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "Output");
        assert_eq!(json["notebook_id"], 3);
        assert_eq!(json["flag"], "Running");
        assert_eq!(json["value"]["type"], "Text");
        assert_eq!(json["update"], serde_json::Value::Null);
    }

    #[test]
    fn test_save_completed_roundtrip() {
        let msg = ServerMessage::SaveCompleted {
            notebook_id: NotebookId::new(1),
            error: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: ServerMessage = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            parsed,
            ServerMessage::SaveCompleted { error: None, .. }
        ));
    }
}
