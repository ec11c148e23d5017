//! Notebook, run and editor-tree data model.
//!
//! The editor source of a notebook is a tree of [`EditorNode`]s rather than
//! a flat cell list. Groups introduce (or inherit) variable scopes; cells
//! carry source text. Everything here is plain data shared between the
//! server, the kernels and the on-disk store.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::scope::ScopeSnapshot;

/// Server-wide notebook identifier. Allocated monotonically, starting at 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NotebookId(u64);

impl NotebookId {
    pub fn new(id: u64) -> Self {
        NotebookId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NotebookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scope policy of an editor group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScopeKind {
    /// The group introduces its own namespace.
    Own,
    /// The group executes directly in its parent's namespace.
    Inherit,
}

/// Inner node of the editor tree: a named, scoped, ordered container.
///
/// The notebook root is typed as a bare `EditorGroup` so that it serializes
/// without a `type` tag; only nodes inside `children` carry one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorGroup {
    pub id: Uuid,
    pub name: String,
    pub scope: ScopeKind,
    pub children: Vec<EditorNode>,
}

/// A node of the editor tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EditorNode {
    /// Leaf node carrying source text.
    Cell { id: Uuid, code: String },
    /// Nested group.
    Group(EditorGroup),
}

impl EditorNode {
    pub fn id(&self) -> Uuid {
        match self {
            EditorNode::Cell { id, .. } => *id,
            EditorNode::Group(group) => group.id,
        }
    }

    /// True if `id` names this node or any of its descendants.
    pub fn contains(&self, id: Uuid) -> bool {
        match self {
            EditorNode::Cell { id: cell_id, .. } => *cell_id == id,
            EditorNode::Group(group) => {
                group.id == id || group.children.iter().any(|child| child.contains(id))
            }
        }
    }
}

/// Check the structural invariants of an editor tree: ids must be unique.
///
/// Trees arrive by value from clients and from disk, so reference cycles are
/// impossible; duplicated ids are the remaining way a tree can be malformed
/// (they would alias scope namespaces in the kernel).
pub fn validate_editor_tree(root: &EditorGroup) -> Result<()> {
    fn visit(node: &EditorNode, seen: &mut HashSet<Uuid>) -> Result<()> {
        if !seen.insert(node.id()) {
            return Err(Error::InvalidEditorTree(format!(
                "duplicate node id {}",
                node.id()
            )));
        }
        if let EditorNode::Group(group) = node {
            for child in &group.children {
                visit(child, seen)?;
            }
        }
        Ok(())
    }

    let mut seen = HashSet::new();
    seen.insert(root.id);
    for child in &root.children {
        visit(child, &mut seen)?;
    }
    Ok(())
}

/// Lifecycle state of the kernel backing a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum KernelState {
    Running,
    Closed,
}

/// Completion flag of an output cell (and of streamed output frames).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFlag {
    Running,
    Success,
    Fail,
}

impl OutputFlag {
    /// Terminal flags end the stream for a cell.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OutputFlag::Running)
    }
}

/// One value inside an output cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutputValue {
    /// A chunk of captured stdout.
    Text { value: String },
    /// The executed fragment had no trailing expression.
    None,
    /// Serialized jobject JSON of the trailing-expression value.
    JObject { value: String },
    /// Formatted traceback of a failed execution.
    Error { value: String },
}

/// Output record of one `RunCode` request.
///
/// `editor_node` is a frozen by-value copy of the tree that was submitted;
/// `called_id` names the node within it whose invocation produced this cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputCell {
    pub id: Uuid,
    pub called_id: Uuid,
    pub flag: OutputFlag,
    pub editor_node: EditorNode,
    pub values: Vec<OutputValue>,
}

impl OutputCell {
    pub fn new(id: Uuid, editor_node: EditorNode, called_id: Uuid) -> Self {
        OutputCell {
            id,
            editor_node,
            called_id,
            flag: OutputFlag::Running,
            values: Vec::new(),
        }
    }

    /// Append a streamed value. Consecutive stdout chunks coalesce into a
    /// single stored `Text` value; the wire frames stay chunked.
    pub fn push_value(&mut self, value: OutputValue) {
        if let (Some(OutputValue::Text { value: last }), OutputValue::Text { value: chunk }) =
            (self.values.last_mut(), &value)
        {
            last.push_str(chunk);
            return;
        }
        self.values.push(value);
    }
}

/// One invocation context of a notebook, backed by a kernel subprocess
/// while `kernel_state` is `Running`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub title: String,
    pub kernel_state: KernelState,
    pub output_cells: Vec<OutputCell>,
    pub globals: ScopeSnapshot,
}

impl Run {
    pub fn new(id: Uuid, title: String) -> Self {
        Run {
            id,
            title,
            kernel_state: KernelState::Running,
            output_cells: Vec::new(),
            globals: ScopeSnapshot::default(),
        }
    }

    pub fn output_cell_mut(&mut self, cell_id: Uuid) -> Option<&mut OutputCell> {
        self.output_cells.iter_mut().find(|cell| cell.id == cell_id)
    }
}

/// An in-memory notebook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    pub id: NotebookId,
    pub path: String,
    pub editor_root: EditorGroup,
    pub runs: Vec<Run>,
    pub editor_open_nodes: Vec<Uuid>,
}

impl Notebook {
    /// Create an empty notebook with a synthesized root group.
    pub fn new(id: NotebookId, path: String) -> Self {
        let editor_root = EditorGroup {
            id: Uuid::new_v4(),
            name: "root".to_string(),
            scope: ScopeKind::Own,
            children: Vec::new(),
        };
        let editor_open_nodes = vec![editor_root.id];
        Notebook {
            id,
            path,
            editor_root,
            runs: Vec::new(),
            editor_open_nodes,
        }
    }

    pub fn run_mut(&mut self, run_id: Uuid) -> Option<&mut Run> {
        self.runs.iter_mut().find(|run| run.id == run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(code: &str) -> EditorNode {
        EditorNode::Cell {
            id: Uuid::new_v4(),
            code: code.to_string(),
        }
    }

    #[test]
    fn test_editor_node_tagging() {
        let node = cell("x = 1");
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "Cell");
        assert_eq!(json["code"], "x = 1");

        let group = EditorNode::Group(EditorGroup {
            id: Uuid::new_v4(),
            name: "G1".to_string(),
            scope: ScopeKind::Own,
            children: vec![node],
        });
        let json = serde_json::to_value(&group).unwrap();
        assert_eq!(json["type"], "Group");
        assert_eq!(json["scope"], "Own");
        assert_eq!(json["children"][0]["type"], "Cell");
    }

    #[test]
    fn test_editor_root_serializes_untagged() {
        let root = EditorGroup {
            id: Uuid::new_v4(),
            name: "root".to_string(),
            scope: ScopeKind::Own,
            children: vec![cell("1 + 2")],
        };
        let json = serde_json::to_value(&root).unwrap();
        assert!(json.get("type").is_none());
        assert_eq!(json["name"], "root");
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let id = Uuid::new_v4();
        let root = EditorGroup {
            id: Uuid::new_v4(),
            name: "root".to_string(),
            scope: ScopeKind::Own,
            children: vec![
                EditorNode::Cell {
                    id,
                    code: "x = 1".to_string(),
                },
                EditorNode::Cell {
                    id,
                    code: "x = 2".to_string(),
                },
            ],
        };
        let err = validate_editor_tree(&root).unwrap_err();
        assert!(matches!(err, Error::InvalidEditorTree(_)));
    }

    #[test]
    fn test_validate_accepts_nested_tree() {
        let root = EditorGroup {
            id: Uuid::new_v4(),
            name: "root".to_string(),
            scope: ScopeKind::Own,
            children: vec![EditorNode::Group(EditorGroup {
                id: Uuid::new_v4(),
                name: "G1".to_string(),
                scope: ScopeKind::Inherit,
                children: vec![cell("x = 1"), cell("x + 1")],
            })],
        };
        assert!(validate_editor_tree(&root).is_ok());
    }

    #[test]
    fn test_output_value_tagging() {
        let json = serde_json::to_value(OutputValue::None).unwrap();
        assert_eq!(json, serde_json::json!({"type": "None"}));

        let json = serde_json::to_value(OutputValue::Text {
            value: "Hello".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"type": "Text", "value": "Hello"}));
    }

    #[test]
    fn test_output_cell_merges_text_chunks() {
        let mut out = OutputCell::new(Uuid::new_v4(), cell("print('hi')"), Uuid::new_v4());
        out.push_value(OutputValue::Text {
            value: "Hello".to_string(),
        });
        out.push_value(OutputValue::Text {
            value: "\n".to_string(),
        });
        out.push_value(OutputValue::Text {
            value: "world!\n".to_string(),
        });
        out.push_value(OutputValue::None);

        assert_eq!(
            out.values,
            vec![
                OutputValue::Text {
                    value: "Hello\nworld!\n".to_string()
                },
                OutputValue::None,
            ]
        );
    }

    #[test]
    fn test_kernel_state_is_type_tagged() {
        let json = serde_json::to_value(KernelState::Closed).unwrap();
        assert_eq!(json, serde_json::json!({"type": "Closed"}));
    }

    #[test]
    fn test_contains_descends_into_groups() {
        let inner = cell("x");
        let inner_id = inner.id();
        let tree = EditorNode::Group(EditorGroup {
            id: Uuid::new_v4(),
            name: "G1".to_string(),
            scope: ScopeKind::Own,
            children: vec![inner],
        });
        assert!(tree.contains(inner_id));
        assert!(!tree.contains(Uuid::new_v4()));
    }
}
