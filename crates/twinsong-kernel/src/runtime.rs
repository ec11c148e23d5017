//! Per-process kernel state and the blocking request loop.
//!
//! The runtime owns the run's namespace tree: the persistent globals and
//! one namespace per `Own` editor group, keyed by group id. Each `RunCode`
//! request is flattened into an execution plan (depth-first, left to right,
//! up to and including the called node), executed serially, and answered
//! with streamed `Output` frames, one terminal frame, and a `NewGlobals`
//! carrying the full snapshot of the executed tree.

use std::fs;
use std::io::Write;
use std::path::Path;

use indexmap::IndexMap;
use uuid::Uuid;

use twinsong_core::Result;
use twinsong_core::ipc::protocol::{KernelRequest, KernelResponse};
use twinsong_core::ipc::{read_frame, write_frame};
use twinsong_core::model::{EditorNode, OutputFlag, OutputValue, ScopeKind};
use twinsong_core::scope::ScopeSnapshot;

use crate::exec::run_code;
use crate::jobject::create_jobject;
use crate::pack::{PackError, PackedGroup, PackedState, Packer, Unpacker};
use crate::value::{Namespace, new_namespace};

/// A persisted `Own` group namespace and its place in the scope tree.
struct GroupEntry {
    name: String,
    /// Nearest enclosing `Own` group; `None` means directly under the root.
    parent: Option<Uuid>,
    ns: Namespace,
}

/// One step of an execution plan: a cell's code and the namespaces it
/// runs against.
struct PlanEntry {
    code: String,
    locals: Namespace,
    /// Namespace of the enclosing group's parent, when distinct: enables
    /// the `parent_scope` proxy.
    parent: Option<Namespace>,
}

/// Mirror of an executed `Own` group, used to build the reported snapshot.
struct MirrorGroup {
    id: Uuid,
    name: String,
    ns: Namespace,
    children: Vec<MirrorGroup>,
}

/// Kernel-side state of one run.
pub struct KernelRuntime {
    globals: Namespace,
    groups: IndexMap<Uuid, GroupEntry>,
}

impl KernelRuntime {
    pub fn new() -> Self {
        KernelRuntime {
            globals: new_namespace(),
            groups: IndexMap::new(),
        }
    }

    /// Process one request, writing response frames to `out`.
    pub fn handle_request<W: Write>(&mut self, request: KernelRequest, out: &mut W) -> Result<()> {
        match request {
            KernelRequest::RunCode {
                cell_id,
                editor_node,
                called_id,
            } => self.handle_run_code(cell_id, &editor_node, called_id, out),
            KernelRequest::SaveState { path } => {
                let error = match self.save_state(&path) {
                    Ok(()) => None,
                    Err(e) => {
                        tracing::warn!("state save failed: {}", e);
                        Some(e.to_string())
                    }
                };
                write_frame(out, &KernelResponse::StateSaved { error })
            }
        }
    }

    fn handle_run_code<W: Write>(
        &mut self,
        cell_id: Uuid,
        editor_node: &EditorNode,
        called_id: Uuid,
        out: &mut W,
    ) -> Result<()> {
        // The submitted tree hangs under an implicit root group whose
        // namespace is fresh per request; reads fall through to globals.
        let root_ns = new_namespace();
        let mut plan = Vec::new();
        let mut mirror = Vec::new();
        let mut done = false;
        self.collect(
            editor_node,
            called_id,
            &root_ns,
            None,
            None,
            &mut plan,
            &mut mirror,
            &mut done,
        );

        if plan.is_empty() {
            write_frame(
                out,
                &KernelResponse::Output {
                    cell_id,
                    flag: OutputFlag::Success,
                    value: OutputValue::None,
                },
            )?;
        } else {
            let last = plan.len() - 1;
            for (index, entry) in plan.iter().enumerate() {
                let mut io_error: Option<twinsong_core::Error> = None;
                let mut sink = |text: &str| {
                    if io_error.is_some() {
                        return;
                    }
                    let frame = KernelResponse::Output {
                        cell_id,
                        flag: OutputFlag::Running,
                        value: OutputValue::Text {
                            value: text.to_string(),
                        },
                    };
                    if let Err(e) = write_frame(out, &frame) {
                        io_error = Some(e);
                    }
                };

                let result = run_code(
                    &entry.code,
                    &self.globals,
                    entry.parent.as_ref(),
                    &entry.locals,
                    &mut sink,
                    index == last,
                );

                if let Some(e) = io_error {
                    return Err(e);
                }

                match result {
                    Ok(captured) => {
                        if index == last {
                            let value = match captured {
                                Some(value) => OutputValue::JObject {
                                    value: create_jobject(&value),
                                },
                                None => OutputValue::None,
                            };
                            write_frame(
                                out,
                                &KernelResponse::Output {
                                    cell_id,
                                    flag: OutputFlag::Success,
                                    value,
                                },
                            )?;
                        }
                    }
                    Err(error) => {
                        write_frame(
                            out,
                            &KernelResponse::Output {
                                cell_id,
                                flag: OutputFlag::Fail,
                                value: OutputValue::Error {
                                    value: error.traceback(),
                                },
                            },
                        )?;
                        break;
                    }
                }
            }
        }

        // Root-level assignments persist through globals even though the
        // next request starts from a fresh root namespace.
        {
            let root = root_ns.borrow();
            let mut globals = self.globals.borrow_mut();
            for (name, value) in root.iter() {
                globals.insert(name.clone(), value.clone());
            }
        }

        let snapshot = ScopeSnapshot {
            name: String::new(),
            variables: namespace_variables(&root_ns),
            children: mirror_snapshots(&mirror),
        };
        write_frame(out, &KernelResponse::NewGlobals { globals: snapshot })
    }

    /// Walk the tree in pre-order, collecting plan entries for every cell
    /// up to and including the called node. A called group includes its
    /// whole subtree; nodes to the right of the called path are skipped.
    #[allow(clippy::too_many_arguments)]
    fn collect(
        &mut self,
        node: &EditorNode,
        called_id: Uuid,
        ns: &Namespace,
        parent_ns: Option<&Namespace>,
        own_ancestor: Option<Uuid>,
        plan: &mut Vec<PlanEntry>,
        mirror: &mut Vec<MirrorGroup>,
        done: &mut bool,
    ) {
        if *done {
            return;
        }
        match node {
            EditorNode::Cell { id, code } => {
                plan.push(PlanEntry {
                    code: code.clone(),
                    locals: ns.clone(),
                    parent: parent_ns.cloned(),
                });
                if *id == called_id {
                    *done = true;
                }
            }
            EditorNode::Group(group) => {
                match group.scope {
                    ScopeKind::Inherit => {
                        // A namespace persisted while this id was `Own` is
                        // discarded rather than resurrected under the new
                        // scope setting.
                        self.groups.shift_remove(&group.id);
                        for child in &group.children {
                            self.collect(
                                child,
                                called_id,
                                ns,
                                parent_ns,
                                own_ancestor,
                                plan,
                                mirror,
                                done,
                            );
                            if *done {
                                break;
                            }
                        }
                    }
                    ScopeKind::Own => {
                        let group_ns = match self.groups.get_mut(&group.id) {
                            Some(entry) => {
                                entry.name = group.name.clone();
                                entry.parent = own_ancestor;
                                entry.ns.clone()
                            }
                            None => {
                                let fresh = new_namespace();
                                self.groups.insert(
                                    group.id,
                                    GroupEntry {
                                        name: group.name.clone(),
                                        parent: own_ancestor,
                                        ns: fresh.clone(),
                                    },
                                );
                                fresh
                            }
                        };

                        let mut group_mirror = MirrorGroup {
                            id: group.id,
                            name: group.name.clone(),
                            ns: group_ns.clone(),
                            children: Vec::new(),
                        };
                        for child in &group.children {
                            self.collect(
                                child,
                                called_id,
                                &group_ns,
                                Some(ns),
                                Some(group.id),
                                plan,
                                &mut group_mirror.children,
                                done,
                            );
                            if *done {
                                break;
                            }
                        }
                        mirror.push(group_mirror);
                    }
                }
                if group.id == called_id {
                    *done = true;
                }
            }
        }
    }

    /// Snapshot of the entire persisted state: globals at the root and
    /// every `Own` group nested under its recorded ancestor. Emitted on
    /// fork/resume, where no executed tree exists yet.
    pub fn full_snapshot(&self) -> ScopeSnapshot {
        ScopeSnapshot {
            name: String::new(),
            variables: namespace_variables(&self.globals),
            children: self.group_snapshots(None),
        }
    }

    fn group_snapshots(&self, parent: Option<Uuid>) -> IndexMap<Uuid, ScopeSnapshot> {
        self.groups
            .iter()
            .filter(|(_, entry)| entry.parent == parent)
            .map(|(id, entry)| {
                (
                    *id,
                    ScopeSnapshot {
                        name: entry.name.clone(),
                        variables: namespace_variables(&entry.ns),
                        children: self.group_snapshots(Some(*id)),
                    },
                )
            })
            .collect()
    }

    /// Pack `(globals, group table)` into a handoff blob at `path`.
    pub fn save_state(&self, path: &Path) -> std::result::Result<(), PackError> {
        let mut packer = Packer::new();
        let globals = packer.pack_namespace(&self.globals)?;
        let groups = self
            .groups
            .iter()
            .map(|(id, entry)| {
                Ok(PackedGroup {
                    id: *id,
                    name: entry.name.clone(),
                    scope: ScopeKind::Own,
                    parent: entry.parent,
                    variables: packer.pack_namespace(&entry.ns)?,
                })
            })
            .collect::<std::result::Result<Vec<_>, PackError>>()?;
        let state = PackedState {
            objects: packer.into_objects(),
            globals,
            groups,
        };
        let bytes = state.encode()?;
        fs::write(path, bytes).map_err(|e| PackError::Codec(e.to_string()))
    }

    /// Restore state from a handoff blob written by [`Self::save_state`].
    pub fn load_state(&mut self, path: &Path) -> std::result::Result<(), PackError> {
        let bytes = fs::read(path).map_err(|e| PackError::Codec(e.to_string()))?;
        let state = PackedState::decode(&bytes)?;
        let unpacker = Unpacker::new(&state)?;

        self.globals = unpacker.unpack_namespace(&state.globals)?;
        self.groups = IndexMap::new();
        for group in &state.groups {
            self.groups.insert(
                group.id,
                GroupEntry {
                    name: group.name.clone(),
                    parent: group.parent,
                    ns: unpacker.unpack_namespace(&group.variables)?,
                },
            );
        }
        Ok(())
    }
}

impl Default for KernelRuntime {
    fn default() -> Self {
        Self::new()
    }
}

fn namespace_variables(ns: &Namespace) -> IndexMap<String, Option<String>> {
    ns.borrow()
        .iter()
        .map(|(name, value)| (name.clone(), Some(create_jobject(value))))
        .collect()
}

fn mirror_snapshots(mirror: &[MirrorGroup]) -> IndexMap<Uuid, ScopeSnapshot> {
    mirror
        .iter()
        .map(|group| {
            (
                group.id,
                ScopeSnapshot {
                    name: group.name.clone(),
                    variables: namespace_variables(&group.ns),
                    children: mirror_snapshots(&group.children),
                },
            )
        })
        .collect()
}

/// The kernel process entry point: read framed requests from stdin, write
/// framed responses to stdout, until the server closes the pipe.
///
/// With `resume`, the state blob written by the source kernel is loaded
/// first and a `NewGlobals` with the inherited state is emitted before any
/// request is read.
pub fn run_kernel(resume: Option<&Path>) -> Result<()> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut reader = stdin.lock();
    let mut writer = stdout.lock();

    let mut runtime = KernelRuntime::new();
    if let Some(path) = resume {
        runtime
            .load_state(path)
            .map_err(|e| twinsong_core::Error::Deserialization(e.to_string()))?;
        // The handoff blob is single-use.
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!("could not remove handoff blob {}: {}", path.display(), e);
        }
        write_frame(
            &mut writer,
            &KernelResponse::NewGlobals {
                globals: runtime.full_snapshot(),
            },
        )?;
    }

    loop {
        match read_frame::<_, KernelRequest>(&mut reader) {
            Ok(request) => runtime.handle_request(request, &mut writer)?,
            Err(e) => {
                // EOF: the server dropped our stdin, time to exit.
                tracing::debug!("kernel request stream ended: {}", e);
                return Ok(());
            }
        }
    }
}
