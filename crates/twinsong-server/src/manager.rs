//! The run-manager actor.
//!
//! A single task owns every notebook, run and kernel handle; WebSocket
//! sessions and kernel reader tasks only ever talk to it through its
//! mailbox, so state mutation is serialized without locks. Replies go back
//! on the requesting session's channel; streamed events (outputs, globals,
//! directory changes) are broadcast to every session.

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;

use rustc_hash::FxHashMap;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use twinsong_core::ipc::protocol::{KernelRequest, KernelResponse};
use twinsong_core::model::{
    EditorNode, KernelState, Notebook, NotebookId, OutputCell, OutputFlag, OutputValue, Run,
    validate_editor_tree,
};
use twinsong_core::scope::diff_snapshots;
use twinsong_core::store;

use crate::kernel::{KernelEvent, KernelProcess};
use crate::protocol::{ClientMessage, DirEntry, KernelInfo, ServerMessage};
use crate::watcher::scan_dir;

/// A session's direct reply channel.
pub type Reply = mpsc::UnboundedSender<ServerMessage>;

/// Mailbox messages for the run manager.
#[derive(Debug)]
pub enum Command {
    /// A client request with its reply channel.
    Client { message: ClientMessage, reply: Reply },
    /// Periodic working-directory scan tick.
    ScanDir,
    /// Close every kernel and stop.
    Shutdown,
}

/// Book-keeping for one live kernel.
struct KernelSession {
    process: KernelProcess,
    notebook_id: NotebookId,
    /// Cells sent to the kernel and not yet terminated, in order.
    in_flight: VecDeque<Uuid>,
    /// Terminal frame held back until its `NewGlobals` arrives, so the
    /// client-facing terminal frame can carry the snapshot delta.
    held_terminal: Option<(Uuid, OutputFlag, OutputValue)>,
}

/// An in-progress fork, waiting for the source kernel's state blob.
struct PendingFork {
    notebook_id: NotebookId,
    new_run_id: Uuid,
    new_run_title: String,
    path: PathBuf,
    reply: Reply,
}

/// Owner of all notebook, run and kernel state.
pub struct RunManager {
    /// Directory notebooks live in (the server's working directory).
    base: PathBuf,
    notebooks: FxHashMap<NotebookId, Notebook>,
    kernels: FxHashMap<Uuid, KernelSession>,
    pending_forks: FxHashMap<Uuid, PendingFork>,
    next_notebook_id: u64,
    /// Events fanned out to every connected session.
    broadcast: broadcast::Sender<ServerMessage>,
    /// Handed to kernel reader tasks.
    kernel_events: mpsc::UnboundedSender<KernelEvent>,
    /// Last listing pushed to clients; `None` until the first scan.
    last_dir: Option<Vec<DirEntry>>,
}

impl RunManager {
    pub fn new(
        base: PathBuf,
        broadcast: broadcast::Sender<ServerMessage>,
        kernel_events: mpsc::UnboundedSender<KernelEvent>,
    ) -> Self {
        RunManager {
            base,
            notebooks: FxHashMap::default(),
            kernels: FxHashMap::default(),
            pending_forks: FxHashMap::default(),
            next_notebook_id: 1,
            broadcast,
            kernel_events,
            last_dir: None,
        }
    }

    /// Actor loop: drain the mailbox and the kernel event stream until a
    /// `Shutdown` arrives or every command sender is gone.
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut kernel_events: mpsc::UnboundedReceiver<KernelEvent>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Client { message, reply }) => {
                        self.handle_client(message, reply);
                    }
                    Some(Command::ScanDir) => self.scan_and_publish(),
                    Some(Command::Shutdown) | None => break,
                },
                Some(event) = kernel_events.recv() => self.handle_kernel_event(event),
            }
        }
        for (_, session) in self.kernels.drain() {
            session.process.close();
        }
    }

    fn send(&self, reply: &Reply, message: ServerMessage) {
        if reply.send(message).is_err() {
            tracing::debug!("session went away before its reply");
        }
    }

    fn publish(&self, message: ServerMessage) {
        // No subscribers is fine; sessions may come and go.
        let _ = self.broadcast.send(message);
    }

    fn handle_client(&mut self, message: ClientMessage, reply: Reply) {
        match message {
            ClientMessage::Login => {
                // The login gate lives in the session layer.
                tracing::warn!("unexpected login frame reached the run manager");
            }

            ClientMessage::CreateNewNotebook => {
                let id = NotebookId::new(self.next_notebook_id);
                self.next_notebook_id += 1;
                let notebook = Notebook::new(id, format!("notebook_{}.tsnb", id));
                self.notebooks.insert(id, notebook.clone());
                self.send(&reply, ServerMessage::NewNotebook { notebook });
            }

            ClientMessage::LoadNotebook { path } => {
                // Loading an already-loaded path returns the in-memory
                // notebook unchanged.
                if let Some(notebook) = self.notebooks.values().find(|nb| nb.path == path) {
                    let notebook = notebook.clone();
                    self.send(&reply, ServerMessage::NewNotebook { notebook });
                    return;
                }
                match store::load_notebook(&self.base, &path) {
                    Ok((editor_root, runs)) => {
                        let id = NotebookId::new(self.next_notebook_id);
                        self.next_notebook_id += 1;
                        let notebook = Notebook {
                            id,
                            path,
                            editor_open_nodes: vec![editor_root.id],
                            editor_root,
                            runs,
                        };
                        self.notebooks.insert(id, notebook.clone());
                        self.send(&reply, ServerMessage::NewNotebook { notebook });
                    }
                    Err(e) => {
                        tracing::warn!("cannot load notebook {:?}: {}", path, e);
                        self.send(
                            &reply,
                            ServerMessage::Error {
                                message: format!("cannot load notebook: {}", e),
                            },
                        );
                    }
                }
            }

            ClientMessage::SaveNotebook {
                notebook_id,
                editor_root,
            } => {
                let Some(notebook) = self.notebooks.get_mut(&notebook_id) else {
                    tracing::warn!("SaveNotebook for unknown notebook {}", notebook_id);
                    return;
                };
                if let Err(e) = validate_editor_tree(&editor_root) {
                    self.send(
                        &reply,
                        ServerMessage::SaveCompleted {
                            notebook_id,
                            error: Some(e.to_string()),
                        },
                    );
                    return;
                }
                notebook.editor_root = editor_root;
                let error = match store::save_notebook(&self.base, notebook) {
                    Ok(()) => None,
                    Err(e) => {
                        tracing::warn!("save of notebook {} failed: {}", notebook_id, e);
                        Some(e.to_string())
                    }
                };
                self.send(&reply, ServerMessage::SaveCompleted { notebook_id, error });
            }

            ClientMessage::CreateNewKernel {
                notebook_id,
                run_id,
                run_title,
            } => {
                if !self.notebooks.contains_key(&notebook_id) {
                    tracing::warn!("CreateNewKernel for unknown notebook {}", notebook_id);
                    return;
                }
                if self.kernels.contains_key(&run_id) {
                    tracing::warn!("run {} already has a kernel", run_id);
                    return;
                }
                match self.start_kernel(notebook_id, run_id, run_title, None) {
                    Ok(pid) => {
                        self.send(
                            &reply,
                            ServerMessage::KernelReady {
                                notebook_id,
                                run_id,
                                pid,
                            },
                        );
                    }
                    Err(message) => self.send(&reply, ServerMessage::Error { message }),
                }
            }

            ClientMessage::Fork {
                notebook_id,
                run_id,
                new_run_id,
                new_run_title,
            } => {
                let Some(session) = self.kernels.get(&run_id) else {
                    tracing::warn!("Fork for unknown or closed run {}", run_id);
                    return;
                };
                let path = std::env::temp_dir().join(format!("twinsong-fork-{}.bin", new_run_id));
                session
                    .process
                    .send(KernelRequest::SaveState { path: path.clone() });
                self.pending_forks.insert(
                    run_id,
                    PendingFork {
                        notebook_id,
                        new_run_id,
                        new_run_title,
                        path,
                        reply,
                    },
                );
            }

            ClientMessage::CloseRun {
                notebook_id,
                run_id,
            } => {
                let Some(session) = self.kernels.remove(&run_id) else {
                    tracing::warn!("CloseRun for unknown run {}", run_id);
                    return;
                };
                // In-flight frames already on the wire were delivered; no
                // terminal frame is synthesized for a user-requested close.
                session.process.close();
                if let Some(run) = self
                    .notebooks
                    .get_mut(&notebook_id)
                    .and_then(|nb| nb.run_mut(run_id))
                {
                    run.kernel_state = KernelState::Closed;
                }
            }

            ClientMessage::RunCode {
                notebook_id,
                run_id,
                code,
                cell_id,
                editor_node,
                called_id,
            } => {
                let Some(notebook) = self.notebooks.get_mut(&notebook_id) else {
                    tracing::warn!("RunCode for unknown notebook {}", notebook_id);
                    return;
                };
                let Some(session) = self.kernels.get_mut(&run_id) else {
                    tracing::warn!("RunCode for unknown or closed run {}", run_id);
                    return;
                };
                let Some(run) = notebook.run_mut(run_id) else {
                    tracing::warn!("RunCode for run {} missing from notebook", run_id);
                    return;
                };

                // Minimal clients send bare code; wrap it in a synthetic
                // single-cell tree.
                let editor_node = editor_node.unwrap_or_else(|| EditorNode::Cell {
                    id: Uuid::new_v4(),
                    code: code.clone(),
                });
                let called_id = called_id.unwrap_or_else(|| editor_node.id());
                if !editor_node.contains(called_id) {
                    tracing::warn!(
                        "called id {} is not part of the submitted tree; running it whole",
                        called_id
                    );
                }

                run.output_cells
                    .push(OutputCell::new(cell_id, editor_node.clone(), called_id));
                session.in_flight.push_back(cell_id);
                session.process.send(KernelRequest::RunCode {
                    cell_id,
                    editor_node,
                    called_id,
                });
            }

            ClientMessage::KernelList => {
                let kernels = self
                    .kernels
                    .iter()
                    .map(|(run_id, session)| KernelInfo {
                        run_id: *run_id,
                        notebook_id: session.notebook_id,
                        pid: session.process.pid(),
                    })
                    .collect();
                self.send(&reply, ServerMessage::Kernels { kernels });
            }

            ClientMessage::QueryDir => {
                let entries = self.scan();
                self.send(&reply, ServerMessage::DirList { entries });
            }
        }
    }

    /// Spawn a kernel process and register its run.
    fn start_kernel(
        &mut self,
        notebook_id: NotebookId,
        run_id: Uuid,
        run_title: String,
        resume: Option<PathBuf>,
    ) -> Result<u32, String> {
        let process = KernelProcess::spawn(run_id, resume, self.kernel_events.clone())
            .map_err(|e| e.to_string())?;
        let pid = process.pid();

        let Some(notebook) = self.notebooks.get_mut(&notebook_id) else {
            process.close();
            return Err(format!("unknown notebook {}", notebook_id));
        };
        notebook.runs.push(Run::new(run_id, run_title));
        self.kernels.insert(
            run_id,
            KernelSession {
                process,
                notebook_id,
                in_flight: VecDeque::new(),
                held_terminal: None,
            },
        );
        Ok(pid)
    }

    fn handle_kernel_event(&mut self, event: KernelEvent) {
        match event {
            KernelEvent::Response { run_id, response } => {
                self.handle_kernel_response(run_id, response);
            }
            KernelEvent::Exited { run_id } => self.handle_kernel_exit(run_id),
        }
    }

    fn handle_kernel_response(&mut self, run_id: Uuid, response: KernelResponse) {
        let Some(session) = self.kernels.get_mut(&run_id) else {
            // Frames racing a CloseRun are dropped.
            tracing::debug!("frame from closed run {} dropped", run_id);
            return;
        };
        let notebook_id = session.notebook_id;

        match response {
            KernelResponse::Output {
                cell_id,
                flag,
                value,
            } => {
                if flag.is_terminal() {
                    // Held back until the matching NewGlobals so the
                    // client terminal frame carries the update.
                    session.held_terminal = Some((cell_id, flag, value));
                    return;
                }
                if let Some(cell) = self
                    .notebooks
                    .get_mut(&notebook_id)
                    .and_then(|nb| nb.run_mut(run_id))
                    .and_then(|run| run.output_cell_mut(cell_id))
                {
                    cell.push_value(value.clone());
                }
                self.publish(ServerMessage::Output {
                    notebook_id,
                    run_id,
                    cell_id,
                    flag,
                    value,
                    update: None,
                });
            }

            KernelResponse::NewGlobals { globals } => {
                let held = session.held_terminal.take();
                let Some(run) = self
                    .notebooks
                    .get_mut(&notebook_id)
                    .and_then(|nb| nb.run_mut(run_id))
                else {
                    return;
                };
                let update = diff_snapshots(&run.globals, &globals);
                run.globals = globals;

                match held {
                    Some((cell_id, flag, value)) => {
                        if let Some(cell) = run.output_cell_mut(cell_id) {
                            cell.flag = flag;
                            cell.push_value(value.clone());
                        }
                        if let Some(session) = self.kernels.get_mut(&run_id) {
                            if session.in_flight.front() == Some(&cell_id) {
                                session.in_flight.pop_front();
                            }
                        }
                        self.publish(ServerMessage::Output {
                            notebook_id,
                            run_id,
                            cell_id,
                            flag,
                            value,
                            update: Some(update),
                        });
                    }
                    None => {
                        // Fork/resume emission: no cell is in flight.
                        self.publish(ServerMessage::NewGlobals {
                            notebook_id,
                            run_id,
                            globals: update,
                        });
                    }
                }
            }

            KernelResponse::StateSaved { error } => {
                let Some(fork) = self.pending_forks.remove(&run_id) else {
                    tracing::warn!("unexpected StateSaved from run {}", run_id);
                    return;
                };
                if let Some(error) = error {
                    self.send(
                        &fork.reply,
                        ServerMessage::Error {
                            message: format!("fork failed: {}", error),
                        },
                    );
                    return;
                }
                match self.start_kernel(
                    fork.notebook_id,
                    fork.new_run_id,
                    fork.new_run_title,
                    Some(fork.path),
                ) {
                    Ok(pid) => {
                        self.send(
                            &fork.reply,
                            ServerMessage::KernelReady {
                                notebook_id: fork.notebook_id,
                                run_id: fork.new_run_id,
                                pid,
                            },
                        );
                    }
                    Err(message) => self.send(&fork.reply, ServerMessage::Error { message }),
                }
            }
        }
    }

    fn handle_kernel_exit(&mut self, run_id: Uuid) {
        let Some(mut session) = self.kernels.remove(&run_id) else {
            return;
        };
        let notebook_id = session.notebook_id;
        tracing::info!("kernel of run {} exited", run_id);

        if let Some(fork) = self.pending_forks.remove(&run_id) {
            self.send(
                &fork.reply,
                ServerMessage::Error {
                    message: "fork failed: kernel terminated".to_string(),
                },
            );
        }

        // A held terminal frame has everything but its update; flush it,
        // then fail whatever else was still in flight.
        let mut terminals: Vec<(Uuid, OutputFlag, OutputValue)> = Vec::new();
        if let Some((cell_id, flag, value)) = session.held_terminal.take() {
            if session.in_flight.front() == Some(&cell_id) {
                session.in_flight.pop_front();
            }
            terminals.push((cell_id, flag, value));
        }
        for cell_id in session.in_flight.drain(..) {
            terminals.push((
                cell_id,
                OutputFlag::Fail,
                OutputValue::Error {
                    value: "kernel terminated".to_string(),
                },
            ));
        }

        if let Some(run) = self
            .notebooks
            .get_mut(&notebook_id)
            .and_then(|nb| nb.run_mut(run_id))
        {
            run.kernel_state = KernelState::Closed;
            for (cell_id, flag, value) in &terminals {
                if let Some(cell) = run.output_cell_mut(*cell_id) {
                    cell.flag = *flag;
                    cell.push_value(value.clone());
                }
            }
        }
        for (cell_id, flag, value) in terminals {
            self.publish(ServerMessage::Output {
                notebook_id,
                run_id,
                cell_id,
                flag,
                value,
                update: None,
            });
        }
    }

    fn loaded_paths(&self) -> HashSet<String> {
        self.notebooks
            .values()
            .map(|notebook| notebook.path.clone())
            .collect()
    }

    fn scan(&self) -> Vec<DirEntry> {
        scan_dir(&self.base, &self.loaded_paths())
    }

    /// Periodic tick: push a `DirList` only when the listing changed.
    fn scan_and_publish(&mut self) {
        let entries = self.scan();
        if self.last_dir.as_ref() == Some(&entries) {
            return;
        }
        self.last_dir = Some(entries.clone());
        self.publish(ServerMessage::DirList { entries });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use twinsong_core::model::ScopeKind;

    struct Fixture {
        _temp: TempDir,
        manager: RunManager,
        reply_tx: Reply,
        reply_rx: mpsc::UnboundedReceiver<ServerMessage>,
        broadcast_rx: broadcast::Receiver<ServerMessage>,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let (broadcast_tx, broadcast_rx) = broadcast::channel(64);
        let (kernel_tx, _kernel_rx) = mpsc::unbounded_channel();
        let manager = RunManager::new(temp.path().to_path_buf(), broadcast_tx, kernel_tx);
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        Fixture {
            _temp: temp,
            manager,
            reply_tx,
            reply_rx,
            broadcast_rx,
        }
    }

    impl Fixture {
        fn client(&mut self, message: ClientMessage) {
            self.manager.handle_client(message, self.reply_tx.clone());
        }

        fn reply(&mut self) -> ServerMessage {
            self.reply_rx.try_recv().expect("expected a reply")
        }

        fn no_reply(&mut self) {
            assert!(self.reply_rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn test_create_new_notebook_allocates_monotonic_ids() {
        let mut fx = fixture();

        fx.client(ClientMessage::CreateNewNotebook);
        let ServerMessage::NewNotebook { notebook } = fx.reply() else {
            panic!("expected NewNotebook");
        };
        assert_eq!(notebook.id, NotebookId::new(1));
        assert_eq!(notebook.path, "notebook_1.tsnb");
        assert_eq!(notebook.editor_root.scope, ScopeKind::Own);
        assert_eq!(notebook.editor_open_nodes, vec![notebook.editor_root.id]);
        assert!(notebook.runs.is_empty());

        fx.client(ClientMessage::CreateNewNotebook);
        let ServerMessage::NewNotebook { notebook } = fx.reply() else {
            panic!("expected NewNotebook");
        };
        assert_eq!(notebook.id, NotebookId::new(2));
        assert_eq!(notebook.path, "notebook_2.tsnb");
    }

    #[tokio::test]
    async fn test_save_then_load_roundtrip_through_disk() {
        let mut fx = fixture();
        fx.client(ClientMessage::CreateNewNotebook);
        let ServerMessage::NewNotebook { notebook } = fx.reply() else {
            panic!("expected NewNotebook");
        };

        fx.client(ClientMessage::SaveNotebook {
            notebook_id: notebook.id,
            editor_root: notebook.editor_root.clone(),
        });
        let ServerMessage::SaveCompleted { notebook_id, error } = fx.reply() else {
            panic!("expected SaveCompleted");
        };
        assert_eq!(notebook_id, notebook.id);
        assert_eq!(error, None);

        // The same path resolves to the in-memory notebook.
        fx.client(ClientMessage::LoadNotebook {
            path: notebook.path.clone(),
        });
        let ServerMessage::NewNotebook { notebook: loaded } = fx.reply() else {
            panic!("expected NewNotebook");
        };
        assert_eq!(loaded, notebook);

        // A copied file is a separate notebook with the next id.
        let base = fx.manager.base.clone();
        fs::copy(base.join(&notebook.path), base.join("copy.tsnb")).unwrap();
        fx.client(ClientMessage::LoadNotebook {
            path: "copy.tsnb".to_string(),
        });
        let ServerMessage::NewNotebook { notebook: copy } = fx.reply() else {
            panic!("expected NewNotebook");
        };
        assert_eq!(copy.id, NotebookId::new(2));
        assert_eq!(copy.path, "copy.tsnb");
        assert_eq!(copy.editor_root, notebook.editor_root);

        // Loading the copy twice returns identical replies.
        fx.client(ClientMessage::LoadNotebook {
            path: "copy.tsnb".to_string(),
        });
        let ServerMessage::NewNotebook { notebook: again } = fx.reply() else {
            panic!("expected NewNotebook");
        };
        assert_eq!(again, copy);
    }

    #[tokio::test]
    async fn test_load_missing_notebook_reports_error() {
        let mut fx = fixture();
        fx.client(ClientMessage::LoadNotebook {
            path: "missing.tsnb".to_string(),
        });
        assert!(matches!(fx.reply(), ServerMessage::Error { .. }));
    }

    #[tokio::test]
    async fn test_save_for_unknown_notebook_is_dropped() {
        let mut fx = fixture();
        let root = Notebook::new(NotebookId::new(9), "x.tsnb".to_string()).editor_root;
        fx.client(ClientMessage::SaveNotebook {
            notebook_id: NotebookId::new(9),
            editor_root: root,
        });
        fx.no_reply();
    }

    #[tokio::test]
    async fn test_save_rejects_duplicate_node_ids() {
        let mut fx = fixture();
        fx.client(ClientMessage::CreateNewNotebook);
        let ServerMessage::NewNotebook { notebook } = fx.reply() else {
            panic!("expected NewNotebook");
        };

        let id = Uuid::new_v4();
        let mut root = notebook.editor_root.clone();
        root.children.push(EditorNode::Cell {
            id,
            code: "x = 1".to_string(),
        });
        root.children.push(EditorNode::Cell {
            id,
            code: "x = 2".to_string(),
        });

        fx.client(ClientMessage::SaveNotebook {
            notebook_id: notebook.id,
            editor_root: root,
        });
        let ServerMessage::SaveCompleted { error, .. } = fx.reply() else {
            panic!("expected SaveCompleted");
        };
        assert!(error.unwrap().contains("duplicate"));
    }

    #[tokio::test]
    async fn test_kernel_list_is_empty_without_kernels() {
        let mut fx = fixture();
        fx.client(ClientMessage::KernelList);
        let ServerMessage::Kernels { kernels } = fx.reply() else {
            panic!("expected Kernels");
        };
        assert!(kernels.is_empty());
    }

    #[tokio::test]
    async fn test_query_dir_classifies_loaded_notebooks() {
        let mut fx = fixture();
        fx.client(ClientMessage::CreateNewNotebook);
        let ServerMessage::NewNotebook { notebook } = fx.reply() else {
            panic!("expected NewNotebook");
        };
        fx.client(ClientMessage::SaveNotebook {
            notebook_id: notebook.id,
            editor_root: notebook.editor_root.clone(),
        });
        fx.reply();

        fx.client(ClientMessage::QueryDir);
        let ServerMessage::DirList { entries } = fx.reply() else {
            panic!("expected DirList");
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "notebook_1.tsnb");
        assert_eq!(
            entries[0].entry_type,
            crate::protocol::DirEntryType::LoadedNotebook
        );
    }

    #[tokio::test]
    async fn test_dir_scan_broadcasts_only_on_change() {
        let mut fx = fixture();

        fx.manager.scan_and_publish();
        let ServerMessage::DirList { entries } = fx.broadcast_rx.try_recv().unwrap() else {
            panic!("expected DirList");
        };
        assert!(entries.is_empty());

        // Unchanged listing: nothing published.
        fx.manager.scan_and_publish();
        assert!(fx.broadcast_rx.try_recv().is_err());

        fs::write(fx.manager.base.join("data.txt"), "x").unwrap();
        fx.manager.scan_and_publish();
        let ServerMessage::DirList { entries } = fx.broadcast_rx.try_recv().unwrap() else {
            panic!("expected DirList");
        };
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_run_code_for_unknown_run_is_dropped() {
        let mut fx = fixture();
        fx.client(ClientMessage::CreateNewNotebook);
        let ServerMessage::NewNotebook { notebook } = fx.reply() else {
            panic!("expected NewNotebook");
        };
        fx.client(ClientMessage::RunCode {
            notebook_id: notebook.id,
            run_id: Uuid::new_v4(),
            code: "1 + 2".to_string(),
            cell_id: Uuid::new_v4(),
            editor_node: None,
            called_id: None,
        });
        fx.no_reply();
    }
}
