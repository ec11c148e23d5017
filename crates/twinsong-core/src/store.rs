//! On-disk notebook format.
//!
//! A notebook is a TOML file (`*.tsnb`) holding the format version and the
//! editor tree, plus a companion directory `<path>.runs/` with one
//! subdirectory per run: `meta.toml` (title, state, output cells) and
//! `globals.bin` (bincode-encoded scope snapshot). A notebook without runs
//! has no companion directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::NOTEBOOK_FORMAT_VERSION;
use crate::error::{Error, Result};
use crate::model::{EditorGroup, KernelState, Notebook, OutputCell, Run, validate_editor_tree};
use crate::scope::ScopeSnapshot;

/// Top-level layout of a `.tsnb` file.
#[derive(Debug, Serialize, Deserialize)]
struct NotebookFile {
    version: String,
    editor_root: EditorGroup,
}

/// Per-run metadata stored in `meta.toml`.
///
/// `order` is the run's position in the notebook's run list; directory
/// listing order is not stable enough to preserve it.
#[derive(Debug, Serialize, Deserialize)]
struct RunMeta {
    order: usize,
    title: String,
    kernel_state: KernelState,
    output_cells: Vec<OutputCell>,
}

fn runs_dir(notebook_path: &Path) -> PathBuf {
    let mut name = notebook_path.file_name().unwrap_or_default().to_os_string();
    name.push(".runs");
    notebook_path.with_file_name(name)
}

/// Write `content` to `path` atomically (temp file + rename).
fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Save a notebook (editor tree + per-run artifacts) under `base`.
pub fn save_notebook(base: &Path, notebook: &Notebook) -> Result<()> {
    let path = base.join(&notebook.path);
    let file = NotebookFile {
        version: NOTEBOOK_FORMAT_VERSION.to_string(),
        editor_root: notebook.editor_root.clone(),
    };
    let text = toml::to_string(&file)
        .map_err(|e| Error::Serialization(format!("failed to encode notebook: {}", e)))?;
    write_atomic(&path, text.as_bytes())?;

    let runs_dir = runs_dir(&path);
    if runs_dir.exists() {
        fs::remove_dir_all(&runs_dir)?;
    }
    if notebook.runs.is_empty() {
        return Ok(());
    }

    for (order, run) in notebook.runs.iter().enumerate() {
        let run_dir = runs_dir.join(run.id.to_string());
        fs::create_dir_all(&run_dir)?;

        let meta = RunMeta {
            order,
            title: run.title.clone(),
            kernel_state: run.kernel_state,
            output_cells: run.output_cells.clone(),
        };
        let meta_text = toml::to_string(&meta)
            .map_err(|e| Error::Serialization(format!("failed to encode run meta: {}", e)))?;
        fs::write(run_dir.join("meta.toml"), meta_text)?;

        let globals = bincode::serde::encode_to_vec(&run.globals, bincode::config::standard())
            .map_err(|e| Error::Serialization(format!("failed to encode globals: {}", e)))?;
        fs::write(run_dir.join("globals.bin"), globals)?;
    }
    Ok(())
}

/// Load the editor tree and hydrated runs of a notebook file under `base`.
///
/// Loaded runs are always `Closed`: their kernel died with the server that
/// owned them, so they keep only their emitted outputs and last snapshot.
pub fn load_notebook(base: &Path, rel_path: &str) -> Result<(EditorGroup, Vec<Run>)> {
    let path = base.join(rel_path);
    let text = fs::read_to_string(&path)?;
    let file: NotebookFile = toml::from_str(&text)
        .map_err(|e| Error::InvalidNotebook(format!("{}: {}", path.display(), e)))?;
    if file.version != NOTEBOOK_FORMAT_VERSION {
        return Err(Error::InvalidNotebook(format!(
            "unsupported version {:?}",
            file.version
        )));
    }
    validate_editor_tree(&file.editor_root)?;

    let mut runs: Vec<(usize, Run)> = Vec::new();
    let runs_dir = runs_dir(&path);
    if runs_dir.is_dir() {
        for entry in fs::read_dir(&runs_dir)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let Some(run_id) = entry
                .file_name()
                .to_str()
                .and_then(|name| Uuid::parse_str(name).ok())
            else {
                tracing::warn!(
                    "skipping unexpected entry in {}: {:?}",
                    runs_dir.display(),
                    entry.file_name()
                );
                continue;
            };
            let (order, run) = load_run(&entry.path(), run_id)?;
            runs.push((order, run));
        }
    }
    runs.sort_by_key(|(order, _)| *order);

    Ok((file.editor_root, runs.into_iter().map(|(_, run)| run).collect()))
}

fn load_run(dir: &Path, run_id: Uuid) -> Result<(usize, Run)> {
    let meta_text = fs::read_to_string(dir.join("meta.toml"))?;
    let meta: RunMeta = toml::from_str(&meta_text)
        .map_err(|e| Error::InvalidNotebook(format!("run {}: {}", run_id, e)))?;

    let globals_path = dir.join("globals.bin");
    let globals = if globals_path.is_file() {
        let bytes = fs::read(&globals_path)?;
        let (snapshot, _): (ScopeSnapshot, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
                .map_err(|e| Error::Deserialization(format!("run {} globals: {}", run_id, e)))?;
        snapshot
    } else {
        ScopeSnapshot::default()
    };

    let run = Run {
        id: run_id,
        title: meta.title,
        kernel_state: KernelState::Closed,
        output_cells: meta.output_cells,
        globals,
    };
    Ok((meta.order, run))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EditorNode, NotebookId, OutputFlag, OutputValue, ScopeKind};
    use indexmap::IndexMap;
    use tempfile::TempDir;

    fn sample_notebook() -> Notebook {
        let mut notebook = Notebook::new(NotebookId::new(1), "sample.tsnb".to_string());
        notebook.editor_root.children.push(EditorNode::Cell {
            id: Uuid::new_v4(),
            code: "print(\"Hello world!\")".to_string(),
        });
        notebook
    }

    fn sample_run() -> Run {
        let cell_id = Uuid::new_v4();
        let editor_node = EditorNode::Cell {
            id: Uuid::new_v4(),
            code: "print('Hello')".to_string(),
        };
        let mut cell = OutputCell::new(cell_id, editor_node, cell_id);
        cell.push_value(OutputValue::Text {
            value: "Hello\n".to_string(),
        });
        cell.push_value(OutputValue::None);
        cell.flag = OutputFlag::Success;

        let mut globals = ScopeSnapshot::default();
        globals
            .variables
            .insert("x".to_string(), Some("{\"root\":\"…\"}".to_string()));

        Run {
            id: Uuid::new_v4(),
            title: "Run Test".to_string(),
            kernel_state: KernelState::Closed,
            output_cells: vec![cell],
            globals,
        }
    }

    #[test]
    fn test_empty_notebook_writes_no_runs_dir() {
        let temp = TempDir::new().unwrap();
        let notebook = sample_notebook();

        save_notebook(temp.path(), &notebook).unwrap();

        assert!(temp.path().join("sample.tsnb").is_file());
        assert!(!temp.path().join("sample.tsnb.runs").exists());
    }

    #[test]
    fn test_notebook_file_carries_version_header() {
        let temp = TempDir::new().unwrap();
        save_notebook(temp.path(), &sample_notebook()).unwrap();

        let text = fs::read_to_string(temp.path().join("sample.tsnb")).unwrap();
        let value: toml::Value = toml::from_str(&text).unwrap();
        assert_eq!(
            value["version"].as_str(),
            Some(crate::NOTEBOOK_FORMAT_VERSION)
        );
        assert!(value.get("editor_root").is_some());
    }

    #[test]
    fn test_roundtrip_with_runs() {
        let temp = TempDir::new().unwrap();
        let mut notebook = sample_notebook();
        notebook.runs.push(sample_run());
        notebook.runs.push(sample_run());

        save_notebook(temp.path(), &notebook).unwrap();
        let (editor_root, runs) = load_notebook(temp.path(), "sample.tsnb").unwrap();

        assert_eq!(editor_root, notebook.editor_root);
        assert_eq!(runs, notebook.runs);
    }

    #[test]
    fn test_loaded_runs_are_closed() {
        let temp = TempDir::new().unwrap();
        let mut notebook = sample_notebook();
        let mut run = sample_run();
        run.kernel_state = KernelState::Running;
        notebook.runs.push(run);

        save_notebook(temp.path(), &notebook).unwrap();
        let (_, runs) = load_notebook(temp.path(), "sample.tsnb").unwrap();
        assert_eq!(runs[0].kernel_state, KernelState::Closed);
    }

    #[test]
    fn test_run_order_is_preserved() {
        let temp = TempDir::new().unwrap();
        let mut notebook = sample_notebook();
        for i in 0..5 {
            let mut run = sample_run();
            run.title = format!("Run {}", i);
            notebook.runs.push(run);
        }

        save_notebook(temp.path(), &notebook).unwrap();
        let (_, runs) = load_notebook(temp.path(), "sample.tsnb").unwrap();
        let titles: Vec<_> = runs.iter().map(|run| run.title.as_str()).collect();
        assert_eq!(titles, vec!["Run 0", "Run 1", "Run 2", "Run 3", "Run 4"]);
    }

    #[test]
    fn test_save_removes_stale_runs_dir() {
        let temp = TempDir::new().unwrap();
        let mut notebook = sample_notebook();
        notebook.runs.push(sample_run());
        save_notebook(temp.path(), &notebook).unwrap();
        assert!(temp.path().join("sample.tsnb.runs").is_dir());

        notebook.runs.clear();
        save_notebook(temp.path(), &notebook).unwrap();
        assert!(!temp.path().join("sample.tsnb.runs").exists());
    }

    #[test]
    fn test_double_load_is_identical() {
        let temp = TempDir::new().unwrap();
        let mut notebook = sample_notebook();
        notebook.runs.push(sample_run());
        save_notebook(temp.path(), &notebook).unwrap();

        let first = load_notebook(temp.path(), "sample.tsnb").unwrap();
        let second = load_notebook(temp.path(), "sample.tsnb").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("old.tsnb");
        fs::write(
            &path,
            "version = \"twinsong 99.0\"\n[editor_root]\nid = \"5f0a1c5e-0000-0000-0000-000000000000\"\nname = \"root\"\nscope = \"Own\"\nchildren = []\n",
        )
        .unwrap();

        let err = load_notebook(temp.path(), "old.tsnb").unwrap_err();
        assert!(matches!(err, Error::InvalidNotebook(_)));
    }

    #[test]
    fn test_globals_snapshot_survives_roundtrip() {
        let temp = TempDir::new().unwrap();
        let mut notebook = sample_notebook();
        let mut run = sample_run();
        let g1 = Uuid::new_v4();
        let mut child = ScopeSnapshot::named("G1");
        child
            .variables
            .insert("y".to_string(), Some("jobject-json".to_string()));
        child.variables.insert("gone".to_string(), None);
        run.globals.children.insert(g1, child);
        notebook.runs.push(run.clone());

        save_notebook(temp.path(), &notebook).unwrap();
        let (_, runs) = load_notebook(temp.path(), "sample.tsnb").unwrap();
        assert_eq!(runs[0].globals, run.globals);
        let mut expected_keys: IndexMap<String, bool> = IndexMap::new();
        expected_keys.insert("y".to_string(), true);
        expected_keys.insert("gone".to_string(), false);
        for (key, present) in expected_keys {
            assert_eq!(runs[0].globals.children[&g1].variables[&key].is_some(), present);
        }
    }
}
