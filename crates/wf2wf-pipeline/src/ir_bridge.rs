// SPDX-License-Identifier: MIT OR Apache-2.0
//! The identity bridge: the IR itself as a seventh format.

use std::path::{Path, PathBuf};
use wf2wf_core::{
    ExportError, LossEntry, ParseError, SourceParser, TargetEmitter, Workflow, canonical_json,
};
use wf2wf_format::WorkflowFormat;

/// Importer for IR documents (`.json`, `.yaml`, `.yml`).
#[derive(Debug, Default)]
pub struct IrImporter {
    _priv: (),
}

impl IrImporter {
    /// Create an importer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SourceParser for IrImporter {
    fn source_format(&self) -> WorkflowFormat {
        WorkflowFormat::Ir
    }

    fn parse_source(&self, path: &Path) -> Result<Workflow, ParseError> {
        let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "yaml" || e == "yml");
        if is_yaml {
            serde_yaml::from_str(&text)
                .map_err(|e| ParseError::syntax(format!("invalid IR YAML: {e}")))
        } else {
            Ok(serde_json::from_str(&text)?)
        }
    }
}

/// Exporter for IR documents. Lossless by definition.
#[derive(Debug, Default)]
pub struct IrExporter {
    _priv: (),
}

impl IrExporter {
    /// Create an exporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TargetEmitter for IrExporter {
    fn target_format(&self) -> WorkflowFormat {
        WorkflowFormat::Ir
    }

    fn detect_losses(&self, _workflow: &Workflow) -> Vec<LossEntry> {
        Vec::new()
    }

    fn generate_output(&self, workflow: &Workflow, path: &Path) -> Result<Vec<PathBuf>, ExportError> {
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "yaml" || e == "yml");
        let mut text = if is_yaml {
            serde_yaml::to_string(workflow)
                .map_err(|e| ExportError::invalid(format!("YAML serialisation failed: {e}")))?
        } else {
            // Canonical JSON: sorted keys, omitted unset fields.
            canonical_json(workflow)
                .map_err(|e| ExportError::invalid(format!("canonicalisation failed: {e}")))?
        };
        if !text.ends_with('\n') {
            text.push('\n');
        }
        std::fs::write(path, text).map_err(|source| ExportError::io(path, source))?;
        Ok(vec![path.to_path_buf()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wf2wf_core::{Environment, TaskBuilder};

    fn sample() -> Workflow {
        let mut wf = Workflow::new("demo", "1.0");
        wf.add_task(
            TaskBuilder::new("align")
                .on(Environment::SharedFilesystem)
                .command("bwa mem r.fq")
                .mem_mb(8000)
                .build(),
        )
        .unwrap();
        wf
    }

    #[test]
    fn json_roundtrip_is_canonical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wf.json");
        let wf = sample();
        IrExporter::new().generate_output(&wf, &path).unwrap();
        let back = IrImporter::new().parse_source(&path).unwrap();
        assert_eq!(wf, back);
        // Re-export is byte-identical.
        let second = dir.path().join("wf2.json");
        IrExporter::new().generate_output(&back, &second).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            std::fs::read_to_string(&second).unwrap()
        );
    }

    #[test]
    fn yaml_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wf.yaml");
        let wf = sample();
        IrExporter::new().generate_output(&wf, &path).unwrap();
        let back = IrImporter::new().parse_source(&path).unwrap();
        assert_eq!(wf, back);
    }

    #[test]
    fn ir_has_no_losses() {
        assert!(IrExporter::new().detect_losses(&sample()).is_empty());
    }
}
