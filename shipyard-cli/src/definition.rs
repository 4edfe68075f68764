//! Definition loading
//!
//! Picks the definition format from the file extension: `.lua` files are
//! evaluated in the Lua sandbox, `.json` files are deserialized directly.

use anyhow::{Context, Result, bail};
use shipyard_core::domain::pipeline::PipelineDefinition;
use std::path::Path;

pub fn load_definition(path: &Path) -> Result<PipelineDefinition> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("lua") => shipyard_lua::parse_pipeline_file(path),
        Some("json") => {
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read definition file: {}", path.display()))?;
            serde_json::from_str(&source)
                .with_context(|| format!("Failed to parse definition file: {}", path.display()))
        }
        _ => bail!(
            "Unsupported definition file '{}': expected a .lua or .json file",
            path.display()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_lua_definition() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.lua");
        std::fs::write(
            &path,
            r#"
            return pipeline.define {
                name = "packages",
                targets = { "wheezy", { id = "el7", runs_tests = false } },
                phases = {
                    { name = "test", command = { "./ci/test.sh", "{target}" } },
                },
            }
            "#,
        )
        .unwrap();

        let definition = load_definition(&path).unwrap();
        assert_eq!(definition.name, "packages");
        assert_eq!(definition.targets.len(), 2);
        assert!(!definition.targets[1].flags.runs_tests);
    }

    #[test]
    fn test_load_json_definition() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(
            &path,
            r#"{
                "name": "packages",
                "targets": [{"id": "jessie"}],
                "phases": [{"name": "deploy", "command": ["./ci/deploy.sh", "{target}"]}],
                "deploy": {"allow": ["master"]}
            }"#,
        )
        .unwrap();

        let definition = load_definition(&path).unwrap();
        assert_eq!(definition.deploy.allow, vec!["master"]);
        assert!(definition.validate().is_ok());
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let error = load_definition(Path::new("pipeline.yaml")).unwrap_err();
        assert!(error.to_string().contains("Unsupported definition file"));
    }

    #[test]
    fn test_missing_file_has_context() {
        let dir = tempfile::tempdir().unwrap();
        let error = load_definition(&dir.path().join("missing.json")).unwrap_err();
        assert!(error.to_string().contains("Failed to read definition file"));
    }
}
