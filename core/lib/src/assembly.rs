//! Synthesized output: one template per stack plus a manifest describing them.

use crate::error::{ErrorContext, IacError, IacResult};
use crate::exports::ExportName;
use crate::stack::Stack;
use crate::template::Template;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const MANIFEST_VERSION: &str = "1.0";

/// Entry of the manifest describing one stack artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackArtifact {
    pub name: String,
    pub template_file: String,
    pub dependencies: Vec<String>,
    pub exports: BTreeSet<ExportName>,
    pub imports: BTreeSet<ExportName>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Manifest {
    pub version: String,
    /// In deployment order.
    pub stacks: Vec<StackArtifact>,
}

/// The deployable result of synthesizing an app.
#[derive(Debug, Clone)]
pub struct CloudAssembly {
    manifest: Manifest,
    templates: BTreeMap<String, Template>,
}

impl CloudAssembly {
    /// Build an assembly from stacks that are already in deployment order.
    pub fn from_stacks(stacks: &[&Stack]) -> IacResult<Self> {
        let mut artifacts = Vec::with_capacity(stacks.len());
        let mut templates = BTreeMap::new();

        for stack in stacks {
            let artifact = StackArtifact {
                name: stack.name().to_string(),
                template_file: template_file_name(stack.name()),
                dependencies: stack.dependencies().to_vec(),
                exports: stack.exports(),
                imports: stack.imports()?,
            };
            debug!(
                "Stack {}: {} exports, {} imports",
                artifact.name,
                artifact.exports.len(),
                artifact.imports.len()
            );
            artifacts.push(artifact);
            templates.insert(stack.name().to_string(), stack.template().clone());
        }

        Ok(Self {
            manifest: Manifest {
                version: MANIFEST_VERSION.to_string(),
                stacks: artifacts,
            },
            templates,
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Stack names in deployment order.
    pub fn stack_names(&self) -> Vec<&str> {
        self.manifest.stacks.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn artifact(&self, stack_name: &str) -> Option<&StackArtifact> {
        self.manifest.stacks.iter().find(|s| s.name == stack_name)
    }

    pub fn template(&self, stack_name: &str) -> Option<&Template> {
        self.templates.get(stack_name)
    }

    pub fn template_json(&self, stack_name: &str) -> IacResult<String> {
        self.template(stack_name)
            .ok_or_else(|| unknown_stack(stack_name, "template_json"))?
            .to_json()
    }

    pub fn manifest_json(&self) -> IacResult<String> {
        Ok(serde_json::to_string_pretty(&self.manifest)?)
    }

    /// Direct dependencies of a stack.
    pub fn dependencies_of(&self, stack_name: &str) -> IacResult<&[String]> {
        self.artifact(stack_name)
            .map(|a| a.dependencies.as_slice())
            .ok_or_else(|| unknown_stack(stack_name, "dependencies_of"))
    }

    /// The selected stacks and everything they depend on, in deployment order.
    /// An empty selection means every stack.
    pub fn with_dependencies(&self, selection: &[String]) -> IacResult<Vec<&str>> {
        if selection.is_empty() {
            return Ok(self.stack_names());
        }

        let mut included: HashSet<&str> = HashSet::new();
        let mut pending: Vec<&str> = Vec::new();
        for name in selection {
            let artifact = self
                .artifact(name)
                .ok_or_else(|| unknown_stack(name, "select_stacks"))?;
            pending.push(artifact.name.as_str());
        }

        while let Some(name) = pending.pop() {
            if included.insert(name) {
                pending.extend(self.dependencies_of(name)?.iter().map(String::as_str));
            }
        }

        Ok(self
            .stack_names()
            .into_iter()
            .filter(|name| included.contains(name))
            .collect())
    }

    /// The selected stacks and every stack depending on them, in deployment
    /// order. An empty selection means every stack.
    pub fn with_dependents(&self, selection: &[String]) -> IacResult<Vec<&str>> {
        if selection.is_empty() {
            return Ok(self.stack_names());
        }

        let mut included: HashSet<&str> = HashSet::new();
        for name in selection {
            let artifact = self
                .artifact(name)
                .ok_or_else(|| unknown_stack(name, "select_stacks"))?;
            included.insert(artifact.name.as_str());
        }

        // Deployment order guarantees dependencies are seen before dependents.
        for artifact in &self.manifest.stacks {
            if artifact
                .dependencies
                .iter()
                .any(|d| included.contains(d.as_str()))
            {
                included.insert(artifact.name.as_str());
            }
        }

        Ok(self
            .stack_names()
            .into_iter()
            .filter(|name| included.contains(name))
            .collect())
    }

    /// Write `<Stack>.template.json` for every stack and `manifest.json` into `dir`.
    pub fn write_to<P: AsRef<Path>>(&self, dir: P) -> IacResult<Vec<PathBuf>> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| {
            IacError::from(e).with_context(
                ErrorContext::new("write_assembly").with_info(dir.display().to_string()),
            )
        })?;

        let mut written = Vec::with_capacity(self.manifest.stacks.len() + 1);
        for artifact in &self.manifest.stacks {
            let path = dir.join(&artifact.template_file);
            write_file(&path, &self.template_json(&artifact.name)?)?;
            written.push(path);
        }

        let manifest_path = dir.join(MANIFEST_FILE);
        write_file(&manifest_path, &self.manifest_json()?)?;
        written.push(manifest_path);

        info!("Wrote cloud assembly to {}", dir.display());
        Ok(written)
    }
}

pub fn template_file_name(stack_name: &str) -> String {
    format!("{}.template.json", stack_name)
}

fn write_file(path: &Path, contents: &str) -> IacResult<()> {
    fs::write(path, format!("{}\n", contents)).map_err(|e| {
        IacError::from(e)
            .with_context(ErrorContext::new("write_assembly").with_info(path.display().to_string()))
    })?;
    debug!("Wrote {}", path.display());
    Ok(())
}

fn unknown_stack(stack_name: &str, operation: &str) -> IacError {
    IacError::synthesis(format!("Stack {} is not part of the assembly", stack_name))
        .with_context(ErrorContext::new(operation).with_stack(stack_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeploymentContext;
    use crate::stacks::build_app;

    fn assembly() -> CloudAssembly {
        build_app(&DeploymentContext::default())
            .unwrap()
            .synth()
            .unwrap()
    }

    #[test]
    fn test_write_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let written = assembly().write_to(dir.path().join("cdk.out")).unwrap();

        assert_eq!(written.len(), 5);
        assert!(dir.path().join("cdk.out/LambdaStack.template.json").exists());

        let manifest: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(dir.path().join("cdk.out/manifest.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(manifest["version"], MANIFEST_VERSION);
        assert_eq!(manifest["stacks"][3]["name"], "CicdStack");
        assert_eq!(
            manifest["stacks"][3]["templateFile"],
            "CicdStack.template.json"
        );
        assert_eq!(
            manifest["stacks"][2]["dependencies"],
            serde_json::json!(["LambdaS3Stack", "DynamoDBStack"])
        );
    }

    #[test]
    fn test_with_dependencies() {
        let assembly = assembly();

        assert_eq!(
            assembly
                .with_dependencies(&["LambdaStack".to_string()])
                .unwrap(),
            vec!["DynamoDBStack", "LambdaS3Stack", "LambdaStack"]
        );
        assert_eq!(
            assembly
                .with_dependencies(&["DynamoDBStack".to_string()])
                .unwrap(),
            vec!["DynamoDBStack"]
        );
        assert_eq!(assembly.with_dependencies(&[]).unwrap().len(), 4);
        assert!(assembly
            .with_dependencies(&["NoSuchStack".to_string()])
            .is_err());
    }

    #[test]
    fn test_with_dependents() {
        let assembly = assembly();

        assert_eq!(
            assembly
                .with_dependents(&["LambdaS3Stack".to_string()])
                .unwrap(),
            vec!["LambdaS3Stack", "LambdaStack", "CicdStack"]
        );
        assert_eq!(
            assembly.with_dependents(&["CicdStack".to_string()]).unwrap(),
            vec!["CicdStack"]
        );
    }

    #[test]
    fn test_unknown_stack_template() {
        assert!(matches!(
            assembly().template_json("Nope"),
            Err(IacError::Synthesis { .. })
        ));
    }
}
