//! Contract artifacts: creation bytecode and ABI, looked up by contract name.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use alloy_core::{
    dyn_abi::DynSolValue,
    json_abi::JsonAbi,
    primitives::Bytes,
};
use anyhow::{Context, Result};
use serde::Deserialize;

use crate::abi::{self, ConstructorInput};

/// The creation interface of a compiled contract.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractArtifact {
    /// Contract name.
    pub name: String,
    /// Contract ABI.
    pub abi: JsonAbi,
    /// Creation bytecode, without constructor arguments.
    pub bytecode: Bytes,
}

impl ContractArtifact {
    pub fn new(name: impl Into<String>, abi: JsonAbi, bytecode: Bytes) -> Self {
        Self {
            name: name.into(),
            abi,
            bytecode,
        }
    }

    /// Constructor parameters declared by the artifact ABI.
    pub fn constructor_inputs(&self) -> Result<Vec<ConstructorInput>> {
        abi::constructor_inputs(&self.abi)
            .with_context(|| format!("Invalid constructor ABI for {}", self.name))
    }

    /// Creation bytecode followed by the ABI-encoded constructor arguments.
    pub fn init_code(&self, args: &[DynSolValue]) -> Bytes {
        let mut code = self.bytecode.to_vec();
        code.extend(abi::encode_args(args));
        code.into()
    }
}

/// Maps a contract name to its artifact.
pub trait ArtifactResolver {
    fn resolve(&self, contract: &str) -> Result<ContractArtifact>;
}

impl ArtifactResolver for HashMap<String, ContractArtifact> {
    fn resolve(&self, contract: &str) -> Result<ContractArtifact> {
        self.get(contract)
            .cloned()
            .with_context(|| format!("Artifact for {} not found", contract))
    }
}

/// Bytecode as emitted by Hardhat (plain hex) or Foundry (`{ object }`).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BytecodeField {
    Hex(Bytes),
    Object { object: Bytes },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactFile {
    contract_name: Option<String>,
    abi: JsonAbi,
    bytecode: BytecodeField,
}

/// Artifacts read from a compiler output directory.
///
/// The directory is searched recursively for `<Name>.json`. Both the Hardhat layout
/// (`artifacts/contracts/X.sol/Name.json`) and the Foundry layout
/// (`out/X.sol/Name.json`) are supported. A fully qualified name
/// (`contracts/X.sol:Name`) restricts the search to artifacts of that source file.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Parse a single artifact file.
    pub fn load_file(path: &Path, name: &str) -> Result<ContractArtifact> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;
        let file: ArtifactFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse artifact {}", path.display()))?;

        if let Some(contract_name) = &file.contract_name {
            if contract_name != name {
                anyhow::bail!(
                    "Artifact {} describes {}, expected {}",
                    path.display(),
                    contract_name,
                    name
                );
            }
        }

        let bytecode = match file.bytecode {
            BytecodeField::Hex(bytes) => bytes,
            BytecodeField::Object { object } => object,
        };

        if bytecode.is_empty() {
            anyhow::bail!(
                "{} has no creation bytecode (abstract contract or interface?)",
                name
            );
        }

        Ok(ContractArtifact::new(name, file.abi, bytecode))
    }

    fn find_candidates(&self, dir: &Path, file_name: &str, out: &mut Vec<PathBuf>) -> Result<()> {
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read artifacts directory {}", dir.display()))?;

        for entry in entries {
            let entry =
                entry.with_context(|| format!("Failed to read entry in {}", dir.display()))?;
            let path = entry.path();
            // Symlinked directories are not followed, so link cycles cannot recurse.
            let file_type = entry
                .file_type()
                .with_context(|| format!("Failed to read file type of {}", path.display()))?;

            if file_type.is_dir() {
                // Build info files are large and never named after a contract.
                if path.file_name().is_some_and(|n| n == "build-info") {
                    continue;
                }
                self.find_candidates(&path, file_name, out)?;
            } else if path.file_name().is_some_and(|n| n == file_name) {
                out.push(path);
            }
        }

        Ok(())
    }
}

impl ArtifactResolver for ArtifactStore {
    fn resolve(&self, contract: &str) -> Result<ContractArtifact> {
        let (source, name) = match contract.rsplit_once(':') {
            Some((source, name)) => (Some(source), name),
            None => (None, contract),
        };

        if !self.root.is_dir() {
            anyhow::bail!(
                "Artifacts directory {} does not exist. Compile the contracts first.",
                self.root.display()
            );
        }

        let mut candidates = Vec::new();
        self.find_candidates(&self.root, &format!("{name}.json"), &mut candidates)?;

        if let Some(source) = source {
            let source_file = Path::new(source).file_name();
            candidates.retain(|path| path.parent().and_then(Path::file_name) == source_file);
        }

        candidates.sort();

        match candidates.as_slice() {
            [] => anyhow::bail!(
                "Artifact for {} not found in {}",
                contract,
                self.root.display()
            ),
            [path] => {
                tracing::debug!(contract, path = %path.display(), "Resolved contract artifact");
                Self::load_file(path, name)
            }
            paths => anyhow::bail!(
                "Multiple artifacts found for {}: {}. Use a fully qualified name (path/To.sol:{}).",
                contract,
                paths
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
                name
            ),
        }
    }
}
