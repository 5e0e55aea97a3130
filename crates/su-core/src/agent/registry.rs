use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::AgentDescriptor;

/// Discovered agent packages under one root directory.
pub struct AgentRegistry {
    root: PathBuf,
    agents: BTreeMap<String, AgentDescriptor>,
}

impl AgentRegistry {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            agents: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Re-read every immediate, non-hidden subdirectory of the root.
    /// Replaces previous results, dropping any loaded handles.
    pub fn scan(&mut self) -> &BTreeMap<String, AgentDescriptor> {
        self.agents.clear();

        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot read agents directory {}: {e}", self.root.display());
                return &self.agents;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if hidden || !path.is_dir() {
                continue;
            }
            let desc = AgentDescriptor::scan(&path);
            self.agents.insert(desc.name.clone(), desc);
        }

        info!(
            "Scanned {}: {} agent(s), {} valid",
            self.root.display(),
            self.agents.len(),
            self.agents.values().filter(|a| a.valid).count()
        );
        &self.agents
    }

    pub fn get(&self, name: &str) -> Option<&AgentDescriptor> {
        self.agents.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut AgentDescriptor> {
        self.agents.get_mut(name)
    }

    pub fn all(&self) -> impl Iterator<Item = &AgentDescriptor> {
        self.agents.values()
    }

    pub fn names(&self) -> Vec<String> {
        self.agents.keys().cloned().collect()
    }

    pub fn valid_names(&self) -> Vec<String> {
        self.agents
            .values()
            .filter(|a| a.valid)
            .map(|a| a.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
