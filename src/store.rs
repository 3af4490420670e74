use crate::error::StoreError;
use crate::execution::Execution;
use crate::flow::{Flow, FlowStatus};
use ahash::AHashSet;
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Read, Write};

/// Everything the registry holds, in a form that survives a restart.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Snapshot {
    pub flows: Vec<Flow>,
    pub executions: Vec<Execution>,
}

impl Snapshot {
    pub fn new(flows: Vec<Flow>, executions: Vec<Execution>) -> Self {
        Self { flows, executions }
    }

    /// Saves the snapshot to a file using the bincode format.
    pub fn save(&self, path: &str) -> Result<(), StoreError> {
        let bytes = encode_to_vec(self, standard())
            .map_err(|e| StoreError::Encode(e.to_string()))?;
        let io = |e: std::io::Error| StoreError::Io {
            path: path.to_string(),
            message: e.to_string(),
        };
        let mut file = fs::File::create(path).map_err(io)?;
        file.write_all(&bytes).map_err(io)?;
        Ok(())
    }

    /// Loads a snapshot from a file and checks it for consistency.
    pub fn from_file(path: &str) -> Result<Self, StoreError> {
        let io = |e: std::io::Error| StoreError::Io {
            path: path.to_string(),
            message: e.to_string(),
        };
        let mut file = fs::File::open(path).map_err(io)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).map_err(io)?;
        Self::from_bytes(&bytes)
    }

    /// Deserializes a snapshot from a byte slice.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        let snapshot: Self = decode_from_slice(bytes, standard())
            .map(|(snapshot, _)| snapshot)
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        snapshot.check()?;
        Ok(snapshot)
    }

    /// Pretty JSON for inspection. Not meant to be loaded back.
    pub fn to_json(&self) -> Result<String, StoreError> {
        serde_json::to_string_pretty(self).map_err(|e| StoreError::Encode(e.to_string()))
    }

    /// Rejects snapshots that break registry invariants.
    pub fn check(&self) -> Result<(), StoreError> {
        let active = self
            .flows
            .iter()
            .filter(|f| f.status == FlowStatus::Active)
            .count();
        if active > 1 {
            return Err(StoreError::Corrupt(format!(
                "{} flows are marked active",
                active
            )));
        }

        let mut ids = AHashSet::new();
        if let Some(dup) = self.flows.iter().find(|f| !ids.insert(f.id)) {
            return Err(StoreError::Corrupt(format!("flow {} appears twice", dup.id)));
        }
        let versions: AHashSet<_> = self.flows.iter().map(|f| f.flow_ref()).collect();
        if let Some(orphan) = self
            .executions
            .iter()
            .find(|e| !versions.contains(&e.flow))
        {
            return Err(StoreError::Corrupt(format!(
                "execution {} is bound to unknown flow {}",
                orphan.id, orphan.flow
            )));
        }
        Ok(())
    }
}
