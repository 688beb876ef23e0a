// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Persistence of expanded writer entries.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::{ConfigurationError, OpcUaError, OpcUaResult};
use crate::models::{OpcNodeModel, PublishedNodesEntryModel};

/// Receives each writer entry as soon as it has been expanded.
#[async_trait]
pub trait WriterEntryStore: Send + Sync {
    /// Creates or replaces the entry. An `Err` is recorded on the entry.
    async fn create_or_update(
        &self,
        entry: &PublishedNodesEntryModel,
        ct: &CancellationToken,
    ) -> OpcUaResult<()>;
}

/// In-memory store keyed by writer id.
#[derive(Debug, Default)]
pub struct InMemoryEntryStore {
    entries: RwLock<HashMap<String, PublishedNodesEntryModel>>,
    order: RwLock<Vec<String>>,
}

impl InMemoryEntryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all entries in insertion order.
    pub fn entries(&self) -> Vec<PublishedNodesEntryModel> {
        let entries = self.entries.read();
        self.order
            .read()
            .iter()
            .filter_map(|id| entries.get(id).cloned())
            .collect()
    }

    /// Returns the entry with the given writer id.
    pub fn get(&self, writer_id: &str) -> Option<PublishedNodesEntryModel> {
        self.entries.read().get(writer_id).cloned()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if nothing was stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl WriterEntryStore for InMemoryEntryStore {
    async fn create_or_update(
        &self,
        entry: &PublishedNodesEntryModel,
        ct: &CancellationToken,
    ) -> OpcUaResult<()> {
        if ct.is_cancelled() {
            return Err(OpcUaError::Cancelled);
        }
        let id = entry.data_set_writer_id.clone().unwrap_or_default();
        let mut entries = self.entries.write();
        if entries.insert(id.clone(), entry.clone()).is_none() {
            self.order.write().push(id);
        }
        Ok(())
    }
}

/// Checks the nodes of an entry before it is persisted.
///
/// Every node needs an id and a unique field id; a missing field id
/// defaults to the node id. Publishing intervals belong to the writer.
///
/// # Errors
///
/// Returns a configuration error describing the first violation.
pub fn validate_nodes(nodes: &mut [OpcNodeModel]) -> OpcUaResult<()> {
    let mut ids = HashSet::new();
    for node in nodes.iter_mut() {
        let Some(id) = node.id.as_deref().filter(|id| !id.is_empty()) else {
            return Err(invalid("Node must contain a node ID"));
        };
        if node.data_set_field_id.is_none() {
            node.data_set_field_id = Some(id.to_string());
        }
        if node.opc_publishing_interval.is_some() {
            return Err(invalid(
                "Publishing interval not allowed on node level. Must be set at writer level.",
            ));
        }
        let field_id = node.data_set_field_id.clone().unwrap_or_default();
        if !ids.insert(field_id) {
            return Err(invalid("Field ids must be present and unique."));
        }
    }
    Ok(())
}

fn invalid(message: &str) -> OpcUaError {
    OpcUaError::configuration(ConfigurationError::invalid_entry(message))
}
