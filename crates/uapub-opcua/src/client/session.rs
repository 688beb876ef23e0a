// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The [`Session`] trait and the request/response shapes it exchanges.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::browse::BrowsePath;
use crate::client::type_system::{DataTypeDefinition, TypeSystem};
use crate::error::{OpcUaError, OpcUaResult, ServiceResult, SessionError};
use crate::types::{
    AttributeId, BrowseDirection, NodeClass, NodeId, QualifiedName, StatusCode, Variant,
};

// =============================================================================
// Browse
// =============================================================================

/// Opaque token returned by a paginated browse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContinuationPoint(pub Vec<u8>);

impl ContinuationPoint {
    /// Returns `true` if the token carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One node to browse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseDescription {
    /// Node to browse.
    pub node_id: NodeId,
    /// Direction of references to follow.
    pub browse_direction: BrowseDirection,
    /// Reference type to follow.
    pub reference_type_id: NodeId,
    /// Whether subtypes of the reference type are followed.
    pub include_subtypes: bool,
    /// Node class mask of targets to return (0 returns all).
    pub node_class_mask: u32,
}

impl BrowseDescription {
    /// Creates a forward browse over a reference type and its subtypes.
    pub fn forward(node_id: NodeId, reference_type_id: NodeId) -> Self {
        Self {
            node_id,
            browse_direction: BrowseDirection::Forward,
            reference_type_id,
            include_subtypes: true,
            node_class_mask: 0,
        }
    }

    /// Sets the node class mask.
    pub fn with_node_class_mask(mut self, mask: u32) -> Self {
        self.node_class_mask = mask;
        self
    }

    /// Sets whether reference subtypes are followed.
    pub fn with_subtypes(mut self, include: bool) -> Self {
        self.include_subtypes = include;
        self
    }
}

/// A reference returned by browse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceDescription {
    /// Target node id.
    pub node_id: NodeId,
    /// Server index of the target (0 = local).
    pub server_index: u32,
    /// Reference type.
    pub reference_type_id: NodeId,
    /// Whether the reference is forward.
    pub is_forward: bool,
    /// Browse name of the target.
    pub browse_name: QualifiedName,
    /// Display name of the target.
    pub display_name: String,
    /// Node class of the target.
    pub node_class: NodeClass,
    /// Type definition of the target, if it has one.
    pub type_definition: Option<NodeId>,
}

impl ReferenceDescription {
    /// Returns `true` if the target lives on this server.
    #[inline]
    pub fn is_local(&self) -> bool {
        self.server_index == 0
    }
}

/// Per-item browse or browse-next result.
#[derive(Debug, Clone, Default)]
pub struct BrowseResult {
    /// References returned on this page.
    pub references: Vec<ReferenceDescription>,
    /// Token for the next page, if any.
    pub continuation_point: Option<ContinuationPoint>,
    /// Item-level error.
    pub error: Option<ServiceResult>,
}

impl BrowseResult {
    /// Creates a successful page.
    pub fn page(
        references: Vec<ReferenceDescription>,
        continuation_point: Option<ContinuationPoint>,
    ) -> Self {
        Self {
            references,
            continuation_point,
            error: None,
        }
    }

    /// Creates a failed result.
    pub fn failed(error: ServiceResult) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }
}

// =============================================================================
// Translate
// =============================================================================

/// Per-item path translation result.
#[derive(Debug, Clone, Default)]
pub struct BrowsePathResult {
    /// Resolved target node ids.
    pub targets: Vec<NodeId>,
    /// Item-level error.
    pub error: Option<ServiceResult>,
}

// =============================================================================
// Read
// =============================================================================

/// One attribute to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadValueId {
    /// Node to read.
    pub node_id: NodeId,
    /// Attribute to read.
    pub attribute_id: AttributeId,
}

impl ReadValueId {
    /// Creates a read request.
    pub fn new(node_id: NodeId, attribute_id: AttributeId) -> Self {
        Self {
            node_id,
            attribute_id,
        }
    }
}

/// Result of an attribute read.
#[derive(Debug, Clone)]
pub struct ReadResult {
    /// The value read (if successful).
    pub value: Option<Variant>,

    /// Status code of the read operation.
    pub status_code: StatusCode,
}

impl ReadResult {
    /// Creates a successful read result.
    pub fn success(value: Variant) -> Self {
        Self {
            value: Some(value),
            status_code: StatusCode::GOOD,
        }
    }

    /// Creates a failed read result.
    pub fn failure(status_code: StatusCode) -> Self {
        Self {
            value: None,
            status_code,
        }
    }

    /// Returns `true` if the read was successful.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.status_code.is_good()
    }

    /// Returns `true` if the status is bad.
    #[inline]
    pub fn is_bad(&self) -> bool {
        self.status_code.is_bad()
    }

    /// Returns the error info for a bad read.
    pub fn error(&self) -> Option<ServiceResult> {
        self.is_bad()
            .then(|| ServiceResult::from_status(self.status_code))
    }
}

/// Path from the root folder to a node.
#[derive(Debug, Clone, Default)]
pub struct RootPathResult {
    /// Browse names from the root (exclusive) to the node (inclusive).
    pub path: Vec<QualifiedName>,
    /// Item-level error.
    pub error: Option<ServiceResult>,
}

// =============================================================================
// Nodes
// =============================================================================

/// A reference held by a cached node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeReference {
    /// Reference type.
    pub reference_type_id: NodeId,
    /// Whether the reference points backwards.
    pub is_inverse: bool,
    /// Target node.
    pub target_id: NodeId,
}

/// A node fetched with its attributes and references.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Node {
    /// Node id.
    pub node_id: NodeId,
    /// Node class.
    pub node_class: NodeClass,
    /// Browse name.
    pub browse_name: QualifiedName,
    /// Display name.
    pub display_name: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Data type (variables and variable types).
    pub data_type: Option<NodeId>,
    /// Value rank (variables and variable types).
    pub value_rank: Option<i32>,
    /// Array dimensions (variables and variable types).
    pub array_dimensions: Option<Vec<u32>>,
    /// Data type definition (data types).
    pub data_type_definition: Option<DataTypeDefinition>,
    /// References of the node.
    pub references: Vec<NodeReference>,
}

// =============================================================================
// OperationLimits
// =============================================================================

/// Server-advertised maximum batch sizes. Zero means no limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OperationLimits {
    /// Maximum nodes per browse request.
    pub max_nodes_per_browse: u32,
    /// Maximum nodes per read request.
    pub max_nodes_per_read: u32,
    /// Maximum paths per translate request.
    pub max_nodes_per_translate_browse_paths_to_node_ids: u32,
}

impl OperationLimits {
    /// Batch size for browse requests.
    pub fn browse_batch_size(&self) -> usize {
        Self::batch_size(self.max_nodes_per_browse)
    }

    /// Batch size for read requests.
    pub fn read_batch_size(&self) -> usize {
        Self::batch_size(self.max_nodes_per_read)
    }

    /// Batch size for translate requests.
    pub fn translate_batch_size(&self) -> usize {
        Self::batch_size(self.max_nodes_per_translate_browse_paths_to_node_ids)
    }

    /// Applies a local ceiling to every limit.
    pub fn clamp(self, ceiling: u32) -> Self {
        let clamp = |v: u32| if v == 0 { ceiling } else { v.min(ceiling) };
        Self {
            max_nodes_per_browse: clamp(self.max_nodes_per_browse),
            max_nodes_per_read: clamp(self.max_nodes_per_read),
            max_nodes_per_translate_browse_paths_to_node_ids: clamp(
                self.max_nodes_per_translate_browse_paths_to_node_ids,
            ),
        }
    }

    fn batch_size(limit: u32) -> usize {
        if limit == 0 {
            usize::MAX
        } else {
            limit as usize
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// Remote address space access used by the engine.
///
/// Batched services return one result per request item in request order.
/// An `Err` means the whole call failed and no item can be attributed.
/// Every call observes the cancellation token.
///
/// Method calls are not part of this trait; resolution never invokes them.
#[async_trait]
pub trait Session: Send + Sync {
    /// Browses the given nodes.
    async fn browse(
        &self,
        requests: &[BrowseDescription],
        ct: &CancellationToken,
    ) -> OpcUaResult<Vec<BrowseResult>>;

    /// Continues paginated browses.
    async fn browse_next(
        &self,
        continuation_points: &[ContinuationPoint],
        ct: &CancellationToken,
    ) -> OpcUaResult<Vec<BrowseResult>>;

    /// Translates relative browse paths to node ids.
    async fn translate_browse_paths(
        &self,
        paths: &[BrowsePath],
        ct: &CancellationToken,
    ) -> OpcUaResult<Vec<BrowsePathResult>>;

    /// Reads node attributes.
    async fn read(
        &self,
        requests: &[ReadValueId],
        ct: &CancellationToken,
    ) -> OpcUaResult<Vec<ReadResult>>;

    /// Returns `true` if `candidate` is `ancestor` or one of its subtypes.
    async fn is_type_of(
        &self,
        candidate: &NodeId,
        ancestor: &NodeId,
        ct: &CancellationToken,
    ) -> OpcUaResult<bool>;

    /// Returns the direct supertype of a type node.
    async fn find_super_type(
        &self,
        type_id: &NodeId,
        ct: &CancellationToken,
    ) -> OpcUaResult<Option<NodeId>>;

    /// Returns the server's operation limits.
    async fn operation_limits(&self, ct: &CancellationToken) -> OpcUaResult<OperationLimits>;

    /// Returns the structural type system snapshot, if the server exposes one.
    async fn type_system(&self, ct: &CancellationToken) -> OpcUaResult<Option<Arc<TypeSystem>>>;

    /// Fetches a node with its attributes and references.
    async fn fetch_node(
        &self,
        node_id: &NodeId,
        ct: &CancellationToken,
    ) -> OpcUaResult<Option<Node>>;

    /// Returns the browse-name path from the root folder for each node.
    async fn browse_paths_from_root(
        &self,
        node_ids: &[NodeId],
        ct: &CancellationToken,
    ) -> OpcUaResult<Vec<RootPathResult>>;
}

/// Fails when a batched service returned the wrong number of results.
pub fn check_result_count<T>(
    service: &'static str,
    expected: usize,
    results: &[T],
) -> OpcUaResult<()> {
    if results.len() != expected {
        return Err(OpcUaError::session(SessionError::result_count_mismatch(
            service,
            expected,
            results.len(),
        )));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_limits_batch_size() {
        let limits = OperationLimits::default();
        assert_eq!(limits.browse_batch_size(), usize::MAX);

        let limits = OperationLimits {
            max_nodes_per_browse: 10,
            max_nodes_per_read: 0,
            max_nodes_per_translate_browse_paths_to_node_ids: 500,
        }
        .clamp(100);
        assert_eq!(limits.browse_batch_size(), 10);
        assert_eq!(limits.read_batch_size(), 100);
        assert_eq!(limits.translate_batch_size(), 100);
    }

    #[test]
    fn test_read_result_error() {
        assert!(ReadResult::success(Variant::Int32(1)).error().is_none());
        let failed = ReadResult::failure(StatusCode::BAD_NODE_ID_UNKNOWN);
        assert_eq!(
            failed.error().map(|e| e.status_code),
            Some(StatusCode::BAD_NODE_ID_UNKNOWN)
        );
    }

    #[test]
    fn test_check_result_count() {
        assert!(check_result_count("Read", 2, &[1, 2]).is_ok());
        assert!(check_result_count("Read", 3, &[1, 2]).is_err());
    }
}
