// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Depth-first browse traversal over a remote address space.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::browse::frame::BrowseFrame;
use crate::browse::reference_types;
use crate::browse::sequence::{AsyncSequence, SequenceProgram, WorkStack};
use crate::client::{BrowseDescription, BrowseResult, ContinuationPoint, ReferenceDescription, Session};
use crate::error::{OpcUaError, OpcUaResult, ServiceResult};
use crate::types::{NodeClass, NodeId};

// =============================================================================
// BrowseOptions
// =============================================================================

/// Traversal configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseOptions {
    /// Frames at this depth are not explored further.
    #[serde(default)]
    pub max_depth: Option<usize>,

    /// Only match nodes with this type definition.
    #[serde(default)]
    pub type_definition_id: Option<NodeId>,

    /// Whether subtypes of the type definition also match.
    #[serde(default = "default_true")]
    pub include_type_subtypes: bool,

    /// Reference type to follow.
    #[serde(default = "default_reference_type")]
    pub reference_type_id: NodeId,

    /// Whether subtypes of the reference type are followed.
    #[serde(default = "default_true")]
    pub include_reference_subtypes: bool,

    /// Do not descend into matched nodes.
    #[serde(default)]
    pub stop_when_found: bool,

    /// Node classes to browse through.
    #[serde(default = "default_node_class_mask")]
    pub node_class_mask: u32,

    /// Node classes that match. Defaults to `node_class_mask`.
    #[serde(default)]
    pub match_class: Option<u32>,
}

fn default_true() -> bool {
    true
}

fn default_reference_type() -> NodeId {
    reference_types::hierarchical_references()
}

fn default_node_class_mask() -> u32 {
    NodeClass::Object.value()
}

impl Default for BrowseOptions {
    fn default() -> Self {
        Self {
            max_depth: None,
            type_definition_id: None,
            include_type_subtypes: true,
            reference_type_id: default_reference_type(),
            include_reference_subtypes: true,
            stop_when_found: false,
            node_class_mask: default_node_class_mask(),
            match_class: None,
        }
    }
}

impl BrowseOptions {
    /// Creates options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum depth.
    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Sets the type definition filter.
    pub fn with_type_definition(mut self, type_definition_id: Option<NodeId>) -> Self {
        self.type_definition_id = type_definition_id;
        self
    }

    /// Sets whether type definition subtypes match.
    pub fn with_type_subtypes(mut self, include: bool) -> Self {
        self.include_type_subtypes = include;
        self
    }

    /// Sets the reference type to follow.
    pub fn with_reference_type(mut self, reference_type_id: NodeId, include_subtypes: bool) -> Self {
        self.reference_type_id = reference_type_id;
        self.include_reference_subtypes = include_subtypes;
        self
    }

    /// Sets stop-when-found.
    pub fn with_stop_when_found(mut self, stop: bool) -> Self {
        self.stop_when_found = stop;
        self
    }

    /// Sets the node class mask.
    pub fn with_node_class_mask(mut self, mask: u32) -> Self {
        self.node_class_mask = mask;
        self
    }

    /// Sets the node classes that match.
    pub fn with_match_class(mut self, mask: u32) -> Self {
        self.match_class = Some(mask);
        self
    }

    /// Node class mask that counts as a match.
    pub fn match_mask(&self) -> u32 {
        self.match_class.unwrap_or(self.node_class_mask)
    }

    /// Node class mask sent with each browse request.
    pub fn browse_mask(&self) -> u32 {
        self.node_class_mask | self.match_mask()
    }

    /// Returns `true` if a frame at `depth` may be explored.
    pub fn within_depth(&self, depth: usize) -> bool {
        self.max_depth.map_or(true, |max| depth < max)
    }
}

// =============================================================================
// Steps and handlers
// =============================================================================

/// A pending traversal unit.
#[derive(Debug, Clone)]
pub enum BrowseStep {
    /// Browse the frame's node.
    Browse(Arc<BrowseFrame>),
    /// Fetch the next page of a frame's references.
    BrowseNext {
        /// Frame whose references are being paged.
        frame: Arc<BrowseFrame>,
        /// Server token for the next page.
        continuation_point: ContinuationPoint,
    },
}

impl BrowseStep {
    /// Frame this step works on.
    pub fn frame(&self) -> &Arc<BrowseFrame> {
        match self {
            Self::Browse(frame) => frame,
            Self::BrowseNext { frame, .. } => frame,
        }
    }

    /// Returns `true` for a browse-next step.
    pub fn is_browse_next(&self) -> bool {
        matches!(self, Self::BrowseNext { .. })
    }
}

/// Result of one traversal step.
#[derive(Debug)]
pub struct StepOutcome<T> {
    /// Follow-up steps in push order. The last one runs next.
    pub follow_up: Vec<BrowseStep>,
    /// Items produced by the handler.
    pub items: Vec<T>,
}

impl<T> StepOutcome<T> {
    fn empty() -> Self {
        Self {
            follow_up: Vec::new(),
            items: Vec::new(),
        }
    }
}

/// Receives matches and errors from a traversal.
pub trait BrowseHandler: Send {
    /// Item produced for the sequence consumer.
    type Item: Send;

    /// Called with the matches of one page. `references` holds every frame
    /// of the page that may still be explored; the handler can prune it.
    fn on_matching(
        &mut self,
        matching: &[Arc<BrowseFrame>],
        references: &mut Vec<Arc<BrowseFrame>>,
    ) -> Vec<Self::Item>;

    /// Called when a browse or browse-next of `frame` failed.
    fn on_error(&mut self, frame: &Arc<BrowseFrame>, error: ServiceResult) -> Vec<Self::Item>;
}

// =============================================================================
// BrowseTraversal
// =============================================================================

/// State of one traversal: options, root, browsed and matched node sets.
#[derive(Debug, Default)]
pub struct BrowseTraversal {
    options: BrowseOptions,
    root: Option<Arc<BrowseFrame>>,
    visited: HashSet<NodeId>,
    matched: HashSet<NodeId>,
}

impl BrowseTraversal {
    /// Creates an idle traversal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconfigures the traversal and returns the seed step.
    ///
    /// A missing root starts at the Objects folder.
    pub fn restart(&mut self, root: Option<Arc<BrowseFrame>>, options: BrowseOptions) -> BrowseStep {
        let root = root.unwrap_or_else(|| Arc::new(BrowseFrame::root(NodeId::OBJECTS_FOLDER)));
        self.visited.clear();
        self.matched.clear();
        self.matched.insert(root.node_id.clone());
        self.options = options;
        self.root = Some(Arc::clone(&root));
        BrowseStep::Browse(root)
    }

    /// Active options.
    pub fn options(&self) -> &BrowseOptions {
        &self.options
    }

    /// Active root frame.
    pub fn root(&self) -> Option<&Arc<BrowseFrame>> {
        self.root.as_ref()
    }

    /// Returns `true` if the node was already browsed.
    pub fn is_visited(&self, node_id: &NodeId) -> bool {
        self.visited.contains(node_id)
    }

    /// Runs one step against the session.
    ///
    /// Service failures are reported to the handler; only cancellation is
    /// returned as `Err`.
    pub async fn execute<H: BrowseHandler>(
        &mut self,
        step: BrowseStep,
        session: &dyn Session,
        handler: &mut H,
        ct: &CancellationToken,
    ) -> OpcUaResult<StepOutcome<H::Item>> {
        if ct.is_cancelled() {
            return Err(OpcUaError::Cancelled);
        }

        let (frame, result) = match step {
            BrowseStep::Browse(frame) => {
                if !self.visited.insert(frame.node_id.clone()) {
                    trace!(node_id = %frame.node_id, "Skipping visited node");
                    return Ok(StepOutcome::empty());
                }
                let request = BrowseDescription::forward(
                    frame.node_id.clone(),
                    self.options.reference_type_id.clone(),
                )
                .with_subtypes(self.options.include_reference_subtypes)
                .with_node_class_mask(self.options.browse_mask());
                let result = first_result(session.browse(&[request], ct).await)?;
                (frame, result)
            }
            BrowseStep::BrowseNext {
                frame,
                continuation_point,
            } => {
                let result = first_result(session.browse_next(&[continuation_point], ct).await)?;
                (frame, result)
            }
        };

        if let Some(error) = result.error {
            debug!(node_id = %frame.node_id, error = %error, "Browse failed");
            let items = handler.on_error(&frame, error);
            return Ok(StepOutcome {
                follow_up: Vec::new(),
                items,
            });
        }

        let root = match &self.root {
            Some(root) => Arc::clone(root),
            None => Arc::clone(&frame),
        };
        let mut matching = Vec::new();
        let mut references = Vec::new();
        for reference in &result.references {
            if !reference.is_local() {
                continue;
            }
            let child = Arc::new(BrowseFrame::child(&frame, &root, reference));
            let already_matched = self.matched.contains(&reference.node_id);
            if !already_matched && self.is_match(reference, session, ct).await? {
                self.matched.insert(reference.node_id.clone());
                matching.push(Arc::clone(&child));
            }
            // Only browsed nodes are final; a node cut off by the depth limit
            // is explored when reached again on a shorter path.
            if self.visited.contains(&reference.node_id)
                || (already_matched && self.options.stop_when_found)
            {
                continue;
            }
            references.push(child);
        }

        let mut items = Vec::new();
        if !matching.is_empty() {
            items = handler.on_matching(&matching, &mut references);
            if self.options.stop_when_found {
                references.retain(|r| !matching.iter().any(|m| Arc::ptr_eq(m, r)));
            }
        }

        // Reverse so the first reference is explored first, continuation last
        // so the frame is drained before anything else.
        let mut follow_up: Vec<BrowseStep> = references
            .into_iter()
            .rev()
            .filter(|child| self.options.within_depth(child.depth()))
            .map(BrowseStep::Browse)
            .collect();
        if let Some(continuation_point) = result.continuation_point.filter(|cp| !cp.is_empty()) {
            follow_up.push(BrowseStep::BrowseNext {
                frame,
                continuation_point,
            });
        }
        Ok(StepOutcome { follow_up, items })
    }

    async fn is_match(
        &self,
        reference: &ReferenceDescription,
        session: &dyn Session,
        ct: &CancellationToken,
    ) -> OpcUaResult<bool> {
        if !reference.node_class.is_in(self.options.match_mask()) || !reference.is_local() {
            return Ok(false);
        }
        let Some(expected) = &self.options.type_definition_id else {
            return Ok(true);
        };
        match &reference.type_definition {
            Some(actual) if actual == expected => Ok(true),
            Some(actual) if self.options.include_type_subtypes => {
                match session.is_type_of(actual, expected, ct).await {
                    Ok(is_type) => Ok(is_type),
                    Err(e) if e.is_cancelled() => Err(e),
                    Err(e) => {
                        debug!(type_id = %actual, error = %e, "Type check failed");
                        Ok(false)
                    }
                }
            }
            _ => Ok(false),
        }
    }
}

/// Takes the single result of a one-item browse call, converting service
/// failures into an item error.
fn first_result(results: OpcUaResult<Vec<BrowseResult>>) -> OpcUaResult<BrowseResult> {
    match results {
        Ok(results) => match results.into_iter().next() {
            Some(result) => Ok(result),
            None => Ok(BrowseResult::failed(ServiceResult::new(
                crate::types::StatusCode::BAD_UNEXPECTED_ERROR,
                "Browse returned no results",
            ))),
        },
        Err(e) if e.is_cancelled() => Err(e),
        Err(e) => Ok(BrowseResult::failed(ServiceResult::from(&e))),
    }
}

// =============================================================================
// BrowseSequence
// =============================================================================

/// A traversal packaged as a [`SequenceProgram`].
pub struct BrowseSequence<H: BrowseHandler> {
    session: Arc<dyn Session>,
    traversal: BrowseTraversal,
    handler: H,
}

impl<H: BrowseHandler> BrowseSequence<H> {
    /// Returns the handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Returns the traversal state.
    pub fn traversal(&self) -> &BrowseTraversal {
        &self.traversal
    }
}

#[async_trait]
impl<H: BrowseHandler> SequenceProgram for BrowseSequence<H> {
    type Step = BrowseStep;
    type Item = H::Item;

    async fn execute(
        &mut self,
        step: BrowseStep,
        stack: &mut WorkStack<BrowseStep>,
        ct: &CancellationToken,
    ) -> OpcUaResult<Vec<H::Item>> {
        let outcome = self
            .traversal
            .execute(step, self.session.as_ref(), &mut self.handler, ct)
            .await?;
        for step in outcome.follow_up {
            stack.push(step);
        }
        Ok(outcome.items)
    }
}

/// Creates a sequence that browses from `root` and yields handler items.
pub fn browse_sequence<H: BrowseHandler>(
    session: Arc<dyn Session>,
    root: Option<Arc<BrowseFrame>>,
    options: BrowseOptions,
    handler: H,
) -> AsyncSequence<BrowseSequence<H>> {
    let mut traversal = BrowseTraversal::new();
    let seed = traversal.restart(root, options);
    AsyncSequence::with_initial(
        BrowseSequence {
            session,
            traversal,
            handler,
        },
        seed,
    )
}

// =============================================================================
// MatchCollector
// =============================================================================

/// What a [`MatchCollector`] reports.
#[derive(Debug, Clone)]
pub enum BrowseEvent {
    /// A node matched.
    Matched(Arc<BrowseFrame>),
    /// Browsing a frame failed.
    Failed {
        /// Frame that failed.
        frame: Arc<BrowseFrame>,
        /// Error info.
        error: ServiceResult,
    },
}

/// Handler that yields every match and error as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct MatchCollector;

impl BrowseHandler for MatchCollector {
    type Item = BrowseEvent;

    fn on_matching(
        &mut self,
        matching: &[Arc<BrowseFrame>],
        _references: &mut Vec<Arc<BrowseFrame>>,
    ) -> Vec<BrowseEvent> {
        matching.iter().cloned().map(BrowseEvent::Matched).collect()
    }

    fn on_error(&mut self, frame: &Arc<BrowseFrame>, error: ServiceResult) -> Vec<BrowseEvent> {
        vec![BrowseEvent::Failed {
            frame: Arc::clone(frame),
            error,
        }]
    }
}

// =============================================================================
// Tests
// =============================================================================
