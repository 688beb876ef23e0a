// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Discovered nodes and their parent chains.

use std::fmt;
use std::sync::Arc;

use crate::client::ReferenceDescription;
use crate::types::{NodeClass, NodeId, QualifiedName};

/// A node found during traversal, linked to the frame it was found under.
///
/// Frames are immutable once created and shared through `Arc`. `depth` and
/// `browse_path` are relative to the traversal root that produced the
/// frame: the root has depth 0 and an empty path, each child adds one level
/// and one `/name` element.
#[derive(Debug, Clone)]
pub struct BrowseFrame {
    /// Node id.
    pub node_id: NodeId,
    /// Browse name, unknown for unresolved roots.
    pub browse_name: Option<QualifiedName>,
    /// Display name.
    pub display_name: Option<String>,
    /// Type definition of the node.
    pub type_definition_id: Option<NodeId>,
    /// Node class.
    pub node_class: NodeClass,
    /// Frame this node was discovered under.
    pub parent: Option<Arc<BrowseFrame>>,
    depth: usize,
    browse_path: String,
}

impl BrowseFrame {
    /// Creates a traversal root.
    pub fn root(node_id: NodeId) -> Self {
        Self {
            node_id,
            browse_name: None,
            display_name: None,
            type_definition_id: None,
            node_class: NodeClass::Unspecified,
            parent: None,
            depth: 0,
            browse_path: String::new(),
        }
    }

    /// Sets the browse name.
    pub fn with_browse_name(mut self, browse_name: QualifiedName) -> Self {
        self.browse_name = Some(browse_name);
        self
    }

    /// Sets the display name.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Sets the type definition.
    pub fn with_type_definition(mut self, type_definition_id: Option<NodeId>) -> Self {
        self.type_definition_id = type_definition_id;
        self
    }

    /// Sets the node class.
    pub fn with_node_class(mut self, node_class: NodeClass) -> Self {
        self.node_class = node_class;
        self
    }

    /// Creates the frame for a reference found under `parent`.
    ///
    /// When `parent` is the traversal `root` the child starts a fresh path,
    /// otherwise it extends the parent's.
    pub fn child(
        parent: &Arc<BrowseFrame>,
        root: &Arc<BrowseFrame>,
        reference: &ReferenceDescription,
    ) -> Self {
        let (parent_depth, parent_path) = if Arc::ptr_eq(parent, root) {
            (0, "")
        } else {
            (parent.depth, parent.browse_path.as_str())
        };
        let browse_path = format!("{}/{}", parent_path, reference.browse_name.name);
        let display_name = if reference.display_name.is_empty() {
            None
        } else {
            Some(reference.display_name.clone())
        };
        Self {
            node_id: reference.node_id.clone(),
            browse_name: Some(reference.browse_name.clone()),
            display_name,
            type_definition_id: reference.type_definition.clone(),
            node_class: reference.node_class,
            parent: Some(Arc::clone(parent)),
            depth: parent_depth + 1,
            browse_path,
        }
    }

    /// Number of levels below the traversal root.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Slash-joined browse names from the traversal root.
    #[inline]
    pub fn browse_path(&self) -> &str {
        &self.browse_path
    }

    /// Best available human name: browse name, then display name, then id.
    pub fn name(&self) -> String {
        if let Some(name) = self.browse_name.as_ref().filter(|n| !n.is_null()) {
            return name.name.clone();
        }
        if let Some(name) = self.display_name.as_ref().filter(|n| !n.is_empty()) {
            return name.clone();
        }
        self.node_id.to_string()
    }

    /// Iterates the parent chain, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = &Arc<BrowseFrame>> {
        std::iter::successors(self.parent.as_ref(), |f| f.parent.as_ref())
    }

    /// Returns the topmost frame of the chain.
    pub fn top(self: &Arc<Self>) -> Arc<BrowseFrame> {
        self.ancestors().last().cloned().unwrap_or_else(|| Arc::clone(self))
    }
}

impl PartialEq for BrowseFrame {
    fn eq(&self, other: &Self) -> bool {
        self.node_id == other.node_id
    }
}

impl Eq for BrowseFrame {}

impl fmt::Display for BrowseFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.browse_path.is_empty() {
            write!(f, "{}", self.node_id)
        } else {
            write!(f, "{} ({})", self.browse_path, self.node_id)
        }
    }
}
