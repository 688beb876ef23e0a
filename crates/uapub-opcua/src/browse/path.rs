// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Relative browse paths used for path translation.
//!
//! Configured paths are lists of element strings in the OPC UA relative
//! path text form:
//!
//! ```text
//! /2:Line1          hierarchical reference (subtypes included)
//! .Temperature      aggregates reference
//! <HasComponent>1:Motor
//! <#Organizes>Pump  exact reference type, no subtypes
//! <!HasChild>Parent inverse reference
//! ```
//!
//! An element without a prefix follows hierarchical references.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::browse::reference_types;
use crate::error::{ConfigurationError, OpcUaError, OpcUaResult};
use crate::types::{NodeId, QualifiedName};

// =============================================================================
// BrowsePath
// =============================================================================

/// A start node plus a relative path to follow from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowsePath {
    /// Starting node (usually Objects folder).
    pub start_node: NodeId,

    /// Path segments to follow.
    pub segments: Vec<BrowsePathSegment>,
}

impl BrowsePath {
    /// Creates a new browse path with a custom start node.
    pub fn new(start_node: NodeId, segments: Vec<BrowsePathSegment>) -> Self {
        Self {
            start_node,
            segments,
        }
    }

    /// Parses configured path elements relative to a start node.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if any element is malformed.
    pub fn parse<S: AsRef<str>>(start_node: NodeId, elements: &[S]) -> OpcUaResult<Self> {
        let segments = elements
            .iter()
            .map(|e| BrowsePathSegment::parse(e.as_ref()))
            .collect::<OpcUaResult<Vec<_>>>()?;
        Ok(Self::new(start_node, segments))
    }

    /// Returns `true` if the path is empty.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }
}

impl fmt::Display for BrowsePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.start_node)?;
        for segment in &self.segments {
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

// =============================================================================
// BrowsePathSegment
// =============================================================================

/// A single segment in a browse path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowsePathSegment {
    /// Reference type to follow.
    pub reference_type_id: NodeId,

    /// Whether the reference is followed backwards.
    #[serde(default)]
    pub is_inverse: bool,

    /// Whether to include subtypes of the reference type.
    #[serde(default = "default_true")]
    pub include_subtypes: bool,

    /// Target browse name to find.
    pub target_name: QualifiedName,
}

fn default_true() -> bool {
    true
}

impl BrowsePathSegment {
    /// Creates a hierarchical segment.
    pub fn new(target_name: QualifiedName) -> Self {
        Self {
            reference_type_id: reference_types::hierarchical_references(),
            is_inverse: false,
            include_subtypes: true,
            target_name,
        }
    }

    /// Creates a segment with a specific reference type.
    pub fn with_reference_type(mut self, reference_type: NodeId) -> Self {
        self.reference_type_id = reference_type;
        self
    }

    /// Parses one relative path element.
    pub fn parse(element: &str) -> OpcUaResult<Self> {
        let invalid = |reason: &str| {
            OpcUaError::configuration(ConfigurationError::invalid_browse_path(element, reason))
        };

        let (segment, name) = if let Some(rest) = element.strip_prefix('/') {
            (Self::new(QualifiedName::default()), rest)
        } else if let Some(rest) = element.strip_prefix('.') {
            (
                Self::new(QualifiedName::default())
                    .with_reference_type(reference_types::aggregates()),
                rest,
            )
        } else if let Some(rest) = element.strip_prefix('<') {
            let (reference, name) = rest
                .split_once('>')
                .ok_or_else(|| invalid("Missing '>' after reference type"))?;
            let mut segment = Self::new(QualifiedName::default());
            let mut reference = reference;
            loop {
                if let Some(r) = reference.strip_prefix('#') {
                    segment.include_subtypes = false;
                    reference = r;
                } else if let Some(r) = reference.strip_prefix('!') {
                    segment.is_inverse = true;
                    reference = r;
                } else {
                    break;
                }
            }
            segment.reference_type_id = match reference_types::from_name(reference) {
                Some(id) => id,
                None => reference
                    .parse::<NodeId>()
                    .map_err(|_| invalid("Unknown reference type"))?,
            };
            (segment, name)
        } else {
            (Self::new(QualifiedName::default()), element)
        };

        if name.is_empty() {
            return Err(invalid("Missing target name"));
        }
        Ok(Self {
            target_name: QualifiedName::from(name),
            ..segment
        })
    }
}

impl fmt::Display for BrowsePathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let standard = self.include_subtypes && !self.is_inverse;
        if standard && self.reference_type_id == reference_types::hierarchical_references() {
            write!(f, "/")?;
        } else if standard && self.reference_type_id == reference_types::aggregates() {
            write!(f, ".")?;
        } else {
            write!(f, "<")?;
            if !self.include_subtypes {
                write!(f, "#")?;
            }
            if self.is_inverse {
                write!(f, "!")?;
            }
            match reference_types::name_of(&self.reference_type_id) {
                Some(name) => write!(f, "{}", name)?,
                None => write!(f, "{}", self.reference_type_id)?,
            }
            write!(f, ">")?;
        }
        write!(f, "{}", self.target_name)
    }
}

// =============================================================================
// Tests
// =============================================================================
