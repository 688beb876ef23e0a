// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Resumable address-space browsing.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    AsyncSequence<P>                             │
//! │     (work-stack driver: pop step, await, yield, completion)     │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │ SequenceProgram
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    BrowseTraversal                              │
//! │  (depth-first browse, browse-next draining, visited set,        │
//! │   match rule, depth limit, stop-when-found)                     │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//!    BrowseOptions        BrowseFrame          BrowsePath
//!    (Configuration)   (Discovered node)   (Path translation)
//! ```
//!
//! The driver is a trampoline rather than a generator: every step is an
//! enum value popped from an explicit stack, so a step can schedule any
//! number of follow-ups and a program can reseed the stack mid-run.

mod frame;
mod path;
mod sequence;
mod traversal;

pub use frame::BrowseFrame;
pub use path::{BrowsePath, BrowsePathSegment};
pub use sequence::{AsyncSequence, SequenceProgram, WorkStack};
pub use traversal::{
    browse_sequence, BrowseEvent, BrowseHandler, BrowseOptions, BrowseSequence, BrowseStep,
    BrowseTraversal, MatchCollector, StepOutcome,
};

// =============================================================================
// Standard Reference Type Node IDs (OPC UA Part 5)
// =============================================================================

/// Standard OPC UA reference type node IDs.
pub mod reference_types {
    use crate::types::NodeId;

    /// HierarchicalReferences (abstract) - i=33.
    pub const fn hierarchical_references() -> NodeId {
        NodeId::numeric(0, 33)
    }

    /// HasChild (abstract) - i=34.
    pub const fn has_child() -> NodeId {
        NodeId::numeric(0, 34)
    }

    /// Organizes - i=35.
    pub const fn organizes() -> NodeId {
        NodeId::numeric(0, 35)
    }

    /// HasEventSource - i=36.
    pub const fn has_event_source() -> NodeId {
        NodeId::numeric(0, 36)
    }

    /// HasTypeDefinition - i=40.
    pub const fn has_type_definition() -> NodeId {
        NodeId::numeric(0, 40)
    }

    /// GeneratesEvent - i=41.
    pub const fn generates_event() -> NodeId {
        NodeId::numeric(0, 41)
    }

    /// Aggregates (abstract) - i=44.
    pub const fn aggregates() -> NodeId {
        NodeId::numeric(0, 44)
    }

    /// HasSubtype - i=45.
    pub const fn has_subtype() -> NodeId {
        NodeId::numeric(0, 45)
    }

    /// HasProperty - i=46.
    pub const fn has_property() -> NodeId {
        NodeId::numeric(0, 46)
    }

    /// HasComponent - i=47.
    pub const fn has_component() -> NodeId {
        NodeId::numeric(0, 47)
    }

    /// HasNotifier - i=48.
    pub const fn has_notifier() -> NodeId {
        NodeId::numeric(0, 48)
    }

    /// Resolves a reference type by its browse name.
    pub fn from_name(name: &str) -> Option<NodeId> {
        let id = match name {
            "HierarchicalReferences" => hierarchical_references(),
            "HasChild" => has_child(),
            "Organizes" => organizes(),
            "HasEventSource" => has_event_source(),
            "HasTypeDefinition" => has_type_definition(),
            "GeneratesEvent" => generates_event(),
            "Aggregates" => aggregates(),
            "HasSubtype" => has_subtype(),
            "HasProperty" => has_property(),
            "HasComponent" => has_component(),
            "HasNotifier" => has_notifier(),
            _ => return None,
        };
        Some(id)
    }

    /// Returns the browse name of a standard reference type.
    pub fn name_of(id: &NodeId) -> Option<&'static str> {
        if id.namespace_index != 0 {
            return None;
        }
        let name = match id.as_numeric()? {
            33 => "HierarchicalReferences",
            34 => "HasChild",
            35 => "Organizes",
            36 => "HasEventSource",
            40 => "HasTypeDefinition",
            41 => "GeneratesEvent",
            44 => "Aggregates",
            45 => "HasSubtype",
            46 => "HasProperty",
            47 => "HasComponent",
            48 => "HasNotifier",
            _ => return None,
        };
        Some(name)
    }
}
