// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session contract consumed by the engine.
//!
//! The engine never owns a connection. It talks to the remote address space
//! through the [`Session`] trait, which exposes batched protocol services,
//! a type hierarchy oracle, operation limits and a structural type system
//! snapshot.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │          ConfigurationExpansion / DataSetWriterResolver          │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    BrowseTraversal                               │
//! │        (resumable depth-first browse over Session)               │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Session                                   │
//! │     (browse, browse next, translate, read, type hierarchy)       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod browser;
mod session;
mod type_system;

pub use browser::{browse_all, browse_tree, BrowseItem};
pub use session::{
    check_result_count, BrowseDescription, BrowsePathResult, BrowseResult, ContinuationPoint,
    Node, NodeReference, OperationLimits, ReadResult, ReadValueId, ReferenceDescription,
    RootPathResult, Session,
};
pub use type_system::{
    DataTypeDefinition, EnumDefinition, EnumField, StructureDefinition, StructureField,
    StructureType, TypeSystem,
};
