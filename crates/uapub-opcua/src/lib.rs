// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA publisher configuration engine.
//!
//! This crate turns publisher configuration into fully resolved data set
//! writers against a live OPC UA address space. It never owns a connection:
//! all remote access goes through the [`Session`] trait supplied by the host.
//!
//! # Features
//!
//! - Work-stack driven async sequences that can branch and restart
//! - Resumable depth-first browsing with continuation point draining
//! - Expansion of object and type entries into concrete writer entries
//! - Batched field resolution: browse paths, object variables, names,
//!   queue names, event filters
//! - Structural metadata with cycle-safe type closure
//! - Splitting of writers into bounded copies
//!
//! # Error Handling
//!
//! ```text
//! OpcUaError
//! ├── Session       - Service call failures
//! ├── Browse        - Node browsing failures
//! ├── Operation     - Read failures and bad status codes
//! ├── Configuration - Invalid entries, node ids and browse paths
//! ├── Resolution    - Data type and metadata failures
//! └── Cancelled     - The cancellation token fired
//! ```
//!
//! Per-item protocol errors are not returned as `Err`; they are attached to
//! the affected field or entry as a [`ServiceResult`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use uapub_opcua::{DataSetWriterResolver, ResolverSettings};
//!
//! async fn publish(session: Arc<dyn uapub_opcua::Session>, writers: Vec<_>) -> uapub_opcua::OpcUaResult<()> {
//!     let ct = CancellationToken::new();
//!     let mut resolver = DataSetWriterResolver::new(writers, ResolverSettings::default());
//!     if resolver.needs_update() {
//!         resolver.resolve(session.as_ref(), &ct).await?;
//!     }
//!     for writer in resolver.split(1000) {
//!         println!("{}", writer.id);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod browse;
pub mod client;
pub mod error;
pub mod expansion;
pub mod models;
pub mod resolver;
pub mod types;

pub use error::{
    BrowseError, ConfigurationError, ErrorCode, ErrorSeverity, OpcUaError, OpcUaResult,
    OperationError, ResolutionError, ServiceResult, SessionError,
};

pub use types::{
    AttributeId, BrowseDirection, BuiltInType, NodeClass, NodeId, NodeIdentifier, QualifiedName,
    StatusCode, Variant,
};

pub use client::{
    BrowseDescription, BrowsePathResult, BrowseResult, ContinuationPoint, Node, NodeReference,
    OperationLimits, ReadResult, ReadValueId, ReferenceDescription, RootPathResult, Session,
    TypeSystem,
};

pub use browse::{
    AsyncSequence, BrowseFrame, BrowseOptions, BrowsePath, BrowsePathSegment, BrowseTraversal,
    SequenceProgram, WorkStack,
};

pub use expansion::{
    expand, ConfigurationExpansion, ExpansionResult, InMemoryEntryStore, WriterEntryStore,
};

pub use resolver::{DataSetWriterResolver, Field, FieldKind, MetadataResolver, ResolverSettings};
