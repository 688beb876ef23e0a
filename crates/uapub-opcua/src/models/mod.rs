// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration records exchanged with the outer host.
//!
//! - [`entry`]: published-nodes entries and the expansion request that
//!   turns one entry into concrete writer entries.
//! - [`writer`]: data set writers and the field records they carry.
//! - [`metadata`]: structural metadata attached to resolved fields.
//!
//! All records are plain serde structs. Engine state never lives here;
//! the expansion and resolver modules own their working copies.

pub mod entry;
pub mod metadata;
pub mod writer;

pub use entry::{
    MethodMetadataModel, OpcNodeModel, PublishedNodeExpansionModel, PublishedNodesEntryModel,
    ServiceResponse,
};
pub use metadata::{
    DataSetMetaDataModel, EnumDescriptionModel, EnumFieldModel, PublishedMetaDataModel,
    SimpleTypeDescriptionModel, StructureDescriptionModel, StructureFieldModel,
};
pub use writer::{
    ConditionHandlingModel, ContentFilterElementModel, ContentFilterModel, DataSetRoutingMode,
    DataSetWriterModel, ExtensionFieldModel, FilterOperandModel, FilterOperator,
    ModelChangeHandlingModel, PublishedDataSetEventModel, PublishedDataSetModel,
    PublishedDataSetSourceModel, PublishedDataSetVariableModel, PublishedObjectModel,
    PublishingQueueSettings, SimpleAttributeOperandModel,
};
