// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Field resolution for data set writers.
//!
//! [`DataSetWriterResolver`] turns configured writers into fully resolved
//! writers: browse paths become node ids, objects are expanded to their
//! variables, names and queue names are read from the address space, event
//! filters are built and structural metadata is attached.
//!
//! # Phases
//!
//! ```text
//! browse paths ─▶ expansion ─▶ names ─▶ queue names ─▶ variants ─▶ metadata
//! ```
//!
//! Each phase selects the fields it has work for and skips the session
//! entirely when there are none, so resolving an already resolved set
//! performs no calls. Batches follow the server's operation limits.
//! Errors are attached to the affected field and retried on the next pass.

mod event;
mod field;
mod metadata;
mod split;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::browse::{reference_types, BrowsePath};
use crate::client::{
    browse_tree, check_result_count, BrowseDescription, OperationLimits, ReadValueId, Session,
};
use crate::error::{OpcUaError, OpcUaResult, ServiceResult};
use crate::models::{
    DataSetRoutingMode, DataSetWriterModel, PublishedDataSetVariableModel,
    PublishingQueueSettings, SimpleAttributeOperandModel,
};
use crate::types::{AttributeId, BuiltInType, NodeClass, NodeId, StatusCode, Variant};

pub use event::{
    find_node_with_browse_path, model_change_fields, needs_filter_update, resolve_event,
    select_clauses_for_type, update_field_names,
};
pub use field::{Field, FieldKind};
pub use metadata::MetadataResolver;
pub use split::split;

// =============================================================================
// ResolverSettings
// =============================================================================

/// Tuning of the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    /// Maximum variables per writer after splitting.
    pub max_items_per_writer: usize,
    /// Nodes per root path request during queue name resolution.
    pub queue_name_batch_size: usize,
    /// Depth browsed below objects that request recursive expansion.
    pub recursive_expansion_depth: usize,
    /// Local ceiling applied to the server's operation limits.
    pub operation_limit_ceiling: Option<u32>,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            max_items_per_writer: 1000,
            queue_name_batch_size: 1000,
            recursive_expansion_depth: 128,
            operation_limit_ceiling: None,
        }
    }
}

// =============================================================================
// ResolveContext
// =============================================================================

/// Per-pass state shared by the phases.
struct ResolveContext<'a> {
    session: &'a dyn Session,
    ct: &'a CancellationToken,
    ceiling: Option<u32>,
    limits: Option<OperationLimits>,
}

impl<'a> ResolveContext<'a> {
    /// Operation limits, fetched on first use.
    async fn limits(&mut self) -> OpcUaResult<OperationLimits> {
        if let Some(limits) = self.limits {
            return Ok(limits);
        }
        let mut limits = self.session.operation_limits(self.ct).await?;
        if let Some(ceiling) = self.ceiling {
            limits = limits.clamp(ceiling);
        }
        self.limits = Some(limits);
        Ok(limits)
    }

    fn check_cancelled(&self) -> OpcUaResult<()> {
        if self.ct.is_cancelled() {
            return Err(OpcUaError::Cancelled);
        }
        Ok(())
    }
}

// =============================================================================
// DataSetWriterResolver
// =============================================================================

/// Resolves the fields of a set of writers sharing one session.
#[derive(Debug, Clone)]
pub struct DataSetWriterResolver {
    writers: Vec<DataSetWriterModel>,
    fields: Vec<Field>,
    settings: ResolverSettings,
}

impl DataSetWriterResolver {
    /// Creates a resolver over freshly configured writers.
    pub fn new(writers: Vec<DataSetWriterModel>, settings: ResolverSettings) -> Self {
        Self::merge(writers, &HashMap::new(), settings)
    }

    /// Creates a resolver and carries resolved state over from the previous
    /// configuration of each writer, keyed by writer id.
    pub fn merge(
        writers: Vec<DataSetWriterModel>,
        previous: &HashMap<String, DataSetWriterModel>,
        settings: ResolverSettings,
    ) -> Self {
        let mut fields = Vec::new();
        for (index, writer) in writers.iter().enumerate() {
            let offset = fields.len();
            fields.extend(Field::merge_all(
                index,
                writer,
                previous.get(&writer.id),
                offset,
            ));
        }
        Self {
            writers,
            fields,
            settings,
        }
    }

    /// The fields under resolution.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Returns `true` while any field has unresolved work.
    pub fn needs_update(&self) -> bool {
        self.fields
            .iter()
            .any(|f| f.needs_update(&self.writers[f.writer]))
    }

    /// Runs all resolution phases in order.
    pub async fn resolve(
        &mut self,
        session: &dyn Session,
        ct: &CancellationToken,
    ) -> OpcUaResult<()> {
        let mut cx = ResolveContext {
            session,
            ct,
            ceiling: self.settings.operation_limit_ceiling,
            limits: None,
        };
        self.resolve_browse_paths(&mut cx).await?;
        self.expand_objects(&mut cx).await?;
        self.resolve_names(&mut cx).await?;
        self.resolve_queue_names(&mut cx).await?;
        self.resolve_variants(&mut cx).await?;
        self.resolve_metadata(&mut cx).await?;
        Ok(())
    }

    /// Splits the resolved writers into copies of at most `max_items`
    /// variables each.
    pub fn split(&self, max_items: usize) -> Vec<DataSetWriterModel> {
        split::split(&self.writers, &self.fields, max_items)
    }

    /// Splits using the configured maximum.
    pub fn split_default(&self) -> Vec<DataSetWriterModel> {
        self.split(self.settings.max_items_per_writer)
    }

    /// The writers with their resolved fields written back.
    pub fn data_set_writers(&self) -> Vec<DataSetWriterModel> {
        self.writers
            .iter()
            .enumerate()
            .map(|(index, writer)| self.rebuild(index, writer))
            .collect()
    }

    fn rebuild(&self, writer_index: usize, writer: &DataSetWriterModel) -> DataSetWriterModel {
        let mut copy = writer.clone();
        let data_set = copy.data_set.get_or_insert_with(Default::default);
        data_set.extension_fields.clear();
        let source = data_set.data_set_source.get_or_insert_with(Default::default);
        source.published_variables.clear();
        source.published_objects.clear();
        source.published_events.clear();

        let mut object_slots: HashMap<usize, usize> = HashMap::new();
        for (index, field) in self.fields.iter().enumerate() {
            if field.writer != writer_index {
                continue;
            }
            match &field.kind {
                FieldKind::Variable(v) => source.published_variables.push(v.clone()),
                FieldKind::Object { model, .. } => {
                    object_slots.insert(index, source.published_objects.len());
                    source.published_objects.push(model.clone());
                }
                FieldKind::ObjectVariable { object, variable } => {
                    if let Some(&slot) = object_slots.get(object) {
                        source.published_objects[slot]
                            .published_variables
                            .get_or_insert_with(Vec::new)
                            .push(variable.clone());
                    }
                }
                FieldKind::Event(e) => source.published_events.push(e.clone()),
                FieldKind::Extension(x) => data_set.extension_fields.push(x.clone()),
            }
        }
        copy
    }

    // -------------------------------------------------------------------------
    // Phase 1: browse paths
    // -------------------------------------------------------------------------

    async fn resolve_browse_paths(&mut self, cx: &mut ResolveContext<'_>) -> OpcUaResult<()> {
        let mut indices = Vec::new();
        let mut paths = Vec::new();
        for (index, field) in self.fields.iter_mut().enumerate() {
            let Some(elements) = field.browse_path() else {
                continue;
            };
            let parsed = parse_node_id(field.node_id())
                .map(|start| start.unwrap_or(NodeId::OBJECTS_FOLDER))
                .and_then(|start| BrowsePath::parse(start, elements));
            match parsed {
                Ok(path) => {
                    indices.push(index);
                    paths.push(path);
                }
                Err(e) => field.set_state(Some(ServiceResult::from(&e))),
            }
        }
        if paths.is_empty() {
            return Ok(());
        }

        let batch_size = cx.limits().await?.translate_batch_size();
        for (batch, chunk) in indices.chunks(batch_size).zip(paths.chunks(batch_size)) {
            cx.check_cancelled()?;
            let results = match cx
                .session
                .translate_browse_paths(chunk, cx.ct)
                .await
                .and_then(|r| {
                    check_result_count("TranslateBrowsePathsToNodeIds", chunk.len(), &r)?;
                    Ok(r)
                }) {
                Ok(results) => results,
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    debug!(error = %e, count = chunk.len(), "Failed to translate browse paths");
                    self.fail_all(batch, &e);
                    continue;
                }
            };
            for ((&index, path), result) in batch.iter().zip(chunk).zip(results) {
                let field = &mut self.fields[index];
                if result.targets.len() > 1 {
                    info!(
                        browse_path = %path,
                        targets = result.targets.len(),
                        "Ambiguous browse path, using first target"
                    );
                }
                match result.targets.first() {
                    Some(target) => {
                        field.set_node_id(target.to_opc_string());
                        field.set_browse_path(None);
                        field.set_state(None);
                    }
                    None => {
                        let error = result.error.unwrap_or_else(|| {
                            ServiceResult::new(
                                StatusCode::BAD_NO_MATCH,
                                format!("Browse path {} not found", path),
                            )
                        });
                        field.set_state(Some(error));
                    }
                }
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Phase 2: object expansion
    // -------------------------------------------------------------------------

    async fn expand_objects(&mut self, cx: &mut ResolveContext<'_>) -> OpcUaResult<()> {
        let mut recursive = Vec::new();
        let mut single = Vec::new();
        for (index, field) in self.fields.iter_mut().enumerate() {
            if !field.needs_expansion() || field.browse_path().is_some() {
                continue;
            }
            let FieldKind::Object { model, .. } = &field.kind else {
                continue;
            };
            let is_recursive = model.recursive;
            match parse_node_id(field.node_id()) {
                Ok(Some(node_id)) if is_recursive => recursive.push((index, node_id)),
                Ok(Some(node_id)) => single.push((index, node_id)),
                Ok(None) => field.set_state(Some(ServiceResult::new(
                    StatusCode::BAD_CONFIGURATION_ERROR,
                    "Object has no node id",
                ))),
                Err(e) => field.set_state(Some(ServiceResult::from(&e))),
            }
        }
        if recursive.is_empty() && single.is_empty() {
            return Ok(());
        }

        let batch_size = cx.limits().await?.browse_batch_size();
        let depth = self.settings.recursive_expansion_depth.max(1);
        for (group, max_depth) in [(recursive, depth), (single, 1)] {
            for chunk in group.chunks(batch_size) {
                cx.check_cancelled()?;
                self.expand_batch(cx, chunk, max_depth, batch_size).await?;
            }
        }
        Ok(())
    }

    async fn expand_batch(
        &mut self,
        cx: &mut ResolveContext<'_>,
        chunk: &[(usize, NodeId)],
        max_depth: usize,
        batch_size: usize,
    ) -> OpcUaResult<()> {
        let mask = NodeClass::Object.value() | NodeClass::Variable.value();
        let requests: Vec<BrowseDescription> = chunk
            .iter()
            .map(|(_, node_id)| {
                BrowseDescription::forward(node_id.clone(), reference_types::hierarchical_references())
                    .with_subtypes(true)
                    .with_node_class_mask(mask)
            })
            .collect();
        let items = browse_tree(cx.session, &requests, max_depth, batch_size, cx.ct).await?;

        if let Some(systemic) = items.iter().find(|i| i.origin.is_none()) {
            let error = systemic.error.clone().unwrap_or_else(|| {
                ServiceResult::from_status(StatusCode::BAD_UNEXPECTED_ERROR)
            });
            debug!(error = %error, count = chunk.len(), "Failed to expand objects");
            for (index, _) in chunk {
                self.fields[*index].set_state(Some(error.clone()));
            }
            return Ok(());
        }

        for item in items {
            let Some((object_index, object_id)) = item.origin.and_then(|o| chunk.get(o)) else {
                continue;
            };
            let object_index = *object_index;
            if let Some(error) = item.error {
                debug!(node_id = %object_id, error = %error, "Failed to browse object");
                self.fields[object_index].set_state(Some(error));
                continue;
            }

            let writer = self.fields[object_index].writer;
            let FieldKind::Object { model, expand } = &mut self.fields[object_index].kind else {
                continue;
            };
            let mut seen = HashSet::new();
            let mut variables: BTreeMap<String, PublishedDataSetVariableModel> = BTreeMap::new();
            for reference in &item.references {
                if reference.node_class != NodeClass::Variable
                    || reference.reference_type_id == reference_types::has_property()
                    || !reference.is_local()
                    || !seen.insert(reference.node_id.clone())
                {
                    continue;
                }
                let name = if reference.display_name.is_empty() {
                    reference.browse_name.name.clone()
                } else {
                    reference.display_name.clone()
                };
                variables
                    .entry(name.clone())
                    .or_insert_with(|| PublishedDataSetVariableModel {
                        id: None,
                        published_variable_node_id: Some(reference.node_id.to_opc_string()),
                        browse_path: None,
                        data_set_field_name: Some(name),
                        data_set_class_field_id: Uuid::new_v4(),
                        meta_data: None,
                        state: None,
                        ..model.template.clone()
                    });
            }
            *expand = false;
            model.state = None;
            info!(
                node_id = %object_id,
                variables = variables.len(),
                "Expanded object to variables"
            );
            for variable in variables.into_values() {
                self.fields
                    .push(Field::object_variable(writer, object_index, variable));
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Phase 3: names
    // -------------------------------------------------------------------------

    async fn resolve_names(&mut self, cx: &mut ResolveContext<'_>) -> OpcUaResult<()> {
        let mut pending = Vec::new();
        for (index, field) in self.fields.iter().enumerate() {
            if field.name().is_some() || field.browse_path().is_some() {
                continue;
            }
            if let Ok(Some(node_id)) = parse_node_id(field.node_id()) {
                pending.push((index, ReadValueId::new(node_id, AttributeId::DisplayName)));
            }
        }
        if pending.is_empty() {
            return Ok(());
        }

        let batch_size = cx.limits().await?.read_batch_size();
        for chunk in pending.chunks(batch_size) {
            cx.check_cancelled()?;
            let requests: Vec<ReadValueId> = chunk.iter().map(|(_, r)| r.clone()).collect();
            let results = match cx.session.read(&requests, cx.ct).await.and_then(|r| {
                check_result_count("Read", requests.len(), &r)?;
                Ok(r)
            }) {
                Ok(results) => results,
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    debug!(error = %e, count = chunk.len(), "Failed to read display names");
                    let indices: Vec<usize> = chunk.iter().map(|(i, _)| *i).collect();
                    self.fail_all(&indices, &e);
                    continue;
                }
            };
            for ((index, request), result) in chunk.iter().zip(results) {
                let field = &mut self.fields[*index];
                if let Some(error) = result.error() {
                    debug!(node_id = %request.node_id, error = %error, "Failed to read display name");
                    field.set_state(Some(error));
                    continue;
                }
                match result.value.as_ref().and_then(Variant::as_str) {
                    Some(name) => {
                        field.set_name(name.to_string());
                        field.set_state(None);
                    }
                    None => {
                        debug!(node_id = %request.node_id, "Display name has no value");
                        field.set_state(Some(ServiceResult::new(
                            StatusCode::BAD_NOT_FOUND,
                            "Display name not available",
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Phase 4: queue names
    // -------------------------------------------------------------------------

    async fn resolve_queue_names(&mut self, cx: &mut ResolveContext<'_>) -> OpcUaResult<()> {
        let mut bases: HashMap<usize, Option<String>> = HashMap::new();
        let mut pending = Vec::new();
        for (index, field) in self.fields.iter_mut().enumerate() {
            let writer = &self.writers[field.writer];
            if !field.needs_queue_name(writer.routing()) || field.browse_path().is_some() {
                continue;
            }
            let base = bases
                .entry(field.writer)
                .or_insert_with(|| base_queue_name(writer))
                .clone();
            let Some(base) = base else {
                field.set_state(Some(ServiceResult::new(
                    StatusCode::BAD_CONFIGURATION_ERROR,
                    format!("Writer {} has no queue name to route under", writer.id),
                )));
                continue;
            };
            match parse_node_id(field.node_id()) {
                Ok(Some(node_id)) => pending.push((index, node_id, base, writer.routing())),
                Ok(None) => {}
                Err(e) => field.set_state(Some(ServiceResult::from(&e))),
            }
        }
        if pending.is_empty() {
            return Ok(());
        }

        for chunk in pending.chunks(self.settings.queue_name_batch_size.max(1)) {
            cx.check_cancelled()?;
            let node_ids: Vec<NodeId> = chunk.iter().map(|(_, n, _, _)| n.clone()).collect();
            let results = match cx
                .session
                .browse_paths_from_root(&node_ids, cx.ct)
                .await
                .and_then(|r| {
                    check_result_count("BrowsePathsFromRoot", node_ids.len(), &r)?;
                    Ok(r)
                }) {
                Ok(results) => results,
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    debug!(error = %e, count = chunk.len(), "Failed to get root paths");
                    let indices: Vec<usize> = chunk.iter().map(|(i, ..)| *i).collect();
                    self.fail_all(&indices, &e);
                    continue;
                }
            };
            for ((index, node_id, base, routing), result) in chunk.iter().zip(results) {
                let field = &mut self.fields[*index];
                if let Some(error) = result.error {
                    debug!(node_id = %node_id, error = %error, "Failed to get root path");
                    field.set_state(Some(error));
                    continue;
                }
                let mut queue_name = base.clone();
                for element in &result.path {
                    queue_name.push('/');
                    if element.namespace_index != 0
                        && *routing == DataSetRoutingMode::UseBrowseNamesWithNamespaceIndex
                    {
                        queue_name.push_str(&format!("{}:", element.namespace_index));
                    }
                    queue_name.push_str(&escape_topic(&element.name));
                }
                let publishing = PublishingQueueSettings {
                    queue_name: Some(queue_name),
                    ..field.publishing().cloned().unwrap_or_default()
                };
                field.set_publishing(Some(publishing));
                field.set_state(None);
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Phase 5: variant specific
    // -------------------------------------------------------------------------

    async fn resolve_variants(&mut self, cx: &mut ResolveContext<'_>) -> OpcUaResult<()> {
        for field in &mut self.fields {
            if field.state().is_some() || !field.needs_filter_update() {
                continue;
            }
            cx.check_cancelled()?;
            let FieldKind::Event(model) = &mut field.kind else {
                continue;
            };
            match resolve_event(cx.session, model, cx.ct).await {
                Ok(changed) => {
                    if changed {
                        field.metadata_refresh = true;
                    }
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    debug!(error = %e, "Failed to resolve event filter");
                    field.set_state(Some(ServiceResult::from(&e)));
                }
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Phase 6: metadata
    // -------------------------------------------------------------------------

    async fn resolve_metadata(&mut self, cx: &mut ResolveContext<'_>) -> OpcUaResult<()> {
        let pending: Vec<usize> = self
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| {
                f.state().is_none()
                    && f.metadata_needs_refresh(self.writers[f.writer].meta_data_enabled())
            })
            .map(|(index, _)| index)
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        let started = Instant::now();
        let type_system = match cx.session.type_system(cx.ct).await {
            Ok(type_system) => type_system,
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                info!(error = %e, "Type system unavailable, resolving metadata from nodes");
                None
            }
        };
        let resolver = MetadataResolver::new(cx.session, type_system);

        for index in pending {
            cx.check_cancelled()?;
            let field = &mut self.fields[index];
            let result = match &mut field.kind {
                FieldKind::Variable(v) | FieldKind::ObjectVariable { variable: v, .. } => {
                    variable_metadata(&resolver, v, cx.session, cx.ct).await
                }
                FieldKind::Event(e) => {
                    let type_id = e.type_definition_id.clone();
                    event_metadata(
                        &resolver,
                        e.selected_fields.iter_mut().flatten(),
                        type_id.as_deref(),
                        cx.session,
                        cx.ct,
                    )
                    .await
                }
                FieldKind::Extension(x) => {
                    let data_type = extension_data_type(&x.value);
                    resolver
                        .metadata_for_type(&data_type, 0, cx.ct)
                        .await
                        .map(|meta_data| {
                            x.meta_data = Some(meta_data);
                            None
                        })
                }
                FieldKind::Object { .. } => Ok(None),
            };
            match result {
                Ok(None) => field.metadata_refresh = false,
                Ok(Some(error)) => field.set_state(Some(error)),
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    debug!(error = %e, field = field.kind.label(), "Failed to resolve metadata");
                    field.set_state(Some(ServiceResult::from(&e)));
                }
            }
        }
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Loaded metadata for fields"
        );
        Ok(())
    }

    fn fail_all(&mut self, indices: &[usize], error: &OpcUaError) {
        let state = ServiceResult::from(error);
        for &index in indices {
            self.fields[index].set_state(Some(state.clone()));
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Parses an optional node id string. Empty strings count as absent.
fn parse_node_id(node_id: Option<&str>) -> OpcUaResult<Option<NodeId>> {
    match node_id.filter(|s| !s.is_empty()) {
        Some(s) => s.parse::<NodeId>().map(Some),
        None => Ok(None),
    }
}

/// Queue name of the first destination of a writer. Several destinations
/// are logged and all but the first ignored.
fn base_queue_name(writer: &DataSetWriterModel) -> Option<String> {
    let mut names = writer
        .publishing
        .iter()
        .filter_map(|p| p.queue_name.clone());
    let first = names.next();
    if names.next().is_some() {
        warn!(
            writer = %writer.id,
            destinations = writer.publishing.len(),
            "Writer has multiple destinations, routing under the first"
        );
    }
    first
}

/// Replaces topic wildcards, separators and non-printable characters.
pub fn escape_topic(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '+' | '#' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Data type of a literal value.
fn extension_data_type(value: &Variant) -> NodeId {
    let built_in = match value.built_in_type() {
        t @ (BuiltInType::Boolean
        | BuiltInType::SByte
        | BuiltInType::Byte
        | BuiltInType::Int16
        | BuiltInType::UInt16
        | BuiltInType::Int32
        | BuiltInType::UInt32
        | BuiltInType::Int64
        | BuiltInType::UInt64
        | BuiltInType::Float
        | BuiltInType::Double
        | BuiltInType::String
        | BuiltInType::DateTime
        | BuiltInType::Guid
        | BuiltInType::ByteString
        | BuiltInType::NodeId) => t,
        _ => BuiltInType::Variant,
    };
    built_in.node_id()
}

/// Rebuilds the metadata of a variable. Returns a field error when the
/// configuration cannot be resolved.
async fn variable_metadata(
    resolver: &MetadataResolver<'_>,
    variable: &mut PublishedDataSetVariableModel,
    session: &dyn Session,
    ct: &CancellationToken,
) -> OpcUaResult<Option<ServiceResult>> {
    let configuration_invalid =
        || ServiceResult::new(StatusCode::BAD_CONFIGURATION_ERROR, "Configuration Invalid");
    let node_id = match parse_node_id(variable.published_variable_node_id.as_deref()) {
        Ok(Some(node_id)) if !node_id.is_null() => node_id,
        _ => return Ok(Some(configuration_invalid())),
    };
    let Some(node) = session.fetch_node(&node_id, ct).await? else {
        return Ok(Some(ServiceResult::new(
            StatusCode::BAD_NODE_ID_UNKNOWN,
            format!("Node {} not found", node_id),
        )));
    };
    if node.node_class != NodeClass::Variable {
        return Ok(Some(configuration_invalid()));
    }
    let version = variable
        .meta_data
        .as_ref()
        .map_or(0, |m| m.minor_version.wrapping_add(1));
    variable.meta_data = Some(resolver.variable_metadata(&node, version, ct).await?);
    Ok(None)
}

/// Rebuilds the metadata of every named select clause of an event.
async fn event_metadata<'c>(
    resolver: &MetadataResolver<'_>,
    clauses: impl Iterator<Item = &'c mut SimpleAttributeOperandModel>,
    event_type: Option<&str>,
    session: &dyn Session,
    ct: &CancellationToken,
) -> OpcUaResult<Option<ServiceResult>> {
    let default_type = parse_node_id(event_type)
        .ok()
        .flatten()
        .unwrap_or(NodeId::BASE_EVENT_TYPE);
    for clause in clauses {
        if clause.data_set_field_name.as_deref().map_or(true, str::is_empty) {
            continue;
        }
        let type_id = parse_node_id(clause.type_definition_id.as_deref())
            .ok()
            .flatten()
            .unwrap_or_else(|| default_type.clone());
        let path = clause.browse_path.clone().unwrap_or_default();
        let meta_data = if path.is_empty() && clause.attribute_id == Some(AttributeId::NodeId) {
            resolver
                .metadata_for_type(&BuiltInType::NodeId.node_id(), 0, ct)
                .await?
        } else {
            let node = match find_node_with_browse_path(session, &path, &type_id, ct).await {
                Ok(node) => node,
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    debug!(error = %e, "Failed to find select clause node");
                    None
                }
            };
            match node.filter(|n| n.node_class == NodeClass::Variable) {
                Some(node) => resolver.variable_metadata(&node, 0, ct).await?,
                None => {
                    resolver
                        .metadata_for_type(&BuiltInType::Variant.node_id(), 0, ct)
                        .await?
                }
            }
        };
        clause.meta_data = Some(meta_data);
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataSetMetaDataModel, ExtensionFieldModel, PublishedObjectModel};

    fn resolved_writer() -> DataSetWriterModel {
        let mut writer = DataSetWriterModel::new("w1");
        writer.source_mut().published_variables = vec![
            PublishedDataSetVariableModel::new("ns=2;s=A"),
            PublishedDataSetVariableModel::new("ns=2;s=B"),
        ];
        writer
    }

    #[test]
    fn test_escape_topic() {
        assert_eq!(escape_topic("a/b+c#d"), "a_b_c_d");
        assert_eq!(escape_topic("Line\n1"), "Line_1");
        assert_eq!(escape_topic("Pump 1"), "Pump 1");
    }

    #[test]
    fn test_extension_data_type() {
        assert_eq!(extension_data_type(&Variant::Int32(5)), BuiltInType::Int32.node_id());
        assert_eq!(extension_data_type(&Variant::Null), BuiltInType::Variant.node_id());
        assert_eq!(
            extension_data_type(&Variant::LocalizedText("x".into())),
            BuiltInType::Variant.node_id()
        );
    }

    #[test]
    fn test_settings_defaults() {
        let settings: ResolverSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, ResolverSettings::default());
        assert_eq!(settings.max_items_per_writer, 1000);
        assert_eq!(settings.recursive_expansion_depth, 128);
    }

    #[test]
    fn test_resolved_writer_needs_no_update() {
        let resolver = DataSetWriterResolver::new(vec![resolved_writer()], Default::default());
        assert_eq!(resolver.fields().len(), 2);
        assert!(!resolver.needs_update());
    }

    #[test]
    fn test_metadata_enabled_needs_update() {
        let mut writer = resolved_writer();
        if let Some(data_set) = writer.data_set.as_mut() {
            data_set.data_set_meta_data = Some(DataSetMetaDataModel::default());
        }
        let resolver = DataSetWriterResolver::new(vec![writer], Default::default());
        assert!(resolver.needs_update());
    }

    #[test]
    fn test_data_set_writers_round_trip() {
        let mut writer = resolved_writer();
        writer.source_mut().published_objects.push(PublishedObjectModel {
            published_variables: Some(vec![PublishedDataSetVariableModel::new("ns=2;s=C")]),
            ..PublishedObjectModel::new("ns=2;s=Obj")
        });
        if let Some(data_set) = writer.data_set.as_mut() {
            data_set
                .extension_fields
                .push(ExtensionFieldModel::new("Site", Variant::String("A".into())));
        }
        let resolver = DataSetWriterResolver::new(vec![writer], Default::default());
        let writers = resolver.data_set_writers();
        assert_eq!(writers.len(), 1);

        let source = writers[0].source().unwrap();
        assert_eq!(source.published_variables.len(), 2);
        assert_eq!(source.published_objects.len(), 1);
        assert_eq!(
            source.published_objects[0]
                .published_variables
                .as_ref()
                .map(Vec::len),
            Some(1)
        );
        assert_eq!(writers[0].data_set.as_ref().unwrap().extension_fields.len(), 1);
    }

    #[test]
    fn test_merge_by_writer_id() {
        let mut previous = resolved_writer();
        previous.source_mut().published_variables[0].state =
            Some(ServiceResult::from_status(StatusCode::BAD_NODE_ID_UNKNOWN));
        let previous = HashMap::from([(previous.id.clone(), previous)]);

        let resolver =
            DataSetWriterResolver::merge(vec![resolved_writer()], &previous, Default::default());
        assert_eq!(
            resolver.fields()[0].state().map(|s| s.status_code),
            Some(StatusCode::BAD_NODE_ID_UNKNOWN)
        );
        assert!(resolver.fields()[1].state().is_none());
        assert!(resolver.needs_update());
    }
}
