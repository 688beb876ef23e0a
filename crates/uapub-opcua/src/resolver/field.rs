// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Fields of a data set writer.
//!
//! A [`Field`] wraps one configuration record of a writer and exposes the
//! attributes every resolution phase works on. The record is owned by the
//! field and written back when the writers are rebuilt.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::error::ServiceResult;
use crate::resolver::event;
use crate::models::{
    DataSetRoutingMode, DataSetWriterModel, ExtensionFieldModel, PublishedDataSetEventModel,
    PublishedDataSetVariableModel, PublishedObjectModel, PublishingQueueSettings,
};

// =============================================================================
// FieldKind
// =============================================================================

/// The configuration record behind a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// A published variable.
    Variable(PublishedDataSetVariableModel),
    /// A variable discovered under a published object. `object` is the
    /// index of the owning object field.
    ObjectVariable {
        object: usize,
        variable: PublishedDataSetVariableModel,
    },
    /// A published object whose variables are discovered on demand.
    Object {
        model: PublishedObjectModel,
        expand: bool,
    },
    /// A published event.
    Event(PublishedDataSetEventModel),
    /// A literal extension field.
    Extension(ExtensionFieldModel),
}

impl FieldKind {
    /// Short name for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Variable(_) => "variable",
            Self::ObjectVariable { .. } => "object variable",
            Self::Object { .. } => "object",
            Self::Event(_) => "event",
            Self::Extension(_) => "extension",
        }
    }
}

// =============================================================================
// Field
// =============================================================================

/// One field of a writer during resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Index of the owning writer.
    pub writer: usize,
    /// Stable identity over the defining attributes.
    pub identity: String,
    /// Metadata must be rebuilt even if present.
    pub metadata_refresh: bool,
    /// Backing record.
    pub kind: FieldKind,
}

impl Field {
    /// Creates a variable field.
    pub fn variable(writer: usize, mut model: PublishedDataSetVariableModel) -> Self {
        let identity = prepare_variable(&mut model);
        Self::new(writer, identity, FieldKind::Variable(model))
    }

    /// Creates a variable field owned by the object field at `object`.
    pub fn object_variable(
        writer: usize,
        object: usize,
        mut variable: PublishedDataSetVariableModel,
    ) -> Self {
        let identity = prepare_variable(&mut variable);
        Self::new(writer, identity, FieldKind::ObjectVariable { object, variable })
    }

    /// Creates an object field. Objects without resolved variables are
    /// flagged for expansion.
    pub fn object(writer: usize, mut model: PublishedObjectModel) -> Self {
        let has_variables = model
            .published_variables
            .as_ref()
            .is_some_and(|v| !v.is_empty());
        let expand = !(has_variables && model.state.is_none());
        let identity = model.id.clone().unwrap_or_else(|| {
            identity_hash(
                "ObjectItem",
                [
                    model.published_node_id.as_deref(),
                    queue_name(model.template.publishing.as_ref()),
                ],
                model.browse_path.as_deref(),
            )
        });
        model.id = Some(identity.clone());
        Self::new(writer, identity, FieldKind::Object { model, expand })
    }

    /// Creates an event field.
    pub fn event(writer: usize, mut model: PublishedDataSetEventModel) -> Self {
        let identity = model.id.clone().unwrap_or_else(|| {
            let read_name = (model.read_event_name_from_node == Some(true)).to_string();
            let model_change = model.model_change_handling.is_some().to_string();
            let condition = model.condition_handling.is_some().to_string();
            identity_hash(
                "EventItem",
                [
                    model.name.as_deref(),
                    model.event_notifier.as_deref(),
                    Some(read_name.as_str()),
                    model.type_definition_id.as_deref(),
                    Some(model_change.as_str()),
                    Some(condition.as_str()),
                    queue_name(model.publishing.as_ref()),
                ],
                model.browse_path.as_deref(),
            )
        });
        model.id = Some(identity.clone());
        Self::new(writer, identity, FieldKind::Event(model))
    }

    /// Creates an extension field.
    pub fn extension(writer: usize, mut model: ExtensionFieldModel) -> Self {
        let identity = model.id.clone().unwrap_or_else(|| {
            let class_id = model.data_set_class_field_id.to_string();
            identity_hash(
                "ExtensionField",
                [Some(model.data_set_field_name.as_str()), Some(class_id.as_str())],
                None,
            )
        });
        model.id = Some(identity.clone());
        Self::new(writer, identity, FieldKind::Extension(model))
    }

    fn new(writer: usize, identity: String, kind: FieldKind) -> Self {
        Self {
            writer,
            identity,
            metadata_refresh: false,
            kind,
        }
    }

    /// Creates the fields of a writer in writer order: variables, objects
    /// each followed by their variables, events, extension fields.
    ///
    /// `offset` is the index the first created field will have.
    pub fn create(writer_index: usize, writer: &DataSetWriterModel, offset: usize) -> Vec<Field> {
        let mut fields = Vec::new();
        if let Some(source) = writer.source() {
            for variable in &source.published_variables {
                fields.push(Field::variable(writer_index, variable.clone()));
            }
            for object in &source.published_objects {
                let mut field = Field::object(writer_index, object.clone());
                let variables = match &mut field.kind {
                    FieldKind::Object { model, .. } => model.published_variables.take(),
                    _ => None,
                };
                let object_index = offset + fields.len();
                fields.push(field);
                for variable in variables.into_iter().flatten() {
                    fields.push(Field::object_variable(writer_index, object_index, variable));
                }
            }
            for event in &source.published_events {
                fields.push(Field::event(writer_index, event.clone()));
            }
        }
        if let Some(data_set) = &writer.data_set {
            for extension in &data_set.extension_fields {
                fields.push(Field::extension(writer_index, extension.clone()));
            }
        }
        fields
    }

    // -------------------------------------------------------------------------
    // Attributes
    // -------------------------------------------------------------------------

    /// Node id string of the field's node.
    pub fn node_id(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Variable(v) | FieldKind::ObjectVariable { variable: v, .. } => {
                v.published_variable_node_id.as_deref()
            }
            FieldKind::Object { model, .. } => model.published_node_id.as_deref(),
            FieldKind::Event(e) => e.event_notifier.as_deref(),
            FieldKind::Extension(_) => None,
        }
    }

    /// Sets a newly resolved node id and marks metadata stale.
    pub fn set_node_id(&mut self, node_id: String) {
        self.assign_node_id(Some(node_id));
        self.metadata_refresh = true;
    }

    fn assign_node_id(&mut self, node_id: Option<String>) {
        match &mut self.kind {
            FieldKind::Variable(v) | FieldKind::ObjectVariable { variable: v, .. } => {
                v.published_variable_node_id = node_id;
            }
            FieldKind::Object { model, .. } => model.published_node_id = node_id,
            FieldKind::Event(e) => e.event_notifier = node_id,
            FieldKind::Extension(_) => {}
        }
    }

    /// Pending relative browse path. `None` when empty.
    pub fn browse_path(&self) -> Option<&[String]> {
        let path = match &self.kind {
            FieldKind::Variable(v) | FieldKind::ObjectVariable { variable: v, .. } => {
                v.browse_path.as_deref()
            }
            FieldKind::Object { model, .. } => model.browse_path.as_deref(),
            FieldKind::Event(e) => e.browse_path.as_deref(),
            FieldKind::Extension(_) => None,
        };
        path.filter(|p| !p.is_empty())
    }

    /// Replaces the browse path.
    pub fn set_browse_path(&mut self, path: Option<Vec<String>>) {
        match &mut self.kind {
            FieldKind::Variable(v) | FieldKind::ObjectVariable { variable: v, .. } => {
                v.browse_path = path;
            }
            FieldKind::Object { model, .. } => model.browse_path = path,
            FieldKind::Event(e) => e.browse_path = path,
            FieldKind::Extension(_) => {}
        }
    }

    /// Resolved field name.
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Variable(v) | FieldKind::ObjectVariable { variable: v, .. } => {
                v.data_set_field_name.as_deref()
            }
            FieldKind::Object { model, .. } => model.name.as_deref(),
            FieldKind::Event(e) => e.name.as_deref(),
            FieldKind::Extension(x) => Some(x.data_set_field_name.as_str()),
        }
    }

    /// Sets the resolved field name.
    pub fn set_name(&mut self, name: String) {
        match &mut self.kind {
            FieldKind::Variable(v) | FieldKind::ObjectVariable { variable: v, .. } => {
                v.data_set_field_name = Some(name);
            }
            FieldKind::Object { model, .. } => model.name = Some(name),
            FieldKind::Event(e) => e.name = Some(name),
            FieldKind::Extension(x) => x.data_set_field_name = name,
        }
    }

    /// Resolution error of the field.
    pub fn state(&self) -> Option<&ServiceResult> {
        match &self.kind {
            FieldKind::Variable(v) | FieldKind::ObjectVariable { variable: v, .. } => {
                v.state.as_ref()
            }
            FieldKind::Object { model, .. } => model.state.as_ref(),
            FieldKind::Event(e) => e.state.as_ref(),
            FieldKind::Extension(x) => x.state.as_ref(),
        }
    }

    /// Sets or clears the resolution error.
    pub fn set_state(&mut self, state: Option<ServiceResult>) {
        match &mut self.kind {
            FieldKind::Variable(v) | FieldKind::ObjectVariable { variable: v, .. } => {
                v.state = state;
            }
            FieldKind::Object { model, .. } => model.state = state,
            FieldKind::Event(e) => e.state = state,
            FieldKind::Extension(x) => x.state = state,
        }
    }

    /// Queue settings of the field.
    pub fn publishing(&self) -> Option<&PublishingQueueSettings> {
        match &self.kind {
            FieldKind::Variable(v) | FieldKind::ObjectVariable { variable: v, .. } => {
                v.publishing.as_ref()
            }
            FieldKind::Object { model, .. } => model.template.publishing.as_ref(),
            FieldKind::Event(e) => e.publishing.as_ref(),
            FieldKind::Extension(_) => None,
        }
    }

    /// Replaces the queue settings.
    pub fn set_publishing(&mut self, publishing: Option<PublishingQueueSettings>) {
        match &mut self.kind {
            FieldKind::Variable(v) | FieldKind::ObjectVariable { variable: v, .. } => {
                v.publishing = publishing;
            }
            FieldKind::Object { model, .. } => model.template.publishing = publishing,
            FieldKind::Event(e) => e.publishing = publishing,
            FieldKind::Extension(_) => {}
        }
    }

    /// Returns `true` for an object that still needs its variables.
    pub fn needs_expansion(&self) -> bool {
        matches!(self.kind, FieldKind::Object { expand: true, .. })
    }

    /// Returns `true` for an object variable, which cannot be expanded
    /// further but is published within its object's writer.
    pub fn is_object_variable(&self) -> bool {
        matches!(self.kind, FieldKind::ObjectVariable { .. })
    }

    // -------------------------------------------------------------------------
    // Predicates
    // -------------------------------------------------------------------------

    /// Returns `true` if the queue name must be derived from the address space.
    pub fn needs_queue_name(&self, routing: DataSetRoutingMode) -> bool {
        match self.kind {
            FieldKind::Object { .. } | FieldKind::Extension(_) => false,
            _ => {
                routing != DataSetRoutingMode::None
                    && self.publishing().and_then(|p| p.queue_name.as_ref()).is_none()
            }
        }
    }

    /// Returns `true` if the metadata must be (re)built.
    pub fn metadata_needs_refresh(&self, meta_data_enabled: bool) -> bool {
        if !meta_data_enabled {
            return false;
        }
        match &self.kind {
            FieldKind::Variable(v) | FieldKind::ObjectVariable { variable: v, .. } => {
                self.metadata_refresh || v.meta_data.is_none()
            }
            FieldKind::Object { .. } => false,
            FieldKind::Event(e) => {
                e.model_change_handling.is_none()
                    && (self.metadata_refresh
                        || e.selected_fields
                            .as_ref()
                            .is_some_and(|f| f.iter().any(|c| c.meta_data.is_none())))
            }
            FieldKind::Extension(x) => self.metadata_refresh || x.meta_data.is_none(),
        }
    }

    /// Returns `true` if the event's select clauses or filter are incomplete.
    pub fn needs_filter_update(&self) -> bool {
        match &self.kind {
            FieldKind::Event(e) => event::needs_filter_update(e),
            _ => false,
        }
    }

    /// Returns `true` while any resolution phase has work for this field.
    pub fn needs_update(&self, writer: &DataSetWriterModel) -> bool {
        let meta_data = self.metadata_needs_refresh(writer.meta_data_enabled());
        if matches!(self.kind, FieldKind::Extension(_)) {
            return meta_data;
        }
        self.state().is_some()
            || self.browse_path().is_some()
            || self.name().is_none()
            || self.needs_expansion()
            || self.needs_queue_name(writer.routing())
            || meta_data
            || self.needs_filter_update()
    }

    // -------------------------------------------------------------------------
    // Merge
    // -------------------------------------------------------------------------

    /// Copies resolved state from the field with the same identity in the
    /// previous configuration.
    pub fn merge(&mut self, existing: &Field) -> bool {
        if existing.identity != self.identity {
            return false;
        }
        self.set_state(existing.state().cloned());
        if self.node_id() != existing.node_id() {
            self.assign_node_id(existing.node_id().map(str::to_string));
        }
        let path = existing.browse_path().map(<[String]>::to_vec);
        if self.browse_path().map(<[String]>::to_vec) != path {
            self.set_browse_path(path);
        }
        if self.publishing().and_then(|p| p.queue_name.as_ref()).is_none() {
            self.set_publishing(existing.publishing().cloned());
        }
        if self.name().map_or(true, str::is_empty) {
            if let Some(name) = existing.name() {
                self.set_name(name.to_string());
            }
        }

        match (&mut self.kind, &existing.kind) {
            (
                FieldKind::Variable(v) | FieldKind::ObjectVariable { variable: v, .. },
                FieldKind::Variable(o) | FieldKind::ObjectVariable { variable: o, .. },
            ) => {
                v.meta_data = o.meta_data.clone();
            }
            (FieldKind::Event(e), FieldKind::Event(o)) => {
                e.selected_fields = o.selected_fields.clone();
                e.filter = o.filter.clone();
            }
            (FieldKind::Extension(x), FieldKind::Extension(o)) => {
                x.meta_data = o.meta_data.clone();
            }
            _ => {}
        }
        true
    }

    /// Merges the fields of `writer` with the fields of its previous
    /// configuration. Only the first of several old fields with the same
    /// identity is used.
    pub fn merge_all(
        writer_index: usize,
        writer: &DataSetWriterModel,
        previous: Option<&DataSetWriterModel>,
        offset: usize,
    ) -> Vec<Field> {
        let mut fields = Field::create(writer_index, writer, offset);
        let Some(previous) = previous else {
            return fields;
        };
        let old = Field::create(writer_index, previous, 0);
        let mut lookup: HashMap<&str, usize> = HashMap::new();
        for (index, field) in old.iter().enumerate() {
            lookup.entry(field.identity.as_str()).or_insert(index);
        }

        let mut carried = Vec::new();
        for (index, field) in fields.iter_mut().enumerate() {
            let Some(&old_index) = lookup.get(field.identity.as_str()) else {
                continue;
            };
            let existing = &old[old_index];
            field.merge(existing);
            // Expanded objects bring their discovered variables along
            if let (FieldKind::Object { expand, .. }, FieldKind::Object { expand: false, .. }) =
                (&mut field.kind, &existing.kind)
            {
                if *expand {
                    *expand = false;
                    carried.extend(old.iter().filter_map(|f| match &f.kind {
                        FieldKind::ObjectVariable { object, variable } if *object == old_index => {
                            Some((offset + index, variable.clone()))
                        }
                        _ => None,
                    }));
                }
            }
        }
        for (object, variable) in carried {
            fields.push(Field::object_variable(writer_index, object, variable));
        }
        fields
    }
}

/// Names an unnamed variable and stores its identity on the record.
///
/// Without a configured name and without a request to read the display
/// name, the node id names the field.
fn prepare_variable(model: &mut PublishedDataSetVariableModel) -> String {
    if model.read_display_name_from_node != Some(true) && model.data_set_field_name.is_none() {
        model.data_set_field_name = model.published_variable_node_id.clone();
    }
    let identity = model.id.clone().unwrap_or_else(|| {
        let read_name = (model.read_display_name_from_node == Some(true)).to_string();
        let class_id = model.data_set_class_field_id.to_string();
        identity_hash(
            "VariableItem",
            [
                model.data_set_field_name.as_deref(),
                model.published_variable_node_id.as_deref(),
                Some(read_name.as_str()),
                Some(class_id.as_str()),
                queue_name(model.publishing.as_ref()),
            ],
            model.browse_path.as_deref(),
        )
    });
    model.id = Some(identity.clone());
    identity
}

/// SHA-256 over a type tag and the defining attributes, as lowercase hex.
fn identity_hash<'a>(
    tag: &str,
    parts: impl IntoIterator<Item = Option<&'a str>>,
    browse_path: Option<&[String]>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tag.as_bytes());
    for part in parts {
        hasher.update(part.unwrap_or_default().as_bytes());
        hasher.update([0x1fu8]);
    }
    for element in browse_path.unwrap_or_default() {
        hasher.update(element.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

fn queue_name(publishing: Option<&PublishingQueueSettings>) -> Option<&str> {
    publishing.and_then(|p| p.queue_name.as_deref())
}
