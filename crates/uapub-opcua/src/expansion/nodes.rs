// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Working state of one expansion run.

use std::collections::HashSet;
use std::sync::Arc;

use crate::browse::BrowseFrame;
use crate::client::ReferenceDescription;
use crate::error::ServiceResult;
use crate::models::{MethodMetadataModel, OpcNodeModel};
use crate::types::{AttributeId, NodeClass, NodeId, QualifiedName};

// =============================================================================
// ObjectToExpand
// =============================================================================

/// One object whose variables, methods and events are collected.
#[derive(Debug)]
pub(crate) struct ObjectToExpand {
    pub frame: Arc<BrowseFrame>,
    pub variables: Vec<Arc<BrowseFrame>>,
    pub methods: Vec<Arc<BrowseFrame>>,
    /// Event types generated per source frame.
    pub events: Vec<(Arc<BrowseFrame>, Vec<ReferenceDescription>)>,
    pub event_notifier: NodeId,
    pub entries_already_returned: bool,
    known: HashSet<NodeId>,
}

impl ObjectToExpand {
    pub fn new(frame: Arc<BrowseFrame>) -> Self {
        Self {
            frame,
            variables: Vec::new(),
            methods: Vec::new(),
            events: Vec::new(),
            event_notifier: NodeId::SERVER,
            entries_already_returned: false,
            known: HashSet::new(),
        }
    }

    /// Adds variables and methods. Returns `true` if duplicates were dropped.
    ///
    /// Argument properties of methods are not fields and are skipped.
    pub fn add_nodes<'a>(&mut self, frames: impl IntoIterator<Item = &'a Arc<BrowseFrame>>) -> bool {
        let mut dropped = false;
        for frame in frames {
            if frame
                .parent
                .as_ref()
                .is_some_and(|p| p.node_class == NodeClass::Method)
            {
                continue;
            }
            if !self.known.insert(frame.node_id.clone()) {
                dropped = true;
                continue;
            }
            if frame.node_class == NodeClass::Method {
                self.methods.push(Arc::clone(frame));
            } else {
                self.variables.push(Arc::clone(frame));
            }
        }
        dropped
    }

    pub fn contains_variables(&self) -> bool {
        !self.variables.is_empty()
    }

    /// Returns `true` if anything would be published for the object.
    pub fn has_fields(&self) -> bool {
        !self.variables.is_empty() || !self.methods.is_empty() || !self.events.is_empty()
    }

    /// Frames whose type definitions may generate events.
    pub fn event_sources(&self) -> Vec<Arc<BrowseFrame>> {
        self.variables
            .iter()
            .chain(self.methods.iter())
            .chain(std::iter::once(&self.frame))
            .filter(|f| f.type_definition_id.is_some())
            .cloned()
            .collect()
    }

    /// The object itself and its object ancestors, nearest first.
    pub fn frames_to_root(&self) -> Vec<Arc<BrowseFrame>> {
        std::iter::once(&self.frame)
            .chain(self.frame.ancestors())
            .filter(|f| f.node_class == NodeClass::Object && !f.node_id.is_null())
            .cloned()
            .collect()
    }

    /// Writer id: the configured field id followed by the object's path.
    pub fn writer_id(&self, base: Option<&str>) -> String {
        let id = format!("{}{}", base.unwrap_or_default(), self.frame.browse_path());
        if id.is_empty() {
            self.frame.name()
        } else {
            id
        }
    }

    /// Data set name: browse names from below the traversal root to the
    /// object, dot separated.
    pub fn data_set_name(&self) -> String {
        let root = self.frame.top();
        if Arc::ptr_eq(&root, &self.frame) || self.frame.browse_name.is_none() {
            return "Default".to_string();
        }
        let mut names: Vec<String> = std::iter::once(&self.frame)
            .chain(self.frame.ancestors())
            .take_while(|f| !Arc::ptr_eq(f, &root))
            .map(|f| f.name())
            .collect();
        names.reverse();
        names.join(".")
    }

    /// Builds node entries for everything collected under the object.
    ///
    /// Field ids are unique within `ids`. Long ids include the object's own
    /// path so entries of different objects can be told apart.
    pub fn opc_node_models(
        &self,
        template: &OpcNodeModel,
        ids: &mut HashSet<String>,
        long_ids: bool,
    ) -> Vec<OpcNodeModel> {
        let base = OpcNodeModel {
            browse_path: None,
            ..template.clone()
        };
        let mut models = Vec::new();
        for frame in &self.variables {
            models.push(OpcNodeModel {
                id: Some(frame.node_id.to_opc_string()),
                attribute_id: Some(AttributeId::Value),
                data_set_field_id: Some(self.unique_id(&base, ids, long_ids, frame, None)),
                display_name: Some(frame.name()),
                type_definition_id: frame.type_definition_id.as_ref().map(NodeId::to_opc_string),
                ..base.clone()
            });
        }
        for (source, event_types) in &self.events {
            for event_type in event_types {
                let name = event_type.browse_name.name.clone();
                models.push(OpcNodeModel {
                    id: Some(self.event_notifier.to_opc_string()),
                    attribute_id: Some(AttributeId::EventNotifier),
                    data_set_field_id: Some(self.unique_id(&base, ids, long_ids, source, Some(&name))),
                    display_name: Some(name),
                    type_definition_id: Some(event_type.node_id.to_opc_string()),
                    ..base.clone()
                });
            }
        }
        for frame in &self.methods {
            let object_id = frame
                .parent
                .as_ref()
                .map(|p| p.node_id.to_opc_string());
            models.push(OpcNodeModel {
                id: Some(frame.node_id.to_opc_string()),
                attribute_id: None,
                data_set_field_id: Some(self.unique_id(&base, ids, long_ids, frame, None)),
                display_name: Some(frame.name()),
                type_definition_id: frame.type_definition_id.as_ref().map(NodeId::to_opc_string),
                method_metadata: Some(MethodMetadataModel { object_id }),
                ..base.clone()
            });
        }
        models
    }

    fn unique_id(
        &self,
        template: &OpcNodeModel,
        ids: &mut HashSet<String>,
        long_ids: bool,
        frame: &BrowseFrame,
        extra: Option<&str>,
    ) -> String {
        let mut id = template.data_set_field_id.clone().unwrap_or_default();
        if long_ids {
            id.push_str(self.frame.browse_path());
        }
        id.push_str(frame.browse_path());
        if let Some(extra) = extra {
            id.push('/');
            id.push_str(extra);
        }
        if id.is_empty() {
            id = frame.name();
        }
        let mut candidate = id.clone();
        let mut suffix = 0;
        while !ids.insert(candidate.clone()) {
            suffix += 1;
            candidate = format!("{}_{}", id, suffix);
        }
        candidate
    }
}

// =============================================================================
// NodeToExpand
// =============================================================================

/// Which collection of a node is being worked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ObjectSlot {
    /// The node's own variable bag.
    Variables,
    /// One discovered object.
    Object(usize),
}

/// One configured node after the initial probe.
#[derive(Debug)]
pub(crate) struct NodeToExpand {
    pub config: OpcNodeModel,
    pub frame: Arc<BrowseFrame>,
    pub node_class: NodeClass,
    pub errors: Vec<ServiceResult>,
    pub variables: ObjectToExpand,
    pub objects: Vec<ObjectToExpand>,
    known_objects: HashSet<NodeId>,
    next_object: usize,
}

impl NodeToExpand {
    pub fn resolved(config: OpcNodeModel, frame: Arc<BrowseFrame>) -> Self {
        let variables_frame = if frame.browse_name.is_some() {
            Arc::clone(&frame)
        } else {
            Arc::new(
                BrowseFrame::clone(&frame).with_browse_name(QualifiedName::new(0, "Variables")),
            )
        };
        Self {
            config,
            node_class: frame.node_class,
            frame,
            errors: Vec::new(),
            variables: ObjectToExpand::new(variables_frame),
            objects: Vec::new(),
            known_objects: HashSet::new(),
            next_object: 0,
        }
    }

    pub fn failed(config: OpcNodeModel, error: ServiceResult) -> Self {
        let mut node = Self::resolved(config, Arc::new(BrowseFrame::root(NodeId::null())));
        node.errors.push(error);
        node
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ServiceResult) {
        self.errors.push(error);
    }

    pub fn contains_objects(&self) -> bool {
        !self.objects.is_empty()
    }

    /// Variables go to the variable bag, everything else becomes an object.
    pub fn add_objects_or_variables(&mut self, frames: &[Arc<BrowseFrame>]) {
        for frame in frames {
            match frame.node_class {
                NodeClass::Variable | NodeClass::VariableType => {
                    self.variables.add_nodes(std::iter::once(frame));
                }
                _ => {
                    if frame.node_id.is_null() || !self.known_objects.insert(frame.node_id.clone())
                    {
                        continue;
                    }
                    self.objects.push(ObjectToExpand::new(Arc::clone(frame)));
                }
            }
        }
    }

    /// Claims the next object that has not been expanded yet.
    pub fn next_object(&mut self) -> Option<usize> {
        if self.next_object < self.objects.len() {
            self.next_object += 1;
            Some(self.next_object - 1)
        } else {
            None
        }
    }

    pub fn object(&self, slot: ObjectSlot) -> &ObjectToExpand {
        match slot {
            ObjectSlot::Variables => &self.variables,
            ObjectSlot::Object(index) => &self.objects[index],
        }
    }

    pub fn object_mut(&mut self, slot: ObjectSlot) -> &mut ObjectToExpand {
        match slot {
            ObjectSlot::Variables => &mut self.variables,
            ObjectSlot::Object(index) => &mut self.objects[index],
        }
    }

    /// Node entries not yet emitted with a writer of their own.
    ///
    /// With `error` set the configured node is prepended so the error entry
    /// can be matched to its configuration.
    pub fn all_opc_node_models(&self, ids: &mut HashSet<String>, error: bool) -> Vec<OpcNodeModel> {
        let mut models = if error {
            vec![self.config.clone()]
        } else {
            Vec::new()
        };
        match self.node_class {
            NodeClass::Variable | NodeClass::VariableType => {
                if !self.variables.entries_already_returned {
                    models.extend(self.variables.opc_node_models(&self.config, ids, true));
                }
            }
            NodeClass::Object | NodeClass::ObjectType => {
                for object in self.objects.iter().filter(|o| !o.entries_already_returned) {
                    models.extend(object.opc_node_models(&self.config, ids, true));
                }
            }
            _ => {}
        }
        models
    }
}
