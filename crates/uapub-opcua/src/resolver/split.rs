// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Splitting resolved writers into bounded copies.

use crate::models::{
    DataSetWriterModel, ExtensionFieldModel, PublishedDataSetEventModel,
    PublishedDataSetVariableModel, PublishedObjectModel, SimpleAttributeOperandModel,
};
use crate::resolver::field::{Field, FieldKind};

/// Splits every writer into copies with at most `max_items` variables.
///
/// Per writer the copies are, in order: variable chunks, one copy per
/// event, then chunks of each object's variables. The first copy keeps the
/// writer id, later copies get `{id}_{n}`.
pub fn split(
    writers: &[DataSetWriterModel],
    fields: &[Field],
    max_items: usize,
) -> Vec<DataSetWriterModel> {
    let max_items = max_items.max(1);
    let mut result = Vec::new();
    for (writer_index, writer) in writers.iter().enumerate() {
        let own: Vec<(usize, &Field)> = fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.writer == writer_index)
            .collect();
        let extensions: Vec<ExtensionFieldModel> = own
            .iter()
            .filter_map(|(_, f)| match &f.kind {
                FieldKind::Extension(x) => Some(x.clone()),
                _ => None,
            })
            .collect();

        let mut copies = Vec::new();

        let variables: Vec<&PublishedDataSetVariableModel> = own
            .iter()
            .filter_map(|(_, f)| match &f.kind {
                FieldKind::Variable(v) => Some(v),
                _ => None,
            })
            .collect();
        for chunk in variables.chunks(max_items) {
            let mut copy = copy_writer(writer, &extensions, chunk.len());
            copy.source_mut().published_variables = reindex(chunk.iter().copied());
            copies.push(copy);
        }

        for (_, field) in &own {
            let FieldKind::Event(event) = &field.kind else {
                continue;
            };
            let selected = event.selected_fields.as_ref().map_or(0, Vec::len);
            let mut copy = copy_writer(writer, &extensions, selected);
            copy.source_mut().published_events = vec![PublishedDataSetEventModel {
                selected_fields: event.selected_fields.as_ref().map(|fields| {
                    fields
                        .iter()
                        .enumerate()
                        .map(|(i, f)| SimpleAttributeOperandModel {
                            field_index: i as u32,
                            ..f.clone()
                        })
                        .collect()
                }),
                ..PublishedDataSetEventModel::clone(event)
            }];
            if let Some(data_set) = copy.data_set.as_mut() {
                data_set.name = event.name.clone();
            }
            copies.push(copy);
        }

        for (object_index, field) in &own {
            let FieldKind::Object { model, .. } = &field.kind else {
                continue;
            };
            let object_variables: Vec<&PublishedDataSetVariableModel> = own
                .iter()
                .filter_map(|(_, f)| match &f.kind {
                    FieldKind::ObjectVariable { object, variable } if object == object_index => {
                        Some(variable)
                    }
                    _ => None,
                })
                .collect();
            for chunk in object_variables.chunks(max_items) {
                let mut copy = copy_writer(writer, &extensions, chunk.len());
                copy.source_mut().published_objects = vec![PublishedObjectModel {
                    published_variables: Some(reindex(chunk.iter().copied())),
                    ..model.clone()
                }];
                if let Some(data_set) = copy.data_set.as_mut() {
                    data_set.name = model.name.clone();
                }
                copies.push(copy);
            }
        }

        for (n, mut copy) in copies.into_iter().enumerate() {
            copy.data_set_writer_index = n as u32;
            if n > 0 {
                copy.id = format!("{}_{}", writer.id, n);
            }
            result.push(copy);
        }
    }
    result
}

/// Structural copy of a writer with an empty source and extension fields
/// indexed after `offset` primary fields.
fn copy_writer(
    writer: &DataSetWriterModel,
    extensions: &[ExtensionFieldModel],
    offset: usize,
) -> DataSetWriterModel {
    let mut copy = writer.clone();
    let data_set = copy.data_set.get_or_insert_with(Default::default);
    data_set.data_set_source = Some(Default::default());
    data_set.extension_fields = extensions
        .iter()
        .enumerate()
        .map(|(i, x)| ExtensionFieldModel {
            field_index: (offset + i) as u32,
            ..x.clone()
        })
        .collect();
    copy
}

fn reindex<'a>(
    variables: impl IntoIterator<Item = &'a PublishedDataSetVariableModel>,
) -> Vec<PublishedDataSetVariableModel> {
    variables
        .into_iter()
        .enumerate()
        .map(|(i, v)| PublishedDataSetVariableModel {
            field_index: i as u32,
            ..v.clone()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Variant;

    fn fields_for(writer: &DataSetWriterModel) -> Vec<Field> {
        Field::create(0, writer, 0)
    }

    #[test]
    fn test_split_chunks_variables() {
        let mut writer = DataSetWriterModel::new("w");
        writer.source_mut().published_variables = (0..5)
            .map(|i| PublishedDataSetVariableModel::new(format!("ns=2;i={}", i)))
            .collect();
        if let Some(data_set) = writer.data_set.as_mut() {
            data_set.extension_fields.push(ExtensionFieldModel::new("Site", Variant::Int32(1)));
        }
        let fields = fields_for(&writer);

        let copies = split(std::slice::from_ref(&writer), &fields, 2);
        let ids: Vec<_> = copies.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["w", "w_1", "w_2"]);

        let counts: Vec<_> = copies
            .iter()
            .map(|c| c.source().map_or(0, |s| s.published_variables.len()))
            .collect();
        assert_eq!(counts, [2, 2, 1]);
        assert_eq!(copies[2].data_set_writer_index, 2);

        let last = &copies[2];
        assert_eq!(last.source().map(|s| s.published_variables[0].field_index), Some(0));
        let extension_indexes: Vec<_> = last
            .data_set
            .iter()
            .flat_map(|d| d.extension_fields.iter().map(|x| x.field_index))
            .collect();
        assert_eq!(extension_indexes, [1]);

        let nodes: Vec<_> = copies
            .iter()
            .flat_map(|c| c.source().map(|s| s.published_variables.clone()).unwrap_or_default())
            .filter_map(|v| v.published_variable_node_id)
            .collect();
        assert_eq!(nodes.len(), 5);
        assert_eq!(nodes[4], "ns=2;i=4");
    }

    #[test]
    fn test_split_events_and_objects() {
        let mut writer = DataSetWriterModel::new("w");
        let clause = |index: u32| SimpleAttributeOperandModel {
            field_index: index,
            ..Default::default()
        };
        writer.source_mut().published_events = vec![
            PublishedDataSetEventModel {
                name: Some("Alarms".into()),
                selected_fields: Some(vec![clause(4), clause(7), clause(9)]),
                ..Default::default()
            },
            PublishedDataSetEventModel {
                name: Some("Audit".into()),
                ..Default::default()
            },
        ];
        writer.source_mut().published_objects = vec![PublishedObjectModel {
            name: Some("Pump".into()),
            published_variables: Some(
                (0..3)
                    .map(|i| PublishedDataSetVariableModel::new(format!("ns=2;i={}", i)))
                    .collect(),
            ),
            ..PublishedObjectModel::new("ns=2;i=100")
        }];
        let fields = fields_for(&writer);

        let copies = split(std::slice::from_ref(&writer), &fields, 2);
        let names: Vec<_> = copies
            .iter()
            .map(|c| c.data_set.as_ref().and_then(|d| d.name.clone()).unwrap_or_default())
            .collect();
        assert_eq!(names, ["Alarms", "Audit", "Pump", "Pump"]);

        let object_counts: Vec<_> = copies[2..]
            .iter()
            .filter_map(|c| c.source())
            .map(|s| s.published_objects[0].published_variables.as_ref().map_or(0, Vec::len))
            .collect();
        assert_eq!(object_counts, [2, 1]);
        assert!(copies[0].source().is_some_and(|s| s.published_variables.is_empty()));

        let clause_indexes: Vec<_> = copies[0]
            .source()
            .and_then(|s| s.published_events[0].selected_fields.clone())
            .unwrap_or_default()
            .iter()
            .map(|f| f.field_index)
            .collect();
        assert_eq!(clause_indexes, [0, 1, 2]);
    }
}
