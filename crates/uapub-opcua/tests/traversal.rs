// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Browse traversal against the mock address space.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use common::{nid, plant, AddressSpace, MockSession};
use uapub_opcua::browse::{browse_sequence, reference_types, BrowseEvent, BrowseOptions, MatchCollector};
use uapub_opcua::client::Session;
use uapub_opcua::types::{NodeClass, NodeId, StatusCode};

fn matched_names(events: &[BrowseEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            BrowseEvent::Matched(frame) => Some(frame.name()),
            BrowseEvent::Failed { .. } => None,
        })
        .collect()
}

#[tokio::test]
async fn test_stop_when_found_does_not_descend_into_matches() {
    let mut space = plant(2);
    space.object(nid(900), "Booster", &nid(100), &nid(1000));
    let session: Arc<dyn Session> = Arc::new(MockSession::new(space));
    let ct = CancellationToken::new();

    let options = BrowseOptions::new()
        .with_type_definition(Some(nid(1000)))
        .with_stop_when_found(true);
    let mut sequence = browse_sequence(Arc::clone(&session), None, options, MatchCollector);
    let events = sequence.collect(&ct).await.unwrap();

    assert_eq!(matched_names(&events), ["Pump1", "Pump2"]);
    assert!(sequence.is_finished());
    let traversal = sequence.program().traversal();
    assert!(!traversal.is_visited(&nid(100)));
    assert!(!traversal.is_visited(&nid(200)));
    assert!(traversal.is_visited(&nid(1)));
}

#[tokio::test]
async fn test_without_stop_nested_instances_are_found() {
    let mut space = plant(2);
    space.object(nid(900), "Booster", &nid(100), &nid(1000));
    let session: Arc<dyn Session> = Arc::new(MockSession::new(space));
    let ct = CancellationToken::new();

    let options = BrowseOptions::new().with_type_definition(Some(nid(1000)));
    let mut sequence = browse_sequence(session, None, options, MatchCollector);
    let events = sequence.collect(&ct).await.unwrap();

    assert_eq!(matched_names(&events), ["Pump1", "Pump2", "Booster"]);
    let booster = events.iter().find_map(|e| match e {
        BrowseEvent::Matched(frame) if frame.node_id == nid(900) => Some(Arc::clone(frame)),
        _ => None,
    });
    let booster = booster.unwrap();
    assert_eq!(booster.depth(), 3);
    assert_eq!(booster.browse_path(), "/Plant/Pump1/Booster");
}

#[tokio::test]
async fn test_continuation_is_drained_before_children() {
    let mock = Arc::new(MockSession::new(plant(2)).with_page_size(1));
    let session: Arc<dyn Session> = mock.clone();
    let ct = CancellationToken::new();

    let mut sequence = browse_sequence(session, None, BrowseOptions::new(), MatchCollector);
    let events = sequence.collect(&ct).await.unwrap();

    let calls = mock.calls();
    assert_eq!(calls[0], "Browse(1)");
    assert_eq!(calls[1], "BrowseNext(1)");

    let names: HashSet<_> = matched_names(&events).into_iter().collect();
    let expected: HashSet<String> = ["Server", "Plant", "Pump1", "Pump2"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(names, expected);
    assert_eq!(mock.call_count("BrowseNext"), 2);
}

#[tokio::test]
async fn test_cycles_do_not_duplicate_matches() {
    let mut space = plant(2);
    space.reference(&nid(100), reference_types::organizes(), &nid(1));
    space.reference(&nid(200), reference_types::organizes(), &nid(100));
    let session: Arc<dyn Session> = Arc::new(MockSession::new(space).with_page_size(1));
    let ct = CancellationToken::new();

    let mut sequence = browse_sequence(session, None, BrowseOptions::new(), MatchCollector);
    let events = sequence.collect(&ct).await.unwrap();

    let names = matched_names(&events);
    let unique: HashSet<_> = names.iter().collect();
    assert_eq!(names.len(), unique.len());
    assert_eq!(names.len(), 4);
}

#[tokio::test]
async fn test_max_depth_limits_browsing() {
    let mock = Arc::new(MockSession::new(plant(2)));
    let session: Arc<dyn Session> = mock.clone();
    let ct = CancellationToken::new();

    let options = BrowseOptions::new().with_max_depth(Some(1));
    let mut sequence = browse_sequence(session, None, options, MatchCollector);
    let events = sequence.collect(&ct).await.unwrap();

    assert_eq!(matched_names(&events), ["Server", "Plant"]);
    assert_eq!(mock.call_count("Browse"), 1);
}

#[tokio::test]
async fn test_depth_cut_node_is_explored_from_shorter_path() {
    let folder = NodeId::numeric(0, 61);
    let mut space = AddressSpace::new();
    space.object(nid(10), "A", &NodeId::OBJECTS_FOLDER, &folder);
    space.object(nid(11), "B", &nid(10), &folder);
    space.object(nid(12), "C", &nid(11), &folder);
    space.object(nid(13), "Leaf", &nid(12), &folder);
    space.object(nid(14), "D", &NodeId::OBJECTS_FOLDER, &folder);
    space.reference(&nid(14), reference_types::organizes(), &nid(12));
    let session: Arc<dyn Session> = Arc::new(MockSession::new(space));
    let ct = CancellationToken::new();

    let options = BrowseOptions::new().with_max_depth(Some(3));
    let mut sequence = browse_sequence(session, None, options, MatchCollector);
    let events = sequence.collect(&ct).await.unwrap();

    let names = matched_names(&events);
    assert_eq!(names, ["Server", "A", "D", "B", "C", "Leaf"]);
    let leaf = events.iter().find_map(|e| match e {
        BrowseEvent::Matched(frame) if frame.node_id == nid(13) => Some(Arc::clone(frame)),
        _ => None,
    });
    assert_eq!(leaf.unwrap().depth(), 3);
    assert!(sequence.program().traversal().is_visited(&nid(12)));
}

#[tokio::test]
async fn test_variables_match_below_objects() {
    let session: Arc<dyn Session> = Arc::new(MockSession::new(plant(1)));
    let ct = CancellationToken::new();

    let options = BrowseOptions::new()
        .with_reference_type(reference_types::has_child(), true)
        .with_match_class(NodeClass::Variable.value());
    let root = Arc::new(uapub_opcua::BrowseFrame::root(nid(100)));
    let mut sequence = browse_sequence(session, Some(root), options, MatchCollector);
    let events = sequence.collect(&ct).await.unwrap();

    assert_eq!(matched_names(&events), ["Flow", "Pressure", "Speed", "Serial"]);
}

#[tokio::test]
async fn test_browse_failure_is_reported_as_item() {
    let mock = Arc::new(MockSession::new(plant(1)));
    mock.fail("Browse");
    let session: Arc<dyn Session> = mock.clone();
    let ct = CancellationToken::new();

    let mut sequence = browse_sequence(session, None, BrowseOptions::new(), MatchCollector);
    let events = sequence.collect(&ct).await.unwrap();

    assert_eq!(events.len(), 1);
    match &events[0] {
        BrowseEvent::Failed { frame, error } => {
            assert_eq!(frame.depth(), 0);
            assert!(error.status_code.is_bad());
        }
        BrowseEvent::Matched(_) => panic!("expected failure"),
    }
}

#[tokio::test]
async fn test_unknown_root_fails_with_status() {
    let session: Arc<dyn Session> = Arc::new(MockSession::new(plant(1)));
    let ct = CancellationToken::new();

    let root = Arc::new(uapub_opcua::BrowseFrame::root(nid(4242)));
    let mut sequence = browse_sequence(session, Some(root), BrowseOptions::new(), MatchCollector);
    let events = sequence.collect(&ct).await.unwrap();

    match events.as_slice() {
        [BrowseEvent::Failed { error, .. }] => {
            assert_eq!(error.status_code, StatusCode::BAD_NODE_ID_UNKNOWN)
        }
        other => panic!("unexpected events: {:?}", other),
    }
}

#[tokio::test]
async fn test_cancelled_sequence_returns_error() {
    let session: Arc<dyn Session> = Arc::new(MockSession::new(plant(1)));
    let ct = CancellationToken::new();
    ct.cancel();

    let mut sequence = browse_sequence(session, None, BrowseOptions::new(), MatchCollector);
    let err = sequence.collect(&ct).await.unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn test_stream_yields_matches_in_order() {
    let session: Arc<dyn Session> = Arc::new(MockSession::new(plant(2)));
    let options = BrowseOptions::new().with_type_definition(Some(nid(1000)));
    let sequence = browse_sequence(session, None, options, MatchCollector);

    let names: Vec<String> = sequence
        .into_stream(CancellationToken::new())
        .filter_map(|item| async move {
            match item {
                Ok(BrowseEvent::Matched(frame)) => Some(frame.name()),
                _ => None,
            }
        })
        .collect()
        .await;
    assert_eq!(names, ["Pump1", "Pump2"]);
}
