// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Browse helpers that drain continuation points.

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;

use crate::client::session::{check_result_count, BrowseDescription, ReferenceDescription, Session};
use crate::error::{OpcUaError, OpcUaResult, ServiceResult, SessionError};
use crate::types::NodeId;

/// All references found for one request.
#[derive(Debug, Clone, Default)]
pub struct BrowseItem {
    /// Index of the originating request. `None` for a failure that cannot
    /// be attributed to a request.
    pub origin: Option<usize>,
    /// References from all pages.
    pub references: Vec<ReferenceDescription>,
    /// First error reported for the request.
    pub error: Option<ServiceResult>,
}

impl BrowseItem {
    fn systemic(error: &OpcUaError) -> Self {
        Self {
            origin: None,
            references: Vec::new(),
            error: Some(ServiceResult::from(error)),
        }
    }
}

/// Browses every request and follows continuation points to the end.
///
/// Returns one item per request in request order. A failing service call
/// yields a single unattributed item instead. Only cancellation is
/// returned as `Err`.
pub async fn browse_all(
    session: &dyn Session,
    requests: &[BrowseDescription],
    ct: &CancellationToken,
) -> OpcUaResult<Vec<BrowseItem>> {
    if requests.is_empty() {
        return Ok(Vec::new());
    }
    let first = match session.browse(requests, ct).await.and_then(|results| {
        check_result_count("Browse", requests.len(), &results)?;
        Ok(results)
    }) {
        Ok(results) => results,
        Err(e) if e.is_cancelled() => return Err(e),
        Err(e) => return Ok(vec![BrowseItem::systemic(&e)]),
    };

    let mut items = Vec::with_capacity(requests.len());
    for (index, mut result) in first.into_iter().enumerate() {
        let mut item = BrowseItem {
            origin: Some(index),
            references: std::mem::take(&mut result.references),
            error: result.error.take(),
        };
        let mut continuation = result.continuation_point.filter(|c| !c.is_empty());
        while let Some(point) = continuation.take() {
            if ct.is_cancelled() {
                return Err(OpcUaError::Cancelled);
            }
            match session.browse_next(std::slice::from_ref(&point), ct).await {
                Ok(mut next) if next.len() == 1 => {
                    let mut page = next.remove(0);
                    item.references.append(&mut page.references);
                    if item.error.is_none() {
                        item.error = page.error;
                    }
                    continuation = page.continuation_point.filter(|c| !c.is_empty());
                }
                Ok(next) => {
                    let e = OpcUaError::session(SessionError::result_count_mismatch(
                        "BrowseNext",
                        1,
                        next.len(),
                    ));
                    item.error = Some(ServiceResult::from(&e));
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => item.error = Some(ServiceResult::from(&e)),
            }
        }
        items.push(item);
    }
    Ok(items)
}

/// Browses every request down to `max_depth` levels.
///
/// Children are browsed with the same reference type and class mask as
/// their originating request, at most `batch_size` nodes per call.
/// References of all levels are attributed to the originating request.
/// Each node is browsed at most once per request.
pub async fn browse_tree(
    session: &dyn Session,
    requests: &[BrowseDescription],
    max_depth: usize,
    batch_size: usize,
    ct: &CancellationToken,
) -> OpcUaResult<Vec<BrowseItem>> {
    let mut items = browse_all(session, requests, ct).await?;
    if items.iter().any(|i| i.origin.is_none()) {
        return Ok(items);
    }

    let mut visited: Vec<HashSet<NodeId>> = requests
        .iter()
        .map(|r| HashSet::from([r.node_id.clone()]))
        .collect();
    let mut frontier: Vec<(usize, NodeId)> = Vec::new();
    for (origin, item) in items.iter().enumerate() {
        for reference in item.references.iter().filter(|r| r.is_local()) {
            if visited[origin].insert(reference.node_id.clone()) {
                frontier.push((origin, reference.node_id.clone()));
            }
        }
    }

    for _ in 1..max_depth {
        if frontier.is_empty() {
            break;
        }
        let mut next_frontier = Vec::new();
        for chunk in frontier.chunks(batch_size.max(1)) {
            let next_requests: Vec<BrowseDescription> = chunk
                .iter()
                .map(|(origin, node_id)| BrowseDescription {
                    node_id: node_id.clone(),
                    ..requests[*origin].clone()
                })
                .collect();
            let results = browse_all(session, &next_requests, ct).await?;
            if let Some(failure) = results.iter().find(|i| i.origin.is_none()) {
                return Ok(vec![failure.clone()]);
            }
            for result in results {
                let Some(index) = result.origin else { continue };
                let origin = chunk[index].0;
                let item = &mut items[origin];
                if item.error.is_none() {
                    item.error = result.error;
                }
                for reference in result.references {
                    if reference.is_local() && visited[origin].insert(reference.node_id.clone()) {
                        next_frontier.push((origin, reference.node_id.clone()));
                    }
                    item.references.push(reference);
                }
            }
        }
        frontier = next_frontier;
    }
    Ok(items)
}
