use crate::dom::{Document, NodeId};
use crate::script::{HostError, HostValue};

use super::element::element_object;
use super::{host_error, string_arg};

fn wrap(document: &Document, node: Option<NodeId>) -> HostValue {
    node.map_or(HostValue::Null, |node| {
        HostValue::Object(element_object(document, node))
    })
}

fn wrap_all(document: &Document, nodes: Vec<NodeId>) -> HostValue {
    HostValue::List(
        nodes
            .into_iter()
            .map(|node| HostValue::Object(element_object(document, node)))
            .collect(),
    )
}

pub(crate) fn element_by_id(document: &Document, args: &[HostValue]) -> Result<HostValue, HostError> {
    let id = string_arg(args, 0);
    Ok(wrap(document, document.element_by_id(&id)))
}

/// `scope` of `None` searches the whole document.
pub(crate) fn elements_by_tag_name(
    document: &Document,
    scope: Option<NodeId>,
    args: &[HostValue],
) -> Result<HostValue, HostError> {
    let tag = string_arg(args, 0);
    let nodes = match scope {
        Some(scope) => document.with_dom(|dom| dom.elements_by_tag_name(scope, &tag)),
        None => document.elements_by_tag_name(&tag),
    };
    Ok(wrap_all(document, nodes))
}

pub(crate) fn query_selector(
    document: &Document,
    scope: Option<NodeId>,
    args: &[HostValue],
) -> Result<HostValue, HostError> {
    let selector = string_arg(args, 0);
    let found = match scope {
        Some(scope) => document
            .query_selector_all_within(scope, &selector)
            .map(|nodes| nodes.first().copied()),
        None => document.query_selector(&selector),
    }
    .map_err(host_error)?;
    Ok(wrap(document, found))
}

pub(crate) fn query_selector_all(
    document: &Document,
    scope: Option<NodeId>,
    args: &[HostValue],
) -> Result<HostValue, HostError> {
    let selector = string_arg(args, 0);
    let nodes = match scope {
        Some(scope) => document.query_selector_all_within(scope, &selector),
        None => document.query_selector_all(&selector),
    }
    .map_err(host_error)?;
    Ok(wrap_all(document, nodes))
}
