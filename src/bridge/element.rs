use crate::dom::{Document, NodeId};
use crate::script::{HostError, HostFn, HostObject, HostValue};

use super::{host_error, query, string_arg};

/// Builds the script-visible wrapper of one element.
///
/// Wrappers hold only the document handle and the node id, so every read goes
/// to the live tree and two wrappers of one node observe the same state.
pub(crate) fn element_object(document: &Document, node: NodeId) -> HostObject {
    let tag = document
        .tag_name(node)
        .map(|tag| tag.to_ascii_uppercase())
        .unwrap_or_default();

    HostObject::new()
        .with_value("tagName", tag.clone())
        .with_value("nodeName", tag)
        .with_accessor(
            "id",
            {
                let document = document.clone();
                move |_| {
                    Ok(document
                        .attribute(node, "id")
                        .map_or(HostValue::Undefined, HostValue::String))
                }
            },
            Some(setter(document, node, |document, node, value| {
                document.set_attribute(node, "id", &value)
            })),
        )
        .with_accessor(
            "innerHTML",
            {
                let document = document.clone();
                move |_| {
                    document
                        .inner_html(node)
                        .map(HostValue::String)
                        .map_err(host_error)
                }
            },
            Some(setter(document, node, |document, node, value| {
                document.set_inner_html(node, &value)
            })),
        )
        .with_accessor(
            "innerText",
            {
                let document = document.clone();
                move |_| Ok(HostValue::String(document.inner_text(node)))
            },
            Some(setter(document, node, |document, node, value| {
                document.set_text_content(node, &value)
            })),
        )
        .with_accessor(
            "textContent",
            {
                let document = document.clone();
                move |_| Ok(HostValue::String(document.text_content(node)))
            },
            Some(setter(document, node, |document, node, value| {
                document.set_text_content(node, &value)
            })),
        )
        .with_accessor(
            "outerHTML",
            {
                let document = document.clone();
                move |_| {
                    document
                        .outer_html(node)
                        .map(HostValue::String)
                        .map_err(host_error)
                }
            },
            None,
        )
        .with_method("getAttribute", {
            let document = document.clone();
            move |args| {
                let name = string_arg(args, 0);
                Ok(HostValue::from(
                    document.attribute(node, &name.to_ascii_lowercase()),
                ))
            }
        })
        .with_method("setAttribute", {
            let document = document.clone();
            move |args| {
                let name = string_arg(args, 0);
                let value = string_arg(args, 1);
                document
                    .set_attribute(node, &name, &value)
                    .map_err(host_error)?;
                Ok(HostValue::Undefined)
            }
        })
        .with_method("hasAttribute", {
            let document = document.clone();
            move |args| {
                let name = string_arg(args, 0);
                Ok(HostValue::Bool(
                    document.has_attribute(node, &name.to_ascii_lowercase()),
                ))
            }
        })
        .with_method("querySelector", {
            let document = document.clone();
            move |args| query::query_selector(&document, Some(node), args)
        })
        .with_method("querySelectorAll", {
            let document = document.clone();
            move |args| query::query_selector_all(&document, Some(node), args)
        })
        .with_method("getElementsByTagName", {
            let document = document.clone();
            move |args| query::elements_by_tag_name(&document, Some(node), args)
        })
}

/// Setter that writes the script value as text; `null` and `undefined`
/// write the empty string.
fn setter(
    document: &Document,
    node: NodeId,
    write: fn(&Document, NodeId, String) -> crate::Result<()>,
) -> HostFn {
    let document = document.clone();
    std::rc::Rc::new(move |args: &[HostValue]| -> Result<HostValue, HostError> {
        let value = match args.first() {
            None | Some(HostValue::Undefined | HostValue::Null) => String::new(),
            Some(value) => value.to_display_string(),
        };
        write(&document, node, value).map_err(host_error)?;
        Ok(HostValue::Undefined)
    })
}
