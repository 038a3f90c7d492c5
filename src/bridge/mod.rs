//! `window` / `document` projection of a [`Document`] into a script runtime.

use crate::dom::Document;
use crate::script::{HostError, HostObject, HostValue, ScriptRuntime};
use crate::{Error, Result};

mod element;
mod query;

/// Binds `window` and `document` for `document` into `runtime`.
///
/// `window.document` and `document` are the same script object. Any binding
/// failure is reported as [`Error::DomSetup`].
pub fn install_globals(runtime: &mut dyn ScriptRuntime, document: &Document) -> Result<()> {
    let document_object = document_object(document);
    let window = HostObject::new().with_value("document", HostValue::Object(document_object.clone()));

    runtime
        .bind("document", HostValue::Object(document_object))
        .map_err(dom_setup)?;
    runtime
        .bind("window", HostValue::Object(window))
        .map_err(dom_setup)?;
    log::debug!("installed window and document globals");
    Ok(())
}

fn dom_setup(err: Error) -> Error {
    match err {
        Error::DomSetup(_) => err,
        other => Error::DomSetup(other.to_string()),
    }
}

fn document_object(document: &Document) -> HostObject {
    HostObject::new()
        .with_method("getElementById", {
            let document = document.clone();
            move |args| query::element_by_id(&document, args)
        })
        .with_method("getElementsByTagName", {
            let document = document.clone();
            move |args| query::elements_by_tag_name(&document, None, args)
        })
        .with_method("querySelector", {
            let document = document.clone();
            move |args| query::query_selector(&document, None, args)
        })
        .with_method("querySelectorAll", {
            let document = document.clone();
            move |args| query::query_selector_all(&document, None, args)
        })
        .with_accessor(
            "title",
            {
                let document = document.clone();
                move |_| Ok(HostValue::String(document.title()))
            },
            Some({
                let document = document.clone();
                std::rc::Rc::new(move |args: &[HostValue]| -> std::result::Result<HostValue, HostError> {
                    let title = string_arg(args, 0);
                    document.set_title(&title).map_err(host_error)?;
                    Ok(HostValue::Undefined)
                })
            }),
        )
}

/// Argument `index` as a string; missing arguments read as `"undefined"`.
pub(crate) fn string_arg(args: &[HostValue], index: usize) -> String {
    args.get(index)
        .map_or_else(|| "undefined".to_string(), HostValue::to_display_string)
}

/// Maps crate errors raised by DOM operations to script exceptions.
pub(crate) fn host_error(err: Error) -> HostError {
    match err {
        Error::UnsupportedSelector(selector) => {
            HostError::syntax_error(format!("'{selector}' is not a valid selector"))
        }
        other => HostError::new("Error", other.to_string()),
    }
}
