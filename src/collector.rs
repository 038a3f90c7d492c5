use crate::dom::Document;

/// One script found in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptEntry {
    /// Body text of a `<script>` without `src`.
    Inline { source: String },
    /// `src` attribute exactly as written; resolved later by the engine.
    External { url: String },
}

/// Scripts of one document, split by class. Each list keeps document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptSet {
    pub inline: Vec<ScriptEntry>,
    pub external: Vec<ScriptEntry>,
}

impl ScriptSet {
    pub fn len(&self) -> usize {
        self.inline.len() + self.external.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inline.is_empty() && self.external.is_empty()
    }

    /// External `src` values in document order.
    pub fn external_urls(&self) -> impl Iterator<Item = &str> {
        self.external.iter().filter_map(|entry| match entry {
            ScriptEntry::External { url } => Some(url.as_str()),
            ScriptEntry::Inline { .. } => None,
        })
    }

    /// Inline bodies in document order.
    pub fn inline_sources(&self) -> impl Iterator<Item = &str> {
        self.inline.iter().filter_map(|entry| match entry {
            ScriptEntry::Inline { source } => Some(source.as_str()),
            ScriptEntry::External { .. } => None,
        })
    }
}

/// Extracts `<script>` elements in one forward pass over the tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptCollector {
    respect_script_type: bool,
}

impl ScriptCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// When enabled, scripts whose `type` is not a JavaScript type are skipped.
    pub fn with_respect_script_type(mut self, respect: bool) -> Self {
        self.respect_script_type = respect;
        self
    }

    pub fn collect(&self, document: &Document) -> ScriptSet {
        let mut set = ScriptSet::default();
        for node in document.elements_by_tag_name("script") {
            if self.respect_script_type {
                let script_type = document.attribute(node, "type");
                if !is_javascript_type(script_type.as_deref()) {
                    log::trace!("skipping script with type {script_type:?}");
                    continue;
                }
            }
            if let Some(url) = document.attribute(node, "src") {
                set.external.push(ScriptEntry::External { url });
                continue;
            }
            let source = document.text_content(node);
            if source.trim().is_empty() {
                continue;
            }
            set.inline.push(ScriptEntry::Inline { source });
        }
        log::debug!(
            "collected {} external and {} inline scripts",
            set.external.len(),
            set.inline.len()
        );
        set
    }
}

const JAVASCRIPT_MIME_TYPES: &[&str] = &[
    "application/ecmascript",
    "application/javascript",
    "application/x-ecmascript",
    "application/x-javascript",
    "text/ecmascript",
    "text/javascript",
    "text/javascript1.0",
    "text/javascript1.1",
    "text/javascript1.2",
    "text/javascript1.3",
    "text/javascript1.4",
    "text/javascript1.5",
    "text/jscript",
    "text/livescript",
    "text/x-ecmascript",
    "text/x-javascript",
];

/// A missing or empty `type`, a JavaScript MIME essence, or `module`.
fn is_javascript_type(script_type: Option<&str>) -> bool {
    let Some(script_type) = script_type else {
        return true;
    };
    let essence = script_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence.is_empty() || essence == "module" || JAVASCRIPT_MIME_TYPES.contains(&essence.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn javascript_type_detection_ignores_parameters_and_case() {
        assert!(is_javascript_type(None));
        assert!(is_javascript_type(Some("")));
        assert!(is_javascript_type(Some("Text/JavaScript; charset=utf-8")));
        assert!(is_javascript_type(Some("module")));
        assert!(!is_javascript_type(Some("application/json")));
        assert!(!is_javascript_type(Some("text/template")));
    }
}
