use url::Url;

use crate::config::ScriptConfig;
use crate::dom::Document;
use crate::engine::{ExecutionEngine, ExecutionReport};
use crate::{Error, Result};

/// A loaded page: its URL, its document, and the outcome of its scripts.
#[derive(Debug)]
pub struct Page {
    url: Url,
    document: Document,
    report: Option<ExecutionReport>,
}

impl Page {
    /// Parses `html` and, when scripting is enabled, runs its scripts with the
    /// HTTP fetcher.
    pub fn from_html(url: &str, html: &str, config: &ScriptConfig) -> Result<Self> {
        if !config.javascript_enabled {
            return Self::parse(url, html);
        }
        let mut engine = ExecutionEngine::new(config.clone())?;
        Self::from_html_with_engine(url, html, &mut engine)
    }

    /// Parses `html` and runs its scripts with a prepared engine.
    pub fn from_html_with_engine(url: &str, html: &str, engine: &mut ExecutionEngine) -> Result<Self> {
        let mut page = Self::parse(url, html)?;
        let report = engine.execute(&page.document, &page.url)?;
        page.report = (!report.skipped).then_some(report);
        Ok(page)
    }

    fn parse(url: &str, html: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|err| Error::InvalidUrl {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
        Ok(Self {
            url,
            document: Document::parse(html),
            report: None,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// `None` when scripts were not run.
    pub fn report(&self) -> Option<&ExecutionReport> {
        self.report.as_ref()
    }

    pub fn title(&self) -> String {
        self.document.title()
    }

    pub fn text(&self, selector: &str) -> Result<Option<String>> {
        self.document.text(selector)
    }

    pub fn inner_html(&self, selector: &str) -> Result<Option<String>> {
        match self.document.query_selector(selector)? {
            Some(node) => self.document.inner_html(node).map(Some),
            None => Ok(None),
        }
    }

    pub fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>> {
        Ok(self
            .document
            .query_selector(selector)?
            .and_then(|node| self.document.attribute(node, name)))
    }

    /// Serializes the current document.
    pub fn html(&self) -> String {
        self.document.to_html()
    }
}
