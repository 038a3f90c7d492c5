//! Script execution and live DOM bridge for programmatic browsing.
//!
//! A [`Document`] is parsed from HTML, then an [`ExecutionEngine`] collects its
//! `<script>` elements, fetches the external ones, and runs every body inside a
//! fresh scripting runtime that sees the page through `window` / `document`.
//! Scripts read and mutate the same tree the host inspects afterwards.
//!
//! ```no_run
//! use page_script::{Document, ExecutionEngine, ScriptConfig};
//!
//! # fn main() -> page_script::Result<()> {
//! let document = Document::parse(
//!     r#"<div id="result">Before</div>
//!        <script>document.getElementById("result").innerHTML = "After";</script>"#,
//! );
//! let base = url::Url::parse("https://example.test/").map_err(|err| {
//!     page_script::Error::InvalidUrl {
//!         url: "https://example.test/".into(),
//!         reason: err.to_string(),
//!     }
//! })?;
//! let mut engine = ExecutionEngine::new(ScriptConfig::default())?;
//! engine.execute(&document, &base)?;
//! assert_eq!(document.text("#result")?, Some("After".to_string()));
//! # Ok(())
//! # }
//! ```

use std::error::Error as StdError;
use std::fmt;

mod bridge;
mod collector;
mod config;
mod diagnostics;
mod dom;
mod engine;
mod fetcher;
mod html;
mod page;
mod script;
mod selector;

pub use bridge::install_globals;
pub use collector::{ScriptCollector, ScriptEntry, ScriptSet};
pub use config::ScriptConfig;
pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticLog, ScriptSource};
pub use dom::{Document, NodeId};
pub use engine::{EngineState, ExecutionEngine, ExecutionReport};
pub use fetcher::{HttpScriptFetcher, ScriptFetcher, resolve_script_url};
pub use page::Page;
pub use script::{
    HostError, HostFn, HostObject, HostProperty, HostValue, Interpreter, ScriptRuntime,
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    DomSetup(String),
    ScriptParse(String),
    ScriptRuntime(String),
    UnsupportedSelector(String),
    InvalidUrl { url: String, reason: String },
    Fetch { url: String, reason: String },
    HttpClient(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DomSetup(msg) => write!(f, "dom setup error: {msg}"),
            Self::ScriptParse(msg) => write!(f, "script parse error: {msg}"),
            Self::ScriptRuntime(msg) => write!(f, "script runtime error: {msg}"),
            Self::UnsupportedSelector(selector) => write!(f, "unsupported selector: {selector}"),
            Self::InvalidUrl { url, reason } => write!(f, "invalid url {url}: {reason}"),
            Self::Fetch { url, reason } => write!(f, "failed to fetch {url}: {reason}"),
            Self::HttpClient(msg) => write!(f, "http client error: {msg}"),
        }
    }
}

impl StdError for Error {}

#[cfg(test)]
mod tests;
