use std::fmt;

use url::Url;

use crate::bridge::install_globals;
use crate::collector::{ScriptCollector, ScriptEntry};
use crate::config::ScriptConfig;
use crate::diagnostics::{DiagnosticKind, DiagnosticLog, ScriptSource};
use crate::dom::Document;
use crate::fetcher::{HttpScriptFetcher, ScriptFetcher, resolve_script_url};
use crate::script::{Interpreter, ScriptRuntime};
use crate::{Error, Result};

/// Phase of the most recent `execute` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Collecting,
    FetchingExternals,
    Executing,
    Done,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Collecting => "collecting",
            Self::FetchingExternals => "fetching externals",
            Self::Executing => "executing",
            Self::Done => "done",
        };
        f.write_str(label)
    }
}

/// Outcome of one `execute` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Scripting was disabled; nothing was collected or run.
    pub skipped: bool,
    pub inline_found: usize,
    pub external_found: usize,
    /// Bodies that ran to completion, in execution order.
    pub executed: Vec<ScriptSource>,
    /// Bodies dropped before running or stopped by an error, in the order the
    /// failure happened.
    pub failed: Vec<ScriptSource>,
    pub diagnostics: DiagnosticLog,
}

impl ExecutionReport {
    fn new(diagnostic_limit: usize) -> Self {
        Self {
            skipped: false,
            inline_found: 0,
            external_found: 0,
            executed: Vec::new(),
            failed: Vec::new(),
            diagnostics: DiagnosticLog::new(diagnostic_limit),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.diagnostics.is_empty()
    }
}

/// Collects, fetches and runs the scripts of a document.
///
/// Every `execute` call starts from [`EngineState::Idle`] with a fresh
/// runtime: no script state survives from one call to the next.
pub struct ExecutionEngine {
    config: ScriptConfig,
    fetcher: Box<dyn ScriptFetcher>,
    state: EngineState,
}

impl fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl ExecutionEngine {
    /// Engine with the HTTP fetcher built from `config`.
    pub fn new(config: ScriptConfig) -> Result<Self> {
        let fetcher = HttpScriptFetcher::new(&config)?;
        Ok(Self::with_fetcher(config, fetcher))
    }

    pub fn with_fetcher(config: ScriptConfig, fetcher: impl ScriptFetcher + 'static) -> Self {
        Self {
            config,
            fetcher: Box::new(fetcher),
            state: EngineState::Idle,
        }
    }

    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Runs every script of `document` in a fresh [`Interpreter`].
    ///
    /// Only a failure to install `window` / `document` is returned as an
    /// error; fetch failures and script errors end up in the report.
    pub fn execute(&mut self, document: &Document, base: &Url) -> Result<ExecutionReport> {
        if !self.config.javascript_enabled {
            return Ok(self.skipped_report());
        }
        let mut runtime = Interpreter::with_max_call_depth(self.config.max_call_depth);
        self.execute_with_runtime(&mut runtime, document, base)
    }

    /// Like [`execute`](Self::execute) with a caller-provided runtime.
    pub fn execute_with_runtime(
        &mut self,
        runtime: &mut dyn ScriptRuntime,
        document: &Document,
        base: &Url,
    ) -> Result<ExecutionReport> {
        self.transition(EngineState::Idle);
        if !self.config.javascript_enabled {
            return Ok(self.skipped_report());
        }
        let mut report = ExecutionReport::new(self.config.diagnostic_limit);

        self.transition(EngineState::Collecting);
        let scripts = ScriptCollector::new()
            .with_respect_script_type(self.config.respect_script_type)
            .collect(document);
        report.inline_found = scripts.inline.len();
        report.external_found = scripts.external.len();

        if let Err(err) = install_globals(runtime, document) {
            self.transition(EngineState::Idle);
            return Err(err);
        }

        self.transition(EngineState::FetchingExternals);
        let mut fetched = Vec::with_capacity(scripts.external.len());
        for src in scripts.external_urls() {
            let source = ScriptSource::External {
                url: src.to_string(),
            };
            let url = match resolve_script_url(base, src) {
                Ok(url) => url,
                Err(err) => {
                    report.failed.push(source.clone());
                    report
                        .diagnostics
                        .record(DiagnosticKind::UnresolvableUrl, source, err.to_string());
                    continue;
                }
            };
            match self.fetcher.fetch(&url) {
                Ok(body) => fetched.push((source, body)),
                Err(err) => {
                    report.failed.push(source.clone());
                    report
                        .diagnostics
                        .record(DiagnosticKind::FetchFailed, source, err.to_string());
                }
            }
        }

        self.transition(EngineState::Executing);
        let inline = scripts
            .inline
            .into_iter()
            .filter_map(|entry| match entry {
                ScriptEntry::Inline { source } => Some(source),
                ScriptEntry::External { .. } => None,
            })
            .enumerate()
            .map(|(index, body)| (ScriptSource::Inline { index }, body));
        for (source, body) in fetched.into_iter().chain(inline) {
            run_body(runtime, &source, &body, &mut report);
        }

        self.transition(EngineState::Done);
        Ok(report)
    }

    fn skipped_report(&mut self) -> ExecutionReport {
        log::debug!("javascript disabled; skipping script execution");
        self.state = EngineState::Done;
        let mut report = ExecutionReport::new(self.config.diagnostic_limit);
        report.skipped = true;
        report
    }

    fn transition(&mut self, next: EngineState) {
        if self.state != next {
            log::debug!("engine state {} -> {}", self.state, next);
            self.state = next;
        }
    }
}

fn run_body(
    runtime: &mut dyn ScriptRuntime,
    source: &ScriptSource,
    body: &str,
    report: &mut ExecutionReport,
) {
    log::trace!("running {source}");
    match runtime.run(body, &source.to_string()) {
        Ok(_) => report.executed.push(source.clone()),
        Err(err) => {
            let message = match err {
                Error::ScriptParse(message) | Error::ScriptRuntime(message) => message,
                other => other.to_string(),
            };
            report.failed.push(source.clone());
            report
                .diagnostics
                .record(DiagnosticKind::ScriptFailed, source.clone(), message);
        }
    }
}
