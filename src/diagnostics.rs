use std::collections::VecDeque;
use std::fmt;

/// Where a script body came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    /// Position among the inline scripts, in document order.
    Inline { index: usize },
    /// `src` as written in the markup.
    External { url: String },
}

impl fmt::Display for ScriptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline { index } => write!(f, "inline script #{index}"),
            Self::External { url } => write!(f, "external script {url}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    UnresolvableUrl,
    FetchFailed,
    ScriptFailed,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::UnresolvableUrl => "unresolvable url",
            Self::FetchFailed => "fetch failed",
            Self::ScriptFailed => "script failed",
        };
        f.write_str(label)
    }
}

/// One recoverable failure observed during execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub source: ScriptSource,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.source, self.message)
    }
}

/// Bounded log of diagnostics; the oldest entry is evicted once full.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticLog {
    entries: VecDeque<Diagnostic>,
    limit: usize,
    dropped: usize,
}

impl DiagnosticLog {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            limit: limit.max(1),
            dropped: 0,
        }
    }

    pub(crate) fn record(&mut self, kind: DiagnosticKind, source: ScriptSource, message: String) {
        let diagnostic = Diagnostic {
            kind,
            source,
            message,
        };
        log::warn!("{diagnostic}");
        if self.entries.len() >= self.limit {
            self.entries.pop_front();
            self.dropped += 1;
        }
        self.entries.push_back(diagnostic);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Entries evicted because the log was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |entry| entry.kind == kind)
    }
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::new(256)
    }
}
