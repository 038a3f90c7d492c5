use std::time::Duration;

/// Knobs for one [`ExecutionEngine`](crate::ExecutionEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptConfig {
    /// When false, `execute` returns immediately and leaves the document alone.
    pub javascript_enabled: bool,
    pub user_agent: String,
    /// Upper bound for each external script request.
    pub fetch_timeout: Duration,
    /// Script call depth at which a `RangeError` is thrown.
    pub max_call_depth: usize,
    /// Capacity of the diagnostic ring buffer; at least 1.
    pub diagnostic_limit: usize,
    /// Skip `<script>` elements whose `type` is not a JavaScript type.
    pub respect_script_type: bool,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            javascript_enabled: true,
            user_agent: concat!("page_script/", env!("CARGO_PKG_VERSION")).to_string(),
            fetch_timeout: Duration::from_secs(10),
            max_call_depth: 512,
            diagnostic_limit: 256,
            respect_script_type: false,
        }
    }
}

impl ScriptConfig {
    pub fn with_javascript_enabled(mut self, enabled: bool) -> Self {
        self.javascript_enabled = enabled;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_diagnostic_limit(mut self, limit: usize) -> Self {
        self.diagnostic_limit = limit.max(1);
        self
    }

    pub fn with_respect_script_type(mut self, respect: bool) -> Self {
        self.respect_script_type = respect;
        self
    }
}
