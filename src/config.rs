/// Engine-wide settings shared by every entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Tags marking transition rules. Empty means every rule is a
    /// transition.
    pub transition_tags: Vec<String>,
    /// Carry failed rules forward as disabled on result states when the
    /// applied rule writes none of the cells they read.
    pub incremental_matching: bool,
    /// Attempt the rules of a class on the rayon pool. Only honoured with
    /// the `parallel` feature and in multi-result steps.
    pub parallel_matching: bool,
    /// Log the `[states, steps, elapsed]` line at the end of `rewrite` and
    /// `search`.
    pub statistics: bool,
    /// Name of the computation cell.
    pub k_cell: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            transition_tags: Vec::new(),
            incremental_matching: true,
            parallel_matching: false,
            statistics: false,
            k_cell: "k".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn with_transition_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.transition_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_incremental_matching(mut self, on: bool) -> Self {
        self.incremental_matching = on;
        self
    }

    pub fn with_parallel_matching(mut self, on: bool) -> Self {
        self.parallel_matching = on;
        self
    }

    pub fn with_statistics(mut self, on: bool) -> Self {
        self.statistics = on;
        self
    }

    pub fn with_k_cell(mut self, name: impl Into<String>) -> Self {
        self.k_cell = name.into();
        self
    }

    /// Whether class attempts actually run in parallel in this build.
    pub fn parallel_enabled(&self) -> bool {
        cfg!(feature = "parallel") && self.parallel_matching
    }
}
