/// How a [`Session`](super::Session) runs CRUD calls made outside an
/// explicit transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutocommitMode {
    /// Run on a fresh connection with no transaction; the driver's own
    /// autocommit applies.
    #[default]
    Direct,

    /// Wrap each call in an implicit transaction, committed on success and
    /// rolled back on failure.
    PerCallTransaction,
}

#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub autocommit: AutocommitMode,

    /// Name shown in log lines
    pub label: Option<String>,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn autocommit(mut self, mode: AutocommitMode) -> Self {
        self.autocommit = mode;
        self
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_direct_without_label() {
        let config = SessionConfig::default();
        assert_eq!(config.autocommit, AutocommitMode::Direct);
        assert!(config.label.is_none());
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::new()
            .autocommit(AutocommitMode::PerCallTransaction)
            .label("billing");
        assert_eq!(config.autocommit, AutocommitMode::PerCallTransaction);
        assert_eq!(config.label.as_deref(), Some("billing"));
    }
}
