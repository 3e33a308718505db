/// Settings for connections handed out by a
/// [`ConnectionFactory`](super::ConnectionFactory).
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Database label, used in log lines
    pub database: String,

    /// Hand out connections already open, as a pooling provider would
    pub open_on_acquire: bool,
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self {
            database: "memory".to_string(),
            open_on_acquire: false,
        }
    }

    /// Set the database label
    pub fn database(mut self, database: &str) -> Self {
        self.database = database.to_string();
        self
    }

    /// Return connections already opened
    pub fn open_on_acquire(mut self, open: bool) -> Self {
        self.open_on_acquire = open;
        self
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new()
    }
}
