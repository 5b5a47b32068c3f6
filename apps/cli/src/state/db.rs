//! Database handle shared by every command.

use tillstone_db::Database;

/// Wrapper around `Database` held by `AppState`.
#[derive(Debug, Clone)]
pub struct DbState {
    db: Database,
}

impl DbState {
    pub fn new(db: Database) -> Self {
        DbState { db }
    }

    /// Returns a reference to the inner Database.
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let products = state.db.inner().products().search("cola", 20).await?;
    /// ```
    pub fn inner(&self) -> &Database {
        &self.db
    }
}
