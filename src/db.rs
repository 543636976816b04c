use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;

/// Open a pool on an index file.
///
/// Writers get a fresh file (`create = true`); readers open an existing
/// file read-only. Writers use the rollback journal instead of WAL so a
/// finished index is one self-contained file that can be renamed.
pub async fn connect(path: &Path, create: bool) -> Result<SqlitePool, sqlx::Error> {
    let mut options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(create)
        .read_only(!create);
    if create {
        options = options.journal_mode(SqliteJournalMode::Delete);
    }

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
}
