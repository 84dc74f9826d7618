//! Ordered preset list storage.
//!
//! # Invariants
//! - `position` is the zero-based list index; rows are read back in order.
//! - `replace_presets` swaps the whole list in one transaction.
//! - Identifiers are persisted as-is; they are checked when written through
//!   `Preset::set_event_identifier`, not on load.

use crate::db::DbError;
use crate::model::preset::{Preset, PresetValidationError};
use log::{info, warn};
use rusqlite::{params, Connection};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Preset persistence failures.
#[derive(Debug)]
pub enum RepoError {
    Validation(PresetValidationError),
    Db(DbError),
    InvalidData(String),
    MissingRequiredTable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted preset data: {message}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "connection is missing required table `{table}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::InvalidData(_) | Self::MissingRequiredTable(_) => None,
        }
    }
}

impl From<PresetValidationError> for RepoError {
    fn from(value: PresetValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Storage for the user's ordered preset list.
pub trait PresetRepository {
    fn load_presets(&self) -> RepoResult<Vec<Preset>>;
    /// Replaces the whole stored list with `presets`, keeping their order.
    fn replace_presets(&self, presets: &[Preset]) -> RepoResult<()>;
}

/// SQLite-backed preset list over the `presets` table.
pub struct SqlitePresetRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePresetRepository<'conn> {
    /// Wraps a migrated connection.
    ///
    /// # Errors
    /// - `RepoError::MissingRequiredTable` when `presets` does not exist.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        if !table_exists(conn, "presets")? {
            return Err(RepoError::MissingRequiredTable("presets"));
        }
        Ok(Self { conn })
    }
}

impl PresetRepository for SqlitePresetRepository<'_> {
    fn load_presets(&self) -> RepoResult<Vec<Preset>> {
        let mut stmt = self.conn.prepare(
            "SELECT position, title, date_epoch_ms, event_identifier
             FROM presets
             ORDER BY position ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut presets = Vec::new();
        while let Some(row) = rows.next()? {
            let position: i64 = row.get(0)?;
            let expected = i64::try_from(presets.len())
                .map_err(|_| RepoError::InvalidData("preset list too long".to_string()))?;
            if position != expected {
                return Err(RepoError::InvalidData(format!(
                    "preset position gap: expected {expected}, found {position}"
                )));
            }
            let title: String = row.get(1)?;
            let date_epoch_ms: i64 = row.get(2)?;
            let event_identifier: Option<String> = row.get(3)?;
            presets.push(Preset::new(title, date_epoch_ms, event_identifier)?);
        }
        Ok(presets)
    }

    fn replace_presets(&self, presets: &[Preset]) -> RepoResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM presets;", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO presets (position, title, date_epoch_ms, event_identifier)
                 VALUES (?1, ?2, ?3, ?4);",
            )?;
            for (position, preset) in presets.iter().enumerate() {
                let position = i64::try_from(position)
                    .map_err(|_| RepoError::InvalidData("preset list too long".to_string()))?;
                insert.execute(params![
                    position,
                    preset.title(),
                    preset.date_epoch_ms(),
                    preset.event_identifier(),
                ])?;
            }
        }
        tx.commit()?;

        info!("event=presets_persist module=repo status=ok count={}", presets.len());
        Ok(())
    }
}

/// Loads the stored list, falling back to an empty one on any failure.
pub fn load_presets_or_empty(repo: &impl PresetRepository) -> Vec<Preset> {
    match repo.load_presets() {
        Ok(presets) => {
            info!("event=presets_load module=repo status=ok count={}", presets.len());
            presets
        }
        Err(err) => {
            warn!("event=presets_load module=repo status=error fallback=empty error={}", err);
            Vec::new()
        }
    }
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

#[cfg(test)]
mod tests {
    use super::{load_presets_or_empty, PresetRepository, RepoError, SqlitePresetRepository};
    use crate::db::open_db_in_memory;
    use crate::model::preset::Preset;
    use rusqlite::Connection;

    #[test]
    fn try_new_requires_presets_table() {
        let conn = Connection::open_in_memory().unwrap();
        let err = SqlitePresetRepository::try_new(&conn)
            .err()
            .expect("bare connection must be rejected");
        assert!(matches!(err, RepoError::MissingRequiredTable("presets")));
    }

    #[test]
    fn replace_then_load_keeps_order() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqlitePresetRepository::try_new(&conn).unwrap();
        let presets = vec![
            Preset::new("b", 2, None).unwrap(),
            Preset::new("a", 1, Some("x".to_string())).unwrap(),
        ];

        repo.replace_presets(&presets).unwrap();
        assert_eq!(repo.load_presets().unwrap(), presets);

        repo.replace_presets(&presets[..1]).unwrap();
        assert_eq!(repo.load_presets().unwrap(), presets[..1].to_vec());
    }

    #[test]
    fn empty_title_row_falls_back_to_empty_list() {
        let conn = open_db_in_memory().unwrap();
        conn.execute(
            "INSERT INTO presets (position, title, date_epoch_ms) VALUES (0, '', 0);",
            [],
        )
        .unwrap();
        let repo = SqlitePresetRepository::try_new(&conn).unwrap();

        assert!(matches!(
            repo.load_presets(),
            Err(RepoError::Validation(_))
        ));
        assert!(load_presets_or_empty(&repo).is_empty());
    }
}
