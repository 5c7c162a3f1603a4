//! Store trait and SQLite implementation.
//!
//! Statements are assembled from field maps with positional parameters, so
//! callers never concatenate values into SQL. Text values are
//! backslash-escaped on the way in (see [`super::value::escape_text`]);
//! match values get the same treatment so lookups stay consistent with what
//! was written.

use std::path::{Path, PathBuf};

use rusqlite::{params_from_iter, Connection};

use super::error::StoreError;
use super::schema;
use super::value::{escape_fields, FieldMap, Row, SqlValue};

/// Trait for database store operations.
pub trait Store {
    /// Insert one row into a table.
    fn insert(&self, table: &str, values: &FieldMap) -> Result<(), StoreError>;

    /// Update at most one row matching the given keys.
    fn update(
        &self,
        table: &str,
        match_keys: &FieldMap,
        update_values: &FieldMap,
    ) -> Result<(), StoreError>;

    /// Select all columns of rows matching the given keys.
    fn select(
        &self,
        table: &str,
        match_keys: &FieldMap,
        limit: Option<u32>,
    ) -> Result<Vec<Row>, StoreError>;

    /// Delete at most one row matching the given keys.
    fn delete(&self, table: &str, match_keys: &FieldMap) -> Result<(), StoreError>;

    /// Clear all rows of a table if it exists. Returns false if it does not.
    fn reset_table(&self, table: &str) -> Result<bool, StoreError>;

    /// Check whether a table exists under the configured prefix.
    fn check_table_exists(&self, table: &str) -> Result<bool, StoreError>;

    /// Atomically clear and repopulate a group of tables. Either every
    /// table in the group reflects the new rows or none do.
    fn replace_all(&self, groups: &[(&str, Vec<FieldMap>)]) -> Result<(), StoreError>;
}

/// SQLite implementation of the store.
pub struct SqliteStore {
    conn: Connection,
    /// Prepended to every table name, for sharing a database.
    prefix: String,
    /// Path to the database file (for error messages).
    path: PathBuf,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open or create a database at the given path and ensure the table set
    /// exists.
    pub fn open(path: &Path, prefix: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Open {
            path: path.to_path_buf(),
            source: e,
        })?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(StoreError::Migration)?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(StoreError::Migration)?;

        schema::migrate(&conn, prefix)?;

        Ok(Self {
            conn,
            prefix: prefix.to_string(),
            path: path.to_path_buf(),
        })
    }

    /// Open an in-memory database (for testing).
    #[cfg(test)]
    pub fn open_in_memory(prefix: &str) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Open {
            path: PathBuf::from(":memory:"),
            source: e,
        })?;
        schema::migrate(&conn, prefix)?;
        Ok(Self {
            conn,
            prefix: prefix.to_string(),
            path: PathBuf::from(":memory:"),
        })
    }

    /// Drop and re-create every table. Destroys data.
    pub fn rebuild(&self) -> Result<(), StoreError> {
        schema::rebuild(&self.conn, &self.prefix)
    }

    fn table(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// Build `col1 = ?k AND col2 = ?k+1 ...` starting at parameter `start`.
    fn where_clause(match_keys: &FieldMap, start: usize) -> String {
        match_keys
            .keys()
            .enumerate()
            .map(|(i, col)| format!("{} = ?{}", col, start + i))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    fn insert_row(&self, table: &str, values: &FieldMap) -> Result<(), StoreError> {
        if values.is_empty() {
            return Err(StoreError::EmptyFields(table.to_string()));
        }
        let values = escape_fields(values);
        let columns: Vec<&str> = values.keys().map(String::as_str).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table(table),
            columns.join(", "),
            placeholders.join(", ")
        );
        self.conn
            .execute(&sql, params_from_iter(values.values()))
            .map_err(StoreError::query)?;
        Ok(())
    }
}

impl Store for SqliteStore {
    fn insert(&self, table: &str, values: &FieldMap) -> Result<(), StoreError> {
        self.insert_row(table, values)
    }

    fn update(
        &self,
        table: &str,
        match_keys: &FieldMap,
        update_values: &FieldMap,
    ) -> Result<(), StoreError> {
        if match_keys.is_empty() || update_values.is_empty() {
            return Err(StoreError::EmptyFields(table.to_string()));
        }
        let update_values = escape_fields(update_values);
        let match_keys = escape_fields(match_keys);
        let table = self.table(table);

        let set_clause: Vec<String> = update_values
            .keys()
            .enumerate()
            .map(|(i, col)| format!("{} = ?{}", col, i + 1))
            .collect();
        // LIMIT on UPDATE is not available in stock SQLite; bound the change
        // to one row through a rowid subselect instead.
        let sql = format!(
            "UPDATE {table} SET {set} WHERE rowid IN \
             (SELECT rowid FROM {table} WHERE {matches} LIMIT 1)",
            table = table,
            set = set_clause.join(", "),
            matches = Self::where_clause(&match_keys, update_values.len() + 1),
        );
        let params: Vec<&SqlValue> = update_values.values().chain(match_keys.values()).collect();
        self.conn
            .execute(&sql, params_from_iter(params))
            .map_err(StoreError::query)?;
        Ok(())
    }

    fn select(
        &self,
        table: &str,
        match_keys: &FieldMap,
        limit: Option<u32>,
    ) -> Result<Vec<Row>, StoreError> {
        if match_keys.is_empty() {
            return Err(StoreError::EmptyFields(table.to_string()));
        }
        let match_keys = escape_fields(match_keys);
        let mut sql = format!(
            "SELECT * FROM {} WHERE {}",
            self.table(table),
            Self::where_clause(&match_keys, 1),
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = self.conn.prepare(&sql).map_err(StoreError::query)?;
        let column_names: Vec<String> =
            stmt.column_names().iter().map(|s| s.to_string()).collect();
        let mut rows = stmt
            .query(params_from_iter(match_keys.values()))
            .map_err(StoreError::query)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().map_err(StoreError::query)? {
            let mut record = Row::new();
            for (i, name) in column_names.iter().enumerate() {
                let value: rusqlite::types::Value = row.get(i).map_err(StoreError::query)?;
                record.insert(name.clone(), SqlValue::from(value));
            }
            results.push(record);
        }
        Ok(results)
    }

    fn delete(&self, table: &str, match_keys: &FieldMap) -> Result<(), StoreError> {
        if match_keys.is_empty() {
            return Err(StoreError::EmptyFields(table.to_string()));
        }
        let match_keys = escape_fields(match_keys);
        let table = self.table(table);
        let sql = format!(
            "DELETE FROM {table} WHERE rowid IN \
             (SELECT rowid FROM {table} WHERE {matches} LIMIT 1)",
            table = table,
            matches = Self::where_clause(&match_keys, 1),
        );
        self.conn
            .execute(&sql, params_from_iter(match_keys.values()))
            .map_err(StoreError::query)?;
        Ok(())
    }

    fn reset_table(&self, table: &str) -> Result<bool, StoreError> {
        if !self.check_table_exists(table)? {
            return Ok(false);
        }
        self.conn
            .execute(&format!("DELETE FROM {}", self.table(table)), [])
            .map_err(StoreError::query)?;
        Ok(true)
    }

    fn check_table_exists(&self, table: &str) -> Result<bool, StoreError> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [self.table(table)],
                |row| row.get(0),
            )
            .map_err(StoreError::query)?;
        Ok(count > 0)
    }

    fn replace_all(&self, groups: &[(&str, Vec<FieldMap>)]) -> Result<(), StoreError> {
        self.conn
            .execute("BEGIN TRANSACTION", [])
            .map_err(StoreError::query)?;

        let result = (|| {
            for (table, rows) in groups {
                self.conn
                    .execute(&format!("DELETE FROM {}", self.table(table)), [])
                    .map_err(StoreError::query)?;
                for row in rows {
                    self.insert_row(table, row)?;
                }
            }
            Ok(())
        })();

        match result {
            Ok(()) => {
                self.conn
                    .execute("COMMIT", [])
                    .map_err(StoreError::query)?;
                Ok(())
            }
            Err(e) => {
                let _ = self.conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }
}
