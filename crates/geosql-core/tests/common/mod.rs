//! In-memory host used by the store tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use arrow_schema::DataType;
use geosql_common::{
    CatalogColumn, Connection, ConnectionSource, Row, SqlError, SqlResult, SqlValue,
};
use geosql_core::store::DataStoreHost;
use geosql_core::types::{PrimaryKey, PrimaryKeyColumn, VirtualTable};

/// Shared state of the fake database.
#[derive(Debug, Default)]
pub struct MockState {
    pub tables: Vec<String>,
    pub columns: HashMap<String, Vec<CatalogColumn>>,
    pub keys: HashMap<String, String>,
    /// (table, column) -> (srid, dimension)
    pub geometry_columns: HashMap<(String, String), (i64, i64)>,
    pub relationships: Vec<(String, String)>,
    pub select_rows: Vec<Row>,
    pub executed: Vec<String>,
    pub queries: Vec<String>,
    pub fail_columns: bool,
    pub fail_execute: Option<String>,
    pub borrowed: usize,
    pub released: usize,
    pub closed: usize,
    pub column_listings: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MockHost {
    pub state: Arc<Mutex<MockState>>,
    pub views: Vec<VirtualTable>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, name: &str, key: Option<&str>, columns: Vec<CatalogColumn>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.tables.push(name.to_string());
            state.columns.insert(name.to_string(), columns);
            if let Some(key) = key {
                state.keys.insert(name.to_string(), key.to_string());
            }
        }
        self
    }

    pub fn with_geometry(self, table: &str, column: &str, srid: i64) -> Self {
        self.state
            .lock()
            .unwrap()
            .geometry_columns
            .insert((table.to_string(), column.to_string()), (srid, 2));
        self
    }

    pub fn with_view(mut self, view: VirtualTable, columns: Vec<CatalogColumn>) -> Self {
        self.state
            .lock()
            .unwrap()
            .columns
            .insert(view.name.clone(), columns);
        self.views.push(view);
        self
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

fn quoted(sql: &str, column: &str, value: &str) -> bool {
    sql.contains(&format!("{column} = '{value}'"))
}

fn unescape(pattern: &str) -> String {
    pattern.replace('\\', "")
}

impl Connection for MockConnection {
    fn execute(&mut self, sql: &str) -> SqlResult<()> {
        let mut state = self.state.lock().unwrap();
        state.executed.push(sql.to_string());
        if state
            .fail_execute
            .as_deref()
            .is_some_and(|needle| sql.contains(needle))
        {
            return Err(SqlError::statement("scripted failure", sql));
        }
        if let Some(class) = sql.strip_prefix("CREATE CLASS ") {
            state.tables.push(class.trim().to_string());
        }
        Ok(())
    }

    fn query(&mut self, sql: &str) -> SqlResult<Vec<Row>> {
        let mut state = self.state.lock().unwrap();
        state.queries.push(sql.to_string());

        if sql.contains("FROM geometry_columns") {
            let hit = state.geometry_columns.iter().find(|((t, c), _)| {
                quoted(sql, "f_table_name", t) && quoted(sql, "f_geometry_column", c)
            });
            return Ok(match hit {
                Some((_, (srid, dim))) => {
                    let value = if sql.starts_with("SELECT srid") { *srid } else { *dim };
                    vec![Row::from_pairs([("value", SqlValue::Int(value))])]
                },
                None => Vec::new(),
            });
        }
        if sql.contains("FROM feature_relationships") {
            let hit = state
                .relationships
                .iter()
                .any(|(t, c)| quoted(sql, "table_name", t) && quoted(sql, "column_name", c));
            return Ok(if hit {
                vec![Row::from_pairs([("related_table", SqlValue::Text("owners".into()))])]
            } else {
                Vec::new()
            });
        }
        if sql.contains("last_insert_id()") {
            return Ok(vec![Row::from_pairs([("id", SqlValue::Int(42))])]);
        }
        Ok(state.select_rows.clone())
    }

    fn columns(&mut self, _schema: Option<&str>, table_pattern: &str) -> SqlResult<Vec<CatalogColumn>> {
        let mut state = self.state.lock().unwrap();
        state.column_listings += 1;
        if state.fail_columns {
            return Err(SqlError::Connection("catalog unavailable".into()));
        }
        Ok(state
            .columns
            .get(&unescape(table_pattern))
            .cloned()
            .unwrap_or_default())
    }

    fn tables(
        &mut self,
        _schema: Option<&str>,
        table_pattern: &str,
        _types: &[&str],
    ) -> SqlResult<Vec<String>> {
        let state = self.state.lock().unwrap();
        let name = unescape(table_pattern);
        Ok(state
            .tables
            .iter()
            .filter(|t| table_pattern == "%" || **t == name)
            .cloned()
            .collect())
    }

    fn auto_commit(&self) -> bool {
        false
    }

    fn commit(&mut self) -> SqlResult<()> {
        Ok(())
    }

    fn close(&mut self) -> SqlResult<()> {
        self.state.lock().unwrap().closed += 1;
        Ok(())
    }
}

impl ConnectionSource for MockHost {
    fn get_connection(&self) -> SqlResult<Box<dyn Connection>> {
        self.state.lock().unwrap().borrowed += 1;
        Ok(Box::new(MockConnection {
            state: Arc::clone(&self.state),
        }))
    }

    fn release_connection(&self, _cx: Box<dyn Connection>) {
        self.state.lock().unwrap().released += 1;
    }
}

impl DataStoreHost for MockHost {
    fn primary_key(
        &self,
        _cx: &mut dyn Connection,
        _schema: Option<&str>,
        table: &str,
    ) -> SqlResult<PrimaryKey> {
        let state = self.state.lock().unwrap();
        Ok(match state.keys.get(table) {
            Some(column) => PrimaryKey::new(
                table,
                vec![PrimaryKeyColumn::new(column.clone(), DataType::Int32)],
            ),
            None => PrimaryKey::Null,
        })
    }

    fn virtual_tables(&self) -> &[VirtualTable] {
        &self.views
    }

    fn virtual_table_columns(
        &self,
        _cx: &mut dyn Connection,
        table: &VirtualTable,
    ) -> SqlResult<Vec<CatalogColumn>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .columns
            .get(&table.name)
            .cloned()
            .unwrap_or_default())
    }
}

/// `roads (id INTEGER PK, name STRING NOT NULL, geom OPoint)`.
pub fn roads_columns() -> Vec<CatalogColumn> {
    vec![
        CatalogColumn::new("id", 4, "INTEGER").not_null(),
        CatalogColumn::new("name", 12, "STRING").not_null(),
        CatalogColumn::new("geom", 2001, "EMBEDDED").embedded("OPoint"),
    ]
}

pub fn roads_host(srid: i64) -> MockHost {
    MockHost::new()
        .with_table("roads", Some("id"), roads_columns())
        .with_geometry("roads", "geom", srid)
}
