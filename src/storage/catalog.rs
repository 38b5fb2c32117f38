use super::Table;
use crate::core::{Column, MigrationError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Everything a store holds: tables plus the key-value slots.
///
/// Cloning is cheap: tables sit behind `Arc` and are copied only when a
/// transaction first writes to them (Copy-on-Write).
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tables: BTreeMap<String, Arc<Table>>,
    values: BTreeMap<String, String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(tables: Vec<Table>, values: BTreeMap<String, String>) -> Self {
        Self {
            tables: tables
                .into_iter()
                .map(|table| (table.name().to_string(), Arc::new(table)))
                .collect(),
            values,
        }
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name).map(|table| table.as_ref())
    }

    pub fn require_table(&self, name: &str) -> Result<&Table> {
        self.table(name)
            .ok_or_else(|| MigrationError::TableNotFound(name.to_string()))
    }

    pub fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(name)
            .map(Arc::make_mut)
            .ok_or_else(|| MigrationError::TableNotFound(name.to_string()))
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values().map(|table| table.as_ref())
    }

    pub fn create_table(&mut self, name: &str, columns: Vec<Column>) -> Result<()> {
        if self.tables.contains_key(name) {
            return Err(MigrationError::TableExists(name.to_string()));
        }
        self.tables
            .insert(name.to_string(), Arc::new(Table::new(name, columns)));
        Ok(())
    }

    pub fn drop_table(&mut self, name: &str) -> Result<Table> {
        self.tables
            .remove(name)
            .map(Arc::unwrap_or_clone)
            .ok_or_else(|| MigrationError::TableNotFound(name.to_string()))
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    pub fn put_value(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove_value(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }
}
