use crate::core::{Column, MigrationError, Result, Row, Schema, Value};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    name: String,
    schema: Schema,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            schema: Schema::new(columns),
            rows: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.schema.find_column_index(name).is_some()
    }

    pub fn insert(&mut self, row: Row) -> Result<()> {
        self.schema.validate_row(&row)?;
        self.rows.push(row);
        Ok(())
    }

    /// Appends a column, filling existing rows with its default (or NULL).
    pub fn add_column(&mut self, column: Column) -> Result<()> {
        if self.has_column(&column.name) {
            return Err(MigrationError::ColumnExists(column.name, self.name.clone()));
        }

        let fill = column.fill_value();
        if !self.rows.is_empty() {
            column.validate(&fill).map_err(|_| {
                MigrationError::ConstraintViolation(format!(
                    "Cannot add NOT NULL column '{}' without a default to non-empty table '{}'",
                    column.name, self.name
                ))
            })?;
        }

        for row in &mut self.rows {
            row.push(fill.clone());
        }
        self.schema.push_column(column);
        Ok(())
    }

    pub fn drop_column(&mut self, name: &str) -> Result<Column> {
        let index = self
            .schema
            .find_column_index(name)
            .ok_or_else(|| MigrationError::ColumnNotFound(name.to_string(), self.name.clone()))?;

        for row in &mut self.rows {
            row.remove(index);
        }
        Ok(self.schema.remove_column(index))
    }

    /// Rewrites `column` in every row for which `f` returns a new value.
    ///
    /// Validation happens before any row is touched, so a rejected value
    /// leaves the table unchanged.
    pub fn update_column<F>(&mut self, column: &str, mut f: F) -> Result<usize>
    where
        F: FnMut(&Row) -> Option<Value>,
    {
        let index = self
            .schema
            .find_column_index(column)
            .ok_or_else(|| MigrationError::ColumnNotFound(column.to_string(), self.name.clone()))?;
        let definition = &self.schema.columns()[index];

        let mut updates = Vec::new();
        for (row_index, row) in self.rows.iter().enumerate() {
            if let Some(value) = f(row) {
                definition.validate(&value)?;
                updates.push((row_index, value));
            }
        }

        let count = updates.len();
        for (row_index, value) in updates {
            self.rows[row_index][index] = value;
        }
        Ok(count)
    }

    pub fn delete_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&Row) -> bool,
    {
        let before = self.rows.len();
        self.rows.retain(|row| !predicate(row));
        before - self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DataType;

    fn users() -> Table {
        let mut table = Table::new(
            "users",
            vec![
                Column::new("id", DataType::Integer).not_null(),
                Column::new("name", DataType::Text),
            ],
        );
        table
            .insert(vec![Value::Integer(1), Value::from("Alice")])
            .unwrap();
        table
            .insert(vec![Value::Integer(2), Value::from("Bob")])
            .unwrap();
        table
    }

    #[test]
    fn test_add_column_fills_default() {
        let mut table = users();
        table
            .add_column(Column::new("active", DataType::Boolean).with_default(true))
            .unwrap();
        assert!(table.has_column("active"));
        assert!(table.rows().iter().all(|row| row[2] == Value::Boolean(true)));
    }

    #[test]
    fn test_add_not_null_column_without_default_rejected() {
        let mut table = users();
        let err = table
            .add_column(Column::new("email", DataType::Text).not_null())
            .unwrap_err();
        assert!(matches!(err, MigrationError::ConstraintViolation(_)));
        assert_eq!(table.schema().column_count(), 2);
    }

    #[test]
    fn test_update_column_is_all_or_nothing() {
        let mut table = users();
        let err = table
            .update_column("id", |row| {
                if row[1] == Value::from("Bob") {
                    Some(Value::Null)
                } else {
                    Some(Value::Integer(10))
                }
            })
            .unwrap_err();
        assert!(matches!(err, MigrationError::ConstraintViolation(_)));
        assert_eq!(table.rows()[0][0], Value::Integer(1));

        let updated = table
            .update_column("name", |row| {
                row[1].as_str().map(|name| Value::from(name.to_uppercase()))
            })
            .unwrap();
        assert_eq!(updated, 2);
        assert_eq!(table.rows()[1][1], Value::from("BOB"));
    }

    #[test]
    fn test_drop_column_and_delete() {
        let mut table = users();
        table.drop_column("name").unwrap();
        assert_eq!(table.rows()[0].len(), 1);
        assert!(table.drop_column("name").is_err());

        let removed = table.delete_where(|row| row[0] == Value::Integer(1));
        assert_eq!(removed, 1);
        assert_eq!(table.row_count(), 1);
    }
}
