use rusqlite::types::Value;

/// Minimal SELECT builder for queries with optional filters.
pub struct Select {
    fields: Vec<&'static str>,
    table: &'static str,

    wheres: Vec<String>,
    order_by: Vec<&'static str>,

    values: Vec<Value>,
}

impl Select {
    pub fn new(fields: Vec<&'static str>, table: &'static str) -> Self {
        Self {
            fields,
            table,
            wheres: Vec::new(),
            order_by: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn add_where(&mut self, s: impl ToString, value: Value) {
        self.wheres.push(s.to_string());
        self.values.push(value);
    }

    pub fn add_order_by(&mut self, s: &'static str) {
        self.order_by.push(s);
    }

    pub fn build(self) -> (String, Vec<Value>) {
        let mut sql = format!("SELECT {} FROM {}", self.fields.join(", "), self.table);

        if !self.wheres.is_empty() {
            let where_clause = self.wheres.join(" AND ");
            sql.push_str(&format!(" WHERE {where_clause}"));
        }

        if !self.order_by.is_empty() {
            let order_by = self.order_by.join(", ");
            sql.push_str(&format!(" ORDER BY {order_by}"));
        }

        (sql, self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select() {
        let select = Select::new(vec!["id", "scopes"], "app_grant");
        let (sql, values) = select.build();
        assert_eq!(sql, "SELECT id, scopes FROM app_grant");
        assert!(values.is_empty());

        let mut select = Select::new(vec!["id"], "app_grant");
        select.add_where("application = ?", Value::Text("a".to_string()));
        select.add_where("component = ?", Value::Text("zrc".to_string()));
        select.add_order_by("id");
        let (sql, values) = select.build();
        assert_eq!(
            sql,
            "SELECT id FROM app_grant WHERE application = ? AND component = ? ORDER BY id"
        );
        assert_eq!(values.len(), 2);
    }
}
