use crate::database::filters::SortDirection;

/// One positional bind value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Int(i64),
}

/// Built statement; `params[n]` binds to placeholder `$n+1`
#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<SqlParam>,
}

/// Builds a paged listing `SELECT`. Placeholders are numbered as values are
/// pushed, so a clause and its bind value can never drift apart.
#[derive(Debug)]
pub struct ListQueryBuilder {
    table: &'static str,
    columns: &'static [&'static str],
    conditions: Vec<String>,
    order: Option<(&'static str, SortDirection)>,
    page: Option<(i64, i64)>,
    params: Vec<SqlParam>,
}

impl ListQueryBuilder {
    pub fn new(table: &'static str, columns: &'static [&'static str]) -> Self {
        Self {
            table,
            columns,
            conditions: Vec::new(),
            order: None,
            page: None,
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        format!("${}", self.params.len())
    }

    /// Full-text match on `column`; an empty `value` adds nothing
    pub fn text_filter(mut self, column: &'static str, value: &str) -> Self {
        if value.trim().is_empty() {
            return self;
        }
        let placeholder = self.push_param(SqlParam::Text(value.to_string()));
        self.conditions.push(format!(
            "to_tsvector('simple', {}) @@ plainto_tsquery('simple', {})",
            column, placeholder
        ));
        self
    }

    /// `column` must come from a safelist
    pub fn order_by(mut self, column: &'static str, direction: SortDirection) -> Self {
        self.order = Some((column, direction));
        self
    }

    pub fn paginate(mut self, limit: i64, offset: i64) -> Self {
        self.page = Some((limit, offset));
        self
    }

    pub fn build(mut self) -> SqlResult {
        let mut query = format!(
            "SELECT count(*) OVER() AS total, {} FROM {}",
            self.columns.join(", "),
            self.table
        );

        if !self.conditions.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&self.conditions.join(" AND "));
        }

        let (column, direction) = self.order.unwrap_or(("id", SortDirection::Asc));
        query.push_str(&format!(" ORDER BY {} {}", column, direction.as_sql()));
        if column != "id" {
            query.push_str(", id ASC");
        }

        if let Some((limit, offset)) = self.page {
            let limit = self.push_param(SqlParam::Int(limit));
            let offset = self.push_param(SqlParam::Int(offset));
            query.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
        }

        SqlResult {
            query,
            params: self.params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLUMNS: &[&str] = &["id", "created_by", "assigned_to", "priority", "status"];

    fn placeholder_for(sql: &SqlResult, column: &str) -> usize {
        let needle = format!("to_tsvector('simple', {}) @@ plainto_tsquery('simple', $", column);
        let start = sql.query.find(&needle).expect("column filter missing") + needle.len();
        let digits: String = sql.query[start..].chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().unwrap()
    }

    #[test]
    fn test_filter_values_bind_to_their_own_columns() {
        let sql = ListQueryBuilder::new("coltech_items", COLUMNS)
            .text_filter("created_by", "dana")
            .text_filter("assigned_to", "lee")
            .text_filter("priority", "high")
            .text_filter("status", "open")
            .build();

        for (column, value) in [
            ("created_by", "dana"),
            ("assigned_to", "lee"),
            ("priority", "high"),
            ("status", "open"),
        ] {
            let n = placeholder_for(&sql, column);
            assert_eq!(
                sql.params[n - 1],
                SqlParam::Text(value.to_string()),
                "{} bound to the wrong value",
                column
            );
        }
    }

    #[test]
    fn test_priority_and_status_alone() {
        let sql = ListQueryBuilder::new("coltech_items", COLUMNS)
            .text_filter("created_by", "")
            .text_filter("assigned_to", "  ")
            .text_filter("priority", "high")
            .text_filter("status", "closed")
            .build();

        assert_eq!(placeholder_for(&sql, "priority"), 1);
        assert_eq!(placeholder_for(&sql, "status"), 2);
        assert_eq!(sql.params.len(), 2);
        assert!(!sql.query.contains("created_by) @@"));
    }

    #[test]
    fn test_order_and_pagination_placeholders_follow_filters() {
        let sql = ListQueryBuilder::new("coltech_items", COLUMNS)
            .text_filter("status", "open")
            .order_by("priority", SortDirection::Desc)
            .paginate(20, 40)
            .build();

        assert!(sql.query.contains("ORDER BY priority DESC, id ASC"));
        assert!(sql.query.ends_with("LIMIT $2 OFFSET $3"));
        assert_eq!(sql.params[1], SqlParam::Int(20));
        assert_eq!(sql.params[2], SqlParam::Int(40));
    }

    #[test]
    fn test_no_filters() {
        let sql = ListQueryBuilder::new("coltech_items", COLUMNS).build();
        assert!(!sql.query.contains("WHERE"));
        assert!(sql.query.starts_with("SELECT count(*) OVER() AS total, id, created_by"));
        assert!(sql.query.ends_with("ORDER BY id ASC"));
    }
}
