//! Query builder utilities for filtered, ordered, paginated listings.

use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::{QueryAs, QueryScalar};
use sqlx::{Postgres, QueryBuilder};

/// Escape `%`, `_` and `\` so user input matches literally inside a LIKE pattern.
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Substring pattern for ILIKE with the user text escaped.
pub fn contains_pattern(term: &str) -> String {
    format!("%{}%", escape_like(term))
}

/// Paginated query builder
///
/// Example usage:
/// ```rust,ignore
/// let mut query = PaginatedQuery::new("SELECT ... FROM prescriptions p WHERE 1=1");
/// query
///     .add_base_filter("p.pharmacy_id", pharmacy_id)
///     .filter_ilike(&["d.name"], Some("ibu"))
///     .order_by("p.created_at", "DESC")
///     .limit_offset(20, 0);
///
/// let rows: Vec<PrescriptionSummary> = query.build_query_as().fetch_all(&pool).await?;
/// ```
pub struct PaginatedQuery<'a> {
    query: QueryBuilder<'a, Postgres>,
}

impl<'a> PaginatedQuery<'a> {
    /// Base query must already contain a WHERE clause; filters append with AND.
    pub fn new(base_query: &'static str) -> Self {
        Self {
            query: QueryBuilder::new(base_query),
        }
    }

    /// Add a required equality filter
    pub fn add_base_filter<T>(&mut self, column: &str, value: T) -> &mut Self
    where
        T: for<'q> sqlx::Encode<'q, Postgres> + sqlx::Type<Postgres> + Send + 'a,
    {
        self.query.push(format!(" AND {} = ", column));
        self.query.push_bind(value);
        self
    }

    /// Case-insensitive substring match against any of the given columns
    pub fn filter_ilike(&mut self, columns: &[&str], term: Option<&str>) -> &mut Self {
        let Some(term) = term else {
            return self;
        };
        if columns.is_empty() {
            return self;
        }
        let pattern = contains_pattern(term);
        self.query.push(" AND (");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                self.query.push(" OR ");
            }
            self.query.push(format!("{} ILIKE ", column));
            self.query.push_bind(pattern.clone());
            self.query.push(" ESCAPE '\\'");
        }
        self.query.push(")");
        self
    }

    /// Add ORDER BY clause
    pub fn order_by(&mut self, column: &str, direction: &str) -> &mut Self {
        self.query.push(format!(" ORDER BY {} {}", column, direction));
        self
    }

    /// Append a further ordering column after `order_by`
    pub fn then_by(&mut self, column: &str, direction: &str) -> &mut Self {
        self.query.push(format!(", {} {}", column, direction));
        self
    }

    pub fn limit_offset(&mut self, limit: i64, offset: i64) -> &mut Self {
        self.query.push(" LIMIT ");
        self.query.push_bind(limit);
        self.query.push(" OFFSET ");
        self.query.push_bind(offset);
        self
    }

    /// Build the final query as a typed query for fetching specific types
    pub fn build_query_as<T>(&mut self) -> QueryAs<'_, Postgres, T, PgArguments>
    where
        T: for<'r> sqlx::FromRow<'r, PgRow>,
    {
        self.query.build_query_as()
    }

    pub fn build_query_scalar<T>(&mut self) -> QueryScalar<'_, Postgres, T, PgArguments>
    where
        T: sqlx::Type<Postgres> + for<'r> sqlx::Decode<'r, Postgres>,
        (T,): for<'r> sqlx::FromRow<'r, PgRow>,
    {
        self.query.build_query_scalar()
    }

    /// SQL text built so far
    pub fn sql(&self) -> &str {
        self.query.sql()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_like_neutralizes_wildcards() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn contains_pattern_wraps_term() {
        assert_eq!(contains_pattern("ibu"), "%ibu%");
    }

    #[test]
    fn base_filter_appends_bound_parameter() {
        let mut query = PaginatedQuery::new("SELECT * FROM prescriptions p WHERE 1=1");
        query.add_base_filter("p.pharmacy_id", 7_i64);
        assert_eq!(
            query.sql(),
            "SELECT * FROM prescriptions p WHERE 1=1 AND p.pharmacy_id = $1"
        );
    }

    #[test]
    fn filter_ilike_ors_every_column() {
        let mut query = PaginatedQuery::new("SELECT * FROM t WHERE 1=1");
        query.filter_ilike(&["a", "b"], Some("x"));
        assert_eq!(
            query.sql(),
            "SELECT * FROM t WHERE 1=1 AND (a ILIKE $1 ESCAPE '\\' OR b ILIKE $2 ESCAPE '\\')"
        );
    }

    #[test]
    fn ordering_and_pagination_chain() {
        let mut query = PaginatedQuery::new("SELECT * FROM t WHERE 1=1");
        query
            .add_base_filter("pharmacy_id", 1_i64)
            .order_by("created_at", "DESC")
            .then_by("id", "DESC")
            .limit_offset(20, 40);
        assert_eq!(
            query.sql(),
            "SELECT * FROM t WHERE 1=1 AND pharmacy_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        );
    }
}
