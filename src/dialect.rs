use std::borrow::Cow;

use crate::config::DriverKind;
use crate::translation::{PlaceholderStyle, render_placeholders};
use crate::types::SqlType;

/// Backend-specific SQL rendering rules.
///
/// Selected once when the pool is built and shared freely afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// Backtick identifiers, `AUTO_INCREMENT`, `?` placeholders, `LAST_INSERT_ID()`.
    MySql,
    /// Double-quoted identifiers, identity columns, `$N` placeholders, `RETURNING`.
    Postgres,
}

impl From<DriverKind> for Dialect {
    fn from(kind: DriverKind) -> Self {
        match kind {
            DriverKind::MySql => Dialect::MySql,
            DriverKind::Postgres => Dialect::Postgres,
        }
    }
}

impl Dialect {
    /// Quote an identifier, doubling any embedded quote character.
    #[must_use]
    pub fn quote_identifier(self, ident: &str) -> String {
        let quote = match self {
            Dialect::MySql => '`',
            Dialect::Postgres => '"',
        };
        let mut out = String::with_capacity(ident.len() + 2);
        out.push(quote);
        for ch in ident.chars() {
            if ch == quote {
                out.push(quote);
            }
            out.push(ch);
        }
        out.push(quote);
        out
    }

    /// Column modifier that replaces the `AUTO_INCREMENT` constraint token.
    #[must_use]
    pub fn auto_increment_modifier(self) -> &'static str {
        match self {
            Dialect::MySql => "AUTO_INCREMENT",
            Dialect::Postgres => "GENERATED BY DEFAULT AS IDENTITY",
        }
    }

    /// Whether an INSERT can hand back the generated id in its own result.
    #[must_use]
    pub fn supports_returning_id(self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// Suffix appended to an INSERT to return the generated key column.
    #[must_use]
    pub fn returning_id_sql(self, key_column: &str) -> Option<String> {
        match self {
            Dialect::MySql => None,
            Dialect::Postgres => Some(format!("RETURNING {}", self.quote_identifier(key_column))),
        }
    }

    /// Follow-up query, run on the same connection, that reads the last generated id.
    #[must_use]
    pub fn last_insert_id_query(self) -> Option<&'static str> {
        match self {
            Dialect::MySql => Some("SELECT LAST_INSERT_ID()"),
            Dialect::Postgres => None,
        }
    }

    /// Render table-level options for CREATE TABLE.
    ///
    /// MySQL storage options (`ENGINE=...`, `CHARSET=...`) mean nothing to `PostgreSQL`,
    /// so that dialect renders none.
    #[must_use]
    pub fn table_options(self, options: &str) -> String {
        match self {
            Dialect::MySql => options.trim().to_string(),
            Dialect::Postgres => String::new(),
        }
    }

    /// Default DDL type for a field without an explicit override.
    #[must_use]
    pub fn sql_type(self, ty: SqlType) -> &'static str {
        match (self, ty) {
            (Dialect::MySql, SqlType::Int) => "INT",
            (Dialect::MySql, SqlType::BigInt) => "BIGINT",
            (Dialect::MySql, SqlType::UnsignedInt) => "INT UNSIGNED",
            (Dialect::MySql, SqlType::UnsignedBigInt) => "BIGINT UNSIGNED",
            (Dialect::MySql, SqlType::Text) => "VARCHAR(255)",
            (Dialect::MySql, SqlType::Boolean) => "TINYINT(1)",
            (Dialect::MySql, SqlType::Double) => "DOUBLE",
            (Dialect::Postgres, SqlType::Int) => "INTEGER",
            (Dialect::Postgres, SqlType::BigInt | SqlType::UnsignedInt) => "BIGINT",
            // stored signed; see SqlValue::U64
            (Dialect::Postgres, SqlType::UnsignedBigInt) => "BIGINT",
            (Dialect::Postgres, SqlType::Text) => "VARCHAR(255)",
            (Dialect::Postgres, SqlType::Boolean) => "BOOLEAN",
            (Dialect::Postgres, SqlType::Double) => "DOUBLE PRECISION",
        }
    }

    #[must_use]
    pub fn placeholder_style(self) -> PlaceholderStyle {
        match self {
            Dialect::MySql => PlaceholderStyle::Question,
            Dialect::Postgres => PlaceholderStyle::Dollar,
        }
    }

    /// Rewrite `?` markers into the driver-native positional form.
    #[must_use]
    pub fn render_placeholders(self, sql: &str) -> Cow<'_, str> {
        render_placeholders(sql, self.placeholder_style())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_per_dialect() {
        assert_eq!(Dialect::MySql.quote_identifier("products"), "`products`");
        assert_eq!(Dialect::Postgres.quote_identifier("products"), "\"products\"");
        assert_eq!(Dialect::MySql.quote_identifier("we`ird"), "`we``ird`");
    }

    #[test]
    fn returning_only_on_postgres() {
        assert!(!Dialect::MySql.supports_returning_id());
        assert_eq!(Dialect::MySql.returning_id_sql("id"), None);
        assert_eq!(
            Dialect::Postgres.returning_id_sql("id").as_deref(),
            Some("RETURNING \"id\"")
        );
    }

    #[test]
    fn postgres_drops_mysql_table_options() {
        let opts = "ENGINE=InnoDB DEFAULT CHARSET=utf8mb4";
        assert_eq!(Dialect::MySql.table_options(opts), opts);
        assert_eq!(Dialect::Postgres.table_options(opts), "");
    }

    #[test]
    fn placeholders_follow_dialect() {
        let sql = "SELECT * FROM t WHERE a = ? AND b = ?";
        assert_eq!(Dialect::MySql.render_placeholders(sql), sql);
        assert_eq!(
            Dialect::Postgres.render_placeholders(sql),
            "SELECT * FROM t WHERE a = $1 AND b = $2"
        );
    }
}
