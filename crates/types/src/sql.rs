//! SQL statement classification

use serde::{Deserialize, Serialize};
use std::fmt;

/// Statement category of a logical operation.
///
/// Carried on every execution event so observers can tell queries from
/// updates without re-parsing the SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlType {
    /// Data query (`SELECT`, `WITH`)
    Dql,
    /// Data manipulation (`INSERT`, `UPDATE`, `DELETE`, `REPLACE`)
    Dml,
    /// Data definition (`CREATE`, `ALTER`, `DROP`, `TRUNCATE`)
    Ddl,
    /// Data control (`GRANT`, `REVOKE`)
    Dcl,
    /// Database administration (`SHOW`, `DESCRIBE`, `USE`, `SET`)
    Dal,
    /// Transaction control (`BEGIN`, `COMMIT`, `ROLLBACK`, `SAVEPOINT`)
    Tcl,
}

impl SqlType {
    /// Classify a statement by its leading keyword.
    ///
    /// Returns `None` when the keyword is not recognised. This is a cheap
    /// heuristic for callers that have no parsed statement at hand.
    #[must_use]
    pub fn classify(sql: &str) -> Option<Self> {
        let keyword = sql
            .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
            .split(|c: char| !c.is_ascii_alphabetic())
            .next()?
            .to_ascii_uppercase();

        match keyword.as_str() {
            "SELECT" | "WITH" => Some(Self::Dql),
            "INSERT" | "UPDATE" | "DELETE" | "REPLACE" => Some(Self::Dml),
            "CREATE" | "ALTER" | "DROP" | "TRUNCATE" => Some(Self::Ddl),
            "GRANT" | "REVOKE" => Some(Self::Dcl),
            "SHOW" | "DESC" | "DESCRIBE" | "USE" | "SET" | "EXPLAIN" => Some(Self::Dal),
            "BEGIN" | "START" | "COMMIT" | "ROLLBACK" | "SAVEPOINT" => Some(Self::Tcl),
            _ => None,
        }
    }

    /// Whether statements of this type produce a result set.
    #[must_use]
    pub fn returns_rows(self) -> bool {
        matches!(self, Self::Dql | Self::Dal)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dql => "dql",
            Self::Dml => "dml",
            Self::Ddl => "ddl",
            Self::Dcl => "dcl",
            Self::Dal => "dal",
            Self::Tcl => "tcl",
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Implement clap::ValueEnum for SqlType
impl clap::ValueEnum for SqlType {
    fn value_variants<'a>() -> &'a [Self] {
        &[
            Self::Dql,
            Self::Dml,
            Self::Ddl,
            Self::Dcl,
            Self::Dal,
            Self::Tcl,
        ]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn classifies_leading_keyword() {
        assert_eq!(SqlType::classify("SELECT * FROM t_order"), Some(SqlType::Dql));
        assert_eq!(SqlType::classify("  insert into t VALUES (?)"), Some(SqlType::Dml));
        assert_eq!(SqlType::classify("(select 1)"), Some(SqlType::Dql));
        assert_eq!(SqlType::classify("drop table t"), Some(SqlType::Ddl));
        assert_eq!(SqlType::classify("COMMIT;"), Some(SqlType::Tcl));
        assert_eq!(SqlType::classify("VACUUM"), None);
        assert_eq!(SqlType::classify(""), None);
    }

    #[test]
    fn only_queries_return_rows() {
        assert!(SqlType::Dql.returns_rows());
        assert!(!SqlType::Dml.returns_rows());
    }

    proptest! {
        #[test]
        fn select_is_dql_regardless_of_case_and_padding(
            padding in "[ \t\n]{0,4}",
            upper in proptest::collection::vec(any::<bool>(), 6),
            tail in "[ a-z0-9_*,]{0,24}",
        ) {
            let keyword: String = "select"
                .chars()
                .zip(upper)
                .map(|(c, up)| if up { c.to_ascii_uppercase() } else { c })
                .collect();
            let sql = format!("{padding}{keyword} {tail}");
            prop_assert_eq!(SqlType::classify(&sql), Some(SqlType::Dql));
        }
    }
}
