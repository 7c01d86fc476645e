//! Row filters in the REST gateway's query-string dialect
//!
//! `col=eq.value`, `col=gte.value`, `order=col.desc`, `limit=n`.

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// A table plus the query-string pairs that narrow it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    table: &'static str,
    params: Vec<(String, String)>,
}

impl Query {
    #[must_use]
    pub fn table(table: &'static str) -> Self {
        Self {
            table,
            params: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.table
    }

    #[inline]
    #[must_use]
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    #[must_use]
    pub fn select(self, columns: &str) -> Self {
        self.param("select", columns.to_string())
    }

    #[must_use]
    pub fn eq(self, column: &str, value: impl Display) -> Self {
        self.param(column, format!("eq.{value}"))
    }

    /// `eq` filter only when a value is given
    #[must_use]
    pub fn eq_opt<V: Display>(self, column: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.eq(column, v),
            None => self,
        }
    }

    #[must_use]
    pub fn gte_time(self, column: &str, at: DateTime<Utc>) -> Self {
        let stamp = at.to_rfc3339_opts(SecondsFormat::Micros, true);
        self.param(column, format!("gte.{stamp}"))
    }

    #[must_use]
    pub fn order(self, column: &str, order: Order) -> Self {
        self.param("order", format!("{column}.{}", order.as_str()))
    }

    #[must_use]
    pub fn limit(self, n: usize) -> Self {
        self.param("limit", n.to_string())
    }

    /// Upsert target columns for `POST` with merge-duplicates
    #[must_use]
    pub fn on_conflict(self, columns: &str) -> Self {
        self.param("on_conflict", columns.to_string())
    }

    fn param(mut self, key: &str, value: String) -> Self {
        self.params.push((key.to_string(), value));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn pairs(q: &Query) -> Vec<(&str, &str)> {
        q.params()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    #[test]
    fn recent_allocation_lookup() {
        let since = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let q = Query::table("allocations")
            .select("id")
            .eq("beneficiary_id", "b-1")
            .gte_time("created_at", since)
            .limit(1);

        assert_eq!(q.name(), "allocations");
        assert_eq!(
            pairs(&q),
            vec![
                ("select", "id"),
                ("beneficiary_id", "eq.b-1"),
                ("created_at", "gte.2026-03-02T09:00:00.000000Z"),
                ("limit", "1"),
            ]
        );
    }

    #[test]
    fn optional_filter_is_skipped() {
        let q = Query::table("fraud_alerts")
            .eq_opt::<&str>("beneficiary_id", None)
            .order("created_at", Order::Desc);
        assert_eq!(pairs(&q), vec![("order", "created_at.desc")]);
    }
}
