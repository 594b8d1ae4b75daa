// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use log::debug;
use serde_json::Value;
use url::Url;

use crate::{
    backend::{self, Query},
    error::{self, Error, Result},
    storage,
};

use super::{check, session, Supabase};

const RETURN_REPRESENTATION: &str = "return=representation";

impl<S: storage::Storage<session::Data>> Supabase<S> {
    fn table(&self, table: &str) -> Result<Url> {
        self.endpoint(&["rest", "v1", table])
    }

    fn row(&self, table: &str, id: &str) -> Result<Url> {
        let mut url = self.table(table)?;
        let _ = url.query_pairs_mut().append_pair("id", &format!("eq.{id}"));
        Ok(url)
    }
}

/// Applies a query's filters and ordering in PostgREST's syntax.
fn apply(url: &mut Url, query: &Query) {
    let mut pairs = url.query_pairs_mut();
    let _ = pairs.append_pair("select", "*");
    for (column, value) in query.filters() {
        let _ = pairs.append_pair(column, &format!("eq.{value}"));
    }
    if let Some((column, ascending)) = query.order() {
        let direction = if ascending { "asc" } else { "desc" };
        let _ = pairs.append_pair("order", &format!("{column}.{direction}"));
    }
}

/// The first row of a representation, or an error naming the row that was
/// not there.
fn single(table: &str, id: Option<&str>, rows: Vec<Value>) -> Result<Value> {
    rows.into_iter().next().ok_or_else(|| match id {
        Some(id) => Error::RecordNotFound {
            table: table.to_owned(),
            id: id.to_owned(),
        },
        None => error::Backend::UnexpectedResponse(format!(
            "no row was returned from the insert into {table}"
        ))
        .into(),
    })
}

#[async_trait]
impl<S: storage::Storage<session::Data>> backend::Rows for Supabase<S> {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>> {
        let mut url = self.table(table)?;
        apply(&mut url, query);
        debug!("Selecting from {}", url);

        let request = self.authorized(self.http.get(url)).await?;
        Ok(check(request.send().await?).await?.json().await?)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        let request = self
            .authorized(self.http.post(self.table(table)?))
            .await?
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&row);
        let rows = check(request.send().await?).await?.json().await?;
        single(table, None, rows)
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Value> {
        let request = self
            .authorized(self.http.patch(self.row(table, id)?))
            .await?
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&patch);
        let rows = check(request.send().await?).await?.json().await?;
        single(table, Some(id), rows)
    }

    async fn delete(&self, table: &str, id: &str) -> Result<()> {
        let request = self
            .authorized(self.http.delete(self.row(table, id)?))
            .await?
            .header("Prefer", RETURN_REPRESENTATION);
        let rows = check(request.send().await?).await?.json().await?;
        single(table, Some(id), rows).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn query_uses_postgrest_operators() {
        let mut url = Url::parse("https://example.supabase.co/rest/v1/candidates").expect("url");
        apply(
            &mut url,
            &Query::new()
                .eq("status", "new")
                .order_by("created_at", false),
        );

        assert_eq!(
            url.query(),
            Some("select=*&status=eq.new&order=created_at.desc")
        );
    }

    #[test]
    fn empty_representation_names_missing_row() {
        assert!(matches!(
            single("jobs", Some("j-1"), vec![]),
            Err(Error::RecordNotFound { table, id }) if table == "jobs" && id == "j-1"
        ));
        assert!(matches!(
            single("jobs", Some("j-1"), vec![json!({"id": "j-1"})]),
            Ok(row) if row["id"] == "j-1"
        ));
    }
}
