// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

//! Local copies of backend tables.
//!
//! A [`RemoteCollection`] is never authoritative: it loads what the backend
//! has, applies field changes optimistically and puts them back if the
//! backend refuses, and only adds or removes records once the backend has
//! confirmed it.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use chrono::Utc;
use log::{debug, warn};
use serde_json::{json, Map, Value};

use crate::{
    backend::{ChangeEvent, Query, Rows, Subscription},
    error::{Error, Result, Validation},
    model::{Draft as _, Entity},
};

/// Shared flag saying whether anyone still wants the results of a load.
#[derive(Clone, Debug)]
pub(crate) struct Liveness(Arc<AtomicBool>);

impl Liveness {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    /// Marks the collection as gone. Loads that finish afterwards throw
    /// their results away.
    pub(crate) fn tear_down(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub(crate) struct RemoteCollection<E: Entity, R: Rows> {
    rows: Arc<R>,
    items: Vec<E>,
    query: Query,
    liveness: Liveness,
}

impl<E: Entity, R: Rows> RemoteCollection<E, R> {
    pub(crate) fn new(rows: Arc<R>) -> Self {
        Self {
            rows,
            items: Vec::new(),
            query: Query::new(),
            liveness: Liveness::new(),
        }
    }

    pub(crate) fn items(&self) -> &[E] {
        &self.items
    }

    pub(crate) fn find(&self, id: &str) -> Option<&E> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub(crate) fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    /// Replaces the local records with the ones matching `query`, newest
    /// first unless the query says otherwise.
    pub(crate) async fn load(&mut self, query: Query) -> Result<&[E]> {
        let query = if query.order().is_some() {
            query
        } else {
            query.order_by(E::ORDER_BY, false)
        };

        let rows = self.rows.select(E::TABLE, &query).await?;
        if !self.liveness.is_alive() {
            debug!("Discarding {} rows loaded from {}", rows.len(), E::TABLE);
            return Err(Error::Cancelled);
        }

        self.items = rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()?;
        self.query = query;
        Ok(&self.items)
    }

    /// Loads again with the last query.
    pub(crate) async fn reload(&mut self) -> Result<&[E]> {
        self.load(self.query.clone()).await
    }

    pub(crate) async fn create(&mut self, draft: E::Draft) -> Result<&E> {
        let draft = draft.normalized()?;
        let row = self
            .rows
            .insert(E::TABLE, serde_json::to_value(&draft)?)
            .await?;

        let item: E = serde_json::from_value(row)?;
        debug!("Created {} in {}", item.id(), E::TABLE);
        self.items.insert(0, item);
        Ok(&self.items[0])
    }

    /// Changes a record locally, then sends just the changed fields to the
    /// backend.
    ///
    /// If `mutate` or the backend fails, every local record is restored to
    /// what it was before the call.
    pub(crate) async fn update<F>(&mut self, id: &str, mutate: F) -> Result<&E>
    where
        F: FnOnce(&mut E) -> Result<(), Validation>,
    {
        let index = self
            .items
            .iter()
            .position(|item| item.id() == id)
            .ok_or_else(|| Error::RecordNotFound {
                table: E::TABLE.to_owned(),
                id: id.to_owned(),
            })?;

        let snapshot = self.items.clone();
        match self.apply(index, mutate).await {
            Ok(()) => Ok(&self.items[index]),
            Err(e) => {
                warn!("Rolling back change to {} in {}: {}", id, E::TABLE, e);
                self.items = snapshot;
                Err(e)
            }
        }
    }

    async fn apply<F>(&mut self, index: usize, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut E) -> Result<(), Validation>,
    {
        let before = serde_json::to_value(&self.items[index])?;
        mutate(&mut self.items[index])?;
        let after = serde_json::to_value(&self.items[index])?;

        let mut patch = changed_fields(&before, after);
        if patch.is_empty() {
            return Ok(());
        }
        if E::TRACKS_UPDATES {
            let _ = patch.insert("updated_at".to_owned(), json!(Utc::now().to_rfc3339()));
        }

        let id = self.items[index].id().to_owned();
        let row = self
            .rows
            .update(E::TABLE, &id, Value::Object(patch))
            .await?;
        self.items[index] = serde_json::from_value(row)?;
        Ok(())
    }

    pub(crate) async fn delete(&mut self, id: &str) -> Result<()> {
        self.rows.delete(E::TABLE, id).await?;
        self.items.retain(|item| item.id() != id);
        Ok(())
    }

    /// Reloads everything whenever the table changes, until the change
    /// stream ends or the collection is torn down.
    ///
    /// `render` sees the current records first and then after every reload.
    /// A reload that fails is reported and the next change tries again.
    pub(crate) async fn watch<F>(
        &mut self,
        mut changes: Subscription<ChangeEvent>,
        mut render: F,
    ) -> Result<()>
    where
        F: FnMut(&[E]),
    {
        render(&self.items);

        while let Some(event) = changes.next().await {
            if !self.liveness.is_alive() {
                break;
            }

            debug!("{:?} in {}, reloading", event.kind, event.table);
            match self.reload().await {
                Ok(items) => render(items),
                Err(Error::Cancelled) => break,
                Err(e) => warn!("Could not reload {}: {}", E::TABLE, e),
            }
        }

        changes.unsubscribe();
        Ok(())
    }
}

/// The fields of `after` that differ from `before`. The identifier is never
/// part of a change.
fn changed_fields(before: &Value, after: Value) -> Map<String, Value> {
    let Value::Object(after) = after else {
        return Map::new();
    };

    after
        .into_iter()
        .filter(|(field, value)| field != "id" && before.get(field) != Some(value))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use tabled::Tabled;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        backend::{fake::Fake, ChangeKind},
        model::{required, Draft},
    };

    #[derive(Clone, Debug, Deserialize, Serialize, Tabled)]
    struct Widget {
        id: String,
        name: String,
        status: String,
        created_at: String,
    }

    impl Entity for Widget {
        const TABLE: &'static str = "widgets";
        const NOUN: &'static str = "widget";

        type Draft = WidgetDraft;

        fn id(&self) -> &str {
            &self.id
        }
    }

    #[derive(Debug, Serialize)]
    struct WidgetDraft {
        name: String,
        status: String,
    }

    impl Draft for WidgetDraft {
        fn normalized(self) -> Result<Self, Validation> {
            Ok(Self {
                name: required(self.name, "name")?,
                status: self.status,
            })
        }
    }

    fn widget(id: &str, status: &str) -> Value {
        json!({
            "id": id,
            "name": format!("widget {id}"),
            "status": status,
            "created_at": "2024-03-01T09:00:00+00:00",
        })
    }

    async fn loaded(fake: Fake) -> (Arc<Fake>, RemoteCollection<Widget, Fake>) {
        let fake = Arc::new(fake);
        let mut collection = RemoteCollection::new(Arc::clone(&fake));
        collection.load(Query::new()).await.expect("load");
        (fake, collection)
    }

    #[tokio::test]
    async fn rejected_update_is_rolled_back() {
        let (fake, mut collection) =
            loaded(Fake::new().with_rows("widgets", vec![widget("1", "new")])).await;
        fake.fail_requests(true);

        let result = collection
            .update("1", |widget| {
                widget.status = "screening".to_owned();
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(Error::BackendUnavailable(_))));
        assert_eq!(collection.items().len(), 1);
        assert_eq!(collection.items()[0].id, "1");
        assert_eq!(collection.items()[0].status, "new");
    }

    #[tokio::test]
    async fn accepted_update_sends_only_changes() {
        let (fake, mut collection) =
            loaded(Fake::new().with_rows("widgets", vec![widget("1", "new")])).await;

        let widget = collection
            .update("1", |widget| {
                widget.status = "screening".to_owned();
                Ok(())
            })
            .await
            .expect("update");
        assert_eq!(widget.status, "screening");

        let stored = &fake.rows("widgets")[0];
        assert_eq!(stored["status"], json!("screening"));
        assert_eq!(stored["name"], json!("widget 1"));
        assert!(stored["updated_at"].is_string());
    }

    #[tokio::test]
    async fn failed_mutation_never_reaches_backend() {
        let (fake, mut collection) =
            loaded(Fake::new().with_rows("widgets", vec![widget("1", "new")])).await;
        let calls = fake.calls();

        let result = collection
            .update("1", |widget| {
                widget.status = "broken".to_owned();
                Err(Validation::MissingField("status"))
            })
            .await;

        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(collection.items()[0].status, "new");
        assert_eq!(fake.calls(), calls);
    }

    #[tokio::test]
    async fn created_record_is_loaded_back() {
        let (fake, mut collection) = loaded(Fake::new()).await;

        let created = collection
            .create(WidgetDraft {
                name: " sprocket ".to_owned(),
                status: "new".to_owned(),
            })
            .await
            .expect("create")
            .clone();
        assert_eq!(collection.items().len(), 1);

        let mut fresh = RemoteCollection::<Widget, _>::new(fake);
        let items = fresh.load(Query::new()).await.expect("load");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, created.id);
        assert!(!items[0].id.is_empty());
        assert!(!items[0].created_at.is_empty());
        assert_eq!(items[0].name, "sprocket");
        assert_eq!(items[0].status, "new");
    }

    #[tokio::test]
    async fn invalid_draft_never_reaches_backend() {
        let fake = Arc::new(Fake::new());
        let mut collection = RemoteCollection::<Widget, _>::new(Arc::clone(&fake));

        let result = collection
            .create(WidgetDraft {
                name: "  ".to_owned(),
                status: "new".to_owned(),
            })
            .await;

        assert!(matches!(
            result,
            Err(Error::Validation(Validation::MissingField("name")))
        ));
        assert_eq!(fake.calls(), 0);
        assert!(collection.items().is_empty());
    }

    #[tokio::test]
    async fn delete_waits_for_backend() {
        let (fake, mut collection) =
            loaded(Fake::new().with_rows("widgets", vec![widget("1", "new")])).await;

        fake.fail_requests(true);
        assert!(collection.delete("1").await.is_err());
        assert!(collection.find("1").is_some());

        fake.fail_requests(false);
        collection.delete("1").await.expect("delete");
        assert!(collection.find("1").is_none());
        assert!(fake.rows("widgets").is_empty());
    }

    #[tokio::test]
    async fn torn_down_collection_discards_loads() {
        let fake = Arc::new(Fake::new().with_rows("widgets", vec![widget("1", "new")]));
        let mut collection = RemoteCollection::<Widget, _>::new(Arc::clone(&fake));

        collection.liveness().tear_down();
        let result = collection.load(Query::new()).await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(fake.calls(), 1);
        assert!(collection.items().is_empty());
    }

    #[tokio::test]
    async fn loads_are_filtered_and_newest_first() {
        let mut older = widget("1", "new");
        older["created_at"] = json!("2024-02-01T09:00:00+00:00");
        let (_, mut collection) = loaded(Fake::new().with_rows(
            "widgets",
            vec![older, widget("2", "new"), widget("3", "placed")],
        ))
        .await;

        let ids: Vec<_> = collection.items().iter().map(|w| w.id.clone()).collect();
        assert_eq!(ids, ["2", "3", "1"]);

        let items = collection
            .load(Query::new().eq("status", "new"))
            .await
            .expect("load");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "2");
    }

    #[tokio::test]
    async fn watch_reloads_on_every_change() {
        let (fake, mut collection) =
            loaded(Fake::new().with_rows("widgets", vec![widget("1", "new")])).await;
        let _ = fake.insert("widgets", widget("2", "new")).await.expect("insert");

        let (tx, rx) = mpsc::channel(4);
        tx.send(ChangeEvent {
            kind: ChangeKind::Insert,
            table: "widgets".to_owned(),
        })
        .await
        .expect("send");
        drop(tx);
        let changes = Subscription::new(rx, tokio::spawn(async {}));

        let mut seen = Vec::new();
        collection
            .watch(changes, |items| seen.push(items.len()))
            .await
            .expect("watch");

        assert_eq!(seen, [1, 2]);
    }
}
