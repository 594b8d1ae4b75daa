// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

#[cfg(test)]
pub(crate) mod fake;
pub(crate) mod supabase;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::{stream::BoxStream, FutureExt as _, StreamExt as _};
use log::warn;
use secrecy::SecretString;
use serde_json::Value;
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream, ReceiverStream};
use url::Url;

use crate::error::Result;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) email: Option<String>,
}

/// The parts of a backend session that the rest of the application may look
/// at. Tokens stay with the backend implementation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Session {
    pub(crate) user: User,
    pub(crate) expires_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum AuthEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// An out-of-band notification that the backend session changed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct AuthChange {
    pub(crate) event: AuthEvent,
    pub(crate) session: Option<Session>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ChangeEvent {
    pub(crate) kind: ChangeKind,
    pub(crate) table: String,
}

/// Equality filters and an ordering for a table read.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Query {
    filters: Vec<(String, String)>,
    order: Option<(String, bool)>,
}

impl Query {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn eq<V: ToString>(mut self, column: &str, value: V) -> Self {
        self.filters.push((column.to_owned(), value.to_string()));
        self
    }

    pub(crate) fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some((column.to_owned(), ascending));
        self
    }

    pub(crate) fn filters(&self) -> &[(String, String)] {
        &self.filters
    }

    pub(crate) fn order(&self) -> Option<(&str, bool)> {
        self.order
            .as_ref()
            .map(|(column, ascending)| (column.as_str(), *ascending))
    }
}

/// A stream of notifications that stops when it is dropped.
///
/// A worker task feeding the subscription is aborted on drop, so a
/// subscription can never outlive whoever holds it.
pub(crate) struct Subscription<T> {
    events: BoxStream<'static, T>,
    worker: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Subscription<T> {
    pub(crate) fn new(rx: mpsc::Receiver<T>, worker: JoinHandle<()>) -> Self {
        Self {
            events: ReceiverStream::new(rx).boxed(),
            worker: Some(worker),
        }
    }

    /// Listens on a broadcast channel. Notifications missed because the
    /// subscriber fell behind are logged and skipped.
    pub(crate) fn forward(rx: broadcast::Receiver<T>) -> Self
    where
        T: Clone,
    {
        let events = BroadcastStream::new(rx).filter_map(|candidate| async move {
            match candidate {
                Ok(event) => Some(event),
                Err(BroadcastStreamRecvError::Lagged(n)) => {
                    warn!("Subscriber fell behind and missed {} notifications", n);
                    None
                }
            }
        });
        Self {
            events: events.boxed(),
            worker: None,
        }
    }
}

impl<T> Subscription<T> {
    /// Waits for the next notification. Returns `None` once the source has
    /// gone away.
    pub(crate) async fn next(&mut self) -> Option<T> {
        self.events.next().await
    }

    /// Returns a notification that has already arrived, without waiting.
    pub(crate) fn try_next(&mut self) -> Option<T> {
        self.events.next().now_or_never().flatten()
    }

    pub(crate) fn unsubscribe(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[async_trait]
pub(crate) trait Auth: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &SecretString)
        -> Result<Session>;

    /// Revokes the current session, if any. Signing out without a session is
    /// not an error.
    async fn sign_out(&self) -> Result<()>;

    async fn session(&self) -> Result<Option<Session>>;

    fn subscribe(&self) -> Subscription<AuthChange>;
}

#[async_trait]
pub(crate) trait Rows: Send + Sync {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>>;
    async fn insert(&self, table: &str, row: Value) -> Result<Value>;
    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Value>;
    async fn delete(&self, table: &str, id: &str) -> Result<()>;
}

#[async_trait]
pub(crate) trait Objects: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()>;
    async fn signed_url(&self, bucket: &str, path: &str, ttl: Duration) -> Result<Url>;
    fn public_url(&self, bucket: &str, path: &str) -> Result<Url>;
    async fn remove(&self, bucket: &str, paths: &[&str]) -> Result<()>;
}

#[async_trait]
pub(crate) trait Changes: Send + Sync {
    async fn subscribe_changes(&self, table: &str) -> Result<Subscription<ChangeEvent>>;
}

/// Everything the application needs from the hosted service.
pub(crate) trait Backend: Auth + Rows + Objects + Changes + 'static {}

impl<T: Auth + Rows + Objects + Changes + 'static> Backend for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dropping_subscription_stops_worker() {
        let (tx, rx) = mpsc::channel::<u32>(1);
        let worker = tokio::spawn(async move {
            let mut n = 0_u32;
            loop {
                if tx.send(n).await.is_err() {
                    break;
                }
                n += 1;
            }
        });
        let mut subscription = Subscription::new(rx, worker);
        assert_eq!(subscription.next().await, Some(0));
        subscription.unsubscribe();
    }

    #[tokio::test]
    async fn subscription_ends_when_source_closes() {
        let (tx, rx) = mpsc::channel::<u32>(1);
        let worker = tokio::spawn(async move {
            let _ = tx.send(7).await;
        });
        let mut subscription = Subscription::new(rx, worker);
        assert_eq!(subscription.next().await, Some(7));
        assert_eq!(subscription.next().await, None);
    }

    #[tokio::test]
    async fn forwarded_events_are_visible_without_waiting() {
        let (tx, rx) = broadcast::channel::<u32>(4);
        let mut subscription = Subscription::forward(rx);
        assert_eq!(subscription.try_next(), None);

        tx.send(1).expect("receiver");
        tx.send(2).expect("receiver");
        assert_eq!(subscription.try_next(), Some(1));
        assert_eq!(subscription.next().await, Some(2));

        drop(tx);
        assert_eq!(subscription.next().await, None);
    }

    #[test]
    fn query_keeps_filters_in_order() {
        let query = Query::new()
            .eq("status", "live")
            .eq("job_type", "Contract")
            .order_by("created_at", false);

        assert_eq!(
            query.filters(),
            &[
                ("status".to_owned(), "live".to_owned()),
                ("job_type".to_owned(), "Contract".to_owned()),
            ]
        );
        assert_eq!(query.order(), Some(("created_at", false)));
    }
}
