// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

//! An in-process backend for exercising everything above the wire.

use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret as _, SecretString};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use url::Url;
use uuid::Uuid;

use crate::error::{self, Error, Result};

use super::{
    Auth, AuthChange, AuthEvent, ChangeEvent, ChangeKind, Changes, Objects, Query, Rows, Session,
    Subscription, User,
};

/// A request the fake can be told to fail on its own.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Operation {
    Select,
    Insert,
    Update,
    Delete,
    Upload,
    SignedUrl,
    Remove,
}

#[derive(Default)]
struct State {
    accounts: HashMap<String, String>,
    session: Option<Session>,
    tables: HashMap<String, Vec<Value>>,
    objects: HashMap<String, Vec<u8>>,
    pending: Vec<AuthChange>,
    session_unavailable: bool,
    requests_fail: bool,
    failing: HashSet<Operation>,
    sign_out_fails: bool,
    sign_outs: usize,
    calls: usize,
}

pub(crate) struct Fake {
    state: Mutex<State>,
    auth: broadcast::Sender<AuthChange>,
    changes: broadcast::Sender<ChangeEvent>,
}

fn unavailable() -> Error {
    error::Backend::Api {
        status: 503,
        message: "service unavailable".to_owned(),
    }
    .into()
}

impl Fake {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::default(),
            auth: broadcast::channel(16).0,
            changes: broadcast::channel(16).0,
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("fake backend state")
    }

    pub(crate) fn session_for(email: &str) -> Session {
        Session {
            user: User {
                id: format!("user-{email}"),
                email: Some(email.to_owned()),
            },
            expires_at: None,
        }
    }

    pub(crate) fn with_account(self, email: &str, password: &str) -> Self {
        let _ = self
            .state()
            .accounts
            .insert(email.to_owned(), password.to_owned());
        self
    }

    /// Starts with a session already established, as if restored from a
    /// previous run.
    pub(crate) fn with_session(self, email: &str) -> Self {
        self.state().session = Some(Self::session_for(email));
        self
    }

    pub(crate) fn with_rows(self, table: &str, rows: Vec<Value>) -> Self {
        let _ = self.state().tables.insert(table.to_owned(), rows);
        self
    }

    /// Makes session lookups fail.
    pub(crate) fn with_session_unavailable(self) -> Self {
        self.state().session_unavailable = true;
        self
    }

    pub(crate) fn with_failing_sign_out(self) -> Self {
        self.state().sign_out_fails = true;
        self
    }

    /// Queues a notification to be delivered while the session is being
    /// looked up.
    pub(crate) fn with_notification_during_lookup(self, change: AuthChange) -> Self {
        self.state().pending.push(change);
        self
    }

    pub(crate) fn fail_requests(&self, fail: bool) {
        self.state().requests_fail = fail;
    }

    /// Makes one kind of request fail while the rest keep working.
    pub(crate) fn fail_operation(&self, operation: Operation) {
        let _ = self.state().failing.insert(operation);
    }

    pub(crate) fn notify(&self, change: AuthChange) {
        let _ = self.auth.send(change);
    }

    pub(crate) fn notify_row_change(&self, kind: ChangeKind, table: &str) {
        let _ = self.changes.send(ChangeEvent {
            kind,
            table: table.to_owned(),
        });
    }

    pub(crate) fn current_session(&self) -> Option<Session> {
        self.state().session.clone()
    }

    pub(crate) fn sign_outs(&self) -> usize {
        self.state().sign_outs
    }

    /// How many row and object operations have been attempted.
    pub(crate) fn calls(&self) -> usize {
        self.state().calls
    }

    pub(crate) fn rows(&self, table: &str) -> Vec<Value> {
        self.state().tables.get(table).cloned().unwrap_or_default()
    }

    pub(crate) fn object(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        self.state().objects.get(&format!("{bucket}/{path}")).cloned()
    }

    fn request(&self, operation: Operation) -> Result<MutexGuard<'_, State>> {
        let mut state = self.state();
        state.calls += 1;
        if state.requests_fail || state.failing.contains(&operation) {
            return Err(unavailable());
        }
        Ok(state)
    }
}

#[async_trait]
impl Auth for Fake {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Session> {
        let session = {
            let mut state = self.state();
            if state.accounts.get(email).map(String::as_str) != Some(password.expose_secret()) {
                return Err(Error::AuthRejected("Invalid login credentials".to_owned()));
            }
            let session = Self::session_for(email);
            state.session = Some(session.clone());
            session
        };
        self.notify(AuthChange {
            event: AuthEvent::SignedIn,
            session: Some(session.clone()),
        });
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        let had_session = {
            let mut state = self.state();
            state.sign_outs += 1;
            if state.sign_out_fails {
                return Err(unavailable());
            }
            state.session.take().is_some()
        };
        if had_session {
            self.notify(AuthChange {
                event: AuthEvent::SignedOut,
                session: None,
            });
        }
        Ok(())
    }

    async fn session(&self) -> Result<Option<Session>> {
        let (session, pending) = {
            let mut state = self.state();
            if state.session_unavailable {
                return Err(unavailable());
            }
            (state.session.clone(), std::mem::take(&mut state.pending))
        };
        for change in pending {
            self.notify(change);
        }
        Ok(session)
    }

    fn subscribe(&self) -> Subscription<AuthChange> {
        Subscription::forward(self.auth.subscribe())
    }
}

fn matches(row: &Value, query: &Query) -> bool {
    query.filters().iter().all(|(column, value)| {
        row.get(column).map_or(false, |field| match field {
            Value::String(s) => s == value,
            other => other.to_string() == *value,
        })
    })
}

fn not_found(table: &str, id: &str) -> Error {
    Error::RecordNotFound {
        table: table.to_owned(),
        id: id.to_owned(),
    }
}

#[async_trait]
impl Rows for Fake {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>> {
        let mut rows: Vec<Value> = {
            let state = self.request(Operation::Select)?;
            state
                .tables
                .get(table)
                .map(|rows| rows.iter().filter(|row| matches(row, query)).cloned().collect())
                .unwrap_or_default()
        };
        if let Some((column, ascending)) = query.order() {
            rows.sort_by(|a, b| {
                let a = a.get(column).map(Value::to_string).unwrap_or_default();
                let b = b.get(column).map(Value::to_string).unwrap_or_default();
                if ascending {
                    a.cmp(&b)
                } else {
                    b.cmp(&a)
                }
            });
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, mut row: Value) -> Result<Value> {
        {
            let mut state = self.request(Operation::Insert)?;
            if let Some(fields) = row.as_object_mut() {
                let _ = fields
                    .entry("id")
                    .or_insert_with(|| json!(Uuid::new_v4().to_string()));
                let _ = fields
                    .entry("created_at")
                    .or_insert_with(|| json!(Utc::now().to_rfc3339()));
            }
            state
                .tables
                .entry(table.to_owned())
                .or_default()
                .push(row.clone());
        }
        self.notify_row_change(ChangeKind::Insert, table);
        Ok(row)
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Value> {
        let updated = {
            let mut state = self.request(Operation::Update)?;
            let row = state
                .tables
                .get_mut(table)
                .and_then(|rows| rows.iter_mut().find(|row| row["id"] == id))
                .ok_or_else(|| not_found(table, id))?;
            if let (Some(fields), Value::Object(patch)) = (row.as_object_mut(), patch) {
                fields.extend(patch);
            }
            row.clone()
        };
        self.notify_row_change(ChangeKind::Update, table);
        Ok(updated)
    }

    async fn delete(&self, table: &str, id: &str) -> Result<()> {
        {
            let mut state = self.request(Operation::Delete)?;
            let rows = state
                .tables
                .get_mut(table)
                .ok_or_else(|| not_found(table, id))?;
            let before = rows.len();
            rows.retain(|row| row["id"] != id);
            if rows.len() == before {
                return Err(not_found(table, id));
            }
        }
        self.notify_row_change(ChangeKind::Delete, table);
        Ok(())
    }
}

#[async_trait]
impl Objects for Fake {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<()> {
        let _ = self
            .request(Operation::Upload)?
            .objects
            .insert(format!("{bucket}/{path}"), bytes);
        Ok(())
    }

    async fn signed_url(&self, bucket: &str, path: &str, ttl: Duration) -> Result<Url> {
        drop(self.request(Operation::SignedUrl)?);
        Url::parse(&format!(
            "https://storage.invalid/sign/{bucket}/{path}?ttl={}",
            ttl.as_secs()
        ))
        .map_err(|e| Error::Config(e.to_string()))
    }

    fn public_url(&self, bucket: &str, path: &str) -> Result<Url> {
        Url::parse(&format!("https://storage.invalid/public/{bucket}/{path}"))
            .map_err(|e| Error::Config(e.to_string()))
    }

    async fn remove(&self, bucket: &str, paths: &[&str]) -> Result<()> {
        let mut state = self.request(Operation::Remove)?;
        for path in paths {
            let _ = state.objects.remove(&format!("{bucket}/{path}"));
        }
        Ok(())
    }
}

#[async_trait]
impl Changes for Fake {
    async fn subscribe_changes(&self, table: &str) -> Result<Subscription<ChangeEvent>> {
        let table = table.to_owned();
        let mut events = Subscription::forward(self.changes.subscribe());
        let (tx, rx) = tokio::sync::mpsc::channel(16);
        let worker = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.table == table && tx.send(event).await.is_err() {
                    break;
                }
            }
        });
        Ok(Subscription::new(rx, worker))
    }
}
