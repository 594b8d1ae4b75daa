// SPDX-FileCopyrightText: 2022-2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{
    io::{self, Write as _},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::Local;
use inflector::Inflector as _;
use log::{error, info, warn};
use serde::Serialize;
use serde_json::Value;
use tabled::{settings::Style, Table, Tabled};
use tokio::{signal, task};

use crate::{
    backend::{Backend, Query, Rows, User},
    collection::RemoteCollection,
    error::{Error, Result, Validation},
    gate::{AccessGate, Denial, GateState},
    model::Entity,
    password::Prompt,
    preference::RememberPreference,
    storage::Storage,
};

pub(crate) mod candidates;
pub(crate) mod clients;
pub(crate) mod dashboard;
pub(crate) mod diary;
pub(crate) mod documents;
pub(crate) mod invoices;
pub(crate) mod jobs;
pub(crate) mod login;
pub(crate) mod logout;
pub(crate) mod status;

/// Everything a command may use: the gate, and the backend behind it.
pub(crate) struct Context<B: Backend, S: Storage<RememberPreference>> {
    pub(crate) gate: AccessGate<B, S>,
    backend: Option<Arc<B>>,
    pub(crate) prompt: Box<dyn Prompt>,
}

impl<B: Backend, S: Storage<RememberPreference>> Context<B, S> {
    pub(crate) fn new(
        gate: AccessGate<B, S>,
        backend: Option<Arc<B>>,
        prompt: Box<dyn Prompt>,
    ) -> Self {
        Self {
            gate,
            backend,
            prompt,
        }
    }

    /// The backend, provided the gate has let someone in.
    pub(crate) fn backend(&self) -> Result<Arc<B>> {
        match self.gate.state() {
            GateState::Authenticated(_) => self
                .backend
                .clone()
                .ok_or(Error::AccessDenied(Denial::Unconfigured)),
            GateState::Denied(denial) => Err(Error::AccessDenied(denial)),
            GateState::Initializing | GateState::LoggedOut => Err(Error::NotSignedIn),
        }
    }

    /// The signed-in user, as the backend sees them.
    pub(crate) async fn user(&self) -> Result<User> {
        let session = self
            .backend()?
            .session()
            .await
            .map_err(failed("look up your account"))?;
        session.map(|session| session.user).ok_or(Error::NotSignedIn)
    }

    pub(crate) async fn close(self) {
        self.gate.close().await;
    }
}

#[async_trait(?Send)]
pub(crate) trait Command {
    async fn execute<B: Backend, S: Storage<RememberPreference>>(
        self,
        context: &mut Context<B, S>,
    ) -> Result<()>;
}

/// Reports a backend failure in the terms people expect and replaces it with
/// a generic command failure. Anything that never reached the backend is
/// passed through as it is.
pub(crate) fn failed(action: &str) -> impl FnOnce(Error) -> Error + '_ {
    move |e| {
        if e.is_backend() {
            error!("Failed to {}. Please try again. ({})", action, e);
            Error::Command
        } else {
            e
        }
    }
}

/// The form a value takes in a column filter.
pub(crate) fn column_value<T: Serialize>(value: &T) -> Result<String> {
    Ok(match serde_json::to_value(value)? {
        Value::String(value) => value,
        value => value.to_string(),
    })
}

pub(crate) fn print_table<T: Tabled, I: IntoIterator<Item = T>>(rows: I) {
    let mut rows = rows.into_iter().peekable();
    if rows.peek().is_none() {
        info!("There is nothing to show");
        return;
    }

    println!("{}", Table::new(rows).with(Style::rounded()));
}

/// Asks a yes-or-no question on the terminal. `yes` answers it up front.
pub(crate) async fn confirm(question: String, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }

    task::spawn_blocking(move || -> Result<bool> {
        eprint!("{question} [y/N] ");
        io::stderr().flush()?;

        let mut answer = String::new();
        let _ = io::stdin().read_line(&mut answer)?;
        Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
    })
    .await?
}

pub(crate) async fn list<E: Entity, R: Rows>(
    collection: &mut RemoteCollection<E, R>,
    query: Query,
) -> Result<()> {
    let items = collection
        .load(query)
        .await
        .map_err(failed(&format!("load {}", E::NOUN.to_plural())))?;
    print_table(items);
    Ok(())
}

/// Loads a single record by its ID.
pub(crate) async fn load_one<'c, E: Entity, R: Rows>(
    collection: &'c mut RemoteCollection<E, R>,
    id: &str,
) -> Result<&'c E> {
    let _ = collection
        .load(Query::new().eq("id", id))
        .await
        .map_err(failed(&format!("load the {}", E::NOUN)))?;
    collection.find(id).ok_or_else(|| Error::RecordNotFound {
        table: E::TABLE.to_owned(),
        id: id.to_owned(),
    })
}

pub(crate) async fn create<E: Entity, R: Rows>(
    collection: &mut RemoteCollection<E, R>,
    draft: E::Draft,
) -> Result<()> {
    let item = collection
        .create(draft)
        .await
        .map_err(failed(&format!("create the {}", E::NOUN)))?;
    print_table([item]);
    Ok(())
}

/// Loads a record and changes it optimistically.
pub(crate) async fn update<E, R, F>(
    collection: &mut RemoteCollection<E, R>,
    id: &str,
    mutate: F,
) -> Result<()>
where
    E: Entity,
    R: Rows,
    F: FnOnce(&mut E) -> Result<(), Validation>,
{
    let _ = load_one(collection, id).await?;
    let item = collection
        .update(id, mutate)
        .await
        .map_err(failed(&format!("update the {}", E::NOUN)))?;
    print_table([item]);
    Ok(())
}

pub(crate) async fn delete<E: Entity, R: Rows>(
    collection: &mut RemoteCollection<E, R>,
    id: &str,
    yes: bool,
) -> Result<()> {
    let question = format!(
        "Are you sure you want to delete this {}? This action cannot be undone.",
        E::NOUN
    );
    if !confirm(question, yes).await? {
        info!("Nothing was deleted");
        return Ok(());
    }

    collection
        .delete(id)
        .await
        .map_err(failed(&format!("delete the {}", E::NOUN)))?;
    println!("Deleted {} {}", E::NOUN, id);
    Ok(())
}

/// Shows a list and reloads it every time the table changes, until the user
/// interrupts or loses access.
pub(crate) async fn watch<E, B, S>(
    context: &mut Context<B, S>,
    collection: &mut RemoteCollection<E, B>,
    query: Query,
) -> Result<()>
where
    E: Entity,
    B: Backend,
    S: Storage<RememberPreference>,
{
    let backend = context.backend()?;
    let _ = collection
        .load(query)
        .await
        .map_err(failed(&format!("load {}", E::NOUN.to_plural())))?;
    let changes = backend
        .subscribe_changes(E::TABLE)
        .await
        .map_err(failed(&format!("listen for changes to {}", E::NOUN.to_plural())))?;

    let liveness = collection.liveness();
    let gate = &mut context.gate;
    let render = |items: &[E]| {
        println!("{}", Local::now().format("%H:%M:%S"));
        print_table(items);
    };

    let watching = collection.watch(changes, render);
    let interrupted = signal::ctrl_c();
    tokio::pin!(watching, interrupted);
    let mut listening = true;
    loop {
        tokio::select! {
            result = &mut watching => return result,
            result = &mut interrupted => {
                liveness.tear_down();
                result?;
                info!("Stopped watching {}", E::NOUN.to_plural());
                return Ok(());
            }
            change = gate.receive(), if listening => {
                let Some(change) = change else {
                    listening = false;
                    continue;
                };
                // Runs outside the race so an interrupt cannot cut a
                // revocation short.
                let state = gate.apply(&change).await;
                if let GateState::Authenticated(_) = state {
                    continue;
                }

                liveness.tear_down();
                warn!("Stopped watching {} because access is now {}", E::NOUN.to_plural(), state);
                return Err(match state {
                    GateState::Denied(denial) => Error::AccessDenied(denial),
                    GateState::Initializing | GateState::LoggedOut | GateState::Authenticated(_) => {
                        Error::NotSignedIn
                    }
                });
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        allow_list::AllowList,
        backend::{fake::Fake, AuthChange, AuthEvent},
        model::job::{Job, JobStatus},
        password::tests::Scripted,
        storage::Memory,
    };

    pub(crate) type TestContext = Context<Fake, Memory<RememberPreference>>;

    /// A context whose gate has already admitted `a@allowed.com`.
    pub(crate) async fn signed_in(fake: Fake) -> (Arc<Fake>, TestContext) {
        let fake = Arc::new(fake.with_session("a@allowed.com"));
        let allow_list: AllowList = ["a@allowed.com"].into_iter().collect();
        let gate = AccessGate::new(Arc::clone(&fake), allow_list, Memory::new());
        let mut context = Context::new(
            gate,
            Some(Arc::clone(&fake)),
            Box::new(Scripted::new(&[])),
        );
        let _ = context.gate.initialize().await;
        (fake, context)
    }

    pub(crate) fn job(id: &str, status: &str) -> Value {
        json!({
            "id": id,
            "title": format!("Job {id}"),
            "location": "Leeds",
            "salary_range": null,
            "job_type": "Permanent",
            "description": "",
            "status": status,
            "created_at": "2024-03-01T09:00:00+00:00",
        })
    }

    #[tokio::test]
    async fn backend_needs_an_admitted_user() {
        let fake = Arc::new(Fake::new());
        let gate = AccessGate::new(Arc::clone(&fake), AllowList::default(), Memory::new());
        let mut context = Context::new(gate, Some(fake), Box::new(Scripted::new(&[])));
        let _ = context.gate.initialize().await;

        assert!(matches!(context.backend(), Err(Error::NotSignedIn)));
    }

    #[tokio::test]
    async fn unconfigured_context_is_denied() {
        let gate = AccessGate::<Fake, _>::unconfigured(AllowList::default(), Memory::new());
        let mut context = Context::new(gate, None, Box::new(Scripted::new(&[])));
        let _ = context.gate.initialize().await;

        assert!(matches!(
            context.backend(),
            Err(Error::AccessDenied(Denial::Unconfigured))
        ));
    }

    #[tokio::test]
    async fn user_comes_from_the_session() -> Result<()> {
        let (_, context) = signed_in(Fake::new()).await;

        let user = context.user().await?;
        assert_eq!(user.email.as_deref(), Some("a@allowed.com"));
        Ok(())
    }

    #[test]
    fn column_values_use_wire_names() -> Result<()> {
        assert_eq!(column_value(&JobStatus::Live)?, "live");
        assert_eq!(column_value(&42_i32)?, "42");
        Ok(())
    }

    #[test]
    fn backend_failures_become_command_failures() {
        let backend = Error::RecordNotFound {
            table: Job::TABLE.to_owned(),
            id: "j-1".to_owned(),
        };
        assert!(matches!(failed("load the job")(backend), Error::Command));

        let local = Error::Validation(Validation::Email);
        assert!(matches!(
            failed("create the job")(local),
            Error::Validation(Validation::Email)
        ));
    }

    #[tokio::test]
    async fn confirmed_delete_removes_record() -> Result<()> {
        let (fake, context) =
            signed_in(Fake::new().with_rows("jobs", vec![job("j-1", "live")])).await;
        let mut jobs = RemoteCollection::<Job, _>::new(context.backend()?);

        delete(&mut jobs, "j-1", true).await?;
        assert!(fake.rows("jobs").is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn failed_update_reports_and_rolls_back() -> Result<()> {
        let (fake, context) =
            signed_in(Fake::new().with_rows("jobs", vec![job("j-1", "live")])).await;
        let mut jobs = RemoteCollection::<Job, _>::new(context.backend()?);
        let _ = load_one(&mut jobs, "j-1").await?;
        fake.fail_requests(true);

        let result = jobs
            .update("j-1", |job| {
                job.set_status(JobStatus::Closed, chrono::Utc::now());
                Ok(())
            })
            .await
            .map_err(failed("update the job"));

        assert!(matches!(result, Err(Error::Command)));
        assert_eq!(jobs.items()[0].status, JobStatus::Live);
        assert_eq!(jobs.items()[0].closed_at, None);
        Ok(())
    }

    #[tokio::test]
    async fn missing_record_is_reported() -> Result<()> {
        let (_, context) = signed_in(Fake::new()).await;
        let mut jobs = RemoteCollection::<Job, _>::new(context.backend()?);

        let result = load_one(&mut jobs, "j-404").await;
        assert!(matches!(result, Err(Error::RecordNotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn watch_stops_when_signed_out() -> Result<()> {
        let (fake, mut context) =
            signed_in(Fake::new().with_rows("jobs", vec![job("j-1", "live")])).await;
        let mut jobs = RemoteCollection::<Job, _>::new(context.backend()?);
        let liveness = jobs.liveness();
        fake.notify(AuthChange {
            event: AuthEvent::SignedOut,
            session: None,
        });

        let result = watch(&mut context, &mut jobs, Query::new()).await;

        assert!(matches!(result, Err(Error::NotSignedIn)));
        assert!(!liveness.is_alive());
        assert_eq!(context.gate.state(), GateState::LoggedOut);
        Ok(())
    }
}
