// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use clap::Parser;

use crate::{
    backend::{Backend, Query},
    collection::RemoteCollection,
    error::Result,
    gate::GateState,
    model::job::{Job, JobStatus},
    preference::RememberPreference,
    storage::Storage,
};

use super::{column_value, list, Context};

/// Show who is signed in and the jobs that are currently live.
#[derive(Debug, Parser)]
pub(crate) struct Command {}

#[async_trait(?Send)]
impl super::Command for Command {
    async fn execute<B: Backend, S: Storage<RememberPreference>>(
        self,
        context: &mut Context<B, S>,
    ) -> Result<()> {
        let backend = context.backend()?;
        if let GateState::Authenticated(email) = context.gate.state() {
            println!("Welcome back, {email}.");
        }

        let mut jobs = RemoteCollection::<Job, B>::new(backend);
        list(
            &mut jobs,
            Query::new().eq("status", column_value(&JobStatus::Live)?),
        )
        .await
    }
}
