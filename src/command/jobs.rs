// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use chrono::Utc;
use clap::Subcommand;

use crate::{
    backend::{Backend, Query},
    collection::RemoteCollection,
    error::Result,
    model::job::{Job, JobDraft, JobStatus, JobType},
    preference::RememberPreference,
    storage::Storage,
};

use super::{column_value, create, delete, failed, load_one, print_table, update, Context};

/// Manage job postings.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// List job postings, newest first.
    List {
        #[arg(long, value_enum)]
        status: Option<JobStatus>,

        #[arg(long = "type", value_enum)]
        job_type: Option<JobType>,

        /// Only show jobs whose title or location contains this text.
        #[arg(long)]
        search: Option<String>,
    },

    /// Create a job posting.
    Add(JobDraft),

    /// Change the status of a job posting.
    SetStatus {
        id: String,

        #[arg(value_enum)]
        status: JobStatus,
    },

    /// Create a draft copy of an existing job posting.
    Duplicate { id: String },

    /// Delete a job posting.
    Delete {
        id: String,

        /// Do not ask for confirmation.
        #[arg(long, short)]
        yes: bool,
    },
}

#[async_trait(?Send)]
impl super::Command for Command {
    async fn execute<B: Backend, S: Storage<RememberPreference>>(
        self,
        context: &mut Context<B, S>,
    ) -> Result<()> {
        let mut jobs = RemoteCollection::<Job, B>::new(context.backend()?);

        match self {
            Self::List {
                status,
                job_type,
                search,
            } => {
                let mut query = Query::new();
                if let Some(status) = status {
                    query = query.eq("status", column_value(&status)?);
                }
                if let Some(job_type) = job_type {
                    query = query.eq("job_type", column_value(&job_type)?);
                }

                let items = jobs
                    .load(query)
                    .await
                    .map_err(failed("load jobs"))?;
                let search = search.unwrap_or_default();
                print_table(items.iter().filter(|job| job.matches(&search)));
                Ok(())
            }
            Self::Add(draft) => create(&mut jobs, draft).await,
            Self::SetStatus { id, status } => {
                update(&mut jobs, &id, |job| {
                    job.set_status(status, Utc::now());
                    Ok(())
                })
                .await
            }
            Self::Duplicate { id } => {
                let draft = load_one(&mut jobs, &id).await?.duplicate();
                create(&mut jobs, draft).await
            }
            Self::Delete { id, yes } => delete(&mut jobs, &id, yes).await,
        }
    }
}
