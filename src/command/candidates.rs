// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use clap::Subcommand;
use log::{debug, error};
use url::Url;

use crate::{
    backend::{Backend, Objects as _, Query},
    collection::RemoteCollection,
    error::{Error, Result},
    model::{
        candidate::{Candidate, CandidateDraft, CandidateStatus},
        document::{self, Document},
    },
    preference::RememberPreference,
    storage::Storage,
};

use super::{column_value, create, delete, failed, list, load_one, update, watch, Context};

/// How long a link to a CV stays valid.
const CV_LINK_TTL: Duration = Duration::from_secs(3600);

/// Manage candidates.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// List candidates, newest first.
    List {
        #[arg(long, value_enum)]
        status: Option<CandidateStatus>,

        /// Only show candidates put forward for this job.
        #[arg(long)]
        job_id: Option<String>,
    },

    /// Add a candidate.
    Add(CandidateDraft),

    /// Move a candidate to a different stage.
    SetStatus {
        id: String,

        #[arg(value_enum)]
        status: CandidateStatus,
    },

    /// Print a temporary link to a candidate's CV.
    ViewCv { id: String },

    /// Delete a candidate.
    Delete {
        id: String,

        /// Do not ask for confirmation.
        #[arg(long, short)]
        yes: bool,
    },

    /// Keep the list of candidates on screen, updating it as it changes.
    Watch {
        #[arg(long, value_enum)]
        status: Option<CandidateStatus>,
    },
}

fn query(status: Option<CandidateStatus>, job_id: Option<String>) -> Result<Query> {
    let mut query = Query::new();
    if let Some(status) = status {
        query = query.eq("status", column_value(&status)?);
    }
    if let Some(job_id) = job_id {
        query = query.eq("job_id", job_id);
    }
    Ok(query)
}

/// Resolves a candidate's CV document to a link that expires after an hour.
pub(crate) async fn cv_link<B: Backend>(
    backend: &Arc<B>,
    candidate: &Candidate,
) -> Result<Url> {
    let Some(document_id) = candidate.cv_document_id.as_deref() else {
        error!("This candidate has no CV on file");
        return Err(Error::Command);
    };

    let mut documents = RemoteCollection::<Document, B>::new(Arc::clone(backend));
    let document = load_one(&mut documents, document_id)
        .await
        .map_err(failed("fetch the CV document"))?;
    debug!("Signing a link to {}", document.file_path);

    backend
        .signed_url(document::BUCKET, &document.file_path, CV_LINK_TTL)
        .await
        .map_err(failed("open the CV"))
}

#[async_trait(?Send)]
impl super::Command for Command {
    async fn execute<B: Backend, S: Storage<RememberPreference>>(
        self,
        context: &mut Context<B, S>,
    ) -> Result<()> {
        let backend = context.backend()?;
        let mut candidates = RemoteCollection::<Candidate, B>::new(Arc::clone(&backend));

        match self {
            Self::List { status, job_id } => list(&mut candidates, query(status, job_id)?).await,
            Self::Add(draft) => create(&mut candidates, draft).await,
            Self::SetStatus { id, status } => {
                update(&mut candidates, &id, |candidate| {
                    candidate.status = status;
                    Ok(())
                })
                .await
            }
            Self::ViewCv { id } => {
                let candidate = load_one(&mut candidates, &id).await?;
                println!("{}", cv_link(&backend, candidate).await?);
                Ok(())
            }
            Self::Delete { id, yes } => delete(&mut candidates, &id, yes).await,
            Self::Watch { status } => watch(context, &mut candidates, query(status, None)?).await,
        }
    }
}
