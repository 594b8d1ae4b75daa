// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{ffi::OsStr, fs, path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use log::{debug, info, warn};

use crate::{
    backend::{Backend, Objects, Query, User},
    collection::RemoteCollection,
    error::{Result, Validation},
    model::{
        document::{Document, DocumentCategory, DocumentDraft, BUCKET},
        Draft as _,
    },
    preference::RememberPreference,
    storage::Storage,
};

use super::{column_value, confirm, failed, list, load_one, print_table, watch, Context};

const LINK_TTL: Duration = Duration::from_secs(3600);

#[derive(Args, Debug)]
pub(crate) struct Upload {
    /// The file to upload.
    #[arg(value_hint = clap::ValueHint::FilePath)]
    file: PathBuf,

    /// The name to show for the document. Defaults to the file name.
    #[arg(long)]
    name: Option<String>,

    #[arg(long, value_enum, default_value = "other")]
    category: DocumentCategory,

    /// The candidate the document belongs to.
    #[arg(long)]
    candidate_id: Option<String>,

    /// The job the document belongs to.
    #[arg(long)]
    job_id: Option<String>,
}

/// Manage contracts, CVs, and other files.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// List documents, most recently uploaded first.
    List {
        #[arg(long, value_enum)]
        category: Option<DocumentCategory>,

        #[arg(long)]
        candidate_id: Option<String>,

        #[arg(long)]
        job_id: Option<String>,
    },

    /// Upload a file.
    Upload(Upload),

    /// Print a temporary link to a document.
    Open { id: String },

    /// Delete a document and its file.
    Delete {
        id: String,

        /// Do not ask for confirmation.
        #[arg(long, short)]
        yes: bool,
    },

    /// Keep the list of documents on screen, updating it as it changes.
    Watch {
        #[arg(long, value_enum)]
        category: Option<DocumentCategory>,
    },
}

fn content_type(file_name: &str) -> &'static str {
    let extension = PathBuf::from(file_name)
        .extension()
        .and_then(OsStr::to_str)
        .map(str::to_lowercase);

    match extension.as_deref() {
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("txt") => "text/plain",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some(_) | None => "application/octet-stream",
    }
}

/// Stores a file and then records it. If the record cannot be written, the
/// stored file is removed again.
async fn upload<'c, B: Backend>(
    documents: &'c mut RemoteCollection<Document, B>,
    backend: &B,
    user: &User,
    upload: Upload,
    bytes: Vec<u8>,
    now: DateTime<Utc>,
) -> Result<&'c Document> {
    let file_name = upload
        .file
        .file_name()
        .and_then(OsStr::to_str)
        .ok_or(Validation::MissingField("file name"))?
        .to_owned();
    let path = Document::storage_path(&user.id, now, &file_name);

    let mut draft = DocumentDraft {
        name: upload.name.unwrap_or_else(|| file_name.clone()),
        category: upload.category,
        file_path: path.clone(),
        public_url: None,
        candidate_id: upload.candidate_id,
        job_id: upload.job_id,
        uploaded_by: Some(user.id.clone()),
        uploaded_at: now,
    }
    .normalized()?;

    backend
        .upload(BUCKET, &path, bytes, content_type(&file_name))
        .await
        .map_err(failed("upload the document"))?;
    draft.public_url = Some(backend.public_url(BUCKET, &path)?.to_string());
    debug!("Stored {} as {}", file_name, path);

    if let Err(e) = documents.create(draft).await {
        if let Err(cleanup) = backend.remove(BUCKET, &[path.as_str()]).await {
            warn!("Failed to remove {} after the upload failed: {}", path, cleanup);
        }
        return Err(failed("upload the document")(e));
    }
    Ok(&documents.items()[0])
}

/// Removes the record first, then the stored file.
async fn remove<B: Backend>(
    documents: &mut RemoteCollection<Document, B>,
    backend: &B,
    id: &str,
    file_path: &str,
) -> Result<()> {
    documents
        .delete(id)
        .await
        .map_err(failed("delete the document"))?;
    backend
        .remove(BUCKET, &[file_path])
        .await
        .map_err(failed("delete the document file"))
}

#[async_trait(?Send)]
impl super::Command for Command {
    async fn execute<B: Backend, S: Storage<RememberPreference>>(
        self,
        context: &mut Context<B, S>,
    ) -> Result<()> {
        let backend = context.backend()?;
        let mut documents = RemoteCollection::<Document, B>::new(Arc::clone(&backend));

        match self {
            Self::List {
                category,
                candidate_id,
                job_id,
            } => {
                let mut query = Query::new();
                if let Some(category) = category {
                    query = query.eq("category", column_value(&category)?);
                }
                if let Some(candidate_id) = candidate_id {
                    query = query.eq("candidate_id", candidate_id);
                }
                if let Some(job_id) = job_id {
                    query = query.eq("job_id", job_id);
                }
                list(&mut documents, query).await
            }
            Self::Upload(args) => {
                let user = context.user().await?;
                let bytes = fs::read(&args.file)?;
                let document =
                    upload(&mut documents, &*backend, &user, args, bytes, Utc::now()).await?;
                print_table([document]);
                Ok(())
            }
            Self::Open { id } => {
                let document = load_one(&mut documents, &id).await?;
                let link = backend
                    .signed_url(BUCKET, &document.file_path, LINK_TTL)
                    .await
                    .map_err(failed("open the document"))?;
                println!("{link}");
                Ok(())
            }
            Self::Delete { id, yes } => {
                let file_path = load_one(&mut documents, &id).await?.file_path.clone();
                let question = "Are you sure you want to delete this document? This action \
                                cannot be undone."
                    .to_owned();
                if !confirm(question, yes).await? {
                    info!("Nothing was deleted");
                    return Ok(());
                }

                remove(&mut documents, &*backend, &id, &file_path).await?;
                println!("Deleted document {id}");
                Ok(())
            }
            Self::Watch { category } => {
                let mut query = Query::new();
                if let Some(category) = category {
                    query = query.eq("category", column_value(&category)?);
                }
                watch(context, &mut documents, query).await
            }
        }
    }
}
