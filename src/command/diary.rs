// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use clap::Subcommand;

use crate::{
    backend::{Backend, Query},
    collection::RemoteCollection,
    error::Result,
    model::diary::{DiaryDraft, DiaryEntry, EntryType, Priority},
    preference::RememberPreference,
    storage::Storage,
};

use super::{column_value, create, delete, list, update, Context};

/// Keep notes and tasks in your diary.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// List your diary entries, newest first.
    List {
        #[arg(long = "type", value_enum)]
        entry_type: Option<EntryType>,

        #[arg(long, value_enum)]
        priority: Option<Priority>,
    },

    /// Write a diary entry.
    Add(DiaryDraft),

    /// Tick or untick an item on an entry's checklist.
    Toggle { id: String, item_id: String },

    /// Delete a diary entry.
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
        let mut entries = RemoteCollection::<DiaryEntry, B>::new(context.backend()?);

        match self {
            Self::List {
                entry_type,
                priority,
            } => {
                let mut query = Query::new();
                if let Some(entry_type) = entry_type {
                    query = query.eq("entry_type", column_value(&entry_type)?);
                }
                if let Some(priority) = priority {
                    query = query.eq("priority", column_value(&priority)?);
                }
                list(&mut entries, query).await
            }
            Self::Add(mut draft) => {
                draft.user_id = Some(context.user().await?.id);
                create(&mut entries, draft).await
            }
            Self::Toggle { id, item_id } => {
                update(&mut entries, &id, |entry| entry.toggle(&item_id)).await
            }
            Self::Delete { id, yes } => delete(&mut entries, &id, yes).await,
        }
    }
}
