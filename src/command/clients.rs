// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use clap::Subcommand;

use crate::{
    backend::{Backend, Query},
    collection::RemoteCollection,
    error::Result,
    model::client::{Client, ClientDraft, ClientStatus},
    preference::RememberPreference,
    storage::Storage,
};

use super::{column_value, create, delete, list, update, Context};

/// Manage client companies.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// List clients, newest first.
    List {
        #[arg(long, value_enum)]
        status: Option<ClientStatus>,

        #[arg(long)]
        sector: Option<String>,
    },

    /// Add a client.
    Add(ClientDraft),

    /// Change the status of a client.
    SetStatus {
        id: String,

        #[arg(value_enum)]
        status: ClientStatus,
    },

    /// Delete a client.
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
        let mut clients = RemoteCollection::<Client, B>::new(context.backend()?);

        match self {
            Self::List { status, sector } => {
                let mut query = Query::new();
                if let Some(status) = status {
                    query = query.eq("status", column_value(&status)?);
                }
                if let Some(sector) = sector {
                    query = query.eq("sector", sector);
                }
                list(&mut clients, query).await
            }
            Self::Add(draft) => create(&mut clients, draft).await,
            Self::SetStatus { id, status } => {
                update(&mut clients, &id, |client| {
                    client.status = status;
                    Ok(())
                })
                .await
            }
            Self::Delete { id, yes } => delete(&mut clients, &id, yes).await,
        }
    }
}
