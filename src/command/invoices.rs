// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use clap::Subcommand;

use crate::{
    backend::{Backend, Query},
    collection::RemoteCollection,
    error::Result,
    model::invoice::{Invoice, InvoiceDraft, InvoiceStatus},
    preference::RememberPreference,
    storage::Storage,
};

use super::{column_value, create, delete, list, update, Context};

/// Manage invoices.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// List invoices, most recently issued first.
    List {
        #[arg(long, value_enum)]
        status: Option<InvoiceStatus>,

        /// Only show invoices for this client.
        #[arg(long)]
        client_id: Option<String>,
    },

    /// Raise an invoice.
    Add(InvoiceDraft),

    /// Change the status of an invoice.
    SetStatus {
        id: String,

        #[arg(value_enum)]
        status: InvoiceStatus,
    },

    /// Delete an invoice.
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
        let mut invoices = RemoteCollection::<Invoice, B>::new(context.backend()?);

        match self {
            Self::List { status, client_id } => {
                let mut query = Query::new();
                if let Some(status) = status {
                    query = query.eq("status", column_value(&status)?);
                }
                if let Some(client_id) = client_id {
                    query = query.eq("client_id", client_id);
                }
                list(&mut invoices, query).await
            }
            Self::Add(draft) => create(&mut invoices, draft).await,
            Self::SetStatus { id, status } => {
                update(&mut invoices, &id, |invoice| {
                    invoice.status = status;
                    Ok(())
                })
                .await
            }
            Self::Delete { id, yes } => delete(&mut invoices, &id, yes).await,
        }
    }
}
