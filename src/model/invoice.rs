// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::error::Validation;

use super::{display_option, fmt_value, optional, required, Draft, Entity};

const DEFAULT_CURRENCY: &str = "GBP";

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub(crate) enum InvoiceStatus {
    #[default]
    Draft,
    Sent,
    Paid,
    Overdue,
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_value(self, f)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, Tabled)]
pub(crate) struct Invoice {
    #[tabled(rename = "ID")]
    pub(crate) id: String,
    #[tabled(rename = "Number")]
    pub(crate) invoice_number: String,
    #[tabled(rename = "Client", display_with = "display_option")]
    pub(crate) client_id: Option<String>,
    #[tabled(rename = "Amount", display_with("Self::display_amount", self))]
    pub(crate) amount: f64,
    #[tabled(skip)]
    pub(crate) currency: String,
    #[tabled(rename = "Status")]
    pub(crate) status: InvoiceStatus,
    #[tabled(rename = "Issued")]
    pub(crate) issue_date: NaiveDate,
    #[tabled(rename = "Due", display_with = "display_option")]
    pub(crate) due_date: Option<NaiveDate>,
    #[tabled(skip)]
    pub(crate) description: Option<String>,
    #[tabled(skip)]
    pub(crate) pdf_url: Option<String>,
    #[tabled(skip)]
    pub(crate) created_at: DateTime<Utc>,
    #[tabled(skip)]
    #[serde(default)]
    pub(crate) updated_at: Option<DateTime<Utc>>,
}

impl Invoice {
    fn display_amount(&self) -> String {
        format!("{} {:.2}", self.currency, self.amount)
    }
}

impl Entity for Invoice {
    const TABLE: &'static str = "invoices";
    const NOUN: &'static str = "invoice";
    const ORDER_BY: &'static str = "issue_date";

    type Draft = InvoiceDraft;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Args, Clone, Debug, Serialize)]
pub(crate) struct InvoiceDraft {
    #[arg(long)]
    pub(crate) invoice_number: String,

    /// The client being invoiced.
    #[arg(long)]
    pub(crate) client_id: Option<String>,

    #[arg(long)]
    pub(crate) amount: f64,

    #[arg(long, default_value = DEFAULT_CURRENCY)]
    pub(crate) currency: String,

    #[arg(long, value_enum, default_value = "draft")]
    pub(crate) status: InvoiceStatus,

    /// The date of issue, as YYYY-MM-DD. Defaults to today.
    #[arg(long)]
    pub(crate) issue_date: Option<NaiveDate>,

    /// The date payment is due, as YYYY-MM-DD.
    #[arg(long)]
    pub(crate) due_date: Option<NaiveDate>,

    #[arg(long)]
    pub(crate) description: Option<String>,
}

impl Draft for InvoiceDraft {
    fn normalized(self) -> Result<Self, Validation> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(Validation::Amount);
        }

        Ok(Self {
            invoice_number: required(self.invoice_number, "invoice number")?,
            client_id: optional(self.client_id),
            amount: self.amount,
            currency: optional(Some(self.currency)).unwrap_or_else(|| DEFAULT_CURRENCY.to_owned()),
            status: self.status,
            issue_date: self
                .issue_date
                .or_else(|| Some(Utc::now().date_naive())),
            due_date: self.due_date,
            description: optional(self.description),
        })
    }
}
