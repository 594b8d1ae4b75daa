// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use chrono::{DateTime, Utc};
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};
use tabled::Tabled;

use crate::error::Validation;

use super::{
    display_option, display_timestamp, fmt_value, optional, optional_email, required, Draft,
    Entity,
};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ClientStatus {
    Active,
    #[default]
    Prospect,
    Dormant,
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_value(self, f)
    }
}

/// A company the agency recruits for.
#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize, Tabled)]
pub(crate) struct Client {
    #[tabled(rename = "ID")]
    pub(crate) id: String,
    #[tabled(rename = "Company", display_with = "display_option")]
    pub(crate) company_name: Option<String>,
    #[tabled(rename = "Contact", display_with = "display_option")]
    #[serde(rename = "name")]
    pub(crate) contact_name: Option<String>,
    #[tabled(rename = "Email", display_with = "display_option")]
    pub(crate) email: Option<String>,
    #[tabled(rename = "Phone", display_with = "display_option")]
    pub(crate) phone: Option<String>,
    #[tabled(rename = "Location", display_with = "display_option")]
    pub(crate) location: Option<String>,
    #[tabled(rename = "Sector", display_with = "display_option")]
    pub(crate) sector: Option<String>,
    #[tabled(rename = "Status")]
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub(crate) status: ClientStatus,
    #[tabled(skip)]
    pub(crate) notes: Option<String>,
    #[tabled(rename = "Created", display_with = "display_timestamp")]
    pub(crate) created_at: DateTime<Utc>,
    #[tabled(skip)]
    #[serde(default)]
    pub(crate) updated_at: Option<DateTime<Utc>>,
}

impl Entity for Client {
    const TABLE: &'static str = "clients";
    const NOUN: &'static str = "client";

    type Draft = ClientDraft;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Args, Clone, Debug, Serialize)]
pub(crate) struct ClientDraft {
    #[arg(long)]
    pub(crate) company_name: String,

    /// The name of the main contact at the company.
    #[arg(long)]
    #[serde(rename = "name")]
    pub(crate) contact_name: Option<String>,

    #[arg(long)]
    pub(crate) email: Option<String>,

    #[arg(long)]
    pub(crate) phone: Option<String>,

    #[arg(long)]
    pub(crate) location: Option<String>,

    #[arg(long)]
    pub(crate) sector: Option<String>,

    #[arg(long, value_enum, default_value = "prospect")]
    pub(crate) status: ClientStatus,

    #[arg(long)]
    pub(crate) notes: Option<String>,
}

impl Draft for ClientDraft {
    fn normalized(self) -> Result<Self, Validation> {
        Ok(Self {
            company_name: required(self.company_name, "company name")?,
            contact_name: optional(self.contact_name),
            email: optional_email(self.email)?,
            phone: optional(self.phone),
            location: optional(self.location),
            sector: optional(self.sector),
            status: self.status,
            notes: optional(self.notes),
        })
    }
}
