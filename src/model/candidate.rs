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
    display_option, display_timestamp, fmt_value, optional, optional_email, Draft, Entity,
};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub(crate) enum CandidateStatus {
    #[default]
    New,
    Screening,
    Interview,
    Offer,
    Placed,
    Rejected,
    Archived,
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_value(self, f)
    }
}

#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize, Tabled)]
pub(crate) struct Candidate {
    #[tabled(rename = "ID")]
    pub(crate) id: String,
    #[tabled(rename = "Name", display_with = "display_option")]
    pub(crate) full_name: Option<String>,
    #[tabled(rename = "Email", display_with = "display_option")]
    pub(crate) email: Option<String>,
    #[tabled(rename = "Phone", display_with = "display_option")]
    pub(crate) phone: Option<String>,
    #[tabled(rename = "Location", display_with = "display_option")]
    pub(crate) location: Option<String>,
    #[tabled(rename = "Current Title", display_with = "display_option")]
    pub(crate) current_title: Option<String>,
    #[tabled(rename = "Status")]
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub(crate) status: CandidateStatus,
    #[tabled(skip)]
    pub(crate) source: Option<String>,
    #[tabled(skip)]
    pub(crate) notes: Option<String>,
    #[tabled(rename = "Job", display_with = "display_option")]
    pub(crate) job_id: Option<String>,
    #[tabled(rename = "CV", display_with("Self::display_cv", self))]
    #[serde(default)]
    pub(crate) cv_document_id: Option<String>,
    #[tabled(rename = "Created", display_with = "display_timestamp")]
    pub(crate) created_at: DateTime<Utc>,
    #[tabled(skip)]
    #[serde(default)]
    pub(crate) updated_at: Option<DateTime<Utc>>,
}

impl Candidate {
    fn display_cv(&self) -> String {
        if self.cv_document_id.is_some() {
            "yes".to_owned()
        } else {
            String::new()
        }
    }
}

impl Entity for Candidate {
    const TABLE: &'static str = "candidates";
    const NOUN: &'static str = "candidate";

    type Draft = CandidateDraft;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Args, Clone, Debug, Default, Serialize)]
pub(crate) struct CandidateDraft {
    #[arg(long)]
    pub(crate) full_name: Option<String>,

    #[arg(long)]
    pub(crate) email: Option<String>,

    #[arg(long)]
    pub(crate) phone: Option<String>,

    #[arg(long)]
    pub(crate) location: Option<String>,

    /// The candidate's current job title.
    #[arg(long)]
    pub(crate) current_title: Option<String>,

    #[arg(long, value_enum, default_value = "new")]
    pub(crate) status: CandidateStatus,

    /// Where the candidate was found.
    #[arg(long)]
    pub(crate) source: Option<String>,

    #[arg(long)]
    pub(crate) notes: Option<String>,

    /// The job the candidate is being put forward for. This is not checked
    /// against the list of jobs.
    #[arg(long)]
    pub(crate) job_id: Option<String>,

    /// The document holding the candidate's CV.
    #[arg(long)]
    pub(crate) cv_document_id: Option<String>,
}

impl Draft for CandidateDraft {
    fn normalized(self) -> Result<Self, Validation> {
        Ok(Self {
            full_name: optional(self.full_name),
            email: optional_email(self.email)?,
            phone: optional(self.phone),
            location: optional(self.location),
            current_title: optional(self.current_title),
            status: self.status,
            source: optional(self.source),
            notes: optional(self.notes),
            job_id: optional(self.job_id),
            cv_document_id: optional(self.cv_document_id),
        })
    }
}
