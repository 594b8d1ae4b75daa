// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use chrono::{DateTime, Utc};
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::error::Validation;

use super::{
    display_option, display_timestamp, fmt_value, optional, required, Draft, Entity,
};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub(crate) enum JobStatus {
    #[default]
    Draft,
    Live,
    Closed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_value(self, f)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
pub(crate) enum JobType {
    #[default]
    Permanent,
    Contract,
    Temporary,
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_value(self, f)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, Tabled)]
pub(crate) struct Job {
    #[tabled(rename = "ID")]
    pub(crate) id: String,
    #[tabled(rename = "Title")]
    pub(crate) title: String,
    #[tabled(rename = "Location")]
    pub(crate) location: String,
    #[tabled(rename = "Salary", display_with = "display_option")]
    pub(crate) salary_range: Option<String>,
    #[tabled(rename = "Type")]
    pub(crate) job_type: JobType,
    #[tabled(skip)]
    pub(crate) description: String,
    #[tabled(skip)]
    #[serde(default)]
    pub(crate) requirements: Option<Vec<String>>,
    #[tabled(skip)]
    #[serde(default)]
    pub(crate) benefits: Option<Vec<String>>,
    #[tabled(rename = "Status")]
    pub(crate) status: JobStatus,
    #[tabled(rename = "Created", display_with = "display_timestamp")]
    pub(crate) created_at: DateTime<Utc>,
    #[tabled(skip)]
    #[serde(default)]
    pub(crate) updated_at: Option<DateTime<Utc>>,
    #[tabled(skip)]
    #[serde(default)]
    pub(crate) expires_at: Option<DateTime<Utc>>,
    #[tabled(skip)]
    #[serde(default)]
    pub(crate) closed_at: Option<DateTime<Utc>>,
    #[tabled(rename = "Views", display_with = "display_option")]
    #[serde(default)]
    pub(crate) view_count: Option<i64>,
    #[tabled(rename = "Applications", display_with = "display_option")]
    #[serde(default)]
    pub(crate) application_count: Option<i64>,
}

impl Job {
    /// Changes the status, recording when the job was closed.
    pub(crate) fn set_status(&mut self, status: JobStatus, now: DateTime<Utc>) {
        self.status = status;
        self.closed_at = (status == JobStatus::Closed).then_some(now);
    }

    /// Case-insensitive search over the title and location.
    pub(crate) fn matches(&self, search: &str) -> bool {
        let search = search.trim().to_lowercase();
        search.is_empty()
            || self.title.to_lowercase().contains(&search)
            || self.location.to_lowercase().contains(&search)
    }

    /// A new draft posting with the same details.
    pub(crate) fn duplicate(&self) -> JobDraft {
        JobDraft {
            title: format!("{} (Copy)", self.title),
            location: self.location.clone(),
            salary_range: self.salary_range.clone(),
            job_type: self.job_type,
            description: self.description.clone(),
            requirements: self.requirements.clone().unwrap_or_default(),
            benefits: self.benefits.clone().unwrap_or_default(),
            status: JobStatus::Draft,
            expires_at: self.expires_at,
        }
    }
}

impl Entity for Job {
    const TABLE: &'static str = "jobs";
    const NOUN: &'static str = "job";

    type Draft = JobDraft;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Args, Clone, Debug, Serialize)]
pub(crate) struct JobDraft {
    /// The title of the role.
    #[arg(long)]
    pub(crate) title: String,

    /// Where the role is based.
    #[arg(long)]
    pub(crate) location: String,

    /// The advertised salary, as free text.
    #[arg(long)]
    pub(crate) salary_range: Option<String>,

    #[arg(long, value_enum, default_value = "permanent")]
    pub(crate) job_type: JobType,

    #[arg(long, default_value = "")]
    pub(crate) description: String,

    /// A requirement of the role. May be given more than once.
    #[arg(long = "requirement")]
    pub(crate) requirements: Vec<String>,

    /// A benefit of the role. May be given more than once.
    #[arg(long = "benefit")]
    pub(crate) benefits: Vec<String>,

    #[arg(long, value_enum, default_value = "draft")]
    pub(crate) status: JobStatus,

    /// When the posting expires, as an RFC 3339 timestamp.
    #[arg(long)]
    pub(crate) expires_at: Option<DateTime<Utc>>,
}

impl Draft for JobDraft {
    fn normalized(self) -> Result<Self, Validation> {
        let trim_all = |items: Vec<String>| -> Vec<String> {
            items
                .into_iter()
                .filter_map(|item| optional(Some(item)))
                .collect()
        };

        Ok(Self {
            title: required(self.title, "title")?,
            location: required(self.location, "location")?,
            salary_range: optional(self.salary_range),
            description: self.description.trim().to_owned(),
            requirements: trim_all(self.requirements),
            benefits: trim_all(self.benefits),
            ..self
        })
    }
}
