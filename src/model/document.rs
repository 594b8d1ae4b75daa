// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::error::Validation;

use super::{display_option, display_timestamp, fmt_value, optional, required, Draft, Entity};

/// The storage bucket that holds uploaded files.
pub(crate) const BUCKET: &str = "documents";

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub(crate) enum DocumentCategory {
    #[value(name = "cv")]
    Cv,
    Contract,
    Invoice,
    #[default]
    Other,
}

impl fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Cv => f.write_str("CV"),
            Self::Contract | Self::Invoice | Self::Other => fmt_value(self, f),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, Tabled)]
pub(crate) struct Document {
    #[tabled(rename = "ID")]
    pub(crate) id: String,
    #[tabled(rename = "Name")]
    pub(crate) name: String,
    #[tabled(rename = "Category")]
    pub(crate) category: DocumentCategory,
    #[tabled(skip)]
    pub(crate) file_path: String,
    #[tabled(skip)]
    pub(crate) public_url: Option<String>,
    #[tabled(rename = "Candidate", display_with = "display_option")]
    pub(crate) candidate_id: Option<String>,
    #[tabled(rename = "Job", display_with = "display_option")]
    pub(crate) job_id: Option<String>,
    #[tabled(skip)]
    pub(crate) uploaded_by: Option<String>,
    #[tabled(rename = "Uploaded", display_with = "display_timestamp")]
    pub(crate) uploaded_at: DateTime<Utc>,
}

impl Document {
    /// Where an upload is kept in the bucket. Prefixing the file name with
    /// the upload time keeps repeated uploads of the same file apart.
    pub(crate) fn storage_path(user_id: &str, now: DateTime<Utc>, file_name: &str) -> String {
        format!("{}/{}_{}", user_id, now.timestamp_millis(), file_name)
    }
}

impl Entity for Document {
    const TABLE: &'static str = "documents";
    const NOUN: &'static str = "document";
    const ORDER_BY: &'static str = "uploaded_at";
    const TRACKS_UPDATES: bool = false;

    type Draft = DocumentDraft;

    fn id(&self) -> &str {
        &self.id
    }
}

/// The row recorded for a file once it has been stored.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct DocumentDraft {
    pub(crate) name: String,
    pub(crate) category: DocumentCategory,
    pub(crate) file_path: String,
    pub(crate) public_url: Option<String>,
    pub(crate) candidate_id: Option<String>,
    pub(crate) job_id: Option<String>,
    pub(crate) uploaded_by: Option<String>,
    pub(crate) uploaded_at: DateTime<Utc>,
}

impl Draft for DocumentDraft {
    fn normalized(self) -> Result<Self, Validation> {
        Ok(Self {
            name: required(self.name, "name")?,
            file_path: required(self.file_path, "file path")?,
            public_url: optional(self.public_url),
            candidate_id: optional(self.candidate_id),
            job_id: optional(self.job_id),
            uploaded_by: optional(self.uploaded_by),
            ..self
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;
    use serde_test::{assert_tokens, Token};

    use super::*;

    #[test]
    fn storage_path_is_per_user_and_timestamped() {
        let now = Utc.timestamp_millis_opt(1_709_283_600_123).unwrap();

        assert_eq!(
            Document::storage_path("u-1", now, "cv.pdf"),
            "u-1/1709283600123_cv.pdf"
        );
    }

    #[test]
    fn category_wire_format() {
        assert_tokens(
            &DocumentCategory::Cv,
            &[Token::UnitVariant {
                name: "DocumentCategory",
                variant: "cv",
            }],
        );
        assert_eq!(DocumentCategory::Cv.to_string(), "CV");
        assert_eq!(DocumentCategory::Contract.to_string(), "Contract");
    }

    #[test]
    fn draft_needs_a_name() {
        let draft = DocumentDraft {
            name: "  ".to_owned(),
            category: DocumentCategory::Cv,
            file_path: "u-1/1_cv.pdf".to_owned(),
            public_url: None,
            candidate_id: Some(String::new()),
            job_id: None,
            uploaded_by: None,
            uploaded_at: Utc::now(),
        };

        assert_eq!(
            draft.normalized().err(),
            Some(Validation::MissingField("name"))
        );
    }
}
