// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use chrono::{DateTime, Utc};
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};
use tabled::Tabled;
use uuid::Uuid;

use crate::error::Validation;

use super::{display_timestamp, fmt_value, optional, required, Draft, Entity};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub(crate) enum EntryType {
    #[default]
    Note,
    Task,
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_value(self, f)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_value(self, f)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub(crate) struct ChecklistItem {
    pub(crate) id: String,
    pub(crate) text: String,
    pub(crate) completed: bool,
}

impl ChecklistItem {
    fn new(text: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text,
            completed: false,
        }
    }
}

#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize, Tabled)]
pub(crate) struct DiaryEntry {
    #[tabled(rename = "ID")]
    pub(crate) id: String,
    #[tabled(skip)]
    pub(crate) user_id: Option<String>,
    #[tabled(rename = "Type")]
    pub(crate) entry_type: EntryType,
    #[tabled(rename = "Priority")]
    pub(crate) priority: Priority,
    #[tabled(rename = "Content")]
    pub(crate) content: String,
    #[tabled(rename = "Checklist", display_with("Self::display_checklist", self))]
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub(crate) checklist: Vec<ChecklistItem>,
    #[tabled(rename = "Created", display_with = "display_timestamp")]
    pub(crate) created_at: DateTime<Utc>,
}

impl DiaryEntry {
    /// Flips the completion of one checklist item.
    pub(crate) fn toggle(&mut self, item_id: &str) -> Result<(), Validation> {
        let item = self
            .checklist
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| Validation::ChecklistItem(item_id.to_owned()))?;
        item.completed = !item.completed;
        Ok(())
    }

    fn display_checklist(&self) -> String {
        self.checklist
            .iter()
            .map(|item| {
                format!(
                    "[{}] {} ({})",
                    if item.completed { "x" } else { " " },
                    item.text,
                    item.id
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Entity for DiaryEntry {
    const TABLE: &'static str = "diary_entries";
    const NOUN: &'static str = "diary entry";
    const TRACKS_UPDATES: bool = false;

    type Draft = DiaryDraft;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Args, Clone, Debug, Serialize)]
pub(crate) struct DiaryDraft {
    /// The entry is filed under the signed-in user.
    #[arg(skip)]
    pub(crate) user_id: Option<String>,

    pub(crate) content: String,

    #[arg(long = "type", value_enum, default_value = "note")]
    pub(crate) entry_type: EntryType,

    #[arg(long, value_enum, default_value = "medium")]
    pub(crate) priority: Priority,

    /// A checklist item. May be given more than once.
    #[arg(long = "item")]
    #[serde(skip)]
    pub(crate) items: Vec<String>,

    #[arg(skip)]
    pub(crate) checklist: Vec<ChecklistItem>,
}

impl Draft for DiaryDraft {
    fn normalized(self) -> Result<Self, Validation> {
        let checklist = self
            .checklist
            .into_iter()
            .chain(
                self.items
                    .into_iter()
                    .filter_map(|text| optional(Some(text)))
                    .map(ChecklistItem::new),
            )
            .collect();

        Ok(Self {
            user_id: optional(self.user_id),
            content: required(self.content, "content")?,
            entry_type: self.entry_type,
            priority: self.priority,
            items: Vec::new(),
            checklist,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn draft(content: &str, items: &[&str]) -> DiaryDraft {
        DiaryDraft {
            user_id: Some("u-1".to_owned()),
            content: content.to_owned(),
            entry_type: EntryType::Task,
            priority: Priority::High,
            items: items.iter().map(|&item| item.to_owned()).collect(),
            checklist: Vec::new(),
        }
    }

    #[test]
    fn items_become_checklist() -> Result<(), Validation> {
        let draft = draft(" Call Acme ", &["agree rate", " ", "send terms"]).normalized()?;
        let row = serde_json::to_value(&draft).expect("row");

        assert_eq!(row["content"], json!("Call Acme"));
        assert_eq!(row["entry_type"], json!("task"));
        assert_eq!(row["priority"], json!("high"));
        assert!(row.get("items").is_none());

        let checklist = row["checklist"].as_array().expect("checklist");
        assert_eq!(checklist.len(), 2);
        assert_eq!(checklist[0]["text"], json!("agree rate"));
        assert_eq!(checklist[0]["completed"], json!(false));
        assert_ne!(checklist[0]["id"], checklist[1]["id"]);
        Ok(())
    }

    #[test]
    fn content_is_required() {
        assert_eq!(
            draft("\n", &[]).normalized().err(),
            Some(Validation::MissingField("content"))
        );
    }

    #[test]
    fn toggle_flips_one_item() {
        let mut entry: DiaryEntry = serde_json::from_value(json!({
            "id": "d-1",
            "user_id": "u-1",
            "entry_type": "task",
            "priority": "low",
            "content": "Chase invoices",
            "checklist": [
                { "id": "i-1", "text": "INV-001", "completed": false },
                { "id": "i-2", "text": "INV-002", "completed": true },
            ],
            "created_at": "2024-03-01T09:00:00Z",
        }))
        .expect("entry");

        entry.toggle("i-2").expect("toggle");
        assert!(!entry.checklist[0].completed);
        assert!(!entry.checklist[1].completed);

        assert_eq!(
            entry.toggle("i-3"),
            Err(Validation::ChecklistItem("i-3".to_owned()))
        );
    }
}
