// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

//! The records the back office keeps, as the backend stores them.

pub(crate) mod candidate;
pub(crate) mod client;
pub(crate) mod diary;
pub(crate) mod document;
pub(crate) mod invoice;
pub(crate) mod job;

use std::fmt;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use inflector::Inflector as _;
use serde::{de::DeserializeOwned, Serialize};
use tabled::Tabled;

use crate::error::Validation;

/// A record kept in one backend table.
pub(crate) trait Entity:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Tabled + Send + Sync + 'static
{
    const TABLE: &'static str;

    /// What one record is called when talking to people.
    const NOUN: &'static str;

    /// Lists are ordered by this column, newest first.
    const ORDER_BY: &'static str = "created_at";

    /// Whether the table has an `updated_at` column to stamp on changes.
    const TRACKS_UPDATES: bool = true;

    /// The fields supplied when creating a record.
    type Draft: Draft;

    fn id(&self) -> &str;
}

pub(crate) trait Draft: Serialize + Send + Sync + Sized {
    /// Tidies up user input and checks it before it goes anywhere near the
    /// backend.
    fn normalized(self) -> Result<Self, Validation>;
}

/// Formats a value-enum variant the way it is shown to people.
pub(crate) fn fmt_value<T: ValueEnum>(value: &T, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let value = value.to_possible_value().ok_or(fmt::Error)?;
    write!(f, "{}", value.get_name().to_title_case())
}

pub(crate) fn display_option<T: fmt::Display>(value: &Option<T>) -> String {
    value.as_ref().map_or_else(String::new, ToString::to_string)
}

pub(crate) fn display_timestamp(value: &DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M").to_string()
}

/// Trims a required field, rejecting it if nothing is left.
pub(crate) fn required(value: String, field: &'static str) -> Result<String, Validation> {
    let value = value.trim();
    if value.is_empty() {
        Err(Validation::MissingField(field))
    } else {
        Ok(value.to_owned())
    }
}

/// Trims an optional field. Blank values become absent.
pub(crate) fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// Trims an optional email address and checks that it looks like one.
pub(crate) fn optional_email(value: Option<String>) -> Result<Option<String>, Validation> {
    match optional(value) {
        Some(email) if !email.contains('@') => Err(Validation::Email),
        email => Ok(email),
    }
}
