// SPDX-FileCopyrightText: 2022-2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{io, result};

use thiserror::Error;

use crate::gate;

pub(crate) type Result<T, E = Error> = result::Result<T, E>;

#[derive(Error, Debug)]
pub(crate) enum Error {
    #[error("IO operation failed: {0}")]
    Io(#[from] io::Error),
    #[error("JSON format error: {0}")]
    Json(serde_json::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("sign-in rejected: {0}")]
    AuthRejected(String),
    #[error("access denied ({0})")]
    AccessDenied(gate::Denial),
    #[error("you are not signed in")]
    NotSignedIn,
    #[error("backend unavailable: {0}")]
    BackendUnavailable(#[from] Backend),
    #[error("invalid input: {0}")]
    Validation(#[from] Validation),
    #[error("data conversion error: {0}")]
    Conversion(#[from] Conversion),
    #[error("storage error: {0}")]
    Storage(#[from] Storage),
    #[error("password retrieval error: {0}")]
    Password(#[from] Password),
    #[error(r#"there is no record in "{table}" with ID "{}""#, .id.escape_default())]
    RecordNotFound { table: String, id: String },
    #[error("command execution failed")]
    Command,
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Whether this error came from talking to the backend, as opposed to
    /// something we rejected locally.
    pub(crate) const fn is_backend(&self) -> bool {
        matches!(*self, Self::BackendUnavailable(_) | Self::RecordNotFound { .. })
    }
}

impl From<pinentry::Error> for Error {
    fn from(value: pinentry::Error) -> Self {
        // LINT: Deliberate fall-through that should catch future cases added to
        // the enum.
        #[allow(
            clippy::wildcard_enum_match_arm,
            clippy::match_wildcard_for_single_variants
        )]
        match value {
            pinentry::Error::Cancelled | pinentry::Error::Timeout => Self::Cancelled,
            pinentry::Error::Io(e) => Self::Io(e),
            _ => Self::Password(Password::Pinentry(value)),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        // LINT: Deliberate fall-through that should catch future cases added to
        // the enum.
        #[allow(clippy::wildcard_enum_match_arm)]
        match value.classify() {
            serde_json::error::Category::Io => Self::Io(value.into()),
            _ => Self::Json(value),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Self::BackendUnavailable(Backend::Http(value))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::BackendUnavailable(Backend::Websocket(value))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::Io(value.into())
    }
}

#[derive(Error, Debug)]
pub(crate) enum Backend {
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),
    #[error("WebSocket error: {0}")]
    Websocket(tokio_tungstenite::tungstenite::Error),
    #[error("server error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("server sent a response that we did not expect to receive: {0}")]
    UnexpectedResponse(String),
    #[error("server stream terminated during processing")]
    StreamEnded,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub(crate) enum Validation {
    #[error("please enter a valid email address")]
    Email,
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("please enter a valid amount")]
    Amount,
    #[error(r#"checklist item "{}" does not exist"#, .0.escape_default())]
    ChecklistItem(String),
}

#[derive(Error, Debug)]
pub(crate) enum Conversion {
    #[error(r#"stored preference "{}" is neither "true" nor "false""#, .0.escape_default())]
    Preference(String),
    #[error("timestamp {0} is out of range")]
    Timestamp(i64),
}

#[derive(Error, Debug)]
pub(crate) enum Storage {
    #[error("no platform data directory is available")]
    // LINT: Only constructed when Keychain storage is compiled in.
    #[allow(dead_code)]
    NoProjectDirs,
    #[cfg(feature = "secret-service")]
    #[error("secret service error: {0}")]
    SecretService(#[from] oo7::Error),
    #[cfg(feature = "keychain")]
    #[error("keychain error: {0}")]
    Keychain(#[from] security_framework::base::Error),
}

#[derive(Error, Debug)]
pub(crate) enum Password {
    #[error("no password prompt available")]
    NoPrompt,
    #[error("Pinentry implementation error: {0}")]
    Pinentry(pinentry::Error),
}

