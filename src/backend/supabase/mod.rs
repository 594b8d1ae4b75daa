// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

//! A client for a Supabase project: GoTrue for authentication, PostgREST for
//! table rows, the storage API for objects, and Realtime for change
//! notifications.

mod auth;
mod message;
mod objects;
mod realtime;
mod rest;
pub(crate) mod session;

use chrono::{Duration, Utc};
use futures_util::lock::Mutex;
use log::{debug, warn};
use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    Response,
};
use secrecy::{ExposeSecret as _, SecretString};
use serde::Deserialize;
use tokio::sync::broadcast;
use url::Url;

use crate::{
    backend::{AuthChange, AuthEvent},
    config::BackendConfig,
    error::{self, Error, Result},
    metadata, storage,
};

/// Sessions are refreshed when they are this close to expiring.
const REFRESH_MARGIN_SECS: i64 = 60;

pub(crate) struct Supabase<S: storage::Storage<session::Data>> {
    http: reqwest::Client,
    url: Url,
    api_key: SecretString,
    storage: Mutex<S>,
    events: broadcast::Sender<AuthChange>,
}

impl<S: storage::Storage<session::Data>> Supabase<S> {
    pub(crate) fn new(config: BackendConfig, storage: S) -> Result<Self> {
        let mut api_key = HeaderValue::from_str(config.api_key.expose_secret())
            .map_err(|_| Error::Config("the API key is not a valid header value".to_owned()))?;
        api_key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        let _ = headers.insert("apikey", api_key);

        let http = reqwest::Client::builder()
            .user_agent(metadata::CLIENT_USER_AGENT.as_str())
            .default_headers(headers)
            .build()?;
        let (events, _) = broadcast::channel(16);

        Ok(Self {
            http,
            url: config.url,
            api_key: config.api_key,
            storage: Mutex::new(storage),
            events,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.url.clone();
        let _ = url
            .path_segments_mut()
            .map_err(|()| Error::Config(format!("{} cannot be used as a base URL", self.url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn emit(&self, event: AuthEvent, session: Option<&session::Data>) {
        let change = AuthChange {
            event,
            session: session.map(session::Data::session),
        };
        // Nobody listening is fine.
        let _ = self.events.send(change);
    }

    /// Returns the stored session, refreshing it first if it is about to
    /// expire. A refresh the server refuses ends the session.
    async fn current(&self) -> Result<Option<session::Data>> {
        let mut storage = self.storage.lock().await;
        let Some(data) = storage.get().await? else {
            return Ok(None);
        };
        if !data.expires_within(Duration::seconds(REFRESH_MARGIN_SECS), Utc::now()) {
            return Ok(Some(data));
        }

        debug!("Session is about to expire, refreshing");
        match self.refresh(&data).await {
            Ok(refreshed) => {
                storage.update(&refreshed).await?;
                self.emit(AuthEvent::TokenRefreshed, Some(&refreshed));
                Ok(Some(refreshed))
            }
            Err(Error::AuthRejected(message)) => {
                warn!("Session could not be refreshed: {}", message);
                storage.clear().await?;
                self.emit(AuthEvent::SignedOut, None);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// The bearer token for data requests: the user's access token when
    /// signed in, otherwise the project's public key.
    async fn bearer(&self) -> Result<String> {
        Ok(match self.current().await? {
            Some(data) => data.access_token().to_owned(),
            None => self.api_key.expose_secret().clone(),
        })
    }

    async fn authorized(&self, request: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        let token = self.bearer().await?;
        Ok(request.header(header::AUTHORIZATION, format!("Bearer {token}")))
    }
}

/// The error shapes the various services reply with.
#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)
    }
}

fn error_message(body: String) -> String {
    serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or(body)
}

/// Turns a non-success response into an error carrying the server's message.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = error_message(response.text().await?);
    debug!("Server replied {}: {}", status, message);
    Err(error::Backend::Api {
        status: status.as_u16(),
        message,
    }
    .into())
}
