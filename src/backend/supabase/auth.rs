// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info};
use reqwest::{header, StatusCode};
use secrecy::{ExposeSecret as _, SecretString};
use serde_json::{json, Value};

use crate::{
    backend::{self, AuthChange, AuthEvent, Subscription},
    error::{Error, Result},
    storage,
};

use super::{check, error_message, session, Supabase};

impl<S: storage::Storage<session::Data>> Supabase<S> {
    /// Exchanges a grant for a new session. Credentials the server refuses
    /// are reported as a rejected sign-in, with the server's message.
    async fn grant(&self, grant_type: &str, body: Value) -> Result<session::Data> {
        let mut url = self.endpoint(&["auth", "v1", "token"])?;
        let _ = url.query_pairs_mut().append_pair("grant_type", grant_type);

        let response = self.http.post(url).json(&body).send().await?;
        match response.status() {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(Error::AuthRejected(error_message(response.text().await?)))
            }
            _ => check(response)
                .await?
                .json::<session::TokenResponse>()
                .await?
                .into_data(Utc::now()),
        }
    }

    pub(super) async fn refresh(&self, data: &session::Data) -> Result<session::Data> {
        self.grant(
            "refresh_token",
            json!({ "refresh_token": data.refresh_token() }),
        )
        .await
    }

    async fn revoke(&self, data: &session::Data) -> Result<()> {
        let mut url = self.endpoint(&["auth", "v1", "logout"])?;
        let _ = url.query_pairs_mut().append_pair("scope", "global");

        let response = self
            .http
            .post(url)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", data.access_token()),
            )
            .send()
            .await?;
        match response.status() {
            // The token is already gone on the server side.
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                debug!("Session was already revoked");
                Ok(())
            }
            _ => check(response).await.map(|_| ()),
        }
    }
}

#[async_trait]
impl<S: storage::Storage<session::Data>> backend::Auth for Supabase<S> {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<backend::Session> {
        let data = self
            .grant(
                "password",
                json!({ "email": email, "password": password.expose_secret() }),
            )
            .await?;
        self.storage.lock().await.update(&data).await?;
        info!("Signed in as {}", email);

        self.emit(AuthEvent::SignedIn, Some(&data));
        Ok(data.session())
    }

    async fn sign_out(&self) -> Result<()> {
        let data = {
            let mut storage = self.storage.lock().await;
            let data = storage.get().await?;
            storage.clear().await?;
            data
        };
        let Some(data) = data else {
            return Ok(());
        };

        self.emit(AuthEvent::SignedOut, None);
        self.revoke(&data).await
    }

    async fn session(&self) -> Result<Option<backend::Session>> {
        Ok(self.current().await?.as_ref().map(session::Data::session))
    }

    fn subscribe(&self) -> Subscription<AuthChange> {
        Subscription::forward(self.events.subscribe())
    }
}
