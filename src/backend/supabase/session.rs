// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Duration, Utc};
use secrecy::ExposeSecret as _;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, TimestampSeconds};

use crate::{
    backend,
    error::{self, Result},
};

#[derive(Clone, Deserialize, Serialize)]
#[serde(transparent)]
struct TokenString(String);

impl secrecy::CloneableSecret for TokenString {}

impl secrecy::SerializableSecret for TokenString {}

impl secrecy::Zeroize for TokenString {
    fn zeroize(&mut self) {
        secrecy::Zeroize::zeroize(&mut self.0);
    }
}

/// A bearer or refresh token issued by the auth service.
#[derive(Clone, Deserialize, Serialize)]
struct Token(secrecy::Secret<TokenString>);

impl Token {
    fn new(value: String) -> Self {
        Self(secrecy::Secret::new(TokenString(value)))
    }

    fn expose(&self) -> &str {
        &self.0.expose_secret().0
    }
}

/// The session as it is kept between runs.
#[serde_as]
#[derive(Clone, Deserialize, Serialize)]
pub(crate) struct Data {
    access_token: Token,
    refresh_token: Token,
    #[serde_as(as = "TimestampSeconds<i64>")]
    expires_at: DateTime<Utc>,
    user_id: String,
    email: Option<String>,
}

impl Data {
    pub(super) fn access_token(&self) -> &str {
        self.access_token.expose()
    }

    pub(super) fn refresh_token(&self) -> &str {
        self.refresh_token.expose()
    }

    pub(super) fn expires_within(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        self.expires_at
            .checked_sub_signed(margin)
            .map_or(true, |deadline| deadline <= now)
    }

    pub(super) fn session(&self) -> backend::Session {
        backend::Session {
            user: backend::User {
                id: self.user_id.clone(),
                email: self.email.clone(),
            },
            expires_at: Some(self.expires_at),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct UserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// The body of a successful token grant.
#[derive(Deserialize)]
pub(super) struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserResponse,
}

impl TokenResponse {
    pub(super) fn into_data(self, now: DateTime<Utc>) -> Result<Data> {
        let expires_at = match self.expires_at {
            Some(seconds) => DateTime::from_timestamp(seconds, 0)
                .ok_or(error::Conversion::Timestamp(seconds))?,
            None => Duration::try_seconds(self.expires_in)
                .and_then(|lifetime| now.checked_add_signed(lifetime))
                .ok_or(error::Conversion::Timestamp(self.expires_in))?,
        };
        Ok(Data {
            access_token: Token::new(self.access_token),
            refresh_token: Token::new(self.refresh_token),
            expires_at,
            user_id: self.user.id,
            email: self.user.email,
        })
    }
}
