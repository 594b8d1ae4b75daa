// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use log::{debug, warn};
use secrecy::SecretString;
use url::Url;

use crate::{
    allow_list::AllowList,
    error::{Error, Result},
};

/// Where the hosted backend lives and the public key used to reach it.
pub(crate) struct BackendConfig {
    pub(crate) url: Url,
    pub(crate) api_key: SecretString,
}

pub(crate) struct Config {
    pub(crate) backend: Option<BackendConfig>,
    pub(crate) allow_list: AllowList,
}

impl Config {
    /// Builds the runtime configuration.
    ///
    /// A missing URL or API key is not an error: the application runs in an
    /// unconfigured state in which nobody is admitted. A URL that cannot
    /// address HTTP endpoints is an error.
    pub(crate) fn new<S: AsRef<str>>(
        url: Option<Url>,
        api_key: Option<SecretString>,
        allowed_emails: &[S],
    ) -> Result<Self> {
        let allow_list: AllowList = allowed_emails.iter().collect();
        if allow_list.is_empty() {
            warn!("The allow-list is empty, so nobody will be able to sign in");
        } else {
            debug!("Admitting {} email address(es)", allow_list.len());
        }

        let backend = match (url, api_key) {
            (Some(url), Some(api_key)) => {
                if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
                    return Err(Error::Config(format!(
                        "the backend URL {url} is not an HTTP(S) URL"
                    )));
                }
                Some(BackendConfig { url, api_key })
            }
            (None, _) => {
                warn!("No backend URL is configured");
                None
            }
            (_, None) => {
                warn!("No backend API key is configured");
                None
            }
        };

        Ok(Self {
            backend,
            allow_list,
        })
    }
}
