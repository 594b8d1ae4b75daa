// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::header;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::{
    backend,
    error::{self, Result},
    storage,
};

use super::{check, session, Supabase};

#[derive(Deserialize)]
struct SignedUrl {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

impl<S: storage::Storage<session::Data>> Supabase<S> {
    fn object(&self, prefix: &[&str], bucket: &str, path: &str) -> Result<Url> {
        let segments: Vec<&str> = ["storage", "v1", "object"]
            .into_iter()
            .chain(prefix.iter().copied())
            .chain([bucket])
            .chain(path.split('/').filter(|segment| !segment.is_empty()))
            .collect();
        self.endpoint(&segments)
    }
}

#[async_trait]
impl<S: storage::Storage<session::Data>> backend::Objects for Supabase<S> {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        debug!("Uploading {} bytes to {}/{}", bytes.len(), bucket, path);
        let request = self
            .authorized(self.http.post(self.object(&[], bucket, path)?))
            .await?
            .header(header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes);
        let _ = check(request.send().await?).await?;
        Ok(())
    }

    async fn signed_url(&self, bucket: &str, path: &str, ttl: Duration) -> Result<Url> {
        let request = self
            .authorized(self.http.post(self.object(&["sign"], bucket, path)?))
            .await?
            .json(&json!({ "expiresIn": ttl.as_secs() }));
        let signed: SignedUrl = check(request.send().await?).await?.json().await?;

        // The server answers with a path relative to the storage API root.
        let root = self.endpoint(&["storage", "v1"])?;
        let joined = format!(
            "{}/{}",
            root.as_str().trim_end_matches('/'),
            signed.signed_url.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|_| {
            error::Backend::UnexpectedResponse(format!(
                "signed URL {} is not valid",
                signed.signed_url
            ))
            .into()
        })
    }

    fn public_url(&self, bucket: &str, path: &str) -> Result<Url> {
        self.object(&["public"], bucket, path)
    }

    async fn remove(&self, bucket: &str, paths: &[&str]) -> Result<()> {
        let request = self
            .authorized(self.http.delete(self.endpoint(&["storage", "v1", "object", bucket])?))
            .await?
            .json(&json!({ "prefixes": paths }));
        let _ = check(request.send().await?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use crate::{backend::Objects as _, config::BackendConfig, storage::Memory};

    use super::*;

    #[test]
    fn public_url_keeps_nested_path() -> Result<()> {
        let client: Supabase<Memory<session::Data>> = Supabase::new(
            BackendConfig {
                url: Url::parse("https://example.supabase.co").expect("url"),
                api_key: SecretString::new("anon".to_owned()),
            },
            Memory::new(),
        )?;

        assert_eq!(
            client
                .public_url("documents", "u-1/1700000000000_cv.pdf")?
                .as_str(),
            "https://example.supabase.co/storage/v1/object/public/documents/u-1/1700000000000_cv.pdf"
        );
        Ok(())
    }
}
