// SPDX-FileCopyrightText: 2022-2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{error::Result, metadata};

use super::Storage;

pub(crate) struct File {
    path: PathBuf,
}

impl File {
    pub(crate) fn new<P: AsRef<Path>>(file: P) -> Option<Self> {
        metadata::PROJECT_DIRS
            .as_ref()
            .map(|dirs| Self::at(dirs.data_dir().join(file)))
    }

    pub(crate) fn at<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl<T: Send + Serialize + Sync + for<'de> Deserialize<'de>> Storage<T> for File {
    async fn get(&mut self) -> Result<Option<T>> {
        match fs::File::open(&self.path) {
            Ok(fp) => Ok(Some(serde_json::from_reader::<fs::File, T>(fp)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&mut self, data: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(&self.path)?;
        serde_json::to_writer(file, data)?;
        debug!("Wrote {}", self.path.display());
        Ok(())
    }

    async fn clear(&mut self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{env, process};

    use crate::error::Result;

    use super::*;

    fn scratch(name: &str) -> PathBuf {
        env::temp_dir().join(format!("nexus-{}-{}.json", process::id(), name))
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() -> Result<()> {
        let mut file = File::at(scratch("missing"));
        let value: Option<String> = file.get().await?;
        assert_eq!(value, None);
        Ok(())
    }

    #[tokio::test]
    async fn clear_is_idempotent() -> Result<()> {
        let path = scratch("clear");
        let mut file = File::at(&path);
        Storage::<String>::update(&mut file, &"value".to_owned()).await?;
        Storage::<String>::clear(&mut file).await?;
        Storage::<String>::clear(&mut file).await?;
        assert!(!path.exists());
        Ok(())
    }
}
