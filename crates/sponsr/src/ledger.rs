use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::SponsrResult;

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    #[serde(default)]
    dumped: BTreeMap<String, String>,
}

/// Append-only record of files that were already dumped.
///
/// Stored as `{"dumped": {"f_<file_id>": "<filename>"}}`. Every write re-reads the file
/// and merges it first, so processes sharing one ledger do not drop each other's entries.
#[derive(Debug)]
pub struct DumpLedger {
    path: PathBuf,
    dumped: BTreeMap<String, String>,
}

impl DumpLedger {
    pub async fn open(path: impl Into<PathBuf>) -> SponsrResult<Self> {
        let path = path.into();
        let dumped = Self::read(&path).await?;
        if !dumped.is_empty() {
            tracing::info!("Loaded {} dumped entries from {}", dumped.len(), path.display());
        }
        Ok(Self { path, dumped })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, file_id: &str) -> bool {
        self.dumped.contains_key(&Self::key(file_id))
    }

    pub fn get(&self, file_id: &str) -> Option<&str> {
        self.dumped.get(&Self::key(file_id)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.dumped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dumped.is_empty()
    }

    /// Records a completed file and persists the merged ledger.
    pub async fn record(&mut self, file_id: &str, filename: &str) -> SponsrResult<()> {
        let mut merged = Self::read(&self.path).await?;
        merged.extend(std::mem::take(&mut self.dumped));
        merged.insert(Self::key(file_id), filename.to_string());
        self.dumped = merged;

        self.write().await
    }

    fn key(file_id: &str) -> String {
        format!("f_{file_id}")
    }

    async fn read(path: &Path) -> SponsrResult<BTreeMap<String, String>> {
        match tokio::fs::read(path).await {
            Ok(data) => {
                let file: LedgerFile = serde_json::from_slice(&data)?;
                Ok(file.dumped)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self) -> SponsrResult<()> {
        let file = LedgerFile {
            dumped: self.dumped.clone(),
        };
        let data = serde_json::to_vec_pretty(&file)?;

        // rename is atomic, readers never observe a half written ledger
        let mut temp_path = self.path.clone().into_os_string();
        temp_path.push(format!(".{}.tmp", std::process::id()));
        let temp_path = PathBuf::from(temp_path);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&temp_path, data).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}
