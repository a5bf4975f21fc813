use std::{
    collections::{BTreeSet, HashMap},
    io::ErrorKind,
    path::PathBuf,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    Error, Result,
    types::{Credential, UserIdentity},
};

/// Durable record kept per owner (the music-service user ID).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub expires_at: i64,
    #[serde(default)]
    pub scope: BTreeSet<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl StoredToken {
    /// The credential held by this record, or `None` when the token fields
    /// are missing.
    pub fn credential(&self) -> Option<Credential> {
        if self.access_token.is_empty() || self.refresh_token.is_empty() {
            return None;
        }
        Some(Credential {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_at: self.expires_at,
            scope: self.scope.clone(),
        })
    }

    fn merge(&mut self, fields: TokenFields) {
        if let Some(credential) = fields.credential {
            self.access_token = credential.access_token;
            self.refresh_token = credential.refresh_token;
            self.expires_at = credential.expires_at;
            self.scope = credential.scope;
        }
        if fields.user_id.is_some() {
            self.user_id = fields.user_id;
        }
        if fields.display_name.is_some() {
            self.display_name = fields.display_name;
        }
        if fields.country.is_some() {
            self.country = fields.country;
        }
    }
}

/// Partial update for a [`StoredToken`]; `None` fields leave the stored
/// value alone.
#[derive(Debug, Clone, Default)]
pub struct TokenFields {
    pub credential: Option<Credential>,
    pub user_id: Option<String>,
    pub display_name: Option<String>,
    pub country: Option<String>,
}

impl TokenFields {
    pub fn credential(credential: &Credential) -> Self {
        Self {
            credential: Some(credential.clone()),
            ..Self::default()
        }
    }

    pub fn with_user(mut self, user: &UserIdentity) -> Self {
        self.user_id = Some(user.id.clone());
        self.display_name = user.display_name.clone();
        self.country = user.country.clone();
        self
    }
}

/// Durable owner → credential storage.
///
/// Writes are merge-writes: concurrent refreshers for the same owner may
/// race, and the last token written wins.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// The record for `owner`, `None` when there is none (or it is unreadable).
    async fn read(&self, owner: &str) -> Result<Option<StoredToken>>;

    /// Creates the record for `owner` or merges `fields` into it.
    async fn upsert_merge(&self, owner: &str, fields: TokenFields) -> Result<()>;

    /// Replaces the token fields of an existing record.
    ///
    /// # Errors
    ///
    /// [`Error::Store`] when `owner` has no record.
    async fn update(&self, owner: &str, credential: &Credential) -> Result<()>;
}

/// Process-local store, mostly useful for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryTokenStore {
    records: Mutex<HashMap<String, StoredToken>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn read(&self, owner: &str) -> Result<Option<StoredToken>> {
        Ok(self.records.lock().await.get(owner).cloned())
    }

    async fn upsert_merge(&self, owner: &str, fields: TokenFields) -> Result<()> {
        self.records
            .lock()
            .await
            .entry(owner.to_string())
            .or_default()
            .merge(fields);
        Ok(())
    }

    async fn update(&self, owner: &str, credential: &Credential) -> Result<()> {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(owner)
            .ok_or_else(|| Error::Store(format!("no token record for {owner}")))?;
        record.merge(TokenFields::credential(credential));
        Ok(())
    }
}

/// One pretty-printed JSON file per owner inside a directory.
///
/// Read-modify-write cycles are serialized by an in-process lock so two
/// merges for the same owner never interleave. Records are replaced by
/// rename, so reads need no lock and never observe a partial file.
pub struct FileTokenStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn record_path(&self, owner: &str) -> PathBuf {
        let file: String = owner
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{file}.json"))
    }

    async fn load(&self, owner: &str) -> Result<Option<StoredToken>> {
        let path = self.record_path(owner);
        let content = match async_fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&content) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(owner, path = %path.display(), error = %e, "unreadable token record");
                Ok(None)
            }
        }
    }

    /// Writes the record next to its final path and renames it into place,
    /// so readers see either the old record or the new one.
    async fn persist(&self, owner: &str, record: &StoredToken) -> Result<()> {
        async_fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_string_pretty(record)?;

        let path = self.record_path(owner);
        let tmp = path.with_extension(format!("json.tmp.{}", std::process::id()));
        async_fs::write(&tmp, json).await?;
        async_fs::File::open(&tmp).await?.sync_all().await?;
        async_fs::rename(&tmp, &path).await?;

        debug!(owner, "token record written");
        Ok(())
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn read(&self, owner: &str) -> Result<Option<StoredToken>> {
        self.load(owner).await
    }

    async fn upsert_merge(&self, owner: &str, fields: TokenFields) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut record = self.load(owner).await?.unwrap_or_default();
        record.merge(fields);
        self.persist(owner, &record).await
    }

    async fn update(&self, owner: &str, credential: &Credential) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut record = self
            .load(owner)
            .await?
            .ok_or_else(|| Error::Store(format!("no token record for {owner}")))?;
        record.merge(TokenFields::credential(credential));
        self.persist(owner, &record).await
    }
}
