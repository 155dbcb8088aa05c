//! Per-slug tuning documents
//!
//! Each slug is stored as `config/<slug>.json` holding
//! `{ "slug", "data", "updatedAt" }`. Writes go to a temp file first and are
//! renamed into place.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::settings::ConfigSource;

/// Stored config document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDocument {
    pub slug: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Slugs become file names, so only ASCII letters, digits, `_` and `-`
pub fn validate_slug(slug: &str) -> Result<()> {
    let ok = !slug.is_empty()
        && slug
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidSlug(slug.to_string()))
    }
}

#[derive(Debug)]
pub struct ConfigStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl ConfigStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, slug: &str) -> PathBuf {
        self.dir.join(format!("{slug}.json"))
    }

    /// Full stored document, `None` when the slug has never been written or
    /// its file does not parse
    pub fn document(&self, slug: &str) -> Result<Option<ConfigDocument>> {
        validate_slug(slug)?;
        let text = match fs::read_to_string(self.path_for(slug)) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&text) {
            Ok(doc) => Ok(Some(doc)),
            Err(e) => {
                log::warn!("Ignoring unreadable config for slug {:?}: {}", slug, e);
                Ok(None)
            }
        }
    }

    /// Stored `data` for `slug`, or an empty object
    pub fn get(&self, slug: &str) -> Result<Value> {
        Ok(self
            .document(slug)?
            .map(|doc| doc.data)
            .filter(|data| !data.is_null())
            .unwrap_or_else(|| Value::Object(Map::new())))
    }

    /// Replace the document for `slug`; anything but an object is stored as `{}`
    pub fn set(&self, slug: &str, data: Value) -> Result<ConfigDocument> {
        validate_slug(slug)?;
        let data = if data.is_object() {
            data
        } else {
            log::warn!("Config data for slug {:?} is not an object, storing {{}}", slug);
            Value::Object(Map::new())
        };
        let doc = ConfigDocument {
            slug: slug.to_string(),
            data,
            updated_at: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        };
        let text = serde_json::to_string_pretty(&doc)?;

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| Error::Ledger("config store lock poisoned".to_string()))?;
        let target = self.path_for(slug);
        let tmp = self.dir.join(format!(".{slug}.json.{}.tmp", uuid::Uuid::new_v4().simple()));
        fs::write(&tmp, text)?;
        if let Err(e) = fs::rename(&tmp, &target) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        log::info!("Stored config for slug {:?}", slug);
        Ok(doc)
    }
}

impl ConfigSource for ConfigStore {
    fn fetch(&self, slug: &str) -> Result<Option<Value>> {
        Ok(self.document(slug)?.map(|doc| doc.data).filter(|data| !data.is_null()))
    }
}
