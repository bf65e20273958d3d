//! Label display names and aliases.
//!
//! Class ids in the store are stable English identifiers. [`LabelProjector`] turns them into
//! text for a given language; [`LabelCatalog`] is the JSON-backed implementation and
//! [`IdentityProjector`] passes ids through unchanged.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

/// Language whose names the catalog carries.
pub const CATALOG_LANG: &str = "zh";

/// Maps a class id to display text. Never fails; unknown ids map to themselves.
pub trait LabelProjector: Send + Sync {
    fn display(&self, label: &str, lang: &str) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityProjector;

impl LabelProjector for IdentityProjector {
    fn display(&self, label: &str, _lang: &str) -> String {
        label.to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelCatalog {
    names: BTreeMap<String, String>,
    aliases: BTreeMap<String, Vec<String>>,
}

impl LabelCatalog {
    pub fn new(names: BTreeMap<String, String>, aliases: BTreeMap<String, Vec<String>>) -> Self {
        Self { names, aliases }
    }

    /// Loads the name and alias files. Missing or malformed files leave that half empty.
    pub fn load(labels_path: &Path, aliases_path: &Path) -> Self {
        let catalog = Self {
            names: read_json_or_default(labels_path),
            aliases: read_json_or_default(aliases_path),
        };
        info!(
            names = catalog.names.len(),
            aliases = catalog.aliases.len(),
            "Loaded label catalog"
        );
        catalog
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.aliases.is_empty()
    }

    pub fn name(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn aliases(&self, id: &str) -> &[String] {
        self.aliases.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Ids whose id, display name or any alias contains `keyword`, ignoring case.
    pub fn search(&self, keyword: &str) -> Vec<String> {
        let keyword = keyword.trim().to_lowercase();
        let ids: BTreeSet<&String> = self.names.keys().chain(self.aliases.keys()).collect();

        ids.into_iter()
            .filter(|id| {
                id.to_lowercase().contains(&keyword)
                    || self
                        .name(id)
                        .is_some_and(|name| name.to_lowercase().contains(&keyword))
                    || self
                        .aliases(id)
                        .iter()
                        .any(|alias| alias.to_lowercase().contains(&keyword))
            })
            .cloned()
            .collect()
    }
}

impl LabelProjector for LabelCatalog {
    fn display(&self, label: &str, lang: &str) -> String {
        if lang != CATALOG_LANG {
            return label.to_string();
        }
        self.name(label).unwrap_or(label).to_string()
    }
}

fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Label file not found");
            return T::default();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read label file");
            return T::default();
        }
    };

    serde_json::from_str(&text).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "Malformed label file");
        T::default()
    })
}
