use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use common_auth::KeyStore;
use tracing::info;

/// Loads every `*.pem` file in `folder` into a fresh store, keyed by file stem.
pub fn load_keys_from_dir(folder: &Path) -> Result<KeyStore> {
    let entries = fs::read_dir(folder)
        .with_context(|| format!("Failed to read key folder {}", folder.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_pem = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("pem"))
            .unwrap_or(false);
        if path.is_file() && is_pem {
            paths.push(path);
        }
    }
    paths.sort();

    let mut store = KeyStore::new();
    for path in paths {
        let kid = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| anyhow!("Key file name is not valid UTF-8: {}", path.display()))?
            .to_string();
        let pem = fs::read(&path)
            .with_context(|| format!("Failed to read key file {}", path.display()))?;
        store
            .load_key(kid.clone(), &pem)
            .with_context(|| format!("Failed to load key '{kid}' from {}", path.display()))?;
    }

    if store.is_empty() {
        return Err(anyhow!("No *.pem keys found in {}", folder.display()));
    }

    info!(folder = %folder.display(), kids = ?store.kids(), "loaded signing keys");
    Ok(store)
}
