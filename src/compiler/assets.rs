//! Static asset copying.
//!
//! Assets have no dependencies: a changed file is copied one-to-one to
//! `<output>/<asset_prefix>/<relative path>`.

use super::{collect_all_files, write_atomic_with};
use anyhow::{Context, Result, anyhow};
use rayon::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Destination of the asset at `path` (absolute, under `assets`).
pub fn asset_dest(assets: &Path, dest_root: &Path, path: &Path) -> Result<PathBuf> {
    let rel = path
        .strip_prefix(assets)
        .map_err(|_| anyhow!("{} is not under the asset root", path.display()))?;
    Ok(dest_root.join(rel))
}

/// Copy one asset with its permissions, replacing the destination atomically.
pub fn copy_asset(assets: &Path, dest_root: &Path, path: &Path) -> Result<PathBuf> {
    let dest = asset_dest(assets, dest_root, path)?;
    let content = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let permissions = fs::metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?
        .permissions();
    write_atomic_with(&dest, &content, Some(permissions))
        .with_context(|| format!("failed to write {}", dest.display()))?;
    Ok(dest)
}

/// Copy the whole asset tree in parallel. Returns the number of files copied.
pub fn copy_assets(
    assets: &Path,
    dest_root: &Path,
    on_progress: impl Fn() + Sync,
) -> Result<usize> {
    let files = collect_all_files(assets);
    files.par_iter().try_for_each(|path| {
        copy_asset(assets, dest_root, path)?;
        on_progress();
        Ok::<_, anyhow::Error>(())
    })?;
    Ok(files.len())
}
