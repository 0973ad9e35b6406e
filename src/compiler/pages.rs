//! Page rendering and output management.

use super::render::Renderer;
use super::{Page, write_atomic};
use crate::data::Data;
use anyhow::{Context, Result};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Render `page` with `data` and write its output artifact.
///
/// Nothing is written when rendering fails, so the previous artifact stays
/// in place. Returns the written path.
pub fn render_page(
    page: &Page,
    renderer: &dyn Renderer,
    data: &Data,
    output: &Path,
) -> Result<PathBuf> {
    let html = renderer.render(page, data)?;
    let dest = page.output_path(output);
    write_atomic(&dest, &html).with_context(|| format!("failed to write {}", dest.display()))?;
    Ok(dest)
}

/// Delete the output artifact of a removed page.
///
/// Empty directories left behind are pruned up to (not including) `output`.
/// Returns `false` if there was nothing to delete.
pub fn remove_page_output(page: &Page, output: &Path) -> io::Result<bool> {
    let dest = page.output_path(output);
    match fs::remove_file(&dest) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    }

    let mut dir = dest.parent();
    while let Some(current) = dir {
        if current == output || !current.starts_with(output) || fs::remove_dir(current).is_err() {
            break;
        }
        dir = current.parent();
    }
    Ok(true)
}
