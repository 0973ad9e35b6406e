//! Full site build.
//!
//! ```text
//! build_site()
//!     │
//!     ├── clear output directory
//!     ├── copy_assets() ──► parallel copy into <output>/<asset_prefix>
//!     └── render pages  ──► sequential, each with its merged data
//! ```
//!
//! A page that fails to render is logged and the build continues; the build
//! as a whole then reports failure.

use crate::{
    compiler::{assets::copy_assets, collect_all_files},
    error, info,
    logger::ProgressBars,
    site::Site,
};
use anyhow::{Context, Result, bail};
use std::{fs, time::Instant};

/// Build the entire site from scratch.
pub fn build_site(site: &mut Site) -> Result<()> {
    let start = Instant::now();
    let log = site.logger();
    let output = site.config().build.output.clone();
    let assets = site.config().build.assets.clone();
    let asset_output = site.config().asset_output();

    if output.exists() {
        fs::remove_dir_all(&output)
            .with_context(|| format!("failed to clear output directory {}", output.display()))?;
    }
    fs::create_dir_all(&output)
        .with_context(|| format!("failed to create output directory {}", output.display()))?;

    let pages: Vec<_> = site.pages().iter().cloned().collect();
    let asset_count = if assets.is_dir() {
        collect_all_files(&assets).len()
    } else {
        0
    };

    let progress = ProgressBars::new(&log, &[("pages", pages.len()), ("assets", asset_count)]);
    let tick = |name: &str| {
        if let Some(bars) = &progress {
            bars.inc(name);
        }
    };

    if asset_count > 0 {
        copy_assets(&assets, &asset_output, || tick("assets"))?;
    }

    let mut failed = 0;
    for page in &pages {
        if let Err(e) = site.render(page) {
            error!(log, "build"; "{e:#}");
            failed += 1;
        }
        tick("pages");
    }

    if let Some(bars) = &progress {
        bars.finish();
    }

    if failed > 0 {
        bail!("{failed} of {} pages failed to render", pages.len());
    }

    info!(
        log, "build";
        "Successfully built {} pages in {:.2} seconds",
        pages.len(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
