//! `[build]` section configuration.
//!
//! Content roots and output layout.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[build]` section in loom.toml - content roots and output layout.
///
/// # Example
/// ```toml
/// [build]
/// templates = "templates"   # Pages and fragments
/// assets = "assets"         # Copied verbatim
/// data = "data"             # Data scope tree root
/// output = "dist"
/// asset_prefix = "static"   # Assets land in dist/static/
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Project root directory (set from the CLI project path).
    #[serde(default = "defaults::build::root")]
    #[educe(Default = defaults::build::root())]
    pub root: Option<PathBuf>,

    /// Template root. Files starting with `_` are fragments, the rest are pages.
    #[serde(default = "defaults::build::templates")]
    #[educe(Default = defaults::build::templates())]
    pub templates: PathBuf,

    /// Static assets directory.
    #[serde(default = "defaults::build::assets")]
    #[educe(Default = defaults::build::assets())]
    pub assets: PathBuf,

    /// Data root, the path the root data scope is anchored at.
    #[serde(default = "defaults::build::data")]
    #[educe(Default = defaults::build::data())]
    pub data: PathBuf,

    /// Build output directory.
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// Subpath of the output directory that receives assets.
    #[serde(default = "defaults::build::asset_prefix")]
    #[educe(Default = defaults::build::asset_prefix())]
    pub asset_prefix: PathBuf,

    /// Treat undefined template variables as render errors.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub strict: bool,
}
