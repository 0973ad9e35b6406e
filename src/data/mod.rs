//! Data supplied to templates.
//!
//! Data lives under the data root and is organized as a tree of scopes, one
//! per directory or file stem that carries provider files:
//!
//! ```text
//! data.yaml              ─┐
//! data/__init__.yaml      ├─ root scope   → every page
//! data/__init__.sh       ─┘
//! data/index.sh          ── scope "index" → index.html
//! data/posts/__init__.yaml ─ scope "posts" → posts/*.html
//! ```
//!
//! Each scope has at most one structured document ([`structured`]) and at
//! most one programmatic module ([`module`], run by [`script`]). The data
//! for a page is merged from every scope on its path ([`tree`]):
//!
//! ```text
//! document < module globals < module per-page < child scopes
//! ```
//!
//! Later entries win on key collision.

pub mod module;
pub mod script;
pub mod structured;
pub mod tree;

pub use tree::DataTree;

use serde_json::{Map, Value};
use std::{io, path::PathBuf};
use thiserror::Error;

/// A string-keyed mapping handed to templates.
///
/// Backed by an ordered map, so merging and serialization are deterministic.
pub type Data = Map<String, Value>;

/// Overlay `top` onto `base`, keys in `top` winning.
pub fn merge(base: &mut Data, top: Data) {
    base.extend(top);
}

/// Errors loading or evaluating data. All of them are recovered by logging
/// and contributing no data.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read `{0}`")]
    Io(PathBuf, #[source] io::Error),

    #[error("invalid YAML in `{path}`")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("`{0}` must hold a mapping with string keys at the top level")]
    NotAMapping(PathBuf),

    #[error("failed to load data module `{}`: {message}", module.display())]
    Load { module: PathBuf, message: String },

    #[error("data function `{name}` failed: {message}")]
    Call { name: String, message: String },
}

/// Build [`Data`] from a JSON value; non-objects yield `None`.
pub fn as_data(value: Value) -> Option<Data> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
