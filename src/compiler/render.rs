//! Template engine seam.
//!
//! The rest of the crate only sees [`Renderer`]: a page name and a data
//! mapping go in, bytes or a [`RenderError`] come out.

use super::Page;
use crate::data::Data;
use minijinja::{Environment, UndefinedBehavior, path_loader};
use std::path::Path;
use thiserror::Error;

/// A page that could not be rendered.
#[derive(Debug, Error)]
#[error("failed to render `{page}`")]
pub struct RenderError {
    pub page: String,
    #[source]
    pub source: minijinja::Error,
}

/// Renders a page with its merged data.
pub trait Renderer: Send {
    fn render(&self, page: &Page, data: &Data) -> Result<Vec<u8>, RenderError>;

    /// Forget cached templates so edited sources are read again.
    fn invalidate(&mut self);
}

/// minijinja environment loading templates from the template root.
pub struct JinjaRenderer {
    env: Environment<'static>,
}

impl JinjaRenderer {
    pub fn new(templates: &Path, strict: bool) -> Self {
        let mut env = Environment::new();
        env.set_loader(path_loader(templates));
        if strict {
            env.set_undefined_behavior(UndefinedBehavior::Strict);
        }
        Self { env }
    }
}

impl Renderer for JinjaRenderer {
    fn render(&self, page: &Page, data: &Data) -> Result<Vec<u8>, RenderError> {
        let wrap = |source| RenderError {
            page: page.name().to_owned(),
            source,
        };
        let template = self.env.get_template(page.name()).map_err(wrap)?;
        let html = template.render(data).map_err(wrap)?;
        Ok(html.into_bytes())
    }

    fn invalidate(&mut self) {
        self.env.clear_templates();
    }
}
