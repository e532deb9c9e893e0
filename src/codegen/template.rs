//! Template rendering for generated artifacts
//!
//! Built-in templates are embedded at compile time; a configured directory
//! overrides any of them by file stem (`type.hbs` replaces `type`).

use std::fs;
use std::path::Path;

use handlebars::Handlebars;
use include_dir::{include_dir, Dir, File};
use serde_json::Value;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Result, SchemaError};

static TEMPLATES: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/templates");

const TEMPLATE_EXTENSION: &str = "hbs";

/// Renders a named template against a JSON scope
pub trait TemplateEncoder: Send + Sync {
    fn render(&self, template: &str, scope: &Value) -> Result<String>;
}

/// Handlebars-backed encoder, HTML escaping disabled
#[derive(Debug)]
pub struct HandlebarsEncoder {
    registry: Handlebars<'static>,
}

impl HandlebarsEncoder {
    /// Encoder with the embedded templates
    pub fn new() -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);

        let mut encoder = Self { registry };
        for file in collect_embedded(&TEMPLATES) {
            let Some(name) = template_name(file.path()) else {
                continue;
            };
            let Some(source) = file.contents_utf8() else {
                continue;
            };
            encoder.register(&name, source)?;
        }
        Ok(encoder)
    }

    /// Embedded templates, overridden by every `*.hbs` under `dir`
    pub fn with_overrides(dir: &Path) -> Result<Self> {
        let mut encoder = Self::new()?;
        if !dir.is_dir() {
            return Err(SchemaError::config(
                "output.templates",
                format!("template directory {} does not exist", dir.display()),
            ));
        }
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = template_name(entry.path()) else {
                continue;
            };
            let source = fs::read_to_string(entry.path())?;
            debug!(template = %name, path = %entry.path().display(), "template override");
            encoder.register(&name, &source)?;
        }
        Ok(encoder)
    }

    /// Register (or replace) a template
    pub fn register(&mut self, name: &str, source: &str) -> Result<()> {
        self.registry
            .register_template_string(name, source)
            .map_err(|e| SchemaError::Template {
                template: name.to_string(),
                message: e.to_string(),
            })
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.registry.has_template(name)
    }
}

impl TemplateEncoder for HandlebarsEncoder {
    fn render(&self, template: &str, scope: &Value) -> Result<String> {
        if !self.registry.has_template(template) {
            return Err(SchemaError::Template {
                template: template.to_string(),
                message: "no such template".to_string(),
            });
        }
        self.registry
            .render(template, scope)
            .map_err(|e| SchemaError::Template {
                template: template.to_string(),
                message: e.to_string(),
            })
    }
}

fn template_name(path: &Path) -> Option<String> {
    if path.extension().and_then(|e| e.to_str()) != Some(TEMPLATE_EXTENSION) {
        return None;
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
}

fn collect_embedded<'a>(dir: &'a Dir<'a>) -> Vec<&'a File<'a>> {
    let mut files: Vec<&File> = dir.files().collect();
    for sub in dir.dirs() {
        files.extend(collect_embedded(sub));
    }
    files
}
