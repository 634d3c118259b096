//! Resources template rendering
//!
//! Renders a stack template with tera against the resolved variables of a
//! region. Rendered output must be JSON.

use crate::error::{CoreError, Result};
use crate::model::Variables;
use tera::{Context, Tera};
use tracing::debug;

/// Built-in resources template: Lambda execution role and its log policy
pub const DEFAULT_RESOURCES_TEMPLATE: &str = include_str!("../templates/resources-cf.json");

/// Template processor
pub struct TemplateProcessor {
    tera: Tera,
    context: Context,
}

impl TemplateProcessor {
    pub fn new() -> Self {
        Self {
            tera: Tera::default(),
            context: Context::new(),
        }
    }

    /// Processor whose context holds every variable of `variables`
    pub fn with_variables(variables: &Variables) -> Self {
        let mut processor = Self::new();
        processor.add_variables(variables);
        processor
    }

    pub fn add_variables(&mut self, variables: &Variables) {
        for (key, value) in variables.iter() {
            self.context.insert(key, value);
        }
    }

    pub fn render_str(&mut self, template: &str) -> Result<String> {
        self.tera
            .render_str(template, &self.context)
            .map_err(|e| CoreError::Template(extract_tera_error_detail(&e)))
    }

    /// Render a template and check the result parses as JSON
    pub fn render_json(&mut self, template: &str) -> Result<String> {
        let rendered = self.render_str(template)?;
        serde_json::from_str::<serde_json::Value>(&rendered)
            .map_err(|e| CoreError::Template(format!("rendered template is not JSON: {e}")))?;
        debug!(bytes = rendered.len(), "Rendered resources template");
        Ok(rendered)
    }
}

impl Default for TemplateProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Collect the whole tera error chain, naming the undefined variable when
/// that is the cause
fn extract_tera_error_detail(e: &tera::Error) -> String {
    use std::error::Error;

    let mut details = vec![e.to_string()];
    let mut source = e.source();
    while let Some(err) = source {
        details.push(err.to_string());
        source = err.source();
    }
    let full_error = details.join(" | ");

    if full_error.contains("not found in context")
        && let Some(start) = full_error.find("Variable `")
        && let Some(end) = full_error[start..].find("` not found")
    {
        let var_name = &full_error[start + 10..start + end];
        return format!("undefined variable `{var_name}`");
    }

    full_error
}
