//! Prompt rendering for the classification and comment model calls.

use anyhow::Result;
use minijinja::{Environment, context};

const DECISION_TEMPLATE: &str = include_str!("prompts/decision.md");
const COMMENT_TEMPLATE: &str = include_str!("prompts/comment.md");

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("decision", DECISION_TEMPLATE)
            .expect("decision template should be valid");
        env.add_template("comment", COMMENT_TEMPLATE)
            .expect("comment template should be valid");
        Self { env }
    }

    /// Render the engage/skip classification prompt.
    pub fn render_decision(&self, item_text: &str, keyword: Option<&str>) -> Result<String> {
        let template = self.env.get_template("decision")?;
        let rendered = template.render(context! {
            item_text => item_text.trim(),
            keyword => keyword.map(str::trim).filter(|s| !s.is_empty()),
        })?;
        Ok(rendered)
    }

    /// Render the comment generation prompt.
    pub fn render_comment(
        &self,
        item_text: &str,
        author: Option<&str>,
        screenshot: bool,
    ) -> Result<String> {
        let template = self.env.get_template("comment")?;
        let rendered = template.render(context! {
            item_text => item_text.trim(),
            author => author.map(str::trim).filter(|s| !s.is_empty()),
            screenshot => screenshot,
        })?;
        Ok(rendered)
    }
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}
