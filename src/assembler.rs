//! Merges the context sources into one auxiliary system message.

use crate::models::{FileSnippet, WebResult};

pub struct ContextAssembler;

impl ContextAssembler {
    /// Build the auxiliary message: file block, then history block, then
    /// web block, each a header followed by one line per item. `None` when
    /// every source is empty.
    pub fn assemble(
        file_context: Option<&[FileSnippet]>,
        history_context: &[String],
        web_context: Option<&[WebResult]>,
    ) -> Option<String> {
        let mut blocks = Vec::new();

        if let Some(files) = file_context.filter(|f| !f.is_empty()) {
            let items: Vec<String> = files
                .iter()
                .map(|m| format!("- File: '{}'\n  Content: '{}'", m.file_path, m.content))
                .collect();
            blocks.push(format!("Context from files:\n{}", items.join("\n")));
        }

        if !history_context.is_empty() {
            blocks.push(format!(
                "Context from history:\n{}",
                history_context.join("\n")
            ));
        }

        if let Some(results) = web_context.filter(|r| !r.is_empty()) {
            let items: Vec<String> = results
                .iter()
                .map(|r| format!("- {} ({}): {}", r.title, r.url, r.content))
                .collect();
            blocks.push(format!("Web search results:\n{}", items.join("\n")));
        }

        if blocks.is_empty() {
            None
        } else {
            Some(blocks.join("\n"))
        }
    }
}
