//! Prompt rendering for consolidation requests.
//!
//! The rendered text is the single payload: it is what gets dispatched, what
//! the copy signal exports, and what the token estimator measures.

use std::path::Path;

use timegap_core::consolidation::ConsolidationRequest;
use timegap_core::error::Error;

/// Shown in place of an empty user context.
pub const NO_CONTEXT: &str = "No additional user context provided.";

const BUILTIN_INSTRUCTIONS: &str = r#"You are a time tracking assistant. Below is raw activity captured from the
user's computer for a period that has no time entry yet. Consolidate it into
a small number of clean, non-overlapping time blocks suitable for a time
tracking platform.

Rules:
1. Group related activity into one block; merge fragments of the same task.
2. Blocks must not overlap and must stay inside the given period.
3. Give each block a short, specific description of the work done.
4. Infer a project and task only when the activity makes them obvious.
5. All dates and times are UTC.

Respond with a JSON object of this exact shape:
{"entries": [{"description": "...", "start_date": "YYYY-MM-DD",
"start_time": "HH:MM:SS", "end_date": "YYYY-MM-DD", "end_time": "HH:MM:SS",
"duration": "HH:MM:SS", "project": null, "task": null}]}"#;

/// The instruction block plus the fixed section layout.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    instructions: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptTemplate {
    pub fn builtin() -> Self {
        Self {
            instructions: BUILTIN_INSTRUCTIONS.to_string(),
        }
    }

    pub fn with_instructions(instructions: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
        }
    }

    /// Built-in instructions, or the contents of `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            None => Ok(Self::builtin()),
            Some(path) => std::fs::read_to_string(path)
                .map(|text| Self::with_instructions(text.trim()))
                .map_err(|e| {
                    Error::InvalidInput(format!(
                        "cannot read prompt file {}: {e}",
                        path.display()
                    ))
                }),
        }
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// Render the full prompt for one request.
    pub fn render(&self, request: &ConsolidationRequest) -> String {
        let context = request.context_text.trim();
        let context = if context.is_empty() { NO_CONTEXT } else { context };
        let samples = serde_json::to_string_pretty(&request.samples).unwrap_or_default();
        let span = request.window_span;

        format!(
            "{instructions}\n\n\
             **Configuration:**\n\
             - Minimum Activity Duration: {minutes} minutes (ignore consolidated blocks shorter than this)\n\n\
             **User's Context:**\n{context}\n\n\
             **Period:**\n{start} to {end} (UTC)\n\n\
             **Captured Activity (JSON Array):**\n{samples}",
            instructions = self.instructions,
            minutes = request.min_duration_seconds / 60,
            start = span.start().format("%Y-%m-%d %H:%M:%S"),
            end = span.end().format("%Y-%m-%d %H:%M:%S"),
        )
    }

    /// Characters of the rendered prompt that do not depend on the context.
    pub fn base_chars(&self, request: &ConsolidationRequest) -> usize {
        let mut bare = request.clone();
        bare.context_text.clear();
        self.render(&bare)
            .chars()
            .count()
            .saturating_sub(NO_CONTEXT.chars().count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use timegap_core::activity::RawActivitySample;
    use timegap_core::window::TimeWindow;

    fn request(context: &str) -> ConsolidationRequest {
        let span = TimeWindow::new(
            Utc.with_ymd_and_hms(2025, 6, 8, 9, 40, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 8, 10, 30, 0).unwrap(),
        )
        .unwrap();
        ConsolidationRequest {
            context_text: context.into(),
            samples: vec![RawActivitySample {
                timestamp: Utc.with_ymd_and_hms(2025, 6, 8, 9, 41, 0).unwrap(),
                duration_seconds: 60.0,
                app: "code".into(),
                title: "gaps.rs".into(),
                is_afk: false,
            }],
            min_duration_seconds: 300,
            window_span: span,
        }
    }

    #[test]
    fn renders_every_section() {
        let text = PromptTemplate::builtin().render(&request("pairing with Sam"));
        assert!(text.contains("Minimum Activity Duration: 5 minutes"));
        assert!(text.contains("pairing with Sam"));
        assert!(text.contains("2025-06-08 09:40:00 to 2025-06-08 10:30:00"));
        assert!(text.contains("\"title\": \"gaps.rs\""));
        assert!(text.contains("\"durationSeconds\": 60.0"));
    }

    #[test]
    fn empty_context_uses_placeholder() {
        let text = PromptTemplate::builtin().render(&request("   "));
        assert!(text.contains(NO_CONTEXT));
    }

    #[test]
    fn base_chars_excludes_context() {
        let template = PromptTemplate::builtin();
        let with = template.render(&request("abcd")).chars().count();
        assert_eq!(template.base_chars(&request("abcd")) + 4, with);
    }

    #[test]
    fn custom_instructions_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.md");
        std::fs::write(&path, "Be brief.\n").unwrap();

        let template = PromptTemplate::load(Some(&path)).unwrap();
        assert_eq!(template.instructions(), "Be brief.");
        assert!(template.render(&request("")).starts_with("Be brief."));
    }

    #[test]
    fn missing_prompt_file_is_invalid_input() {
        let err = PromptTemplate::load(Some(Path::new("/nonexistent/prompt.md"))).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
