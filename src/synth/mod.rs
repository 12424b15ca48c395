//! Code synthesizer: turns the current script plus evidence (a failure, or
//! the last result) into a prompt, and the generator's reply into
//! compilable script text.

pub mod prompts;

use anyhow::Result;
use serde_json::Value;
use std::time::Duration;

use crate::generator::GenerateAnswers;
use crate::logic::{Attrs, Failure};
use crate::util::excerpt;

/// Characters of extracted text forwarded into the context prompt.
const TEXT_EXCERPT_CHARS: usize = 1000;

pub struct Synthesizer {
    generator: Box<dyn GenerateAnswers>,
    improve_delay: Duration,
}

impl Synthesizer {
    pub fn new(generator: Box<dyn GenerateAnswers>, improve_delay: Duration) -> Self {
        Self {
            generator,
            improve_delay,
        }
    }

    /// Ask for a replacement script that fixes `failure`. Returns cleaned,
    /// fence-free source text.
    pub fn synthesize_correction(&self, current: &str, failure: &Failure) -> Result<String> {
        let prompt = prompts::fill(
            prompts::CORRECTION,
            &[
                ("helpers", prompts::HELPER_DOC),
                ("current_code", current),
                ("error_details", &failure.to_string()),
            ],
        );
        log::info!("requesting correction for {}", failure.kind);
        let reply = self.generator.generate(&prompt)?;
        Ok(strip_code_fences(&reply))
    }

    /// Ask for an improved script given the last successful result. The
    /// template escalates with the iteration index (0, 1, then onwards).
    /// Iterations beyond the first wait `improve_delay` before the request
    /// to smooth bursts against the service.
    pub fn synthesize_improvement(
        &self,
        current: &str,
        last_result: &Attrs,
        iteration: usize,
    ) -> Result<String> {
        if iteration > 0 {
            std::thread::sleep(self.improve_delay);
        }

        let template = match iteration {
            0 => prompts::IMPROVE_FIRST,
            1 => prompts::IMPROVE_SECOND,
            _ => prompts::IMPROVE_LATER,
        };
        let serialized = serialize_result(last_result);
        let prompt = prompts::fill(
            template,
            &[
                ("helpers", prompts::HELPER_DOC),
                ("current_code", current),
                ("last_result", &serialized),
            ],
        );
        log::info!("requesting improvement, iteration {}", iteration);
        let reply = self.generator.generate(&prompt)?;
        Ok(strip_code_fences(&reply))
    }

    /// Contextual summary from extracted text content.
    pub fn generate_context_from_text(&self, text: &str) -> Result<String> {
        let prompt = prompts::fill(
            prompts::CONTEXT_WITH_TEXT,
            &[("text_excerpt", &excerpt(text, TEXT_EXCERPT_CHARS))],
        );
        self.generator.generate(&prompt).map(|s| s.trim().to_string())
    }

    /// Contextual summary when no text could be extracted: fall back to the
    /// file's name, extension, and whatever attributes the script produced.
    pub fn generate_context_from_metadata(
        &self,
        file_name: &str,
        file_extension: &str,
        attrs: &Attrs,
    ) -> Result<String> {
        let additional: Attrs = attrs
            .iter()
            .filter(|(k, v)| {
                !k.to_lowercase().contains("path")
                    && !k.to_lowercase().contains("error")
                    && !v.is_null()
                    && v.as_str() != Some("")
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let prompt = prompts::fill(
            prompts::CONTEXT_WITHOUT_TEXT,
            &[
                ("file_name", file_name),
                ("file_extension", file_extension),
                ("additional_info", &serialize_result(&additional)),
            ],
        );
        self.generator.generate(&prompt).map(|s| s.trim().to_string())
    }
}

/// Serialize a result for inclusion in a prompt. The reserved `text` key is
/// dropped first - it is carried separately and would bloat the prompt.
/// Never fails: values were already degraded to JSON at the engine boundary.
pub fn serialize_result(attrs: &Attrs) -> String {
    let mut slim = attrs.clone();
    slim.remove("text");
    serde_json::to_string_pretty(&Value::Object(slim)).unwrap_or_else(|_| "{}".to_string())
}

/// Strip a leading markdown fence (with optional language tag) and a
/// trailing fence from a generated reply. Pure text transform; no parsing.
pub fn strip_code_fences(raw: &str) -> String {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = match rest.split_once('\n') {
            Some((_, body)) => body,
            None => rest,
        };
    }
    text = text.trim();
    if let Some(rest) = text.strip_suffix("```") {
        text = rest.trim_end();
    }
    // A bare language tag sometimes survives on its own first line.
    for tag in ["rhai", "rust"] {
        if let Some(rest) = text.strip_prefix(tag) {
            if let Some(body) = rest.strip_prefix('\n') {
                return body.trim().to_string();
            }
        }
    }
    text.trim().to_string()
}
