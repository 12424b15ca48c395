//! Report document assembly.
//!
//! Consumes a sanitized execution result plus an optional context string and
//! lays out the PDF: title, path section, one block per remaining attribute
//! (key-value text, or an embedded image when the value points at one), and
//! a trailing contextual-information section.

pub mod pdf;

use anyhow::Result;
use serde_json::Value;
use std::path::Path;

use crate::logic::Attrs;
use crate::util::truncate;
use pdf::PdfBuilder;

/// Values longer than this are dropped from the report body.
const MAX_TEXT_LENGTH: usize = 500;
const MAX_TITLE_LENGTH: usize = 60;

const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "gif", "bmp", "tif", "tiff"];

/// True when the path ends in a renderable image extension.
pub fn is_supported_image(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Drop entries with nothing to show: nulls, empty strings, and bare
/// "error" markers. Already-clean input comes back unchanged.
pub fn sanitize_attrs(attrs: &Attrs) -> Attrs {
    attrs
        .iter()
        .filter(|(_, v)| match v {
            Value::Null => false,
            Value::String(s) => !s.is_empty() && s != "error",
            _ => true,
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// `creation_date` -> `Creation Date`
fn humanize_key(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn list_text(items: &[Value]) -> String {
    items
        .iter()
        .map(|v| scalar_text(v).unwrap_or_else(|| v.to_string()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render the report and write it to `output`.
pub fn render(
    attrs: &Attrs,
    context: Option<&str>,
    output: &Path,
    include_errors: bool,
) -> Result<()> {
    let data = sanitize_attrs(attrs);
    let subject_path = data
        .get("path")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let file_name = Path::new(&subject_path)
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| subject_path.clone());

    let mut builder = PdfBuilder::new();
    builder.title(&title_text(&file_name));

    builder.subtitle("File Path");
    builder.text(&subject_path);

    let mut subject_image_embedded = false;

    for (key, value) in &data {
        let key_lower = key.to_lowercase();
        if key_lower.contains("path") || key_lower == "text" {
            continue;
        }
        if key_lower.contains("error") && !include_errors {
            continue;
        }

        match value {
            Value::String(s) => {
                let is_file = Path::new(s).is_file();
                if is_file && is_supported_image(s) {
                    embed_image(&mut builder, s, key);
                    if *s == subject_path {
                        subject_image_embedded = true;
                    }
                } else if s.chars().count() <= MAX_TEXT_LENGTH && !is_file {
                    builder.key_value(&humanize_key(key), s);
                }
            }
            Value::Number(_) | Value::Bool(_) => {
                if let Some(text) = scalar_text(value) {
                    builder.key_value(&humanize_key(key), &text);
                }
            }
            Value::Array(items) => {
                if items.len() <= MAX_TEXT_LENGTH {
                    builder.key_value(&humanize_key(key), &list_text(items));
                }
            }
            Value::Object(_) => {
                let compact = value.to_string();
                if compact.chars().count() <= MAX_TEXT_LENGTH {
                    builder.key_value(&humanize_key(key), &compact);
                }
            }
            Value::Null => {}
        }
    }

    if is_supported_image(&subject_path) && !subject_image_embedded {
        embed_image(&mut builder, &subject_path, "Image");
    }

    if let Some(context) = context {
        builder.subtitle("Contextual Information");
        builder.text(context);
    }

    builder.finish(output)
}

/// "{file name} Report", sanitized and truncated with an ellipsis.
fn title_text(file_name: &str) -> String {
    truncate(
        &PdfBuilder::sanitize_text(&format!("{} Report", file_name)),
        MAX_TITLE_LENGTH,
    )
}

fn embed_image(builder: &mut PdfBuilder, path: &str, caption: &str) {
    builder.subtitle(&humanize_key(caption));
    if Path::new(path).is_file() {
        if let Err(err) = builder.image(Path::new(path)) {
            log::error!("failed to embed image {}: {}", path, err);
            builder.text(&format!("Failed to add image: {}", err));
        }
    } else {
        builder.text(&format!("Image not found or unsupported format: {}", path));
    }
}
