//! Host functions the extraction script builds on.
//!
//! The evolved script cannot reach the filesystem on its own; this is the
//! fixed vocabulary it calls into. Helpers return errors rather than
//! panicking so a bad call becomes an ordinary script failure.

use chrono::{DateTime, Utc};
use rhai::{Dynamic, Engine, EvalAltResult};
use std::path::Path;
use std::time::SystemTime;

/// Cap on `read_text_head` so a script cannot drag an entire archive into
/// the result map.
const MAX_TEXT_HEAD: i64 = 100_000;

pub fn register_helpers(engine: &mut Engine) {
    engine.register_fn("file_size", |path: &str| -> Result<i64, Box<EvalAltResult>> {
        std::fs::metadata(path)
            .map(|m| m.len() as i64)
            .map_err(|e| format!("file_size({}): {}", path, e).into())
    });

    engine.register_fn("file_name", |path: &str| {
        Path::new(path)
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    engine.register_fn("file_stem", |path: &str| {
        Path::new(path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    engine.register_fn("extension", |path: &str| {
        Path::new(path)
            .extension()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    });

    engine.register_fn(
        "modified_at",
        |path: &str| -> Result<String, Box<EvalAltResult>> {
            std::fs::metadata(path)
                .and_then(|m| m.modified())
                .map(format_timestamp)
                .map_err(|e| format!("modified_at({}): {}", path, e).into())
        },
    );

    engine.register_fn(
        "created_at",
        |path: &str| -> Result<String, Box<EvalAltResult>> {
            std::fs::metadata(path)
                .and_then(|m| m.created())
                .map(format_timestamp)
                .map_err(|e| format!("created_at({}): {}", path, e).into())
        },
    );

    engine.register_fn(
        "read_text_head",
        |path: &str, max_chars: i64| -> Result<String, Box<EvalAltResult>> {
            let data = std::fs::read(path)
                .map_err(|e| format!("read_text_head({}): {}", path, e))?;
            let text = String::from_utf8_lossy(&data);
            let max = max_chars.clamp(0, MAX_TEXT_HEAD) as usize;
            Ok(text.chars().take(max).collect())
        },
    );

    engine.register_fn(
        "line_count",
        |path: &str| -> Result<i64, Box<EvalAltResult>> {
            let data =
                std::fs::read(path).map_err(|e| format!("line_count({}): {}", path, e))?;
            Ok(String::from_utf8_lossy(&data).lines().count() as i64)
        },
    );

    engine.register_fn(
        "image_dimensions",
        |path: &str| -> Result<rhai::Map, Box<EvalAltResult>> {
            let (width, height) = image::image_dimensions(path)
                .map_err(|e| format!("image_dimensions({}): {}", path, e))?;
            let mut map = rhai::Map::new();
            map.insert("width".into(), Dynamic::from(width as i64));
            map.insert("height".into(), Dynamic::from(height as i64));
            Ok(map)
        },
    );

    engine.register_fn("is_supported_image", |path: &str| {
        crate::report::is_supported_image(path)
    });
}

fn format_timestamp(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339()
}
