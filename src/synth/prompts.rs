//! Prompt templates for the script synthesizer.
//!
//! Templates use `{named}` slots filled by [`fill`]. Replies are expected to
//! be bare Rhai source; the synthesizer strips fences defensively anyway.

/// The host-function vocabulary available to every script. Quoted verbatim
/// into the improvement prompts so the generator knows what it may call.
pub const HELPER_DOC: &str = r#"Host functions available to the script:
  file_size(path) -> int            size in bytes
  file_name(path) -> string         final path component
  file_stem(path) -> string         file name without extension
  extension(path) -> string         lowercased extension, "" if none
  modified_at(path) -> string       RFC 3339 modification timestamp
  created_at(path) -> string        RFC 3339 creation timestamp
  read_text_head(path, n) -> string first n characters, lossy UTF-8
  line_count(path) -> int           number of lines of text
  image_dimensions(path) -> map     #{ width, height } for image files
  is_supported_image(path) -> bool  true for png/jpg/jpeg/gif/bmp/tif/tiff"#;

pub const CORRECTION: &str = r#"You maintain a Rhai script that extracts descriptive attributes from a file.
The script must define exactly one function `describe(path)` that returns an
object map (`#{ ... }`), and the map must always contain a `path` key equal
to the `path` argument.

{helpers}

Current script:
{current_code}

It failed with:
{error_details}

Rewrite the script so it no longer fails. Keep the `describe(path)`
signature. Reply with only the corrected Rhai source - no commentary, no
markdown fences."#;

pub const IMPROVE_FIRST: &str = r#"You maintain a Rhai script that extracts descriptive attributes from a file.
The script defines one function `describe(path)` returning an object map
that must keep a `path` key equal to the `path` argument.

{helpers}

Current script:
{current_code}

Its last output was:
{last_result}

Extend the script to extract more useful attributes of the file: size,
timestamps, name parts, a short text preview when the file is textual, image
dimensions when it is an image. Add a `text` key holding extracted textual
content when there is any. Reply with only the improved Rhai source - no
commentary, no markdown fences."#;

pub const IMPROVE_SECOND: &str = r#"You maintain a Rhai script that extracts descriptive attributes from a file.
The script defines one function `describe(path)` returning an object map
that must keep a `path` key equal to the `path` argument.

{helpers}

Current script:
{current_code}

Its last output was:
{last_result}

Review the output above. Drop attributes that came back empty or useless,
improve the ones that are close, and add any cheap attribute still missing.
Prefer robust code: a helper call that may fail for this file type should
not break the whole map. Reply with only the improved Rhai source - no
commentary, no markdown fences."#;

pub const IMPROVE_LATER: &str = r#"You maintain a Rhai script that extracts descriptive attributes from a file.
The script defines one function `describe(path)` returning an object map
that must keep a `path` key equal to the `path` argument.

{helpers}

Current script:
{current_code}

Its last output was:
{last_result}

Polish the script: keep every attribute that produced a good value, make the
remaining ones more informative, and keep the output stable between runs.
Reply with only the improved Rhai source - no commentary, no markdown
fences."#;

pub const CONTEXT_WITH_TEXT: &str = r#"The following is the beginning of a document's textual content. Write a
short paragraph (3-5 sentences) summarizing what this document appears to
be and what it is about. Plain prose, no headings, no bullet points.

{text_excerpt}"#;

pub const CONTEXT_WITHOUT_TEXT: &str = r#"A file was analyzed but no textual content could be extracted from it.
Write a short paragraph (3-5 sentences) describing, in plain prose, what
kind of file this most likely is and what it is typically used for.

File name: {file_name}
File extension: {file_extension}
Extracted attributes:
{additional_info}"#;

/// Replace each `{name}` slot with its value. Unknown slots are left as-is
/// so a template typo shows up verbatim in the outgoing prompt.
pub fn fill(template: &str, slots: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in slots {
        out = out.replace(&format!("{{{}}}", name), value);
    }
    out
}
