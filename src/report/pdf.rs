//! Minimal paginated PDF page model on top of lopdf.
//!
//! A4 pages, Times-Roman/Times-Bold with WinAnsi encoding. Text outside
//! Latin-1 is dropped during sanitization - lossy by design, matching the
//! font encoding. Line metrics are estimated (average glyph width), which
//! is plenty for key-value report blocks.

use anyhow::Result;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::path::Path;

const PAGE_WIDTH: f64 = 595.0;
const PAGE_HEIGHT: f64 = 842.0;
const MARGIN: f64 = 56.0;
const LINE_SPACING: f64 = 1.4;
/// Rough Times average glyph width as a fraction of the font size.
const GLYPH_WIDTH: f64 = 0.5;
const IMAGE_DISPLAY_WIDTH: f64 = 280.0;

#[derive(Debug, Clone, Copy)]
pub enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource_name(&self) -> &'static [u8] {
        match self {
            Font::Regular => b"F1",
            Font::Bold => b"F2",
        }
    }
}

pub struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    finished_pages: Vec<Vec<Operation>>,
    ops: Vec<Operation>,
    xobjects: Vec<(String, ObjectId)>,
    y: f64,
    image_count: usize,
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            finished_pages: Vec::new(),
            ops: Vec::new(),
            xobjects: Vec::new(),
            y: PAGE_HEIGHT - MARGIN,
            image_count: 0,
        }
    }

    fn content_width() -> f64 {
        PAGE_WIDTH - 2.0 * MARGIN
    }

    fn break_page(&mut self) {
        let ops = std::mem::take(&mut self.ops);
        self.finished_pages.push(ops);
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn ensure_room(&mut self, needed: f64) {
        if self.y - needed < MARGIN && !self.ops.is_empty() {
            self.break_page();
        }
    }

    /// Keep only characters the WinAnsi/Latin-1 fonts can carry.
    pub fn sanitize_text(text: &str) -> String {
        text.chars()
            .filter(|c| (*c as u32) <= 0xFF && *c != '\r')
            .collect()
    }

    fn latin1_bytes(text: &str) -> Vec<u8> {
        text.chars()
            .filter(|c| (*c as u32) <= 0xFF)
            .map(|c| c as u8)
            .collect()
    }

    fn emit_line(&mut self, text: &str, font: Font, size: f64, x: f64) {
        let line_height = size * LINE_SPACING;
        self.ensure_room(line_height);
        self.y -= line_height;
        self.ops.push(Operation::new("BT", vec![]));
        self.ops.push(Operation::new(
            "Tf",
            vec![Object::Name(font.resource_name().to_vec()), size.into()],
        ));
        self.ops
            .push(Operation::new("Td", vec![x.into(), self.y.into()]));
        self.ops.push(Operation::new(
            "Tj",
            vec![Object::String(
                Self::latin1_bytes(text),
                StringFormat::Literal,
            )],
        ));
        self.ops.push(Operation::new("ET", vec![]));
    }

    /// Greedy word wrap against the estimated glyph width.
    fn wrap(text: &str, size: f64, width: f64) -> Vec<String> {
        let max_chars = ((width / (size * GLYPH_WIDTH)) as usize).max(8);
        let mut lines = Vec::new();
        for paragraph in text.split('\n') {
            let mut line = String::new();
            for word in paragraph.split_whitespace() {
                let mut word = word;
                // Hard-split anything wider than a whole line.
                while word.chars().count() > max_chars {
                    let split: String = word.chars().take(max_chars).collect();
                    if !line.is_empty() {
                        lines.push(std::mem::take(&mut line));
                    }
                    lines.push(split.clone());
                    word = &word[split.len()..];
                }
                let needed = if line.is_empty() {
                    word.chars().count()
                } else {
                    line.chars().count() + 1 + word.chars().count()
                };
                if needed > max_chars && !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                if !line.is_empty() {
                    line.push(' ');
                }
                line.push_str(word);
            }
            lines.push(line);
        }
        lines
    }

    pub fn title(&mut self, text: &str) {
        let size = 16.0;
        let sanitized = Self::sanitize_text(text);
        for line in Self::wrap(&sanitized, size, Self::content_width()) {
            let est = line.chars().count() as f64 * size * GLYPH_WIDTH;
            let x = MARGIN + ((Self::content_width() - est) / 2.0).max(0.0);
            self.emit_line(&line, Font::Bold, size, x);
        }
        self.line_break(10.0);
    }

    pub fn subtitle(&mut self, text: &str) {
        let size = 14.0;
        let sanitized = Self::sanitize_text(text);
        for line in Self::wrap(&sanitized, size, Self::content_width()) {
            self.emit_line(&line, Font::Bold, size, MARGIN);
        }
        self.line_break(5.0);
    }

    pub fn text(&mut self, text: &str) {
        let size = 12.0;
        let sanitized = Self::sanitize_text(text);
        for line in Self::wrap(&sanitized, size, Self::content_width()) {
            self.emit_line(&line, Font::Regular, size, MARGIN);
        }
        self.line_break(5.0);
    }

    /// Bold key, value wrapped in a column to the right of it.
    pub fn key_value(&mut self, key: &str, value: &str) {
        let size = 12.0;
        let key_text = format!("{}:", Self::sanitize_text(key));
        let key_width = key_text.chars().count() as f64 * size * GLYPH_WIDTH + 5.0;
        let value_x = (MARGIN + key_width).min(PAGE_WIDTH / 2.0);
        let value_width = PAGE_WIDTH - MARGIN - value_x;

        let sanitized = Self::sanitize_text(value);
        let lines = Self::wrap(&sanitized, size, value_width);

        let line_height = size * LINE_SPACING;
        self.ensure_room(line_height * (lines.len().min(3)) as f64);

        // Key and first value line share a baseline.
        self.emit_line(&key_text, Font::Bold, size, MARGIN);
        self.y += line_height;
        if let Some(first) = lines.first() {
            self.emit_line(first, Font::Regular, size, value_x);
        }
        for line in lines.iter().skip(1) {
            self.emit_line(line, Font::Regular, size, value_x);
        }
        self.line_break(5.0);
    }

    pub fn line_break(&mut self, height: f64) {
        self.y -= height;
        if self.y < MARGIN {
            self.break_page();
        }
    }

    /// Decode an image file and embed it as an RGB XObject scaled to a
    /// fixed display width.
    pub fn image(&mut self, path: &Path) -> Result<()> {
        let decoded = image::open(path)?.to_rgb8();
        let (width, height) = decoded.dimensions();

        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            decoded.into_raw(),
        );
        let stream_id = self.doc.add_object(stream);
        self.image_count += 1;
        let name = format!("Im{}", self.image_count);
        self.xobjects.push((name.clone(), stream_id));

        let display_width = IMAGE_DISPLAY_WIDTH.min(Self::content_width());
        let display_height = display_width * (height as f64 / width as f64);
        self.ensure_room(display_height + 10.0);
        self.y -= display_height;

        self.ops.push(Operation::new("q", vec![]));
        self.ops.push(Operation::new(
            "cm",
            vec![
                display_width.into(),
                0.into(),
                0.into(),
                display_height.into(),
                MARGIN.into(),
                self.y.into(),
            ],
        ));
        self.ops
            .push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
        self.ops.push(Operation::new("Q", vec![]));
        self.line_break(10.0);
        Ok(())
    }

    /// Assemble the page tree and write the document.
    pub fn finish(mut self, output: &Path) -> Result<()> {
        self.break_page();

        let font_regular = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Times-Roman",
            "Encoding" => "WinAnsiEncoding",
        });
        let font_bold = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Times-Bold",
            "Encoding" => "WinAnsiEncoding",
        });

        let mut fonts = Dictionary::new();
        fonts.set("F1", font_regular);
        fonts.set("F2", font_bold);
        let mut resources = Dictionary::new();
        resources.set("Font", fonts);
        if !self.xobjects.is_empty() {
            let mut xobjects = Dictionary::new();
            for (name, id) in &self.xobjects {
                xobjects.set(name.clone(), Object::Reference(*id));
            }
            resources.set("XObject", xobjects);
        }
        let resources_id = self.doc.add_object(resources);

        let pages = std::mem::take(&mut self.finished_pages);
        let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
        for operations in pages {
            let content = Content { operations };
            let content_id = self
                .doc
                .add_object(Stream::new(Dictionary::new(), content.encode()?));
            let page_id = self.doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => self.pages_id,
                "Contents" => content_id,
                "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
                "Resources" => resources_id,
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.compress();
        self.doc.save(output)?;
        Ok(())
    }
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_drops_non_latin1() {
        assert_eq!(PdfBuilder::sanitize_text("héllo wörld"), "héllo wörld");
        assert_eq!(PdfBuilder::sanitize_text("日本語abc"), "abc");
        assert_eq!(PdfBuilder::sanitize_text("a\r\nb"), "a\nb");
    }

    #[test]
    fn test_wrap_respects_width() {
        let lines = PdfBuilder::wrap("one two three four five six seven", 12.0, 120.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.chars().count() <= 20);
        }
    }

    #[test]
    fn test_wrap_hard_splits_long_words() {
        let word = "x".repeat(200);
        let lines = PdfBuilder::wrap(&word, 12.0, 120.0);
        assert!(lines.len() > 1);
    }

    #[test]
    fn test_finish_writes_valid_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("smoke.pdf");
        let mut pdf = PdfBuilder::new();
        pdf.title("Smoke Test Report");
        pdf.subtitle("File Path");
        pdf.text("/tmp/example.txt");
        pdf.key_value("Size", "1234");
        pdf.finish(&out).unwrap();

        let bytes = std::fs::read(&out).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        // Round-trips through lopdf's own parser.
        let doc = Document::load(&out).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_many_lines_paginate() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("pages.pdf");
        let mut pdf = PdfBuilder::new();
        pdf.title("Pagination");
        for i in 0..120 {
            pdf.key_value(&format!("key_{}", i), "value");
        }
        pdf.finish(&out).unwrap();
        let doc = Document::load(&out).unwrap();
        assert!(doc.get_pages().len() > 1);
    }

    #[test]
    fn test_embed_image() {
        let dir = tempfile::tempdir().unwrap();
        let img_path = dir.path().join("pix.png");
        image::RgbImage::from_pixel(4, 4, image::Rgb([255, 0, 0]))
            .save(&img_path)
            .unwrap();

        let out = dir.path().join("img.pdf");
        let mut pdf = PdfBuilder::new();
        pdf.title("Image");
        pdf.image(&img_path).unwrap();
        pdf.finish(&out).unwrap();

        let bytes = std::fs::read(&out).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
