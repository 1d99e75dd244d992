use serde::{Deserialize, Serialize};

use crate::span::Span;

/// A source map builder following the Source Map v3 specification
/// https://sourcemaps.info/spec.html
#[derive(Debug)]
pub struct SourceMapBuilder {
    file: Option<String>,
    sources: Vec<String>,
    sources_content: Vec<Option<String>>,
    names: Vec<String>,
    mappings: Vec<Mapping>,
    generated_line: usize,
    generated_column: usize,
}

#[derive(Debug, Clone)]
struct Mapping {
    generated_line: usize,
    generated_column: usize,
    source_line: usize,
    source_column: usize,
    name_index: Option<usize>,
}

/// The JSON structure for source maps
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources_content: Vec<Option<String>>,
    #[serde(default)]
    pub names: Vec<String>,
    pub mappings: String,
}

impl SourceMapBuilder {
    pub fn new(source_file: String) -> Self {
        Self {
            file: None,
            sources: vec![source_file],
            sources_content: Vec::new(),
            names: Vec::new(),
            mappings: Vec::new(),
            generated_line: 0,
            generated_column: 0,
        }
    }

    pub fn set_file(&mut self, file: String) {
        self.file = Some(file);
    }

    pub fn add_source_content(&mut self, content: String) {
        self.sources_content.push(Some(content));
    }

    /// Maps the current generated position to `source_span`.
    ///
    /// Template spans are 1-based in lines; source maps are 0-based.
    pub fn add_mapping(&mut self, source_span: Span, name: Option<String>) {
        let name_index = name.map(|n| {
            if let Some(idx) = self.names.iter().position(|existing| existing == &n) {
                idx
            } else {
                self.names.push(n);
                self.names.len() - 1
            }
        });

        self.mappings.push(Mapping {
            generated_line: self.generated_line,
            generated_column: self.generated_column,
            source_line: source_span.line.saturating_sub(1) as usize,
            source_column: source_span.column as usize,
            name_index,
        });
    }

    /// Advance the generated position by writing text
    pub fn advance(&mut self, text: &str) {
        for ch in text.chars() {
            if ch == '\n' {
                self.generated_line += 1;
                self.generated_column = 0;
            } else {
                self.generated_column += 1;
            }
        }
    }

    pub fn build(self) -> SourceMap {
        let mappings = self.encode_mappings();

        SourceMap {
            version: 3,
            file: self.file,
            sources: self.sources,
            sources_content: self.sources_content,
            names: self.names,
            mappings,
        }
    }

    fn encode_mappings(&self) -> String {
        let mut result = String::new();
        let mut prev_generated_line = 0;
        let mut prev_generated_col = 0;
        let mut prev_source_line = 0;
        let mut prev_source_col = 0;
        let mut prev_name_index = 0;

        for mapping in &self.mappings {
            let new_line = prev_generated_line < mapping.generated_line;
            while prev_generated_line < mapping.generated_line {
                result.push(';');
                prev_generated_line += 1;
                prev_generated_col = 0;
            }

            if !result.is_empty() && !new_line {
                result.push(',');
            }

            // [generated_col, source_index, source_line, source_col, name_index],
            // each relative to the previous segment
            let generated_col_delta = mapping.generated_column as i32 - prev_generated_col as i32;
            result.push_str(&Self::encode_vlq(generated_col_delta));
            prev_generated_col = mapping.generated_column;

            // single source file
            result.push_str(&Self::encode_vlq(0));

            let source_line_delta = mapping.source_line as i32 - prev_source_line as i32;
            result.push_str(&Self::encode_vlq(source_line_delta));
            prev_source_line = mapping.source_line;

            let source_col_delta = mapping.source_column as i32 - prev_source_col as i32;
            result.push_str(&Self::encode_vlq(source_col_delta));
            prev_source_col = mapping.source_column;

            if let Some(name_idx) = mapping.name_index {
                let name_index_delta = name_idx as i32 - prev_name_index;
                result.push_str(&Self::encode_vlq(name_index_delta));
                prev_name_index = name_idx as i32;
            }
        }

        result
    }

    /// Encode a single value using VLQ Base64 encoding
    fn encode_vlq(value: i32) -> String {
        const BASE64_CHARS: &[u8] =
            b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

        let mut vlq = if value < 0 {
            ((-value) << 1) | 1
        } else {
            value << 1
        };

        let mut result = String::new();

        loop {
            let mut digit = (vlq & 0x1F) as u8;
            vlq >>= 5;

            if vlq > 0 {
                digit |= 0x20; // continuation bit
            }

            result.push(BASE64_CHARS[digit as usize] as char);

            if vlq == 0 {
                break;
            }
        }

        result
    }
}

impl SourceMap {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_map_builder() {
        let mut builder = SourceMapBuilder::new("card.hbs".to_string());
        builder.set_file("card.hbs.js".to_string());

        builder.add_mapping(Span::new(0, 5, 1, 0), Some("title".to_string()));
        builder.advance("buffer");

        let source_map = builder.build();

        assert_eq!(source_map.version, 3);
        assert_eq!(source_map.file, Some("card.hbs.js".to_string()));
        assert_eq!(source_map.sources, vec!["card.hbs".to_string()]);
        assert_eq!(source_map.names, vec!["title".to_string()]);
        assert_eq!(source_map.mappings, "AAAAA");
    }

    #[test]
    fn test_vlq_encoding() {
        assert_eq!(SourceMapBuilder::encode_vlq(0), "A");
        assert_eq!(SourceMapBuilder::encode_vlq(1), "C");
        assert_eq!(SourceMapBuilder::encode_vlq(-1), "D");
        assert_eq!(SourceMapBuilder::encode_vlq(15), "e");
        assert_eq!(SourceMapBuilder::encode_vlq(-15), "f");
        assert_eq!(SourceMapBuilder::encode_vlq(16), "gB");
        assert_eq!(SourceMapBuilder::encode_vlq(123), "2H");
    }

    #[test]
    fn test_multiline_mappings() {
        let mut builder = SourceMapBuilder::new("page.hbs".to_string());

        builder.add_mapping(Span::new(0, 5, 1, 0), None);
        builder.advance("line one\n");
        builder.add_mapping(Span::new(6, 8, 3, 4), None);
        builder.advance("line two");

        let source_map = builder.build();

        // second segment: col 0, same source, +2 lines, +4 columns
        assert_eq!(source_map.mappings, "AAAA;AAEI");
    }

    #[test]
    fn test_to_json_uses_camel_case() {
        let mut builder = SourceMapBuilder::new("a.hbs".to_string());
        builder.add_source_content("{{x}}".to_string());
        let json = builder.build().to_json().unwrap();
        assert!(json.contains("\"sourcesContent\":[\"{{x}}\"]"));
        assert!(json.contains("\"version\":3"));
    }
}
