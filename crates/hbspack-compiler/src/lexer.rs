//! Splits a template into raw content and mustache tags.
//!
//! The lexer only finds tag boundaries and classifies each tag by its
//! sigil; the expression inside a tag is handed to the parser as text.

use crate::error::{Error, Result};
use crate::span::{LineIndex, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// `{{expr}}`
    Mustache,
    /// `{{{expr}}}` or `{{& expr}}`
    Unescaped,
    /// `{{#expr}}`
    Block,
    /// `{{^expr}}`
    Inverse,
    /// `{{/name}}`
    Close,
    /// `{{> name}}`
    Partial,
    /// `{{else}}`, `{{else expr}}` or `{{^}}`
    Else,
    /// `{{! ...}}` or `{{!-- ... --}}`
    Comment,
}

/// Whitespace control markers (`{{~` and `~}}`) on a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Strip {
    pub open: bool,
    pub close: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Content {
        text: String,
        span: Span,
    },
    Tag {
        kind: TagKind,
        body: String,
        strip: Strip,
        span: Span,
    },
}

impl Token {
    pub fn span(&self) -> Span {
        match self {
            Token::Content { span, .. } | Token::Tag { span, .. } => *span,
        }
    }
}

pub struct Lexer<'a> {
    source: &'a str,
    lines: LineIndex,
    pos: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            lines: LineIndex::new(source),
            pos: 0,
            tokens: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let source = self.source;
        let bytes = source.as_bytes();
        let mut text = String::new();
        let mut content_start = 0;

        while self.pos < self.source.len() {
            let Some(rel) = self.source[self.pos..].find("{{") else {
                text.push_str(&self.source[self.pos..]);
                self.pos = self.source.len();
                break;
            };
            let open = self.pos + rel;

            // `\{{` is a literal mustache; `\\{{` is a literal backslash
            // followed by a real one.
            let escaped = open > 0 && bytes[open - 1] == b'\\';
            let double_escaped = escaped && open > 1 && bytes[open - 2] == b'\\';
            if escaped && !double_escaped {
                text.push_str(&self.source[self.pos..open - 1]);
                let resume = self.source[open + 2..]
                    .find("{{")
                    .map(|r| open + 2 + r)
                    .unwrap_or(self.source.len());
                text.push_str(&self.source[open..resume]);
                self.pos = resume;
                continue;
            }

            let content_end = if double_escaped { open - 1 } else { open };
            text.push_str(&self.source[self.pos..content_end]);
            self.flush_content(&mut text, content_start, open);

            let end = self.lex_tag(open)?;
            self.pos = end;
            content_start = end;
        }

        let end = self.source.len();
        self.flush_content(&mut text, content_start, end);
        Ok(apply_whitespace_control(self.tokens))
    }

    fn flush_content(&mut self, text: &mut String, start: usize, end: usize) {
        if text.is_empty() {
            return;
        }
        let span = self.lines.span(self.source, start, end);
        self.tokens.push(Token::Content {
            text: std::mem::take(text),
            span,
        });
    }

    /// Lexes the tag opening at `open` and returns the offset just past it.
    fn lex_tag(&mut self, open: usize) -> Result<usize> {
        let source = self.source;
        let mut i = open + 2;

        if source[open..].starts_with("{{{{") {
            let end = source[open..]
                .find("}}}}")
                .map_or(source.len(), |rel| open + rel + 4);
            let span = self.lines.span(source, open, end);
            return Err(Error::unsupported("raw blocks", span));
        }

        let triple = source[i..].starts_with('{');
        if triple {
            i += 1;
        }

        let mut strip = Strip::default();
        if source[i..].starts_with('~') {
            strip.open = true;
            i += 1;
        }

        if !triple && source[i..].starts_with('!') {
            return self.lex_comment(open, i + 1, strip);
        }

        let mut kind = if triple {
            TagKind::Unescaped
        } else {
            match source[i..].chars().next() {
                Some('#') => TagKind::Block,
                Some('^') => TagKind::Inverse,
                Some('/') => TagKind::Close,
                Some('>') => TagKind::Partial,
                Some('&') => TagKind::Unescaped,
                _ => TagKind::Mustache,
            }
        };
        if !triple && kind != TagKind::Mustache {
            i += 1;
        }

        let closer = if triple { "}}}" } else { "}}" };
        let Some(rel) = source[i..].find(closer) else {
            let span = self.lines.span(source, open, source.len());
            return Err(Error::parse("Unclosed mustache tag", span));
        };
        let close = i + rel;
        let end = close + closer.len();
        let span = self.lines.span(source, open, end);

        if kind == TagKind::Block {
            match source[i..].chars().next() {
                Some('>') => return Err(Error::unsupported("partial blocks", span)),
                Some('*') => return Err(Error::unsupported("decorator blocks", span)),
                _ => {}
            }
        }
        if kind == TagKind::Mustache && source[i..].starts_with('*') {
            return Err(Error::unsupported("decorators", span));
        }

        let mut body = &source[i..close];
        if let Some(stripped) = body.strip_suffix('~') {
            strip.close = true;
            body = stripped;
        }
        let mut body = body.trim().to_string();

        if kind == TagKind::Mustache && (body == "else" || body.starts_with("else ")) {
            kind = TagKind::Else;
            body = body["else".len()..].trim().to_string();
        } else if kind == TagKind::Inverse && body.is_empty() {
            kind = TagKind::Else;
        }

        if body.is_empty() && kind != TagKind::Else {
            return Err(Error::parse("Empty mustache tag", span));
        }

        self.tokens.push(Token::Tag {
            kind,
            body,
            strip,
            span,
        });
        Ok(end)
    }

    fn lex_comment(&mut self, open: usize, body_start: usize, mut strip: Strip) -> Result<usize> {
        let source = self.source;
        let unclosed = || {
            let span = self.lines.span(source, open, source.len());
            Error::parse("Unclosed comment", span)
        };

        // `{{!-- ... --}}` may contain `}}`; it only ends at `--}}` or `--~}}`.
        let (text_start, text_end, end) = if source[body_start..].starts_with("--") {
            let text_start = body_start + 2;
            let mut from = text_start;
            loop {
                let at = from + source[from..].find("--").ok_or_else(unclosed)?;
                let rest = &source[at + 2..];
                if rest.starts_with("}}") {
                    break (text_start, at, at + 4);
                }
                if rest.starts_with("~}}") {
                    strip.close = true;
                    break (text_start, at, at + 5);
                }
                from = at + 1;
            }
        } else {
            let close = body_start + source[body_start..].find("}}").ok_or_else(unclosed)?;
            if close > body_start && source[..close].ends_with('~') {
                strip.close = true;
                (body_start, close - 1, close + 2)
            } else {
                (body_start, close, close + 2)
            }
        };

        let body = source[text_start..text_end].to_string();
        let span = self.lines.span(source, open, end);
        self.tokens.push(Token::Tag {
            kind: TagKind::Comment,
            body,
            strip,
            span,
        });
        Ok(end)
    }
}

/// Applies `{{~` / `~}}` by trimming the neighbouring content tokens.
fn apply_whitespace_control(mut tokens: Vec<Token>) -> Vec<Token> {
    for i in 0..tokens.len() {
        let Token::Tag { strip, .. } = tokens[i] else {
            continue;
        };
        if strip.open && i > 0 {
            if let Token::Content { text, .. } = &mut tokens[i - 1] {
                let trimmed_len = text.trim_end().len();
                text.truncate(trimmed_len);
            }
        }
        if strip.close && i + 1 < tokens.len() {
            if let Token::Content { text, .. } = &mut tokens[i + 1] {
                *text = text.trim_start().to_string();
            }
        }
    }
    tokens.retain(|t| !matches!(t, Token::Content { text, .. } if text.is_empty()));
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Option<TagKind>> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| match t {
                Token::Content { .. } => None,
                Token::Tag { kind, .. } => Some(kind),
            })
            .collect()
    }

    fn bodies(source: &str) -> Vec<String> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| match t {
                Token::Content { text, .. } => text,
                Token::Tag { body, .. } => body,
            })
            .collect()
    }

    #[test]
    fn test_content_only() {
        assert_eq!(bodies("plain text"), vec!["plain text"]);
    }

    #[test]
    fn test_tag_kinds() {
        assert_eq!(
            kinds("{{a}}{{{b}}}{{&c}}{{#d}}{{else}}{{^}}{{/d}}{{> e}}{{! f}}"),
            vec![
                Some(TagKind::Mustache),
                Some(TagKind::Unescaped),
                Some(TagKind::Unescaped),
                Some(TagKind::Block),
                Some(TagKind::Else),
                Some(TagKind::Else),
                Some(TagKind::Close),
                Some(TagKind::Partial),
                Some(TagKind::Comment),
            ]
        );
    }

    #[test]
    fn test_bodies_are_trimmed() {
        assert_eq!(bodies("Hi {{ name }}!"), vec!["Hi ", "name", "!"]);
    }

    #[test]
    fn test_else_with_expression() {
        let tokens = Lexer::new("{{else if ready}}").tokenize().unwrap();
        match &tokens[0] {
            Token::Tag { kind, body, .. } => {
                assert_eq!(*kind, TagKind::Else);
                assert_eq!(body, "if ready");
            }
            other => panic!("unexpected token {:?}", other),
        }
    }

    #[test]
    fn test_long_comment_may_contain_mustaches() {
        assert_eq!(
            bodies("a{{!-- {{ignored}} --}}b"),
            vec!["a", " {{ignored}} ", "b"]
        );
    }

    #[test]
    fn test_escaped_mustache_is_content() {
        assert_eq!(bodies("\\{{name}} {{x}}"), vec!["{{name}} ", "x"]);
    }

    #[test]
    fn test_whitespace_control() {
        assert_eq!(bodies("a   {{~x~}}   b"), vec!["a", "x", "b"]);
    }

    #[test]
    fn test_unclosed_tag_is_error() {
        let err = Lexer::new("hello {{name").tokenize().unwrap_err();
        assert!(err.to_string().contains("Unclosed mustache tag"));
    }

    #[test]
    fn test_partial_block_is_unsupported() {
        let err = Lexer::new("{{#> layout}}x{{/layout}}").tokenize().unwrap_err();
        assert!(matches!(err, Error::Unsupported { .. }));
    }

    #[test]
    fn test_raw_block_is_unsupported() {
        let err = Lexer::new("a\n{{{{raw}}}}{{x}}{{{{/raw}}}}").tokenize().unwrap_err();
        assert!(matches!(err, Error::Unsupported { ref feature, .. } if feature == "raw blocks"));
        let span = err.span();
        assert_eq!((span.line, span.column), (2, 0));
    }

    #[test]
    fn test_tag_span_points_at_open_braces() {
        let tokens = Lexer::new("line\n  {{x}}").tokenize().unwrap();
        let span = tokens[1].span();
        assert_eq!((span.line, span.column), (2, 2));
        assert_eq!((span.end_line, span.end_column), (2, 7));
    }
}
