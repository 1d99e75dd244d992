//! Builds the statement tree from lexer tokens.

use crate::ast::{Block, Call, Expr, Hash, Literal, Mustache, Partial, PathExpr, Program, Statement};
use crate::error::{Error, Result};
use crate::lexer::{Lexer, TagKind, Token};
use crate::span::Span;

/// Parses a whole template.
pub fn parse(source: &str) -> Result<Program> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse()
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse(mut self) -> Result<Program> {
        let body = self.parse_body()?;
        if let Some(Token::Tag {
            kind,
            body: tag_body,
            span,
            ..
        }) = self.tokens.get(self.pos)
        {
            let tag = match kind {
                TagKind::Else => "else".to_string(),
                _ => format!("/{}", tag_body),
            };
            return Err(Error::UnexpectedTag { tag, span: *span });
        }
        Ok(Program {
            body,
            block_params: Vec::new(),
        })
    }

    /// Parses statements up to (not including) the next `else` or close tag.
    fn parse_body(&mut self) -> Result<Vec<Statement>> {
        let mut body = Vec::new();
        while let Some(token) = self.tokens.get(self.pos) {
            if matches!(
                token,
                Token::Tag {
                    kind: TagKind::Else | TagKind::Close,
                    ..
                }
            ) {
                break;
            }
            let token = token.clone();
            self.pos += 1;
            body.push(self.parse_statement(token)?);
        }
        Ok(body)
    }

    fn parse_statement(&mut self, token: Token) -> Result<Statement> {
        let (kind, body, span) = match token {
            Token::Content { text, .. } => return Ok(Statement::Content(text)),
            Token::Tag {
                kind, body, span, ..
            } => (kind, body, span),
        };

        match kind {
            TagKind::Comment => Ok(Statement::Comment(body)),
            TagKind::Mustache | TagKind::Unescaped => {
                let (call, _) = parse_call(&body, span, false)?;
                Ok(Statement::Mustache(Mustache {
                    call,
                    escaped: kind == TagKind::Mustache,
                    span,
                }))
            }
            TagKind::Partial => parse_partial(&body, span).map(Statement::Partial),
            TagKind::Block | TagKind::Inverse => {
                self.parse_block(&body, span, kind == TagKind::Inverse)
            }
            TagKind::Else | TagKind::Close => Err(Error::UnexpectedTag {
                tag: body,
                span,
            }),
        }
    }

    fn parse_block(&mut self, body: &str, span: Span, inverted: bool) -> Result<Statement> {
        let (call, block_params) = parse_call(body, span, true)?;
        let (program, inverse) = self.parse_block_tail(block_params)?;

        let open = head_text(&call.head);
        match self.tokens.get(self.pos) {
            Some(Token::Tag {
                kind: TagKind::Close,
                body: close,
                span: close_span,
                ..
            }) => {
                if *close != open {
                    return Err(Error::MismatchedBlock {
                        open,
                        close: close.clone(),
                        span: *close_span,
                    });
                }
                self.pos += 1;
            }
            _ => return Err(Error::UnclosedBlock { name: open, span }),
        }

        let (program, inverse) = if inverted {
            (inverse.unwrap_or_default(), Some(program))
        } else {
            (program, inverse)
        };

        Ok(Statement::Block(Block {
            call,
            program,
            inverse,
            span,
        }))
    }

    /// Parses a block's main program and its `else` section. A chained
    /// `{{else if x}}` becomes a nested block inside the inverse program;
    /// the enclosing block consumes the shared close tag.
    fn parse_block_tail(&mut self, block_params: Vec<String>) -> Result<(Program, Option<Program>)> {
        let body = self.parse_body()?;
        let program = Program { body, block_params };

        let Some(Token::Tag {
            kind: TagKind::Else,
            body: chained,
            span,
            ..
        }) = self.tokens.get(self.pos).cloned()
        else {
            return Ok((program, None));
        };
        self.pos += 1;

        if chained.is_empty() {
            let body = self.parse_body()?;
            if let Some(Token::Tag {
                kind: TagKind::Else,
                span,
                ..
            }) = self.tokens.get(self.pos)
            {
                return Err(Error::UnexpectedTag {
                    tag: "else".to_string(),
                    span: *span,
                });
            }
            return Ok((
                program,
                Some(Program {
                    body,
                    block_params: Vec::new(),
                }),
            ));
        }

        let (call, params) = parse_call(&chained, span, true)?;
        let (nested_program, nested_inverse) = self.parse_block_tail(params)?;
        let nested = Statement::Block(Block {
            call,
            program: nested_program,
            inverse: nested_inverse,
            span,
        });
        Ok((
            program,
            Some(Program {
                body: vec![nested],
                block_params: Vec::new(),
            }),
        ))
    }
}

fn head_text(head: &Expr) -> String {
    match head {
        Expr::Path(path) => path.original.clone(),
        Expr::Literal(Literal::String(s)) => s.clone(),
        Expr::Literal(Literal::Number(n)) => n.clone(),
        Expr::Literal(Literal::Boolean(b)) => b.to_string(),
        Expr::Literal(Literal::Null) => "null".to_string(),
        Expr::Literal(Literal::Undefined) => "undefined".to_string(),
        Expr::SubExpr(_) => "(subexpression)".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ExprToken {
    Word(String),
    Str(String),
    Open,
    Close,
    Equals,
    Pipe,
}

fn tokenize_expr(body: &str, span: Span) -> Result<Vec<ExprToken>> {
    let chars: Vec<char> = body.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(ExprToken::Open);
                i += 1;
            }
            ')' => {
                tokens.push(ExprToken::Close);
                i += 1;
            }
            '=' => {
                tokens.push(ExprToken::Equals);
                i += 1;
            }
            '|' => {
                tokens.push(ExprToken::Pipe);
                i += 1;
            }
            '"' | '\'' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(Error::parse("Unterminated string literal", span)),
                        Some('\\') if chars.get(i + 1) == Some(&quote) => {
                            value.push(quote);
                            i += 2;
                        }
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            value.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(ExprToken::Str(value));
            }
            _ => {
                let mut word = String::new();
                while let Some(&ch) = chars.get(i) {
                    if ch == '[' {
                        // bracketed segments may contain any character but `]`
                        let Some(rel) = chars[i..].iter().position(|&c| c == ']') else {
                            return Err(Error::parse("Unterminated [ in path", span));
                        };
                        word.extend(&chars[i..=i + rel]);
                        i += rel + 1;
                        continue;
                    }
                    if ch.is_whitespace() || matches!(ch, '(' | ')' | '=' | '|' | '"' | '\'') {
                        break;
                    }
                    word.push(ch);
                    i += 1;
                }
                tokens.push(ExprToken::Word(word));
            }
        }
    }

    Ok(tokens)
}

struct ExprParser {
    tokens: Vec<ExprToken>,
    pos: usize,
    span: Span,
}

struct Arguments {
    params: Vec<Expr>,
    hash: Hash,
    block_params: Vec<String>,
}

impl ExprParser {
    fn new(body: &str, span: Span) -> Result<Self> {
        Ok(Self {
            tokens: tokenize_expr(body, span)?,
            pos: 0,
            span,
        })
    }

    fn peek(&self) -> Option<&ExprToken> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&ExprToken> {
        self.tokens.get(self.pos + offset)
    }

    fn next(&mut self) -> Option<ExprToken> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::parse(message, self.span)
    }

    fn expect_end(&self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(self.error(format!("Unexpected {:?}", token))),
        }
    }

    fn parse_call(&mut self, allow_block_params: bool) -> Result<(Call, Vec<String>)> {
        let head = self.parse_expr()?;
        let args = self.parse_arguments(allow_block_params)?;
        let call = Call {
            head,
            params: args.params,
            hash: args.hash,
            span: self.span,
        };
        Ok((call, args.block_params))
    }

    /// Parses positional params, `key=value` pairs and `as |a b|`, stopping
    /// at the end of input or a closing paren.
    fn parse_arguments(&mut self, allow_block_params: bool) -> Result<Arguments> {
        let mut params = Vec::new();
        let mut hash = Hash::new();
        let mut block_params = Vec::new();

        loop {
            match (self.peek(), self.peek_at(1)) {
                (None, _) | (Some(ExprToken::Close), _) => break,
                (Some(ExprToken::Word(word)), Some(ExprToken::Pipe)) if word == "as" => {
                    if !allow_block_params {
                        return Err(self.error("Block parameters are only valid on blocks"));
                    }
                    self.pos += 2;
                    loop {
                        match self.next() {
                            Some(ExprToken::Word(name)) => block_params.push(name),
                            Some(ExprToken::Pipe) => break,
                            _ => return Err(self.error("Invalid block parameters")),
                        }
                    }
                    if block_params.is_empty() {
                        return Err(self.error("Invalid block parameters"));
                    }
                    break;
                }
                (Some(ExprToken::Word(key)), Some(ExprToken::Equals)) => {
                    let key = key.clone();
                    self.pos += 2;
                    let value = self.parse_expr()?;
                    hash.push((key, value));
                }
                _ => {
                    if !hash.is_empty() {
                        return Err(self.error("Positional argument after hash arguments"));
                    }
                    params.push(self.parse_expr()?);
                }
            }
        }

        Ok(Arguments {
            params,
            hash,
            block_params,
        })
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        match self.next() {
            Some(ExprToken::Word(word)) => word_to_expr(&word, self.span),
            Some(ExprToken::Str(value)) => Ok(Expr::Literal(Literal::String(value))),
            Some(ExprToken::Open) => {
                let (call, _) = self.parse_call(false)?;
                match self.next() {
                    Some(ExprToken::Close) => Ok(Expr::SubExpr(Box::new(call))),
                    _ => Err(self.error("Unclosed subexpression")),
                }
            }
            Some(token) => Err(self.error(format!("Unexpected {:?}", token))),
            None => Err(self.error("Expected an expression")),
        }
    }
}

/// Parses the body of a mustache or block tag.
pub fn parse_call(body: &str, span: Span, allow_block_params: bool) -> Result<(Call, Vec<String>)> {
    let mut parser = ExprParser::new(body, span)?;
    let result = parser.parse_call(allow_block_params)?;
    parser.expect_end()?;
    Ok(result)
}

fn parse_partial(body: &str, span: Span) -> Result<Partial> {
    let mut parser = ExprParser::new(body, span)?;
    let name = match parser.next() {
        Some(ExprToken::Word(word)) => word,
        Some(ExprToken::Str(value)) => value,
        Some(ExprToken::Open) => return Err(Error::unsupported("dynamic partials", span)),
        _ => return Err(Error::parse("Expected a partial name", span)),
    };

    let args = parser.parse_arguments(false)?;
    parser.expect_end()?;
    if args.params.len() > 1 {
        return Err(Error::parse("Partials accept at most one context argument", span));
    }

    Ok(Partial {
        name,
        context: args.params.into_iter().next(),
        hash: args.hash,
        span,
    })
}

fn word_to_expr(word: &str, span: Span) -> Result<Expr> {
    let literal = match word {
        "true" => Some(Literal::Boolean(true)),
        "false" => Some(Literal::Boolean(false)),
        "null" => Some(Literal::Null),
        "undefined" => Some(Literal::Undefined),
        _ if is_number(word) => Some(Literal::Number(word.to_string())),
        _ => None,
    };
    match literal {
        Some(literal) => Ok(Expr::Literal(literal)),
        None => parse_path(word, span).map(Expr::Path),
    }
}

fn is_number(word: &str) -> bool {
    let digits = word.strip_prefix('-').unwrap_or(word);
    digits.starts_with(|c: char| c.is_ascii_digit()) && word.parse::<f64>().is_ok()
}

fn parse_path(word: &str, span: Span) -> Result<PathExpr> {
    let invalid = || Error::parse(format!("Invalid path: {}", word), span);

    let (data, mut rest) = match word.strip_prefix('@') {
        Some(rest) => (true, rest),
        None => (false, word),
    };

    let mut depth = 0;
    loop {
        if rest == ".." {
            depth += 1;
            rest = "";
            break;
        }
        match rest.strip_prefix("../") {
            Some(r) => {
                depth += 1;
                rest = r;
            }
            None => break,
        }
    }

    let mut scoped = false;
    if rest == "this" || rest == "." {
        scoped = true;
        rest = "";
    } else if let Some(r) = ["this.", "this/", "./"]
        .iter()
        .find_map(|prefix| rest.strip_prefix(prefix))
    {
        scoped = true;
        rest = r;
    }

    let mut parts = Vec::new();
    if !rest.is_empty() {
        let mut segment = String::new();
        let mut bracketed = false;
        let mut chars = rest.chars();
        while let Some(c) = chars.next() {
            match c {
                '[' if segment.is_empty() => {
                    for inner in chars.by_ref() {
                        if inner == ']' {
                            break;
                        }
                        segment.push(inner);
                    }
                    bracketed = true;
                }
                '.' | '/' => {
                    if segment.is_empty() && !bracketed {
                        return Err(invalid());
                    }
                    parts.push(std::mem::take(&mut segment));
                    bracketed = false;
                }
                _ => segment.push(c),
            }
        }
        if segment.is_empty() && !bracketed {
            return Err(invalid());
        }
        parts.push(segment);
    }

    if parts
        .iter()
        .any(|p| p == ".." || p == "this" || p == ".")
    {
        return Err(invalid());
    }
    if data && parts.is_empty() {
        return Err(invalid());
    }

    Ok(PathExpr {
        data,
        depth,
        scoped,
        parts,
        original: word.to_string(),
    })
}
