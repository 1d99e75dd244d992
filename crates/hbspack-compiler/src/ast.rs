use crate::span::Span;

/// A sequence of statements, optionally declaring block parameters
/// (`{{#each items as |item index|}}`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub body: Vec<Statement>,
    pub block_params: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Content(String),
    Mustache(Mustache),
    Block(Block),
    Partial(Partial),
    Comment(String),
}

impl Statement {
    pub fn span(&self) -> Option<Span> {
        match self {
            Statement::Mustache(m) => Some(m.span),
            Statement::Block(b) => Some(b.span),
            Statement::Partial(p) => Some(p.span),
            Statement::Content(_) | Statement::Comment(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mustache {
    pub call: Call,
    pub escaped: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub call: Call,
    pub program: Program,
    pub inverse: Option<Program>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Partial {
    pub name: String,
    pub context: Option<Expr>,
    pub hash: Hash,
    pub span: Span,
}

/// The expression inside a tag: a head followed by positional and hash
/// arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub head: Expr,
    pub params: Vec<Expr>,
    pub hash: Hash,
    pub span: Span,
}

impl Call {
    pub fn has_arguments(&self) -> bool {
        !self.params.is_empty() || !self.hash.is_empty()
    }

    /// The head as a bare helper-style name, if it is one.
    pub fn simple_name(&self) -> Option<&str> {
        match &self.head {
            Expr::Path(path) => path.simple_name(),
            _ => None,
        }
    }
}

pub type Hash = Vec<(String, Expr)>;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Path(PathExpr),
    Literal(Literal),
    SubExpr(Box<Call>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathExpr {
    /// `@`-prefixed data path
    pub data: bool,
    /// Number of leading `../` segments
    pub depth: usize,
    /// Explicitly scoped with `this.`/`./`
    pub scoped: bool,
    pub parts: Vec<String>,
    /// Text as written in the template
    pub original: String,
}

impl PathExpr {
    pub fn simple_name(&self) -> Option<&str> {
        if !self.data && !self.scoped && self.depth == 0 && self.parts.len() == 1 {
            Some(&self.parts[0])
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    /// Kept as written; validated as a number by the parser.
    Number(String),
    Boolean(bool),
    Null,
    Undefined,
}
