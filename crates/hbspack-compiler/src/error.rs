use crate::span::Span;
use thiserror::Error;

/// Errors raised while precompiling a template.
///
/// The `Display` text is what ends up in the diagnostic shown to the user,
/// so messages follow the wording of the Handlebars JS compiler where one
/// exists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Parse error on line {}: {message}", .span.line)]
    Parse { message: String, span: Span },

    #[error("You specified knownHelpersOnly, but used the unknown helper {name} - {span}")]
    UnknownHelper { name: String, span: Span },

    #[error("{open} doesn't match {close} - {span}")]
    MismatchedBlock {
        open: String,
        close: String,
        span: Span,
    },

    #[error("Unclosed block '{name}' opened at {span}")]
    UnclosedBlock { name: String, span: Span },

    #[error("Unexpected '{tag}' outside of a block - {span}")]
    UnexpectedTag { tag: String, span: Span },

    #[error("Unsupported template feature: {feature} - {span}")]
    Unsupported { feature: String, span: Span },
}

impl Error {
    pub fn parse(message: impl Into<String>, span: Span) -> Self {
        Error::Parse {
            message: message.into(),
            span,
        }
    }

    pub fn unsupported(feature: impl Into<String>, span: Span) -> Self {
        Error::Unsupported {
            feature: feature.into(),
            span,
        }
    }

    /// Location the error points at.
    pub fn span(&self) -> Span {
        match self {
            Error::Parse { span, .. }
            | Error::UnknownHelper { span, .. }
            | Error::MismatchedBlock { span, .. }
            | Error::UnclosedBlock { span, .. }
            | Error::UnexpectedTag { span, .. }
            | Error::Unsupported { span, .. } => *span,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_helper_message_matches_handlebars() {
        let err = Error::UnknownHelper {
            name: "shout".to_string(),
            span: Span::new(0, 0, 1, 2),
        };
        assert_eq!(
            err.to_string(),
            "You specified knownHelpersOnly, but used the unknown helper shout - 1:2"
        );
    }

    #[test]
    fn test_parse_error_reports_line() {
        let err = Error::parse("Unclosed tag", Span::new(10, 12, 4, 1));
        assert_eq!(err.to_string(), "Parse error on line 4: Unclosed tag");
        assert_eq!(err.span().column, 1);
    }
}
