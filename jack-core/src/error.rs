use thiserror::Error;

/// The single terminal error produced by a failed compilation.
///
/// Every stage aborts on the first problem it sees; nothing is
/// collected or recovered.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read source: {0}")]
    SourceIo(#[from] std::io::Error),
    #[error("invalid token `{text}` on line {line}: {reason}")]
    InvalidToken {
        line: usize,
        text: String,
        reason: String,
    },
    #[error("unexpected token `{found}` on line {line}, expected {expected}")]
    UnexpectedToken {
        line: usize,
        found: String,
        expected: String,
    },
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEndOfInput { expected: String },
    #[error("identifier `{name}` has already been declared in scope `{scope}`")]
    DuplicateDeclaration { scope: String, name: String },
    #[error("identifier `{name}` is not declared (referenced in `{scope}`)")]
    UndeclaredVariable { scope: String, name: String },
    #[error("malformed {rule}: {detail}")]
    MalformedConstruct { rule: String, detail: String },
}

impl CoreError {
    pub(crate) fn malformed(rule: impl Into<String>, detail: impl Into<String>) -> Self {
        CoreError::MalformedConstruct {
            rule: rule.into(),
            detail: detail.into(),
        }
    }
}
