//! Concrete syntax tree.
//!
//! The tree mirrors the grammar directly: one `NonTerminal` per rule that
//! fired, holding its children in source order, and one `Terminal` per
//! consumed token. There is no per-statement schema; the code generator
//! reads children by position.

use crate::error::CoreError;
use crate::lexer::{Token, TokenKind};

/// Grammar rule that produced a non-terminal node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    Class,
    ClassVarDec,
    SubroutineDec,
    ParameterList,
    SubroutineBody,
    VarDec,
    Statements,
    LetStatement,
    IfStatement,
    WhileStatement,
    DoStatement,
    ReturnStatement,
    Expression,
    Term,
    SubroutineCall,
    ExpressionList,
}

impl Rule {
    pub fn name(self) -> &'static str {
        match self {
            Rule::Class => "class",
            Rule::ClassVarDec => "classVarDec",
            Rule::SubroutineDec => "subroutineDec",
            Rule::ParameterList => "parameterList",
            Rule::SubroutineBody => "subroutineBody",
            Rule::VarDec => "varDec",
            Rule::Statements => "statements",
            Rule::LetStatement => "letStatement",
            Rule::IfStatement => "ifStatement",
            Rule::WhileStatement => "whileStatement",
            Rule::DoStatement => "doStatement",
            Rule::ReturnStatement => "returnStatement",
            Rule::Expression => "expression",
            Rule::Term => "term",
            Rule::SubroutineCall => "subroutineCall",
            Rule::ExpressionList => "expressionList",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Terminal(Token),
    NonTerminal { rule: Rule, children: Vec<Node> },
}

impl Node {
    pub fn group(rule: Rule, children: Vec<Node>) -> Self {
        Node::NonTerminal { rule, children }
    }

    pub fn rule(&self) -> Option<Rule> {
        match self {
            Node::NonTerminal { rule, .. } => Some(*rule),
            Node::Terminal(_) => None,
        }
    }

    pub fn is_rule(&self, expected: Rule) -> bool {
        self.rule() == Some(expected)
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::NonTerminal { children, .. } => children,
            Node::Terminal(_) => &[],
        }
    }

    pub fn token(&self) -> Option<&Token> {
        match self {
            Node::Terminal(token) => Some(token),
            Node::NonTerminal { .. } => None,
        }
    }

    /// True for a terminal with exactly this kind and text.
    pub fn is_token(&self, kind: TokenKind, text: &str) -> bool {
        self.token().is_some_and(|token| token.is(kind, text))
    }

    pub fn is_symbol(&self, text: &str) -> bool {
        self.is_token(TokenKind::Symbol, text)
    }

    /// Children that are non-terminals of the given rule.
    pub fn groups(&self, rule: Rule) -> impl Iterator<Item = &Node> {
        self.children().iter().filter(move |child| child.is_rule(rule))
    }

    /// Positional child access that reports a malformed tree instead of
    /// panicking.
    pub fn child(&self, index: usize) -> Result<&Node, CoreError> {
        self.children()
            .get(index)
            .ok_or_else(|| CoreError::malformed(self.label(), format!("missing child {index}")))
    }

    /// Positional child that must be a terminal.
    pub fn terminal(&self, index: usize) -> Result<&Token, CoreError> {
        self.child(index)?.token().ok_or_else(|| {
            CoreError::malformed(self.label(), format!("child {index} is not a token"))
        })
    }

    /// Positional child that must be a non-terminal of `rule`.
    pub fn expect_group(&self, index: usize, rule: Rule) -> Result<&Node, CoreError> {
        let child = self.child(index)?;
        if child.is_rule(rule) {
            Ok(child)
        } else {
            Err(CoreError::malformed(
                self.label(),
                format!("child {index} is not a {}", rule.name()),
            ))
        }
    }

    /// Fails unless this node was produced by `rule`.
    pub fn expect_rule(&self, rule: Rule) -> Result<&Self, CoreError> {
        if self.is_rule(rule) {
            Ok(self)
        } else {
            Err(CoreError::malformed(
                rule.name(),
                format!("found {}", self.label()),
            ))
        }
    }

    fn label(&self) -> String {
        match self {
            Node::NonTerminal { rule, .. } => rule.name().to_string(),
            Node::Terminal(token) => format!("token `{}`", token.text),
        }
    }
}
