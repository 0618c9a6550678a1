//! XML dump of the syntax tree, for debugging the parser.

use crate::ast::Node;
use crate::lexer::TokenKind;

const INDENT: usize = 2;

pub fn to_xml(node: &Node) -> String {
    let mut out = String::new();
    write_node(node, 0, &mut out);
    out
}

fn write_node(node: &Node, depth: usize, out: &mut String) {
    let padding = " ".repeat(depth * INDENT);
    match node {
        Node::Terminal(token) => {
            let tag = tag_for(token.kind);
            out.push_str(&format!(
                "{padding}<{tag}> {} </{tag}>\n",
                escape(token.string_value())
            ));
        }
        Node::NonTerminal { rule, children } => {
            let tag = rule.name();
            out.push_str(&format!("{padding}<{tag}>\n"));
            for child in children {
                write_node(child, depth + 1, out);
            }
            out.push_str(&format!("{padding}</{tag}>\n"));
        }
    }
}

fn tag_for(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Keyword => "keyword",
        TokenKind::Symbol => "symbol",
        TokenKind::Identifier => "identifier",
        TokenKind::IntConstant => "integerConstant",
        TokenKind::StringConstant => "stringConstant",
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
