//! Backtracking recursive-descent parser.
//!
//! Every grammar rule is a function `Cursor -> Result<(nodes, Cursor)>`.
//! Rules never mutate shared state, so trying another alternative is just
//! calling the next candidate with the same starting cursor. The small set
//! of combinators below (`sequence`, `alternatives`, `many`, `maybe`) is
//! enough to spell the whole grammar.

use crate::ast::{Node, Rule};
use crate::cursor::Cursor;
use crate::error::CoreError;
use crate::lexer::{Token, TokenKind, tokenize};

/// Nodes produced by a rule plus the position after them.
pub type Parsed<'t> = Result<(Vec<Node>, Cursor<'t>), CoreError>;

/// Any grammar rule.
pub type Grammar<'t> = dyn Fn(Cursor<'t>) -> Parsed<'t> + 't;

const BINARY_OPS: &[&str] = &["+", "-", "*", "/", "&", "|", "<", ">", "="];
const UNARY_OPS: &[&str] = &["-", "~"];
const PRIMITIVE_TYPES: &[&str] = &["int", "char", "boolean"];
const KEYWORD_CONSTANTS: &[&str] = &["true", "false", "null", "this"];

/// Tokenize and parse a complete class.
pub fn parse(source: &str) -> Result<Node, CoreError> {
    let tokens = tokenize(source)?;
    parse_tokens(&tokens)
}

/// Parse a token sequence that must hold exactly one class.
pub fn parse_tokens(tokens: &[Token]) -> Result<Node, CoreError> {
    let (mut nodes, rest) = class(Cursor::new(tokens))?;
    if let Some(token) = rest.peek() {
        return Err(CoreError::UnexpectedToken {
            line: token.line,
            found: token.text.clone(),
            expected: "end of input".to_string(),
        });
    }
    nodes
        .pop()
        .ok_or_else(|| CoreError::malformed(Rule::Class.name(), "parser produced no tree"))
}

// ---------------------------------------------------------------------
// Combinators
// ---------------------------------------------------------------------

/// Match one token of `kind`, optionally restricted to `values`.
pub fn terminal<'t>(cursor: Cursor<'t>, kind: TokenKind, values: &[&str]) -> Parsed<'t> {
    let Some(token) = cursor.peek() else {
        return Err(CoreError::UnexpectedEndOfInput {
            expected: describe_expected(kind, values),
        });
    };
    let value_matches = values.is_empty() || values.contains(&token.text.as_str());
    if token.kind != kind || !value_matches {
        return Err(CoreError::UnexpectedToken {
            line: token.line,
            found: token.text.clone(),
            expected: describe_expected(kind, values),
        });
    }
    Ok((vec![Node::Terminal(token.clone())], cursor.advance()))
}

/// Run `rules` in order; the first failure fails the whole sequence.
pub fn sequence<'t>(cursor: Cursor<'t>, rules: &[&Grammar<'t>]) -> Parsed<'t> {
    let mut nodes = Vec::new();
    let mut cursor = cursor;
    for rule in rules {
        let (found, next) = rule(cursor)?;
        nodes.extend(found);
        cursor = next;
    }
    Ok((nodes, cursor))
}

/// Try each candidate from the same cursor; the first success wins.
/// When all fail, the last candidate's error is returned.
pub fn alternatives<'t>(cursor: Cursor<'t>, rules: &[&Grammar<'t>]) -> Parsed<'t> {
    let mut failure = None;
    for (index, rule) in rules.iter().enumerate() {
        match rule(cursor) {
            Ok(parsed) => return Ok(parsed),
            Err(err) => {
                log::trace!(
                    "alternative {index} failed at token {}: {err}",
                    cursor.position()
                );
                failure = Some(err);
            }
        }
    }
    Err(failure.unwrap_or_else(|| CoreError::malformed("alternatives", "no candidates given")))
}

/// Zero or more repetitions. A failing attempt ends the loop and is
/// discarded; so is an attempt that consumes nothing.
pub fn many<'t>(rule: impl Fn(Cursor<'t>) -> Parsed<'t>) -> impl Fn(Cursor<'t>) -> Parsed<'t> {
    move |cursor| {
        let mut nodes = Vec::new();
        let mut cursor = cursor;
        while let Ok((found, next)) = rule(cursor) {
            if next.position() == cursor.position() {
                break;
            }
            nodes.extend(found);
            cursor = next;
        }
        Ok((nodes, cursor))
    }
}

/// Zero or one occurrence.
pub fn maybe<'t>(rule: impl Fn(Cursor<'t>) -> Parsed<'t>) -> impl Fn(Cursor<'t>) -> Parsed<'t> {
    move |cursor| Ok(rule(cursor).unwrap_or_else(|_| (Vec::new(), cursor)))
}

fn keyword<'t>(values: &'static [&'static str]) -> impl Fn(Cursor<'t>) -> Parsed<'t> {
    move |cursor| terminal(cursor, TokenKind::Keyword, values)
}

fn symbol<'t>(values: &'static [&'static str]) -> impl Fn(Cursor<'t>) -> Parsed<'t> {
    move |cursor| terminal(cursor, TokenKind::Symbol, values)
}

fn identifier(cursor: Cursor<'_>) -> Parsed<'_> {
    terminal(cursor, TokenKind::Identifier, &[])
}

fn group(rule: Rule, parsed: Parsed<'_>) -> Parsed<'_> {
    parsed.map(|(children, cursor)| (vec![Node::group(rule, children)], cursor))
}

fn describe_expected(kind: TokenKind, values: &[&str]) -> String {
    match values {
        [] => kind.describe().to_string(),
        [single] => format!("`{single}`"),
        many => {
            let quoted: Vec<String> = many.iter().map(|value| format!("`{value}`")).collect();
            format!("one of {}", quoted.join(", "))
        }
    }
}

// ---------------------------------------------------------------------
// Program structure
// ---------------------------------------------------------------------

fn class(cursor: Cursor<'_>) -> Parsed<'_> {
    group(
        Rule::Class,
        sequence(
            cursor,
            &[
                &keyword(&["class"]),
                &identifier,
                &symbol(&["{"]),
                &many(class_var_dec),
                &many(subroutine_dec),
                &symbol(&["}"]),
            ],
        ),
    )
}

fn class_var_dec(cursor: Cursor<'_>) -> Parsed<'_> {
    group(
        Rule::ClassVarDec,
        sequence(
            cursor,
            &[
                &keyword(&["static", "field"]),
                &type_name,
                &identifier,
                &many(|cursor| sequence(cursor, &[&symbol(&[","]), &identifier])),
                &symbol(&[";"]),
            ],
        ),
    )
}

fn type_name(cursor: Cursor<'_>) -> Parsed<'_> {
    alternatives(cursor, &[&keyword(PRIMITIVE_TYPES), &identifier])
}

fn subroutine_dec(cursor: Cursor<'_>) -> Parsed<'_> {
    group(
        Rule::SubroutineDec,
        sequence(
            cursor,
            &[
                &keyword(&["constructor", "function", "method"]),
                &|cursor| alternatives(cursor, &[&keyword(&["void"]), &type_name]),
                &identifier,
                &symbol(&["("]),
                &parameter_list,
                &symbol(&[")"]),
                &subroutine_body,
            ],
        ),
    )
}

fn parameter_list(cursor: Cursor<'_>) -> Parsed<'_> {
    let parameter = |cursor| sequence(cursor, &[&type_name, &identifier]);
    let more = |cursor| sequence(cursor, &[&symbol(&[","]), &type_name, &identifier]);
    group(
        Rule::ParameterList,
        maybe(|cursor| sequence(cursor, &[&parameter, &many(more)]))(cursor),
    )
}

fn subroutine_body(cursor: Cursor<'_>) -> Parsed<'_> {
    group(
        Rule::SubroutineBody,
        sequence(
            cursor,
            &[
                &symbol(&["{"]),
                &many(var_dec),
                &statements,
                &symbol(&["}"]),
            ],
        ),
    )
}

fn var_dec(cursor: Cursor<'_>) -> Parsed<'_> {
    group(
        Rule::VarDec,
        sequence(
            cursor,
            &[
                &keyword(&["var"]),
                &type_name,
                &identifier,
                &many(|cursor| sequence(cursor, &[&symbol(&[","]), &identifier])),
                &symbol(&[";"]),
            ],
        ),
    )
}

// ---------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------

fn statements(cursor: Cursor<'_>) -> Parsed<'_> {
    group(Rule::Statements, many(statement)(cursor))
}

fn statement(cursor: Cursor<'_>) -> Parsed<'_> {
    alternatives(
        cursor,
        &[
            &let_statement,
            &if_statement,
            &while_statement,
            &do_statement,
            &return_statement,
        ],
    )
}

fn let_statement(cursor: Cursor<'_>) -> Parsed<'_> {
    group(
        Rule::LetStatement,
        sequence(
            cursor,
            &[
                &keyword(&["let"]),
                &identifier,
                &maybe(|cursor| {
                    sequence(cursor, &[&symbol(&["["]), &expression, &symbol(&["]"])])
                }),
                &symbol(&["="]),
                &expression,
                &symbol(&[";"]),
            ],
        ),
    )
}

fn if_statement(cursor: Cursor<'_>) -> Parsed<'_> {
    let else_branch = |cursor| {
        sequence(
            cursor,
            &[
                &keyword(&["else"]),
                &symbol(&["{"]),
                &statements,
                &symbol(&["}"]),
            ],
        )
    };
    group(
        Rule::IfStatement,
        sequence(
            cursor,
            &[
                &keyword(&["if"]),
                &symbol(&["("]),
                &expression,
                &symbol(&[")"]),
                &symbol(&["{"]),
                &statements,
                &symbol(&["}"]),
                &maybe(else_branch),
            ],
        ),
    )
}

fn while_statement(cursor: Cursor<'_>) -> Parsed<'_> {
    group(
        Rule::WhileStatement,
        sequence(
            cursor,
            &[
                &keyword(&["while"]),
                &symbol(&["("]),
                &expression,
                &symbol(&[")"]),
                &symbol(&["{"]),
                &statements,
                &symbol(&["}"]),
            ],
        ),
    )
}

fn do_statement(cursor: Cursor<'_>) -> Parsed<'_> {
    group(
        Rule::DoStatement,
        sequence(
            cursor,
            &[&keyword(&["do"]), &subroutine_call, &symbol(&[";"])],
        ),
    )
}

fn return_statement(cursor: Cursor<'_>) -> Parsed<'_> {
    group(
        Rule::ReturnStatement,
        sequence(
            cursor,
            &[&keyword(&["return"]), &maybe(expression), &symbol(&[";"])],
        ),
    )
}

// ---------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------

/// `term (op term)*`, flat and left to right.
fn expression(cursor: Cursor<'_>) -> Parsed<'_> {
    group(
        Rule::Expression,
        sequence(
            cursor,
            &[
                &term,
                &many(|cursor| sequence(cursor, &[&symbol(BINARY_OPS), &term])),
            ],
        ),
    )
}

/// Alternatives are tried in precedence order; a call is attempted before
/// indexing, and both before a bare identifier.
fn term(cursor: Cursor<'_>) -> Parsed<'_> {
    group(
        Rule::Term,
        alternatives(
            cursor,
            &[
                &|cursor| terminal(cursor, TokenKind::IntConstant, &[]),
                &|cursor| terminal(cursor, TokenKind::StringConstant, &[]),
                &keyword(KEYWORD_CONSTANTS),
                &|cursor| sequence(cursor, &[&symbol(&["("]), &expression, &symbol(&[")"])]),
                &|cursor| sequence(cursor, &[&symbol(UNARY_OPS), &term]),
                &subroutine_call,
                &|cursor| {
                    sequence(
                        cursor,
                        &[&identifier, &symbol(&["["]), &expression, &symbol(&["]"])],
                    )
                },
                &identifier,
            ],
        ),
    )
}

fn subroutine_call(cursor: Cursor<'_>) -> Parsed<'_> {
    let contextless = |cursor| {
        sequence(
            cursor,
            &[
                &identifier,
                &symbol(&["("]),
                &expression_list,
                &symbol(&[")"]),
            ],
        )
    };
    let qualified = |cursor| {
        sequence(
            cursor,
            &[
                &identifier,
                &symbol(&["."]),
                &identifier,
                &symbol(&["("]),
                &expression_list,
                &symbol(&[")"]),
            ],
        )
    };
    group(
        Rule::SubroutineCall,
        alternatives(cursor, &[&contextless, &qualified]),
    )
}

fn expression_list(cursor: Cursor<'_>) -> Parsed<'_> {
    let more = |cursor| sequence(cursor, &[&symbol(&[","]), &expression]);
    group(
        Rule::ExpressionList,
        maybe(|cursor| sequence(cursor, &[&expression, &many(more)]))(cursor),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_expression(tokens: &[Token]) -> Parsed<'_> {
        expression(Cursor::new(tokens))
    }

    fn rules(node: &Node) -> Vec<&'static str> {
        node.children()
            .iter()
            .filter_map(|child| child.rule().map(Rule::name))
            .collect()
    }

    fn find<'n>(node: &'n Node, rule: Rule) -> Option<&'n Node> {
        if node.is_rule(rule) {
            return Some(node);
        }
        node.children().iter().find_map(|child| find(child, rule))
    }

    #[test]
    fn parses_minimal_class() {
        let tree = parse("class Main { }").expect("parse");
        assert!(tree.is_rule(Rule::Class));
        assert_eq!(tree.children().len(), 4);
        assert_eq!(tree.terminal(1).expect("name").text, "Main");
    }

    #[test]
    fn parses_declarations_in_grammar_order() {
        let tree = parse(
            "class Point {
                field int x, y;
                static Point origin;
                constructor Point new(int ax, int ay) { let x = ax; let y = ay; return this; }
                method int getX() { return x; }
            }",
        )
        .expect("parse");
        assert_eq!(
            rules(&tree),
            ["classVarDec", "classVarDec", "subroutineDec", "subroutineDec"]
        );
        let params = find(&tree, Rule::ParameterList).expect("parameter list");
        assert_eq!(params.children().len(), 5);
    }

    #[test]
    fn empty_lists_still_produce_groups() {
        let tree = parse("class A { function void f() { return; } }").expect("parse");
        let subroutine = find(&tree, Rule::SubroutineDec).expect("subroutine");
        assert!(subroutine.expect_group(4, Rule::ParameterList).is_ok());
        assert!(subroutine.child(4).expect("params").children().is_empty());
        let body = subroutine.expect_group(6, Rule::SubroutineBody).expect("body");
        assert!(body.expect_group(1, Rule::Statements).is_ok());
    }

    #[test]
    fn expression_consumes_all_tokens_flat() {
        let tokens = tokenize("1 + 2 * x - 3").expect("tokenize");
        let (nodes, rest) = parse_expression(&tokens).expect("parse");
        assert!(rest.is_at_end());
        let expr = &nodes[0];
        // term op term op term op term
        assert_eq!(expr.children().len(), 7);
        assert!(expr.child(3).expect("op").is_symbol("*"));
    }

    #[test]
    fn term_prefers_call_then_index_then_identifier() {
        for (source, expected_children) in [("f(1, 2)", 1), ("a[i + 1]", 4), ("name", 1)] {
            let tokens = tokenize(source).expect("tokenize");
            let (nodes, rest) = term(Cursor::new(&tokens)).expect("parse");
            assert!(rest.is_at_end(), "{source} left tokens behind");
            assert_eq!(nodes[0].children().len(), expected_children, "{source}");
        }
        let tokens = tokenize("f(1, 2)").expect("tokenize");
        let (nodes, _) = term(Cursor::new(&tokens)).expect("parse");
        assert!(nodes[0].child(0).expect("call").is_rule(Rule::SubroutineCall));
    }

    #[test]
    fn parses_qualified_call_and_unary() {
        let tokens = tokenize("-Math.abs(~x)").expect("tokenize");
        let (nodes, rest) = term(Cursor::new(&tokens)).expect("parse");
        assert!(rest.is_at_end());
        let call = find(&nodes[0], Rule::SubroutineCall).expect("call");
        assert_eq!(call.children().len(), 6);
        assert_eq!(call.terminal(2).expect("name").text, "abs");
    }

    #[test]
    fn parses_if_else_and_while() {
        let tree = parse(
            "class A { method void f() {
                var int i;
                while (i < 10) { if (i = 5) { let i = i + 2; } else { let i = i + 1; } }
                return;
            } }",
        )
        .expect("parse");
        let if_statement = find(&tree, Rule::IfStatement).expect("if");
        assert_eq!(if_statement.children().len(), 11);
        assert!(find(&tree, Rule::WhileStatement).is_some());
    }

    #[test]
    fn reports_unexpected_token_with_expectation() {
        let err = parse("class A { field int x }").unwrap_err();
        match err {
            CoreError::UnexpectedToken { found, expected, .. } => {
                assert_eq!(found, "field");
                assert_eq!(expected, "`}`");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn reports_end_of_input() {
        let err = parse("class A {").unwrap_err();
        assert!(matches!(err, CoreError::UnexpectedEndOfInput { .. }));
    }

    #[test]
    fn rejects_trailing_tokens() {
        let err = parse("class A { } class B { }").unwrap_err();
        assert!(
            matches!(err, CoreError::UnexpectedToken { ref expected, .. } if expected == "end of input")
        );
    }

    #[test]
    fn alternatives_surface_last_failure() {
        let tokens = tokenize(";").expect("tokenize");
        let err = alternatives(
            Cursor::new(&tokens),
            &[&keyword(&["let"]), &|cursor| terminal(cursor, TokenKind::Identifier, &[])],
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::UnexpectedToken { ref expected, .. } if expected == "identifier"));
    }

    #[test]
    fn many_stops_without_consuming_on_failure() {
        let tokens = tokenize(", x , y ;").expect("tokenize");
        let rule = many(|cursor| sequence(cursor, &[&symbol(&[","]), &identifier]));
        let (nodes, rest) = rule(Cursor::new(&tokens)).expect("many never fails");
        assert_eq!(nodes.len(), 4);
        assert!(rest.peek().is_some_and(|token| token.text == ";"));
    }
}
