//! Stack-machine backend.
//!
//! Walks the concrete syntax tree depth-first and emits instructions,
//! declaring variables into the live `Scope` as it goes. There is no
//! separate binding pass: class variables are declared before any
//! subroutine is visited because the grammar puts them first, and locals
//! are declared as the body is walked. The function header's local count is
//! patched in once the body is done.

use std::collections::HashSet;

use crate::ast::{Node, Rule};
use crate::error::CoreError;
use crate::lexer::{Token, TokenKind};
use crate::scope::{Kind, Scope};
use crate::vm::{ArithmeticOp, Instruction, Segment};

/// Temp slot used to park the value of an array assignment.
const ARRAY_TEMP: u16 = 0;
/// Temp slot that swallows the return value of a `do` call.
const DISCARD_TEMP: u16 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubroutineKind {
    Constructor,
    Function,
    Method,
}

impl SubroutineKind {
    fn from_keyword(token: &Token) -> Result<Self, CoreError> {
        match token.text.as_str() {
            "constructor" => Ok(SubroutineKind::Constructor),
            "function" => Ok(SubroutineKind::Function),
            "method" => Ok(SubroutineKind::Method),
            other => Err(CoreError::malformed(
                Rule::SubroutineDec.name(),
                format!("unknown subroutine kind `{other}`"),
            )),
        }
    }
}

/// Generate code for a whole `class` tree.
pub fn generate(tree: &Node) -> Result<Vec<Instruction>, CoreError> {
    let class = tree.expect_rule(Rule::Class)?;
    let class_name = class.terminal(1)?.text.clone();

    let mut class_scope = Scope::root(class_name.as_str());
    for declaration in class.groups(Rule::ClassVarDec) {
        declare_class_vars(declaration, &mut class_scope)?;
    }

    let mut generator = CodeGenerator {
        class_name,
        instructions: Vec::new(),
        current: SubroutineKind::Function,
    };
    let mut seen = HashSet::new();
    for subroutine in class.groups(Rule::SubroutineDec) {
        let name = subroutine.terminal(2)?.text.as_str();
        if !seen.insert(name) {
            return Err(CoreError::DuplicateDeclaration {
                scope: generator.class_name.clone(),
                name: name.to_string(),
            });
        }
        generator.subroutine(subroutine, &class_scope)?;
    }
    log::debug!(
        "generated {} instructions for class {}",
        generator.instructions.len(),
        generator.class_name
    );
    Ok(generator.instructions)
}

/// `('static'|'field') type name (',' name)* ';'`
fn declare_class_vars(node: &Node, scope: &mut Scope<'_>) -> Result<(), CoreError> {
    let kind = match node.terminal(0)?.text.as_str() {
        "static" => Kind::Static,
        "field" => Kind::Field,
        other => {
            return Err(CoreError::malformed(
                Rule::ClassVarDec.name(),
                format!("unknown variable kind `{other}`"),
            ));
        }
    };
    declare_names(node, scope, kind)
}

/// Declares every identifier after the type (child 1) of a
/// `classVarDec` or `varDec`.
fn declare_names(node: &Node, scope: &mut Scope<'_>, kind: Kind) -> Result<(), CoreError> {
    let ty = node.terminal(1)?.text.as_str();
    for child in node.children().iter().skip(2) {
        if let Some(token) = child.token().filter(|t| t.kind == TokenKind::Identifier) {
            scope.declare(&token.text, ty, kind)?;
        }
    }
    Ok(())
}

struct CodeGenerator {
    class_name: String,
    instructions: Vec<Instruction>,
    current: SubroutineKind,
}

impl CodeGenerator {
    fn emit(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    fn push(&mut self, segment: Segment, index: u16) {
        self.emit(Instruction::Push(segment, index));
    }

    fn pop(&mut self, segment: Segment, index: u16) {
        self.emit(Instruction::Pop(segment, index));
    }

    fn arithmetic(&mut self, op: ArithmeticOp) {
        self.emit(Instruction::Arithmetic(op));
    }

    fn call(&mut self, name: String, args: u16) {
        self.emit(Instruction::Call { name, args });
    }

    // -----------------------------------------------------------------
    // Subroutines
    // -----------------------------------------------------------------

    /// `kind returnType name '(' parameterList ')' subroutineBody`
    fn subroutine(&mut self, node: &Node, class_scope: &Scope<'_>) -> Result<(), CoreError> {
        let kind = SubroutineKind::from_keyword(node.terminal(0)?)?;
        let name = node.terminal(2)?.text.as_str();
        let parameters = node.expect_group(4, Rule::ParameterList)?;
        let body = node.expect_group(6, Rule::SubroutineBody)?;

        let mut scope = Scope::child(name, class_scope);
        if kind == SubroutineKind::Method {
            scope.declare("this", self.class_name.as_str(), Kind::Argument)?;
        }
        declare_parameters(parameters, &mut scope)?;

        self.current = kind;
        let qualified = scope.qualified_name();
        let header = self.instructions.len();
        self.emit(Instruction::Function {
            name: qualified.clone(),
            locals: 0,
        });

        match kind {
            SubroutineKind::Constructor => {
                self.push(Segment::Constant, class_scope.count_of(Kind::Field));
                self.call("Memory.alloc".to_string(), 1);
                self.pop(Segment::Pointer, 0);
            }
            SubroutineKind::Method => {
                self.push(Segment::Argument, 0);
                self.pop(Segment::Pointer, 0);
            }
            SubroutineKind::Function => {}
        }

        self.subroutine_body(body, &mut scope)?;

        let locals = scope.count_of(Kind::Local);
        self.instructions[header] = Instruction::Function {
            name: qualified.clone(),
            locals,
        };
        log::debug!(
            "compiled {qualified}: {locals} locals, {} instructions",
            self.instructions.len() - header
        );
        Ok(())
    }

    /// `'{' varDec* statements '}'`
    fn subroutine_body(&mut self, node: &Node, scope: &mut Scope<'_>) -> Result<(), CoreError> {
        for child in node.children() {
            match child.rule() {
                Some(Rule::VarDec) => declare_names(child, scope, Kind::Local)?,
                Some(Rule::Statements) => self.statements(child, scope)?,
                Some(other) => {
                    return Err(CoreError::malformed(
                        Rule::SubroutineBody.name(),
                        format!("unexpected {}", other.name()),
                    ));
                }
                None => {}
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------

    fn statements(&mut self, node: &Node, scope: &mut Scope<'_>) -> Result<(), CoreError> {
        for statement in node.expect_rule(Rule::Statements)?.children() {
            match statement.rule() {
                Some(Rule::LetStatement) => self.let_statement(statement, scope)?,
                Some(Rule::IfStatement) => self.if_statement(statement, scope)?,
                Some(Rule::WhileStatement) => self.while_statement(statement, scope)?,
                Some(Rule::DoStatement) => self.do_statement(statement, scope)?,
                Some(Rule::ReturnStatement) => self.return_statement(statement, scope)?,
                _ => {
                    return Err(CoreError::malformed(
                        Rule::Statements.name(),
                        "child is not a statement",
                    ));
                }
            }
        }
        Ok(())
    }

    /// `let name = expr;` or `let name[index] = expr;`
    fn let_statement(&mut self, node: &Node, scope: &mut Scope<'_>) -> Result<(), CoreError> {
        let name = node.terminal(1)?.text.as_str();
        if node.child(2)?.is_symbol("[") {
            self.push_variable(name, scope)?;
            self.expression(node.expect_group(3, Rule::Expression)?, scope)?;
            self.arithmetic(ArithmeticOp::Add);
            self.expression(node.expect_group(6, Rule::Expression)?, scope)?;
            self.pop(Segment::Temp, ARRAY_TEMP);
            self.pop(Segment::Pointer, 1);
            self.push(Segment::Temp, ARRAY_TEMP);
            self.pop(Segment::That, 0);
        } else {
            self.expression(node.expect_group(3, Rule::Expression)?, scope)?;
            self.pop_variable(name, scope)?;
        }
        Ok(())
    }

    /// `if (cond) { .. }` with an optional `else { .. }` starting at child 7.
    fn if_statement(&mut self, node: &Node, scope: &mut Scope<'_>) -> Result<(), CoreError> {
        let condition = node.expect_group(2, Rule::Expression)?;
        let then_branch = node.expect_group(5, Rule::Statements)?;
        let else_branch = match node.children().get(7) {
            Some(child) if child.is_token(TokenKind::Keyword, "else") => {
                Some(node.expect_group(9, Rule::Statements)?)
            }
            Some(_) => {
                return Err(CoreError::malformed(
                    Rule::IfStatement.name(),
                    "expected `else` after the first block",
                ));
            }
            None => None,
        };

        self.expression(condition, scope)?;
        match else_branch {
            None => {
                let end = scope.new_label();
                self.arithmetic(ArithmeticOp::Not);
                self.emit(Instruction::IfGoto(end.clone()));
                self.statements(then_branch, scope)?;
                self.emit(Instruction::Label(end));
            }
            Some(else_branch) => {
                let when_true = scope.new_label();
                let when_false = scope.new_label();
                let end = scope.new_label();
                self.emit(Instruction::IfGoto(when_true.clone()));
                self.emit(Instruction::Goto(when_false.clone()));
                self.emit(Instruction::Label(when_true));
                self.statements(then_branch, scope)?;
                self.emit(Instruction::Goto(end.clone()));
                self.emit(Instruction::Label(when_false));
                self.statements(else_branch, scope)?;
                self.emit(Instruction::Goto(end.clone()));
                self.emit(Instruction::Label(end));
            }
        }
        Ok(())
    }

    /// `while (cond) { .. }`
    fn while_statement(&mut self, node: &Node, scope: &mut Scope<'_>) -> Result<(), CoreError> {
        let condition = node.expect_group(2, Rule::Expression)?;
        let body = node.expect_group(5, Rule::Statements)?;
        let test = scope.new_label();
        let end = scope.new_label();

        self.emit(Instruction::Label(test.clone()));
        self.expression(condition, scope)?;
        self.arithmetic(ArithmeticOp::Not);
        self.emit(Instruction::IfGoto(end.clone()));
        self.statements(body, scope)?;
        self.emit(Instruction::Goto(test));
        self.emit(Instruction::Label(end));
        Ok(())
    }

    /// `do call;` discards the value every call leaves behind.
    fn do_statement(&mut self, node: &Node, scope: &mut Scope<'_>) -> Result<(), CoreError> {
        self.subroutine_call(node.expect_group(1, Rule::SubroutineCall)?, scope)?;
        self.pop(Segment::Temp, DISCARD_TEMP);
        Ok(())
    }

    /// A bare `return;` still leaves a value: the caller always pops one.
    fn return_statement(&mut self, node: &Node, scope: &mut Scope<'_>) -> Result<(), CoreError> {
        let value = node.child(1)?;
        if value.is_rule(Rule::Expression) {
            self.expression(value, scope)?;
        } else {
            self.push(Segment::Constant, 0);
        }
        self.emit(Instruction::Return);
        Ok(())
    }

    // -----------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------

    /// `term (op term)*`, applied strictly left to right.
    fn expression(&mut self, node: &Node, scope: &mut Scope<'_>) -> Result<(), CoreError> {
        let node = node.expect_rule(Rule::Expression)?;
        self.term(node.expect_group(0, Rule::Term)?, scope)?;
        let mut index = 1;
        while index < node.children().len() {
            let op = node.terminal(index)?;
            self.term(node.expect_group(index + 1, Rule::Term)?, scope)?;
            self.operator(op, 2)?;
            index += 2;
        }
        Ok(())
    }

    fn term(&mut self, node: &Node, scope: &mut Scope<'_>) -> Result<(), CoreError> {
        let first = node.child(0)?;
        let Some(token) = first.token() else {
            return self.subroutine_call(first.expect_rule(Rule::SubroutineCall)?, scope);
        };

        match token.kind {
            TokenKind::IntConstant => {
                let value = token.text.parse::<u16>().map_err(|_| {
                    CoreError::malformed(Rule::Term.name(), format!("bad integer `{}`", token.text))
                })?;
                self.push(Segment::Constant, value);
            }
            TokenKind::StringConstant => self.string_constant(token.string_value())?,
            TokenKind::Keyword => self.keyword_constant(token)?,
            TokenKind::Symbol if token.text == "(" => {
                self.expression(node.expect_group(1, Rule::Expression)?, scope)?;
            }
            TokenKind::Symbol => {
                self.term(node.expect_group(1, Rule::Term)?, scope)?;
                self.operator(token, 1)?;
            }
            TokenKind::Identifier if node.children().len() > 1 => {
                self.push_variable(&token.text, scope)?;
                self.expression(node.expect_group(2, Rule::Expression)?, scope)?;
                self.arithmetic(ArithmeticOp::Add);
                self.pop(Segment::Pointer, 1);
                self.push(Segment::That, 0);
            }
            TokenKind::Identifier => self.push_variable(&token.text, scope)?,
        }
        Ok(())
    }

    fn keyword_constant(&mut self, token: &Token) -> Result<(), CoreError> {
        match token.text.as_str() {
            "true" => {
                self.push(Segment::Constant, 0);
                self.arithmetic(ArithmeticOp::Not);
            }
            "false" | "null" => self.push(Segment::Constant, 0),
            "this" => self.push(Segment::Pointer, 0),
            other => {
                return Err(CoreError::malformed(
                    Rule::Term.name(),
                    format!("`{other}` is not a constant"),
                ));
            }
        }
        Ok(())
    }

    fn string_constant(&mut self, value: &str) -> Result<(), CoreError> {
        let too_long = || CoreError::malformed(Rule::Term.name(), "string constant is too long");
        let length = u16::try_from(value.chars().count()).map_err(|_| too_long())?;
        self.push(Segment::Constant, length);
        self.call("String.new".to_string(), 1);
        for ch in value.chars() {
            let code = u16::try_from(u32::from(ch)).map_err(|_| {
                CoreError::malformed(Rule::Term.name(), format!("unsupported character `{ch}`"))
            })?;
            self.push(Segment::Constant, code);
            self.call("String.appendChar".to_string(), 2);
        }
        Ok(())
    }

    /// The same symbol can be unary or binary; `arity` says which.
    fn operator(&mut self, token: &Token, arity: usize) -> Result<(), CoreError> {
        let op = match (token.text.as_str(), arity) {
            ("-", 1) => ArithmeticOp::Neg,
            ("~", 1) => ArithmeticOp::Not,
            ("+", 2) => ArithmeticOp::Add,
            ("-", 2) => ArithmeticOp::Sub,
            ("&", 2) => ArithmeticOp::And,
            ("|", 2) => ArithmeticOp::Or,
            ("<", 2) => ArithmeticOp::Lt,
            (">", 2) => ArithmeticOp::Gt,
            ("=", 2) => ArithmeticOp::Eq,
            ("*", 2) => {
                self.call("Math.multiply".to_string(), 2);
                return Ok(());
            }
            ("/", 2) => {
                self.call("Math.divide".to_string(), 2);
                return Ok(());
            }
            (other, _) => {
                return Err(CoreError::malformed(
                    Rule::Expression.name(),
                    format!("`{other}` is not an operator of arity {arity}"),
                ));
            }
        };
        self.arithmetic(op);
        Ok(())
    }

    /// `name(args)` calls a method on the current receiver.
    /// `ctx.name(args)` is a method call when `ctx` is a variable and a
    /// plain function call on class `ctx` otherwise.
    fn subroutine_call(&mut self, node: &Node, scope: &mut Scope<'_>) -> Result<(), CoreError> {
        let node = node.expect_rule(Rule::SubroutineCall)?;
        let (target, args) = if node.child(1)?.is_symbol(".") {
            let context = node.terminal(0)?.text.as_str();
            let name = node.terminal(2)?.text.as_str();
            let list = node.expect_group(4, Rule::ExpressionList)?;
            match scope.resolve(context).cloned() {
                Some(receiver) => {
                    self.push(receiver.kind.segment(), receiver.index);
                    let count = self.expression_list(list, scope)?;
                    (format!("{}.{name}", receiver.ty), count + 1)
                }
                None => {
                    let count = self.expression_list(list, scope)?;
                    (format!("{context}.{name}"), count)
                }
            }
        } else {
            let name = node.terminal(0)?.text.as_str();
            let list = node.expect_group(2, Rule::ExpressionList)?;
            if self.current == SubroutineKind::Function {
                log::warn!(
                    "{}: unqualified call to `{name}` inside a function passes a receiver that does not exist",
                    scope.qualified_name()
                );
            }
            self.push(Segment::Pointer, 0);
            let count = self.expression_list(list, scope)?;
            (format!("{}.{name}", self.class_name), count + 1)
        };
        self.call(target, args);
        Ok(())
    }

    /// Compiles each argument and returns how many there were.
    fn expression_list(&mut self, node: &Node, scope: &mut Scope<'_>) -> Result<u16, CoreError> {
        let mut count = 0u16;
        for expression in node.groups(Rule::Expression) {
            self.expression(expression, scope)?;
            count += 1;
        }
        Ok(count)
    }

    // -----------------------------------------------------------------
    // Variables
    // -----------------------------------------------------------------

    fn push_variable(&mut self, name: &str, scope: &Scope<'_>) -> Result<(), CoreError> {
        let entry = scope.require(name)?;
        let (segment, index) = (entry.kind.segment(), entry.index);
        self.push(segment, index);
        Ok(())
    }

    fn pop_variable(&mut self, name: &str, scope: &Scope<'_>) -> Result<(), CoreError> {
        let entry = scope.require(name)?;
        let (segment, index) = (entry.kind.segment(), entry.index);
        self.pop(segment, index);
        Ok(())
    }
}

/// `(type name (',' type name)*)?`
fn declare_parameters(node: &Node, scope: &mut Scope<'_>) -> Result<(), CoreError> {
    let tokens: Vec<&Token> = node
        .children()
        .iter()
        .filter_map(Node::token)
        .filter(|token| !token.is(TokenKind::Symbol, ","))
        .collect();
    for pair in tokens.chunks(2) {
        match pair {
            [ty, name] => {
                scope.declare(&name.text, ty.text.as_str(), Kind::Argument)?;
            }
            _ => {
                return Err(CoreError::malformed(
                    Rule::ParameterList.name(),
                    "parameter without a name",
                ));
            }
        }
    }
    Ok(())
}
