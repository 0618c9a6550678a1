use crate::ast::{Node, Rule};
use crate::codegen_vm::generate;
use crate::error::CoreError;
use crate::parser::parse;
use crate::vm::{Instruction, render};
use crate::xml::to_xml;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationArtifact {
    pub class_name: String,
    pub instructions: Vec<Instruction>,
}

impl CompilationArtifact {
    pub fn vm_text(&self) -> String {
        render(&self.instructions)
    }
}

/// Compile one class worth of source into stack-machine instructions.
///
/// Nothing is returned on failure; a partially generated class is discarded.
pub fn compile_source(source: &str) -> Result<CompilationArtifact, CoreError> {
    let tree = parse(source)?;
    let class_name = class_name(&tree)?;
    let instructions = generate(&tree)?;
    log::debug!(
        "compiled class {class_name} into {} instructions",
        instructions.len()
    );
    Ok(CompilationArtifact {
        class_name,
        instructions,
    })
}

pub fn compile_to_vm(source: &str) -> Result<String, CoreError> {
    compile_source(source).map(|artifact| artifact.vm_text())
}

/// Parse only, and dump the syntax tree as XML.
pub fn emit_xml(source: &str) -> Result<String, CoreError> {
    let tree = parse(source)?;
    Ok(to_xml(&tree))
}

fn class_name(tree: &Node) -> Result<String, CoreError> {
    let class = tree.expect_rule(Rule::Class)?;
    Ok(class.terminal(1)?.text.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn bare_return_in_void_method() {
        let vm = compile_to_vm("class Square { method void erase() { return; } }")
            .expect("compile should succeed");
        assert_eq!(
            vm,
            "function Square.erase 0\npush argument 0\npop pointer 0\npush constant 0\nreturn\n"
        );
    }

    #[test]
    fn let_with_addition_into_first_local() {
        let vm = compile_to_vm(
            "class Main { function void main() { var int x; let x = 1 + 2; return; } }",
        )
        .expect("compile should succeed");
        assert_eq!(
            vm,
            "function Main.main 1\npush constant 1\npush constant 2\nadd\npop local 0\n\
             push constant 0\nreturn\n"
        );
    }

    #[test]
    fn contextless_do_call_pushes_receiver_and_discards_result() {
        let vm = compile_to_vm(
            "class Square {
                method void draw() { return; }
                method void run() { do draw(); return; }
            }",
        )
        .expect("compile should succeed");
        assert!(
            vm.contains("push pointer 0\ncall Square.draw 1\npop temp 7\n"),
            "unexpected output:\n{vm}"
        );
    }

    #[test]
    fn multiplication_calls_math_library() {
        let vm = compile_to_vm(
            "class Calc { function int mul(int x, int y) { return x * y; } }",
        )
        .expect("compile should succeed");
        assert_eq!(
            vm,
            "function Calc.mul 0\npush argument 0\npush argument 1\ncall Math.multiply 2\nreturn\n"
        );
    }

    #[test]
    fn if_else_uses_three_distinct_labels() {
        let artifact = compile_source(
            "class Main {
                function void main() {
                    var int a;
                    if (a) { let a = 1; } else { let a = 2; }
                    return;
                }
            }",
        )
        .expect("compile should succeed");

        let labels: Vec<&str> = artifact
            .instructions
            .iter()
            .filter_map(|instruction| match instruction {
                Instruction::Label(label) => Some(label.as_str()),
                _ => None,
            })
            .collect();
        let distinct: HashSet<&str> = labels.iter().copied().collect();
        assert_eq!(labels.len(), 3);
        assert_eq!(distinct.len(), 3);

        let end = labels[2];
        let jumps_to_end = artifact
            .instructions
            .iter()
            .filter(|instruction| matches!(instruction, Instruction::Goto(label) if label == end))
            .count();
        assert_eq!(jumps_to_end, 2);
    }

    #[test]
    fn undeclared_identifier_fails_without_output() {
        let err = compile_to_vm("class Main { function void main() { let ghost = 1; return; } }")
            .unwrap_err();
        assert!(
            matches!(err, CoreError::UndeclaredVariable { ref name, .. } if name == "ghost"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn compiling_twice_is_byte_identical() {
        let source = "class Main {
            field int count;
            method void tick() {
                while (count < 10) { let count = count + 1; }
                if (count = 10) { do Output.printInt(count); }
                return;
            }
        }";
        let first = compile_to_vm(source).expect("first compile");
        let second = compile_to_vm(source).expect("second compile");
        assert_eq!(first, second);
    }

    #[test]
    fn artifact_records_class_name() {
        let artifact = compile_source("class Ball { }").expect("compile should succeed");
        assert_eq!(artifact.class_name, "Ball");
        assert!(artifact.instructions.is_empty());
    }

    #[test]
    fn xml_output_starts_with_class_tag() {
        let xml = emit_xml("class Ball { }").expect("emit should succeed");
        assert!(xml.starts_with("<class>\n"));
        assert!(xml.ends_with("</class>\n"));
    }

    #[test]
    fn syntax_errors_surface_from_both_entry_points() {
        let source = "class Ball { method }";
        assert!(compile_to_vm(source).is_err());
        assert!(emit_xml(source).is_err());
    }
}
