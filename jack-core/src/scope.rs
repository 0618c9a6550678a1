//! Lexical scopes.
//!
//! One `Scope` exists per class and one per subroutine; the subroutine
//! scope borrows its class scope as parent. Lookups walk outward and the
//! nearest declaration wins.

use std::collections::HashMap;

use crate::error::CoreError;
use crate::vm::Segment;

/// Declaration category of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Static,
    Field,
    Argument,
    Local,
}

impl Kind {
    pub const ALL: [Kind; 4] = [Kind::Static, Kind::Field, Kind::Argument, Kind::Local];

    /// Memory segment that backs variables of this kind.
    pub fn segment(self) -> Segment {
        match self {
            Kind::Static => Segment::Static,
            Kind::Field => Segment::This,
            Kind::Argument => Segment::Argument,
            Kind::Local => Segment::Local,
        }
    }

    fn slot(self) -> usize {
        match self {
            Kind::Static => 0,
            Kind::Field => 1,
            Kind::Argument => 2,
            Kind::Local => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub ty: String,
    pub kind: Kind,
    pub index: u16,
}

#[derive(Debug)]
pub struct Scope<'p> {
    name: String,
    parent: Option<&'p Scope<'p>>,
    entries: HashMap<String, Entry>,
    counts: [u16; 4],
    next_label: usize,
}

impl<'p> Scope<'p> {
    /// Outermost scope, one per class.
    pub fn root(name: impl Into<String>) -> Self {
        Scope {
            name: name.into(),
            parent: None,
            entries: HashMap::new(),
            counts: [0; 4],
            next_label: 0,
        }
    }

    /// Scope nested inside `parent`.
    pub fn child(name: impl Into<String>, parent: &'p Scope<'p>) -> Self {
        Scope {
            parent: Some(parent),
            ..Scope::root(name)
        }
    }

    /// `Class.subroutine` for nested scopes, the bare name otherwise.
    pub fn qualified_name(&self) -> String {
        match self.parent {
            Some(parent) => format!("{}.{}", parent.name, self.name),
            None => self.name.clone(),
        }
    }

    /// Declare `name` here with the next free slot of `kind`.
    /// Shadowing an outer declaration is fine; redeclaring in this scope is not.
    pub fn declare(
        &mut self,
        name: &str,
        ty: impl Into<String>,
        kind: Kind,
    ) -> Result<&Entry, CoreError> {
        if self.entries.contains_key(name) {
            return Err(CoreError::DuplicateDeclaration {
                scope: self.qualified_name(),
                name: name.to_string(),
            });
        }
        let count = &mut self.counts[kind.slot()];
        let entry = Entry {
            ty: ty.into(),
            kind,
            index: *count,
        };
        *count += 1;
        Ok(self.entries.entry(name.to_string()).or_insert(entry))
    }

    /// Nearest declaration of `name`, or `None` if no enclosing scope has one.
    pub fn resolve(&self, name: &str) -> Option<&Entry> {
        self.entries
            .get(name)
            .or_else(|| self.parent.and_then(|parent| parent.resolve(name)))
    }

    /// Like `resolve`, but an unknown name is an error.
    pub fn require(&self, name: &str) -> Result<&Entry, CoreError> {
        self.resolve(name)
            .ok_or_else(|| CoreError::UndeclaredVariable {
                scope: self.qualified_name(),
                name: name.to_string(),
            })
    }

    /// Number of `kind` declarations made directly in this scope.
    pub fn count_of(&self, kind: Kind) -> u16 {
        self.counts[kind.slot()]
    }

    /// Fresh branch label, prefixed with the parent and scope names.
    pub fn new_label(&mut self) -> String {
        let counter = self.next_label;
        self.next_label += 1;
        match self.parent {
            Some(parent) => format!("{}_{}_{}", parent.name, self.name, counter),
            None => format!("{}_{}", self.name, counter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declare_then_resolve_returns_entry() {
        let mut scope = Scope::root("Point");
        scope.declare("x", "int", Kind::Field).expect("declare");
        let entry = scope.resolve("x").expect("resolve");
        assert_eq!(
            entry,
            &Entry {
                ty: "int".to_string(),
                kind: Kind::Field,
                index: 0
            }
        );
        assert!(scope.resolve("y").is_none());
    }

    #[test]
    fn indices_are_dense_per_kind() {
        let mut scope = Scope::root("Game");
        scope.declare("a", "int", Kind::Static).expect("a");
        scope.declare("b", "int", Kind::Field).expect("b");
        scope.declare("c", "Array", Kind::Static).expect("c");
        scope.declare("d", "boolean", Kind::Field).expect("d");
        scope.declare("e", "int", Kind::Field).expect("e");

        assert_eq!(scope.resolve("c").map(|entry| entry.index), Some(1));
        assert_eq!(scope.resolve("e").map(|entry| entry.index), Some(2));
        assert_eq!(scope.count_of(Kind::Static), 2);
        assert_eq!(scope.count_of(Kind::Field), 3);
        assert_eq!(scope.count_of(Kind::Local), 0);
    }

    #[test]
    fn redeclaring_in_same_scope_fails() {
        let mut scope = Scope::root("Main");
        scope.declare("x", "int", Kind::Static).expect("first");
        let err = scope.declare("x", "char", Kind::Field).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateDeclaration { ref name, .. } if name == "x"));
        assert_eq!(scope.count_of(Kind::Field), 0);
    }

    #[test]
    fn child_scope_shadows_parent() {
        let mut class = Scope::root("Main");
        class.declare("x", "int", Kind::Field).expect("field");
        class.declare("y", "int", Kind::Static).expect("static");

        let mut method = Scope::child("run", &class);
        method.declare("x", "char", Kind::Local).expect("shadow");

        let x = method.resolve("x").expect("x");
        assert_eq!((x.kind, x.ty.as_str()), (Kind::Local, "char"));
        let y = method.resolve("y").expect("y");
        assert_eq!(y.kind, Kind::Static);
        assert_eq!(method.count_of(Kind::Field), 0);
        assert_eq!(class.count_of(Kind::Field), 1);
    }

    #[test]
    fn require_reports_undeclared_names() {
        let class = Scope::root("Main");
        let method = Scope::child("main", &class);
        let err = method.require("ghost").unwrap_err();
        assert!(matches!(err, CoreError::UndeclaredVariable { ref scope, .. } if scope == "Main.main"));
    }

    #[test]
    fn labels_are_scoped_and_monotonic() {
        let class = Scope::root("Square");
        let mut draw = Scope::child("draw", &class);
        assert_eq!(draw.new_label(), "Square_draw_0");
        assert_eq!(draw.new_label(), "Square_draw_1");

        let mut erase = Scope::child("erase", &class);
        assert_eq!(erase.new_label(), "Square_erase_0");
    }

    #[test]
    fn kinds_map_to_segments() {
        let segments: Vec<_> = Kind::ALL.iter().map(|kind| kind.segment()).collect();
        assert_eq!(
            segments,
            [Segment::Static, Segment::This, Segment::Argument, Segment::Local]
        );
    }
}
