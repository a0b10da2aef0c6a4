//! The `Records` AST produced by the TableGen parser.

use std::collections::HashMap;
use std::rc::Rc;

/// A single tri-state element of a `bits<N>` literal.
///
/// Distinct from [`crate::bits::Bit`]: this is what the *parser* sees in
/// source text, before the ISA filter resolves `FieldBit`/`FieldVar`
/// references against sibling declarations and collapses everything down
/// to fixed/don't-care bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BitVecElem {
    Zero,
    One,
    /// The `?` marker: an unset bit, later assigned by a subclass or left
    /// to be filled in by an operand.
    Unset,
    /// `Name{index}`: a reference to one bit of another field.
    FieldBit(Rc<str>, u64),
    /// A bare `Name`: a reference to an entire field, used positionally.
    FieldVar(Rc<str>),
}

/// A DAG operator application, e.g. `(ins GPR:$rd, i32imm:$imm)`.
///
/// The core does not interpret DAG semantics beyond syntactic balance:
/// the operator and each argument's optional `$name` are kept, but
/// argument values are themselves just [`Value`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct DagItem {
    pub operator: Rc<str>,
    pub args: Vec<DagArg>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DagArg {
    pub value: Value,
    pub name: Option<Rc<str>>,
}

/// A general, uninterpreted TableGen expression: a `!op(...)` bang
/// operator, a function/class-instantiation call (with optional `<...>`
/// template arguments), or a bare reference to another symbol.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    BangOp(Rc<str>, Vec<Value>),
    Call(Rc<str>, Vec<Value>, Vec<Value>),
    Ref(Rc<str>),
}

/// The value bound to a declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bit(bool),
    Int(i64),
    Str(Rc<str>),
    BitVector(Vec<BitVecElem>),
    List(Vec<Value>),
    Dag(DagItem),
    Expr(Expr),
    /// The bare `?` marker used as a whole declaration's value.
    Unknown,
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bit_vector(&self) -> Option<&[BitVecElem]> {
        match self {
            Value::BitVector(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_dag(&self) -> Option<&DagItem> {
        match self {
            Value::Dag(d) => Some(d),
            _ => None,
        }
    }
}

/// The declared type of a `NamedDecl`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclType {
    Bit,
    Bits(u64),
    FieldBits(u64),
    Str,
    Int,
    Dag,
    List(Box<DeclType>),
    /// Any identifier that is not one of the built-in type keywords is the
    /// name of a class (e.g. an operand's register class).
    Class(Rc<str>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decl {
    pub ty: DeclType,
    pub name: Rc<str>,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassParam {
    pub ty: DeclType,
    pub name: Rc<str>,
    pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Class {
    pub name: Rc<str>,
    pub params: Vec<ClassParam>,
    pub decls: Vec<Decl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Def {
    pub name: Rc<str>,
    pub decls: Vec<Decl>,
}

impl Def {
    /// Looks up a declaration's value by name among this def's own fields.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.decls.iter().find(|d| &*d.name == name).map(|d| &d.value)
    }

    pub fn get_decl(&self, name: &str) -> Option<&Decl> {
        self.decls.iter().find(|d| &*d.name == name)
    }
}

/// The full AST produced by one parse of a TableGen dump.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Records {
    pub classes: Vec<Class>,
    pub defs: Vec<Def>,
}

impl Records {
    pub fn class(&self, name: &str) -> Option<&Class> {
        self.classes.iter().find(|c| &*c.name == name)
    }

    pub fn by_name(&self) -> HashMap<&str, &Def> {
        self.defs.iter().map(|d| (&*d.name, d)).collect()
    }
}
