//! The TableGen grammar itself: turns a token stream into the
//! owned [`super::ast::Records`] tree, interning identifiers and string
//! literals as it goes.
//!
//! Grammar rules are plain functions rather than pure `nom` combinators
//! wherever they need access to the [`Interner`], since threading mutable
//! state through `nom`'s combinator macros is more trouble than it is
//! worth; low-level token recognition (in [`super::lexer`]) stays
//! side-effect-free.

use nom::bytes::complete::tag_no_case;
use nom::character::complete::char;
use nom::multi::many1;
use nom::sequence::delimited;
use nom::IResult;

use super::ast::*;
use super::intern::Interner;
use super::lexer::*;

fn header<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, ()> {
    move |input: &'a str| {
        let (input, _) = ws0(input)?;
        let (input, _) = many1(char('-'))(input)?;
        let (input, _) = ws0(input)?;
        let (input, _) = tag_no_case(word)(input)?;
        let (input, _) = ws0(input)?;
        let (input, _) = many1(char('-'))(input)?;
        let (input, _) = ws0(input)?;
        Ok((input, ()))
    }
}

fn parse_decl_type<'a>(input: &'a str, interner: &mut Interner) -> IResult<&'a str, DeclType> {
    let (input, word) = identifier(input)?;
    match word {
        "field" => {
            let (input, _) = keyword("bits")(input)?;
            let (input, n) = delimited(symbol("<"), integer, symbol(">"))(input)?;
            Ok((input, DeclType::FieldBits(n as u64)))
        }
        "bits" => {
            let (input, n) = delimited(symbol("<"), integer, symbol(">"))(input)?;
            Ok((input, DeclType::Bits(n as u64)))
        }
        "bit" => Ok((input, DeclType::Bit)),
        "string" => Ok((input, DeclType::Str)),
        "int" => Ok((input, DeclType::Int)),
        "dag" => Ok((input, DeclType::Dag)),
        "list" => {
            let (input, _) = symbol("<")(input)?;
            let (input, inner) = parse_decl_type(input, interner)?;
            let (input, _) = symbol(">")(input)?;
            Ok((input, DeclType::List(Box::new(inner))))
        }
        other => Ok((input, DeclType::Class(interner.intern(other)))),
    }
}

fn parse_bitvec_elem<'a>(input: &'a str, interner: &mut Interner) -> IResult<&'a str, BitVecElem> {
    if let Ok((rest, b)) = bit_literal(input) {
        return Ok((rest, if b { BitVecElem::One } else { BitVecElem::Zero }));
    }
    if let Ok((rest, _)) = symbol("?")(input) {
        return Ok((rest, BitVecElem::Unset));
    }
    let (rest, name) = identifier(input)?;
    let name = interner.intern(name);
    if let Ok((rest2, _)) = symbol("{")(rest) {
        let (rest2, idx) = integer(rest2)?;
        let (rest2, _) = symbol("}")(rest2)?;
        return Ok((rest2, BitVecElem::FieldBit(name, idx as u64)));
    }
    Ok((rest, BitVecElem::FieldVar(name)))
}

fn parse_bit_vector<'a>(
    input: &'a str,
    interner: &mut Interner,
) -> IResult<&'a str, Vec<BitVecElem>> {
    let (input, _) = symbol("{")(input)?;
    if let Ok((rest, _)) = symbol("}")(input) {
        return Ok((rest, Vec::new()));
    }
    let (mut input, first) = parse_bitvec_elem(input, interner)?;
    let mut elems = vec![first];
    loop {
        match symbol(",")(input) {
            Ok((rest, _)) => {
                let (rest, elem) = parse_bitvec_elem(rest, interner)?;
                elems.push(elem);
                input = rest;
            }
            Err(_) => break,
        }
    }
    let (input, _) = symbol("}")(input)?;
    Ok((input, elems))
}

fn parse_paren_value_list<'a>(
    input: &'a str,
    interner: &mut Interner,
) -> IResult<&'a str, Vec<Value>> {
    let (input, _) = symbol("(")(input)?;
    if let Ok((rest, _)) = symbol(")")(input) {
        return Ok((rest, Vec::new()));
    }
    let (mut input, first) = parse_general_value(input, interner)?;
    let mut items = vec![first];
    loop {
        match symbol(",")(input) {
            Ok((rest, _)) => {
                let (rest, v) = parse_general_value(rest, interner)?;
                items.push(v);
                input = rest;
            }
            Err(_) => break,
        }
    }
    let (input, _) = symbol(")")(input)?;
    Ok((input, items))
}

fn parse_angle_value_list<'a>(
    input: &'a str,
    interner: &mut Interner,
) -> IResult<&'a str, Vec<Value>> {
    let (input, _) = symbol("<")(input)?;
    if let Ok((rest, _)) = symbol(">")(input) {
        return Ok((rest, Vec::new()));
    }
    let (mut input, first) = parse_general_value(input, interner)?;
    let mut items = vec![first];
    loop {
        match symbol(",")(input) {
            Ok((rest, _)) => {
                let (rest, v) = parse_general_value(rest, interner)?;
                items.push(v);
                input = rest;
            }
            Err(_) => break,
        }
    }
    let (input, _) = symbol(">")(input)?;
    Ok((input, items))
}

fn parse_dag<'a>(input: &'a str, interner: &mut Interner) -> IResult<&'a str, DagItem> {
    let (input, _) = symbol("(")(input)?;
    let (input, operator) = identifier(input)?;
    let operator = interner.intern(operator);
    if let Ok((rest, _)) = symbol(")")(input) {
        return Ok((rest, DagItem {
            operator,
            args: Vec::new(),
        }));
    }
    let (mut input, first) = parse_dag_arg(input, interner)?;
    let mut args = vec![first];
    loop {
        match symbol(",")(input) {
            Ok((rest, _)) => {
                let (rest, a) = parse_dag_arg(rest, interner)?;
                args.push(a);
                input = rest;
            }
            Err(_) => break,
        }
    }
    let (input, _) = symbol(")")(input)?;
    Ok((input, DagItem { operator, args }))
}

fn parse_dag_arg<'a>(input: &'a str, interner: &mut Interner) -> IResult<&'a str, DagArg> {
    if let Ok((rest, _)) = symbol("$")(input) {
        let (rest, name) = identifier(rest)?;
        return Ok((rest, DagArg {
            value: Value::Unknown,
            name: Some(interner.intern(name)),
        }));
    }
    let (input, value) = parse_general_value(input, interner)?;
    if let Ok((rest, _)) = symbol(":")(input) {
        let (rest, _) = symbol("$")(rest)?;
        let (rest, name) = identifier(rest)?;
        return Ok((rest, DagArg {
            value,
            name: Some(interner.intern(name)),
        }));
    }
    Ok((input, DagArg { value, name: None }))
}

/// A general, type-agnostic expression: `!op(...)`, a call (optionally
/// template-parameterized), a bare reference, a literal, or a nested
/// dag/bit-vector.
fn parse_general_value<'a>(input: &'a str, interner: &mut Interner) -> IResult<&'a str, Value> {
    if let Ok((rest, _)) = symbol("?")(input) {
        return Ok((rest, Value::Unknown));
    }
    if let Ok((rest, n)) = integer(input) {
        return Ok((rest, Value::Int(n)));
    }
    if let Ok((rest, s)) = string_literal(input) {
        return Ok((rest, Value::Str(interner.intern(&s))));
    }
    if let Ok((rest, bv)) = parse_bit_vector(input, interner) {
        return Ok((rest, Value::BitVector(bv)));
    }
    if let Ok((rest, _)) = symbol("!")(input) {
        let (rest, op) = identifier(rest)?;
        let op = interner.intern(op);
        let (rest, args) = parse_paren_value_list(rest, interner)?;
        return Ok((rest, Value::Expr(Expr::BangOp(op, args))));
    }
    if let Ok((rest, dag)) = parse_dag(input, interner) {
        return Ok((rest, Value::Dag(dag)));
    }

    let (input, name) = identifier(input)?;
    let name = interner.intern(name);
    let (input, targs) = match parse_angle_value_list(input, interner) {
        Ok((rest, args)) => (rest, args),
        Err(_) => (input, Vec::new()),
    };
    let (input, args) = match parse_paren_value_list(input, interner) {
        Ok((rest, args)) => (rest, Some(args)),
        Err(_) => (input, None),
    };
    if targs.is_empty() && args.is_none() {
        Ok((input, Value::Expr(Expr::Ref(name))))
    } else {
        Ok((input, Value::Expr(Expr::Call(name, targs, args.unwrap_or_default()))))
    }
}

fn parse_list<'a>(
    input: &'a str,
    ty: &DeclType,
    interner: &mut Interner,
) -> IResult<&'a str, Vec<Value>> {
    let inner_ty = match ty {
        DeclType::List(inner) => inner.as_ref(),
        other => other,
    };
    let (input, _) = symbol("[")(input)?;
    if let Ok((rest, _)) = symbol("]")(input) {
        return Ok((rest, Vec::new()));
    }
    let (mut input, first) = parse_value(input, inner_ty, interner)?;
    let mut items = vec![first];
    loop {
        match symbol(",")(input) {
            Ok((rest, _)) => {
                let (rest, v) = parse_value(rest, inner_ty, interner)?;
                items.push(v);
                input = rest;
            }
            Err(_) => break,
        }
    }
    let (input, _) = symbol("]")(input)?;
    Ok((input, items))
}

fn parse_value<'a>(
    input: &'a str,
    ty: &DeclType,
    interner: &mut Interner,
) -> IResult<&'a str, Value> {
    if let Ok((rest, _)) = symbol("?")(input) {
        return Ok((rest, Value::Unknown));
    }
    match ty {
        DeclType::Bit => match bit_literal(input) {
            Ok((rest, b)) => Ok((rest, Value::Bit(b))),
            Err(_) => parse_general_value(input, interner),
        },
        DeclType::Bits(_) | DeclType::FieldBits(_) => match parse_bit_vector(input, interner) {
            Ok((rest, v)) => Ok((rest, Value::BitVector(v))),
            Err(_) => parse_general_value(input, interner),
        },
        DeclType::Str => match string_literal(input) {
            Ok((rest, s)) => Ok((rest, Value::Str(interner.intern(&s)))),
            Err(_) => parse_general_value(input, interner),
        },
        DeclType::Int => match integer(input) {
            Ok((rest, n)) => Ok((rest, Value::Int(n))),
            Err(_) => parse_general_value(input, interner),
        },
        DeclType::Dag => match parse_dag(input, interner) {
            Ok((rest, d)) => Ok((rest, Value::Dag(d))),
            Err(_) => parse_general_value(input, interner),
        },
        DeclType::List(_) => match parse_list(input, ty, interner) {
            Ok((rest, items)) => Ok((rest, Value::List(items))),
            Err(_) => parse_general_value(input, interner),
        },
        DeclType::Class(_) => parse_general_value(input, interner),
    }
}

fn parse_decl<'a>(input: &'a str, interner: &mut Interner) -> IResult<&'a str, Decl> {
    let (input, ty) = parse_decl_type(input, interner)?;
    let (input, name) = identifier(input)?;
    let name = interner.intern(name);
    let (input, _) = symbol("=")(input)?;
    let (input, value) = parse_value(input, &ty, interner)?;
    let (input, _) = symbol(";")(input)?;
    Ok((input, Decl { ty, name, value }))
}

fn many_decls<'a>(input: &'a str, interner: &mut Interner) -> IResult<&'a str, Vec<Decl>> {
    let (mut input, first) = parse_decl(input, interner)?;
    let mut decls = vec![first];
    loop {
        match parse_decl(input, interner) {
            Ok((rest, d)) => {
                decls.push(d);
                input = rest;
            }
            Err(_) => break,
        }
    }
    Ok((input, decls))
}

fn parse_class_param<'a>(input: &'a str, interner: &mut Interner) -> IResult<&'a str, ClassParam> {
    let (input, ty) = parse_decl_type(input, interner)?;
    let (input, name) = identifier(input)?;
    let name = interner.intern(name);
    if let Ok((rest, _)) = symbol("=")(input) {
        let (rest, v) = parse_value(rest, &ty, interner)?;
        return Ok((rest, ClassParam {
            ty,
            name,
            default: Some(v),
        }));
    }
    Ok((input, ClassParam {
        ty,
        name,
        default: None,
    }))
}

fn parse_class_params<'a>(
    input: &'a str,
    interner: &mut Interner,
) -> IResult<&'a str, Vec<ClassParam>> {
    match symbol("<")(input) {
        Ok((input, _)) => {
            let (mut input, first) = parse_class_param(input, interner)?;
            let mut params = vec![first];
            loop {
                match symbol(",")(input) {
                    Ok((rest, _)) => {
                        let (rest, p) = parse_class_param(rest, interner)?;
                        params.push(p);
                        input = rest;
                    }
                    Err(_) => break,
                }
            }
            let (input, _) = symbol(">")(input)?;
            Ok((input, params))
        }
        Err(_) => Ok((input, Vec::new())),
    }
}

fn parse_class<'a>(input: &'a str, interner: &mut Interner) -> IResult<&'a str, Class> {
    let (input, _) = keyword("class")(input)?;
    let (input, name) = identifier(input)?;
    let name = interner.intern(name);
    let (input, params) = parse_class_params(input, interner)?;
    let (input, _) = symbol("{")(input)?;
    let (input, decls) = many_decls(input, interner)?;
    let (input, _) = symbol("}")(input)?;
    Ok((input, Class {
        name,
        params,
        decls,
    }))
}

fn parse_def<'a>(input: &'a str, interner: &mut Interner) -> IResult<&'a str, Def> {
    let (input, _) = keyword("def")(input)?;
    let (input, name) = identifier(input)?;
    let name = interner.intern(name);
    let (input, _) = symbol("{")(input)?;
    let (input, decls) = many_decls(input, interner)?;
    let (input, _) = symbol("}")(input)?;
    Ok((input, Def { name, decls }))
}

/// Parses a whole TableGen dump: the `Classes` header and zero or more
/// classes, then the `Defs` header and zero or more defs.
pub fn parse_file<'a>(input: &'a str, interner: &mut Interner) -> IResult<&'a str, Records> {
    let (input, _) = ws0(input)?;
    let (input, _) = header("Classes")(input)?;

    let mut classes = Vec::new();
    let mut rest = input;
    loop {
        match parse_class(rest, interner) {
            Ok((r, c)) => {
                classes.push(c);
                rest = r;
            }
            Err(_) => break,
        }
    }

    let (rest, _) = header("Defs")(rest)?;

    let mut defs = Vec::new();
    let mut rest = rest;
    loop {
        match parse_def(rest, interner) {
            Ok((r, d)) => {
                defs.push(d);
                rest = r;
            }
            Err(_) => break,
        }
    }

    Ok((rest, Records { classes, defs }))
}
