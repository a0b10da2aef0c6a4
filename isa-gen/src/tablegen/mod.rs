//! The TableGen parser: turns a textual dump into a [`Records`] AST of
//! classes and defs.

pub mod ast;
mod intern;
mod lexer;
mod parser;

pub use ast::{
    BitVecElem, Class, ClassParam, DagArg, DagItem, Decl, DeclType, Def, Expr, Records, Value,
};

use crate::error::ParseError;
use intern::Interner;

/// Parses a TableGen text dump into a [`Records`] AST.
///
/// Parsing is all-or-nothing: the first malformed record aborts the whole
/// parse with a position-carrying [`ParseError`], and no partial AST is
/// ever returned.
pub fn parse_tablegen(input: &str) -> Result<Records, ParseError> {
    let mut interner = Interner::new();
    match parser::parse_file(input, &mut interner) {
        Ok((rest, records)) => {
            if rest.trim().is_empty() {
                Ok(records)
            } else {
                Err(error_at(input, rest, "unexpected trailing input"))
            }
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            Err(error_at(input, e.input, "malformed tablegen record"))
        }
        Err(nom::Err::Incomplete(_)) => {
            Err(ParseError::new(1, 1, "unexpected end of input"))
        }
    }
}

fn error_at(original: &str, remaining: &str, message: &str) -> ParseError {
    let offset = (remaining.as_ptr() as usize).saturating_sub(original.as_ptr() as usize);
    let offset = offset.min(original.len());
    let consumed = &original[..offset];
    let line = consumed.matches('\n').count() + 1;
    let column = consumed.rsplit('\n').next().map_or(1, |s| s.chars().count() + 1);
    ParseError::new(line, column, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
------------- Classes -----------------

class Instruction<bits<8> opc> {
    bits<32> Inst;
    string AsmString;
    dag OutOperandList;
    dag InOperandList;
    bit isPseudo = 0;
}

------------- Defs -----------------

def ADD {
    bits<32> Inst = { 0, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0 };
    string AsmString = "add";
    dag OutOperandList = (outs);
    dag InOperandList = (ins);
    bit isPseudo = 0;
}

def MOV {
    bits<32> Inst = { 1, 0, 0, 0, rD{3}, rD{2}, rD{1}, rD{0}, 0, 0, 0, 0, 0, 0, 0, 0, imm{15}, imm{14}, imm{13}, imm{12}, imm{11}, imm{10}, imm{9}, imm{8}, imm{7}, imm{6}, imm{5}, imm{4}, imm{3}, imm{2}, imm{1}, imm{0} };
    string AsmString = "mov $rD, $imm";
    dag OutOperandList = (outs GPR:$rD);
    dag InOperandList = (ins i16imm:$imm);
    bit isPseudo = 0;
}
"#;

    #[test]
    fn parses_sample_dump() {
        let records = parse_tablegen(SAMPLE).expect("sample dump should parse");
        assert_eq!(records.classes.len(), 1);
        assert_eq!(records.defs.len(), 2);
        assert_eq!(&*records.defs[0].name, "ADD");
        assert_eq!(&*records.defs[1].name, "MOV");

        let mov = &records.defs[1];
        let asm = mov.get("AsmString").unwrap().as_str().unwrap();
        assert_eq!(asm, "mov $rD, $imm");

        let out_ops = mov.get("OutOperandList").unwrap().as_dag().unwrap();
        assert_eq!(&*out_ops.operator, "outs");
        assert_eq!(out_ops.args.len(), 1);
        assert_eq!(out_ops.args[0].name.as_deref(), Some("rD"));
    }

    #[test]
    fn multiline_string_literal_followed_by_def_parses_cleanly() {
        let input = r#"
------------- Classes -----------------

class Foo {
    string Doc = "
first line
second line";
    bit isPseudo = 0;
}

------------- Defs -----------------

def Bar {
    bit isPseudo = 1;
}
"#;
        let records = parse_tablegen(input).expect("should parse");
        assert_eq!(records.classes[0].decls[0].value.as_str().unwrap(), "first line\nsecond line");
        assert_eq!(records.defs.len(), 1);
        assert_eq!(&*records.defs[0].name, "Bar");
    }

    #[test]
    fn malformed_record_reports_position() {
        // Missing the closing brace: a syntactic failure, not merely an
        // unexpected value, so the parser must abort with a position.
        let input = "------------- Classes -----------------\n------------- Defs -----------------\ndef Broken {\n    bit x = 0;\n";
        let err = parse_tablegen(input).unwrap_err();
        assert_eq!(err.line, 5);
    }

    #[test]
    fn interning_does_not_change_ast_equality() {
        let a = parse_tablegen(SAMPLE).unwrap();
        let b = parse_tablegen(SAMPLE).unwrap();
        assert_eq!(a, b);
    }
}
