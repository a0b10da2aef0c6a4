//! The canonical intermediate data model produced by the ISA filter.

use std::collections::HashMap;
use std::rc::Rc;

use crate::bits::{Bit, OperandChunk};
use crate::error::DescriptorError;

/// One named, typed operand of an instruction, together with the chunk
/// layout that recovers its value from (or deposits it into) the
/// instruction word.
#[derive(Debug, Clone, PartialEq)]
pub struct OperandDescriptor {
    pub name: Rc<str>,
    pub chunks: Vec<OperandChunk>,
    pub ty: Rc<str>,
}

/// One instruction encoding: a fixed-width bit pattern plus its operand
/// layout and assembly metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct InstructionDescriptor {
    /// The endian-corrected pattern used by the byte-trie.
    pub mask: Vec<Bit>,
    /// The pattern exactly as read off the `Inst` field, before any
    /// endian adaptation.
    pub raw_mask: Vec<Bit>,
    pub mnemonic: Rc<str>,
    pub input_ops: Vec<OperandDescriptor>,
    pub output_ops: Vec<OperandDescriptor>,
    pub namespace: Rc<str>,
    pub decoder_namespace: Rc<str>,
    pub asm_string: Rc<str>,
    pub is_pseudo: bool,
}

impl InstructionDescriptor {
    /// Output operands followed by input operands, in declaration order —
    /// the canonical order used throughout the rest of the pipeline.
    pub fn canonical_operands(&self) -> impl Iterator<Item = &OperandDescriptor> {
        self.output_ops.iter().chain(self.input_ops.iter())
    }
}

/// The durable intermediate the rest of the pipeline (byte-trie builder,
/// bit engine, runtime facade) is built from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IsaDescriptor {
    pub instructions: Vec<InstructionDescriptor>,
    /// Register class name to the member register names recovered for it.
    ///
    /// The accepted TableGen grammar has no class-inheritance syntax, so
    /// there is no direct way to read "this def belongs to that register
    /// class" off the AST. It is recovered indirectly: any def not
    /// selected by `filter_instruction` is assumed to describe a register
    /// (or similar non-instruction record), and is filed under every
    /// operand-type name that is also the name of an actually-declared
    /// class in the dump.
    pub register_classes: HashMap<Rc<str>, Vec<Rc<str>>>,
    pub registers: Vec<Rc<str>>,
    pub operands: Vec<Rc<str>>,
    pub errors: Vec<DescriptorError>,
}
