//! The runtime facade that stands in for "the emitted artifact": rather
//! than generating target-language source text, this exposes the
//! disassemble/assemble/pretty-print contract a code emitter would expose,
//! driven directly off an [`IsaDescriptor`] and [`ByteTrie`].

use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::bits::{assemble_bits, field_from_word, Bit, OperandAssembly};
use crate::error::BuildError;
use crate::isa::{build_descriptor, IsaConfig, IsaDescriptor};
use crate::tablegen::Records;
use crate::trie::{self, ByteTrie, Pattern};

/// A decoded (or to-be-assembled) instruction: one mnemonic plus its
/// operands in canonical order (outputs then inputs).
///
/// This is the "dynamic shape" alternative to a generated sum type: a single
/// variant carrying a uniform operand vector rather than one
/// sum-type-variant per mnemonic, since generating the latter is the
/// target-language code emission this crate does not perform.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub mnemonic: Rc<str>,
    pub operands: Vec<(Rc<str>, u64)>,
}

impl Instruction {
    pub fn new(mnemonic: impl Into<Rc<str>>, operands: Vec<(Rc<str>, u64)>) -> Self {
        Instruction {
            mnemonic: mnemonic.into(),
            operands,
        }
    }

    pub fn operand(&self, name: &str) -> Option<u64> {
        self.operands.iter().find(|(n, _)| &**n == name).map(|(_, v)| *v)
    }
}

/// A whole ISA, ready to decode and encode instructions.
///
/// Borrows the `IsaConfig` it was built from for its lifetime, since the
/// endian adapters (`insn_word_from_bytes`/`insn_word_to_bytes`) are
/// per-architecture behavior the facade must keep calling at every decode
/// and encode, not just at build time.
pub struct GeneratedIsa<'a, C: IsaConfig> {
    config: &'a C,
    descriptor: IsaDescriptor,
    trie: ByteTrie<Rc<str>>,
    width_bits: u32,
    width_bytes: usize,
    payload_types: HashMap<String, crate::isa::PayloadType>,
    by_mnemonic: HashMap<Rc<str>, usize>,
}

fn mask_to_word(mask: &[Bit]) -> u64 {
    let mut word = 0u64;
    for b in mask {
        word <<= 1;
        if b.value() == Some(true) {
            word |= 1;
        }
    }
    word
}

impl<'a, C: IsaConfig> GeneratedIsa<'a, C> {
    /// Runs the ISA filter and byte-trie builder once over `records`, per
    /// the supplied `config`, and memoizes both.
    ///
    /// Pseudo instructions are excluded from the decoder table — they have
    /// no direct encoding, per the glossary's "Pseudo instruction" entry —
    /// so callers never see one returned from `disassemble`, though
    /// `assemble`/`pretty_print` still work for them if a caller
    /// constructs an `Instruction` naming one directly.
    pub fn build(records: &Records, config: &'a C) -> Result<GeneratedIsa<'a, C>, BuildError> {
        let descriptor = build_descriptor(records, config);
        let width_bits = config.insn_width_bits();
        let width_bytes = (width_bits as usize + 7) / 8;

        let mut by_mnemonic = HashMap::new();
        let mut patterns = Vec::new();
        for (i, instr) in descriptor.instructions.iter().enumerate() {
            by_mnemonic.insert(instr.mnemonic.clone(), i);
            if instr.is_pseudo {
                continue;
            }
            let mut required = vec![0u8; width_bytes];
            let mut value = vec![0u8; width_bytes];
            for (bit_idx, b) in instr.mask.iter().enumerate() {
                let byte = bit_idx / 8;
                let shift = 7 - (bit_idx % 8);
                if let Some(bit_value) = b.value() {
                    required[byte] |= 1 << shift;
                    if bit_value {
                        value[byte] |= 1 << shift;
                    }
                }
            }
            patterns.push(Pattern {
                tag: instr.mnemonic.to_string(),
                required_mask: required,
                value_mask: value,
                payload: instr.mnemonic.clone(),
            });
        }

        debug!(count = patterns.len(), width_bytes, "building byte-trie from descriptor");
        let trie = trie::build(&patterns, width_bytes)?;

        Ok(GeneratedIsa {
            config,
            payload_types: config.operand_payload_types(),
            by_mnemonic,
            descriptor,
            trie,
            width_bits,
            width_bytes,
        })
    }

    pub fn descriptor(&self) -> &IsaDescriptor {
        &self.descriptor
    }

    /// Decodes at most one instruction from the front of `bytes`.
    pub fn disassemble(&self, bytes: &[u8]) -> (usize, Option<Instruction>) {
        match self.trie.decode(bytes) {
            None => (0, None),
            Some((consumed, mnemonic)) => {
                let instr = &self.descriptor.instructions[self.by_mnemonic[&mnemonic]];
                let word = self.config.insn_word_from_bytes(&bytes[..consumed]);
                let operands = instr
                    .canonical_operands()
                    .map(|op| {
                        let raw = field_from_word(word, self.width_bits, &op.chunks);
                        let value = self
                            .payload_types
                            .get(&*op.ty)
                            .map_or(raw, |pt| pt.decode(raw));
                        (op.name.clone(), value)
                    })
                    .collect();
                (
                    consumed,
                    Some(Instruction {
                        mnemonic,
                        operands,
                    }),
                )
            }
        }
    }

    /// Encodes `instruction` back to bytes. A total function: operand
    /// values wider than their declared chunk coverage are truncated to
    /// their low bits.
    pub fn assemble(&self, instruction: &Instruction) -> Vec<u8> {
        let idx = self.by_mnemonic[&instruction.mnemonic];
        let instr = &self.descriptor.instructions[idx];
        let base_mask = mask_to_word(&instr.mask);

        let encoded: Vec<(u64, &[crate::bits::OperandChunk])> = instr
            .canonical_operands()
            .map(|op| {
                let raw = instruction.operand(&op.name).unwrap_or(0);
                let value = self
                    .payload_types
                    .get(&*op.ty)
                    .map_or(raw, |pt| pt.encode(raw));
                (value, op.chunks.as_slice())
            })
            .collect();
        let assemblies: Vec<OperandAssembly<'_>> = encoded
            .iter()
            .map(|(value, chunks)| OperandAssembly {
                value: *value,
                chunks,
            })
            .collect();

        let word = assemble_bits(base_mask, self.width_bits, &assemblies);
        let mut out = self.config.insn_word_to_bytes(word);
        out.truncate(self.width_bytes);
        out
    }

    /// Formats `instruction`'s asm template, substituting each `$name`
    /// placeholder with its operand.
    pub fn pretty_print(&self, instruction: &Instruction) -> String {
        let idx = self.by_mnemonic[&instruction.mnemonic];
        let instr = &self.descriptor.instructions[idx];
        let mut out = String::new();
        let mut chars = instr.asm_string.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '$' {
                let mut name = String::new();
                while let Some(&next) = chars.peek() {
                    if next.is_alphanumeric() || next == '_' {
                        name.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match instruction.operand(&name) {
                    Some(value) => {
                        out.push_str(&self.format_operand(instr, &name, value));
                    }
                    None => {
                        out.push('$');
                        out.push_str(&name);
                    }
                }
            } else {
                out.push(c);
            }
        }
        out
    }

    fn format_operand(&self, instr: &crate::isa::InstructionDescriptor, name: &str, value: u64) -> String {
        let ty = instr
            .canonical_operands()
            .find(|op| &*op.name == name)
            .map(|op| &*op.ty);
        if let Some(ty) = ty {
            if let Some(names) = self.descriptor.register_classes.get(ty) {
                if let Some(reg) = names.get(value as usize) {
                    return reg.to_string();
                }
            }
        }
        format!("{:#x}", value)
    }
}
