//! Shared fixtures for the worked scenarios: a 32-bit fixed-width
//! hypothetical ISA, big-endian word, bit 0 = MSB.

use std::collections::HashMap;

use isa_gen::isa::{word_from_be_bytes, word_to_be_bytes, IsaConfig, PayloadType};
use isa_gen_derive::OperandPayloads;

#[derive(Debug, Clone, Copy, PartialEq, Eq, OperandPayloads)]
pub enum OperandKind {
    #[payload(name = "GPR", target = "u8")]
    Gpr,
    #[payload(name = "i16imm", target = "u16")]
    Imm16,
}

pub struct BasicIsa;

impl IsaConfig for BasicIsa {
    fn filter_instruction(&self, def: &isa_gen::tablegen::Def) -> bool {
        def.get("Inst").is_some()
    }

    fn operand_payload_types(&self) -> HashMap<String, PayloadType> {
        OperandKind::all()
            .iter()
            .map(|k| (k.payload_name().to_string(), PayloadType::new(k.target_type())))
            .collect()
    }

    fn insn_width_bits(&self) -> u32 {
        32
    }

    fn insn_word_from_bytes(&self, bytes: &[u8]) -> u64 {
        word_from_be_bytes(bytes)
    }

    fn insn_word_to_bytes(&self, word: u64) -> Vec<u8> {
        word_to_be_bytes(word, 4)
    }
}
