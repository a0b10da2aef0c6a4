//! The ISA filter: lowers a parsed [`Records`] AST into an [`IsaDescriptor`]
//! per an `IsaConfig`.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use tracing::warn;

use crate::bits::{Bit, OperandChunk};
use crate::error::DescriptorError;
use crate::tablegen::{BitVecElem, Def, Expr, Records, Value};

use super::descriptor::{InstructionDescriptor, IsaDescriptor, OperandDescriptor};

/// A payload type's decode/encode adapters.
///
/// Wrapper hooks are constrained to pure bijective adapters:
/// `decode_wrap` and `encode_unwrap` must compose to identity on the
/// instruction's operand width, or decode-then-encode stops round-tripping
/// an instruction back to its original bytes.
#[derive(Clone, Copy)]
pub struct PayloadType {
    pub target_type: &'static str,
    pub decode_wrap: Option<fn(u64) -> u64>,
    pub encode_unwrap: Option<fn(u64) -> u64>,
}

impl PayloadType {
    pub fn new(target_type: &'static str) -> Self {
        PayloadType {
            target_type,
            decode_wrap: None,
            encode_unwrap: None,
        }
    }

    pub fn with_wrappers(
        target_type: &'static str,
        decode_wrap: fn(u64) -> u64,
        encode_unwrap: fn(u64) -> u64,
    ) -> Self {
        PayloadType {
            target_type,
            decode_wrap: Some(decode_wrap),
            encode_unwrap: Some(encode_unwrap),
        }
    }

    pub fn decode(&self, raw: u64) -> u64 {
        self.decode_wrap.map_or(raw, |f| f(raw))
    }

    pub fn encode(&self, value: u64) -> u64 {
        self.encode_unwrap.map_or(value, |f| f(value))
    }
}

/// The configuration surface a caller implements for their own
/// architecture: the data specific to one ISA, kept separate from the
/// filter/trie/bit-engine code that consumes it.
pub trait IsaConfig {
    /// Selects which defs represent real instructions for this
    /// architecture.
    fn filter_instruction(&self, def: &Def) -> bool;

    /// Whether a selected def is a pseudo-instruction: present for
    /// assembler convenience but with no direct encoding, filtered out of
    /// the decoder tables.
    fn is_pseudo(&self, def: &Def) -> bool {
        def.get("isPseudo")
            .and_then(|v| match v {
                Value::Bit(b) => Some(*b),
                Value::Int(n) => Some(*n != 0),
                _ => None,
            })
            .unwrap_or(false)
    }

    /// Maps each operand-type name to its decoder/encoder adapter.
    fn operand_payload_types(&self) -> HashMap<String, PayloadType>;

    /// The fixed instruction width, in bits.
    fn insn_width_bits(&self) -> u32;

    /// Converts a byte sequence (of length `insn_width_bits() / 8`) into an
    /// instruction word.
    fn insn_word_from_bytes(&self, bytes: &[u8]) -> u64;

    /// Converts an instruction word back into its byte sequence.
    fn insn_word_to_bytes(&self, word: u64) -> Vec<u8>;

    /// The per-architecture bit permutation applied to the raw `Inst`
    /// pattern to produce the byte-trie's `mask`. `permutation[i]` is the
    /// final bit position that raw bit `i` is moved to. Defaults to the
    /// identity permutation: most ISAs need no remapping beyond the
    /// byte-level endian adapters above.
    fn endian_permutation(&self, width_bits: u32) -> Vec<u32> {
        (0..width_bits).collect()
    }

    fn namespace(&self) -> &str {
        "default"
    }

    fn decoder_namespace(&self) -> &str {
        "default"
    }
}

/// Big-endian byte/word adapters for [`IsaConfig`] implementors whose
/// architecture stores the instruction word MSB-byte-first, with no
/// unusual bit permutation of its own. Most fixed-width big-endian ISAs
/// can implement `insn_word_from_bytes`/`insn_word_to_bytes` as thin calls
/// into these.
pub fn word_from_be_bytes(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf[8 - bytes.len()..].copy_from_slice(bytes);
    BigEndian::read_u64(&buf)
}

pub fn word_to_be_bytes(word: u64, width_bytes: usize) -> Vec<u8> {
    let mut buf = [0u8; 8];
    BigEndian::write_u64(&mut buf, word);
    buf[8 - width_bytes..].to_vec()
}

/// Little-endian counterparts of [`word_from_be_bytes`]/[`word_to_be_bytes`].
pub fn word_from_le_bytes(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    LittleEndian::read_u64(&buf)
}

pub fn word_to_le_bytes(word: u64, width_bytes: usize) -> Vec<u8> {
    let mut buf = [0u8; 8];
    LittleEndian::write_u64(&mut buf, word);
    buf[..width_bytes].to_vec()
}

/// Resolves a `FieldBit`/`FieldVar` reference against the def's own
/// sibling declarations, returning the fixed bit a non-operand sibling
/// default already carries (a `bits<N>`/`bit`/`int` field with a literal
/// value) rather than the placeholder it would get if treated as an
/// operand bit.
///
/// Bare `FieldVar(name)` is resolved against bit index 0 of the sibling;
/// wider scalar defaults referenced this way have no defined semantics
/// here and fall through to [`Bit::Any`].
fn resolve_sibling_bit(def: &Def, name: &str, idx: u64) -> Option<Bit> {
    let decl = def.get_decl(name)?;
    match &decl.value {
        Value::BitVector(bits) => match bits.get(idx as usize)? {
            BitVecElem::Zero => Some(Bit::Zero),
            BitVecElem::One => Some(Bit::One),
            _ => None,
        },
        Value::Bit(b) if idx == 0 => Some(if *b { Bit::One } else { Bit::Zero }),
        Value::Int(n) => Some(if (n >> idx) & 1 != 0 { Bit::One } else { Bit::Zero }),
        _ => None,
    }
}

/// Resolves one `Inst` bit-vector element to a fixed/don't-care [`Bit`].
///
/// `FieldBit(name, idx)`/`FieldVar(name)` referencing an actual operand
/// name (declared in `OutOperandList`/`InOperandList`) are always
/// don't-care: that bit genuinely varies with the operand's value.
/// Referencing anything else — a sibling declaration with its own fixed
/// default — resolves to that sibling's already-known bit instead of
/// being treated as an operand placeholder.
fn bit_from_elem(elem: &BitVecElem, def: &Def, operand_names: &HashSet<&str>) -> Bit {
    match elem {
        BitVecElem::Zero => Bit::Zero,
        BitVecElem::One => Bit::One,
        BitVecElem::Unset => Bit::Any,
        BitVecElem::FieldBit(name, idx) => {
            if operand_names.contains(&**name) {
                Bit::Any
            } else {
                resolve_sibling_bit(def, name, *idx).unwrap_or(Bit::Any)
            }
        }
        BitVecElem::FieldVar(name) => {
            if operand_names.contains(&**name) {
                Bit::Any
            } else {
                resolve_sibling_bit(def, name, 0).unwrap_or(Bit::Any)
            }
        }
    }
}

/// One contiguous run of `FieldBit(name, idx)` entries for the same
/// operand, in raw (pre-permutation) instruction-bit coordinates.
struct RawRun {
    start: u32,
    len: u32,
    /// The lowest operand-bit index covered by the run (see below).
    low_idx: u64,
}

/// Scans `raw_bits` for runs belonging to `operand_name` and coalesces
/// them into [`OperandChunk`]s.
///
/// Bit indices run MSB-first across the instruction word but LSB-first
/// across an operand value: within one physically contiguous run of
/// instruction bits, the operand-bit index *decreases* by one as the
/// instruction-bit index increases by one, because the leftmost
/// (most-significant) instruction bit of a field always carries the
/// field's most-significant operand bit. A run therefore coalesces while
/// consecutive `FieldBit` indices descend by exactly one; it breaks as
/// soon as that fails.
fn runs_for_operand(raw_bits: &[BitVecElem], operand_name: &str) -> Vec<RawRun> {
    let mut runs = Vec::new();
    let mut current: Option<(u32, u32, u64)> = None; // (start, len, prev_idx)

    let mut close = |current: &mut Option<(u32, u32, u64)>, runs: &mut Vec<RawRun>| {
        if let Some((start, len, prev)) = current.take() {
            runs.push(RawRun {
                start,
                len,
                low_idx: prev,
            });
        }
    };

    for (i, elem) in raw_bits.iter().enumerate() {
        let idx = match elem {
            BitVecElem::FieldBit(name, idx) if &**name == operand_name => Some(*idx),
            _ => None,
        };
        match idx {
            Some(idx) => match &mut current {
                Some((_start, len, prev)) if *prev == idx + 1 => {
                    *len += 1;
                    *prev = idx;
                }
                _ => {
                    close(&mut current, &mut runs);
                    current = Some((i as u32, 1, idx));
                }
            },
            None => close(&mut current, &mut runs),
        }
    }
    close(&mut current, &mut runs);
    runs
}

/// Finds pairs of distinct operands whose chunks claim the same
/// instruction bit, by name, for diagnostic reporting.
fn overlapping_operand_pairs<'a>(
    outputs: &'a [OperandDescriptor],
    inputs: &'a [OperandDescriptor],
) -> Vec<(&'a str, &'a str)> {
    let all = outputs.iter().chain(inputs.iter());
    let operands: Vec<&OperandDescriptor> = all.collect();
    let mut pairs = Vec::new();
    for i in 0..operands.len() {
        for j in (i + 1)..operands.len() {
            let a = operands[i];
            let b = operands[j];
            if a.name == b.name {
                continue;
            }
            let overlaps = a.chunks.iter().any(|ca| {
                b.chunks
                    .iter()
                    .any(|cb| ranges_overlap(ca.instr_range(), cb.instr_range()))
            });
            if overlaps {
                pairs.push((&*a.name, &*b.name));
            }
        }
    }
    pairs
}

fn ranges_overlap(a: std::ops::Range<u32>, b: std::ops::Range<u32>) -> bool {
    a.start < b.end && b.start < a.end
}

fn operand_type_name(value: &Value) -> Option<&str> {
    match value {
        Value::Expr(Expr::Ref(name)) => Some(name),
        Value::Expr(Expr::Call(name, _, _)) => Some(name),
        _ => None,
    }
}

/// Parses an `OutOperandList`/`InOperandList` dag into ordered `(name,
/// type)` pairs, in source order.
fn operand_list(def: &Def, field: &str) -> Vec<(Rc<str>, Rc<str>)> {
    let Some(dag) = def.get(field).and_then(Value::as_dag) else {
        return Vec::new();
    };
    dag.args
        .iter()
        .filter_map(|arg| {
            let name = arg.name.clone()?;
            let ty = operand_type_name(&arg.value).unwrap_or("unknown");
            Some((name, Rc::from(ty)))
        })
        .collect()
}

fn permute_bits(raw: &[Bit], permutation: &[u32]) -> Vec<Bit> {
    let mut out = vec![Bit::Any; raw.len()];
    for (i, b) in raw.iter().enumerate() {
        out[permutation[i] as usize] = *b;
    }
    out
}

/// Runs the ISA filter over `records`, producing an [`IsaDescriptor`].
///
/// Operand-mapping failures for an individual instruction are recorded in
/// [`IsaDescriptor::errors`] rather than aborting the whole pass.
pub fn build_descriptor(records: &Records, config: &impl IsaConfig) -> IsaDescriptor {
    let width_bits = config.insn_width_bits();
    let permutation = config.endian_permutation(width_bits);
    let mut instructions = Vec::new();
    let mut errors = Vec::new();
    let mut operand_types: Vec<Rc<str>> = Vec::new();
    let mut operand_types_seen = HashSet::new();
    let mut register_classes: HashMap<Rc<str>, Vec<Rc<str>>> = HashMap::new();

    for def in &records.defs {
        if !config.filter_instruction(def) {
            continue;
        }

        let raw_elems = match def.get("Inst").and_then(Value::as_bit_vector) {
            Some(v) if v.len() as u32 == width_bits => v,
            _ => {
                errors.push(DescriptorError {
                    mnemonic: def.name.to_string(),
                    operand: "Inst".to_string(),
                    reason: format!(
                        "missing or mis-sized Inst field (expected {} bits)",
                        width_bits
                    ),
                });
                warn!(mnemonic = %def.name, "skipping instruction with unusable Inst field");
                continue;
            }
        };

        let outputs = operand_list(def, "OutOperandList");
        let inputs = operand_list(def, "InOperandList");
        let operand_names: HashSet<&str> = outputs
            .iter()
            .chain(inputs.iter())
            .map(|(name, _)| &**name)
            .collect();

        let raw_mask: Vec<Bit> = raw_elems
            .iter()
            .map(|elem| bit_from_elem(elem, def, &operand_names))
            .collect();
        let mask = permute_bits(&raw_mask, &permutation);

        let asm_string = def
            .get("AsmString")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut build_operand = |name: Rc<str>, ty: Rc<str>| -> OperandDescriptor {
            if operand_types_seen.insert(ty.clone()) {
                operand_types.push(ty.clone());
            }
            let runs = runs_for_operand(raw_elems, &name);
            if runs.is_empty() {
                errors.push(DescriptorError {
                    mnemonic: def.name.to_string(),
                    operand: name.to_string(),
                    reason: "no FieldBit references found for operand".to_string(),
                });
                warn!(mnemonic = %def.name, operand = %name, "unable to recover operand chunks");
            }
            let chunks = runs
                .iter()
                .map(|run| {
                    let op_bit = run.low_idx as u32;
                    OperandChunk::new(permutation[run.start as usize], op_bit, run.len)
                })
                .collect::<Vec<_>>();
            OperandDescriptor { name, chunks, ty }
        };

        let output_ops: Vec<OperandDescriptor> = outputs
            .into_iter()
            .map(|(name, ty)| build_operand(name, ty))
            .collect();
        let input_ops: Vec<OperandDescriptor> = inputs
            .into_iter()
            .map(|(name, ty)| build_operand(name, ty))
            .collect();

        for (a, b) in overlapping_operand_pairs(&output_ops, &input_ops) {
            errors.push(DescriptorError {
                mnemonic: def.name.to_string(),
                operand: format!("{}/{}", a, b),
                reason: "operands claim overlapping instruction bits".to_string(),
            });
            warn!(mnemonic = %def.name, a, b, "rejecting overlapping operand chunks");
        }

        instructions.push(InstructionDescriptor {
            mask,
            raw_mask,
            mnemonic: def.name.clone(),
            input_ops,
            output_ops,
            namespace: Rc::from(config.namespace()),
            decoder_namespace: Rc::from(config.decoder_namespace()),
            asm_string: Rc::from(asm_string.as_str()),
            is_pseudo: config.is_pseudo(def),
        });
    }

    let mut registers = Vec::new();
    for def in &records.defs {
        if config.filter_instruction(def) {
            continue;
        }
        registers.push(def.name.clone());
    }
    for ty in &operand_types {
        let members: Vec<Rc<str>> = registers
            .iter()
            .filter(|_| records.class(ty).is_some())
            .cloned()
            .collect();
        if !members.is_empty() {
            register_classes.insert(ty.clone(), members);
        }
    }

    IsaDescriptor {
        instructions,
        register_classes,
        registers,
        operands: operand_types,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tablegen::parse_tablegen;

    struct Fixed32;

    impl IsaConfig for Fixed32 {
        fn filter_instruction(&self, def: &Def) -> bool {
            def.get("Inst").is_some()
        }

        fn operand_payload_types(&self) -> HashMap<String, PayloadType> {
            HashMap::new()
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

    #[test]
    fn overlapping_operand_chunks_are_rejected_as_descriptor_errors() {
        let text = r#"
------------- Classes -----------------

class Instruction<bits<8> opc> {
    bits<32> Inst;
    string AsmString;
    dag OutOperandList;
    dag InOperandList;
    bit isPseudo = 0;
}

------------- Defs -----------------

def BAD {
    bits<32> Inst = { 1, 1, 1, 1, rD{3}, rD{2}, rS{1}, rS{0}, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0 };
    string AsmString = "bad $rD, $rS";
    dag OutOperandList = (outs GPR:$rD);
    dag InOperandList = (ins GPR:$rS);
    bit isPseudo = 0;
}
"#;
        let records = parse_tablegen(text).unwrap();
        let descriptor = build_descriptor(&records, &Fixed32);
        assert!(descriptor
            .errors
            .iter()
            .any(|e| e.mnemonic == "BAD" && e.reason.contains("overlapping")));
    }

    #[test]
    fn sibling_declaration_reference_resolves_to_its_fixed_bits() {
        // `subOp` is a sibling field, not an operand: its own literal bits
        // should be resolved rather than treated as a don't-care operand.
        let text = r#"
------------- Classes -----------------

class Instruction<bits<8> opc> {
    bits<32> Inst;
    string AsmString;
    dag OutOperandList;
    dag InOperandList;
    bit isPseudo = 0;
}

------------- Defs -----------------

def WITHSUB {
    bits<4> subOp = { 1, 0, 1, 1 };
    bits<32> Inst = { 1, 1, 1, 1, subOp{3}, subOp{2}, subOp{1}, subOp{0}, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0 };
    string AsmString = "withsub";
    dag OutOperandList = (outs);
    dag InOperandList = (ins);
    bit isPseudo = 0;
}
"#;
        let records = parse_tablegen(text).unwrap();
        let descriptor = build_descriptor(&records, &Fixed32);
        let instr = descriptor
            .instructions
            .iter()
            .find(|i| &*i.mnemonic == "WITHSUB")
            .unwrap();
        assert_eq!(
            &instr.raw_mask[4..8],
            &[Bit::One, Bit::Zero, Bit::One, Bit::One]
        );
    }

    #[test]
    fn non_overlapping_split_operand_is_not_flagged() {
        let text = r#"
------------- Classes -----------------

class Instruction<bits<8> opc> {
    bits<32> Inst;
    string AsmString;
    dag OutOperandList;
    dag InOperandList;
    bit isPseudo = 0;
}

------------- Defs -----------------

def OK {
    bits<32> Inst = { 1, 1, 1, 1, rD{2}, rD{1}, rD{0}, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, rD{4}, rD{3}, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0 };
    string AsmString = "ok $rD";
    dag OutOperandList = (outs GPR:$rD);
    dag InOperandList = (ins);
    bit isPseudo = 0;
}
"#;
        let records = parse_tablegen(text).unwrap();
        let descriptor = build_descriptor(&records, &Fixed32);
        assert!(descriptor.errors.is_empty());
    }
}
