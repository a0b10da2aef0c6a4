//! The ISA filter stage: lowers a parsed `Records` AST into the canonical
//! [`IsaDescriptor`] intermediate, per a caller-supplied [`IsaConfig`].

mod descriptor;
mod filter;

pub use descriptor::{InstructionDescriptor, IsaDescriptor, OperandDescriptor};
pub use filter::{
    build_descriptor, word_from_be_bytes, word_from_le_bytes, word_to_be_bytes, word_to_le_bytes,
    IsaConfig, PayloadType,
};
