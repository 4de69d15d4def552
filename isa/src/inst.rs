//! Decoded instruction values.
//!
//! Operand fields are carried opaquely: their meaning belongs to the opcode
//! handlers, the core only looks at opcodes, flags and bundle sizes.

use smallvec::SmallVec;
use snafu::ensure;

use crate::error::{AluGroupSizeSnafu, CategoryMismatchSnafu, Result};
use crate::{InstCategory, InstFlag, Opcode};

/// Maximum number of instructions co-issued in one ALU group (x, y, z, w, t).
pub const MAX_ALU_GROUP_SIZE: usize = 5;

/// Control-flow instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CfInst {
    pub opcode: Opcode,
    /// Clause start or branch target, as a byte offset into the instruction buffer.
    pub addr: u32,
    /// Number of ALU slots or fetches in the clause this instruction opens.
    pub count: u16,
    /// Active-mask frames popped by `POP`/`*_POP_AFTER` style instructions.
    pub pop_count: u8,
    /// Loop/constant register selector.
    pub cf_const: u8,
    /// Last instruction of the program.
    pub end_of_program: bool,
}

impl CfInst {
    /// Control-flow instruction with every operand field cleared.
    pub fn new(opcode: Opcode) -> Result<Self> {
        ensure!(opcode.category() == InstCategory::Cf, CategoryMismatchSnafu { opcode, expected: InstCategory::Cf });
        Ok(Self { opcode, addr: 0, count: 0, pop_count: 0, cf_const: 0, end_of_program: false })
    }
}

/// Single ALU instruction of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AluInst {
    pub opcode: Opcode,
    pub dst: u16,
    pub src: [u16; 3],
    /// Result is written back (as opposed to only feeding `PV`/`PS`).
    pub write: bool,
}

impl AluInst {
    pub fn new(opcode: Opcode) -> Result<Self> {
        ensure!(opcode.category() == InstCategory::Alu, CategoryMismatchSnafu { opcode, expected: InstCategory::Alu });
        Ok(Self { opcode, dst: 0, src: [0; 3], write: true })
    }

    /// Accesses the local data share.
    pub fn is_local_mem(&self) -> bool {
        self.opcode.has_flag(InstFlag::Lds)
    }
}

/// Bundle of 1..=5 ALU instructions fetched together.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AluGroup {
    id: u64,
    insts: SmallVec<[AluInst; MAX_ALU_GROUP_SIZE]>,
}

impl AluGroup {
    /// Build a group, rejecting empty and oversized bundles.
    pub fn new(id: u64, insts: impl IntoIterator<Item = AluInst>) -> Result<Self> {
        let insts: SmallVec<[AluInst; MAX_ALU_GROUP_SIZE]> = insts.into_iter().collect();
        ensure!(
            (1..=MAX_ALU_GROUP_SIZE).contains(&insts.len()),
            AluGroupSizeSnafu { count: insts.len(), max: MAX_ALU_GROUP_SIZE }
        );
        Ok(Self { id, insts })
    }

    /// Index of this group within the ALU clause stream.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn len(&self) -> usize {
        self.insts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    pub fn insts(&self) -> &[AluInst] {
        &self.insts
    }

    pub fn iter(&self) -> impl Iterator<Item = &AluInst> {
        self.insts.iter()
    }
}

/// Texture/vertex fetch instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TexInst {
    pub opcode: Opcode,
    pub resource_id: u8,
    pub src_gpr: u16,
    pub dst_gpr: u16,
}

impl TexInst {
    pub fn new(opcode: Opcode) -> Result<Self> {
        ensure!(opcode.category() == InstCategory::Tex, CategoryMismatchSnafu { opcode, expected: InstCategory::Tex });
        Ok(Self { opcode, resource_id: 0, src_gpr: 0, dst_gpr: 0 })
    }
}

/// Any decoded instruction, as handed to an opcode handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    Cf(CfInst),
    Alu(AluInst),
    Tex(TexInst),
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Cf(inst) => inst.opcode,
            Self::Alu(inst) => inst.opcode,
            Self::Tex(inst) => inst.opcode,
        }
    }

    pub fn category(&self) -> InstCategory {
        match self {
            Self::Cf(_) => InstCategory::Cf,
            Self::Alu(_) => InstCategory::Alu,
            Self::Tex(_) => InstCategory::Tex,
        }
    }
}

impl From<CfInst> for Instruction {
    fn from(inst: CfInst) -> Self {
        Self::Cf(inst)
    }
}

impl From<AluInst> for Instruction {
    fn from(inst: AluInst) -> Self {
        Self::Alu(inst)
    }
}

impl From<TexInst> for Instruction {
    fn from(inst: TexInst) -> Self {
        Self::Tex(inst)
    }
}
