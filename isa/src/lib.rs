//! Instruction model for the wavesim SIMT execution core.
//!
//! This crate is the closed vocabulary shared by the emulator and the
//! (external) decode tables and opcode handlers:
//!
//! - [`Opcode`] - every instruction the core can account for, with static
//!   category and flag tables in [`info`]
//! - [`inst`] - decoded instruction values (`CfInst`, `AluGroup`, `TexInst`)
//! - [`decode`] - the `Decoder` seam consumed by wavefront execution
//! - [`error`] - error types and result handling

pub mod decode;
pub mod error;
pub mod info;
pub mod inst;


pub use decode::Decoder;
pub use error::{Error, Result};
pub use inst::{AluGroup, AluInst, CfInst, Instruction, MAX_ALU_GROUP_SIZE, TexInst};

/// Instruction category, i.e. which clause stream an opcode lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InstCategory {
    /// Control-flow instruction, executed once per wavefront.
    Cf,
    /// Arithmetic instruction, part of an ALU group.
    Alu,
    /// Texture/vertex fetch instruction.
    Tex,
}

/// Clause currently being executed by a wavefront.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ClauseKind {
    /// Control-flow clause. Every wavefront starts and ends here.
    #[default]
    Cf,
    /// ALU clause opened by one of the `ALU*` control-flow instructions.
    Alu,
    /// Texture clause opened by `TC`/`VC`.
    Tex,
}

impl ClauseKind {
    /// Category of the instructions fetched while this clause is active.
    pub const fn category(self) -> InstCategory {
        match self {
            Self::Cf => InstCategory::Cf,
            Self::Alu => InstCategory::Alu,
            Self::Tex => InstCategory::Tex,
        }
    }
}

/// Static instruction property.
#[derive(Debug, Hash, PartialOrd, Ord)]
#[derive(strum::EnumCount, strum::EnumIter, strum::VariantArray)]
#[derive(enumset::EnumSetType)]
#[enumset(repr = "u8")]
pub enum InstFlag {
    /// Accesses global memory.
    Mem,
    /// May update the active mask (and therefore the branch digests).
    ActMask,
    /// Updates the predicate mask.
    PredMask,
    /// Accesses local data share.
    Lds,
    /// Redirects the control-flow cursor.
    Branch,
    /// Only issuable in the transcendental slot.
    Trans,
}

/// Closed opcode enumeration.
///
/// Discriminants are dense, so `opcode as usize` indexes a histogram of
/// `Opcode::COUNT` buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::EnumCount, strum::EnumIter, strum::VariantArray, strum::FromRepr, strum::IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(any(test, feature = "proptest"), derive(proptest_derive::Arbitrary))]
#[repr(u16)]
pub enum Opcode {
    // Control flow
    Nop = 0,
    Alu,
    AluPushBefore,
    AluPopAfter,
    AluPop2After,
    AluElseAfter,
    AluBreak,
    AluContinue,
    Tc,
    Vc,
    Jump,
    Else,
    Push,
    Pop,
    LoopStartDx10,
    LoopEnd,
    LoopBreak,
    LoopContinue,
    CallFs,
    Return,
    MemRatCacheless,
    MemExport,
    Emit,

    // ALU
    Add,
    Mul,
    MulIeee,
    MulAdd,
    Max,
    Min,
    Sete,
    Setgt,
    Setge,
    Setne,
    Fract,
    Trunc,
    Floor,
    Mov,
    Cnde,
    Cndgt,
    Dot4,
    PredSete,
    PredSetgt,
    PredSetge,
    PredSetne,
    AndInt,
    OrInt,
    XorInt,
    NotInt,
    AddInt,
    SubInt,
    MulloInt,
    LshlInt,
    LshrInt,
    AshrInt,
    SeteInt,
    SetgtInt,
    FltToInt,
    IntToFlt,
    RecipIeee,
    SqrtIeee,
    LdsIdxOp,

    // Fetch
    VtxFetch,
    TexSample,
    TexSampleL,
    TexLd,
    TexGetResinfo,
}

impl Opcode {
    /// Mnemonic, e.g. `ALU_PUSH_BEFORE`.
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Histogram bucket of this opcode.
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
