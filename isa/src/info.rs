use super::*;
use enumset::EnumSet;

impl Opcode {
    /// Which clause stream this opcode belongs to.
    pub const fn category(self) -> InstCategory {
        use Opcode::*;
        match self {
            Nop | Alu | AluPushBefore | AluPopAfter | AluPop2After | AluElseAfter | AluBreak | AluContinue | Tc
            | Vc | Jump | Else | Push | Pop | LoopStartDx10 | LoopEnd | LoopBreak | LoopContinue | CallFs
            | Return | MemRatCacheless | MemExport | Emit => InstCategory::Cf,
            VtxFetch | TexSample | TexSampleL | TexLd | TexGetResinfo => InstCategory::Tex,
            _ => InstCategory::Alu,
        }
    }

    const fn flag_table(self) -> &'static [InstFlag] {
        use InstFlag::*;
        use Opcode::*;
        match self {
            AluPushBefore | AluPopAfter | AluPop2After | AluElseAfter | Push | Pop => &[ActMask],
            AluBreak | AluContinue => &[ActMask, Branch],
            Jump | Else | LoopStartDx10 | LoopEnd | LoopBreak | LoopContinue => &[ActMask, Branch],
            CallFs | Return => &[Branch],
            MemRatCacheless | MemExport => &[Mem],
            PredSete | PredSetgt | PredSetge | PredSetne => &[PredMask],
            RecipIeee | SqrtIeee => &[Trans],
            LdsIdxOp => &[Lds],
            VtxFetch | TexSample | TexSampleL | TexLd => &[Mem],
            _ => &[],
        }
    }

    /// Static flags of this opcode.
    pub fn flags(self) -> EnumSet<InstFlag> {
        self.flag_table().iter().copied().collect()
    }

    pub fn has_flag(self, flag: InstFlag) -> bool {
        self.flag_table().iter().any(|&f| f == flag)
    }

    /// Control-flow opcodes that hand execution to an ALU clause.
    pub const fn opens_alu_clause(self) -> bool {
        use Opcode::*;
        matches!(self, Alu | AluPushBefore | AluPopAfter | AluPop2After | AluElseAfter | AluBreak | AluContinue)
    }

    /// Control-flow opcodes that hand execution to a fetch clause.
    pub const fn opens_tex_clause(self) -> bool {
        matches!(self, Self::Tc | Self::Vc)
    }
}
