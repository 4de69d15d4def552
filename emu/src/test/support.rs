//! Scripted decoder/handler pair standing in for real ISA tables.
//!
//! Every instruction occupies one 8-byte slot of four little-endian `u16`
//! words, the first being the opcode:
//!
//! | kind | word 1     | word 2 | word 3                                 |
//! |------|------------|--------|----------------------------------------|
//! | CF   | addr       | count  | pop count (bits 0-7), end of program (bit 15) |
//! | ALU  | dst        | src 0  | last in group (bit 0), write (bit 1)   |
//! | TEX  | resource   | src    | dst                                    |

use snafu::{OptionExt, ensure};
use wavesim_isa::error::{OutOfBoundsSnafu, UnknownOpcodeSnafu};
use wavesim_isa::{AluGroup, AluInst, CfInst, ClauseKind, Decoder, Instruction, MAX_ALU_GROUP_SIZE, Opcode, TexInst};

use crate::error::HandlerSnafu;
use crate::{EmuConfig, Emulator, ExecContext, LaneMask, NdRangeId, OpcodeHandler, Result};

pub const SLOT: usize = 8;

const END_OF_PROGRAM: u16 = 1 << 15;
const LAST_IN_GROUP: u16 = 1;
const WRITE: u16 = 1 << 1;

fn read_slot(buf: &[u8], cursor: usize) -> wavesim_isa::Result<(Opcode, [u16; 3])> {
    ensure!(cursor + SLOT <= buf.len(), OutOfBoundsSnafu { cursor, width: SLOT, size: buf.len() });
    let word = |i: usize| u16::from_le_bytes([buf[cursor + 2 * i], buf[cursor + 2 * i + 1]]);
    let raw = word(0);
    let opcode = Opcode::from_repr(raw).context(UnknownOpcodeSnafu { raw: raw as u32, cursor })?;
    Ok((opcode, [word(1), word(2), word(3)]))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SlotDecoder;

impl Decoder for SlotDecoder {
    fn decode_cf(&self, buf: &[u8], cursor: usize) -> wavesim_isa::Result<(CfInst, Option<usize>)> {
        let (opcode, [addr, count, bits]) = read_slot(buf, cursor)?;
        let inst = CfInst {
            addr: addr as u32,
            count,
            pop_count: (bits & 0xff) as u8,
            end_of_program: bits & END_OF_PROGRAM != 0,
            ..CfInst::new(opcode)?
        };
        let next = (!inst.end_of_program).then_some(cursor + SLOT);
        Ok((inst, next))
    }

    fn decode_alu_group(&self, buf: &[u8], cursor: usize, group_index: u64) -> wavesim_isa::Result<(AluGroup, usize)> {
        let mut insts = Vec::new();
        let mut cursor = cursor;
        loop {
            let (opcode, [dst, src, bits]) = read_slot(buf, cursor)?;
            insts.push(AluInst { dst, src: [src, 0, 0], write: bits & WRITE != 0, ..AluInst::new(opcode)? });
            cursor += SLOT;
            if bits & LAST_IN_GROUP != 0 || insts.len() > MAX_ALU_GROUP_SIZE {
                break;
            }
        }
        Ok((AluGroup::new(group_index, insts)?, cursor))
    }

    fn decode_tex(&self, buf: &[u8], cursor: usize) -> wavesim_isa::Result<(TexInst, usize)> {
        let (opcode, [resource, src, dst]) = read_slot(buf, cursor)?;
        let inst = TexInst { resource_id: resource as u8, src_gpr: src, dst_gpr: dst, ..TexInst::new(opcode)? };
        Ok((inst, cursor + SLOT))
    }
}

/// Assembler for the slot encoding.
#[derive(Debug, Default)]
pub struct Asm {
    buf: Vec<u8>,
}

impl Asm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset of the next slot.
    pub fn pos(&self) -> usize {
        self.buf.len()
    }

    fn slot(&mut self, opcode: Opcode, words: [u16; 3]) -> usize {
        let at = self.pos();
        self.buf.extend_from_slice(&(opcode as u16).to_le_bytes());
        for word in words {
            self.buf.extend_from_slice(&word.to_le_bytes());
        }
        at
    }

    /// CF instruction referring to a clause of `count` slots at `addr`.
    pub fn cf(&mut self, opcode: Opcode, addr: usize, count: usize) -> usize {
        self.slot(opcode, [addr as u16, count as u16, 0])
    }

    pub fn cf_pop(&mut self, opcode: Opcode, pop_count: u8) -> usize {
        self.slot(opcode, [0, 0, pop_count as u16])
    }

    /// CF instruction that also ends the program.
    pub fn cf_end(&mut self, opcode: Opcode, pop_count: u8) -> usize {
        self.slot(opcode, [0, 0, pop_count as u16 | END_OF_PROGRAM])
    }

    /// Point the CF instruction at `at` to `addr`.
    pub fn set_addr(&mut self, at: usize, addr: usize) {
        self.buf[at + 2..at + 4].copy_from_slice(&(addr as u16).to_le_bytes());
    }

    /// ALU group of `(opcode, src0)` pairs.
    pub fn alu_group(&mut self, insts: &[(Opcode, u16)]) -> usize {
        let at = self.pos();
        for (i, &(opcode, src)) in insts.iter().enumerate() {
            let last = if i + 1 == insts.len() { LAST_IN_GROUP } else { 0 };
            self.slot(opcode, [i as u16, src, last | WRITE]);
        }
        at
    }

    pub fn tex(&mut self, opcode: Opcode) -> usize {
        self.slot(opcode, [0, 0, 0])
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// What the scripted handler observed, in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Cf(Opcode),
    Alu { opcode: Opcode, lane: usize },
    Commit { lane: usize },
    Tex { opcode: Opcode, lane: usize },
    AluClauseEnd,
    TexClauseEnd,
}

/// Handler with just enough control-flow semantics to drive divergence.
///
/// `PRED_SETNE` with `src0 = n` disables lane `n` in the current mask;
/// `PRED_SETGT` with `src0 = n` keeps only lanes above `n`.
#[derive(Debug, Default)]
pub struct ScriptHandler {
    pub events: Vec<Event>,
    /// Fail as soon as this opcode executes.
    pub fail_on: Option<Opcode>,
    pop_after_clause: usize,
}

impl ScriptHandler {
    pub fn new() -> Self {
        Self::default()
    }

    fn cf(&mut self, inst: &CfInst, ctx: &mut ExecContext<'_>) -> Result<()> {
        let wavefront = &mut *ctx.wavefront;
        let start = inst.addr as usize;
        let end = start + inst.count as usize * SLOT;
        match inst.opcode {
            Opcode::Alu => wavefront.start_clause(ClauseKind::Alu, start, end)?,
            Opcode::AluPushBefore => {
                wavefront.push()?;
                wavefront.start_clause(ClauseKind::Alu, start, end)?;
            }
            Opcode::AluPopAfter | Opcode::AluPop2After => {
                self.pop_after_clause = if inst.opcode == Opcode::AluPopAfter { 1 } else { 2 };
                wavefront.start_clause(ClauseKind::Alu, start, end)?;
            }
            Opcode::Tc | Opcode::Vc => wavefront.start_clause(ClauseKind::Tex, start, end)?,
            Opcode::Push => wavefront.push()?,
            Opcode::Pop => wavefront.pop(inst.pop_count as usize)?,
            Opcode::Else => {
                let width = wavefront.work_item_count();
                let top = wavefront.stack_top();
                let parent = match top {
                    0 => LaneMask::full(width),
                    _ => wavefront.stack().frame(top - 1).cloned().unwrap_or_else(|| LaneMask::full(width)),
                };
                let current = wavefront.active_mask().clone();
                for lane in 0..width {
                    wavefront.set_active(lane, parent.get(lane) && !current.get(lane));
                }
            }
            Opcode::Jump => wavefront.jump_cf(start),
            Opcode::Return => wavefront.end_program(),
            Opcode::MemExport | Opcode::MemRatCacheless => wavefront.flags_mut().global_mem_write = true,
            _ => {}
        }
        Ok(())
    }

    fn alu(&mut self, inst: &AluInst, ctx: &mut ExecContext<'_>) -> Result<()> {
        let lane = ctx.work_item.as_ref().map_or(0, |item| item.id - ctx.wavefront.work_item_id_first());
        self.events.push(Event::Alu { opcode: inst.opcode, lane });

        let threshold = inst.src[0] as usize;
        let enable = match inst.opcode {
            Opcode::PredSetne => Some(lane != threshold),
            Opcode::PredSetgt => Some(lane > threshold),
            _ => None,
        };
        if let Some(enable) = enable {
            ctx.wavefront.set_pred(lane, enable);
            ctx.wavefront.set_active(lane, enable);
        }
        if inst.is_local_mem() {
            ctx.wavefront.flags_mut().local_mem_write = true;
        }
        Ok(())
    }
}

impl OpcodeHandler for ScriptHandler {
    fn execute(&mut self, inst: &Instruction, ctx: &mut ExecContext<'_>) -> Result<()> {
        let opcode = inst.opcode();
        ensure!(self.fail_on != Some(opcode), HandlerSnafu { opcode, reason: "scripted failure" });

        match inst {
            Instruction::Cf(cf) => {
                self.events.push(Event::Cf(opcode));
                self.cf(cf, ctx)
            }
            Instruction::Alu(alu) => self.alu(alu, ctx),
            Instruction::Tex(tex) => {
                let lane = ctx.work_item.as_ref().map_or(0, |item| item.id - ctx.wavefront.work_item_id_first());
                self.events.push(Event::Tex { opcode: tex.opcode, lane });
                ctx.wavefront.flags_mut().global_mem_read = true;
                Ok(())
            }
        }
    }

    fn commit_writes(&mut self, ctx: &mut ExecContext<'_>) -> Result<()> {
        let lane = ctx.work_item.as_ref().map_or(0, |item| item.id - ctx.wavefront.work_item_id_first());
        self.events.push(Event::Commit { lane });
        Ok(())
    }

    fn alu_clause_end(&mut self, ctx: &mut ExecContext<'_>) -> Result<()> {
        self.events.push(Event::AluClauseEnd);
        let count = std::mem::take(&mut self.pop_after_clause);
        ctx.wavefront.pop(count)
    }

    fn tex_clause_end(&mut self, _ctx: &mut ExecContext<'_>) -> Result<()> {
        self.events.push(Event::TexClauseEnd);
        Ok(())
    }
}

/// Emulator with the given wavefront size and one ND-Range laid out and bound to `program`.
pub fn emulator_with(
    wavefront_size: usize,
    global_size: [u32; 3],
    local_size: [u32; 3],
    work_dim: u32,
    program: &[u8],
) -> (Emulator, NdRangeId) {
    let config = EmuConfig::builder().wavefront_size(wavefront_size).max_stack_size(4).build();
    let mut emu = Emulator::new(config).unwrap();
    let id = emu.create_ndrange("kernel");
    let ndrange = emu.ndrange_mut(id).unwrap();
    ndrange.setup_size(global_size, local_size, work_dim).unwrap();
    ndrange.setup_instruction_memory(program, 0).unwrap();
    (emu, id)
}

/// Single-CF-instruction program that ends immediately.
pub fn return_program() -> Vec<u8> {
    let mut asm = Asm::new();
    asm.cf_end(Opcode::Nop, 0);
    asm.finish()
}
