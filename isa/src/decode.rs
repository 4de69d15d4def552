//! Decoder seam.

use crate::Result;
use crate::inst::{AluGroup, CfInst, TexInst};

/// Instruction decoder for one ISA encoding.
///
/// The decode tables live outside the execution core. A wavefront only
/// knows byte cursors into its ND-Range's instruction buffer and hands them
/// to these entry points, which return the decoded value together with the
/// cursor of the following instruction.
pub trait Decoder {
    /// Decode the control-flow instruction at `cursor`.
    ///
    /// Returns `None` as the next cursor when the decoded instruction ends
    /// the program; the wavefront treats that as CF stream exhaustion.
    fn decode_cf(&self, buf: &[u8], cursor: usize) -> Result<(CfInst, Option<usize>)>;

    /// Decode the ALU group at `cursor`. `group_index` is the number of
    /// groups the wavefront has already decoded.
    fn decode_alu_group(&self, buf: &[u8], cursor: usize, group_index: u64) -> Result<(AluGroup, usize)>;

    /// Decode the fetch instruction at `cursor`.
    fn decode_tex(&self, buf: &[u8], cursor: usize) -> Result<(TexInst, usize)>;
}

impl<D: Decoder + ?Sized> Decoder for &D {
    fn decode_cf(&self, buf: &[u8], cursor: usize) -> Result<(CfInst, Option<usize>)> {
        (**self).decode_cf(buf, cursor)
    }

    fn decode_alu_group(&self, buf: &[u8], cursor: usize, group_index: u64) -> Result<(AluGroup, usize)> {
        (**self).decode_alu_group(buf, cursor, group_index)
    }

    fn decode_tex(&self, buf: &[u8], cursor: usize) -> Result<(TexInst, usize)> {
        (**self).decode_tex(buf, cursor)
    }
}
