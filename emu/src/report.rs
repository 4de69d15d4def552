//! Line-oriented `Key = value` reports.
//!
//! Every section starts with a `[ ... ]` header followed by a blank line.
//! Sections nest: an ND-Range dump contains its work-groups, a work-group
//! dump contains its wavefronts.

use std::fmt::{self, Write};

use strum::VariantArray;
use wavesim_isa::Opcode;

use crate::divergence::DivergenceReport;
use crate::emulator::Emulator;
use crate::ndrange::NdRange;
use crate::wavefront::Wavefront;
use crate::work_group::WorkGroup;

impl Emulator {
    /// Emulator summary followed by every live ND-Range.
    pub fn dump(&self, f: &mut dyn Write) -> fmt::Result {
        f.write_str("[ Emulator ]\n\n")?;
        writeln!(f, "NDRangeCount = {}", self.ndrange_count())?;
        writeln!(f, "Instructions = {}", self.inst_count())?;
        writeln!(f, "Time = {:.6}", self.timer().elapsed().as_secs_f64())?;
        f.write_str("\n")?;

        for ndrange in self.ndranges() {
            ndrange.dump(f)?;
        }
        Ok(())
    }
}

impl NdRange {
    pub fn dump(&self, f: &mut dyn Write) -> fmt::Result {
        writeln!(f, "[ NDRange[{}] ]\n", self.id())?;
        writeln!(f, "Name = {}", self.name())?;

        let (groups, wavefronts, items) = (self.work_groups().len(), self.wavefronts().len(), self.work_items().len());
        dump_range(f, "WorkGroup", groups)?;
        dump_range(f, "WaveFront", wavefronts)?;
        dump_range(f, "WorkItem", items)?;
        f.write_str("\n")?;

        for work_group in self.work_groups() {
            work_group.dump(self, f)?;
        }
        Ok(())
    }

    /// One `<OPCODE> = <count>` line per executed opcode.
    pub fn dump_histogram(&self, f: &mut dyn Write) -> fmt::Result {
        let Some(histogram) = self.histogram() else {
            return Ok(());
        };
        writeln!(f, "[ NDRange[{}].InstHistogram ]\n", self.id())?;
        for opcode in Opcode::VARIANTS {
            let count = histogram[opcode.index()];
            if count > 0 {
                writeln!(f, "{opcode} = {count}")?;
            }
        }
        f.write_str("\n")
    }
}

impl WorkGroup {
    /// Dump this work-group and its wavefronts; `ndrange` must own it.
    pub fn dump(&self, ndrange: &NdRange, f: &mut dyn Write) -> fmt::Result {
        writeln!(f, "[ NDRange[{}].WorkGroup[{}] ]\n", ndrange.id(), self.id())?;
        writeln!(f, "Name = {}", self.name())?;
        writeln!(f, "WaveFrontFirst = {}", self.wavefront_id_first())?;
        writeln!(f, "WaveFrontLast = {}", self.wavefront_id_last())?;
        writeln!(f, "WaveFrontCount = {}", self.wavefront_count())?;
        writeln!(f, "WorkItemFirst = {}", self.work_item_id_first())?;
        writeln!(f, "WorkItemLast = {}", self.work_item_id_last())?;
        writeln!(f, "WorkItemCount = {}", self.work_item_count())?;
        f.write_str("\n")?;

        for wavefront in self.wavefront_ids().filter_map(|id| ndrange.wavefront(id)) {
            wavefront.dump(ndrange, f)?;
        }
        Ok(())
    }
}

impl Wavefront {
    /// Dump counters and the divergence report; `ndrange` must own this wavefront.
    pub fn dump(&self, ndrange: &NdRange, f: &mut dyn Write) -> fmt::Result {
        let stats = self.stats();

        writeln!(f, "[ NDRange[{}].Wavefront[{}] ]\n", ndrange.id(), self.id())?;
        writeln!(f, "Name = {}", self.name())?;
        writeln!(f, "WorkGroup = {}", self.work_group_id())?;
        writeln!(f, "WorkItemFirst = {}", self.work_item_id_first())?;
        writeln!(f, "WorkItemLast = {}", self.work_item_id_last())?;
        writeln!(f, "WorkItemCount = {}", self.work_item_count())?;
        f.write_str("\n")?;

        writeln!(f, "Inst_Count = {}", stats.inst_count)?;
        writeln!(f, "Global_Mem_Inst_Count = {}", stats.global_mem_inst_count)?;
        writeln!(f, "Local_Mem_Inst_Count = {}", stats.local_mem_inst_count)?;
        f.write_str("\n")?;

        writeln!(f, "CF_Inst_Count = {}", stats.cf_inst_count)?;
        writeln!(f, "CF_Inst_Global_Mem_Write_Count = {}", stats.cf_inst_global_mem_write_count)?;
        f.write_str("\n")?;

        writeln!(f, "ALU_Clause_Count = {}", stats.alu_clause_count)?;
        writeln!(f, "ALU_Group_Count = {}", stats.alu_group_count)?;
        f.write_str("ALU_Group_Size =")?;
        for count in stats.alu_group_size {
            write!(f, " {count}")?;
        }
        f.write_str("\n")?;
        writeln!(f, "ALU_Inst_Count = {}", stats.alu_inst_count)?;
        writeln!(f, "ALU_Inst_Local_Mem_Count = {}", stats.alu_inst_local_mem_count)?;
        f.write_str("\n")?;

        writeln!(f, "TC_Clause_Count = {}", stats.tc_clause_count)?;
        writeln!(f, "TC_Inst_Count = {}", stats.tc_inst_count)?;
        writeln!(f, "TC_Inst_Global_Mem_Read_Count = {}", stats.tc_inst_global_mem_read_count)?;
        f.write_str("\n")?;

        if let Some(work_items) = ndrange.wavefront_work_items(self.id()) {
            DivergenceReport::analyze(work_items).dump(f)?;
        }
        f.write_str("\n")
    }
}

fn dump_range(f: &mut dyn Write, key: &str, count: usize) -> fmt::Result {
    writeln!(f, "{key}First = 0")?;
    writeln!(f, "{key}Last = {}", count as i64 - 1)?;
    writeln!(f, "{key}Count = {count}")
}
