use wavesim_isa::Opcode;

use crate::test::support::{Asm, ScriptHandler, SlotDecoder, emulator_with, return_program};
use crate::{EmuConfig, Emulator};

#[test]
fn test_wavefront_dump() {
    let mut asm = Asm::new();
    let alu = asm.cf(Opcode::Alu, 0, 2);
    asm.cf_end(Opcode::MemExport, 0);
    let group = asm.alu_group(&[(Opcode::Add, 0), (Opcode::Mul, 0)]);
    asm.set_addr(alu, group);

    let (mut emu, id) = emulator_with(4, [8, 1, 1], [8, 1, 1], 1, &asm.finish());
    emu.run(id, &SlotDecoder, &mut ScriptHandler::new()).unwrap();

    let ndrange = emu.ndrange(id).unwrap();
    let mut out = String::new();
    ndrange.wavefront(1).unwrap().dump(ndrange, &mut out).unwrap();

    let expected = "\
[ NDRange[0].Wavefront[1] ]

Name = wavefront[i4-i7]
WorkGroup = 0
WorkItemFirst = 4
WorkItemLast = 7
WorkItemCount = 4

Inst_Count = 4
Global_Mem_Inst_Count = 1
Local_Mem_Inst_Count = 0

CF_Inst_Count = 2
CF_Inst_Global_Mem_Write_Count = 1

ALU_Clause_Count = 1
ALU_Group_Count = 1
ALU_Group_Size = 0 1 0 0 0
ALU_Inst_Count = 2
ALU_Inst_Local_Mem_Count = 0

TC_Clause_Count = 0
TC_Inst_Count = 0
TC_Inst_Global_Mem_Read_Count = 0

DivergenceGroups = 1
DivergenceGroupsSize = 4

DivergenceGroup[0] = 0-3


";
    assert_eq!(out, expected);
}

#[test]
fn test_ndrange_dump_nests_sections() {
    let (emu, id) = emulator_with(4, [8, 1, 1], [4, 1, 1], 1, &return_program());
    let mut out = String::new();
    emu.ndrange(id).unwrap().dump(&mut out).unwrap();

    assert!(out.starts_with("[ NDRange[0] ]\n\nName = kernel\n"));
    for line in [
        "WorkGroupFirst = 0",
        "WorkGroupLast = 1",
        "WorkGroupCount = 2",
        "WaveFrontCount = 2",
        "WorkItemLast = 7",
        "WorkItemCount = 8",
        "[ NDRange[0].WorkGroup[1] ]",
        "Name = work-group[i4-i7]",
        "[ NDRange[0].Wavefront[0] ]",
        "[ NDRange[0].Wavefront[1] ]",
    ] {
        assert!(out.lines().any(|l| l == line), "missing {line:?}");
    }

    let group = out.find("[ NDRange[0].WorkGroup[1] ]").unwrap();
    let wavefront = out.find("[ NDRange[0].Wavefront[1] ]").unwrap();
    assert!(group < wavefront);
}

#[test]
fn test_emulator_dump_lists_ndranges() {
    let (mut emu, id) = emulator_with(4, [4, 1, 1], [4, 1, 1], 1, &return_program());
    emu.run(id, &SlotDecoder, &mut ScriptHandler::new()).unwrap();

    let mut out = String::new();
    emu.dump(&mut out).unwrap();
    assert!(out.starts_with("[ Emulator ]\n\nNDRangeCount = 1\nInstructions = 1\n"));
    assert!(out.contains("[ NDRange[0] ]"));
}

#[test]
fn test_histogram_dump_skips_zero_buckets() {
    let config = EmuConfig::builder().wavefront_size(4).inst_histogram(true).build();
    let mut emu = Emulator::new(config).unwrap();
    let id = emu.create_ndrange("histogram");
    let ndrange = emu.ndrange_mut(id).unwrap();
    ndrange.setup_size([8, 1, 1], [4, 1, 1], 1).unwrap();
    ndrange.setup_instruction_memory(&return_program(), 0).unwrap();
    emu.run(id, &SlotDecoder, &mut ScriptHandler::new()).unwrap();

    let mut out = String::new();
    emu.ndrange(id).unwrap().dump_histogram(&mut out).unwrap();
    assert_eq!(out, "[ NDRange[0].InstHistogram ]\n\nNOP = 2\n\n");
}

#[test]
fn test_histogram_dump_without_histogram_is_empty() {
    let (emu, id) = emulator_with(4, [4, 1, 1], [4, 1, 1], 1, &return_program());
    let mut out = String::new();
    emu.ndrange(id).unwrap().dump_histogram(&mut out).unwrap();
    assert!(out.is_empty());
}
