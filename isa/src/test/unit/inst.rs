use test_case::test_case;

use crate::{AluGroup, AluInst, CfInst, Error, InstCategory, Instruction, MAX_ALU_GROUP_SIZE, Opcode, TexInst};

fn mov() -> AluInst {
    AluInst::new(Opcode::Mov).unwrap()
}

#[test_case(1; "single_slot")]
#[test_case(3; "three_slots")]
#[test_case(MAX_ALU_GROUP_SIZE; "full_bundle")]
fn test_alu_group_accepts_valid_sizes(size: usize) {
    let group = AluGroup::new(7, std::iter::repeat_n(mov(), size)).unwrap();
    assert_eq!(group.len(), size);
    assert_eq!(group.id(), 7);
    assert!(!group.is_empty());
}

#[test_case(0; "empty")]
#[test_case(MAX_ALU_GROUP_SIZE + 1; "oversized")]
fn test_alu_group_rejects_invalid_sizes(size: usize) {
    let err = AluGroup::new(0, std::iter::repeat_n(mov(), size)).unwrap_err();
    assert_eq!(err, Error::AluGroupSize { count: size, max: MAX_ALU_GROUP_SIZE });
}

#[test]
fn test_constructors_check_category() {
    assert!(CfInst::new(Opcode::Jump).is_ok());
    assert!(AluInst::new(Opcode::AddInt).is_ok());
    assert!(TexInst::new(Opcode::VtxFetch).is_ok());

    assert_eq!(
        CfInst::new(Opcode::Add).unwrap_err(),
        Error::CategoryMismatch { opcode: Opcode::Add, expected: InstCategory::Cf }
    );
    assert!(AluInst::new(Opcode::TexSample).is_err());
    assert!(TexInst::new(Opcode::Pop).is_err());
}

#[test]
fn test_instruction_dispatch_helpers() {
    let inst: Instruction = AluInst::new(Opcode::LdsIdxOp).unwrap().into();
    assert_eq!(inst.opcode(), Opcode::LdsIdxOp);
    assert_eq!(inst.category(), InstCategory::Alu);

    let Instruction::Alu(alu) = inst else { panic!("expected ALU instruction") };
    assert!(alu.is_local_mem());
    assert!(!mov().is_local_mem());
}
