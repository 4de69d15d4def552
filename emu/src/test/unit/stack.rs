use crate::Error;
use crate::mask::{ActiveMaskStack, LaneMask, StackError};
use crate::test::support::{emulator_with, return_program};

#[test]
fn test_push_copies_parent_frame() {
    let mut stack = ActiveMaskStack::new(4, 4);
    stack.current_mut().set(2, false);

    stack.push().unwrap();
    assert_eq!(stack.top(), 1);
    assert_eq!(stack.current(), stack.frame(0).unwrap());
    assert_eq!(stack.current().to_string(), "1101");
}

#[test]
fn test_push_then_pop_restores_frame() {
    let mut stack = ActiveMaskStack::new(4, 4);
    stack.current_mut().set(0, false);
    let before = stack.current().clone();

    stack.push().unwrap();
    stack.current_mut().fill(false);
    stack.pop(1).unwrap();

    assert_eq!(stack.top(), 0);
    assert_eq!(stack.current(), &before);
}

#[test]
fn test_push_at_max_depth_overflows() {
    let mut stack = ActiveMaskStack::new(4, 3);
    stack.push().unwrap();
    stack.push().unwrap();
    assert_eq!(stack.top(), 2);
    assert_eq!(stack.push(), Err(StackError::Overflow { max: 3 }));
    assert_eq!(stack.top(), 2);
}

#[test]
fn test_pop_beyond_depth_underflows() {
    let mut stack = ActiveMaskStack::new(4, 4);
    stack.push().unwrap();
    assert_eq!(stack.pop(2), Err(StackError::Underflow { count: 2, depth: 1 }));
    assert_eq!(stack.top(), 1);
    assert_eq!(stack.pop(0), Ok(()));
    assert_eq!(stack.top(), 1);
}

#[test]
fn test_lane_mask_words() {
    let mut mask = LaneMask::full(70);
    assert_eq!(mask.count_ones(), 70);
    mask.set(65, false);
    assert!(!mask.get(65));
    assert!(mask.get(69));
    assert_eq!(mask.iter_ones().filter(|&lane| lane >= 64).collect::<Vec<_>>(), vec![64, 66, 67, 68, 69]);

    mask.fill(false);
    assert!(!mask.any());
}

#[test]
fn test_fresh_wavefront_pop_underflows() {
    let (mut emu, id) = emulator_with(4, [4, 1, 1], [4, 1, 1], 1, &return_program());
    let wavefront = emu.ndrange_mut(id).unwrap().wavefront_mut(0).unwrap();
    assert_eq!(wavefront.stack_top(), 0);

    let err = wavefront.pop(1).unwrap_err();
    assert!(matches!(err, Error::StackUnderflow { count: 1, depth: 0, .. }), "{err}");
    assert!(err.to_string().contains("wavefront[i0-i3]"));
}

#[test]
fn test_wavefront_push_overflow_and_flags() {
    // Emulators from `emulator_with` have a 4-frame stack.
    let (mut emu, id) = emulator_with(4, [4, 1, 1], [4, 1, 1], 1, &return_program());
    let wavefront = emu.ndrange_mut(id).unwrap().wavefront_mut(0).unwrap();

    for _ in 0..3 {
        wavefront.push().unwrap();
    }
    assert_eq!(wavefront.flags().active_mask_push, 3);
    assert!(matches!(wavefront.push().unwrap_err(), Error::StackOverflow { max: 4, .. }));

    wavefront.pop(2).unwrap();
    assert_eq!(wavefront.stack_top(), 1);
    assert_eq!(wavefront.flags().active_mask_pop, 2);
    assert!(wavefront.flags().active_mask_update);
}
