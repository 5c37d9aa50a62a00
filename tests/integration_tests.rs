use ls8_emulator::cpu::CPU;
use ls8_emulator::error::{CpuError, Fault};
use ls8_emulator::loader::{load_file, parse_program};
use ls8_emulator::output::RecordingSink;
use ls8_emulator::snapshot::RunStatus;

const PRINT8: &str = "\
# print8.ls8

10000010 # LDI R0,8
00000000
00001000
01000111 # PRN R0
00000000
00000001 # HLT
";

const MULT: &str = "\
# mult.ls8

10000010 # LDI R0,8
00000000
00001000
10000010 # LDI R1,9
00000001
00001001
10100010 # MUL R0,R1
00000000
00000001
01000111 # PRN R0
00000000
00000001 # HLT
";

const STACK: &str = "\
# stack.ls8

10000010 # LDI R0,1
00000000
00000001
10000010 # LDI R1,2
00000001
00000010
01000101 # PUSH R0
00000000
01000101 # PUSH R1
00000001
10000010 # LDI R0,3
00000000
00000011
01000110 # POP R0
00000000
01000111 # PRN R0
00000000
01000110 # POP R1
00000001
01000111 # PRN R1
00000001
00000001 # HLT
";

const CALL: &str = "\
# call.ls8

10000010 # LDI R1,DOUBLE
00000001
00001011
10000010 # LDI R0,5
00000000
00000101
01010000 # CALL R1
00000001
01000111 # PRN R0
00000000
00000001 # HLT
10100000 # DOUBLE: ADD R0,R0
00000000
00000000
00010001 # RET
";

const COMPARE: &str = "\
# compare.ls8

10000010 # LDI R0,10
00000000
00001010
10000010 # LDI R1,20
00000001
00010100
10000010 # LDI R2,EQUAL
00000010
00100011
10100111 # CMP R0,R1
00000000
00000001
01010101 # JEQ R2
00000010
10000010 # LDI R3,1
00000011
00000001
01000111 # PRN R3
00000011
10000010 # LDI R2,LESS
00000010
00011101
01011000 # JLT R2
00000010
10000010 # LDI R3,99
00000011
01100011
01000111 # PRN R3
00000011
10000010 # LESS: LDI R3,2
00000011
00000010
01000111 # PRN R3
00000011
00000001 # HLT
10000010 # EQUAL: LDI R3,77
00000011
01001101
01000111 # PRN R3
00000011
00000001 # HLT
";

const COUNTDOWN: &str = "\
# countdown.ls8

10000010 # LDI R0,5
00000000
00000101
10000010 # LDI R1,0
00000001
00000000
10000010 # LDI R2,LOOP
00000010
00001001
01000111 # LOOP: PRN R0
00000000
01100110 # DEC R0
00000000
10100111 # CMP R0,R1
00000000
00000001
01010110 # JNE R2
00000010
00000001 # HLT
";

const HELLO: &str = "\
# hello.ls8

10000010 # LDI R0,'H'
00000000
01001000
01001000 # PRA R0
00000000
10000010 # LDI R0,'i'
00000000
01101001
01001000 # PRA R0
00000000
10000010 # LDI R0,10
00000000
00001010
01001000 # PRA R0
00000000
00000001 # HLT
";

const DIVZERO: &str = "\
# divzero.ls8

10000010 # LDI R0,10
00000000
00001010
10000010 # LDI R1,0
00000001
00000000
10100100 # MOD R0,R1
00000000
00000001
01000111 # PRN R0
00000000
00000001 # HLT
";

fn run_listing(listing: &str) -> (CPU, RecordingSink, Result<(), Fault>) {
    let program = parse_program(listing).unwrap();
    let mut cpu = CPU::new();
    cpu.load_program(&program).unwrap();
    let mut out = RecordingSink::new();
    let result = cpu.run(&mut out).map(|_| ());
    (cpu, out, result)
}

#[test]
fn test_print8() {
    let (cpu, out, result) = run_listing(PRINT8);
    assert!(result.is_ok());
    assert_eq!(out.numbers(), vec![8]);
    assert_eq!(out.text(), "8\n");
    assert!(cpu.is_halted());
    assert_eq!(cpu.get_pc(), 5);
}

#[test]
fn test_mult() {
    let (_, out, result) = run_listing(MULT);
    assert!(result.is_ok());
    assert_eq!(out.numbers(), vec![72]);
}

#[test]
fn test_stack_is_last_in_first_out() {
    let (cpu, out, result) = run_listing(STACK);
    assert!(result.is_ok());
    assert_eq!(out.numbers(), vec![2, 1]);
    assert_eq!(cpu.get_sp(), 0xF4);
}

#[test]
fn test_call_and_return() {
    let (cpu, out, result) = run_listing(CALL);
    assert!(result.is_ok());
    assert_eq!(out.numbers(), vec![10]);
    assert_eq!(cpu.call_depth(), 0);
    assert_eq!(cpu.get_pc(), 10);
}

#[test]
fn test_compare_and_branch() {
    let (cpu, out, result) = run_listing(COMPARE);
    assert!(result.is_ok());
    assert_eq!(out.numbers(), vec![1, 2]);
    let flags = cpu.get_flags();
    assert!(flags.less_than());
    assert!(!flags.equal());
    assert!(!flags.greater_than());
}

#[test]
fn test_countdown_loop() {
    let (cpu, out, result) = run_listing(COUNTDOWN);
    assert!(result.is_ok());
    assert_eq!(out.numbers(), vec![5, 4, 3, 2, 1]);
    assert!(cpu.get_flags().equal());
}

#[test]
fn test_print_characters() {
    let (_, out, result) = run_listing(HELLO);
    assert!(result.is_ok());
    assert_eq!(out.text(), "Hi\n");
    assert!(out.numbers().is_empty());
}

#[test]
fn test_mod_by_zero_stops_the_machine() {
    let (mut cpu, out, result) = run_listing(DIVZERO);
    let fault = result.unwrap_err();
    assert_eq!(fault.error, CpuError::DivideByZero);
    assert_eq!(fault.pc, 6);
    assert_eq!(fault.opcode, Some(0xA4));
    assert_eq!(fault.to_string(), "division by zero at PC $06 (opcode $A4)");

    // nothing after the fault ran, and the operands are untouched
    assert!(out.outputs().is_empty());
    assert_eq!(cpu.get_register(0), Ok(10));
    assert_eq!(cpu.get_register(1), Ok(0));
    assert_eq!(cpu.status(), RunStatus::Faulted);
    assert_eq!(cpu.fault_info(), Some(&fault));

    // the fault is sticky until reset
    assert_eq!(cpu.step(&mut RecordingSink::new()), Err(fault));
    cpu.reset();
    assert_eq!(cpu.status(), RunStatus::Running);
}

#[test]
fn test_ret_with_empty_call_stack() {
    let (cpu, _, result) = run_listing("00010001 # RET\n");
    let fault = result.unwrap_err();
    assert_eq!(fault.error, CpuError::CallStackUnderflow);
    assert_eq!(fault.pc, 0);
    assert_eq!(cpu.get_pc(), 0);
}

#[test]
fn test_machines_do_not_share_state() {
    let program = parse_program(MULT).unwrap();
    let mut first = CPU::new();
    let mut second = CPU::new();
    first.load_program(&program).unwrap();
    second.load_program(&program).unwrap();

    first.run(&mut RecordingSink::new()).unwrap();
    assert!(first.is_halted());
    assert!(!second.is_halted());
    assert_eq!(second.get_register(0), Ok(0));
}

#[test]
fn test_load_listing_from_file() {
    let path = std::env::temp_dir().join(format!("ls8-print8-{}.ls8", std::process::id()));
    std::fs::write(&path, PRINT8).unwrap();
    let program = load_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(program, vec![0x82, 0x00, 0x08, 0x47, 0x00, 0x01]);
}
