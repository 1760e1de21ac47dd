use indoc::indoc;

use super::*;
use crate::assembler::{assemble, AssemblerSettings};
use crate::bytecode::{HEADER_SIZE, R0};

struct Run {
  result   : Result<(), ExecutorError>,
  executor : Executor,
  output   : String,
}

fn run_with(source: &str, input: &str, settings: &ExecutorSettings) -> Run {
  let image = assemble(source, &AssemblerSettings::default()).unwrap();
  run_image(&image, input, settings)
}

fn run_image(image: &[u8], input: &str, settings: &ExecutorSettings) -> Run {
  let mut executor = Executor::new(image, settings).unwrap();
  let mut input    = input.as_bytes();
  let mut output   = Vec::new();
  let result       = executor.run(&mut input, &mut output);
  Run {
    result,
    executor,
    output: String::from_utf8(output).unwrap()
  }
}

fn run(source: &str) -> Run {
  run_with(source, "", &ExecutorSettings::default())
}

/// Runs a program that is expected to halt normally.
fn halts(source: &str) -> Run {
  let run = run(source);
  if let Err(error) = &run.result {
    panic!("program failed: {}", error);
  }
  run
}

fn fails(source: &str) -> ExecutorError {
  match run(source).result {
    Ok(())     => panic!("expected the program to fail"),
    Err(error) => error
  }
}

fn byte(run: &Run, n: RegisterId) -> ByteCell {
  run.executor.registers().byte(R0 + n).unwrap()
}

#[test]
fn addition_sets_result_and_flag() {
  let run       = halts("movw R0, 5\nmovw R1, 7\niadd R2, R0, R1\nhalt");
  let registers = run.executor.registers();
  assert_eq!(registers.r(2).int(), 12);
  assert_eq!(registers.flag(), 1);
}

#[test]
fn base_registers_are_seeded() {
  let run = halts("halt");
  assert_eq!(run.executor.registers().word(PP).unwrap().word(), IMAGE_BASE);
  assert_eq!(run.executor.registers().word(BP).unwrap().word(), STACK_BASE);
  assert_eq!(run.executor.registers().flag(), 0);
}

#[test]
fn division_by_zero_writes_nothing() {
  let run = run(indoc! {"
    movw R1, 99
    movw R2, 10
    movw R3, 0
    idiv R1, R2, R3
    halt
  "});
  let error = run.result.unwrap_err();
  assert!(matches!(error.kind, ExecutorErrorKind::DivideByZero));
  assert_eq!(error.offset, HEADER_SIZE + 18);
  assert_eq!(run.executor.registers().r(1).int(), 99);

  assert!(matches!(fails("movb R0, 1 cmod R0, R0, R1").kind, ExecutorErrorKind::DivideByZero));
  assert!(matches!(fails("movw R0, 1 itof R0, R0 fdiv R0, R0, R1").kind, ExecutorErrorKind::DivideByZero));
}

#[test]
fn integer_overflow_wraps() {
  let run = halts(indoc! {"
    movw R0, 0x7FFFFFFF
    iinc R0
    movw R1, -2147483648
    movw R2, -1
    idiv R3, R1, R2
    imod R4, R1, R2
    halt
  "});
  assert_eq!(run.executor.registers().r(0).int(), i32::MIN);
  assert_eq!(run.executor.registers().r(3).int(), i32::MIN);
  assert_eq!(run.executor.registers().r(4).int(), 0);
  assert_eq!(run.executor.registers().flag(), 0);
}

#[test]
fn corrupt_opcode_is_reported_at_its_offset() {
  let mut image = assemble("nop\nhalt", &AssemblerSettings::default()).unwrap();
  image[HEADER_SIZE] = 0xFE;
  let run   = run_image(&image, "", &ExecutorSettings::default());
  let error = run.result.unwrap_err();
  assert!(matches!(error.kind, ExecutorErrorKind::UnknownOpcode(0xFE)));
  assert_eq!(error.offset, HEADER_SIZE);
}

#[test]
fn invalid_register_ids_fail() {
  let mut image = assemble("movw R0, 1\nhalt", &AssemblerSettings::default()).unwrap();
  image[HEADER_SIZE + 1] = 40;
  let run   = run_image(&image, "", &ExecutorSettings::default());
  let error = run.result.unwrap_err();
  assert!(matches!(error.kind, ExecutorErrorKind::InvalidRegister(40)));
  assert_eq!(error.offset, HEADER_SIZE);
}

#[test]
fn jumping_far_past_the_image_overreads() {
  let error = fails("jmp 0x7FFFFFFF");
  assert!(matches!(error.kind, ExecutorErrorKind::Overread));
  assert_eq!(error.offset, 0x7FFF_FFFF);
}

#[test]
fn running_off_the_end_halts() {
  let run = halts("movw R0, 1");
  assert_eq!(run.executor.registers().r(0).int(), 1);
}

#[test]
fn countdown_loop() {
  let run = halts(indoc! {"
      movw   R0, 3
    @loop
      rprnti R0
      idec   R0
      jmpnz  @loop
      prntln
      halt
  "});
  assert_eq!(run.output, "321\n");
}

#[test]
fn globals_are_addressed_through_pp() {
  let run = halts(indoc! {r#"
    globalw   %count 41
    globalstr %message "done"

    loadw   R0, PP, %count
    iinc    R0
    storew  PP, %count, R0
    loadw   R1, PP, %count
    prntstr PP, %message
    halt
  "#});
  assert_eq!(run.output, "done");
  assert_eq!(run.executor.registers().r(1).int(), 42);
}

#[test]
fn globals_are_skipped_when_executed() {
  let run = halts(indoc! {r#"
    globalstr %s "abc"
    iinc   R0
    movw   R1, 2
    icmplt R2, R0, R1
    jmpnz  12
    halt
  "#});
  assert_eq!(run.executor.registers().r(0).int(), 2);
}

#[test]
fn stack_is_addressed_through_bp() {
  let run = halts(indoc! {"
    movw   R0, -7
    storew BP, 8, R0
    loads  R1, BP, 8
    stores BP, 16, R0
    loadw  R2, BP, 16
    movb   R3, 0xAB
    storeb BP, 20, R3
    loadb  R4, BP, 20
    halt
  "});
  assert_eq!(run.executor.registers().r(1).int(), -7);
  assert_eq!(run.executor.registers().r(2).word(), 0x0000_FFF9);
  assert_eq!(byte(&run, 4).byte(), 0xAB);
}

#[test]
fn stack_overflow_is_checked() {
  let error = fails("storew BP, 0x1000, R0");
  match error.kind {
    ExecutorErrorKind::InvalidAddress { address, len } => {
      assert_eq!(address, STACK_BASE + 0x1000);
      assert_eq!(len, 4);
    }
    other => panic!("unexpected {:?}", other)
  }

  let settings = ExecutorSettings { stack_size: 0x2000, ..ExecutorSettings::default() };
  let run      = run_with("storew BP, 0x1000, R0 halt", "", &settings);
  assert!(run.result.is_ok());
}

#[test]
fn char_arithmetic_wraps_and_prints() {
  let run = halts(indoc! {"
    movb R0, 65
    prntc R0
    movb R1, 1
    cadd R0, R0, R1
    prntc R0
    movb R2, 127
    cinc R2
    movb R3, -3
    movb R4, 2
    cdiv R5, R3, R4
    ctoi R6, R3
    halt
  "});
  assert_eq!(run.output, "AB");
  assert_eq!(byte(&run, 2).char(), -128);
  assert_eq!(byte(&run, 5).char(), -1);
  assert_eq!(run.executor.registers().r(6).int(), -3);
  assert_eq!(run.executor.registers().flag(), 1);
}

#[test]
fn floats_and_casts() {
  let run = halts(indoc! {"
    movw   R0, 7
    itof   R1, R0
    movw   R2, 2
    itof   R3, R2
    fdiv   R4, R1, R3
    rprntf R4
    prntln
    fmod   R5, R1, R3
    ftoi   R6, R4
    ftoc   R7, R4
    ctof   R8, R7
    fcmpgt R9, R4, R1
    halt
  "});
  let registers = run.executor.registers();
  assert_eq!(run.output, "3.5\n");
  assert_eq!(registers.r(5).float(), 1.0);
  assert_eq!(registers.r(6).int(), 3);
  assert_eq!(byte(&run, 7).char(), 3);
  assert_eq!(registers.r(8).float(), 3.0);
  assert_eq!(byte(&run, 9).byte(), 0);
  assert_eq!(registers.flag(), 0);
}

#[test]
fn comparisons_drive_conditional_jumps() {
  let run = halts(indoc! {"
      movw   R0, 3
      movw   R1, 5
      icmplt R2, R0, R1
      jmpz   @wrong
      icmpge R2, R0, R1
      jmpnz  @wrong
      ccmpeq FZ, R5, R6
      jmpz   @wrong
      movw   R4, 1
      halt
    @wrong
      movw   R4, 2
      halt
  "});
  assert_eq!(run.executor.registers().r(4).int(), 1);
  assert_eq!(byte(&run, 2).byte(), 0);
}

#[test]
fn register_jumps() {
  let run = halts(indoc! {"
      movw R0, @target
      rjmp R0
      movw R1, 1
      halt
    @target
      movw R1, 2
      movw R2, @skip
      iflag R5
      rjmpz R2
      movw R1, 3
    @skip
      rjmpnz R2
      movw R3, 4
      halt
  "});
  assert_eq!(run.executor.registers().r(1).int(), 2);
  assert_eq!(run.executor.registers().r(3).int(), 4);
}

#[test]
fn reading_input() {
  let run = run_with(
    indoc! {"
      movw    R0, 16
      alloc   R1, R0
      readstr R1, 0
      prntstr R1, 0
      readc   R2
      prntc   R2
      readc   R3
      free    R1
      readstr BP, 0
      halt
    "},
    "hello\r\nx",
    &ExecutorSettings::default()
  );
  assert!(run.result.is_ok());
  assert_eq!(run.output, "hellox");
  assert_eq!(byte(&run, 3).byte(), 0);
  assert_eq!(run.executor.memory().heap.block_count(), 0);
  assert_eq!(run.executor.memory().read::<u8>(STACK_BASE).unwrap(), 0);
}

#[test]
fn heap_blocks_are_bounds_checked() {
  let run = run(indoc! {"
    movw   R0, 8
    alloc  R1, R0
    storew R1, 4, R0
    loadw  R2, R1, 4
    loadw  R3, R1, 8
    halt
  "});
  assert!(matches!(run.result.unwrap_err().kind, ExecutorErrorKind::InvalidAddress { .. }));
  assert_eq!(run.executor.registers().r(2).int(), 8);
  assert_eq!(run.executor.registers().r(1).word(), HEAP_BASE);
}

#[test]
fn allocation_failures() {
  assert!(matches!(fails("movw R0, -1 alloc R1, R0").kind, ExecutorErrorKind::BadAlloc(_)));
  assert!(matches!(fails("movw R0, 4 free R0").kind, ExecutorErrorKind::InvalidFree(4)));

  let settings = ExecutorSettings { heap_limit: 16, ..ExecutorSettings::default() };
  let run      = run_with("movw R0, 17 alloc R1, R0 halt", "", &settings);
  assert!(matches!(run.result.unwrap_err().kind, ExecutorErrorKind::BadAlloc(_)));
}

#[test]
fn memory_offsets_wrap() {
  let run = halts(indoc! {"
    movw   R0, 0x40000010
    movw   R1, 99
    storew R0, -8, R1
    loadw  R2, BP, 8
    halt
  "});
  assert_eq!(run.executor.registers().r(2).int(), 99);
}

#[test]
fn break_waits_for_a_line() {
  let run = run_with("break movw R0, 1 halt", "\n", &ExecutorSettings::default());
  assert!(run.result.is_ok());
  assert_eq!(run.executor.registers().r(0).int(), 1);
}

#[test]
fn clock_and_tracing_settings() {
  let settings = ExecutorSettings { debug: true, ..ExecutorSettings::default() };
  let run      = run_with("time R0 halt", "", &settings);
  assert!(run.result.is_ok());
  assert!(run.executor.to_string().contains("Offset"));
}

#[test]
fn profile_counts_executed_instructions() {
  let settings = ExecutorSettings { profile: true, ..ExecutorSettings::default() };
  let run      = run_with("movw R0, 3 @loop idec R0 jmpnz @loop halt", "", &settings);
  assert!(run.result.is_ok());

  let profile = run.executor.profile().unwrap();
  assert_eq!(profile.count(Opcode::IDec), 3);
  assert_eq!(profile.count(Opcode::JmpNz), 3);
  assert_eq!(profile.total(), 8);

  assert!(run_with("halt", "", &ExecutorSettings::default()).executor.profile().is_none());
}

#[test]
fn setup_failures_are_reported_at_offset_zero() {
  let error = Executor::new(b"not an image", &ExecutorSettings::default()).err().unwrap();
  assert!(matches!(error.kind, ExecutorErrorKind::BadHeader(_)));
  assert_eq!(error.offset, 0);

  let image    = assemble("halt", &AssemblerSettings::default()).unwrap();
  let settings = ExecutorSettings { stack_size: usize::MAX, ..ExecutorSettings::default() };
  let error    = Executor::new(&image, &settings).err().unwrap();
  assert!(matches!(error.kind, ExecutorErrorKind::BadAlloc(_)));
}

#[test]
fn exec_file_runs_an_image_from_disk() {
  let path  = std::env::temp_dir().join(format!("zvm-exec-{}.zvm", std::process::id()));
  let image = assemble("movw R0, 6 movw R1, 7 imul R2, R0, R1 halt", &AssemblerSettings::default()).unwrap();
  std::fs::write(&path, &image).unwrap();

  let registers = exec_file(&path, &ExecutorSettings::default()).unwrap();
  std::fs::remove_file(&path).unwrap();
  assert_eq!(registers.r(2).int(), 42);

  assert!(matches!(exec_file(&path, &ExecutorSettings::default()), Err(Error::Io { .. })));
}

/// Operand pairs below, equal to and above each other. The first is negative so that a
/// comparison done on the unsigned bits would disagree.
const PAIRS: [(i32, i32); 3] = [(-3, 5), (5, 5), (7, 5)];

/// Each comparison with its outcome for every pair in `PAIRS`.
const COMPARISONS: [(&str, [bool; 3]); 6] = [
  ("eq", [false, true,  false]),
  ("ne", [true,  false, true ]),
  ("gt", [false, false, true ]),
  ("lt", [true,  false, false]),
  ("ge", [false, true,  true ]),
  ("le", [true,  true,  false]),
];

/// Runs every comparison of a family over `PAIRS`. `load` is the source that puts the pair
/// into `R0` and `R1`.
fn check_comparisons(family: &str, load: impl Fn(i32, i32) -> String) {
  for (name, outcomes) in COMPARISONS.iter() {
    for ((a, b), expected) in PAIRS.iter().zip(outcomes.iter()) {
      let source = format!("{}\n{}cmp{} R2, R0, R1\nhalt", load(*a, *b), family, name);
      let run    = halts(&source);
      assert_eq!(byte(&run, 2).bool(), *expected, "{}", source);
      assert_eq!(run.executor.registers().flag(), *expected as Byte, "{}", source);
    }
  }
}

#[test]
fn integer_comparisons() {
  check_comparisons("i", |a, b| format!("movw R0, {}\nmovw R1, {}", a, b));
}

#[test]
fn char_comparisons() {
  check_comparisons("c", |a, b| format!("movb R0, {}\nmovb R1, {}", a, b));
}

#[test]
fn float_comparisons() {
  check_comparisons(
    "f",
    |a, b| format!("movw R0, {}\nitof R0, R0\nmovw R1, {}\nitof R1, R1", a, b)
  );
}

#[test]
fn integer_arithmetic_sets_result_and_flag() {
  let cases = [
    ("iadd",  7, 5,  12),
    ("isub",  5, 7,  -2),
    ("isub",  5, 5,   0),
    ("imul", -3, 5, -15),
    ("idiv", -7, 2,  -3),
    ("imod", -7, 2,  -1),
  ];
  for (op, a, b, expected) in cases.iter() {
    let source = format!("movw R0, {}\nmovw R1, {}\n{} R2, R0, R1\nhalt", a, b, op);
    let run    = halts(&source);
    assert_eq!(run.executor.registers().r(2).int(), *expected, "{}", source);
    assert_eq!(run.executor.registers().flag(), (*expected != 0) as Byte, "{}", source);
  }
}

#[test]
fn char_arithmetic_sets_result_and_flag() {
  let cases = [
    ("cadd",  100, 100, -56),
    ("csub", -100, 100,  56),
    ("csub",    9,   9,   0),
    ("cmul",   16,  16,   0),
    ("cmul",   -3,   5, -15),
    ("cdiv",   -7,   2,  -3),
    ("cmod",   -7,   2,  -1),
  ];
  for (op, a, b, expected) in cases.iter() {
    let source = format!("movb R0, {}\nmovb R1, {}\n{} R2, R0, R1\nhalt", a, b, op);
    let run    = halts(&source);
    assert_eq!(byte(&run, 2).char(), *expected, "{}", source);
    assert_eq!(run.executor.registers().flag(), (*expected != 0) as Byte, "{}", source);
  }

  let run = halts("movb R0, -128\ncdec R0\nhalt");
  assert_eq!(byte(&run, 0).char(), 127);
  assert_eq!(run.executor.registers().flag(), 1);

  let run = halts("movb R0, 1\ncdec R0\nhalt");
  assert_eq!(byte(&run, 0).char(), 0);
  assert_eq!(run.executor.registers().flag(), 0);
}

#[test]
fn float_arithmetic_sets_result_and_flag() {
  let cases = [
    ("fadd",  7, 2,   9.0),
    ("fsub",  2, 7,  -5.0),
    ("fsub",  2, 2,   0.0),
    ("fmul", -3, 5, -15.0),
    ("fdiv",  7, 2,   3.5),
    ("fmod", -7, 2,  -1.0),
  ];
  for (op, a, b, expected) in cases.iter() {
    let source = format!(
      "movw R0, {}\nitof R0, R0\nmovw R1, {}\nitof R1, R1\n{} R2, R0, R1\nhalt",
      a, b, op
    );
    let run = halts(&source);
    assert_eq!(run.executor.registers().r(2).float(), *expected, "{}", source);
    assert_eq!(run.executor.registers().flag(), (*expected != 0.0) as Byte, "{}", source);
  }
}

#[test]
fn short_moves_sign_extend() {
  let run = halts(indoc! {"
    movs R0, -2
    movs R1, 0xFFFF
    movs R2, 0x7FFF
    halt
  "});
  assert_eq!(run.executor.registers().r(0).int(), -2);
  assert_eq!(run.executor.registers().r(1).int(), -1);
  assert_eq!(run.executor.registers().r(2).int(), 0x7FFF);
}

#[test]
fn reading_a_line_into_a_short_buffer_writes_nothing() {
  let run = run_with(
    indoc! {"
      movw    R0, 4
      alloc   R1, R0
      movw    R2, 0x11223344
      storew  R1, 0, R2
      readstr R1, 0
      halt
    "},
    "hello\n",
    &ExecutorSettings::default()
  );
  match run.result.unwrap_err().kind {
    ExecutorErrorKind::InvalidAddress { address, len } => {
      assert_eq!(address, HEAP_BASE);
      assert_eq!(len, 6);
    }
    other => panic!("unexpected {:?}", other)
  }
  assert_eq!(run.executor.memory().read_word(HEAP_BASE).unwrap(), 0x1122_3344);
}

#[test]
fn profile_report_follows_the_program_output() {
  let image    = assemble("movw R0, 7 rprnti R0 prntln halt", &AssemblerSettings::default()).unwrap();
  let settings = ExecutorSettings { profile: true, ..ExecutorSettings::default() };
  let mut output = Vec::new();

  let executor = exec_with(&image, &settings, &mut "".as_bytes(), &mut output).unwrap();
  let output   = String::from_utf8(output).unwrap();
  assert!(output.starts_with("7\n4 instructions in"));
  assert_eq!(executor.registers().r(0).int(), 7);

  let mut output = Vec::new();
  exec_with(&image, &ExecutorSettings::default(), &mut "".as_bytes(), &mut output).unwrap();
  assert_eq!(output, b"7\n");
}
