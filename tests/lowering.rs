mod common;

use common::{assemble_with, compile_with, run, run_with};
use tinycxx::{
    codegen::{LowerError, LowerOptions},
    Options,
};

fn nested_sum(leaves: i64) -> String {
    let mut text = leaves.to_string();
    for leaf in (1..leaves).rev() {
        text = format!("{} + ({})", leaf, text);
    }

    text + ";"
}

fn eager() -> Options {
    Options {
        lowering: LowerOptions::default() | LowerOptions::EAGER_LOGIC,
        ..Options::default()
    }
}

#[test]
fn division_truncates_toward_zero() {
    assert_eq!(run("7 / 2;"), 3);
    assert_eq!(run("7 % 2;"), 1);
    assert_eq!(run("-7 / 2;"), -3);
    assert_eq!(run("-7 % 2;"), -1);
    assert_eq!(run("int a = 17; int b = 5; a / b * b + a % b;"), 17);
}

#[test]
fn shifts_use_count_register() {
    assert_eq!(run("1 << 10;"), 1024);
    assert_eq!(run("-16 >> 2;"), -4);
    assert_eq!(run("int n = 3; 5 << n >> 1;"), 20);
}

#[test]
fn comparisons_produce_booleans() {
    assert_eq!(run("3 < 5;"), 1);
    assert_eq!(run("5 <= 4;"), 0);
    assert_eq!(run("4 >= 4;"), 1);
    assert_eq!(run("2 != 2;"), 0);
    assert_eq!(run("-1 > -2;"), 1);
}

#[test]
fn logical_operators_are_normalized() {
    assert_eq!(run("5 && 7;"), 1);
    assert_eq!(run("0 || 9;"), 1);
    assert_eq!(run("0 || 0;"), 0);
    assert_eq!(run("!7;"), 0);
}

#[test]
fn initializer_expression() {
    assert_eq!(run("int x = 5 + 3 * 2; x;"), 11);
}

#[test]
fn eight_registers_suffice() {
    assert_eq!(run(&nested_sum(8)), 36);

    let long: Vec<_> = (1..=20).map(|leaf| leaf.to_string()).collect();
    assert_eq!(run(&format!("{};", long.join(" + "))), 210);
}

#[test]
fn ninth_register_is_an_error() {
    let compilation = compile_with(&nested_sum(9), &Options::default());

    assert!(compilation.syntax_errors.is_empty());
    let error = compilation.assembly.unwrap_err();
    assert!(matches!(error.as_ref(), LowerError::RegisterExhaustion(8)));
}

#[test]
fn long_flat_chains_fit_the_depth_limit() {
    let sum = vec!["1"; 300].join(" + ") + ";";
    assert_eq!(run(&sum), 300);

    let options = Options {
        max_depth: 16,
        ..Options::default()
    };

    // x - 2 - x - 2 - ... con 40 términos `x - 1 * 2`
    let mixed = "int x = 100; ".to_string() + &vec!["x - 1 * 2"; 40].join(" - ") + ";";
    assert_eq!(run_with(&mixed, &options, &[]).status, 98 - 39 * 102);
}

#[test]
fn logic_short_circuits_by_default() {
    let options = Options::default();

    let and = "int x = 0; 0 && (x = 1); x;";
    let or = "int y = 0; 1 || (y = 1); y;";

    assert_eq!(run_with(and, &options, &[]).status, 0);
    assert_eq!(run_with(or, &options, &[]).status, 0);
    assert_eq!(run_with(and, &eager(), &[]).status, 1);
    assert_eq!(run_with(or, &eager(), &[]).status, 1);
}

#[test]
fn eager_logic_keeps_results() {
    let options = eager();

    assert_eq!(run_with("3 && 4;", &options, &[]).status, 1);
    assert_eq!(run_with("0 && 4;", &options, &[]).status, 0);
    assert_eq!(run_with("0 || 0;", &options, &[]).status, 0);
    assert_eq!(run_with("0 || 2;", &options, &[]).status, 1);
}

#[test]
fn empty_program_exits_with_zero() {
    assert_eq!(run(""), 0);
    assert_eq!(run("int x = 4;"), 0);
}

#[test]
fn listing_without_comments() {
    let options = Options {
        lowering: LowerOptions::empty(),
        ..Options::default()
    };

    let assembly = assemble_with("1 + 2;", &options);
    insta::assert_snapshot!(assembly.to_string().trim_end(), @r"
    .section .text
    .global _start
    _start:
        pushq %rbp
        movq %rsp, %rbp
        subq $8, %rsp
        movq $0, %rbx
        movq $1, %r8
        movq $2, %r9
        addq %r9, %r8
        movq %r8, %rbx
    _exit:
        movq %rbx, %rdi
        movq %rbp, %rsp
        popq %rbp
        movq $60, %rax
        syscall
    ");
}

#[test]
fn listing_with_comments() {
    let assembly = assemble_with("int x = 2;", &Options::default());
    let text = assembly.to_string();

    assert!(text.starts_with("# Generated by tinycxx\n"));
    assert!(text.contains("    # int x at -8(%rbp)\n"));
    assert!(text.contains("    movq %r8, -8(%rbp)\n"));
    assert!(text.contains("    movq $0, %rdi\n"));
}
