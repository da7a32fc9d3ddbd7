mod common;

use common::run;

#[test]
fn arithmetic_precedence() {
    assert_eq!(run("2 + 3 * 4;"), 14);
    assert_eq!(run("(2 + 3) * 4;"), 20);
    assert_eq!(run("2 * 3 + 4 * 5;"), 26);
    assert_eq!(run("20 / 2 / 5;"), 2);
}

#[test]
fn left_associativity() {
    assert_eq!(run("2 - 3 - 4;"), -5);
    assert_eq!(run("100 / 10 % 3;"), 1);
}

#[test]
fn assignment_is_right_associative() {
    assert_eq!(run("int a; int b; a = b = 7; a + b;"), 14);
    assert_eq!(run("int a; int b; int c; a = b = c = 2; a * b * c;"), 8);
}

#[test]
fn unary_binds_tighter_than_binary() {
    assert_eq!(run("-2 * 3;"), -6);
    assert_eq!(run("10 - -3;"), 13);
    assert_eq!(run("!0 + ~0;"), 0);
    assert_eq!(run("+5 - +2;"), 3);
}

#[test]
fn shifts_sit_above_additive() {
    assert_eq!(run("1 << 2 + 1;"), 5);
    assert_eq!(run("(1 << 2) + 1;"), 5);
    assert_eq!(run("1 << (2 + 1);"), 8);
}

#[test]
fn bitwise_and_logical_levels() {
    assert_eq!(run("7 & 3 | 8 ^ 1;"), 11);
    assert_eq!(run("1 + 2 == 3 && 4 > 3;"), 1);
    assert_eq!(run("0 || 1 && 0;"), 0);
    assert_eq!(run("1 < 2 == 1;"), 1);
}

#[test]
fn compound_assignment() {
    assert_eq!(run("int x = 10; x -= 3; x *= 2; x /= 7; x;"), 2);

    // El operando izquierdo se evalúa antes que la asignación anidada
    assert_eq!(run("int x = 1; x += x += 2; x;"), 4);
}

#[test]
fn increments() {
    assert_eq!(run("int i = 5; int j = i++; j * 10 + i;"), 56);
    assert_eq!(run("int i = 5; int j = ++i; j * 10 + i;"), 66);
    assert_eq!(run("int i = 5; i--; i;"), 4);
    assert_eq!(run("int i = 5; --i * 2;"), 8);
}

#[test]
fn constants() {
    assert_eq!(run("true + true;"), 2);
    assert_eq!(run("false;"), 0);
    assert_eq!(run("'A' + 1;"), 66);
    assert_eq!(run("2.9 + 1;"), 3);
}
