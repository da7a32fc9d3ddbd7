//! Flujo de instrucciones emitido por el generador de código.
//!
//! Cada [`Line`] corresponde a exactamente una línea del listado
//! ensamblador en sintaxis AT&T. El listado completo es un [`Assembly`],
//! cuya representación textual es la salida final del compilador.

use std::{
    fmt::{self, Display},
    io::{self, Write},
    rc::Rc,
};

use crate::arch::Reg;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Label(Rc<str>);

impl Label {
    pub fn new(name: &str) -> Self {
        Label(Rc::from(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Display for Label {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(&self.0)
    }
}

/// Condición de salto o de `set`, según las banderas de una comparación.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    Equal,
    NotEqual,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
    Zero,
    NotZero,
}

impl Condition {
    pub fn suffix(self) -> &'static str {
        use Condition::*;

        match self {
            Equal => "e",
            NotEqual => "ne",
            Less => "l",
            Greater => "g",
            LessOrEqual => "le",
            GreaterOrEqual => "ge",
            Zero => "z",
            NotZero => "nz",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Reg(Reg),
    Imm(i64),

    /// Slot de variable, relativo a `%rbp`.
    Frame(i32),

    /// Dato estático, relativo a `%rip`.
    Address(Label),
}

impl From<Reg> for Operand {
    fn from(reg: Reg) -> Self {
        Operand::Reg(reg)
    }
}

impl Display for Operand {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(reg) => reg.fmt(fmt),
            Operand::Imm(value) => write!(fmt, "${}", value),
            Operand::Frame(offset) => write!(fmt, "{}(%rbp)", offset),
            Operand::Address(label) => write!(fmt, "{}(%rip)", label),
        }
    }
}

/// Instrucciones x86-64 que el generador puede emitir.
///
/// Los operandos siguen el orden AT&T: fuente primero, destino después.
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    Mov(Operand, Operand),
    Lea(Operand, Reg),
    Add(Operand, Reg),
    Sub(Operand, Reg),
    Imul(Operand, Reg),
    And(Operand, Reg),
    Or(Operand, Reg),
    Xor(Operand, Reg),
    Cmp(Operand, Reg),
    Test(Reg, Reg),

    /// Desplazamiento por `%cl`.
    Sal(Reg),
    Sar(Reg),

    Neg(Reg),
    Not(Reg),

    /// Extiende el signo de `%rax` hacia `%rdx`.
    Cqto,

    /// Divide `%rdx:%rax`; cociente en `%rax` y residuo en `%rdx`.
    Idiv(Reg),

    /// Escribe la condición en `%al`.
    Set(Condition),

    /// Extiende `%al` con ceros hacia el registro.
    Movzb(Reg),

    Push(Reg),
    Pop(Reg),
    Jump(Label),
    JumpIf(Condition, Label),
    Call(Label),
    Syscall,
}

impl Display for Instruction {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;

        match self {
            Mov(src, dst) => write!(fmt, "movq {}, {}", src, dst),
            Lea(src, dst) => write!(fmt, "leaq {}, {}", src, dst),
            Add(src, dst) => write!(fmt, "addq {}, {}", src, dst),
            Sub(src, dst) => write!(fmt, "subq {}, {}", src, dst),
            Imul(src, dst) => write!(fmt, "imulq {}, {}", src, dst),
            And(src, dst) => write!(fmt, "andq {}, {}", src, dst),
            Or(src, dst) => write!(fmt, "orq {}, {}", src, dst),
            Xor(src, dst) => write!(fmt, "xorq {}, {}", src, dst),
            Cmp(src, dst) => write!(fmt, "cmpq {}, {}", src, dst),
            Test(src, dst) => write!(fmt, "testq {}, {}", src, dst),
            Sal(dst) => write!(fmt, "salq %cl, {}", dst),
            Sar(dst) => write!(fmt, "sarq %cl, {}", dst),
            Neg(dst) => write!(fmt, "negq {}", dst),
            Not(dst) => write!(fmt, "notq {}", dst),
            Cqto => fmt.write_str("cqto"),
            Idiv(divisor) => write!(fmt, "idivq {}", divisor),
            Set(condition) => write!(fmt, "set{} %al", condition.suffix()),
            Movzb(dst) => write!(fmt, "movzbq %al, {}", dst),
            Push(reg) => write!(fmt, "pushq {}", reg),
            Pop(reg) => write!(fmt, "popq {}", reg),
            Jump(label) => write!(fmt, "jmp {}", label),
            JumpIf(condition, label) => write!(fmt, "j{} {}", condition.suffix(), label),
            Call(label) => write!(fmt, "call {}", label),
            Syscall => fmt.write_str("syscall"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Line {
    Label(Label),
    Op(Instruction),
    Comment(String),
    Directive(String),

    /// Cadena terminada en nulo, para `.data`.
    Ascii(String),
}

impl Display for Line {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Line::Label(label) => write!(fmt, "{}:", label),
            Line::Op(instruction) => write!(fmt, "    {}", instruction),
            Line::Comment(text) => write!(fmt, "    # {}", text),
            Line::Directive(directive) => fmt.write_str(directive),
            Line::Ascii(string) => {
                fmt.write_str(".asciz \"")?;
                for byte in string.bytes() {
                    match byte {
                        b'"' => fmt.write_str("\\\"")?,
                        b'\\' => fmt.write_str("\\\\")?,
                        b'\n' => fmt.write_str("\\n")?,
                        b'\t' => fmt.write_str("\\t")?,
                        b' '..=b'~' => write!(fmt, "{}", byte as char)?,
                        _ => write!(fmt, "\\{:03o}", byte)?,
                    }
                }

                fmt.write_str("\"")
            }
        }
    }
}

/// Listado ensamblador completo.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Assembly {
    lines: Vec<Line>,
}

impl Assembly {
    pub fn new(lines: Vec<Line>) -> Self {
        Assembly { lines }
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Escribe el listado textual.
    pub fn write_to<W: Write>(&self, output: &mut W) -> io::Result<()> {
        for line in &self.lines {
            writeln!(output, "{}", line)?;
        }

        Ok(())
    }
}

impl Display for Assembly {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(fmt, "{}", line)?;
        }

        Ok(())
    }
}
