#![allow(dead_code)]

//! Intérprete mínimo del listado emitido, para pruebas de extremo a extremo.
//!
//! Ejecuta el subconjunto de x86-64 que emite el generador, simula los
//! builtins de E/S y verifica el alineamiento de `%rsp` en cada llamada.
//! Las llamadas destruyen los registros caller-saved, igual que en la ABI.

use std::collections::{HashMap, VecDeque};

use tinycxx::{
    arch::Reg,
    codegen::{PRINT_CHAR, PRINT_INT, PRINT_STR, READ_INT},
    compile,
    ir::{Assembly, Condition, Instruction, Line, Operand},
    lex::Lexer,
    source, Compilation, Options,
};

const STACK_TOP: i64 = 0x7fff_0000;
const DATA_BASE: i64 = 0x1000_0000;
const STEP_LIMIT: usize = 1_000_000;
const POISON: i64 = 0x5a5a_5a5a;

#[derive(Debug, PartialEq)]
pub struct Outcome {
    pub status: i64,
    pub output: String,
}

pub fn compile_with(text: &str, options: &Options) -> Compilation {
    let (_, stream) = source::chars(text, "<test>");
    compile(Lexer::new(stream), options)
}

/// Compila un programa que debe estar libre de errores.
pub fn assemble_with(text: &str, options: &Options) -> Assembly {
    match compile_with(text, options).into_result() {
        Ok(assembly) => assembly,
        Err(diagnostics) => panic!("compilation failed:\n{}", diagnostics),
    }
}

pub fn assemble(text: &str) -> Assembly {
    assemble_with(text, &Options::default())
}

pub fn run(text: &str) -> i64 {
    execute(&assemble(text), &[]).status
}

pub fn run_with(text: &str, options: &Options, input: &[i64]) -> Outcome {
    execute(&assemble_with(text, options), input)
}

pub fn run_with_input(text: &str, input: &[i64]) -> Outcome {
    run_with(text, &Options::default(), input)
}

pub fn execute(assembly: &Assembly, input: &[i64]) -> Outcome {
    Machine::new(assembly, input).run()
}

#[derive(Copy, Clone)]
enum Flags {
    Compare(i64, i64),
    Test(i64),
}

struct Machine<'a> {
    lines: &'a [Line],
    labels: HashMap<&'a str, usize>,
    strings: HashMap<i64, &'a str>,
    addresses: HashMap<&'a str, i64>,
    regs: HashMap<Reg, i64>,
    memory: HashMap<i64, i64>,
    flags: Option<Flags>,
    input: VecDeque<i64>,
    output: String,
}

impl<'a> Machine<'a> {
    fn new(assembly: &'a Assembly, input: &[i64]) -> Self {
        let lines = assembly.lines();
        let mut labels = HashMap::new();
        let mut strings = HashMap::new();
        let mut addresses = HashMap::new();

        for (index, line) in lines.iter().enumerate() {
            if let Line::Label(label) = line {
                assert!(
                    labels.insert(label.name(), index).is_none(),
                    "duplicate label {}",
                    label
                );

                if let Some(Line::Ascii(string)) = lines.get(index + 1) {
                    let address = DATA_BASE + 0x1000 * addresses.len() as i64;
                    addresses.insert(label.name(), address);
                    strings.insert(address, string.as_str());
                }
            }
        }

        let mut regs = HashMap::new();
        regs.insert(Reg::Rsp, STACK_TOP);

        Machine {
            lines,
            labels,
            strings,
            addresses,
            regs,
            memory: HashMap::new(),
            flags: None,
            input: input.iter().copied().collect(),
            output: String::new(),
        }
    }

    fn run(mut self) -> Outcome {
        let lines = self.lines;
        let mut pc = self.target("_start");

        for _ in 0..STEP_LIMIT {
            let line = lines.get(pc).expect("fell off the end of the listing");
            pc += 1;

            let instruction = match line {
                Line::Op(instruction) => instruction,
                _ => continue,
            };

            use Instruction::*;
            match instruction {
                Mov(src, dst) => {
                    let value = self.read(src);
                    self.write(dst, value);
                }

                Lea(Operand::Address(label), dst) => {
                    let address = self.addresses[label.name()];
                    self.set(*dst, address);
                }

                Lea(Operand::Frame(offset), dst) => {
                    let address = self.get(Reg::Rbp) + *offset as i64;
                    self.set(*dst, address);
                }

                Lea(other, _) => panic!("bad lea operand {}", other),

                Add(src, dst) => self.arith(src, *dst, i64::wrapping_add),
                Sub(src, dst) => self.arith(src, *dst, i64::wrapping_sub),
                Imul(src, dst) => self.arith(src, *dst, i64::wrapping_mul),
                And(src, dst) => self.arith(src, *dst, |a, b| a & b),
                Or(src, dst) => self.arith(src, *dst, |a, b| a | b),
                Xor(src, dst) => self.arith(src, *dst, |a, b| a ^ b),

                Cmp(src, dst) => {
                    let (left, right) = (self.get(*dst), self.read(src));
                    self.flags = Some(Flags::Compare(left, right));
                }

                Test(a, b) => {
                    let value = self.get(*a) & self.get(*b);
                    self.flags = Some(Flags::Test(value));
                }

                Sal(dst) => {
                    let count = self.get(Reg::Rcx) & 63;
                    let value = self.get(*dst).wrapping_shl(count as u32);
                    self.set(*dst, value);
                }

                Sar(dst) => {
                    let count = self.get(Reg::Rcx) & 63;
                    let value = self.get(*dst) >> count;
                    self.set(*dst, value);
                }

                Neg(dst) => {
                    let value = self.get(*dst).wrapping_neg();
                    self.set(*dst, value);
                }

                Not(dst) => {
                    let value = !self.get(*dst);
                    self.set(*dst, value);
                }

                Cqto => {
                    let extension = if self.get(Reg::Rax) < 0 { -1 } else { 0 };
                    self.set(Reg::Rdx, extension);
                }

                Idiv(divisor) => {
                    let (dividend, divisor) = (self.get(Reg::Rax), self.get(*divisor));
                    let extension = if dividend < 0 { -1 } else { 0 };
                    assert_eq!(self.get(Reg::Rdx), extension, "idiv without cqto");
                    assert_ne!(divisor, 0, "division by zero");

                    self.set(Reg::Rax, dividend.wrapping_div(divisor));
                    self.set(Reg::Rdx, dividend.wrapping_rem(divisor));
                }

                Set(condition) => {
                    let bit = self.holds(*condition) as i64;
                    let rax = (self.get(Reg::Rax) & !0xff) | bit;
                    self.set(Reg::Rax, rax);
                }

                Movzb(dst) => {
                    let value = self.get(Reg::Rax) & 0xff;
                    self.set(*dst, value);
                }

                Push(reg) => {
                    let value = self.get(*reg);
                    self.push(value);
                }

                Pop(reg) => {
                    let value = self.pop();
                    self.set(*reg, value);
                }

                Jump(label) => pc = self.target(label.name()),
                JumpIf(condition, label) => {
                    if self.holds(*condition) {
                        pc = self.target(label.name());
                    }
                }

                Call(label) => self.call(label.name()),

                Syscall => {
                    assert_eq!(self.get(Reg::Rax), 60, "only exit is supported");
                    assert_eq!(self.get(Reg::Rsp), STACK_TOP, "unbalanced stack at exit");

                    return Outcome {
                        status: self.get(Reg::Rdi),
                        output: self.output,
                    };
                }
            }
        }

        panic!("step limit exceeded");
    }

    fn call(&mut self, builtin: &str) {
        assert_eq!(self.get(Reg::Rsp) % 16, 0, "misaligned stack at call {}", builtin);

        let argument = self.get(Reg::Rdi);
        let mut result = POISON;

        if builtin == PRINT_INT {
            self.output.push_str(&argument.to_string());
        } else if builtin == PRINT_CHAR {
            let c = char::from_u32(argument as u32).expect("bad character");
            self.output.push(c);
        } else if builtin == PRINT_STR {
            let string = self.strings[&argument];
            self.output.push_str(string);
        } else if builtin == READ_INT {
            result = self.input.pop_front().expect("input exhausted");
        } else {
            panic!("unknown builtin {}", builtin);
        }

        let clobbered = [
            Reg::Rax,
            Reg::Rcx,
            Reg::Rdx,
            Reg::Rsi,
            Reg::Rdi,
            Reg::R8,
            Reg::R9,
            Reg::R10,
            Reg::R11,
        ];

        for reg in clobbered {
            assert!(reg.is_caller_saved());
            self.set(reg, POISON);
        }

        self.set(Reg::Rax, result);
    }

    fn holds(&self, condition: Condition) -> bool {
        let (left, right) = match self.flags.expect("condition without flags") {
            Flags::Compare(left, right) => (left, right),
            Flags::Test(value) => (value, 0),
        };

        use Condition::*;
        match condition {
            Equal | Zero => left == right,
            NotEqual | NotZero => left != right,
            Less => left < right,
            Greater => left > right,
            LessOrEqual => left <= right,
            GreaterOrEqual => left >= right,
        }
    }

    fn arith(&mut self, src: &Operand, dst: Reg, op: impl Fn(i64, i64) -> i64) {
        let value = op(self.get(dst), self.read(src));
        self.set(dst, value);
    }

    fn read(&self, operand: &Operand) -> i64 {
        match operand {
            Operand::Reg(reg) => self.get(*reg),
            Operand::Imm(value) => *value,
            Operand::Frame(offset) => {
                let address = self.get(Reg::Rbp) + *offset as i64;
                *self
                    .memory
                    .get(&address)
                    .unwrap_or_else(|| panic!("read of unwritten slot {}(%rbp)", offset))
            }

            Operand::Address(label) => panic!("load from {} is not supported", label),
        }
    }

    fn write(&mut self, operand: &Operand, value: i64) {
        match operand {
            Operand::Reg(reg) => self.set(*reg, value),
            Operand::Frame(offset) => {
                let address = self.get(Reg::Rbp) + *offset as i64;
                assert!(address < STACK_TOP, "frame write outside the stack");
                assert!(address >= self.get(Reg::Rsp), "frame write below %rsp");

                self.memory.insert(address, value);
            }

            other => panic!("bad destination {}", other),
        }
    }

    fn push(&mut self, value: i64) {
        let rsp = self.get(Reg::Rsp) - 8;
        self.set(Reg::Rsp, rsp);
        self.memory.insert(rsp, value);
    }

    fn pop(&mut self) -> i64 {
        let rsp = self.get(Reg::Rsp);
        let value = self.memory[&rsp];
        self.set(Reg::Rsp, rsp + 8);

        value
    }

    fn get(&self, reg: Reg) -> i64 {
        self.regs.get(&reg).copied().unwrap_or(0)
    }

    fn set(&mut self, reg: Reg, value: i64) {
        self.regs.insert(reg, value);
    }

    fn target(&self, label: &str) -> usize {
        *self
            .labels
            .get(label)
            .unwrap_or_else(|| panic!("unknown label {}", label))
    }
}
