//! Generación de código.
//!
//! El generador recorre el árbol sintáctico y emite un listado x86-64.
//! Cada subexpresión deja su resultado en un registro temporal propio
//! (ver [`Registers`]); al combinarse con su padre, el registro del
//! operando consumido se libera de inmediato. Las variables viven en
//! slots del marco de pila que asigna la [`SymbolTable`].
//!
//! Cada ejecución es independiente: el pool de registros, el contador
//! de etiquetas y la tabla de símbolos se reinician al inicio.
//!
//! # Resultado del programa
//! La última sentencia-expresión ejecutada deja su valor en `%rbx`, el
//! cual se convierte en el código de salida del proceso. Un programa sin
//! sentencias-expresión termina con código 0.
//!
//! # Entrada y salida
//! `cout` y `cin` llaman a funciones externas del runtime, con su
//! argumento en `%rdi` y su retorno en `%rax`:
//! `builtin_print_int`, `builtin_print_char`, `builtin_print_str` y
//! `builtin_read_int`. Una variable `char` se imprime como carácter.
//! Ningún temporal caller-saved puede seguir vivo al emitir la llamada.
//!
//! # Operadores lógicos
//! Por omisión `&&` y `||` hacen cortocircuito: el operando derecho no se
//! evalúa si el izquierdo ya decide el resultado, así que sus asignaciones
//! y lecturas no ocurren. Con [`LowerOptions::EAGER_LOGIC`] ambos operandos
//! se evalúan siempre antes de combinarse, como en la bajada de referencia.
//! En ambos casos el resultado se normaliza a 0 o 1.
//!
//! # Anidamiento
//! Las cadenas asociativas por la izquierda (`1 + 2 + ... + n`) se bajan
//! iterando sobre su espina izquierda, de modo que el límite de
//! profundidad cuenta anidamiento real del código fuente y no la longitud
//! de la cadena.

use bitflags::bitflags;
use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    arch::{self, Reg, VALUE_SIZE},
    ir::{Assembly, Condition, Instruction, Label, Line, Operand},
    lex::Identifier,
    parse::{BinOp, Node, Type, UnOp},
    semantic::{SemanticError, SymbolTable},
    source::{Located, Position},
    Options,
};

mod regs;

pub use regs::Registers;

pub const PRINT_INT: &str = "builtin_print_int";
pub const PRINT_CHAR: &str = "builtin_print_char";
pub const PRINT_STR: &str = "builtin_print_str";
pub const READ_INT: &str = "builtin_read_int";

/// Número de llamada al sistema `exit` en Linux x86-64.
const SYS_EXIT: i64 = 60;

bitflags! {
    /// Opciones a aplicar durante la generación de código.
    pub struct LowerOptions: u32 {
        /// Emitir comentarios explicativos en el listado.
        const COMMENTS = 0x01;

        /// Evaluar ambos operandos de `&&` y `||` antes de combinarlos,
        /// en vez de omitir el derecho cuando el izquierdo decide.
        const EAGER_LOGIC = 0x02;
    }
}

impl Default for LowerOptions {
    fn default() -> Self {
        LowerOptions::COMMENTS
    }
}

/// Error fatal de generación de código.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LowerError {
    #[error(transparent)]
    Semantic(#[from] SemanticError),

    #[error("Expression needs more than {0} temporary registers")]
    RegisterExhaustion(usize),

    #[error("No instruction sequence exists for {0}")]
    UnsupportedConstruct(&'static str),

    #[error("Nesting depth exceeds the limit of {0}")]
    NestingTooDeep(usize),
}

pub type Lower<T> = Result<T, Located<LowerError>>;

/// Genera el listado completo para un programa.
///
/// Se acepta también una expresión suelta, la cual se trata como una
/// única sentencia-expresión.
pub fn lower(node: &Node, options: &Options) -> Lower<Assembly> {
    Codegen::new(options).lower(node)
}

pub struct Codegen<'a> {
    options: &'a Options,
    registers: Registers,
    symbols: SymbolTable,
    labels: u32,
    strings: u32,
    depth: usize,
    last_known: Position,
    text: Vec<Line>,
    data: Vec<Line>,
    has_result: bool,
}

impl<'a> Codegen<'a> {
    pub fn new(options: &'a Options) -> Self {
        Codegen {
            options,
            registers: Registers::new(),
            symbols: SymbolTable::new(),
            labels: 0,
            strings: 0,
            depth: 0,
            last_known: Position::default(),
            text: Vec::new(),
            data: Vec::new(),
            has_result: false,
        }
    }

    pub fn lower(&mut self, node: &Node) -> Lower<Assembly> {
        self.reset();

        match node {
            Node::Program(statements) => {
                for statement in statements {
                    self.statement(statement)?;
                }
            }

            node => self.statement(node)?,
        }

        debug!(
            frame = self.symbols.frame_size(),
            labels = self.labels,
            strings = self.strings,
            "lowering complete"
        );

        Ok(self.finish())
    }

    /// Registros temporales con dueño en este momento.
    pub fn live_registers(&self) -> usize {
        self.registers.in_use()
    }

    /// Baja una expresión y retorna el registro que contiene su valor.
    ///
    /// El llamador se vuelve dueño del registro y debe liberarlo con
    /// [`Codegen::release()`].
    pub fn expression(&mut self, node: &Node) -> Lower<Reg> {
        self.nested(|s| match node {
            Node::IntLiteral(value) => s.constant(*value),

            Node::FloatLiteral(value) => {
                let truncated = value.trunc() as i64;
                s.comment(format!("float {} truncated to {}", value, truncated));
                s.constant(truncated)
            }

            Node::CharLiteral(c) => s.constant(code_point(c)),
            Node::StringLiteral(_) => s.fail(LowerError::UnsupportedConstruct(node.kind_name())),

            Node::Identifier(name) => {
                s.locate(name);
                let at = s.at();
                let offset = s.symbols.load(name.val().as_ref()).map_err(at)?.offset();

                let reg = s.allocate()?;
                s.emit(Instruction::Mov(Operand::Frame(offset), reg.into()));

                Ok(reg)
            }

            Node::BinaryOp { op, left, right } => match op {
                BinOp::And | BinOp::Or => s.logical(*op, left, right),
                _ => s.chain(node),
            },

            Node::UnaryOp { op, operand } => {
                let reg = s.expression(operand)?;
                match op {
                    UnOp::Plus => (),
                    UnOp::Negate => s.emit(Instruction::Neg(reg)),
                    UnOp::BitNot => s.emit(Instruction::Not(reg)),
                    UnOp::Not => {
                        s.emit(Instruction::Test(reg, reg));
                        s.emit(Instruction::Set(Condition::Zero));
                        s.emit(Instruction::Movzb(reg));
                    }
                }

                Ok(reg)
            }

            Node::Assign { target, value } => {
                let reg = s.expression(value)?;

                s.locate(target);
                let offset = s.store(target.val(), reg)?;
                s.comment(format!("{} = {}", target.val(), reg));
                trace!(%reg, offset, "assignment");

                Ok(reg)
            }

            statement => s.fail(LowerError::UnsupportedConstruct(statement.kind_name())),
        })
    }

    /// Devuelve un registro obtenido de [`Codegen::expression()`].
    pub fn release(&mut self, reg: Reg) {
        self.registers.free(reg);
    }

    fn reset(&mut self) {
        self.registers.reset();
        self.symbols.clear();
        self.labels = 0;
        self.strings = 0;
        self.depth = 0;
        self.last_known = Position::default();
        self.text.clear();
        self.data.clear();
        self.has_result = false;
    }

    fn statement(&mut self, node: &Node) -> Lower<()> {
        self.nested(|s| match node {
            Node::VarDecl { typ, name, init } => {
                s.locate(name);
                let at = s.at();
                let offset = s.symbols.declare(name.val(), *typ).map_err(at)?.offset();

                s.comment(format!("{} {} at {}(%rbp)", typ, name.val(), offset));

                if let Some(init) = init {
                    let reg = s.expression(init)?;

                    s.locate(name);
                    s.store(name.val(), reg)?;
                    s.release(reg);
                }

                Ok(())
            }

            Node::ExpressionStmt(expr) => s.expression_statement(expr),

            Node::CompoundStmt(statements) => {
                s.symbols.enter_scope();
                for statement in statements {
                    s.statement(statement)?;
                }

                s.symbols.exit_scope();
                Ok(())
            }

            Node::IfStmt {
                condition,
                then,
                otherwise,
            } => {
                let id = s.next_label();
                let end = label("end", id);

                match otherwise {
                    None => {
                        s.branch_unless(condition, &end)?;
                        s.statement(then)?;
                    }

                    Some(otherwise) => {
                        let other = label("else", id);

                        s.branch_unless(condition, &other)?;
                        s.statement(then)?;
                        s.emit(Instruction::Jump(end.clone()));

                        s.place(other);
                        s.statement(otherwise)?;
                    }
                }

                s.place(end);
                Ok(())
            }

            Node::WhileStmt { condition, body } => {
                let id = s.next_label();
                let (top, end) = (label("while", id), label("end", id));

                s.place(top.clone());
                s.branch_unless(condition, &end)?;
                s.statement(body)?;
                s.emit(Instruction::Jump(top));
                s.place(end);

                Ok(())
            }

            Node::ForStmt {
                init,
                condition,
                update,
                body,
            } => {
                s.symbols.enter_scope();
                if let Some(init) = init {
                    s.discard_or_statement(init)?;
                }

                let id = s.next_label();
                let (top, end) = (label("for", id), label("end", id));

                s.place(top.clone());
                if let Some(condition) = condition {
                    s.branch_unless(condition, &end)?;
                }

                s.statement(body)?;
                if let Some(update) = update {
                    s.discard_or_statement(update)?;
                }

                s.emit(Instruction::Jump(top));
                s.place(end);
                s.symbols.exit_scope();

                Ok(())
            }

            Node::ReturnStmt(value) => {
                if let Some(value) = value {
                    let reg = s.expression(value)?;
                    s.emit(Instruction::Mov(reg.into(), Reg::RESULT.into()));
                    s.release(reg);

                    s.has_result = true;
                }

                s.emit(Instruction::Jump(exit_label()));
                Ok(())
            }

            Node::PrintStmt(items) => {
                for item in items {
                    s.print(item)?;
                }

                Ok(())
            }

            Node::ReadStmt(targets) => {
                for target in targets {
                    s.locate(target);
                    s.call(READ_INT);
                    s.store(target.val(), Reg::Rax)?;
                }

                Ok(())
            }

            expr if expr.is_expression() => s.expression_statement(expr),
            other => s.fail(LowerError::UnsupportedConstruct(other.kind_name())),
        })
    }

    /// El valor queda en el registro de resultado del programa.
    fn expression_statement(&mut self, expr: &Node) -> Lower<()> {
        let reg = self.expression(expr)?;
        self.emit(Instruction::Mov(reg.into(), Reg::RESULT.into()));
        self.release(reg);

        self.has_result = true;
        Ok(())
    }

    /// Inicialización o actualización de `for`; el valor de una expresión se descarta.
    fn discard_or_statement(&mut self, node: &Node) -> Lower<()> {
        if node.is_expression() {
            let reg = self.expression(node)?;
            self.release(reg);

            Ok(())
        } else {
            self.statement(node)
        }
    }

    /// Salta a `target` si la condición evalúa a cero.
    fn branch_unless(&mut self, condition: &Node, target: &Label) -> Lower<()> {
        let reg = self.expression(condition)?;
        self.emit(Instruction::Test(reg, reg));
        self.emit(Instruction::JumpIf(Condition::Zero, target.clone()));
        self.release(reg);

        Ok(())
    }

    fn print(&mut self, item: &Node) -> Lower<()> {
        let builtin = match item {
            Node::StringLiteral(string) => {
                let address = self.string(string);
                self.emit(Instruction::Lea(Operand::Address(address), Reg::ARGUMENT));

                PRINT_STR
            }

            Node::CharLiteral(c) => {
                let value = Operand::Imm(code_point(c));
                self.emit(Instruction::Mov(value, Reg::ARGUMENT.into()));

                PRINT_CHAR
            }

            expr => {
                let builtin = match expr {
                    Node::Identifier(name) if self.is_char(name.val()) => PRINT_CHAR,
                    _ => PRINT_INT,
                };

                let reg = self.expression(expr)?;
                self.emit(Instruction::Mov(reg.into(), Reg::ARGUMENT.into()));
                self.release(reg);

                builtin
            }
        };

        self.call(builtin);
        Ok(())
    }

    fn is_char(&self, name: &Identifier) -> bool {
        let symbol = self.symbols.lookup(name.as_ref());
        matches!(symbol.map(|symbol| symbol.kind()), Ok(Type::Char))
    }

    /// Llama a un builtin del runtime.
    fn call(&mut self, builtin: &'static str) {
        debug_assert!(
            self.registers.live().all(|reg| !reg.is_caller_saved()),
            "caller-saved temporaries live across call to {}",
            builtin
        );

        self.emit(Instruction::Call(Label::new(builtin)));
    }

    /// Operadores binarios no lógicos, encadenados por la izquierda.
    ///
    /// El orden de evaluación y de asignación de registros es el mismo
    /// que el de un recorrido recursivo.
    fn chain(&mut self, node: &Node) -> Lower<Reg> {
        let mut spine = Vec::new();
        let mut leftmost = node;

        while let Node::BinaryOp { op, left, right } = leftmost {
            if matches!(op, BinOp::And | BinOp::Or) {
                break;
            }

            spine.push((*op, &**right));
            leftmost = &**left;
        }

        let accumulator = self.expression(leftmost)?;
        for (op, right) in spine.into_iter().rev() {
            let right = self.expression(right)?;

            self.combine(op, accumulator, right);
            self.release(right);
        }

        Ok(accumulator)
    }

    /// `&&` y `||`, normalizados a 0 o 1.
    fn logical(&mut self, op: BinOp, left: &Node, right: &Node) -> Lower<Reg> {
        let id = self.next_label();
        let (prefix, decided_on, decided) = match op {
            BinOp::And => ("and", Condition::Zero, 0),
            _ => ("or", Condition::NotZero, 1),
        };

        let (short, end) = (label(prefix, id), label("end", id));
        let eager = self.options.lowering.contains(LowerOptions::EAGER_LOGIC);

        let result = self.expression(left)?;
        let other = if eager {
            Some(self.expression(right)?)
        } else {
            None
        };

        self.emit(Instruction::Test(result, result));
        self.emit(Instruction::JumpIf(decided_on, short.clone()));

        let other = match other {
            Some(other) => other,
            None => self.expression(right)?,
        };

        self.emit(Instruction::Test(other, other));
        self.emit(Instruction::JumpIf(decided_on, short.clone()));
        self.release(other);

        self.emit(Instruction::Mov(Operand::Imm(1 - decided), result.into()));
        self.emit(Instruction::Jump(end.clone()));
        self.place(short);
        self.emit(Instruction::Mov(Operand::Imm(decided), result.into()));
        self.place(end);

        Ok(result)
    }

    /// Combina dos operandos, dejando el resultado en `left`.
    fn combine(&mut self, op: BinOp, left: Reg, right: Reg) {
        use Instruction::*;

        let source = Operand::Reg(right);
        match op {
            BinOp::Add => self.emit(Add(source, left)),
            BinOp::Sub => self.emit(Sub(source, left)),
            BinOp::Mul => self.emit(Imul(source, left)),
            BinOp::BitAnd => self.emit(And(source, left)),
            BinOp::BitOr => self.emit(Or(source, left)),
            BinOp::BitXor => self.emit(Xor(source, left)),

            BinOp::Div | BinOp::Mod => {
                // %rax y %rdx son implícitos en idiv
                self.emit(Push(Reg::Rax));
                self.emit(Push(Reg::Rdx));
                self.emit(Mov(left.into(), Reg::Rax.into()));
                self.emit(Cqto);
                self.emit(Idiv(right));

                let output = if op == BinOp::Div { Reg::Rax } else { Reg::Rdx };
                self.emit(Mov(output.into(), left.into()));
                self.emit(Pop(Reg::Rdx));
                self.emit(Pop(Reg::Rax));
            }

            BinOp::Shl | BinOp::Shr => {
                // La cuenta de un desplazamiento variable solo puede estar en %cl
                self.emit(Push(Reg::Rcx));
                self.emit(Mov(source, Reg::Rcx.into()));
                self.emit(if op == BinOp::Shl { Sal(left) } else { Sar(left) });
                self.emit(Pop(Reg::Rcx));
            }

            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
                let condition = match op {
                    BinOp::Eq => Condition::Equal,
                    BinOp::Ne => Condition::NotEqual,
                    BinOp::Lt => Condition::Less,
                    BinOp::Gt => Condition::Greater,
                    BinOp::Le => Condition::LessOrEqual,
                    _ => Condition::GreaterOrEqual,
                };

                self.emit(Cmp(source, left));
                self.emit(Set(condition));
                self.emit(Movzb(left));
            }

            BinOp::And | BinOp::Or => unreachable!("logical operators branch"),
        }
    }

    fn constant(&mut self, value: i64) -> Lower<Reg> {
        let reg = self.allocate()?;
        self.emit(Instruction::Mov(Operand::Imm(value), reg.into()));

        Ok(reg)
    }

    /// Escribe un registro en el slot de una variable y la marca inicializada.
    fn store(&mut self, name: &Identifier, reg: Reg) -> Lower<i32> {
        let at = self.at();
        let offset = self
            .symbols
            .mark_initialized(name.as_ref())
            .map_err(at)?
            .offset();

        self.emit(Instruction::Mov(reg.into(), Operand::Frame(offset)));
        Ok(offset)
    }

    fn string(&mut self, string: &str) -> Label {
        let address = label("str", self.strings);
        self.strings += 1;

        self.data.push(Line::Label(address.clone()));
        self.data.push(Line::Ascii(string.to_owned()));

        address
    }

    fn allocate(&mut self) -> Lower<Reg> {
        let position = self.last_known;
        self.registers
            .allocate()
            .map_err(|error| Located::at(error, position))
    }

    /// Aplica una regla contando un nivel más de anidamiento.
    fn nested<T, F>(&mut self, rule: F) -> Lower<T>
    where
        F: FnOnce(&mut Self) -> Lower<T>,
    {
        let max_depth = self.options.max_depth;
        if self.depth >= max_depth {
            return self.fail(LowerError::NestingTooDeep(max_depth));
        }

        self.depth += 1;
        let result = rule(self);
        self.depth -= 1;

        result
    }

    fn next_label(&mut self) -> u32 {
        let id = self.labels;
        self.labels += 1;

        id
    }

    fn locate(&mut self, name: &Located<Identifier>) {
        self.last_known = name.position();
    }

    /// Ubica un error semántico en la última posición conocida.
    fn at(&self) -> impl FnOnce(SemanticError) -> Located<LowerError> {
        let position = self.last_known;
        move |error| Located::at(error.into(), position)
    }

    fn fail<T>(&self, error: LowerError) -> Lower<T> {
        Err(Located::at(error, self.last_known))
    }

    fn emit(&mut self, instruction: Instruction) {
        trace!(%instruction, "emit");
        self.text.push(Line::Op(instruction));
    }

    fn place(&mut self, label: Label) {
        self.text.push(Line::Label(label));
    }

    fn comment(&mut self, text: String) {
        if self.options.lowering.contains(LowerOptions::COMMENTS) {
            self.text.push(Line::Comment(text));
        }
    }

    /// Ensambla preámbulo, cuerpo, postámbulo y datos.
    fn finish(&mut self) -> Assembly {
        use Instruction::*;

        let comments = self.options.lowering.contains(LowerOptions::COMMENTS);
        let mut lines = Vec::new();

        if comments {
            lines.push(Line::Directive(String::from("# Generated by tinycxx")));
            lines.push(Line::Directive(String::from("# x86-64 assembly, AT&T syntax")));
        }

        lines.push(Line::Directive(String::from(".section .text")));
        lines.push(Line::Directive(String::from(".global _start")));
        lines.push(Line::Label(Label::new("_start")));

        // Se reservan slots de variables más relleno, considerando el
        // %rbp que se empuja, para que %rsp quede alineado en cada call
        let slots = self.symbols.frame_size() / VALUE_SIZE;
        let reserved = (slots + arch::alignment_for(slots + 1)) * VALUE_SIZE;

        let op = Line::Op;
        lines.push(op(Push(Reg::Rbp)));
        lines.push(op(Mov(Reg::Rsp.into(), Reg::Rbp.into())));
        lines.push(op(Sub(Operand::Imm(reserved as i64), Reg::Rsp)));

        if self.has_result {
            lines.push(op(Mov(Operand::Imm(0), Reg::RESULT.into())));
        }

        lines.append(&mut self.text);

        lines.push(Line::Label(exit_label()));
        if comments {
            lines.push(Line::Comment(String::from("exit with the program result")));
        }

        let status = match self.has_result {
            true => Operand::Reg(Reg::RESULT),
            false => Operand::Imm(0),
        };

        lines.push(op(Mov(status, Reg::Rdi.into())));
        lines.push(op(Mov(Reg::Rbp.into(), Reg::Rsp.into())));
        lines.push(op(Pop(Reg::Rbp)));
        lines.push(op(Mov(Operand::Imm(SYS_EXIT), Reg::Rax.into())));
        lines.push(op(Syscall));

        if !self.data.is_empty() {
            lines.push(Line::Directive(String::from(".section .data")));
            lines.append(&mut self.data);
        }

        Assembly::new(lines)
    }
}

fn label(prefix: &str, id: u32) -> Label {
    Label::new(&format!("_{}_{}", prefix, id))
}

fn exit_label() -> Label {
    Label::new("_exit")
}

fn code_point(c: &str) -> i64 {
    c.chars().next().map_or(0, |c| c as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        lex::Tokens,
        parse::{Parser, Type},
    };

    fn parse(text: &str) -> Node {
        let tokens: Tokens = text.parse().unwrap();
        Parser::new(tokens, 64).parse_expression().unwrap()
    }

    fn ops(assembly: &Assembly) -> Vec<String> {
        assembly
            .lines()
            .iter()
            .filter(|line| matches!(line, Line::Op(_) | Line::Label(_)))
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn registers_balance_after_each_expression() {
        let options = Options::default();
        let mut codegen = Codegen::new(&options);

        for text in ["1", "2 + 3 * 4", "(1 - 2) / (3 % 4) << 1", "!(1 < 2) || 3 && 0"] {
            let reg = codegen.expression(&parse(text)).unwrap();
            assert_eq!(codegen.live_registers(), 1, "{}", text);

            codegen.release(reg);
            assert_eq!(codegen.live_registers(), 0, "{}", text);
        }
    }

    #[test]
    fn operands_are_freed_as_they_are_consumed() {
        let options = Options::default();
        let mut codegen = Codegen::new(&options);

        // Cada nivel anidado por la derecha retiene un registro más
        let reg = codegen.expression(&parse("1 + (2 + (3 + 4))")).unwrap();
        assert_eq!(reg, Reg::R8);
        assert_eq!(codegen.live_registers(), 1);
    }

    #[test]
    fn division_saves_implicit_registers() {
        let assembly = lower(&parse("7 / 2"), &Options::default()).unwrap();
        let ops = ops(&assembly);
        let start = ops.iter().position(|op| op == "    pushq %rax").unwrap();

        assert_eq!(
            &ops[start..start + 8],
            [
                "    pushq %rax",
                "    pushq %rdx",
                "    movq %r8, %rax",
                "    cqto",
                "    idivq %r9",
                "    movq %rax, %r8",
                "    popq %rdx",
                "    popq %rax",
            ]
        );
    }

    #[test]
    fn frame_stays_aligned() {
        let options = Options::default();
        let reserved = |text: &str| {
            let tokens: Tokens = text.parse().unwrap();
            let program = Parser::new(tokens, 64).parse_program().into_result().unwrap();
            let assembly = lower(&program, &options).unwrap();

            assembly
                .lines()
                .iter()
                .find_map(|line| match line {
                    Line::Op(Instruction::Sub(Operand::Imm(bytes), Reg::Rsp)) => Some(*bytes),
                    _ => None,
                })
                .unwrap()
        };

        assert_eq!(reserved("1;"), 8);
        assert_eq!(reserved("int a;"), 8);
        assert_eq!(reserved("int a; int b;"), 24);
        assert_eq!(reserved("int a; int b; int c;"), 24);
    }

    #[test]
    fn unsupported_constructs() {
        let options = Options::default();
        let error = lower(&parse("\"hola\" + 1"), &options).unwrap_err();
        assert!(matches!(
            error.as_ref(),
            LowerError::UnsupportedConstruct("string literal")
        ));

        let nested = Node::Program(vec![Node::Program(Vec::new())]);
        let error = lower(&nested, &options).unwrap_err();
        assert!(matches!(
            error.as_ref(),
            LowerError::UnsupportedConstruct("program")
        ));
    }

    #[test]
    fn semantic_errors_are_located() {
        let options = Options::default();
        let text = "int x = 1;\ny = x;";
        let (_, stream) = crate::source::chars(text, "<test>");
        let program = Parser::new(crate::lex::Lexer::new(stream), 64)
            .parse_program()
            .into_result()
            .unwrap();

        let error = lower(&program, &options).unwrap_err();
        assert_eq!(error.position(), Position::new(2, 1));
        assert!(matches!(
            error.as_ref(),
            LowerError::Semantic(SemanticError::UndeclaredVariable(name)) if name.as_ref() == "y"
        ));
    }

    #[test]
    fn declarations_reserve_slots() {
        let options = Options::default();
        let mut codegen = Codegen::new(&options);
        let name = Located::at(Identifier::from("x"), Position::default());
        let declaration = Node::VarDecl {
            typ: Type::Int,
            name,
            init: Some(Box::new(Node::IntLiteral(4))),
        };

        let assembly = codegen.lower(&declaration).unwrap();
        assert!(ops(&assembly).contains(&String::from("    movq %r8, -8(%rbp)")));
        assert_eq!(codegen.live_registers(), 0);
    }

    #[test]
    fn comments_are_optional() {
        let options = Options {
            lowering: LowerOptions::empty(),
            ..Options::default()
        };

        let assembly = lower(&parse("1.9"), &options).unwrap();
        assert!(assembly
            .lines()
            .iter()
            .all(|line| !matches!(line, Line::Comment(_))));

        assert!(ops(&assembly).contains(&String::from("    movq $1, %r8")));
    }
}
