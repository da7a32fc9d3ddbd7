//! Análisis sintáctico.
//!
//! Las expresiones se analizan por escalada de precedencia: cada operador
//! binario tiene un nivel fijo y una asociatividad, y el lado derecho se
//! analiza con un umbral mínimo de `nivel + 1` (asociativo por la izquierda)
//! o `nivel` (asociativo por la derecha). Las sentencias se analizan por
//! descenso recursivo según el primer token.
//!
//! Los errores sintácticos se recuperan a nivel de sentencia. El parser
//! descarta tokens hasta una frontera reconocible y continúa, de forma
//! que un mismo análisis reporta todos los errores del programa.

use std::fmt::{self, Display};
use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    lex::{Identifier, Keyword, LexerError, Scanner, Token, TokenKind},
    source::{Located, Position},
};

/// Precedencia de la familia de asignación.
const ASSIGN: u8 = 2;

/// Tipo declarado de una variable.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Int,
    Float,
    Char,
    Bool,
}

impl Display for Type {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Int => "int",
            Type::Float => "float",
            Type::Char => "char",
            Type::Bool => "bool",
        };

        fmt.write_str(name)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        use BinOp::*;

        match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
            Eq => "==",
            Ne => "!=",
            Lt => "<",
            Gt => ">",
            Le => "<=",
            Ge => ">=",
            And => "&&",
            Or => "||",
            BitAnd => "&",
            BitOr => "|",
            BitXor => "^",
            Shl => "<<",
            Shr => ">>",
        }
    }
}

impl Display for BinOp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(self.symbol())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnOp {
    Negate,
    Plus,
    Not,
    BitNot,
}

impl UnOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnOp::Negate => "-",
            UnOp::Plus => "+",
            UnOp::Not => "!",
            UnOp::BitNot => "~",
        }
    }
}

/// Nodo del árbol de sintaxis.
///
/// Cada nodo es dueño exclusivo de sus hijos. El árbol no se modifica
/// después de construido.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    IntLiteral(i64),
    FloatLiteral(f64),
    StringLiteral(String),
    CharLiteral(String),
    Identifier(Located<Identifier>),

    BinaryOp {
        op: BinOp,
        left: Box<Node>,
        right: Box<Node>,
    },

    UnaryOp {
        op: UnOp,
        operand: Box<Node>,
    },

    Assign {
        target: Located<Identifier>,
        value: Box<Node>,
    },

    VarDecl {
        typ: Type,
        name: Located<Identifier>,
        init: Option<Box<Node>>,
    },

    ExpressionStmt(Box<Node>),
    CompoundStmt(Vec<Node>),

    IfStmt {
        condition: Box<Node>,
        then: Box<Node>,
        otherwise: Option<Box<Node>>,
    },

    WhileStmt {
        condition: Box<Node>,
        body: Box<Node>,
    },

    /// `init` es una declaración o una expresión; `update` siempre es
    /// una expresión cuyo valor se descarta.
    ForStmt {
        init: Option<Box<Node>>,
        condition: Option<Box<Node>>,
        update: Option<Box<Node>>,
        body: Box<Node>,
    },

    ReturnStmt(Option<Box<Node>>),
    PrintStmt(Vec<Node>),
    ReadStmt(Vec<Located<Identifier>>),
    Program(Vec<Node>),
}

impl Node {
    /// Nombre de la clase de nodo, para diagnósticos.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::IntLiteral(_) => "integer literal",
            Node::FloatLiteral(_) => "float literal",
            Node::StringLiteral(_) => "string literal",
            Node::CharLiteral(_) => "character literal",
            Node::Identifier(_) => "identifier",
            Node::BinaryOp { .. } => "binary operation",
            Node::UnaryOp { .. } => "unary operation",
            Node::Assign { .. } => "assignment",
            Node::VarDecl { .. } => "declaration",
            Node::ExpressionStmt(_) => "expression statement",
            Node::CompoundStmt(_) => "compound statement",
            Node::IfStmt { .. } => "if statement",
            Node::WhileStmt { .. } => "while statement",
            Node::ForStmt { .. } => "for statement",
            Node::ReturnStmt(_) => "return statement",
            Node::PrintStmt(_) => "print statement",
            Node::ReadStmt(_) => "read statement",
            Node::Program(_) => "program",
        }
    }

    /// Determina si el nodo produce un valor.
    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            Node::IntLiteral(_)
                | Node::FloatLiteral(_)
                | Node::StringLiteral(_)
                | Node::CharLiteral(_)
                | Node::Identifier(_)
                | Node::BinaryOp { .. }
                | Node::UnaryOp { .. }
                | Node::Assign { .. }
        )
    }
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Expected {0}, found {1} instead")]
    UnexpectedToken(TokenKind, Token),

    #[error("Expected an expression, found {0} instead")]
    ExpectedExpr(Token),

    #[error("Expected identifier, found {0} instead")]
    ExpectedId(Token),

    #[error("Invalid assignment target")]
    InvalidTarget,

    #[error("Expected end of input, found {0} instead")]
    TrailingInput(Token),

    #[error("Nesting depth exceeds the limit of {0}")]
    NestingTooDeep(usize),

    #[error("Malformed literal `{0}`")]
    BadLiteral(String),

    #[error(transparent)]
    Lexical(#[from] LexerError),
}

pub type SyntaxError = Located<ParserError>;

/// Resultado de un análisis con recuperación de errores.
///
/// `value` siempre existe, aunque omite las sentencias que fallaron.
#[derive(Debug)]
pub struct Recovered<T> {
    pub value: T,
    pub errors: Vec<SyntaxError>,
}

impl<T> Recovered<T> {
    pub fn into_result(self) -> Result<T, Vec<SyntaxError>> {
        if self.errors.is_empty() {
            Ok(self.value)
        } else {
            Err(self.errors)
        }
    }
}

type Parse<T> = Result<T, SyntaxError>;

#[derive(Copy, Clone, PartialEq, Eq)]
enum Assoc {
    Left,
    Right,
}

/// Operadores infijos: precedencia y asociatividad.
fn infix(kind: TokenKind) -> Option<(u8, Assoc)> {
    use TokenKind::*;

    let precedence = match kind {
        Assign | PlusAssign | MinusAssign | TimesAssign | DivideAssign => {
            return Some((ASSIGN, Assoc::Right))
        }

        Or => 3,
        And => 5,
        BitOr => 13,
        BitXor => 14,
        BitAnd => 15,
        Equal | NotEqual => 20,
        Less | Greater | LessOrEqual | GreaterOrEqual => 25,
        Plus | Minus => 30,
        ShiftLeft | ShiftRight => 35,
        Times | Divide | Percent => 40,
        _ => return None,
    };

    Some((precedence, Assoc::Left))
}

fn binary(kind: TokenKind) -> Option<BinOp> {
    use TokenKind::*;

    let op = match kind {
        Plus | PlusAssign | Increment => BinOp::Add,
        Minus | MinusAssign | Decrement => BinOp::Sub,
        Times | TimesAssign => BinOp::Mul,
        Divide | DivideAssign => BinOp::Div,
        Percent => BinOp::Mod,
        Equal => BinOp::Eq,
        NotEqual => BinOp::Ne,
        Less => BinOp::Lt,
        Greater => BinOp::Gt,
        LessOrEqual => BinOp::Le,
        GreaterOrEqual => BinOp::Ge,
        And => BinOp::And,
        Or => BinOp::Or,
        BitAnd => BinOp::BitAnd,
        BitOr => BinOp::BitOr,
        BitXor => BinOp::BitXor,
        ShiftLeft => BinOp::Shl,
        ShiftRight => BinOp::Shr,
        _ => return None,
    };

    Some(op)
}

pub struct Parser<S: Scanner> {
    scanner: S,
    max_depth: usize,
    depth: usize,
    consumed: usize,
    last_known: Position,
    errors: Vec<SyntaxError>,

    /// Dentro de un operando de `cout`/`cin`, `<<` y `>>` son separadores.
    stream: bool,
}

impl<S: Scanner> Parser<S> {
    /// Construye un parser con el límite de anidamiento indicado.
    pub fn new(scanner: S, max_depth: usize) -> Self {
        Parser {
            scanner,
            max_depth,
            depth: 0,
            consumed: 0,
            last_known: Position::default(),
            errors: Vec::new(),
            stream: false,
        }
    }

    /// Analiza un programa completo.
    ///
    /// Los errores se ordenan por posición. Las sentencias con errores
    /// no aparecen en el árbol resultante.
    pub fn parse_program(&mut self) -> Recovered<Node> {
        let statements = self.statement_list(false);

        let mut errors = std::mem::take(&mut self.errors);
        errors.sort_by_key(Located::position);

        Recovered {
            value: Node::Program(statements),
            errors,
        }
    }

    /// Analiza una única expresión, opcionalmente seguida por `;`.
    pub fn parse_expression(&mut self) -> Result<Node, SyntaxError> {
        let expr = self.expression(0)?;
        if self.peek() == TokenKind::Semicolon {
            self.next();
        }

        if self.peek() != TokenKind::Eof {
            return self.unexpected(ParserError::TrailingInput);
        }

        match self.errors.is_empty() {
            true => Ok(expr),
            false => Err(self.errors.remove(0)),
        }
    }

    fn statement_list(&mut self, nested: bool) -> Vec<Node> {
        let mut statements = Vec::new();

        loop {
            match self.peek() {
                TokenKind::Eof => break statements,
                TokenKind::CloseCurly if nested => break statements,
                _ => (),
            }

            let start = self.consumed;
            match self.statement() {
                Ok(statement) => statements.push(statement),
                Err(error) => {
                    debug!(%error, "recovering from syntax error");

                    self.errors.push(error);
                    self.synchronize(start, nested);
                }
            }
        }
    }

    /// Descarta tokens hasta una frontera de sentencia.
    ///
    /// `;` se consume; `}` y las palabras clave que inician sentencias no.
    /// Siempre se consume al menos un token desde `start`.
    fn synchronize(&mut self, start: usize, nested: bool) {
        loop {
            match self.peek() {
                TokenKind::Eof => break,

                TokenKind::Semicolon => {
                    self.next();
                    break;
                }

                TokenKind::CloseCurly if nested => break,
                TokenKind::Keyword(keyword)
                    if keyword.starts_statement() && self.consumed > start =>
                {
                    break
                }

                _ => {
                    let skipped = self.next();
                    trace!(%skipped, "discarded");
                }
            }
        }
    }

    fn statement(&mut self) -> Parse<Node> {
        self.nested(|s| match s.peek() {
            TokenKind::Keyword(keyword) if keyword.is_type() => {
                let declaration = s.declaration()?;
                s.expect(TokenKind::Semicolon)?;

                Ok(declaration)
            }

            TokenKind::OpenCurly => s.compound(),
            TokenKind::Keyword(Keyword::If) => s.if_statement(),
            TokenKind::Keyword(Keyword::While) => s.while_statement(),
            TokenKind::Keyword(Keyword::For) => s.for_statement(),
            TokenKind::Keyword(Keyword::Return) => s.return_statement(),
            TokenKind::Keyword(Keyword::Cout) => s.print_statement(),
            TokenKind::Keyword(Keyword::Cin) => s.read_statement(),

            TokenKind::Semicolon => {
                s.next();
                Ok(Node::CompoundStmt(Vec::new()))
            }

            _ => {
                let expr = s.expression(0)?;
                s.expect(TokenKind::Semicolon)?;

                Ok(Node::ExpressionStmt(Box::new(expr)))
            }
        })
    }

    /// `type ident [= expr]`, sin el `;` final.
    fn declaration(&mut self) -> Parse<Node> {
        let typ = self.typ()?;
        let name = self.id()?;

        let init = match self.peek() {
            TokenKind::Assign => {
                self.next();
                Some(Box::new(self.expression(0)?))
            }

            _ => None,
        };

        Ok(Node::VarDecl { typ, name, init })
    }

    fn compound(&mut self) -> Parse<Node> {
        self.expect(TokenKind::OpenCurly)?;
        let statements = self.statement_list(true);
        self.expect(TokenKind::CloseCurly)?;

        Ok(Node::CompoundStmt(statements))
    }

    fn if_statement(&mut self) -> Parse<Node> {
        self.keyword(Keyword::If)?;
        let condition = self.condition()?;
        let then = Box::new(self.statement()?);

        let otherwise = match self.peek() {
            TokenKind::Keyword(Keyword::Else) => {
                self.next();
                Some(Box::new(self.statement()?))
            }

            _ => None,
        };

        Ok(Node::IfStmt {
            condition,
            then,
            otherwise,
        })
    }

    fn while_statement(&mut self) -> Parse<Node> {
        self.keyword(Keyword::While)?;
        let condition = self.condition()?;
        let body = Box::new(self.statement()?);

        Ok(Node::WhileStmt { condition, body })
    }

    fn for_statement(&mut self) -> Parse<Node> {
        self.keyword(Keyword::For)?;
        self.expect(TokenKind::OpenParen)?;

        let init = match self.peek() {
            TokenKind::Semicolon => None,
            TokenKind::Keyword(keyword) if keyword.is_type() => Some(self.declaration()?),
            _ => Some(self.expression(0)?),
        };

        self.expect(TokenKind::Semicolon)?;
        let condition = self.optional_expression(TokenKind::Semicolon)?;
        self.expect(TokenKind::Semicolon)?;
        let update = self.optional_expression(TokenKind::CloseParen)?;
        self.expect(TokenKind::CloseParen)?;

        let body = Box::new(self.statement()?);

        Ok(Node::ForStmt {
            init: init.map(Box::new),
            condition: condition.map(Box::new),
            update: update.map(Box::new),
            body,
        })
    }

    fn return_statement(&mut self) -> Parse<Node> {
        self.keyword(Keyword::Return)?;
        let value = self.optional_expression(TokenKind::Semicolon)?;
        self.expect(TokenKind::Semicolon)?;

        Ok(Node::ReturnStmt(value.map(Box::new)))
    }

    /// `cout << e << e ...;`, donde `<<` solo separa operandos.
    fn print_statement(&mut self) -> Parse<Node> {
        self.keyword(Keyword::Cout)?;

        let mut items = Vec::new();
        loop {
            self.expect(TokenKind::ShiftLeft)?;

            self.stream = true;
            let item = self.expression(0);
            self.stream = false;

            items.push(item?);

            if self.peek() != TokenKind::ShiftLeft {
                break;
            }
        }

        self.expect(TokenKind::Semicolon)?;
        Ok(Node::PrintStmt(items))
    }

    fn read_statement(&mut self) -> Parse<Node> {
        self.keyword(Keyword::Cin)?;

        let mut targets = Vec::new();
        loop {
            self.expect(TokenKind::ShiftRight)?;
            targets.push(self.id()?);

            if self.peek() != TokenKind::ShiftRight {
                break;
            }
        }

        self.expect(TokenKind::Semicolon)?;
        Ok(Node::ReadStmt(targets))
    }

    /// `( expr )` de `if` y `while`.
    fn condition(&mut self) -> Parse<Box<Node>> {
        self.expect(TokenKind::OpenParen)?;
        let condition = self.expression(0)?;
        self.expect(TokenKind::CloseParen)?;

        Ok(Box::new(condition))
    }

    fn optional_expression(&mut self, end: TokenKind) -> Parse<Option<Node>> {
        if self.peek() == end {
            Ok(None)
        } else {
            self.expression(0).map(Some)
        }
    }

    fn expression(&mut self, min: u8) -> Parse<Node> {
        self.nested(|s| {
            let mut left = s.unary()?;

            loop {
                let kind = s.peek();
                let separator = matches!(kind, TokenKind::ShiftLeft | TokenKind::ShiftRight);
                let (precedence, assoc) = match infix(kind) {
                    Some(_) if s.stream && separator => break Ok(left),
                    Some((precedence, assoc)) if precedence >= min => (precedence, assoc),
                    _ => break Ok(left),
                };

                s.next();
                let threshold = match assoc {
                    Assoc::Left => precedence + 1,
                    Assoc::Right => precedence,
                };

                let right = s.expression(threshold)?;
                left = match (kind, binary(kind)) {
                    (TokenKind::Assign, _) => s.assignment(left, right)?,
                    (_, Some(op)) if precedence == ASSIGN => {
                        let target = s.target(&left)?;
                        s.assignment(left, binary_op(op, Node::Identifier(target), right))?
                    }

                    (_, Some(op)) => binary_op(op, left, right),
                    (_, None) => break s.fail(ParserError::InvalidTarget),
                };
            }
        })
    }

    fn assignment(&mut self, target: Node, value: Node) -> Parse<Node> {
        Ok(Node::Assign {
            target: self.target(&target)?,
            value: Box::new(value),
        })
    }

    /// Operadores prefijos, que se aplican recursivamente.
    fn unary(&mut self) -> Parse<Node> {
        let op = match self.peek() {
            TokenKind::Minus => UnOp::Negate,
            TokenKind::Plus => UnOp::Plus,
            TokenKind::Not => UnOp::Not,
            TokenKind::BitNot => UnOp::BitNot,

            kind @ (TokenKind::Increment | TokenKind::Decrement) => {
                self.next();

                let operand = self.nested(Self::unary)?;
                let target = self.target(&operand)?;
                let op = binary(kind).unwrap_or(BinOp::Add);

                return self.assignment(operand, binary_op(op, Node::Identifier(target), one()));
            }

            _ => return self.postfix(),
        };

        self.next();
        let operand = Box::new(self.nested(Self::unary)?);

        Ok(Node::UnaryOp { op, operand })
    }

    /// `x++` y `x--` producen el valor previo: `(x = x ± 1) ∓ 1`.
    fn postfix(&mut self) -> Parse<Node> {
        let mut operand = self.primary()?;

        loop {
            let (step, undo) = match self.peek() {
                TokenKind::Increment => (BinOp::Add, BinOp::Sub),
                TokenKind::Decrement => (BinOp::Sub, BinOp::Add),
                _ => break Ok(operand),
            };

            self.next();
            let target = self.target(&operand)?;
            let update = self.assignment(operand, binary_op(step, Node::Identifier(target), one()))?;

            operand = binary_op(undo, update, one());
        }
    }

    fn primary(&mut self) -> Parse<Node> {
        let node = match self.peek() {
            TokenKind::IntLiteral => {
                let token = self.next();
                Node::IntLiteral(self.literal(&token.lexeme)?)
            }

            TokenKind::FloatLiteral => {
                let token = self.next();
                Node::FloatLiteral(self.literal(&token.lexeme)?)
            }

            TokenKind::StringLiteral => Node::StringLiteral(self.next().lexeme),
            TokenKind::CharLiteral => Node::CharLiteral(self.next().lexeme),
            TokenKind::Id => Node::Identifier(self.id()?),

            TokenKind::Keyword(Keyword::True) => {
                self.next();
                Node::IntLiteral(1)
            }

            TokenKind::Keyword(Keyword::False) => {
                self.next();
                Node::IntLiteral(0)
            }

            TokenKind::Keyword(Keyword::Endl) => {
                self.next();
                Node::StringLiteral(String::from("\n"))
            }

            TokenKind::OpenParen => {
                self.next();

                let stream = std::mem::replace(&mut self.stream, false);
                let expr = self.expression(0);
                self.stream = stream;

                let expr = expr?;
                self.expect(TokenKind::CloseParen)?;

                expr
            }

            _ => return self.unexpected(ParserError::ExpectedExpr),
        };

        Ok(node)
    }

    fn literal<T: std::str::FromStr>(&self, lexeme: &str) -> Parse<T> {
        match lexeme.parse() {
            Ok(value) => Ok(value),
            Err(_) => self.fail(ParserError::BadLiteral(lexeme.to_owned())),
        }
    }

    fn typ(&mut self) -> Parse<Type> {
        let typ = match self.peek() {
            TokenKind::Keyword(Keyword::Int) => Type::Int,
            TokenKind::Keyword(Keyword::Float | Keyword::Double) => Type::Float,
            TokenKind::Keyword(Keyword::Char) => Type::Char,
            TokenKind::Keyword(Keyword::Bool) => Type::Bool,
            _ => return self.unexpected(ParserError::ExpectedExpr),
        };

        self.next();
        Ok(typ)
    }

    /// Extrae el nombre de un operando que debe ser asignable.
    fn target(&self, node: &Node) -> Parse<Located<Identifier>> {
        match node {
            Node::Identifier(name) => Ok(name.clone()),
            _ => self.fail(ParserError::InvalidTarget),
        }
    }

    fn id(&mut self) -> Parse<Located<Identifier>> {
        match self.peek() {
            TokenKind::Id => {
                let token = self.next();
                Ok(Located::at(
                    Identifier::from(token.lexeme.as_str()),
                    token.position(),
                ))
            }

            _ => self.unexpected(ParserError::ExpectedId),
        }
    }

    fn keyword(&mut self, keyword: Keyword) -> Parse<()> {
        self.expect(TokenKind::Keyword(keyword)).map(|_| ())
    }

    /// Consume el siguiente token si es de la clase esperada.
    ///
    /// En caso contrario falla sin consumirlo, de manera que la
    /// sincronización pueda considerarlo como frontera.
    fn expect(&mut self, kind: TokenKind) -> Parse<Token> {
        if self.peek() == kind {
            Ok(self.next())
        } else {
            self.unexpected(|found| ParserError::UnexpectedToken(kind, found))
        }
    }

    /// Aplica una regla contando un nivel más de anidamiento.
    fn nested<T, F>(&mut self, rule: F) -> Parse<T>
    where
        F: FnOnce(&mut Self) -> Parse<T>,
    {
        if self.depth >= self.max_depth {
            let position = self.scanner.position();
            return Err(Located::at(
                ParserError::NestingTooDeep(self.max_depth),
                position,
            ));
        }

        self.depth += 1;
        let result = rule(self);
        self.depth -= 1;

        result
    }

    /// Clase del siguiente token significativo, sin consumirlo.
    ///
    /// Descarta trivia y registra los errores léxicos que encuentre.
    fn peek(&mut self) -> TokenKind {
        loop {
            let kind = match self.scanner.peek_token() {
                Ok(token) if !token.is_trivia() => Some(token.kind),
                _ => None,
            };

            match kind {
                Some(kind) => break kind,
                None => {
                    if let Err(error) = self.scanner.next_token() {
                        self.lexical(error);
                    }
                }
            }
        }
    }

    fn next(&mut self) -> Token {
        loop {
            self.peek();
            match self.scanner.next_token() {
                Ok(token) => {
                    self.last_known = token.position();
                    self.consumed += 1;

                    break token;
                }

                Err(error) => self.lexical(error),
            }
        }
    }

    fn lexical(&mut self, error: Located<LexerError>) {
        debug!(%error, "lexical error");
        self.errors.push(error.map(ParserError::Lexical));
    }

    /// Falla en la posición del siguiente token, sin consumirlo.
    fn unexpected<T, F>(&mut self, error: F) -> Parse<T>
    where
        F: FnOnce(Token) -> ParserError,
    {
        self.peek();

        let found = match self.scanner.peek_token() {
            Ok(token) => token.clone(),
            Err(_) => Token::new(TokenKind::Eof, "", self.scanner.position()),
        };

        let position = found.position();
        Err(Located::at(error(found), position))
    }

    /// Falla en la posición del último token consumido.
    fn fail<T>(&self, error: ParserError) -> Parse<T> {
        Err(Located::at(error, self.last_known))
    }
}

fn binary_op(op: BinOp, left: Node, right: Node) -> Node {
    Node::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn one() -> Node {
    Node::IntLiteral(1)
}
