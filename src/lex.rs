//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del compilador. Descompone un [`InputStream`]
//! (flujo de caracteres) en unidades léxicas denominadas tokens. Cada
//! token lleva su clase ([`TokenKind`]), su lexema y la línea y columna
//! donde inicia.
//!
//! # Trivia
//! Los saltos de línea y los comentarios se emiten como tokens de clase
//! [`TokenKind::Newline`] y [`TokenKind::Comment`]. El parser los descarta
//! antes de cada decisión gramatical, por lo cual cualquier [`Scanner`]
//! puede o no emitirlos.
//!
//! # Políticas de escaneo
//! [`Scanner`] es la capacidad que consume el parser. [`Lexer`] escanea
//! de forma incremental desde cualquier flujo de caracteres, mientras que
//! [`Tokens`] entrega una secuencia ya tokenizada que reside en memoria.
//!
//! # Errores
//! Ante un carácter desconocido o un literal mal formado el lexer reporta
//! el error, descarta lo que haya acumulado y continúa con el siguiente
//! carácter. Esto permite reportar más de un error por ejecución.

use crate::source::{self, InputStream, Located, Position};
use lazy_static::lazy_static;
use std::{
    borrow::Borrow,
    collections::HashMap,
    fmt::{self, Display},
    iter::Peekable,
    mem,
    rc::Rc,
    str::FromStr,
};

use thiserror::Error;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LexerError {
    /// Error de E/S originado por el [`InputStream`].
    #[error("I/O error: {0}")]
    Input(#[from] std::io::Error),

    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("Bad character {0:?} in input stream")]
    BadChar(char),

    /// Una constante entera no cabe en 64 bits.
    #[error("Integer literal overflow, valid range is [0, {}]", i64::MAX)]
    IntOverflow,

    /// Secuencia de escape desconocida dentro de un literal.
    #[error("Unknown escape sequence `\\{0}`")]
    BadEscape(char),

    /// Un literal de carácter debe contener exactamente un carácter.
    #[error("Character literals must contain exactly one character")]
    BadCharLiteral,

    /// Un literal de cadena o carácter no se cerró antes del fin de línea.
    #[error("Unterminated literal")]
    UnterminatedLiteral,

    /// Un comentario `/* */` no se cerró antes del fin de la entrada.
    #[error("Unterminated block comment")]
    UnterminatedComment,
}

/// Un identificador.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(Rc<str>);

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier(Rc::from(name))
    }
}

impl Display for Identifier {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(&self.0)
    }
}

/// Clase léxica de un token.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    /// Fin del flujo.
    Eof,

    /// Literal entero; el lexema son sus dígitos.
    IntLiteral,

    /// Literal flotante; el lexema es la parte numérica.
    FloatLiteral,

    /// Literal de cadena; el lexema es su contenido ya sin escapes.
    StringLiteral,

    /// Literal de carácter; el lexema es el carácter ya sin escapes.
    CharLiteral,

    /// Identificador.
    Id,

    /// Palabra clave.
    Keyword(Keyword),

    Plus,
    Minus,
    Times,
    Divide,
    Percent,
    Assign,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
    And,
    Or,
    Not,
    BitAnd,
    BitOr,
    BitXor,
    BitNot,
    ShiftLeft,
    ShiftRight,
    Increment,
    Decrement,
    PlusAssign,
    MinusAssign,
    TimesAssign,
    DivideAssign,
    Semicolon,
    Comma,
    OpenParen,
    CloseParen,
    OpenCurly,
    CloseCurly,

    /// `'\n'`
    Newline,

    /// `// ...` o `/* ... */`
    Comment,
}

impl TokenKind {
    /// Texto fijo de la clase, o una cadena vacía si el lexema varía.
    pub fn symbol(self) -> &'static str {
        use TokenKind::*;

        match self {
            Eof | IntLiteral | FloatLiteral | StringLiteral | CharLiteral | Id | Comment => "",
            Keyword(keyword) => keyword.as_str(),
            Plus => "+",
            Minus => "-",
            Times => "*",
            Divide => "/",
            Percent => "%",
            Assign => "=",
            Equal => "==",
            NotEqual => "!=",
            Less => "<",
            Greater => ">",
            LessOrEqual => "<=",
            GreaterOrEqual => ">=",
            And => "&&",
            Or => "||",
            Not => "!",
            BitAnd => "&",
            BitOr => "|",
            BitXor => "^",
            BitNot => "~",
            ShiftLeft => "<<",
            ShiftRight => ">>",
            Increment => "++",
            Decrement => "--",
            PlusAssign => "+=",
            MinusAssign => "-=",
            TimesAssign => "*=",
            DivideAssign => "/=",
            Semicolon => ";",
            Comma => ",",
            OpenParen => "(",
            CloseParen => ")",
            OpenCurly => "{",
            CloseCurly => "}",
            Newline => "\n",
        }
    }

    /// Determina si el parser debe ignorar esta clase de token.
    pub fn is_trivia(self) -> bool {
        matches!(self, TokenKind::Newline | TokenKind::Comment)
    }
}

impl Display for TokenKind {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokenKind::*;

        match self {
            Eof => fmt.write_str("end of input"),
            IntLiteral => fmt.write_str("integer literal"),
            FloatLiteral => fmt.write_str("float literal"),
            StringLiteral => fmt.write_str("string literal"),
            CharLiteral => fmt.write_str("character literal"),
            Id => fmt.write_str("identifier"),
            Keyword(keyword) => write!(fmt, "keyword `{}`", keyword),
            Newline => fmt.write_str("line break"),
            Comment => fmt.write_str("comment"),
            other => write!(fmt, "`{}`", other.symbol()),
        }
    }
}

/// Objeto resultante del análisis léxico.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: u32,
    pub column: u32,
}

impl Token {
    /// Construye un token que inicia en la posición indicada.
    pub fn new<S: Into<String>>(kind: TokenKind, lexeme: S, position: Position) -> Self {
        Token {
            kind,
            lexeme: lexeme.into(),
            line: position.line(),
            column: position.column(),
        }
    }

    /// Posición del primer carácter del token.
    pub fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    /// Determina si el parser debe ignorar este token.
    pub fn is_trivia(&self) -> bool {
        self.kind.is_trivia()
    }
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokenKind::*;

        match self.kind {
            Id => write!(fmt, "identifier `{}`", self.lexeme),
            IntLiteral | FloatLiteral => write!(fmt, "literal `{}`", self.lexeme),
            StringLiteral => write!(fmt, "literal {:?}", self.lexeme),
            CharLiteral => write!(fmt, "literal '{}'", self.lexeme.escape_default()),
            kind => kind.fmt(fmt),
        }
    }
}

/// Una palabra clave.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Keyword {
    Int,
    Float,
    Char,
    Double,
    Bool,
    Void,
    If,
    Else,
    While,
    For,
    Return,
    Cout,
    Cin,
    Endl,
    True,
    False,
}

lazy_static! {
    /// Tabla inmutable de palabras clave, construida en su primer uso.
    static ref KEYWORDS: HashMap<&'static str, Keyword> = {
        use Keyword::*;

        [
            Int, Float, Char, Double, Bool, Void, If, Else, While, For, Return, Cout, Cin, Endl,
            True, False,
        ]
        .iter()
        .map(|&keyword| (keyword.as_str(), keyword))
        .collect()
    };
}

impl Keyword {
    /// Texto de la palabra clave.
    pub fn as_str(self) -> &'static str {
        use Keyword::*;

        match self {
            Int => "int",
            Float => "float",
            Char => "char",
            Double => "double",
            Bool => "bool",
            Void => "void",
            If => "if",
            Else => "else",
            While => "while",
            For => "for",
            Return => "return",
            Cout => "cout",
            Cin => "cin",
            Endl => "endl",
            True => "true",
            False => "false",
        }
    }

    /// Determina si la palabra clave nombra un tipo de variable.
    pub fn is_type(self) -> bool {
        use Keyword::*;
        matches!(self, Int | Float | Char | Double | Bool)
    }

    /// Determina si la palabra clave puede iniciar una sentencia.
    pub fn starts_statement(self) -> bool {
        use Keyword::*;
        self.is_type() || matches!(self, If | While | For | Return | Cout | Cin)
    }
}

impl Display for Keyword {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(self.as_str())
    }
}

impl FromStr for Keyword {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        KEYWORDS.get(string).copied().ok_or(())
    }
}

/// Fuente de tokens para el parser.
///
/// Ambas implementaciones ([`Lexer`] y [`Tokens`]) terminan su secuencia
/// con un token [`TokenKind::Eof`], el cual se repite indefinidamente
/// si se sigue solicitando tokens.
pub trait Scanner {
    /// Consume y retorna el siguiente token.
    fn next_token(&mut self) -> Result<Token, Located<LexerError>>;

    /// Observa el siguiente token sin consumirlo.
    fn peek_token(&mut self) -> Result<&Token, &Located<LexerError>>;

    /// Posición de lo siguiente que se leerá.
    fn position(&self) -> Position;
}

/// Máquina de estados para análisis léxico.
///
/// Un lexer puede encontrarse en uno de diversos estados. La
/// salida del lexer, así como su siguiente estado, se define
/// a partir de tanto su estado actual como el siguiente carácter
/// encontrado en el flujo de entrada.
pub struct Lexer<S: Iterator> {
    source: Peekable<S>,
    state: State,
    lexeme: String,
    start: Position,
    here: Position,
    lookahead: Option<Result<Token, Located<LexerError>>>,
}

/// Posibles estados del lexer.
enum State {
    /// Estado que ocurre antes de encontrar el inicio de un token.
    Start,

    /// Estado de completitud; siempre emite el token incluido
    /// sin consumir la entrada actual.
    Complete(TokenKind),

    /// Primer carácter de un operador que puede extenderse a dos.
    Operator(char),

    /// Se encontró `/`: división, `/=` o inicio de comentario.
    Slash,

    /// Comentario de línea; termina antes de `'\n'`.
    LineComment,

    /// Comentario de bloque. Se recuerda si el último carácter fue `*`.
    BlockComment(bool),

    /// Constante numérica. Se recuerda si ya apareció el punto decimal.
    Number(bool),

    /// Término que puede ser un identificador o una palabra clave.
    Word,

    /// Literal de cadena (`"`) o de carácter (`'`). Un escape inválido se
    /// recuerda y se reporta al cerrar el literal.
    Quoted {
        quote: char,
        escape: bool,
        bad: Option<char>,
    },
}

impl<S: InputStream> Lexer<S> {
    /// Crea un lexer en estado inicial a partir de un flujo.
    pub fn new(source: S) -> Self {
        Lexer {
            source: source.peekable(),
            state: State::Start,
            lexeme: String::new(),
            start: Position::default(),
            here: Position::default(),
            lookahead: None,
        }
    }

    /// Reduce la entrada a sea una secuencia conocida de tokens
    /// infalibles o una secuencia de errores.
    ///
    /// En caso de que ocurra al menos un error, el lexer dejará
    /// de acumular tokens exitosos y continuará solamente para
    /// recolectar los demás errores. La secuencia exitosa incluye
    /// el token [`TokenKind::Eof`] final.
    pub fn try_exhaustive(mut self) -> Result<Vec<Token>, Vec<Located<LexerError>>> {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();

        loop {
            match self.next_token() {
                Ok(token) if token.kind == TokenKind::Eof => {
                    tokens.push(token);
                    break;
                }

                Ok(token) => tokens.push(token),
                Err(error) => errors.push(error),
            }
        }

        if errors.is_empty() {
            Ok(tokens)
        } else {
            Err(errors)
        }
    }

    /// Escanea un token completo y lo asocia a su posición de inicio.
    fn scan(&mut self) -> Result<Token, Located<LexerError>> {
        self.lexeme.clear();
        let result = self.lex();

        self.state = State::Start;
        let lexeme = mem::take(&mut self.lexeme);

        match result {
            Ok(kind) if lexeme.is_empty() => Ok(Token::new(kind, kind.symbol(), self.start)),
            Ok(kind) => Ok(Token::new(kind, lexeme, self.start)),
            Err(error) => Err(Located::at(error, self.start)),
        }
    }

    /// Intenta construir un siguiente token.
    fn lex(&mut self) -> Result<TokenKind, LexerError> {
        use State::*;

        loop {
            // Se espera un siguiente carácter, fallando si hay error de E/S
            let next_char = match self.source.peek() {
                None => None,
                Some(Ok((c, position))) => {
                    self.here = *position;
                    Some(*c)
                }

                Some(Err(_)) => match self.source.next() {
                    Some(Err(error)) => return Err(error.into()),
                    _ => continue,
                },
            };

            // La posición de origen se mueve junto a la posición
            // siguiente siempre que no se haya encontrado una
            // frontera de token
            if let Start = self.state {
                self.start = self.here;
            }

            // Switch table principal, determina cambios de estado
            // y de salida del lexer a partir de combinaciones del
            // estado actual y el siguiente carácter
            match (&mut self.state, next_char) {
                // Tokens triviales
                (Start, None) => return Ok(TokenKind::Eof),
                (Start, Some('\n')) => self.state = Complete(TokenKind::Newline),
                (Start, Some(';')) => self.state = Complete(TokenKind::Semicolon),
                (Start, Some(',')) => self.state = Complete(TokenKind::Comma),
                (Start, Some('(')) => self.state = Complete(TokenKind::OpenParen),
                (Start, Some(')')) => self.state = Complete(TokenKind::CloseParen),
                (Start, Some('{')) => self.state = Complete(TokenKind::OpenCurly),
                (Start, Some('}')) => self.state = Complete(TokenKind::CloseCurly),
                (Start, Some('%')) => self.state = Complete(TokenKind::Percent),
                (Start, Some('^')) => self.state = Complete(TokenKind::BitXor),
                (Start, Some('~')) => self.state = Complete(TokenKind::BitNot),
                (Start, Some('/')) => self.state = Slash,

                (Start, Some(c @ ('+' | '-' | '*' | '=' | '!' | '<' | '>' | '&' | '|'))) => {
                    self.state = Operator(c)
                }

                (Start, Some(quote @ ('"' | '\''))) => {
                    self.state = Quoted {
                        quote,
                        escape: false,
                        bad: None,
                    }
                }

                // Identificadores y palabras clave
                (Start, Some(c)) if c.is_ascii_alphabetic() || c == '_' => {
                    self.lexeme.push(c);
                    self.state = Word;
                }

                // Inicio de una constante numérica. No se consume el
                // dígito, ya que esta lógica ya está implementada en el
                // respectivo caso para el estado de constante numérica
                (Start, Some(c)) if c.is_ascii_digit() => {
                    self.state = Number(false);
                    continue;
                }

                // Espacios en blanco y caracteres inesperados
                (Start, Some(c)) if c.is_whitespace() => (),
                (Start, Some(c)) => {
                    self.bump();
                    return Err(LexerError::BadChar(c));
                }

                // Emisión retardada de tokens cualesquiera
                (Complete(kind), _) => return Ok(*kind),

                // Operadores de uno o dos caracteres
                (Operator(first), next) => {
                    let first = *first;
                    match operator(first, next) {
                        (kind, true) => self.state = Complete(kind),
                        (kind, false) => return Ok(kind),
                    }
                }

                (Slash, Some('/')) => self.state = LineComment,
                (Slash, Some('*')) => self.state = BlockComment(false),
                (Slash, Some('=')) => self.state = Complete(TokenKind::DivideAssign),
                (Slash, _) => return Ok(TokenKind::Divide),

                // Los comentarios de línea no consumen su `'\n'`
                (LineComment, None) | (LineComment, Some('\n')) => return Ok(TokenKind::Comment),
                (LineComment, Some(c)) => self.lexeme.push(c),

                (BlockComment(true), Some('/')) => self.state = Complete(TokenKind::Comment),
                (BlockComment(star), Some(c)) => *star = c == '*',
                (BlockComment(_), None) => return Err(LexerError::UnterminatedComment),

                // Acumulación dígito por dígito de constantes
                (Number(_), Some(digit)) if digit.is_ascii_digit() => self.lexeme.push(digit),
                (Number(fraction @ false), Some('.')) => {
                    *fraction = true;
                    self.lexeme.push('.');
                }

                // Sufijo opcional de flotantes, no forma parte del lexema
                (Number(true), Some('f' | 'F')) => self.state = Complete(TokenKind::FloatLiteral),
                (Number(true), _) => return Ok(TokenKind::FloatLiteral),

                // Si sigue algo que no es un dígito, la constante ha terminado
                (Number(false), _) => {
                    return match self.lexeme.parse::<i64>() {
                        Ok(_) => Ok(TokenKind::IntLiteral),
                        Err(_) => Err(LexerError::IntOverflow),
                    };
                }

                // Extensión de términos
                (Word, Some(c)) if is_word_char(c) => self.lexeme.push(c),

                // Si sigue algo que no puede formar parte del término, ha terminado
                (Word, _) => {
                    return Ok(match Keyword::from_str(&self.lexeme) {
                        Ok(keyword) => TokenKind::Keyword(keyword),
                        Err(()) => TokenKind::Id,
                    });
                }

                (Quoted { .. }, None) | (Quoted { .. }, Some('\n')) => {
                    return Err(LexerError::UnterminatedLiteral)
                }

                (Quoted { escape: escape @ true, bad, .. }, Some(c)) => {
                    *escape = false;
                    match unescape(c) {
                        Some(c) => self.lexeme.push(c),
                        None => {
                            bad.get_or_insert(c);
                        }
                    }
                }

                (Quoted { escape, .. }, Some('\\')) => *escape = true,

                (Quoted { quote, bad, .. }, Some(c)) if c == *quote => {
                    let (quote, bad) = (*quote, *bad);
                    if let Some(bad) = bad {
                        self.bump();
                        return Err(LexerError::BadEscape(bad));
                    }

                    let kind = if quote == '"' {
                        TokenKind::StringLiteral
                    } else if self.lexeme.chars().count() == 1 {
                        TokenKind::CharLiteral
                    } else {
                        self.bump();
                        return Err(LexerError::BadCharLiteral);
                    };

                    self.state = Complete(kind);
                }

                (Quoted { .. }, Some(c)) => self.lexeme.push(c),
            }

            // Si no hubo `continue` ni `return`, aquí se consume el
            // carácter que se observó con lookahead anteriormente
            self.bump();
        }
    }

    /// Consume el carácter actual.
    fn bump(&mut self) {
        if let Some(Ok((c, position))) = self.source.next() {
            self.here = position.after(c);
        }
    }
}

impl<S: InputStream> Scanner for Lexer<S> {
    fn next_token(&mut self) -> Result<Token, Located<LexerError>> {
        match self.lookahead.take() {
            Some(lookahead) => lookahead,
            None => self.scan(),
        }
    }

    fn peek_token(&mut self) -> Result<&Token, &Located<LexerError>> {
        let lookahead = match self.lookahead.take() {
            Some(lookahead) => lookahead,
            None => self.scan(),
        };

        self.lookahead.insert(lookahead).as_ref()
    }

    fn position(&self) -> Position {
        match &self.lookahead {
            Some(Ok(token)) => token.position(),
            Some(Err(error)) => error.position(),
            None => self.here,
        }
    }
}

/// Secuencia de tokens previamente escaneada.
///
/// Esta es la política de escaneo en memoria, pensada para evaluar
/// expresiones sueltas. Se construye a partir de tokens arbitrarios
/// o directamente desde texto con [`str::parse()`].
#[derive(Debug, Clone)]
pub struct Tokens {
    tokens: Vec<Token>,
    cursor: usize,
}

impl Tokens {
    /// Construye a partir de una secuencia, agregando `Eof` si hace falta.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        match tokens.last() {
            Some(last) if last.kind == TokenKind::Eof => (),
            last => {
                let end = last
                    .map(|last| Position::new(last.line, last.column + last.lexeme.len() as u32))
                    .unwrap_or_default();

                tokens.push(Token::new(TokenKind::Eof, "", end));
            }
        }

        Tokens { tokens, cursor: 0 }
    }

    fn current(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.cursor.min(last)]
    }
}

impl FromStr for Tokens {
    type Err = Vec<Located<LexerError>>;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let (_, stream) = source::chars(text, "<string>");
        Lexer::new(stream).try_exhaustive().map(Tokens::new)
    }
}

impl Scanner for Tokens {
    fn next_token(&mut self) -> Result<Token, Located<LexerError>> {
        let token = self.current().clone();
        if self.cursor < self.tokens.len() {
            self.cursor += 1;
        }

        Ok(token)
    }

    fn peek_token(&mut self) -> Result<&Token, &Located<LexerError>> {
        Ok(self.current())
    }

    fn position(&self) -> Position {
        self.current().position()
    }
}

/// Resuelve un operador a partir de su primer carácter y el siguiente.
///
/// El booleano indica si el segundo carácter forma parte del operador.
fn operator(first: char, second: Option<char>) -> (TokenKind, bool) {
    use TokenKind::*;

    match (first, second) {
        ('+', Some('+')) => (Increment, true),
        ('+', Some('=')) => (PlusAssign, true),
        ('+', _) => (Plus, false),
        ('-', Some('-')) => (Decrement, true),
        ('-', Some('=')) => (MinusAssign, true),
        ('-', _) => (Minus, false),
        ('*', Some('=')) => (TimesAssign, true),
        ('*', _) => (Times, false),
        ('=', Some('=')) => (Equal, true),
        ('=', _) => (Assign, false),
        ('!', Some('=')) => (NotEqual, true),
        ('!', _) => (Not, false),
        ('<', Some('=')) => (LessOrEqual, true),
        ('<', Some('<')) => (ShiftLeft, true),
        ('<', _) => (Less, false),
        ('>', Some('=')) => (GreaterOrEqual, true),
        ('>', Some('>')) => (ShiftRight, true),
        ('>', _) => (Greater, false),
        ('&', Some('&')) => (And, true),
        ('&', _) => (BitAnd, false),
        ('|', Some('|')) => (Or, true),
        _ => (BitOr, false),
    }
}

/// Resuelve el carácter que sigue a `\` dentro de un literal.
fn unescape(c: char) -> Option<char> {
    match c {
        'n' => Some('\n'),
        't' => Some('\t'),
        'r' => Some('\r'),
        '0' => Some('\0'),
        '\\' | '"' | '\'' => Some(c),
        _ => None,
    }
}

/// Determina si un carácter puede pertenecer a un término.
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
