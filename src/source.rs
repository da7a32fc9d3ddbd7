//! Rastreo de ubicaciones originales en código fuente.
//!
//! Todo token, nodo con nombre y error del compilador lleva consigo
//! una posición línea-columna del código original. Esto permite que
//! los diagnósticos señalen el punto exacto donde ocurrió un problema.
//!
//! Existen dos políticas de lectura. [`consume()`] lee de forma
//! incremental desde cualquier [`BufRead`] (típicamente un archivo),
//! mientras que [`chars()`] recorre un texto que ya reside en memoria.
//! Ambas producen el mismo tipo de flujo, por lo cual el lexer no
//! distingue entre ellas.

use std::{
    cell::RefCell,
    fmt::{self, Display, Formatter},
    io::{self, BufRead},
    iter,
    rc::Rc,
};

/// Ancho de los divisores de tabulador.
const TAB_STOP: u32 = 4;

/// Un flujo de entrada, carácter por carácter.
///
/// Cada carácter se acompaña de la posición que ocupa en el original.
pub trait InputStream: Iterator<Item = Result<(char, Position), io::Error>> {}

impl<I> InputStream for I where I: Iterator<Item = Result<(char, Position), io::Error>> {}

/// Un objeto cualquiera con una posición original asociada.
#[derive(Debug, Clone, PartialEq)]
pub struct Located<T> {
    position: Position,
    value: T,
}

impl<T> Located<T> {
    /// Obtiene el valor.
    pub fn val(&self) -> &T {
        &self.value
    }

    /// Obtiene la posición.
    pub fn position(&self) -> Position {
        self.position
    }

    /// Descarta la posición y toma ownership del valor.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Descompone y toma ownership de las dos partes.
    pub fn split(self) -> (Position, T) {
        (self.position, self.value)
    }

    /// Construye a partir de un valor y una posición.
    pub fn at(value: T, position: Position) -> Self {
        Located { value, position }
    }

    /// Transforma el valor con la misma posición.
    pub fn map<U, F>(self, map: F) -> Located<U>
    where
        F: FnOnce(T) -> U,
    {
        Located {
            value: map(self.value),
            position: self.position,
        }
    }
}

impl<T> AsRef<T> for Located<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

impl<T: Display> Display for Located<T> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}: {}", self.position, self.value)
    }
}

impl<E: std::error::Error> std::error::Error for Located<E> {}

/// Una posición línea-columna en un archivo.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Position {
    line: u32,
    column: u32,
}

impl Position {
    /// Construye una posición arbitraria. Ambas coordenadas inician en 1.
    pub fn new(line: u32, column: u32) -> Self {
        Position { line, column }
    }

    /// Obtiene el número de línea.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Obtiene el número de columna.
    pub fn column(&self) -> u32 {
        self.column
    }

    /// Incrementa el número de columna.
    pub fn advance(self) -> Position {
        Position {
            line: self.line,
            column: self.column + 1,
        }
    }

    /// Incrementa el número de línea y retorna a la columna 1.
    pub fn newline(self) -> Position {
        Position {
            line: self.line + 1,
            column: 1,
        }
    }

    /// Ajusta la posición a la siguiente columna de tabulador.
    pub fn tab(self) -> Position {
        let column = 1 + ((self.column - 1) / TAB_STOP + 1) * TAB_STOP;
        Position {
            line: self.line,
            column,
        }
    }

    /// Posición que le corresponde al carácter que sigue a `c`.
    pub fn after(self, c: char) -> Position {
        match c {
            '\n' => self.newline(),
            '\t' => self.tab(),
            _ => self.advance(),
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, column: 1 }
    }
}

impl Display for Position {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.line, self.column)
    }
}

/// Nombre de origen e histórico interior de líneas.
///
/// Las líneas se registran conforme el flujo las entrega, de forma que
/// los diagnósticos pueden citar cualquier línea que ya fue leída.
#[derive(Debug)]
pub struct Source {
    name: String,
    lines: RefCell<Vec<String>>,
}

impl Source {
    /// Nombre del origen, usualmente una ruta.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Obtiene una copia de la línea indicada, si ya fue leída.
    pub fn line(&self, line: u32) -> Option<String> {
        let index = (line as usize).checked_sub(1)?;
        self.lines.borrow().get(index).cloned()
    }
}

/// Transforma un flujo de entrada estándar en uno que itera por carácter.
///
/// Esta es la política de lectura para archivos: nada se lee hasta que
/// el lexer lo solicita. Cada línea termina con `'\n'` aunque el original
/// no lo incluya en su última línea.
pub fn consume<R, S>(reader: R, name: S) -> (Rc<Source>, impl InputStream)
where
    R: BufRead,
    S: Into<String>,
{
    let source = Rc::new(Source {
        name: name.into(),
        lines: Default::default(),
    });

    let history = Rc::clone(&source);
    let chars = reader
        .lines()
        .enumerate()
        .flat_map(move |(index, line)| {
            let history = Rc::clone(&history);

            Fallible::new(line.map(move |line| {
                let line_chars: Vec<_> = line.chars().collect();
                history.lines.borrow_mut().push(line);

                annotate(index as u32 + 1, line_chars)
            }))
        })
        .fuse();

    (source, chars)
}

/// Recorre un texto que ya se encuentra en memoria.
pub fn chars<'a, S>(text: &'a str, name: S) -> (Rc<Source>, impl InputStream + 'a)
where
    S: Into<String>,
{
    let source = Rc::new(Source {
        name: name.into(),
        lines: RefCell::new(text.lines().map(String::from).collect()),
    });

    let mut here = Position::default();
    let chars = text.chars().map(move |c| {
        let position = here;
        here = here.after(c);

        Ok((c, position))
    });

    (source, chars)
}

/// Asocia posiciones a los caracteres de una línea, agregando su `'\n'`.
fn annotate(line: u32, chars: Vec<char>) -> impl Iterator<Item = (char, Position)> {
    let mut here = Position { line, column: 1 };
    chars.into_iter().chain(iter::once('\n')).map(move |c| {
        let position = here;
        here = here.after(c);

        (c, position)
    })
}

/// Un iterador que emite un solo error o encapsula las salidas de
/// otro iterador en `Ok`, pero nunca ambas.
struct Fallible<I, E>(Result<I, iter::Once<E>>);

impl<I, E> Fallible<I, E> {
    fn new(result: Result<I, E>) -> Self {
        Fallible(result.map_err(iter::once))
    }
}

impl<I: Iterator, E> Iterator for Fallible<I, E> {
    type Item = Result<I::Item, E>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.0 {
            Ok(ok) => ok.next().map(Ok),
            Err(error) => error.next().map(Err),
        }
    }
}
