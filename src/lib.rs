//! Compilador de un subconjunto de C++ hacia ensamblador x86-64.
//!
//! # Front end
//! El código fuente se lee como un flujo de caracteres ubicados
//! ([`source`]) y se somete a análisis léxico en [`lex`], de lo cual se
//! obtiene un flujo de tokens. El flujo de tokens se dispone en un árbol
//! sintáctico por medio de análisis sintáctico en [`parse`]. Los errores
//! sintácticos se recuperan por sentencia, así que un mismo análisis los
//! reporta todos.
//!
//! # Back end
//! El árbol se traduce en [`codegen`] a un listado ensamblador descrito
//! en [`ir`], consultando la tabla de símbolos de [`semantic`] para
//! ubicar variables en el marco de pila. Los resultados intermedios
//! ocupan ocho registros temporales ([`arch`]) sin spilling. Los errores
//! de esta fase son fatales.
//!
//! El ensamblado y enlazado del listado se delegan a `binutils`.

pub mod arch;
pub mod codegen;
pub mod error;
pub mod ir;
pub mod lex;
pub mod parse;
pub mod semantic;
pub mod source;

use codegen::{LowerError, LowerOptions};
use error::Diagnostics;
use ir::Assembly;
use lex::Scanner;
use parse::{Node, Parser, SyntaxError};
use source::Located;

/// Límite de anidamiento por omisión, tanto al analizar como al generar código.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Configuración de una compilación.
#[derive(Clone, Debug)]
pub struct Options {
    /// Profundidad máxima de recursión en el parser y en el generador.
    pub max_depth: usize,

    pub lowering: LowerOptions,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            max_depth: DEFAULT_MAX_DEPTH,
            lowering: LowerOptions::default(),
        }
    }
}

/// Resultado de ambas fases.
///
/// La generación de código procede aunque existan errores sintácticos,
/// sobre las sentencias que sí se pudieron analizar.
#[derive(Debug)]
pub struct Compilation {
    pub ast: Node,
    pub syntax_errors: Vec<SyntaxError>,
    pub assembly: Result<Assembly, Located<LowerError>>,
}

impl Compilation {
    /// Solo un programa sin errores de ninguna fase produce un listado.
    pub fn into_result(self) -> Result<Assembly, Diagnostics> {
        if !self.syntax_errors.is_empty() {
            return Err(Diagnostics::from(self.syntax_errors).kind("syntax error"));
        }

        self.assembly.map_err(Diagnostics::from)
    }
}

/// Analiza y traduce un programa completo.
pub fn compile<S: Scanner>(scanner: S, options: &Options) -> Compilation {
    let recovered = Parser::new(scanner, options.max_depth).parse_program();
    let assembly = codegen::lower(&recovered.value, options);

    Compilation {
        ast: recovered.value,
        syntax_errors: recovered.errors,
        assembly,
    }
}
