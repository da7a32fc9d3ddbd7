//! Tabla de símbolos.
//!
//! Cada variable declarada ocupa un slot de [`SLOT_SIZE`] bytes en el
//! marco de pila, direccionado relativo a `%rbp`. Los offsets inician en
//! `-8` y decrecen por cada declaración; nunca se reutilizan dentro de
//! una misma compilación, aunque el ámbito que los declaró haya cerrado.
//!
//! Un nombre no puede redeclararse mientras siga vivo en algún ámbito
//! abierto. Al cerrar un ámbito sus nombres quedan libres otra vez.

use thiserror::Error;

use std::collections::HashMap;

use crate::{lex::Identifier, parse::Type};

/// Tamaño de un slot de variable en el marco de pila.
pub const SLOT_SIZE: i32 = 8;

pub type Semantic<T> = Result<T, SemanticError>;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SemanticError {
    #[error("Use of undeclared variable `{0}`")]
    UndeclaredVariable(Identifier),

    #[error("Variable `{0}` is already declared in an enclosing scope")]
    AlreadyDeclared(Identifier),

    #[error("Variable `{0}` is read before any value was stored in it")]
    UseBeforeInitialization(Identifier),
}

#[derive(Clone, Debug)]
pub struct Symbol {
    name: Identifier,
    kind: Type,
    offset: i32,
    initialized: bool,
    scope: u32,
}

impl Symbol {
    pub fn name(&self) -> &Identifier {
        &self.name
    }

    pub fn kind(&self) -> Type {
        self.kind
    }

    /// Offset relativo a `%rbp`, siempre negativo.
    pub fn offset(&self) -> i32 {
        self.offset
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Nivel de ámbito donde se declaró el símbolo.
    pub fn scope(&self) -> u32 {
        self.scope
    }
}

pub struct SymbolTable {
    symbols: HashMap<Identifier, Symbol>,
    scope: u32,
    next_offset: i32,
}

impl Default for SymbolTable {
    fn default() -> Self {
        SymbolTable {
            symbols: HashMap::new(),
            scope: 0,
            next_offset: -SLOT_SIZE,
        }
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declara una variable en el ámbito actual y le asigna un slot.
    ///
    /// Falla si el nombre sigue vivo en cualquier ámbito abierto.
    pub fn declare(&mut self, name: &Identifier, kind: Type) -> Semantic<&Symbol> {
        if self.symbols.contains_key(name) {
            return Err(SemanticError::AlreadyDeclared(name.clone()));
        }

        let symbol = Symbol {
            name: name.clone(),
            kind,
            offset: self.next_offset,
            initialized: false,
            scope: self.scope,
        };

        self.next_offset -= SLOT_SIZE;
        Ok(self.symbols.entry(name.clone()).or_insert(symbol))
    }

    /// Busca la declaración viva de un nombre.
    pub fn lookup(&self, name: &str) -> Semantic<&Symbol> {
        self.symbols
            .get(name)
            .ok_or_else(|| SemanticError::UndeclaredVariable(Identifier::from(name)))
    }

    /// Registra que la variable ya recibió un valor.
    pub fn mark_initialized(&mut self, name: &str) -> Semantic<&Symbol> {
        match self.symbols.get_mut(name) {
            Some(symbol) => {
                symbol.initialized = true;
                Ok(symbol)
            }

            None => Err(SemanticError::UndeclaredVariable(Identifier::from(name))),
        }
    }

    /// Busca una variable para leerla, lo cual requiere que esté inicializada.
    pub fn load(&self, name: &str) -> Semantic<&Symbol> {
        let symbol = self.lookup(name)?;
        match symbol.initialized {
            true => Ok(symbol),
            false => Err(SemanticError::UseBeforeInitialization(symbol.name.clone())),
        }
    }

    pub fn enter_scope(&mut self) {
        self.scope += 1;
    }

    /// Elimina todo símbolo declarado en el ámbito que cierra o en uno interno.
    pub fn exit_scope(&mut self) {
        let scope = self.scope;
        self.symbols.retain(|_, symbol| symbol.scope < scope);

        self.scope = scope.saturating_sub(1);
    }

    /// Retorna al estado inicial, incluyendo la asignación de offsets.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn scope(&self) -> u32 {
        self.scope
    }

    /// Bytes de marco de pila que ocupan todos los slots asignados.
    pub fn frame_size(&self) -> u32 {
        (-self.next_offset - SLOT_SIZE) as u32
    }
}
