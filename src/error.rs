//! Reporte de errores.
//!
//! Un [`Diagnostics`] agrupa errores ubicados de una misma fase y los
//! presenta junto a la línea original que los provocó, si se conoce.

use crate::source::{Located, Position, Source};
use std::{
    error::Error,
    fmt::{self, Display},
    rc::Rc,
};

mod sealed {
    pub trait Sealed {}
}

pub trait LocatedError: sealed::Sealed {
    fn error(&self) -> &dyn Error;
    fn position(&self) -> Position;
}

pub struct Diagnostics {
    kind: &'static str,
    source: Option<Rc<Source>>,
    errors: Vec<Box<dyn 'static + LocatedError>>,
}

impl Diagnostics {
    pub fn kind(self, kind: &'static str) -> Self {
        Diagnostics { kind, ..self }
    }

    /// Asocia el origen del cual se citan líneas.
    pub fn with_source(self, source: Rc<Source>) -> Self {
        Diagnostics {
            source: Some(source),
            ..self
        }
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Mensajes de cada error, sin posición.
    pub fn messages(&self) -> impl Iterator<Item = String> + '_ {
        self.errors.iter().map(|error| error.error().to_string())
    }

    /// Posiciones de cada error, en orden de reporte.
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.errors.iter().map(|error| error.position())
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Diagnostics {
            kind: "error",
            source: None,
            errors: Default::default(),
        }
    }
}

impl<E: 'static + LocatedError> From<E> for Diagnostics {
    fn from(error: E) -> Self {
        Diagnostics {
            errors: vec![Box::new(error)],
            ..Default::default()
        }
    }
}

impl<E: 'static + LocatedError> From<Vec<E>> for Diagnostics {
    fn from(errors: Vec<E>) -> Self {
        let errors = errors
            .into_iter()
            .map(|error| {
                let error: Box<dyn LocatedError> = Box::new(error);
                error
            })
            .collect();

        Diagnostics {
            errors,
            ..Default::default()
        }
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("Diagnostics")
            .field("kind", &self.kind)
            .field("errors", &self.messages().collect::<Vec<_>>())
            .finish()
    }
}

impl Display for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Diagnostics {
            kind,
            source,
            errors,
        } = self;

        if errors.is_empty() {
            return writeln!(fmt, "No errors were reported");
        }

        for error in errors {
            writeln!(fmt, "{}: {}", kind, error.error())?;

            let position = error.position();
            match source {
                Some(source) => writeln!(fmt, " --> {}:{}", source.name(), position)?,
                None => writeln!(fmt, " --> {}", position)?,
            }

            let line = source
                .as_ref()
                .and_then(|source| source.line(position.line()));

            if let Some(line) = line {
                let digits = position.line().to_string().chars().count();
                let skip = (position.column() - 1) as usize;

                writeln!(fmt, "{:digits$} |", "", digits = digits)?;
                writeln!(fmt, "{} | {}", position.line(), line)?;
                writeln!(
                    fmt,
                    "{:digits$} | {:skip$}^",
                    "",
                    "",
                    digits = digits,
                    skip = skip
                )?;
            }

            writeln!(fmt)?;
        }

        let error_or_errors = if errors.len() == 1 { "error" } else { "errors" };
        writeln!(
            fmt,
            "Build failed with {} {}",
            errors.len(),
            error_or_errors
        )
    }
}

impl<E: Error> sealed::Sealed for Located<E> {}

impl<E: Error> LocatedError for Located<E> {
    fn error(&self) -> &dyn Error {
        self.val()
    }

    fn position(&self) -> Position {
        Located::position(self)
    }
}
