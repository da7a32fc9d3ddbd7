//! Parámetros de la arquitectura objetivo (x86-64).

use std::fmt;

// Esta es una arquitectura de 64 bits
pub const VALUE_SIZE: u32 = 8;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Reg {
    Rax,
    Rbx,
    Rcx,
    Rdx,
    Rsi,
    Rdi,
    Rsp,
    Rbp,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
}

impl Reg {
    /// Registros para resultados intermedios, en orden de asignación.
    pub const TEMPORARIES: [Reg; 8] = {
        use Reg::*;
        [R8, R9, R10, R11, R12, R13, R14, R15]
    };

    /// Resultado del programa. Es callee-saved, así que sobrevive a las
    /// llamadas a builtins.
    pub const RESULT: Reg = Reg::Rbx;

    /// Primer argumento según la ABI System V.
    pub const ARGUMENT: Reg = Reg::Rdi;

    pub fn name(self) -> &'static str {
        use Reg::*;

        match self {
            Rax => "rax",
            Rbx => "rbx",
            Rcx => "rcx",
            Rdx => "rdx",
            Rsi => "rsi",
            Rdi => "rdi",
            Rsp => "rsp",
            Rbp => "rbp",
            R8 => "r8",
            R9 => "r9",
            R10 => "r10",
            R11 => "r11",
            R12 => "r12",
            R13 => "r13",
            R14 => "r14",
            R15 => "r15",
        }
    }

    /// Determina si una llamada puede destruir el contenido del registro.
    pub fn is_caller_saved(self) -> bool {
        use Reg::*;
        matches!(self, Rax | Rcx | Rdx | Rsi | Rdi | R8 | R9 | R10 | R11)
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "%{}", self.name())
    }
}

/// Slots de relleno para que `pushed` valores dejen `%rsp` alineado.
pub fn alignment_for(pushed: u32) -> u32 {
    // Cada valor es de 64 bits (8 bytes), y la frontera de alineamiento es de 16 bytes
    pushed % 2
}
