use super::LowerError;
use crate::arch::Reg;

/// Pool de registros temporales.
///
/// Cada registro está libre o pertenece a exactamente un resultado
/// pendiente. No existe spilling: si los ocho registros están ocupados,
/// la asignación falla.
#[derive(Default)]
pub struct Registers {
    owned: [bool; Reg::TEMPORARIES.len()],
}

impl Registers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asigna el primer registro libre, en orden `%r8..%r15`.
    pub fn allocate(&mut self) -> Result<Reg, LowerError> {
        let slot = self
            .owned
            .iter()
            .position(|owned| !owned)
            .ok_or(LowerError::RegisterExhaustion(Reg::TEMPORARIES.len()))?;

        self.owned[slot] = true;
        Ok(Reg::TEMPORARIES[slot])
    }

    pub fn free(&mut self, reg: Reg) {
        if let Some(slot) = Reg::TEMPORARIES.iter().position(|&temp| temp == reg) {
            debug_assert!(self.owned[slot], "double free of {}", reg);
            self.owned[slot] = false;
        }
    }

    pub fn reset(&mut self) {
        self.owned = Default::default();
    }

    /// Registros con dueño, en orden de asignación.
    pub fn live(&self) -> impl Iterator<Item = Reg> + '_ {
        Reg::TEMPORARIES
            .iter()
            .zip(self.owned.iter())
            .filter(|&(_, &owned)| owned)
            .map(|(&reg, _)| reg)
    }

    /// Cantidad de registros con dueño.
    pub fn in_use(&self) -> usize {
        self.owned.iter().filter(|&&owned| owned).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_fit() {
        let mut regs = Registers::new();

        assert_eq!(regs.allocate().unwrap(), Reg::R8);
        assert_eq!(regs.allocate().unwrap(), Reg::R9);
        assert_eq!(regs.allocate().unwrap(), Reg::R10);

        regs.free(Reg::R9);
        assert_eq!(regs.in_use(), 2);
        assert_eq!(regs.live().collect::<Vec<_>>(), [Reg::R8, Reg::R10]);
        assert_eq!(regs.allocate().unwrap(), Reg::R9);
        assert_eq!(regs.allocate().unwrap(), Reg::R11);
    }

    #[test]
    fn exhaustion() {
        let mut regs = Registers::new();
        for &expected in Reg::TEMPORARIES.iter() {
            assert_eq!(regs.allocate().unwrap(), expected);
        }

        assert!(matches!(
            regs.allocate(),
            Err(LowerError::RegisterExhaustion(8))
        ));

        // Desde %r12 los temporales sobreviven a una llamada
        let saved: Vec<_> = regs.live().filter(|reg| !reg.is_caller_saved()).collect();
        assert_eq!(saved, [Reg::R12, Reg::R13, Reg::R14, Reg::R15]);

        regs.reset();
        assert_eq!(regs.in_use(), 0);
        assert_eq!(regs.live().count(), 0);
        assert_eq!(regs.allocate().unwrap(), Reg::R8);
    }
}
