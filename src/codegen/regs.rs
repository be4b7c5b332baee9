//! Asignación estática de almacenamiento.
//!
//! Cada variable recibe un hogar la primera vez que se declara, tomado
//! de un contador monótono de ranuras: primero los registros que la
//! arquitectura dedica a variables y luego celdas de memoria estática.
//! Las ranuras nunca se reutilizan.
//!
//! Los temporales siguen una disciplina de pila. Se toman primero de
//! los registros temporales de la arquitectura y luego de celdas de
//! memoria, cuya cantidad máxima simultánea se registra para reservar
//! espacio al final de la emisión.

use crate::arch::Register;
use std::marker::PhantomData;

/// Ubicación de un valor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Storage<R> {
    /// Registro de procesador.
    Reg(R),

    /// Celda estática de variable.
    Var(u32),

    /// Celda estática de temporal.
    Temp(u32),
}

pub struct Allocations<R: Register> {
    homes: usize,
    vars: u32,
    depth: usize,
    temps: u32,
    register: PhantomData<R>,
}

impl<R: Register> Allocations<R> {
    /// Reserva el hogar de una nueva variable.
    pub fn home(&mut self) -> Storage<R> {
        let slot = self.homes;
        self.homes += 1;

        match R::FILE.get(slot) {
            Some(&reg) => Storage::Reg(reg),
            None => {
                let cell = self.vars;
                self.vars += 1;

                Storage::Var(cell)
            }
        }
    }

    /// Toma un temporal del tope de la pila.
    pub fn push_temp(&mut self) -> Storage<R> {
        let depth = self.depth;
        self.depth += 1;

        match R::TEMPS.get(depth) {
            Some(&reg) => Storage::Reg(reg),
            None => {
                let cell = (depth - R::TEMPS.len()) as u32;
                self.temps = self.temps.max(cell + 1);

                Storage::Temp(cell)
            }
        }
    }

    /// Libera el temporal más reciente.
    pub fn pop_temp(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Cantidad de celdas de memoria para variables.
    pub fn vars(&self) -> u32 {
        self.vars
    }

    /// Máxima cantidad de celdas de memoria temporales en uso simultáneo.
    pub fn temps(&self) -> u32 {
        self.temps
    }
}

impl<R: Register> Default for Allocations<R> {
    fn default() -> Self {
        Allocations {
            homes: 0,
            vars: 0,
            depth: 0,
            temps: 0,
            register: PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    struct Two(u8);

    impl fmt::Display for Two {
        fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(fmt, "r{}", self.0)
        }
    }

    impl Register for Two {
        const FILE: &'static [Self] = &[Two(0), Two(1)];
        const TEMPS: &'static [Self] = &[Two(2)];
    }

    #[test]
    fn homes_spill_after_register_file() {
        let mut regs = Allocations::<Two>::default();

        assert_eq!(regs.home(), Storage::Reg(Two(0)));
        assert_eq!(regs.home(), Storage::Reg(Two(1)));
        assert_eq!(regs.home(), Storage::Var(0));
        assert_eq!(regs.home(), Storage::Var(1));
        assert_eq!(regs.vars(), 2);
    }

    #[test]
    fn temps_are_a_stack() {
        let mut regs = Allocations::<Two>::default();

        assert_eq!(regs.push_temp(), Storage::Reg(Two(2)));
        assert_eq!(regs.push_temp(), Storage::Temp(0));
        assert_eq!(regs.push_temp(), Storage::Temp(1));
        regs.pop_temp();
        regs.pop_temp();
        assert_eq!(regs.push_temp(), Storage::Temp(0));

        regs.pop_temp();
        regs.pop_temp();
        regs.pop_temp();

        assert_eq!(regs.push_temp(), Storage::Reg(Two(2)));
        assert_eq!(regs.temps(), 2);
    }
}
