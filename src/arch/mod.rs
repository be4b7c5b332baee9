//! Detalles específicos para cada arquitectura objetivo.
//!
//! Este módulo expone interfaces de generación de código
//! y de parámetros de arquitectura que son implementadas
//! por sus propios submódulos. En general, debe utilizarse
//! la macro `dispatch_arch!()` para acceder a estas
//! implementaciones.

use crate::codegen::{regs::Storage, CodegenError, Context, Label, Program};
use std::{
    fmt::{self, Display},
    str::FromStr,
};

use thiserror::Error;
use unicase::Ascii as NoCase;

/// Arquitectura de procesador (ISA).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Arch {
    /// Máquina de acumulador con el subconjunto 6502a y 256 bytes de memoria.
    Mos6502,

    /// RISC-V de 32 bits, conjunto base RV32I.
    RiscV,
}

#[derive(Error, Debug)]
#[error("Unknown target architecture `{0}`, expected `6502` or `riscv`")]
pub struct UnknownArch(String);

impl FromStr for Arch {
    type Err = UnknownArch;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        const ARCHS: &[(NoCase<&str>, Arch)] = &[
            (NoCase::new("6502"),    Arch::Mos6502),
            (NoCase::new("6502a"),   Arch::Mos6502),
            (NoCase::new("riscv"),   Arch::RiscV),
            (NoCase::new("risc-v"),  Arch::RiscV),
            (NoCase::new("rv32i"),   Arch::RiscV),
        ];

        ARCHS
            .iter()
            .find(|&&(name, _)| name == NoCase::new(string))
            .map(|&(_, arch)| arch)
            .ok_or_else(|| UnknownArch(string.to_owned()))
    }
}

impl Display for Arch {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(match self {
            Arch::Mos6502 => "6502",
            Arch::RiscV => "riscv",
        })
    }
}

mod mos6502;
mod riscv;

pub use mos6502::Emitter as Mos6502;
pub use riscv::Emitter as RiscV;

/// Forma en que `print` interpreta el valor actual.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PrintKind {
    Int,
    String,
}

/// Emisión de código para un programa.
///
/// Los tipos que implementan este trait traducen las operaciones
/// primitivas del recorrido de generación a instrucciones de la
/// arquitectura objetivo. Toda operación lee o escribe un único
/// valor implícito, el cual vive en el acumulador o en un registro
/// primario según la arquitectura.
pub trait Emitter: Sized {
    /// Tipo de registro.
    type Register: Register;

    /// Construir a partir de un contexto de emisión.
    fn new(cx: Context<Self::Register>) -> Self;

    /// Obtiene el contexto de emisión.
    ///
    /// Implicado aquí que todo `Emitter` debe guardar as-is el [`Context`]
    /// que se le otorga en [`Emitter::new()`].
    fn cx(&mut self) -> &mut Context<Self::Register>;

    /// Carga una constante entera.
    fn load_int(&mut self, value: u8);

    /// Carga una constante booleana.
    fn load_bool(&mut self, value: bool);

    /// Carga la dirección de una cadena estática.
    fn load_string(&mut self, string: &str);

    /// Carga desde una variable o temporal.
    fn load(&mut self, from: Storage<Self::Register>);

    /// Guarda hacia una variable o temporal.
    fn store(&mut self, to: Storage<Self::Register>);

    /// Suma `operand` al valor actual.
    fn add(&mut self, operand: Storage<Self::Register>);

    /// Compara `lhs` con el valor actual y salta si la igualdad
    /// coincide con `on_equal`.
    fn branch_compare(&mut self, lhs: Storage<Self::Register>, on_equal: bool, target: Label);

    /// Salta si el valor booleano actual es igual a `when`.
    fn branch_value(&mut self, when: bool, target: Label);

    /// Saltar incondicionalmente a una etiqueta.
    fn jump(&mut self, target: Label);

    /// Define la posición de una etiqueta.
    fn set_label(&mut self, label: Label);

    /// Imprime el valor actual.
    fn print(&mut self, kind: PrintKind);

    /// Termina el programa y resuelve direcciones.
    fn finish(self) -> Result<Program, CodegenError>;
}

/// Registro de procesador.
pub trait Register: Copy + Display + 'static {
    /// Registros dedicados a variables, en orden de asignación.
    const FILE: &'static [Self];

    /// Registros dedicados a temporales, en orden de asignación.
    const TEMPS: &'static [Self];
}
