//! Implementación para RISC-V (RV32I).
//!
//! El valor actual vive en `t0`. Las variables se asignan primero a los
//! registros preservados `s1`-`s11` y luego a palabras estáticas; los
//! temporales a `t1`-`t5` y luego a palabras estáticas. `t6` queda libre
//! como registro de trabajo para accesos a memoria.
//!
//! La salida y la terminación usan las llamadas al entorno de RARS/Venus:
//! `a7 = 1` imprime un entero, `a7 = 4` una cadena y `a7 = 10` termina.

use super::{PrintKind, Register};
use crate::codegen::{
    regs::Storage, CodegenError, Context, Data, Flow, Instruction, Label, Program,
};

use std::fmt;

/// Registro de procesador.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Reg(&'static str);

/// Registro que contiene el valor actual.
const PRIMARY: Reg = Reg("t0");

/// Registro de trabajo para cargar operandos en memoria.
const SCRATCH: Reg = Reg("t6");

impl Register for Reg {
    const FILE: &'static [Self] = &[
        Reg("s1"),
        Reg("s2"),
        Reg("s3"),
        Reg("s4"),
        Reg("s5"),
        Reg("s6"),
        Reg("s7"),
        Reg("s8"),
        Reg("s9"),
        Reg("s10"),
        Reg("s11"),
    ];

    const TEMPS: &'static [Self] = &[Reg("t1"), Reg("t2"), Reg("t3"), Reg("t4"), Reg("t5")];
}

impl fmt::Display for Reg {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.0)
    }
}

/// Implementación de emisión de código para RISC-V.
pub struct Emitter {
    cx: Context<Reg>,
    strings: Vec<String>,
}

impl super::Emitter for Emitter {
    type Register = Reg;

    fn new(cx: Context<Reg>) -> Self {
        let mut emitter = Emitter {
            cx,
            strings: Vec::new(),
        };

        let output = emitter.cx.output();
        output.push(Instruction::Directive(".text".to_owned()));
        output.push(Instruction::Directive(".globl main".to_owned()));
        output.push(Instruction::Label("main".to_owned()));

        emitter
    }

    fn cx(&mut self) -> &mut Context<Reg> {
        &mut self.cx
    }

    fn load_int(&mut self, value: u8) {
        emit!(self.cx, "li", "{}, {}", PRIMARY, value);
    }

    fn load_bool(&mut self, value: bool) {
        emit!(self.cx, "li", "{}, {}", PRIMARY, value as u8);
    }

    fn load_string(&mut self, string: &str) {
        let index = self.intern(string);
        emit!(self.cx, "la", "{}, str{}", PRIMARY, index);
    }

    fn load(&mut self, from: Storage<Reg>) {
        match from {
            Storage::Reg(reg) => emit!(self.cx, "mv", "{}, {}", PRIMARY, reg),
            Storage::Var(cell) => emit!(self.cx, "lw", "{}, var{}", PRIMARY, cell),
            Storage::Temp(cell) => emit!(self.cx, "lw", "{}, tmp{}", PRIMARY, cell),
        }
    }

    fn store(&mut self, to: Storage<Reg>) {
        match to {
            Storage::Reg(reg) => emit!(self.cx, "mv", "{}, {}", reg, PRIMARY),
            Storage::Var(cell) => emit!(self.cx, "sw", "{}, var{}, {}", PRIMARY, cell, SCRATCH),
            Storage::Temp(cell) => emit!(self.cx, "sw", "{}, tmp{}, {}", PRIMARY, cell, SCRATCH),
        }
    }

    fn add(&mut self, operand: Storage<Reg>) {
        let reg = self.operand(operand);
        emit!(self.cx, "add", "{}, {}, {}", PRIMARY, reg, PRIMARY);
    }

    fn branch_compare(&mut self, lhs: Storage<Reg>, on_equal: bool, target: Label) {
        let reg = self.operand(lhs);
        let mnemonic = if on_equal { "beq" } else { "bne" };

        self.cx.flow(Flow::Branch(target));

        emit!(self.cx, mnemonic, "{}, {}, .{}", reg, PRIMARY, target);
    }

    fn branch_value(&mut self, when: bool, target: Label) {
        let mnemonic = if when { "bnez" } else { "beqz" };
        self.cx.flow(Flow::Branch(target));
        emit!(self.cx, mnemonic, "{}, .{}", PRIMARY, target);
    }

    fn jump(&mut self, target: Label) {
        self.cx.flow(Flow::Jump(target));
        emit!(self.cx, "j", ".{}", target);
    }

    fn set_label(&mut self, label: Label) {
        self.cx.flow(Flow::Label(label));
        self.cx.output().push(Instruction::Label(format!(".{}", label)));
    }

    fn print(&mut self, kind: PrintKind) {
        let call = match kind {
            PrintKind::Int => 1,
            PrintKind::String => 4,
        };

        emit!(self.cx, "mv", "a0, {}", PRIMARY);
        emit!(self.cx, "li", "a7, {}", call);
        emit!(self.cx, "ecall");
    }

    fn finish(mut self) -> Result<Program, CodegenError> {
        emit!(self.cx, "li", "a7, 10");
        emit!(self.cx, "ecall");

        let words = |prefix: &'static str, count: u32| {
            (0..count).map(move |cell| Data {
                label: format!("{}{}", prefix, cell),
                address: None,
                directive: ".word",
                value: "0".to_owned(),
            })
        };

        let mut data: Vec<Data> = self
            .strings
            .iter()
            .enumerate()
            .map(|(index, string)| Data {
                label: format!("str{}", index),
                address: None,
                directive: ".asciz",
                value: format!("{:?}", string),
            })
            .collect();

        data.extend(words("var", self.cx.regs().vars()));
        data.extend(words("tmp", self.cx.regs().temps()));

        let place = |storage: Storage<Reg>| match storage {
            Storage::Reg(reg) => reg.to_string(),
            Storage::Var(cell) => format!("var{}", cell),
            Storage::Temp(cell) => format!("tmp{}", cell),
        };

        Ok(self.cx.into_program(data, None, place))
    }
}

impl Emitter {
    /// Obtiene un registro con el valor de `storage`, cargándolo a
    /// [`SCRATCH`] si reside en memoria.
    fn operand(&mut self, storage: Storage<Reg>) -> Reg {
        match storage {
            Storage::Reg(reg) => reg,
            Storage::Var(cell) => {
                emit!(self.cx, "lw", "{}, var{}", SCRATCH, cell);
                SCRATCH
            }

            Storage::Temp(cell) => {
                emit!(self.cx, "lw", "{}, tmp{}", SCRATCH, cell);
                SCRATCH
            }
        }
    }

    fn intern(&mut self, string: &str) -> usize {
        match self.strings.iter().position(|other| other == string) {
            Some(index) => index,
            None => {
                self.strings.push(string.to_owned());
                self.strings.len() - 1
            }
        }
    }
}
