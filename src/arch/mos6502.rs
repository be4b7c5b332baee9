//! Implementación para el subconjunto 6502a.
//!
//! # Modelo de máquina
//! Máquina de acumulador con 256 bytes de memoria, direccionados con
//! operandos absolutos de 16 bits en little-endian cuyo byte alto siempre
//! es cero. No hay instrucciones de salto incondicional ni de comparación
//! contra el acumulador, por lo cual ambos se sintetizan con el registro X.
//!
//! # Disposición de memoria
//! - Código desde `$00`.
//! - Variables inmediatamente después del código.
//! - Temporales después de las variables.
//! - Cadenas terminadas en cero, creciendo hacia abajo desde `$FE`.
//! - `$FF` siempre contiene cero. Sirve como operando de comparación para
//!   saltos incondicionales y también como la cadena vacía.
//!
//! Las direcciones de variables, temporales y saltos se desconocen hasta
//! que el código termina, por lo cual las instrucciones se guardan con
//! operandos simbólicos y se resuelven en [`super::Emitter::finish()`].

use super::{PrintKind, Register};
use crate::codegen::{
    regs::Storage, CodegenError, Context, Data, Flow, Instruction, Label, Program,
};

use std::{collections::HashMap, fmt};

/// Tamaño total de la memoria.
const MEMORY_SIZE: u32 = 256;

/// Dirección que siempre contiene cero.
const ZERO: u8 = 0xFF;

/// Tamaño en bytes de la secuencia de salto incondicional.
const JUMP_SIZE: u8 = 7;

/// Esta máquina no dispone de registros asignables.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Reg {}

impl Register for Reg {
    const FILE: &'static [Self] = &[];
    const TEMPS: &'static [Self] = &[];
}

impl fmt::Display for Reg {
    fn fmt(&self, _formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Opcode {
    LdaImm,
    LdaAbs,
    StaAbs,
    AdcAbs,
    LdxImm,
    LdxAbs,
    LdyAbs,
    CpxAbs,
    Bne,
    Sys,
    Brk,
}

impl Opcode {
    fn byte(self) -> u8 {
        use Opcode::*;

        match self {
            LdaImm => 0xA9,
            LdaAbs => 0xAD,
            StaAbs => 0x8D,
            AdcAbs => 0x6D,
            LdxImm => 0xA2,
            LdxAbs => 0xAE,
            LdyAbs => 0xAC,
            CpxAbs => 0xEC,
            Bne    => 0xD0,
            Sys    => 0xFF,
            Brk    => 0x00,
        }
    }

    fn mnemonic(self) -> &'static str {
        use Opcode::*;

        match self {
            LdaImm | LdaAbs => "LDA",
            StaAbs          => "STA",
            AdcAbs          => "ADC",
            LdxImm | LdxAbs => "LDX",
            LdyAbs          => "LDY",
            CpxAbs          => "CPX",
            Bne             => "BNE",
            Sys             => "SYS",
            Brk             => "BRK",
        }
    }
}

/// Dirección simbólica, resuelta al terminar.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Address {
    Var(u32),
    Temp(u32),
    Zero,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Operand {
    None,
    Imm(u8),

    /// Dirección de la cadena con este índice, como inmediato.
    Str(usize),

    Abs(Address),

    /// Salto relativo hacia una etiqueta.
    Branch(Label),

    /// Salto relativo de tamaño fijo.
    Skip(u8),
}

impl Operand {
    fn size(self) -> u32 {
        match self {
            Operand::None => 0,
            Operand::Imm(_) | Operand::Str(_) | Operand::Branch(_) | Operand::Skip(_) => 1,
            Operand::Abs(_) => 2,
        }
    }
}

enum Op {
    Label(Label),
    Instr(Opcode, Operand),
}

/// Implementación de emisión de código para 6502a.
pub struct Emitter {
    cx: Context<Reg>,
    ops: Vec<Op>,
    strings: Vec<String>,
}

impl super::Emitter for Emitter {
    type Register = Reg;

    fn new(cx: Context<Reg>) -> Self {
        Emitter {
            cx,
            ops: Vec::new(),
            strings: Vec::new(),
        }
    }

    fn cx(&mut self) -> &mut Context<Reg> {
        &mut self.cx
    }

    fn load_int(&mut self, value: u8) {
        self.instr(Opcode::LdaImm, Operand::Imm(value));
    }

    fn load_bool(&mut self, value: bool) {
        self.instr(Opcode::LdaImm, Operand::Imm(value as u8));
    }

    fn load_string(&mut self, string: &str) {
        let operand = if string.is_empty() {
            Operand::Imm(ZERO)
        } else {
            Operand::Str(self.intern(string))
        };

        self.instr(Opcode::LdaImm, operand);
    }

    fn load(&mut self, from: Storage<Reg>) {
        self.instr(Opcode::LdaAbs, Operand::Abs(address(from)));
    }

    fn store(&mut self, to: Storage<Reg>) {
        self.instr(Opcode::StaAbs, Operand::Abs(address(to)));
    }

    fn add(&mut self, operand: Storage<Reg>) {
        self.instr(Opcode::AdcAbs, Operand::Abs(address(operand)));
    }

    fn branch_compare(&mut self, lhs: Storage<Reg>, on_equal: bool, target: Label) {
        // CPX solo compara contra memoria, el valor actual se guarda primero
        let scratch = self.cx.regs().push_temp();
        self.instr(Opcode::StaAbs, Operand::Abs(address(scratch)));
        self.instr(Opcode::LdxAbs, Operand::Abs(address(lhs)));
        self.instr(Opcode::CpxAbs, Operand::Abs(address(scratch)));
        self.cx.regs().pop_temp();

        self.branch_on_z(on_equal, target);
    }

    fn branch_value(&mut self, when: bool, target: Label) {
        let scratch = self.cx.regs().push_temp();
        self.instr(Opcode::StaAbs, Operand::Abs(address(scratch)));
        self.instr(Opcode::LdxImm, Operand::Imm(1));
        self.instr(Opcode::CpxAbs, Operand::Abs(address(scratch)));
        self.cx.regs().pop_temp();

        self.branch_on_z(when, target);
    }

    fn jump(&mut self, target: Label) {
        // 1 != 0, por lo cual BNE siempre se toma
        self.cx.flow(Flow::Jump(target));
        self.instr(Opcode::LdxImm, Operand::Imm(1));
        self.instr(Opcode::CpxAbs, Operand::Abs(Address::Zero));
        self.instr(Opcode::Bne, Operand::Branch(target));
    }

    fn set_label(&mut self, label: Label) {
        self.cx.flow(Flow::Label(label));
        self.ops.push(Op::Label(label));
    }

    fn print(&mut self, kind: PrintKind) {
        let scratch = self.cx.regs().push_temp();
        self.instr(Opcode::StaAbs, Operand::Abs(address(scratch)));
        self.instr(Opcode::LdyAbs, Operand::Abs(address(scratch)));
        self.cx.regs().pop_temp();

        let mode = match kind {
            PrintKind::Int => 1,
            PrintKind::String => 2,
        };

        self.instr(Opcode::LdxImm, Operand::Imm(mode));
        self.instr(Opcode::Sys, Operand::None);
    }

    fn finish(mut self) -> Result<Program, CodegenError> {
        self.instr(Opcode::Brk, Operand::None);

        let code_size: u32 = self
            .ops
            .iter()
            .map(|op| match op {
                Op::Instr(_, operand) => 1 + operand.size(),
                Op::Label(_) => 0,
            })
            .sum();

        let vars = self.cx.regs().vars();
        let temps = self.cx.regs().temps();
        let heap_size: u32 = self.strings.iter().map(|string| string.len() as u32 + 1).sum();

        // El byte final es el cero fijo
        let required = code_size + vars + temps + heap_size + 1;
        if required > MEMORY_SIZE {
            return Err(CodegenError::OutOfMemory { required });
        }

        let var_base = code_size;
        let temp_base = var_base + vars;

        let mut heap = Vec::with_capacity(self.strings.len());
        let mut heap_top = MEMORY_SIZE - 1;
        for string in &self.strings {
            heap_top -= string.len() as u32 + 1;
            heap.push(heap_top);
        }

        let mut labels = HashMap::new();
        let mut pc = 0;
        for op in &self.ops {
            match op {
                Op::Label(label) => {
                    labels.insert(*label, pc);
                }

                Op::Instr(_, operand) => pc += 1 + operand.size(),
            }
        }

        let resolve = |address: Address| match address {
            Address::Var(cell) => var_base + cell,
            Address::Temp(cell) => temp_base + cell,
            Address::Zero => ZERO as u32,
        };

        let mut image = vec![0; MEMORY_SIZE as usize];
        let mut listing = Vec::with_capacity(self.ops.len());
        let mut pc = 0;

        for op in &self.ops {
            let (opcode, operand) = match op {
                Op::Label(label) => {
                    listing.push(Instruction::Label(label.to_string()));
                    continue;
                }

                Op::Instr(opcode, operand) => (*opcode, *operand),
            };

            image[pc as usize] = opcode.byte();

            let text = match operand {
                Operand::None => String::new(),

                Operand::Imm(value) => {
                    image[pc as usize + 1] = value;
                    format!("#${:02X}", value)
                }

                Operand::Str(index) => {
                    let address = heap[index] as u8;
                    image[pc as usize + 1] = address;
                    format!("#${:02X}", address)
                }

                Operand::Abs(address) => {
                    let address = resolve(address) as u8;
                    image[pc as usize + 1] = address;
                    image[pc as usize + 2] = 0x00;
                    format!("${:02X}00", address)
                }

                Operand::Branch(label) => {
                    let target = *labels.get(&label).ok_or_else(|| {
                        CodegenError::Fault(format!("branch to undefined label {}", label))
                    })?;

                    // Desplazamiento relativo a la siguiente instrucción, módulo 256
                    let offset = (target as u8).wrapping_sub((pc + 2) as u8);
                    image[pc as usize + 1] = offset;
                    format!("${:02X} ; {}", offset, label)
                }

                Operand::Skip(offset) => {
                    image[pc as usize + 1] = offset;
                    format!("${:02X}", offset)
                }
            };

            listing.push(Instruction::op(opcode.mnemonic(), text));
            pc += 1 + operand.size();
        }

        for (string, &address) in self.strings.iter().zip(&heap) {
            let start = address as usize;
            image[start..start + string.len()].copy_from_slice(string.as_bytes());
        }

        let mut data = Vec::new();
        data.extend((0..vars).map(|cell| Data {
            label: format!("var{}", cell),
            address: Some(var_base + cell),
            directive: ".byte",
            value: "$00".to_owned(),
        }));

        data.extend((0..temps).map(|cell| Data {
            label: format!("tmp{}", cell),
            address: Some(temp_base + cell),
            directive: ".byte",
            value: "$00".to_owned(),
        }));

        data.extend(self.strings.iter().zip(&heap).enumerate().map(
            |(index, (string, &address))| Data {
                label: format!("str{}", index),
                address: Some(address),
                directive: ".asciz",
                value: format!("{:?}", string),
            },
        ));

        self.cx.output().extend(listing);

        let place = move |storage: Storage<Reg>| match storage {
            Storage::Reg(reg) => match reg {},
            Storage::Var(cell) => format!("${:02X}", var_base + cell),
            Storage::Temp(cell) => format!("${:02X}", temp_base + cell),
        };

        Ok(self.cx.into_program(data, Some(image), place))
    }
}

impl Emitter {
    fn instr(&mut self, opcode: Opcode, operand: Operand) {
        self.ops.push(Op::Instr(opcode, operand));
    }

    /// Salta si Z coincide con `on_equal`. BNE es el único salto disponible,
    /// por lo cual el caso opuesto rodea un salto incondicional.
    fn branch_on_z(&mut self, on_equal: bool, target: Label) {
        if on_equal {
            self.cx.flow(Flow::Skip);
            self.instr(Opcode::Bne, Operand::Skip(JUMP_SIZE));
            super::Emitter::jump(self, target);
        } else {
            self.cx.flow(Flow::Branch(target));
            self.instr(Opcode::Bne, Operand::Branch(target));
        }
    }

    /// Interna una cadena no vacía en el heap estático.
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

fn address(storage: Storage<Reg>) -> Address {
    match storage {
        Storage::Reg(reg) => match reg {},
        Storage::Var(cell) => Address::Var(cell),
        Storage::Temp(cell) => Address::Temp(cell),
    }
}
