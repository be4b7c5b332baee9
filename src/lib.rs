//! Compilador para el lenguaje Alan.
//!
//! # Front end
//! Un texto de entrada puede contener varios programas, cada uno
//! terminado por `$`. El texto completo se somete primero a análisis
//! léxico en [`lex`], de lo cual se obtiene un flujo de tokens. Cada
//! programa se dispone en un árbol de sintaxis concreta por medio de
//! análisis sintáctico en [`parse`]. Este árbol es procesado por
//! análisis semántico en [`semantic`], de lo cual se obtiene un árbol
//! abstracto descrito en [`ast`] y una tabla de símbolos con alcances,
//! con lo cual concluyen las fases delanteras del compilador.
//!
//! # Back end
//! En esta sección el compilador deja de ser agnóstico al sistema
//! objetivo. La generación de código en [`codegen`] recorre el árbol
//! abstracto una única vez y delega las instrucciones concretas a la
//! arquitectura elegida en [`target`]: una máquina de acumulador 6502a
//! con imagen de memoria de 256 bytes, o ensamblador RISC-V RV32I.
//!
//! # Diagnósticos
//! Ninguna fase aborta ante el primer error. Todas reportan
//! [`error::Diagnostic`]s, y [`driver`] detiene a cada programa en la
//! primera fase que reporte errores sin afectar a los demás.

#[macro_use]
mod macros;

pub mod ast;
pub mod codegen;
pub mod driver;
pub mod error;
pub mod lex;
pub mod parse;
pub mod semantic;
pub mod source;

mod arch;

/// Arquitecturas objetivo.
///
/// Este módulo reexporta suficientes ítems internos para elegir
/// una arquitectura a partir de su nombre.
pub mod target {
    pub use crate::arch::{Arch, UnknownArch};
}

pub use driver::{compile, compile_named, Unit};
