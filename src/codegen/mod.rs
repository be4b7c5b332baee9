//! Generación de código.
//!
//! Un único recorrido en profundidad del [`Ast`], compartido por todas
//! las arquitecturas, que se expresa en términos de las operaciones de
//! [`Emitter`]. Las expresiones booleanas se reducen a secuencias de
//! saltos con evaluación de cortocircuito de izquierda a derecha; cuando
//! se necesita un booleano como valor, se materializa a través de esos
//! mismos saltos.

pub mod regs;

use crate::{
    arch::{Arch, Emitter, PrintKind, Register},
    ast::{Ast, BinaryOp, Binding, Block, Expr, ExprKind, Literal, Statement, UnaryOp},
    error::{Category, Report, Stage},
    lex::Identifier,
    semantic::{ScopeId, SymbolTable, Type},
    source::{Located, Location},
};

use log::debug;
use regs::{Allocations, Storage};
use std::fmt::{self, Display};
use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CodegenError {
    #[error("Program does not fit in memory, {required} bytes are required and only 256 are available")]
    OutOfMemory { required: u32 },

    #[error("Internal compiler error: {0}")]
    Fault(String),
}

impl Report for CodegenError {
    const STAGE: Stage = Stage::Codegen;

    fn category(&self) -> Category {
        Category::Internal
    }
}

/// Etiqueta de salto, numerada secuencialmente por programa.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Label(u32);

impl Display for Label {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "L{}", self.0)
    }
}

/// Evento de control de flujo, tal como lo emite cada arquitectura.
///
/// La secuencia de estos eventos es la forma del programa generado. Dos
/// arquitecturas producen la misma forma a partir de un mismo [`Ast`],
/// salvo donde una de ellas debe sintetizar un salto condicional a partir
/// de otros, lo cual se registra con [`Flow::Skip`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Flow {
    Label(Label),
    Branch(Label),
    Jump(Label),

    /// Salto condicional corto que rodea al siguiente [`Flow::Jump`].
    Skip,
}

/// Una línea del listado de salida.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    Label(String),
    Directive(String),
    Op {
        mnemonic: &'static str,
        operands: String,
    },
}

impl Instruction {
    pub(crate) fn op(mnemonic: &'static str, operands: String) -> Self {
        Instruction::Op { mnemonic, operands }
    }
}

impl Display for Instruction {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Label(label) => write!(fmt, "{}:", label),
            Instruction::Directive(directive) => write!(fmt, "\t{}", directive),
            Instruction::Op { mnemonic, operands } if operands.is_empty() => {
                write!(fmt, "\t{}", mnemonic)
            }

            Instruction::Op { mnemonic, operands } => write!(fmt, "\t{:8}{}", mnemonic, operands),
        }
    }
}

/// Entrada de datos estáticos.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Data {
    pub label: String,
    pub address: Option<u32>,
    pub directive: &'static str,
    pub value: String,
}

/// Ubicación final de una variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    pub name: Identifier,
    pub scope: ScopeId,
    pub storage: String,
}

/// Resultado de la generación de código.
#[derive(Clone, Debug)]
pub struct Program {
    arch: Arch,
    code: Vec<Instruction>,
    data: Vec<Data>,
    layout: Vec<Placement>,
    image: Option<Vec<u8>>,
    shape: Vec<Flow>,
}

impl Program {
    pub fn arch(&self) -> Arch {
        self.arch
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.code
    }

    pub fn data(&self) -> &[Data] {
        &self.data
    }

    /// Variables y su almacenamiento, en orden de declaración.
    pub fn layout(&self) -> &[Placement] {
        &self.layout
    }

    /// Imagen de memoria ensamblada, solo para arquitecturas que la producen.
    pub fn image(&self) -> Option<&[u8]> {
        self.image.as_deref()
    }

    /// Secuencia de etiquetas y saltos del programa.
    pub fn shape(&self) -> &[Flow] {
        &self.shape
    }
}

impl Display for Program {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let comment = match self.arch {
            Arch::Mos6502 => ';',
            Arch::RiscV => '#',
        };

        writeln!(fmt, "{} target: {}", comment, self.arch)?;
        for placement in &self.layout {
            writeln!(
                fmt,
                "{} {}@{} -> {}",
                comment, placement.name, placement.scope, placement.storage
            )?;
        }

        for instruction in &self.code {
            writeln!(fmt, "{}", instruction)?;
        }

        if !self.data.is_empty() {
            match self.arch {
                Arch::Mos6502 => writeln!(fmt, "{} static data", comment)?,
                Arch::RiscV => writeln!(fmt, "\t.data")?,
            }
        }

        for data in &self.data {
            write!(fmt, "{}:\t{} {}", data.label, data.directive, data.value)?;
            match data.address {
                Some(address) => writeln!(fmt, "\t{} ${:02X}", comment, address)?,
                None => writeln!(fmt)?,
            }
        }

        if let Some(image) = &self.image {
            writeln!(fmt, "{} memory image", comment)?;
            for row in image.chunks(16) {
                let bytes: Vec<String> = row.iter().map(|byte| format!("{:02X}", byte)).collect();
                writeln!(fmt, "{}", bytes.join(" "))?;
            }
        }

        Ok(())
    }
}

/// Estado de emisión compartido por todas las arquitecturas.
///
/// Lleva cuenta de etiquetas, hogares de variables y temporales, y
/// de la forma de control de flujo del programa.
pub struct Context<R: Register> {
    arch: Arch,
    output: Vec<Instruction>,
    labels: u32,
    regs: Allocations<R>,
    homes: Vec<(Identifier, ScopeId, Storage<R>)>,
    shape: Vec<Flow>,
}

impl<R: Register> Context<R> {
    fn new(arch: Arch) -> Self {
        Context {
            arch,
            output: Vec::new(),
            labels: 0,
            regs: Allocations::default(),
            homes: Vec::new(),
            shape: Vec::new(),
        }
    }

    /// Listado de instrucciones emitidas hasta el momento.
    pub fn output(&mut self) -> &mut Vec<Instruction> {
        &mut self.output
    }

    pub fn regs(&mut self) -> &mut Allocations<R> {
        &mut self.regs
    }

    /// Construye el programa final.
    ///
    /// `place` describe en texto el almacenamiento de cada variable.
    pub fn into_program<F>(self, data: Vec<Data>, image: Option<Vec<u8>>, mut place: F) -> Program
    where
        F: FnMut(Storage<R>) -> String,
    {
        let layout = self
            .homes
            .into_iter()
            .map(|(name, scope, storage)| Placement {
                name,
                scope,
                storage: place(storage),
            })
            .collect();

        Program {
            arch: self.arch,
            code: self.output,
            data,
            layout,
            image,
            shape: self.shape,
        }
    }

    /// Registra un evento de control de flujo recién emitido.
    pub fn flow(&mut self, event: Flow) {
        self.shape.push(event);
    }

    fn next_label(&mut self) -> Label {
        let label = Label(self.labels);
        self.labels += 1;

        label
    }

    fn declare(&mut self, scope: ScopeId, name: Identifier) -> Storage<R> {
        let storage = self.regs.home();
        self.homes.push((name, scope, storage));

        storage
    }

    fn home(&self, scope: ScopeId, name: Identifier) -> Option<Storage<R>> {
        self.homes
            .iter()
            .find(|&&(other_name, other_scope, _)| other_name == name && other_scope == scope)
            .map(|&(_, _, storage)| storage)
    }
}

/// Genera código para un programa sin errores.
pub fn generate(
    ast: &Ast,
    symbols: &SymbolTable,
    arch: Arch,
) -> Result<Program, Located<CodegenError>> {
    debug!("Generating code for target {}", arch);

    dispatch_arch!(E: arch => {
        let mut generator = Generator {
            emitter: E::new(Context::new(arch)),
            symbols,
        };

        generator.block(ast.body())?;
        generator
            .emitter
            .finish()
            .map_err(|error| Located::at(error, ast.location().clone()))
    })
}

type Generate<T> = Result<T, Located<CodegenError>>;

struct Generator<'a, E> {
    emitter: E,
    symbols: &'a SymbolTable,
}

impl<E: Emitter> Generator<'_, E> {
    fn block(&mut self, block: &Block) -> Generate<()> {
        for statement in &block.statements {
            self.statement(statement)?;
        }

        Ok(())
    }

    fn statement(&mut self, statement: &Statement) -> Generate<()> {
        match statement {
            Statement::VarDecl { typ, name, scope } => {
                let declared = self
                    .symbols
                    .scope(*scope)
                    .and_then(|symbols| symbols.get(*name.val()))
                    .is_some();

                if !declared {
                    let message = format!("`{}` is missing from scope {}", name.val(), scope);
                    return Err(fault(name.location(), message));
                }

                let home = self.emitter.cx().declare(*scope, *name.val());
                match typ {
                    Type::Int => self.emitter.load_int(0),
                    Type::Boolean => self.emitter.load_bool(false),
                    Type::String => self.emitter.load_string(""),
                    Type::Error => return Err(sentinel(name.location())),
                }

                self.emitter.store(home);
            }

            Statement::Assignment { target, value } => {
                self.expr(value)?;
                let home = self.home(*target.val(), target.location())?;
                self.emitter.store(home);
            }

            Statement::Print(value) => self.print(value)?,

            Statement::If { condition, body } => {
                debug!("Lowering `if` at {}", condition.location());

                let end = self.label();
                self.branch(condition, end, false)?;
                self.block(body)?;
                self.emitter.set_label(end);
            }

            Statement::While { condition, body } => {
                debug!("Lowering `while` at {}", condition.location());

                let (start, end) = (self.label(), self.label());
                self.emitter.set_label(start);
                self.branch(condition, end, false)?;
                self.block(body)?;
                self.emitter.jump(start);
                self.emitter.set_label(end);
            }

            Statement::Block(block) => self.block(block)?,
        }

        Ok(())
    }

    fn print(&mut self, value: &Located<Expr>) -> Generate<()> {
        match value.val().typ {
            Type::Int => {
                self.expr(value)?;
                self.emitter.print(PrintKind::Int);
            }

            Type::String => {
                self.expr(value)?;
                self.emitter.print(PrintKind::String);
            }

            // Los booleanos se imprimen como texto
            Type::Boolean => {
                let (otherwise, end) = (self.label(), self.label());

                self.branch(value, otherwise, false)?;
                self.emitter.load_string("true");
                self.emitter.jump(end);
                self.emitter.set_label(otherwise);
                self.emitter.load_string("false");
                self.emitter.set_label(end);

                self.emitter.print(PrintKind::String);
            }

            Type::Error => return Err(sentinel(value.location())),
        }

        Ok(())
    }

    /// Evalúa una expresión hacia el valor actual.
    fn expr(&mut self, expr: &Located<Expr>) -> Generate<()> {
        let Expr { kind, typ } = expr.val();
        if *typ == Type::Error {
            return Err(sentinel(expr.location()));
        }

        match kind {
            ExprKind::Literal(Literal::Int(integer)) => self.emitter.load_int(*integer),
            ExprKind::Literal(Literal::Bool(value)) => self.emitter.load_bool(*value),
            ExprKind::Literal(Literal::Str(string)) => self.emitter.load_string(string),

            ExprKind::Variable(binding) => {
                let home = self.home(*binding, expr.location())?;
                self.emitter.load(home);
            }

            ExprKind::Binary(left, BinaryOp::Add, right) => {
                self.expr(left)?;

                let temp = self.emitter.cx().regs().push_temp();
                self.emitter.store(temp);
                self.expr(right)?;
                self.emitter.add(temp);
                self.emitter.cx().regs().pop_temp();
            }

            // Operadores booleanos, se materializan con saltos
            ExprKind::Unary(..) | ExprKind::Binary(..) => {
                let (otherwise, end) = (self.label(), self.label());

                self.branch(expr, otherwise, false)?;
                self.emitter.load_bool(true);
                self.emitter.jump(end);
                self.emitter.set_label(otherwise);
                self.emitter.load_bool(false);
                self.emitter.set_label(end);
            }
        }

        Ok(())
    }

    /// Salta a `target` si la condición evalúa a `when`, con cortocircuito.
    fn branch(&mut self, condition: &Located<Expr>, target: Label, when: bool) -> Generate<()> {
        use BinaryOp::*;

        match &condition.val().kind {
            ExprKind::Literal(Literal::Bool(value)) => {
                if *value == when {
                    self.emitter.jump(target);
                }
            }

            ExprKind::Unary(UnaryOp::Not, operand) => self.branch(operand, target, !when)?,

            ExprKind::Binary(left, op @ (And | Or), right) => {
                // `&&` cuando se busca falso y `||` cuando se busca verdadero
                // saltan directamente con el primer operando que decide
                if (*op == And) != when {
                    self.branch(left, target, when)?;
                    self.branch(right, target, when)?;
                } else {
                    let skip = self.label();
                    self.branch(left, skip, !when)?;
                    self.branch(right, target, when)?;
                    self.emitter.set_label(skip);
                }
            }

            ExprKind::Binary(left, op @ (Equal | NotEqual), right) => {
                if condition.val().typ == Type::Error {
                    return Err(sentinel(condition.location()));
                }

                self.expr(left)?;

                let temp = self.emitter.cx().regs().push_temp();
                self.emitter.store(temp);
                self.expr(right)?;

                let on_equal = (*op == Equal) == when;
                self.emitter.branch_compare(temp, on_equal, target);
                self.emitter.cx().regs().pop_temp();
            }

            _ => {
                self.expr(condition)?;
                self.emitter.branch_value(when, target);
            }
        }

        Ok(())
    }

    fn home(&mut self, binding: Binding, location: &Location) -> Generate<Storage<E::Register>> {
        let scope = binding.scope.ok_or_else(|| {
            let message = format!("unresolved binding `{}`", binding.name);
            fault(location, message)
        })?;

        self.emitter.cx().home(scope, binding.name).ok_or_else(|| {
            let message = format!("`{}` has no storage assigned", binding);
            fault(location, message)
        })
    }

    fn label(&mut self) -> Label {
        self.emitter.cx().next_label()
    }
}

fn fault(location: &Location, message: String) -> Located<CodegenError> {
    Located::at(CodegenError::Fault(message), location.clone())
}

fn sentinel(location: &Location) -> Located<CodegenError> {
    fault(location, format!("expression of type `{}` reached code generation", Type::Error))
}
