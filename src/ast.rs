//! Árbol de sintaxis abstracta.
//!
//! El AST se obtiene al reducir el [`crate::parse::Cst`] durante el
//! análisis semántico. Las cadenas de precedencia se aplanan en árboles
//! binarios asociativos por la izquierda, cada expresión conoce su tipo
//! resuelto y cada uso de una variable conoce el alcance en el que fue
//! declarada.

use crate::{
    lex::Identifier,
    semantic::{ScopeId, Type},
    source::{Located, Location},
};

use std::fmt::{self, Display};

/// Raíz del árbol: el bloque principal de un programa.
#[derive(Clone, Debug, PartialEq)]
pub struct Ast {
    pub(crate) body: Block,
    pub(crate) location: Location,
}

impl Ast {
    pub fn body(&self) -> &Block {
        &self.body
    }

    pub fn location(&self) -> &Location {
        &self.location
    }
}

/// Secuencia de sentencias con su propio alcance léxico.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub scope: ScopeId,
    pub statements: Vec<Statement>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    VarDecl {
        typ: Type,
        name: Located<Identifier>,
        scope: ScopeId,
    },

    Assignment {
        target: Located<Binding>,
        value: Located<Expr>,
    },

    Print(Located<Expr>),

    If {
        condition: Located<Expr>,
        body: Block,
    },

    While {
        condition: Located<Expr>,
        body: Block,
    },

    Block(Block),
}

/// Referencia a una variable.
///
/// `scope` es `None` cuando el nombre no se pudo resolver.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub name: Identifier,
    pub scope: Option<ScopeId>,
}

impl Display for Binding {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            Some(scope) => write!(fmt, "{}@{}", self.name, scope),
            None => write!(fmt, "{}@?", self.name),
        }
    }
}

/// Expresión con tipo resuelto.
#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub typ: Type,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Variable(Binding),
    Unary(UnaryOp, Box<Located<Expr>>),
    Binary(Box<Located<Expr>>, BinaryOp, Box<Located<Expr>>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Literal {
    Int(u8),
    Bool(bool),
    Str(String),
}

impl Display for Literal {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(integer) => write!(fmt, "{}", integer),
            Literal::Bool(value) => write!(fmt, "{}", value),
            Literal::Str(string) => write!(fmt, "{:?}", string),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
}

impl Display for UnaryOp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Not => fmt.write_str("!"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Equal,
    NotEqual,
    And,
    Or,
}

impl Display for BinaryOp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use BinaryOp::*;

        let symbol = match self {
            Add      => "+",
            Equal    => "==",
            NotEqual => "!=",
            And      => "&&",
            Or       => "||",
        };

        fmt.write_str(symbol)
    }
}

impl Display for Ast {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(fmt, "<Program>")?;
        self.body.write_tree(fmt, 1)
    }
}

impl Block {
    fn write_tree(&self, fmt: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(fmt, "{:-<depth$}<Block #{}>", "", self.scope, depth = depth)?;
        for statement in &self.statements {
            statement.write_tree(fmt, depth + 1)?;
        }

        Ok(())
    }
}

impl Statement {
    fn write_tree(&self, fmt: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let leaf = depth + 1;

        match self {
            Statement::VarDecl { typ, name, .. } => {
                writeln!(fmt, "{:-<depth$}<VarDecl>", "", depth = depth)?;
                writeln!(fmt, "{:-<leaf$}[{}]", "", typ, leaf = leaf)?;
                writeln!(fmt, "{:-<leaf$}[{}]", "", name.val(), leaf = leaf)
            }

            Statement::Assignment { target, value } => {
                writeln!(fmt, "{:-<depth$}<Assign>", "", depth = depth)?;
                writeln!(fmt, "{:-<leaf$}[{}]", "", target.val().name, leaf = leaf)?;
                value.val().write_tree(fmt, leaf)
            }

            Statement::Print(value) => {
                writeln!(fmt, "{:-<depth$}<Print>", "", depth = depth)?;
                value.val().write_tree(fmt, leaf)
            }

            Statement::If { condition, body } => {
                writeln!(fmt, "{:-<depth$}<If>", "", depth = depth)?;
                condition.val().write_tree(fmt, leaf)?;
                body.write_tree(fmt, leaf)
            }

            Statement::While { condition, body } => {
                writeln!(fmt, "{:-<depth$}<While>", "", depth = depth)?;
                condition.val().write_tree(fmt, leaf)?;
                body.write_tree(fmt, leaf)
            }

            Statement::Block(block) => block.write_tree(fmt, depth),
        }
    }
}

impl Expr {
    fn write_tree(&self, fmt: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        match &self.kind {
            ExprKind::Literal(literal) => {
                writeln!(fmt, "{:-<depth$}[{}]", "", literal, depth = depth)
            }

            ExprKind::Variable(binding) => {
                writeln!(fmt, "{:-<depth$}[{}]", "", binding.name, depth = depth)
            }

            ExprKind::Unary(op, operand) => {
                writeln!(fmt, "{:-<depth$}<{} : {}>", "", op, self.typ, depth = depth)?;
                operand.val().write_tree(fmt, depth + 1)
            }

            ExprKind::Binary(left, op, right) => {
                writeln!(fmt, "{:-<depth$}<{} : {}>", "", op, self.typ, depth = depth)?;
                left.val().write_tree(fmt, depth + 1)?;
                right.val().write_tree(fmt, depth + 1)
            }
        }
    }
}
