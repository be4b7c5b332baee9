//! Análisis semántico.
//!
//! Un único recorrido del [`Cst`] que a la vez reduce el árbol concreto a
//! un [`Ast`] y resuelve nombres contra una [`SymbolTable`] con alcances
//! anidados. Durante el recorrido se verifican declaraciones y tipos. Al
//! terminar se inspeccionan todas las entradas de la tabla en busca de
//! variables sin uso o sin inicializar, lo cual produce advertencias.
//!
//! Un error de tipos no detiene el análisis: la expresión ofensiva toma
//! el tipo centinela [`Type::Error`], el cual es compatible con todo y no
//! provoca errores en cascada.

use crate::{
    ast::{Ast, BinaryOp, Binding, Block, Expr, ExprKind, Literal, Statement, UnaryOp},
    error::{Category, Diagnostic, Report, Stage},
    lex::{Identifier, Keyword, Token},
    parse::{Child, Cst, Rule},
    source::{Located, Location, Position, Source},
};

use log::debug;
use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

use thiserror::Error;

/// Tipo de un valor.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    String,
    Boolean,

    /// Centinela para expresiones mal tipadas.
    Error,
}

impl Display for Type {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => fmt.write_str("int"),
            Type::String => fmt.write_str("string"),
            Type::Boolean => fmt.write_str("boolean"),
            Type::Error => fmt.write_str("<error>"),
        }
    }
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SemanticError {
    #[error("Undeclared identifier `{0}`")]
    Undeclared(Identifier),

    #[error("Identifier `{0}` was already declared in this scope on line {1}")]
    Redeclared(Identifier, u32),

    #[error("Type mismatch: cannot assign `{value}` to `{name}`, which is declared as `{declared}`")]
    AssignMismatch {
        name: Identifier,
        declared: Type,
        value: Type,
    },

    #[error("Type mismatch: operator `{op}` cannot be applied to `{left}` and `{right}`")]
    BinaryMismatch { op: BinaryOp, left: Type, right: Type },

    #[error("Type mismatch: operator `{op}` cannot be applied to `{operand}`")]
    UnaryMismatch { op: UnaryOp, operand: Type },

    #[error("Type mismatch: expected `boolean` condition, found `{0}`")]
    Condition(Type),
}

impl Report for SemanticError {
    const STAGE: Stage = Stage::Semantic;

    fn category(&self) -> Category {
        match self {
            SemanticError::Undeclared(_) | SemanticError::Redeclared(..) => Category::Declaration,
            _ => Category::Type,
        }
    }
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SemanticWarning {
    #[error("Variable `{0}` is declared but never used")]
    DeclaredUnused(Identifier),

    #[error("Variable `{0}` is assigned but its value is never used")]
    AssignedUnused(Identifier),

    #[error("Variable `{0}` is used but never initialized")]
    UsedUninitialized(Identifier),

    #[error("Variable `{0}` may be used before it is initialized")]
    MaybeUninitialized(Identifier),
}

impl Report for SemanticWarning {
    const STAGE: Stage = Stage::Semantic;

    fn category(&self) -> Category {
        Category::Warning
    }
}

/// Índice de un alcance dentro de la [`SymbolTable`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeId(usize);

impl ScopeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for ScopeId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}", self.0)
    }
}

/// Información de una variable declarada.
#[derive(Clone, Debug)]
pub struct Entry {
    typ: Type,
    declared: Location,
    initialized: bool,
    used: bool,
    used_before_init: bool,
}

impl Entry {
    pub fn typ(&self) -> Type {
        self.typ
    }

    pub fn declared(&self) -> &Location {
        &self.declared
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_used(&self) -> bool {
        self.used
    }

    pub fn is_used_before_init(&self) -> bool {
        self.used_before_init
    }

    fn warning(&self, name: Identifier) -> Option<SemanticWarning> {
        use SemanticWarning::*;

        match (self.used, self.initialized) {
            (false, false) => Some(DeclaredUnused(name)),
            (false, true) => Some(AssignedUnused(name)),
            (true, false) => Some(UsedUninitialized(name)),
            (true, true) if self.used_before_init => Some(MaybeUninitialized(name)),
            (true, true) => None,
        }
    }
}

/// Un alcance léxico.
#[derive(Clone, Debug)]
pub struct Scope {
    id: ScopeId,
    parent: Option<ScopeId>,
    symbols: BTreeMap<Identifier, Entry>,
}

impl Scope {
    pub fn id(&self) -> ScopeId {
        self.id
    }

    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    pub fn get(&self, name: Identifier) -> Option<&Entry> {
        self.symbols.get(&name)
    }

    pub fn symbols(&self) -> impl Iterator<Item = (Identifier, &Entry)> {
        self.symbols.iter().map(|(name, entry)| (*name, entry))
    }
}

/// Arena de alcances en orden de creación.
///
/// Los alcances se conservan después de que el recorrido sale de ellos,
/// por lo cual la tabla completa puede mostrarse al final. El índice del
/// padre solo se utiliza para navegar durante búsquedas.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl SymbolTable {
    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub fn scope(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id.0)
    }

    /// Busca un nombre desde un alcance hacia afuera.
    pub fn lookup(&self, from: ScopeId, name: Identifier) -> Option<(ScopeId, &Entry)> {
        let mut current = Some(from);
        while let Some(id) = current {
            let scope = self.scope(id)?;
            if let Some(entry) = scope.get(name) {
                return Some((id, entry));
            }

            current = scope.parent;
        }

        None
    }

    fn open(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            id,
            parent,
            symbols: BTreeMap::new(),
        });

        id
    }

    fn entry_mut(&mut self, scope: ScopeId, name: Identifier) -> Option<&mut Entry> {
        self.scopes.get_mut(scope.0)?.symbols.get_mut(&name)
    }
}

impl Display for SymbolTable {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            fmt,
            "{:<6}{:<6}{:<9}{:<6}{:<6}{:<13}{}",
            "Name", "Scope", "Type", "Line", "Col", "Initialized", "Used"
        )?;

        for scope in &self.scopes {
            for (name, entry) in scope.symbols() {
                let position = entry.declared.start();
                writeln!(
                    fmt,
                    "{:<6}{:<6}{:<9}{:<6}{:<6}{:<13}{}",
                    name.to_string(),
                    scope.id.to_string(),
                    entry.typ.to_string(),
                    position.line(),
                    position.column(),
                    yes_no(entry.initialized),
                    yes_no(entry.used)
                )?;
            }
        }

        Ok(())
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// Reduce un [`Cst`] a un [`Ast`] y construye su tabla de símbolos.
///
/// Se espera un árbol sin errores de sintaxis. Estructuras incompletas
/// se omiten silenciosamente.
pub fn analyze(cst: &Cst) -> (Ast, SymbolTable, Vec<Diagnostic>) {
    let mut analyzer = Analyzer {
        symbols: SymbolTable::default(),
        scope: None,
        diagnostics: Vec::new(),
    };

    let body = match cst.node(Rule::Block) {
        Some(block) => analyzer.block(block),
        None => Block {
            scope: analyzer.symbols.open(None),
            statements: Vec::new(),
        },
    };

    let location = cst.location().unwrap_or_else(|| {
        let empty = Source::new("<empty>", "");
        Location::at(&empty, Position::default())
    });

    let Analyzer {
        symbols,
        mut diagnostics,
        ..
    } = analyzer;

    let errors = diagnostics.len();

    // Advertencias, una por entrada como máximo
    for scope in &symbols.scopes {
        for (name, entry) in scope.symbols() {
            if let Some(warning) = entry.warning(name) {
                let location = entry.declared.clone();
                diagnostics.push(Located::at(warning, location).into());
            }
        }
    }

    debug!(
        "Analysis finished with {} scopes, {} errors and {} warnings",
        symbols.scopes.len(),
        errors,
        diagnostics.len() - errors
    );

    (Ast { body, location }, symbols, diagnostics)
}

struct Analyzer {
    symbols: SymbolTable,
    scope: Option<ScopeId>,
    diagnostics: Vec<Diagnostic>,
}

impl Analyzer {
    fn block(&mut self, cst: &Cst) -> Block {
        let scope = self.symbols.open(self.scope);
        let outer = self.scope.replace(scope);
        debug!("Entering scope {}", scope);

        let statements = cst
            .node(Rule::StatementList)
            .into_iter()
            .flat_map(|list| list.nodes())
            .filter_map(|statement| statement.nodes().next())
            .filter_map(|statement| self.statement(statement))
            .collect();

        debug!("Leaving scope {}", scope);
        self.scope = outer;

        Block { scope, statements }
    }

    fn statement(&mut self, cst: &Cst) -> Option<Statement> {
        match cst.rule() {
            Rule::PrintStatement => {
                let value = self.expr(cst.node(Rule::Expr)?)?;
                Some(Statement::Print(value))
            }

            Rule::AssignmentStatement => self.assignment(cst),
            Rule::VarDecl => self.var_decl(cst),

            Rule::IfStatement => {
                let (condition, body) = self.conditional(cst)?;
                Some(Statement::If { condition, body })
            }

            Rule::WhileStatement => {
                let (condition, body) = self.conditional(cst)?;
                Some(Statement::While { condition, body })
            }

            Rule::Block => Some(Statement::Block(self.block(cst))),

            _ => None,
        }
    }

    fn var_decl(&mut self, cst: &Cst) -> Option<Statement> {
        let typ = match cst.node(Rule::Type)?.tokens().next()?.val() {
            Token::Keyword(Keyword::Int) => Type::Int,
            Token::Keyword(Keyword::String) => Type::String,
            Token::Keyword(Keyword::Boolean) => Type::Boolean,
            _ => return None,
        };

        let name = id(cst.node(Rule::Id)?)?;
        let scope = self.scope?;

        let previous = self
            .symbols
            .scope(scope)?
            .get(*name.val())
            .map(|entry| entry.declared.start().line());

        match previous {
            Some(line) => {
                let error = SemanticError::Redeclared(*name.val(), line);
                self.error(error, name.location().clone());
            }

            None => {
                let entry = Entry {
                    typ,
                    declared: name.location().clone(),
                    initialized: false,
                    used: false,
                    used_before_init: false,
                };

                self.symbols.scopes[scope.0].symbols.insert(*name.val(), entry);
            }
        }

        Some(Statement::VarDecl { typ, name, scope })
    }

    fn assignment(&mut self, cst: &Cst) -> Option<Statement> {
        let name = id(cst.node(Rule::Id)?)?;

        // El valor se analiza antes de marcar el destino como inicializado,
        // por lo cual `a = a + 1` es un uso sin inicializar de `a`
        let value = self.expr(cst.node(Rule::Expr)?)?;

        let (location, name) = name.split();
        let resolved = self.resolve(name).map(|(scope, entry)| {
            entry.initialized = true;
            (scope, entry.typ)
        });

        let (scope, declared) = match resolved {
            Some((scope, typ)) => (Some(scope), typ),
            None => {
                self.error(SemanticError::Undeclared(name), location.clone());
                (None, Type::Error)
            }
        };

        if !compatible(declared, value.val().typ) {
            let error = SemanticError::AssignMismatch {
                name,
                declared,
                value: value.val().typ,
            };

            let span = Location::span(location.clone(), value.location());
            self.error(error, span);
        }

        let target = Located::at(Binding { name, scope }, location);
        Some(Statement::Assignment { target, value })
    }

    fn conditional(&mut self, cst: &Cst) -> Option<(Located<Expr>, Block)> {
        let condition = self.expr(cst.node(Rule::Expr)?)?;

        let typ = condition.val().typ;
        if !compatible(Type::Boolean, typ) {
            self.error(SemanticError::Condition(typ), condition.location().clone());
        }

        let body = self.block(cst.node(Rule::Block)?);
        Some((condition, body))
    }

    fn expr(&mut self, cst: &Cst) -> Option<Located<Expr>> {
        match cst.rule() {
            Rule::Expr => self.expr(cst.nodes().next()?),

            Rule::OrExpr | Rule::AndExpr | Rule::BooleanExpr | Rule::IntExpr => {
                let mut children = cst.children().iter();

                let mut left = match children.next()? {
                    Child::Node(node) => self.expr(node)?,
                    Child::Terminal(_) => return None,
                };

                while let (Some(Child::Terminal(op)), Some(Child::Node(right))) =
                    (children.next(), children.next())
                {
                    let op = binary_op(*op.val())?;
                    let right = self.expr(right)?;
                    left = self.binary(left, op, right);
                }

                Some(left)
            }

            Rule::UnaryExpr => match cst.children() {
                [Child::Terminal(not), Child::Node(operand)] if *not.val() == Token::Not => {
                    let operand = self.expr(operand)?;
                    Some(self.not(not.location().clone(), operand))
                }

                [Child::Node(primary)] => self.expr(primary),
                _ => None,
            },

            Rule::Primary => match cst.children() {
                [Child::Terminal(token)] => {
                    let (location, token) = token.clone().split();
                    let (literal, typ) = match token {
                        Token::IntLiteral(integer) => (Literal::Int(integer), Type::Int),
                        Token::BoolLiteral(value) => (Literal::Bool(value), Type::Boolean),
                        _ => return None,
                    };

                    let kind = ExprKind::Literal(literal);
                    Some(Located::at(Expr { kind, typ }, location))
                }

                [Child::Node(node)] if node.rule() == Rule::Id => {
                    let name = id(node)?;
                    Some(self.variable(name))
                }

                [Child::Node(node)] if node.rule() == Rule::StringExpr => string(node),

                [Child::Terminal(_), Child::Node(inner), Child::Terminal(_)] => self.expr(inner),
                _ => None,
            },

            _ => None,
        }
    }

    fn variable(&mut self, name: Located<Identifier>) -> Located<Expr> {
        let (location, name) = name.split();

        let resolved = self.resolve(name).map(|(scope, entry)| {
            entry.used = true;
            if !entry.initialized {
                entry.used_before_init = true;
            }

            (scope, entry.typ)
        });

        let (scope, typ) = match resolved {
            Some((scope, typ)) => (Some(scope), typ),
            None => {
                self.error(SemanticError::Undeclared(name), location.clone());
                (None, Type::Error)
            }
        };

        let kind = ExprKind::Variable(Binding { name, scope });
        Located::at(Expr { kind, typ }, location)
    }

    fn binary(&mut self, left: Located<Expr>, op: BinaryOp, right: Located<Expr>) -> Located<Expr> {
        use BinaryOp::*;

        let location = Location::span(left.location().clone(), right.location());
        let (l, r) = (left.val().typ, right.val().typ);

        let typ = match (op, l, r) {
            (_, Type::Error, _) | (_, _, Type::Error) => Type::Error,
            (Add, Type::Int, Type::Int) => Type::Int,
            (Equal | NotEqual, l, r) if l == r => Type::Boolean,
            (And | Or, Type::Boolean, Type::Boolean) => Type::Boolean,

            _ => {
                let error = SemanticError::BinaryMismatch {
                    op,
                    left: l,
                    right: r,
                };

                self.error(error, location.clone());
                Type::Error
            }
        };

        let kind = ExprKind::Binary(Box::new(left), op, Box::new(right));
        Located::at(Expr { kind, typ }, location)
    }

    fn not(&mut self, bang: Location, operand: Located<Expr>) -> Located<Expr> {
        let location = Location::span(bang, operand.location());

        let typ = match operand.val().typ {
            Type::Boolean => Type::Boolean,
            Type::Error => Type::Error,
            other => {
                let error = SemanticError::UnaryMismatch {
                    op: UnaryOp::Not,
                    operand: other,
                };

                self.error(error, location.clone());
                Type::Error
            }
        };

        let kind = ExprKind::Unary(UnaryOp::Not, Box::new(operand));
        Located::at(Expr { kind, typ }, location)
    }

    /// Resuelve un nombre desde el alcance actual hacia afuera.
    fn resolve(&mut self, name: Identifier) -> Option<(ScopeId, &mut Entry)> {
        let (scope, _) = self.symbols.lookup(self.scope?, name)?;
        let entry = self.symbols.entry_mut(scope, name)?;

        Some((scope, entry))
    }

    fn error(&mut self, error: SemanticError, location: Location) {
        self.diagnostics.push(Located::at(error, location).into());
    }
}

/// Dos tipos son compatibles si son iguales o alguno es el centinela.
fn compatible(expected: Type, found: Type) -> bool {
    expected == found || expected == Type::Error || found == Type::Error
}

fn binary_op(token: Token) -> Option<BinaryOp> {
    let op = match token {
        Token::Plus => BinaryOp::Add,
        Token::Equal => BinaryOp::Equal,
        Token::NotEqual => BinaryOp::NotEqual,
        Token::And => BinaryOp::And,
        Token::Or => BinaryOp::Or,
        _ => return None,
    };

    Some(op)
}

fn id(cst: &Cst) -> Option<Located<Identifier>> {
    let token = cst.tokens().next()?;
    match token.val() {
        Token::Id(id) => Some(Located::at(*id, token.location().clone())),
        _ => None,
    }
}

fn string(cst: &Cst) -> Option<Located<Expr>> {
    let string = cst
        .node(Rule::CharList)?
        .tokens()
        .filter_map(|token| match token.val() {
            Token::Char(c) => Some(*c),
            _ => None,
        })
        .collect();

    let kind = ExprKind::Literal(Literal::Str(string));
    Some(Located::at(
        Expr {
            kind,
            typ: Type::String,
        },
        cst.location()?,
    ))
}
