//! Análisis sintáctico.
//!
//! El parser es de descenso recursivo con un único token de lookahead
//! y sin backtracking. Produce un árbol de sintaxis concreta ([`Cst`])
//! que conserva cada token consumido, en el orden original, como hoja
//! del árbol. La reducción a un árbol abstracto ocurre después, en
//! [`crate::semantic`].
//!
//! # Recuperación
//! Ante un token inesperado se reporta un error y se descartan tokens,
//! manteniendo las llaves balanceadas, hasta encontrar una llave de
//! cierre o `$`. Esto permite que sentencias y bloques posteriores
//! se sigan analizando y se reporten más errores en una sola ejecución.

use crate::{
    error::{Category, Diagnostic, Report, Stage},
    lex::{Keyword, Token},
    source::{Located, Location},
};

use log::debug;
use std::fmt::{self, Display};
use thiserror::Error;

/// Error de sintaxis.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Expected {expected}, found {found} instead")]
    UnexpectedToken { expected: Token, found: Token },

    #[error("Expected any of `print`, `while`, `if`, a type, an identifier or `{{`, found {0} instead")]
    ExpectedStatement(Token),

    #[error("Expected an expression, found {0} instead")]
    ExpectedExpr(Token),

    #[error("Expected any of `int`, `string`, `boolean`, found {0} instead")]
    ExpectedType(Token),

    #[error("Expected an identifier, found {0} instead")]
    ExpectedId(Token),
}

impl Report for ParserError {
    const STAGE: Stage = Stage::Parser;

    fn category(&self) -> Category {
        Category::Syntax
    }
}

/// Regla gramatical que etiqueta a un nodo del [`Cst`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Rule {
    Program,
    Block,
    StatementList,
    Statement,
    PrintStatement,
    AssignmentStatement,
    VarDecl,
    WhileStatement,
    IfStatement,
    Expr,
    OrExpr,
    AndExpr,
    BooleanExpr,
    IntExpr,
    UnaryExpr,
    Primary,
    StringExpr,
    CharList,
    Type,
    Id,
}

impl Display for Rule {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Rule::*;

        let name = match self {
            Program             => "Program",
            Block               => "Block",
            StatementList       => "Statement List",
            Statement           => "Statement",
            PrintStatement      => "Print Statement",
            AssignmentStatement => "Assignment Statement",
            VarDecl             => "Variable Declaration",
            WhileStatement      => "While Statement",
            IfStatement         => "If Statement",
            Expr                => "Expr",
            OrExpr              => "Or Expr",
            AndExpr             => "And Expr",
            BooleanExpr         => "Boolean Expr",
            IntExpr             => "Int Expr",
            UnaryExpr           => "Unary Expr",
            Primary             => "Primary",
            StringExpr          => "String Expr",
            CharList            => "Char List",
            Type                => "Type",
            Id                  => "Id",
        };

        fmt.write_str(name)
    }
}

/// Árbol de sintaxis concreta.
///
/// Cada nodo es dueño de sus hijos, los cuales son tokens terminales
/// o bien otros nodos.
#[derive(Clone, Debug, PartialEq)]
pub struct Cst {
    rule: Rule,
    children: Vec<Child>,
}

/// Hijo de un nodo del [`Cst`].
#[derive(Clone, Debug, PartialEq)]
pub enum Child {
    Terminal(Located<Token>),
    Node(Cst),
}

impl Cst {
    fn new(rule: Rule) -> Self {
        Cst {
            rule,
            children: Vec::new(),
        }
    }

    fn with(rule: Rule, children: Vec<Child>) -> Self {
        Cst { rule, children }
    }

    pub fn rule(&self) -> Rule {
        self.rule
    }

    pub fn children(&self) -> &[Child] {
        &self.children
    }

    /// Hijos inmediatos que son nodos.
    pub fn nodes(&self) -> impl Iterator<Item = &Cst> {
        self.children.iter().filter_map(|child| match child {
            Child::Node(node) => Some(node),
            Child::Terminal(_) => None,
        })
    }

    /// Primer hijo inmediato con una regla dada.
    pub fn node(&self, rule: Rule) -> Option<&Cst> {
        self.nodes().find(|node| node.rule == rule)
    }

    /// Hijos inmediatos que son terminales.
    pub fn tokens(&self) -> impl Iterator<Item = &Located<Token>> {
        self.children.iter().filter_map(|child| match child {
            Child::Terminal(token) => Some(token),
            Child::Node(_) => None,
        })
    }

    /// Recorre las hojas en orden de izquierda a derecha.
    pub fn terminals(&self) -> impl Iterator<Item = &Located<Token>> {
        let mut terminals = Vec::new();
        self.collect_terminals(&mut terminals);

        terminals.into_iter()
    }

    /// Ubicación cubierta por el nodo, si contiene al menos un terminal.
    pub fn location(&self) -> Option<Location> {
        let first = self.terminals().next()?.location().clone();
        let last = self.terminals().last()?;

        Some(Location::span(first, last.location()))
    }

    fn collect_terminals<'a>(&'a self, terminals: &mut Vec<&'a Located<Token>>) {
        for child in &self.children {
            match child {
                Child::Terminal(token) => terminals.push(token),
                Child::Node(node) => node.collect_terminals(terminals),
            }
        }
    }

    fn push_token(&mut self, token: Located<Token>) {
        self.children.push(Child::Terminal(token));
    }

    fn push_node(&mut self, node: Cst) {
        self.children.push(Child::Node(node));
    }

    fn write_tree(&self, fmt: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(fmt, "{:-<depth$}<{}>", "", self.rule, depth = depth)?;

        for child in &self.children {
            match child {
                Child::Terminal(token) => {
                    let depth = depth + 1;
                    writeln!(fmt, "{:-<depth$}[{}]", "", token.val().lexeme(), depth = depth)?;
                }

                Child::Node(node) => node.write_tree(fmt, depth + 1)?,
            }
        }

        Ok(())
    }
}

impl Display for Cst {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_tree(fmt, 0)
    }
}

/// Construye el [`Cst`] de un único programa.
///
/// Se espera que `tokens` termine en [`Token::Eop`] o [`Token::Eof`]. El
/// árbol siempre se produce; si hubo errores, las sentencias descartadas
/// durante la recuperación no forman parte de él.
pub fn parse(tokens: &[Located<Token>]) -> (Cst, Vec<Diagnostic>) {
    if tokens.is_empty() {
        return (Cst::new(Rule::Program), Vec::new());
    }

    let mut parser = Parser {
        tokens,
        cursor: 0,
        errors: Vec::new(),
    };

    let cst = parser.program();
    debug!("Parsed program with {} syntax errors", parser.errors.len());

    let diagnostics = parser.errors.into_iter().map(Diagnostic::from).collect();
    (cst, diagnostics)
}

struct Parser<'a> {
    tokens: &'a [Located<Token>],
    cursor: usize,
    errors: Vec<Located<ParserError>>,
}

type Parse<T> = Result<T, Located<ParserError>>;

impl Parser<'_> {
    fn program(&mut self) -> Cst {
        let mut program = Cst::new(Rule::Program);

        match self.block() {
            Ok(block) => program.push_node(block),
            Err(error) => self.report(error),
        }

        // Todo lo que sobre antes de `$` es un error
        if !matches!(self.peek(), Token::Eop | Token::Eof) {
            let error = self.unexpected(Token::Eop);
            self.report(error);

            while !matches!(self.peek(), Token::Eop | Token::Eof) {
                self.next();
            }
        }

        match self.expect(Token::Eop) {
            Ok(eop) => program.push_token(eop),
            Err(error) => self.report(error),
        }

        program
    }

    fn block(&mut self) -> Parse<Cst> {
        debug!("Parsing {}", Rule::Block);

        let open = self.expect(Token::OpenCurly)?;
        let statements = self.statement_list();
        let close = self.expect(Token::CloseCurly)?;

        let mut block = Cst::new(Rule::Block);
        block.push_token(open);
        block.push_node(statements);
        block.push_token(close);

        Ok(block)
    }

    fn statement_list(&mut self) -> Cst {
        let mut list = Cst::new(Rule::StatementList);

        loop {
            match self.peek() {
                Token::CloseCurly | Token::Eop | Token::Eof => break list,
                _ => match self.statement() {
                    Ok(statement) => list.push_node(statement),
                    Err(error) => {
                        self.report(error);
                        self.synchronize();
                    }
                },
            }
        }
    }

    fn statement(&mut self) -> Parse<Cst> {
        use Keyword::*;

        let inner = match self.peek() {
            Token::Keyword(Print) => self.print_statement()?,
            Token::Keyword(While) => self.while_statement()?,
            Token::Keyword(If) => self.if_statement()?,
            Token::Keyword(Int | String | Boolean) => self.var_decl()?,
            Token::Id(_) => self.assignment()?,
            Token::OpenCurly => self.block()?,

            found => return self.fail(ParserError::ExpectedStatement(found)),
        };

        Ok(Cst::with(Rule::Statement, vec![Child::Node(inner)]))
    }

    fn print_statement(&mut self) -> Parse<Cst> {
        debug!("Parsing {}", Rule::PrintStatement);

        let mut node = Cst::new(Rule::PrintStatement);
        node.push_token(self.expect(Token::Keyword(Keyword::Print))?);
        node.push_token(self.expect(Token::OpenParen)?);
        node.push_node(self.expr()?);
        node.push_token(self.expect(Token::CloseParen)?);

        Ok(node)
    }

    fn assignment(&mut self) -> Parse<Cst> {
        debug!("Parsing {}", Rule::AssignmentStatement);

        let mut node = Cst::new(Rule::AssignmentStatement);
        node.push_node(self.id()?);
        node.push_token(self.expect(Token::Assign)?);
        node.push_node(self.expr()?);

        Ok(node)
    }

    fn var_decl(&mut self) -> Parse<Cst> {
        debug!("Parsing {}", Rule::VarDecl);

        let mut node = Cst::new(Rule::VarDecl);
        node.push_node(self.typ()?);
        node.push_node(self.id()?);

        Ok(node)
    }

    fn while_statement(&mut self) -> Parse<Cst> {
        debug!("Parsing {}", Rule::WhileStatement);

        let mut node = Cst::new(Rule::WhileStatement);
        node.push_token(self.expect(Token::Keyword(Keyword::While))?);
        node.push_node(self.expr()?);
        node.push_node(self.block()?);

        Ok(node)
    }

    fn if_statement(&mut self) -> Parse<Cst> {
        debug!("Parsing {}", Rule::IfStatement);

        let mut node = Cst::new(Rule::IfStatement);
        node.push_token(self.expect(Token::Keyword(Keyword::If))?);
        node.push_node(self.expr()?);
        node.push_node(self.block()?);

        Ok(node)
    }

    fn expr(&mut self) -> Parse<Cst> {
        Ok(Cst::with(Rule::Expr, vec![Child::Node(self.or_expr()?)]))
    }

    fn or_expr(&mut self) -> Parse<Cst> {
        self.binary_chain(Rule::OrExpr, &[Token::Or], Parser::and_expr)
    }

    fn and_expr(&mut self) -> Parse<Cst> {
        self.binary_chain(Rule::AndExpr, &[Token::And], Parser::boolean_expr)
    }

    fn boolean_expr(&mut self) -> Parse<Cst> {
        self.binary_chain(
            Rule::BooleanExpr,
            &[Token::Equal, Token::NotEqual],
            Parser::int_expr,
        )
    }

    fn int_expr(&mut self) -> Parse<Cst> {
        self.binary_chain(Rule::IntExpr, &[Token::Plus], Parser::unary_expr)
    }

    fn unary_expr(&mut self) -> Parse<Cst> {
        let mut node = Cst::new(Rule::UnaryExpr);

        if self.peek() == Token::Not {
            node.push_token(self.next());
            node.push_node(self.unary_expr()?);
        } else {
            node.push_node(self.primary()?);
        }

        Ok(node)
    }

    fn primary(&mut self) -> Parse<Cst> {
        let mut node = Cst::new(Rule::Primary);

        match self.peek() {
            Token::IntLiteral(_) | Token::BoolLiteral(_) => node.push_token(self.next()),
            Token::Id(_) => node.push_node(self.id()?),
            Token::Quote => node.push_node(self.string_expr()?),
            Token::OpenParen => {
                node.push_token(self.next());
                node.push_node(self.expr()?);
                node.push_token(self.expect(Token::CloseParen)?);
            }

            found => return self.fail(ParserError::ExpectedExpr(found)),
        }

        Ok(node)
    }

    fn string_expr(&mut self) -> Parse<Cst> {
        let mut node = Cst::new(Rule::StringExpr);
        node.push_token(self.expect(Token::Quote)?);

        let mut chars = Cst::new(Rule::CharList);
        while let Token::Char(_) = self.peek() {
            chars.push_token(self.next());
        }

        node.push_node(chars);
        node.push_token(self.expect(Token::Quote)?);

        Ok(node)
    }

    fn typ(&mut self) -> Parse<Cst> {
        use Keyword::*;

        match self.peek() {
            Token::Keyword(Int | String | Boolean) => {
                Ok(Cst::with(Rule::Type, vec![Child::Terminal(self.next())]))
            }

            found => self.fail(ParserError::ExpectedType(found)),
        }
    }

    fn id(&mut self) -> Parse<Cst> {
        match self.peek() {
            Token::Id(_) => Ok(Cst::with(Rule::Id, vec![Child::Terminal(self.next())])),
            found => self.fail(ParserError::ExpectedId(found)),
        }
    }

    /// Secuencia `operand (operator operand)*` para un nivel de precedencia.
    fn binary_chain<F>(&mut self, rule: Rule, operators: &[Token], mut operand: F) -> Parse<Cst>
    where
        F: FnMut(&mut Self) -> Parse<Cst>,
    {
        let mut node = Cst::new(rule);
        node.push_node(operand(self)?);

        while operators.contains(&self.peek()) {
            node.push_token(self.next());
            node.push_node(operand(self)?);
        }

        Ok(node)
    }

    /// Descarta tokens hasta una llave de cierre sin pareja o `$`,
    /// sin consumir a éstos.
    fn synchronize(&mut self) {
        let mut depth = 0usize;

        loop {
            match self.peek() {
                Token::Eop | Token::Eof => break,
                Token::CloseCurly if depth == 0 => break,
                Token::CloseCurly => depth -= 1,
                Token::OpenCurly => depth += 1,
                _ => (),
            }

            self.next();
        }
    }

    /// Registra un error, a lo sumo uno por posición.
    fn report(&mut self, error: Located<ParserError>) {
        let start = error.location().start();
        if self.errors.iter().all(|other| other.location().start() != start) {
            self.errors.push(error);
        }
    }

    fn expect(&mut self, token: Token) -> Parse<Located<Token>> {
        if self.peek() == token {
            Ok(self.next())
        } else {
            Err(self.unexpected(token))
        }
    }

    fn unexpected(&self, expected: Token) -> Located<ParserError> {
        let found = self.peek();
        Located::at(
            ParserError::UnexpectedToken { expected, found },
            self.here().location().clone(),
        )
    }

    fn peek(&self) -> Token {
        *self.here().val()
    }

    /// Token actual. Al agotarse la entrada se repite el último.
    fn here(&self) -> &Located<Token> {
        let last = self.tokens.len() - 1;
        &self.tokens[self.cursor.min(last)]
    }

    fn next(&mut self) -> Located<Token> {
        let token = self.here().clone();
        if self.cursor < self.tokens.len() {
            self.cursor += 1;
        }

        token
    }

    fn fail<T>(&self, error: ParserError) -> Parse<T> {
        Err(Located::at(error, self.here().location().clone()))
    }
}
