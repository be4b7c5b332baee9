//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del compilador. Descompone un [`Source`]
//! (texto completo, posiblemente con varios programas) en unidades léxicas
//! denominadas tokens. Los espacios en blanco y los comentarios se descartan
//! durante esta operación. Cada token emitido está asociado a una ubicación
//! en el código fuente original, lo cual permite rastrear errores en tanto
//! los mismos como constructos más elevados de fases posteriores.
//!
//! # Contenido de un token
//! Operadores, puntuación y palabras clave se identifican por el hecho de lo
//! que son y no incluyen lexemas. Los identificadores son de una única letra,
//! la cual se preserva. Las constantes literales se resuelven a sus valores.
//! El lexema original de cualquier token se reconstruye con [`Token::lexeme()`].
//!
//! # Reglas importantes del lenguaje
//! - Los identificadores son una única letra minúscula.
//! - Una secuencia de letras se divide tomando el prefijo más largo que
//!   sea palabra clave, o en otro caso un identificador por letra. Por
//!   ejemplo, `intx` resulta en [`Keyword::Int`] seguido de `x`.
//! - Dentro de una cadena solo se admiten letras minúsculas y espacios,
//!   y cada uno de ellos es un token [`Token::Char`] independiente.
//! - `$` termina un programa. Un mismo texto puede contener varios.
//!
//! # Errores
//! El lexer se recupera de todas sus condiciones de error: el carácter
//! ofensivo se descarta y el análisis continúa. Esto permite reportar
//! todos los errores léxicos de una misma ejecución.

use crate::{
    error::{Category, Diagnostic, Report, Stage},
    source::{Located, Location, Position, Source},
};

use log::trace;
use std::{
    fmt::{self, Display},
    iter::Peekable,
    rc::Rc,
    str::FromStr,
};

use thiserror::Error;

/// Longitud de la palabra clave más larga.
const LONGEST_WORD: usize = 7;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LexerError {
    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("Unrecognized character {0:?}")]
    BadChar(char),

    /// Carácter no permitido dentro de una cadena.
    #[error("Character {0:?} is not allowed in strings, only lowercase letters and spaces")]
    BadStringChar(char),

    /// Una cadena no se cerró antes del fin de línea o de programa.
    #[error("Unterminated string literal")]
    UnterminatedString,

    /// Un comentario no se cerró antes del fin de la entrada.
    #[error("Unterminated comment, expected `*/`")]
    UnterminatedComment,

    /// Se esperaba un operador doble, como `&&` o `||`.
    #[error("Expected `{0}{0}`")]
    Expected(char),

    /// Una constante entera se encuentra fuera de rango.
    #[error("Integer literal overflow, valid range is [0, 255]")]
    IntOverflow,

    /// El último programa no termina con `$`.
    #[error("Missing end-of-program marker `$`, one was inserted at end of input")]
    MissingEop,
}

impl Report for LexerError {
    const STAGE: Stage = Stage::Lexer;

    fn category(&self) -> Category {
        match self {
            LexerError::MissingEop => Category::Warning,
            _ => Category::Lexical,
        }
    }
}

/// Un identificador.
///
/// Los identificadores son exactamente una letra minúscula.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier(char);

impl Identifier {
    /// Construye un identificador si `letter` es válida.
    pub fn new(letter: char) -> Option<Self> {
        letter.is_ascii_lowercase().then(|| Identifier(letter))
    }

    pub fn letter(self) -> char {
        self.0
    }
}

impl Display for Identifier {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}", self.0)
    }
}

/// Objeto resultante del análisis léxico.
///
/// Un token contiene suficiente información para describir completamente
/// a una entidad léxica en el programa fuente.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Token {
    /// Identificador.
    Id(Identifier),

    /// Palabra clave.
    Keyword(Keyword),

    /// `true` o `false`.
    BoolLiteral(bool),

    /// Literal de entero.
    IntLiteral(u8),

    /// Carácter dentro de una cadena.
    Char(char),

    /// `"`
    Quote,

    /// `=`
    Assign,

    /// `==`
    Equal,

    /// `!=`
    NotEqual,

    /// `+`
    Plus,

    /// `&&`
    And,

    /// `||`
    Or,

    /// `!`
    Not,

    /// `(`
    OpenParen,

    /// `)`
    CloseParen,

    /// `{`
    OpenCurly,

    /// `}`
    CloseCurly,

    /// `$`, fin de programa.
    Eop,

    /// Fin de la entrada. Siempre es el último token.
    Eof,
}

impl Token {
    /// Reconstruye el texto original del token.
    pub fn lexeme(&self) -> String {
        use Token::*;

        let fixed = match self {
            Id(id) => return id.to_string(),
            Keyword(keyword) => return keyword.to_string(),
            BoolLiteral(value) => return value.to_string(),
            IntLiteral(integer) => return integer.to_string(),
            Char(c) => return c.to_string(),
            Quote => "\"",
            Assign => "=",
            Equal => "==",
            NotEqual => "!=",
            Plus => "+",
            And => "&&",
            Or => "||",
            Not => "!",
            OpenParen => "(",
            CloseParen => ")",
            OpenCurly => "{",
            CloseCurly => "}",
            Eop => "$",
            Eof => "",
        };

        fixed.to_owned()
    }
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Token::*;

        match self {
            Id(id) => write!(fmt, "identifier `{}`", id),
            Keyword(keyword) => write!(fmt, "keyword `{}`", keyword),
            BoolLiteral(value) => write!(fmt, "literal `{}`", value),
            IntLiteral(integer) => write!(fmt, "literal `{}`", integer),
            Char(c) => write!(fmt, "character `{}`", c),
            Eof => fmt.write_str("end of input"),
            other => write!(fmt, "`{}`", other.lexeme()),
        }
    }
}

/// Una palabra clave.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keyword {
    Print,
    While,
    If,
    Int,
    String,
    Boolean,
}

impl Display for Keyword {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Keyword::*;
        let string = match self {
            Print   => "print",
            While   => "while",
            If      => "if",
            Int     => "int",
            String  => "string",
            Boolean => "boolean",
        };

        fmt.write_str(string)
    }
}

impl FromStr for Keyword {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        use Keyword::*;

        const KEYWORDS: &[(&str, Keyword)] = &[
            ("print",   Print),
            ("while",   While),
            ("if",      If),
            ("int",     Int),
            ("string",  String),
            ("boolean", Boolean),
        ];

        KEYWORDS
            .iter()
            .find(|&&(name, _)| name == string)
            .map(|&(_, keyword)| keyword)
            .ok_or(())
    }
}

/// Descompone un texto completo en tokens.
///
/// Siempre se produce una secuencia terminada en [`Token::Eof`], aún en
/// presencia de errores. Los diagnósticos incluyen tanto errores como
/// la advertencia de `$` faltante.
pub fn tokenize(source: &Rc<Source>) -> (Vec<Located<Token>>, Vec<Diagnostic>) {
    let lexer = Lexer {
        source,
        chars: source.chars().peekable(),
        eof: source.eof(),
        state: State::Start,
        start: Position::default(),
        pending: false,
        tokens: Vec::new(),
        diagnostics: Vec::new(),
    };

    lexer.run()
}

/// Máquina de estados para análisis léxico.
///
/// Un lexer puede encontrarse en uno de diversos estados. La
/// salida del lexer, así como su siguiente estado, se define
/// a partir de tanto su estado actual como el siguiente carácter
/// encontrado en el flujo de entrada.
struct Lexer<'a, I: Iterator<Item = (char, Position)>> {
    source: &'a Rc<Source>,
    chars: Peekable<I>,
    eof: Position,
    state: State,
    start: Position,
    pending: bool,
    tokens: Vec<Located<Token>>,
    diagnostics: Vec<Diagnostic>,
}

/// Posibles estados del lexer.
enum State {
    /// Estado que ocurre antes de encontrar el inicio de un token.
    Start,

    /// Secuencia de letras, se divide en palabras clave e identificadores
    /// al terminar.
    Word(String),

    /// Constante entera, junto a la posición de su último dígito.
    Integer(u32, Position),

    /// Se encontró `/`. Debería seguir `*`.
    Slash,

    /// Dentro de un comentario.
    Comment,

    /// Dentro de un comentario, justo después de `*`.
    CommentStar,

    /// Dentro de una cadena que abrió en la posición indicada.
    String(Position),

    /// `!` o `!=`.
    Bang,

    /// `=` o `==`.
    EqualSign,

    /// Primer `&` de `&&`.
    Amp,

    /// Primer `|` de `||`.
    Pipe,
}

impl<I: Iterator<Item = (char, Position)>> Lexer<'_, I> {
    fn run(mut self) -> (Vec<Located<Token>>, Vec<Diagnostic>) {
        use {State::*, Token::*};

        loop {
            let (next_char, here) = match self.chars.peek() {
                Some(&(c, position)) => (Some(c), position),
                None => (None, self.eof),
            };

            if let Start = self.state {
                self.start = here;
            }

            // Switch table principal, determina cambios de estado
            // y de salida del lexer a partir de combinaciones del
            // estado actual y el siguiente carácter
            match (&mut self.state, next_char) {
                (Start, None) => break,

                // Tokens triviales
                (Start, Some('{')) => self.push(OpenCurly, here, here),
                (Start, Some('}')) => self.push(CloseCurly, here, here),
                (Start, Some('(')) => self.push(OpenParen, here, here),
                (Start, Some(')')) => self.push(CloseParen, here, here),
                (Start, Some('+')) => self.push(Plus, here, here),
                (Start, Some('$')) => self.push(Eop, here, here),
                (Start, Some('"')) => {
                    self.push(Quote, here, here);
                    self.state = String(here);
                }

                (Start, Some('/')) => self.state = Slash,
                (Start, Some('!')) => self.state = Bang,
                (Start, Some('=')) => self.state = EqualSign,
                (Start, Some('&')) => self.state = Amp,
                (Start, Some('|')) => self.state = Pipe,

                // Identificadores y palabras clave
                (Start, Some(c)) if c.is_ascii_lowercase() => self.state = Word(c.to_string()),

                // El primer dígito se procesa en el estado de constante
                (Start, Some(c)) if c.is_ascii_digit() => {
                    self.state = Integer(0, here);
                    continue;
                }

                // Espacios en blanco y caracteres inesperados
                (Start, Some(c)) if c.is_ascii_whitespace() => (),
                (Start, Some(c)) => self.error(LexerError::BadChar(c), here, here),

                // `/` siempre debería iniciar un comentario de la forma `/*`
                (Slash, Some('*')) => self.state = Comment,
                (Slash, _) => {
                    let start = self.start;
                    self.error(LexerError::BadChar('/'), start, start);
                    self.state = Start;
                    continue;
                }

                (Comment, Some('*')) => self.state = CommentStar,
                (Comment, Some(_)) => (),
                (CommentStar, Some('/')) => self.state = Start,
                (CommentStar, Some('*')) => (),
                (CommentStar, Some(_)) => self.state = Comment,
                (Comment | CommentStar, None) => {
                    let start = self.start;
                    self.error(LexerError::UnterminatedComment, start, start.advance());
                    self.state = Start;
                    continue;
                }

                // Contenido de cadenas, carácter por carácter
                (String(_), Some(c)) if c.is_ascii_lowercase() || c == ' ' => {
                    self.push(Char(c), here, here)
                }

                (String(_), Some('"')) => {
                    self.push(Quote, here, here);
                    self.state = Start;
                }

                // Fin de línea o de programa dentro de una cadena. No se
                // consume, para que `$` se preserve como token
                (String(opening), Some('\n' | '$') | None) => {
                    let opening = *opening;
                    self.error(LexerError::UnterminatedString, opening, opening);
                    self.state = Start;
                    continue;
                }

                (String(_), Some(c)) => self.error(LexerError::BadStringChar(c), here, here),

                // Operadores de uno o dos caracteres
                (Bang, Some('=')) => self.complete(NotEqual, here),
                (Bang, _) => {
                    let start = self.start;
                    self.complete(Not, start);
                    continue;
                }

                (EqualSign, Some('=')) => self.complete(Equal, here),
                (EqualSign, _) => {
                    let start = self.start;
                    self.complete(Assign, start);
                    continue;
                }

                (Amp, Some('&')) => self.complete(And, here),
                (Pipe, Some('|')) => self.complete(Or, here),
                (Amp | Pipe, _) => {
                    let (start, expected) = (self.start, if let Amp = self.state { '&' } else { '|' });
                    self.error(LexerError::Expected(expected), start, start);
                    self.state = Start;
                    continue;
                }

                // Acumulación dígito por dígito de constantes enteras
                (Integer(accumulated, last), Some(digit)) if digit.is_ascii_digit() => {
                    let digit = digit as u32 - '0' as u32;
                    *accumulated = accumulated.saturating_mul(10).saturating_add(digit);
                    *last = here;
                }

                // Si sigue algo que no es un dígito, la constante ha terminado
                (Integer(integer, last), _) => {
                    let (integer, last, start) = (*integer, *last, self.start);
                    self.state = Start;

                    match u8::try_from(integer) {
                        Ok(integer) => self.push(IntLiteral(integer), start, last),
                        Err(_) => self.error(LexerError::IntOverflow, start, last),
                    }

                    continue;
                }

                // Extensión de términos
                (Word(word), Some(c)) if c.is_ascii_lowercase() => word.push(c),

                // Si sigue algo que no puede formar parte del término, ha terminado
                (Word(word), _) => {
                    let word = std::mem::take(word);
                    self.state = Start;
                    self.split_word(&word);
                    continue;
                }
            }

            // Si no hubo `continue`, aquí se consume el carácter que
            // se observó con lookahead anteriormente
            self.chars.next();
        }

        let eof = self.eof;
        if self.pending {
            let location = Location::at(self.source, eof);
            self.diagnostics
                .push(Located::at(LexerError::MissingEop, location).into());

            self.push(Token::Eop, eof, eof);
        }

        self.push(Token::Eof, eof, eof);
        (self.tokens, self.diagnostics)
    }

    /// Divide una secuencia de letras en palabras clave e identificadores.
    fn split_word(&mut self, word: &str) {
        let mut position = self.start;
        let mut rest = word;

        while !rest.is_empty() {
            let longest = (2..=LONGEST_WORD.min(rest.len()))
                .rev()
                .find_map(|length| word_token(&rest[..length]).map(|token| (token, length)));

            let (token, length) = match longest {
                Some(found) => found,
                None => match rest.chars().next().and_then(Identifier::new) {
                    Some(id) => (Token::Id(id), 1),
                    None => break,
                },
            };

            let end = (1..length).fold(position, |end, _| end.advance());
            self.push(token, position, end);

            position = end.advance();
            rest = &rest[length..];
        }
    }

    /// Emite un token de dos caracteres que termina en `end`.
    fn complete(&mut self, token: Token, end: Position) {
        let start = self.start;
        self.push(token, start, end);
        self.state = State::Start;
    }

    fn push(&mut self, token: Token, start: Position, end: Position) {
        let location = Location::span(
            Location::at(self.source, start),
            &Location::at(self.source, end),
        );

        trace!("{}: {}", location, token);

        self.pending = token != Token::Eop;
        self.tokens.push(Located::at(token, location));
    }

    fn error(&mut self, error: LexerError, start: Position, end: Position) {
        let location = Location::span(
            Location::at(self.source, start),
            &Location::at(self.source, end),
        );

        self.pending = true;
        self.diagnostics.push(Located::at(error, location).into());
    }
}

/// Resuelve una palabra completa a una palabra clave o literal booleano.
fn word_token(word: &str) -> Option<Token> {
    match word {
        "true" => Some(Token::BoolLiteral(true)),
        "false" => Some(Token::BoolLiteral(false)),
        _ => Keyword::from_str(word).ok().map(Token::Keyword),
    }
}
