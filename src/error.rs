//! Diagnósticos del compilador.
//!
//! Cada fase reporta sus errores como valores de un tipo propio
//! derivado con [`thiserror`]. Estos se unifican en [`Diagnostic`]
//! por medio del trait [`Report`], el cual asocia a cada error la
//! fase que lo produjo y su categoría.

use crate::source::{Located, Location, Position};
use std::{
    error::Error,
    fmt::{self, Display},
};

/// Gravedad de un diagnóstico.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl Display for Severity {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        })
    }
}

/// Fase de compilación. El orden de declaración es el orden del pipeline.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Lexer,
    Parser,
    Semantic,
    Codegen,
}

impl Display for Stage {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(match self {
            Stage::Lexer => "lexer",
            Stage::Parser => "parser",
            Stage::Semantic => "semantic",
            Stage::Codegen => "codegen",
        })
    }
}

/// Taxonomía de diagnósticos.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Category {
    Lexical,
    Syntax,
    Declaration,
    Type,
    Warning,
    Internal,
}

impl Category {
    /// Gravedad implicada por la categoría.
    pub fn severity(self) -> Severity {
        match self {
            Category::Warning => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl Display for Category {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(match self {
            Category::Lexical => "LexicalError",
            Category::Syntax => "SyntaxError",
            Category::Declaration => "DeclarationError",
            Category::Type => "TypeError",
            Category::Warning => "Warning",
            Category::Internal => "InternalError",
        })
    }
}

/// Un error que sabe en cuál fase ocurrió y cómo clasificarse.
pub trait Report: Error {
    /// Fase de origen.
    const STAGE: Stage;

    /// Categoría del error.
    fn category(&self) -> Category;
}

/// Un error o advertencia con ubicación.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    severity: Severity,
    stage: Stage,
    category: Category,
    message: String,
    location: Location,
}

impl Diagnostic {
    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn line(&self) -> u32 {
        self.location.start().line()
    }

    pub fn column(&self) -> u32 {
        self.location.start().column()
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Llave de orden: fase y luego posición.
    pub(crate) fn order_key(&self) -> (Stage, Position) {
        (self.stage, self.location.start())
    }
}

impl<E: Report> From<Located<E>> for Diagnostic {
    fn from(error: Located<E>) -> Self {
        let (location, error) = error.split();
        let category = error.category();

        Diagnostic {
            severity: category.severity(),
            stage: E::STAGE,
            category,
            message: error.to_string(),
            location,
        }
    }
}

/// Una colección de diagnósticos para despliegue.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    /// Diagnósticos que provienen de una fase específica.
    pub fn stage(&self, stage: Stage) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(move |diagnostic| diagnostic.stage == stage)
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> usize {
        self.0.iter().filter(|diagnostic| diagnostic.is_error()).count()
    }

    pub fn warnings(&self) -> usize {
        self.0.len() - self.errors()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    pub(crate) fn extend<I: IntoIterator<Item = Diagnostic>>(&mut self, diagnostics: I) {
        self.0.extend(diagnostics)
    }

    /// Ordena por fase y luego por posición. El orden es estable.
    pub(crate) fn sort(&mut self) {
        self.0.sort_by_key(Diagnostic::order_key)
    }
}

impl From<Vec<Diagnostic>> for Diagnostics {
    fn from(diagnostics: Vec<Diagnostic>) -> Self {
        Diagnostics(diagnostics)
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Display for Diagnostic {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            fmt,
            "{} [{}]: {}",
            self.severity, self.category, self.message
        )?;

        let location = &self.location;
        writeln!(fmt, " --> {}", location)?;

        let digits = location.end().line().to_string().chars().count();
        writeln!(fmt, "{:digits$} |", "", digits = digits)?;

        for line_number in location.start().line()..=location.end().line() {
            location.source().with_line(line_number, |line| {
                writeln!(fmt, "{:>digits$} | {}", line_number, line, digits = digits)
            })?
        }

        // Rangos multilínea se subrayan solo desde la primera columna
        let (from, to) = if location.start().line() == location.end().line() {
            (location.start().column(), location.end().column().max(2) - 1)
        } else {
            (location.start().column(), location.start().column())
        };

        let min = from.min(to);
        let max = from.max(to);

        let skip = (min - 1) as usize;
        let highlight = (max - min + 1) as usize;

        writeln!(
            fmt,
            "{:digits$} | {:skip$}{:^<highlight$}",
            "",
            "",
            "",
            digits = digits,
            skip = skip,
            highlight = highlight
        )
    }
}

impl Display for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(fmt, "No errors were reported");
        }

        for diagnostic in &self.0 {
            writeln!(fmt, "{}", diagnostic)?;
        }

        let errors = self.errors();
        if errors > 0 {
            let error_or_errors = if errors == 1 { "error" } else { "errors" };
            writeln!(fmt, "Build failed with {} {}", errors, error_or_errors)
        } else {
            let warnings = self.warnings();
            let warning_or_warnings = if warnings == 1 { "warning" } else { "warnings" };
            writeln!(fmt, "Build succeeded with {} {}", warnings, warning_or_warnings)
        }
    }
}
