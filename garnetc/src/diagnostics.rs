//! Diagnostic reporting infrastructure.
//!
//! This module provides error reporting with source locations,
//! suggestions, and pretty-printed output.
//!
//! # Error Codes
//!
//! Resolution error codes are organized by category:
//!
//! - **E02xx**: Type lookup errors (uninitialized constants, generic arity)
//! - **E05xx**: Foreign call errors (argument conversions, struct fields, `out`)
//! - **E06xx**: Call resolution errors (undefined methods, arity, overloads, blocks)
//! - **E07xx**: Inference limits

use std::fmt::Write as _;

use ariadne::{Color, Label, Report, ReportKind, Source};

use crate::span::Span;

/// The kind of diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// An error that prevents compilation.
    Error,
    /// A warning that doesn't prevent compilation.
    Warning,
    /// An informational note.
    Note,
}

impl DiagnosticKind {
    fn to_report_kind(self) -> ReportKind<'static> {
        match self {
            DiagnosticKind::Error => ReportKind::Error,
            DiagnosticKind::Warning => ReportKind::Warning,
            DiagnosticKind::Note => ReportKind::Advice,
        }
    }

    fn color(self) -> Color {
        match self {
            DiagnosticKind::Error => Color::Red,
            DiagnosticKind::Warning => Color::Yellow,
            DiagnosticKind::Note => Color::Cyan,
        }
    }

    fn label(self) -> &'static str {
        match self {
            DiagnosticKind::Error => "error",
            DiagnosticKind::Warning => "warning",
            DiagnosticKind::Note => "note",
        }
    }
}

/// A compiler diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// The kind of diagnostic.
    pub kind: DiagnosticKind,
    /// The error code (e.g., "E0601").
    pub code: Option<String>,
    /// The main error message.
    pub message: String,
    /// The primary span where the error occurred.
    pub span: Span,
    /// Additional labels pointing to relevant code.
    pub labels: Vec<DiagnosticLabel>,
    /// Free-standing notes (instantiation frames and similar context).
    pub notes: Vec<String>,
    /// Suggestions for fixing the error.
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Self {
            kind: DiagnosticKind::Error,
            code: None,
            message: message.into(),
            span,
            labels: Vec::new(),
            notes: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    /// Create a new warning diagnostic.
    pub fn warning(message: impl Into<String>, span: Span) -> Self {
        Self {
            kind: DiagnosticKind::Warning,
            ..Self::error(message, span)
        }
    }

    /// Set the error code from a string.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Add a secondary label pointing at related code.
    pub fn with_note(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(DiagnosticLabel::secondary(span, message));
        self
    }

    /// Add a note that is not tied to a source location.
    pub fn with_context(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Add a suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Render without source text, one item per line.
    ///
    /// Used when the program was handed over without its original source.
    pub fn render_plain(&self) -> String {
        let mut out = String::new();
        match &self.code {
            Some(code) => {
                let _ = write!(out, "{}[{}]", self.kind.label(), code);
            }
            None => out.push_str(self.kind.label()),
        }
        let _ = write!(out, ": {}", self.message);
        if !self.span.is_dummy() {
            let _ = write!(out, "\n  --> {}", self.span);
        }
        for label in &self.labels {
            if label.span.is_dummy() {
                let _ = write!(out, "\n  = note: {}", label.message);
            } else {
                let _ = write!(out, "\n  = note: {} (at {})", label.message, label.span);
            }
        }
        for note in &self.notes {
            let _ = write!(out, "\n  = note: {}", note);
        }
        for suggestion in &self.suggestions {
            let _ = write!(out, "\n  = help: {}", suggestion);
        }
        out
    }
}

/// A secondary label in a diagnostic.
#[derive(Debug, Clone)]
pub struct DiagnosticLabel {
    /// The span this label points to.
    pub span: Span,
    /// The label message.
    pub message: String,
    /// Whether this is the primary label.
    pub primary: bool,
}

impl DiagnosticLabel {
    pub fn primary(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            primary: true,
        }
    }

    pub fn secondary(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            primary: false,
        }
    }
}

/// Diagnostic emitter that prints diagnostics to stderr.
pub struct DiagnosticEmitter<'a> {
    filename: &'a str,
    source: &'a str,
    color: bool,
}

impl<'a> DiagnosticEmitter<'a> {
    pub fn new(filename: &'a str, source: &'a str) -> Self {
        Self {
            filename,
            source,
            color: true,
        }
    }

    /// Enable or disable colored output.
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Emit a diagnostic to stderr.
    pub fn emit(&self, diagnostic: &Diagnostic) {
        let mut builder = Report::build(
            diagnostic.kind.to_report_kind(),
            self.filename,
            diagnostic.span.start,
        )
        .with_config(ariadne::Config::default().with_color(self.color));

        let message = if let Some(code) = &diagnostic.code {
            format!("[{}] {}", code, diagnostic.message)
        } else {
            diagnostic.message.clone()
        };
        builder = builder.with_message(&message);

        builder = builder.with_label(
            Label::new((self.filename, diagnostic.span.start..diagnostic.span.end))
                .with_color(diagnostic.kind.color())
                .with_message(first_line(&diagnostic.message)),
        );

        for label in diagnostic.labels.iter().filter(|l| !l.span.is_dummy()) {
            let color = if label.primary {
                diagnostic.kind.color()
            } else {
                Color::Blue
            };
            builder = builder.with_label(
                Label::new((self.filename, label.span.start..label.span.end))
                    .with_color(color)
                    .with_message(&label.message),
            );
        }

        for note in &diagnostic.notes {
            builder = builder.with_note(note);
        }

        if !diagnostic.suggestions.is_empty() {
            let help = diagnostic.suggestions.join("\n");
            builder = builder.with_help(help);
        }

        let report = builder.finish();

        if let Err(err) = report.eprint((self.filename, Source::from(self.source))) {
            tracing::warn!("failed to write diagnostic: {err}");
        }
    }
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or(message)
}
