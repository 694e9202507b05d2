use super::lexer::Span;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub span: Option<Span>,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    /// 1-based line and column, `(0, 0)` when the location is unknown.
    pub fn position(&self) -> (usize, usize) {
        self.span.map(|s| (s.line, s.column)).unwrap_or((0, 0))
    }
}

pub fn format_diagnostic(diag: &Diagnostic, source: &str) -> String {
    if let Some(span) = &diag.span {
        let line = span.line;
        let col = span.column;
        let line_text = source
            .lines()
            .nth(line.saturating_sub(1))
            .unwrap_or("");
        format!(
            "error:{}:{}: {}\n  {}\n  {}^",
            line,
            col,
            diag.message,
            line_text,
            " ".repeat(col.saturating_sub(1))
        )
    } else {
        format!("error: {}", diag.message)
    }
}
