use std::io;
use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use thiserror::Error;

use crate::ast::Span;

/// Best-effort guess at where a missing `)` belongs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hint {
    pub message: String,
    /// Byte offset at which the missing parens would be inserted.
    pub offset: usize,
}

/// Every failure the front end can raise. All stages fail fast.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("lexical error: [{offset} --> ...] `{snippet}` matches with nothing")]
    Lexical { offset: usize, snippet: String },
    #[error("syntax error: {message}{}", hint_suffix(.hint))]
    Syntax {
        message: String,
        span: Option<Span>,
        hint: Option<Hint>,
    },
    #[error("type error: {message}")]
    Type { message: String, spans: Vec<Span> },
    #[error("reference error: {message}")]
    Reference {
        name: String,
        message: String,
        span: Option<Span>,
    },
}

fn hint_suffix(hint: &Option<Hint>) -> String {
    match hint {
        Some(hint) => format!("\n  hint: {}", hint.message),
        None => String::new(),
    }
}

fn located(span: Option<Span>, message: &str) -> String {
    match span {
        Some(span) => format!("{span} {message}"),
        None => message.to_string(),
    }
}

impl Error {
    pub fn syntax(span: Option<Span>, message: impl AsRef<str>) -> Self {
        Error::Syntax {
            message: located(span, message.as_ref()),
            span,
            hint: None,
        }
    }

    /// A type error; the message is prefixed with every known span.
    pub fn type_error(spans: impl IntoIterator<Item = Option<Span>>, message: impl AsRef<str>) -> Self {
        let spans: Vec<Span> = spans.into_iter().flatten().collect();
        let prefix: Vec<String> = spans.iter().map(Span::to_string).collect();
        let message = if prefix.is_empty() {
            message.as_ref().to_string()
        } else {
            format!("{} {}", prefix.join(" and "), message.as_ref())
        };
        Error::Type { message, spans }
    }

    pub fn reference(name: &str, span: Option<Span>) -> Self {
        Error::Reference {
            name: name.to_string(),
            message: located(span, &format!("{name} is not defined")),
            span,
        }
    }

    /// Locates a type error that was raised without any span, such as one
    /// coming out of a host function.
    pub fn or_at(self, span: Option<Span>) -> Self {
        match (self, span) {
            (Error::Type { message, spans }, Some(span)) if spans.is_empty() => Error::type_error([Some(span)], message),
            (other, _) => other,
        }
    }

    pub fn with_hint(self, hint: Hint) -> Self {
        match self {
            Error::Syntax { message, span, .. } => Error::Syntax {
                message,
                span,
                hint: Some(hint),
            },
            other => other,
        }
    }

    /// Source locations this error points at, most relevant first.
    pub fn spans(&self) -> Vec<Span> {
        match self {
            Error::Lexical { offset, .. } => vec![Span::new(*offset, *offset)],
            Error::Syntax { span, .. } | Error::Reference { span, .. } => span.iter().copied().collect(),
            Error::Type { spans, .. } => spans.clone(),
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Error::Lexical { .. } => "Lexical error",
            Error::Syntax { .. } => "Syntax error",
            Error::Type { .. } => "Type error",
            Error::Reference { .. } => "Reference error",
        }
    }

    fn detail(&self) -> &str {
        match self {
            Error::Lexical { snippet, .. } => snippet,
            Error::Syntax { message, .. } | Error::Type { message, .. } | Error::Reference { message, .. } => message,
        }
    }
}

// ariadne counts characters, spans count bytes
fn char_offset(source: &str, byte: usize) -> usize {
    source.char_indices().take_while(|(i, _)| *i < byte).count()
}

fn char_range(source: &str, span: Span) -> Range<usize> {
    let start = char_offset(source, span.start);
    let mut end = char_offset(source, span.end);
    if end <= start {
        end = std::cmp::min(start + 1, source.chars().count());
    }
    start..end.max(start)
}

fn build_report<'a>(
    source: &str,
    filename: &'a str,
    error: &Error,
    color: bool,
) -> Report<'a, (&'a str, Range<usize>)> {
    let spans = error.spans();
    let offset = spans.first().map(|span| char_offset(source, span.start)).unwrap_or(0);

    let mut report = Report::build(ReportKind::Error, filename, offset)
        .with_config(Config::default().with_color(color))
        .with_message(error.title());
    for (n, span) in spans.iter().enumerate() {
        let message = if n == 0 {
            error.detail().to_string()
        } else {
            "conflicts with this".to_string()
        };
        report = report.with_label(
            Label::new((filename, char_range(source, *span)))
                .with_message(message)
                .with_color(if n == 0 { Color::Red } else { Color::Yellow }),
        );
    }
    if spans.is_empty() {
        report = report.with_label(
            Label::new((filename, char_range(source, Span::new(0, 0))))
                .with_message(error.detail())
                .with_color(Color::Red),
        );
    }
    if let Error::Syntax { hint: Some(hint), .. } = error {
        let at = Span::new(hint.offset, hint.offset);
        report = report
            .with_label(
                Label::new((filename, char_range(source, at)))
                    .with_message("maybe here?")
                    .with_color(Color::Cyan),
            )
            .with_note(&hint.message);
    }
    report.finish()
}

/// Display any front-end error with ariadne formatting on stderr.
pub fn display_error(source: &str, filename: &str, error: &Error) -> io::Result<()> {
    build_report(source, filename, error, true).eprint((filename, Source::from(source)))
}

/// Render an error the way [`display_error`] does, without colours.
pub fn render_error(source: &str, filename: &str, error: &Error) -> io::Result<String> {
    let mut out = Vec::new();
    build_report(source, filename, error, false).write((filename, Source::from(source)), &mut out)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}
