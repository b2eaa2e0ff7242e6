use tracing::trace;

use crate::ast::Span;
use crate::error::Error;

/// The set of token kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    LParen,
    RParen,
    Quote,
    Colon,
    Atom,
    Str,
    Keyword,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// What a rule does with the text it matched.
#[derive(Clone, Copy)]
enum Action {
    Skip,
    Emit(TokenKind),
}

/// A rule returns the byte length of its match at the start of the input.
type Matcher = fn(&str) -> Option<usize>;

fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0c' | '\r' | '\n')
}

fn is_atom_char(c: char) -> bool {
    !is_space(c) && !matches!(c, '(' | ')' | ':' | '\'' | '"' | '.')
}

fn run_length(code: &str, pred: fn(char) -> bool) -> usize {
    code.find(|c: char| !pred(c)).unwrap_or(code.len())
}

fn non_empty(len: usize) -> Option<usize> {
    (len > 0).then_some(len)
}

fn ignore(code: &str) -> Option<usize> {
    if code.starts_with(';') {
        return Some(code.find(['\n', '\r']).unwrap_or(code.len()));
    }
    non_empty(run_length(code, is_space))
}

fn single(code: &str, c: char) -> Option<usize> {
    code.starts_with(c).then_some(c.len_utf8())
}

fn atom(code: &str) -> Option<usize> {
    non_empty(run_length(code, is_atom_char))
}

/// `"` then plain chars, `\\` or `\"`, then an optional closing `"`.
fn string(code: &str) -> Option<usize> {
    let body = code.strip_prefix('"')?;
    let mut chars = body.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some(1 + i + 1),
            '\\' => match chars.peek() {
                Some((_, '\\' | '"')) => {
                    chars.next();
                }
                _ => return Some(1 + i),
            },
            _ => {}
        }
    }
    Some(code.len())
}

fn keyword(code: &str) -> Option<usize> {
    let rest = code.strip_prefix('.')?;
    Some(1 + run_length(rest, is_atom_char))
}

/// Rules are tried in order; the first one that matches wins.
const RULES: &[(Matcher, Action)] = &[
    (ignore, Action::Skip),
    (|code| single(code, '('), Action::Emit(TokenKind::LParen)),
    (|code| single(code, ')'), Action::Emit(TokenKind::RParen)),
    (|code| single(code, '\''), Action::Emit(TokenKind::Quote)),
    (|code| single(code, ':'), Action::Emit(TokenKind::Colon)),
    (atom, Action::Emit(TokenKind::Atom)),
    (string, Action::Emit(TokenKind::Str)),
    (keyword, Action::Emit(TokenKind::Keyword)),
];

/// Splits source text into tokens with byte spans.
pub fn lex(source: &str) -> Result<Vec<Token>, Error> {
    let mut tokens = Vec::new();
    let mut at = 0;

    while at < source.len() {
        let rest = &source[at..];
        let Some((len, action)) = RULES
            .iter()
            .find_map(|(matcher, action)| matcher(rest).map(|len| (len, *action)))
        else {
            return Err(Error::Lexical {
                offset: at,
                snippet: rest.chars().take(16).collect(),
            });
        };

        if let Action::Emit(kind) = action {
            tokens.push(Token {
                kind,
                span: Span::new(at, at + len),
            });
        }
        at += len;
    }

    trace!(count = tokens.len(), "lexed source");
    Ok(tokens)
}
