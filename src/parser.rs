use tracing::debug;

use crate::ast::{Node, Span};
use crate::error::{Error, Hint};
use crate::lexer::{lex, Token, TokenKind};

/// Deepest nesting of lists and quotes the parser accepts.
pub const MAX_NESTING: usize = 256;

/// Lexes and parses a whole source file.
pub fn parse_program(source: &str) -> Result<Vec<Node>, Error> {
    let tokens = lex(source)?;
    parse(&tokens, source)
}

/// Parses a token stream into one AST per top-level form.
pub fn parse(tokens: &[Token], source: &str) -> Result<Vec<Node>, Error> {
    let mut parser = Parser {
        tokens,
        source,
        pos: 0,
        depth: 0,
    };
    let mut forms = Vec::new();
    while parser.pos < tokens.len() {
        forms.push(parser.parse_typed_value()?);
    }
    debug!(forms = forms.len(), "parsed program");
    Ok(forms)
}

struct Parser<'a> {
    tokens: &'a [Token],
    source: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn text(&self, span: Span) -> &'a str {
        &self.source[span.range()]
    }

    fn end_of_input(&self) -> Option<Span> {
        Some(Span::new(self.source.len(), self.source.len()))
    }

    fn parse_value(&mut self) -> Result<Node, Error> {
        let Some(token) = self.peek() else {
            return Err(Error::syntax(
                self.end_of_input(),
                "i expected a value here, but i cant see any more code",
            ));
        };
        if self.depth >= MAX_NESTING {
            return Err(Error::syntax(
                Some(token.span),
                format!("this code is nested more than {MAX_NESTING} levels deep"),
            ));
        }
        self.depth += 1;
        let value = match token.kind {
            TokenKind::LParen => self.parse_list(),
            TokenKind::Quote => self.parse_quote(),
            TokenKind::Atom => self.parse_atom(),
            TokenKind::Str => self.parse_string(),
            TokenKind::Keyword => self.parse_keyword(),
            TokenKind::RParen => Err(Error::syntax(
                Some(token.span),
                "i expected a value here, but i found a `)` instead",
            )),
            TokenKind::Colon => Err(Error::syntax(
                Some(token.span),
                "i expected a value here, but i found a `:`; the code is certainly typed, but it lacks code in it",
            )),
        };
        self.depth -= 1;
        value
    }

    fn parse_typed_value(&mut self) -> Result<Node, Error> {
        let value = self.parse_value()?;
        match self.peek() {
            Some(Token {
                kind: TokenKind::Colon,
                span,
            }) => {
                self.pos += 1;
                if self.peek().is_none() {
                    return Err(Error::syntax(
                        Some(span),
                        "i expected a type after this `:`, but i cant see any more code",
                    ));
                }
                // types are plain syntax, annotations inside them mean nothing
                let ty = self.parse_value()?.without_types();
                Ok(value.with_type(ty))
            }
            _ => Ok(value),
        }
    }

    fn parse_list(&mut self) -> Result<Node, Error> {
        let open = self.tokens[self.pos].span;
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            match self.peek() {
                None => {
                    let err = Error::syntax(
                        Some(open),
                        "you seem to have forgotten a `)` somewhere, this list is never closed",
                    );
                    return Err(match missing_paren_hint(self.source, &items) {
                        Some(hint) => err.with_hint(hint),
                        None => err,
                    });
                }
                Some(Token {
                    kind: TokenKind::RParen,
                    span,
                }) => {
                    self.pos += 1;
                    return Ok(Node::list(items, Some(Span::new(open.start, span.end))));
                }
                Some(_) => items.push(self.parse_typed_value()?),
            }
        }
    }

    fn parse_quote(&mut self) -> Result<Node, Error> {
        let quote = self.tokens[self.pos].span;
        self.pos += 1;
        let value = self.parse_value()?;
        let end = value.span.map_or(quote.end, |span| span.end);
        Ok(Node::quoted(value, Some(Span::new(quote.start, end))))
    }

    fn parse_atom(&mut self) -> Result<Node, Error> {
        let span = self.tokens[self.pos].span;
        self.pos += 1;
        Ok(Node::atom(self.text(span), Some(span)))
    }

    fn parse_keyword(&mut self) -> Result<Node, Error> {
        let span = self.tokens[self.pos].span;
        let name = &self.text(span)[1..];
        if name.is_empty() {
            return Err(Error::syntax(
                Some(span),
                "i expected a keyword here, but i only see a lone period",
            ));
        }
        self.pos += 1;
        Ok(Node::keyword(name, Some(span)))
    }

    fn parse_string(&mut self) -> Result<Node, Error> {
        let span = self.tokens[self.pos].span;
        self.pos += 1;
        let text = unescape(&self.text(span)[1..]);
        Ok(Node::string(text, Some(span)).with_type(Node::atom("str", None)))
    }
}

/// Undoes `\\` and `\"` up to the closing quote, if there is one.
fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => break,
            '\\' => match chars.next() {
                Some(escaped) => out.push(escaped),
                None => out.push('\\'),
            },
            c => out.push(c),
        }
    }
    out
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())].matches('\n').count()
}

fn indentation(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Guesses where the `)` of an unterminated list went missing.
///
/// Looks at the lines the list's elements end on. Once the indentation has
/// moved off its starting level, a drop below the new level usually means the
/// previous element was meant to close the list.
fn missing_paren_hint(source: &str, items: &[Node]) -> Option<Hint> {
    let spans: Vec<Span> = items.iter().filter_map(|item| item.span).collect();
    if spans.len() < 2 {
        return None;
    }
    let lines: Vec<&str> = source.split('\n').collect();
    let end_lines: Vec<usize> = spans.iter().map(|span| line_of(source, span.end)).collect();
    let levels: Vec<usize> = end_lines.iter().map(|&line| indentation(lines[line])).collect();

    let mut i = 1;
    while i < levels.len() && levels[i] == levels[0] {
        i += 1;
    }
    let settled = *levels.get(i)?;
    while i < levels.len() && levels[i] >= settled {
        i += 1;
    }
    if i == levels.len() {
        return None;
    }

    let line = end_lines[i - 1];
    let first = line_of(source, spans[0].start);
    let last = end_lines[end_lines.len() - 1];
    let region = lines[first..=last].join("\n");
    let opens = region.matches('(').count();
    let closes = region.matches(')').count();
    let missing = opens.saturating_sub(closes).max(1);

    let text = lines[line].strip_suffix('\r').unwrap_or(lines[line]);
    let offset = lines[..line].iter().map(|l| l.len() + 1).sum::<usize>() + text.len();
    Some(Hint {
        message: format!(
            "you seem to have forgotten {} here, at the end of line {}: `{}{}`",
            if missing == 1 { "a `)`".to_string() } else { format!("{missing} `)`s") },
            line + 1,
            text.trim_start(),
            ")".repeat(missing),
        ),
        offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescape_handles_both_escapes() {
        assert_eq!(unescape(r#"a\"b\\c""#), r#"a"b\c"#);
        assert_eq!(unescape("open"), "open");
    }

    #[test]
    fn hint_points_at_the_line_before_the_dedent() {
        let source = "(def f\n  (lambda (x)\n    (g x)\n  (h x)\n(k 1)";
        let err = parse_program(source).unwrap_err();
        let Error::Syntax { hint: Some(hint), .. } = &err else {
            panic!("expected a hint, got {err:?}");
        };
        assert!(hint.message.contains("line 3"), "{}", hint.message);
    }

    #[test]
    fn hint_leaves_carriage_returns_out() {
        let source = "(def f\r\n  (lambda (x)\r\n    (g x)\r\n  (h x)\r\n(k 1)";
        let err = parse_program(source).unwrap_err();
        let Error::Syntax { hint: Some(hint), .. } = &err else {
            panic!("expected a hint, got {err:?}");
        };
        assert!(hint.message.ends_with("`(g x))`"), "{}", hint.message);
        assert_eq!(&source[..hint.offset], "(def f\r\n  (lambda (x)\r\n    (g x)");
    }

    #[test]
    fn flat_lists_get_no_hint() {
        let err = parse_program("(a b c").unwrap_err();
        assert!(matches!(err, Error::Syntax { hint: None, .. }));
    }
}
