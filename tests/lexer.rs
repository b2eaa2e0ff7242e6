use lion_compiler::ast::Span;
use lion_compiler::lexer::{lex, Token, TokenKind};
use lion_compiler::*;

fn kinds(source: &str) -> Vec<TokenKind> {
    lexer::lex(source).unwrap().into_iter().map(|t| t.kind).collect()
}

#[test]
fn test_empty_source() {
    assert_eq!(lex("").unwrap(), vec![]);
    assert_eq!(lex("  \n\t ; only a comment").unwrap(), vec![]);
}

#[test]
fn test_token_kinds() {
    use TokenKind::*;
    assert_eq!(
        kinds(r#"(f 'x: i16 "s" .key)"#),
        vec![LParen, Atom, Quote, Atom, Colon, Atom, Str, Keyword, RParen]
    );
}

#[test]
fn test_spans() {
    let tokens = lex("(+ 12 x)").unwrap();
    let spans: Vec<Span> = tokens.iter().map(|t| t.span).collect();
    assert_eq!(
        spans,
        vec![
            Span::new(0, 1),
            Span::new(1, 2),
            Span::new(3, 5),
            Span::new(6, 7),
            Span::new(7, 8),
        ]
    );
}

#[test]
fn test_atoms_stop_at_periods() {
    let tokens = lex("a.b").unwrap();
    assert_eq!(
        tokens,
        vec![
            Token { kind: TokenKind::Atom, span: Span::new(0, 1) },
            Token { kind: TokenKind::Keyword, span: Span::new(1, 3) },
        ]
    );
}

#[test]
fn test_lone_period_lexes() {
    assert_eq!(kinds(". x"), vec![TokenKind::Keyword, TokenKind::Atom]);
}

#[test]
fn test_unterminated_string_runs_to_the_end() {
    let source = r#"(print "never closed"#;
    let tokens = lex(source).unwrap();
    let last = tokens.last().unwrap();
    assert_eq!(last.kind, TokenKind::Str);
    assert_eq!(last.span.end, source.len());
}

#[test]
fn test_comment_ends_at_newline() {
    assert_eq!(kinds("; (ignored)\n(x)"), vec![TokenKind::LParen, TokenKind::Atom, TokenKind::RParen]);
}

#[test]
fn test_concatenation_shifts_spans() {
    let samples = [
        ("(a b)", "(c 'd)"),
        ("x: i16", "\"str\""),
        ("(lambda (x) x)", "; trailing\n.kw"),
        ("", "(f)"),
    ];
    for (a, b) in samples {
        let joined = lex(&format!("{a}\n{b}")).unwrap();
        let mut expected = lex(a).unwrap();
        expected.extend(lex(b).unwrap().into_iter().map(|t| Token {
            kind: t.kind,
            span: t.span.shifted(a.len() + 1),
        }));
        assert_eq!(joined, expected, "lexing {a:?} and {b:?}");
    }
}

#[test]
fn test_spans_are_in_bounds() {
    let sources = [
        "(def fib (lambda (n) (? (<= n 0) 1 (+ (fib (- n 1)) (fib (- n 2))))))",
        r#"'("a\"b" .k x:y) ; end"#,
        "(λ ünïcode)",
    ];
    for source in sources {
        for token in lex(source).unwrap() {
            assert!(token.span.start < token.span.end, "{token:?} in {source:?}");
            assert!(token.span.end <= source.len(), "{token:?} in {source:?}");
        }
    }
}
