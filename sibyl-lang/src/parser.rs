use crate::error::{LangError, Result};
use crate::lexer::{tokenize, SpannedToken, Token};
use sibyl_term::{Span, Term};

/// Recursive-descent reader from tokens to terms
///
/// The surface syntax is plain s-expressions: `'x` is sugar for
/// `(quote x)`, `?x` reads as a pattern variable, and the symbols `nil`,
/// `true`, and `false` read as the corresponding literals.
pub struct Parser<'a> {
    tokens: &'a [SpannedToken],
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [SpannedToken]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &SpannedToken {
        static EOF_BACKSTOP: SpannedToken = SpannedToken {
            token: Token::Eof,
            span: Span { start: 0, end: 0 },
        };
        self.tokens.get(self.pos).unwrap_or(&EOF_BACKSTOP)
    }

    fn advance(&mut self) -> SpannedToken {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn is_eof(&self) -> bool {
        matches!(self.peek().token, Token::Eof)
    }

    /// Parse every top-level form in the stream
    pub fn parse_all(&mut self) -> Result<Vec<Term>> {
        let mut forms = Vec::new();
        while !self.is_eof() {
            forms.push(self.parse_term()?);
        }
        Ok(forms)
    }

    /// Parse one term
    pub fn parse_term(&mut self) -> Result<Term> {
        let spanned = self.advance();
        match spanned.token {
            Token::LParen => self.parse_list(spanned.span),
            Token::RParen => Err(LangError::parse(spanned.span, "unexpected `)`")),
            Token::Quote => {
                let quoted = self.parse_term()?;
                Ok(Term::list([Term::symbol("quote"), quoted]))
            }
            Token::Int(value) => Ok(Term::Int(value)),
            Token::Float(value) => Ok(Term::Float(value)),
            Token::Str(value) => Ok(Term::Str(value)),
            Token::Var(name) => Ok(Term::Var(name)),
            Token::Symbol(name) => Ok(match name.as_str() {
                "nil" => Term::Nil,
                "true" => Term::Bool(true),
                "false" => Term::Bool(false),
                _ => Term::Symbol(name),
            }),
            Token::Eof => Err(LangError::parse(spanned.span, "unexpected end of input")),
        }
    }

    fn parse_list(&mut self, open: Span) -> Result<Term> {
        let mut items = Vec::new();
        loop {
            match self.peek().token {
                Token::RParen => {
                    self.advance();
                    return Ok(Term::List(items));
                }
                Token::Eof => {
                    return Err(LangError::parse(open, "unclosed `(`"));
                }
                _ => items.push(self.parse_term()?),
            }
        }
    }
}

/// Parse a source string into its top-level forms
pub fn parse(source: &str) -> Result<Vec<Term>> {
    let tokens = tokenize(source)?;
    Parser::new(&tokens).parse_all()
}

/// Parse a source string that must contain exactly one form
pub fn parse_one(source: &str) -> Result<Term> {
    let mut forms = parse(source)?;
    match forms.len() {
        1 => Ok(forms.remove(0)),
        n => Err(LangError::parse(
            Span::new(0, source.len()),
            format!("expected exactly one form, found {}", n),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atoms() {
        assert_eq!(parse_one("42").unwrap(), Term::Int(42));
        assert_eq!(parse_one("nil").unwrap(), Term::Nil);
        assert_eq!(parse_one("true").unwrap(), Term::Bool(true));
        assert_eq!(parse_one("foo").unwrap(), Term::symbol("foo"));
        assert_eq!(parse_one("?x").unwrap(), Term::Var("x".to_string()));
    }

    #[test]
    fn test_nested_lists() {
        let term = parse_one("(+ 1 (* 2 3))").unwrap();
        assert_eq!(
            term,
            Term::list([
                Term::symbol("+"),
                Term::Int(1),
                Term::list([Term::symbol("*"), Term::Int(2), Term::Int(3)]),
            ])
        );
    }

    #[test]
    fn test_quote_sugar() {
        let term = parse_one("'(a ?b)").unwrap();
        assert_eq!(
            term,
            Term::list([
                Term::symbol("quote"),
                Term::list([Term::symbol("a"), Term::Var("b".to_string())]),
            ])
        );
    }

    #[test]
    fn test_empty_list() {
        assert_eq!(parse_one("()").unwrap(), Term::List(vec![]));
    }

    #[test]
    fn test_multiple_top_level_forms() {
        let forms = parse("(define x 1) x").unwrap();
        assert_eq!(forms.len(), 2);
    }

    #[test]
    fn test_unclosed_paren_is_parse_error() {
        assert!(matches!(
            parse("(+ 1 2"),
            Err(LangError::Parse { .. })
        ));
    }

    #[test]
    fn test_stray_close_is_parse_error() {
        assert!(matches!(parse(")"), Err(LangError::Parse { .. })));
    }
}
