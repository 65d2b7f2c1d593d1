use std::fmt;

use logos::Logos;

use crate::source::Span;

/// Every kind of token the scanner can produce.
///
/// Keywords are matched by logos' generated state machine, one character at a
/// time, so there is no keyword table to consult after an identifier is read.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip(r"//[^\n]*", allow_greedy = true))]
pub enum TokenKind {
    Illegal,
    Eof,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,
    #[regex(r"[0-9]+")]
    Int,
    #[regex(r#""[^"]*""#)]
    Str,
    /// A `"` with no closing quote before end of input.
    #[regex(r#""[^"]*"#)]
    Unterminated,

    // Operators
    #[token("=")]
    Assign,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("!")]
    Bang,
    #[token("*")]
    Asterisk,
    #[token("/")]
    Slash,
    #[token("^")]
    Caret,
    #[token("%")]
    Percent,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,

    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,

    #[token("==")]
    Eq,
    #[token("!=")]
    NotEq,

    // Delimiters
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    // Keywords
    #[token("fn")]
    Function,
    #[token("let")]
    Let,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("return")]
    Return,
    #[token("exit")]
    Exit,

    /// Never produced: the callback skips the comment body.
    #[token("/*", skip_block_comment)]
    BlockComment,
}

/// Consume up to and including the closing `*/`, or to end of input if the
/// comment is never closed.
fn skip_block_comment(lex: &mut logos::Lexer<TokenKind>) -> logos::Skip {
    let rest = lex.remainder();
    let consumed = rest.find("*/").map(|i| i + 2).unwrap_or(rest.len());
    lex.bump(consumed);
    logos::Skip
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Illegal => "ILLEGAL",
            TokenKind::Eof => "EOF",
            TokenKind::Ident => "IDENT",
            TokenKind::Int => "INT",
            TokenKind::Str => "STRING",
            TokenKind::Unterminated => "UNTERMINATED",
            TokenKind::Assign => "=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Bang => "!",
            TokenKind::Asterisk => "*",
            TokenKind::Slash => "/",
            TokenKind::Caret => "^",
            TokenKind::Percent => "%",
            TokenKind::Shl => "<<",
            TokenKind::Shr => ">>",
            TokenKind::Lt => "<",
            TokenKind::Gt => ">",
            TokenKind::LtEq => "<=",
            TokenKind::GtEq => ">=",
            TokenKind::Eq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Comma => ",",
            TokenKind::Semicolon => ";",
            TokenKind::Colon => ":",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Function => "fn",
            TokenKind::Let => "let",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::Return => "return",
            TokenKind::Exit => "exit",
            TokenKind::BlockComment => "/*",
        };
        f.write_str(s)
    }
}

/// A token is a kind plus a window into the source buffer; the text itself
/// is only sliced out when somebody asks for it. End of input is marked by
/// `TokenKind::Eof`, not by `len`: the empty string `""` is zero-length too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub len: usize,
}

impl Token {
    pub fn span(&self) -> Span {
        Span::new(self.start, self.len)
    }

    /// The token's text. String tokens exclude their quotes.
    pub fn literal<'src>(&self, source: &'src str) -> &'src str {
        source.get(self.start..self.start + self.len).unwrap_or("")
    }
}

/// Pull-based scanner over a source buffer.
pub struct Lexer<'src> {
    source: &'src str,
    inner: logos::Lexer<'src, TokenKind>,
    last: Option<TokenKind>,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Lexer { source, inner: TokenKind::lexer(source), last: None }
    }

    /// Scan and return the next token. Past the end of input this keeps
    /// returning a zero-length `Eof` token.
    pub fn next_token(&mut self) -> Token {
        loop {
            let tok = self.scan();
            // A run of `;` after a `;` is one terminator.
            if tok.kind == TokenKind::Semicolon && self.last == Some(TokenKind::Semicolon) {
                continue;
            }
            self.last = Some(tok.kind);
            return tok;
        }
    }

    fn scan(&mut self) -> Token {
        let Some(result) = self.inner.next() else {
            return Token { kind: TokenKind::Eof, start: self.source.len(), len: 0 };
        };
        let span = self.inner.span();
        match result {
            Ok(TokenKind::Str) => Token {
                kind: TokenKind::Str,
                start: span.start + 1,
                len: span.len() - 2,
            },
            Ok(TokenKind::Unterminated) => Token {
                kind: TokenKind::Unterminated,
                start: span.start + 1,
                len: span.len() - 1,
            },
            Ok(kind) => Token { kind, start: span.start, len: span.len() },
            Err(()) => Token { kind: TokenKind::Illegal, start: span.start, len: span.len() },
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        let tok = self.next_token();
        (tok.kind != TokenKind::Eof).then_some(tok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source).map(|t| t.kind).collect()
    }

    #[test]
    fn lex_let_statement() {
        let source = "let five = 5;";
        let mut lexer = Lexer::new(source);
        let tokens: Vec<Token> = (&mut lexer).collect();
        assert_eq!(
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![TokenKind::Let, TokenKind::Ident, TokenKind::Assign, TokenKind::Int, TokenKind::Semicolon]
        );
        assert_eq!(tokens[1].literal(source), "five");
        assert_eq!(tokens[3].literal(source), "5");
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
    }

    #[test]
    fn lex_operators() {
        assert_eq!(
            kinds("= == ! != < <= << > >= >> + - * / ^ % : , ( ) { } [ ]"),
            vec![
                TokenKind::Assign, TokenKind::Eq, TokenKind::Bang, TokenKind::NotEq,
                TokenKind::Lt, TokenKind::LtEq, TokenKind::Shl,
                TokenKind::Gt, TokenKind::GtEq, TokenKind::Shr,
                TokenKind::Plus, TokenKind::Minus, TokenKind::Asterisk, TokenKind::Slash,
                TokenKind::Caret, TokenKind::Percent, TokenKind::Colon, TokenKind::Comma,
                TokenKind::LParen, TokenKind::RParen, TokenKind::LBrace, TokenKind::RBrace,
                TokenKind::LBracket, TokenKind::RBracket,
            ]
        );
    }

    #[test]
    fn lex_keywords_and_lookalikes() {
        assert_eq!(
            kinds("fn let true false if else return exit"),
            vec![
                TokenKind::Function, TokenKind::Let, TokenKind::True, TokenKind::False,
                TokenKind::If, TokenKind::Else, TokenKind::Return, TokenKind::Exit,
            ]
        );
        // prefixes and extensions of keywords stay identifiers
        assert_eq!(
            kinds("f fns lets iff exits returned el _x x1"),
            vec![TokenKind::Ident; 9]
        );
    }

    #[test]
    fn lex_string_literal_excludes_quotes() {
        let source = r#""hello world""#;
        let tok = Lexer::new(source).next_token();
        assert_eq!(tok.kind, TokenKind::Str);
        assert_eq!(tok.literal(source), "hello world");
    }

    #[test]
    fn lex_empty_string() {
        let source = r#""""#;
        let tok = Lexer::new(source).next_token();
        assert_eq!(tok.kind, TokenKind::Str);
        assert_eq!(tok.len, 0);
        assert_eq!(tok.literal(source), "");
    }

    #[test]
    fn lex_unterminated_string() {
        let source = r#"let s = "abc"#;
        let tokens: Vec<Token> = Lexer::new(source).collect();
        let last = tokens.last().unwrap();
        assert_eq!(last.kind, TokenKind::Unterminated);
        assert_eq!(last.literal(source), "abc");
    }

    #[test]
    fn lex_illegal_character() {
        assert_eq!(kinds("1 @ 2"), vec![TokenKind::Int, TokenKind::Illegal, TokenKind::Int]);
    }

    #[test]
    fn lex_comments_skipped() {
        let source = "// line comment\n1 /* block\n comment */ + 2 // trailing";
        assert_eq!(kinds(source), vec![TokenKind::Int, TokenKind::Plus, TokenKind::Int]);
    }

    #[test]
    fn lex_unterminated_block_comment_runs_to_end() {
        assert_eq!(kinds("1; /* never closed 2; 3;"), vec![TokenKind::Int, TokenKind::Semicolon]);
    }

    #[test]
    fn lex_collapses_semicolon_runs() {
        assert_eq!(
            kinds("1;;; ;\n; 2;"),
            vec![TokenKind::Int, TokenKind::Semicolon, TokenKind::Int, TokenKind::Semicolon]
        );
    }

    #[test]
    fn lex_offsets_index_source() {
        let source = "let add = fn(a, b) { a + b };";
        for tok in Lexer::new(source) {
            assert!(tok.start + tok.len <= source.len());
            assert!(tok.len > 0);
        }
    }

    #[test]
    fn empty_string_is_not_end_of_input() {
        let source = r#"let s = "";"#;
        let mut lexer = Lexer::new(source);
        let toks: Vec<Token> = (0..5).map(|_| lexer.next_token()).collect();
        assert_eq!(toks[3].kind, TokenKind::Str);
        assert_eq!(toks[3].len, 0);
        assert_eq!(toks[3].literal(source), "");
        assert_eq!(toks[4].kind, TokenKind::Semicolon);
    }

    #[test]
    fn eof_is_zero_length_and_sticky() {
        let mut lexer = Lexer::new("x");
        assert_eq!(lexer.next_token().kind, TokenKind::Ident);
        for _ in 0..3 {
            let tok = lexer.next_token();
            assert_eq!(tok.kind, TokenKind::Eof);
            assert_eq!(tok.len, 0);
        }
    }
}
