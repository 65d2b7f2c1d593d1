use crate::code::Opcode;
use crate::lexer::TokenKind;

/// Binding power of an infix operator, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    Lowest,
    Equals,
    LessGreater,
    Shift,
    Sum,
    Product,
    Raise,
    Prefix,
    Call,
    Index,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefix {
    Identifier,
    Integer,
    String,
    Boolean,
    Unary,
    Grouped,
    If,
    Function,
    Array,
    Hash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Infix {
    /// Both operands on the stack, then `Opcode`.
    Binary(Opcode),
    Call,
    Index,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseRule {
    pub prefix: Option<Prefix>,
    pub infix: Option<Infix>,
    pub precedence: Precedence,
}

impl ParseRule {
    const NONE: ParseRule = ParseRule { prefix: None, infix: None, precedence: Precedence::Lowest };

    const fn prefix(prefix: Prefix) -> Self {
        ParseRule { prefix: Some(prefix), infix: None, precedence: Precedence::Lowest }
    }

    const fn binary(op: Opcode, precedence: Precedence) -> Self {
        ParseRule { prefix: None, infix: Some(Infix::Binary(op)), precedence }
    }
}

/// The rule for a token kind. Exhaustive, so a new token kind cannot be
/// added without deciding how it parses.
pub const fn rule(kind: TokenKind) -> ParseRule {
    use Precedence as P;
    match kind {
        TokenKind::Ident => ParseRule::prefix(Prefix::Identifier),
        TokenKind::Int => ParseRule::prefix(Prefix::Integer),
        TokenKind::Str => ParseRule::prefix(Prefix::String),
        TokenKind::True | TokenKind::False => ParseRule::prefix(Prefix::Boolean),
        TokenKind::Bang => ParseRule::prefix(Prefix::Unary),
        TokenKind::Minus => ParseRule {
            prefix: Some(Prefix::Unary),
            infix: Some(Infix::Binary(Opcode::Sub)),
            precedence: P::Sum,
        },
        TokenKind::LParen => ParseRule {
            prefix: Some(Prefix::Grouped),
            infix: Some(Infix::Call),
            precedence: P::Call,
        },
        TokenKind::LBracket => ParseRule {
            prefix: Some(Prefix::Array),
            infix: Some(Infix::Index),
            precedence: P::Index,
        },
        TokenKind::LBrace => ParseRule::prefix(Prefix::Hash),
        TokenKind::If => ParseRule::prefix(Prefix::If),
        TokenKind::Function => ParseRule::prefix(Prefix::Function),

        TokenKind::Eq => ParseRule::binary(Opcode::Equal, P::Equals),
        TokenKind::NotEq => ParseRule::binary(Opcode::NotEqual, P::Equals),
        TokenKind::Lt => ParseRule::binary(Opcode::LessThan, P::LessGreater),
        TokenKind::Gt => ParseRule::binary(Opcode::GreaterThan, P::LessGreater),
        TokenKind::LtEq => ParseRule::binary(Opcode::LessEqual, P::LessGreater),
        TokenKind::GtEq => ParseRule::binary(Opcode::GreaterEqual, P::LessGreater),
        TokenKind::Shl => ParseRule::binary(Opcode::Shl, P::Shift),
        TokenKind::Shr => ParseRule::binary(Opcode::Shr, P::Shift),
        TokenKind::Plus => ParseRule::binary(Opcode::Add, P::Sum),
        TokenKind::Asterisk => ParseRule::binary(Opcode::Mul, P::Product),
        TokenKind::Slash => ParseRule::binary(Opcode::Div, P::Product),
        TokenKind::Percent => ParseRule::binary(Opcode::Mod, P::Product),
        TokenKind::Caret => ParseRule::binary(Opcode::Pow, P::Raise),

        TokenKind::Illegal
        | TokenKind::Eof
        | TokenKind::Unterminated
        | TokenKind::Assign
        | TokenKind::Comma
        | TokenKind::Semicolon
        | TokenKind::Colon
        | TokenKind::RParen
        | TokenKind::RBrace
        | TokenKind::RBracket
        | TokenKind::Let
        | TokenKind::Else
        | TokenKind::Return
        | TokenKind::Exit
        | TokenKind::BlockComment => ParseRule::NONE,
    }
}

/// Precedence of `kind` when it appears in infix position.
pub const fn precedence(kind: TokenKind) -> Precedence {
    rule(kind).precedence
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_ladder() {
        assert!(precedence(TokenKind::Eq) < precedence(TokenKind::Lt));
        assert!(precedence(TokenKind::Lt) < precedence(TokenKind::Shl));
        assert!(precedence(TokenKind::Shl) < precedence(TokenKind::Plus));
        assert!(precedence(TokenKind::Plus) < precedence(TokenKind::Asterisk));
        assert!(precedence(TokenKind::Asterisk) < precedence(TokenKind::Caret));
        assert!(Precedence::Raise < Precedence::Prefix);
        assert!(precedence(TokenKind::LParen) < precedence(TokenKind::LBracket));
    }

    #[test]
    fn minus_is_both_prefix_and_infix() {
        let r = rule(TokenKind::Minus);
        assert_eq!(r.prefix, Some(Prefix::Unary));
        assert_eq!(r.infix, Some(Infix::Binary(Opcode::Sub)));
        assert_eq!(r.precedence, Precedence::Sum);
    }

    #[test]
    fn percent_binds_like_multiplication() {
        assert_eq!(precedence(TokenKind::Percent), precedence(TokenKind::Slash));
    }

    #[test]
    fn operators_carry_their_opcode() {
        let cases = [
            (TokenKind::Plus, Opcode::Add),
            (TokenKind::Slash, Opcode::Div),
            (TokenKind::Caret, Opcode::Pow),
            (TokenKind::Shr, Opcode::Shr),
            (TokenKind::LtEq, Opcode::LessEqual),
            (TokenKind::NotEq, Opcode::NotEqual),
        ];
        for (kind, op) in cases {
            assert_eq!(rule(kind).infix, Some(Infix::Binary(op)), "{kind}");
        }
    }

    #[test]
    fn terminators_have_no_rule() {
        for kind in [TokenKind::Semicolon, TokenKind::RParen, TokenKind::Eof, TokenKind::Illegal] {
            let r = rule(kind);
            assert!(r.prefix.is_none() && r.infix.is_none(), "{kind}");
            assert_eq!(r.precedence, Precedence::Lowest);
        }
    }
}
