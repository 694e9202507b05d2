//! Go lexer with automatic semicolon insertion.

use super::diagnostic::Diagnostic;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    /// Span from the start of `self` to the end of `other`.
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start,
            end: other.end,
            line: self.line,
            column: self.column,
        }
    }

    /// Auto-inserted semicolons are zero-width.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Keyword(Keyword),
    Literal(LitKind, String),
    Symbol(Symbol),
    Eof,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LitKind {
    Int,
    Float,
    Imag,
    Rune,
    String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keyword {
    Break,
    Case,
    Chan,
    Const,
    Continue,
    Default,
    Defer,
    Else,
    Fallthrough,
    For,
    Func,
    Go,
    Goto,
    If,
    Import,
    Interface,
    Map,
    Package,
    Range,
    Return,
    Select,
    Struct,
    Switch,
    Type,
    Var,
}

impl Keyword {
    fn from_ident(ident: &str) -> Option<Self> {
        Some(match ident {
            "break" => Keyword::Break,
            "case" => Keyword::Case,
            "chan" => Keyword::Chan,
            "const" => Keyword::Const,
            "continue" => Keyword::Continue,
            "default" => Keyword::Default,
            "defer" => Keyword::Defer,
            "else" => Keyword::Else,
            "fallthrough" => Keyword::Fallthrough,
            "for" => Keyword::For,
            "func" => Keyword::Func,
            "go" => Keyword::Go,
            "goto" => Keyword::Goto,
            "if" => Keyword::If,
            "import" => Keyword::Import,
            "interface" => Keyword::Interface,
            "map" => Keyword::Map,
            "package" => Keyword::Package,
            "range" => Keyword::Range,
            "return" => Keyword::Return,
            "select" => Keyword::Select,
            "struct" => Keyword::Struct,
            "switch" => Keyword::Switch,
            "type" => Keyword::Type,
            "var" => Keyword::Var,
            _ => return None,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Symbol {
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semi,
    Colon,
    Dot,
    Ellipsis,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Shl,
    Shr,
    AndNot,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    AmpAssign,
    PipeAssign,
    CaretAssign,
    ShlAssign,
    ShrAssign,
    AndNotAssign,
    AndAnd,
    OrOr,
    Arrow,
    Inc,
    Dec,
    EqEq,
    Lt,
    Gt,
    Assign,
    Bang,
    Tilde,
    NotEq,
    Lte,
    Gte,
    Define,
}

/// Operators, longest first so the first prefix match is the right one.
const OPERATORS: &[(&str, Symbol)] = &[
    ("<<=", Symbol::ShlAssign),
    (">>=", Symbol::ShrAssign),
    ("&^=", Symbol::AndNotAssign),
    ("...", Symbol::Ellipsis),
    ("&&", Symbol::AndAnd),
    ("||", Symbol::OrOr),
    ("<-", Symbol::Arrow),
    ("++", Symbol::Inc),
    ("--", Symbol::Dec),
    ("==", Symbol::EqEq),
    ("!=", Symbol::NotEq),
    ("<=", Symbol::Lte),
    (">=", Symbol::Gte),
    (":=", Symbol::Define),
    ("+=", Symbol::PlusAssign),
    ("-=", Symbol::MinusAssign),
    ("*=", Symbol::StarAssign),
    ("/=", Symbol::SlashAssign),
    ("%=", Symbol::PercentAssign),
    ("&=", Symbol::AmpAssign),
    ("|=", Symbol::PipeAssign),
    ("^=", Symbol::CaretAssign),
    ("<<", Symbol::Shl),
    (">>", Symbol::Shr),
    ("&^", Symbol::AndNot),
    ("(", Symbol::LParen),
    (")", Symbol::RParen),
    ("{", Symbol::LBrace),
    ("}", Symbol::RBrace),
    ("[", Symbol::LBracket),
    ("]", Symbol::RBracket),
    (",", Symbol::Comma),
    (";", Symbol::Semi),
    (":", Symbol::Colon),
    (".", Symbol::Dot),
    ("+", Symbol::Plus),
    ("-", Symbol::Minus),
    ("*", Symbol::Star),
    ("/", Symbol::Slash),
    ("%", Symbol::Percent),
    ("&", Symbol::Amp),
    ("|", Symbol::Pipe),
    ("^", Symbol::Caret),
    ("<", Symbol::Lt),
    (">", Symbol::Gt),
    ("=", Symbol::Assign),
    ("!", Symbol::Bang),
    ("~", Symbol::Tilde),
];

#[derive(Clone, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

pub struct Lexer<'a> {
    src: &'a str,
    idx: usize,
    line: usize,
    col: usize,
    prev_can_insert_semi: bool,
    pending_semi: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            idx: 0,
            line: 1,
            col: 1,
            prev_can_insert_semi: false,
            pending_semi: false,
        }
    }

    pub fn lex_all(mut self) -> Result<Vec<Token>, Diagnostic> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let is_eof = matches!(tok.kind, TokenKind::Eof);
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token, Diagnostic> {
        self.skip_whitespace_and_comments()?;
        if self.pending_semi {
            self.pending_semi = false;
            return Ok(self.auto_semi());
        }
        let start = self.idx;
        let (line, column) = (self.line, self.col);
        let span = |end| Span {
            start,
            end,
            line,
            column,
        };

        let Some(ch) = self.peek_char() else {
            if self.prev_can_insert_semi {
                self.prev_can_insert_semi = false;
                return Ok(self.auto_semi());
            }
            return Ok(Token {
                kind: TokenKind::Eof,
                span: span(start),
            });
        };

        let kind = if is_ident_start(ch) {
            let ident = self.read_while(is_ident_continue);
            match Keyword::from_ident(&ident) {
                Some(kw) => TokenKind::Keyword(kw),
                None => TokenKind::Ident(ident),
            }
        } else if ch.is_ascii_digit()
            || (ch == '.' && self.peek_next_char().is_some_and(|c| c.is_ascii_digit()))
        {
            self.read_number()
        } else {
            match ch {
                '"' => {
                    self.read_interpreted_string()?;
                    TokenKind::Literal(LitKind::String, self.src[start..self.idx].to_string())
                }
                '`' => {
                    self.read_raw_string()?;
                    TokenKind::Literal(LitKind::String, self.src[start..self.idx].to_string())
                }
                '\'' => {
                    self.read_rune()?;
                    TokenKind::Literal(LitKind::Rune, self.src[start..self.idx].to_string())
                }
                _ => {
                    let rest = &self.src[self.idx..];
                    let Some((text, symbol)) =
                        OPERATORS.iter().find(|(text, _)| rest.starts_with(text))
                    else {
                        return Err(Diagnostic::new(
                            format!("invalid character {:?}", ch),
                            Some(span(start + ch.len_utf8())),
                        ));
                    };
                    for _ in 0..text.len() {
                        self.advance();
                    }
                    TokenKind::Symbol(*symbol)
                }
            }
        };

        self.prev_can_insert_semi = can_insert_semi_after(&kind);
        Ok(Token {
            kind,
            span: span(self.idx),
        })
    }

    fn auto_semi(&self) -> Token {
        Token {
            kind: TokenKind::Symbol(Symbol::Semi),
            span: Span {
                start: self.idx,
                end: self.idx,
                line: self.line,
                column: self.col,
            },
        }
    }

    fn newline_seen(&mut self) {
        if self.prev_can_insert_semi {
            self.prev_can_insert_semi = false;
            self.pending_semi = true;
        }
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), Diagnostic> {
        while let Some(ch) = self.peek_char() {
            match ch {
                ' ' | '\t' | '\r' | '\u{feff}' => {
                    self.advance();
                }
                '\n' => {
                    self.advance();
                    self.newline_seen();
                    if self.pending_semi {
                        return Ok(());
                    }
                }
                '/' if self.peek_next_char() == Some('/') => {
                    while self.peek_char().is_some_and(|c| c != '\n') {
                        self.advance();
                    }
                }
                '/' if self.peek_next_char() == Some('*') => {
                    let (line, column, start) = (self.line, self.col, self.idx);
                    self.advance();
                    self.advance();
                    let mut multiline = false;
                    loop {
                        match self.peek_char() {
                            None => {
                                return Err(Diagnostic::new(
                                    "comment not terminated",
                                    Some(Span {
                                        start,
                                        end: self.idx,
                                        line,
                                        column,
                                    }),
                                ))
                            }
                            Some('*') if self.peek_next_char() == Some('/') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            Some(c) => {
                                multiline |= c == '\n';
                                self.advance();
                            }
                        }
                    }
                    if multiline {
                        self.newline_seen();
                        if self.pending_semi {
                            return Ok(());
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
        Ok(())
    }

    fn unterminated(&self, what: &str, start: usize, line: usize, column: usize) -> Diagnostic {
        Diagnostic::new(
            format!("{} literal not terminated", what),
            Some(Span {
                start,
                end: self.idx,
                line,
                column,
            }),
        )
    }

    fn read_interpreted_string(&mut self) -> Result<(), Diagnostic> {
        let (start, line, column) = (self.idx, self.line, self.col);
        self.advance(); // opening quote
        loop {
            match self.peek_char() {
                None | Some('\n') => return Err(self.unterminated("string", start, line, column)),
                Some('"') => {
                    self.advance();
                    return Ok(());
                }
                Some('\\') => {
                    self.advance();
                    if self.peek_char().is_some_and(|c| c != '\n') {
                        self.advance();
                    }
                }
                Some(_) => self.advance(),
            }
        }
    }

    fn read_raw_string(&mut self) -> Result<(), Diagnostic> {
        let (start, line, column) = (self.idx, self.line, self.col);
        self.advance();
        loop {
            match self.peek_char() {
                None => return Err(self.unterminated("raw string", start, line, column)),
                Some('`') => {
                    self.advance();
                    return Ok(());
                }
                Some(_) => self.advance(),
            }
        }
    }

    fn read_rune(&mut self) -> Result<(), Diagnostic> {
        let (start, line, column) = (self.idx, self.line, self.col);
        self.advance();
        let mut chars = 0;
        loop {
            match self.peek_char() {
                None | Some('\n') => return Err(self.unterminated("rune", start, line, column)),
                Some('\'') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    if self.peek_char().is_some_and(|c| c != '\n') {
                        self.advance();
                    }
                    chars += 1;
                }
                Some(_) => {
                    self.advance();
                    chars += 1;
                }
            }
        }
        if chars == 0 {
            return Err(Diagnostic::new(
                "empty rune literal",
                Some(Span {
                    start,
                    end: self.idx,
                    line,
                    column,
                }),
            ));
        }
        Ok(())
    }

    fn read_number(&mut self) -> TokenKind {
        let start = self.idx;
        let is_hex = self.src[start..]
            .get(..2)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("0x"));
        loop {
            let Some(ch) = self.peek_char() else { break };
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' {
                self.advance();
                continue;
            }
            let prev = self.src[start..self.idx].chars().last();
            let exponent = if is_hex {
                matches!(prev, Some('p' | 'P'))
            } else {
                matches!(prev, Some('e' | 'E'))
            };
            if exponent && (ch == '+' || ch == '-') {
                self.advance();
                continue;
            }
            break;
        }

        let text = &self.src[start..self.idx];
        let body = text.to_ascii_lowercase();
        let kind = if body.ends_with('i') {
            LitKind::Imag
        } else if body.contains('.')
            || (is_hex && body.contains('p'))
            || (!is_hex && !body.starts_with("0b") && !body.starts_with("0o") && body.contains('e'))
        {
            LitKind::Float
        } else {
            LitKind::Int
        };
        TokenKind::Literal(kind, text.to_string())
    }

    fn read_while<F>(&mut self, f: F) -> String
    where
        F: Fn(char) -> bool,
    {
        let start = self.idx;
        while self.peek_char().is_some_and(&f) {
            self.advance();
        }
        self.src[start..self.idx].to_string()
    }

    fn advance(&mut self) {
        let Some(ch) = self.peek_char() else {
            return;
        };
        self.idx += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.src[self.idx..].chars().next()
    }

    fn peek_next_char(&self) -> Option<char> {
        let mut chars = self.src[self.idx..].chars();
        chars.next();
        chars.next()
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

fn can_insert_semi_after(kind: &TokenKind) -> bool {
    match kind {
        TokenKind::Ident(_) | TokenKind::Literal(..) => true,
        TokenKind::Keyword(Keyword::Return)
        | TokenKind::Keyword(Keyword::Break)
        | TokenKind::Keyword(Keyword::Continue)
        | TokenKind::Keyword(Keyword::Fallthrough) => true,
        TokenKind::Symbol(Symbol::RParen)
        | TokenKind::Symbol(Symbol::RBracket)
        | TokenKind::Symbol(Symbol::RBrace)
        | TokenKind::Symbol(Symbol::Inc)
        | TokenKind::Symbol(Symbol::Dec) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .lex_all()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn inserts_semicolon_after_line_end() {
        let toks = kinds("x++\ny");
        assert_eq!(
            toks,
            vec![
                TokenKind::Ident("x".into()),
                TokenKind::Symbol(Symbol::Inc),
                TokenKind::Symbol(Symbol::Semi),
                TokenKind::Ident("y".into()),
                TokenKind::Symbol(Symbol::Semi),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn no_semicolon_after_operator_line_end() {
        let toks = kinds("a +\nb");
        assert_eq!(toks[1], TokenKind::Symbol(Symbol::Plus));
        assert_eq!(toks[2], TokenKind::Ident("b".into()));
    }

    #[test]
    fn multiline_general_comment_acts_as_newline() {
        let toks = kinds("a /*\n*/ b");
        assert_eq!(toks[1], TokenKind::Symbol(Symbol::Semi));
    }

    #[test]
    fn longest_operator_wins() {
        let toks = kinds("a &^= b...");
        assert_eq!(toks[1], TokenKind::Symbol(Symbol::AndNotAssign));
        assert_eq!(toks[3], TokenKind::Symbol(Symbol::Ellipsis));
    }

    #[test]
    fn number_literal_kinds() {
        let toks = kinds("1 0x1p-2 1e+3 .5 3i 0x1e+5");
        assert_eq!(toks[0], TokenKind::Literal(LitKind::Int, "1".into()));
        assert_eq!(toks[1], TokenKind::Literal(LitKind::Float, "0x1p-2".into()));
        assert_eq!(toks[2], TokenKind::Literal(LitKind::Float, "1e+3".into()));
        assert_eq!(toks[3], TokenKind::Literal(LitKind::Float, ".5".into()));
        assert_eq!(toks[4], TokenKind::Literal(LitKind::Imag, "3i".into()));
        // hex digits never start an exponent
        assert_eq!(toks[5], TokenKind::Literal(LitKind::Int, "0x1e".into()));
        assert_eq!(toks[6], TokenKind::Symbol(Symbol::Plus));
    }

    #[test]
    fn raw_strings_span_lines() {
        let toks = Lexer::new("`a\nb` x").lex_all().unwrap();
        assert_eq!(toks[0].kind, TokenKind::Literal(LitKind::String, "`a\nb`".into()));
        assert_eq!(toks[1].span.line, 2);
    }

    #[test]
    fn unterminated_literals_fail() {
        assert!(Lexer::new("\"abc\n\"").lex_all().is_err());
        assert!(Lexer::new("'").lex_all().is_err());
        assert!(Lexer::new("/* never closed").lex_all().is_err());
        assert!(Lexer::new("a # b").lex_all().is_err());
    }
}
