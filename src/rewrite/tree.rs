//! Token trees: tokens grouped by balanced delimiters.
//!
//! Test discovery only needs the shape of declarations and call
//! expressions, so function bodies are kept as trees instead of being
//! parsed statement by statement.

use super::diagnostic::Diagnostic;
use super::lexer::{Keyword, Span, Symbol, Token, TokenKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delimiter {
    Paren,
    Bracket,
    Brace,
}

impl Delimiter {
    fn open(symbol: Symbol) -> Option<Self> {
        match symbol {
            Symbol::LParen => Some(Delimiter::Paren),
            Symbol::LBracket => Some(Delimiter::Bracket),
            Symbol::LBrace => Some(Delimiter::Brace),
            _ => None,
        }
    }

    fn close(symbol: Symbol) -> Option<Self> {
        match symbol {
            Symbol::RParen => Some(Delimiter::Paren),
            Symbol::RBracket => Some(Delimiter::Bracket),
            Symbol::RBrace => Some(Delimiter::Brace),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Delimiter::Paren => "(",
            Delimiter::Bracket => "[",
            Delimiter::Brace => "{",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Group {
    pub delim: Delimiter,
    pub open: Span,
    pub close: Span,
    pub trees: Vec<TokenTree>,
}

#[derive(Clone, Debug)]
pub enum TokenTree {
    Leaf(Token),
    Group(Group),
}

impl TokenTree {
    pub fn span(&self) -> Span {
        match self {
            TokenTree::Leaf(tok) => tok.span,
            TokenTree::Group(group) => group.open.to(group.close),
        }
    }

    pub fn ident(&self) -> Option<&str> {
        match self {
            TokenTree::Leaf(Token {
                kind: TokenKind::Ident(name),
                ..
            }) => Some(name),
            _ => None,
        }
    }

    pub fn is_ident(&self, expected: &str) -> bool {
        self.ident() == Some(expected)
    }

    pub fn is_symbol(&self, symbol: Symbol) -> bool {
        matches!(self, TokenTree::Leaf(Token { kind: TokenKind::Symbol(s), .. }) if *s == symbol)
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        matches!(self, TokenTree::Leaf(Token { kind: TokenKind::Keyword(k), .. }) if *k == keyword)
    }

    pub fn group(&self, delim: Delimiter) -> Option<&Group> {
        match self {
            TokenTree::Group(group) if group.delim == delim => Some(group),
            _ => None,
        }
    }

    pub fn leaf(&self) -> Option<&Token> {
        match self {
            TokenTree::Leaf(tok) => Some(tok),
            TokenTree::Group(_) => None,
        }
    }
}

/// Split a tree list on a separator symbol. Separators are not included.
pub fn split_on(trees: &[TokenTree], separator: Symbol) -> Vec<&[TokenTree]> {
    trees
        .split(|tree| tree.is_symbol(separator))
        .collect()
}

/// Group a token stream by its delimiters. `Eof` is dropped.
pub fn build(tokens: Vec<Token>) -> Result<Vec<TokenTree>, Diagnostic> {
    // (delimiter, opening span, trees collected so far)
    let mut stack: Vec<(Delimiter, Span, Vec<TokenTree>)> = Vec::new();
    let mut top: Vec<TokenTree> = Vec::new();

    for tok in tokens {
        let symbol = match tok.kind {
            TokenKind::Eof => break,
            TokenKind::Symbol(symbol) => Some(symbol),
            _ => None,
        };

        if let Some(delim) = symbol.and_then(Delimiter::open) {
            stack.push((delim, tok.span, Vec::new()));
            continue;
        }

        if let Some(delim) = symbol.and_then(Delimiter::close) {
            let Some((open_delim, open, trees)) = stack.pop() else {
                return Err(Diagnostic::new(
                    format!("unexpected closing delimiter without matching {}", delim.as_str()),
                    Some(tok.span),
                ));
            };
            if open_delim != delim {
                return Err(Diagnostic::new(
                    format!("mismatched delimiter: {} closed by wrong bracket", open_delim.as_str()),
                    Some(tok.span),
                ));
            }
            let group = TokenTree::Group(Group {
                delim,
                open,
                close: tok.span,
                trees,
            });
            match stack.last_mut() {
                Some((_, _, parent)) => parent.push(group),
                None => top.push(group),
            }
            continue;
        }

        let leaf = TokenTree::Leaf(tok);
        match stack.last_mut() {
            Some((_, _, parent)) => parent.push(leaf),
            None => top.push(leaf),
        }
    }

    if let Some((delim, open, _)) = stack.pop() {
        return Err(Diagnostic::new(
            format!("unclosed {}", delim.as_str()),
            Some(open),
        ));
    }

    Ok(top)
}
