use crate::diagnostic::Diagnostic;
use crate::lexeme::Lexeme;
use crate::span::{Span, Spanned};

pub struct Lexer<'src> {
    source: &'src [u8],
    file_id: u16,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str, file_id: u16) -> Self {
        Self {
            source: source.as_bytes(),
            file_id,
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> (Vec<Spanned<Lexeme>>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let is_eof = tok.node == Lexeme::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        (tokens, self.diagnostics)
    }

    fn next_token(&mut self) -> Spanned<Lexeme> {
        loop {
            self.skip_whitespace_and_comments();

            if self.pos >= self.source.len() {
                return self.make_token(Lexeme::Eof, self.pos, self.pos);
            }

            let start = self.pos;
            let ch = self.source[self.pos];

            if is_ident_start(ch) {
                return self.scan_ident_or_keyword();
            }

            if ch.is_ascii_digit() {
                return self.scan_number();
            }

            if let Some(tok) = self.scan_symbol(start) {
                return tok;
            }
            // scan_symbol recorded an error; keep scanning for more tokens
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.pos < self.source.len() && self.source[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }

            if self.pos + 1 < self.source.len()
                && self.source[self.pos] == b'/'
                && self.source[self.pos + 1] == b'/'
            {
                while self.pos < self.source.len() && self.source[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }

            break;
        }
    }

    fn scan_ident_or_keyword(&mut self) -> Spanned<Lexeme> {
        let start = self.pos;
        while self.pos < self.source.len() && is_ident_continue(self.source[self.pos]) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap();
        let token = Lexeme::from_keyword(text).unwrap_or_else(|| Lexeme::Ident(text.to_string()));
        self.make_token(token, start, self.pos)
    }

    fn scan_number(&mut self) -> Spanned<Lexeme> {
        let start = self.pos;
        while self.pos < self.source.len() && self.source[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        if self.pos < self.source.len()
            && self.source[self.pos] == b'.'
            && self.pos + 1 < self.source.len()
            && self.source[self.pos + 1].is_ascii_digit()
        {
            self.pos += 1;
            while self.pos < self.source.len() && self.source[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
        }
        let text = std::str::from_utf8(&self.source[start..self.pos])
            .unwrap()
            .to_string();
        self.make_token(Lexeme::Number(text), start, self.pos)
    }

    fn scan_symbol(&mut self, start: usize) -> Option<Spanned<Lexeme>> {
        let ch = self.source[self.pos];
        self.pos += 1;

        let token = match ch {
            b'(' => Lexeme::LParen,
            b')' => Lexeme::RParen,
            b'{' => Lexeme::LBrace,
            b'}' => Lexeme::RBrace,
            b'[' => Lexeme::LBracket,
            b']' => Lexeme::RBracket,
            b',' => Lexeme::Comma,
            b':' => Lexeme::Colon,
            b';' => Lexeme::Semicolon,
            b'=' => Lexeme::Eq,
            b'+' => Lexeme::Plus,
            b'-' => Lexeme::Minus,
            b'*' => {
                if self.peek() == Some(b'*') {
                    self.pos += 1;
                    Lexeme::StarStar
                } else {
                    Lexeme::Star
                }
            }
            b'/' => Lexeme::Slash,
            b'%' => Lexeme::Percent,
            _ => {
                self.diagnostics.push(
                    Diagnostic::error(
                        format!("unexpected character '{}' (U+{:04X})", ch as char, ch),
                        Span::new(self.file_id, start as u32, self.pos as u32),
                    )
                    .with_help(
                        "this character is not part of the stencil kernel sub-language"
                            .to_string(),
                    ),
                );
                return None;
            }
        };

        Some(self.make_token(token, start, self.pos))
    }

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn make_token(&self, token: Lexeme, start: usize, end: usize) -> Spanned<Lexeme> {
        Spanned::new(token, Span::new(self.file_id, start as u32, end as u32))
    }
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Lexeme> {
        let (tokens, diags) = Lexer::new(source, 0).tokenize();
        assert!(diags.is_empty(), "unexpected errors: {:?}", diags);
        tokens.into_iter().map(|t| t.node).collect()
    }

    #[test]
    fn test_keywords() {
        let tokens = lex("kernel vertical horizontal start end");
        assert_eq!(
            tokens,
            vec![
                Lexeme::Kernel,
                Lexeme::Vertical,
                Lexeme::Horizontal,
                Lexeme::Start,
                Lexeme::End,
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn test_symbols_and_idents() {
        let tokens = lex("out[0,0,0] = in[-1,+1,0] / 3.5 ** 2;");
        assert_eq!(
            tokens,
            vec![
                Lexeme::Ident("out".to_string()),
                Lexeme::LBracket,
                Lexeme::Number("0".to_string()),
                Lexeme::Comma,
                Lexeme::Number("0".to_string()),
                Lexeme::Comma,
                Lexeme::Number("0".to_string()),
                Lexeme::RBracket,
                Lexeme::Eq,
                Lexeme::Ident("in".to_string()),
                Lexeme::LBracket,
                Lexeme::Minus,
                Lexeme::Number("1".to_string()),
                Lexeme::Comma,
                Lexeme::Plus,
                Lexeme::Number("1".to_string()),
                Lexeme::Comma,
                Lexeme::Number("0".to_string()),
                Lexeme::RBracket,
                Lexeme::Slash,
                Lexeme::Number("3.5".to_string()),
                Lexeme::StarStar,
                Lexeme::Number("2".to_string()),
                Lexeme::Semicolon,
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn test_line_comment_skipped() {
        let tokens = lex("// a comment\nkernel // trailing\n");
        assert_eq!(tokens, vec![Lexeme::Kernel, Lexeme::Eof]);
    }

    #[test]
    fn test_unknown_character_is_diagnostic() {
        let (tokens, diags) = Lexer::new("kernel @ end", 0).tokenize();
        assert!(!diags.is_empty());
        let kinds: Vec<_> = tokens.into_iter().map(|t| t.node).collect();
        assert_eq!(kinds, vec![Lexeme::Kernel, Lexeme::End, Lexeme::Eof]);
    }
}
