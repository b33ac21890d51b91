use crate::ast::*;
use crate::diagnostic::Diagnostic;
use crate::lexeme::Lexeme;
use crate::span::{Span, Spanned};

const MAX_NESTING_DEPTH: u32 = 256;

/// A parse failure, tagged with the frontend error kind it represents
/// (§7): a malformed extent bound (`parse_bound` could not find `start`
/// or `end`) is reported separately from any other construct outside the
/// sub-language, so a caller can distinguish the two without parsing
/// diagnostic message text.
#[derive(Debug)]
pub enum ParseFailure {
    UnsupportedConstruct(Vec<Diagnostic>),
    MalformedExtent(Vec<Diagnostic>),
}

impl ParseFailure {
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        match self {
            ParseFailure::UnsupportedConstruct(d) | ParseFailure::MalformedExtent(d) => d,
        }
    }
}

pub(crate) struct Parser {
    tokens: Vec<Spanned<Lexeme>>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
    depth: u32,
    saw_malformed_extent: bool,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Spanned<Lexeme>>) -> Self {
        Self {
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
            depth: 0,
            saw_malformed_extent: false,
        }
    }

    fn enter_nesting(&mut self) -> bool {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            self.error_with_help(
                "nesting depth exceeded (maximum 256 levels)",
                "a stencil kernel only nests two scopes deep (vertical, horizontal); something is structurally wrong",
            );
            return false;
        }
        true
    }

    fn exit_nesting(&mut self) {
        self.depth -= 1;
    }

    pub(crate) fn parse_kernel(mut self) -> Result<KernelDef, ParseFailure> {
        let def = self.parse_kernel_def();
        if !self.diagnostics.is_empty() {
            return Err(if self.saw_malformed_extent {
                ParseFailure::MalformedExtent(self.diagnostics)
            } else {
                ParseFailure::UnsupportedConstruct(self.diagnostics)
            });
        }
        Ok(def)
    }

    fn parse_kernel_def(&mut self) -> KernelDef {
        self.expect(&Lexeme::Kernel);
        let name = self.expect_ident();

        self.expect(&Lexeme::LParen);
        let mut parameters = Vec::new();
        if !self.at(&Lexeme::RParen) {
            parameters.push(self.expect_ident());
            while self.eat(&Lexeme::Comma) {
                if self.at(&Lexeme::RParen) {
                    break;
                }
                parameters.push(self.expect_ident());
            }
        }
        self.expect(&Lexeme::RParen);

        self.expect(&Lexeme::LBrace);
        let mut body = Vec::new();
        while self.at(&Lexeme::Vertical) {
            body.push(self.parse_vertical_scope());
        }
        if !self.at(&Lexeme::RBrace) {
            self.error_with_help(
                &format!(
                    "expected a 'vertical' scope or '}}', found {}",
                    self.peek().describe()
                ),
                "a kernel body is one or more `vertical [..] { .. }` scopes",
            );
        }
        self.expect(&Lexeme::RBrace);

        KernelDef {
            name,
            parameters,
            body,
        }
    }

    fn parse_vertical_scope(&mut self) -> Spanned<VerticalScope> {
        let start = self.current_span();
        self.expect(&Lexeme::Vertical);
        self.expect(&Lexeme::LBracket);
        let extent = self.parse_slice();
        self.expect(&Lexeme::RBracket);

        if !self.enter_nesting() {
            return Spanned::new(VerticalScope { extent, body: Vec::new() }, start);
        }
        self.expect(&Lexeme::LBrace);
        let mut body = Vec::new();
        while self.at(&Lexeme::Horizontal) {
            body.push(self.parse_horizontal_scope());
        }
        self.expect(&Lexeme::RBrace);
        self.exit_nesting();

        let span = start.merge(self.prev_span());
        Spanned::new(VerticalScope { extent, body }, span)
    }

    fn parse_horizontal_scope(&mut self) -> Spanned<HorizontalScope> {
        let start = self.current_span();
        self.expect(&Lexeme::Horizontal);
        self.expect(&Lexeme::LBracket);
        let extent_i = self.parse_slice();
        self.expect(&Lexeme::Comma);
        let extent_j = self.parse_slice();
        self.expect(&Lexeme::RBracket);

        if !self.enter_nesting() {
            return Spanned::new(
                HorizontalScope {
                    extent_i,
                    extent_j,
                    body: Vec::new(),
                },
                start,
            );
        }
        self.expect(&Lexeme::LBrace);
        let mut body = Vec::new();
        while !self.at(&Lexeme::RBrace) && !self.at(&Lexeme::Eof) {
            body.push(self.parse_stmt());
        }
        self.expect(&Lexeme::RBrace);
        self.exit_nesting();

        let span = start.merge(self.prev_span());
        Spanned::new(
            HorizontalScope {
                extent_i,
                extent_j,
                body,
            },
            span,
        )
    }

    /// `start`, `end`, `start±c`, `end±c` on each side of the `:`.
    fn parse_slice(&mut self) -> Slice {
        let lower = self.parse_bound();
        self.expect(&Lexeme::Colon);
        let upper = self.parse_bound();
        Slice { lower, upper }
    }

    fn parse_bound(&mut self) -> Bound {
        let ident = match self.peek().clone() {
            Lexeme::Start => {
                let span = self.current_span();
                self.advance();
                Spanned::new("start".to_string(), span)
            }
            Lexeme::End => {
                let span = self.current_span();
                self.advance();
                Spanned::new("end".to_string(), span)
            }
            _ => {
                self.error_malformed_extent(
                    &format!(
                        "expected 'start' or 'end', found {}",
                        self.peek().describe()
                    ),
                    "extents are written as `start`, `end`, `start+c` or `end-c`",
                );
                Spanned::new("start".to_string(), self.current_span())
            }
        };

        let sign_and_constant = if self.eat(&Lexeme::Plus) {
            Some((Sign::Plus, self.expect_number_as_u64()))
        } else if self.eat(&Lexeme::Minus) {
            Some((Sign::Minus, self.expect_number_as_u64()))
        } else {
            None
        };

        Bound {
            ident,
            sign_and_constant,
        }
    }

    fn parse_stmt(&mut self) -> Spanned<Stmt> {
        let start = self.current_span();
        let target = self.parse_field_ref();
        self.expect(&Lexeme::Eq);
        let value = self.parse_expr();
        self.expect(&Lexeme::Semicolon);
        let span = start.merge(self.prev_span());
        Spanned::new(Stmt { target, value }, span)
    }

    fn parse_field_ref(&mut self) -> FieldRef {
        let name = self.expect_ident();
        let offsets = if self.eat(&Lexeme::LBracket) {
            let i = self.parse_signed_integer();
            self.expect(&Lexeme::Comma);
            let j = self.parse_signed_integer();
            self.expect(&Lexeme::Comma);
            let k = self.parse_signed_integer();
            self.expect(&Lexeme::RBracket);
            Some([i, j, k])
        } else {
            None
        };
        FieldRef { name, offsets }
    }

    fn parse_signed_integer(&mut self) -> Spanned<i64> {
        let start = self.current_span();
        let negative = self.eat(&Lexeme::Minus);
        if !negative {
            self.eat(&Lexeme::Plus);
        }
        let n = self.expect_number_as_u64();
        let value = if negative { -(n.node as i64) } else { n.node as i64 };
        Spanned::new(value, start.merge(self.prev_span()))
    }

    // --- Expression parsing (Pratt / precedence climbing) ---

    fn parse_expr(&mut self) -> Expr {
        self.parse_expr_bp(0)
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Expr {
        let mut lhs = self.parse_primary();

        loop {
            let op = match self.peek() {
                Lexeme::Plus => BinOp::Add,
                Lexeme::Minus => BinOp::Sub,
                Lexeme::Star => BinOp::Mul,
                Lexeme::Slash => BinOp::Div,
                Lexeme::Percent => BinOp::Mod,
                Lexeme::StarStar => BinOp::Pow,
                _ => break,
            };

            let (l_bp, r_bp) = op_binding_power(op);
            if l_bp < min_bp {
                break;
            }

            let op_span = self.current_span();
            self.advance();
            let rhs = self.parse_expr_bp(r_bp);
            lhs = Expr::Binary {
                op: Spanned::new(op, op_span),
                left: Box::new(lhs),
                right: Box::new(rhs),
            };
        }

        lhs
    }

    fn parse_primary(&mut self) -> Expr {
        match self.peek().clone() {
            Lexeme::Number(text) => {
                let span = self.current_span();
                self.advance();
                Expr::Literal(Spanned::new(text, span))
            }
            Lexeme::LParen => {
                self.advance();
                let inner = self.parse_expr();
                self.expect(&Lexeme::RParen);
                inner
            }
            Lexeme::Ident(_) => Expr::Field(self.parse_field_ref()),
            _ => {
                self.error_with_help(
                    &format!(
                        "expected a number, field access, or '(', found {}",
                        self.peek().describe()
                    ),
                    "expressions are built from literals, `field[di,dj,dk]` reads, and `+ - * / % **`",
                );
                self.advance();
                Expr::Literal(Spanned::new("0".to_string(), self.current_span()))
            }
        }
    }

    // --- token-stream primitives ---

    fn peek(&self) -> &Lexeme {
        &self.tokens[self.pos].node
    }

    fn current_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn prev_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            self.current_span()
        }
    }

    fn advance(&mut self) -> &Spanned<Lexeme> {
        let tok = &self.tokens[self.pos];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn at(&self, token: &Lexeme) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(token)
    }

    fn eat(&mut self, token: &Lexeme) -> bool {
        if self.at(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Lexeme) -> Span {
        if self.at(token) {
            let span = self.current_span();
            self.advance();
            span
        } else {
            self.error_at_current(&format!(
                "expected {}, found {}",
                token.describe(),
                self.peek().describe()
            ));
            self.current_span()
        }
    }

    fn expect_ident(&mut self) -> Spanned<String> {
        if let Lexeme::Ident(name) = self.peek().clone() {
            let span = self.current_span();
            self.advance();
            Spanned::new(name, span)
        } else {
            self.error_at_current(&format!(
                "expected identifier, found {}",
                self.peek().describe()
            ));
            Spanned::new("_error_".to_string(), self.current_span())
        }
    }

    fn expect_number_as_u64(&mut self) -> Spanned<u64> {
        if let Lexeme::Number(text) = self.peek().clone() {
            let span = self.current_span();
            self.advance();
            match text.parse::<u64>() {
                Ok(n) => Spanned::new(n, span),
                Err(_) => {
                    self.error_with_help(
                        &format!("extent constant '{}' is not a non-negative integer", text),
                        "extent offsets must be non-negative integer constants",
                    );
                    Spanned::new(0, span)
                }
            }
        } else {
            self.error_at_current(&format!(
                "expected an integer constant, found {}",
                self.peek().describe()
            ));
            Spanned::new(0, self.current_span())
        }
    }

    fn error_at_current(&mut self, msg: &str) {
        self.diagnostics
            .push(Diagnostic::error(msg.to_string(), self.current_span()));
    }

    fn error_with_help(&mut self, msg: &str, help: &str) {
        self.diagnostics.push(
            Diagnostic::error(msg.to_string(), self.current_span()).with_help(help.to_string()),
        );
    }

    fn error_malformed_extent(&mut self, msg: &str, help: &str) {
        self.saw_malformed_extent = true;
        self.error_with_help(msg, help);
    }
}

/// Returns (left binding power, right binding power) for a binary operator.
/// `**` is right-associative (its right bp is lower than its left bp);
/// everything else is left-associative.
fn op_binding_power(op: BinOp) -> (u8, u8) {
    match op {
        BinOp::Add | BinOp::Sub => (2, 3),
        BinOp::Mul | BinOp::Div | BinOp::Mod => (4, 5),
        BinOp::Pow => (9, 8),
    }
}

/// Parse a single kernel definition from source text.
pub fn parse(source: &str) -> Result<KernelDef, ParseFailure> {
    let (tokens, lex_errors) = crate::lexer::Lexer::new(source, 0).tokenize();
    if !lex_errors.is_empty() {
        return Err(ParseFailure::UnsupportedConstruct(lex_errors));
    }
    Parser::new(tokens).parse_kernel()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_copy_kernel() {
        let src = "kernel copy_stencil(out_field, in_field) {
            vertical [start:end] {
                horizontal [start:end, start:end] {
                    out_field[0,0,0] = in_field[0,0,0];
                }
            }
        }";
        let kernel = parse(src).expect("should parse");
        assert_eq!(kernel.name.node, "copy_stencil");
        assert_eq!(kernel.parameters.len(), 2);
        assert_eq!(kernel.body.len(), 1);
        assert_eq!(kernel.body[0].node.body.len(), 1);
        assert_eq!(kernel.body[0].node.body[0].node.body.len(), 1);
    }

    #[test]
    fn test_parse_extent_with_sign() {
        let src = "kernel blur(out_field, in_field) {
            vertical [start+1:end-1] {
                horizontal [start:end, start:end] {
                    out_field[0,0,0] = (in_field[0,0,1] + in_field[0,0,0] + in_field[0,0,-1]) / 3;
                }
            }
        }";
        let kernel = parse(src).expect("should parse");
        let v = &kernel.body[0].node;
        assert_eq!(v.extent.lower.ident.node, "start");
        let (sign, constant) = v.extent.lower.sign_and_constant.as_ref().unwrap();
        assert_eq!(*sign, Sign::Plus);
        assert_eq!(constant.node, 1);
        let (sign, constant) = v.extent.upper.sign_and_constant.as_ref().unwrap();
        assert_eq!(*sign, Sign::Minus);
        assert_eq!(constant.node, 1);
    }

    #[test]
    fn test_bare_identifier_has_no_offsets() {
        let src = "kernel id(out_field, in_field) {
            vertical [start:end] {
                horizontal [start:end, start:end] {
                    out_field[0,0,0] = in_field;
                }
            }
        }";
        let kernel = parse(src).expect("should parse");
        let stmt = &kernel.body[0].node.body[0].node.body[0].node;
        match &stmt.value {
            Expr::Field(f) => assert!(f.offsets.is_none()),
            _ => panic!("expected a bare field reference"),
        }
    }

    #[test]
    fn test_malformed_construct_reports_error() {
        let src = "kernel broken(a) {
            vertical [start:end] {
                horizontal [start:end, start:end] {
                    for i in a { }
                }
            }
        }";
        let err = parse(src).unwrap_err();
        assert!(matches!(err, ParseFailure::UnsupportedConstruct(_)));
        assert!(!err.into_diagnostics().is_empty());
    }

    #[test]
    fn test_malformed_extent_is_distinguished_from_other_syntax_errors() {
        let src = "kernel blur(a) {
            vertical [foo:end] {
                horizontal [start:end, start:end] {
                    a[0,0,0] = a[0,0,0];
                }
            }
        }";
        let err = parse(src).unwrap_err();
        assert!(matches!(err, ParseFailure::MalformedExtent(_)));
    }

    #[test]
    fn test_pow_is_right_associative() {
        let src = "kernel p(a) {
            vertical [start:end] {
                horizontal [start:end, start:end] {
                    a[0,0,0] = 2 ** 3 ** 2;
                }
            }
        }";
        let kernel = parse(src).expect("should parse");
        let stmt = &kernel.body[0].node.body[0].node.body[0].node;
        match &stmt.value {
            Expr::Binary { op, right, .. } => {
                assert_eq!(op.node, BinOp::Pow);
                match right.as_ref() {
                    Expr::Binary { op, .. } => assert_eq!(op.node, BinOp::Pow),
                    _ => panic!("expected right-nested pow"),
                }
            }
            _ => panic!("expected a binary expression"),
        }
    }
}
