use crate::span::Spanned;

/// A parsed kernel definition — the syntax tree the frontend (§4.1) consumes.
#[derive(Clone, Debug)]
pub struct KernelDef {
    pub name: Spanned<String>,
    pub parameters: Vec<Spanned<String>>,
    pub body: Vec<Spanned<VerticalScope>>,
}

/// `vertical [lo:hi] { ... }`
#[derive(Clone, Debug)]
pub struct VerticalScope {
    pub extent: Slice,
    pub body: Vec<Spanned<HorizontalScope>>,
}

/// `horizontal [lo_i:hi_i, lo_j:hi_j] { ... }`
#[derive(Clone, Debug)]
pub struct HorizontalScope {
    pub extent_i: Slice,
    pub extent_j: Slice,
    pub body: Vec<Spanned<Stmt>>,
}

/// A slice bound expression: `start`, `end`, `start±c`, `end±c`.
#[derive(Clone, Debug)]
pub struct Slice {
    pub lower: Bound,
    pub upper: Bound,
}

/// One endpoint of a `Slice`: a reserved level identifier plus a signed
/// constant accumulated from the surrounding additive expression.
#[derive(Clone, Debug)]
pub struct Bound {
    pub ident: Spanned<String>,
    pub sign_and_constant: Option<(Sign, Spanned<u64>)>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sign {
    Plus,
    Minus,
}

/// `field[di,dj,dk] = expr ;`
#[derive(Clone, Debug)]
pub struct Stmt {
    pub target: FieldRef,
    pub value: Expr,
}

/// `field[di,dj,dk]` — a field access with three signed integer offsets.
#[derive(Clone, Debug)]
pub struct FieldRef {
    pub name: Spanned<String>,
    pub offsets: Option<[Spanned<i64>; 3]>,
}

#[derive(Clone, Debug)]
pub enum Expr {
    Literal(Spanned<String>),
    Field(FieldRef),
    Binary {
        op: Spanned<BinOp>,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}
