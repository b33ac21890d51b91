//! Intermediate representation between the frontend and the two backends.
//!
//! The IR is a small, typed, closed tree of stencil constructs (§3 of the
//! design). It is produced once by the frontend, never mutated afterwards,
//! and consumed read-only by both the interpreted and native backends.

pub mod visitor;

use crate::diagnostic::Diagnostic;
use crate::span::Span;

/// Anchors a symbolic bound at the low (`START`) or high (`END`) end of an
/// axis range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LevelMarker {
    Start,
    End,
}

impl std::fmt::Display for LevelMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LevelMarker::Start => write!(f, "START"),
            LevelMarker::End => write!(f, "END"),
        }
    }
}

/// A symbolic bound `level + shift`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Offset {
    pub level: LevelMarker,
    pub shift: i64,
}

impl Offset {
    pub fn new(level: LevelMarker, shift: i64) -> Self {
        Self { level, shift }
    }
}

/// The half-open range `[start, end)` on one axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AxisInterval {
    pub start: Offset,
    pub end: Offset,
}

/// A neighbor offset `(di, dj, dk)` from the current iteration point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessOffset {
    pub di: i64,
    pub dj: i64,
    pub dk: i64,
}

impl AccessOffset {
    pub const ZERO: AccessOffset = AccessOffset { di: 0, dj: 0, dk: 0 };
}

/// A read or write of a named field at a neighbor offset.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldAccess {
    pub name: String,
    pub offset: AccessOffset,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

impl Op {
    pub fn as_str(self) -> &'static str {
        match self {
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Mod => "%",
            Op::Pow => "**",
        }
    }
}

/// A textual numeric literal (default 64-bit float).
#[derive(Clone, Debug, PartialEq)]
pub struct Literal {
    pub text: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal(Literal),
    FieldAccess(FieldAccess),
    BinaryOp {
        op: Op,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

/// `lhs = rhs`.
#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    pub lhs: FieldAccess,
    pub rhs: Expr,
}

/// `HorizontalDomain((extents_i, extents_j), body)`.
#[derive(Clone, Debug)]
pub struct HorizontalDomain {
    pub extent_i: AxisInterval,
    pub extent_j: AxisInterval,
    pub body: Vec<Assignment>,
}

/// `VerticalDomain(extents_k, body)`.
#[derive(Clone, Debug)]
pub struct VerticalDomain {
    pub extent_k: AxisInterval,
    pub body: Vec<HorizontalDomain>,
}

/// The root IR node: a kernel's name, its positional field parameters
/// (which fix the order of arguments in the emitted callable), and body.
#[derive(Clone, Debug)]
pub struct Ir {
    pub name: String,
    pub parameters: Vec<String>,
    pub body: Vec<VerticalDomain>,
}

impl Ir {
    /// Checks the §3 invariants that a well-formed `Ir` must satisfy.
    /// Currently: every `FieldAccess.name` appears in `parameters`.
    ///
    /// The frontend calls this once, right after construction, so every
    /// `Ir` a caller can ever observe already satisfies it; it is exposed
    /// separately so tests can build a deliberately-invalid `Ir` and
    /// check the diagnosis directly.
    pub fn validate(&self) -> Result<(), Diagnostic> {
        for vertical in &self.body {
            for horizontal in &vertical.body {
                for assignment in &horizontal.body {
                    self.check_field(&assignment.lhs.name)?;
                    self.check_expr_fields(&assignment.rhs)?;
                }
            }
        }
        Ok(())
    }

    fn check_field(&self, name: &str) -> Result<(), Diagnostic> {
        if self.parameters.iter().any(|p| p == name) {
            Ok(())
        } else {
            Err(Diagnostic::error(
                format!(
                    "field '{}' is not a parameter of kernel '{}'",
                    name, self.name
                ),
                Span::dummy(),
            )
            .with_help(format!(
                "declared parameters are: {}",
                self.parameters.join(", ")
            )))
        }
    }

    fn check_expr_fields(&self, expr: &Expr) -> Result<(), Diagnostic> {
        match expr {
            Expr::Literal(_) => Ok(()),
            Expr::FieldAccess(fa) => self.check_field(&fa.name),
            Expr::BinaryOp { left, right, .. } => {
                self.check_expr_fields(left)?;
                self.check_expr_fields(right)
            }
        }
    }
}
