//! Lowers the syntax tree (§4.1) into the closed IR (§3).
//!
//! Grounded on `toydsl/frontend/frontend.py`'s `IndexGen`/`LanguageParser`
//! walk: every construct the host-language frontend would have resolved
//! from a borrowed AST (level markers, neighbor offsets, bare-identifier
//! field reads) is instead resolved here from our own concrete syntax
//! tree, since this crate owns its parser rather than borrowing a host's.

use crate::ast::{self, BinOp, Bound, Expr as AstExpr, FieldRef, Sign, Slice, Stmt};
use crate::diagnostic::Diagnostic;
use crate::ir::{
    AccessOffset, AxisInterval, Assignment, Expr, FieldAccess, HorizontalDomain, Ir, LevelMarker,
    Literal, Offset, Op, VerticalDomain,
};

/// A lowering failure, tagged with the frontend error kind it represents
/// (§7). `lower_bound`'s unresolvable-level-marker case is the same
/// malformed-extent kind the parser reports for the same sub-language
/// rule, though the parser's own grammar already makes it unreachable in
/// practice; any other lowering failure is an unknown field reference
/// caught by [`Ir::validate`].
#[derive(Debug)]
pub enum LowerError {
    MalformedExtent(Vec<Diagnostic>),
    UnknownField(Vec<Diagnostic>),
}

impl LowerError {
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        match self {
            LowerError::MalformedExtent(d) | LowerError::UnknownField(d) => d,
        }
    }
}

/// Lowers a parsed kernel into IR, then runs [`Ir::validate`].
///
/// Reports every unknown-level-marker it finds rather than stopping at
/// the first one, matching the frontend's own parse-error accumulation
/// style; any lowering error is fatal to the kernel as a whole.
pub fn lower(kernel: &ast::KernelDef) -> Result<Ir, LowerError> {
    let parameters: Vec<String> = kernel.parameters.iter().map(|p| p.node.clone()).collect();
    let mut diagnostics = Vec::new();

    let mut body = Vec::with_capacity(kernel.body.len());
    for vertical in &kernel.body {
        match lower_vertical(&vertical.node) {
            Ok(v) => body.push(v),
            Err(d) => diagnostics.push(d),
        }
    }

    if !diagnostics.is_empty() {
        return Err(LowerError::MalformedExtent(diagnostics));
    }

    let ir = Ir {
        name: kernel.name.node.clone(),
        parameters,
        body,
    };

    ir.validate().map_err(|d| LowerError::UnknownField(vec![d]))?;
    Ok(ir)
}

fn lower_vertical(vertical: &ast::VerticalScope) -> Result<VerticalDomain, Diagnostic> {
    let extent_k = lower_slice(&vertical.extent)?;
    let mut body = Vec::with_capacity(vertical.body.len());
    for horizontal in &vertical.body {
        body.push(lower_horizontal(&horizontal.node)?);
    }
    Ok(VerticalDomain { extent_k, body })
}

fn lower_horizontal(horizontal: &ast::HorizontalScope) -> Result<HorizontalDomain, Diagnostic> {
    let extent_i = lower_slice(&horizontal.extent_i)?;
    let extent_j = lower_slice(&horizontal.extent_j)?;
    let mut body = Vec::with_capacity(horizontal.body.len());
    for stmt in &horizontal.body {
        body.push(lower_stmt(&stmt.node)?);
    }
    Ok(HorizontalDomain {
        extent_i,
        extent_j,
        body,
    })
}

fn lower_slice(slice: &Slice) -> Result<AxisInterval, Diagnostic> {
    Ok(AxisInterval {
        start: lower_bound(&slice.lower)?,
        end: lower_bound(&slice.upper)?,
    })
}

fn lower_bound(bound: &Bound) -> Result<Offset, Diagnostic> {
    let level = match bound.ident.node.as_str() {
        "start" => LevelMarker::Start,
        "end" => LevelMarker::End,
        other => {
            return Err(Diagnostic::error(
                format!("unknown level marker '{}'", other),
                bound.ident.span,
            )
            .with_help("expected 'start' or 'end'".to_string()));
        }
    };
    let shift = match &bound.sign_and_constant {
        None => 0,
        Some((Sign::Plus, constant)) => constant.node as i64,
        Some((Sign::Minus, constant)) => -(constant.node as i64),
    };
    Ok(Offset::new(level, shift))
}

fn lower_stmt(stmt: &Stmt) -> Result<Assignment, Diagnostic> {
    Ok(Assignment {
        lhs: lower_field_ref(&stmt.target)?,
        rhs: lower_expr(&stmt.value)?,
    })
}

fn lower_field_ref(field_ref: &FieldRef) -> Result<FieldAccess, Diagnostic> {
    let offset = match &field_ref.offsets {
        None => AccessOffset::ZERO,
        Some([di, dj, dk]) => AccessOffset {
            di: di.node,
            dj: dj.node,
            dk: dk.node,
        },
    };
    Ok(FieldAccess {
        name: field_ref.name.node.clone(),
        offset,
    })
}

fn lower_expr(expr: &AstExpr) -> Result<Expr, Diagnostic> {
    match expr {
        AstExpr::Literal(text) => Ok(Expr::Literal(Literal {
            text: text.node.clone(),
        })),
        AstExpr::Field(field_ref) => Ok(Expr::FieldAccess(lower_field_ref(field_ref)?)),
        AstExpr::Binary { op, left, right } => Ok(Expr::BinaryOp {
            op: lower_op(op.node),
            left: Box::new(lower_expr(left)?),
            right: Box::new(lower_expr(right)?),
        }),
    }
}

fn lower_op(op: BinOp) -> Op {
    match op {
        BinOp::Add => Op::Add,
        BinOp::Sub => Op::Sub,
        BinOp::Mul => Op::Mul,
        BinOp::Div => Op::Div,
        BinOp::Mod => Op::Mod,
        BinOp::Pow => Op::Pow,
    }
}
