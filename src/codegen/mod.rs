//! Shared code-generation helpers used by both backends (§4.4, §4.5).
//!
//! Grounded on `toydsl/backend/codegen_cpp.py`'s free functions
//! (`offset_to_string`, `create_loop_header`, `create_extents`): both
//! backends need the same three bits of text — a flattened array index
//! for a `FieldAccess`, a `for` loop header over one axis, and the pair
//! of bound expressions an `AxisInterval` resolves to — so they live here
//! instead of being duplicated per backend.

pub mod interpreted;
pub mod native;

use crate::ir::{AccessOffset, AxisInterval, LevelMarker, Op};

/// Flattens `(di, dj, dk)` plus an extra unroll-epoch offset into the
/// row-major 1-D index `(idx_i + di) + (idx_j + dj)*dim2 + (idx_k + dk)*dim3
/// + unroll_offset`.
pub fn offset_to_index(offset: AccessOffset, unroll_offset: i64) -> String {
    format!(
        "(idx_i + ({i})) + (idx_j + ({j})) * dim2 + (idx_k + ({k})) * dim3 + {u}",
        i = offset.di,
        j = offset.dj,
        k = offset.dk,
        u = unroll_offset
    )
}

/// Resolves one `AxisInterval` into `(lower_bound_expr, upper_bound_expr)`
/// text for the given loop variable (`i`, `j`, or `k`).
pub fn resolve_extent(extent: AxisInterval, axis: char) -> (String, String) {
    (
        resolve_offset(extent.start, axis),
        resolve_offset(extent.end, axis),
    )
}

fn resolve_offset(offset: crate::ir::Offset, axis: char) -> String {
    let side = match offset.level {
        LevelMarker::Start => "start",
        LevelMarker::End => "end",
    };
    format!("{side}_{axis} + ({shift})", shift = offset.shift)
}

/// Lowers an operator to its textual spelling; `**` has no infix C/Rust
/// spelling so callers must special-case it into a `pow` call themselves.
pub fn op_symbol(op: Op) -> &'static str {
    op.as_str()
}
