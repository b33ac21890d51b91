//! Native backend code generation (§4.5).
//!
//! Grounded on `toydsl/backend/codegen_cpp.py`'s `CodeGenCpp`: the loop
//! nest, the unroll-by-4 transform on the innermost (`i`) loop with its
//! scalar epilogue, and the `**` → `pow` operator lowering are kept
//! verbatim in shape. The Boost.Python wrapper and cycle-counting harness
//! the original emits around the loop nest are dropped — this crate loads
//! the artifact with `libloading` against a plain `extern "C"` symbol
//! instead of a Python module, so the function signature is a flat list
//! of `double*` buffers and `size_t` bounds.

use crate::codegen::{offset_to_index, op_symbol};
use crate::ir::visitor::{walk_horizontals, walk_verticals, IrVisitor};
use crate::ir::{AccessOffset, Assignment, Expr, HorizontalDomain, Ir, Op, VerticalDomain};

const UNROLL_FACTOR: i64 = 4;

/// Emits the full C++ translation unit for `ir`. Drives the traversal
/// through `IrVisitor` so its walk order is shared with the interpreted
/// backend instead of being hand-rolled here.
pub fn generate(ir: &Ir) -> String {
    let mut gen = Generator {
        repetitions: 1,
        unroll_offset: 0,
    };

    let array_args = ir
        .parameters
        .iter()
        .map(|p| format!("double* {p}"))
        .collect::<Vec<_>>()
        .join(", ");

    let mut body = String::new();
    for vertical in walk_verticals(&mut gen, ir) {
        body.push_str(&vertical);
    }

    format!(
        "#include <cmath>\n#include <cstddef>\n\n\
         extern \"C\" void {name}({args}, \
         std::size_t start_i, std::size_t end_i, \
         std::size_t start_j, std::size_t end_j, \
         std::size_t start_k, std::size_t end_k) {{\n\
         \x20   const std::size_t dim2 = end_i - start_i;\n\
         \x20   const std::size_t dim3 = dim2 * (end_j - start_j);\n\
         {body}\
         }}\n",
        name = ir.name,
        args = array_args,
        body = indent(&body, 1),
    )
}

struct Generator {
    /// How many unrolled copies of the innermost statement list to emit;
    /// mirrors `CodeGenCpp._repetitions` in the source generator.
    repetitions: i64,
    /// Which unrolled copy `visit_assignment`/`visit_expr` are currently
    /// emitting indices for; set by `statements` before each repetition.
    unroll_offset: i64,
}

impl IrVisitor for Generator {
    type VerticalOut = String;
    type HorizontalOut = String;
    type AssignmentOut = String;
    type ExprOut = String;

    fn visit_vertical(&mut self, node: &VerticalDomain) -> String {
        let (lo, hi) = super::resolve_extent(node.extent_k, 'k');
        let mut out = format!("for (std::size_t idx_k = {lo}; idx_k <= ({hi}) - 1; idx_k += 1) {{\n");
        for horizontal in walk_horizontals(self, node) {
            out.push_str(&indent(&horizontal, 1));
        }
        out.push_str("}\n");
        out
    }

    fn visit_horizontal(&mut self, node: &HorizontalDomain) -> String {
        let (lo_i, hi_i) = super::resolve_extent(node.extent_i, 'i');
        let (lo_j, hi_j) = super::resolve_extent(node.extent_j, 'j');

        self.repetitions *= UNROLL_FACTOR;
        let mut inner = format!(
            "for (std::size_t idx_i = {lo_i}; idx_i <= ({hi_i}) - {r}; idx_i += {r}) {{\n",
            r = self.repetitions
        );
        inner.push_str(&indent(&self.statements(node), 1));
        inner.push_str("}\n");
        self.repetitions /= UNROLL_FACTOR;

        let epilogue_lo = format!("({hi_i}) - (({hi_i}) - ({lo_i})) % {UNROLL_FACTOR}");
        inner.push_str(&format!(
            "for (std::size_t idx_i = {epilogue_lo}; idx_i <= ({hi_i}) - {r}; idx_i += {r}) {{\n",
            r = self.repetitions
        ));
        inner.push_str(&indent(&self.statements(node), 1));
        inner.push_str("}\n");

        format!(
            "for (std::size_t idx_j = {lo_j}; idx_j <= ({hi_j}) - 1; idx_j += 1) {{\n{}}}\n",
            indent(&inner, 1)
        )
    }

    fn visit_assignment(&mut self, node: &Assignment) -> String {
        let lhs = format!(
            "{}[{}]",
            node.lhs.name,
            offset_to_index(node.lhs.offset, self.unroll_offset)
        );
        let rhs = self.visit_expr(&node.rhs);
        format!("{lhs} = {rhs};\n")
    }

    fn visit_expr(&mut self, node: &Expr) -> String {
        match node {
            Expr::Literal(lit) => lit.text.clone(),
            Expr::FieldAccess(fa) => field_access_to_cpp(fa.name.as_str(), fa.offset, self.unroll_offset),
            Expr::BinaryOp { op, left, right } => {
                let left = self.visit_expr(left);
                let right = self.visit_expr(right);
                if *op == Op::Pow {
                    format!("pow({left}, {right})")
                } else {
                    format!("{left} {} {right}", op_symbol(*op))
                }
            }
        }
    }
}

impl Generator {
    /// Emits the assignment list once per unrolled repetition, offsetting
    /// each repetition's flat index by its position in the unroll epoch —
    /// the C++ analogue of `CodeGenCpp.visit_list_of_Stmt`.
    fn statements(&mut self, node: &HorizontalDomain) -> String {
        let repetitions = self.repetitions;
        let mut out = String::new();
        for unroll_offset in 0..repetitions {
            self.unroll_offset = unroll_offset;
            for assignment in &node.body {
                out.push_str(&self.visit_assignment(assignment));
            }
        }
        out
    }
}

fn field_access_to_cpp(name: &str, offset: AccessOffset, unroll_offset: i64) -> String {
    format!("{name}[{}]", offset_to_index(offset, unroll_offset))
}

/// Indents every line of `text` by `levels * 4` spaces.
fn indent(text: &str, levels: usize) -> String {
    let pad = "    ".repeat(levels);
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{pad}{line}\n")
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend;
    use crate::parser;

    fn generated(source: &str) -> String {
        let kernel_def = parser::parse(source).expect("parse");
        let ir = frontend::lower(&kernel_def).expect("lower");
        generate(&ir)
    }

    #[test]
    fn test_generate_emits_extern_c_signature() {
        let code = generated(
            "kernel copy(out, in) {\n\
                 vertical[start:end] {\n\
                     horizontal[start:end, start:end] {\n\
                         out = in;\n\
                     }\n\
                 }\n\
             }",
        );
        assert!(code.contains("extern \"C\" void copy(double* out, double* in"));
    }

    #[test]
    fn test_generate_unrolls_innermost_loop_with_epilogue() {
        let code = generated(
            "kernel copy(out, in) {\n\
                 vertical[start:end] {\n\
                     horizontal[start:end, start:end] {\n\
                         out = in;\n\
                     }\n\
                 }\n\
             }",
        );
        assert!(code.contains("idx_i += 4"));
        assert!(code.contains("% 4"));
    }

    #[test]
    fn test_generate_lowers_pow_operator() {
        let code = generated(
            "kernel square(out, in) {\n\
                 vertical[start:end] {\n\
                     horizontal[start:end, start:end] {\n\
                         out = in ** 2;\n\
                     }\n\
                 }\n\
             }",
        );
        assert!(code.contains("pow(in["));
    }
}
