//! Single-dispatch walker over IR variants (§4.3).
//!
//! The IR is a closed sum type, so "dispatch by variant tag" is realized
//! here as a `match` rather than the name-based method lookup a dynamic
//! host language would use (see the design note on visitor dispatch). The
//! `IrVisitor` trait exists so the interpreted and native backends share
//! one traversal shape without duplicating the walk order (vertical
//! scopes in source order, then horizontal scopes, then assignments)
//! instead of each hand-rolling its own recursion over `Ir`.

use super::{Assignment, Expr, HorizontalDomain, Ir, VerticalDomain};

/// A backend's per-node-kind output type generally differs per level (a
/// vertical scope lowers to one shape, an expression to another), so each
/// visit method carries its own associated type rather than a single
/// `Output` that would force every level into the same shape.
pub trait IrVisitor {
    type VerticalOut;
    type HorizontalOut;
    type AssignmentOut;
    type ExprOut;

    fn visit_vertical(&mut self, node: &VerticalDomain) -> Self::VerticalOut;
    fn visit_horizontal(&mut self, node: &HorizontalDomain) -> Self::HorizontalOut;
    fn visit_assignment(&mut self, node: &Assignment) -> Self::AssignmentOut;
    fn visit_expr(&mut self, node: &Expr) -> Self::ExprOut;
}

/// Walks `ir.body` in source order, dispatching each `VerticalDomain`
/// through `visitor`. Both backends drive their top-level emission
/// through this (and `walk_horizontals`/`walk_assignments` below) so the
/// ordering invariant lives in one place.
pub fn walk_verticals<V: IrVisitor>(visitor: &mut V, ir: &Ir) -> Vec<V::VerticalOut> {
    ir.body.iter().map(|v| visitor.visit_vertical(v)).collect()
}

/// Walks a vertical scope's horizontal scopes in source order.
pub fn walk_horizontals<V: IrVisitor>(visitor: &mut V, node: &VerticalDomain) -> Vec<V::HorizontalOut> {
    node.body.iter().map(|h| visitor.visit_horizontal(h)).collect()
}

/// Walks a horizontal scope's assignments in source order.
pub fn walk_assignments<V: IrVisitor>(visitor: &mut V, node: &HorizontalDomain) -> Vec<V::AssignmentOut> {
    node.body.iter().map(|a| visitor.visit_assignment(a)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::*;

    struct CountingVisitor {
        assignments: usize,
    }

    impl IrVisitor for CountingVisitor {
        type VerticalOut = ();
        type HorizontalOut = ();
        type AssignmentOut = ();
        type ExprOut = ();

        fn visit_vertical(&mut self, node: &VerticalDomain) {
            walk_horizontals(self, node);
        }

        fn visit_horizontal(&mut self, node: &HorizontalDomain) {
            walk_assignments(self, node);
        }

        fn visit_assignment(&mut self, node: &Assignment) {
            self.assignments += 1;
            self.visit_expr(&node.rhs);
        }

        fn visit_expr(&mut self, _node: &Expr) {}
    }

    #[test]
    fn test_visitor_counts_assignments_in_source_order() {
        let field = |name: &str| FieldAccess {
            name: name.to_string(),
            offset: AccessOffset::ZERO,
        };
        let start_end = AxisInterval {
            start: Offset::new(LevelMarker::Start, 0),
            end: Offset::new(LevelMarker::End, 0),
        };
        let ir = Ir {
            name: "k".to_string(),
            parameters: vec!["out".to_string(), "in".to_string()],
            body: vec![VerticalDomain {
                extent_k: start_end,
                body: vec![HorizontalDomain {
                    extent_i: start_end,
                    extent_j: start_end,
                    body: vec![
                        Assignment {
                            lhs: field("out"),
                            rhs: Expr::FieldAccess(field("in")),
                        },
                        Assignment {
                            lhs: field("out"),
                            rhs: Expr::FieldAccess(field("in")),
                        },
                    ],
                }],
            }],
        };

        let mut visitor = CountingVisitor { assignments: 0 };
        walk_verticals(&mut visitor, &ir);
        assert_eq!(visitor.assignments, 2);
    }
}
