//! Recursion checker.
//!
//! Rejects every direct/indirect cycle in the [`CallGraph`]: the Static
//! Frame Allocator requires the call graph to be a DAG so its co-liveness
//! closure terminates. This is a hard error, not a warning
//!; the checker still reports every cycle it finds rather than
//! stopping at the first one.

use crate::callgraph::CallGraph;
use blend65_base::Span;
use rustc_hash::FxHashSet;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecursionKind {
    /// `f -> f`.
    Direct,
    /// A 2-node cycle `f <-> g`.
    Mutual,
    /// A cycle of 3 or more distinct functions.
    Indirect,
}

#[derive(Debug, Clone)]
pub struct Cycle {
    pub kind: RecursionKind,
    /// The cycle's functions, canonicalized to start at the
    /// lexicographically smallest name, rendered `A -> B -> C -> A` by [`Cycle::render`].
    pub path: Vec<String>,
    /// The call-site spans along the cycle, in the same order as `path`.
    pub call_sites: Vec<Span>,
}

impl Cycle {
    pub fn render(&self) -> String {
        let mut s = self.path.join(" -> ");
        if let Some(first) = self.path.first() {
            s.push_str(" -> ");
            s.push_str(first);
        }
        s
    }

    fn kind_for(len: usize) -> RecursionKind {
        match len {
            1 => RecursionKind::Direct,
            2 => RecursionKind::Mutual,
            _ => RecursionKind::Indirect,
        }
    }
}

#[derive(Debug, Default)]
pub struct RecursionReport {
    pub cycles: Vec<Cycle>,
}

impl RecursionReport {
    pub fn is_valid(&self) -> bool {
        self.cycles.is_empty()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Three-color DFS cycle detection.
pub fn check(graph: &CallGraph) -> RecursionReport {
    let mut colors: std::collections::HashMap<&str, Color> =
        graph.functions().iter().map(|f| (f.as_str(), Color::White)).collect();
    let mut stack: Vec<&str> = Vec::new();
    let mut stack_spans: Vec<Span> = Vec::new();
    let mut found: Vec<Cycle> = Vec::new();
    let mut seen_canonical: HashSet<Vec<String>> = HashSet::new();

    fn visit<'g>(
        node: &'g str,
        graph: &'g CallGraph,
        colors: &mut std::collections::HashMap<&'g str, Color>,
        stack: &mut Vec<&'g str>,
        stack_spans: &mut Vec<Span>,
        found: &mut Vec<Cycle>,
        seen_canonical: &mut HashSet<Vec<String>>,
    ) {
        colors.insert(node, Color::Gray);
        stack.push(node);
        for edge in graph.callees_of(node) {
            let callee = edge.callee.as_str();
            match colors.get(callee).copied().unwrap_or(Color::White) {
                Color::White => {
                    stack_spans.push(edge.span);
                    visit(callee, graph, colors, stack, stack_spans, found, seen_canonical);
                    stack_spans.pop();
                }
                Color::Gray => {
                    // Back edge: the cycle is the suffix of `stack` from
                    // `callee`'s first occurrence through `node`, closed
                    // by this edge.
                    let start = stack.iter().position(|&n| n == callee).unwrap();
                    let mut path: Vec<String> = stack[start..].iter().map(|s| s.to_string()).collect();
                    let mut spans: Vec<Span> = stack_spans[start..].to_vec();
                    spans.push(edge.span);
                    canonicalize(&mut path, &mut spans);
                    if seen_canonical.insert(path.clone()) {
                        let kind = Cycle::kind_for(path.len());
                        found.push(Cycle { kind, path, call_sites: spans });
                    }
                }
                Color::Black => {}
            }
        }
        stack.pop();
        colors.insert(node, Color::Black);
    }

    for f in graph.functions() {
        if colors.get(f.as_str()).copied().unwrap_or(Color::White) == Color::White {
            visit(f.as_str(), graph, &mut colors, &mut stack, &mut stack_spans, &mut found, &mut seen_canonical);
        }
    }

    RecursionReport { cycles: found }
}

/// Rotates `path`/`spans` so the cycle starts at its lexicographically
/// smallest function name.
fn canonicalize(path: &mut Vec<String>, spans: &mut Vec<Span>) {
    let min_idx = (0..path.len()).min_by_key(|&i| &path[i]).unwrap_or(0);
    path.rotate_left(min_idx);
    spans.rotate_left(min_idx);
}

/// Functions with no incoming call edge and no outgoing edge to anything
/// reachable from an exported function — an auxiliary dead-function
/// analysis sharing the call graph.
pub fn unreachable_functions(graph: &CallGraph, exported: &FxHashSet<String>) -> Vec<String> {
    let mut reachable: FxHashSet<&str> = FxHashSet::default();
    let mut stack: Vec<&str> = exported.iter().map(|s| s.as_str()).collect();
    while let Some(f) = stack.pop() {
        if reachable.insert(f) {
            for edge in graph.callees_of(f) {
                stack.push(edge.callee.as_str());
            }
        }
    }
    graph.functions().iter().filter(|f| !reachable.contains(f.as_str())).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use blend65_base::{Position, Span};

    fn span() -> Span {
        Span::point(Position::START)
    }

    #[test]
    fn direct_self_call_is_detected() {
        let mut g = CallGraph::new();
        g.add_edge("m.f", "m.f", span());
        let report = check(&g);
        assert_eq!(report.cycles.len(), 1);
        assert_eq!(report.cycles[0].kind, RecursionKind::Direct);
        assert!(!report.is_valid());
    }

    #[test]
    fn mutual_recursion_is_detected_and_canonicalized() {
        let mut g = CallGraph::new();
        g.add_edge("m.b", "m.a", span());
        g.add_edge("m.a", "m.b", span());
        let report = check(&g);
        assert_eq!(report.cycles.len(), 1);
        assert_eq!(report.cycles[0].kind, RecursionKind::Mutual);
        assert_eq!(report.cycles[0].path, vec!["m.a".to_string(), "m.b".to_string()]);
        assert_eq!(report.cycles[0].render(), "m.a -> m.b -> m.a");
    }

    #[test]
    fn indirect_three_node_cycle_is_detected() {
        let mut g = CallGraph::new();
        g.add_edge("m.a", "m.b", span());
        g.add_edge("m.b", "m.c", span());
        g.add_edge("m.c", "m.a", span());
        let report = check(&g);
        assert_eq!(report.cycles.len(), 1);
        assert_eq!(report.cycles[0].kind, RecursionKind::Indirect);
    }

    #[test]
    fn acyclic_graph_is_valid() {
        let mut g = CallGraph::new();
        g.add_edge("m.a", "m.b", span());
        g.add_edge("m.a", "m.c", span());
        let report = check(&g);
        assert!(report.is_valid());
    }

    #[test]
    fn unreachable_function_is_flagged() {
        let mut g = CallGraph::new();
        g.add_edge("m.main", "m.used", span());
        g.add_function("m.dead");
        let mut exported = FxHashSet::default();
        exported.insert("m.main".to_string());
        let dead = unreachable_functions(&g, &exported);
        assert_eq!(dead, vec!["m.dead".to_string()]);
    }
}
