//! The module system: registry, import dependency graph,
//! cycle detection, topological order, import resolution and the global
//! symbol table.
//!
//! Real wall-clock timestamps would make compilation output depend on
//! when it ran, breaking determinism, so "registration timestamp" is
//! implemented as a monotonic registration sequence number instead.

use crate::symbol::{ScopeId, SymbolId, SymbolTable};
use blend65_ast::Program;
use blend65_base::{Span, Symbol};
use rustc_hash::FxHashMap;

pub struct RegisteredModule<'a> {
    pub name: String,
    pub program: Program<'a>,
    pub sequence: u64,
    pub scope: ScopeId,
}

/// Maps module name -> `(parsed program, registration sequence)`.
/// Re-registering a name overwrites the prior entry.
#[derive(Default)]
pub struct ModuleRegistry<'a> {
    modules: Vec<RegisteredModule<'a>>,
    by_name: FxHashMap<String, usize>,
    next_sequence: u64,
}

impl<'a> ModuleRegistry<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, program: Program<'a>, scope: ScopeId) {
        let name = name.into();
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let entry = RegisteredModule { name: name.clone(), program, sequence, scope };
        if let Some(&idx) = self.by_name.get(&name) {
            self.modules[idx] = entry;
        } else {
            self.by_name.insert(name.clone(), self.modules.len());
            self.modules.push(entry);
        }
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredModule<'a>> {
        self.by_name.get(name).map(|&i| &self.modules[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredModule<'a>> {
        self.modules.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(|m| m.name.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ImportEdge {
    pub from: String,
    pub to: String,
    pub span: Span,
}

/// Modules as nodes, import declarations as edges.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    modules: Vec<String>,
    adjacency: FxHashMap<String, Vec<ImportEdge>>,
}

#[derive(Debug, Clone)]
pub struct ModuleCycle {
    pub path: Vec<String>,
    /// The import declaration's span that closes the cycle.
    pub span: Span,
}

impl ModuleCycle {
    pub fn render(&self) -> String {
        let mut s = self.path.join(" -> ");
        if let Some(first) = self.path.first() {
            s.push_str(" -> ");
            s.push_str(first);
        }
        s
    }
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_module(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.modules.contains(&name) {
            self.modules.push(name);
        }
    }

    pub fn add_import(&mut self, from: impl Into<String>, to: impl Into<String>, span: Span) {
        let from = from.into();
        self.add_module(from.clone());
        self.add_module(to.clone().into());
        self.adjacency.entry(from.clone()).or_default().push(ImportEdge { from, to: to.into(), span });
    }

    fn edges_from(&self, module: &str) -> &[ImportEdge] {
        self.adjacency.get(module).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Three-color DFS; the first back edge found reported per root
    /// closes one cycle.
    pub fn find_cycles(&self) -> Vec<ModuleCycle> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Color {
            White,
            Gray,
            Black,
        }
        let mut colors: FxHashMap<&str, Color> = self.modules.iter().map(|m| (m.as_str(), Color::White)).collect();
        let mut stack: Vec<&str> = Vec::new();
        let mut found = Vec::new();
        let mut seen = std::collections::HashSet::new();

        fn visit<'g>(
            node: &'g str,
            graph: &'g DependencyGraph,
            colors: &mut FxHashMap<&'g str, Color>,
            stack: &mut Vec<&'g str>,
            found: &mut Vec<ModuleCycle>,
            seen: &mut std::collections::HashSet<Vec<String>>,
        ) {
            colors.insert(node, Color::Gray);
            stack.push(node);
            for edge in graph.edges_from(node) {
                let to = edge.to.as_str();
                match colors.get(to).copied().unwrap_or(Color::White) {
                    Color::White => visit(to, graph, colors, stack, found, seen),
                    Color::Gray => {
                        let start = stack.iter().position(|&n| n == to).unwrap();
                        let mut path: Vec<String> = stack[start..].iter().map(|s| s.to_string()).collect();
                        let min_idx = (0..path.len()).min_by_key(|&i| &path[i]).unwrap_or(0);
                        path.rotate_left(min_idx);
                        if seen.insert(path.clone()) {
                            found.push(ModuleCycle { path, span: edge.span });
                        }
                    }
                    Color::Black => {}
                }
            }
            stack.pop();
            colors.insert(node, Color::Black);
        }

        for m in &self.modules {
            if colors.get(m.as_str()).copied().unwrap_or(Color::White) == Color::White {
                visit(m.as_str(), self, &mut colors, &mut stack, &mut found, &mut seen);
            }
        }
        found
    }

    /// Kahn's algorithm; `None` iff the graph has a cycle.
    pub fn topological_order(&self) -> Option<Vec<String>> {
        let mut indegree: FxHashMap<&str, usize> = self.modules.iter().map(|m| (m.as_str(), 0)).collect();
        for edges in self.adjacency.values() {
            for e in edges {
                *indegree.entry(e.to.as_str()).or_insert(0) += 1;
            }
        }
        let mut queue: Vec<&str> = self.modules.iter().map(|m| m.as_str()).filter(|m| indegree[m] == 0).collect();
        queue.sort_unstable();
        let mut order = Vec::new();
        let mut queue_idx = 0;
        while queue_idx < queue.len() {
            let n = queue[queue_idx];
            queue_idx += 1;
            order.push(n.to_string());
            let mut newly_free = Vec::new();
            for e in self.edges_from(n) {
                let d = indegree.get_mut(e.to.as_str()).unwrap();
                *d -= 1;
                if *d == 0 {
                    newly_free.push(e.to.as_str());
                }
            }
            newly_free.sort_unstable();
            queue.extend(newly_free);
        }
        if order.len() == self.modules.len() {
            Some(order)
        } else {
            None
        }
    }

    /// The reverse topological order (dependencies first) that
    /// compilation proceeds in.
    pub fn compilation_order(&self) -> Option<Vec<String>> {
        // `topological_order` already lists a module before everything
        // that imports it (edges point from importer to imported, so a
        // module with indegree 0 — nothing imports it yet — is emitted
        // first). That is already "dependencies first" for our edge
        // direction (from = importer, to = imported): reverse Kahn's
        // usual "no incoming edges first" meaning by flipping direction.
        self.topological_order_dependencies_first()
    }

    fn topological_order_dependencies_first(&self) -> Option<Vec<String>> {
        // Kahn's over the *reverse* graph: a module with no outstanding
        // imports (out-degree already satisfied) goes first.
        let mut outdegree: FxHashMap<&str, usize> =
            self.modules.iter().map(|m| (m.as_str(), self.edges_from(m).len())).collect();
        let mut incoming: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
        for edges in self.adjacency.values() {
            for e in edges {
                incoming.entry(e.to.as_str()).or_default().push(e.from.as_str());
            }
        }
        let mut queue: Vec<&str> = self.modules.iter().map(|m| m.as_str()).filter(|m| outdegree[m] == 0).collect();
        queue.sort_unstable();
        let mut order = Vec::new();
        let mut idx = 0;
        while idx < queue.len() {
            let n = queue[idx];
            idx += 1;
            order.push(n.to_string());
            let mut newly_free = Vec::new();
            for importer in incoming.get(n).into_iter().flatten() {
                let d = outdegree.get_mut(importer).unwrap();
                *d -= 1;
                if *d == 0 {
                    newly_free.push(*importer);
                }
            }
            newly_free.sort_unstable();
            queue.extend(newly_free);
        }
        if order.len() == self.modules.len() {
            Some(order)
        } else {
            None
        }
    }
}

/// Aggregates exported symbols across modules.
#[derive(Default)]
pub struct GlobalSymbolTable {
    exports: FxHashMap<String, FxHashMap<Symbol, SymbolId>>,
}

pub enum GlobalLookup {
    Found(SymbolId),
    ModuleNotFound,
    NotExported,
}

impl GlobalSymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_module(&mut self, module: &str) {
        self.exports.entry(module.to_string()).or_default();
    }

    pub fn register_export(&mut self, module: &str, name: Symbol, id: SymbolId) {
        self.exports.entry(module.to_string()).or_default().insert(name, id);
    }

    pub fn lookup(&self, module: &str, name: Symbol) -> GlobalLookup {
        match self.exports.get(module) {
            None => GlobalLookup::ModuleNotFound,
            Some(table) => match table.get(&name) {
                Some(&id) => GlobalLookup::Found(id),
                None => GlobalLookup::NotExported,
            },
        }
    }

    /// Unqualified lookup across every module's exports, used for
    /// diagnostics that want to know whether a name exists *anywhere*.
    pub fn lookup_any(&self, name: Symbol) -> AmbiguityLookup {
        let mut hits: Vec<(&str, SymbolId)> = Vec::new();
        for (module, table) in &self.exports {
            if let Some(&id) = table.get(&name) {
                hits.push((module.as_str(), id));
            }
        }
        match hits.len() {
            0 => AmbiguityLookup::NotFound,
            1 => AmbiguityLookup::Single(hits[0].1),
            _ => AmbiguityLookup::Ambiguous(hits.into_iter().map(|(m, _)| m.to_string()).collect()),
        }
    }
}

pub enum AmbiguityLookup {
    Single(SymbolId),
    Ambiguous(Vec<String>),
    NotFound,
}

/// A single resolved (or failed) import binding, used by the analyzer to
/// bind the local alias into the importing module's scope via
/// [`SymbolTable::bind_alias`].
pub enum ImportResolution {
    Bound { local_scope: ScopeId, local_name: Symbol, target: SymbolId },
    ModuleNotFound { source_module: String, span: Span },
    NotExported { source_module: String, binding_name: Symbol, span: Span },
}

/// Resolves one import binding.
pub fn resolve_binding(
    globals: &GlobalSymbolTable,
    _symbols: &SymbolTable,
    source_module: &str,
    original_name: Symbol,
    local_name: Symbol,
    local_scope: ScopeId,
    span: Span,
) -> ImportResolution {
    match globals.lookup(source_module, original_name) {
        GlobalLookup::Found(target) => ImportResolution::Bound { local_scope, local_name, target },
        GlobalLookup::ModuleNotFound => ImportResolution::ModuleNotFound { source_module: source_module.to_string(), span },
        GlobalLookup::NotExported => {
            ImportResolution::NotExported { source_module: source_module.to_string(), binding_name: local_name, span }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blend65_base::{Position, Span};

    fn span() -> Span {
        Span::point(Position::START)
    }

    #[test]
    fn acyclic_dependency_graph_has_a_topological_order() {
        let mut g = DependencyGraph::new();
        g.add_import("A", "B", span());
        g.add_import("B", "C", span());
        assert!(g.find_cycles().is_empty());
        assert_eq!(g.topological_order(), Some(vec!["C".to_string(), "B".to_string(), "A".to_string()]));
    }

    #[test]
    fn circular_import_is_detected_with_rendered_path() {
        let mut g = DependencyGraph::new();
        g.add_import("A", "B", span());
        g.add_import("B", "A", span());
        let cycles = g.find_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].render(), "A -> B -> A");
        assert!(g.topological_order().is_none());
    }

    #[test]
    fn compilation_order_is_dependencies_first() {
        let mut g = DependencyGraph::new();
        g.add_import("App", "Lib", span());
        let order = g.compilation_order().unwrap();
        assert_eq!(order, vec!["Lib".to_string(), "App".to_string()]);
    }
}
