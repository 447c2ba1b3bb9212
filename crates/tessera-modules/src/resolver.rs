use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use petgraph::algo;
use petgraph::graph::{DiGraph, NodeIndex};
use tessera_core::{Error, Module, Result, clean_path};
use tracing::debug;

use crate::manifest::{MANIFEST_FILE_NAME, Manifest};
use crate::traits::DependencyResolver;

/// Modules in execution order plus the workspace edges that produced it.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Every module, each after all modules it depends on.
    pub order: Vec<Module>,
    /// Workspace dependencies per module id, in discovery order.
    pub dependencies: BTreeMap<String, Vec<String>>,
}

impl Resolution {
    /// Numbered listing of the execution order with each module's dependencies.
    pub fn summary(&self) -> String {
        let mut text = String::new();
        for (index, module) in self.order.iter().enumerate() {
            let location = if module.is_root {
                "./".to_owned()
            } else {
                format!("./{}", module.relative_path)
            };
            let _ignored = write!(text, "{}. {location} ({})", index + 1, module.module_id);
            if let Some(deps) = self.dependencies.get(&module.module_id)
                && !deps.is_empty()
            {
                let names: Vec<&str> = deps
                    .iter()
                    .map(|dep| dep.rsplit('/').next().unwrap_or(dep))
                    .collect();
                let _ignored = write!(text, " -> depends on: {}", names.join(", "));
            }
            text.push('\n');
        }
        text
    }
}

/// Orders modules by their local `replace` directives.
#[derive(Debug, Clone, Default)]
pub struct GraphResolver;

impl GraphResolver {
    /// Create a resolver.
    pub fn new() -> Self {
        Self
    }
}

impl DependencyResolver for GraphResolver {
    fn resolve(&self, modules: &[Module]) -> Result<Resolution> {
        let manifests = modules
            .iter()
            .map(|module| Manifest::read(&module.path.join(MANIFEST_FILE_NAME)))
            .collect::<Result<Vec<_>>>()?;
        resolve_with_manifests(modules, &manifests)
    }
}

/// Builds the workspace graph from already parsed manifests and orders it.
///
/// `manifests[i]` belongs to `modules[i]`. An edge `a -> b` exists when `a`
/// has a local replacement whose cleaned target is the directory of another
/// module `b`. A replacement pointing back at the module itself is ignored.
///
/// # Errors
/// Returns [`Error::CyclicDependency`] naming the modules of the first cycle,
/// in discovery order and closed on the first id.
pub fn resolve_with_manifests(modules: &[Module], manifests: &[Manifest]) -> Result<Resolution> {
    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let nodes: Vec<NodeIndex> = (0..modules.len()).map(|index| graph.add_node(index)).collect();
    let by_path: HashMap<PathBuf, usize> = modules
        .iter()
        .enumerate()
        .map(|(index, module)| (clean_path(&module.path), index))
        .collect();

    for (index, (module, manifest)) in modules.iter().zip(manifests).enumerate() {
        for (replaced, target) in manifest.local_replacements() {
            let resolved = resolve_target(&module.path, target);
            if let Some(&dependency) = by_path.get(&resolved)
                && dependency != index
            {
                debug!(
                    "{} depends on {} via replace {replaced}",
                    module.module_id, modules[dependency].module_id
                );
                graph.update_edge(nodes[index], nodes[dependency], ());
            }
        }
    }

    let mut dependencies = BTreeMap::new();
    for (index, module) in modules.iter().enumerate() {
        let deps = sorted_neighbors(&graph, nodes[index])
            .into_iter()
            .map(|dependency| modules[dependency].module_id.clone())
            .collect();
        dependencies.insert(module.module_id.clone(), deps);
    }

    if let Some(members) = cycle_members(&graph) {
        let mut cycle: Vec<String> = members
            .iter()
            .map(|&member| modules[member].module_id.clone())
            .collect();
        if let Some(first) = cycle.first().cloned() {
            cycle.push(first);
        }
        return Err(Error::CyclicDependency(cycle));
    }
    let order = topological_order(&graph);

    Ok(Resolution {
        order: order.into_iter().map(|index| modules[index].clone()).collect(),
        dependencies,
    })
}

fn resolve_target(module_dir: &Path, target: &Path) -> PathBuf {
    if target.is_absolute() {
        clean_path(target)
    } else {
        clean_path(&module_dir.join(target))
    }
}

fn sorted_neighbors(graph: &DiGraph<usize, ()>, node: NodeIndex) -> Vec<usize> {
    let mut neighbors: Vec<usize> = graph.neighbors(node).map(|next| graph[next]).collect();
    neighbors.sort_unstable();
    neighbors.dedup();
    neighbors
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Depth-first post-order over nodes in discovery order, so unconstrained
/// modules keep their discovery order. The graph must be acyclic.
fn topological_order(graph: &DiGraph<usize, ()>) -> Vec<usize> {
    let mut marks = vec![Mark::Unvisited; graph.node_count()];
    let mut order = Vec::with_capacity(graph.node_count());
    for start in graph.node_indices() {
        if marks[start.index()] != Mark::Unvisited {
            continue;
        }
        // (node, next neighbour to look at)
        let mut stack: Vec<(NodeIndex, usize)> = vec![(start, 0)];
        marks[start.index()] = Mark::InProgress;
        while let Some((node, cursor)) = stack.last_mut() {
            let neighbors = sorted_neighbors(graph, *node);
            if let Some(&next) = neighbors.get(*cursor) {
                *cursor += 1;
                let next_node = NodeIndex::new(next);
                if marks[next] == Mark::Unvisited {
                    marks[next] = Mark::InProgress;
                    stack.push((next_node, 0));
                }
            } else {
                marks[node.index()] = Mark::Done;
                order.push(graph[*node]);
                stack.pop();
            }
        }
    }
    order
}

/// Members of the strongly connected component holding the earliest
/// discovered module on a cycle, sorted by discovery index.
fn cycle_members(graph: &DiGraph<usize, ()>) -> Option<Vec<usize>> {
    algo::tarjan_scc(graph)
        .into_iter()
        .filter(|component| component.len() > 1)
        .map(|component| {
            let mut members: Vec<usize> = component.into_iter().map(|node| graph[node]).collect();
            members.sort_unstable();
            members
        })
        .min_by_key(|members| members.first().copied())
}
