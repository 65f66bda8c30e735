//! Graph construction: connection inversion, terminal sinks and leveling.
//!
//! Leveling is a BFS from the input layers. A layer joins the next level
//! once every non-delayed upstream source has been leveled. When a whole
//! frontier is stuck (a cycle without a delayed edge), it is forced in
//! declaration order: a stuck layer fed by one already forced in the same
//! pass waits one more level and reads it fresh. Only edges whose source
//! is still unleveled when the consumer runs read the previous tick's
//! output. Those edges are reported as stale.

use super::spec::LayerSpec;
use crate::error::{NetworkError, Result};
use crate::neural::LayerKind;
use std::collections::{BTreeSet, HashMap, HashSet};

/// How a consumer reads one upstream source during a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// This tick's output, computed at an earlier level
    Fresh,
    /// Previous tick's output, as declared
    Delayed,
    /// Previous tick's output, because the declared graph is cyclic
    Stale,
}

/// Reverse connection: `source` feeds the owning layer or sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub source: String,
    pub delayed: bool,
}

/// Non-delayed connection that was resolved with a one-tick-old value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleConnection {
    pub source: String,
    pub target: String,
}

impl std::fmt::Display for StaleConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct InputEdge {
    pub source: usize,
    pub mode: ReadMode,
}

#[derive(Debug, Clone)]
pub(crate) struct Terminal {
    pub name: String,
    pub size: usize,
    pub sources: Vec<usize>,
}

/// Immutable network wiring, shared between networks forked from one build
#[derive(Debug)]
pub struct Topology {
    specs: Vec<LayerSpec>,
    index: HashMap<String, usize>,
    input_connections: HashMap<String, Vec<Connection>>,
    edges: Vec<Vec<InputEdge>>,
    recurrent: Vec<Vec<usize>>,
    input_dims: Vec<usize>,
    is_input: Vec<bool>,
    levels: Vec<Vec<usize>>,
    level_of: Vec<usize>,
    terminals: Vec<Terminal>,
    stale: Vec<StaleConnection>,
}

impl Topology {
    /// Resolve connections, sinks and execution levels for `specs`
    pub fn build(specs: Vec<LayerSpec>) -> Result<Self> {
        validate_specs(&specs)?;

        let index: HashMap<String, usize> = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| (spec.name.clone(), i))
            .collect();

        // Invert outputs into per-target input lists, in declaration order
        let mut input_connections: HashMap<String, Vec<Connection>> = HashMap::new();
        let mut sink_order: Vec<String> = Vec::new();
        for spec in &specs {
            for target in &spec.outputs {
                if !index.contains_key(target) && !input_connections.contains_key(target) {
                    sink_order.push(target.clone());
                }
                input_connections
                    .entry(target.clone())
                    .or_default()
                    .push(Connection {
                        source: spec.name.clone(),
                        delayed: spec.is_delayed(target),
                    });
            }
        }

        let is_input: Vec<bool> = specs
            .iter()
            .map(|spec| !input_connections.contains_key(&spec.name))
            .collect();

        let input_dims: Vec<usize> = specs
            .iter()
            .zip(&is_input)
            .map(|(spec, &input)| {
                if input {
                    spec.size
                } else {
                    input_connections[&spec.name]
                        .iter()
                        .map(|c| specs[index[&c.source]].size)
                        .sum()
                }
            })
            .collect();

        let terminals = sink_order
            .into_iter()
            .map(|name| {
                let sources: Vec<usize> = input_connections[&name]
                    .iter()
                    .map(|c| index[&c.source])
                    .collect();
                let size = specs[sources[0]].size;
                if let Some(&odd) = sources.iter().find(|&&s| specs[s].size != size) {
                    return Err(NetworkError::configuration(format!(
                        "terminal {} receives {} values from {} but {} from {}",
                        name, size, specs[sources[0]].name, specs[odd].size, specs[odd].name
                    )));
                }
                Ok(Terminal { name, size, sources })
            })
            .collect::<Result<Vec<_>>>()?;

        let sources: Vec<Vec<(usize, bool)>> = specs
            .iter()
            .map(|spec| {
                input_connections
                    .get(&spec.name)
                    .map(|conns| conns.iter().map(|c| (index[&c.source], c.delayed)).collect())
                    .unwrap_or_default()
            })
            .collect();

        let (levels, level_of) = assign_levels(&specs, &index, &is_input, &sources);

        let mut stale = Vec::new();
        let edges: Vec<Vec<InputEdge>> = sources
            .iter()
            .enumerate()
            .map(|(target, conns)| {
                conns
                    .iter()
                    .map(|&(source, delayed)| {
                        let mode = if delayed {
                            ReadMode::Delayed
                        } else if level_of[source] < level_of[target] {
                            ReadMode::Fresh
                        } else {
                            stale.push(StaleConnection {
                                source: specs[source].name.clone(),
                                target: specs[target].name.clone(),
                            });
                            ReadMode::Stale
                        };
                        InputEdge { source, mode }
                    })
                    .collect()
            })
            .collect();

        for connection in &stale {
            log::warn!(
                "connection {} is not declared delayed but lies on a cycle; it reads the previous tick's output",
                connection
            );
        }

        let recurrent = specs
            .iter()
            .map(|spec| spec.recurrent.iter().map(|name| index[name]).collect())
            .collect();

        let topology = Self {
            specs,
            index,
            input_connections,
            edges,
            recurrent,
            input_dims,
            is_input,
            levels,
            level_of,
            terminals,
            stale,
        };
        log::info!(
            "network built: {} layers, {} levels, {} terminals, {} stale connections",
            topology.specs.len(),
            topology.levels.len(),
            topology.terminals.len(),
            topology.stale.len()
        );
        Ok(topology)
    }

    pub fn specs(&self) -> &[LayerSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Layer names in declaration order
    pub fn order_of_execution(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name.as_str()).collect()
    }

    /// Reverse connections of a layer or terminal sink
    pub fn input_connections(&self, name: &str) -> Option<&[Connection]> {
        self.input_connections.get(name).map(Vec::as_slice)
    }

    pub fn input_layers(&self) -> Vec<&str> {
        self.names_where(|i| self.is_input[i])
    }

    pub fn terminal_layers(&self) -> Vec<&str> {
        self.terminals.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn levels(&self) -> Vec<Vec<&str>> {
        self.levels
            .iter()
            .map(|level| level.iter().map(|&i| self.specs[i].name.as_str()).collect())
            .collect()
    }

    pub fn level_of(&self, name: &str) -> Option<usize> {
        self.index_of(name).map(|i| self.level_of[i])
    }

    /// Connections silently treated as delayed because the graph is cyclic
    pub fn stale_connections(&self) -> &[StaleConnection] {
        &self.stale
    }

    pub fn input_dim(&self, name: &str) -> Option<usize> {
        self.index_of(name).map(|i| self.input_dims[i])
    }

    fn names_where(&self, pred: impl Fn(usize) -> bool) -> Vec<&str> {
        (0..self.specs.len())
            .filter(|&i| pred(i))
            .map(|i| self.specs[i].name.as_str())
            .collect()
    }

    pub(crate) fn is_input_index(&self, index: usize) -> bool {
        self.is_input[index]
    }

    pub(crate) fn input_dim_at(&self, index: usize) -> usize {
        self.input_dims[index]
    }

    pub(crate) fn edges(&self, index: usize) -> &[InputEdge] {
        &self.edges[index]
    }

    pub(crate) fn recurrent_sources(&self, index: usize) -> &[usize] {
        &self.recurrent[index]
    }

    pub(crate) fn level_indices(&self) -> &[Vec<usize>] {
        &self.levels
    }

    pub(crate) fn terminals(&self) -> &[Terminal] {
        &self.terminals
    }
}

fn validate_specs(specs: &[LayerSpec]) -> Result<()> {
    if specs.is_empty() {
        return Err(NetworkError::configuration("network has no layers"));
    }

    let mut names = HashSet::new();
    for spec in specs {
        if spec.name.is_empty() {
            return Err(NetworkError::configuration("layer name must not be empty"));
        }
        if !names.insert(spec.name.as_str()) {
            return Err(NetworkError::configuration(format!(
                "layer {} declared twice",
                spec.name
            )));
        }
        if spec.size == 0 {
            return Err(NetworkError::configuration(format!(
                "layer {} has size 0",
                spec.name
            )));
        }
        if spec.delay == 0 {
            return Err(NetworkError::configuration(format!(
                "layer {} has a delay window of 0",
                spec.name
            )));
        }
    }

    for spec in specs {
        let mut seen = HashSet::new();
        for target in &spec.outputs {
            if !seen.insert(target.as_str()) {
                return Err(NetworkError::configuration(format!(
                    "layer {} lists output {} twice",
                    spec.name, target
                )));
            }
        }
        if let Some(extra) = spec.delayed.iter().find(|d| !spec.outputs.contains(d)) {
            return Err(NetworkError::configuration(format!(
                "layer {} delays {} which is not one of its outputs",
                spec.name, extra
            )));
        }
        if !spec.recurrent.is_empty() && spec.kind != LayerKind::Dynamic {
            return Err(NetworkError::configuration(format!(
                "layer {} is {} but only DYNAMIC layers take recurrent sources",
                spec.name, spec.kind
            )));
        }
        if let Some(unknown) = spec.recurrent.iter().find(|r| !names.contains(r.as_str())) {
            return Err(NetworkError::configuration(format!(
                "layer {} takes recurrent input from undeclared layer {}",
                spec.name, unknown
            )));
        }
    }
    Ok(())
}

/// BFS leveling with deadlock forcing; returns levels and each layer's level
fn assign_levels(
    specs: &[LayerSpec],
    index: &HashMap<String, usize>,
    is_input: &[bool],
    sources: &[Vec<(usize, bool)>],
) -> (Vec<Vec<usize>>, Vec<usize>) {
    let n = specs.len();
    let mut level_of: Vec<Option<usize>> = vec![None; n];

    let inputs: Vec<usize> = (0..n).filter(|&i| is_input[i]).collect();
    for &i in &inputs {
        level_of[i] = Some(0);
    }
    let mut assigned = inputs.len();
    let mut levels = vec![inputs];
    // discovered downstream layers, kept in declaration order
    let mut pending: BTreeSet<usize> = BTreeSet::new();

    while assigned < n {
        let frontier = levels.last().cloned().unwrap_or_default();
        for &u in &frontier {
            for target in &specs[u].outputs {
                if let Some(&v) = index.get(target) {
                    if level_of[v].is_none() {
                        pending.insert(v);
                    }
                }
            }
        }

        let ready: Vec<usize> = pending
            .iter()
            .copied()
            .filter(|&v| {
                sources[v]
                    .iter()
                    .all(|&(source, delayed)| delayed || level_of[source].is_some())
            })
            .collect();

        let next = if !ready.is_empty() {
            ready
        } else if !pending.is_empty() {
            let forced = force_in_order(pending.iter().copied(), sources);
            log::warn!(
                "leveling deadlock at level {}: forcing {:?}",
                levels.len(),
                forced.iter().map(|&v| specs[v].name.as_str()).collect::<Vec<_>>()
            );
            forced
        } else {
            // cycles with no path from any input layer
            let forced = force_in_order((0..n).filter(|&v| level_of[v].is_none()), sources);
            log::warn!(
                "layers {:?} are unreachable from the input layers; forcing them",
                forced.iter().map(|&v| specs[v].name.as_str()).collect::<Vec<_>>()
            );
            forced
        };

        let level = levels.len();
        for &v in &next {
            pending.remove(&v);
            level_of[v] = Some(level);
        }
        assigned += next.len();
        levels.push(next);
    }

    let level_of = level_of.into_iter().map(|l| l.unwrap_or(0)).collect();
    (levels, level_of)
}

/// Pick the layers of a stuck frontier that run next, in declaration order.
///
/// A candidate fed (non-delayed) by an earlier pick waits for a later level,
/// where it reads that pick fresh. The first candidate is always taken.
fn force_in_order(
    candidates: impl Iterator<Item = usize>,
    sources: &[Vec<(usize, bool)>],
) -> Vec<usize> {
    let mut forced: Vec<usize> = Vec::new();
    for v in candidates {
        let waits = sources[v]
            .iter()
            .any(|&(source, delayed)| !delayed && forced.contains(&source));
        if !waits {
            forced.push(v);
        }
    }
    forced
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, size: usize, outputs: &[&str], delayed: &[&str]) -> LayerSpec {
        LayerSpec::new(name, size, LayerKind::Static)
            .outputs(outputs.iter().copied())
            .delayed(delayed.iter().copied())
    }

    fn assert_levels_respect_fresh_edges(topology: &Topology) {
        for (target_idx, edges) in topology.edges.iter().enumerate() {
            for edge in edges {
                if edge.mode == ReadMode::Fresh {
                    assert!(
                        topology.level_of[edge.source] < topology.level_of[target_idx],
                        "{} -> {} violates leveling",
                        topology.specs[edge.source].name,
                        topology.specs[target_idx].name
                    );
                }
            }
        }
    }

    #[test]
    fn test_feed_forward_chain() {
        let topology = Topology::build(vec![
            spec("in", 2, &["hidden"], &[]),
            spec("hidden", 3, &["out"], &[]),
            spec("out", 1, &["motor"], &[]),
        ])
        .unwrap();

        assert_eq!(topology.input_layers(), vec!["in"]);
        assert_eq!(topology.terminal_layers(), vec!["motor"]);
        assert_eq!(topology.levels(), vec![vec!["in"], vec!["hidden"], vec!["out"]]);
        assert_eq!(topology.input_dim("hidden"), Some(2));
        assert_eq!(topology.input_dim("in"), Some(2));
        assert!(topology.stale_connections().is_empty());
    }

    #[test]
    fn test_input_dim_sums_all_sources() {
        let topology = Topology::build(vec![
            spec("a", 2, &["c"], &[]),
            spec("b", 3, &["c"], &[]),
            spec("c", 4, &["c"], &["c"]),
        ])
        .unwrap();

        // a + b + delayed self loop
        assert_eq!(topology.input_dim("c"), Some(9));
        let conns = topology.input_connections("c").unwrap();
        assert_eq!(
            conns,
            &[
                Connection { source: "a".into(), delayed: false },
                Connection { source: "b".into(), delayed: false },
                Connection { source: "c".into(), delayed: true },
            ]
        );
        assert!(topology.stale_connections().is_empty());
        assert_eq!(topology.level_of("c"), Some(1));
    }

    #[test]
    fn test_waits_for_all_fresh_sources() {
        // d needs both the short and the long branch
        let topology = Topology::build(vec![
            spec("in", 1, &["short", "long1"], &[]),
            spec("short", 1, &["d"], &[]),
            spec("long1", 1, &["long2"], &[]),
            spec("long2", 1, &["d"], &[]),
            spec("d", 1, &["sink"], &[]),
        ])
        .unwrap();

        assert_eq!(topology.level_of("short"), Some(1));
        assert_eq!(topology.level_of("long2"), Some(2));
        assert_eq!(topology.level_of("d"), Some(3));
        assert_levels_respect_fresh_edges(&topology);
    }

    #[test]
    fn test_delayed_feedback_does_not_block() {
        let topology = Topology::build(vec![
            spec("in", 2, &["a"], &[]),
            spec("a", 2, &["b"], &[]),
            spec("b", 2, &["a", "out"], &["a"]),
        ])
        .unwrap();

        assert_eq!(topology.levels(), vec![vec!["in"], vec!["a"], vec!["b"]]);
        assert!(topology.stale_connections().is_empty());
        assert_levels_respect_fresh_edges(&topology);
    }

    #[test]
    fn test_undelayed_cycle_is_forced_and_reported() {
        let topology = Topology::build(vec![
            spec("in", 1, &["a"], &[]),
            spec("a", 1, &["b"], &[]),
            spec("b", 1, &["a", "out"], &[]),
        ])
        .unwrap();

        // a waits on b and b waits on a: a is forced at level 1
        assert_eq!(topology.level_of("a"), Some(1));
        assert_eq!(topology.level_of("b"), Some(2));
        assert_eq!(
            topology.stale_connections(),
            &[StaleConnection { source: "b".into(), target: "a".into() }]
        );
        assert_levels_respect_fresh_edges(&topology);
    }

    #[test]
    fn test_unreachable_cycle_is_still_leveled() {
        let topology = Topology::build(vec![
            spec("in", 1, &["out"], &[]),
            spec("x", 1, &["y"], &[]),
            spec("y", 1, &["x"], &[]),
        ])
        .unwrap();

        assert_eq!(topology.level_of("x"), Some(1));
        assert_eq!(topology.level_of("y"), Some(2));
        let leveled: usize = topology.levels().iter().map(Vec::len).sum();
        assert_eq!(leveled, 3);
        assert_eq!(
            topology.stale_connections(),
            &[StaleConnection { source: "y".into(), target: "x".into() }]
        );
        assert_levels_respect_fresh_edges(&topology);
    }

    #[test]
    fn test_stuck_frontier_forced_in_declaration_order() {
        // a and b feed each other and are discovered together
        let topology = Topology::build(vec![
            spec("in", 1, &["a", "b"], &[]),
            spec("a", 1, &["b", "out_a"], &[]),
            spec("b", 1, &["a", "out_b"], &[]),
        ])
        .unwrap();

        assert_eq!(topology.levels(), vec![vec!["in"], vec!["a"], vec!["b"]]);
        assert_eq!(
            topology.stale_connections(),
            &[StaleConnection { source: "b".into(), target: "a".into() }]
        );
        assert_levels_respect_fresh_edges(&topology);
    }

    #[test]
    fn test_independent_cycles_forced_together() {
        let topology = Topology::build(vec![
            spec("in", 1, &["a", "c"], &[]),
            spec("a", 1, &["b"], &[]),
            spec("b", 1, &["a"], &[]),
            spec("c", 1, &["d"], &[]),
            spec("d", 1, &["c"], &[]),
        ])
        .unwrap();

        assert_eq!(topology.levels(), vec![vec!["in"], vec!["a", "c"], vec!["b", "d"]]);
        assert_eq!(topology.stale_connections().len(), 2);
        assert_levels_respect_fresh_edges(&topology);
    }

    #[test]
    fn test_self_loop_without_delay_is_stale() {
        let topology = Topology::build(vec![spec("in", 1, &["a"], &[]), spec("a", 1, &["a", "out"], &[])]).unwrap();
        assert_eq!(topology.level_of("a"), Some(1));
        assert_eq!(
            topology.stale_connections(),
            &[StaleConnection { source: "a".into(), target: "a".into() }]
        );
    }

    #[test]
    fn test_terminal_size_mismatch_rejected() {
        let err = Topology::build(vec![
            spec("in", 2, &["a", "b"], &[]),
            spec("a", 2, &["wheel"], &[]),
            spec("b", 3, &["wheel"], &[]),
        ])
        .unwrap_err();
        assert!(matches!(err, NetworkError::Configuration(_)));
    }

    #[test]
    fn test_invalid_definitions_rejected() {
        assert!(Topology::build(vec![]).is_err());
        assert!(Topology::build(vec![spec("a", 1, &[], &[]), spec("a", 1, &[], &[])]).is_err());
        assert!(Topology::build(vec![spec("a", 0, &[], &[])]).is_err());
        assert!(Topology::build(vec![spec("a", 1, &["x"], &["y"])]).is_err());
        assert!(Topology::build(vec![spec("a", 1, &["x", "x"], &[])]).is_err());
        assert!(Topology::build(vec![spec("a", 1, &[], &[]).recurrent(["a"])]).is_err());

        let dynamic = LayerSpec::new("d", 1, LayerKind::Dynamic).recurrent(["ghost"]);
        assert!(Topology::build(vec![dynamic]).is_err());
    }

    #[test]
    fn test_layer_without_outputs_is_not_a_sink() {
        let topology = Topology::build(vec![spec("in", 2, &["l2"], &[]), spec("l2", 1, &[], &[])]).unwrap();
        assert!(topology.terminal_layers().is_empty());
        assert_eq!(topology.input_dim("l2"), Some(2));
    }
}
