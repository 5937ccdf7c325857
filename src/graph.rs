use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::EngineError;

pub type Value = Rc<dyn Any>;

type ComputeFn = Rc<dyn Fn(&Args<'_>) -> Result<Value, EngineError>>;

/// Fresh dependency values, in the order they were declared at registration.
pub struct Args<'a> {
    values: &'a [Value],
}

impl Args<'_> {
    pub fn get<T: 'static>(&self, index: usize) -> Rc<T> {
        self.values[index]
            .clone()
            .downcast()
            .expect("dependency value type")
    }
}

enum Spec {
    Input { initial: Value },
    Computed { deps: Vec<String>, func: ComputeFn },
}

/// Collects named inputs and computed derivations, then validates the whole
/// graph at once. Dependencies are declared explicitly by name and may
/// reference nodes registered later; `build` fails on unknown names,
/// duplicate names, and cycles, so no partially usable graph escapes.
pub struct GraphBuilder {
    specs: Vec<(String, Spec)>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self { specs: Vec::new() }
    }

    pub fn input(&mut self, name: &str, initial: Value) -> &mut Self {
        self.specs.push((name.to_string(), Spec::Input { initial }));
        self
    }

    pub fn computed<F>(&mut self, name: &str, deps: &[&str], func: F) -> &mut Self
    where
        F: Fn(&Args<'_>) -> Result<Value, EngineError> + 'static,
    {
        self.specs.push((
            name.to_string(),
            Spec::Computed {
                deps: deps.iter().map(|dep| dep.to_string()).collect(),
                func: Rc::new(func),
            },
        ));
        self
    }

    pub fn build(self) -> Result<Graph, EngineError> {
        let mut index = HashMap::with_capacity(self.specs.len());
        for (position, (name, _)) in self.specs.iter().enumerate() {
            if index.insert(name.clone(), position).is_some() {
                return Err(EngineError::DuplicateNode(name.clone()));
            }
        }

        let mut deps_of = Vec::with_capacity(self.specs.len());
        for (_, spec) in &self.specs {
            let deps = match spec {
                Spec::Input { .. } => Vec::new(),
                Spec::Computed { deps, .. } => deps
                    .iter()
                    .map(|dep| {
                        index
                            .get(dep)
                            .copied()
                            .ok_or_else(|| EngineError::UnknownNode(dep.clone()))
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            };
            deps_of.push(deps);
        }

        if let Some(cycle) = find_cycle(&deps_of) {
            let names = cycle
                .into_iter()
                .map(|node| self.specs[node].0.clone())
                .collect();
            return Err(EngineError::CyclicDependency(names));
        }

        let mut dependents = vec![Vec::new(); self.specs.len()];
        for (node, deps) in deps_of.iter().enumerate() {
            for &dep in deps {
                dependents[dep].push(node);
            }
        }

        let nodes = self
            .specs
            .into_iter()
            .zip(deps_of)
            .zip(dependents)
            .map(|(((name, spec), deps), dependents)| match spec {
                Spec::Input { initial } => Node {
                    name,
                    kind: NodeKind::Input,
                    dependents,
                    dirty: false,
                    value: Some(initial),
                    watcher: None,
                },
                Spec::Computed { func, .. } => Node {
                    name,
                    kind: NodeKind::Computed { deps, func },
                    dependents,
                    dirty: true,
                    value: None,
                    watcher: None,
                },
            })
            .collect();

        Ok(Graph { nodes, index })
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct Watcher {
    changed: Box<dyn Fn(&Value, &Value) -> bool>,
    notify: Box<dyn FnMut(&Value)>,
}

enum NodeKind {
    Input,
    Computed { deps: Vec<usize>, func: ComputeFn },
}

struct Node {
    name: String,
    kind: NodeKind,
    dependents: Vec<usize>,
    dirty: bool,
    value: Option<Value>,
    watcher: Option<Watcher>,
}

/// Dependency-tracked memoization: `write` marks transitive dependents stale
/// through reverse edges without recomputing anything; `read` freshens the
/// requested node lazily, in dependency order, recomputing each stale node
/// at most once per write-batch.
pub struct Graph {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
}

impl Graph {
    pub fn read<T: 'static>(&mut self, name: &str) -> Result<Rc<T>, EngineError> {
        let index = self.resolve(name)?;
        self.freshen(index)?;
        let value = self.nodes[index]
            .value
            .as_ref()
            .expect("fresh node has a value");
        Ok(value.clone().downcast().expect("node value type"))
    }

    pub fn write<T: 'static>(&mut self, name: &str, value: T) -> Result<(), EngineError> {
        let index = self.resolve(name)?;
        if !matches!(self.nodes[index].kind, NodeKind::Input) {
            return Err(EngineError::NotWritable(name.to_string()));
        }

        log::debug!("write {name}");
        self.nodes[index].value = Some(Rc::new(value));

        // Invariant: a dirty node's transitive dependents are already dirty,
        // so the walk can stop at any node it finds dirty.
        let mut stack = self.nodes[index].dependents.clone();
        while let Some(current) = stack.pop() {
            let node = &mut self.nodes[current];
            if !node.dirty {
                node.dirty = true;
                stack.extend(node.dependents.iter().copied());
            }
        }

        Ok(())
    }

    /// Registers a change callback on a computed node. It fires during the
    /// `read` that recomputes the node, at most once per write-batch, and
    /// only when the new value differs from the cached one. The callback
    /// must not reenter the graph.
    pub fn subscribe<T, F>(&mut self, name: &str, mut notify: F) -> Result<(), EngineError>
    where
        T: PartialEq + 'static,
        F: FnMut(&Rc<T>) + 'static,
    {
        let index = self.resolve(name)?;
        self.nodes[index].watcher = Some(Watcher {
            changed: Box::new(|old, next| {
                match (old.downcast_ref::<T>(), next.downcast_ref::<T>()) {
                    (Some(old), Some(next)) => old != next,
                    _ => true,
                }
            }),
            notify: Box::new(move |value| {
                let value = value
                    .clone()
                    .downcast::<T>()
                    .expect("subscribed node value type");
                notify(&value);
            }),
        });
        Ok(())
    }

    fn resolve(&self, name: &str) -> Result<usize, EngineError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| EngineError::UnknownNode(name.to_string()))
    }

    fn freshen(&mut self, index: usize) -> Result<(), EngineError> {
        if !self.nodes[index].dirty {
            return Ok(());
        }

        let (deps, func) = match &self.nodes[index].kind {
            NodeKind::Input => {
                self.nodes[index].dirty = false;
                return Ok(());
            }
            NodeKind::Computed { deps, func } => (deps.clone(), func.clone()),
        };

        for &dep in &deps {
            self.freshen(dep)?;
        }

        let values = deps
            .iter()
            .map(|&dep| {
                self.nodes[dep]
                    .value
                    .clone()
                    .expect("fresh dependency has a value")
            })
            .collect::<Vec<_>>();

        // An error propagates without touching the cache: the node stays
        // dirty and is retried on the next read.
        let next = func(&Args { values: &values })?;
        log::trace!("recomputed {}", self.nodes[index].name);

        let node = &mut self.nodes[index];
        if let Some(watcher) = &mut node.watcher {
            let fire = match &node.value {
                Some(old) => (watcher.changed)(old, &next),
                None => true,
            };
            if fire {
                (watcher.notify)(&next);
            }
        }

        node.value = Some(next);
        node.dirty = false;
        Ok(())
    }
}

fn find_cycle(deps_of: &[Vec<usize>]) -> Option<Vec<usize>> {
    const UNVISITED: u8 = 0;
    const ACTIVE: u8 = 1;
    const DONE: u8 = 2;

    fn visit(
        node: usize,
        deps_of: &[Vec<usize>],
        state: &mut [u8],
        trail: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        state[node] = ACTIVE;
        trail.push(node);

        for &dep in &deps_of[node] {
            match state[dep] {
                ACTIVE => {
                    let start = trail
                        .iter()
                        .position(|&on_trail| on_trail == dep)
                        .expect("active node is on the trail");
                    let mut cycle = trail[start..].to_vec();
                    cycle.push(dep);
                    return Some(cycle);
                }
                UNVISITED => {
                    if let Some(cycle) = visit(dep, deps_of, state, trail) {
                        return Some(cycle);
                    }
                }
                _ => {}
            }
        }

        trail.pop();
        state[node] = DONE;
        None
    }

    let mut state = vec![UNVISITED; deps_of.len()];
    let mut trail = Vec::new();
    for node in 0..deps_of.len() {
        if state[node] == UNVISITED
            && let Some(cycle) = visit(node, deps_of, &mut state, &mut trail)
        {
            return Some(cycle);
        }
    }
    None
}
