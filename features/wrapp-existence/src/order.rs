use crate::{graph::ComponentGraph, types::ComponentId};

/// An eager edge between two present components which closed a cycle
///
/// The edge was left out of the ordering constraints, `from` may be created before `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DroppedEdge {
    pub from: ComponentId,
    pub to: ComponentId,
}

/// Linear creation order over the present components
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CreationOrder {
    order: Vec<ComponentId>,
    dropped_edges: Vec<DroppedEdge>,
}
impl CreationOrder {
    pub fn ids(&self) -> &[ComponentId] {
        &self.order
    }

    pub fn identities<'g>(&self, graph: &'g ComponentGraph) -> Vec<&'g str> {
        self.order.iter().map(|id| graph.identity(*id)).collect()
    }

    pub fn position(&self, id: ComponentId) -> Option<usize> {
        self.order.iter().position(|entry| *entry == id)
    }

    /// Cycle edges which were not honoured by the order
    pub fn dropped_edges(&self) -> &[DroppedEdge] {
        &self.dropped_edges
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
impl<'a> IntoIterator for &'a CreationOrder {
    type Item = &'a ComponentId;
    type IntoIter = std::slice::Iter<'a, ComponentId>;

    fn into_iter(self) -> Self::IntoIter {
        self.order.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

/// Depth-first post-order over the present components
///
/// Uses an explicit stack, so deep graphs can't overflow. Roots and dependencies are visited in
/// declaration order, which makes the result deterministic. An edge to a component which is
/// still being visited closes a cycle - it is recorded and skipped.
pub fn creation_order(
    graph: &ComponentGraph,
    is_present: impl Fn(ComponentId) -> bool,
) -> CreationOrder {
    let mut marks = vec![Mark::Unvisited; graph.len()];
    let mut result = CreationOrder::default();

    for root in graph.ids() {
        if !is_present(root) || marks[root.0] != Mark::Unvisited {
            continue;
        }

        // (component, index of the next dependency to look at)
        let mut stack = vec![(root, 0_usize)];
        marks[root.0] = Mark::Visiting;

        while let Some(top) = stack.last_mut() {
            let (node, cursor) = *top;
            top.1 += 1;

            match graph.eager_dependencies(node).get(cursor) {
                Some(&dependency) => {
                    if !is_present(dependency) {
                        continue;
                    }
                    match marks[dependency.0] {
                        Mark::Unvisited => {
                            marks[dependency.0] = Mark::Visiting;
                            stack.push((dependency, 0));
                        }
                        Mark::Visiting => {
                            tracing::debug!(
                                "Dropping cyclic ordering constraint '{}' -> '{}'",
                                graph.identity(node),
                                graph.identity(dependency)
                            );
                            result.dropped_edges.push(DroppedEdge {
                                from: node,
                                to: dependency,
                            });
                        }
                        Mark::Done => {}
                    }
                }
                None => {
                    marks[node.0] = Mark::Done;
                    result.order.push(node);
                    stack.pop();
                }
            }
        }
    }

    tracing::debug!(
        "Computed creation order for {} components, {} cyclic edges dropped",
        result.order.len(),
        result.dropped_edges.len()
    );

    result
}
