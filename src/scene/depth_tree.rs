//! Depth-Tree Builder
//!
//! Assigns every node a single integer sorting depth that totally orders
//! rendering and hit-testing, honouring explicit sibling-order overrides.
//!
//! The builder produces a transient forest of [`DepthNode`]s: one node per
//! distinct sibling-order value among the children of a group, holding
//! *all* children that share the value. Children that keep the default
//! order 0 therefore collapse into a single node per tree level — the
//! common case allocates one `DepthNode` per level, not one per actor.
//!
//! The forest lives in a frame-scoped [`FixedSizePool`] and is addressed by
//! [`PoolIndex`] links (first child / next sibling), so it carries no
//! lifetime baggage and is discarded wholesale at the end of the build. It
//! is reconstructed whenever structure or sibling order changes, never
//! persisted across frames.

use crate::common::{FixedSizePool, PoolIndex};
use crate::scene::graph::SceneGraph;
use crate::scene::NodeKey;

/// Spacing between consecutive flattened depth indices, leaving room for
/// renderer-local depth offsets to interleave between siblings.
pub const SIBLING_ORDER_MULTIPLIER: i32 = 1000;

/// Transient grouping node: all scene nodes at one tree depth that share a
/// sibling-order value.
pub struct DepthNode {
    /// The sibling-order value every entry in `nodes` shares.
    pub sibling_order: u32,
    /// Scene nodes in this band, in gather order (stable across rebuilds).
    pub nodes: Vec<NodeKey>,
    /// First grouped child band, if any.
    pub first_child: Option<PoolIndex>,
    /// Next band at the same level, ascending sibling order.
    pub next_sibling: Option<PoolIndex>,
}

/// Flattened output: `(node, sorted depth)` pairs ordered by depth, sent to
/// the update manager in a single message.
pub type NodeDepths = Vec<(NodeKey, i32)>;

/// Builds the depth forest for the subtree rooted at `root`.
///
/// The pool is cleared first; all previously issued [`PoolIndex`] handles
/// become invalid. Returns the index of the root `DepthNode` (which wraps
/// `root` itself at depth 0).
pub fn build_depth_tree(
    pool: &mut FixedSizePool<DepthNode>,
    graph: &SceneGraph,
    root: NodeKey,
) -> PoolIndex {
    pool.clear();
    let root_index = pool.allocate(DepthNode {
        sibling_order: 0,
        nodes: vec![root],
        first_child: None,
        next_sibling: None,
    });
    add_children(pool, graph, root_index);
    root_index
}

/// Groups the children of every scene node in `group` by sibling order and
/// links the resulting bands, then recurses into each band.
fn add_children(pool: &mut FixedSizePool<DepthNode>, graph: &SceneGraph, group: PoolIndex) {
    let actors = pool.get(group).nodes.clone();

    let mut entries: Vec<(u32, NodeKey)> = Vec::new();
    for actor in actors {
        let Some(node) = graph.get_node(actor) else {
            continue;
        };
        for &child in node.children() {
            if let Some(child_node) = graph.get_node(child) {
                entries.push((child_node.sibling_order(), child));
            }
        }
    }
    if entries.is_empty() {
        return;
    }

    // Stable: ties keep gather (insertion) order.
    entries.sort_by_key(|&(order, _)| order);

    let mut created: Vec<PoolIndex> = Vec::new();
    let mut previous: Option<PoolIndex> = None;
    let mut run_start = 0;
    while run_start < entries.len() {
        let order = entries[run_start].0;
        let mut run_end = run_start + 1;
        while run_end < entries.len() && entries[run_end].0 == order {
            run_end += 1;
        }

        let band = pool.allocate(DepthNode {
            sibling_order: order,
            nodes: entries[run_start..run_end].iter().map(|&(_, k)| k).collect(),
            first_child: None,
            next_sibling: None,
        });
        match previous {
            Some(p) => pool.get_mut(p).next_sibling = Some(band),
            None => pool.get_mut(group).first_child = Some(band),
        }
        previous = Some(band);
        created.push(band);
        run_start = run_end;
    }

    for band in created {
        add_children(pool, graph, band);
    }
}

/// Flattens the forest into monotonically increasing depth indices.
///
/// Pre-order: a band's own nodes first, then its first-child subtree, then
/// its next-sibling subtree. Each visited node gets the next index scaled
/// by [`SIBLING_ORDER_MULTIPLIER`].
pub fn flatten_depth_tree(pool: &FixedSizePool<DepthNode>, root: PoolIndex, out: &mut NodeDepths) {
    out.clear();
    let mut counter = 0i32;
    visit(pool, root, &mut counter, out);
}

fn visit(pool: &FixedSizePool<DepthNode>, index: PoolIndex, counter: &mut i32, out: &mut NodeDepths) {
    let band = pool.get(index);
    for &node in &band.nodes {
        *counter += 1;
        out.push((node, *counter * SIBLING_ORDER_MULTIPLIER));
    }
    if let Some(child) = band.first_child {
        visit(pool, child, counter, out);
    }
    if let Some(sibling) = band.next_sibling {
        visit(pool, sibling, counter, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::node::Node;

    fn add_child(graph: &mut SceneGraph, parent: NodeKey, order: u32) -> NodeKey {
        let key = graph.add_node(Node::new(), parent);
        graph.set_sibling_order(key, order);
        key
    }

    /// Collects the node keys of a band for comparison.
    fn band_nodes(pool: &FixedSizePool<DepthNode>, index: PoolIndex) -> Vec<NodeKey> {
        pool.get(index).nodes.clone()
    }

    #[test]
    fn test_sibling_order_grouping() {
        let mut graph = SceneGraph::new();
        let root = graph.root();

        // Children of root with explicit orders.
        let a = add_child(&mut graph, root, 0);
        let b = add_child(&mut graph, root, 2);
        let c = add_child(&mut graph, root, 0);
        let d = add_child(&mut graph, root, 1);

        // Grandchildren with varied orders.
        let e = add_child(&mut graph, a, 0);
        let f = add_child(&mut graph, a, 2);
        let g = add_child(&mut graph, a, 1);

        let _h = add_child(&mut graph, b, 0);
        let _i = add_child(&mut graph, b, 0);
        let _j = add_child(&mut graph, b, 0);

        let k = add_child(&mut graph, c, 1);
        let l = add_child(&mut graph, c, 2);
        let m = add_child(&mut graph, c, 0);

        let _n = add_child(&mut graph, d, 0);
        let _o = add_child(&mut graph, d, 1);
        let _p = add_child(&mut graph, d, 0);

        let mut pool = FixedSizePool::new(32);
        let root_band = build_depth_tree(&mut pool, &graph, root);

        // First band under the root holds both order-0 children.
        let first = pool.get(root_band).first_child.expect("root has children");
        assert_eq!(band_nodes(&pool, first), vec![a, c]);

        // Ascending sibling order across the level.
        let second = pool.get(first).next_sibling.expect("order 1 band");
        assert_eq!(band_nodes(&pool, second), vec![d]);
        let third = pool.get(second).next_sibling.expect("order 2 band");
        assert_eq!(band_nodes(&pool, third), vec![b]);
        assert!(pool.get(third).next_sibling.is_none());

        // Children of the merged {a, c} band are grouped together:
        // order 0 → {e, m}, order 1 → {g, k}, order 2 → {f, l}.
        let ac_children = pool.get(first).first_child.expect("grandchild band");
        assert_eq!(band_nodes(&pool, ac_children), vec![e, m]);
        let next = pool.get(ac_children).next_sibling.expect("order 1 band");
        assert_eq!(band_nodes(&pool, next), vec![g, k]);
        let last = pool.get(next).next_sibling.expect("order 2 band");
        assert_eq!(band_nodes(&pool, last), vec![f, l]);

        // Flattening visits all 17 nodes exactly once.
        let mut depths = NodeDepths::new();
        flatten_depth_tree(&pool, root_band, &mut depths);
        assert_eq!(depths.len(), 17);
        let mut seen: Vec<NodeKey> = depths.iter().map(|&(k, _)| k).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 17);
    }

    #[test]
    fn test_uniform_order_collapses_per_level() {
        let mut graph = SceneGraph::new();
        let root = graph.root();

        let mut children = Vec::new();
        let mut grandchildren = Vec::new();
        for _ in 0..4 {
            let child = add_child(&mut graph, root, 0);
            children.push(child);
            for _ in 0..3 {
                grandchildren.push(add_child(&mut graph, child, 0));
            }
        }

        let mut pool = FixedSizePool::new(8);
        let root_band = build_depth_tree(&mut pool, &graph, root);

        // All four children merge into one band, all twelve grandchildren
        // into the band below it.
        let level1 = pool.get(root_band).first_child.expect("child band");
        assert_eq!(band_nodes(&pool, level1), children);
        assert!(pool.get(level1).next_sibling.is_none());

        let level2 = pool.get(level1).first_child.expect("grandchild band");
        assert_eq!(band_nodes(&pool, level2), grandchildren);
        assert!(pool.get(level2).next_sibling.is_none());

        // Three bands total: root, children, grandchildren.
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_band_count_matches_distinct_orders() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        for order in [5u32, 1, 5, 3, 1, 1] {
            add_child(&mut graph, root, order);
        }

        let mut pool = FixedSizePool::new(8);
        build_depth_tree(&mut pool, &graph, root);

        // Root band + one band per distinct order {1, 3, 5}.
        assert_eq!(pool.len(), 4);
    }

    #[test]
    fn test_flatten_is_monotonic_and_scaled() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let first = add_child(&mut graph, root, 0);
        let second = add_child(&mut graph, root, 1);

        let mut pool = FixedSizePool::new(8);
        let root_band = build_depth_tree(&mut pool, &graph, root);
        let mut depths = NodeDepths::new();
        flatten_depth_tree(&pool, root_band, &mut depths);

        assert_eq!(
            depths,
            vec![
                (root, SIBLING_ORDER_MULTIPLIER),
                (first, 2 * SIBLING_ORDER_MULTIPLIER),
                (second, 3 * SIBLING_ORDER_MULTIPLIER),
            ]
        );
    }

    #[test]
    fn test_childless_node_yields_leaf_band() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let only = add_child(&mut graph, root, 7);

        let mut pool = FixedSizePool::new(8);
        let root_band = build_depth_tree(&mut pool, &graph, root);
        let leaf = pool.get(root_band).first_child.expect("leaf band");
        assert_eq!(band_nodes(&pool, leaf), vec![only]);
        assert!(pool.get(leaf).first_child.is_none());
        assert!(pool.get(leaf).next_sibling.is_none());
    }
}
