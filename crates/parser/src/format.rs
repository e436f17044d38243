//! Text outline of combinator trees.

use hashbrown::HashSet;

use crate::node::{Node, NodeId, NodeKind};
use crate::value::Const;

/// Render `root` as an indented outline, one node per line.
///
/// Nodes reachable along several paths (shared subtrees, recursion through
/// Forwards) are expanded once; later occurrences are marked `(see above)`.
pub fn format_tree(root: &Node) -> String {
    let mut result = String::new();
    let mut seen = HashSet::new();
    format_node(root, 0, &mut seen, &mut result);
    result
}

fn format_node(node: &Node, indent: usize, seen: &mut HashSet<NodeId>, result: &mut String) {
    let prefix = "  ".repeat(indent);
    let name = node.name().map(|n| format!(" {:?}", n)).unwrap_or_default();

    let detail = match &node.kind {
        NodeKind::Scanner { set, item_label, .. } => {
            format!(" {} escapes {} of {}", set.chars.describe(), set.escapes.describe(), item_label)
        }
        NodeKind::ScanSet(set) => {
            format!(" {} escapes {}", set.chars.describe(), set.escapes.describe())
        }
        NodeKind::Keyword { value, .. } => format!(" -> {}", value.to_value()),
        NodeKind::Opt { default, .. } if *default != Const::Null => {
            format!(" default {}", default.to_value())
        }
        _ => String::new(),
    };

    let children = node.children();
    if !children.is_empty() && !seen.insert(node.id()) {
        result.push_str(&format!("{}{}{} (see above)\n", prefix, node.describe(), name));
        return;
    }

    result.push_str(&format!("{}{}{}{}\n", prefix, node.describe(), name, detail));
    for child in children {
        format_node(child, indent + 1, seen, result);
    }
}
