//! Renumbering of hierarchical codes from tree position.

use crate::models::node::{NodeId, WbsNode};
use crate::services::tree;

/// A code and level computed for one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAssignment {
    pub id: NodeId,
    pub code: String,
    pub level: u32,
}

fn assign(nodes: &mut [WbsNode], prefix: Option<&str>, level: u32, out: &mut Vec<CodeAssignment>) {
    for (index, node) in nodes.iter_mut().enumerate() {
        let code = match prefix {
            Some(prefix) => format!("{prefix}.{}", index + 1),
            None => (index + 1).to_string(),
        };
        node.wbs_code = Some(code.clone());
        node.level = Some(level);
        out.push(CodeAssignment {
            id: node.id.clone(),
            code: code.clone(),
            level,
        });
        assign(&mut node.children, Some(&code), level + 1, out);
    }
}

/// Codes `1`, `1.2`, `1.2.3`... from current sibling position, with `level`
/// as depth from the roots. Deleted nodes keep their slot.
pub fn assign_codes(forest: &[WbsNode]) -> Vec<WbsNode> {
    let mut next = forest.to_vec();
    assign(&mut next, None, 0, &mut Vec::new());
    next
}

/// The assignments [`assign_codes`] would make, in preorder.
pub fn code_assignments(forest: &[WbsNode]) -> Vec<CodeAssignment> {
    let mut next = forest.to_vec();
    let mut out = Vec::with_capacity(tree::count(forest));
    assign(&mut next, None, 0, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ordered(id: &str, order: i64, parent: Option<&str>) -> WbsNode {
        WbsNode {
            order: Some(order),
            parent_id: parent.map(String::from),
            ..WbsNode::new(id, id)
        }
    }

    #[test]
    fn test_assign_codes_from_position() {
        let forest = tree::build(vec![
            ordered("b", 2000, None),
            ordered("a", 1000, None),
            ordered("a2", 2000, Some("a")),
            ordered("a1", 1000, Some("a")),
            ordered("a1x", 0, Some("a1")),
        ]);

        let assignments = code_assignments(&forest);
        let flat: Vec<(&str, &str, u32)> = assignments
            .iter()
            .map(|a| (a.id.as_str(), a.code.as_str(), a.level))
            .collect();
        assert_eq!(
            flat,
            vec![
                ("a", "1", 0),
                ("a1", "1.1", 1),
                ("a1x", "1.1.1", 2),
                ("a2", "1.2", 1),
                ("b", "2", 0),
            ]
        );

        let renumbered = assign_codes(&forest);
        let a2 = tree::find(&renumbered, "a2").unwrap();
        assert_eq!(a2.wbs_code.as_deref(), Some("1.2"));
        assert_eq!(a2.level, Some(1));
    }

    #[test]
    fn test_assign_codes_after_move() {
        let forest = tree::build(vec![
            ordered("a", 1000, None),
            ordered("b", 2000, None),
            ordered("a1", 1000, Some("a")),
        ]);
        let moved = crate::services::mutator::move_node(&forest, "a1", Some("b"), 0);

        let renumbered = assign_codes(&moved);
        assert_eq!(tree::find(&renumbered, "a1").unwrap().wbs_code.as_deref(), Some("2.1"));
    }
}
