//! The mission command sequence.
//!
//! Commands live in an arena of [`CommandNode`]s joined by `next` indices
//! into a single main chain. Branch commands (If, While, Target) hold the
//! entry points of their sub-chains; every sub-chain ends at an `End*`
//! node owned by its construct. The `next` of a branch command and of its
//! `End*` node both point at the command after the whole construct, except
//! `EndWhile`, whose successor is its owning While node.

pub mod command;
pub mod executor;

pub use command::{CommandKind, ResolvedCondition};
pub use executor::{Executor, RunResult, RunStatus};

use crate::script::ast::{Block, Statement, StmtKind};
use crate::wrapper::rename_in_text;

use self::command::CommandKind as Kind;

/// Index of a node in the sequence arena.
pub type NodeId = usize;

/// Lifecycle state of a command node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Freshly allocated, no fields filled yet.
    Unparsed,
    /// Parsed fields are present; wrappers are not.
    Parsed,
    /// Wrappers built and checked against the configured objects.
    Validated,
    /// Validation failed; the node must not execute.
    Invalid,
    /// Ready to execute against the run-time object map.
    Initialized,
    /// Currently executing.
    Executing,
    /// Finished one execution; re-initializes on loop re-entry.
    Complete,
}

/// One command in the sequence.
#[derive(Debug, Clone)]
pub struct CommandNode {
    /// The command payload.
    pub kind: CommandKind,
    /// The script text this node regenerates to.
    pub script: String,
    /// Lifecycle state.
    pub state: NodeState,
    /// The next node on this chain.
    pub next: Option<NodeId>,
    /// Branch sub-chain entry points. If nodes hold one or two entries
    /// (then, else); While and Target hold one.
    pub branches: Vec<NodeId>,
    /// For `End*` nodes, the branch command that owns the construct.
    pub owner: Option<NodeId>,
    /// One-line run summary, filled in during execution.
    pub summary: String,
}

impl CommandNode {
    /// A freshly parsed node with no links.
    pub fn new(kind: CommandKind, script: impl Into<String>) -> Self {
        CommandNode {
            kind,
            script: script.into(),
            state: NodeState::Parsed,
            next: None,
            branches: Vec::new(),
            owner: None,
            summary: String::new(),
        }
    }
}

/// The command sequence arena.
#[derive(Debug, Clone, Default)]
pub struct MissionSequence {
    nodes: Vec<CommandNode>,
    head: Option<NodeId>,
}

impl MissionSequence {
    /// An empty sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the linked arena from a parsed statement block.
    pub fn from_block(block: &Block) -> Self {
        let mut seq = Self::new();
        let (head, _open) = seq.link_block(block);
        seq.head = head;
        seq
    }

    /// The first node of the main chain.
    pub fn head(&self) -> Option<NodeId> {
        self.head
    }

    /// Number of nodes in the arena, `End*` nodes included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Borrow a node.
    pub fn node(&self, id: NodeId) -> &CommandNode {
        &self.nodes[id]
    }

    /// Mutably borrow a node.
    pub fn node_mut(&mut self, id: NodeId) -> &mut CommandNode {
        &mut self.nodes[id]
    }

    /// All node ids in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        0..self.nodes.len()
    }

    /// The node executed after `id` on its own chain. For `EndWhile` this
    /// is the owning While node, which re-evaluates its condition; every
    /// other node follows its `next` link.
    pub fn get_next(&self, id: NodeId) -> Option<NodeId> {
        let node = &self.nodes[id];
        match node.kind {
            Kind::EndWhile => node.owner,
            _ => node.next,
        }
    }

    /// The `End*` node closing the construct opened at `id`.
    pub fn end_node_of(&self, id: NodeId) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.kind.is_end() && n.owner == Some(id))
    }

    /// Splice `node` into the chain directly after `after`. Returns false
    /// without inserting when `after` is not reachable from the head.
    /// A construct boundary anchors the splice after the whole construct:
    /// If and Target carry their exit link on both the branch command and
    /// its `End*` node, and the splice moves the pair together. A While
    /// loop's exit link lives on the While node alone, so an `EndWhile`
    /// anchor redirects there.
    pub fn insert_after(&mut self, node: CommandNode, after: NodeId) -> bool {
        if !self.contains(after) {
            return false;
        }
        let mut anchors = vec![after];
        match self.nodes[after].kind {
            Kind::EndWhile => {
                anchors[0] = self.nodes[after].owner.unwrap_or(after);
            }
            Kind::EndIf | Kind::EndTarget => {
                if let Some(owner) = self.nodes[after].owner {
                    anchors.push(owner);
                }
            }
            Kind::If { .. } | Kind::Target { .. } => {
                if let Some(end) = self.end_node_of(after) {
                    anchors.push(end);
                }
            }
            _ => {}
        }
        let id = self.nodes.len();
        let mut node = node;
        node.next = self.nodes[anchors[0]].next;
        self.nodes.push(node);
        for &a in &anchors {
            self.nodes[a].next = Some(id);
        }
        true
    }

    /// Whether `needle` is reachable from the head, branch chains included.
    pub fn contains(&self, needle: NodeId) -> bool {
        let mut cur = self.head;
        while let Some(id) = cur {
            if id == needle {
                return true;
            }
            let n = &self.nodes[id];
            for &b in &n.branches {
                if self.branch_contains(b, id, needle) {
                    return true;
                }
            }
            cur = n.next;
        }
        false
    }

    fn branch_contains(&self, entry: NodeId, owner: NodeId, needle: NodeId) -> bool {
        let mut cur = Some(entry);
        while let Some(id) = cur {
            if id == needle {
                return true;
            }
            let n = &self.nodes[id];
            if n.kind.is_end() && n.owner == Some(owner) {
                return false;
            }
            for &b in &n.branches {
                if self.branch_contains(b, id, needle) {
                    return true;
                }
            }
            cur = n.next;
        }
        false
    }

    /// Propagate an object rename through every node's payload and script
    /// text.
    pub fn rename_object(&mut self, old: &str, new: &str) {
        for node in &mut self.nodes {
            node.kind.rename_object(old, new);
            node.script = rename_in_text(&node.script, old, new);
        }
    }

    /// Regenerate the script for the whole sequence, branch bodies
    /// indented.
    pub fn generating_script(&self) -> String {
        let mut out = String::new();
        self.write_chain(self.head, None, 0, &mut out);
        out
    }

    fn write_chain(
        &self,
        start: Option<NodeId>,
        owner: Option<NodeId>,
        indent: usize,
        out: &mut String,
    ) {
        let pad = "   ".repeat(indent);
        let mut cur = start;
        while let Some(id) = cur {
            let n = &self.nodes[id];
            if n.kind.is_end() {
                if n.owner == owner {
                    // Closing line is written by the construct itself.
                    return;
                }
            }
            match &n.kind {
                Kind::If { .. } => {
                    out.push_str(&pad);
                    out.push_str(&n.script);
                    out.push('\n');
                    if let Some(&then) = n.branches.first() {
                        self.write_chain(Some(then), Some(id), indent + 1, out);
                    }
                    if let Some(&els) = n.branches.get(1) {
                        out.push_str(&pad);
                        out.push_str("Else\n");
                        self.write_chain(Some(els), Some(id), indent + 1, out);
                    }
                    out.push_str(&pad);
                    out.push_str("EndIf\n");
                }
                Kind::While { .. } | Kind::Target { .. } => {
                    out.push_str(&pad);
                    out.push_str(&n.script);
                    out.push('\n');
                    if let Some(&body) = n.branches.first() {
                        self.write_chain(Some(body), Some(id), indent + 1, out);
                    }
                    out.push_str(&pad);
                    out.push_str(match n.kind {
                        Kind::While { .. } => "EndWhile\n",
                        _ => "EndTarget\n",
                    });
                }
                Kind::Verbatim { text } => {
                    out.push_str(&pad);
                    out.push_str("BeginScript\n");
                    out.push_str(text);
                    out.push_str(&pad);
                    out.push_str("EndScript\n");
                }
                _ => {
                    out.push_str(&pad);
                    out.push_str(&n.script);
                    out.push('\n');
                }
            }
            cur = n.next;
        }
    }

    fn alloc(&mut self, node: CommandNode) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn set_next(&mut self, tails: &[NodeId], target: NodeId) {
        for &t in tails {
            self.nodes[t].next = Some(target);
        }
    }

    /// Link a block into the arena. Returns the entry node and the set of
    /// open tails whose `next` the caller must point at the successor.
    fn link_block(&mut self, block: &Block) -> (Option<NodeId>, Vec<NodeId>) {
        let mut head = None;
        let mut open: Vec<NodeId> = Vec::new();
        for stmt in block {
            let (h, tails) = self.link_statement(stmt);
            if head.is_none() {
                head = Some(h);
            }
            self.set_next(&open, h);
            open = tails;
        }
        (head, open)
    }

    fn link_statement(&mut self, stmt: &Statement) -> (NodeId, Vec<NodeId>) {
        match &stmt.kind {
            StmtKind::If {
                condition,
                then_block,
                else_block,
            } => {
                let node = self.alloc(CommandNode::new(
                    Kind::If {
                        condition: condition.clone(),
                        resolved: None,
                    },
                    &stmt.script,
                ));
                let (then_head, then_tails) = self.link_block(then_block);
                let else_linked = else_block.as_ref().map(|b| self.link_block(b));

                let mut end = CommandNode::new(Kind::EndIf, "EndIf");
                end.owner = Some(node);
                let end = self.alloc(end);

                self.set_next(&then_tails, end);
                self.nodes[node].branches.push(then_head.unwrap_or(end));
                if let Some((else_head, else_tails)) = else_linked {
                    self.set_next(&else_tails, end);
                    self.nodes[node].branches.push(else_head.unwrap_or(end));
                }
                (node, vec![node, end])
            }
            StmtKind::While { condition, body } => {
                let node = self.alloc(CommandNode::new(
                    Kind::While {
                        condition: condition.clone(),
                        resolved: None,
                    },
                    &stmt.script,
                ));
                let (body_head, body_tails) = self.link_block(body);

                let mut end = CommandNode::new(Kind::EndWhile, "EndWhile");
                end.owner = Some(node);
                let end = self.alloc(end);

                self.set_next(&body_tails, end);
                self.nodes[node].branches.push(body_head.unwrap_or(end));
                // The loop exit is the While node's own next link; EndWhile
                // always routes back to the While.
                (node, vec![node])
            }
            StmtKind::Target { solver, body } => {
                let node = self.alloc(CommandNode::new(
                    Kind::Target {
                        solver: solver.clone(),
                    },
                    &stmt.script,
                ));
                let (body_head, body_tails) = self.link_block(body);

                let mut end = CommandNode::new(Kind::EndTarget, "EndTarget");
                end.owner = Some(node);
                let end = self.alloc(end);

                self.set_next(&body_tails, end);
                self.nodes[node].branches.push(body_head.unwrap_or(end));
                (node, vec![node, end])
            }
            simple => {
                let kind = match simple {
                    StmtKind::Create { type_name, names } => Kind::Create {
                        type_name: type_name.clone(),
                        names: names.clone(),
                    },
                    StmtKind::Assignment { target, expr } => Kind::Assignment {
                        target_desc: target.clone(),
                        expr: expr.clone(),
                        target: None,
                        tree: None,
                    },
                    StmtKind::Vary {
                        solver,
                        variable,
                        initial,
                    } => Kind::Vary {
                        solver: solver.clone(),
                        variable_desc: variable.clone(),
                        initial: initial.clone(),
                        variable: None,
                        initial_tree: None,
                    },
                    StmtKind::Achieve {
                        solver,
                        goal,
                        value,
                        tolerance,
                    } => Kind::Achieve {
                        solver: solver.clone(),
                        goal_desc: goal.clone(),
                        value: value.clone(),
                        tolerance: *tolerance,
                        goal: None,
                        value_tree: None,
                    },
                    StmtKind::Propagate {
                        propagator,
                        spacecraft,
                        stop_ref,
                        stop_value,
                    } => Kind::Propagate {
                        propagator: propagator.clone(),
                        spacecraft: spacecraft.clone(),
                        stop_desc: stop_ref.clone(),
                        stop_value: stop_value.clone(),
                        stop: None,
                        stop_tree: None,
                    },
                    StmtKind::Maneuver { burn, spacecraft } => Kind::Maneuver {
                        burn: burn.clone(),
                        spacecraft: spacecraft.clone(),
                    },
                    StmtKind::Report { file, items } => Kind::Report {
                        file: file.clone(),
                        item_descs: items.clone(),
                        items: Vec::new(),
                    },
                    StmtKind::PlotCommand { plot, action } => Kind::PlotCommand {
                        plot: plot.clone(),
                        action: *action,
                    },
                    StmtKind::Stop => Kind::Stop,
                    StmtKind::Verbatim { text } => Kind::Verbatim { text: text.clone() },
                    // Branch constructs are handled above.
                    _ => unreachable!("branch statement reached simple linking"),
                };
                let id = self.alloc(CommandNode::new(kind, &stmt.script));
                (id, vec![id])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parser::parse_script;

    fn seq_of(src: &str) -> MissionSequence {
        MissionSequence::from_block(&parse_script(src).unwrap())
    }

    #[test]
    fn flat_chain_links_in_order() {
        let seq = seq_of("Create Variable v\nv = 1\nStop\n");
        let a = seq.head().unwrap();
        let b = seq.get_next(a).unwrap();
        let c = seq.get_next(b).unwrap();
        assert_eq!(seq.node(c).kind, CommandKind::Stop);
        assert_eq!(seq.get_next(c), None);
    }

    #[test]
    fn if_construct_routes_both_arms_to_the_successor() {
        let seq = seq_of("If v > 1\n   v = 2\nElse\n   v = 3\nEndIf\nStop\n");
        let if_id = seq.head().unwrap();
        let node = seq.node(if_id);
        assert_eq!(node.branches.len(), 2);
        let end = seq.end_node_of(if_id).unwrap();
        // Both arms drain into EndIf, and EndIf continues past the
        // construct.
        let then_tail = seq.get_next(node.branches[0]).unwrap();
        let else_tail = seq.get_next(node.branches[1]).unwrap();
        assert_eq!(then_tail, end);
        assert_eq!(else_tail, end);
        let after = seq.get_next(end).unwrap();
        assert_eq!(seq.node(after).kind, CommandKind::Stop);
        assert_eq!(seq.get_next(if_id), Some(after));
    }

    #[test]
    fn endwhile_routes_back_to_its_while() {
        let seq = seq_of("While v < 3\n   v = v + 1\nEndWhile\nStop\n");
        let w = seq.head().unwrap();
        let body = seq.node(w).branches[0];
        let end = seq.get_next(body).unwrap();
        assert_eq!(seq.node(end).kind, CommandKind::EndWhile);
        assert_eq!(seq.get_next(end), Some(w));
        // Loop exit comes from the While node itself.
        let after = seq.get_next(w).unwrap();
        assert_eq!(seq.node(after).kind, CommandKind::Stop);
    }

    #[test]
    fn insert_after_splices_inside_a_branch() {
        let mut seq = seq_of("If v > 1\n   v = 2\nEndIf\n");
        let if_id = seq.head().unwrap();
        let body = seq.node(if_id).branches[0];
        let ok = seq.insert_after(CommandNode::new(CommandKind::Stop, "Stop"), body);
        assert!(ok);
        let spliced = seq.get_next(body).unwrap();
        assert_eq!(seq.node(spliced).kind, CommandKind::Stop);
        assert_eq!(seq.get_next(spliced), seq.end_node_of(if_id));
    }

    #[test]
    fn insert_after_an_endif_moves_both_exit_links() {
        let mut seq = seq_of("If v > 1\n   v = 2\nElse\n   v = 3\nEndIf\nStop\n");
        let if_id = seq.head().unwrap();
        let end = seq.end_node_of(if_id).unwrap();
        assert!(seq.insert_after(CommandNode::new(CommandKind::Stop, "Stop"), end));
        let spliced = seq.get_next(end).unwrap();
        assert_eq!(seq.node(spliced).kind, CommandKind::Stop);
        // The If's own exit link moved with the EndIf's, so both arms of
        // the condition reach the spliced node.
        assert_eq!(seq.node(if_id).next, Some(spliced));
    }

    #[test]
    fn insert_after_the_if_node_lands_past_the_construct() {
        let mut seq = seq_of("If v > 1\n   v = 2\nEndIf\nStop\n");
        let if_id = seq.head().unwrap();
        let end = seq.end_node_of(if_id).unwrap();
        assert!(seq.insert_after(CommandNode::new(CommandKind::Stop, "Stop"), if_id));
        let spliced = seq.node(if_id).next.unwrap();
        assert_eq!(seq.node(spliced).kind, CommandKind::Stop);
        assert_eq!(seq.node(end).next, Some(spliced));
        // The false arm still drains into the EndIf, not the new node.
        assert_eq!(seq.node(if_id).branches.len(), 1);
    }

    #[test]
    fn insert_after_an_endtarget_moves_the_target_exit() {
        let mut seq = seq_of("Target DC\n   v = 1\nEndTarget\nStop\n");
        let target = seq.head().unwrap();
        let end = seq.end_node_of(target).unwrap();
        assert!(seq.insert_after(CommandNode::new(CommandKind::Stop, "Stop"), end));
        let spliced = seq.node(end).next.unwrap();
        assert_eq!(seq.node(spliced).kind, CommandKind::Stop);
        // The executor leaves a Target construct through the Target node's
        // own next link; it must agree with the EndTarget's.
        assert_eq!(seq.node(target).next, Some(spliced));
    }

    #[test]
    fn insert_after_rejects_unreachable_anchor() {
        let mut seq = seq_of("Stop\n");
        assert!(!seq.insert_after(CommandNode::new(CommandKind::Stop, "Stop"), 5));
    }

    #[test]
    fn rename_rewrites_payloads_and_script_text() {
        let mut seq = seq_of("Sat1.X = Sat1.X + 1\n");
        seq.rename_object("Sat1", "SatB");
        let node = seq.node(seq.head().unwrap());
        assert_eq!(node.script, "SatB.X = SatB.X + 1");
        match &node.kind {
            CommandKind::Assignment { target_desc, .. } => {
                assert_eq!(target_desc, "SatB.X")
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn generating_script_round_trips_structure() {
        let src = "Create Spacecraft Sat1\nWhile Sat1.X < 3\n   Sat1.X = Sat1.X + 1\nEndWhile\n";
        let seq = seq_of(src);
        let out = seq.generating_script();
        assert!(out.contains("While Sat1.X < 3"));
        assert!(out.contains("EndWhile"));
        // Regenerated text parses back to the same shape.
        let again = MissionSequence::from_block(&parse_script(&out).unwrap());
        assert_eq!(again.len(), seq.len());
    }
}
