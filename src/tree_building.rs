//! Arena-based binary expression trees and the cursor walk that builds them
//! from a vector of tokens.

use crate::lexical_analysis::{Token, TokenClass};

/// Index of a node inside an `ExprTree` arena.
pub type NodeIdx = usize;

/// The five operators an interior node can hold.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum OpKind {
    Add,
    Sub,
    Mul,
    Div,
    Assign,
}

/// What a node holds. A node starts `Empty` and is filled in as tokens are
/// consumed; a finished tree contains no `Empty` values.
#[derive(Debug, PartialEq, Clone)]
pub enum NodeValue {
    Empty,
    Operator(OpKind),
    Leaf(String),
}

/// A single node of the expression tree. `left`/`right` are owning edges into
/// the arena; `parent` is a back-reference used only to ascend during the
/// build.
#[derive(Debug, PartialEq, Clone)]
pub struct ExprNode {
    pub value: NodeValue,
    pub left: Option<NodeIdx>,
    pub right: Option<NodeIdx>,
    pub parent: Option<NodeIdx>,
}

/// A built expression tree. The arena owns every node; node 0 is the root.
/// The tree also keeps the token vector it was built from, which the
/// evaluator slices to store assignment bodies in the environment.
#[derive(Debug, PartialEq, Clone)]
pub struct ExprTree {
    nodes: Vec<ExprNode>,
    tokens: Vec<Token>,
}

/// Represents a tree building error. Variants triggered by a specific token
/// carry that token's index in the input vector.
#[derive(Debug, PartialEq, Eq)]
pub enum BuildError {
    UnbalancedParens { pos: Option<usize> },
    IncompleteTree,
    NodeFull { pos: usize },
    MissingLeftOperand { pos: usize },
    OperatorAlreadySet { pos: usize },
    UnexpectedOperator { pos: usize },
    UnexpectedValue { pos: usize },
    OperandAlreadySet { pos: usize },
}

/// Display trait implementation for BuildError.
impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnbalancedParens { pos: Some(pos) } => {
                return write!(f, "Unmatched ')' at token position {}.", pos);
            }

            Self::UnbalancedParens { pos: None } => {
                return write!(f, "Non matching parens at end of input.");
            }

            Self::IncompleteTree => {
                return write!(f, "Tree has nodes with unset values after build.");
            }

            Self::NodeFull { pos } => {
                return write!(f, "Node already has two children at token position {}.", pos);
            }

            Self::MissingLeftOperand { pos } => {
                return write!(f, "Empty left operand for operator at token position {}.", pos);
            }

            Self::OperatorAlreadySet { pos } => {
                return write!(f, "Operator already set at token position {}.", pos);
            }

            Self::UnexpectedOperator { pos } => {
                return write!(
                    f,
                    "Operator at outermost tree position at token position {}.",
                    pos
                );
            }

            Self::UnexpectedValue { pos } => {
                return write!(f, "Value on a non-leaf node at token position {}.", pos);
            }

            Self::OperandAlreadySet { pos } => {
                return write!(f, "Operand already set at token position {}.", pos);
            }
        }
    }
}

impl ExprTree {
    // Creates a tree holding only an empty root node and the tokens it will
    // be built from.
    fn new(tokens: Vec<Token>) -> ExprTree {
        return ExprTree {
            nodes: vec![ExprNode {
                value: NodeValue::Empty,
                left: None,
                right: None,
                parent: None,
            }],
            tokens,
        };
    }

    /// Index of the root node.
    pub fn root(&self) -> NodeIdx {
        return 0;
    }

    /// Immutable access to a node by index.
    pub fn node(&self, idx: NodeIdx) -> &ExprNode {
        return &self.nodes[idx];
    }

    /// The token vector this tree was built from.
    pub fn tokens(&self) -> &Vec<Token> {
        return &self.tokens;
    }

    // Appends a fresh empty child under `parent`, filling the left slot
    // first, then the right. Returns None if both slots are occupied.
    fn insert_empty_child(&mut self, parent: NodeIdx) -> Option<NodeIdx> {
        if self.nodes[parent].left.is_some() && self.nodes[parent].right.is_some() {
            return None;
        }

        self.nodes.push(ExprNode {
            value: NodeValue::Empty,
            left: None,
            right: None,
            parent: Some(parent),
        });
        let child_idx = self.nodes.len() - 1;

        if self.nodes[parent].left.is_none() {
            self.nodes[parent].left = Some(child_idx);
        } else {
            self.nodes[parent].right = Some(child_idx);
        }

        return Some(child_idx);
    }

    // Reports whether any node reachable from `idx` still has an empty value.
    fn contains_empty_value(&self, idx: NodeIdx) -> bool {
        let node = &self.nodes[idx];

        if node.value == NodeValue::Empty {
            return true;
        }
        if let Some(left_idx) = node.left {
            if self.contains_empty_value(left_idx) {
                return true;
            }
        }
        if let Some(right_idx) = node.right {
            if self.contains_empty_value(right_idx) {
                return true;
            }
        }

        return false;
    }
}

/// Builds an expression tree from a vector of tokens.
///
/// A cursor starts at the empty root and walks the tree as tokens are
/// consumed: `(` descends into a fresh child, `)` ascends to the parent,
/// an operator claims the cursor's parent and descends into a fresh right
/// child, and a literal fills the cursor in place. Two checks run after all
/// tokens are consumed: the open-paren counter must be zero and no reachable
/// node may still hold an empty value.
pub fn build_tree(tokens: Vec<Token>) -> Result<ExprTree, BuildError> {
    let mut tree = ExprTree::new(tokens);
    let mut cursor = tree.root();
    let mut open_parens: i64 = 0;

    for pos in 0..tree.tokens.len() {
        let token_class = tree.tokens[pos].token_class;

        match token_class {
            TokenClass::LParen => {
                cursor = match tree.insert_empty_child(cursor) {
                    Some(child_idx) => child_idx,
                    None => return Err(BuildError::NodeFull { pos }),
                };
                open_parens += 1;
            }

            TokenClass::RParen => {
                match tree.nodes[cursor].parent {
                    Some(parent_idx) => {
                        cursor = parent_idx;
                    }

                    // A ')' with the cursor already at the root is allowed
                    // only when the root holds '=': assignment bodies sliced
                    // out of a larger token vector lack their own wrapping
                    // parens. Anything else is an unmatched ')'.
                    None => {
                        if tree.nodes[cursor].value != NodeValue::Operator(OpKind::Assign) {
                            return Err(BuildError::UnbalancedParens { pos: Some(pos) });
                        }
                    }
                };
                open_parens -= 1;
            }

            TokenClass::Plus
            | TokenClass::Minus
            | TokenClass::Star
            | TokenClass::Slash
            | TokenClass::Assign => {
                let op_kind = match token_class {
                    TokenClass::Plus => OpKind::Add,
                    TokenClass::Minus => OpKind::Sub,
                    TokenClass::Star => OpKind::Mul,
                    TokenClass::Slash => OpKind::Div,
                    _ => OpKind::Assign,
                };

                let parent_idx = match tree.nodes[cursor].parent {
                    Some(parent_idx) => parent_idx,
                    None => return Err(BuildError::UnexpectedOperator { pos }),
                };
                cursor = parent_idx;

                if tree.nodes[cursor].left.is_none() {
                    return Err(BuildError::MissingLeftOperand { pos });
                }
                if tree.nodes[cursor].value != NodeValue::Empty {
                    return Err(BuildError::OperatorAlreadySet { pos });
                }

                tree.nodes[cursor].value = NodeValue::Operator(op_kind);

                cursor = match tree.insert_empty_child(cursor) {
                    Some(child_idx) => child_idx,
                    None => return Err(BuildError::NodeFull { pos }),
                };
            }

            TokenClass::Literal => {
                if tree.nodes[cursor].left.is_some() || tree.nodes[cursor].right.is_some() {
                    return Err(BuildError::UnexpectedValue { pos });
                }
                if tree.nodes[cursor].value != NodeValue::Empty {
                    return Err(BuildError::OperandAlreadySet { pos });
                }

                tree.nodes[cursor].value = NodeValue::Leaf(tree.tokens[pos].token_text.clone());
            }

            // The lexer discards whitespace; tolerate it anyway.
            TokenClass::Whitespace => {}
        };
    }

    if open_parens != 0 {
        return Err(BuildError::UnbalancedParens { pos: None });
    }
    if tree.contains_empty_value(tree.root()) {
        return Err(BuildError::IncompleteTree);
    }

    return Ok(tree);
}

// Helper function to render the subtree under `idx` into `string_so_far`.
fn node_to_string_helper(tree: &ExprTree, idx: NodeIdx, string_so_far: &mut String) {
    let node = tree.node(idx);

    match &node.value {
        NodeValue::Operator(op_kind) => {
            let op_name = match op_kind {
                OpKind::Add => "Sum",
                OpKind::Sub => "Diff",
                OpKind::Mul => "Prod",
                OpKind::Div => "Quot",
                OpKind::Assign => "Assign",
            };
            string_so_far.push_str(op_name);
            string_so_far.push('(');

            if let Some(left_idx) = node.left {
                node_to_string_helper(tree, left_idx, string_so_far);
            }
            string_so_far.push(',');
            if let Some(right_idx) = node.right {
                node_to_string_helper(tree, right_idx, string_so_far);
            }

            string_so_far.push(')');
        }

        // A leaf renders as Num if its text parses as a float, Var otherwise.
        NodeValue::Leaf(text) => {
            match text.parse::<f64>() {
                Ok(value) => {
                    string_so_far.push_str(format!("Num({:.6})", value).as_str());
                }
                Err(_) => {
                    string_so_far.push_str(format!("Var({})", text).as_str());
                }
            };
        }

        NodeValue::Empty => {
            string_so_far.push_str("Empty()");
        }
    };
}

/// Display trait implementation for ExprTree.
impl std::fmt::Display for ExprTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out_string = String::new();
        node_to_string_helper(self, self.root(), &mut out_string);
        return write!(f, "{}", out_string);
    }
}
