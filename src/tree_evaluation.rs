//! Evaluates built expression trees against a mutable variable environment,
//! resolving environment entries lazily on first use.

use std::collections::HashMap;

use crate::lexical_analysis::Token;
use crate::tree_building::{build_tree, BuildError, ExprTree, NodeIdx, NodeValue, OpKind};

/// Default ceiling on evaluation recursion depth. Nesting and environment
/// reference chains both count against it; a self-referential definition
/// would otherwise recurse without bound.
pub const DEFAULT_RECURSION_LIMIT: usize = 1024;

/// A variable binding. A fresh assignment stores the raw right-hand-side
/// tokens; the first lookup builds the tree and the entry stays resolved
/// until the name is reassigned.
#[derive(Debug, PartialEq, Clone)]
pub enum EnvEntry {
    Raw(Vec<Token>),
    Resolved(ExprTree),
}

/// The variable environment: a map from name to its current definition.
#[derive(Debug, Default)]
pub struct Environment {
    entries: HashMap<String, EnvEntry>,
}

/// Represents an environment lookup error.
#[derive(Debug, PartialEq)]
pub enum LookupError {
    Undefined {
        var_name: String,
    },
    ResolutionFailed {
        var_name: String,
        build_error: BuildError,
    },
}

/// Display trait implementation for LookupError.
impl std::fmt::Display for LookupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Undefined { var_name } => {
                return write!(f, "env[{}] unset.", var_name);
            }

            Self::ResolutionFailed {
                var_name,
                build_error,
            } => {
                return write!(f, "Unable to build env[{}]: {}", var_name, build_error);
            }
        }
    }
}

impl Environment {
    /// Creates an empty environment.
    pub fn new() -> Environment {
        return Environment {
            entries: HashMap::new(),
        };
    }

    /// Unconditionally binds `name` to a raw entry holding `raw_tokens`.
    /// Reassignment replaces the whole entry; any previously resolved tree
    /// for the name is dropped.
    pub fn assign(&mut self, name: &str, raw_tokens: Vec<Token>) {
        self.entries
            .insert(String::from(name), EnvEntry::Raw(raw_tokens));
    }

    /// Looks up `name`, building its tree first if the entry is still raw.
    /// The raw-to-resolved transition happens at most once per assignment:
    /// repeat lookups reuse the stored tree.
    ///
    /// Returns a clone of the resolved tree. The caller keeps evaluating with
    /// mutable access to the environment, so a borrow of the entry cannot be
    /// handed out; cloning also means a mid-evaluation reassignment of the
    /// same name cannot pull the tree out from under the evaluator.
    pub fn get_or_parse(&mut self, name: &str) -> Result<ExprTree, LookupError> {
        let entry = match self.entries.get_mut(name) {
            Some(entry) => entry,
            None => {
                return Err(LookupError::Undefined {
                    var_name: String::from(name),
                })
            }
        };

        match entry {
            EnvEntry::Resolved(tree) => {
                return Ok(tree.clone());
            }

            EnvEntry::Raw(raw_tokens) => {
                let tree = match build_tree(raw_tokens.clone()) {
                    Ok(tree) => tree,
                    Err(build_error) => {
                        return Err(LookupError::ResolutionFailed {
                            var_name: String::from(name),
                            build_error,
                        })
                    }
                };

                *entry = EnvEntry::Resolved(tree.clone());
                return Ok(tree);
            }
        };
    }

    // Whether any binding exists for `name`.
    #[cfg(test)]
    fn contains(&self, name: &str) -> bool {
        return self.entries.contains_key(name);
    }
}

/// Display trait implementation for Environment: entries sorted by name,
/// resolved ones rendered as trees, raw ones as their pending token texts.
impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.entries.keys().collect();
        names.sort();

        let mut rendered_entries = Vec::new();
        for name in names {
            match &self.entries[name] {
                EnvEntry::Resolved(tree) => {
                    rendered_entries.push(format!("{}: {}", name, tree));
                }

                EnvEntry::Raw(raw_tokens) => {
                    let token_texts = raw_tokens
                        .iter()
                        .map(|t| t.token_text.as_str())
                        .collect::<Vec<_>>()
                        .join(" ");
                    rendered_entries.push(format!("{}: raw[{}]", name, token_texts));
                }
            };
        }

        return write!(f, "{{{}}}", rendered_entries.join(", "));
    }
}

/// Represents an evaluation error.
#[derive(Debug, PartialEq)]
pub enum EvalError {
    AssignmentNotAtRoot,
    MalformedAssignment,
    MissingOperand,
    UndefinedVariable {
        var_name: String,
    },
    DefinitionBuildFailed {
        var_name: String,
        build_error: BuildError,
    },
    RecursionLimitExceeded {
        limit: usize,
    },
    InvariantViolation {
        details: String,
    },
}

/// Display trait implementation for EvalError.
impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AssignmentNotAtRoot => {
                return write!(f, "Assignment on non-root node.");
            }

            Self::MalformedAssignment => {
                return write!(f, "Assignment is missing its target or body.");
            }

            Self::MissingOperand => {
                return write!(f, "Not enough operands.");
            }

            Self::UndefinedVariable { var_name } => {
                return write!(f, "env[{}] unset.", var_name);
            }

            Self::DefinitionBuildFailed {
                var_name,
                build_error,
            } => {
                return write!(f, "Unable to build env[{}]: {}", var_name, build_error);
            }

            Self::RecursionLimitExceeded { limit } => {
                return write!(f, "Evaluation exceeded recursion limit {}.", limit);
            }

            Self::InvariantViolation { details } => {
                return write!(f, "Evaluated tree violates a build invariant: {}", details);
            }
        }
    }
}

/// Type conversion from lookup errors.
impl From<LookupError> for EvalError {
    fn from(value: LookupError) -> Self {
        match value {
            LookupError::Undefined { var_name } => {
                return Self::UndefinedVariable { var_name };
            }

            LookupError::ResolutionFailed {
                var_name,
                build_error,
            } => {
                return Self::DefinitionBuildFailed {
                    var_name,
                    build_error,
                };
            }
        };
    }
}

/// Evaluates a tree with the default recursion limit.
pub fn evaluate(tree: &ExprTree, env: &mut Environment) -> Result<f64, EvalError> {
    return evaluate_with_limit(tree, env, DEFAULT_RECURSION_LIMIT);
}

/// Evaluates a tree, failing with `RecursionLimitExceeded` once nesting plus
/// environment reference chains exceed `recursion_limit` levels.
pub fn evaluate_with_limit(
    tree: &ExprTree,
    env: &mut Environment,
    recursion_limit: usize,
) -> Result<f64, EvalError> {
    return eval_node(tree, tree.root(), env, 0, recursion_limit);
}

// Evaluates the subtree rooted at `idx`. `depth` grows by one per tree level
// and per hop into an environment-resolved tree.
fn eval_node(
    tree: &ExprTree,
    idx: NodeIdx,
    env: &mut Environment,
    depth: usize,
    recursion_limit: usize,
) -> Result<f64, EvalError> {
    if depth > recursion_limit {
        return Err(EvalError::RecursionLimitExceeded {
            limit: recursion_limit,
        });
    }

    let node = tree.node(idx);

    match &node.value {
        NodeValue::Operator(OpKind::Assign) => {
            if idx != tree.root() {
                return Err(EvalError::AssignmentNotAtRoot);
            }

            let left_idx = match node.left {
                Some(left_idx) => left_idx,
                None => return Err(EvalError::MissingOperand),
            };
            if node.right.is_none() {
                return Err(EvalError::MissingOperand);
            }

            // The tree's token vector must at least be "( name = rhs )"; the
            // right-hand side is that vector minus the first three tokens and
            // the last one.
            let tokens = tree.tokens();
            if tokens.len() < 5 {
                return Err(EvalError::MalformedAssignment);
            }

            let var_name = match &tree.node(left_idx).value {
                NodeValue::Leaf(text) => text.clone(),
                _ => return Err(EvalError::MalformedAssignment),
            };

            let rhs_tokens = tokens[3..tokens.len() - 1].to_vec();
            env.assign(var_name.as_str(), rhs_tokens);

            let resolved = env.get_or_parse(var_name.as_str())?;
            return eval_node(&resolved, resolved.root(), env, depth + 1, recursion_limit);
        }

        NodeValue::Operator(op_kind) => {
            let left_idx = match node.left {
                Some(left_idx) => left_idx,
                None => return Err(EvalError::MissingOperand),
            };
            let right_idx = match node.right {
                Some(right_idx) => right_idx,
                None => return Err(EvalError::MissingOperand),
            };

            let left_value = eval_node(tree, left_idx, env, depth + 1, recursion_limit)?;
            let right_value = eval_node(tree, right_idx, env, depth + 1, recursion_limit)?;

            // Division by zero is deliberately not special-cased: it follows
            // IEEE-754 and yields an infinity or NaN.
            match op_kind {
                OpKind::Add => return Ok(left_value + right_value),
                OpKind::Sub => return Ok(left_value - right_value),
                OpKind::Mul => return Ok(left_value * right_value),
                OpKind::Div => return Ok(left_value / right_value),
                OpKind::Assign => {
                    return Err(EvalError::InvariantViolation {
                        details: String::from("assignment reached the arithmetic arm"),
                    })
                }
            };
        }

        NodeValue::Leaf(text) => {
            if node.left.is_some() || node.right.is_some() {
                return Err(EvalError::InvariantViolation {
                    details: format!("leaf node '{}' has children", text),
                });
            }

            // A leaf that parses as a number is that number; anything else is
            // a variable reference resolved through the environment.
            if let Ok(value) = text.parse::<f64>() {
                return Ok(value);
            }

            let resolved = env.get_or_parse(text.as_str())?;
            return eval_node(&resolved, resolved.root(), env, depth + 1, recursion_limit);
        }

        NodeValue::Empty => {
            return Err(EvalError::InvariantViolation {
                details: String::from("node has no value"),
            });
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexical_analysis::tokenize;

    // Lexes, builds, and evaluates one line against the given environment.
    fn eval_text(text: &str, env: &mut Environment) -> Result<f64, EvalError> {
        let tokens = tokenize(text).expect("tokenize returned unexpected error");
        let tree = build_tree(tokens).expect("build_tree returned unexpected error");
        return evaluate(&tree, env);
    }

    // Test that plain arithmetic over literals evaluates to the standard
    // value.
    #[test]
    fn test_evaluate_arithmetic() {
        let mut env = Environment::new();

        assert_eq!(eval_text("(1+(2*3))", &mut env), Ok(7.0));
        assert_eq!(eval_text("((10-4)/3)", &mut env), Ok(2.0));
        assert_eq!(eval_text("(2.5*4)", &mut env), Ok(10.0));
        assert_eq!(eval_text("7", &mut env), Ok(7.0));
    }

    // Test that division by zero yields an IEEE-754 infinity, not an error.
    #[test]
    fn test_evaluate_division_by_zero() {
        let mut env = Environment::new();

        assert_eq!(eval_text("(1/0)", &mut env), Ok(f64::INFINITY));
        assert_eq!(eval_text("((0-1)/0)", &mut env), Ok(f64::NEG_INFINITY));
    }

    // Test that assignment stores a binding and returns the right-hand
    // side's value.
    #[test]
    fn test_evaluate_assignment_returns_rhs_value() {
        let mut env = Environment::new();

        assert_eq!(eval_text("(n=2)", &mut env), Ok(2.0));
        assert!(env.contains("n"));
    }

    // Test that a reference after assignment resolves to the assigned value.
    #[test]
    fn test_evaluate_assignment_then_reference() {
        let mut env = Environment::new();

        assert_eq!(eval_text("(n=2)", &mut env), Ok(2.0));
        assert_eq!(eval_text("(1+n)", &mut env), Ok(3.0));
    }

    // Test that reassignment overwrites the previous binding.
    #[test]
    fn test_evaluate_reassignment_overwrites() {
        let mut env = Environment::new();

        assert_eq!(eval_text("(n=2)", &mut env), Ok(2.0));
        assert_eq!(eval_text("(n=5)", &mut env), Ok(5.0));
        assert_eq!(eval_text("(1+n)", &mut env), Ok(6.0));
    }

    // Test that an assignment body may reference earlier bindings.
    #[test]
    fn test_evaluate_assignment_body_references_environment() {
        let mut env = Environment::new();

        assert_eq!(eval_text("(n=2)", &mut env), Ok(2.0));
        assert_eq!(eval_text("(a=(4*n))", &mut env), Ok(8.0));
        assert_eq!(eval_text("(a+1)", &mut env), Ok(9.0));
    }

    // Test that an assignment whose target is not a plain name is rejected.
    #[test]
    fn test_evaluate_assignment_target_must_be_leaf() {
        let mut env = Environment::new();

        assert_eq!(
            eval_text("((1+2)=5)", &mut env),
            Err(EvalError::MalformedAssignment)
        );
    }

    // Test that an assignment body may itself be an assignment: the stored
    // slice "( b = 2 )" re-parses into an assignment-rooted tree, which is
    // legal at the root of its own evaluation.
    #[test]
    fn test_evaluate_assignment_of_assignment() {
        let mut env = Environment::new();

        assert_eq!(eval_text("(a=(b=2))", &mut env), Ok(2.0));
        assert_eq!(eval_text("(b+1)", &mut env), Ok(3.0));
    }

    // Test that resolution is memoized: after the first reference the entry
    // is stored as a built tree, and repeat references still evaluate.
    #[test]
    fn test_environment_resolution_is_memoized() {
        let mut env = Environment::new();

        assert_eq!(eval_text("(n=(2*3))", &mut env), Ok(6.0));

        let first = env.get_or_parse("n").expect("get_or_parse failed");
        let second = env.get_or_parse("n").expect("get_or_parse failed");
        assert_eq!(first, second);
        assert!(matches!(env.entries["n"], EnvEntry::Resolved(_)));

        assert_eq!(eval_text("(n+n)", &mut env), Ok(12.0));
    }

    // Test that referencing an unassigned variable fails.
    #[test]
    fn test_evaluate_undefined_variable() {
        let mut env = Environment::new();

        assert_eq!(
            eval_text("(1+z)", &mut env),
            Err(EvalError::UndefinedVariable {
                var_name: String::from("z")
            })
        );
    }

    // Test that an assignment node below the root is rejected.
    #[test]
    fn test_evaluate_assignment_not_at_root() {
        let mut env = Environment::new();

        assert_eq!(
            eval_text("(1+(z=2))", &mut env),
            Err(EvalError::AssignmentNotAtRoot)
        );
        // The failed line must not have bound anything.
        assert!(!env.contains("z"));
    }

    // Test that a failed line leaves earlier bindings intact.
    #[test]
    fn test_failed_line_preserves_prior_bindings() {
        let mut env = Environment::new();

        assert_eq!(eval_text("(n=2)", &mut env), Ok(2.0));
        assert!(eval_text("(1+z)", &mut env).is_err());
        assert_eq!(eval_text("(n+1)", &mut env), Ok(3.0));
    }

    // Test that a self-referential definition hits the recursion ceiling
    // instead of exhausting the call stack.
    #[test]
    fn test_evaluate_self_reference_hits_recursion_limit() {
        let mut env = Environment::new();

        let tokens = tokenize("(x=(x+1))").expect("tokenize returned unexpected error");
        let tree = build_tree(tokens).expect("build_tree returned unexpected error");

        assert_eq!(
            evaluate_with_limit(&tree, &mut env, 32),
            Err(EvalError::RecursionLimitExceeded { limit: 32 })
        );
    }

    // Test that chained (non-cyclic) variable references resolve through the
    // environment.
    #[test]
    fn test_evaluate_chained_references() {
        let mut env = Environment::new();

        assert_eq!(eval_text("(a=1)", &mut env), Ok(1.0));
        assert_eq!(eval_text("(b=(a+1))", &mut env), Ok(2.0));
        assert_eq!(eval_text("(c=(b+1))", &mut env), Ok(3.0));
        assert_eq!(eval_text("(c*2)", &mut env), Ok(6.0));
    }

    // Test that lookups of names that were never assigned report Undefined
    // straight from the environment.
    #[test]
    fn test_get_or_parse_undefined() {
        let mut env = Environment::new();

        assert_eq!(
            env.get_or_parse("ghost"),
            Err(LookupError::Undefined {
                var_name: String::from("ghost")
            })
        );
    }

    // Test the environment dump used by the interactive loop.
    #[test]
    fn test_environment_display() {
        let mut env = Environment::new();

        assert_eq!(eval_text("(n=2)", &mut env), Ok(2.0));
        assert_eq!(eval_text("(a=(4*n))", &mut env), Ok(8.0));

        assert_eq!(
            format!("{}", env),
            "{a: Prod(Num(4.000000),Var(n)), n: Num(2.000000)}"
        );
    }
}
