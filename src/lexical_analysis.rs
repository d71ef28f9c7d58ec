//! Lexer that splits a line of arithmetic text into tokens.

use lazy_static::lazy_static;
use regex::Regex;

/// The different classes of tokens that compose an expression.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum TokenClass {
    LParen,
    RParen,
    Plus,
    Minus,
    Star,
    Slash,
    Assign,
    Literal,
    Whitespace,
}

/// Represents a single token of an expression. Numbers and identifiers are
/// both `Literal`; they are told apart at evaluation time by attempting a
/// float parse.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Token {
    pub token_class: TokenClass,
    pub token_text: String,
}

/// Represents a lexing error. The token rules together consume every possible
/// character, so this can only fire if the scanner stops making progress.
#[derive(Debug, PartialEq, Eq)]
pub enum TokenizeError {
    ScanStalled { offset: usize },
}

/// Display trait implementation for TokenizeError.
impl std::fmt::Display for TokenizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ScanStalled { offset } => {
                return write!(f, "Lexer made no progress at byte offset {}.", offset);
            }
        }
    }
}

// Represents how to recognize a token class.
#[derive(Debug)]
struct TokenRule {
    token_class: TokenClass,
    regex: Regex,
}

// Vector of regex patterns that correspond to each token class. Every rule is
// anchored at the start of the remaining input. A literal is a maximal run of
// characters that are neither whitespace nor one of the seven symbols.
lazy_static! {
    static ref TOKEN_RULES: Vec<TokenRule> = vec![
        TokenRule {
            token_class: TokenClass::LParen,
            regex: Regex::new(r"^\(").expect("Unable to compile LParen rule regex."),
        },
        TokenRule {
            token_class: TokenClass::RParen,
            regex: Regex::new(r"^\)").expect("Unable to compile RParen rule regex."),
        },
        TokenRule {
            token_class: TokenClass::Plus,
            regex: Regex::new(r"^\+").expect("Unable to compile Plus rule regex."),
        },
        TokenRule {
            token_class: TokenClass::Minus,
            regex: Regex::new(r"^-").expect("Unable to compile Minus rule regex."),
        },
        TokenRule {
            token_class: TokenClass::Star,
            regex: Regex::new(r"^\*").expect("Unable to compile Star rule regex."),
        },
        TokenRule {
            token_class: TokenClass::Slash,
            regex: Regex::new(r"^/").expect("Unable to compile Slash rule regex."),
        },
        TokenRule {
            token_class: TokenClass::Assign,
            regex: Regex::new(r"^=").expect("Unable to compile Assign rule regex."),
        },
        TokenRule {
            token_class: TokenClass::Whitespace,
            regex: Regex::new(r"^\s+").expect("Unable to compile Whitespace rule regex."),
        },
        TokenRule {
            token_class: TokenClass::Literal,
            regex: Regex::new(r"^[^()+\-*/=\s]+").expect("Unable to compile Literal rule regex."),
        },
    ];
}

// Finds the rule that matches at the start of the input string, along with
// how many bytes it matched.
fn get_matching_rule(input_str: &str) -> Option<(&'static TokenRule, usize)> {
    for token_rule in TOKEN_RULES.iter() {
        if let Some(match_obj) = token_rule.regex.find(input_str) {
            return Some((token_rule, match_obj.end()));
        }
    }

    return None;
}

/// Given a line of text, returns the vector of tokens that comprise it.
/// Whitespace delimits literals but produces no token of its own.
pub fn tokenize(text: &str) -> Result<Vec<Token>, TokenizeError> {
    let mut curr_idx: usize = 0;
    let mut out = Vec::new();

    while curr_idx < text.len() {
        let (token_rule, match_len) = match get_matching_rule(&text[curr_idx..]) {
            Some(rule_and_len) => rule_and_len,
            None => return Err(TokenizeError::ScanStalled { offset: curr_idx }),
        };

        if match_len == 0 {
            return Err(TokenizeError::ScanStalled { offset: curr_idx });
        }

        if token_rule.token_class != TokenClass::Whitespace {
            out.push(Token {
                token_class: token_rule.token_class,
                token_text: String::from(&text[curr_idx..curr_idx + match_len]),
            });
        }

        curr_idx += match_len;
    }

    return Ok(out);
}
