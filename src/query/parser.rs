/// Parsed query: clauses combined left to right
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub clauses: Vec<Clause>,
}

impl Query {
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// One whitespace-separated clause of a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub op: Combinator,
    pub term: Term,
}

/// How a clause's operand folds into the running result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// Intersection, the default
    And,
    /// Union, `+` prefix
    Or,
    /// Difference, `-` prefix
    AndNot,
}

/// What a clause matches against the dictionary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// A single lowercased word
    Exact(String),
    /// A `*`/`?` pattern matched against every known word
    Wildcard(String),
}

impl Term {
    pub fn text(&self) -> &str {
        match self {
            Term::Exact(s) | Term::Wildcard(s) => s,
        }
    }
}

/// Parse a query string.
///
/// Exactly one leading `+` or `-` is taken as the combinator; a clause left
/// empty by that is dropped. Never fails: any string is a valid query.
pub fn parse_query(input: &str) -> Query {
    let clauses = input
        .split_whitespace()
        .filter_map(parse_clause)
        .collect();
    Query { clauses }
}

fn parse_clause(raw: &str) -> Option<Clause> {
    let (op, rest) = if let Some(rest) = raw.strip_prefix('+') {
        (Combinator::Or, rest)
    } else if let Some(rest) = raw.strip_prefix('-') {
        (Combinator::AndNot, rest)
    } else {
        (Combinator::And, raw)
    };

    if rest.is_empty() {
        return None;
    }

    let term = if rest.contains(['*', '?']) {
        Term::Wildcard(rest.to_string())
    } else {
        Term::Exact(rest.to_lowercase())
    };
    Some(Clause { op, term })
}
