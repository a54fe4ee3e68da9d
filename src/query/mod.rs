pub mod evaluator;
pub mod parser;
pub mod wildcard;

pub use evaluator::QueryEvaluator;
pub use parser::{Clause, Combinator, Query, Term, parse_query};
pub use wildcard::WildcardPattern;
