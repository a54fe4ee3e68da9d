#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Any string is a query; parsing must never panic
    let query = hoot::query::parse_query(data);
    for clause in &query.clauses {
        assert!(!clause.term.text().is_empty());
        let _ = hoot::query::WildcardPattern::new(clause.term.text());
    }
});
