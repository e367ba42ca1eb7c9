//! Record services. Each borrows the open connection for the duration of a call.

pub mod auth;
pub mod course;
pub mod dashboard;
pub mod guardian;
pub mod links;
pub mod student;

/// `%term%` for a LIKE clause with `\` as the escape character.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}
