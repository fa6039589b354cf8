use serde::Serialize;

use crate::tree::filter::requests_everything;
use crate::tree::TestId;

/// Patterns passed to Jest to narrow a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestFilter {
    pub test_file_name_pattern: Option<String>,
    pub test_name_pattern: Option<String>,
}

/// Derives the narrowest Jest filter for the requested ids.
///
/// `None` means run everything: the request is empty, contains `root`, or
/// names an id without a file segment.
pub fn map_test_ids_to_filter(ids: &[String]) -> Option<TestFilter> {
    if requests_everything(ids) {
        return None;
    }

    let decoded: Vec<TestId> = ids.iter().map(|id| TestId::decode(id)).collect();
    if decoded.iter().any(|id| id.file_name.is_none()) {
        return None;
    }

    let files: Vec<String> = decoded
        .iter()
        .filter_map(|id| id.file_name.as_deref())
        .map(escape_reg_exp)
        .collect();
    let names: Vec<String> = decoded
        .iter()
        .filter_map(|id| id.full_name())
        .map(|name| escape_reg_exp(&name))
        .collect();

    Some(TestFilter {
        test_file_name_pattern: join_patterns(files),
        test_name_pattern: join_patterns(names),
    })
}

fn join_patterns(mut patterns: Vec<String>) -> Option<String> {
    patterns.dedup();
    if patterns.is_empty() {
        None
    } else {
        Some(patterns.join("|"))
    }
}

/// Escapes every regex metacharacter in `value`.
pub fn escape_reg_exp(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '.' | '*' | '+' | '?' | '^' | '$' | '{' | '}' | '(' | ')' | '|' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
