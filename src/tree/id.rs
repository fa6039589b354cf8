//! Hierarchical test identifiers.
//!
//! An identifier is the project id followed by optional file, describe and
//! test segments, each introduced by its own reserved separator. Names are
//! never escaped, so a separator must not appear inside a file path or a
//! block name.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

/// Separates the project id from the file (or folder) path.
pub const PROJECT_ID_SEPARATOR: &str = "::";
/// Introduces each describe block name.
pub const DESCRIBE_ID_SEPARATOR: &str = "@@";
/// Introduces the test name.
pub const TEST_ID_SEPARATOR: &str = "$$";

/// Id of the workspace root, also used by hosts to mean "every test".
pub const ROOT_ID: &str = "root";

static SEPARATOR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        "{}|{}|{}",
        regex::escape(PROJECT_ID_SEPARATOR),
        regex::escape(TEST_ID_SEPARATOR),
        regex::escape(DESCRIBE_ID_SEPARATOR)
    ))
    .expect("separator pattern is a valid regex")
});

static DRIVE_LETTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-zA-Z]):\\").expect("drive letter pattern is a valid regex"));

/// Decoded form of a test identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestId {
    pub project_id: String,
    pub file_name: Option<String>,
    pub describe_ids: Option<Vec<String>>,
    pub test_id: Option<String>,
}

impl TestId {
    pub fn project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            ..Default::default()
        }
    }

    pub fn with_file(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_describes<I, S>(mut self, describes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let describes: Vec<String> = describes.into_iter().map(Into::into).collect();
        self.describe_ids = if describes.is_empty() { None } else { Some(describes) };
        self
    }

    pub fn with_test(mut self, test_id: impl Into<String>) -> Self {
        self.test_id = Some(test_id.into());
        self
    }

    /// Encodes the id. Describe and test segments are only written when a
    /// file segment is present.
    pub fn encode(&self) -> String {
        let mut result = self.project_id.clone();

        if let Some(file_name) = &self.file_name {
            result.push_str(PROJECT_ID_SEPARATOR);
            result.push_str(file_name);

            if let Some(describes) = &self.describe_ids {
                for describe in describes {
                    result.push_str(DESCRIBE_ID_SEPARATOR);
                    result.push_str(describe);
                }
            }

            if let Some(test_id) = &self.test_id {
                result.push_str(TEST_ID_SEPARATOR);
                result.push_str(test_id);
            }
        }

        result
    }

    /// Splits an encoded id on all three separators in one pass.
    ///
    /// Never fails: absent trailing segments come back as `None`, so a bare
    /// project id or a file id decode to partial values.
    pub fn decode(id: &str) -> Self {
        let mut decoded = TestId::default();
        let mut describes = Vec::new();
        let mut last_end = 0;
        let mut pending: Option<&str> = None;

        let mut assign = |separator: Option<&str>, segment: &str, decoded: &mut TestId| match separator {
            None => decoded.project_id = segment.to_string(),
            Some(PROJECT_ID_SEPARATOR) if decoded.file_name.is_none() => {
                decoded.file_name = Some(segment.to_string())
            }
            Some(TEST_ID_SEPARATOR) => {
                if let Some(previous) = decoded.test_id.replace(segment.to_string()) {
                    describes.push(previous);
                }
            }
            Some(_) => describes.push(segment.to_string()),
        };

        for m in SEPARATOR_PATTERN.find_iter(id) {
            assign(pending, &id[last_end..m.start()], &mut decoded);
            pending = Some(m.as_str());
            last_end = m.end();
        }
        assign(pending, &id[last_end..], &mut decoded);

        if !describes.is_empty() {
            decoded.describe_ids = Some(describes);
        }
        decoded
    }

    /// Name Jest reports for this id: describe titles and the test title
    /// joined by spaces.
    pub fn full_name(&self) -> Option<String> {
        let mut parts: Vec<&str> = self
            .describe_ids
            .iter()
            .flatten()
            .map(String::as_str)
            .collect();
        if let Some(test_id) = &self.test_id {
            parts.push(test_id);
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

/// The drive letter is lowercased so ids built from tree paths match
/// [`assertion_test_id`].
pub fn file_id(project_id: &str, file: &Path) -> String {
    format!(
        "{}{}{}",
        project_id,
        PROJECT_ID_SEPARATOR,
        lower_case_drive_letter(&file.display().to_string())
    )
}

/// Folder ids share the file id shape so that a folder id is always a
/// prefix of the ids of everything below it.
pub fn folder_id(project_id: &str, folder: &Path) -> String {
    file_id(project_id, folder)
}

pub fn describe_id(parent_id: &str, name: &str) -> String {
    format!("{}{}{}", parent_id, DESCRIBE_ID_SEPARATOR, name)
}

pub fn test_id(parent_id: &str, name: &str) -> String {
    format!("{}{}{}", parent_id, TEST_ID_SEPARATOR, name)
}

/// Id a runner assertion maps onto, built from the reported file and titles.
pub fn assertion_test_id(project_id: &str, file: &str, ancestor_titles: &[String], title: &str) -> String {
    let mut id = format!("{}{}{}", project_id, PROJECT_ID_SEPARATOR, lower_case_drive_letter(file));
    for ancestor in ancestor_titles {
        id.push_str(DESCRIBE_ID_SEPARATOR);
        id.push_str(ancestor);
    }
    id.push_str(TEST_ID_SEPARATOR);
    id.push_str(title);
    id
}

/// Lowercases a leading Windows drive letter (`C:\` becomes `c:\`).
pub fn lower_case_drive_letter(path: &str) -> String {
    match DRIVE_LETTER.captures(path) {
        Some(caps) => {
            let letter = caps[1].to_lowercase();
            format!("{}{}", letter, &path[1..])
        }
        None => path.to_string(),
    }
}

pub fn contains_separator(name: &str) -> bool {
    SEPARATOR_PATTERN.is_match(name)
}

/// True when `candidate` is `requested` itself or one of its ancestors.
///
/// A plain prefix test would also accept siblings sharing a name prefix
/// (`a.test.js` against `a.test.jsx`), so the prefix must end on a segment
/// boundary. Path separators only bound folder and file ids; a describe
/// named `a` is not an ancestor of a describe named `a/b`.
pub fn is_self_or_ancestor(candidate: &str, requested: &str) -> bool {
    match requested.strip_prefix(candidate) {
        Some("") => true,
        Some(rest) => {
            rest.starts_with(PROJECT_ID_SEPARATOR)
                || rest.starts_with(DESCRIBE_ID_SEPARATOR)
                || rest.starts_with(TEST_ID_SEPARATOR)
                || ((rest.starts_with('/') || rest.starts_with('\\')) && !is_block_id(candidate))
        }
        None => false,
    }
}

fn is_block_id(id: &str) -> bool {
    id.contains(DESCRIBE_ID_SEPARATOR) || id.contains(TEST_ID_SEPARATOR)
}
