//! Folder path normalization

/// Normalize a folder path
///
/// The result has exactly one leading `/`, no trailing `/` (except for the
/// root itself) and is lower-cased. Applying it twice changes nothing.
pub fn format_folder_path(path: &str) -> String {
    let lowered = path.to_lowercase();
    let body = lowered.trim_start_matches('/').trim_end_matches('/');
    format!("/{body}")
}

/// Parent folder and final segment of a normalized path
///
/// Returns `None` for the root.
pub fn split_parent(path: &str) -> Option<(String, String)> {
    let path = format_folder_path(path);
    if path == "/" {
        return None;
    }
    let (parent, name) = path.rsplit_once('/')?;
    let parent = if parent.is_empty() { "/" } else { parent };
    Some((parent.to_string(), name.to_string()))
}

/// Every ancestor of a path including itself, top-down, excluding the root
pub fn ancestors(path: &str) -> Vec<String> {
    let path = format_folder_path(path);
    let mut out = Vec::new();
    let mut current = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current.push('/');
        current.push_str(segment);
        out.push(current.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", "/")]
    #[case("/", "/")]
    #[case("//", "/")]
    #[case("Prod", "/prod")]
    #[case("/Prod/", "/prod")]
    #[case("///a/B//", "/a/b")]
    #[case("/a/b", "/a/b")]
    fn normalizes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(format_folder_path(input), expected);
    }

    #[test]
    fn split_parent_of_nested_path() {
        assert_eq!(
            split_parent("/a/b/c"),
            Some(("/a/b".to_string(), "c".to_string()))
        );
        assert_eq!(split_parent("/a"), Some(("/".to_string(), "a".to_string())));
        assert_eq!(split_parent("/"), None);
    }

    #[test]
    fn ancestors_walk_top_down() {
        assert_eq!(ancestors("/a/b/c"), vec!["/a", "/a/b", "/a/b/c"]);
        assert!(ancestors("/").is_empty());
    }
}
