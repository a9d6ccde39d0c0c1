use std::path::{Path, PathBuf};

/// Local destination for a repository: one directory per name under `root`,
/// so concurrent workers never share a path.
pub fn repo_path(root: &Path, repo: &str) -> PathBuf {
    root.join(sanitize_repo_name(repo))
}

fn sanitize_repo_name(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            ch if ch.is_control() => '_',
            _ => ch,
        })
        .collect();
    while sanitized.ends_with('.') || sanitized.ends_with(' ') {
        sanitized.pop();
    }
    if sanitized.is_empty() {
        "_".to_string()
    } else {
        sanitized
    }
}
