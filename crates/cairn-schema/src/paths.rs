use crate::SchemaError;

/// Normalize an absolute path without touching the filesystem.
///
/// Resolves `.` and `..`, collapses repeated slashes, and drops any trailing
/// slash. The path may not exist yet, so `std::fs::canonicalize` is not an option.
pub fn normalize_absolute_path(path: &str) -> Result<String, SchemaError> {
    if !path.starts_with('/') {
        return Err(SchemaError::InvalidPath {
            path: path.to_owned(),
            reason: "must be an absolute path".to_owned(),
        });
    }
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    Ok(format!("/{}", parts.join("/")))
}
