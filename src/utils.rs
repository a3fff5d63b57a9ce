use anyhow::{bail, Result};
use std::path::PathBuf;
use url::Url;

/// Last path segment of `url_str`, or a random name when the path has none.
pub fn get_filename_from_url(url_str: &str) -> Result<String> {
    let url = Url::parse(url_str)?;

    if let Some(filename) = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
    {
        return Ok(filename.to_string());
    }

    Ok(format!("download_{}", uuid::Uuid::new_v4()))
}

pub fn sanitize_filename(filename: &str) -> String {
    filename.replace(|c: char| !c.is_alphanumeric() && c != '.' && c != '-' && c != '_', "_")
}

/// Turns a repository path like `onnx/model.onnx` into a relative path
/// with every component sanitized.
///
/// Empty, `.` and `..` components are rejected so the result always stays
/// below the directory it is joined onto.
pub fn sanitize_relative_path(path: &str) -> Result<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.split(['/', '\\']) {
        match component {
            "" | "." | ".." => bail!("Unsafe repository path: {:?}", path),
            name => out.push(sanitize_filename(name)),
        }
    }
    Ok(out)
}
