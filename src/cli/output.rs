//! Output formatting for CLI commands
//!
//! Every command prints exactly one JSON object on stdout with a
//! `success` flag.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::models::lsp::path_to_uri;

#[derive(Debug, Clone)]
pub struct OutputContext {
    /// Workspace root for relative path calculation
    root: PathBuf,
}

impl OutputContext {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path relative to the workspace root when inside it
    pub fn relative_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| path.display().to_string())
    }

    /// Host document URI used as the base of virtual document URIs
    pub fn document_uri(&self, path: &Path) -> String {
        path_to_uri(path)
    }

    pub fn print_success<T: Serialize>(&self, data: T) {
        let response = serde_json::json!({
            "success": true,
            "data": data
        });
        print_json(&response);
    }

    /// Success with the data fields at top level
    pub fn print_success_flat<T: Serialize>(&self, data: T) {
        print_json(&flatten_success(data));
    }

    /// Failure carrying structured details next to the message
    pub fn print_error_with<T: Serialize>(&self, message: &str, details: T) {
        let mut response = match serde_json::to_value(details) {
            Ok(serde_json::Value::Object(obj)) => serde_json::Value::Object(obj),
            _ => serde_json::json!({}),
        };
        if let Some(obj) = response.as_object_mut() {
            obj.insert("success".to_string(), serde_json::json!(false));
            obj.insert("error".to_string(), serde_json::json!(message));
        }
        print_json(&response);
    }

    pub fn print_error(&self, message: &str) {
        let response = serde_json::json!({
            "success": false,
            "error": message
        });
        print_json(&response);
    }
}

fn flatten_success<T: Serialize>(data: T) -> serde_json::Value {
    let mut response = serde_json::to_value(data).unwrap_or(serde_json::json!({}));
    match response.as_object_mut() {
        Some(obj) => {
            obj.insert("success".to_string(), serde_json::json!(true));
            response
        }
        None => serde_json::json!({ "success": true, "data": response }),
    }
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Failed to serialize output: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_path() {
        let ctx = OutputContext::new(PathBuf::from("/workspace"));

        assert_eq!(
            ctx.relative_path(Path::new("/workspace/docs/a.md")),
            "docs/a.md"
        );
        assert_eq!(ctx.relative_path(Path::new("/other/b.md")), "/other/b.md");
    }

    #[test]
    fn test_flatten_success() {
        let flat = flatten_success(serde_json::json!({ "count": 2 }));
        assert_eq!(flat["success"], true);
        assert_eq!(flat["count"], 2);

        let wrapped = flatten_success(vec![1, 2]);
        assert_eq!(wrapped["data"], serde_json::json!([1, 2]));
    }

    #[test]
    fn test_document_uri() {
        let ctx = OutputContext::new(PathBuf::from("/workspace"));
        assert_eq!(
            ctx.document_uri(Path::new("/workspace/my notes.md")),
            "file:///workspace/my%20notes.md"
        );
    }
}
