//! Schema linting - static analysis of resource schema files.
//!
//! Checks schema files for:
//! - JSON syntax errors
//! - Missing or malformed required top-level fields
//! - `$ref` pointers that resolve to nothing
//! - Registered property paths that do not resolve
//! - `patternProperties` keys that are not valid regular expressions

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;

use crate::fragment::{AdditionalProperties, SchemaFragment};
use crate::loader::{collect_json_files, load_document};
use crate::resource::ResourceSchema;
use crate::types::{escape_segment, PathOptions};

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message from linting.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub file: PathBuf,
    /// JSON path to the issue (e.g., "/readOnlyProperties/0")
    pub path: String,
    pub message: String,
}

/// Result of linting a single file.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub file: PathBuf,
    /// `typeName` of the schema, when it got far enough to have one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Status of a linted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Error,
    Warning,
}

/// Result of linting a directory or set of files.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub path: PathBuf,
    pub files_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<FileResult>,
}

impl LintResult {
    /// Returns true if all files passed (no errors).
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }
}

/// Lint a file or directory.
///
/// If path is a directory, recursively finds all .json files.
/// If `strict` is true, warnings are treated as errors.
/// Returns aggregated results for all files.
pub fn lint(path: &Path, strict: bool) -> LintResult {
    let files = collect_json_files(path);
    let results: Vec<FileResult> = files.iter().map(|file| lint_file(file, path)).collect();

    let count = |severity: Severity| {
        results
            .iter()
            .flat_map(|r| &r.diagnostics)
            .filter(|d| d.severity == severity)
            .count()
    };
    let errors = count(Severity::Error);
    let warnings = count(Severity::Warning);

    let failed = results
        .iter()
        .filter(|r| {
            if strict {
                r.status != FileStatus::Ok
            } else {
                r.status == FileStatus::Error
            }
        })
        .count();

    LintResult {
        path: path.to_path_buf(),
        files_checked: files.len(),
        passed: files.len() - failed,
        failed,
        errors,
        warnings,
        results,
    }
}

/// Lint a single schema file.
pub fn lint_file(file: &Path, base_path: &Path) -> FileResult {
    let display = file.strip_prefix(base_path).unwrap_or(file).to_path_buf();
    let mut diagnostics = Vec::new();

    let document = match load_document(file) {
        Ok(d) => d,
        Err(e) => {
            diagnostics.push(error(file, "E001", "/", format!("syntax error: {}", e)));
            return finish(display, None, diagnostics);
        }
    };

    let schema = match ResourceSchema::from_value(document) {
        Ok(s) => s,
        Err(e) => {
            diagnostics.push(error(file, "E002", "/", e.to_string()));
            return finish(display, None, diagnostics);
        }
    };

    for (location, fragment) in fragments(&schema) {
        check_reference(&schema, fragment, file, &location, &mut diagnostics);
        check_patterns(fragment, file, &location, &mut diagnostics);
    }
    check_registered_paths(&schema, file, &mut diagnostics);

    finish(display, Some(schema.type_name().to_string()), diagnostics)
}

fn finish(file: PathBuf, type_name: Option<String>, diagnostics: Vec<Diagnostic>) -> FileResult {
    let has_errors = diagnostics.iter().any(|d| d.severity == Severity::Error);
    let has_warnings = diagnostics.iter().any(|d| d.severity == Severity::Warning);

    let status = if has_errors {
        FileStatus::Error
    } else if has_warnings {
        FileStatus::Warning
    } else {
        FileStatus::Ok
    };

    FileResult {
        file,
        type_name,
        status,
        diagnostics,
    }
}

fn error(file: &Path, code: &str, path: &str, message: String) -> Diagnostic {
    Diagnostic {
        severity: Severity::Error,
        code: code.to_string(),
        file: file.to_path_buf(),
        path: path.to_string(),
        message,
    }
}

fn warning(file: &Path, code: &str, path: &str, message: String) -> Diagnostic {
    Diagnostic {
        severity: Severity::Warning,
        ..error(file, code, path, message)
    }
}

/// Every fragment in the schema with its document location.
fn fragments(schema: &ResourceSchema) -> Vec<(String, &SchemaFragment)> {
    let mut found = Vec::new();
    for (name, property) in schema.properties() {
        collect(property, format!("/properties/{}", escape_segment(name)), &mut found);
    }
    for (name, definition) in schema.definitions() {
        collect(definition, format!("/definitions/{}", escape_segment(name)), &mut found);
    }
    collect_alternatives(schema.root(), "", &mut found);
    if let Some(list) = schema.handlers().and_then(|h| h.list.as_ref()) {
        if let Some(handler_schema) = &list.handler_schema {
            collect(handler_schema, "/handlers/list/handlerSchema".to_string(), &mut found);
        }
    }
    found
}

fn collect<'f>(fragment: &'f SchemaFragment, location: String, found: &mut Vec<(String, &'f SchemaFragment)>) {
    for (name, property) in fragment.properties.iter().flatten() {
        collect(property, format!("{}/properties/{}", location, escape_segment(name)), found);
    }
    for (pattern, property) in fragment.pattern_properties.iter().flatten() {
        collect(
            property,
            format!("{}/patternProperties/{}", location, escape_segment(pattern)),
            found,
        );
    }
    if let Some(items) = &fragment.items {
        collect(items, format!("{}/items", location), found);
    }
    if let Some(AdditionalProperties::Schema(additional)) = &fragment.additional_properties {
        collect(additional, format!("{}/additionalProperties", location), found);
    }
    collect_alternatives(fragment, &location, found);
    found.push((location, fragment));
}

fn collect_alternatives<'f>(fragment: &'f SchemaFragment, location: &str, found: &mut Vec<(String, &'f SchemaFragment)>) {
    let keywords = [
        ("oneOf", &fragment.one_of),
        ("anyOf", &fragment.any_of),
        ("allOf", &fragment.all_of),
    ];
    for (keyword, members) in keywords {
        for (i, member) in members.iter().flatten().enumerate() {
            collect(member, format!("{}/{}/{}", location, keyword, i), found);
        }
    }
}

fn check_reference(
    schema: &ResourceSchema,
    fragment: &SchemaFragment,
    file: &Path,
    location: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Some(pointer) = fragment.reference.as_deref() else {
        return;
    };
    let path = format!("{}/$ref", location);
    if !pointer.starts_with('#') {
        diagnostics.push(warning(
            file,
            "W003",
            &path,
            format!("external reference is not resolved: {}", pointer),
        ));
    } else if schema.lookup(pointer).is_none() {
        diagnostics.push(error(
            file,
            "E003",
            &path,
            format!("reference not found: {}", pointer),
        ));
    }
}

fn check_patterns(fragment: &SchemaFragment, file: &Path, location: &str, diagnostics: &mut Vec<Diagnostic>) {
    for pattern in fragment.pattern_properties.iter().flatten().map(|(p, _)| p) {
        if let Err(e) = Regex::new(pattern) {
            diagnostics.push(warning(
                file,
                "W002",
                &format!("{}/patternProperties/{}", location, escape_segment(pattern)),
                format!("invalid pattern: {}", e),
            ));
        }
    }
}

fn check_registered_paths(schema: &ResourceSchema, file: &Path, diagnostics: &mut Vec<Diagnostic>) {
    let lists: [(&str, &[String]); 6] = [
        ("readOnlyProperties", schema.read_only_properties()),
        ("writeOnlyProperties", schema.write_only_properties()),
        ("createOnlyProperties", schema.create_only_properties()),
        ("deprecatedProperties", schema.deprecated_properties()),
        (
            "conditionalCreateOnlyProperties",
            schema.conditional_create_only_properties(),
        ),
        ("primaryIdentifier", schema.primary_identifier()),
    ];
    let strict = PathOptions::new().require_fully_resolved(true);

    for (field, paths) in lists {
        for (i, path) in paths.iter().enumerate() {
            if schema.resolve_json_pointer_path(path, &strict).is_empty() {
                diagnostics.push(warning(
                    file,
                    "W001",
                    &format!("/{}/{}", field, i),
                    format!("{} does not resolve to a property", path),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn write_schema(value: serde_json::Value) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", value).unwrap();
        file
    }

    fn valid() -> serde_json::Value {
        json!({
            "typeName": "AWS::SQS::Queue",
            "description": "test",
            "additionalProperties": false,
            "primaryIdentifier": ["/properties/QueueUrl"],
            "readOnlyProperties": ["/properties/QueueUrl", "/properties/Arn"],
            "definitions": {
                "Tag": {"type": "object", "properties": {"Key": {"type": "string"}}}
            },
            "properties": {
                "QueueUrl": {"type": "string"},
                "Arn": {"type": "string"},
                "Tags": {"type": "array", "items": {"$ref": "#/definitions/Tag"}}
            }
        })
    }

    fn lint_value(value: serde_json::Value) -> FileResult {
        let file = write_schema(value);
        lint_file(file.path(), file.path().parent().unwrap())
    }

    #[test]
    fn lint_valid_schema() {
        let result = lint_value(valid());
        assert_eq!(result.status, FileStatus::Ok);
        assert!(result.diagnostics.is_empty());
        assert_eq!(result.type_name.as_deref(), Some("AWS::SQS::Queue"));
    }

    #[test]
    fn lint_invalid_json_syntax() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{ not valid json }}").unwrap();

        let result = lint_file(file.path(), file.path().parent().unwrap());
        assert_eq!(result.status, FileStatus::Error);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].code, "E001");
    }

    #[test]
    fn lint_missing_required_field() {
        let mut schema = valid();
        schema.as_object_mut().unwrap().remove("primaryIdentifier");
        let result = lint_value(schema);
        assert_eq!(result.status, FileStatus::Error);
        assert_eq!(result.diagnostics[0].code, "E002");
        assert!(result.diagnostics[0].message.contains("primaryIdentifier"));
    }

    #[test]
    fn lint_broken_reference() {
        let mut schema = valid();
        schema["properties"]["Tags"]["items"]["$ref"] = json!("#/definitions/Missing");
        let result = lint_value(schema);
        assert_eq!(result.status, FileStatus::Error);
        let diagnostic = result.diagnostics.iter().find(|d| d.code == "E003").unwrap();
        assert_eq!(diagnostic.path, "/properties/Tags/items/$ref");
    }

    #[test]
    fn lint_external_reference_warns() {
        let mut schema = valid();
        schema["properties"]["Tags"]["items"]["$ref"] = json!("aws.json#/definitions/Tag");
        let result = lint_value(schema);
        assert_eq!(result.status, FileStatus::Warning);
        assert!(result.diagnostics.iter().any(|d| d.code == "W003"));
    }

    #[test]
    fn lint_unresolvable_registered_path() {
        let mut schema = valid();
        schema["readOnlyProperties"] = json!(["/properties/QueueUrl", "/properties/Nope"]);
        let result = lint_value(schema);
        assert_eq!(result.status, FileStatus::Warning);
        let diagnostic = result.diagnostics.iter().find(|d| d.code == "W001").unwrap();
        assert_eq!(diagnostic.path, "/readOnlyProperties/1");
    }

    #[test]
    fn lint_invalid_pattern() {
        let mut schema = valid();
        schema["properties"]["Labels"] = json!({
            "type": "object",
            "patternProperties": {"([a-z": {"type": "string"}}
        });
        let result = lint_value(schema);
        assert!(result.diagnostics.iter().any(|d| d.code == "W002"));
    }

    #[test]
    fn lint_directory() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("valid.json"), valid().to_string()).unwrap();
        std::fs::write(dir.path().join("invalid.json"), "{ not json }").unwrap();

        let result = lint(dir.path(), false);
        assert_eq!(result.files_checked, 2);
        assert_eq!(result.passed, 1);
        assert_eq!(result.failed, 1);
        assert!(!result.is_ok());
    }

    #[test]
    fn lint_strict_mode() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("queue.json");
        let mut schema = valid();
        schema["deprecatedProperties"] = json!(["/properties/Gone"]);
        std::fs::write(&file_path, schema.to_string()).unwrap();

        // Non-strict: warnings don't cause failure
        let result = lint(&file_path, false);
        assert_eq!(result.files_checked, 1);
        assert_eq!(result.passed, 1);
        assert_eq!(result.failed, 0);

        // Strict: warnings cause failure
        let result = lint(&file_path, true);
        assert_eq!(result.passed, 0);
        assert_eq!(result.failed, 1);
    }
}
