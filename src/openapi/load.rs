//! Loads an OpenAPI specification from a file, trying every supported
//! format, and converts it to the document model the compiler uses.

use std::path::Path;

use anyhow::{Context, Result};
use openapiv3::VersionedOpenAPI;

use super::ApiDocument;

/// AttemptsFailed records a parallel set of errors, that result from multiple
/// strategies failing. When Displayed, it prints all error chains that resulted
/// from the different attempts, so the user can find the strategy they wanted
/// to use and fix the errors that resulted in that attempt.
#[derive(Debug)]
struct AttemptsFailed {
    errors: Vec<anyhow::Error>,
}

impl std::fmt::Display for AttemptsFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            writeln!(f, "{i}. {err}")?;
            for cause in err.chain().skip(1) {
                writeln!(f, "     because: {cause}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for AttemptsFailed {}

fn spec_from_contents(file_contents: &str) -> Result<oas3::Spec> {
    let mut errors = Vec::new();

    match oas3::from_yaml(file_contents).context("Failed to parse as YAML OpenAPI v3.1") {
        Ok(spec) => return Ok(spec),
        Err(err) => errors.push(err),
    };
    match oas3::from_json(file_contents).context("Failed to parse as JSON OpenAPI v3.1") {
        Ok(spec) => return Ok(spec),
        Err(err) => errors.push(err),
    };

    match serde_yaml::from_str::<VersionedOpenAPI>(file_contents)
        .context("Failed to parse as YAML OpenAPI v2/v3.0")
    {
        Ok(spec) => return Ok(super::convert::convert_openapi(spec.upgrade())),
        Err(err) => errors.push(err),
    };

    match serde_json::from_str::<VersionedOpenAPI>(file_contents)
        .context("Failed to parse as JSON OpenAPI v2/v3.0")
    {
        Ok(spec) => return Ok(super::convert::convert_openapi(spec.upgrade())),
        Err(err) => errors.push(err),
    };
    Err(AttemptsFailed { errors }.into())
}

/// Loads the specification at the given path as an [`ApiDocument`].
pub fn load_api_document(path: &Path) -> Result<ApiDocument> {
    let file_contents = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read OpenAPI file at {}", path.display()))?;
    let spec = spec_from_contents(&file_contents)
        .with_context(|| format!("Error parsing OpenAPI file at {}", path.display()))?;
    Ok(ApiDocument::new(spec))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_inline_v31_json() {
        let spec = spec_from_contents(
            r#"{"openapi": "3.1.0", "info": {"title": "t", "version": "1"}, "paths": {}}"#,
        )
        .unwrap();
        assert_eq!(spec.openapi, "3.1.0");
    }

    #[test]
    fn parses_swagger_v2_json() {
        let spec = spec_from_contents(
            r#"{"swagger": "2.0", "info": {"title": "t", "version": "1"},
                "host": "example.com", "basePath": "/api",
                "paths": {"/items": {"get": {"responses": {"200": {"description": "ok"}}}}}}"#,
        )
        .unwrap();
        let paths = spec.paths.unwrap();
        assert!(paths.contains_key("/items"));
    }

    #[test]
    fn rejects_garbage_with_all_attempts() {
        let error = spec_from_contents("]]not an api spec[[").unwrap_err();
        let rendered = format!("{error:#}");
        assert!(rendered.contains("Failed to parse"));
    }
}
