// src/recipe/parser.rs

//! Recipe file parsing

use crate::error::{Error, Result};
use crate::recipe::format::Recipe;
use std::path::Path;

/// Parse a recipe from a TOML string
pub fn parse_recipe(content: &str) -> Result<Recipe> {
    toml::from_str(content).map_err(|e| Error::ParseError(format!("Invalid recipe: {}", e)))
}

/// Parse a recipe from a file
pub fn parse_recipe_file(path: &Path) -> Result<Recipe> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::io(format!("Failed to read recipe file {}", path.display()), e))?;

    parse_recipe(&content)
}

/// Split a `name==version` request into its parts
pub fn split_version(spec: &str) -> (&str, Option<&str>) {
    match spec.split_once("==") {
        Some((name, version)) if !version.is_empty() => (name, Some(version)),
        Some((name, _)) => (name, None),
        None => (spec, None),
    }
}

/// Validate a recipe, returning warnings for things that are merely odd
pub fn validate_recipe(recipe: &Recipe) -> Result<Vec<String>> {
    let mut warnings = Vec::new();
    let name = recipe.name();

    if name.is_empty() {
        return Err(Error::ParseError("Recipe package name cannot be empty".to_string()));
    }
    if name.contains(['/', '=', ' ']) {
        return Err(Error::ParseError(format!("Invalid recipe name: {}", name)));
    }

    if recipe.version().is_none() {
        warnings.push("Missing package version".to_string());
    }
    if let Some(source) = &recipe.source {
        if recipe.version().is_none() && source.url.contains("{version}") {
            return Err(Error::ParseError(format!(
                "Source URL of {} uses {{version}} but no version is set",
                name
            )));
        }
    }
    if recipe.build.configure.is_none()
        && recipe.build.make.is_none()
        && recipe.build.install.is_none()
    {
        warnings.push("No build commands specified".to_string());
    }

    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_recipe() {
        let content = r#"
[package]
name = "libffi"
version = "3.4.4"

[source]
url = "https://github.com/libffi/libffi/releases/download/v{version}/libffi-{version}.tar.gz"

[build]
configure = "./configure --host={host} --prefix={prefix}"
make = "make {make_jobs}"
install = "make install"
"#;

        let recipe = parse_recipe(content).unwrap();
        assert_eq!(recipe.name(), "libffi");
        assert_eq!(recipe.version(), Some("3.4.4"));
        assert!(validate_recipe(&recipe).unwrap().is_empty());
    }

    #[test]
    fn test_parse_invalid_recipe() {
        let content = "this is not valid toml at all {}";
        assert!(parse_recipe(content).is_err());
    }

    #[test]
    fn test_split_version() {
        assert_eq!(split_version("openssl"), ("openssl", None));
        assert_eq!(split_version("openssl==1.1.1"), ("openssl", Some("1.1.1")));
        assert_eq!(split_version("openssl=="), ("openssl", None));
    }

    #[test]
    fn test_validate_allows_self_dependency() {
        // Loops are reported by the dependency walker, not at load time
        let content = r#"
[package]
name = "loop"
version = "1"
depends = ["loop==2"]
"#;
        let recipe = parse_recipe(content).unwrap();
        assert!(validate_recipe(&recipe).unwrap().is_empty());
    }

    #[test]
    fn test_validate_unversioned_url() {
        let content = r#"
[package]
name = "zlib"

[source]
url = "https://zlib.net/zlib-{version}.tar.gz"
"#;
        let recipe = parse_recipe(content).unwrap();
        assert!(validate_recipe(&recipe).is_err());
    }

    #[test]
    fn test_validate_warnings() {
        let recipe = parse_recipe("[package]\nname = \"headers\"\n").unwrap();
        let warnings = validate_recipe(&recipe).unwrap();
        assert_eq!(warnings.len(), 2);
    }
}
