//! Output extensions: user-supplied fields merged into every title record

use crate::config::ExtensionField;
use crate::extract::Document;
use crate::ConfigError;
use scraper::Selector;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised by an output extension
#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("required field '{field}' matched nothing (selector '{selector}')")]
    MissingField { field: String, selector: String },

    #[error("{0}")]
    Failed(String),
}

/// Result type for extension operations
pub type ExtensionResult<T> = Result<T, ExtensionError>;

/// Computes extra record fields from a title page
///
/// The returned map is merged over the extracted record; a key naming a
/// built-in field (`year`, `title`, ...) replaces that field. An error aborts
/// the whole run.
pub trait OutputExtension: Send + Sync {
    fn extend(&self, doc: &Document) -> ExtensionResult<BTreeMap<String, String>>;
}

impl<F> OutputExtension for F
where
    F: Fn(&Document) -> ExtensionResult<BTreeMap<String, String>> + Send + Sync,
{
    fn extend(&self, doc: &Document) -> ExtensionResult<BTreeMap<String, String>> {
        self(doc)
    }
}

struct CompiledField {
    name: String,
    selector_text: String,
    selector: Selector,
    attribute: Option<String>,
    required: bool,
}

/// Extension built from `[[extension.fields]]` configuration
pub struct SelectorExtension {
    fields: Vec<CompiledField>,
}

impl SelectorExtension {
    /// Compiles every field's selector; the first that fails to parse is reported
    pub fn compile(fields: &[ExtensionField]) -> Result<Self, ConfigError> {
        let fields = fields
            .iter()
            .map(|field| {
                let selector = Selector::parse(&field.selector).map_err(|e| {
                    ConfigError::InvalidExtension(format!(
                        "field '{}': selector '{}' does not parse: {:?}",
                        field.name, field.selector, e
                    ))
                })?;
                Ok(CompiledField {
                    name: field.name.clone(),
                    selector_text: field.selector.clone(),
                    selector,
                    attribute: field.attribute.clone(),
                    required: field.required,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self { fields })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl OutputExtension for SelectorExtension {
    fn extend(&self, doc: &Document) -> ExtensionResult<BTreeMap<String, String>> {
        let mut out = BTreeMap::new();

        for field in &self.fields {
            let value = match &field.attribute {
                Some(attr) => doc.attr_with(&field.selector, attr),
                None => doc.text_with(&field.selector),
            };

            match value {
                Some(value) => {
                    out.insert(field.name.clone(), value.trim().to_string());
                }
                None if field.required => {
                    return Err(ExtensionError::MissingField {
                        field: field.name.clone(),
                        selector: field.selector_text.clone(),
                    });
                }
                None => {
                    out.insert(field.name.clone(), String::new());
                }
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, selector: &str, attribute: Option<&str>, required: bool) -> ExtensionField {
        ExtensionField {
            name: name.to_string(),
            selector: selector.to_string(),
            attribute: attribute.map(str::to_string),
            required,
        }
    }

    const PAGE: &str = r#"<div class="poster"><img src="/p.jpg"></div><span class="yr"> 1999 </span>"#;

    #[test]
    fn test_selector_extension_text_and_attr() {
        let ext = SelectorExtension::compile(&[
            field("poster", ".poster img", Some("src"), false),
            field("year", ".yr", None, true),
        ])
        .unwrap();
        assert_eq!(ext.len(), 2);

        let out = ext.extend(&Document::parse(PAGE)).unwrap();
        assert_eq!(out["poster"], "/p.jpg");
        assert_eq!(out["year"], "1999");
    }

    #[test]
    fn test_optional_missing_is_empty() {
        let ext = SelectorExtension::compile(&[field("budget", ".budget", None, false)]).unwrap();
        let out = ext.extend(&Document::parse(PAGE)).unwrap();
        assert_eq!(out["budget"], "");
    }

    #[test]
    fn test_required_missing_fails() {
        let ext = SelectorExtension::compile(&[field("budget", ".budget", None, true)]).unwrap();
        let err = ext.extend(&Document::parse(PAGE)).unwrap_err();
        assert!(matches!(err, ExtensionError::MissingField { .. }));
    }

    #[test]
    fn test_invalid_selector_is_config_error() {
        let result = SelectorExtension::compile(&[field("bad", "div[[", None, false)]);
        assert!(matches!(result, Err(ConfigError::InvalidExtension(_))));
    }

    #[test]
    fn test_closure_extension() {
        let ext = |_: &Document| -> ExtensionResult<BTreeMap<String, String>> {
            let mut out = BTreeMap::new();
            out.insert("year".to_string(), "1999".to_string());
            Ok(out)
        };
        let out = ext.extend(&Document::parse("<p></p>")).unwrap();
        assert_eq!(out["year"], "1999");
    }
}
