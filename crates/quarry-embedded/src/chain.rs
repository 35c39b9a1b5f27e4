//! Analysis chains for the embedded engine.
//!
//! Analyzer and normalizer names, whether built in or declared through
//! [`AnalysisDefinitions`], are resolved into a tokenizer plus an ordered
//! list of token filters. The embedded engine has no char filters, so a
//! definition that uses one is rejected here rather than silently ignored.

use serde_json::{Map, Value};

use quarry_core::{Error, Result};
use quarry_schema::AnalysisDefinitions;
use quarry_schema::analysis::{AnalyzerDefinition, ComponentDefinition, NormalizerDefinition};

/// Token length limit applied by the standard analyzers.
pub const MAX_TOKEN_LENGTH: usize = 255;

const DEFAULT_LANGUAGE: &str = "english";

/// How text is split into tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizerSpec {
    /// Split on anything that is not alphanumeric.
    Simple,
    /// Split on whitespace.
    Whitespace,
    /// The whole input is a single token.
    Raw,
}

/// A token filter of a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterSpec {
    /// Lowercase every token.
    LowerCase,
    /// Fold non-ASCII characters into their ASCII equivalents.
    AsciiFolding,
    /// Snowball stemming for a language.
    Stemmer(String),
    /// Remove a language's stop words.
    StopWords(String),
    /// Remove an explicit list of words.
    StopList(Vec<String>),
    /// Remove tokens longer than this many bytes.
    MaxLength(usize),
}

/// A tokenizer followed by token filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisChain {
    /// The tokenizer.
    pub tokenizer: TokenizerSpec,
    /// Token filters, applied in order.
    pub filters: Vec<FilterSpec>,
}

impl AnalysisChain {
    fn new(tokenizer: TokenizerSpec, filters: Vec<FilterSpec>) -> Self {
        Self { tokenizer, filters }
    }

    /// The chain of a built-in analyzer.
    pub fn builtin_analyzer(name: &str) -> Option<Self> {
        use FilterSpec::*;
        let english = || DEFAULT_LANGUAGE.to_string();
        let chain = match name {
            "default" | "standard" => Self::new(
                TokenizerSpec::Simple,
                vec![MaxLength(MAX_TOKEN_LENGTH), LowerCase],
            ),
            "simple" => Self::new(TokenizerSpec::Simple, vec![LowerCase]),
            "whitespace" => Self::new(TokenizerSpec::Whitespace, Vec::new()),
            "keyword" => Self::new(TokenizerSpec::Raw, Vec::new()),
            "english" => Self::new(
                TokenizerSpec::Simple,
                vec![
                    MaxLength(MAX_TOKEN_LENGTH),
                    LowerCase,
                    StopWords(english()),
                    Stemmer(english()),
                ],
            ),
            "stop" => Self::new(TokenizerSpec::Simple, vec![LowerCase, StopWords(english())]),
            _ => return None,
        };
        Some(chain)
    }

    /// The chain of a built-in normalizer.
    pub fn builtin_normalizer(name: &str) -> Option<Self> {
        match name {
            "lowercase" => Some(Self::new(TokenizerSpec::Raw, vec![FilterSpec::LowerCase])),
            _ => None,
        }
    }

    /// Resolve an analyzer name.
    ///
    /// Declared definitions take precedence over built-in names.
    pub fn analyzer(name: &str, definitions: &AnalysisDefinitions) -> Result<Self> {
        match definitions.analyzers.get(name) {
            Some(definition) => Self::from_analyzer(name, definition, definitions),
            None => Self::builtin_analyzer(name).ok_or_else(|| Error::UnknownAnalyzer {
                what: "analyzer",
                name: name.to_string(),
            }),
        }
    }

    /// Resolve a normalizer name.
    pub fn normalizer(name: &str, definitions: &AnalysisDefinitions) -> Result<Self> {
        match definitions.normalizers.get(name) {
            Some(definition) => Self::from_normalizer(name, definition, definitions),
            None => Self::builtin_normalizer(name).ok_or_else(|| Error::UnknownAnalyzer {
                what: "normalizer",
                name: name.to_string(),
            }),
        }
    }

    fn from_analyzer(
        name: &str,
        definition: &AnalyzerDefinition,
        definitions: &AnalysisDefinitions,
    ) -> Result<Self> {
        if definition.type_name != "custom" {
            let mut chain = Self::builtin_analyzer(&definition.type_name).ok_or_else(|| {
                Error::config(format!(
                    "Analyzer type '{}' of analyzer '{name}' is not supported by the embedded backend",
                    definition.type_name
                ))
            })?;
            if let Some(words) = definition.params.get("stopwords") {
                chain.filters.retain(|f| !matches!(f, FilterSpec::StopWords(_)));
                chain.filters.push(stop_filter(Some(words))?);
            }
            return Ok(chain);
        }
        reject_char_filters("analyzer", name, &definition.char_filters)?;
        let tokenizer_name = definition.tokenizer.as_deref().ok_or_else(|| {
            Error::config(format!("Analyzer '{name}' does not declare a tokenizer"))
        })?;
        let tokenizer = match definitions.tokenizers.get(tokenizer_name) {
            Some(component) => tokenizer_of_type(&component.type_name)?,
            None => tokenizer_of_type(tokenizer_name)?,
        };
        let filters = resolve_filters(&definition.token_filters, definitions)?;
        Ok(Self::new(tokenizer, filters))
    }

    fn from_normalizer(
        name: &str,
        definition: &NormalizerDefinition,
        definitions: &AnalysisDefinitions,
    ) -> Result<Self> {
        reject_char_filters("normalizer", name, &definition.char_filters)?;
        let filters = resolve_filters(&definition.token_filters, definitions)?;
        Ok(Self::new(TokenizerSpec::Raw, filters))
    }
}

fn reject_char_filters(what: &str, name: &str, char_filters: &[String]) -> Result<()> {
    match char_filters.first() {
        Some(char_filter) => Err(Error::config(format!(
            "The embedded backend does not support char filters ({what} '{name}' uses '{char_filter}')"
        ))),
        None => Ok(()),
    }
}

fn tokenizer_of_type(type_name: &str) -> Result<TokenizerSpec> {
    match type_name {
        "standard" | "simple" | "letter" => Ok(TokenizerSpec::Simple),
        "whitespace" => Ok(TokenizerSpec::Whitespace),
        "keyword" => Ok(TokenizerSpec::Raw),
        other => Err(Error::config(format!(
            "Tokenizer type '{other}' is not supported by the embedded backend"
        ))),
    }
}

fn resolve_filters(names: &[String], definitions: &AnalysisDefinitions) -> Result<Vec<FilterSpec>> {
    names
        .iter()
        .map(|name| match definitions.token_filters.get(name) {
            Some(ComponentDefinition { type_name, params }) => filter_of_type(type_name, params),
            None => filter_of_type(name, &Map::new()),
        })
        .collect()
}

fn filter_of_type(type_name: &str, params: &Map<String, Value>) -> Result<FilterSpec> {
    let language = || {
        params
            .get("language")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_LANGUAGE)
            .to_lowercase()
    };
    match type_name {
        "lowercase" => Ok(FilterSpec::LowerCase),
        "asciifolding" => Ok(FilterSpec::AsciiFolding),
        "stemmer" | "snowball" => Ok(FilterSpec::Stemmer(language())),
        "porter_stem" => Ok(FilterSpec::Stemmer(DEFAULT_LANGUAGE.to_string())),
        "stop" => stop_filter(params.get("stopwords")),
        "length" => {
            let max = params
                .get("max")
                .and_then(Value::as_u64)
                .ok_or_else(|| Error::config("The length token filter needs a numeric 'max'"))?;
            Ok(FilterSpec::MaxLength(max as usize))
        }
        other => Err(Error::config(format!(
            "Token filter type '{other}' is not supported by the embedded backend"
        ))),
    }
}

/// `stopwords` is either a list of words or a `_language_` reference.
fn stop_filter(stopwords: Option<&Value>) -> Result<FilterSpec> {
    match stopwords {
        None => Ok(FilterSpec::StopWords(DEFAULT_LANGUAGE.to_string())),
        Some(Value::String(s)) => {
            let language = s.trim_matches('_').to_lowercase();
            Ok(FilterSpec::StopWords(language))
        }
        Some(Value::Array(words)) => words
            .iter()
            .map(|w| {
                w.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| Error::config(format!("Invalid stop word '{w}'")))
            })
            .collect::<Result<Vec<_>>>()
            .map(FilterSpec::StopList),
        Some(other) => Err(Error::config(format!("Invalid stopwords value '{other}'"))),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_schema::AnalysisConfigurationContext;
    use serde_json::json;

    #[test]
    fn test_builtin_names_resolve() {
        let definitions = AnalysisDefinitions::default();
        for name in quarry_schema::analysis::BUILTIN_ANALYZERS {
            assert!(AnalysisChain::analyzer(name, &definitions).is_ok(), "{name}");
        }
        let lowercase = AnalysisChain::normalizer("lowercase", &definitions).unwrap();
        assert_eq!(lowercase.tokenizer, TokenizerSpec::Raw);
        assert_eq!(lowercase.filters, vec![FilterSpec::LowerCase]);
    }

    #[test]
    fn test_unknown_name() {
        let err = AnalysisChain::analyzer("nope", &AnalysisDefinitions::default()).unwrap_err();
        assert!(matches!(err, Error::UnknownAnalyzer { what: "analyzer", .. }));
    }

    #[test]
    fn test_custom_analyzer() {
        let definitions = AnalysisDefinitions::configured(&|ctx: &mut AnalysisConfigurationContext| {
            ctx.analyzer("folding")
                .tokenizer("whitespace")
                .token_filters(["lowercase", "asciifolding", "french-stem", "short"]);
            ctx.token_filter("french-stem", "stemmer")
                .param("language", json!("French"));
            ctx.token_filter("short", "length").param("max", json!(20));
        });
        let chain = AnalysisChain::analyzer("folding", &definitions).unwrap();
        assert_eq!(chain.tokenizer, TokenizerSpec::Whitespace);
        assert_eq!(
            chain.filters,
            vec![
                FilterSpec::LowerCase,
                FilterSpec::AsciiFolding,
                FilterSpec::Stemmer("french".to_string()),
                FilterSpec::MaxLength(20),
            ]
        );
    }

    #[test]
    fn test_parameterized_builtin_analyzer() {
        let definitions = AnalysisDefinitions::configured(&|ctx: &mut AnalysisConfigurationContext| {
            ctx.analyzer("my-stop")
                .type_name("stop")
                .param("stopwords", json!(["foo", "bar"]));
        });
        let chain = AnalysisChain::analyzer("my-stop", &definitions).unwrap();
        assert_eq!(
            chain.filters,
            vec![
                FilterSpec::LowerCase,
                FilterSpec::StopList(vec!["foo".to_string(), "bar".to_string()])
            ]
        );
    }

    #[test]
    fn test_char_filters_rejected() {
        let definitions = AnalysisDefinitions::configured(&|ctx: &mut AnalysisConfigurationContext| {
            ctx.normalizer("custom-normalizer")
                .char_filters(["custom-char-mapping"])
                .token_filters(["lowercase"]);
            ctx.char_filter("custom-char-mapping", "mapping")
                .param("mappings", json!(["foo => bar"]));
        });
        let err = AnalysisChain::normalizer("custom-normalizer", &definitions).unwrap_err();
        assert!(err.to_string().contains("custom-char-mapping"));
    }

    #[test]
    fn test_stop_filter_language_reference() {
        assert_eq!(
            stop_filter(Some(&json!("_german_"))).unwrap(),
            FilterSpec::StopWords("german".to_string())
        );
        assert!(stop_filter(Some(&json!(3))).is_err());
    }

    #[test]
    fn test_unsupported_tokenizer() {
        let definitions = AnalysisDefinitions::configured(&|ctx: &mut AnalysisConfigurationContext| {
            ctx.analyzer("grams").tokenizer("my-ngram");
            ctx.tokenizer("my-ngram", "ngram");
        });
        let err = AnalysisChain::analyzer("grams", &definitions).unwrap_err();
        assert!(err.to_string().contains("ngram"));
    }
}
