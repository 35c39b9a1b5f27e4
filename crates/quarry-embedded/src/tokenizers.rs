//! Tokenizer registration.
//!
//! Every analyzer and normalizer a layout uses is registered with the index
//! under its own name, so a text field's tokenizer name is simply the
//! analyzer or normalizer name of its field type. Normalizers also go to the
//! fast field tokenizer manager, which sorts and aggregations read from.

use tantivy::Index;
use tantivy::tokenizer::{
    AsciiFoldingFilter, Language, LowerCaser, RawTokenizer, RemoveLongFilter, SimpleTokenizer, Stemmer,
    StopWordFilter, TextAnalyzer, WhitespaceTokenizer,
};

use quarry_core::{Error, Result};
use quarry_schema::AnalysisDefinitions;

use crate::chain::{AnalysisChain, FilterSpec, TokenizerSpec};
use crate::layout::EmbeddedLayout;

/// Register the tokenizers of `layout` with `index`.
///
/// Must be called after creating/opening an index, before any writer or
/// reader is used.
pub fn register_tokenizers(
    index: &Index,
    layout: &EmbeddedLayout,
    definitions: &AnalysisDefinitions,
) -> Result<()> {
    for (name, chain) in layout.analysis_chains(definitions)? {
        let analyzer = text_analyzer(&chain)?;
        if chain.tokenizer == TokenizerSpec::Raw {
            index.fast_field_tokenizer().register(&name, analyzer.clone());
        }
        index.tokenizers().register(&name, analyzer);
        log::debug!("Registered tokenizer '{name}'");
    }
    Ok(())
}

/// Build the Tantivy analyzer of a chain.
pub fn text_analyzer(chain: &AnalysisChain) -> Result<TextAnalyzer> {
    let mut builder = match chain.tokenizer {
        TokenizerSpec::Simple => TextAnalyzer::builder(SimpleTokenizer::default()).dynamic(),
        TokenizerSpec::Whitespace => TextAnalyzer::builder(WhitespaceTokenizer::default()).dynamic(),
        TokenizerSpec::Raw => TextAnalyzer::builder(RawTokenizer::default()).dynamic(),
    };
    for filter in &chain.filters {
        builder = match filter {
            FilterSpec::LowerCase => builder.filter_dynamic(LowerCaser),
            FilterSpec::AsciiFolding => builder.filter_dynamic(AsciiFoldingFilter),
            FilterSpec::Stemmer(language) => builder.filter_dynamic(Stemmer::new(language_of(language)?)),
            FilterSpec::StopWords(language) => {
                let filter = StopWordFilter::new(language_of(language)?).ok_or_else(|| {
                    Error::config(format!("No stop word list for language '{language}'"))
                })?;
                builder.filter_dynamic(filter)
            }
            FilterSpec::StopList(words) => builder.filter_dynamic(StopWordFilter::remove(words.clone())),
            FilterSpec::MaxLength(max) => builder.filter_dynamic(RemoveLongFilter::limit(max + 1)),
        };
    }
    Ok(builder.build())
}

fn language_of(name: &str) -> Result<Language> {
    let language = match name {
        "arabic" => Language::Arabic,
        "danish" => Language::Danish,
        "dutch" => Language::Dutch,
        "english" => Language::English,
        "finnish" => Language::Finnish,
        "french" => Language::French,
        "german" => Language::German,
        "greek" => Language::Greek,
        "hungarian" => Language::Hungarian,
        "italian" => Language::Italian,
        "norwegian" => Language::Norwegian,
        "portuguese" => Language::Portuguese,
        "romanian" => Language::Romanian,
        "russian" => Language::Russian,
        "spanish" => Language::Spanish,
        "swedish" => Language::Swedish,
        "tamil" => Language::Tamil,
        "turkish" => Language::Turkish,
        other => {
            return Err(Error::config(format!(
                "Language '{other}' is not supported by the embedded backend"
            )));
        }
    };
    Ok(language)
}

// ============================================================================
// Tests
// ============================================================================
