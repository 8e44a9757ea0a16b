//! The concept kind: YAML records under `concepts/`.
//!
//! On disk the identifier is stored as `termid`; in memory (and in the JSON
//! API) it is `id`. The rename is applied here, in both directions, and
//! nowhere else.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use termbase_types::{Concept, ConceptId, Language, TypeError};

use crate::codec::{Codec, CodecError};
use crate::kind::Kind;

const ID_KEY: &str = "termid";
const TERM_KEY: &str = "term";

/// Index summary of a concept.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptSummary {
    /// Default-language display term.
    pub term: String,
    pub localized: BTreeMap<Language, LocalizedSummary>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedSummary {
    pub term: String,
    pub has_comments: bool,
    pub has_notes: bool,
}

/// YAML codec for [`Concept`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ConceptCodec;

fn type_error(err: TypeError) -> CodecError {
    match err {
        TypeError::InvalidField { field, reason } => CodecError::new(field, reason),
        TypeError::UnsupportedLanguage(code) => {
            CodecError::new(code.clone(), format!("unsupported language code {code:?}"))
        }
        TypeError::InvalidId(raw) => CodecError::new(ID_KEY, format!("invalid id {raw:?}")),
    }
}

fn parse_id(value: &Value) -> Result<ConceptId, CodecError> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(ConceptId::new)
            .ok_or_else(|| CodecError::new(ID_KEY, format!("{n} is not a non-negative integer"))),
        Value::String(s) => s.parse().map_err(type_error),
        _ => Err(CodecError::new(ID_KEY, "expected an integer")),
    }
}

fn is_reserved(key: &str) -> bool {
    key == ID_KEY || key == TERM_KEY || Language::looks_like_code(key)
}

impl Codec for ConceptCodec {
    type Object = Concept;

    fn serialize(&self, concept: &Concept) -> Result<Vec<u8>, CodecError> {
        concept.validate().map_err(type_error)?;

        let mut map = Mapping::new();
        map.insert(ID_KEY.into(), Value::from(concept.id.get()));
        map.insert(TERM_KEY.into(), Value::from(concept.term.as_str()));
        for (lang, localized) in &concept.localizations {
            let value = serde_yaml::to_value(localized)
                .map_err(|e| CodecError::new(lang.code(), e.to_string()))?;
            map.insert(lang.code().into(), value);
        }
        for (key, value) in &concept.extra {
            if is_reserved(key) {
                return Err(CodecError::new(key.as_str(), "reserved key in extra fields"));
            }
            map.insert(key.as_str().into(), value.clone());
        }

        serde_yaml::to_string(&Value::Mapping(map))
            .map(String::into_bytes)
            .map_err(|e| CodecError::new("<document>", e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Concept, CodecError> {
        let value: Value = serde_yaml::from_slice(bytes)
            .map_err(|e| CodecError::new("<document>", e.to_string()))?;
        let Value::Mapping(map) = value else {
            return Err(CodecError::new("<document>", "expected a mapping"));
        };

        let mut id = None;
        let mut term = None;
        let mut rest = BTreeMap::new();
        for (key, value) in map {
            let key = match key {
                Value::String(key) => key,
                other => return Err(CodecError::new("<key>", format!("non-string key {other:?}"))),
            };
            match key.as_str() {
                ID_KEY => id = Some(parse_id(&value)?),
                TERM_KEY => match value {
                    Value::String(s) => term = Some(s),
                    _ => return Err(CodecError::new(TERM_KEY, "expected a string")),
                },
                _ => {
                    rest.insert(key, value);
                }
            }
        }

        let id = id.ok_or_else(|| CodecError::new(ID_KEY, "missing"))?;
        let term = term.ok_or_else(|| CodecError::new(TERM_KEY, "missing"))?;
        let concept = Concept::from_parts(id, term, rest).map_err(type_error)?;
        concept.validate().map_err(type_error)?;
        Ok(concept)
    }
}

impl Kind for Concept {
    type Id = ConceptId;
    type Summary = ConceptSummary;
    type Codec = ConceptCodec;

    const DIR: &'static str = "concepts";
    const FILE_PREFIX: &'static str = "concept";
    const EXTENSION: &'static str = "yaml";

    fn id(&self) -> ConceptId {
        self.id
    }

    fn summarize(&self) -> ConceptSummary {
        ConceptSummary {
            term: self.term.clone(),
            localized: self
                .localizations
                .iter()
                .map(|(lang, l)| {
                    let summary = LocalizedSummary {
                        term: l.term.clone(),
                        has_comments: l.has_comments(),
                        has_notes: l.has_notes(),
                    };
                    (*lang, summary)
                })
                .collect(),
        }
    }

    /// The localized term, or the top-level term for the default language
    /// when the record has no default-language variant.
    fn display_field(summary: &ConceptSummary, lang: Language) -> Option<&str> {
        match summary.localized.get(&lang) {
            Some(localized) => Some(localized.term.as_str()),
            None if lang == Language::DEFAULT => Some(summary.term.as_str()),
            None => None,
        }
    }

    fn has_language(summary: &ConceptSummary, lang: Language) -> bool {
        summary.localized.contains_key(&lang)
    }

    fn next_id(highest: Option<ConceptId>) -> ConceptId {
        highest.map_or(ConceptId::new(1), ConceptId::next)
    }
}
