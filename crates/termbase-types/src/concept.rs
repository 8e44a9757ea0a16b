//! Concept records: the unit persisted by the store.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::error::TypeError;
use crate::id::ConceptId;
use crate::language::Language;

/// A glossary concept.
///
/// `term` is the display term in [`Language::DEFAULT`]; each localized
/// variant lives in `localizations` under its language. Fields this type does
/// not model are kept in `extra` so that rewriting a record never drops data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ConceptFields")]
pub struct Concept {
    pub id: ConceptId,
    pub term: String,
    #[serde(flatten)]
    pub localizations: BTreeMap<Language, LocalizedConcept>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Concept {
    /// Create a concept with a default-language term and no localizations.
    pub fn new(id: ConceptId, term: impl Into<String>) -> Self {
        Self {
            id,
            term: term.into(),
            localizations: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Assemble a concept from its id, display term, and the remaining
    /// top-level fields. Language-code keys become localized variants; any
    /// other key is kept in `extra`.
    pub fn from_parts(
        id: ConceptId,
        term: String,
        rest: BTreeMap<String, serde_yaml::Value>,
    ) -> Result<Self, TypeError> {
        let mut concept = Self::new(id, term);
        for (key, value) in rest {
            if !Language::looks_like_code(&key) {
                concept.extra.insert(key, value);
                continue;
            }
            let lang: Language = key.parse()?;
            let localized = LocalizedConcept::from_value(lang, value)?;
            concept.localizations.insert(lang, localized);
        }
        Ok(concept)
    }

    /// Builder-style variant of [`Concept::set_localized`].
    pub fn with_localized(mut self, localized: LocalizedConcept) -> Self {
        self.set_localized(localized);
        self
    }

    /// The localized variant for `lang`, if present.
    pub fn localized(&self, lang: Language) -> Option<&LocalizedConcept> {
        self.localizations.get(&lang)
    }

    pub fn localized_mut(&mut self, lang: Language) -> Option<&mut LocalizedConcept> {
        self.localizations.get_mut(&lang)
    }

    /// Insert or replace the variant keyed by its own `language_code`.
    ///
    /// Setting the default-language variant also updates the display term.
    pub fn set_localized(&mut self, localized: LocalizedConcept) -> Option<LocalizedConcept> {
        if localized.language_code == Language::DEFAULT {
            self.term = localized.term.clone();
        }
        self.localizations.insert(localized.language_code, localized)
    }

    /// The term shown for `lang`, or `None` when that variant is missing.
    pub fn term_in(&self, lang: Language) -> Option<&str> {
        self.localized(lang).map(|l| l.term.as_str())
    }

    /// Languages this concept has a localized variant for.
    pub fn languages(&self) -> impl Iterator<Item = Language> + '_ {
        self.localizations.keys().copied()
    }

    /// Check field-level constraints not expressible in the type itself.
    pub fn validate(&self) -> Result<(), TypeError> {
        if self.term.trim().is_empty() {
            return Err(TypeError::field("term", "must not be blank"));
        }
        for (lang, localized) in &self.localizations {
            if localized.language_code != *lang {
                return Err(TypeError::field(
                    format!("{lang}.language_code"),
                    format!("{} does not match its key", localized.language_code),
                ));
            }
            if let Some(source) = &localized.authoritative_source {
                source.validate().map_err(|reason| {
                    TypeError::field(format!("{lang}.authoritative_source.link"), reason)
                })?;
            }
        }
        Ok(())
    }
}

/// One language variant of a concept.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocalizedConcept {
    pub language_code: Language,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ConceptId>,
    pub term: String,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub definition: String,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authoritative_source: Option<AuthoritativeSource>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl LocalizedConcept {
    pub fn new(language_code: Language, term: impl Into<String>) -> Self {
        Self {
            language_code,
            id: None,
            term: term.into(),
            definition: String::new(),
            comments: Vec::new(),
            examples: Vec::new(),
            notes: Vec::new(),
            authoritative_source: None,
            extra: BTreeMap::new(),
        }
    }

    /// Decode the variant stored under `lang`, filling in `language_code`
    /// from the key when the record omits it.
    pub fn from_value(lang: Language, value: serde_yaml::Value) -> Result<Self, TypeError> {
        let value = match value {
            serde_yaml::Value::Mapping(mut map) => {
                let key = serde_yaml::Value::from("language_code");
                if !map.contains_key(&key) {
                    map.insert(key, serde_yaml::Value::from(lang.code()));
                }
                serde_yaml::Value::Mapping(map)
            }
            _ => return Err(TypeError::field(lang.code(), "expected a mapping")),
        };
        serde_yaml::from_value(value).map_err(|e| TypeError::field(lang.code(), e.to_string()))
    }

    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = definition.into();
        self
    }

    pub fn with_source(mut self, link: impl Into<String>) -> Self {
        self.authoritative_source = Some(AuthoritativeSource::new(link));
        self
    }

    pub fn has_comments(&self) -> bool {
        !self.comments.is_empty()
    }

    pub fn has_notes(&self) -> bool {
        !self.notes.is_empty()
    }
}

/// Where a definition comes from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthoritativeSource {
    pub link: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl AuthoritativeSource {
    pub fn new(link: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            extra: BTreeMap::new(),
        }
    }

    /// The parsed link. A blank link means "no source recorded yet".
    pub fn url(&self) -> Option<Result<Url, url::ParseError>> {
        let link = self.link.trim();
        (!link.is_empty()).then(|| Url::parse(link))
    }

    fn validate(&self) -> Result<(), String> {
        match self.url() {
            Some(Err(e)) => Err(format!("{:?} is not a valid URL: {e}", self.link)),
            _ => Ok(()),
        }
    }
}

#[derive(Deserialize)]
struct ConceptFields {
    id: ConceptId,
    term: String,
    #[serde(flatten)]
    rest: BTreeMap<String, serde_yaml::Value>,
}

impl TryFrom<ConceptFields> for Concept {
    type Error = TypeError;

    fn try_from(fields: ConceptFields) -> Result<Self, Self::Error> {
        Concept::from_parts(fields.id, fields.term, fields.rest)
    }
}

/// Accept an explicit YAML/JSON `null` wherever a default value is allowed.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crs() -> Concept {
        Concept::new(ConceptId::new(32), "Coordinate Reference System").with_localized(
            LocalizedConcept::new(Language::Eng, "Coordinate Reference System")
                .with_definition("coordinate system related to an object by a datum")
                .with_source("https://www.iso.org/standard/74039.html"),
        )
    }

    #[test]
    fn valid_concept_passes() {
        assert_eq!(crs().validate(), Ok(()));
    }

    #[test]
    fn blank_term_is_rejected() {
        let mut c = crs();
        c.term = "   ".into();
        let err = c.validate().unwrap_err();
        assert!(matches!(err, TypeError::InvalidField { ref field, .. } if field == "term"));
    }

    #[test]
    fn invalid_link_is_rejected_with_field_path() {
        let c = crs().with_localized(
            LocalizedConcept::new(Language::Fra, "Système de référence").with_source("not a url"),
        );
        let err = c.validate().unwrap_err();
        match err {
            TypeError::InvalidField { field, .. } => {
                assert_eq!(field, "fra.authoritative_source.link")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn blank_link_is_allowed() {
        let c = crs().with_localized(LocalizedConcept::new(Language::Deu, "KBS").with_source(""));
        assert_eq!(c.validate(), Ok(()));
    }

    #[test]
    fn mismatched_language_code_is_rejected() {
        let mut c = crs();
        c.localizations
            .insert(Language::Spa, LocalizedConcept::new(Language::Ita, "x"));
        assert!(c.validate().is_err());
    }

    #[test]
    fn setting_default_language_updates_term() {
        let mut c = crs();
        c.set_localized(LocalizedConcept::new(Language::Eng, "CRS"));
        assert_eq!(c.term, "CRS");
        c.set_localized(LocalizedConcept::new(Language::Fra, "SRC"));
        assert_eq!(c.term, "CRS");
        assert_eq!(c.term_in(Language::Fra), Some("SRC"));
        assert_eq!(c.term_in(Language::Jpn), None);
    }

    #[test]
    fn json_shape_uses_internal_id_and_language_keys() {
        let json = serde_json::to_value(crs()).unwrap();
        assert_eq!(json["id"], 32);
        assert_eq!(json["eng"]["term"], "Coordinate Reference System");
        assert!(json.get("termid").is_none());
        let back: Concept = serde_json::from_value(json).unwrap();
        assert_eq!(back, crs());
    }

    #[test]
    fn json_extras_survive_alongside_languages() {
        let json = serde_json::json!({
            "id": 7,
            "term": "datum",
            "status": "valid",
            "eng": { "term": "datum" },
        });
        let c: Concept = serde_json::from_value(json).unwrap();
        assert_eq!(c.extra["status"], serde_yaml::Value::from("valid"));
        assert_eq!(c.localized(Language::Eng).unwrap().language_code, Language::Eng);
        let back = serde_json::to_value(&c).unwrap();
        assert_eq!(back["status"], "valid");
        assert!(back.get("extra").is_none());
        let again: Concept = serde_json::from_value(back).unwrap();
        assert_eq!(again, c);
    }

    #[test]
    fn empty_fields_are_not_written() {
        let json = serde_json::to_value(LocalizedConcept::new(Language::Eng, "datum")).unwrap();
        assert_eq!(json, serde_json::json!({ "language_code": "eng", "term": "datum" }));
    }

    #[test]
    fn unsupported_language_key_is_an_error() {
        let rest = BTreeMap::from([("xxx".to_string(), serde_yaml::Value::Null)]);
        let err = Concept::from_parts(ConceptId::new(1), "t".into(), rest).unwrap_err();
        assert_eq!(err, TypeError::UnsupportedLanguage("xxx".into()));
    }

    #[test]
    fn null_collections_deserialize_as_empty() {
        let json = serde_json::json!({
            "language_code": "eng",
            "term": "datum",
            "definition": null,
            "notes": null,
        });
        let l: LocalizedConcept = serde_json::from_value(json).unwrap();
        assert!(l.notes.is_empty());
        assert_eq!(l.definition, "");
    }
}
