use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::TypeError;

/// A supported language, identified by its ISO 639-2 three-letter code.
///
/// The set is closed: records carrying a localized block for any other
/// language are rejected when they are loaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Language {
    Ara,
    Dan,
    Deu,
    Eng,
    Fin,
    Fra,
    Ita,
    Jpn,
    Kor,
    Msa,
    Nld,
    Nno,
    Nob,
    Pol,
    Por,
    Rus,
    Spa,
    Srp,
    Swe,
    Zho,
}

impl Language {
    /// Every supported language, in code order.
    pub const ALL: [Language; 20] = [
        Language::Ara,
        Language::Dan,
        Language::Deu,
        Language::Eng,
        Language::Fin,
        Language::Fra,
        Language::Ita,
        Language::Jpn,
        Language::Kor,
        Language::Msa,
        Language::Nld,
        Language::Nno,
        Language::Nob,
        Language::Pol,
        Language::Por,
        Language::Rus,
        Language::Spa,
        Language::Srp,
        Language::Swe,
        Language::Zho,
    ];

    /// The language the `term` field of a concept is written in.
    pub const DEFAULT: Language = Language::Eng;

    /// The three-letter code used as the record key on disk.
    pub fn code(self) -> &'static str {
        match self {
            Language::Ara => "ara",
            Language::Dan => "dan",
            Language::Deu => "deu",
            Language::Eng => "eng",
            Language::Fin => "fin",
            Language::Fra => "fra",
            Language::Ita => "ita",
            Language::Jpn => "jpn",
            Language::Kor => "kor",
            Language::Msa => "msa",
            Language::Nld => "nld",
            Language::Nno => "nno",
            Language::Nob => "nob",
            Language::Pol => "pol",
            Language::Por => "por",
            Language::Rus => "rus",
            Language::Spa => "spa",
            Language::Srp => "srp",
            Language::Swe => "swe",
            Language::Zho => "zho",
        }
    }

    /// Returns `true` if `key` has the shape of a language code
    /// (three lowercase ASCII letters), whether or not it is supported.
    pub fn looks_like_code(key: &str) -> bool {
        key.len() == 3 && key.bytes().all(|b| b.is_ascii_lowercase())
    }
}

impl Default for Language {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .iter()
            .copied()
            .find(|lang| lang.code() == s)
            .ok_or_else(|| TypeError::UnsupportedLanguage(s.to_string()))
    }
}

impl Serialize for Language {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CodeVisitor;

        impl Visitor<'_> for CodeVisitor {
            type Value = Language;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an ISO 639-2 language code")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Language, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(CodeVisitor)
    }
}
