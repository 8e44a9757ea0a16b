use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Serialize;
use termbase_types::Language;

use crate::codec::Codec;

/// Capabilities of one storable kind.
///
/// A kind fixes where its objects live (`<DIR>/<FILE_PREFIX>-<id>.<EXTENSION>`),
/// how they are encoded, and what the index keeps about each of them.
pub trait Kind: Clone + Send + Sync + 'static {
    type Id: Copy + Ord + Hash + Debug + Display + FromStr + Serialize + DeserializeOwned + Send + Sync;

    /// What the index holds per object; enough to answer queries without
    /// opening files.
    type Summary: Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync;

    type Codec: Codec<Object = Self> + Default;

    /// Kind name, also the directory the objects live in.
    const DIR: &'static str;
    const FILE_PREFIX: &'static str;
    const EXTENSION: &'static str;

    fn id(&self) -> Self::Id;

    fn summarize(&self) -> Self::Summary;

    /// The display field queries match against in `lang`, or `None` when
    /// the object has no variant in that language.
    fn display_field(summary: &Self::Summary, lang: Language) -> Option<&str>;

    /// The id after `highest`, or the first id when there is none.
    fn next_id(highest: Option<Self::Id>) -> Self::Id;

    /// Hook applied to every object after decoding.
    fn post_load(self) -> Self {
        self
    }

    /// Case-insensitive substring match of an already-normalized query
    /// against the trimmed display field. Objects with no display field in
    /// `lang` never match a query.
    fn matches_query(summary: &Self::Summary, query: &str, lang: Language) -> bool {
        Self::display_field(summary, lang)
            .map(|field| field.trim().to_lowercase().contains(query))
            .unwrap_or(false)
    }

    fn has_language(summary: &Self::Summary, lang: Language) -> bool {
        Self::display_field(summary, lang).is_some()
    }

    fn file_name(id: Self::Id) -> String {
        format!("{}-{}.{}", Self::FILE_PREFIX, id, Self::EXTENSION)
    }

    /// Path of the object relative to the working directory.
    fn relative_path(id: Self::Id) -> String {
        format!("{}/{}", Self::DIR, Self::file_name(id))
    }

    /// Inverse of [`Kind::file_name`]; `None` for files that are not ours.
    fn parse_file_name(name: &str) -> Option<Self::Id> {
        let stem = name
            .strip_prefix(Self::FILE_PREFIX)?
            .strip_prefix('-')?
            .strip_suffix(Self::EXTENSION)?
            .strip_suffix('.')?;
        let id: Self::Id = stem.parse().ok()?;
        (Self::file_name(id) == name).then_some(id)
    }

    /// Inverse of [`Kind::relative_path`].
    fn parse_relative_path(path: &str) -> Option<Self::Id> {
        let name = path.strip_prefix(Self::DIR)?.strip_prefix('/')?;
        Self::parse_file_name(name)
    }
}
