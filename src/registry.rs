// Handler Registry - tag → (handler, scope)
// Closed set of recognized tags, resolved once per line with a match.
// Anything not listed here is treated by the driver as a block opener.

use serde::{Deserialize, Serialize};

use crate::handlers::{self, FieldValue};

// ============================================================================
// TAGS
// ============================================================================

/// Every field tag the parser knows how to transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tag {
    #[serde(rename = "GIVN")]
    GivenNames,
    #[serde(rename = "SURN")]
    Surname,
    #[serde(rename = "_MARNM")]
    MarriedName,
    #[serde(rename = "SEX")]
    Sex,
    #[serde(rename = "DATE")]
    Date,
    #[serde(rename = "TIME")]
    Time,
    #[serde(rename = "PLAC")]
    Place,
    #[serde(rename = "NOTE")]
    Note,
    #[serde(rename = "_AKA")]
    Alias,
    #[serde(rename = "HUSB")]
    Husband,
    #[serde(rename = "WIFE")]
    Wife,
    #[serde(rename = "CHIL")]
    Child,
    #[serde(rename = "FAMC")]
    ChildhoodFamily,
    #[serde(rename = "FAMS")]
    AdultFamily,
    #[serde(rename = "_UID")]
    Uid,
}

/// Where a tag's value is written relative to the open block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Belongs to whatever block is open (`DATE` under `BIRT`)
    Block,
    /// Top-level field; closes any open block first
    Flat,
}

/// The transformation applied to a tag's raw value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    GivenNames,
    Surname,
    MarriedName,
    Gender,
    Date,
    Time,
    Text,
    LinkId,
}

impl Handler {
    /// Run the handler. Never fails; see `handlers` for fallbacks.
    pub fn apply(self, raw: &str) -> FieldValue {
        match self {
            Handler::GivenNames => FieldValue::Names(handlers::given_names(raw)),
            Handler::Surname => FieldValue::Text(handlers::surname(raw)),
            Handler::MarriedName => FieldValue::Text(handlers::married_name(raw)),
            Handler::Gender => FieldValue::Flag(handlers::is_male(raw)),
            Handler::Date => FieldValue::Date(handlers::parse_date(raw)),
            Handler::Time => FieldValue::Time(handlers::time_of_day(raw)),
            Handler::Text => FieldValue::Text(handlers::text(raw)),
            Handler::LinkId => FieldValue::Text(handlers::link_id(raw)),
        }
    }
}

impl Tag {
    pub const ALL: [Tag; 15] = [
        Tag::GivenNames,
        Tag::Surname,
        Tag::MarriedName,
        Tag::Sex,
        Tag::Date,
        Tag::Time,
        Tag::Place,
        Tag::Note,
        Tag::Alias,
        Tag::Husband,
        Tag::Wife,
        Tag::Child,
        Tag::ChildhoodFamily,
        Tag::AdultFamily,
        Tag::Uid,
    ];

    /// Resolve a line key; `None` for unrecognized tags
    pub fn from_key(key: &str) -> Option<Tag> {
        let tag = match key {
            "GIVN" => Tag::GivenNames,
            "SURN" => Tag::Surname,
            "_MARNM" => Tag::MarriedName,
            "SEX" => Tag::Sex,
            "DATE" => Tag::Date,
            "TIME" => Tag::Time,
            "PLAC" => Tag::Place,
            "NOTE" => Tag::Note,
            "_AKA" => Tag::Alias,
            "HUSB" => Tag::Husband,
            "WIFE" => Tag::Wife,
            "CHIL" => Tag::Child,
            "FAMC" => Tag::ChildhoodFamily,
            "FAMS" => Tag::AdultFamily,
            "_UID" => Tag::Uid,
            _ => return None,
        };
        Some(tag)
    }

    /// The literal tag as it appears in the file
    pub fn key(&self) -> &'static str {
        match self {
            Tag::GivenNames => "GIVN",
            Tag::Surname => "SURN",
            Tag::MarriedName => "_MARNM",
            Tag::Sex => "SEX",
            Tag::Date => "DATE",
            Tag::Time => "TIME",
            Tag::Place => "PLAC",
            Tag::Note => "NOTE",
            Tag::Alias => "_AKA",
            Tag::Husband => "HUSB",
            Tag::Wife => "WIFE",
            Tag::Child => "CHIL",
            Tag::ChildhoodFamily => "FAMC",
            Tag::AdultFamily => "FAMS",
            Tag::Uid => "_UID",
        }
    }

    pub fn handler(&self) -> Handler {
        match self {
            Tag::GivenNames => Handler::GivenNames,
            Tag::Surname => Handler::Surname,
            Tag::MarriedName => Handler::MarriedName,
            Tag::Sex => Handler::Gender,
            Tag::Date => Handler::Date,
            Tag::Time => Handler::Time,
            Tag::Place | Tag::Note | Tag::Alias => Handler::Text,
            Tag::Husband
            | Tag::Wife
            | Tag::Child
            | Tag::ChildhoodFamily
            | Tag::AdultFamily
            | Tag::Uid => Handler::LinkId,
        }
    }

    pub fn scope(&self) -> Scope {
        match self {
            Tag::Date | Tag::Time | Tag::Place => Scope::Block,
            _ => Scope::Flat,
        }
    }

    /// Tags that may repeat within one record and keep every occurrence
    pub fn is_list(&self) -> bool {
        matches!(self, Tag::Child | Tag::Alias)
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}
