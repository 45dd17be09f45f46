// Entity Model - typed Person / Family views over finalized records
//
// Event blocks used by the accessors:
//   BIRT, DEAT, BURI  (person life events)
//   MARR              (family marriage)
//   CHAN              (last change: DATE + TIME)

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::handlers::{self, FieldValue, PartialDate};
use crate::record::{EntityKind, Record};
use crate::registry::Tag;

pub const BIRTH: &str = "BIRT";
pub const DEATH: &str = "DEAT";
pub const BURIAL: &str = "BURI";
pub const MARRIAGE: &str = "MARR";
pub const CHANGE: &str = "CHAN";

/// Date of an event block, all parts absent when not recorded
fn event_date(record: &Record, block: &str) -> PartialDate {
    record
        .block_field(block, Tag::Date)
        .and_then(FieldValue::as_date)
        .unwrap_or_default()
}

fn event_place<'a>(record: &'a Record, block: &str) -> Option<&'a str> {
    record
        .block_field(block, Tag::Place)
        .and_then(FieldValue::as_text)
}

// ============================================================================
// PERSON
// ============================================================================

/// An individual (`0 @I1@ INDI`)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Person {
    record: Record,
}

impl Person {
    pub fn id(&self) -> &str {
        self.record.id()
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    /// All given names, first name included
    pub fn given_names(&self) -> &[String] {
        self.record
            .field(Tag::GivenNames)
            .and_then(FieldValue::as_names)
            .unwrap_or(&[])
    }

    /// First given name, empty if none recorded
    pub fn first_name(&self) -> &str {
        self.given_names().first().map(String::as_str).unwrap_or("")
    }

    pub fn surname(&self) -> &str {
        self.record.text(Tag::Surname).unwrap_or("")
    }

    /// Surname after marriage; the birth surname when no `_MARNM` was given
    pub fn married_name(&self) -> &str {
        self.record
            .text(Tag::MarriedName)
            .unwrap_or_else(|| self.surname())
    }

    pub fn aliases(&self) -> Vec<String> {
        self.record.texts(Tag::Alias)
    }

    /// Defaults to `true` when `SEX` is missing. Downstream tables rely on it.
    pub fn is_male(&self) -> bool {
        self.record
            .field(Tag::Sex)
            .and_then(FieldValue::as_flag)
            .unwrap_or(true)
    }

    pub fn note(&self) -> &str {
        self.record.text(Tag::Note).unwrap_or("")
    }

    pub fn uid(&self) -> Option<&str> {
        self.record.text(Tag::Uid)
    }

    pub fn birth(&self) -> PartialDate {
        event_date(&self.record, BIRTH)
    }

    pub fn death(&self) -> PartialDate {
        event_date(&self.record, DEATH)
    }

    pub fn burial(&self) -> PartialDate {
        event_date(&self.record, BURIAL)
    }

    pub fn birth_place(&self) -> &str {
        event_place(&self.record, BIRTH).unwrap_or("")
    }

    pub fn death_place(&self) -> &str {
        event_place(&self.record, DEATH).unwrap_or("")
    }

    pub fn burial_place(&self) -> &str {
        event_place(&self.record, BURIAL).unwrap_or("")
    }

    /// Family the person was born into (`FAMC`)
    pub fn childhood_family_id(&self) -> Option<&str> {
        self.record.text(Tag::ChildhoodFamily)
    }

    /// Family the person married into (`FAMS`)
    pub fn adult_family_id(&self) -> Option<&str> {
        self.record.text(Tag::AdultFamily)
    }

    /// When the record was last changed, from the `CHAN` block
    pub fn last_updated(&self) -> Option<NaiveDateTime> {
        let change = self.record.block(CHANGE)?;
        let date = change.get(&Tag::Date).and_then(FieldValue::as_date)?;
        let time = change.get(&Tag::Time).and_then(FieldValue::as_time);
        handlers::change_timestamp(&date, time)
    }
}

// ============================================================================
// FAMILY
// ============================================================================

/// A couple and their children (`0 @F1@ FAM`)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Family {
    record: Record,
}

impl Family {
    pub fn id(&self) -> &str {
        self.record.id()
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn husband_id(&self) -> Option<&str> {
        self.record.text(Tag::Husband)
    }

    pub fn wife_id(&self) -> Option<&str> {
        self.record.text(Tag::Wife)
    }

    pub fn marriage(&self) -> PartialDate {
        event_date(&self.record, MARRIAGE)
    }

    pub fn marriage_place(&self) -> Option<&str> {
        event_place(&self.record, MARRIAGE)
    }

    /// Child ids in file order
    pub fn children_ids(&self) -> Vec<String> {
        self.record.texts(Tag::Child)
    }

    pub fn num_children(&self) -> usize {
        self.record.list(Tag::Child).len()
    }

    pub fn note(&self) -> &str {
        self.record.text(Tag::Note).unwrap_or("")
    }
}

// ============================================================================
// ENTITY
// ============================================================================

/// A finalized record, ready for the sinks
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Entity {
    Person(Person),
    Family(Family),
}

impl Entity {
    pub fn id(&self) -> &str {
        match self {
            Entity::Person(p) => p.id(),
            Entity::Family(f) => f.id(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Person(_) => EntityKind::Person,
            Entity::Family(_) => EntityKind::Family,
        }
    }

    pub fn as_person(&self) -> Option<&Person> {
        match self {
            Entity::Person(p) => Some(p),
            Entity::Family(_) => None,
        }
    }

    pub fn as_family(&self) -> Option<&Family> {
        match self {
            Entity::Family(f) => Some(f),
            Entity::Person(_) => None,
        }
    }
}

impl From<Record> for Entity {
    fn from(record: Record) -> Self {
        match record.kind() {
            EntityKind::Person => Entity::Person(Person { record }),
            EntityKind::Family => Entity::Family(Family { record }),
        }
    }
}
