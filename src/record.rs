// Record Accumulator - entity-in-progress and its finalized form
//
// `RecordBuilder` is the only mutable shape of a record and is owned by the
// driver. `finish` consumes it and returns an immutable `Record`; there is no
// way to write to a record once it has been handed to sinks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::handlers::FieldValue;
use crate::registry::Tag;

// ============================================================================
// CORE TYPES
// ============================================================================

/// Which entity a boundary line starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    Person,
    Family,
}

impl EntityKind {
    /// Map the record type after a boundary id (`0 @I1@ INDI`)
    pub fn from_record_type(value: &str) -> Option<EntityKind> {
        match value.trim() {
            "INDI" => Some(EntityKind::Person),
            "FAM" => Some(EntityKind::Family),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Person => "Person",
            EntityKind::Family => "Family",
        }
    }
}

/// The nested block subsequent block-scoped fields are written into
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BlockCursor {
    #[default]
    NoOpenBlock,
    OpenBlock(String),
}

/// A flat field: one value, or every occurrence for list tags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldEntry {
    One(FieldValue),
    Many(Vec<FieldValue>),
}

pub type FieldMap = BTreeMap<Tag, FieldEntry>;

/// Fields of one nested block (`BIRT` → `DATE`, `PLAC`)
pub type BlockFields = BTreeMap<Tag, FieldValue>;

// ============================================================================
// BUILDER
// ============================================================================

/// Entity-in-progress, fed by the driver one field at a time
#[derive(Debug)]
pub struct RecordBuilder {
    id: String,
    kind: EntityKind,
    fields: FieldMap,
    blocks: BTreeMap<String, BlockFields>,
    cursor: BlockCursor,
}

impl RecordBuilder {
    pub fn new(id: impl Into<String>, kind: EntityKind) -> Self {
        RecordBuilder {
            id: id.into(),
            kind,
            fields: BTreeMap::new(),
            blocks: BTreeMap::new(),
            cursor: BlockCursor::NoOpenBlock,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn cursor(&self) -> &BlockCursor {
        &self.cursor
    }

    /// Route following block-scoped fields into `block`
    ///
    /// Nothing is stored until a field arrives, so a block with no children
    /// never appears in the finished record.
    pub fn open_block(&mut self, block: impl Into<String>) {
        self.cursor = BlockCursor::OpenBlock(block.into());
    }

    pub fn close_block(&mut self) {
        self.cursor = BlockCursor::NoOpenBlock;
    }

    /// Store a handled value
    ///
    /// With a block open the value lands in that block (last write wins).
    /// Otherwise list tags append and every other tag overwrites.
    pub fn set_field(&mut self, tag: Tag, value: FieldValue) {
        if let BlockCursor::OpenBlock(block) = &self.cursor {
            self.blocks
                .entry(block.clone())
                .or_default()
                .insert(tag, value);
            return;
        }

        if tag.is_list() {
            let entry = self
                .fields
                .entry(tag)
                .or_insert_with(|| FieldEntry::Many(Vec::new()));
            match *entry {
                FieldEntry::Many(ref mut values) => values.push(value),
                // a list tag is only ever stored as Many
                FieldEntry::One(_) => *entry = FieldEntry::Many(vec![value]),
            }
        } else {
            self.fields.insert(tag, FieldEntry::One(value));
        }
    }

    /// Freeze the record
    pub fn finish(self) -> Record {
        Record {
            id: self.id,
            kind: self.kind,
            fields: self.fields,
            blocks: self.blocks,
        }
    }
}

// ============================================================================
// FINALIZED RECORD
// ============================================================================

/// Immutable accumulated data of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    id: String,
    #[serde(rename = "type")]
    kind: EntityKind,
    #[serde(rename = "data")]
    fields: FieldMap,
    #[serde(rename = "mdata")]
    blocks: BTreeMap<String, BlockFields>,
}

impl Record {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    pub fn blocks(&self) -> &BTreeMap<String, BlockFields> {
        &self.blocks
    }

    /// Scalar flat field (the latest value for list tags)
    pub fn field(&self, tag: Tag) -> Option<&FieldValue> {
        match self.fields.get(&tag)? {
            FieldEntry::One(v) => Some(v),
            FieldEntry::Many(vs) => vs.last(),
        }
    }

    /// Every occurrence of a flat field, in file order
    pub fn list(&self, tag: Tag) -> &[FieldValue] {
        match self.fields.get(&tag) {
            Some(FieldEntry::Many(vs)) => vs,
            Some(FieldEntry::One(v)) => std::slice::from_ref(v),
            None => &[],
        }
    }

    pub fn text(&self, tag: Tag) -> Option<&str> {
        self.field(tag).and_then(FieldValue::as_text)
    }

    /// Text of every occurrence of a list field
    pub fn texts(&self, tag: Tag) -> Vec<String> {
        self.list(tag)
            .iter()
            .filter_map(FieldValue::as_text)
            .map(str::to_string)
            .collect()
    }

    pub fn block(&self, block: &str) -> Option<&BlockFields> {
        self.blocks.get(block)
    }

    pub fn block_field(&self, block: &str, tag: Tag) -> Option<&FieldValue> {
        self.block(block)?.get(&tag)
    }
}
