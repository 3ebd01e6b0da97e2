//! Decoded universe object model.
//!
//! Plain data holders produced by one decode pass; nothing here has
//! behavior beyond lookups and counting. String fields are `Option` because
//! the format distinguishes an absent field (zero length prefix) from an
//! empty one.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

/// Aggregate root owning every decoded entity.
#[derive(Debug)]
pub struct Universe {
    pub parameters: Parameters,
    /// Name/value pairs from the designer parameter tab. Duplicate names
    /// overwrite earlier ones.
    pub custom_parameters: BTreeMap<String, String>,
    pub tables: Vec<Table>,
    pub virtual_tables: Vec<VirtualTable>,
    /// Sorted ascending by id after decoding (read order is table-grouped).
    pub columns: Vec<Column>,
    pub joins: Vec<Join>,
    pub contexts: Vec<Context>,
    pub links: Vec<Link>,
    pub hierarchies: Vec<Hierarchy>,
    /// Root classes of the class/object/condition tree.
    pub classes: Vec<Class>,
    /// Optional trailer sections captured verbatim, in catalog order.
    pub opaque_sections: Vec<OpaqueSection>,
    pub(crate) table_index: HashMap<u32, usize>,
}

impl Universe {
    pub fn table_by_id(&self, id: u32) -> Option<&Table> {
        self.table_index.get(&id).map(|&i| &self.tables[i])
    }

    pub fn opaque_section(&self, marker: &str) -> Option<&OpaqueSection> {
        self.opaque_sections.iter().find(|s| s.marker == marker)
    }

    pub fn class_count(&self) -> usize {
        fn walk(c: &Class) -> usize {
            1 + c.subclasses.iter().map(walk).sum::<usize>()
        }
        self.classes.iter().map(walk).sum()
    }

    pub fn object_count(&self) -> usize {
        fn walk(c: &Class) -> usize {
            c.objects.len() + c.subclasses.iter().map(walk).sum::<usize>()
        }
        self.classes.iter().map(walk).sum()
    }

    pub fn condition_count(&self) -> usize {
        fn walk(c: &Class) -> usize {
            c.conditions.len() + c.subclasses.iter().map(walk).sum::<usize>()
        }
        self.classes.iter().map(walk).sum()
    }
}

/// Global universe metadata from the `Parameters;` section.
#[derive(Debug, Clone)]
pub struct Parameters {
    pub universe_filename: Option<String>,
    pub universe_name: Option<String>,
    pub revision: u32,
    pub description: Option<String>,
    pub created_by: Option<String>,
    pub modified_by: Option<String>,
    pub created_date: NaiveDate,
    pub modified_date: NaiveDate,
    /// Stored on disk in seconds, exposed in minutes.
    pub query_time_limit_minutes: u32,
    pub query_row_limit: u32,
    pub object_strategy: Option<String>,
    /// Stored on disk in seconds, exposed in minutes.
    pub cost_estimate_warning_limit_minutes: u32,
    pub long_text_limit: u32,
    pub comments: Option<String>,
    pub domain: Option<String>,
    pub dbms_engine: Option<String>,
    pub network_layer: Option<String>,
}

/// Schema table. Root tables have `parent_id` 0.
#[derive(Debug, Clone)]
pub struct Table {
    pub id: u32,
    pub parent_id: u32,
    pub name: Option<String>,
    pub schema: Option<String>,
}

/// Derived table defined by a raw select statement; no parent linkage.
#[derive(Debug, Clone)]
pub struct VirtualTable {
    pub table_id: u32,
    pub select: Option<String>,
}

/// Source database column. `table_id` is validated against the table
/// index during decoding, so it always resolves on a decoded model.
#[derive(Debug, Clone)]
pub struct Column {
    pub id: u32,
    pub table_id: u32,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Join {
    pub id: u32,
    pub expression: Option<String>,
    /// Term order is significant and preserved from the file.
    pub terms: Vec<JoinTerm>,
}

#[derive(Debug, Clone)]
pub struct JoinTerm {
    pub name: Option<String>,
    pub table_id: u32,
}

/// Named set of joins used to resolve ambiguous join paths. The referenced
/// join ids are not validated at this layer.
#[derive(Debug, Clone)]
pub struct Context {
    pub id: u32,
    pub name: Option<String>,
    pub description: Option<String>,
    pub join_ids: Vec<u32>,
}

/// Reference to another universe's objects.
#[derive(Debug, Clone)]
pub struct Link {
    pub id: u32,
    pub name: Option<String>,
    pub description: Option<String>,
    pub linked_universe: Option<String>,
}

/// Ordered chain of object ids for drill-down navigation.
#[derive(Debug, Clone)]
pub struct Hierarchy {
    pub id: u32,
    pub name: Option<String>,
    pub description: Option<String>,
    pub level_object_ids: Vec<u32>,
}

/// Folder-like grouping node. Owns its objects, conditions, and child
/// classes; the tree cannot contain cycles because every node is read
/// inline from its parent's byte stream. `parent_id` is 0 for roots and
/// otherwise equals the owning class id (enforced during decoding).
#[derive(Debug, Clone)]
pub struct Class {
    pub id: u32,
    pub parent_id: u32,
    pub name: Option<String>,
    pub description: Option<String>,
    pub objects: Vec<Object>,
    pub conditions: Vec<Condition>,
    pub subclasses: Vec<Class>,
}

/// Computed/selectable business field.
#[derive(Debug, Clone)]
pub struct Object {
    pub id: u32,
    pub parent_id: u32,
    pub name: Option<String>,
    pub description: Option<String>,
    pub select_table_ids: Vec<u32>,
    pub where_table_ids: Vec<u32>,
    pub select: Option<String>,
    pub where_clause: Option<String>,
    pub format: Option<String>,
    /// Trailing string of unknown purpose, kept as read.
    pub aux_text: Option<String>,
    pub lov_name: Option<String>,
    /// Derived from a sentinel byte: 0x36 means hidden, anything else
    /// visible. A quirk of this format, not a general boolean encoding.
    pub visible: bool,
}

/// Reusable filter predicate.
#[derive(Debug, Clone)]
pub struct Condition {
    pub id: u32,
    pub parent_id: u32,
    pub name: Option<String>,
    pub description: Option<String>,
    pub where_table_ids: Vec<u32>,
    pub aux_table_ids: Vec<u32>,
    pub where_clause: Option<String>,
}

/// Uninterpreted byte span of an optional trailer section. The span runs
/// from the marker's content offset to the nearest following resolved
/// offset (or end of file), so it may include the next section's label
/// bytes; consumers treat the whole thing as a blob.
#[derive(Debug, Clone)]
pub struct OpaqueSection {
    pub marker: &'static str,
    pub offset: usize,
    pub data: Vec<u8>,
}
