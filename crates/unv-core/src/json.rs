//! JSON view of a decoded universe, for the CLI and other consumers.

use std::path::Path;

use serde_json::{Map, Value, json};

use crate::error::Result;
use crate::files::find_universe_files;
use crate::model::{Class, Universe};
use crate::reader::decode_file;

#[derive(Clone, Copy)]
pub struct JsonOpts {
    /// Include a summary entry per captured opaque trailer section.
    pub include_opaque: bool,
}

impl Default for JsonOpts {
    fn default() -> Self {
        Self {
            include_opaque: false,
        }
    }
}

pub fn universe_to_json(u: &Universe, opts: JsonOpts) -> Value {
    let p = &u.parameters;
    let mut root = Map::new();
    root.insert(
        "parameters".into(),
        json!({
            "universe_filename": p.universe_filename,
            "universe_name": p.universe_name,
            "revision": p.revision,
            "description": p.description,
            "created_by": p.created_by,
            "modified_by": p.modified_by,
            "created_date": p.created_date.to_string(),
            "modified_date": p.modified_date.to_string(),
            "query_time_limit_minutes": p.query_time_limit_minutes,
            "query_row_limit": p.query_row_limit,
            "object_strategy": p.object_strategy,
            "cost_estimate_warning_limit_minutes": p.cost_estimate_warning_limit_minutes,
            "long_text_limit": p.long_text_limit,
            "comments": p.comments,
            "domain": p.domain,
            "dbms_engine": p.dbms_engine,
            "network_layer": p.network_layer,
        }),
    );
    root.insert("custom_parameters".into(), json!(u.custom_parameters));
    root.insert(
        "tables".into(),
        u.tables
            .iter()
            .map(|t| {
                json!({
                    "id": t.id,
                    "parent_id": t.parent_id,
                    "name": t.name,
                    "schema": t.schema,
                })
            })
            .collect(),
    );
    root.insert(
        "virtual_tables".into(),
        u.virtual_tables
            .iter()
            .map(|vt| json!({ "table_id": vt.table_id, "select": vt.select }))
            .collect(),
    );
    root.insert(
        "columns".into(),
        u.columns
            .iter()
            .map(|c| json!({ "id": c.id, "table_id": c.table_id, "name": c.name }))
            .collect(),
    );
    root.insert(
        "joins".into(),
        u.joins
            .iter()
            .map(|j| {
                json!({
                    "id": j.id,
                    "expression": j.expression,
                    "terms": j.terms.iter()
                        .map(|t| json!({ "name": t.name, "table_id": t.table_id }))
                        .collect::<Value>(),
                })
            })
            .collect(),
    );
    root.insert(
        "contexts".into(),
        u.contexts
            .iter()
            .map(|c| {
                json!({
                    "id": c.id,
                    "name": c.name,
                    "description": c.description,
                    "join_ids": c.join_ids,
                })
            })
            .collect(),
    );
    root.insert(
        "links".into(),
        u.links
            .iter()
            .map(|l| {
                json!({
                    "id": l.id,
                    "name": l.name,
                    "description": l.description,
                    "linked_universe": l.linked_universe,
                })
            })
            .collect(),
    );
    root.insert(
        "hierarchies".into(),
        u.hierarchies
            .iter()
            .map(|h| {
                json!({
                    "id": h.id,
                    "name": h.name,
                    "description": h.description,
                    "level_object_ids": h.level_object_ids,
                })
            })
            .collect(),
    );
    root.insert(
        "classes".into(),
        u.classes.iter().map(class_to_json).collect(),
    );
    if opts.include_opaque {
        root.insert(
            "opaque_sections".into(),
            u.opaque_sections
                .iter()
                .map(|s| json!({ "marker": s.marker, "offset": s.offset, "len": s.data.len() }))
                .collect(),
        );
    }
    Value::Object(root)
}

fn class_to_json(c: &Class) -> Value {
    json!({
        "id": c.id,
        "name": c.name,
        "description": c.description,
        "objects": c.objects.iter().map(|o| json!({
            "id": o.id,
            "name": o.name,
            "description": o.description,
            "select_table_ids": o.select_table_ids,
            "where_table_ids": o.where_table_ids,
            "select": o.select,
            "where": o.where_clause,
            "format": o.format,
            "lov_name": o.lov_name,
            "visible": o.visible,
        })).collect::<Value>(),
        "conditions": c.conditions.iter().map(|cd| json!({
            "id": cd.id,
            "name": cd.name,
            "description": cd.description,
            "where_table_ids": cd.where_table_ids,
            "aux_table_ids": cd.aux_table_ids,
            "where": cd.where_clause,
        })).collect::<Value>(),
        "subclasses": c.subclasses.iter().map(class_to_json).collect::<Value>(),
    })
}

pub fn dump_universe_json(u: &Universe, opts: JsonOpts) -> String {
    let v = universe_to_json(u, opts);
    serde_json::to_string_pretty(&v).unwrap_or_default()
}

pub fn dump_file_json(path: &Path, opts: JsonOpts) -> Result<String> {
    let u = decode_file(path)?;
    Ok(dump_universe_json(&u, opts))
}

/// Dump every .unv file under `dir` as one JSON map keyed by file name.
/// A file that fails to decode gets an `$error` entry instead of sinking
/// the whole dump.
pub fn dump_dir_json(dir: &Path, opts: JsonOpts) -> String {
    let mut out = Map::new();
    for f in find_universe_files(dir) {
        let name = f
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("file")
            .to_string();
        let entry = match decode_file(&f) {
            Ok(u) => universe_to_json(&u, opts),
            Err(e) => json!({ "$error": e.to_string() }),
        };
        out.insert(name, entry);
    }
    serde_json::to_string_pretty(&Value::Object(out)).unwrap_or_default()
}
