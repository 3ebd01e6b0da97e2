//! Section readers and the universe assembler.
//!
//! Field widths and record shapes come from reverse engineering; regions
//! with no known meaning are skipped at their observed width, never
//! interpreted, so that offsets for every following field stay correct.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use crate::binfmt::Cursor;
use crate::error::{DecodeError, Result};
use crate::model::{
    Class, Column, Condition, Context, Hierarchy, Join, JoinTerm, Link, Object, OpaqueSection,
    Parameters, Table, Universe, VirtualTable,
};
use crate::offsets::{OPAQUE_MARKERS, SectionOffsets, marker};

/// Objects with this sentinel in their visibility byte are hidden.
const HIDDEN_SENTINEL: u8 = 0x36;

#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions {
    /// Upper bound on class-tree nesting. The file drives recursion depth
    /// directly, so adversarial input must fail with a distinct error
    /// instead of exhausting the call stack.
    pub max_class_depth: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_class_depth: 64,
        }
    }
}

/// Decode a universe from raw file bytes.
pub fn decode(data: &[u8]) -> Result<Universe> {
    decode_with(data, DecodeOptions::default())
}

pub fn decode_with(data: &[u8], opts: DecodeOptions) -> Result<Universe> {
    let reader = Reader {
        cur: Cursor::new(data),
        offsets: SectionOffsets::resolve(data),
        opts,
    };
    reader.read_universe()
}

/// Decode a universe file from disk.
pub fn decode_file(path: &Path) -> Result<Universe> {
    let data = fs::read(path)?;
    decode(&data)
}

struct Reader<'a> {
    cur: Cursor<'a>,
    offsets: SectionOffsets,
    opts: DecodeOptions,
}

fn record<T>(section: &'static str, index: usize, r: Result<T>) -> Result<T> {
    r.map_err(|e| e.in_record(section, index))
}

impl<'a> Reader<'a> {
    /// Read every section in dependency order. Tables must be indexed
    /// before columns resolve against them; everything else only needs the
    /// offset map.
    fn read_universe(mut self) -> Result<Universe> {
        let parameters = self.read_parameters()?;
        let custom_parameters = self.read_custom_parameters()?;
        let tables = self.read_tables()?;
        let table_index: HashMap<u32, usize> =
            tables.iter().enumerate().map(|(i, t)| (t.id, i)).collect();
        let virtual_tables = self.read_virtual_tables()?;
        let mut columns = self.read_columns(&table_index)?;
        columns.sort_by_key(|c| c.id);
        let joins = self.read_joins()?;
        let contexts = self.read_contexts()?;
        let links = self.read_links()?;
        let hierarchies = self.read_hierarchies()?;
        let opaque_sections = self.capture_opaque_sections();
        let classes = self.read_classes()?;
        Ok(Universe {
            parameters,
            custom_parameters,
            tables,
            virtual_tables,
            columns,
            joins,
            contexts,
            links,
            hierarchies,
            classes,
            opaque_sections,
            table_index,
        })
    }

    fn seek_section(&mut self, m: &'static str) -> Result<()> {
        let off = self.offsets.require(m)?;
        self.cur.seek(off);
        Ok(())
    }

    fn read_parameters(&mut self) -> Result<Parameters> {
        self.seek_section(marker::PARAMETERS)?;
        self.cur.skip(8)?; // two unknown words, the first usually 0x22
        let universe_filename = self.cur.read_string()?;
        let universe_name = self.cur.read_string()?;
        let revision = self.cur.read_u32()?;
        self.cur.skip(2)?;
        let description = self.cur.read_string()?;
        let created_by = self.cur.read_string()?;
        let modified_by = self.cur.read_string()?;
        let created_date = self.cur.read_date()?;
        let modified_date = self.cur.read_date()?;
        let query_time_limit_minutes = self.cur.read_u32()? / 60;
        let query_row_limit = self.cur.read_u32()?;
        self.cur.read_string()?; // unknown, discarded
        let object_strategy = self.cur.read_string()?;
        self.cur.skip(1)?;
        let cost_estimate_warning_limit_minutes = self.cur.read_u32()? / 60;
        let long_text_limit = self.cur.read_u32()?;
        self.cur.skip(4)?;
        let comments = self.cur.read_string()?;
        self.cur.skip(12)?; // three unknown words
        let domain = self.cur.read_string()?;
        let dbms_engine = self.cur.read_string()?;
        let network_layer = self.cur.read_string()?;
        Ok(Parameters {
            universe_filename,
            universe_name,
            revision,
            description,
            created_by,
            modified_by,
            created_date,
            modified_date,
            query_time_limit_minutes,
            query_row_limit,
            object_strategy,
            cost_estimate_warning_limit_minutes,
            long_text_limit,
            comments,
            domain,
            dbms_engine,
            network_layer,
        })
    }

    /// Parameters from the designer's parameter tab. The section is not
    /// part of the mandatory core; a file without it has no custom
    /// parameters.
    fn read_custom_parameters(&mut self) -> Result<BTreeMap<String, String>> {
        let mut params = BTreeMap::new();
        let Some(off) = self.offsets.get(marker::CUSTOM_PARAMETERS) else {
            return Ok(params);
        };
        self.cur.seek(off);
        let count = self.cur.read_u32()?;
        for i in 0..count as usize {
            let (name, value) = record(marker::CUSTOM_PARAMETERS, i, self.read_name_value())?;
            params.insert(name.unwrap_or_default(), value.unwrap_or_default());
        }
        Ok(params)
    }

    fn read_name_value(&mut self) -> Result<(Option<String>, Option<String>)> {
        let name = self.cur.read_string()?;
        let value = self.cur.read_string()?;
        Ok((name, value))
    }

    fn read_tables(&mut self) -> Result<Vec<Table>> {
        self.seek_section(marker::TABLES)?;
        self.cur.skip(2)?;
        let _username = self.cur.read_string()?;
        let schema = self.cur.read_string()?;
        let _max_table_id = self.cur.read_u32()?;
        let count = self.cur.read_u32()?;
        let mut tables = Vec::new();
        for i in 0..count as usize {
            let t = record(marker::TABLES, i, self.read_table(schema.as_deref()))?;
            tables.push(t);
        }
        Ok(tables)
    }

    fn read_table(&mut self, schema: Option<&str>) -> Result<Table> {
        let id = self.cur.read_u32()?;
        self.cur.skip(19)?;
        let name = self.cur.read_string()?;
        let parent_id = self.cur.read_u32()?;
        self.cur.skip(9)?;
        // Flagged tables carry a variable-length tail of unknown purpose.
        if self.cur.read_bool()? {
            let n = self.cur.read_u16()? as usize;
            self.cur.skip(4 * n + 3)?;
        } else {
            self.cur.skip(1)?;
        }
        Ok(Table {
            id,
            parent_id,
            name,
            schema: schema.map(str::to_owned),
        })
    }

    fn read_virtual_tables(&mut self) -> Result<Vec<VirtualTable>> {
        let Some(off) = self.offsets.get(marker::VIRTUAL_TABLES) else {
            return Ok(Vec::new());
        };
        self.cur.seek(off);
        let count = self.cur.read_u32()?;
        let mut out = Vec::new();
        for i in 0..count as usize {
            let vt = record(marker::VIRTUAL_TABLES, i, self.read_virtual_table())?;
            out.push(vt);
        }
        Ok(out)
    }

    fn read_virtual_table(&mut self) -> Result<VirtualTable> {
        let table_id = self.cur.read_u32()?;
        let select = self.cur.read_string()?;
        Ok(VirtualTable { table_id, select })
    }

    fn read_columns(&mut self, table_index: &HashMap<u32, usize>) -> Result<Vec<Column>> {
        self.seek_section(marker::COLUMNS_ID)?;
        // Two counts; the first is advisory and disagrees in some files.
        // The second is the one that holds.
        let _advisory = self.cur.read_u32()?;
        let count = self.cur.read_u32()?;
        let mut columns = Vec::new();
        for i in 0..count as usize {
            let c = record(marker::COLUMNS_ID, i, self.read_column(table_index))?;
            columns.push(c);
        }
        Ok(columns)
    }

    fn read_column(&mut self, table_index: &HashMap<u32, usize>) -> Result<Column> {
        let id = self.cur.read_u32()?;
        let table_id = self.cur.read_u32()?;
        if !table_index.contains_key(&table_id) {
            return Err(DecodeError::UnresolvedTable {
                column_id: id,
                table_id,
            });
        }
        let name = self.cur.read_string()?;
        Ok(Column { id, table_id, name })
    }

    fn read_joins(&mut self) -> Result<Vec<Join>> {
        self.seek_section(marker::JOINS)?;
        self.cur.skip(8)?;
        let count = self.cur.read_u32()?;
        let mut joins = Vec::new();
        for i in 0..count as usize {
            joins.push(record(marker::JOINS, i, self.read_join())?);
        }
        self.cur.skip(8)?;
        Ok(joins)
    }

    fn read_join(&mut self) -> Result<Join> {
        let id = self.cur.read_u32()?;
        self.cur.skip(20)?;
        let expression = self.cur.read_string()?;
        self.cur.skip(8)?;
        let term_count = self.cur.read_u32()?;
        let mut terms = Vec::new();
        for _ in 0..term_count {
            let name = self.cur.read_string()?;
            let table_id = self.cur.read_u32()?;
            terms.push(JoinTerm { name, table_id });
        }
        Ok(Join {
            id,
            expression,
            terms,
        })
    }

    fn read_contexts(&mut self) -> Result<Vec<Context>> {
        self.seek_section(marker::CONTEXTS)?;
        let _max_id = self.cur.read_u32()?;
        let count = self.cur.read_u32()?;
        let mut out = Vec::new();
        for i in 0..count as usize {
            out.push(record(marker::CONTEXTS, i, self.read_context())?);
        }
        Ok(out)
    }

    fn read_context(&mut self) -> Result<Context> {
        let name = self.cur.read_string()?;
        let id = self.cur.read_u32()?;
        let description = self.cur.read_string()?;
        let join_count = self.cur.read_u32()?;
        let mut join_ids = Vec::new();
        for _ in 0..join_count {
            join_ids.push(self.cur.read_u32()?);
        }
        Ok(Context {
            id,
            name,
            description,
            join_ids,
        })
    }

    fn read_links(&mut self) -> Result<Vec<Link>> {
        self.seek_section(marker::LINKS)?;
        let _max_id = self.cur.read_u32()?;
        let count = self.cur.read_u32()?;
        let mut out = Vec::new();
        for i in 0..count as usize {
            out.push(record(marker::LINKS, i, self.read_link())?);
        }
        Ok(out)
    }

    fn read_link(&mut self) -> Result<Link> {
        let name = self.cur.read_string()?;
        let id = self.cur.read_u32()?;
        let description = self.cur.read_string()?;
        let linked_universe = self.cur.read_string()?;
        Ok(Link {
            id,
            name,
            description,
            linked_universe,
        })
    }

    fn read_hierarchies(&mut self) -> Result<Vec<Hierarchy>> {
        self.seek_section(marker::HIERARCHIES)?;
        let _max_id = self.cur.read_u32()?;
        let count = self.cur.read_u32()?;
        let mut out = Vec::new();
        for i in 0..count as usize {
            out.push(record(marker::HIERARCHIES, i, self.read_hierarchy())?);
        }
        Ok(out)
    }

    fn read_hierarchy(&mut self) -> Result<Hierarchy> {
        let name = self.cur.read_string()?;
        let id = self.cur.read_u32()?;
        let description = self.cur.read_string()?;
        let level_count = self.cur.read_u32()?;
        let mut level_object_ids = Vec::new();
        for _ in 0..level_count {
            level_object_ids.push(self.cur.read_u32()?);
        }
        Ok(Hierarchy {
            id,
            name,
            description,
            level_object_ids,
        })
    }

    /// Capture every optional trailer section present in the file. One
    /// table-driven routine covers the whole catalog; a failure in one
    /// section leaves that section absent and never aborts the others.
    fn capture_opaque_sections(&mut self) -> Vec<OpaqueSection> {
        let mut sections = Vec::new();
        for m in OPAQUE_MARKERS {
            let Some(off) = self.offsets.get(m) else {
                continue;
            };
            if let Ok(s) = self.capture_section(m, off) {
                sections.push(s);
            }
        }
        sections
    }

    /// The section length is not stored anywhere; it is the distance to
    /// the nearest following resolved offset, or to end of file for the
    /// last section.
    fn capture_section(&mut self, m: &'static str, off: usize) -> Result<OpaqueSection> {
        self.cur.seek(off);
        let end = self.offsets.next_after(off).unwrap_or(self.cur.len());
        let data = self.cur.read_slice(end.saturating_sub(off))?.to_vec();
        Ok(OpaqueSection {
            marker: m,
            offset: off,
            data,
        })
    }

    fn read_classes(&mut self) -> Result<Vec<Class>> {
        self.seek_section(marker::OBJECTS)?;
        // Header counts for classes/objects/conditions are informational;
        // only the root-class count drives the walk.
        let _class_count = self.cur.read_u32()?;
        let _object_count = self.cur.read_u32()?;
        let _condition_count = self.cur.read_u32()?;
        let root_count = self.cur.read_u32()?;
        let mut roots = Vec::new();
        for i in 0..root_count as usize {
            roots.push(record(marker::OBJECTS, i, self.read_class(0, 0))?);
        }
        Ok(roots)
    }

    fn read_class(&mut self, parent_id: u32, depth: usize) -> Result<Class> {
        if depth >= self.opts.max_class_depth {
            return Err(DecodeError::DepthExceeded {
                limit: self.opts.max_class_depth,
            });
        }
        let id = self.cur.read_u32()?;
        let name = self.cur.read_string()?;
        let declared = self.cur.read_u32()?;
        // A mismatch means corrupted input or an unmodeled format variant.
        if declared != parent_id {
            return Err(DecodeError::ParentMismatch {
                id,
                declared,
                expected: parent_id,
            });
        }
        let description = self.cur.read_string()?;
        self.cur.skip(7)?;
        let object_count = self.cur.read_u32()?;
        let mut objects = Vec::new();
        for _ in 0..object_count {
            objects.push(self.read_object(id)?);
        }
        let condition_count = self.cur.read_u32()?;
        let mut conditions = Vec::new();
        for _ in 0..condition_count {
            conditions.push(self.read_condition(id)?);
        }
        let subclass_count = self.cur.read_u32()?;
        let mut subclasses = Vec::new();
        for _ in 0..subclass_count {
            subclasses.push(self.read_class(id, depth + 1)?);
        }
        Ok(Class {
            id,
            parent_id: declared,
            name,
            description,
            objects,
            conditions,
            subclasses,
        })
    }

    fn read_object(&mut self, owner_id: u32) -> Result<Object> {
        let id = self.cur.read_u32()?;
        let name = self.cur.read_string()?;
        let declared = self.cur.read_u32()?;
        if declared != owner_id {
            return Err(DecodeError::ParentMismatch {
                id,
                declared,
                expected: owner_id,
            });
        }
        let description = self.cur.read_string()?;
        let select_table_ids = self.read_id_list16()?;
        let where_table_ids = self.read_id_list16()?;
        let select = self.cur.read_string()?;
        let where_clause = self.cur.read_string()?;
        let format = self.cur.read_string()?;
        let aux_text = self.cur.read_string()?;
        let lov_name = self.cur.read_string()?;
        self.cur.skip(2)?;
        let visible = self.cur.read_u8()? != HIDDEN_SENTINEL;
        self.cur.skip(55)?; // LOV settings? meaning unknown
        Ok(Object {
            id,
            parent_id: declared,
            name,
            description,
            select_table_ids,
            where_table_ids,
            select,
            where_clause,
            format,
            aux_text,
            lov_name,
            visible,
        })
    }

    fn read_condition(&mut self, owner_id: u32) -> Result<Condition> {
        let id = self.cur.read_u32()?;
        let name = self.cur.read_string()?;
        let declared = self.cur.read_u32()?;
        if declared != owner_id {
            return Err(DecodeError::ParentMismatch {
                id,
                declared,
                expected: owner_id,
            });
        }
        let description = self.cur.read_string()?;
        let where_table_ids = self.read_id_list16()?;
        let aux_table_ids = self.read_id_list16()?;
        let where_clause = self.cur.read_string()?;
        Ok(Condition {
            id,
            parent_id: declared,
            name,
            description,
            where_table_ids,
            aux_table_ids,
            where_clause,
        })
    }

    /// u16 count followed by that many u32 table ids, order preserved.
    fn read_id_list16(&mut self) -> Result<Vec<u32>> {
        let n = self.cur.read_u16()? as usize;
        let mut ids = Vec::new();
        for _ in 0..n {
            ids.push(self.cur.read_u32()?);
        }
        Ok(ids)
    }
}
