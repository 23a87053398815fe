//! [crate::codec] contains the binary persistence protocol for a whole
//! [`Factory`](crate::factory::Factory).
//!
//! ## Stream layout
//!
//! Little-endian throughout. A header carries the magic, a file type tag, and
//! the API/binary version pair; a mismatch on any of the three fails the load
//! with [`AsgError::Format`](crate::AsgError::Format) before any node is
//! read. Node records follow in ascending identity order — save order is
//! identity order, never traversal order, which is what keeps identities
//! stable across a round trip. Each record is the node's identity and kind,
//! its capability payloads in fixed order, its attribute list, and one edge
//! record per schema-declared edge (single: one identity, 0 = unset; multi:
//! count then identities in insertion order). A record with identity 0 and
//! kind 0 marks the end of the table; a root/watermark trailer closes the
//! stream.
//!
//! ## Two-pass load
//!
//! Pass one allocates a node shell (identity + kind) for every record without
//! resolving anything, so an edge may reference an identity whose record
//! appears later in the table. Pass two replays payloads, attributes, and
//! edges through the Factory's own mutators, which rebuilds parent fields and
//! inbound counts and re-checks every schema constraint; a constraint the
//! stream itself violates surfaces as
//! [`AsgError::CorruptData`](crate::AsgError::CorruptData), an edge to an
//! identity pass one never saw as
//! [`AsgError::DanglingReference`](crate::AsgError::DanglingReference).
//! Errors leave no half-populated arena behind: `load` only returns a
//! `Factory` on full success.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use crate::{
    error::{AsgError, Result},
    factory::Factory,
    node::{EdgeSlot, NameData, PositionData},
    properties::{
        AttrKind, AttrValue, Attribute, Capability, EdgeKind, Multiplicity, NodeId, NodeKind,
        SourceRange,
    },
};

const MAGIC: &[u8; 4] = b"ASGC";
/// Upper bound on any upfront allocation driven by a length or count field
/// read from the stream. Larger values are legal; the buffers grow as actual
/// payload bytes arrive, so a corrupted 4-byte field cannot demand gigabytes
/// before the first payload byte is read.
const PREALLOC_LIMIT: usize = 64 * 1024;
/// File type tag, the schema this stream serves.
pub const FILE_TYPE: &str = "AsgLogical";
/// Schema API version. Bumped when the kind/edge/capability catalog changes.
pub const API_VERSION: &str = "3.0";
/// Encoding version. Bumped when the record layout changes.
pub const BINARY_VERSION: &str = "1";

// ---------------------------------------------------------------------------
// primitives

fn write_u8<W: Write>(out: &mut W, value: u8) -> Result<()> {
    out.write_all(&[value])?;
    Ok(())
}

fn write_u16<W: Write>(out: &mut W, value: u16) -> Result<()> {
    out.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_u32<W: Write>(out: &mut W, value: u32) -> Result<()> {
    out.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_i64<W: Write>(out: &mut W, value: i64) -> Result<()> {
    out.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_f64<W: Write>(out: &mut W, value: f64) -> Result<()> {
    out.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_str<W: Write>(out: &mut W, value: &str) -> Result<()> {
    let len = u32::try_from(value.len())
        .map_err(|_| AsgError::Format(format!("string of {} bytes exceeds u32", value.len())))?;
    write_u32(out, len)?;
    out.write_all(value.as_bytes())?;
    Ok(())
}

fn read_u8<R: Read>(input: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    input.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u16<R: Read>(input: &mut R) -> Result<u16> {
    let mut buf = [0u8; 2];
    input.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32<R: Read>(input: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_i64<R: Read>(input: &mut R) -> Result<i64> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

fn read_f64<R: Read>(input: &mut R) -> Result<f64> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

fn read_str<R: Read>(input: &mut R) -> Result<String> {
    let len = read_u32(input)? as usize;
    let mut buf = Vec::with_capacity(len.min(PREALLOC_LIMIT));
    let mut taken = input.take(len as u64);
    taken.read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(AsgError::Format(format!(
            "string record of {len} bytes ends after {} bytes",
            buf.len()
        )));
    }
    Ok(String::from_utf8(buf)?)
}

fn read_bool<R: Read>(input: &mut R) -> Result<bool> {
    match read_u8(input)? {
        0 => Ok(false),
        1 => Ok(true),
        raw => Err(AsgError::CorruptData(format!(
            "boolean field holds {raw}, expected 0 or 1"
        ))),
    }
}

fn write_range<W: Write>(out: &mut W, range: &SourceRange) -> Result<()> {
    write_str(out, &range.path)?;
    write_u32(out, range.line)?;
    write_u32(out, range.col)?;
    write_u32(out, range.end_line)?;
    write_u32(out, range.end_col)
}

fn read_range<R: Read>(input: &mut R) -> Result<SourceRange> {
    Ok(SourceRange {
        path: read_str(input)?,
        line: read_u32(input)?,
        col: read_u32(input)?,
        end_line: read_u32(input)?,
        end_col: read_u32(input)?,
    })
}

// ---------------------------------------------------------------------------
// save

/// Serialize a Factory's full node set to `out`.
pub fn save<W: Write>(factory: &Factory, out: &mut W) -> Result<()> {
    out.write_all(MAGIC)?;
    write_str(out, FILE_TYPE)?;
    write_str(out, API_VERSION)?;
    write_str(out, BINARY_VERSION)?;

    // BTreeMap iteration gives ascending identity order.
    for node in factory.nodes() {
        write_u32(out, node.id().as_u32())?;
        write_u16(out, node.kind() as u16)?;

        let capabilities = node.kind().capabilities();
        if capabilities.contains(Capability::Named) {
            let name = node.name().unwrap_or_default();
            let range = node.name_range().cloned().unwrap_or_default();
            write_str(out, name)?;
            write_range(out, &range)?;
        }
        if capabilities.contains(Capability::Positioned) {
            let position = node.position().cloned().unwrap_or_default();
            write_range(out, &position.range)?;
            write_u8(out, position.compiler_generated as u8)?;
            write_u8(out, position.tool_generated as u8)?;
        }
        if capabilities.contains(Capability::Texted) {
            write_str(out, node.text().unwrap_or_default())?;
        }

        let attributes = node.attributes();
        write_u32(out, attributes.len() as u32)?;
        for attr in attributes {
            write_u8(out, attr.kind().repr())?;
            write_str(out, &attr.name)?;
            write_str(out, &attr.context)?;
            match &attr.value {
                AttrValue::String(value) => write_str(out, value)?,
                AttrValue::Int(value) => write_i64(out, *value)?,
                AttrValue::Float(value) => write_f64(out, *value)?,
                AttrValue::Bool(value) => write_u8(out, *value as u8)?,
            }
        }

        for (_, slot) in node.edges() {
            match slot {
                EdgeSlot::Single(target) => write_u32(out, target.as_u32())?,
                EdgeSlot::Multiple(targets) => {
                    write_u32(out, targets.len() as u32)?;
                    for target in targets {
                        write_u32(out, target.as_u32())?;
                    }
                }
            }
        }
    }

    // End of the node table.
    write_u32(out, 0)?;
    write_u16(out, 0)?;

    write_u32(out, factory.root().as_u32())?;
    write_u32(out, factory.next_id().as_u32())?;
    tracing::debug!(nodes = factory.len(), "saved graph");
    Ok(())
}

/// Save to a file path.
pub fn save_file(factory: &Factory, path: impl AsRef<Path>) -> Result<()> {
    let mut out = BufWriter::new(File::create(path.as_ref())?);
    save(factory, &mut out)?;
    out.flush().map_err(|err| AsgError::Io(err.to_string()))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// load

#[derive(Debug)]
enum RawSlot {
    Single(NodeId),
    Multiple(Vec<NodeId>),
}

#[derive(Debug)]
struct RawNode {
    id: NodeId,
    kind: NodeKind,
    name: Option<NameData>,
    position: Option<PositionData>,
    text: Option<String>,
    attributes: Vec<Attribute>,
    edges: Vec<(EdgeKind, RawSlot)>,
}

fn check_header<R: Read>(input: &mut R) -> Result<()> {
    let mut magic = [0u8; 4];
    input.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(AsgError::Format("missing ASGC magic".to_string()));
    }
    let file_type = read_str(input)?;
    if file_type != FILE_TYPE {
        return Err(AsgError::Format(format!(
            "wrong file type '{file_type}', expected '{FILE_TYPE}'"
        )));
    }
    let api_version = read_str(input)?;
    if api_version != API_VERSION {
        return Err(AsgError::Format(format!(
            "wrong API version '{api_version}', expected '{API_VERSION}'"
        )));
    }
    let binary_version = read_str(input)?;
    if binary_version != BINARY_VERSION {
        return Err(AsgError::Format(format!(
            "wrong binary version '{binary_version}', expected '{BINARY_VERSION}'"
        )));
    }
    Ok(())
}

fn read_node<R: Read>(input: &mut R) -> Result<Option<RawNode>> {
    let raw_id = read_u32(input)?;
    let raw_kind = read_u16(input)?;
    if raw_id == 0 && raw_kind == 0 {
        return Ok(None);
    }
    let kind = NodeKind::from_repr(raw_kind).ok_or_else(|| {
        AsgError::CorruptData(format!("unknown node kind discriminant {raw_kind}"))
    })?;

    let capabilities = kind.capabilities();
    let name = if capabilities.contains(Capability::Named) {
        Some(NameData {
            name: read_str(input)?,
            range: read_range(input)?,
        })
    } else {
        None
    };
    let position = if capabilities.contains(Capability::Positioned) {
        Some(PositionData {
            range: read_range(input)?,
            compiler_generated: read_bool(input)?,
            tool_generated: read_bool(input)?,
        })
    } else {
        None
    };
    let text = if capabilities.contains(Capability::Texted) {
        Some(read_str(input)?)
    } else {
        None
    };

    let attr_count = read_u32(input)?;
    let mut attributes = Vec::with_capacity((attr_count as usize).min(PREALLOC_LIMIT));
    for _ in 0..attr_count {
        let raw_attr_kind = read_u8(input)?;
        let attr_kind = AttrKind::from_repr(raw_attr_kind).ok_or_else(|| {
            AsgError::CorruptData(format!("unknown attribute kind discriminant {raw_attr_kind}"))
        })?;
        let attr_name = read_str(input)?;
        let context = read_str(input)?;
        let value = match attr_kind {
            AttrKind::String => AttrValue::String(read_str(input)?),
            AttrKind::Int => AttrValue::Int(read_i64(input)?),
            AttrKind::Float => AttrValue::Float(read_f64(input)?),
            AttrKind::Bool => AttrValue::Bool(read_bool(input)?),
        };
        attributes.push(Attribute::new(attr_name, context, value));
    }

    let mut edges = Vec::with_capacity(kind.edge_rules().len());
    for rule in kind.edge_rules() {
        let slot = match rule.multiplicity {
            Multiplicity::Single => RawSlot::Single(NodeId::from_u32(read_u32(input)?)),
            Multiplicity::Multiple => {
                let count = read_u32(input)?;
                let mut targets = Vec::with_capacity((count as usize).min(PREALLOC_LIMIT));
                for _ in 0..count {
                    targets.push(NodeId::from_u32(read_u32(input)?));
                }
                RawSlot::Multiple(targets)
            }
        };
        edges.push((rule.edge, slot));
    }

    Ok(Some(RawNode {
        id: NodeId::from_u32(raw_id),
        kind,
        name,
        position,
        text,
        attributes,
        edges,
    }))
}

/// A schema constraint the stream itself violates is corruption, not a
/// caller mistake.
fn demote_schema_violation(err: AsgError) -> AsgError {
    match err {
        AsgError::SchemaViolation(msg) => {
            AsgError::CorruptData(format!("record violates schema: {msg}"))
        }
        other => other,
    }
}

/// Deserialize a Factory from `input`. See the module docs for the two-pass
/// algorithm and the error contract.
pub fn load<R: Read>(input: &mut R) -> Result<Factory> {
    check_header(input)?;

    // Pass one: allocate a shell for every record so later edges can point
    // at identities declared earlier or later in the table.
    let mut factory = Factory::new();
    let mut records = Vec::new();
    while let Some(record) = read_node(input)? {
        factory.insert_shell(record.id, record.kind)?;
        records.push(record);
    }

    let root = NodeId::from_u32(read_u32(input)?);
    let watermark = NodeId::from_u32(read_u32(input)?);

    // Pass two: replay payloads and edges through the regular mutators,
    // which rebuilds parent fields and inbound counts and re-validates every
    // constraint against the allocated shells.
    for record in records {
        let id = record.id;
        if let Some(name) = record.name {
            factory
                .set_name(id, name.name, name.range)
                .map_err(demote_schema_violation)?;
        }
        if let Some(position) = record.position {
            factory
                .set_position(id, position.range)
                .map_err(demote_schema_violation)?;
            factory
                .set_compiler_generated(id, position.compiler_generated)
                .map_err(demote_schema_violation)?;
            factory
                .set_tool_generated(id, position.tool_generated)
                .map_err(demote_schema_violation)?;
        }
        if let Some(text) = record.text {
            factory.set_text(id, text).map_err(demote_schema_violation)?;
        }
        for attribute in record.attributes {
            factory.add_attribute(id, attribute)?;
        }
        for (edge, slot) in record.edges {
            match slot {
                RawSlot::Single(target) => {
                    if !target.is_none() {
                        factory
                            .set_single(id, edge, target)
                            .map_err(demote_schema_violation)?;
                    }
                }
                RawSlot::Multiple(targets) => {
                    for target in targets {
                        factory
                            .append(id, edge, target)
                            .map_err(demote_schema_violation)?;
                    }
                }
            }
        }
    }

    if !root.is_none() {
        factory.set_root(root).map_err(|_| {
            AsgError::CorruptData(format!("root identity {root} has no node record"))
        })?;
    }
    factory.bump_next_id(watermark);

    // The trailer closes the stream; anything after it is not ours.
    let mut trailing = [0u8; 1];
    if input.read(&mut trailing)? != 0 {
        return Err(AsgError::Format(
            "unexpected bytes after the trailer".to_string(),
        ));
    }

    tracing::debug!(nodes = factory.len(), "loaded graph");
    Ok(factory)
}

/// Load from a file path.
pub fn load_file(path: impl AsRef<Path>) -> Result<Factory> {
    let file = File::open(path.as_ref()).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => {
            AsgError::Io(format!("no such file: {}", path.as_ref().display()))
        }
        _ => AsgError::from(err),
    })?;
    load(&mut BufReader::new(file))
}
