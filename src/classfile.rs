//! Class-file reader used by the bundled dumpers.
//!
//! Reads the container structure (constant pool, members, attributes) and
//! decodes `Code` attributes on demand. Nothing here interprets bytecode.

use crate::error::{ParseError, ParseResult};

pub const MAGIC: u32 = 0xCAFE_BABE;
pub const MIN_MAJOR_VERSION: u16 = 45;
pub const MAX_MAJOR_VERSION: u16 = 69;

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Slot 0 and the slot after a long or double.
    Unusable,
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    String(u16),
    FieldRef { class: u16, name_and_type: u16 },
    MethodRef { class: u16, name_and_type: u16 },
    InterfaceMethodRef { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType(u16),
    Dynamic { bootstrap: u16, name_and_type: u16 },
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
    Module(u16),
    Package(u16),
}

impl Constant {
    pub fn tag_name(&self) -> &'static str {
        match self {
            Constant::Unusable => "unusable",
            Constant::Utf8(_) => "utf8",
            Constant::Integer(_) => "integer",
            Constant::Float(_) => "float",
            Constant::Long(_) => "long",
            Constant::Double(_) => "double",
            Constant::Class(_) => "class",
            Constant::String(_) => "string",
            Constant::FieldRef { .. } => "field",
            Constant::MethodRef { .. } => "method",
            Constant::InterfaceMethodRef { .. } => "interface-method",
            Constant::NameAndType { .. } => "name-and-type",
            Constant::MethodHandle { .. } => "method-handle",
            Constant::MethodType(_) => "method-type",
            Constant::Dynamic { .. } => "dynamic",
            Constant::InvokeDynamic { .. } => "invoke-dynamic",
            Constant::Module(_) => "module",
            Constant::Package(_) => "package",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoolEntry {
    pub offset: usize,
    pub constant: Constant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub offset: usize,
    pub name_index: u16,
    pub data_offset: usize,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub offset: usize,
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    pub catch_type: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionHandler>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: Vec<PoolEntry>,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<Member>,
    pub methods: Vec<Member>,
    pub attributes: Vec<Attribute>,
}

/// Parses a whole class file. `strict` rejects out-of-range versions and
/// trailing bytes.
pub fn parse_class(bytes: &[u8], strict: bool) -> ParseResult<ClassFile> {
    let mut r = Reader::new(bytes);

    let magic = r.u4()?;
    if magic != MAGIC {
        return Err(ParseError::at(0, format!("bad class file magic ({magic:08x})")));
    }
    let minor_version = r.u2()?;
    let major_version = r.u2()?;
    if strict && !(MIN_MAJOR_VERSION..=MAX_MAJOR_VERSION).contains(&major_version) {
        return Err(ParseError::at(
            6,
            format!("unsupported class file version {major_version}.{minor_version}"),
        ));
    }

    let constant_pool =
        parse_constant_pool(&mut r).map_err(|e| e.with_context("...while parsing constant pool"))?;

    let access_flags = r.u2()?;
    let this_class = r.u2()?;
    let super_class = r.u2()?;
    let interface_count = r.u2()?;
    let mut interfaces = Vec::with_capacity(interface_count as usize);
    for _ in 0..interface_count {
        interfaces.push(r.u2()?);
    }

    let fields = parse_members(&mut r, "field")?;
    let methods = parse_members(&mut r, "method")?;
    let attributes =
        parse_attributes(&mut r).map_err(|e| e.with_context("...while parsing class attributes"))?;

    if strict && r.remaining() > 0 {
        return Err(ParseError::at(
            r.pos,
            format!("extra bytes at end of class file ({} bytes)", r.remaining()),
        ));
    }

    Ok(ClassFile {
        minor_version,
        major_version,
        constant_pool,
        access_flags,
        this_class,
        super_class,
        interfaces,
        fields,
        methods,
        attributes,
    })
}

impl ClassFile {
    pub fn constant(&self, index: u16) -> Option<&Constant> {
        self.constant_pool.get(index as usize).map(|e| &e.constant)
    }

    pub fn utf8(&self, index: u16) -> Option<&str> {
        match self.constant(index)? {
            Constant::Utf8(s) => Some(s),
            _ => None,
        }
    }

    pub fn class_name(&self, index: u16) -> Option<&str> {
        match self.constant(index)? {
            Constant::Class(name) => self.utf8(*name),
            _ => None,
        }
    }

    pub fn this_class_name(&self) -> &str {
        self.class_name(self.this_class).unwrap_or("<unknown>")
    }

    pub fn member_name(&self, member: &Member) -> &str {
        self.utf8(member.name_index).unwrap_or("<unknown>")
    }

    pub fn member_descriptor(&self, member: &Member) -> &str {
        self.utf8(member.descriptor_index).unwrap_or("<unknown>")
    }

    pub fn attribute_name(&self, attribute: &Attribute) -> &str {
        self.utf8(attribute.name_index).unwrap_or("<unknown>")
    }

    /// Decodes the method's `Code` attribute, if it has one.
    pub fn code(&self, method: &Member) -> ParseResult<Option<Code>> {
        let Some(attribute) = method
            .attributes
            .iter()
            .find(|a| self.attribute_name(a) == "Code")
        else {
            return Ok(None);
        };

        parse_code(attribute).map(Some).map_err(|e| {
            e.with_context(format!(
                "...while parsing Code of {}{}",
                self.member_name(method),
                self.member_descriptor(method)
            ))
        })
    }
}

fn parse_constant_pool(r: &mut Reader<'_>) -> ParseResult<Vec<PoolEntry>> {
    let count = r.u2()? as usize;
    let mut pool = Vec::with_capacity(count.max(1));
    pool.push(PoolEntry {
        offset: r.pos,
        constant: Constant::Unusable,
    });

    while pool.len() < count {
        let index = pool.len();
        let offset = r.pos;
        let constant = parse_constant(r)
            .map_err(|e| e.with_context(format!("...while parsing constant pool entry {index}")))?;
        let wide = matches!(constant, Constant::Long(_) | Constant::Double(_));
        pool.push(PoolEntry { offset, constant });
        if wide {
            pool.push(PoolEntry {
                offset,
                constant: Constant::Unusable,
            });
        }
    }

    Ok(pool)
}

fn parse_constant(r: &mut Reader<'_>) -> ParseResult<Constant> {
    let tag_at = r.pos;
    let tag = r.u1()?;
    let constant = match tag {
        1 => {
            let len = r.u2()? as usize;
            let raw = r.take(len)?;
            Constant::Utf8(String::from_utf8_lossy(raw).into_owned())
        }
        3 => Constant::Integer(r.u4()? as i32),
        4 => Constant::Float(f32::from_bits(r.u4()?)),
        5 => Constant::Long(r.u8()? as i64),
        6 => Constant::Double(f64::from_bits(r.u8()?)),
        7 => Constant::Class(r.u2()?),
        8 => Constant::String(r.u2()?),
        9 => Constant::FieldRef {
            class: r.u2()?,
            name_and_type: r.u2()?,
        },
        10 => Constant::MethodRef {
            class: r.u2()?,
            name_and_type: r.u2()?,
        },
        11 => Constant::InterfaceMethodRef {
            class: r.u2()?,
            name_and_type: r.u2()?,
        },
        12 => Constant::NameAndType {
            name: r.u2()?,
            descriptor: r.u2()?,
        },
        15 => Constant::MethodHandle {
            kind: r.u1()?,
            reference: r.u2()?,
        },
        16 => Constant::MethodType(r.u2()?),
        17 => Constant::Dynamic {
            bootstrap: r.u2()?,
            name_and_type: r.u2()?,
        },
        18 => Constant::InvokeDynamic {
            bootstrap: r.u2()?,
            name_and_type: r.u2()?,
        },
        19 => Constant::Module(r.u2()?),
        20 => Constant::Package(r.u2()?),
        other => {
            return Err(ParseError::at(tag_at, format!("unknown constant pool tag {other}")));
        }
    };
    Ok(constant)
}

fn parse_members(r: &mut Reader<'_>, kind: &str) -> ParseResult<Vec<Member>> {
    let count = r.u2()?;
    let mut members = Vec::with_capacity(count as usize);
    for index in 0..count {
        let member = parse_member(r)
            .map_err(|e| e.with_context(format!("...while parsing {kind} {index}")))?;
        members.push(member);
    }
    Ok(members)
}

fn parse_member(r: &mut Reader<'_>) -> ParseResult<Member> {
    Ok(Member {
        offset: r.pos,
        access_flags: r.u2()?,
        name_index: r.u2()?,
        descriptor_index: r.u2()?,
        attributes: parse_attributes(r)?,
    })
}

fn parse_attributes(r: &mut Reader<'_>) -> ParseResult<Vec<Attribute>> {
    let count = r.u2()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let offset = r.pos;
        let name_index = r.u2()?;
        let len = r.u4()? as usize;
        let data_offset = r.pos;
        let data = r.take(len)?.to_vec();
        attributes.push(Attribute {
            offset,
            name_index,
            data_offset,
            data,
        });
    }
    Ok(attributes)
}

fn parse_code(attribute: &Attribute) -> ParseResult<Code> {
    let mut r = Reader::with_base(&attribute.data, attribute.data_offset);

    let max_stack = r.u2()?;
    let max_locals = r.u2()?;
    let code_len = r.u4()? as usize;
    if code_len == 0 {
        return Err(ParseError::at(r.absolute(), "empty code array"));
    }
    let code = r.take(code_len)?.to_vec();

    let handler_count = r.u2()?;
    let mut exception_table = Vec::with_capacity(handler_count as usize);
    for _ in 0..handler_count {
        exception_table.push(ExceptionHandler {
            start_pc: r.u2()?,
            end_pc: r.u2()?,
            handler_pc: r.u2()?,
            catch_type: r.u2()?,
        });
    }

    Ok(Code {
        max_stack,
        max_locals,
        code,
        exception_table,
    })
}

/// Big-endian cursor. `base` makes error offsets absolute when reading a
/// slice carved out of a larger file.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self::with_base(bytes, 0)
    }

    fn with_base(bytes: &'a [u8], base: usize) -> Self {
        Self { bytes, pos: 0, base }
    }

    fn absolute(&self) -> usize {
        self.base + self.pos
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, len: usize) -> ParseResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(ParseError::at(
                self.absolute(),
                format!("truncated input: need {len} bytes, {} left", self.remaining()),
            ));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u1(&mut self) -> ParseResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u2(&mut self) -> ParseResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u4(&mut self) -> ParseResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u8(&mut self) -> ParseResult<u64> {
        let hi = self.u4()? as u64;
        let lo = self.u4()? as u64;
        Ok((hi << 32) | lo)
    }
}
