use std::io::Write;

use sha2::{Digest, Sha256};

use super::{Dumper, parse_unit};
use crate::classfile::{ClassFile, Constant, Member};
use crate::config::Config;
use crate::error::Result;
use crate::loader::InputUnit;

/// Width of the `xxxxxxxx: ` prefix on raw byte lines.
const OFFSET_COLUMN: usize = 10;

const CLASS_FLAGS: &[(u16, &str)] = &[
    (0x0001, "public"),
    (0x0010, "final"),
    (0x0020, "super"),
    (0x0200, "interface"),
    (0x0400, "abstract"),
    (0x1000, "synthetic"),
    (0x2000, "annotation"),
    (0x4000, "enum"),
    (0x8000, "module"),
];

const FIELD_FLAGS: &[(u16, &str)] = &[
    (0x0001, "public"),
    (0x0002, "private"),
    (0x0004, "protected"),
    (0x0008, "static"),
    (0x0010, "final"),
    (0x0040, "volatile"),
    (0x0080, "transient"),
    (0x1000, "synthetic"),
    (0x4000, "enum"),
];

const METHOD_FLAGS: &[(u16, &str)] = &[
    (0x0001, "public"),
    (0x0002, "private"),
    (0x0004, "protected"),
    (0x0008, "static"),
    (0x0010, "final"),
    (0x0020, "synchronized"),
    (0x0040, "bridge"),
    (0x0080, "varargs"),
    (0x0100, "native"),
    (0x0400, "abstract"),
    (0x0800, "strict"),
    (0x1000, "synthetic"),
];

/// Structural dump of the whole class file.
#[derive(Debug, Default, Copy, Clone)]
pub struct ClassDumper;

impl Dumper for ClassDumper {
    fn dump(&self, unit: &InputUnit, out: &mut dyn Write, config: &Config) -> Result<()> {
        let class = parse_unit(unit, config)?;

        writeln!(out, "class {}", class.this_class_name())?;
        writeln!(out, "  version: {}.{}", class.major_version, class.minor_version)?;
        writeln!(out, "  size: {} bytes", unit.bytes.len())?;
        writeln!(out, "  sha256: {}", hash_bytes(&unit.bytes))?;
        writeln!(
            out,
            "  access: {:#06x} {}",
            class.access_flags,
            flag_names(class.access_flags, CLASS_FLAGS)
        )?;
        writeln!(
            out,
            "  super: {}",
            class.class_name(class.super_class).unwrap_or("(none)")
        )?;

        dump_constant_pool(&class, out)?;

        writeln!(out, "interfaces ({}):", class.interfaces.len())?;
        for index in &class.interfaces {
            writeln!(out, "  {}", class.class_name(*index).unwrap_or("<unknown>"))?;
        }

        writeln!(out, "fields ({}):", class.fields.len())?;
        for field in &class.fields {
            dump_member(&class, field, FIELD_FLAGS, out)?;
        }

        writeln!(out, "methods ({}):", class.methods.len())?;
        for method in &class.methods {
            dump_member(&class, method, METHOD_FLAGS, out)?;
            if let Some(code) = class.code(method)? {
                writeln!(
                    out,
                    "    Code: max_stack={} max_locals={} code_length={} handlers={}",
                    code.max_stack,
                    code.max_locals,
                    code.code.len(),
                    code.exception_table.len()
                )?;
            }
        }

        writeln!(out, "attributes ({}):", class.attributes.len())?;
        for attribute in &class.attributes {
            writeln!(
                out,
                "  @{:04x} {} ({} bytes)",
                attribute.offset,
                class.attribute_name(attribute),
                attribute.data.len()
            )?;
        }

        if config.raw_bytes {
            writeln!(out, "bytes:")?;
            dump_bytes(&unit.bytes, config.width(), out)?;
        }

        Ok(())
    }
}

fn dump_constant_pool(class: &ClassFile, out: &mut dyn Write) -> Result<()> {
    let used = class
        .constant_pool
        .iter()
        .filter(|e| e.constant != Constant::Unusable)
        .count();
    writeln!(out, "constant pool ({used} entries):")?;

    for (index, entry) in class.constant_pool.iter().enumerate() {
        if entry.constant == Constant::Unusable {
            continue;
        }
        writeln!(
            out,
            "  [{index:04x}] @{:04x} {} {}",
            entry.offset,
            entry.constant.tag_name(),
            describe_constant(class, &entry.constant)
        )?;
    }
    Ok(())
}

fn describe_constant(class: &ClassFile, constant: &Constant) -> String {
    match constant {
        Constant::Unusable => String::new(),
        Constant::Utf8(s) => format!("{s:?}"),
        Constant::Integer(v) => v.to_string(),
        Constant::Float(v) => format!("{v}f"),
        Constant::Long(v) => format!("{v}L"),
        Constant::Double(v) => format!("{v}d"),
        Constant::Class(name) => format!("#{name} // {}", class.utf8(*name).unwrap_or("?")),
        Constant::String(s) => format!("#{s} // {:?}", class.utf8(*s).unwrap_or("?")),
        Constant::FieldRef {
            class: c,
            name_and_type,
        }
        | Constant::MethodRef {
            class: c,
            name_and_type,
        }
        | Constant::InterfaceMethodRef {
            class: c,
            name_and_type,
        } => format!(
            "#{c}.#{name_and_type} // {}",
            class.class_name(*c).unwrap_or("?")
        ),
        Constant::NameAndType { name, descriptor } => format!(
            "#{name}:#{descriptor} // {}:{}",
            class.utf8(*name).unwrap_or("?"),
            class.utf8(*descriptor).unwrap_or("?")
        ),
        Constant::MethodHandle { kind, reference } => format!("kind={kind} #{reference}"),
        Constant::MethodType(d) => format!("#{d} // {}", class.utf8(*d).unwrap_or("?")),
        Constant::Dynamic {
            bootstrap,
            name_and_type,
        }
        | Constant::InvokeDynamic {
            bootstrap,
            name_and_type,
        } => format!("bootstrap={bootstrap} #{name_and_type}"),
        Constant::Module(n) | Constant::Package(n) => {
            format!("#{n} // {}", class.utf8(*n).unwrap_or("?"))
        }
    }
}

fn dump_member(
    class: &ClassFile,
    member: &Member,
    flags: &[(u16, &str)],
    out: &mut dyn Write,
) -> Result<()> {
    writeln!(
        out,
        "  @{:04x} {:#06x} {} {}{}",
        member.offset,
        member.access_flags,
        flag_names(member.access_flags, flags),
        class.member_name(member),
        class.member_descriptor(member)
    )?;
    Ok(())
}

fn flag_names(bits: u16, table: &[(u16, &str)]) -> String {
    let names: Vec<&str> = table
        .iter()
        .filter(|(bit, _)| bits & bit != 0)
        .map(|(_, name)| *name)
        .collect();
    if names.is_empty() {
        "-".to_string()
    } else {
        names.join(" ")
    }
}

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Hex rows of `xxxxxxxx: aa bb ...`, as many bytes per row as fit in
/// `width` columns.
fn dump_bytes(bytes: &[u8], width: usize, out: &mut dyn Write) -> Result<()> {
    let per_line = (width.saturating_sub(OFFSET_COLUMN) / 3).max(1);
    for (row, chunk) in bytes.chunks(per_line).enumerate() {
        let encoded = hex::encode(chunk);
        let pairs: Vec<&str> = (0..encoded.len())
            .step_by(2)
            .map(|i| &encoded[i..i + 2])
            .collect();
        writeln!(out, "{:08x}: {}", row * per_line, pairs.join(" "))?;
    }
    Ok(())
}
