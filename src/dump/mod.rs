//! Dump collaborators and the dispatcher that picks exactly one per file.

mod block;
mod class;
mod dot;
mod ssa;

use std::io::Write;

use crate::blocks::BlockGraph;
use crate::classfile::{ClassFile, parse_class};
use crate::config::{Config, DumpMode};
use crate::error::{ParseResult, Result};
use crate::loader::InputUnit;

pub use block::BytecodeBlockDumper;
pub use class::ClassDumper;
pub use dot::DotDumper;
pub use ssa::{SsaDumper, SsaStep};

/// A dumper renders one decoded input to `out`.
pub trait Dumper {
    fn dump(&self, unit: &InputUnit, out: &mut dyn Write, config: &Config) -> Result<()>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BlockMode {
    Basic,
    Rop,
}

/// The block dumper serves two dump modes.
pub trait BlockDumper {
    fn dump(
        &self,
        unit: &InputUnit,
        out: &mut dyn Write,
        config: &Config,
        mode: BlockMode,
    ) -> Result<()>;
}

pub struct Dumpers {
    pub dot: Box<dyn Dumper>,
    pub blocks: Box<dyn BlockDumper>,
    pub ssa: Box<dyn Dumper>,
    pub class: Box<dyn Dumper>,
}

impl Default for Dumpers {
    fn default() -> Self {
        Self {
            dot: Box::new(DotDumper),
            blocks: Box::new(BytecodeBlockDumper),
            ssa: Box::new(SsaDumper),
            class: Box::new(ClassDumper),
        }
    }
}

/// Runs the single dumper selected by `config` and returns the mode used.
pub fn dispatch(
    dumpers: &Dumpers,
    unit: &InputUnit,
    config: &Config,
    out: &mut dyn Write,
) -> Result<DumpMode> {
    let mode = config.dump_mode();
    let config = config.for_mode(mode);
    tracing::debug!(name = %unit.name, ?mode, bytes = unit.bytes.len(), "dispatching");

    match mode {
        DumpMode::Dot => dumpers.dot.dump(unit, out, &config)?,
        DumpMode::BasicBlocks => dumpers.blocks.dump(unit, out, &config, BlockMode::Basic)?,
        DumpMode::RopBlocks => dumpers.blocks.dump(unit, out, &config, BlockMode::Rop)?,
        DumpMode::Ssa => dumpers.ssa.dump(unit, out, &config)?,
        DumpMode::Plain => dumpers.class.dump(unit, out, &config)?,
    }

    Ok(mode)
}

fn parse_unit(unit: &InputUnit, config: &Config) -> ParseResult<ClassFile> {
    parse_class(&unit.bytes, config.strict_parse)
        .map_err(|e| e.with_context(format!("...while parsing {}", unit.name)))
}

/// A method selected by `--method`, with its block graph when it has code.
struct MethodBody<'c> {
    name: &'c str,
    descriptor: &'c str,
    graph: Option<BlockGraph>,
}

impl MethodBody<'_> {
    fn title(&self, class: &ClassFile) -> String {
        format!("{}.{}{}", class.this_class_name(), self.name, self.descriptor)
    }
}

fn method_bodies<'c>(class: &'c ClassFile, config: &Config) -> ParseResult<Vec<MethodBody<'c>>> {
    let mut bodies = Vec::new();
    for method in &class.methods {
        let name = class.member_name(method);
        if !config.wants_method(name) {
            continue;
        }
        let descriptor = class.member_descriptor(method);
        let graph = match class.code(method)? {
            Some(code) => Some(BlockGraph::build(&code).map_err(|e| {
                e.with_context(format!("...while analyzing method {name}{descriptor}"))
            })?),
            None => None,
        };
        bodies.push(MethodBody {
            name,
            descriptor,
            graph,
        });
    }
    Ok(bodies)
}
