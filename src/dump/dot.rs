use std::io::Write;

use super::{Dumper, method_bodies, parse_unit};
use crate::config::Config;
use crate::error::Result;
use crate::loader::InputUnit;

/// One `digraph` per method. Primary edges are solid, the rest dashed.
#[derive(Debug, Default, Copy, Clone)]
pub struct DotDumper;

impl Dumper for DotDumper {
    fn dump(&self, unit: &InputUnit, out: &mut dyn Write, config: &Config) -> Result<()> {
        let class = parse_unit(unit, config)?;

        for body in method_bodies(&class, config)? {
            let Some(graph) = body.graph.as_ref() else {
                continue;
            };
            writeln!(out, "digraph {:?} {{", body.title(&class))?;
            for block in &graph.blocks {
                let shape = if block.is_handler { "octagon" } else { "box" };
                writeln!(
                    out,
                    "  {} [shape={shape},label=\"{}\\n{:04x}..{:04x}\"];",
                    block.label(),
                    block.label(),
                    block.start,
                    block.end
                )?;
            }
            for block in &graph.blocks {
                for succ in &block.successors {
                    let style = if block.primary_successor == Some(*succ) {
                        ""
                    } else {
                        " [style=dashed]"
                    };
                    writeln!(
                        out,
                        "  {} -> {}{style};",
                        block.label(),
                        graph.blocks[*succ].label()
                    )?;
                }
            }
            writeln!(out, "}}")?;
        }

        Ok(())
    }
}
