use std::io::Write;

use super::{BlockDumper, BlockMode, method_bodies, parse_unit};
use crate::blocks::{BlockGraph, Flow, Instruction};
use crate::config::Config;
use crate::error::Result;
use crate::loader::InputUnit;

/// Per-method block listing. Basic mode shows instructions, rop mode shows
/// the block graph; with `--optimize` rop mode drops unreachable blocks.
#[derive(Debug, Default, Copy, Clone)]
pub struct BytecodeBlockDumper;

impl BlockDumper for BytecodeBlockDumper {
    fn dump(
        &self,
        unit: &InputUnit,
        out: &mut dyn Write,
        config: &Config,
        mode: BlockMode,
    ) -> Result<()> {
        let class = parse_unit(unit, config)?;

        for body in method_bodies(&class, config)? {
            writeln!(out, "method {}", body.title(&class))?;
            let Some(graph) = body.graph else {
                writeln!(out, "  (no code)")?;
                continue;
            };
            match mode {
                BlockMode::Basic => dump_basic(&graph, out)?,
                BlockMode::Rop => dump_rop(&graph, config.optimize, out)?,
            }
        }

        Ok(())
    }
}

fn dump_basic(graph: &BlockGraph, out: &mut dyn Write) -> Result<()> {
    for block in &graph.blocks {
        let handler = if block.is_handler { " (catch)" } else { "" };
        writeln!(
            out,
            "  block {} [{:04x}..{:04x}){handler}",
            block.label(),
            block.start,
            block.end
        )?;
        for insn in graph.block_instructions(block) {
            writeln!(out, "    {}", describe(insn))?;
        }
    }
    Ok(())
}

fn dump_rop(graph: &BlockGraph, optimize: bool, out: &mut dyn Write) -> Result<()> {
    let order: Vec<usize> = if optimize {
        graph.reverse_postorder()
    } else {
        (0..graph.blocks.len()).collect()
    };
    let labels = |ids: &[usize]| -> String {
        if ids.is_empty() {
            "(none)".to_string()
        } else {
            ids.iter()
                .map(|id| graph.blocks[*id].label())
                .collect::<Vec<_>>()
                .join(" ")
        }
    };

    for index in order {
        let block = &graph.blocks[index];
        writeln!(out, "  block {}", block.label())?;
        writeln!(out, "    preds: {}", labels(&block.predecessors))?;
        writeln!(out, "    succs: {}", labels(&block.successors))?;
        if let Some(primary) = block.primary_successor {
            writeln!(out, "    primary succ: {}", graph.blocks[primary].label())?;
        }
        if block.is_handler {
            writeln!(out, "    catch handler")?;
        }
    }
    Ok(())
}

fn describe(insn: &Instruction) -> String {
    let head = format!("{:04x}: {}", insn.offset, insn.mnemonic());
    match &insn.flow {
        Flow::Branch { target } | Flow::Goto { target } | Flow::Subroutine { target } => {
            format!("{head} -> {target:04x}")
        }
        Flow::Switch { default, cases } => {
            let cases: Vec<String> = cases.iter().map(|c| format!("{c:04x}")).collect();
            format!("{head} default {default:04x} cases [{}]", cases.join(", "))
        }
        Flow::Next | Flow::Exit => head,
    }
}
