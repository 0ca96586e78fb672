use std::io::Write;

use super::{Dumper, method_bodies, parse_unit};
use crate::blocks::BlockGraph;
use crate::config::Config;
use crate::error::Result;
use crate::loader::InputUnit;

/// How far the SSA dump goes. Unrecognized names mean `All`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SsaStep {
    EdgeSplit,
    PhiPlacement,
    All,
}

impl SsaStep {
    pub fn from_config(config: &Config) -> Self {
        match config.ssa_step.as_deref() {
            Some("edge-split") => SsaStep::EdgeSplit,
            Some("phi-placement") => SsaStep::PhiPlacement,
            _ => SsaStep::All,
        }
    }

    fn name(self) -> &'static str {
        match self {
            SsaStep::EdgeSplit => "edge-split",
            SsaStep::PhiPlacement => "phi-placement",
            SsaStep::All => "all",
        }
    }
}

/// Dominator tree and phi placement sites per method.
#[derive(Debug, Default, Copy, Clone)]
pub struct SsaDumper;

impl Dumper for SsaDumper {
    fn dump(&self, unit: &InputUnit, out: &mut dyn Write, config: &Config) -> Result<()> {
        let class = parse_unit(unit, config)?;
        let step = SsaStep::from_config(config);

        for body in method_bodies(&class, config)? {
            writeln!(
                out,
                "ssa {} (step: {}, optimize: {})",
                body.title(&class),
                step.name(),
                config.optimize
            )?;
            match &body.graph {
                Some(graph) => dump_graph(graph, step, out)?,
                None => writeln!(out, "  (no code)")?,
            }
        }

        Ok(())
    }
}

fn dump_graph(graph: &BlockGraph, step: SsaStep, out: &mut dyn Write) -> Result<()> {
    let idom = graph.immediate_dominators();
    let rpo = graph.reverse_postorder();

    for &index in &rpo {
        let dominator = match idom[index] {
            Some(d) => graph.blocks[d].label(),
            None => "-".to_string(),
        };
        writeln!(out, "  block {} idom {dominator}", graph.blocks[index].label())?;
    }

    if step >= SsaStep::PhiPlacement {
        writeln!(out, "  phi sites:")?;
        let frontiers = graph.dominance_frontiers(&idom);
        for &index in &rpo {
            if frontiers[index].is_empty() {
                continue;
            }
            let sites: Vec<String> = frontiers[index]
                .iter()
                .map(|b| graph.blocks[*b].label())
                .collect();
            writeln!(out, "    {}: {}", graph.blocks[index].label(), sites.join(" "))?;
        }
    }

    if step == SsaStep::All {
        let exits: Vec<String> = rpo
            .iter()
            .filter(|b| graph.blocks[**b].successors.is_empty())
            .map(|b| graph.blocks[*b].label())
            .collect();
        let unreachable = graph.blocks.len() - rpo.len();
        writeln!(
            out,
            "  entry {} exits [{}] unreachable {unreachable}",
            graph.blocks[0].label(),
            exits.join(" ")
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::testing::ClassBuilder;

    // iload_0; ifeq -> 8; iconst_1; goto -> 9; iconst_0; ireturn
    const DIAMOND: [u8; 10] = [0x1a, 0x99, 0x00, 0x07, 0x04, 0xa7, 0x00, 0x04, 0x03, 0xac];

    fn render(step: Option<&str>) -> String {
        let mut b = ClassBuilder::new();
        b.method("pick", "(Z)I", &DIAMOND);
        let unit = InputUnit {
            name: "Pick.class".to_string(),
            bytes: b.build("demo/Pick"),
        };
        let config = Config {
            ssa_blocks: true,
            ssa_step: step.map(str::to_string),
            ..Config::default()
        };
        let mut out = Vec::new();
        SsaDumper.dump(&unit, &mut out, &config).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn full_dump_has_dominators_phis_and_summary() {
        let text = render(None);
        assert!(text.starts_with("ssa demo/Pick.pick(Z)I (step: all, optimize: false)\n"));
        assert!(text.contains("  block B0000 idom -\n"));
        assert!(text.contains("  block B0009 idom B0000\n"));
        assert!(text.contains("    B0004: B0009\n"));
        assert!(text.contains("  entry B0000 exits [B0009] unreachable 0\n"));
    }

    #[test]
    fn edge_split_step_stops_before_phis() {
        let text = render(Some("edge-split"));
        assert!(text.contains("(step: edge-split"));
        assert!(!text.contains("phi sites"));
        assert!(!text.contains("entry "));
    }

    #[test]
    fn phi_placement_step_omits_summary() {
        let text = render(Some("phi-placement"));
        assert!(text.contains("phi sites"));
        assert!(!text.contains("entry "));
    }

    #[test]
    fn unknown_step_means_all() {
        assert_eq!(
            SsaStep::from_config(&Config {
                ssa_step: Some("renaming".to_string()),
                ..Config::default()
            }),
            SsaStep::All
        );
    }
}
