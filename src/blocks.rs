//! Instruction boundaries, basic blocks and dominators for one method body.

use std::collections::BTreeSet;

use petgraph::algo::dominators::simple_fast;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::DfsPostOrder;

use crate::classfile::Code;
use crate::error::{ParseError, ParseResult};

const MNEMONICS: [&str; 202] = [
    "nop", "aconst_null", "iconst_m1", "iconst_0", "iconst_1", "iconst_2", "iconst_3", "iconst_4",
    "iconst_5", "lconst_0", "lconst_1", "fconst_0", "fconst_1", "fconst_2", "dconst_0", "dconst_1",
    "bipush", "sipush", "ldc", "ldc_w", "ldc2_w", "iload", "lload", "fload", "dload", "aload",
    "iload_0", "iload_1", "iload_2", "iload_3", "lload_0", "lload_1", "lload_2", "lload_3",
    "fload_0", "fload_1", "fload_2", "fload_3", "dload_0", "dload_1", "dload_2", "dload_3",
    "aload_0", "aload_1", "aload_2", "aload_3", "iaload", "laload", "faload", "daload", "aaload",
    "baload", "caload", "saload", "istore", "lstore", "fstore", "dstore", "astore", "istore_0",
    "istore_1", "istore_2", "istore_3", "lstore_0", "lstore_1", "lstore_2", "lstore_3",
    "fstore_0", "fstore_1", "fstore_2", "fstore_3", "dstore_0", "dstore_1", "dstore_2",
    "dstore_3", "astore_0", "astore_1", "astore_2", "astore_3", "iastore", "lastore", "fastore",
    "dastore", "aastore", "bastore", "castore", "sastore", "pop", "pop2", "dup", "dup_x1",
    "dup_x2", "dup2", "dup2_x1", "dup2_x2", "swap", "iadd", "ladd", "fadd", "dadd", "isub", "lsub",
    "fsub", "dsub", "imul", "lmul", "fmul", "dmul", "idiv", "ldiv", "fdiv", "ddiv", "irem", "lrem",
    "frem", "drem", "ineg", "lneg", "fneg", "dneg", "ishl", "lshl", "ishr", "lshr", "iushr",
    "lushr", "iand", "land", "ior", "lor", "ixor", "lxor", "iinc", "i2l", "i2f", "i2d", "l2i",
    "l2f", "l2d", "f2i", "f2l", "f2d", "d2i", "d2l", "d2f", "i2b", "i2c", "i2s", "lcmp", "fcmpl",
    "fcmpg", "dcmpl", "dcmpg", "ifeq", "ifne", "iflt", "ifge", "ifgt", "ifle", "if_icmpeq",
    "if_icmpne", "if_icmplt", "if_icmpge", "if_icmpgt", "if_icmple", "if_acmpeq", "if_acmpne",
    "goto", "jsr", "ret", "tableswitch", "lookupswitch", "ireturn", "lreturn", "freturn",
    "dreturn", "areturn", "return", "getstatic", "putstatic", "getfield", "putfield",
    "invokevirtual", "invokespecial", "invokestatic", "invokeinterface", "invokedynamic", "new",
    "newarray", "anewarray", "arraylength", "athrow", "checkcast", "instanceof", "monitorenter",
    "monitorexit", "wide", "multianewarray", "ifnull", "ifnonnull", "goto_w", "jsr_w",
];

const GOTO: u8 = 0xa7;
const JSR: u8 = 0xa8;
const RET: u8 = 0xa9;
const TABLESWITCH: u8 = 0xaa;
const LOOKUPSWITCH: u8 = 0xab;
const ATHROW: u8 = 0xbf;
const WIDE: u8 = 0xc4;
const IINC: u8 = 0x84;
const GOTO_W: u8 = 0xc8;
const JSR_W: u8 = 0xc9;

/// How control leaves an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Next,
    Branch { target: usize },
    Goto { target: usize },
    Subroutine { target: usize },
    Switch { default: usize, cases: Vec<usize> },
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub offset: usize,
    pub opcode: u8,
    pub len: usize,
    pub flow: Flow,
}

impl Instruction {
    pub fn mnemonic(&self) -> &'static str {
        MNEMONICS.get(self.opcode as usize).copied().unwrap_or("???")
    }

    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    pub start: usize,
    pub end: usize,
    /// Range into [`BlockGraph::instructions`].
    pub first_insn: usize,
    pub insn_count: usize,
    pub successors: Vec<usize>,
    pub predecessors: Vec<usize>,
    pub primary_successor: Option<usize>,
    pub is_handler: bool,
}

impl BasicBlock {
    pub fn label(&self) -> String {
        format!("B{:04x}", self.start)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockGraph {
    pub instructions: Vec<Instruction>,
    pub blocks: Vec<BasicBlock>,
}

impl BlockGraph {
    pub fn build(code: &Code) -> ParseResult<Self> {
        let instructions = decode(&code.code)?;
        if instructions.is_empty() {
            return Err(ParseError::at(0, "empty code array"));
        }
        let boundaries: BTreeSet<usize> = instructions.iter().map(|i| i.offset).collect();
        let check = |target: usize, from: usize| -> ParseResult<usize> {
            if boundaries.contains(&target) {
                Ok(target)
            } else {
                Err(ParseError::at(
                    from,
                    format!("branch target {target:04x} is not an instruction boundary"),
                ))
            }
        };

        let mut leaders = BTreeSet::from([0usize]);
        for insn in &instructions {
            let ends_block = match &insn.flow {
                Flow::Next => false,
                Flow::Branch { target } | Flow::Goto { target } | Flow::Subroutine { target } => {
                    leaders.insert(check(*target, insn.offset)?);
                    true
                }
                Flow::Switch { default, cases } => {
                    leaders.insert(check(*default, insn.offset)?);
                    for case in cases {
                        leaders.insert(check(*case, insn.offset)?);
                    }
                    true
                }
                Flow::Exit => true,
            };
            if ends_block && insn.end() < code.code.len() {
                leaders.insert(insn.end());
            }
        }
        for handler in &code.exception_table {
            for pc in [handler.start_pc, handler.handler_pc] {
                leaders.insert(check(pc as usize, pc as usize)?);
            }
            let end = handler.end_pc as usize;
            if end < code.code.len() {
                leaders.insert(check(end, end)?);
            }
        }

        let mut blocks = Vec::with_capacity(leaders.len());
        let mut first_insn = 0usize;
        let leaders: Vec<usize> = leaders.into_iter().collect();
        for (i, start) in leaders.iter().enumerate() {
            let end = leaders.get(i + 1).copied().unwrap_or(code.code.len());
            let insn_count = instructions[first_insn..]
                .iter()
                .take_while(|insn| insn.offset < end)
                .count();
            blocks.push(BasicBlock {
                start: *start,
                end,
                first_insn,
                insn_count,
                successors: Vec::new(),
                predecessors: Vec::new(),
                primary_successor: None,
                is_handler: code
                    .exception_table
                    .iter()
                    .any(|h| h.handler_pc as usize == *start),
            });
            first_insn += insn_count;
        }

        let block_at = |offset: usize| leaders.binary_search(&offset).ok();

        for index in 0..blocks.len() {
            let block = &blocks[index];
            let last = &instructions[block.first_insn + block.insn_count - 1];
            let fallthrough = || {
                block_at(last.end()).ok_or_else(|| {
                    ParseError::at(last.offset, "control falls off the end of the code")
                })
            };

            let (mut successors, primary) = match &last.flow {
                Flow::Next => {
                    let next = fallthrough()?;
                    (vec![next], Some(next))
                }
                Flow::Branch { target } => {
                    let next = fallthrough()?;
                    (vec![next, block_at(*target).unwrap_or(next)], Some(next))
                }
                Flow::Goto { target } => {
                    let t = block_at(*target).unwrap_or(index);
                    (vec![t], Some(t))
                }
                Flow::Subroutine { target } => {
                    let t = block_at(*target).unwrap_or(index);
                    let mut succ = vec![t];
                    if let Some(next) = block_at(last.end()) {
                        succ.push(next);
                    }
                    (succ, Some(t))
                }
                Flow::Switch { default, cases } => {
                    let d = block_at(*default).unwrap_or(index);
                    let mut succ = vec![d];
                    succ.extend(cases.iter().filter_map(|c| block_at(*c)));
                    (succ, Some(d))
                }
                Flow::Exit => (Vec::new(), None),
            };

            for handler in &code.exception_table {
                let covered = handler.start_pc as usize..handler.end_pc as usize;
                if covered.contains(&block.start)
                    && let Some(h) = block_at(handler.handler_pc as usize)
                {
                    successors.push(h);
                }
            }

            let mut seen = BTreeSet::new();
            successors.retain(|s| seen.insert(*s));
            blocks[index].successors = successors;
            blocks[index].primary_successor = primary;
        }

        for index in 0..blocks.len() {
            for succ in blocks[index].successors.clone() {
                blocks[succ].predecessors.push(index);
            }
        }

        Ok(Self {
            instructions,
            blocks,
        })
    }

    pub fn block_instructions(&self, block: &BasicBlock) -> &[Instruction] {
        &self.instructions[block.first_insn..block.first_insn + block.insn_count]
    }

    /// Control-flow graph over block indices, edges in successor order.
    pub fn flow_graph(&self) -> DiGraph<(), ()> {
        let edges: usize = self.blocks.iter().map(|b| b.successors.len()).sum();
        let mut graph = DiGraph::with_capacity(self.blocks.len(), edges);
        for _ in &self.blocks {
            graph.add_node(());
        }
        for (from, block) in self.blocks.iter().enumerate() {
            for &to in &block.successors {
                graph.add_edge(NodeIndex::new(from), NodeIndex::new(to), ());
            }
        }
        graph
    }

    /// Blocks reachable from the entry in reverse postorder.
    pub fn reverse_postorder(&self) -> Vec<usize> {
        let graph = self.flow_graph();
        let mut dfs = DfsPostOrder::new(&graph, NodeIndex::new(0));
        let mut order = Vec::with_capacity(self.blocks.len());
        while let Some(node) = dfs.next(&graph) {
            order.push(node.index());
        }
        order.reverse();
        order
    }

    /// Immediate dominator of each block; `None` for the entry and for
    /// unreachable blocks.
    pub fn immediate_dominators(&self) -> Vec<Option<usize>> {
        let graph = self.flow_graph();
        let dominators = simple_fast(&graph, NodeIndex::new(0));
        graph
            .node_indices()
            .map(|node| dominators.immediate_dominator(node).map(|d| d.index()))
            .collect()
    }

    /// Dominance frontier of each block, the join points where phi
    /// functions would be placed.
    pub fn dominance_frontiers(&self, idom: &[Option<usize>]) -> Vec<BTreeSet<usize>> {
        let mut frontiers = vec![BTreeSet::new(); self.blocks.len()];
        let reachable = |b: usize| b == 0 || idom[b].is_some();

        for (b, block) in self.blocks.iter().enumerate() {
            if !reachable(b) {
                continue;
            }
            let stop = idom[b];
            for &p in &block.predecessors {
                if !reachable(p) {
                    continue;
                }
                let mut runner = Some(p);
                while let Some(r) = runner
                    && Some(r) != stop
                {
                    frontiers[r].insert(b);
                    runner = idom[r];
                }
            }
        }

        frontiers
    }
}

/// Splits a code array into instructions.
pub fn decode(code: &[u8]) -> ParseResult<Vec<Instruction>> {
    let mut out = Vec::new();
    let mut pc = 0usize;
    while pc < code.len() {
        let insn = decode_one(code, pc)?;
        pc = insn.end();
        out.push(insn);
    }
    Ok(out)
}

fn decode_one(code: &[u8], pc: usize) -> ParseResult<Instruction> {
    let opcode = code[pc];
    let s16 = |at: usize| -> ParseResult<i64> {
        let b = code.get(at..at + 2).ok_or_else(|| truncated(pc))?;
        Ok(i16::from_be_bytes([b[0], b[1]]) as i64)
    };
    let s32 = |at: usize| -> ParseResult<i64> {
        let b = code.get(at..at + 4).ok_or_else(|| truncated(pc))?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]) as i64)
    };
    let target = |delta: i64| -> ParseResult<usize> {
        usize::try_from(pc as i64 + delta).map_err(|_| {
            ParseError::at(pc, format!("branch target before start of code ({delta})"))
        })
    };

    let (len, flow) = match opcode {
        0x00..=0x0f | 0x1a..=0x35 | 0x3b..=0x83 | 0x85..=0x98 => (1, Flow::Next),
        0x10 | 0x12 | 0x15..=0x19 | 0x36..=0x3a | 0xbc => (2, Flow::Next),
        0x11 | 0x13 | 0x14 | IINC | 0xb2..=0xb8 | 0xbb | 0xbd | 0xc0 | 0xc1 => (3, Flow::Next),
        0x99..=0xa6 | 0xc6 | 0xc7 => (3, Flow::Branch { target: target(s16(pc + 1)?)? }),
        GOTO => (3, Flow::Goto { target: target(s16(pc + 1)?)? }),
        JSR => (3, Flow::Subroutine { target: target(s16(pc + 1)?)? }),
        RET => (2, Flow::Exit),
        TABLESWITCH => {
            let base = (pc + 4) & !3;
            let default = target(s32(base)?)?;
            let low = s32(base + 4)?;
            let high = s32(base + 8)?;
            if high < low {
                return Err(ParseError::at(pc, format!("tableswitch bounds {low}..{high}")));
            }
            let count = (high - low + 1) as usize;
            let end = table_end(code, pc, base + 12, count, 4)?;
            let mut cases = Vec::with_capacity(count);
            for i in 0..count {
                cases.push(target(s32(base + 12 + 4 * i)?)?);
            }
            (end - pc, Flow::Switch { default, cases })
        }
        LOOKUPSWITCH => {
            let base = (pc + 4) & !3;
            let default = target(s32(base)?)?;
            let pairs = s32(base + 4)?;
            if pairs < 0 {
                return Err(ParseError::at(pc, format!("lookupswitch pair count {pairs}")));
            }
            let pairs = pairs as usize;
            let end = table_end(code, pc, base + 8, pairs, 8)?;
            let mut cases = Vec::with_capacity(pairs);
            for i in 0..pairs {
                cases.push(target(s32(base + 12 + 8 * i)?)?);
            }
            (end - pc, Flow::Switch { default, cases })
        }
        0xac..=0xb1 | ATHROW => (1, Flow::Exit),
        0xb9 | 0xba => (5, Flow::Next),
        0xbe | 0xc2 | 0xc3 => (1, Flow::Next),
        WIDE => {
            let modified = *code.get(pc + 1).ok_or_else(|| truncated(pc))?;
            (if modified == IINC { 6 } else { 4 }, Flow::Next)
        }
        0xc5 => (4, Flow::Next),
        GOTO_W => (5, Flow::Goto { target: target(s32(pc + 1)?)? }),
        JSR_W => (5, Flow::Subroutine { target: target(s32(pc + 1)?)? }),
        other => {
            return Err(ParseError::at(pc, format!("invalid opcode {other:02x}")));
        }
    };

    if pc + len > code.len() {
        return Err(truncated(pc));
    }

    Ok(Instruction {
        offset: pc,
        opcode,
        len,
        flow,
    })
}

/// End offset of a switch jump table, checked against the code length
/// before any case is read.
fn table_end(
    code: &[u8],
    pc: usize,
    start: usize,
    entries: usize,
    entry_len: usize,
) -> ParseResult<usize> {
    entries
        .checked_mul(entry_len)
        .and_then(|len| len.checked_add(start))
        .filter(|end| *end <= code.len())
        .ok_or_else(|| truncated(pc))
}

fn truncated(pc: usize) -> ParseError {
    ParseError::at(pc, "instruction runs past the end of the code")
}
