use std::env;

pub const DEFAULT_WIDTH: i32 = 80;

/// Environment override for the default dump width.
pub const WIDTH_ENV: &str = "CLASS_DUMP_WIDTH";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub raw_bytes: bool,
    pub basic_blocks: bool,
    pub rop_blocks: bool,
    pub optimize: bool,
    pub ssa_blocks: bool,
    pub ssa_step: Option<String>,
    pub debug: bool,
    pub dot_dump: bool,
    pub strict_parse: bool,
    pub width: Option<i32>,
    pub method: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            raw_bytes: false,
            basic_blocks: false,
            rop_blocks: false,
            optimize: false,
            ssa_blocks: false,
            ssa_step: None,
            debug: false,
            dot_dump: false,
            strict_parse: false,
            width: Some(DEFAULT_WIDTH),
            method: None,
        }
    }
}

impl Config {
    /// Defaults with the width taken from `CLASS_DUMP_WIDTH` when it holds a
    /// positive integer.
    pub fn from_env() -> Self {
        let width = env::var(WIDTH_ENV)
            .ok()
            .and_then(|raw| raw.trim().parse::<i32>().ok())
            .filter(|w| *w > 0)
            .unwrap_or(DEFAULT_WIDTH);

        Self {
            width: Some(width),
            ..Self::default()
        }
    }

    /// Effective dump width; absent or non-positive values fall back to
    /// [`DEFAULT_WIDTH`].
    pub fn width(&self) -> usize {
        match self.width {
            Some(width) if width > 0 => width as usize,
            _ => DEFAULT_WIDTH as usize,
        }
    }

    pub fn dump_mode(&self) -> DumpMode {
        DumpMode::from_config(self)
    }

    /// The configuration a dumper of the given mode actually sees. SSA dumps
    /// never run the optimizer.
    pub fn for_mode(&self, mode: DumpMode) -> Config {
        let mut effective = self.clone();
        if mode == DumpMode::Ssa {
            effective.optimize = false;
        }
        effective
    }

    /// True when `name` passes the `--method` filter.
    pub fn wants_method(&self, name: &str) -> bool {
        self.method.as_deref().is_none_or(|m| m == name)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DumpMode {
    Dot,
    BasicBlocks,
    RopBlocks,
    Ssa,
    Plain,
}

impl DumpMode {
    /// First set mode flag wins: dot, basic blocks, rop blocks, ssa, else
    /// the plain class dump.
    pub fn from_config(config: &Config) -> Self {
        if config.dot_dump {
            DumpMode::Dot
        } else if config.basic_blocks {
            DumpMode::BasicBlocks
        } else if config.rop_blocks {
            DumpMode::RopBlocks
        } else if config.ssa_blocks {
            DumpMode::Ssa
        } else {
            DumpMode::Plain
        }
    }
}
