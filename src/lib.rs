//! # class-dump
//!
//! Command-line dumper for Java class files, given either as raw `.class`
//! bytes or as hex-encoded text.
//!
//! ## Architecture
//!
//! - **options**: leading `--flag` scanning into an immutable [`config::Config`]
//! - **config**: dump configuration and [`config::DumpMode`] selection
//! - **cli**: clap flag reference used for usage and help text
//! - **loader**: file reading and raw-vs-hex input decoding
//! - **hexparse**: hex text format decoder
//! - **dump**: dumper collaborators and the per-file dispatcher
//! - **classfile**: class-file container reader used by the dumpers
//! - **blocks**: basic blocks and dominators over method bytecode
//! - **driver**: parse, validate and execute phases with exit status mapping
//! - **error**: usage, parse and run failure types

pub mod blocks;
pub mod classfile;
pub mod cli;
pub mod config;
pub mod driver;
pub mod dump;
pub mod error;
pub mod hexparse;
pub mod loader;
pub mod options;
