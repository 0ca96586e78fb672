//! Parse → validate → execute, with the first failure ending the run.

use std::error::Error as _;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use crate::cli;
use crate::config::Config;
use crate::dump::{Dumpers, dispatch};
use crate::error::{DumpError, Result, UsageError};
use crate::loader::{FileReader, load_input};
use crate::options::{ParsedArgs, parse_args_from};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    Success = 0,
    UsageOrParseFailure = 2,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}

pub struct Driver<'a> {
    base: Config,
    reader: &'a dyn FileReader,
    dumpers: &'a Dumpers,
}

impl<'a> Driver<'a> {
    pub fn new(base: Config, reader: &'a dyn FileReader, dumpers: &'a Dumpers) -> Self {
        Self {
            base,
            reader,
            dumpers,
        }
    }

    /// Runs one invocation. `args` excludes the program name.
    pub fn run(
        &self,
        args: &[String],
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> ExitStatus {
        let (config, files_at) = match parse_args_from(self.base.clone(), args) {
            Ok(ParsedArgs::Run { config, files_at }) => (config, files_at),
            Ok(ParsedArgs::Help) => {
                let _ = write!(stdout, "{}", cli::long_help());
                return ExitStatus::Success;
            }
            Ok(ParsedArgs::Version) => {
                let _ = write!(stdout, "{}", cli::version());
                return ExitStatus::Success;
            }
            Err(err) => {
                report_usage(&err, stderr);
                return ExitStatus::UsageOrParseFailure;
            }
        };

        let files = &args[files_at..];
        tracing::debug!(?config, files = files.len(), "options parsed");

        match self.execute(&config, files, stdout) {
            Ok(()) => ExitStatus::Success,
            Err(err) => {
                report_failure(&err, config.debug, stderr);
                ExitStatus::UsageOrParseFailure
            }
        }
    }

    fn execute(&self, config: &Config, files: &[String], stdout: &mut dyn Write) -> Result<()> {
        for name in files {
            writeln!(stdout, "reading {name}...")?;
            let bytes = self
                .reader
                .read(Path::new(name))
                .map_err(|source| DumpError::Read {
                    path: name.into(),
                    source,
                })?;
            let unit = load_input(name, bytes)?;
            let mode = dispatch(self.dumpers, &unit, config, stdout)?;
            tracing::debug!(name = %name, ?mode, "dumped");
        }
        stdout.flush()?;
        Ok(())
    }
}

fn report_usage(err: &UsageError, stderr: &mut dyn Write) {
    let _ = writeln!(stderr, "{err}");
    let _ = writeln!(stderr, "{}", cli::usage());
}

fn report_failure(err: &DumpError, debug: bool, stderr: &mut dyn Write) {
    let _ = match err {
        DumpError::Parse(parse) => {
            let _ = writeln!(stderr, "\ntrouble parsing:");
            if debug {
                writeln!(stderr, "{parse:#?}")
            } else {
                parse.print_context(stderr)
            }
        }
        DumpError::Encoding { .. } => {
            let _ = writeln!(stderr, "unexpected internal error: {err}");
            write_causes(err, stderr)
        }
        DumpError::Read { .. } | DumpError::Output(_) => {
            let _ = writeln!(stderr, "{err}");
            write_causes(err, stderr)
        }
    };
}

fn write_causes(err: &DumpError, stderr: &mut dyn Write) -> std::io::Result<()> {
    let mut source = err.source();
    while let Some(cause) = source {
        writeln!(stderr, "  caused by: {cause}")?;
        source = cause.source();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::testing::ClassBuilder;
    use crate::dump::{BlockDumper, BlockMode, Dumper};
    use crate::error::ParseError;
    use crate::loader::InputUnit;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::rc::Rc;

    #[derive(Default)]
    struct MemoryReader {
        files: HashMap<PathBuf, Vec<u8>>,
        reads: RefCell<Vec<String>>,
    }

    impl MemoryReader {
        fn with(mut self, name: &str, bytes: &[u8]) -> Self {
            self.files.insert(PathBuf::from(name), bytes.to_vec());
            self
        }
    }

    impl FileReader for MemoryReader {
        fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
            self.reads.borrow_mut().push(path.display().to_string());
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound))
        }
    }

    type Calls = Rc<RefCell<Vec<(String, InputUnit, Config)>>>;

    /// Records calls and fails on inputs whose first byte is 0xff.
    struct Recording {
        label: &'static str,
        calls: Calls,
    }

    impl Recording {
        fn record(&self, label: String, unit: &InputUnit, config: &Config) -> Result<()> {
            self.calls
                .borrow_mut()
                .push((label, unit.clone(), config.clone()));
            if unit.bytes.first() == Some(&0xff) {
                return Err(ParseError::at(0, "bad magic")
                    .with_context(format!("...while parsing {}", unit.name))
                    .into());
            }
            Ok(())
        }
    }

    impl Dumper for Recording {
        fn dump(&self, unit: &InputUnit, _out: &mut dyn Write, config: &Config) -> Result<()> {
            self.record(self.label.to_string(), unit, config)
        }
    }

    impl BlockDumper for Recording {
        fn dump(
            &self,
            unit: &InputUnit,
            _out: &mut dyn Write,
            config: &Config,
            mode: BlockMode,
        ) -> Result<()> {
            self.record(format!("{}-{mode:?}", self.label), unit, config)
        }
    }

    fn recording() -> (Dumpers, Calls) {
        let calls: Calls = Rc::default();
        let make = |label| Recording {
            label,
            calls: Rc::clone(&calls),
        };
        let dumpers = Dumpers {
            dot: Box::new(make("dot")),
            blocks: Box::new(make("blocks")),
            ssa: Box::new(make("ssa")),
            class: Box::new(make("class")),
        };
        (dumpers, calls)
    }

    struct Outcome {
        status: ExitStatus,
        stdout: String,
        stderr: String,
    }

    fn run(reader: &MemoryReader, dumpers: &Dumpers, args: &[&str]) -> Outcome {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let status =
            Driver::new(Config::default(), reader, dumpers).run(&args, &mut stdout, &mut stderr);
        Outcome {
            status,
            stdout: String::from_utf8(stdout).unwrap(),
            stderr: String::from_utf8(stderr).unwrap(),
        }
    }

    #[test]
    fn single_class_file_goes_to_class_dumper() {
        let reader = MemoryReader::default().with("Foo.class", &[0xca, 0xfe]);
        let (dumpers, calls) = recording();

        let out = run(&reader, &dumpers, &["Foo.class"]);

        assert_eq!(out.status, ExitStatus::Success);
        assert_eq!(out.stdout, "reading Foo.class...\n");
        assert!(out.stderr.is_empty());
        let calls = calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "class");
        assert_eq!(calls[0].1.bytes, vec![0xca, 0xfe]);
    }

    #[test]
    fn unknown_option_stops_before_any_read() {
        let reader = MemoryReader::default().with("Foo.class", &[0xca]);
        let (dumpers, calls) = recording();

        let out = run(&reader, &dumpers, &["--bogus", "Foo.class"]);

        assert_eq!(out.status, ExitStatus::UsageOrParseFailure);
        assert!(out.stderr.starts_with("unknown option: --bogus\n"));
        assert!(out.stderr.contains("Usage"));
        assert!(reader.reads.borrow().is_empty());
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn malformed_width_stops_before_execute() {
        let reader = MemoryReader::default().with("Foo.class", &[0xca]);
        let (dumpers, calls) = recording();

        let out = run(&reader, &dumpers, &["--width=notanumber", "Foo.class"]);

        assert_eq!(out.status, ExitStatus::UsageOrParseFailure);
        assert!(out.stderr.contains("--width"));
        assert!(out.stdout.is_empty());
        assert!(reader.reads.borrow().is_empty());
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn flags_only_is_missing_input() {
        let reader = MemoryReader::default();
        let (dumpers, _) = recording();

        let out = run(&reader, &dumpers, &["--dot", "--strict"]);

        assert_eq!(out.status, ExitStatus::UsageOrParseFailure);
        assert!(out.stderr.starts_with("no input files specified\n"));
        assert!(reader.reads.borrow().is_empty());
    }

    #[test]
    fn first_parse_failure_abandons_remaining_files() {
        let reader = MemoryReader::default()
            .with("Bad.class", &[0xff, 0x00])
            .with("Good.class", &[0xca, 0xfe]);
        let (dumpers, calls) = recording();

        let out = run(&reader, &dumpers, &["Bad.class", "Good.class"]);

        assert_eq!(out.status, ExitStatus::UsageOrParseFailure);
        assert_eq!(*reader.reads.borrow(), vec!["Bad.class".to_string()]);
        assert_eq!(calls.borrow().len(), 1);
        assert!(!out.stdout.contains("Good.class"));
        assert_eq!(
            out.stderr,
            "\ntrouble parsing:\nbad magic (at offset 0x0000)\n...while parsing Bad.class\n"
        );
    }

    #[test]
    fn debug_flag_prints_full_detail() {
        let reader = MemoryReader::default().with("Bad.class", &[0xff]);
        let (dumpers, _) = recording();

        let out = run(&reader, &dumpers, &["--debug", "Bad.class"]);

        assert_eq!(out.status, ExitStatus::UsageOrParseFailure);
        assert!(out.stderr.starts_with("\ntrouble parsing:\nParseError {"));
        assert!(out.stderr.contains("offset: Some("));
        assert!(out.stderr.contains("...while parsing Bad.class"));
    }

    #[test]
    fn hex_text_reaches_dumper_as_the_same_bytes() {
        let mut b = ClassBuilder::new();
        b.method("run", "()V", &[0xb1]);
        let raw = b.build("demo/Hello");
        let hex_text: String = raw.iter().map(|byte| format!("{byte:02x} ")).collect();

        let reader = MemoryReader::default()
            .with("Hello.class", &raw)
            .with("Hello.hex", hex_text.as_bytes());
        let (dumpers, calls) = recording();

        let out = run(&reader, &dumpers, &["Hello.hex", "Hello.class"]);

        assert_eq!(out.status, ExitStatus::Success);
        let calls = calls.borrow();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1.bytes, calls[1].1.bytes);
        assert_eq!(calls[0].1.bytes, raw);
    }

    #[test]
    fn ssa_with_optimize_in_either_order_turns_optimize_off() {
        for flags in [["--ssa-blocks", "--optimize"], ["--optimize", "--ssa-blocks"]] {
            let reader = MemoryReader::default().with("Foo.class", &[0xca]);
            let (dumpers, calls) = recording();

            let out = run(&reader, &dumpers, &[flags[0], flags[1], "Foo.class"]);

            assert_eq!(out.status, ExitStatus::Success);
            let calls = calls.borrow();
            assert_eq!(calls[0].0, "ssa");
            assert!(calls[0].2.ssa_blocks);
            assert!(!calls[0].2.optimize);
        }
    }

    #[test]
    fn missing_file_is_fatal() {
        let reader = MemoryReader::default().with("B.class", &[0xca]);
        let (dumpers, calls) = recording();

        let out = run(&reader, &dumpers, &["A.class", "B.class"]);

        assert_eq!(out.status, ExitStatus::UsageOrParseFailure);
        assert!(out.stderr.starts_with("failed to read A.class\n"));
        assert!(out.stderr.contains("caused by:"));
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn invalid_utf8_hex_input_is_fatal() {
        let reader = MemoryReader::default().with("Foo.hex", &[0xc3, 0x28]);
        let (dumpers, calls) = recording();

        let out = run(&reader, &dumpers, &["Foo.hex"]);

        assert_eq!(out.status, ExitStatus::UsageOrParseFailure);
        assert!(out.stderr.starts_with("unexpected internal error: input Foo.hex"));
        assert!(out.stderr.contains("caused by: invalid utf-8"));
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn malformed_hex_is_a_parse_failure() {
        let reader = MemoryReader::default().with("Foo.txt", b"ca fe zz");
        let (dumpers, calls) = recording();

        let out = run(&reader, &dumpers, &["Foo.txt"]);

        assert_eq!(out.status, ExitStatus::UsageOrParseFailure);
        assert!(out.stderr.contains("trouble parsing:\nbogus digit character"));
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn help_prints_to_stdout_and_succeeds() {
        let reader = MemoryReader::default();
        let (dumpers, _) = recording();

        let out = run(&reader, &dumpers, &["--help"]);

        assert_eq!(out.status, ExitStatus::Success);
        assert!(out.stdout.contains("--ssa-blocks"));
    }

    #[test]
    fn exit_codes_match_contract() {
        assert_eq!(ExitStatus::Success.code(), 0);
        assert_eq!(ExitStatus::UsageOrParseFailure.code(), 2);
    }
}
