use crate::config::Config;
use crate::error::UsageError;

const OPTION_PREFIX: &str = "--";

/// Outcome of scanning the leading options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedArgs {
    /// Options consumed; input files start at `files_at`.
    Run { config: Config, files_at: usize },
    Help,
    Version,
}

pub fn parse_args(args: &[String]) -> Result<ParsedArgs, UsageError> {
    parse_args_from(Config::default(), args)
}

/// Scans `args` (program name excluded) starting from `base`.
///
/// Scanning stops at the first token that does not start with `--` or at a
/// bare `--`, which is consumed. At least one input file must follow.
pub fn parse_args_from(base: Config, args: &[String]) -> Result<ParsedArgs, UsageError> {
    let mut config = base;
    let mut at = 0usize;

    while at < args.len() {
        let arg = args[at].as_str();
        if arg == OPTION_PREFIX {
            at += 1;
            break;
        }
        if !arg.starts_with(OPTION_PREFIX) {
            break;
        }

        match arg {
            "--bytes" => config.raw_bytes = true,
            "--basic-blocks" => config.basic_blocks = true,
            "--rop-blocks" => config.rop_blocks = true,
            "--optimize" => config.optimize = true,
            "--ssa-blocks" => config.ssa_blocks = true,
            "--debug" => config.debug = true,
            "--dot" => config.dot_dump = true,
            "--strict" => config.strict_parse = true,
            "--help" => return Ok(ParsedArgs::Help),
            "--version" => return Ok(ParsedArgs::Version),
            _ => {
                if let Some(step) = arg.strip_prefix("--ssa-step=") {
                    config.ssa_step = Some(step.to_string());
                } else if let Some(raw) = arg.strip_prefix("--width=") {
                    config.width = Some(parse_width(raw)?);
                } else if let Some(name) = arg.strip_prefix("--method=") {
                    config.method = Some(name.to_string());
                } else {
                    return Err(UsageError::UnknownOption(arg.to_string()));
                }
            }
        }
        at += 1;
    }

    if at == args.len() {
        return Err(UsageError::MissingInput);
    }

    Ok(ParsedArgs::Run {
        config,
        files_at: at,
    })
}

fn parse_width(raw: &str) -> Result<i32, UsageError> {
    raw.parse::<i32>()
        .map_err(|_| UsageError::MalformedArgument {
            option: "--width".to_string(),
            value: raw.to_string(),
        })
}
