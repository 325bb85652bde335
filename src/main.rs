//! Purpose: `objpath` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Commands emit stable stdout formats (pretty on a TTY, compact otherwise).
//! Invariants: Non-interactive errors and notices are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind};
use serde_json::{Map, Value as Json, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod color_json;

use color_json::colorize_json;
use objpath::api::{
    ConversionTarget, Engine, Error, ErrorKind, FaultMode, Input, Limits, Path, Request,
    Serialized, TypeKey, Value, escape_segment, to_exit_code,
};

#[derive(Parser)]
#[command(
    name = "objpath",
    version,
    about = "Read and write runtime object graphs as bounded JSON",
    long_about = r#"Serialize a value graph to JSON at a dotted path, convert raw text
back into typed values, and write values back at a path.

Input documents are JSON (file or stdin). Output is JSON on stdout."#,
    after_help = r#"EXAMPLES
  $ objpath read server.listen -f config.json
  $ objpath read '*.port' -f config.json --max-depth 4
  $ objpath write server.port 8080 -f config.json
  $ objpath convert 'array<i32>' '1,2,3'
  $ objpath escape 'a.b' 'c'
  $ objpath split 'a\.b.*.c'"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics and pretty JSON output: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Args, Clone, Debug)]
struct LimitArgs {
    #[arg(long, help = "Deepest container nesting to descend into")]
    max_depth: Option<usize>,
    #[arg(long, help = "Elements kept per list or map")]
    max_collection_size: Option<usize>,
    #[arg(long, help = "Total nodes emitted per call")]
    max_objects: Option<usize>,
    #[arg(long, help = "Omit nodes that fail to read instead of failing the call")]
    suppress_faults: bool,
}

impl LimitArgs {
    fn request(&self) -> Request {
        let mut limits = Limits::default();
        if let Some(max_depth) = self.max_depth {
            limits = limits.with_max_depth(max_depth);
        }
        if let Some(max) = self.max_collection_size {
            limits = limits.with_max_collection_size(max);
        }
        if let Some(max_objects) = self.max_objects {
            limits = limits.with_max_objects(max_objects);
        }
        let fault = if self.suppress_faults {
            FaultMode::Suppress
        } else {
            FaultMode::Propagate
        };
        Request::new().with_limits(limits).with_fault(fault)
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Serialize the input document at a path",
        after_help = r#"EXAMPLES
  $ objpath read -f doc.json
  $ objpath read a.b.0 -f doc.json
  $ cat doc.json | objpath read 'items.*.id'

NOTES
  - The empty path (default) is the whole document
  - `\.` `\\` `\*` escape a literal dot, backslash and star
  - Truncated collections and filtered results are reported on stderr"#
    )]
    Read {
        #[arg(default_value = "", help = "Dotted path; empty for the whole value")]
        path: String,
        #[arg(
            short = 'f',
            long = "file",
            help = "Input JSON file (use - for stdin)",
            value_hint = ValueHint::FilePath
        )]
        file: Option<PathBuf>,
        #[command(flatten)]
        limits: LimitArgs,
    },
    #[command(
        about = "Convert raw text and store it at a path of the input document",
        after_help = r#"EXAMPLES
  $ objpath write a.b 2 -f doc.json
  $ objpath write a.tags 'x,y' --target 'array<text>' -f doc.json
  $ objpath write a.gone '[null]' -f doc.json"#
    )]
    Write {
        #[arg(help = "Dotted path of the value to replace or create")]
        path: String,
        #[arg(help = "Raw value text; `[null]` is null and `\"\"` the empty string")]
        value: String,
        #[arg(
            short = 'f',
            long = "file",
            help = "Input JSON file (use - for stdin)",
            value_hint = ValueHint::FilePath
        )]
        file: Option<PathBuf>,
        #[arg(long, help = "Target type descriptor, e.g. i32, array<i64>, named:url, dynamic")]
        target: Option<String>,
        #[command(flatten)]
        limits: LimitArgs,
    },
    #[command(about = "Convert raw text to a typed value and print its serialization")]
    Convert {
        #[arg(help = "Target type descriptor, e.g. i32, array<i64>, named:url, dynamic")]
        target: String,
        #[arg(help = "Raw value text")]
        text: String,
    },
    #[command(about = "Escape literal segments and join them into a path")]
    Escape {
        #[arg(required = true, help = "Literal segment text")]
        segments: Vec<String>,
    },
    #[command(about = "Split a path into its unescaped segments")]
    Split {
        #[arg(help = "Dotted path")]
        path: String,
    },
    #[command(about = "List registered extractors and named conversion targets")]
    Types,
}

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Internal)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(clap_error_summary(&err))
                        .with_hint(clap_error_hint(&err)),
                    ColorMode::Auto,
                ));
            }
        },
    };
    let color_mode = cli.color;
    dispatch(cli.command, color_mode)
        .map(|()| RunOutcome::ok())
        .map_err(|err| (err, color_mode))
}

fn dispatch(command: Command, color_mode: ColorMode) -> Result<(), Error> {
    let engine = Engine::new();
    match command {
        Command::Read { path, file, limits } => {
            let root = read_document(file.as_ref())?;
            let request = limits.request();
            let out = engine.read(&root, &path, &request)?;
            emit_notice(&path, &out, color_mode);
            emit_json(out.value, color_mode);
        }
        Command::Write {
            path,
            value,
            file,
            target,
            limits,
        } => {
            let root = read_document(file.as_ref())?;
            let request = limits.request();
            let path = Path::parse(&path)?;
            let outcome = match target {
                Some(descriptor) => {
                    let target = ConversionTarget::parse(&descriptor)?;
                    engine.set_at_path_as(&root, &path, Input::Text(&value), &target, &request)?
                }
                None => engine.set_at_path(&root, &path, Input::Text(&value), &request)?,
            };
            let updated = engine.serialize(&outcome.root, &Path::root(), &request)?;
            emit_json(
                json!({"value": updated.value, "previous": outcome.previous}),
                color_mode,
            );
        }
        Command::Convert { target, text } => {
            let target = ConversionTarget::parse(&target)?;
            let value = engine.convert(&target, Input::Text(&text))?;
            let out = engine.serialize(&value, &Path::root(), &Request::new())?;
            emit_json(out.value, color_mode);
        }
        Command::Escape { segments } => {
            let escaped: Vec<String> = segments.iter().map(|s| escape_segment(s)).collect();
            emit_json(Json::String(escaped.join(".")), color_mode);
        }
        Command::Split { path } => {
            let parsed = Path::parse(&path)?;
            let segments: Vec<Json> = parsed
                .segments()
                .iter()
                .map(|segment| {
                    if segment.is_wildcard() {
                        json!({"wildcard": true})
                    } else {
                        json!({"key": segment.as_str()})
                    }
                })
                .collect();
            emit_json(Json::Array(segments), color_mode);
        }
        Command::Types => {
            let extractors: Vec<Json> = engine
                .registry()
                .descriptors()
                .into_iter()
                .map(|descriptor| {
                    let key = match &descriptor.key {
                        TypeKey::Exact { type_name } => json!({"exact": type_name}),
                        TypeKey::Matcher { name, specificity } => {
                            json!({"matcher": name, "specificity": specificity})
                        }
                    };
                    json!({
                        "key": key,
                        "extractor": descriptor.extractor,
                        "writable": descriptor.writable,
                    })
                })
                .collect();
            emit_json(
                json!({
                    "extractors": extractors,
                    "named_targets": engine.converter().named_targets(),
                }),
                color_mode,
            );
        }
    }
    Ok(())
}

fn read_document(file: Option<&PathBuf>) -> Result<Value, Error> {
    let text = match file {
        Some(path) if path.as_os_str() != "-" => fs::read_to_string(path).map_err(|err| {
            Error::new(ErrorKind::Access)
                .with_message(format!("failed to read {}", path.display()))
                .with_source(err)
        })?,
        _ => {
            let stdin = io::stdin();
            if file.is_none() && stdin.is_terminal() {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("no input document")
                    .with_hint("Pass -f FILE or pipe JSON on stdin."));
            }
            let mut text = String::new();
            stdin.lock().read_to_string(&mut text).map_err(|err| {
                Error::new(ErrorKind::Access)
                    .with_message("failed to read stdin")
                    .with_source(err)
            })?;
            text
        }
    };
    let doc: Json = serde_json::from_str(&text).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid json")
            .with_hint("Provide a single JSON document (e.g. '{\"x\":1}').")
            .with_source(err)
    })?;
    Ok(Value::from_structured(&doc))
}

fn emit_json(value: Json, color_mode: ColorMode) {
    let is_tty = io::stdout().is_terminal();
    let use_color = color_mode.use_color(is_tty);
    let pretty = is_tty || use_color;
    let json = if pretty {
        if use_color {
            colorize_json(&value, true)
        } else {
            serde_json::to_string_pretty(&value)
                .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
        }
    } else {
        serde_json::to_string(&value)
            .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
    };
    println!("{json}");
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_notice(path: &str, out: &Serialized, color_mode: ColorMode) {
    if out.truncations.is_empty() && !out.filtered {
        return;
    }
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        let label = colorize_label("notice:", color_mode.use_color(is_tty), AnsiColor::Yellow);
        if out.filtered {
            eprintln!("{label} every child of `{path}` was omitted by fault suppression");
        }
        for cut in &out.truncations {
            eprintln!(
                "{label} `{}` truncated to {} of {} entries",
                cut.path, cut.retained, cut.original_len
            );
        }
        return;
    }
    let value = json!({
        "notice": {
            "kind": "partial",
            "path": path,
            "filtered": out.filtered,
            "truncations": out.truncations,
        }
    });
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"notice\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::PathNotFound => "path not found".to_string(),
        ErrorKind::UnsupportedConversion => "unsupported conversion".to_string(),
        ErrorKind::Conversion => "conversion failed".to_string(),
        ErrorKind::ReadOnlyPath => "path is read-only".to_string(),
        ErrorKind::Access => "value could not be read".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Json {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.to_string()));
    }
    if let Some(target) = err.target() {
        inner.insert("target".to_string(), json!(target));
    }
    if let Some(input) = err.input() {
        inner.insert("input".to_string(), json!(input));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Json::Object(inner));
    Json::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(path) = err.path() {
        lines.push(format!(
            "{} {path}",
            colorize_label("path:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(target) = err.target() {
        lines.push(format!(
            "{} {target}",
            colorize_label("target:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(input) = err.input() {
        lines.push(format!(
            "{} {input:?}",
            colorize_label("input:", use_color, AnsiColor::Yellow)
        ));
    }

    let causes = error_causes(err);
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);
    let Some(usage) = usage else {
        return "Try `objpath --help`.".to_string();
    };
    let tokens: Vec<&str> = usage.split_whitespace().collect();
    let Some(pos) = tokens.iter().position(|t| *t == "objpath") else {
        return "Try `objpath --help`.".to_string();
    };
    let parts: Vec<&str> = tokens
        .iter()
        .skip(pos + 1)
        .take_while(|token| {
            !(token.starts_with('-') || token.starts_with('<') || token.starts_with('['))
        })
        .copied()
        .collect();
    if parts.is_empty() {
        return "Try `objpath --help`.".to_string();
    }
    format!("Try `objpath {} --help`.", parts.join(" "))
}
