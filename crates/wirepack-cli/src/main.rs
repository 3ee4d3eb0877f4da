use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use glob::glob;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use wirepack_core::{Layout, LayoutSchema, Packet, PacketError, hex, parse_field_value};

mod capture;
mod report;

use capture::CaptureFile;
use report::{
    CaptureReport, CaptureSummary, FrameRecord, InputInfo, LayoutView, REPORT_VERSION, ToolInfo,
    format_timestamp,
};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("WIREPACK_BUILD_COMMIT"),
    " ",
    env!("WIREPACK_BUILD_DATE"),
    ")"
);

const LAYOUT_HINT: &str = "expected a JSON layout: {\"name\": ..., \"fields\": [{\"name\": ..., \"format\": ...}]}";

#[derive(Parser, Debug)]
#[command(name = "wirepack")]
#[command(version, long_version = LONG_VERSION)]
#[command(
    about = "Decode and encode binary packets from declarative JSON layouts.",
    long_about = None,
    after_help = "Examples:\n  wirepack inspect udp.json\n  wirepack decode -l udp.json --hex 003504d2000b0000616263\n  wirepack encode -l udp.json --set dport=53 --payload-hex 616263\n  wirepack pcap capture.pcapng -l ipv4.json --offset 14 -o report.json"
)]
struct Cli {
    /// Log debug diagnostics to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the derived layout: format, header length, field offsets.
    Inspect {
        /// Layout file (JSON)
        layout: PathBuf,
    },
    /// Decode one packet, optionally decoding nested payloads.
    Decode {
        /// Layout file (JSON); repeat to decode each payload with the next layout
        #[arg(short, long = "layout", required = true)]
        layouts: Vec<PathBuf>,

        /// Packet bytes as hex text
        #[arg(long, conflicts_with = "input", required_unless_present = "input")]
        hex: Option<String>,

        /// Binary file holding the packet bytes
        input: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long, conflicts_with = "repr")]
        pretty: bool,

        /// Print the packet repr instead of JSON
        #[arg(long)]
        repr: bool,
    },
    /// Build a packet from the layout defaults and field overrides.
    Encode {
        /// Layout file (JSON)
        #[arg(short, long)]
        layout: PathBuf,

        /// Field override as name=value; applied in order
        #[arg(long = "set", value_name = "NAME=VALUE")]
        sets: Vec<String>,

        /// Payload bytes as hex text
        #[arg(long)]
        payload_hex: Option<String>,

        /// Write the packed bytes to a file instead of printing hex
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Decode the start of every frame of a PCAP/PCAPNG capture.
    Pcap {
        /// Path to a .pcap or .pcapng file (a glob matching one file is accepted)
        input: PathBuf,

        /// Layout file (JSON)
        #[arg(short, long)]
        layout: PathBuf,

        /// Bytes to skip at the start of each frame (14 for Ethernet II)
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Output report path (JSON)
        #[arg(short = 'o', long, required_unless_present = "stdout")]
        report: Option<PathBuf>,

        /// Write JSON report to stdout
        #[arg(long, conflicts_with = "report")]
        stdout: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        /// Suppress non-error output
        #[arg(long)]
        quiet: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Inspect { layout } => cmd_inspect(&layout),
        Commands::Decode {
            layouts,
            hex,
            input,
            pretty,
            repr,
        } => cmd_decode(&layouts, hex.as_deref(), input.as_deref(), pretty, repr),
        Commands::Encode {
            layout,
            sets,
            payload_hex,
            output,
        } => cmd_encode(&layout, &sets, payload_hex.as_deref(), output.as_deref()),
        Commands::Pcap {
            input,
            layout,
            offset,
            report,
            stdout,
            pretty,
            quiet,
        } => cmd_pcap(&input, &layout, offset, report.as_deref(), stdout, pretty, quiet),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(2)
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init();
}

#[derive(Debug)]
struct CliError {
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(format!("{err:#}"), None)
    }
}

fn cmd_inspect(layout: &Path) -> Result<(), CliError> {
    let layout = load_layout(layout)?;
    let json = serde_json::to_string_pretty(&LayoutView::new(&layout))
        .context("JSON serialization failed")?;
    println!("{}", json);
    Ok(())
}

fn cmd_decode(
    layouts: &[PathBuf],
    hex_text: Option<&str>,
    input: Option<&Path>,
    pretty: bool,
    repr: bool,
) -> Result<(), CliError> {
    let bytes = match (hex_text, input) {
        (Some(text), _) => hex::decode(text).map_err(|err| {
            CliError::new(
                format!("invalid --hex value: {err}"),
                Some("pass an even number of hex digits, optionally prefixed with 0x".to_string()),
            )
        })?,
        (None, Some(path)) => {
            let path = resolve_input_path(path)?;
            fs::read(&path)
                .with_context(|| format!("Failed to read input file: {}", path.display()))?
        }
        (None, None) => {
            return Err(CliError::new(
                "missing packet bytes",
                Some("use --hex or pass an input file".to_string()),
            ));
        }
    };

    let mut layouts = layouts.iter();
    let Some(first) = layouts.next() else {
        return Err(CliError::new(
            "missing layout",
            Some("use -l/--layout".to_string()),
        ));
    };
    let mut packet = Packet::from_bytes(&load_layout(first)?, &bytes).map_err(decode_error)?;
    debug!(packet = packet.name(), header_len = packet.header_len(), "decoded packet");

    // Each further layout decodes the innermost payload decoded so far.
    let mut depth = 0usize;
    for path in layouts {
        let layout = load_layout(path)?;
        let mut inner = &mut packet;
        for _ in 0..depth {
            inner = inner
                .payload_mut()
                .as_packet_mut()
                .ok_or_else(|| CliError::new("nested payload is not a packet", None))?;
        }
        inner.decode_payload(&layout).map_err(decode_error)?;
        debug!(layer = depth + 1, packet = layout.name(), "decoded nested payload");
        depth += 1;
    }

    if repr {
        println!("{:?}", packet);
        return Ok(());
    }
    println!("{}", serialize_json(&packet, pretty)?);
    Ok(())
}

fn cmd_encode(
    layout: &Path,
    sets: &[String],
    payload_hex: Option<&str>,
    output: Option<&Path>,
) -> Result<(), CliError> {
    let layout = load_layout(layout)?;
    let mut packet = Packet::new(&layout);

    for set in sets {
        let (name, text) = set.split_once('=').ok_or_else(|| {
            CliError::new(
                format!("invalid --set '{set}'"),
                Some("use --set name=value".to_string()),
            )
        })?;
        let value = parse_field_value(&layout, name.trim(), text).map_err(|err| {
            CliError::new(
                format!("invalid value for '{}': {err}", name.trim()),
                Some(field_hint(&layout)),
            )
        })?;
        packet
            .set(name.trim(), value)
            .map_err(|err| CliError::new(err.to_string(), Some(field_hint(&layout))))?;
    }

    if let Some(text) = payload_hex {
        let payload = hex::decode(text)
            .map_err(|err| CliError::new(format!("invalid --payload-hex value: {err}"), None))?;
        packet.set_payload(payload);
    }

    let bytes = packet.pack().map_err(|err| {
        CliError::new(
            err.to_string(),
            Some("check the --set values against the field formats".to_string()),
        )
    })?;
    debug!(packet = packet.name(), bytes = bytes.len(), "packed packet");

    match output {
        Some(path) => {
            write_output(path, &bytes)?;
            info!(path = %path.display(), bytes = bytes.len(), "packet written");
        }
        None => println!("{}", hex::encode(&bytes)),
    }
    Ok(())
}

fn cmd_pcap(
    input: &Path,
    layout_path: &Path,
    offset: usize,
    report: Option<&Path>,
    stdout: bool,
    pretty: bool,
    quiet: bool,
) -> Result<(), CliError> {
    let resolved_input = resolve_input_path(input)?;
    validate_capture_file(&resolved_input)?;
    let report = if stdout {
        None
    } else {
        Some(report.ok_or_else(|| {
            CliError::new(
                "missing output path",
                Some("use -o/--report or --stdout".to_string()),
            )
        })?)
    };
    if let Some(report_path) = report {
        ensure_distinct_output(&resolved_input, report_path)?;
    }

    let layout = load_layout(layout_path)?;
    let meta = fs::metadata(&resolved_input)
        .with_context(|| format!("Failed to read input file: {}", resolved_input.display()))?;
    let mut capture = CaptureFile::open(&resolved_input)
        .with_context(|| format!("Failed to open capture: {}", resolved_input.display()))?;

    let mut summary = CaptureSummary::default();
    let mut frames = Vec::new();
    let mut index = 0u64;
    while let Some(frame) = capture.next_frame().context("PCAP/PCAPNG read failed")? {
        let data = frame.data.get(offset..).unwrap_or_default();
        let decoded = Packet::from_bytes(&layout, data);
        let record = FrameRecord::new(
            index,
            format_timestamp(frame.timestamp),
            frame.linktype.0,
            decoded,
        )
        .context("JSON serialization failed")?;
        debug!(index, status = ?record.status, "frame decoded");
        summary.record(&record);
        frames.push(record);
        index += 1;
    }

    let rep = CaptureReport {
        report_version: REPORT_VERSION,
        tool: ToolInfo::default(),
        input: InputInfo {
            path: input.display().to_string(),
            bytes: meta.len(),
        },
        layout: layout.name().to_string(),
        offset,
        summary,
        frames,
    };
    let json = serialize_json(&rep, pretty)?;

    match report {
        None => print!("{}", json),
        Some(report) => {
            write_output(report, json.as_bytes())?;
            if !quiet {
                eprintln!("OK: report written -> {}", report.display());
            }
        }
    }
    Ok(())
}

fn load_layout(path: &Path) -> Result<Arc<Layout>, CliError> {
    let text = fs::read_to_string(path).map_err(|err| {
        CliError::new(
            format!("cannot read layout file {}: {err}", path.display()),
            Some(LAYOUT_HINT.to_string()),
        )
    })?;
    let layout = LayoutSchema::from_json(&text)
        .and_then(|schema| schema.to_layout())
        .map_err(|err| {
            CliError::new(
                format!("invalid layout {}: {err}", path.display()),
                Some(LAYOUT_HINT.to_string()),
            )
        })?;
    debug!(
        packet = layout.name(),
        format = layout.format(),
        header_len = layout.header_len(),
        "layout derived"
    );
    Ok(Arc::new(layout))
}

fn decode_error(err: PacketError) -> CliError {
    let hint = if err.is_need_data() {
        Some("the input is shorter than the packet header".to_string())
    } else {
        None
    };
    CliError::new(err.to_string(), hint)
}

fn field_hint(layout: &Layout) -> String {
    let names = layout.field_names().collect::<Vec<_>>().join(", ");
    format!("fields of {}: {}", layout.name(), names)
}

fn serialize_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String, CliError> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    json.context("JSON serialization failed").map_err(Into::into)
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<(), CliError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create output directory: {}", parent.display())
            })?;
        }
    }
    fs::write(path, bytes).with_context(|| format!("Failed to write output: {}", path.display()))?;
    Ok(())
}

fn ensure_distinct_output(input: &Path, report_path: &Path) -> Result<(), CliError> {
    let input_abs = fs::canonicalize(input)
        .with_context(|| format!("Failed to resolve input path: {}", input.display()))?;
    let parent = match report_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    // A report directory that does not exist yet cannot hold the input.
    let Ok(report_dir) = fs::canonicalize(parent) else {
        return Ok(());
    };
    let Some(file_name) = report_path.file_name() else {
        return Err(CliError::new(
            format!("invalid report path: {}", report_path.display()),
            None,
        ));
    };
    if report_dir.join(file_name) == input_abs {
        return Err(CliError::new(
            format!(
                "report path must differ from input: {}",
                report_path.display()
            ),
            Some("choose a different output path".to_string()),
        ));
    }
    Ok(())
}

fn validate_capture_file(input: &Path) -> Result<(), CliError> {
    if !input.exists() {
        return Err(CliError::new(
            format!("input file not found: {}", input.display()),
            Some("use a .pcap or .pcapng file".to_string()),
        ));
    }
    if !input.is_file() {
        return Err(CliError::new(
            format!("input is not a file: {}", input.display()),
            Some("use a .pcap or .pcapng file".to_string()),
        ));
    }
    let ext = input
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    if ext != "pcap" && ext != "pcapng" {
        return Err(CliError::new(
            format!("unsupported input format '{}'", input.display()),
            Some("expected a .pcap or .pcapng file".to_string()),
        ));
    }
    Ok(())
}

fn resolve_input_path(input: &Path) -> Result<PathBuf, CliError> {
    let pattern = input.to_string_lossy();
    if !is_glob_pattern(&pattern) {
        return Ok(input.to_path_buf());
    }

    let paths = glob(&pattern).map_err(|err| {
        CliError::new(
            format!("invalid input pattern '{}'", pattern),
            Some(format!("pattern error: {}", err.msg)),
        )
    })?;
    let mut matches = Vec::new();
    for entry in paths {
        let path = entry.map_err(|err| {
            CliError::new(
                format!("invalid input pattern '{}'", pattern),
                Some(format!("pattern error: {}", err)),
            )
        })?;
        if path.is_file() {
            matches.push(path);
        }
    }

    match matches.len() {
        0 => Err(CliError::new(
            format!("no files match pattern '{}'", pattern),
            Some("check the path or quote the pattern".to_string()),
        )),
        1 => Ok(matches.remove(0)),
        count => {
            let mut listed = matches
                .iter()
                .take(3)
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            if count > 3 {
                listed.push_str(", ...");
            }
            Err(CliError::new(
                format!("multiple files match pattern '{pattern}' ({count} matches); matches: {listed}"),
                Some("pass a single file, or run once per file".to_string()),
            ))
        }
    }
}

fn is_glob_pattern(input: &str) -> bool {
    input.contains('*') || input.contains('?') || input.contains('[')
}
