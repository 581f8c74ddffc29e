//! Analyze command: per-character UTF-8 breakdown of text.

use camino::Utf8PathBuf;
use clap::{ArgGroup, Args};
use owo_colors::{OwoColorize, Stream::Stdout};
use tracing::{debug, instrument};

use rune_seer_core::batch::{self, CharacterReport};

/// Arguments for the `analyze` subcommand.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["text", "file"])))]
pub struct AnalyzeArgs {
    /// Text to analyze.
    pub text: Option<String>,

    /// Read input from a file instead (decoded lossily).
    #[arg(long, short)]
    pub file: Option<Utf8PathBuf>,
}

/// Decompose every character of the input and print its bytes.
#[instrument(name = "cmd_analyze", skip_all, fields(file = ?args.file))]
pub fn cmd_analyze(
    args: AnalyzeArgs,
    global_json: bool,
    max_input: Option<usize>,
) -> anyhow::Result<()> {
    let reports = match (args.text, args.file) {
        (_, Some(path)) => {
            let bytes = super::read_input_file(&path, max_input)?;
            batch::analyze_bytes(&bytes)
        }
        (Some(text), None) => {
            super::check_input_len(text.len(), max_input)?;
            batch::analyze(&text)
        }
        (None, None) => anyhow::bail!("nothing to analyze: pass TEXT or --file"),
    };
    debug!(chars = reports.len(), "analysis complete");

    if global_json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    for report in &reports {
        print_report(report);
    }

    let total_bytes: usize = reports.iter().map(|r| r.bytes.len()).sum();
    let replaced = reports.iter().filter(|r| r.is_replacement()).count();
    println!(
        "{} characters, {} bytes",
        reports.len().if_supports_color(Stdout, |t| t.bold()),
        total_bytes.if_supports_color(Stdout, |t| t.bold())
    );
    if replaced > 0 {
        println!(
            "{} {replaced} malformed sequence(s) replaced with U+FFFD",
            "note:".if_supports_color(Stdout, |t| t.yellow())
        );
    }

    Ok(())
}

fn print_report(report: &CharacterReport) {
    println!(
        "{:>4}  {}  {}",
        report.index.if_supports_color(Stdout, |t| t.dimmed()),
        format!("'{}'", report.character.escape_debug())
            .if_supports_color(Stdout, |t| t.bold()),
        report.notation.if_supports_color(Stdout, |t| t.cyan()),
    );
    if report.is_replacement() {
        let raw: Vec<String> = report
            .replaced_bytes
            .iter()
            .map(|b| format!("{b:#04X}"))
            .collect();
        println!(
            "      {} {}",
            "replaces".if_supports_color(Stdout, |t| t.yellow()),
            raw.join(" ")
        );
    }
    for byte in &report.bytes {
        println!(
            "      [{:>3}] {}  {}  {}",
            byte.global_byte_index,
            byte.binary,
            byte.mask.if_supports_color(Stdout, |t| t.dimmed()),
            byte.remainder.if_supports_color(Stdout, |t| t.green()),
        );
    }
}
