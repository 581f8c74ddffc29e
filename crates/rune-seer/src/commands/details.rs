//! Details command: mask, binary and remainder for one character.

use anyhow::Context;
use clap::{ArgGroup, Args};
use owo_colors::{OwoColorize, Stream::Stdout};
use serde::Serialize;
use tracing::{debug, instrument};

use rune_seer_core::batch::{self, DetailReport};
use rune_seer_core::decompose;

/// Arguments for the `details` subcommand.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("target").required(true).args(["character", "code_point"])))]
pub struct DetailsArgs {
    /// Character to inspect. Only the first code point is used.
    #[arg(value_name = "CHAR")]
    pub character: Option<String>,

    /// Inspect a code point by value (U+1F600, 0x1F600 or 128512).
    #[arg(long, value_name = "CODE_POINT")]
    pub code_point: Option<String>,

    /// Reassemble the code point from the remainders and check it matches.
    #[arg(long)]
    pub verify: bool,
}

#[derive(Serialize)]
struct DetailsOutput {
    #[serde(flatten)]
    report: DetailReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    verified: Option<bool>,
}

/// Print the decomposition of a single character.
#[instrument(name = "cmd_details", skip_all)]
pub fn cmd_details(args: DetailsArgs, global_json: bool) -> anyhow::Result<()> {
    let report = match (args.character, args.code_point) {
        (_, Some(raw)) => {
            let code_point = batch::parse_code_point(&raw)
                .with_context(|| format!("not a code point: {raw:?}"))?;
            batch::detail_code_point(code_point)
                .with_context(|| format!("cannot encode {}", batch::notation(code_point)))?
        }
        (Some(text), None) => batch::detail(&text).context("no character given: CHAR is empty")?,
        (None, None) => anyhow::bail!("nothing to inspect: pass CHAR or --code-point"),
    };
    debug!(
        code_point = report.character.code_point,
        truncated = report.truncated,
        "details resolved"
    );

    let verified = if args.verify {
        let rebuilt = decompose::reconstruct(&report.character.bytes)
            .context("decomposition did not reassemble")?;
        if rebuilt != report.character.code_point {
            anyhow::bail!(
                "reassembled {} but expected {}",
                batch::notation(rebuilt),
                report.character.notation
            );
        }
        Some(true)
    } else {
        None
    };

    if global_json {
        let output = DetailsOutput { report, verified };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let c = &report.character;
    println!(
        "{} {}  {}",
        "Rune:".if_supports_color(Stdout, |t| t.bold()),
        format!("'{}'", c.character.escape_debug())
            .if_supports_color(Stdout, |t| t.bold()),
        c.notation.if_supports_color(Stdout, |t| t.cyan())
    );
    for byte in &c.bytes {
        println!(
            "  {}  {}  {}",
            byte.mask.if_supports_color(Stdout, |t| t.dimmed()),
            byte.binary,
            byte.remainder.if_supports_color(Stdout, |t| t.green())
        );
    }
    println!(
        "{} {}",
        "Unicode code point:".if_supports_color(Stdout, |t| t.dimmed()),
        c.code_point
    );
    if verified == Some(true) {
        println!(
            "{} remainders reassemble to {}",
            "verified:".if_supports_color(Stdout, |t| t.green()),
            c.notation
        );
    }
    if report.truncated {
        println!(
            "{} only the first character was inspected; {} more ignored",
            "note:".if_supports_color(Stdout, |t| t.yellow()),
            report.discarded_chars
        );
    }

    Ok(())
}
