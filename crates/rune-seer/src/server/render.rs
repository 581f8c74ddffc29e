//! HTML page and fragments.
//!
//! Bare semantic markup; every interpolated value goes through [`escape`].

use std::fmt::Write;

use rune_seer_core::batch::{CharacterReport, DetailReport};

/// Landing page with the input form.
pub const INDEX_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Rune Seer</title>
</head>
<body>
<h1>Rune Seer</h1>
<p>Enter text to see the UTF-8 encoding of each rune.</p>
<form method="post" action="/analyze">
<input type="text" name="input" placeholder="Enter text here" required>
<button type="submit">Submit</button>
</form>
</body>
</html>
"#;

/// Escape text for element content and double-quoted attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// One box per character, each a form posting the character to `/details`.
pub fn analyze_fragment(reports: &[CharacterReport]) -> String {
    let mut out = String::new();
    for report in reports {
        let character = escape(&report.character);
        let _ = writeln!(
            out,
            r#"<form method="post" action="/details" class="rune" data-index="{}">"#,
            report.index
        );
        let _ = writeln!(
            out,
            r#"<input type="hidden" name="char" value="{character}">"#
        );
        let _ = writeln!(out, r#"<button type="submit">"#);
        let _ = writeln!(out, r#"<div class="char">{character}</div>"#);
        if report.is_replacement() {
            let raw: Vec<String> = report
                .replaced_bytes
                .iter()
                .map(|b| format!("{b:02X}"))
                .collect();
            let _ = writeln!(
                out,
                r#"<div class="replaced">replaces malformed bytes {}</div>"#,
                raw.join(" ")
            );
        }
        for byte in &report.bytes {
            let _ = writeln!(
                out,
                r#"<div class="byte" data-index="{}">{}</div>"#,
                byte.global_byte_index, byte.binary
            );
        }
        let _ = writeln!(out, "</button>\n</form>");
    }
    out
}

/// Mask, binary and remainder for each byte, plus the code point.
pub fn details_fragment(report: &DetailReport) -> String {
    let c = &report.character;
    let mut out = String::from("<section class=\"details\">\n");
    let _ = writeln!(out, "<h3>Rune: {}</h3>", escape(&c.character));
    if report.truncated {
        let _ = writeln!(
            out,
            r#"<p class="notice">Only the first character was inspected; {} more ignored.</p>"#,
            report.discarded_chars
        );
    }
    out.push_str("<table>\n<tr><th>Mask</th><th>Binary</th><th>Remainder</th></tr>\n");
    for byte in &c.bytes {
        let _ = writeln!(
            out,
            r#"<tr><td class="mask">{}</td><td class="binary">{}</td><td class="remainder">{}</td></tr>"#,
            byte.mask, byte.binary, byte.remainder
        );
    }
    out.push_str("</table>\n");
    let _ = writeln!(
        out,
        r#"<p>Unicode Code Point: <span class="code-point">{}</span> ({})</p>"#,
        c.code_point, c.notation
    );
    out.push_str("</section>\n");
    out
}
