//! Render a [QueryResult] for the terminal and the web page

use anyhow::Result;
use ocisize::QueryResult;
use std::fmt::Write;

/// Output format of the `ocisize` command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Format {
    /// Aligned columns with human readable sizes
    #[default]
    Table,
    /// The whole result as pretty-printed JSON
    Json,
    /// `platform,size_bytes` rows
    Csv,
}

pub fn render(result: &QueryResult, format: Format) -> Result<String> {
    Ok(match format {
        Format::Table => table(result),
        Format::Json => serde_json::to_string_pretty(result)?,
        Format::Csv => csv(result),
    })
}

/// Sort platforms by name, e.g. for `--sort`
pub fn sort_platforms(result: &mut QueryResult) {
    result
        .platforms
        .sort_by(|a, b| a.platform.cmp(&b.platform));
}

/// ```text
/// Image: quay.io/skopeo/stable:latest
///
/// PLATFORM     SIZE
/// -------------------
/// linux/amd64  78.86M
/// linux/arm64  75.36M
/// ```
pub fn table(result: &QueryResult) -> String {
    if result.platforms.is_empty() {
        return "No platforms found".to_string();
    }
    let rows: Vec<(&str, String)> = result
        .platforms
        .iter()
        .map(|p| (p.platform.as_str(), p.human_size()))
        .collect();
    let platform_width = rows
        .iter()
        .map(|(platform, _)| platform.len())
        .chain(Some("PLATFORM".len()))
        .max()
        .unwrap_or_default();
    let size_width = rows
        .iter()
        .map(|(_, size)| size.len())
        .chain(Some("SIZE".len()))
        .max()
        .unwrap_or_default();

    let mut out = String::new();
    let _ = writeln!(out, "Image: {}", result.image);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<width$}  SIZE",
        "PLATFORM",
        width = platform_width
    );
    out.push_str(&"-".repeat(platform_width + size_width + 2));
    for (platform, size) in rows {
        let _ = write!(
            out,
            "\n{:<width$}  {}",
            platform,
            size,
            width = platform_width
        );
    }
    out
}

pub fn csv(result: &QueryResult) -> String {
    let mut out = "platform,size_bytes".to_string();
    for p in &result.platforms {
        let _ = write!(out, "\n{},{}", csv_field(&p.platform), p.size_bytes);
    }
    out
}

fn csv_field(field: &str) -> String {
    if field.contains(&[',', '"', '\n'][..]) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Table fragment inserted into the page by the form at `/`
pub fn html(result: &QueryResult) -> String {
    let mut out = format!(
        "<h2 class=\"image\">{}</h2>\n",
        escape_html(&result.image)
    );
    if result.platforms.is_empty() {
        out.push_str("<p>No platforms found</p>\n");
    } else {
        out.push_str("<table>\n<thead><tr><th>Platform</th><th>Size</th></tr></thead>\n<tbody>\n");
        for p in &result.platforms {
            let _ = writeln!(
                out,
                "<tr><td>{}</td><td title=\"{} bytes\">{}</td></tr>",
                escape_html(&p.platform),
                p.size_bytes,
                p.human_size()
            );
        }
        out.push_str("</tbody>\n</table>\n");
    }
    if !result.warnings.is_empty() {
        out.push_str("<ul class=\"warnings\">\n");
        for warning in &result.warnings {
            let _ = writeln!(out, "<li>{}</li>", escape_html(warning));
        }
        out.push_str("</ul>\n");
    }
    out
}

pub fn html_error(message: &str) -> String {
    format!("<p class=\"error\">{}</p>\n", escape_html(message))
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
