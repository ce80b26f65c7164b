use super::{DirectiveKind, TranscodeReport, replace_pairs};

/// Maps a GitBook hint style to a Docusaurus admonition type.
pub fn admonition_type(style: Option<&str>) -> &'static str {
    match style.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("warning") => "warning",
        Some("danger") => "danger",
        Some("success") | Some("tip") => "tip",
        _ => "info",
    }
}

/// Renders an admonition around `body` (trimmed, otherwise verbatim).
pub fn render_admonition(kind: &str, body: &str) -> String {
    format!(":::{kind}\n{}\n:::", body.trim())
}

/// `{% hint style="S" %}…{% endhint %}` becomes a `:::` admonition.
pub fn convert_hints(text: &str, report: &mut TranscodeReport) -> String {
    let (output, stats) = replace_pairs(text, "hint", |open, inner| {
        Some(render_admonition(admonition_type(open.attr("style")), inner))
    });
    report.found(DirectiveKind::Hint, stats.found);
    report.converted(DirectiveKind::Hint, stats.converted);
    output
}
