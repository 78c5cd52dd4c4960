use std::sync::LazyLock;

use regex::Regex;

/// Lines that are nothing but pagination: "12", "- 3 -", "Page 2 of 9", "Página 4/10".
static PAGE_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^-?\s*(?:page|p[áa]gina|p[áa]g\.?|p\.)?\s*\d{1,4}(?:\s*(?:of|de|/)\s*\d{1,4})?\s*-?$",
    )
    .expect("valid regex")
});

/// Sanitize extracted text before budgeting.
/// Strips control characters, pagination lines and boilerplate, collapses whitespace.
pub fn sanitize_extracted_text(raw: &str, boilerplate: &[Regex]) -> String {
    raw.chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect::<String>()
        .lines()
        .map(collapse_whitespace)
        .filter(|l| !l.is_empty())
        .filter(|l| !is_page_number_artifact(l))
        .filter(|l| !boilerplate.iter().any(|re| re.is_match(l)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn collapse_whitespace(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn is_page_number_artifact(line: &str) -> bool {
    PAGE_NUMBER_RE.is_match(line.trim())
}

/// Compile boilerplate patterns, reporting the first invalid one.
pub fn compile_boilerplate(patterns: &[String]) -> Result<Vec<Regex>, regex::Error> {
    patterns.iter().map(|p| Regex::new(p)).collect()
}
