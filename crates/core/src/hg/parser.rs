//! Revset rendering and `hg log` output parsing.

use crate::errors::HgError;
use crate::models::Changeset;
use crate::revset::Revset;

/// Template handed to `hg log`: one changeset per line, the description
/// JSON-encoded so embedded newlines cannot split a record.
pub const LOG_TEMPLATE: &str = "{node}\t{desc|json}\n";

/// Render a [`Revset`] in Mercurial's revset language.
pub fn render_revset(revset: &Revset) -> String {
    match revset {
        Revset::Symbol(name) => quote(name),
        Revset::AncestorsOf(name) => format!("::{}", quote(name)),
        Revset::UniqueHistory { head, stable } => {
            format!("::{} and not ::{}", quote(head), quote(stable))
        }
        Revset::Range { from, to } => format!("{}:{}", quote(from), quote(to)),
        Revset::DescendantsFrom(node) => format!("{}:", quote(node)),
    }
}

/// Quote a symbol as a revset string literal.
fn quote(symbol: &str) -> String {
    let escaped = symbol.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

/// Parse output produced with [`LOG_TEMPLATE`].
pub fn parse_hg_log(output: &str) -> Result<Vec<Changeset>, HgError> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_log_line)
        .collect()
}

fn parse_log_line(line: &str) -> Result<Changeset, HgError> {
    let (node, desc) = line
        .split_once('\t')
        .ok_or_else(|| HgError::ParseError(format!("invalid log line: {}", line)))?;
    if node.is_empty() {
        return Err(HgError::ParseError(format!("missing node in: {}", line)));
    }
    let description: String = serde_json::from_str(desc)
        .map_err(|e| HgError::ParseError(format!("bad description for {}: {}", node, e)))?;
    Ok(Changeset::new(node, description))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_unique_history() {
        let revset = Revset::unique_history("feature-x", "master");
        assert_eq!(
            render_revset(&revset),
            r#"::"feature-x" and not ::"master""#
        );
    }

    #[test]
    fn test_render_range_and_descendants() {
        assert_eq!(
            render_revset(&Revset::range("master", "feature-x")),
            r#""master":"feature-x""#
        );
        assert_eq!(
            render_revset(&Revset::DescendantsFrom("abc123".into())),
            r#""abc123":"#
        );
        assert_eq!(
            render_revset(&Revset::AncestorsOf("tip".into())),
            r#"::"tip""#
        );
    }

    #[test]
    fn test_render_escapes_quotes() {
        assert_eq!(
            render_revset(&Revset::Symbol(r#"we"ird\name"#.into())),
            r#""we\"ird\\name""#
        );
    }

    #[test]
    fn test_parse_hg_log() {
        let output = "aaa111\t\"Fix bug\\n\\nDetails\"\nbbb222\t\"Add test\"\n";
        let changesets = parse_hg_log(output).unwrap();
        assert_eq!(changesets.len(), 2);
        assert_eq!(changesets[0].node, "aaa111");
        assert_eq!(changesets[0].description, "Fix bug\n\nDetails");
        assert_eq!(changesets[1].summary(), "Add test");
    }

    #[test]
    fn test_parse_hg_log_empty() {
        assert!(parse_hg_log("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_hg_log_rejects_garbage() {
        assert!(matches!(
            parse_hg_log("no tab here"),
            Err(HgError::ParseError(_))
        ));
        assert!(matches!(
            parse_hg_log("abc\tnot-json"),
            Err(HgError::ParseError(_))
        ));
    }
}
