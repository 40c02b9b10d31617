//! XML rendering of sampled rows.

use crate::models::SampleResult;
use std::fmt::Write;

const SAMPLE_COMMENT: &str = "\
  Randomly sampled rows of one table. Each <row> holds one <field> per column,
  in column order; the name attribute is the column name. Values are the
  database's text rendering of the cell; NULL cells read NULL and binary
  values that are not UTF-8 read base64:<data>. Row order carries no meaning.
";

/// Identifying attributes of a sample document.
#[derive(Debug, Clone)]
pub struct SampleMetadata<'a> {
    pub connection: &'a str,
    pub database: &'a str,
    pub schema: &'a str,
    pub table: &'a str,
    pub generated_at: &'a str,
}

/// Escapes text for use in XML content and attribute values.
///
/// Characters XML 1.0 cannot represent at all are replaced with U+FFFD.
pub fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\t' | '\n' | '\r' => escaped.push(c),
            c if (c as u32) < 0x20 => escaped.push('\u{FFFD}'),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Renders the sample document.
pub fn render_sample_xml(metadata: &SampleMetadata<'_>, sample: &SampleResult) -> String {
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(xml, "<!--\n{}-->", SAMPLE_COMMENT);
    let _ = writeln!(
        xml,
        "<sample schema=\"{}\" table=\"{}\" connection=\"{}\" database=\"{}\" \
         row_count=\"{}\" generated_at=\"{}\">",
        escape_xml(metadata.schema),
        escape_xml(metadata.table),
        escape_xml(metadata.connection),
        escape_xml(metadata.database),
        sample.rows.len(),
        escape_xml(metadata.generated_at),
    );
    for row in &sample.rows {
        xml.push_str("  <row>\n");
        for (name, value) in sample.columns.iter().zip(row) {
            let _ = writeln!(
                xml,
                "    <field name=\"{}\">{}</field>",
                escape_xml(name),
                escape_xml(value)
            );
        }
        xml.push_str("  </row>\n");
    }
    xml.push_str("</sample>\n");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> SampleMetadata<'static> {
        SampleMetadata {
            connection: "prod",
            database: "app",
            schema: "public",
            table: "users",
            generated_at: "2026-01-01T00:00:00Z",
        }
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(
            escape_xml(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &apos;Jerry&apos;&lt;/a&gt;"
        );
        assert_eq!(escape_xml("bell\u{7}"), "bell\u{FFFD}");
        assert_eq!(escape_xml("multi\nline"), "multi\nline");
    }

    #[test]
    fn test_render_sample_xml() {
        let sample = SampleResult {
            columns: vec!["id".to_string(), "note".to_string()],
            rows: vec![
                vec!["1".to_string(), "a < b".to_string()],
                vec!["2".to_string(), "NULL".to_string()],
            ],
        };
        let xml = render_sample_xml(&metadata(), &sample);

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains(
            "<sample schema=\"public\" table=\"users\" connection=\"prod\" database=\"app\" \
             row_count=\"2\" generated_at=\"2026-01-01T00:00:00Z\">"
        ));
        assert!(xml.contains("<field name=\"note\">a &lt; b</field>"));
        assert_eq!(xml.matches("  <row>\n").count(), 2);
        assert_eq!(xml.matches("  </row>\n").count(), 2);
        assert!(xml.trim_end().ends_with("</sample>"));
    }
}
