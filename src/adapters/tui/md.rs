use ratatui::prelude::*;

/// Convert an article's HTML body to markdown for terminal display.
pub fn html_to_markdown(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }

    let options = htmd::options::Options {
        ul_bullet_spacing: 1,
        ol_number_spacing: 1,
        ..Default::default()
    };
    let converter = htmd::HtmlToMarkdown::builder().options(options).build();

    match converter.convert(html) {
        Ok(markdown) => markdown.trim().to_string(),
        Err(e) => {
            tracing::warn!("Failed to convert article body: {}", e);
            html.to_string()
        }
    }
}

/// First `max_lines` non-blank lines of `markdown`, with a marker when cut.
pub fn excerpt_lines(markdown: &str, max_lines: usize) -> Vec<Line<'static>> {
    let mut body: Vec<&str> = markdown.lines().filter(|l| !l.trim().is_empty()).collect();
    let truncated = body.len() > max_lines;
    body.truncate(max_lines);

    let mut lines: Vec<Line<'static>> = body
        .into_iter()
        .map(|l| Line::from(l.to_string()))
        .collect();
    if truncated {
        lines.push(Line::from(Span::styled("…", Style::default().fg(Color::DarkGray))));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_becomes_markdown() {
        let md = html_to_markdown("<p>Hello <strong>world</strong></p>");
        assert!(md.contains("**world**"));
        assert!(!md.contains("<p>"));
        assert_eq!(html_to_markdown("   "), "");
    }

    #[test]
    fn test_excerpt_marks_truncation() {
        let lines = excerpt_lines("one\n\ntwo\nthree\n", 2);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].to_string(), "two");
        assert_eq!(excerpt_lines("one", 2).len(), 1);
    }
}
