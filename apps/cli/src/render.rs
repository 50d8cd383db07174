//! Terminal rendering for the small subset of markup answers use.

use console::style;

pub fn render_markup(text: &str) -> String {
    let mut output = String::new();
    let mut in_code_block = false;

    for line in text.lines() {
        let trimmed = line.trim_start();

        if trimmed.starts_with("```") {
            in_code_block = !in_code_block;
            continue;
        }
        if in_code_block {
            output.push_str(&format!("    {}\n", style(line).dim()));
            continue;
        }

        if let Some(heading) = trimmed.strip_prefix("# ") {
            output.push_str(&format!("{}\n", style(render_inline(heading)).cyan().bold()));
        } else if let Some(heading) = trimmed
            .strip_prefix("## ")
            .or_else(|| trimmed.strip_prefix("### "))
        {
            output.push_str(&format!("{}\n", style(render_inline(heading)).bold()));
        } else if let Some(item) = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "))
        {
            let indent = &line[..line.len() - trimmed.len()];
            output.push_str(&format!("{}  • {}\n", indent, render_inline(item)));
        } else {
            output.push_str(&render_inline(line));
            output.push('\n');
        }
    }

    output
}

/// `**bold**` and `` `code` `` spans. Unclosed markers are left as typed.
fn render_inline(text: &str) -> String {
    let mut output = String::new();
    let mut rest = text;

    loop {
        let bold = rest.find("**");
        let code = rest.find('`');
        let (start, marker) = match (bold, code) {
            (Some(b), Some(c)) if c < b => (c, "`"),
            (Some(b), _) => (b, "**"),
            (None, Some(c)) => (c, "`"),
            (None, None) => break,
        };

        let after = &rest[start + marker.len()..];
        let Some(end) = after.find(marker) else {
            // unclosed: keep the marker as text and look for spans after it
            output.push_str(&rest[..start + marker.len()]);
            rest = after;
            continue;
        };

        output.push_str(&rest[..start]);
        let inner = &after[..end];
        if marker == "`" {
            output.push_str(&style(inner).yellow().to_string());
        } else {
            output.push_str(&style(inner).bold().to_string());
        }
        rest = &after[end + marker.len()..];
    }

    output.push_str(rest);
    output
}
