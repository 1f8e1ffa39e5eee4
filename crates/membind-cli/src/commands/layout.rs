//! Layout inspection commands.

use std::path::Path;

use anyhow::{Context, Result};
use membind::Layout;
use membind::layout::file;

use super::hex_utils::format_hex_address;
use super::resolve_layout;

/// Print the field table of a built-in or file layout
pub fn show(name: &str) -> Result<()> {
    let layout = resolve_layout(name)?;
    print!("{}", format_table(&layout));
    Ok(())
}

/// Validate a layout file
pub fn check(path: &Path) -> Result<()> {
    let layout = file::load_layout(path)
        .with_context(|| format!("Layout {} is invalid", path.display()))?;

    let span = layout
        .span()
        .map(|r| format!("{}..{}", format_hex_address(r.start), format_hex_address(r.end)))
        .unwrap_or_else(|| "empty".to_string());
    println!(
        "{}: layout {} is valid ({} fields, span {})",
        path.display(),
        layout.name(),
        layout.len(),
        span
    );
    Ok(())
}

pub fn format_table(layout: &Layout) -> String {
    let mut out = match layout.version() {
        Some(version) => format!("Layout: {} ({})\n", layout.name(), version),
        None => format!("Layout: {}\n", layout.name()),
    };
    out.push_str(&format!("{:<24} {:>8} {:>6}  Shape\n", "Field", "Offset", "Size"));
    for field in layout.fields() {
        out.push_str(&format!(
            "{:<24} {:>8} {:>6}  {}\n",
            field.name,
            format_hex_address(field.offset),
            field.size(),
            field.shape
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use membind::layout::builtin;

    #[test]
    fn test_format_camera_table() {
        let table = format_table(&builtin::camera().unwrap());
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines[0], "Layout: camera");
        assert_eq!(lines.len(), 11);
        assert!(lines[2].starts_with("Zoom"));
        assert!(lines[2].contains("0x114"));
        assert!(lines[6].contains("vector2"));
    }
}
