//
// render.rs
//
// Post-processing hook for assembled documentation text
//

/// Turns the markdown-ish text assembled by the doc parser into what clients
/// display. Math and markdown rendering live behind this seam.
pub trait DocRenderer: Send + Sync {
    fn render(&self, text: &str) -> String;
}

/// Default renderer: strips trailing whitespace from every line and from the
/// whole block.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainRenderer;

impl DocRenderer for PlainRenderer {
    fn render(&self, text: &str) -> String {
        let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
        lines.join("\n").trim_end().to_string()
    }
}
