//! Line rendering for the diagnostic tail
//!
//! Every printed line carries a `[<source>]` tag. With multiple sources
//! the tags are colored in rotation so interleaved output stays readable.

use colored::{Color, Colorize};

/// Tag colors assigned to sources in argument order.
const TAG_COLORS: &[Color] = &[
    Color::Cyan,
    Color::Green,
    Color::Yellow,
    Color::Magenta,
    Color::Blue,
];

/// Pre-rendered `[<source>]` tag for one source.
#[derive(Debug, Clone)]
pub struct SourceTag {
    rendered: String,
}

impl SourceTag {
    /// Build the tag for the source at the given argument position.
    pub fn new(source_id: &str, index: usize) -> Self {
        let color = TAG_COLORS[index % TAG_COLORS.len()];
        let label = format!("[{source_id}]");
        Self {
            rendered: label.as_str().color(color).to_string(),
        }
    }

    /// Print one line under this tag.
    pub fn print_line(&self, text: &str) {
        println!("{} {}", self.rendered, text);
    }
}
