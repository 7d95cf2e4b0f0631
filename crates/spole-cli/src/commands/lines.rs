use spole_core::error::SpoleError;
use spole_core::parsing::lines::{assemble_lines, LayoutOptions};
use std::path::PathBuf;

use crate::commands::{read_input, source_for};

pub fn run(input_file: PathBuf, show_cells: bool) -> Result<(), SpoleError> {
    let bytes = read_input(&input_file)?;
    let source = source_for(&input_file);
    let stream = source.read_tokens(&bytes)?;
    let lines = assemble_lines(&stream, &LayoutOptions::default());

    let mut page = 0;
    for line in &lines {
        if line.page_number != page {
            page = line.page_number;
            println!("--- Page {page} ---");
        }
        if show_cells {
            let cells: Vec<String> = line
                .cells
                .iter()
                .map(|c| format!("[{:.0}-{:.0}] {}", c.x_min, c.x_max, c.text))
                .collect();
            println!("{:>4} y={:<7.1} {}", line.line_index, line.y, cells.join(" | "));
        } else {
            println!("{:>4} y={:<7.1} {}", line.line_index, line.y, line.joined_text);
        }
    }

    Ok(())
}
