use std::io::{self, Write};

use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};

pub const BAR_WIDTH: usize = 40;

pub fn render_line(processed: usize, total: usize, label: &str) -> String {
    let ratio = if total == 0 {
        1.0
    } else {
        (processed.min(total) as f64) / (total as f64)
    };
    let filled = ((ratio * BAR_WIDTH as f64) as usize).min(BAR_WIDTH);
    let percent = (ratio * 100.0).round() as u32;
    format!(
        "[{}{}] {percent}% Completed | Analysing '{label}'",
        "█".repeat(filled),
        "-".repeat(BAR_WIDTH - filled)
    )
}

pub struct ProgressBar<W: Write> {
    out: Option<W>,
}

impl<W: Write> ProgressBar<W> {
    pub fn new(out: W) -> Self {
        Self { out: Some(out) }
    }

    pub fn hidden() -> Self {
        Self { out: None }
    }

    pub fn update(&mut self, processed: usize, total: usize, label: &str) -> io::Result<()> {
        let Some(out) = self.out.as_mut() else {
            return Ok(());
        };
        queue!(
            out,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(render_line(processed, total, label))
        )?;
        out.flush()
    }

    pub fn finish(&mut self) -> io::Result<()> {
        let Some(out) = self.out.as_mut() else {
            return Ok(());
        };
        queue!(out, Print("\n"))?;
        out.flush()
    }

    pub fn into_inner(self) -> Option<W> {
        self.out
    }
}
