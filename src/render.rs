//! Text rendering of the feedback panel.

use crate::{analysis::AnalysisResult, capture::CaptureMode};

pub const WAITING_TEXT: &str = "Waiting for input...";
const GOOD_SCORE: u8 = 80;
const BAR_WIDTH: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    Good,
    NeedsWork,
}

impl ScoreBand {
    pub fn for_score(score: u8) -> Self {
        if score >= GOOD_SCORE {
            ScoreBand::Good
        } else {
            ScoreBand::NeedsWork
        }
    }

    fn ansi_color(self) -> &'static str {
        match self {
            ScoreBand::Good => "\x1b[32m",
            ScoreBand::NeedsWork => "\x1b[33m",
        }
    }
}

/// `width` cells, filled in proportion to `score` out of 100.
pub fn score_bar(score: u8, width: usize) -> String {
    let score = usize::from(score.min(100));
    let filled = (score * width + 50) / 100;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(width - filled))
}

pub fn render_panel(result: &AnalysisResult, mode: CaptureMode, color: bool) -> String {
    let feedback = if result.feedback.is_empty() {
        WAITING_TEXT
    } else {
        result.feedback.as_str()
    };

    let mut panel = format!("-- Webcam Mode ({mode}) --\nPosture Feedback:\n  {feedback}\n");

    if let Some(score) = result.score {
        let bar = score_bar(score, BAR_WIDTH);
        let bar = if color {
            format!("{}{bar}\x1b[0m", ScoreBand::for_score(score).ansi_color())
        } else {
            bar
        };
        panel.push_str(&format!("Posture Score: {score} / 100\n  {bar}\n"));
    }

    panel
}
