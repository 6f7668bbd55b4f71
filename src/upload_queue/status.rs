//! Display mapping for upload phases.

use super::types::Phase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusColor {
    Accent,
    Success,
    Danger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPresentation {
    pub label: &'static str,
    pub color: StatusColor,
    pub progress: u8,
}

impl StatusPresentation {
    pub fn for_phase(phase: Phase) -> Self {
        let (label, color) = match phase {
            Phase::Pending => ("⏳ Waiting...", StatusColor::Accent),
            Phase::Uploading => ("🚀 Uploading...", StatusColor::Accent),
            Phase::AiAnalyzing => ("🧠 AI Analyzing...", StatusColor::Accent),
            Phase::Extracting => ("🔍 Extracting...", StatusColor::Accent),
            Phase::Saving => ("💾 Saving...", StatusColor::Accent),
            Phase::Done => ("✅ Done", StatusColor::Success),
            Phase::Error => ("❌ Error", StatusColor::Danger),
        };

        Self {
            label,
            color,
            progress: phase.progress(),
        }
    }
}
