use owo_colors::Style;
use std::sync::OnceLock;

static THEME: OnceLock<Theme> = OnceLock::new();

/// What the planner did with a declaration, as shown by `chimera plan --details`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionKind {
    Suppressed,
    Gap,
    Ambiguity,
}

/// Styles for generator output
#[derive(Debug, Clone)]
pub struct Theme {
    pub header: Style,
    pub success: Style,
    pub error: Style,
    pub dim: Style,
    /// Backend names in headings and tables
    pub backend: Style,
    /// Declaration paths
    pub path: Style,
    pub suppressed: Style,
    pub gap: Style,
    pub ambiguity: Style,
}

impl Theme {
    /// Plain output when stdout is not a terminal or colors are disabled
    pub fn detect() -> Self {
        if !console::Term::stdout().is_term() || !console::colors_enabled() {
            return Self::plain();
        }
        Self::colored()
    }

    pub fn colored() -> Self {
        Self {
            header: Style::new().cyan().bold(),
            success: Style::new().green().bold(),
            error: Style::new().red().bold(),
            dim: Style::new().white().dimmed(),
            backend: Style::new().magenta().bold(),
            path: Style::new().cyan(),
            suppressed: Style::new().yellow(),
            gap: Style::new().red(),
            ambiguity: Style::new().blue(),
        }
    }

    pub fn plain() -> Self {
        Self {
            header: Style::new(),
            success: Style::new(),
            error: Style::new(),
            dim: Style::new(),
            backend: Style::new(),
            path: Style::new(),
            suppressed: Style::new(),
            gap: Style::new(),
            ambiguity: Style::new(),
        }
    }

    pub fn decision(&self, kind: DecisionKind) -> Style {
        match kind {
            DecisionKind::Suppressed => self.suppressed.clone(),
            DecisionKind::Gap => self.gap.clone(),
            DecisionKind::Ambiguity => self.ambiguity.clone(),
        }
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use owo_colors::OwoColorize;

    #[test]
    fn test_decision_kinds_are_told_apart() {
        let theme = Theme::colored();
        let gap = "x".style(theme.decision(DecisionKind::Gap)).to_string();
        let suppressed = "x".style(theme.decision(DecisionKind::Suppressed)).to_string();
        assert_ne!(gap, suppressed);
    }
}
