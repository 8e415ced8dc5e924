use crate::session::Mode;

/// Focusable panes of the main screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Panel {
    /// Contact text being edited
    Input,
    /// Single vCard or combined batch output
    Output,
    /// Converted contacts (batch mode only)
    Batch,
}

impl Panel {
    pub fn title(self) -> &'static str {
        match self {
            Panel::Input => "INPUT",
            Panel::Output => "VCARD",
            Panel::Batch => "BATCH",
        }
    }

    /// Panels shown in `mode`, in focus order.
    pub fn visible(mode: Mode) -> &'static [Panel] {
        match mode {
            Mode::Single => &[Panel::Input, Panel::Output],
            Mode::Batch => &[Panel::Input, Panel::Batch, Panel::Output],
        }
    }

    /// Next panel in `mode`, wrapping around.
    pub fn next(self, mode: Mode) -> Self {
        let panels = Self::visible(mode);
        match panels.iter().position(|p| *p == self) {
            Some(idx) => panels[(idx + 1) % panels.len()],
            None => Panel::Input,
        }
    }

    pub fn prev(self, mode: Mode) -> Self {
        let panels = Self::visible(mode);
        match panels.iter().position(|p| *p == self) {
            Some(idx) => panels[(idx + panels.len() - 1) % panels.len()],
            None => Panel::Input,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_mode_cycles_input_and_output() {
        assert_eq!(Panel::Input.next(Mode::Single), Panel::Output);
        assert_eq!(Panel::Output.next(Mode::Single), Panel::Input);
        assert_eq!(Panel::Input.prev(Mode::Single), Panel::Output);
    }

    #[test]
    fn test_batch_mode_includes_batch_list() {
        assert_eq!(Panel::Input.next(Mode::Batch), Panel::Batch);
        assert_eq!(Panel::Batch.next(Mode::Batch), Panel::Output);
        assert_eq!(Panel::Output.next(Mode::Batch), Panel::Input);
        assert_eq!(Panel::Input.prev(Mode::Batch), Panel::Output);
    }

    #[test]
    fn test_hidden_panel_falls_back_to_input() {
        assert_eq!(Panel::Batch.next(Mode::Single), Panel::Input);
        assert_eq!(Panel::Batch.prev(Mode::Single), Panel::Input);
    }
}
