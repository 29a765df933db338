use crate::model::{CapturedOutput, LaunchableItem, Phase, StatusUpdate};
use crate::registry::{category_label, Registry};
use ratatui::style::Color;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Categories,
    Items { key: String },
}

/// Output of the most recent finished launch.
#[derive(Debug, Clone)]
pub struct LastOutput {
    pub label: String,
    pub output: CapturedOutput,
}

pub struct UiState {
    pub tab: usize,
    pub screen: Screen,
    pub category_selected: usize,
    pub item_selected: usize,
    pub registry: Registry,
    pub config_error: Option<String>,
    // Mirror of the status slot, refreshed from the control loop only.
    pub status: Option<StatusUpdate>,
    pub last_output: Option<LastOutput>,
    pub in_flight: usize,
    pub info: String,
}

impl UiState {
    pub fn new(registry: Registry, config_error: Option<String>) -> Self {
        Self {
            tab: 0,
            screen: Screen::Categories,
            category_selected: 0,
            item_selected: 0,
            registry,
            config_error,
            status: None,
            last_output: None,
            in_flight: 0,
            info: String::new(),
        }
    }

    pub fn category_keys(&self) -> Vec<String> {
        self.registry.category_keys().map(str::to_string).collect()
    }

    pub fn current_items(&self) -> &[LaunchableItem] {
        match &self.screen {
            Screen::Categories => &[],
            Screen::Items { key } => self.registry.categories(key),
        }
    }

    pub fn title(&self) -> String {
        match &self.screen {
            Screen::Categories => "Select a category".to_string(),
            Screen::Items { key } => category_label(key),
        }
    }

    fn list_len(&self) -> usize {
        match &self.screen {
            Screen::Categories => self.registry.category_keys().count(),
            Screen::Items { .. } => self.current_items().len(),
        }
    }

    fn selected_mut(&mut self) -> &mut usize {
        match self.screen {
            Screen::Categories => &mut self.category_selected,
            Screen::Items { .. } => &mut self.item_selected,
        }
    }

    pub fn select_prev(&mut self) {
        let sel = self.selected_mut();
        *sel = sel.saturating_sub(1);
    }

    pub fn select_next(&mut self) {
        let len = self.list_len();
        let sel = self.selected_mut();
        if *sel + 1 < len {
            *sel += 1;
        }
    }

    /// Enter the selected category, or return the selected item to launch.
    pub fn activate(&mut self) -> Option<LaunchableItem> {
        if matches!(self.screen, Screen::Items { .. }) {
            return self.current_items().get(self.item_selected).cloned();
        }
        let key = self
            .registry
            .category_keys()
            .nth(self.category_selected)?
            .to_string();
        self.screen = Screen::Items { key };
        self.item_selected = 0;
        None
    }

    pub fn back(&mut self) {
        self.screen = Screen::Categories;
        self.item_selected = 0;
    }

    /// Apply one update from the status slot.
    pub fn apply_update(&mut self, update: StatusUpdate) {
        match update.phase() {
            Phase::Launching => self.in_flight += 1,
            Phase::Running => {}
            Phase::Succeeded | Phase::Failed | Phase::TimedOut => {
                self.in_flight = self.in_flight.saturating_sub(1);
                if let Some(output) = update.output.as_deref() {
                    self.last_output = Some(LastOutput {
                        label: update.label.clone(),
                        output: output.clone(),
                    });
                }
            }
        }
        self.status = Some(update);
    }

    pub fn status_text(&self) -> String {
        match &self.status {
            Some(u) => u.event.message.clone(),
            None => "Ready".to_string(),
        }
    }
}

pub fn phase_color(phase: Option<Phase>) -> Color {
    match phase {
        None => Color::Gray,
        Some(Phase::Launching) | Some(Phase::Running) => Color::Yellow,
        Some(Phase::Succeeded) => Color::Green,
        Some(Phase::Failed) | Some(Phase::TimedOut) => Color::Red,
    }
}

/// Last `max` non-empty lines of captured output, stdout first then stderr.
pub fn output_tail(output: &CapturedOutput, max: usize) -> Vec<(bool, String)> {
    let mut lines: Vec<(bool, String)> = output
        .stdout
        .lines()
        .map(|l| (false, l.to_string()))
        .chain(output.stderr.lines().map(|l| (true, l.to_string())))
        .filter(|(_, l)| !l.trim().is_empty())
        .collect();
    if lines.len() > max {
        let _ = lines.drain(0..(lines.len() - max));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExecutionRequest, InvocationTarget, StatusEvent};
    use std::time::{Duration, Instant};

    fn state() -> UiState {
        let reg = Registry::from_json(
            r#"{
                "coding": [{"name": "Editor", "program": "code"}, {"name": "Shell", "program": "sh"}],
                "study": [{"name": "Course", "module": "scripts_list.study_current"}],
                "finances": []
            }"#,
        )
        .unwrap();
        UiState::new(reg, None)
    }

    fn update(phase: Phase, output: Option<CapturedOutput>) -> StatusUpdate {
        let req = ExecutionRequest {
            id: 9,
            label: "Editor".into(),
            target: InvocationTarget::Program {
                program: "code".into(),
                args: vec![],
            },
            timeout: Duration::from_secs(1),
            started_at: Instant::now(),
        };
        let u = StatusUpdate::new(&req, StatusEvent::new(phase, format!("{phase:?}")));
        match output {
            Some(o) => u.with_output(o),
            None => u,
        }
    }

    #[test]
    fn navigate_into_category_and_pick_item() {
        let mut s = state();
        assert_eq!(s.title(), "Select a category");
        assert!(s.activate().is_none());
        assert_eq!(
            s.screen,
            Screen::Items {
                key: "coding".into()
            }
        );
        s.select_next();
        s.select_next();
        let item = s.activate().unwrap();
        assert_eq!(item.display_name, "Shell");

        s.back();
        assert_eq!(s.screen, Screen::Categories);
        s.select_next();
        s.select_next();
        s.activate();
        assert_eq!(s.title(), "Finances");
        assert!(s.current_items().is_empty());
        assert!(s.activate().is_none());
    }

    #[test]
    fn empty_registry_has_nothing_to_activate() {
        let mut s = UiState::new(Registry::empty(), Some("broken".into()));
        s.select_next();
        assert!(s.activate().is_none());
        assert_eq!(s.screen, Screen::Categories);
    }

    #[test]
    fn in_flight_tracks_launch_lifecycle() {
        let mut s = state();
        assert_eq!(s.status_text(), "Ready");
        s.apply_update(update(Phase::Launching, None));
        s.apply_update(update(Phase::Running, None));
        assert_eq!(s.in_flight, 1);
        s.apply_update(update(
            Phase::Failed,
            Some(CapturedOutput {
                code: Some(1),
                stdout: String::new(),
                stderr: "nope".into(),
            }),
        ));
        assert_eq!(s.in_flight, 0);
        assert_eq!(s.status_text(), "Failed");
        assert_eq!(s.last_output.as_ref().unwrap().output.stderr, "nope");
        assert_eq!(phase_color(s.status.as_ref().map(|u| u.phase())), Color::Red);
    }

    #[test]
    fn output_tail_keeps_last_lines() {
        let out = CapturedOutput {
            code: Some(0),
            stdout: "a\n\nb\nc\n".into(),
            stderr: "warn\n".into(),
        };
        let tail = output_tail(&out, 2);
        assert_eq!(tail, [(false, "c".to_string()), (true, "warn".to_string())]);
    }
}
