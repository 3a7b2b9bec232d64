// ── Floor navigation ──
//
// Floors are listed top-down. Only a window of floor buttons is visible;
// selecting a floor directly centres the window on it, while the arrows
// step one floor and scroll the window by one only when the selection
// leaves it.

/// Ordered floors, the selected one, and the visible button window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloorNavigator {
    /// Floor levels, highest first.
    floors: Vec<i32>,
    selected: usize,
    window_start: usize,
    window_size: usize,
}

impl FloorNavigator {
    /// Build a navigator over `floors` (any order, duplicates dropped)
    /// with nothing but the top floor selected.
    pub fn new(floors: impl IntoIterator<Item = i32>, window_size: usize) -> Self {
        let mut floors: Vec<i32> = floors.into_iter().collect();
        floors.sort_unstable_by(|a, b| b.cmp(a));
        floors.dedup();
        let mut nav = Self {
            floors,
            selected: 0,
            window_start: 0,
            window_size: window_size.max(1),
        };
        nav.select(0);
        nav
    }

    pub fn floors(&self) -> &[i32] {
        &self.floors
    }

    pub fn is_empty(&self) -> bool {
        self.floors.is_empty()
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected_level(&self) -> Option<i32> {
        self.floors.get(self.selected).copied()
    }

    pub fn window_start(&self) -> usize {
        self.window_start
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Floor levels whose buttons are visible.
    pub fn visible(&self) -> &[i32] {
        let end = (self.window_start + self.window_size).min(self.floors.len());
        self.floors.get(self.window_start..end).unwrap_or_default()
    }

    /// Select by index and centre the window on it. Out-of-range indexes
    /// are clamped to the last floor.
    pub fn select(&mut self, index: usize) {
        if self.floors.is_empty() {
            self.selected = 0;
            self.window_start = 0;
            return;
        }
        let index = index.min(self.floors.len() - 1);
        let max_start = self.floors.len().saturating_sub(self.window_size);
        self.selected = index;
        self.window_start = index.saturating_sub(self.window_size / 2).min(max_start);
    }

    /// Select by floor level. Returns `false` for an unknown level.
    pub fn select_level(&mut self, level: i32) -> bool {
        match self.floors.iter().position(|f| *f == level) {
            Some(index) => {
                self.select(index);
                true
            }
            None => false,
        }
    }

    /// Up arrow: one floor higher in the list.
    pub fn can_step_up(&self) -> bool {
        self.selected > 0
    }

    /// Down arrow: one floor lower in the list.
    pub fn can_step_down(&self) -> bool {
        self.selected + 1 < self.floors.len()
    }

    /// Move the selection up by one. No-op at the top.
    pub fn step_up(&mut self) -> bool {
        if !self.can_step_up() {
            return false;
        }
        self.selected -= 1;
        if self.selected < self.window_start {
            self.window_start -= 1;
        }
        true
    }

    /// Move the selection down by one. No-op at the bottom.
    pub fn step_down(&mut self) -> bool {
        if !self.can_step_down() {
            return false;
        }
        self.selected += 1;
        if self.selected >= self.window_start + self.window_size {
            self.window_start += 1;
        }
        true
    }
}
