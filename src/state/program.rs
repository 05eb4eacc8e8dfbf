use indexmap::IndexMap;

use crate::dao::models::{Program, Task};

/// Programs shown to the user, in backend order, plus the staleness flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramView {
    programs: IndexMap<String, Program>,
    selected: Option<String>,
    stale: bool,
}

impl ProgramView {
    /// View over `programs`, nothing selected.
    pub fn from_programs(programs: Vec<Program>) -> Self {
        let mut view = Self::default();
        view.replace(programs);
        view
    }

    /// Number of programs.
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    /// Whether no program is known.
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Programs in backend order.
    pub fn programs(&self) -> impl Iterator<Item = &Program> {
        self.programs.values()
    }

    /// Owned copy of the list, as written to the cache.
    pub fn to_vec(&self) -> Vec<Program> {
        self.programs.values().cloned().collect()
    }

    /// Program by id.
    pub fn get(&self, program_id: &str) -> Option<&Program> {
        self.programs.get(program_id)
    }

    /// Find a task inside a program.
    pub fn task(&self, program_id: &str, task_id: &str) -> Option<&Task> {
        self.get(program_id)?
            .tasks
            .iter()
            .find(|task| task.id == task_id)
    }

    /// Currently selected program; the first one when nothing was picked.
    pub fn selected(&self) -> Option<&Program> {
        self.selected
            .as_deref()
            .and_then(|id| self.programs.get(id))
            .or_else(|| self.programs.values().next())
    }

    /// Select a program by id. Returns `false` when it is not in the view.
    pub fn select(&mut self, program_id: &str) -> bool {
        if !self.programs.contains_key(program_id) {
            return false;
        }
        self.selected = Some(program_id.to_string());
        true
    }

    /// Replace the whole list. A selection that no longer exists falls back to the first program.
    pub fn replace(&mut self, programs: Vec<Program>) {
        self.programs = programs
            .into_iter()
            .map(|program| (program.id.clone(), program))
            .collect();
        if self
            .selected
            .as_deref()
            .is_some_and(|id| !self.programs.contains_key(id))
        {
            self.selected = None;
        }
    }

    /// Replace one program in place, keeping its position.
    pub fn upsert(&mut self, program: Program) {
        self.programs.insert(program.id.clone(), program);
    }

    /// Whether the last refresh failed without a response.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Set the stale-data indicator.
    pub fn set_stale(&mut self, stale: bool) {
        self.stale = stale;
    }
}
