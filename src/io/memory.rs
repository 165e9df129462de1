use std::collections::{BTreeSet, HashMap};

use crate::error::BudgetResult;
use crate::io::{BudgetSource, RawRecord, TimeStepKey, normalize_name};

// Budget held in memory, keyed by (time step, normalized component name)
#[derive(Debug, Clone, Default)]
pub struct MemoryBudget {
    steps: Vec<TimeStepKey>,
    records: HashMap<(TimeStepKey, String), Vec<RawRecord>>,
}

impl MemoryBudget {
    pub fn new() -> Self {
        MemoryBudget::default()
    }

    /// Registers a time step with no records. Steps keep insertion order.
    pub fn add_step(&mut self, key: TimeStepKey) {
        if !self.steps.contains(&key) {
            self.steps.push(key);
        }
    }

    /// Appends records for `component` at `key`, registering the step if needed.
    pub fn add_records(&mut self, key: TimeStepKey, component: &str, records: Vec<RawRecord>) {
        self.add_step(key);
        self.records
            .entry((key, normalize_name(component)))
            .or_default()
            .extend(records);
    }
}

impl BudgetSource for MemoryBudget {
    fn time_steps(&self) -> Vec<TimeStepKey> {
        self.steps.clone()
    }

    fn component_names(&self) -> BTreeSet<String> {
        self.records.keys().map(|(_, name)| name.clone()).collect()
    }

    fn records(
        &mut self,
        key: TimeStepKey,
        component: &str,
    ) -> BudgetResult<Option<Vec<RawRecord>>> {
        Ok(self.records.get(&(key, normalize_name(component))).cloned())
    }
}
