use std::collections::HashMap;

/// Named scalar blackboard read by transition conditions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnimInfo {
    values: HashMap<String, f32>,
    pub transition_switch: bool,
}

impl AnimInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<f32> {
        self.values.get(key).copied()
    }

    pub fn set(&mut self, key: impl Into<String>, value: f32) {
        self.values.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<f32> {
        self.values.remove(key)
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.transition_switch = false;
    }
}
