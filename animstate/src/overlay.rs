use std::collections::HashMap;

pub const MRU_VARIANT_COUNT: usize = 4;

#[derive(Clone, Debug, PartialEq)]
struct VariantGroup {
    name: String,
    anims: Vec<String>,
    counter: usize,
}

/// Animation name remapping plus sequential variant selection.
///
/// A lookup first applies the remap table (one level), then, if the resulting name is a
/// variant group, picks the group's current variant. Incrementing lookups advance the
/// group's counter modulo its size and record the group as most recently used.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OverlaySnapshot {
    remaps: HashMap<String, String>,
    variants: Vec<VariantGroup>,
    variant_index: HashMap<String, usize>,
    mru: [Option<usize>; MRU_VARIANT_COUNT],
}

impl OverlaySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_remap(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.remaps.insert(from.into(), to.into());
    }

    pub fn clear_remap(&mut self, from: &str) -> bool {
        self.remaps.remove(from).is_some()
    }

    /// Registers (or replaces) a variant group. The counter restarts at zero.
    pub fn set_variants(&mut self, name: impl Into<String>, anims: Vec<String>) {
        let name = name.into();
        if let Some(&i) = self.variant_index.get(&name) {
            self.variants[i].anims = anims;
            self.variants[i].counter = 0;
            return;
        }
        self.variant_index.insert(name.clone(), self.variants.len());
        self.variants.push(VariantGroup {
            name,
            anims,
            counter: 0,
        });
    }

    pub fn variant_counter(&self, name: &str) -> Option<usize> {
        self.variant_index.get(name).map(|&i| self.variants[i].counter)
    }

    pub fn lookup_transformed<'a>(&'a self, name: &'a str) -> &'a str {
        let remapped = self.remapped(name);
        match self.variant_group(remapped) {
            Some(group) if !group.anims.is_empty() => {
                group.anims[group.counter % group.anims.len()].as_str()
            }
            _ => remapped,
        }
    }

    pub fn lookup_and_increment(&mut self, name: &str) -> String {
        let remapped = self.remapped(name).to_string();
        let Some(&index) = self.variant_index.get(&remapped) else {
            return remapped;
        };
        let group = &mut self.variants[index];
        if group.anims.is_empty() {
            return remapped;
        }
        let picked = group.anims[group.counter % group.anims.len()].clone();
        group.counter = (group.counter + 1) % group.anims.len();
        self.touch_mru(index);
        picked
    }

    /// Names of the most recently advanced variant groups, newest first.
    pub fn most_recent_variants(&self) -> impl Iterator<Item = &str> {
        self.mru
            .iter()
            .flatten()
            .map(|&i| self.variants[i].name.as_str())
    }

    pub fn copy_from(&mut self, other: &OverlaySnapshot) {
        self.clone_from(other);
    }

    /// Copies variant counters (and recency) for groups both snapshots know.
    pub fn update_variants_from(&mut self, other: &OverlaySnapshot) {
        for group in &mut self.variants {
            if let Some(&i) = other.variant_index.get(&group.name) {
                group.counter = other.variants[i].counter;
            }
        }
        let mut mru = [None; MRU_VARIANT_COUNT];
        let mut len = 0;
        for name in other.most_recent_variants() {
            if let Some(&i) = self.variant_index.get(name) {
                mru[len] = Some(i);
                len += 1;
            }
        }
        self.mru = mru;
    }

    fn remapped<'a>(&'a self, name: &'a str) -> &'a str {
        self.remaps.get(name).map_or(name, String::as_str)
    }

    fn variant_group(&self, name: &str) -> Option<&VariantGroup> {
        self.variant_index.get(name).map(|&i| &self.variants[i])
    }

    fn touch_mru(&mut self, index: usize) {
        let existing = self
            .mru
            .iter()
            .position(|slot| *slot == Some(index))
            .unwrap_or(MRU_VARIANT_COUNT - 1);
        self.mru.copy_within(0..existing, 1);
        self.mru[0] = Some(index);
    }
}
