use super::StateInstance;
use crate::OverlaySnapshot;
use crate::curve::clamp01;

/// Newest-first stack of instance slots that blend against each other.
///
/// The track's own fade is the fade of its oldest instance: that instance was the one the
/// track was spawned with, and it carries the track in against older tracks.
#[derive(Clone, Debug, Default)]
pub struct Track {
    pub(crate) instances: Vec<usize>,
    pub(crate) overlay: Option<OverlaySnapshot>,
    pub(crate) effective_fade: f32,
}

impl Track {
    pub(crate) fn new(cache_overlay: bool) -> Self {
        Self {
            instances: Vec::new(),
            overlay: cache_overlay.then(OverlaySnapshot::default),
            effective_fade: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Pool slots, newest first.
    pub fn instance_slots(&self) -> &[usize] {
        &self.instances
    }

    pub fn effective_fade(&self) -> f32 {
        self.effective_fade
    }

    pub fn overlay(&self) -> Option<&OverlaySnapshot> {
        self.overlay.as_ref()
    }

    pub(crate) fn top(&self) -> Option<usize> {
        self.instances.first().copied()
    }

    pub(crate) fn oldest(&self) -> Option<usize> {
        self.instances.last().copied()
    }

    pub(crate) fn master_fade(&self, pool: &[StateInstance]) -> f32 {
        self.oldest().map_or(0.0, |slot| pool[slot].master_fade())
    }

    pub(crate) fn anim_fade(&self, pool: &[StateInstance]) -> f32 {
        self.oldest().map_or(0.0, |slot| pool[slot].anim_fade)
    }

    pub(crate) fn clear(&mut self) {
        self.instances.clear();
        self.effective_fade = 0.0;
        if let Some(overlay) = &mut self.overlay {
            *overlay = OverlaySnapshot::default();
        }
    }

    /// Distributes the track's effective fade over its instances, newest first.
    pub(crate) fn update_effective_fade(&mut self, track_fade: f32, pool: &mut [StateInstance]) {
        self.effective_fade = track_fade;
        let mut remaining = track_fade;
        let count = self.instances.len();
        for (i, &slot) in self.instances.iter().enumerate() {
            let instance = &mut pool[slot];
            let fade = instance.anim_fade;
            instance.effective_fade = if i + 1 == count {
                remaining
            } else {
                remaining * fade
            };
            remaining *= clamp01(1.0 - fade);
        }
    }

    /// Detaches instances hidden behind a fully faded-in newer instance and returns their
    /// slots. The oldest instance is kept while it is still fading the track in.
    pub(crate) fn take_non_contributing(&mut self, pool: &[StateInstance]) -> Vec<usize> {
        let count = self.instances.len();
        if count < 2 {
            return Vec::new();
        }
        let Some(first_full) = self
            .instances
            .iter()
            .position(|&slot| pool[slot].master_fade() >= 1.0)
        else {
            return Vec::new();
        };
        if first_full + 1 >= count {
            return Vec::new();
        }

        let oldest = self.instances[count - 1];
        let mut released: Vec<usize> = self.instances[first_full + 1..count - 1].to_vec();
        self.instances.truncate(first_full + 1);
        if pool[oldest].master_fade() < 1.0 {
            self.instances.push(oldest);
        } else {
            released.push(oldest);
        }
        released
    }
}
