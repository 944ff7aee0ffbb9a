use super::{AnimStateLayer, StateInstance};

/// Blends arbitrary per-instance data across the layer's instance stack.
pub trait InstanceBlender<T> {
    /// Result when no instance provides data.
    fn default_data(&self) -> T;

    /// Data for one instance, or `None` to leave the instance out.
    fn data_for_instance(&mut self, instance: &StateInstance) -> Option<T>;

    /// Combines `left` (older) with `right` (newer). The fades are those of the newer
    /// instance of the pair.
    fn blend_data(
        &mut self,
        left: &T,
        right: &T,
        master_fade: f32,
        anim_fade: f32,
        motion_fade: f32,
    ) -> T;
}

impl AnimStateLayer {
    /// Accumulates from the oldest instance towards the newest.
    pub fn blend_forward<T>(&self, blender: &mut impl InstanceBlender<T>) -> T {
        let mut acc: Option<T> = None;
        for slot in self.slots_old_to_new() {
            let instance = &self.instances[slot];
            let Some(data) = blender.data_for_instance(instance) else {
                continue;
            };
            acc = Some(match acc {
                None => data,
                Some(prev) => blender.blend_data(
                    &prev,
                    &data,
                    instance.master_fade(),
                    instance.anim_fade,
                    instance.motion_fade,
                ),
            });
        }
        acc.unwrap_or_else(|| blender.default_data())
    }

    /// Accumulates from the newest instance towards the oldest, each older instance being
    /// blended under the running result.
    pub fn blend_backward<T>(&self, blender: &mut impl InstanceBlender<T>) -> T {
        let mut acc: Option<(T, f32, f32, f32)> = None;
        for slot in self.slots_new_to_old() {
            let instance = &self.instances[slot];
            let Some(data) = blender.data_for_instance(instance) else {
                continue;
            };
            let fades = (
                instance.master_fade(),
                instance.anim_fade,
                instance.motion_fade,
            );
            acc = Some(match acc {
                None => (data, fades.0, fades.1, fades.2),
                Some((newer, master, anim, motion)) => {
                    let blended = blender.blend_data(&data, &newer, master, anim, motion);
                    (blended, fades.0, fades.1, fades.2)
                }
            });
        }
        acc.map_or_else(|| blender.default_data(), |(data, ..)| data)
    }
}
