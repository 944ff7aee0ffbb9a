use crate::InstanceId;

/// Effect whose phase key was crossed during a frame.
#[derive(Clone, Debug, PartialEq)]
pub struct TriggeredEffect {
    pub name: String,
    pub state: String,
    pub instance: InstanceId,
    pub phase: f32,
    /// Effective fade of the emitting instance.
    pub anim_blend: f32,
    pub top_state: bool,
    pub exclusive: bool,
}

/// Drops exclusive effects from every instance but the one with the highest blend.
/// Non-exclusive effects are untouched, and nothing is dropped while the best blend is zero.
pub(crate) fn remove_effects_with_lowest_blend(effects: &mut Vec<TriggeredEffect>) {
    let mut winner: Option<(InstanceId, f32)> = None;
    for effect in effects.iter().filter(|e| e.exclusive) {
        match winner {
            Some((_, blend)) if blend >= effect.anim_blend => {}
            _ => winner = Some((effect.instance, effect.anim_blend)),
        }
    }
    let Some((keep, blend)) = winner else {
        return;
    };
    if blend <= 0.0 {
        return;
    }
    effects.retain(|e| !e.exclusive || e.instance == keep);
}
