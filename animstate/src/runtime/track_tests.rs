use super::test_support::assert_approx;
use super::{StateInstance, Track};

/// Pool whose slot `i` has anim and motion fade `fades[i]`.
fn pool(fades: &[f32]) -> Vec<StateInstance> {
    fades
        .iter()
        .map(|&fade| StateInstance {
            anim_fade: fade,
            motion_fade: fade,
            ..StateInstance::default()
        })
        .collect()
}

fn track(slots: &[usize]) -> Track {
    Track {
        instances: slots.to_vec(),
        ..Track::new(false)
    }
}

#[test]
fn track_fade_comes_from_the_oldest_instance() {
    let pool = pool(&[0.25, 0.5]);
    let track = track(&[0, 1]);
    assert_eq!(track.top(), Some(0));
    assert_eq!(track.oldest(), Some(1));
    assert_eq!(track.anim_fade(&pool), 0.5);
    assert_eq!(track.master_fade(&pool), 0.5);
    assert_eq!(self::track(&[]).anim_fade(&pool), 0.0);
}

#[test]
fn effective_fade_is_split_newest_first() {
    let mut pool = pool(&[0.25, 0.5, 1.0]);
    let mut track = track(&[0, 1, 2]);
    track.update_effective_fade(0.8, &mut pool);

    assert_approx(track.effective_fade(), 0.8);
    assert_approx(pool[0].effective_fade(), 0.8 * 0.25);
    assert_approx(pool[1].effective_fade(), 0.8 * 0.75 * 0.5);
    assert_approx(pool[2].effective_fade(), 0.8 * 0.75 * 0.5);
    let total: f32 = pool.iter().map(StateInstance::effective_fade).sum();
    assert_approx(total, 0.8);
}

#[test]
fn instances_behind_a_full_one_are_detached() {
    let pool = pool(&[0.5, 1.0, 0.7, 1.0]);
    let mut track = track(&[0, 1, 2, 3]);
    let released = track.take_non_contributing(&pool);
    assert_eq!(track.instance_slots(), [0, 1]);
    assert_eq!(released, [2, 3]);
}

#[test]
fn oldest_instance_stays_while_it_fades_the_track_in() {
    let pool = pool(&[1.0, 0.5, 0.3]);
    let mut track = track(&[0, 1, 2]);
    let released = track.take_non_contributing(&pool);
    assert_eq!(track.instance_slots(), [0, 2]);
    assert_eq!(released, [1]);
}

#[test]
fn nothing_is_detached_without_a_full_instance() {
    let pool = pool(&[0.5, 0.3]);
    let mut track = track(&[0, 1]);
    assert!(track.take_non_contributing(&pool).is_empty());
    assert_eq!(track.len(), 2);

    let pool = self::pool(&[0.5, 1.0]);
    let mut track = self::track(&[0, 1]);
    assert!(track.take_non_contributing(&pool).is_empty());
}

#[test]
fn clear_resets_the_cached_overlay() {
    let mut track = Track::new(true);
    track.instances.push(4);
    track
        .overlay
        .as_mut()
        .unwrap()
        .set_remap("idle", "idle-tired");
    track.clear();
    assert!(track.is_empty());
    assert_eq!(track.overlay().unwrap().lookup_transformed("idle"), "idle");
    assert!(Track::new(false).overlay().is_none());
}
