use super::test_support::{locomotion_layer, recording_layer};
use crate::{FadeToStateParams, NewInstanceBehavior, RequestId, RequestStatus, RequestType};

fn idle_layer() -> crate::AnimStateLayer {
    let mut layer = locomotion_layer(NewInstanceBehavior::UsePreviousTrack);
    layer.fade_to_state("idle", FadeToStateParams::default());
    layer.begin_step(0.0);
    layer
}

fn pending_targets(layer: &crate::AnimStateLayer) -> Vec<String> {
    (0..layer.num_pending_requests())
        .filter_map(|i| layer.pending_change_request(i))
        .map(|r| r.target.clone())
        .collect()
}

#[test]
fn fifth_transition_request_is_rejected_without_touching_the_queue() {
    let mut layer = idle_layer();
    let ids: Vec<RequestId> = (0..4)
        .map(|_| layer.request_transition("go-walk", FadeToStateParams::default()))
        .collect();
    assert!(ids.iter().all(|id| id.is_valid()));

    let rejected = layer.request_transition("hit", FadeToStateParams::default());

    assert_eq!(rejected, RequestId::QUEUE_FULL);
    assert_eq!(layer.transition_status(rejected), RequestStatus::QueueFull);
    assert_eq!(layer.num_pending_requests(), 4);
    assert_eq!(pending_targets(&layer), ["go-walk"; 4]);
    for id in ids {
        assert_eq!(layer.transition_status(id), RequestStatus::Pending);
    }
}

#[test]
fn fade_at_capacity_evicts_exactly_the_oldest_request() {
    let mut layer = idle_layer();
    let ids: Vec<RequestId> = ["walk", "run", "hit", "idle"]
        .into_iter()
        .map(|s| layer.fade_to_state(s, FadeToStateParams::default()))
        .collect();

    let last = layer.fade_to_state("walk", FadeToStateParams::default());

    assert_eq!(layer.num_pending_requests(), 4);
    assert_eq!(pending_targets(&layer), ["run", "hit", "idle", "walk"]);
    assert_eq!(layer.transition_status(ids[0]), RequestStatus::Failed);
    assert_eq!(layer.transition_status(ids[1]), RequestStatus::Pending);
    assert_eq!(layer.transition_status(last), RequestStatus::Pending);
}

#[test]
fn fade_purges_pending_transitions() {
    let mut layer = idle_layer();
    let t1 = layer.request_transition("go-walk", FadeToStateParams::default());
    let t2 = layer.request_transition("hit", FadeToStateParams::default());

    layer.fade_to_state("run", FadeToStateParams::default());

    assert_eq!(pending_targets(&layer), ["run"]);
    assert_eq!(layer.transition_status(t1), RequestStatus::Failed);
    assert_eq!(layer.transition_status(t2), RequestStatus::Failed);
}

#[test]
fn dont_clear_fade_jumps_the_queue() {
    let mut layer = idle_layer();
    layer.request_transition("go-walk", FadeToStateParams::default());
    layer.request_transition("hit", FadeToStateParams::default());

    let params = FadeToStateParams {
        dont_clear_transitions: true,
        ..FadeToStateParams::default()
    };
    layer.fade_to_state("run", params);

    assert_eq!(pending_targets(&layer), ["run", "go-walk", "hit"]);
    let front = layer.pending_change_request(0).unwrap();
    assert_eq!(front.kind, RequestType::DirectFade);
    assert_eq!(front.src_state.as_deref(), Some("idle"));
}

#[test]
fn persistent_requests_survive_remove_all() {
    let mut layer = idle_layer();
    let persistent = layer.request_persistent_transition("go-walk", FadeToStateParams::default());
    let plain = layer.request_transition("hit", FadeToStateParams::default());

    layer.remove_all_pending_transitions(&[RequestType::Transition]);

    assert_eq!(pending_targets(&layer), ["go-walk"]);
    assert!(layer.pending_change_request(0).unwrap().persistent);
    assert_eq!(layer.transition_status(persistent), RequestStatus::Pending);
    assert_eq!(layer.transition_status(plain), RequestStatus::Failed);
}

#[test]
fn remove_all_only_touches_the_named_kinds() {
    let mut layer = idle_layer();
    layer.fade_to_state("walk", FadeToStateParams::default());
    layer.request_transition("hit", FadeToStateParams::default());

    layer.remove_all_pending_transitions(&[RequestType::DirectFade]);

    assert_eq!(pending_targets(&layer), ["hit"]);
}

#[test]
fn processed_ring_keeps_the_last_four_outcomes() {
    let mut layer = locomotion_layer(NewInstanceBehavior::UsePreviousTrack);
    let first: Vec<RequestId> = ["idle", "walk", "run", "hit"]
        .into_iter()
        .map(|s| layer.fade_to_state(s, FadeToStateParams::default()))
        .collect();
    layer.begin_step(0.0);
    for &id in &first {
        assert_eq!(layer.transition_status(id), RequestStatus::Taken);
    }

    let fifth = layer.fade_to_state("idle", FadeToStateParams::default());
    layer.begin_step(0.0);

    assert_eq!(layer.transition_status(first[0]), RequestStatus::Invalid);
    for &id in &first[1..] {
        assert_eq!(layer.transition_status(id), RequestStatus::Taken);
    }
    assert_eq!(layer.transition_status(fifth), RequestStatus::Taken);
    assert_eq!(layer.processed_requests().count(), 4);
}

#[test]
fn unknown_fade_target_resolves_invalid() {
    let mut layer = idle_layer();
    let id = layer.fade_to_state("swim", FadeToStateParams::default());
    assert_eq!(layer.transition_status(id), RequestStatus::Pending);

    layer.begin_step(0.1);

    assert_eq!(layer.transition_status(id), RequestStatus::Invalid);
    assert_eq!(layer.transitions_taken_last_update(), 1);
    assert_eq!(layer.current_state_id(), Some("idle"));
}

#[test]
fn taken_transition_leaves_a_complete_record() {
    let mut layer = idle_layer();
    let id = layer.request_transition("go-walk", FadeToStateParams::default());

    layer.begin_step(0.1);

    assert_eq!(layer.transition_status(id), RequestStatus::Taken);
    let dest = layer.transition_dest_instance(id).unwrap();
    assert_eq!(dest.state_name(), "walk");
    assert_eq!(dest.request_id(), id);

    let record = layer.processed_requests().find(|r| r.id == id).unwrap();
    assert_eq!(record.kind, Some(RequestType::Transition));
    assert_eq!(record.src_state.as_deref(), Some("idle"));
    assert_eq!(record.dst_state.as_deref(), Some("walk"));
    assert_eq!(record.transition.as_deref(), Some("go-walk"));
    assert_eq!(record.instance, dest.id());
}

#[test]
fn dest_instance_is_gone_once_released() {
    let mut layer = idle_layer();
    let id = layer.request_transition("go-walk", FadeToStateParams::default());
    layer.begin_step(0.1);
    assert!(layer.transition_dest_instance(id).is_some());

    layer.fade_to_state("run", FadeToStateParams::default());
    layer.begin_step(0.1);
    layer.begin_step(0.1);

    assert!(layer.transition_dest_instance(id).is_none());
    assert!(layer.transition_dest_instance(RequestId::INVALID).is_none());
}

#[test]
fn request_by_final_state_picks_the_active_transition() {
    let mut layer = idle_layer();

    let id = layer.request_transition_by_final_state("walk", FadeToStateParams::default());
    assert!(id.is_valid());
    assert_eq!(pending_targets(&layer), ["go-walk"]);

    // idle-to-run only becomes active once idle completes.
    let id = layer.request_transition_by_final_state("run", FadeToStateParams::default());
    assert_eq!(id, RequestId::INVALID);
    let id = layer.request_transition_by_final_state("idle", FadeToStateParams::default());
    assert_eq!(id, RequestId::INVALID);
    assert_eq!(layer.num_pending_requests(), 1);
}

#[test]
fn request_by_final_state_needs_a_current_state() {
    let mut layer = locomotion_layer(NewInstanceBehavior::UsePreviousTrack);
    let id = layer.request_transition_by_final_state("walk", FadeToStateParams::default());
    assert_eq!(id, RequestId::INVALID);
    assert!(!layer.are_transitions_pending());
}

#[test]
fn pending_change_hook_sees_every_accepted_request() {
    let (mut layer, recording) = recording_layer(NewInstanceBehavior::UsePreviousTrack);
    layer.fade_to_state("idle", FadeToStateParams::default());
    layer.begin_step(0.0);
    recording.take();

    layer.request_transition("go-walk", FadeToStateParams::default());
    layer.request_persistent_transition("hit", FadeToStateParams::default());
    layer.request_transition("go-walk", FadeToStateParams::default());
    layer.request_transition("go-walk", FadeToStateParams::default());
    layer.request_transition("hit", FadeToStateParams::default());

    assert_eq!(
        recording.take(),
        [
            "pending Transition go-walk 1",
            "pending Transition go-walk 3",
            "pending Transition go-walk 4",
            "pending Transition hit full",
        ]
    );
}
