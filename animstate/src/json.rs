use crate::{
    BlendCurve, BlendOverride, BlendOverrideTable, ConditionSource, EffectDef, Error,
    LayerBlendMode, LayerParams, NewInstanceBehavior, PoseTreeDef, StateDef, StateFlags,
    StateGraph, TransitionCondition, TransitionDef, TransitionFlags, TransitionGroupDef,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct GraphRoot {
    states: Vec<StateDoc>,
    #[serde(default, rename = "transitionGroups")]
    transition_groups: Vec<GroupDoc>,
}

fn default_one() -> f32 {
    1.0
}

#[derive(Debug, Deserialize)]
struct StateDoc {
    name: String,
    duration: f32,
    #[serde(default = "default_one")]
    speed: f32,
    #[serde(default)]
    flags: Vec<String>,
    #[serde(default)]
    pose: Option<PoseDoc>,
    #[serde(default)]
    effects: Vec<EffectDoc>,
    #[serde(default)]
    transitions: Vec<TransitionDoc>,
    #[serde(default)]
    groups: Vec<String>,
}

/// A bare string is a clip.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PoseDoc {
    Clip(String),
    Blend {
        left: Box<PoseDoc>,
        right: Box<PoseDoc>,
        #[serde(default)]
        factor: f32,
    },
}

#[derive(Debug, Deserialize)]
struct EffectDoc {
    name: String,
    #[serde(default)]
    phase: f32,
}

#[derive(Debug, Deserialize)]
struct GroupDoc {
    name: String,
    #[serde(default)]
    transitions: Vec<TransitionDoc>,
    #[serde(default)]
    groups: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TransitionDoc {
    name: String,
    dest: String,
    #[serde(default)]
    fade: f32,
    #[serde(default, rename = "motionFade")]
    motion_fade: Option<f32>,
    #[serde(default)]
    curve: Option<String>,
    #[serde(default, rename = "startPhase")]
    start_phase: f32,
    #[serde(default)]
    flags: Vec<String>,
    #[serde(default)]
    conditions: Vec<ConditionDoc>,
}

#[derive(Debug, Deserialize)]
struct ConditionDoc {
    source: String,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    min: Option<f32>,
    #[serde(default)]
    max: Option<f32>,
    #[serde(default, rename = "requireSwitch")]
    require_switch: bool,
}

#[derive(Debug, Deserialize)]
struct OverridesRoot {
    overrides: Vec<OverrideDoc>,
}

#[derive(Debug, Deserialize)]
struct OverrideDoc {
    src: String,
    dst: String,
    #[serde(default)]
    fade: Option<f32>,
    #[serde(default, rename = "motionFade")]
    motion_fade: Option<f32>,
    #[serde(default)]
    curve: Option<String>,
    #[serde(default, rename = "allowAuto")]
    allow_auto: bool,
}

#[derive(Debug, Deserialize)]
struct LayerDoc {
    name: String,
    #[serde(default, rename = "maxTracks")]
    max_tracks: Option<usize>,
    #[serde(default, rename = "maxInstances")]
    max_instances: Option<usize>,
    #[serde(default, rename = "defaultBehavior")]
    default_behavior: Option<String>,
    #[serde(default, rename = "cacheOverlays")]
    cache_overlays: Option<bool>,
    #[serde(default, rename = "cacheTopInfo")]
    cache_top_info: Option<bool>,
    #[serde(default, rename = "blendMode")]
    blend_mode: Option<String>,
    #[serde(default, rename = "featherBlendIndex")]
    feather_blend_index: Option<u32>,
    #[serde(default, rename = "initialFade")]
    initial_fade: Option<f32>,
}

fn parse<'a, T: Deserialize<'a>>(input: &'a str) -> Result<T, Error> {
    serde_json::from_str(input).map_err(|e| Error::JsonParse {
        message: e.to_string(),
    })
}

impl StateGraph {
    /// Loads a graph from its JSON document. Transition groups are flattened and every
    /// destination is checked, as with [`StateGraph::with_groups`].
    pub fn from_json_str(input: &str) -> Result<Self, Error> {
        let root: GraphRoot = parse(input)?;

        let mut groups = Vec::with_capacity(root.transition_groups.len());
        for group in root.transition_groups {
            let context = format!("transition group '{}'", group.name);
            groups.push(TransitionGroupDef {
                transitions: parse_transitions(group.transitions, &context)?,
                name: group.name,
                groups: group.groups,
            });
        }

        let mut states = Vec::with_capacity(root.states.len());
        for doc in root.states {
            let context = format!("state '{}'", doc.name);
            let pose = match doc.pose {
                Some(pose) => parse_pose(pose),
                None => PoseTreeDef::clip(doc.name.clone()),
            };
            states.push(StateDef {
                flags: parse_state_flags(&doc.flags, &context)?,
                transitions: parse_transitions(doc.transitions, &context)?,
                effects: doc
                    .effects
                    .into_iter()
                    .map(|e| EffectDef {
                        name: e.name,
                        phase: e.phase,
                    })
                    .collect(),
                transition_groups: doc.groups,
                duration: doc.duration,
                speed: doc.speed,
                pose,
                name: doc.name,
            });
        }

        Self::with_groups(states, groups)
    }
}

impl BlendOverrideTable {
    /// Loads `{"overrides": [{"src", "dst", "fade", "motionFade", "curve", "allowAuto"}]}`.
    /// State names are checked later by [`BlendOverrideTable::validate`].
    pub fn from_json_str(input: &str) -> Result<Self, Error> {
        let root: OverridesRoot = parse(input)?;
        let mut table = Self::new();
        for doc in root.overrides {
            let context = format!("blend override '{}' -> '{}'", doc.src, doc.dst);
            let curve = doc
                .curve
                .as_deref()
                .map(|c| parse_curve(c, &context))
                .transpose()?;
            table.insert(
                doc.src,
                doc.dst,
                BlendOverride {
                    fade_time: doc.fade,
                    motion_fade_time: doc.motion_fade,
                    curve,
                    allow_auto_transition: doc.allow_auto,
                },
            );
        }
        Ok(table)
    }
}

impl LayerParams {
    /// Missing fields keep their [`LayerParams::default`] values. The result is validated.
    pub fn from_json_str(input: &str) -> Result<Self, Error> {
        let doc: LayerDoc = parse(input)?;
        let context = format!("layer '{}'", doc.name);
        let defaults = Self::default();

        let default_behavior = match doc.default_behavior.as_deref() {
            None => defaults.default_behavior,
            Some("spawn-new-track") => NewInstanceBehavior::SpawnNewTrack,
            Some("use-previous-track") => NewInstanceBehavior::UsePreviousTrack,
            Some(other) => return Err(invalid_enum(&context, "defaultBehavior", other)),
        };
        let blend_mode = match doc.blend_mode.as_deref() {
            None => defaults.blend_mode,
            Some("interpolate") => LayerBlendMode::Interpolate,
            Some("additive") => LayerBlendMode::Additive,
            Some(other) => return Err(invalid_enum(&context, "blendMode", other)),
        };

        let params = Self {
            name: doc.name,
            max_tracks: doc.max_tracks.unwrap_or(defaults.max_tracks),
            max_instances: doc.max_instances.unwrap_or(defaults.max_instances),
            default_behavior,
            cache_overlays: doc.cache_overlays.unwrap_or(defaults.cache_overlays),
            cache_top_info: doc.cache_top_info.unwrap_or(defaults.cache_top_info),
            blend_mode,
            feather_blend_index: doc.feather_blend_index,
            initial_fade: doc.initial_fade.unwrap_or(defaults.initial_fade),
        };
        params.validate()?;
        Ok(params)
    }
}

fn invalid_enum(context: &str, field: &str, value: &str) -> Error {
    Error::JsonInvalidEnum {
        context: context.to_string(),
        field: field.to_string(),
        value: value.to_string(),
    }
}

fn parse_curve(value: &str, context: &str) -> Result<BlendCurve, Error> {
    BlendCurve::from_name(value).ok_or_else(|| Error::JsonInvalidCurve {
        context: context.to_string(),
        value: value.to_string(),
    })
}

fn parse_pose(doc: PoseDoc) -> PoseTreeDef {
    match doc {
        PoseDoc::Clip(anim) => PoseTreeDef::Clip { anim },
        PoseDoc::Blend {
            left,
            right,
            factor,
        } => PoseTreeDef::Blend {
            left: Box::new(parse_pose(*left)),
            right: Box::new(parse_pose(*right)),
            factor,
        },
    }
}

fn parse_state_flags(names: &[String], context: &str) -> Result<StateFlags, Error> {
    let mut flags = StateFlags::default();
    for name in names {
        match name.as_str() {
            "never-loop" => flags.never_loop = true,
            "transitional" => flags.transitional = true,
            "spawn-on-new-track" => flags.spawn_on_new_track = true,
            "spawn-on-same-track" => flags.spawn_on_same_track = true,
            "disable-prev-auto-transitions" => flags.disable_prev_insts_auto_trans = true,
            "extrapolate-align" => flags.extrapolate_align = true,
            "exclusive-effects" => flags.exclusive_effects = true,
            other => return Err(invalid_enum(context, "flag", other)),
        }
    }
    Ok(flags)
}

fn parse_transition_flags(names: &[String], context: &str) -> Result<TransitionFlags, Error> {
    let mut flags = TransitionFlags::default();
    for name in names {
        match name.as_str() {
            "fade-out-layer" => flags.fade_out_layer = true,
            "no-reset" => flags.no_reset = true,
            "phase-sync" => flags.phase_sync = true,
            "freeze-src" => flags.freeze_src_state = true,
            "freeze-dest" => flags.freeze_dest_state = true,
            "limit-blend-time" => flags.limit_blend_time = true,
            "spawn-on-new-track" => flags.spawn_on_new_track = true,
            "spawn-on-same-track" => flags.spawn_on_same_track = true,
            "inactive-while-blending" => flags.inactive_while_blending = true,
            "top-instance-only" => flags.valid_on_top_instance_only = true,
            "needs-free-instance" => flags.valid_if_has_free_instance = true,
            "start-blend-early" => flags.start_blend_early = true,
            "start-blend-early-reverse" => flags.start_blend_early_reverse = true,
            other => return Err(invalid_enum(context, "flag", other)),
        }
    }
    Ok(flags)
}

fn parse_transitions(docs: Vec<TransitionDoc>, owner: &str) -> Result<Vec<TransitionDef>, Error> {
    docs.into_iter()
        .map(|doc| {
            let context = format!("transition '{}' of {owner}", doc.name);
            let curve = match doc.curve.as_deref() {
                Some(c) => parse_curve(c, &context)?,
                None => BlendCurve::Linear,
            };
            let conditions = doc
                .conditions
                .into_iter()
                .map(|c| parse_condition(c, &context))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(TransitionDef {
                flags: parse_transition_flags(&doc.flags, &context)?,
                name: doc.name,
                dest_state: doc.dest,
                fade_time: doc.fade,
                motion_fade_time: doc.motion_fade,
                curve,
                start_phase: doc.start_phase,
                conditions,
            })
        })
        .collect()
}

fn parse_condition(doc: ConditionDoc, context: &str) -> Result<TransitionCondition, Error> {
    let source = match (doc.source.as_str(), doc.key) {
        ("phase", _) => ConditionSource::Phase,
        ("fade", _) => ConditionSource::StateFade,
        ("info", Some(key)) => ConditionSource::Info(key),
        ("info", None) => {
            return Err(Error::InvalidValue {
                message: format!("info condition of {context} has no key"),
            });
        }
        (other, _) => return Err(invalid_enum(context, "source", other)),
    };
    Ok(TransitionCondition {
        source,
        lower: doc.min,
        upper: doc.max,
        require_switch: doc.require_switch,
    })
}
