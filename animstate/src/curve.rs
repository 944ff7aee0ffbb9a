use std::f32::consts::{FRAC_PI_2, PI};

/// Shape used to map normalized blend time to a blend weight.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default, Hash)]
pub enum BlendCurve {
    #[default]
    Linear,
    UniformS,
    EaseIn,
    EaseOut,
    QuadraticEaseIn,
    QuadraticEaseOut,
    QuadraticEaseInOut,
    CubicEaseIn,
    CubicEaseOut,
    CubicEaseInOut,
    SinusoidalEaseIn,
    SinusoidalEaseOut,
    SinusoidalEaseInOut,
    LongTail,
    LongToe,
}

impl BlendCurve {
    pub const ALL: [BlendCurve; 15] = [
        Self::Linear,
        Self::UniformS,
        Self::EaseIn,
        Self::EaseOut,
        Self::QuadraticEaseIn,
        Self::QuadraticEaseOut,
        Self::QuadraticEaseInOut,
        Self::CubicEaseIn,
        Self::CubicEaseOut,
        Self::CubicEaseInOut,
        Self::SinusoidalEaseIn,
        Self::SinusoidalEaseOut,
        Self::SinusoidalEaseInOut,
        Self::LongTail,
        Self::LongToe,
    ];

    /// Evaluates the curve at `t`, which is clamped to `[0, 1]` first.
    pub fn evaluate(self, t: f32) -> f32 {
        let t = clamp01(t);
        let value = match self {
            Self::Linear => t,
            Self::UniformS => t * t * (3.0 - 2.0 * t),
            Self::EaseIn => ease_in(t),
            Self::EaseOut => 1.0 - ease_in(1.0 - t),
            Self::QuadraticEaseIn => t * t,
            Self::QuadraticEaseOut => 1.0 - (t - 1.0) * (t - 1.0),
            Self::QuadraticEaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - 2.0 * (t - 1.0) * (t - 1.0)
                }
            }
            Self::CubicEaseIn => t * t * t,
            Self::CubicEaseOut => {
                let u = t - 1.0;
                u * u * u + 1.0
            }
            Self::CubicEaseInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let u = t - 1.0;
                    1.0 + 4.0 * u * u * u
                }
            }
            Self::SinusoidalEaseIn => 1.0 - (t * FRAC_PI_2).cos(),
            Self::SinusoidalEaseOut => (t * FRAC_PI_2).sin(),
            Self::SinusoidalEaseInOut => 0.5 * (1.0 - (t * PI).cos()),
            Self::LongTail => 1.0 / (1.0 + (-(t.powf(0.65) * 1.1 - 0.5) * 10.0).exp()),
            Self::LongToe => {
                let c = (t * t * t * FRAC_PI_2).cos();
                1.0 - c * c
            }
        };
        clamp01(value)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::UniformS => "uniform-s",
            Self::EaseIn => "ease-in",
            Self::EaseOut => "ease-out",
            Self::QuadraticEaseIn => "quadratic-ease-in",
            Self::QuadraticEaseOut => "quadratic-ease-out",
            Self::QuadraticEaseInOut => "quadratic-ease-in-out",
            Self::CubicEaseIn => "cubic-ease-in",
            Self::CubicEaseOut => "cubic-ease-out",
            Self::CubicEaseInOut => "cubic-ease-in-out",
            Self::SinusoidalEaseIn => "sinusoidal-ease-in",
            Self::SinusoidalEaseOut => "sinusoidal-ease-out",
            Self::SinusoidalEaseInOut => "sinusoidal-ease-in-out",
            Self::LongTail => "long-tail",
            Self::LongToe => "long-toe",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

fn ease_in(t: f32) -> f32 {
    t * t * t * (2.5 - 1.5 * t * t)
}

pub(crate) fn clamp01(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}
