/// Fixed-timestep accumulator with at most one step per frame.
///
/// Frame time is clamped to `max_frame_delta` before it is accumulated, so one
/// long frame cannot trigger a burst of simulation. When the accumulator holds
/// at least one step, exactly one step is taken and subtracted; any surplus
/// carries over to following frames.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedTimestep {
    step: f32,
    max_frame_delta: f32,
    accumulator: f32,
}

impl FixedTimestep {
    /// Step used when the configured one is not a positive number.
    pub const DEFAULT_STEP: f32 = 1.0 / 60.0;

    pub fn new(step: f32, max_frame_delta: f32) -> Self {
        let step = if step > 0.0 && step.is_finite() {
            step
        } else {
            log::warn!("Invalid fixed step {step}, using {}", Self::DEFAULT_STEP);
            Self::DEFAULT_STEP
        };
        Self {
            step,
            max_frame_delta,
            accumulator: 0.0,
        }
    }

    /// Accumulates `dt`; returns `true` if a step should run this frame.
    pub fn advance(&mut self, dt: f32) -> bool {
        self.accumulator += dt.clamp(0.0, self.max_frame_delta);
        if self.accumulator >= self.step {
            self.accumulator -= self.step;
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn step(&self) -> f32 {
        self.step
    }

    #[inline]
    pub fn accumulator(&self) -> f32 {
        self.accumulator
    }

    /// Fraction of a step carried in the accumulator, for interpolation.
    pub fn alpha(&self) -> f32 {
        (self.accumulator / self.step).min(1.0)
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}
