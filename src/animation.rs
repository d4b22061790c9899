use crate::pet::Mood;
use bevy::log::debug;
use bevy::math::IVec2;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AnimState {
    Idle,
    Walking,
    Sleeping,
}

/// Which animation the pet should show for its mood and velocity.
/// Walking needs motion, walk frames to show, and an awake pet.
pub fn target_state(mood: Mood, velocity: IVec2, has_walk_frames: bool) -> AnimState {
    if mood == Mood::Sleep {
        AnimState::Sleeping
    } else if velocity != IVec2::ZERO && has_walk_frames {
        AnimState::Walking
    } else {
        AnimState::Idle
    }
}

/// Tracks the current animation and steps the walk cycle at a throttled rate:
/// one frame every `throttle` calls to `next_frame`.
#[derive(Debug)]
pub struct AnimationStateMachine {
    current: AnimState,
    walk_frame_index: usize,
    frame_counter: u32,
    walk_frame_count: usize,
    throttle: u32,
}

impl AnimationStateMachine {
    pub fn new(throttle: u32) -> Self {
        Self {
            current: AnimState::Idle,
            walk_frame_index: 0,
            frame_counter: 0,
            walk_frame_count: 0,
            throttle: throttle.max(1),
        }
    }

    /// Leaving Walking (or being anywhere but Walking) pins the cycle to its
    /// first frame. Re-entering the current state keeps the frame index.
    pub fn transition_to(&mut self, target: AnimState) {
        if target != self.current {
            debug!("Animation {:?} -> {target:?}", self.current);
        }
        if target != AnimState::Walking {
            self.walk_frame_index = 0;
            self.frame_counter = 0;
        }
        self.current = target;
    }

    pub fn walk_frame_index(&self) -> usize {
        self.walk_frame_index
    }

    /// Records how many walk frames the active sprite set has. The cycle
    /// restarts since the old index may be out of range.
    pub fn set_walk_frame_count(&mut self, count: usize) {
        self.walk_frame_count = count;
        self.walk_frame_index = 0;
        self.frame_counter = 0;
    }

    pub fn next_frame(&mut self) -> usize {
        self.frame_counter += 1;
        if self.frame_counter >= self.throttle {
            // Zero frames is treated as one so the modulo is always defined.
            self.walk_frame_index = (self.walk_frame_index + 1) % self.walk_frame_count.max(1);
            self.frame_counter = 0;
        }
        self.walk_frame_index
    }
}

#[cfg(test)]
impl AnimationStateMachine {
    pub fn current(&self) -> AnimState {
        self.current
    }

    pub fn walk_frame_count(&self) -> usize {
        self.walk_frame_count
    }
}
