//! The pet itself: position, velocity, mood and what is on screen.
//!
//! `PetController` never touches the window. Every visible effect is queued
//! as a `WindowCommand` and applied by the window system on the main loop,
//! which keeps this module free of platform state and lets it run headless.

use crate::animation::{target_state, AnimState, AnimationStateMachine};
use crate::bounds::MonitorBounds;
use crate::config::PetConfig;
use crate::sprites::{Breed, ImageLoader, SpriteCache};
use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt;
use std::time::Duration;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Mood {
    Idle,
    Happy,
    Sleep,
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mood::Idle => "idle",
            Mood::Happy => "happy",
            Mood::Sleep => "sleep",
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Behavior {
    Idle,
    MoveLeft,
    MoveRight,
    MoveUp,
    MoveDown,
    Wander,
}

impl Behavior {
    pub const ALL: [Behavior; 6] = [
        Behavior::Idle,
        Behavior::MoveLeft,
        Behavior::MoveRight,
        Behavior::MoveUp,
        Behavior::MoveDown,
        Behavior::Wander,
    ];

    fn velocity(self, rng: &mut StdRng) -> IVec2 {
        match self {
            Behavior::Idle => IVec2::ZERO,
            Behavior::MoveLeft => IVec2::new(-1, 0),
            Behavior::MoveRight => IVec2::new(1, 0),
            Behavior::MoveUp => IVec2::new(0, -1),
            Behavior::MoveDown => IVec2::new(0, 1),
            Behavior::Wander => IVec2::new(rng.gen_range(-1..=1), rng.gen_range(-1..=1)),
        }
    }
}

/// A side effect for the overlay window.
#[derive(Clone, Debug, PartialEq)]
pub enum WindowCommand {
    MoveTo(IVec2),
    ShowImage(Handle<Image>),
    RefreshBounds,
}

pub struct PetController {
    config: PetConfig,
    position: IVec2,
    velocity: IVec2,
    mood: Mood,
    behavior: Behavior,
    last_interaction: Duration,
    bounds: Option<MonitorBounds>,

    anim: AnimationStateMachine,
    breed: Breed,
    sprites: SpriteCache,
    displayed: Option<Handle<Image>>,

    rng: StdRng,
    pending: Vec<WindowCommand>,
}

impl PetController {
    pub fn new(config: PetConfig, breed: Breed, rng: StdRng) -> Self {
        let (x, y) = config.start_position;
        let throttle = config.walk_frame_throttle;
        Self {
            config,
            position: IVec2::new(x, y),
            velocity: IVec2::ZERO,
            mood: Mood::Idle,
            behavior: Behavior::Idle,
            last_interaction: Duration::ZERO,
            bounds: None,
            anim: AnimationStateMachine::new(throttle),
            breed,
            sprites: SpriteCache::default(),
            displayed: None,
            rng,
            pending: vec![WindowCommand::RefreshBounds],
        }
    }

    pub fn config(&self) -> &PetConfig {
        &self.config
    }

    pub fn position(&self) -> IVec2 {
        self.position
    }

    pub fn breed(&self) -> Breed {
        self.breed
    }

    pub fn displayed(&self) -> Option<&Handle<Image>> {
        self.displayed.as_ref()
    }

    /// Hands the queued window side effects to the caller.
    pub fn take_commands(&mut self) -> Vec<WindowCommand> {
        std::mem::take(&mut self.pending)
    }

    pub fn request_bounds_refresh(&mut self) {
        if !self.pending.contains(&WindowCommand::RefreshBounds) {
            self.pending.push(WindowCommand::RefreshBounds);
        }
    }

    pub fn set_bounds(&mut self, bounds: MonitorBounds) {
        if self.bounds != Some(bounds) {
            info!(
                "Work area {}x{} at ({}, {})",
                bounds.width(),
                bounds.height(),
                bounds.left,
                bounds.top
            );
        }
        self.bounds = Some(bounds);
    }

    /// Loads the current breed's sprites and shows the right one.
    pub fn load_sprites(&mut self, loader: &mut dyn ImageLoader) {
        let size = self.config.sprite_size as u32;
        let frames = self
            .sprites
            .load(
                self.breed,
                &self.config.sprite_dir,
                &self.config.mood_sprite_dir,
                size,
                loader,
            )
            .walk_frame_count();
        self.anim.set_walk_frame_count(frames);
        self.refresh_sprite(true);
    }

    /// Switches to another breed: the old breed's images are released before
    /// the new ones load. Returns false when `breed` is already active.
    pub fn change_variant(&mut self, breed: Breed, loader: &mut dyn ImageLoader) -> bool {
        if breed == self.breed && self.sprites.contains(breed) {
            return false;
        }
        let previous = self.breed;
        self.displayed = None;
        self.sprites.evict(previous);
        self.breed = breed;
        self.load_sprites(loader);
        info!("Breed changed from {previous} to {breed}");
        true
    }

    pub fn on_left_click(&mut self, now: Duration) {
        info!("Pet is happy");
        self.mood = Mood::Happy;
        self.last_interaction = now;
        self.refresh_sprite(true);
    }

    /// Drops back to idle unless something else changed the mood meanwhile.
    pub fn revert_happy(&mut self) {
        if self.mood == Mood::Happy {
            self.mood = Mood::Idle;
            self.refresh_sprite(true);
        }
    }

    /// Follows the pointer (screen coordinates) keeping it centered on the
    /// sprite. Mood and velocity stay as they are.
    pub fn on_drag(&mut self, pointer: IVec2, now: Duration) {
        self.last_interaction = now;
        let target = pointer - IVec2::splat(self.config.sprite_size / 2);
        self.move_to(target);
    }

    fn move_to(&mut self, target: IVec2) {
        if target != self.position {
            self.position = target;
            self.pending.push(WindowCommand::MoveTo(target));
        }
    }

    pub fn position_tick(&mut self) {
        if self.mood == Mood::Sleep {
            // A walk frame may still be on screen.
            self.refresh_sprite(true);
            return;
        }
        if let Some(bounds) = self.bounds {
            let (next, velocity) = step_within(
                self.position,
                self.velocity,
                bounds,
                self.config.sprite_size,
                self.config.zone_height,
                self.config.bottom_margin,
            );
            self.velocity = velocity;
            self.move_to(next);
        }
        self.show_sprite(false, true);
    }

    pub fn mood_tick(&mut self, now: Duration) {
        let idle_for = now.saturating_sub(self.last_interaction);
        if idle_for > self.config.sleep_after() && self.mood != Mood::Sleep {
            self.mood = Mood::Sleep;
            self.velocity = IVec2::ZERO;
            self.behavior = Behavior::Idle;
            info!("Pet fell asleep after {}s alone", idle_for.as_secs());
            self.refresh_sprite(true);
        } else if idle_for < self.config.wake_within() && self.mood == Mood::Sleep {
            self.mood = Mood::Idle;
            info!("Pet woke up");
            self.refresh_sprite(true);
        }
    }

    /// Picks a new behavior (unless asleep) and returns how long to wait
    /// before picking again.
    pub fn behavior_tick(&mut self) -> Duration {
        if self.mood != Mood::Sleep {
            let behavior = *Behavior::ALL
                .choose(&mut self.rng)
                .unwrap_or(&Behavior::Idle);
            self.behavior = behavior;
            self.velocity = behavior.velocity(&mut self.rng);
            debug!("Behavior {:?}, velocity {}", self.behavior, self.velocity);
        }
        let min = self.config.behavior_min_ms;
        let max = self.config.behavior_max_ms.max(min);
        Duration::from_millis(self.rng.gen_range(min..=max))
    }

    /// Shows the image for the current mood/motion. The window only gets a new
    /// image when it differs from what is shown, or when `force` is set.
    /// The walk cycle stays on its current frame.
    pub fn refresh_sprite(&mut self, force: bool) {
        self.show_sprite(force, false);
    }

    // Only the position tick steps the walk cycle.
    fn show_sprite(&mut self, force: bool, advance: bool) {
        let Some(set) = self.sprites.get(self.breed) else {
            return;
        };
        let state = target_state(self.mood, self.velocity, set.walk_frame_count() > 0);
        self.anim.transition_to(state);
        let image = match state {
            AnimState::Walking => {
                let index = if advance {
                    self.anim.next_frame()
                } else {
                    self.anim.walk_frame_index()
                };
                set.walk_frame(index).unwrap_or_else(|| set.still(self.mood))
            }
            AnimState::Idle | AnimState::Sleeping => set.still(self.mood),
        };
        if force || self.displayed.as_ref() != Some(image) {
            let image = image.clone();
            self.displayed = Some(image.clone());
            self.pending.push(WindowCommand::ShowImage(image));
        }
    }
}

#[cfg(test)]
impl PetController {
    pub fn velocity(&self) -> IVec2 {
        self.velocity
    }

    pub fn mood(&self) -> Mood {
        self.mood
    }

    pub fn behavior(&self) -> Behavior {
        self.behavior
    }

    pub fn animation(&self) -> &AnimationStateMachine {
        &self.anim
    }

    pub fn sprite_cache(&self) -> &SpriteCache {
        &self.sprites
    }

    fn set_velocity(&mut self, velocity: IVec2) {
        self.velocity = velocity;
    }

    fn set_position(&mut self, position: IVec2) {
        self.position = position;
    }
}

/// One movement step inside the roaming band. Horizontally the pet bounces
/// off the work area edges; vertically it stops at the band edges.
pub fn step_within(
    position: IVec2,
    velocity: IVec2,
    bounds: MonitorBounds,
    size: i32,
    zone_height: i32,
    margin: i32,
) -> (IVec2, IVec2) {
    let mut next = position + velocity;
    let mut velocity = velocity;

    let min_x = bounds.left;
    let max_x = (bounds.right - size).max(min_x);
    if next.x <= min_x || next.x >= max_x {
        velocity.x = -velocity.x;
        next.x = next.x.clamp(min_x, max_x);
    }

    let floor = bounds.bottom - size - margin;
    let ceiling = (bounds.bottom - zone_height).min(floor);
    if next.y < ceiling {
        next.y = ceiling;
        velocity.y = 0;
    } else if next.y > floor {
        next.y = floor;
        velocity.y = 0;
    }

    (next, velocity)
}
