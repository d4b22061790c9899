//! The periodic work of the pet, registered on one `TimerCoordinator`.

use crate::config::PetConfig;
use crate::desktop::DesktopPlacement;
use crate::pet::PetController;
use crate::prefs::{PreferenceStore, Preferences};
use crate::scheduler::{TaskResult, TimerCoordinator};
use crate::sprites::{Breed, ImageLoader};
use bevy::prelude::*;
use std::time::Duration;

const POSITION: &str = "position";
const MOOD: &str = "mood";
const BEHAVIOR: &str = "behavior";
const HAPPY_REVERT: &str = "happy_revert";
const DESKTOP_INIT: &str = "desktop_init";
const DESKTOP_CHECK: &str = "desktop_check";
const BOUNDS_REFRESH: &str = "bounds_refresh";

/// Everything the timed tasks operate on.
#[derive(Resource)]
pub struct PetRuntime {
    pub controller: PetController,
    pub desktop: DesktopPlacement,
    clicks: u64,
}

impl PetRuntime {
    pub fn new(controller: PetController) -> Self {
        Self {
            controller,
            desktop: DesktopPlacement::default(),
            clicks: 0,
        }
    }
}

pub type PetTimers = TimerCoordinator<PetRuntime>;

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

pub fn register_tasks(timers: &mut PetTimers, config: &PetConfig) {
    timers.add_task(POSITION, ms(config.position_interval_ms), position_task);
    timers.add_task(MOOD, ms(config.mood_interval_ms), mood_task);
    timers.add_task(BEHAVIOR, ms(config.behavior_min_ms), behavior_task);
    timers.add_task(DESKTOP_INIT, ms(config.placement_retry_ms), desktop_init_task);
    timers.add_task(BOUNDS_REFRESH, ms(config.bounds_refresh_ms), bounds_refresh_task);
}

fn position_task(rt: &mut PetRuntime, _: &mut PetTimers, _: Duration) -> TaskResult {
    rt.controller.position_tick();
    Ok(())
}

fn mood_task(rt: &mut PetRuntime, _: &mut PetTimers, now: Duration) -> TaskResult {
    rt.controller.mood_tick(now);
    Ok(())
}

/// Re-registers itself with a fresh random interval each run.
fn behavior_task(rt: &mut PetRuntime, timers: &mut PetTimers, _: Duration) -> TaskResult {
    let next = rt.controller.behavior_tick();
    timers.add_task(BEHAVIOR, next, behavior_task);
    Ok(())
}

fn desktop_init_task(rt: &mut PetRuntime, timers: &mut PetTimers, _: Duration) -> TaskResult {
    if rt.desktop.retry_step() {
        timers.remove_task(DESKTOP_INIT);
        let period = ms(rt.controller.config().placement_check_ms);
        timers.add_task(DESKTOP_CHECK, period, desktop_check_task);
    }
    Ok(())
}

fn desktop_check_task(rt: &mut PetRuntime, _: &mut PetTimers, _: Duration) -> TaskResult {
    rt.desktop.check_step();
    Ok(())
}

fn bounds_refresh_task(rt: &mut PetRuntime, _: &mut PetTimers, _: Duration) -> TaskResult {
    rt.controller.request_bounds_refresh();
    Ok(())
}

/// Automatic movement pauses while the pet is held so it does not fight the
/// drag.
pub fn set_held(timers: &mut PetTimers, held: bool) {
    timers.set_enabled(POSITION, !held);
}

/// A click makes the pet happy. Each click gets its own revert, so a
/// later click never delays the one scheduled by an earlier click.
pub fn left_click(rt: &mut PetRuntime, timers: &mut PetTimers, now: Duration) {
    rt.controller.on_left_click(now);
    rt.clicks += 1;
    let delay = rt.controller.config().happy_revert();
    let name = format!("{HAPPY_REVERT}_{}", rt.clicks);
    timers.add_oneshot(name, delay, |rt: &mut PetRuntime, _: &mut PetTimers, _| {
        rt.controller.revert_happy();
        Ok(())
    });
}

/// Screen position of a window-relative cursor. The window system's origin
/// wins over the model position, which lags behind a pending move.
pub fn drag_pointer(window_origin: Option<IVec2>, model: IVec2, cursor: Vec2) -> IVec2 {
    window_origin.unwrap_or(model) + cursor.as_ivec2()
}

/// Switches breed and remembers the choice. Nothing is written when the
/// breed was already active.
pub fn choose_breed(
    controller: &mut PetController,
    store: &PreferenceStore,
    breed: Breed,
    loader: &mut dyn ImageLoader,
) -> bool {
    if !controller.change_variant(breed, loader) {
        return false;
    }
    if let Err(err) = store.save(&Preferences { breed }) {
        warn!("Could not save breed choice: {err}");
    }
    true
}
