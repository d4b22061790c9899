//! Single cooperative scheduler for every periodic callback of the pet.
//!
//! All tasks run from one tick on the main loop, so no two callbacks ever
//! touch window/position state at the same time. Tasks are keyed by name;
//! adding a name that already exists replaces the task, which is how
//! variable-interval work reschedules itself.

use crate::error::PetError;
use bevy::prelude::*;
use std::collections::BTreeMap;
use std::time::Duration;

pub type TaskResult = Result<(), PetError>;

/// Callback signature: the shared context, the coordinator itself (so a task
/// can add/replace/remove tasks, including itself) and the tick time.
pub type TaskFn<C> =
    Box<dyn FnMut(&mut C, &mut TimerCoordinator<C>, Duration) -> TaskResult + Send + Sync>;

struct TimedTask<C> {
    // `None` only while the callback is executing.
    callback: Option<TaskFn<C>>,
    interval: Duration,
    last_run: Option<Duration>,
    enabled: bool,
    repeat: bool,
    generation: u64,
}

impl<C> TimedTask<C> {
    fn is_due(&self, now: Duration) -> bool {
        self.enabled
            && match self.last_run {
                None => true,
                Some(last) => now.saturating_sub(last) >= self.interval,
            }
    }
}

#[derive(Resource)]
pub struct TimerCoordinator<C> {
    tasks: BTreeMap<String, TimedTask<C>>,
    tick_interval: Duration,
    running: bool,
    clock: Option<Duration>,
    next_generation: u64,
}

impl<C> TimerCoordinator<C> {
    pub fn new(tick_interval: Duration) -> Self {
        Self {
            tasks: BTreeMap::new(),
            tick_interval,
            running: false,
            clock: None,
            next_generation: 0,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Registers a repeating task, replacing any task with the same name.
    /// A task added before the first tick runs on that tick; otherwise its
    /// first run is one interval after the most recent tick.
    pub fn add_task<F>(&mut self, name: impl Into<String>, interval: Duration, callback: F)
    where
        F: FnMut(&mut C, &mut TimerCoordinator<C>, Duration) -> TaskResult + Send + Sync + 'static,
    {
        let last_run = self.clock;
        self.insert(name.into(), interval, last_run, true, Box::new(callback));
    }

    /// Registers a task that runs once, `delay` after the most recent tick,
    /// and is then dropped. Replaces any task with the same name.
    pub fn add_oneshot<F>(&mut self, name: impl Into<String>, delay: Duration, callback: F)
    where
        F: FnMut(&mut C, &mut TimerCoordinator<C>, Duration) -> TaskResult + Send + Sync + 'static,
    {
        let last_run = Some(self.clock.unwrap_or_default());
        self.insert(name.into(), delay, last_run, false, Box::new(callback));
    }

    fn insert(
        &mut self,
        name: String,
        interval: Duration,
        last_run: Option<Duration>,
        repeat: bool,
        callback: TaskFn<C>,
    ) {
        self.next_generation += 1;
        let task = TimedTask {
            callback: Some(callback),
            interval,
            last_run,
            enabled: true,
            repeat,
            generation: self.next_generation,
        };
        if self.tasks.insert(name.clone(), task).is_some() {
            debug!("Replaced timed task `{name}` ({interval:?})");
        }
    }

    pub fn remove_task(&mut self, name: &str) -> bool {
        self.tasks.remove(name).is_some()
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.tasks.get_mut(name) {
            Some(task) => {
                task.enabled = enabled;
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    #[cfg(test)]
    pub fn interval_of(&self, name: &str) -> Option<Duration> {
        self.tasks.get(name).map(|t| t.interval)
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Runs every enabled, due task once, in name order. A failing task is
    /// logged and stays scheduled; the remaining tasks of the tick still run.
    pub fn tick(&mut self, now: Duration, ctx: &mut C) {
        if !self.running {
            return;
        }
        self.clock = Some(now);

        let due: Vec<(String, u64)> = self
            .tasks
            .iter()
            .filter(|(_, task)| task.is_due(now))
            .map(|(name, task)| (name.clone(), task.generation))
            .collect();

        for (name, generation) in due {
            // An earlier callback this tick may have removed or replaced it.
            let Some(task) = self.tasks.get_mut(&name) else {
                continue;
            };
            if task.generation != generation || !task.enabled {
                continue;
            }
            task.last_run = Some(now);
            let repeat = task.repeat;
            let Some(mut callback) = task.callback.take() else {
                continue;
            };

            if let Err(err) = callback(ctx, self, now) {
                let failure = PetError::TimedTaskFailure {
                    task: name.clone(),
                    reason: err.to_string(),
                };
                warn!("{failure}");
            }

            if let Some(task) = self.tasks.get_mut(&name) {
                if task.generation == generation {
                    if repeat {
                        task.callback = Some(callback);
                    } else {
                        self.tasks.remove(&name);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Log {
        runs: Vec<&'static str>,
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn running() -> TimerCoordinator<Log> {
        let mut timers = TimerCoordinator::new(ms(50));
        timers.start();
        timers
    }

    #[test]
    fn runs_tasks_only_when_interval_elapsed() {
        let mut timers = running();
        let mut log = Log::default();
        timers.add_task("fast", ms(50), |log: &mut Log, _, _| {
            log.runs.push("fast");
            Ok(())
        });
        timers.add_task("slow", ms(150), |log: &mut Log, _, _| {
            log.runs.push("slow");
            Ok(())
        });

        for step in 0..4 {
            timers.tick(ms(step * 50), &mut log);
        }
        // Both run on the first tick, then slow again at 150.
        assert_eq!(
            log.runs,
            vec!["fast", "slow", "fast", "fast", "fast", "slow"]
        );
    }

    #[test]
    fn failing_task_stays_scheduled_and_others_still_run() {
        let mut timers = running();
        let mut log = Log::default();
        timers.add_task("a_broken", ms(50), |log: &mut Log, _, now| {
            log.runs.push("broken");
            if now == ms(50) {
                Err(PetError::WindowGone)
            } else {
                Ok(())
            }
        });
        timers.add_task("b_healthy", ms(50), |log: &mut Log, _, _| {
            log.runs.push("healthy");
            Ok(())
        });

        timers.tick(ms(0), &mut log);
        timers.tick(ms(50), &mut log);
        timers.tick(ms(100), &mut log);
        assert_eq!(
            log.runs,
            vec!["broken", "healthy", "broken", "healthy", "broken", "healthy"]
        );
        assert!(timers.contains("a_broken"));
    }

    #[test]
    fn stopped_coordinator_does_nothing() {
        let mut timers: TimerCoordinator<Log> = TimerCoordinator::new(ms(50));
        let mut log = Log::default();
        timers.add_task("t", ms(50), |log: &mut Log, _, _| {
            log.runs.push("t");
            Ok(())
        });
        timers.tick(ms(0), &mut log);
        assert!(log.runs.is_empty());

        timers.start();
        timers.tick(ms(50), &mut log);
        timers.stop();
        timers.tick(ms(100), &mut log);
        assert_eq!(log.runs, vec!["t"]);
    }

    #[test]
    fn oneshot_fires_once_after_delay() {
        let mut timers = running();
        let mut log = Log::default();
        timers.tick(ms(0), &mut log);
        timers.add_oneshot("once", ms(100), |log: &mut Log, _, _| {
            log.runs.push("once");
            Ok(())
        });

        timers.tick(ms(50), &mut log);
        assert!(log.runs.is_empty());
        timers.tick(ms(100), &mut log);
        timers.tick(ms(200), &mut log);
        assert_eq!(log.runs, vec!["once"]);
        assert!(!timers.contains("once"));
    }

    #[test]
    fn re_adding_replaces_and_reschedules() {
        let mut timers = running();
        let mut log = Log::default();

        fn hop(log: &mut Log, timers: &mut TimerCoordinator<Log>, _: Duration) -> TaskResult {
            log.runs.push("hop");
            timers.add_task("hop", Duration::from_millis(200), hop);
            Ok(())
        }
        timers.add_task("hop", ms(50), hop);

        timers.tick(ms(0), &mut log);
        assert_eq!(timers.interval_of("hop"), Some(ms(200)));
        timers.tick(ms(50), &mut log);
        timers.tick(ms(150), &mut log);
        timers.tick(ms(200), &mut log);
        assert_eq!(log.runs, vec!["hop", "hop"]);
    }

    #[test]
    fn task_removed_by_earlier_task_does_not_run() {
        let mut timers = running();
        let mut log = Log::default();
        timers.add_task("a", ms(50), |log: &mut Log, timers: &mut TimerCoordinator<Log>, _| {
            log.runs.push("a");
            timers.remove_task("b");
            Ok(())
        });
        timers.add_task("b", ms(50), |log: &mut Log, _, _| {
            log.runs.push("b");
            Ok(())
        });
        timers.tick(ms(0), &mut log);
        assert_eq!(log.runs, vec!["a"]);
    }

    #[test]
    fn disabled_task_is_skipped() {
        let mut timers = running();
        let mut log = Log::default();
        timers.add_task("t", ms(50), |log: &mut Log, _, _| {
            log.runs.push("t");
            Ok(())
        });
        assert!(timers.set_enabled("t", false));
        timers.tick(ms(0), &mut log);
        assert!(log.runs.is_empty());
        timers.set_enabled("t", true);
        timers.tick(ms(50), &mut log);
        assert_eq!(log.runs, vec!["t"]);
    }
}
