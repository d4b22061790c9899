//! Keeps the overlay at desktop level: below application windows, above the
//! wallpaper.
//!
//! Placement starts unconfirmed and is retried with a fixed backoff until a
//! verification succeeds. Only then does periodic re-verification take over,
//! so the checker never fights a placement that has not landed yet.

use crate::error::PetError;
use bevy::prelude::*;

/// Platform operations on the overlay window's stacking order.
pub trait DesktopLayer {
    fn send_to_back(&mut self) -> Result<(), PetError>;
    /// Visible and not covering normal windows.
    fn is_at_back(&self) -> Result<bool, PetError>;
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PlacementCommand {
    SendToBack,
    Verify,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PlacementPhase {
    Pending { attempts: u32 },
    Confirmed,
}

#[derive(Debug)]
pub struct DesktopPlacement {
    phase: PlacementPhase,
    last_check: Option<bool>,
    pending: Vec<PlacementCommand>,
}

impl Default for DesktopPlacement {
    fn default() -> Self {
        Self {
            phase: PlacementPhase::Pending { attempts: 0 },
            last_check: None,
            pending: Vec::new(),
        }
    }
}

impl DesktopPlacement {
    #[cfg(test)]
    pub fn phase(&self) -> PlacementPhase {
        self.phase
    }

    pub fn take_commands(&mut self) -> Vec<PlacementCommand> {
        std::mem::take(&mut self.pending)
    }

    /// One step of the initial placement loop. Returns true once a
    /// verification has confirmed the window sits at desktop level.
    pub fn retry_step(&mut self) -> bool {
        match self.phase {
            PlacementPhase::Confirmed => true,
            PlacementPhase::Pending { attempts } => {
                if self.last_check == Some(true) {
                    info!("Desktop-level placement confirmed after {attempts} attempt(s)");
                    self.phase = PlacementPhase::Confirmed;
                    return true;
                }
                if attempts > 0 && attempts % 20 == 0 {
                    warn!("Desktop-level placement still unconfirmed after {attempts} attempts");
                }
                self.phase = PlacementPhase::Pending {
                    attempts: attempts + 1,
                };
                self.pending
                    .extend([PlacementCommand::SendToBack, PlacementCommand::Verify]);
                false
            }
        }
    }

    /// Periodic check once placement is confirmed: re-place if the last
    /// verification failed, then verify again for the next round.
    pub fn check_step(&mut self) {
        if self.last_check == Some(false) {
            info!("Overlay left desktop level; placing it again");
            self.pending.push(PlacementCommand::SendToBack);
        }
        self.pending.push(PlacementCommand::Verify);
    }

    /// Runs queued commands against the platform and records the outcome.
    pub fn execute(&mut self, layer: &mut dyn DesktopLayer) {
        for command in self.take_commands() {
            match command {
                PlacementCommand::SendToBack => {
                    if let Err(err) = layer.send_to_back() {
                        warn!("{err}");
                        self.last_check = Some(false);
                    }
                }
                PlacementCommand::Verify => {
                    self.last_check = match layer.is_at_back() {
                        Ok(placed) => Some(placed),
                        Err(err) => {
                            warn!("{err}");
                            Some(false)
                        }
                    };
                }
            }
        }
    }
}
