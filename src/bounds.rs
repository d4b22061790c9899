use crate::error::PetError;
use bevy::prelude::*;

/// Usable screen rectangle in physical pixels. `right`/`bottom` are exclusive.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MonitorBounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl MonitorBounds {
    /// Last resort when no source answers.
    pub const FALLBACK: MonitorBounds = MonitorBounds {
        left: 0,
        top: 0,
        right: 1920,
        bottom: 1080,
    };

    pub fn from_origin_size(origin: IVec2, size: UVec2) -> Self {
        Self {
            left: origin.x,
            top: origin.y,
            right: origin.x + size.x as i32,
            bottom: origin.y + size.y as i32,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub fn union(self, other: MonitorBounds) -> MonitorBounds {
        MonitorBounds {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }
}

/// One way of answering "where may the pet go".
pub trait BoundsSource {
    fn name(&self) -> &'static str;
    fn query(&self) -> Result<MonitorBounds, PetError>;
}

/// A source whose answer was computed up front (e.g. from winit monitors).
pub struct KnownBounds {
    pub name: &'static str,
    pub bounds: Option<MonitorBounds>,
}

impl BoundsSource for KnownBounds {
    fn name(&self) -> &'static str {
        self.name
    }

    fn query(&self) -> Result<MonitorBounds, PetError> {
        self.bounds
            .ok_or_else(|| PetError::platform(self.name, "no monitor reported"))
    }
}

/// Asks each source in order and takes the first usable rectangle.
pub fn resolve_work_area(sources: &[&dyn BoundsSource]) -> MonitorBounds {
    for source in sources {
        match source.query() {
            Ok(bounds) if !bounds.is_empty() => {
                debug!("Work area from {}", source.name());
                return bounds;
            }
            Ok(bounds) => debug!("{} reported an empty area {bounds:?}", source.name()),
            Err(err) => debug!("{err}"),
        }
    }
    warn!("No work area source answered; assuming {:?}", MonitorBounds::FALLBACK);
    MonitorBounds::FALLBACK
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl BoundsSource for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn query(&self) -> Result<MonitorBounds, PetError> {
            Err(PetError::platform("failing", "denied"))
        }
    }

    #[test]
    fn first_successful_source_wins() {
        let work_area = KnownBounds {
            name: "work area",
            bounds: Some(MonitorBounds { left: 0, top: 0, right: 1920, bottom: 1040 }),
        };
        let monitor = KnownBounds {
            name: "monitor",
            bounds: Some(MonitorBounds { left: 0, top: 0, right: 1920, bottom: 1080 }),
        };
        let resolved = resolve_work_area(&[&Failing, &work_area, &monitor]);
        assert_eq!(resolved.bottom, 1040);
    }

    #[test]
    fn empty_rectangles_are_skipped() {
        let empty = KnownBounds {
            name: "empty",
            bounds: Some(MonitorBounds { left: 10, top: 10, right: 10, bottom: 500 }),
        };
        let virtual_screen = KnownBounds {
            name: "virtual",
            bounds: Some(MonitorBounds { left: -1280, top: 0, right: 1920, bottom: 1080 }),
        };
        assert_eq!(resolve_work_area(&[&empty, &virtual_screen]).left, -1280);
    }

    #[test]
    fn nothing_answers_gives_fallback() {
        let missing = KnownBounds { name: "monitor", bounds: None };
        assert_eq!(resolve_work_area(&[&Failing, &missing]), MonitorBounds::FALLBACK);
    }

    #[test]
    fn union_spans_both_monitors() {
        let left = MonitorBounds::from_origin_size(IVec2::new(-1280, 0), UVec2::new(1280, 1024));
        let right = MonitorBounds::from_origin_size(IVec2::ZERO, UVec2::new(1920, 1080));
        let all = left.union(right);
        assert_eq!(all, MonitorBounds { left: -1280, top: 0, right: 1920, bottom: 1080 });
        assert_eq!(all.width(), 3200);
    }
}
