use catalog_schema_engine::HeaderId;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Columns flashing after one of their references was activated.
///
/// Each flash expires on its own after `duration`. Expiry is evaluated
/// against the caller's clock so renderers and tests can share one notion
/// of "now".
#[derive(Clone, Debug)]
pub struct Highlights {
    duration: Duration,
    flashes: HashMap<HeaderId, Instant>,
}

impl Highlights {
    pub fn new(duration: Duration) -> Self {
        Highlights {
            duration,
            flashes: HashMap::new(),
        }
    }

    /// Start (or restart) the flash of a column.
    pub fn flash(&mut self, id: HeaderId, now: Instant) {
        self.flashes.insert(id, now);
    }

    /// Columns still flashing at `now`, sorted by id.
    pub fn active(&self, now: Instant) -> Vec<HeaderId> {
        let mut active: Vec<HeaderId> = self
            .flashes
            .iter()
            .filter(|(_, started)| now.saturating_duration_since(**started) < self.duration)
            .map(|(id, _)| id.clone())
            .collect();
        active.sort();
        active
    }

    /// Forget expired flashes.
    pub fn prune(&mut self, now: Instant) {
        let duration = self.duration;
        self.flashes
            .retain(|_, started| now.saturating_duration_since(*started) < duration);
    }

    pub fn clear(&mut self) {
        self.flashes.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.flashes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flash_expires_after_duration() {
        let start = Instant::now();
        let mut highlights = Highlights::new(Duration::from_millis(1000));
        highlights.flash(HeaderId::new("base-4"), start);

        assert_eq!(highlights.active(start), vec![HeaderId::new("base-4")]);
        assert_eq!(
            highlights.active(start + Duration::from_millis(999)),
            vec![HeaderId::new("base-4")]
        );
        assert!(highlights.active(start + Duration::from_millis(1000)).is_empty());
    }

    #[test]
    fn test_reflash_restarts_timer() {
        let start = Instant::now();
        let mut highlights = Highlights::new(Duration::from_millis(1000));
        let id = HeaderId::new("base-2");
        highlights.flash(id.clone(), start);
        highlights.flash(id.clone(), start + Duration::from_millis(800));

        assert_eq!(highlights.active(start + Duration::from_millis(1500)), vec![id]);
        highlights.prune(start + Duration::from_millis(2000));
        assert!(highlights.is_empty());
    }
}
