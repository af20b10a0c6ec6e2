/// Scroll geometry reported by the host UI, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportMetrics {
    pub scroll_top: f64,
    pub viewport_height: f64,
    pub content_height: f64,
}

impl ViewportMetrics {
    fn remaining(&self) -> f64 {
        (self.content_height - self.scroll_top - self.viewport_height).max(0.0)
    }
}

/// Decides when scrolling has come close enough to the feed's tail to load
/// the next page. Stateless by design: the double-request debounce is the
/// pagination cursor's own in-flight guard, not the trigger's job.
#[derive(Debug, Clone, Copy)]
pub struct ViewportLoadTrigger {
    threshold: f64,
}

impl Default for ViewportLoadTrigger {
    fn default() -> Self {
        Self { threshold: 600.0 }
    }
}

impl ViewportLoadTrigger {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// True when the trailing sentinel is within `threshold` pixels of the
    /// viewport.
    pub fn should_load(&self, metrics: ViewportMetrics) -> bool {
        metrics.remaining() <= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(scroll_top: f64) -> ViewportMetrics {
        ViewportMetrics {
            scroll_top,
            viewport_height: 800.0,
            content_height: 4000.0,
        }
    }

    #[test]
    fn fires_only_near_the_tail() {
        let trigger = ViewportLoadTrigger::new(600.0);
        assert!(!trigger.should_load(metrics(0.0)));
        assert!(!trigger.should_load(metrics(2000.0)));
        assert!(trigger.should_load(metrics(2600.0)));
        assert!(trigger.should_load(metrics(3200.0)));
    }

    #[test]
    fn overscrolled_geometry_still_fires() {
        let trigger = ViewportLoadTrigger::default();
        // rubber-banding can report scroll past the content height
        assert!(trigger.should_load(ViewportMetrics {
            scroll_top: 4100.0,
            viewport_height: 800.0,
            content_height: 4000.0,
        }));
    }
}
