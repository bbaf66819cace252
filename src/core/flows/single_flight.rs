use std::sync::atomic::{AtomicBool, Ordering};

/// Allows one run of an operation at a time. A caller that finds a run in
/// flight gets `None` instead of queueing behind it.
#[derive(Debug, Default)]
pub struct SingleFlight {
    busy: AtomicBool,
}

/// Held for the duration of a run; dropping it frees the slot.
pub struct FlightGuard<'a> {
    busy: &'a AtomicBool,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_begin(&self) -> Option<FlightGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard { busy: &self.busy })
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_begin_is_refused_until_guard_drops() {
        let flight = SingleFlight::new();

        let guard = flight.try_begin().unwrap();
        assert!(flight.try_begin().is_none());

        drop(guard);
        let again = flight.try_begin();
        assert!(again.is_some());
        assert!(flight.try_begin().is_none());
    }
}
