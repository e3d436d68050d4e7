use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{
    config::InitialState,
    types::{GainSelector, PidGains, StoreSnapshot},
};

#[derive(Debug)]
pub struct ControlStore {
    system_on: Mutex<bool>,
    desired_temp: Mutex<i32>,
    current_temp: Mutex<i32>,
    heat_on: Mutex<bool>,
    gains: Mutex<PidGains>,
    verbose: Mutex<bool>,
}

impl Default for ControlStore {
    fn default() -> Self {
        Self::new(&InitialState::default())
    }
}

impl ControlStore {
    pub fn new(initial: &InitialState) -> Self {
        Self {
            system_on: Mutex::new(initial.system_on),
            desired_temp: Mutex::new(initial.desired_temp_c),
            current_temp: Mutex::new(initial.current_temp_c),
            heat_on: Mutex::new(false),
            gains: Mutex::new(initial.gains),
            verbose: Mutex::new(initial.verbose),
        }
    }

    pub fn system_on(&self) -> bool {
        *lock(&self.system_on)
    }

    pub fn set_system_on(&self, on: bool) {
        *lock(&self.system_on) = on;
    }

    pub fn desired_temp(&self) -> i32 {
        *lock(&self.desired_temp)
    }

    pub fn set_desired_temp(&self, temp_c: i32) {
        *lock(&self.desired_temp) = temp_c;
    }

    pub fn current_temp(&self) -> i32 {
        *lock(&self.current_temp)
    }

    pub fn set_current_temp(&self, temp_c: i32) {
        *lock(&self.current_temp) = temp_c;
    }

    pub fn heat_on(&self) -> bool {
        *lock(&self.heat_on)
    }

    pub fn set_heat_on(&self, on: bool) {
        *lock(&self.heat_on) = on;
    }

    pub fn gains(&self) -> PidGains {
        *lock(&self.gains)
    }

    pub fn set_gains(&self, gains: PidGains) {
        *lock(&self.gains) = gains;
    }

    /// Replaces one gain while holding the group lock for the whole
    /// read-modify-write, so a concurrent update of another member is not lost.
    pub fn update_gain(&self, selector: GainSelector, value: f32) -> PidGains {
        let mut gains = lock(&self.gains);
        *gains = gains.with(selector, value);
        *gains
    }

    pub fn verbose(&self) -> bool {
        *lock(&self.verbose)
    }

    pub fn set_verbose(&self, on: bool) {
        *lock(&self.verbose) = on;
    }

    /// Flips the verbose flag and returns the new value.
    pub fn toggle_verbose(&self) -> bool {
        let mut verbose = lock(&self.verbose);
        *verbose = !*verbose;
        *verbose
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            system_on: self.system_on(),
            desired_temp: self.desired_temp(),
            current_temp: self.current_temp(),
            heat_on: self.heat_on(),
            gains: self.gains(),
            verbose: self.verbose(),
        }
    }
}

// A panic elsewhere cannot leave a scalar half-written, so a poisoned lock
// still guards a valid value.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    #[test]
    fn starts_from_initial_state() {
        let store = ControlStore::default();

        assert!(!store.system_on());
        assert_eq!(store.desired_temp(), 28);
        assert_eq!(store.current_temp(), 28);
        assert!(!store.heat_on());
        assert_eq!(store.gains(), PidGains::default());
        assert!(!store.verbose());
    }

    #[test]
    fn setters_round_trip_each_field() {
        let store = ControlStore::default();

        store.set_system_on(true);
        store.set_desired_temp(-10);
        store.set_current_temp(31);
        store.set_heat_on(true);
        store.set_verbose(true);

        assert!(store.system_on());
        assert_eq!(store.desired_temp(), -10);
        assert_eq!(store.current_temp(), 31);
        assert!(store.heat_on());
        assert!(store.verbose());
    }

    #[test]
    fn update_gain_preserves_other_members() {
        let store = ControlStore::default();
        store.set_gains(PidGains {
            kp: 1.0,
            ki: 0.5,
            kd: 0.25,
        });

        let gains = store.update_gain(GainSelector::Ki, 3.0);

        assert_eq!(
            gains,
            PidGains {
                kp: 1.0,
                ki: 3.0,
                kd: 0.25,
            }
        );
        assert_eq!(store.gains(), gains);
    }

    #[test]
    fn toggle_verbose_twice_restores_value() {
        let store = ControlStore::default();
        assert!(store.toggle_verbose());
        assert!(!store.toggle_verbose());
        assert!(!store.verbose());
    }

    #[test]
    fn concurrent_gain_updates_are_not_lost() {
        let store = Arc::new(ControlStore::default());
        let selectors = [GainSelector::Kp, GainSelector::Ki, GainSelector::Kd];

        let handles: Vec<_> = selectors
            .into_iter()
            .enumerate()
            .map(|(index, selector)| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        store.update_gain(selector, index as f32 + 10.0);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(
            store.gains(),
            PidGains {
                kp: 10.0,
                ki: 11.0,
                kd: 12.0,
            }
        );
    }
}
