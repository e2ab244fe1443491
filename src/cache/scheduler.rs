//! Adaptive Expiry Scheduler
//!
//! Instead of sweeping on a fixed interval, the table computes the soonest
//! deadline among its items after each relevant mutation and arms a one-shot
//! timer for exactly that moment. Each wake-up evicts what is due and re-arms.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::cache::table::Shared;

impl<K, V> Shared<K, V>
where
    K: Eq + Hash + Ord + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    // == Expiration Check ==
    /// Evicts every item idle for at least its lifespan and re-arms the timer
    /// for the soonest remaining deadline, or leaves it disarmed.
    pub(super) fn expiration_check(self: &Arc<Self>) {
        let (due, deleted, logger, previous_interval, next) = {
            let mut state = self.state.write();
            self.timer.cancel();
            let previous_interval = state.cleanup_interval;

            // One clock read per pass.
            let now = Instant::now();
            let mut smallest: Option<Duration> = None;
            let mut due = Vec::new();

            for item in state.items.values() {
                if item.is_departing() {
                    continue;
                }
                match item.remaining_at(now) {
                    None => {}
                    Some(remaining) if remaining.is_zero() => {
                        if item.begin_departure() {
                            due.push(item.clone());
                        }
                    }
                    Some(remaining) => {
                        smallest = Some(smallest.map_or(remaining, |s| s.min(remaining)));
                    }
                }
            }

            match smallest {
                Some(after) => {
                    state.cleanup_interval = after;
                    state.next_sweep = now.checked_add(after);
                    let table = Arc::downgrade(self);
                    self.timer.arm(
                        after,
                        Box::new(move || {
                            if let Some(table) = table.upgrade() {
                                table.expiration_check();
                            }
                        }),
                    );
                }
                None => {
                    state.cleanup_interval = Duration::ZERO;
                    state.next_sweep = None;
                }
            }

            (
                due,
                state.deleted.clone(),
                state.logger.clone(),
                previous_interval,
                smallest,
            )
        };

        if let Some(logger) = &logger {
            if previous_interval.is_zero() {
                logger.log(format_args!(
                    "Expiration check installed for table {}",
                    self.name
                ));
            } else {
                logger.log(format_args!(
                    "Expiration check triggered after {:?} for table {}",
                    previous_interval, self.name
                ));
            }
        }

        if due.is_empty() {
            debug!(table = %self.name, next = ?next, "Expiry check: nothing due");
        } else {
            info!(
                table = %self.name,
                next = ?next,
                "Expiry check: removing {} expired items",
                due.len()
            );
        }

        for item in &due {
            if self.finish_departure(item, &deleted) {
                self.stats.record_expiration();
            }
        }
    }
}
