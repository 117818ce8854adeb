/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

/// Computes the per-move time budget, in seconds, from the remaining clock
/// time and increment (both in milliseconds).
///
/// The budget is a 1/38th slice of the remaining clock plus the whole
/// increment, floored at one second. When the clock is nearly exhausted the
/// floor would overshoot, so the budget drops to half the remaining time.
pub fn manage_time(time_left_ms: u64, increment_ms: u64) -> f32 {
    let time_left = time_left_ms as f32 / 1000.0;
    let increment = increment_ms as f32 / 1000.0;

    let mut target = 1.0;
    if increment_ms > 0 {
        target = time_left / 38.0 + increment;
    }

    target = target.max(1.0);

    if time_left < target {
        target = time_left / 2.0;
    }

    target
}
