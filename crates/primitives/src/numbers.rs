/// Restricts `value` to `min..=max`.
///
/// `min` wins if the bounds are inverted.
pub fn clamp<T: PartialOrd>(value: T, min: T, max: T) -> T {
	if value > max {
		if min > max { min } else { max }
	} else if value < min {
		min
	} else {
		value
	}
}

/// Clamps `value` to `min..=max`, then snaps it to the nearest multiple of
/// `step` counted from `min`.
///
/// Ties snap down. A snap that would overshoot `max` falls back one step. A
/// non-positive or non-finite `step` disables snapping.
pub fn clamp_step(value: f64, min: f64, max: f64, step: f64) -> f64 {
	let clamped = clamp(value, min, max);
	if !(step.is_finite() && step > 0.0) {
		return clamped;
	}

	let remainder = (clamped - min) % step;
	let snapped = if remainder > step / 2.0 { clamped + step - remainder } else { clamped - remainder };
	if snapped > max { snapped - step } else { snapped }
}

/// Wraps a signed index into `0..count`, so `-1` is the last slot.
///
/// Returns `None` when `count` is zero.
pub fn wrap_index(value: isize, count: usize) -> Option<usize> {
	let count = isize::try_from(count).ok().filter(|&c| c > 0)?;
	Some(value.rem_euclid(count) as usize)
}
