//! Debug-only numeric sanity checks at API boundaries.
//!
//! Mirrors the teacher's `shared::validate`: these run only under
//! `debug_assertions` and are no-ops in release, since the separation
//! arithmetic in the narrow-phase already tolerates NaN/inf gracefully in
//! the "no contact" sense, but a NaN silently propagating past a boundary
//! during development is a bug worth catching immediately.

use crate::core::types::{Number, Quat, Vec3};
use std::borrow::Borrow;

#[inline(always)]
#[track_caller]
pub fn number(val: impl Borrow<Number>) {
    if cfg!(not(debug_assertions)) {
        return;
    }
    let val = val.borrow();
    debug_assert!(!val.is_nan(), "should not be NaN: {val}");
    debug_assert!(!val.is_infinite(), "should not be infinite: {val}");
}

#[inline(always)]
#[track_caller]
pub fn vector3(v: impl Borrow<Vec3>) {
    if cfg!(not(debug_assertions)) {
        return;
    }
    let v = v.borrow();
    for c in v.to_array() {
        number(c);
    }
}

#[inline(always)]
#[track_caller]
pub fn unit_vector3(v: impl Borrow<Vec3>) {
    if cfg!(not(debug_assertions)) {
        return;
    }
    let v = v.borrow();
    vector3(v);
    debug_assert!(
        (v.length() - 1.0).abs() < 1e-3,
        "should be normalized: {v:?}, len: {}",
        v.length()
    );
}

#[inline(always)]
#[track_caller]
pub fn unit_quat(q: impl Borrow<Quat>) {
    if cfg!(not(debug_assertions)) {
        return;
    }
    let q = q.borrow();
    let len = q.length();
    debug_assert!(!len.is_nan() && len.is_finite(), "quaternion should be finite: {q:?}");
    debug_assert!((len - 1.0).abs() < 1e-3, "quaternion should be normalized: {q:?}, len: {len}");
}
