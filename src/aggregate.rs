//! Deterministic combination of parallel partial results.
//!
//! [`aggregate`] waits on handles in the order they were submitted, never in
//! completion order, and folds the values strictly left to right. Given the
//! same per-task values the result is bit-identical no matter how the
//! scheduler interleaved the tasks, which matters for floating-point
//! reductions.
//!
//! The same routine serves every element type: integers, floats, complex
//! numbers stored as `[re, im]` pairs ([`ComplexF32`], [`ComplexF64`]) and
//! arbitrary owned values.
//!
//! `combine` is expected to be associative; that is not checked, only the
//! left-to-right order is guaranteed.

use crate::error::{Error, Result};
use crate::executor::{TaskFailure, WorkHandle};

/// Single-precision complex number as `[re, im]`.
pub type ComplexF32 = [f32; 2];

/// Double-precision complex number as `[re, im]`.
pub type ComplexF64 = [f64; 2];

/// Waits for every handle and folds the results with `combine`.
///
/// Returns [`Error::EmptyInput`] when there are no handles. If any task
/// failed, every remaining handle is still waited on before
/// [`Error::Aggregation`] is returned for the first failure in submission
/// order; `combine` is not called in that case.
pub fn aggregate<T, I, F>(handles: I, combine: F) -> Result<T>
where
    I: IntoIterator<Item = WorkHandle<T>>,
    F: FnMut(T, T) -> T,
{
    let handles = handles.into_iter();
    let mut results = Vec::with_capacity(handles.size_hint().0);
    let mut first_failure: Option<(usize, TaskFailure)> = None;

    for (index, handle) in handles.enumerate() {
        match handle.join() {
            Ok(value) => {
                if first_failure.is_none() {
                    results.push(value);
                }
            }
            Err(failure) => {
                if first_failure.is_none() {
                    results.clear();
                    first_failure = Some((index, failure));
                } else {
                    tracing::debug!(index, error = %failure, "additional task failure while draining");
                }
            }
        }
    }

    if let Some((index, source)) = first_failure {
        return Err(Error::Aggregation { index, source });
    }

    let mut values = results.into_iter();
    let first = values.next().ok_or(Error::EmptyInput)?;
    Ok(values.fold(first, combine))
}

/// `a + b` for [`ComplexF32`].
pub fn complex_add_f32(a: ComplexF32, b: ComplexF32) -> ComplexF32 {
    [a[0] + b[0], a[1] + b[1]]
}

/// `a + b` for [`ComplexF64`].
pub fn complex_add_f64(a: ComplexF64, b: ComplexF64) -> ComplexF64 {
    [a[0] + b[0], a[1] + b[1]]
}
