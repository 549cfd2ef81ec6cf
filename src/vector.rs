/// Euclidean norm of a 3-vector.
///
/// Used for instantaneous speed (velocity magnitude). The three-component
/// case is small enough that the compiler keeps it in registers; no need
/// for the wide-lane unrolling a general kernel would want.
#[inline(always)]
pub fn norm3(v: [f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}
