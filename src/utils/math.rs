use num::Num;

/// Dot product
/// d(a, b) = Σ(a_i * b_i)
///
/// Extra trailing elements of the longer slice are ignored;
/// callers check dimensions first.
#[inline]
pub fn dot<N>(vec: &[N], other: &[N]) -> f64
where
    N: Num + Copy + Into<f64>,
{
    vec.iter()
        .zip(other.iter())
        .map(|(&a, &b)| a.into() * b.into())
        .sum()
}

/// Squared L2 norm
#[inline]
pub fn norm_sq<N>(vec: &[N]) -> f64
where
    N: Num + Copy + Into<f64>,
{
    vec.iter().map(|&a| {
        let a: f64 = a.into();
        a * a
    }).sum()
}

/// Cosine similarity
/// cos(θ) = Σ(a_i * b_i) / (||a|| * ||b||)
///
/// 0.0 when either side has zero magnitude
#[inline]
pub fn cosine_similarity<N>(vec: &[N], other: &[N]) -> f64
where
    N: Num + Copy + Into<f64>,
{
    let denom = (norm_sq(vec) * norm_sq(other)).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }
    dot(vec, other) / denom
}

/// Scale `vec` to unit length in place
/// zero vectors stay zero
#[inline]
pub fn l2_normalize(vec: &mut [f64]) {
    let norm = norm_sq(vec).sqrt();
    if norm > 0.0 {
        vec.iter_mut().for_each(|v| *v /= norm);
    }
}

/// 64-bit FNV-1a over a sequence of terms
/// a 0xff separator keeps ["ab", "c"] and ["a", "bc"] apart
pub fn fnv1a_terms<'a, I>(terms: I) -> u64
where
    I: IntoIterator<Item = &'a str>,
{
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET;
    for term in terms {
        for &byte in term.as_bytes().iter().chain(std::iter::once(&0xff_u8)) {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(PRIME);
        }
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_and_norm() {
        assert_eq!(dot(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]), 32.0);
        assert_eq!(norm_sq(&[3.0_f64, 4.0]), 25.0);
        assert_eq!(dot::<u32>(&[1, 2], &[3, 4]), 11.0);
    }

    #[test]
    fn cosine_of_parallel_and_orthogonal_vectors() {
        assert!((cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-12);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_with_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity::<f64>(&[], &[]), 0.0);
    }

    #[test]
    fn normalize_gives_unit_length() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.6, 0.8]);

        let mut zero = vec![0.0, 0.0];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn fingerprint_depends_on_order_and_boundaries() {
        let a = fnv1a_terms(["ab", "c"]);
        let b = fnv1a_terms(["a", "bc"]);
        let c = fnv1a_terms(["c", "ab"]);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, fnv1a_terms(["ab", "c"]));
    }
}
