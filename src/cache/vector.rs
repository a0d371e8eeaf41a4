use std::fmt;
use std::sync::Arc;

/// Immutable policy context. Clones share one allocation.
///
/// Equality is bitwise: two vectors are equal only if every element has the
/// same IEEE-754 bit pattern.
#[derive(Clone)]
pub struct ContextVector(Arc<[f32]>);

impl ContextVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(Arc::from(values))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn norm(&self) -> f64 {
        self.0
            .iter()
            .map(|v| f64::from(*v) * f64::from(*v))
            .sum::<f64>()
            .sqrt()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for ContextVector {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

impl Eq for ContextVector {}

impl fmt::Debug for ContextVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextVector")
            .field("len", &self.0.len())
            .field("norm", &self.norm())
            .finish_non_exhaustive()
    }
}

impl From<Vec<f32>> for ContextVector {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_bitwise() {
        let a = ContextVector::new(vec![f32::NAN, 0.0]);
        let b = ContextVector::new(vec![f32::NAN, 0.0]);
        let c = ContextVector::new(vec![f32::NAN, -0.0]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn clones_share_storage() {
        let a = ContextVector::new(vec![1.0, 2.0]);
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        assert!((a.norm() - 5.0_f64.sqrt()).abs() < 1e-9);
    }
}
