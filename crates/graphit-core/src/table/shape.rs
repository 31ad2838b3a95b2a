use std::fmt;

use serde::{Deserialize, Serialize};

/// Reshape target of a column
///
/// An empty shape means one scalar per row (the flat case). A non-empty
/// shape is the original n-dimensional layout the column is restored to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Shape(Vec<usize>);

impl Shape {
    /// Shape of a flat column
    pub fn scalar() -> Self {
        Self(Vec::new())
    }

    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        Self(dims.into())
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn is_scalar(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of elements a column with this shape holds, `None` for flat columns
    pub fn element_count(&self) -> Option<usize> {
        if self.is_scalar() {
            None
        } else {
            Some(self.0.iter().product())
        }
    }

    /// Row-major strides, one per dimension
    pub fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1; self.0.len()];
        for axis in (0..self.0.len().saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * self.0[axis + 1];
        }
        strides
    }
}

/// Tuple notation: `()`, `(289,)`, `(30, 50)`
impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => write!(f, "()"),
            [only] => write!(f, "({},)", only),
            dims => {
                write!(f, "(")?;
                for (idx, dim) in dims.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", dim)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Self(dims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuple_notation() {
        assert_eq!(Shape::scalar().to_string(), "()");
        assert_eq!(Shape::new(vec![289]).to_string(), "(289,)");
        assert_eq!(Shape::new(vec![30, 50]).to_string(), "(30, 50)");
    }

    #[test]
    fn test_strides_are_row_major() {
        assert_eq!(Shape::new(vec![2, 3, 4]).strides(), vec![12, 4, 1]);
        assert_eq!(Shape::new(vec![5]).strides(), vec![1]);
        assert_eq!(Shape::new(vec![30, 50]).element_count(), Some(1500));
        assert_eq!(Shape::scalar().element_count(), None);
    }
}
