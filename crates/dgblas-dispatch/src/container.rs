//! Recursive block containers
//!
//! A [`Container`] holds multi-field state (for example the components of a
//! vector field) as a tree of leaf containers. Every operation recurses over
//! the blocks; binary operations require both sides to have the same block
//! structure. Reductions merge the per-block superaccumulators, so the result
//! of a dot product over a block container equals the dot product of the
//! concatenated leaves.

use crate::traits::{ElementwiseOp, ExactReduce, VResult, Vector};
use dgblas_core::{BlockTag, Error, Superaccumulator};

/// Leaf container or a list of nested blocks
#[derive(Clone, Debug)]
pub enum Container<V> {
    Leaf(V),
    Blocks(Vec<Container<V>>),
}

impl<V: Vector> Container<V> {
    pub fn leaf(v: V) -> Self {
        Container::Leaf(v)
    }

    pub fn blocks(blocks: Vec<Container<V>>) -> Self {
        Container::Blocks(blocks)
    }

    /// Block container of leaves
    pub fn from_leaves(leaves: impl IntoIterator<Item = V>) -> Self {
        Container::Blocks(leaves.into_iter().map(Container::Leaf).collect())
    }

    /// Number of direct blocks (a leaf counts as one)
    pub fn num_blocks(&self) -> usize {
        match self {
            Container::Leaf(_) => 1,
            Container::Blocks(blocks) => blocks.len(),
        }
    }

    /// Leaves in depth-first order
    pub fn leaves(&self) -> Vec<&V> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a V>) {
        match self {
            Container::Leaf(v) => out.push(v),
            Container::Blocks(blocks) => {
                for block in blocks {
                    block.collect_leaves(out);
                }
            }
        }
    }

    /// First leaf in depth-first order
    pub fn first_leaf(&self) -> Option<&V> {
        match self {
            Container::Leaf(v) => Some(v),
            Container::Blocks(blocks) => blocks.iter().find_map(Container::first_leaf),
        }
    }

    /// Same nesting and leaf lengths
    pub fn same_shape(&self, other: &Self) -> bool {
        match (self, other) {
            (Container::Leaf(a), Container::Leaf(b)) => a.len() == b.len(),
            (Container::Blocks(a), Container::Blocks(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_shape(y))
            }
            _ => false,
        }
    }

    fn check_shape(&self, other: &Self, operation: &str) -> Result<(), Error> {
        if self.same_shape(other) {
            return Ok(());
        }
        Err(Error::ShapeMismatch(format!(
            "{operation}: block structures differ ({} vs {} blocks, {} vs {} elements)",
            self.num_blocks(),
            other.num_blocks(),
            self.len(),
            other.len()
        )))
    }

    /// Visit paired leaves of two containers of equal shape
    pub(crate) fn zip_leaves<W, R>(
        &self,
        other: &Container<W>,
        f: &mut impl FnMut(&V, &W) -> R,
        out: &mut Vec<R>,
    ) -> bool {
        match (self, other) {
            (Container::Leaf(a), Container::Leaf(b)) => {
                out.push(f(a, b));
                true
            }
            (Container::Blocks(a), Container::Blocks(b)) if a.len() == b.len() => {
                a.iter().zip(b).all(|(x, y)| x.zip_leaves(y, f, out))
            }
            _ => false,
        }
    }
}

impl<V: Vector> Vector for Container<V> {
    type Tag = BlockTag;
    type Error = V::Error;

    fn len(&self) -> usize {
        match self {
            Container::Leaf(v) => v.len(),
            Container::Blocks(blocks) => blocks.iter().map(Vector::len).sum(),
        }
    }
}

impl<V: ElementwiseOp> ElementwiseOp for Container<V> {
    fn apply<F>(&mut self, f: F)
    where
        F: Fn(f64) -> f64 + Sync + Send,
    {
        match self {
            Container::Leaf(v) => v.apply(f),
            Container::Blocks(blocks) => {
                for block in blocks {
                    block.apply(&f as &(dyn Fn(f64) -> f64 + Sync + Send));
                }
            }
        }
    }

    fn apply_with<F>(&mut self, x: &Self, f: F) -> VResult<(), Self>
    where
        F: Fn(f64, f64) -> f64 + Sync + Send,
    {
        self.check_shape(x, "apply_with")?;
        match (self, x) {
            (Container::Leaf(y), Container::Leaf(x)) => y.apply_with(x, f),
            (Container::Blocks(ys), Container::Blocks(xs)) => {
                for (y, x) in ys.iter_mut().zip(xs) {
                    y.apply_with(x, &f as &(dyn Fn(f64, f64) -> f64 + Sync + Send))?;
                }
                Ok(())
            }
            _ => unreachable!("shapes were checked"),
        }
    }

    fn apply_with2<F>(&mut self, x1: &Self, x2: &Self, f: F) -> VResult<(), Self>
    where
        F: Fn(f64, f64, f64) -> f64 + Sync + Send,
    {
        self.check_shape(x1, "apply_with2")?;
        self.check_shape(x2, "apply_with2")?;
        match (self, x1, x2) {
            (Container::Leaf(y), Container::Leaf(a), Container::Leaf(b)) => y.apply_with2(a, b, f),
            (Container::Blocks(ys), Container::Blocks(a), Container::Blocks(b)) => {
                for ((y, a), b) in ys.iter_mut().zip(a).zip(b) {
                    y.apply_with2(a, b, &f as &(dyn Fn(f64, f64, f64) -> f64 + Sync + Send))?;
                }
                Ok(())
            }
            _ => unreachable!("shapes were checked"),
        }
    }
}

impl<V: ExactReduce> ExactReduce for Container<V> {
    fn dot_superacc(&self, y: &Self) -> VResult<Superaccumulator, Self> {
        self.check_shape(y, "dot")?;
        match (self, y) {
            (Container::Leaf(a), Container::Leaf(b)) => a.dot_superacc(b),
            (Container::Blocks(a), Container::Blocks(b)) => {
                let mut total = Superaccumulator::new();
                for (x, y) in a.iter().zip(b) {
                    total.merge(&x.dot_superacc(y)?);
                }
                Ok(total)
            }
            _ => unreachable!("shapes were checked"),
        }
    }

    fn dot3_superacc(&self, y: &Self, z: &Self) -> VResult<Superaccumulator, Self> {
        self.check_shape(y, "dot3")?;
        self.check_shape(z, "dot3")?;
        match (self, y, z) {
            (Container::Leaf(a), Container::Leaf(b), Container::Leaf(c)) => a.dot3_superacc(b, c),
            (Container::Blocks(a), Container::Blocks(b), Container::Blocks(c)) => {
                let mut total = Superaccumulator::new();
                for ((x, y), z) in a.iter().zip(b).zip(c) {
                    total.merge(&x.dot3_superacc(y, z)?);
                }
                Ok(total)
            }
            _ => unreachable!("shapes were checked"),
        }
    }

    fn fast_dot(&self, y: &Self) -> VResult<f64, Self> {
        self.check_shape(y, "fast_dot")?;
        match (self, y) {
            (Container::Leaf(a), Container::Leaf(b)) => a.fast_dot(b),
            (Container::Blocks(a), Container::Blocks(b)) => {
                let mut total = 0.0;
                for (x, y) in a.iter().zip(b) {
                    total += x.fast_dot(y)?;
                }
                Ok(total)
            }
            _ => unreachable!("shapes were checked"),
        }
    }

    fn fast_dot3(&self, y: &Self, z: &Self) -> VResult<f64, Self> {
        self.check_shape(y, "fast_dot3")?;
        self.check_shape(z, "fast_dot3")?;
        match (self, y, z) {
            (Container::Leaf(a), Container::Leaf(b), Container::Leaf(c)) => a.fast_dot3(b, c),
            (Container::Blocks(a), Container::Blocks(b), Container::Blocks(c)) => {
                let mut total = 0.0;
                for ((x, y), z) in a.iter().zip(b).zip(c) {
                    total += x.fast_dot3(y, z)?;
                }
                Ok(total)
            }
            _ => unreachable!("shapes were checked"),
        }
    }
}
