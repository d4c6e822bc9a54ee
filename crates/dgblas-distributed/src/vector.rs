//! Distributed containers
//!
//! A [`DistributedVector`] is a local container holding one contiguous slice
//! of a global vector, the process group it belongs to and the [`Partition`]
//! of the global index space. All ranks hold the same partition, so layout
//! checks give the same answer everywhere without communicating.

use crate::collectives::{all_gather_f64, all_gather_usize};
use crate::comm::Communicator;
use crate::error::{Error, Result};
use crate::reduce;
use dgblas_core::{DistributedTag, Superaccumulator};
use dgblas_dispatch::{ElementwiseOp, ExactReduce, HostAccess, Transfer, VResult, Vector};
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Placement of one rank's slice in the global index space
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    pub global_len: usize,
    pub offset: usize,
    pub local_len: usize,
}

impl Layout {
    /// Global indices owned by this rank
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.local_len
    }
}

/// Split of `0..global_len` into contiguous per-rank ranges
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    /// `offsets[r]..offsets[r + 1]` is owned by rank `r`
    offsets: Vec<usize>,
}

impl Partition {
    /// Near-equal split; the first `global_len % parts` ranks get one extra
    pub fn balanced(global_len: usize, parts: usize) -> Self {
        let (base, extra) = match parts {
            0 => (0, 0),
            p => (global_len / p, global_len % p),
        };
        Self::from_counts((0..parts).map(|r| base + usize::from(r < extra)))
    }

    /// Ranges of the given lengths, in rank order
    pub fn from_counts(counts: impl IntoIterator<Item = usize>) -> Self {
        let mut offsets = vec![0];
        for count in counts {
            let last = offsets[offsets.len() - 1];
            offsets.push(last + count);
        }
        Self { offsets }
    }

    pub fn num_parts(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn global_len(&self) -> usize {
        self.offsets[self.offsets.len() - 1]
    }

    /// Length of each part
    pub fn counts(&self) -> Vec<usize> {
        self.offsets.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Global range of part `rank`
    pub fn range(&self, rank: usize) -> Range<usize> {
        self.offsets[rank]..self.offsets[rank + 1]
    }

    pub fn layout(&self, rank: usize) -> Layout {
        let range = self.range(rank);
        Layout {
            global_len: self.global_len(),
            offset: range.start,
            local_len: range.len(),
        }
    }

    /// Part owning global index `index`
    pub fn owner(&self, index: usize) -> Option<usize> {
        if index >= self.global_len() {
            return None;
        }
        Some(self.offsets.partition_point(|&o| o <= index) - 1)
    }
}

/// Vector partitioned across a process group
#[derive(Clone, Debug)]
pub struct DistributedVector<V, C> {
    local: V,
    comm: C,
    partition: Arc<Partition>,
}

impl<V, C> DistributedVector<V, C>
where
    V: Vector<Error = dgblas_core::Error>,
    C: Communicator,
{
    /// Collective constructor from this rank's slice
    ///
    /// Gathers the local lengths of all ranks and fails on every rank with
    /// `LayoutMismatch` unless they add up to `global_len`.
    #[instrument(skip_all, fields(rank = comm.rank(), global_len = global_len))]
    pub fn new(local: V, comm: C, global_len: usize) -> Result<Self> {
        let counts = all_gather_usize(&comm, local.len())?;
        let partition = Partition::from_counts(counts);
        if partition.global_len() != global_len {
            return Err(Error::LayoutMismatch(format!(
                "local sizes {:?} add up to {}, expected {global_len}",
                partition.counts(),
                partition.global_len()
            )));
        }
        debug!(layout = ?partition.layout(comm.rank()), "distributed vector");
        Ok(Self {
            local,
            comm,
            partition: Arc::new(partition),
        })
    }

    /// Local constructor for a partition every rank already agrees on
    pub fn with_partition(local: V, comm: C, partition: Arc<Partition>) -> Result<Self> {
        if partition.num_parts() != comm.size() {
            return Err(Error::LayoutMismatch(format!(
                "partition has {} parts for a group of {}",
                partition.num_parts(),
                comm.size()
            )));
        }
        let expected = partition.layout(comm.rank()).local_len;
        if expected != local.len() {
            return Err(Error::LayoutMismatch(format!(
                "rank {} owns {expected} entries but the local container has {}",
                comm.rank(),
                local.len()
            )));
        }
        Ok(Self {
            local,
            comm,
            partition,
        })
    }

    /// Cut this rank's part out of globally known values
    ///
    /// `make` builds the local container from the owned slice.
    pub fn scatter(
        global: &[f64],
        partition: Arc<Partition>,
        comm: C,
        make: impl FnOnce(&[f64]) -> V,
    ) -> Result<Self> {
        if global.len() != partition.global_len() {
            return Err(Error::LayoutMismatch(format!(
                "{} values for a partition of {}",
                global.len(),
                partition.global_len()
            )));
        }
        if comm.rank() >= partition.num_parts() {
            return Err(Error::InvalidRank {
                rank: comm.rank(),
                size: partition.num_parts(),
            });
        }
        let local = make(&global[partition.range(comm.rank())]);
        Self::with_partition(local, comm, partition)
    }

    pub fn local(&self) -> &V {
        &self.local
    }

    pub(crate) fn local_mut(&mut self) -> &mut V {
        &mut self.local
    }

    pub fn into_local(self) -> V {
        self.local
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn partition(&self) -> &Arc<Partition> {
        &self.partition
    }

    pub fn layout(&self) -> Layout {
        self.partition.layout(self.comm.rank())
    }

    /// Same group and same partition, checked without communicating
    pub fn check_compatible<W>(&self, other: &DistributedVector<W, C>, operation: &str) -> Result<()> {
        let (left, right) = (self.comm.group_id(), other.comm.group_id());
        if left != right {
            return Err(Error::CommunicatorMismatch { left, right });
        }
        self.check_partition(&other.partition, operation)
    }

    pub(crate) fn check_partition(&self, partition: &Arc<Partition>, operation: &str) -> Result<()> {
        if Arc::ptr_eq(&self.partition, partition) || *self.partition == **partition {
            return Ok(());
        }
        Err(Error::LayoutMismatch(format!(
            "{operation}: partitions {:?} and {:?} differ",
            self.partition.counts(),
            partition.counts()
        )))
    }
}

impl<V, C> DistributedVector<V, C>
where
    V: Vector<Error = dgblas_core::Error> + HostAccess,
    C: Communicator,
{
    /// Collective: the whole global vector on every rank
    pub fn gather_all(&self) -> Result<Vec<f64>> {
        all_gather_f64(&self.comm, self.local.as_slice())
    }
}

impl<V, C> Vector for DistributedVector<V, C>
where
    V: Vector<Error = dgblas_core::Error>,
    C: Communicator,
{
    type Tag = DistributedTag;
    type Error = Error;

    fn len(&self) -> usize {
        self.partition.global_len()
    }
}

impl<V, C> HostAccess for DistributedVector<V, C>
where
    V: HostAccess,
{
    fn as_slice(&self) -> &[f64] {
        self.local.as_slice()
    }

    fn as_mut_slice(&mut self) -> &mut [f64] {
        self.local.as_mut_slice()
    }
}

impl<V, C> ElementwiseOp for DistributedVector<V, C>
where
    V: ElementwiseOp<Error = dgblas_core::Error>,
    C: Communicator,
{
    fn apply<F>(&mut self, f: F)
    where
        F: Fn(f64) -> f64 + Sync + Send,
    {
        self.local.apply(f);
    }

    fn apply_with<F>(&mut self, x: &Self, f: F) -> VResult<(), Self>
    where
        F: Fn(f64, f64) -> f64 + Sync + Send,
    {
        self.check_compatible(x, "apply_with")?;
        Ok(self.local.apply_with(&x.local, f)?)
    }

    fn apply_with2<F>(&mut self, x1: &Self, x2: &Self, f: F) -> VResult<(), Self>
    where
        F: Fn(f64, f64, f64) -> f64 + Sync + Send,
    {
        self.check_compatible(x1, "apply_with2")?;
        self.check_compatible(x2, "apply_with2")?;
        Ok(self.local.apply_with2(&x1.local, &x2.local, f)?)
    }
}

impl<V, C> ExactReduce for DistributedVector<V, C>
where
    V: ExactReduce<Error = dgblas_core::Error>,
    C: Communicator,
{
    fn dot_superacc(&self, y: &Self) -> VResult<Superaccumulator, Self> {
        reduce::distributed_dot_superacc(self, y)
    }

    fn dot3_superacc(&self, y: &Self, z: &Self) -> VResult<Superaccumulator, Self> {
        reduce::distributed_dot3_superacc(self, y, z)
    }

    fn fast_dot(&self, y: &Self) -> VResult<f64, Self> {
        reduce::distributed_fast_dot(self, y)
    }

    fn fast_dot3(&self, y: &Self, z: &Self) -> VResult<f64, Self> {
        reduce::distributed_fast_dot3(self, y, z)
    }
}

/// Transfers the local part; the destination adopts the source group and
/// partition.
impl<V, W, C> Transfer<DistributedVector<W, C>> for DistributedVector<V, C>
where
    V: Transfer<W>,
    C: Clone,
{
    fn transfer_into(&self, dst: &mut DistributedVector<W, C>) -> dgblas_core::Result<()> {
        self.local.transfer_into(&mut dst.local)?;
        dst.comm = self.comm.clone();
        dst.partition = Arc::clone(&self.partition);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::{SelfComm, ThreadComm};
    use dgblas_core::execution::scalar_sequential;
    use dgblas_dispatch::HostVector;

    #[test]
    fn test_balanced_partition() {
        let p = Partition::balanced(10, 4);
        assert_eq!(p.counts(), vec![3, 3, 2, 2]);
        assert_eq!(p.range(2), 6..8);
        assert_eq!(p.global_len(), 10);
        assert_eq!(Partition::balanced(2, 4).counts(), vec![1, 1, 0, 0]);
    }

    #[test]
    fn test_owner_skips_empty_parts() {
        let p = Partition::from_counts([2, 0, 0, 3]);
        assert_eq!(p.owner(0), Some(0));
        assert_eq!(p.owner(1), Some(0));
        assert_eq!(p.owner(2), Some(3));
        assert_eq!(p.owner(4), Some(3));
        assert_eq!(p.owner(5), None);
        assert_eq!(p.layout(3), Layout { global_len: 5, offset: 2, local_len: 3 });
    }

    #[test]
    fn test_collective_new_checks_global_size() {
        let results = ThreadComm::run(3, |comm| {
            let local = HostVector::zeros(scalar_sequential(), comm.rank() + 1);
            let ok = DistributedVector::new(local.clone(), comm.clone(), 6).map(|v| v.layout());
            let bad = DistributedVector::new(local, comm, 7).is_err();
            (ok.unwrap(), bad)
        });
        assert_eq!(results[2].0, Layout { global_len: 6, offset: 3, local_len: 3 });
        assert!(results.iter().all(|(_, bad)| *bad));
    }

    #[test]
    fn test_scatter_and_gather() {
        let global: Vec<f64> = (0..11).map(f64::from).collect();
        let gathered = ThreadComm::run(4, |comm| {
            let partition = Arc::new(Partition::balanced(11, 4));
            let v = DistributedVector::scatter(&global, partition, comm, |s| {
                HostVector::from_slice(scalar_sequential(), s)
            })
            .unwrap();
            assert_eq!(v.len(), 11);
            v.gather_all().unwrap()
        });
        assert!(gathered.iter().all(|g| g == &global));
    }

    #[test]
    fn test_with_partition_checks_local_len() {
        let comm = SelfComm::new();
        let p = Arc::new(Partition::from_counts([3]));
        assert!(DistributedVector::with_partition(
            HostVector::zeros(scalar_sequential(), 2),
            comm.clone(),
            p.clone()
        )
        .is_err());
        let v = DistributedVector::with_partition(HostVector::zeros(scalar_sequential(), 3), comm, p)
            .unwrap();
        assert_eq!(v.layout().range(), 0..3);
    }

    #[test]
    fn test_elementwise_requires_same_group() {
        let a = SelfComm::new();
        let b = SelfComm::new();
        let mut x = DistributedVector::new(HostVector::zeros(scalar_sequential(), 2), a, 2).unwrap();
        let y = DistributedVector::new(HostVector::zeros(scalar_sequential(), 2), b, 2).unwrap();
        assert!(matches!(
            x.apply_with(&y, |v, _| v),
            Err(Error::CommunicatorMismatch { .. })
        ));
    }
}
