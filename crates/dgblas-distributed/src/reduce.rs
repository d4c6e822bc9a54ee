//! Exact reductions over distributed vectors
//!
//! Each rank reduces its own slice into a superaccumulator. The partials are
//! merged up a binomial tree and the canonical total is broadcast, so every
//! rank rounds identical bits. Because merging is exact, the result equals
//! the local exact dot product of the unsplit vectors for every partition.

use crate::collectives::{all_reduce_sum_f64, all_reduce_superacc};
use crate::comm::Communicator;
use crate::error::Result;
use crate::vector::DistributedVector;
use dgblas_core::Superaccumulator;
use dgblas_dispatch::ExactReduce;
use tracing::{debug, instrument};

/// Exact global `Σ x[i]·y[i]`, identical on every rank
///
/// Group and partition are checked before any message is sent.
#[instrument(skip_all, fields(rank = x.comm().rank()))]
pub fn distributed_dot_superacc<V, C>(
    x: &DistributedVector<V, C>,
    y: &DistributedVector<V, C>,
) -> Result<Superaccumulator>
where
    V: ExactReduce<Error = dgblas_core::Error>,
    C: Communicator,
{
    x.check_compatible(y, "dot")?;
    let local = x.local().dot_superacc(y.local())?;
    debug!(local_len = x.layout().local_len, "local dot reduced");
    all_reduce_superacc(x.comm(), local)
}

/// Exact global `Σ x[i]·w[i]·y[i]`, identical on every rank
#[instrument(skip_all, fields(rank = x.comm().rank()))]
pub fn distributed_dot3_superacc<V, C>(
    x: &DistributedVector<V, C>,
    w: &DistributedVector<V, C>,
    y: &DistributedVector<V, C>,
) -> Result<Superaccumulator>
where
    V: ExactReduce<Error = dgblas_core::Error>,
    C: Communicator,
{
    x.check_compatible(w, "dot3")?;
    x.check_compatible(y, "dot3")?;
    let local = x.local().dot3_superacc(w.local(), y.local())?;
    all_reduce_superacc(x.comm(), local)
}

/// Correctly rounded global dot product
pub fn distributed_dot<V, C>(x: &DistributedVector<V, C>, y: &DistributedVector<V, C>) -> Result<f64>
where
    V: ExactReduce<Error = dgblas_core::Error>,
    C: Communicator,
{
    Ok(distributed_dot_superacc(x, y)?.round())
}

/// Correctly rounded global weighted dot product `Σ x[i]·w[i]·y[i]`
pub fn distributed_dot3<V, C>(
    x: &DistributedVector<V, C>,
    w: &DistributedVector<V, C>,
    y: &DistributedVector<V, C>,
) -> Result<f64>
where
    V: ExactReduce<Error = dgblas_core::Error>,
    C: Communicator,
{
    Ok(distributed_dot3_superacc(x, w, y)?.round())
}

/// Floating-point global dot product; depends on the partition
pub fn distributed_fast_dot<V, C>(x: &DistributedVector<V, C>, y: &DistributedVector<V, C>) -> Result<f64>
where
    V: ExactReduce<Error = dgblas_core::Error>,
    C: Communicator,
{
    x.check_compatible(y, "fast_dot")?;
    let local = x.local().fast_dot(y.local())?;
    all_reduce_sum_f64(x.comm(), local)
}

/// Floating-point global `Σ x[i]·y[i]·z[i]`; depends on the partition
pub fn distributed_fast_dot3<V, C>(
    x: &DistributedVector<V, C>,
    y: &DistributedVector<V, C>,
    z: &DistributedVector<V, C>,
) -> Result<f64>
where
    V: ExactReduce<Error = dgblas_core::Error>,
    C: Communicator,
{
    x.check_compatible(y, "fast_dot3")?;
    x.check_compatible(z, "fast_dot3")?;
    let local = x.local().fast_dot3(y.local(), z.local())?;
    all_reduce_sum_f64(x.comm(), local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::{SelfComm, ThreadComm};
    use crate::error::Error;
    use crate::vector::Partition;
    use dgblas_core::execution::scalar_sequential;
    use dgblas_dispatch::HostVector;
    use std::sync::Arc;

    #[test]
    fn test_cancellation_across_ranks() {
        let x = [1e16, 1.0, -1e16];
        let y = [1.0; 3];
        let dots = ThreadComm::run(3, |comm| {
            let p = Arc::new(Partition::balanced(3, 3));
            let make = |s: &[f64]| HostVector::from_slice(scalar_sequential(), s);
            let dx = DistributedVector::scatter(&x, p.clone(), comm.clone(), make).unwrap();
            let dy = DistributedVector::scatter(&y, p, comm, make).unwrap();
            (distributed_dot(&dx, &dy).unwrap(), distributed_dot3(&dx, &dy, &dy).unwrap())
        });
        assert_eq!(dots, vec![(1.0, 1.0); 3]);
    }

    #[test]
    fn test_layout_mismatch_before_communication() {
        let comm = SelfComm::new();
        let x = DistributedVector::new(HostVector::zeros(scalar_sequential(), 3), comm.clone(), 3).unwrap();
        let y = DistributedVector::with_partition(
            HostVector::zeros(scalar_sequential(), 3),
            comm,
            Arc::new(Partition::from_counts([3])),
        )
        .unwrap();
        // equal partitions built independently are compatible
        assert_eq!(distributed_dot(&x, &y).unwrap(), 0.0);

        let other = SelfComm::new();
        let z = DistributedVector::new(HostVector::zeros(scalar_sequential(), 3), other, 3).unwrap();
        assert!(matches!(
            distributed_dot(&x, &z),
            Err(Error::CommunicatorMismatch { .. })
        ));
    }

    #[test]
    fn test_fast_dot_sums_partials() {
        let sums = ThreadComm::run(4, |comm| {
            let local = HostVector::from_vec(scalar_sequential(), vec![1.0; comm.rank() + 1]);
            let v = DistributedVector::new(local, comm, 10).unwrap();
            distributed_fast_dot(&v, &v).unwrap()
        });
        assert_eq!(sums, vec![10.0; 4]);
    }
}
