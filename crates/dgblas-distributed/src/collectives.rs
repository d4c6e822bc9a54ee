//! Blocking collectives over a [`Communicator`]
//!
//! Reductions use a binomial tree rooted at rank 0: in round `k` every rank
//! with bit `k` set sends its partial to the rank `2^k` below it and leaves.
//! The final value is then broadcast down the same tree. Every rank of the
//! group must enter the same collectives in the same order.

use crate::comm::Communicator;
use crate::error::{Error, Result};
use dgblas_core::Superaccumulator;
use tracing::{instrument, trace};

pub(crate) fn encode_f64s(values: &[f64]) -> Vec<u8> {
    bytemuck::cast_slice::<f64, u8>(values).to_vec()
}

pub(crate) fn decode_f64s(bytes: &[u8]) -> Result<Vec<f64>> {
    if bytes.len() % 8 != 0 {
        return Err(Error::Decode(format!("{} bytes is not a whole number of f64", bytes.len())));
    }
    Ok(bytes
        .chunks_exact(8)
        .map(bytemuck::pod_read_unaligned::<f64>)
        .collect())
}

pub(crate) fn encode_usizes(values: &[usize]) -> Vec<u8> {
    let words: Vec<u64> = values.iter().map(|&v| (v as u64).to_le()).collect();
    bytemuck::cast_slice::<u64, u8>(&words).to_vec()
}

pub(crate) fn decode_usizes(bytes: &[u8]) -> Result<Vec<usize>> {
    if bytes.len() % 8 != 0 {
        return Err(Error::Decode(format!("{} bytes is not a whole number of words", bytes.len())));
    }
    bytes
        .chunks_exact(8)
        .map(|c| {
            let v = u64::from_le(bytemuck::pod_read_unaligned::<u64>(c));
            usize::try_from(v).map_err(|_| Error::Decode(format!("{v} does not fit in usize")))
        })
        .collect()
}

/// Tree-reduce `value` to rank 0 with `combine`
///
/// Returns `Some` on rank 0 and `None` everywhere else.
fn tree_reduce<C, T>(
    comm: &C,
    mut value: T,
    encode: impl Fn(&T) -> Vec<u8>,
    decode: impl Fn(&[u8]) -> Result<T>,
    combine: impl Fn(&mut T, T),
) -> Result<Option<T>>
where
    C: Communicator,
{
    let (rank, size) = (comm.rank(), comm.size());
    let mut step = 1;
    while step < size {
        if rank % (2 * step) == 0 {
            let partner = rank + step;
            if partner < size {
                let other = decode(&comm.recv(partner)?)?;
                combine(&mut value, other);
            }
        } else {
            comm.send(rank - step, encode(&value))?;
            return Ok(None);
        }
        step *= 2;
    }
    Ok(Some(value))
}

/// Broadcast `bytes` from rank 0 to every rank
///
/// Only rank 0's argument is read.
#[instrument(skip_all, fields(rank = comm.rank(), size = comm.size()))]
pub fn broadcast_bytes<C: Communicator>(comm: &C, bytes: Option<Vec<u8>>) -> Result<Vec<u8>> {
    let (rank, size) = (comm.rank(), comm.size());
    let mut data = match (rank, bytes) {
        (0, Some(b)) => b,
        (0, None) => {
            return Err(Error::Communication(
                "broadcast root has nothing to send".to_string(),
            ))
        }
        _ => Vec::new(),
    };

    let mut step = size.next_power_of_two() / 2;
    while step > 0 {
        if rank % (2 * step) == 0 {
            if rank + step < size {
                comm.send(rank + step, data.clone())?;
            }
        } else if rank % (2 * step) == step {
            data = comm.recv(rank - step)?;
        }
        step /= 2;
    }
    Ok(data)
}

/// Exact sum of every rank's accumulator, identical on all ranks
///
/// Partials are merged up the tree and the canonical bytes of the total are
/// broadcast, so every rank rounds the same bits.
#[instrument(skip_all, fields(rank = comm.rank(), size = comm.size()))]
pub fn all_reduce_superacc<C: Communicator>(
    comm: &C,
    mut local: Superaccumulator,
) -> Result<Superaccumulator> {
    local.normalize();
    let root = tree_reduce(
        comm,
        local,
        Superaccumulator::to_bytes,
        |b| Superaccumulator::from_bytes(b).map_err(|e| Error::Decode(e.to_string())),
        |acc, other| acc.merge(&other),
    )?;
    let bytes = broadcast_bytes(comm, root.map(|acc| acc.to_bytes()))?;
    trace!(len = bytes.len(), "superaccumulator broadcast");
    Superaccumulator::from_bytes(&bytes).map_err(|e| Error::Decode(e.to_string()))
}

/// Ordinary floating-point sum over the group
///
/// The tree order is fixed for a given group size, so the result is the same
/// on every rank and every run, but it changes with the partitioning.
pub fn all_reduce_sum_f64<C: Communicator>(comm: &C, value: f64) -> Result<f64> {
    let root = tree_reduce(
        comm,
        value,
        |v| encode_f64s(std::slice::from_ref(v)),
        |b| match decode_f64s(b)?.as_slice() {
            [v] => Ok(*v),
            other => Err(Error::Decode(format!("expected one f64, got {}", other.len()))),
        },
        |a, b| *a += b,
    )?;
    let bytes = broadcast_bytes(comm, root.map(|v| encode_f64s(&[v])))?;
    match decode_f64s(&bytes)?.as_slice() {
        [v] => Ok(*v),
        other => Err(Error::Decode(format!("expected one f64, got {}", other.len()))),
    }
}

/// Every rank's `value`, in rank order, on every rank
#[instrument(skip_all, fields(rank = comm.rank(), size = comm.size()))]
pub fn all_gather_usize<C: Communicator>(comm: &C, value: usize) -> Result<Vec<usize>> {
    let root = tree_reduce(
        comm,
        vec![value],
        |v| encode_usizes(v),
        decode_usizes,
        // the partner's block always covers the ranks right after ours
        |mine, theirs| mine.extend(theirs),
    )?;
    let all = decode_usizes(&broadcast_bytes(comm, root.map(|v| encode_usizes(&v)))?)?;
    if all.len() != comm.size() {
        return Err(Error::Decode(format!(
            "gathered {} values for a group of {}",
            all.len(),
            comm.size()
        )));
    }
    Ok(all)
}

/// Concatenation of every rank's values, in rank order, on every rank
pub fn all_gather_f64<C: Communicator>(comm: &C, local: &[f64]) -> Result<Vec<f64>> {
    let root = tree_reduce(
        comm,
        local.to_vec(),
        |v| encode_f64s(v),
        decode_f64s,
        |mine, theirs| mine.extend(theirs),
    )?;
    decode_f64s(&broadcast_bytes(comm, root.map(|v| encode_f64s(&v)))?)
}

/// Block until every rank of the group has arrived
pub fn barrier<C: Communicator>(comm: &C) -> Result<()> {
    all_gather_usize(comm, 0).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::{SelfComm, ThreadComm};

    #[test]
    fn test_codecs() {
        let v = [1.5, -0.0, f64::MIN_POSITIVE];
        let back = decode_f64s(&encode_f64s(&v)).unwrap();
        assert_eq!(back[1].to_bits(), (-0.0f64).to_bits());
        assert!(decode_f64s(&[0u8; 5]).is_err());
        assert_eq!(decode_usizes(&encode_usizes(&[0, 7, 1 << 40])).unwrap(), vec![0, 7, 1 << 40]);
    }

    #[test]
    fn test_broadcast_reaches_every_rank() {
        for size in [1, 2, 3, 5, 8, 13] {
            let got = ThreadComm::run(size, |comm| {
                let payload = (comm.rank() == 0).then(|| vec![42u8, 7]);
                broadcast_bytes(&comm, payload).unwrap()
            });
            assert!(got.iter().all(|b| b == &vec![42u8, 7]), "size {size}");
        }
    }

    #[test]
    fn test_all_gather_in_rank_order() {
        for size in [1, 2, 6, 7] {
            let got = ThreadComm::run(size, |comm| all_gather_usize(&comm, comm.rank() * 10).unwrap());
            let expected: Vec<usize> = (0..size).map(|r| r * 10).collect();
            assert!(got.iter().all(|v| v == &expected), "size {size}");
        }
    }

    #[test]
    fn test_all_reduce_superacc_is_exact() {
        let got = ThreadComm::run(5, |comm| {
            let mut acc = Superaccumulator::new();
            match comm.rank() {
                0 => acc.accumulate(1e16),
                2 => acc.accumulate(1.0),
                4 => acc.accumulate(-1e16),
                _ => acc.accumulate(0.25),
            }
            all_reduce_superacc(&comm, acc).unwrap().round()
        });
        assert_eq!(got, vec![1.5; 5]);
    }

    #[test]
    fn test_sum_and_barrier_on_self() {
        let comm = SelfComm::new();
        assert_eq!(all_reduce_sum_f64(&comm, 2.5).unwrap(), 2.5);
        barrier(&comm).unwrap();
        let sums = ThreadComm::run(4, |comm| {
            barrier(&comm).unwrap();
            all_reduce_sum_f64(&comm, comm.rank() as f64).unwrap()
        });
        assert_eq!(sums, vec![6.0; 4]);
    }
}
