//! Distributed operators
//!
//! [`DistributedMatrix`] owns the rows of a global sparse operator that
//! belong to this rank. Columns owned by other ranks are read from a ghost
//! buffer filled by a halo exchange before every product. Entries keep their
//! global column order within each row, so a distributed product reproduces
//! the bits of the serial sparse product.
//!
//! [`DistributedDiagonal`] holds distributed weights and needs no
//! communication for products; its weighted dot is a distributed three-way
//! exact dot.

use crate::collectives::{decode_f64s, decode_usizes, encode_f64s, encode_usizes};
use crate::comm::Communicator;
use crate::error::{Error, Result};
use crate::vector::{DistributedVector, Partition};
use dgblas_core::{DiagonalTag, DistributedMatrixTag, Superaccumulator};
use dgblas_dispatch::{
    CsrMatrix, ElementwiseOp, ExactReduce, HostAccess, MatVec, Operator, VResult, Vector, WeightedDot,
};
use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, instrument, trace};

/// Which values travel where during a halo exchange
#[derive(Clone, Debug, Default)]
struct HaloPattern {
    /// Peer rank and the local indices of `x` it needs
    sends: Vec<(usize, Vec<usize>)>,
    /// Peer rank and the ghost slots its values fill
    recvs: Vec<(usize, Range<usize>)>,
}

/// Locally owned rows of a square sparse operator
#[derive(Clone, Debug)]
pub struct DistributedMatrix<C> {
    comm: C,
    partition: Arc<Partition>,
    row_offsets: Vec<usize>,
    /// Below `local_len`: owned entry of `x`; otherwise ghost slot + `local_len`
    columns: Vec<usize>,
    values: Vec<f64>,
    /// Global index of each ghost slot, ascending
    ghosts: Vec<usize>,
    halo: HaloPattern,
    symmetric: bool,
}

impl<C: Communicator> DistributedMatrix<C> {
    /// Collective: take this rank's rows of `global` and set up the halo
    ///
    /// Every rank must pass the same matrix and partition.
    #[instrument(skip_all, fields(rank = comm.rank(), size = comm.size()))]
    pub fn from_global_rows(comm: C, partition: Arc<Partition>, global: &CsrMatrix) -> Result<Self> {
        if global.rows() != global.cols() || global.rows() != partition.global_len() {
            return Err(Error::LayoutMismatch(format!(
                "{}x{} operator for a partition of {}",
                global.rows(),
                global.cols(),
                partition.global_len()
            )));
        }
        if partition.num_parts() != comm.size() {
            return Err(Error::LayoutMismatch(format!(
                "partition has {} parts for a group of {}",
                partition.num_parts(),
                comm.size()
            )));
        }

        let rank = comm.rank();
        let owned = partition.range(rank);
        let local_len = owned.len();

        let ghosts: Vec<usize> = owned
            .clone()
            .flat_map(|i| global.row(i).0.iter().copied())
            .filter(|j| !owned.contains(j))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut row_offsets = Vec::with_capacity(local_len + 1);
        let mut columns = Vec::new();
        let mut values = Vec::new();
        row_offsets.push(0);
        for i in owned.clone() {
            let (cols, vals) = global.row(i);
            for (&j, &v) in cols.iter().zip(vals) {
                let slot = if owned.contains(&j) {
                    j - owned.start
                } else {
                    // ghosts were collected from these very rows
                    local_len + ghosts.binary_search(&j).unwrap_or_default()
                };
                columns.push(slot);
                values.push(v);
            }
            row_offsets.push(columns.len());
        }

        // Ghost indices are sorted and ranges are ordered by rank, so the
        // ghosts of one owner are contiguous.
        let mut recvs: Vec<(usize, Range<usize>)> = Vec::new();
        for (slot, &j) in ghosts.iter().enumerate() {
            let owner = partition
                .owner(j)
                .ok_or_else(|| Error::LayoutMismatch(format!("column {j} has no owner")))?;
            match recvs.last_mut() {
                Some((peer, range)) if *peer == owner => range.end = slot + 1,
                _ => recvs.push((owner, slot..slot + 1)),
            }
        }

        // Tell every peer which of its entries we need (possibly none) and
        // learn what they need from us.
        for peer in (0..comm.size()).filter(|&p| p != rank) {
            let wanted = recvs
                .iter()
                .find(|(p, _)| *p == peer)
                .map(|(_, range)| &ghosts[range.clone()])
                .unwrap_or(&[]);
            comm.send(peer, encode_usizes(wanted))?;
        }
        let mut sends = Vec::new();
        for peer in (0..comm.size()).filter(|&p| p != rank) {
            let wanted = decode_usizes(&comm.recv(peer)?)?;
            if wanted.is_empty() {
                continue;
            }
            if let Some(&j) = wanted.iter().find(|j| !owned.contains(j)) {
                return Err(Error::LayoutMismatch(format!(
                    "rank {peer} asked rank {rank} for column {j} it does not own"
                )));
            }
            sends.push((peer, wanted.into_iter().map(|j| j - owned.start).collect()));
        }

        debug!(
            rows = local_len,
            nnz = values.len(),
            ghosts = ghosts.len(),
            recv_peers = recvs.len(),
            send_peers = sends.len(),
            "halo pattern"
        );

        Ok(Self {
            comm,
            partition,
            row_offsets,
            columns,
            values,
            ghosts,
            halo: HaloPattern { sends, recvs },
            symmetric: global.is_symmetric(),
        })
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn partition(&self) -> &Arc<Partition> {
        &self.partition
    }

    /// Global indices of the off-rank columns this rank reads
    pub fn ghost_columns(&self) -> &[usize] {
        &self.ghosts
    }

    /// Number of locally stored entries
    pub fn local_nnz(&self) -> usize {
        self.values.len()
    }

    fn check_operand<V>(&self, v: &DistributedVector<V, C>, operation: &str) -> Result<()>
    where
        V: Vector<Error = dgblas_core::Error>,
    {
        let (left, right) = (self.comm.group_id(), v.comm().group_id());
        if left != right {
            return Err(Error::CommunicatorMismatch { left, right });
        }
        v.check_partition(&self.partition, operation)
    }

    /// Send owned boundary values and collect the ghost values
    fn exchange_halo(&self, x: &[f64]) -> Result<Vec<f64>> {
        for (peer, indices) in &self.halo.sends {
            let values: Vec<f64> = indices.iter().map(|&i| x[i]).collect();
            self.comm.send(*peer, encode_f64s(&values))?;
        }
        let mut ghost = vec![0.0; self.ghosts.len()];
        for (peer, slots) in &self.halo.recvs {
            let values = decode_f64s(&self.comm.recv(*peer)?)?;
            if values.len() != slots.len() {
                return Err(Error::Decode(format!(
                    "rank {peer} sent {} halo values, expected {}",
                    values.len(),
                    slots.len()
                )));
            }
            ghost[slots.clone()].copy_from_slice(&values);
        }
        trace!(ghosts = ghost.len(), "halo exchanged");
        Ok(ghost)
    }
}

impl<C: Communicator> Operator for DistributedMatrix<C> {
    type Tag = DistributedMatrixTag;

    fn rows(&self) -> usize {
        self.partition.global_len()
    }

    fn cols(&self) -> usize {
        self.partition.global_len()
    }

    fn is_symmetric(&self) -> bool {
        self.symmetric
    }
}

impl<V, C> MatVec<DistributedVector<V, C>> for DistributedMatrix<C>
where
    V: Vector<Error = dgblas_core::Error> + HostAccess,
    C: Communicator,
{
    fn gemv_scaled(
        &self,
        alpha: f64,
        x: &DistributedVector<V, C>,
        beta: f64,
        y: &mut DistributedVector<V, C>,
    ) -> VResult<(), DistributedVector<V, C>> {
        self.check_operand(x, "gemv")?;
        self.check_operand(y, "gemv")?;

        let xs = x.as_slice();
        let ghost = self.exchange_halo(xs)?;
        let local_len = xs.len();
        for (i, out) in y.as_mut_slice().iter_mut().enumerate() {
            let range = self.row_offsets[i]..self.row_offsets[i + 1];
            let r = self.columns[range.clone()]
                .iter()
                .zip(&self.values[range])
                .fold(0.0, |s, (&c, &v)| {
                    let xj = if c < local_len { xs[c] } else { ghost[c - local_len] };
                    s + v * xj
                });
            *out = if beta == 0.0 { alpha * r } else { alpha * r + beta * *out };
        }
        Ok(())
    }
}

impl<V, C> WeightedDot<DistributedVector<V, C>> for DistributedMatrix<C>
where
    V: ExactReduce<Error = dgblas_core::Error> + HostAccess,
    C: Communicator,
{
    fn weighted_dot_superacc(
        &self,
        x: &DistributedVector<V, C>,
        y: &DistributedVector<V, C>,
    ) -> VResult<Superaccumulator, DistributedVector<V, C>> {
        let mut my = y.clone();
        self.gemv(y, &mut my)?;
        x.dot_superacc(&my)
    }

    fn weighted_fast_dot(
        &self,
        x: &DistributedVector<V, C>,
        y: &DistributedVector<V, C>,
    ) -> VResult<f64, DistributedVector<V, C>> {
        let mut my = y.clone();
        self.gemv(y, &mut my)?;
        x.fast_dot(&my)
    }
}

/// Diagonal operator with distributed weights
#[derive(Clone, Debug)]
pub struct DistributedDiagonal<V, C> {
    weights: DistributedVector<V, C>,
}

impl<V, C> DistributedDiagonal<V, C>
where
    V: ElementwiseOp<Error = dgblas_core::Error>,
    C: Communicator,
{
    pub fn new(weights: DistributedVector<V, C>) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &DistributedVector<V, C> {
        &self.weights
    }

    /// Elementwise reciprocal of the weights
    pub fn inverse(&self) -> Self {
        let mut weights = self.weights.clone();
        weights.apply(|w| 1.0 / w);
        Self { weights }
    }
}

impl<V, C> Operator for DistributedDiagonal<V, C>
where
    V: Vector<Error = dgblas_core::Error>,
    C: Communicator,
{
    type Tag = DiagonalTag;

    fn rows(&self) -> usize {
        self.weights.len()
    }

    fn cols(&self) -> usize {
        self.weights.len()
    }

    fn is_symmetric(&self) -> bool {
        true
    }
}

impl<V, C> MatVec<DistributedVector<V, C>> for DistributedDiagonal<V, C>
where
    V: ElementwiseOp<Error = dgblas_core::Error>,
    C: Communicator,
{
    fn gemv_scaled(
        &self,
        alpha: f64,
        x: &DistributedVector<V, C>,
        beta: f64,
        y: &mut DistributedVector<V, C>,
    ) -> VResult<(), DistributedVector<V, C>> {
        y.check_compatible(x, "gemv")?;
        y.check_compatible(&self.weights, "gemv")?;
        let w = self.weights.local();
        let result = if beta == 0.0 {
            y.local_mut()
                .apply_with2(x.local(), w, move |_, a, d| alpha * d * a)
        } else {
            y.local_mut()
                .apply_with2(x.local(), w, move |v, a, d| alpha * d * a + beta * v)
        };
        Ok(result?)
    }
}

impl<V, C> WeightedDot<DistributedVector<V, C>> for DistributedDiagonal<V, C>
where
    V: ElementwiseOp<Error = dgblas_core::Error> + ExactReduce,
    C: Communicator,
{
    fn weighted_dot_superacc(
        &self,
        x: &DistributedVector<V, C>,
        y: &DistributedVector<V, C>,
    ) -> VResult<Superaccumulator, DistributedVector<V, C>> {
        x.dot3_superacc(&self.weights, y)
    }

    fn weighted_fast_dot(
        &self,
        x: &DistributedVector<V, C>,
        y: &DistributedVector<V, C>,
    ) -> VResult<f64, DistributedVector<V, C>> {
        x.fast_dot3(&self.weights, y)
    }
}
