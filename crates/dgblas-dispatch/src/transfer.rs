//! Moving values between container kinds
//!
//! A transfer copies every value bit for bit and resizes the destination to
//! the source length. The destination keeps its own engine, so transferring
//! a host vector into a vector driven by another engine is how the execution
//! backend of existing data is changed.

use crate::container::Container;
use crate::device::DeviceVector;
use crate::traits::{HostAccess, Vector};
use crate::vector::HostVector;
use dgblas_core::{
    DeviceBuffer, DeviceEngine, ExecutionEngine, LaneBackend, Result, ScalarBackend,
    SequentialEngine,
};
use tracing::trace;

/// Copy `self` into a container of type `Dst`
pub trait Transfer<Dst> {
    fn transfer_into(&self, dst: &mut Dst) -> Result<()>;
}

/// `dst = src`, across container kinds
pub fn transfer<Src, Dst>(src: &Src, dst: &mut Dst) -> Result<()>
where
    Src: Transfer<Dst>,
{
    src.transfer_into(dst)
}

impl<E: ExecutionEngine, F: ExecutionEngine> Transfer<HostVector<F>> for HostVector<E> {
    fn transfer_into(&self, dst: &mut HostVector<F>) -> Result<()> {
        dst.resize(self.len());
        dst.as_mut_slice().copy_from_slice(self.as_slice());
        Ok(())
    }
}

impl<E: ExecutionEngine> Transfer<DeviceVector> for HostVector<E> {
    fn transfer_into(&self, dst: &mut DeviceVector) -> Result<()> {
        trace!(len = self.len(), "host to device");
        dst.replace_buffer(DeviceBuffer::upload(self.as_slice()));
        Ok(())
    }
}

impl<E: ExecutionEngine> Transfer<HostVector<E>> for DeviceVector {
    fn transfer_into(&self, dst: &mut HostVector<E>) -> Result<()> {
        trace!(len = self.len(), "device to host");
        dst.resize(self.len());
        dst.as_mut_slice().copy_from_slice(self.device_slice());
        Ok(())
    }
}

impl Transfer<DeviceVector> for DeviceVector {
    fn transfer_into(&self, dst: &mut DeviceVector) -> Result<()> {
        dst.replace_buffer(self.buffer().clone());
        Ok(())
    }
}

/// Engines a transfer can build from host capabilities alone
pub trait DefaultEngine: ExecutionEngine {
    fn default_engine() -> Result<Self>;
}

impl DefaultEngine for SequentialEngine<ScalarBackend> {
    fn default_engine() -> Result<Self> {
        Ok(Self::new(ScalarBackend::try_new()?))
    }
}

impl DefaultEngine for SequentialEngine<LaneBackend> {
    fn default_engine() -> Result<Self> {
        Ok(Self::new(LaneBackend::try_new()?))
    }
}

#[cfg(feature = "parallel")]
impl DefaultEngine for dgblas_core::ParallelEngine<ScalarBackend> {
    fn default_engine() -> Result<Self> {
        Ok(Self::new(ScalarBackend::try_new()?))
    }
}

#[cfg(feature = "parallel")]
impl DefaultEngine for dgblas_core::ParallelEngine<LaneBackend> {
    fn default_engine() -> Result<Self> {
        Ok(Self::new(LaneBackend::try_new()?))
    }
}

impl DefaultEngine for DeviceEngine {
    fn default_engine() -> Result<Self> {
        DeviceEngine::new()
    }
}

/// Leaf vectors a transfer can create when the destination has none to copy
pub trait NewLeaf: Vector {
    /// Empty vector on a default engine
    fn new_leaf() -> Result<Self>;
}

impl<E: DefaultEngine> NewLeaf for HostVector<E> {
    fn new_leaf() -> Result<Self> {
        Ok(HostVector::zeros(E::default_engine()?, 0))
    }
}

impl NewLeaf for DeviceVector {
    fn new_leaf() -> Result<Self> {
        Ok(DeviceVector::zeros(DeviceEngine::default_engine()?, 0))
    }
}

/// The destination adopts the source block structure. New leaves are cloned
/// from the first leaf of the destination so they keep its engine; a
/// destination without leaves gets them from [`NewLeaf`].
impl<A, B> Transfer<Container<B>> for Container<A>
where
    A: Vector + Transfer<B>,
    B: NewLeaf,
{
    fn transfer_into(&self, dst: &mut Container<B>) -> Result<()> {
        let prototype = match dst.first_leaf() {
            Some(leaf) => leaf.clone(),
            None => {
                trace!("transfer into a container without leaves");
                B::new_leaf()?
            }
        };
        *dst = rebuild(self, &prototype)?;
        Ok(())
    }
}

fn rebuild<A, B>(src: &Container<A>, prototype: &B) -> Result<Container<B>>
where
    A: Vector + Transfer<B>,
    B: Vector,
{
    match src {
        Container::Leaf(v) => {
            let mut leaf = prototype.clone();
            v.transfer_into(&mut leaf)?;
            Ok(Container::Leaf(leaf))
        }
        Container::Blocks(blocks) => blocks
            .iter()
            .map(|b| rebuild(b, prototype))
            .collect::<Result<Vec<_>>>()
            .map(Container::Blocks),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dgblas_core::execution::{lane_sequential, scalar_sequential};
    use dgblas_core::ReductionPrimitives;

    #[test]
    fn test_host_to_host_changes_engine() {
        let src = HostVector::from_slice(scalar_sequential(), &[1.0, -0.0, f64::MIN_POSITIVE / 8.0]);
        let mut dst = HostVector::zeros(lane_sequential(), 7);
        transfer(&src, &mut dst).unwrap();
        assert_eq!(dst.len(), 3);
        for (a, b) in src.as_slice().iter().zip(dst.as_slice()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_device_round_trip() {
        let device = DeviceEngine::with_block_size(2).unwrap();
        let values = vec![f64::NAN, 1e-310, -3.5, f64::INFINITY];
        let src = HostVector::from_slice(scalar_sequential(), &values);
        let mut dv = DeviceVector::zeros(device.clone(), 0);
        transfer(&src, &mut dv).unwrap();
        let mut dv2 = DeviceVector::zeros(device, 1);
        transfer(&dv, &mut dv2).unwrap();
        let mut back = HostVector::zeros(scalar_sequential(), 0);
        transfer(&dv2, &mut back).unwrap();
        let bits: Vec<u64> = back.as_slice().iter().map(|v| v.to_bits()).collect();
        let expected: Vec<u64> = values.iter().map(|v| v.to_bits()).collect();
        assert_eq!(bits, expected);
    }

    #[test]
    fn test_block_transfer_adopts_structure() {
        let src = Container::blocks(vec![
            Container::from_leaves([
                HostVector::from_slice(scalar_sequential(), &[1.0]),
                HostVector::from_slice(scalar_sequential(), &[2.0, 3.0]),
            ]),
            Container::leaf(HostVector::from_slice(scalar_sequential(), &[4.0])),
        ]);
        let device = DeviceEngine::with_block_size(4).unwrap();
        let mut dst = Container::leaf(DeviceVector::zeros(device, 0));
        transfer(&src, &mut dst).unwrap();
        assert_eq!(dst.num_blocks(), 2);
        let leaves: Vec<Vec<f64>> = dst.leaves().iter().map(|v| v.download()).collect();
        assert_eq!(leaves, vec![vec![1.0], vec![2.0, 3.0], vec![4.0]]);
    }

    #[test]
    fn test_block_transfer_into_empty_container() {
        let src = Container::blocks(vec![
            Container::from_leaves([
                HostVector::from_slice(scalar_sequential(), &[1.0]),
                HostVector::from_slice(scalar_sequential(), &[2.0, 3.0]),
            ]),
            Container::leaf(HostVector::from_slice(scalar_sequential(), &[-0.0])),
        ]);

        let mut host: Container<HostVector<SequentialEngine<LaneBackend>>> =
            Container::blocks(Vec::new());
        transfer(&src, &mut host).unwrap();
        assert_eq!(host.num_blocks(), 2);
        let leaves: Vec<Vec<u64>> = host
            .leaves()
            .iter()
            .map(|v| v.as_slice().iter().map(|x| x.to_bits()).collect())
            .collect();
        let expected: Vec<Vec<u64>> = src
            .leaves()
            .iter()
            .map(|v| v.as_slice().iter().map(|x| x.to_bits()).collect())
            .collect();
        assert_eq!(leaves, expected);
        let backend = host.first_leaf().map(|v| v.engine().primitives().backend_name());
        assert_eq!(backend, Some("lanes"));

        let mut device: Container<DeviceVector> = Container::blocks(Vec::new());
        transfer(&src, &mut device).unwrap();
        let downloaded: Vec<Vec<f64>> = device.leaves().iter().map(|v| v.download()).collect();
        assert_eq!(downloaded, vec![vec![1.0], vec![2.0, 3.0], vec![-0.0]]);
    }
}
