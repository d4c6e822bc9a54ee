//! The conjugate gradient iterates do not depend on the container kind

use dgblas_core::execution::{lane_sequential, scalar_sequential};
use dgblas_core::{DeviceEngine, Error};
use dgblas_dispatch::prelude::*;

const N: usize = 40;

fn laplacian() -> StencilMatrix {
    StencilMatrix::laplacian_1d(N, 1.0 / (N as f64 + 1.0), Boundary::Dirichlet).unwrap()
}

fn rhs() -> Vec<f64> {
    (0..N).map(|i| ((i as f64) * 0.7).sin() + 0.1).collect()
}

fn bits(values: &[f64]) -> Vec<u64> {
    values.iter().map(|v| v.to_bits()).collect()
}

/// Iterate exactly `steps` times (eps = 0 never converges)
fn host_iterates(steps: usize, chunk: usize) -> Vec<f64> {
    let e = lane_sequential().with_chunk_size(chunk);
    let b = HostVector::from_vec(e.clone(), rhs());
    let mut x = HostVector::zeros(e, N);
    let result = ConjugateGradient::new(steps).solve(
        &laplacian(),
        &mut x,
        &b,
        &DiagonalMatrix::identity(N),
        0.0,
    );
    assert!(matches!(result, Err(Error::NotConverged { iterations, .. }) if iterations == steps));
    x.into_vec()
}

#[test]
fn test_iterates_independent_of_chunking() {
    let reference = host_iterates(7, 4096);
    for chunk in [1, 3, 8, 13] {
        assert_eq!(bits(&host_iterates(7, chunk)), bits(&reference));
    }
}

#[test]
fn test_device_iterates_match_host() {
    let reference = host_iterates(7, 4096);
    let device = DeviceEngine::with_block_size(6).unwrap();
    let b = DeviceVector::upload(device.clone(), &rhs());
    let mut x = DeviceVector::zeros(device, N);
    let result = ConjugateGradient::new(7).solve(
        &laplacian(),
        &mut x,
        &b,
        &DiagonalMatrix::identity(N),
        0.0,
    );
    assert!(result.is_err());
    assert_eq!(bits(&x.download()), bits(&reference));
}

#[test]
fn test_duplicated_blocks_follow_single_field() {
    // Every inner product doubles, so alpha and beta are unchanged
    let reference = host_iterates(7, 4096);
    let e = scalar_sequential();
    let field = HostVector::from_vec(e.clone(), rhs());
    let b = Container::from_leaves([field.clone(), field]);
    let mut x = Container::from_leaves([HostVector::zeros(e.clone(), N), HostVector::zeros(e, N)]);
    let result = ConjugateGradient::new(7).solve(
        &laplacian(),
        &mut x,
        &b,
        &DiagonalMatrix::identity(N),
        0.0,
    );
    assert!(result.is_err());
    for leaf in x.leaves() {
        assert_eq!(bits(leaf.as_slice()), bits(&reference));
    }
}

#[test]
fn test_solves_to_tolerance() {
    let e = lane_sequential();
    let b = HostVector::from_vec(e.clone(), rhs());
    let mut x = HostVector::zeros(e.clone(), N);
    let a = laplacian();
    let iterations = ConjugateGradient::new(200)
        .solve(&a, &mut x, &b, &DiagonalMatrix::identity(N), 1e-10)
        .unwrap();
    assert!(iterations > 0);

    let mut r = b.clone();
    blas2::gemv_scaled(-1.0, &a, &x, 1.0, &mut r).unwrap();
    let bound = 1e-10 * (blas1::norm2(&b).unwrap() + 1.0);
    assert!(blas1::norm2(&r).unwrap() <= bound);
}

#[cfg(feature = "parallel")]
#[test]
fn test_parallel_iterates_match_host() {
    let reference = host_iterates(7, 4096);
    let e = dgblas_core::execution::lane_parallel().with_chunk_size(5);
    let b = HostVector::from_vec(e.clone(), rhs());
    let mut x = HostVector::zeros(e, N);
    let _ = ConjugateGradient::new(7).solve(
        &laplacian(),
        &mut x,
        &b,
        &DiagonalMatrix::identity(N),
        0.0,
    );
    assert_eq!(bits(x.as_slice()), bits(&reference));
}
