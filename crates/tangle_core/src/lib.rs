pub mod boxes;
pub mod error;
pub mod series;
pub mod solver;
/// The `tangle_core` crate estimates the full Lyapunov exponent spectrum of
/// a scalar time series with the local-linear ("Jacobian") method.
///
/// Key components:
/// - **Series**: unit rescaling, variance checks, and delay-embedding offsets.
/// - **Boxes**: `NeighborIndex` trait and the box-assisted grid used for
///   radius-based neighbor queries.
/// - **Solver**: Gaussian elimination with partial pivoting, the numerical
///   primitive behind the local regression.
/// - **Tangent**: tangent-basis propagation and Gram-Schmidt stretch factors.
/// - **Spectrum**: the `JacobianMethod` estimator driving the main loop.
pub mod spectrum;
pub mod tangent;
