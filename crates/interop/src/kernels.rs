//! Embedded OpenCL source for the shared path.
//!
//! `kernels/opencl/nv12_bgra.cl` defines the entry points named by
//! [`vacl_common::ConvertKernel`]. It is compiled once per sharing context.

/// Source of the NV12 <-> BGRA conversion program.
pub const NV12_BGRA_SOURCE: &str = include_str!("../../../kernels/opencl/nv12_bgra.cl");
