//! Shared backend against counting mock OpenCL and libva drivers.

mod support;

use std::sync::Arc;

use vacl_common::{InteropError, Resolution, SharingMode, SurfaceId};
use vacl_interop::{Backend, SurfaceTransfer};

use support::{
    assert_close, block_pattern, display, other_display, platform, MockContext, MockRuntime,
    MockSurfaces, SharingCounters,
};

const SURFACE: SurfaceId = SurfaceId(9);

struct Rig {
    surfaces: Arc<MockSurfaces>,
    counters: Arc<SharingCounters>,
    ctx: MockContext,
}

fn rig(size: Resolution, pitch: u32) -> Rig {
    let surfaces = MockSurfaces::new(size, pitch);
    let counters = Arc::new(SharingCounters::default());
    let runtime = MockRuntime::new(
        surfaces.clone(),
        counters.clone(),
        vec![platform("Intel(R) OpenCL Graphics", true)],
    );
    let ctx =
        MockContext::negotiate_with(display(), surfaces.clone(), Some(&runtime), SharingMode::Auto)
            .unwrap();
    assert!(ctx.is_sharing());
    Rig {
        surfaces,
        counters,
        ctx,
    }
}

#[test]
fn round_trip_within_quantization_error() {
    let size = Resolution::new(16, 8);
    let rig = rig(size, 32);

    let frame = block_pattern(size);
    rig.ctx.upload(display(), &frame, SURFACE, size).unwrap();
    let out = rig.ctx.download(display(), SURFACE, size).unwrap();
    assert_close(&frame, &out, 4);

    let c = &rig.counters;
    assert_eq!(c.imports.get(), 4);
    assert_eq!(c.acquires.get(), 4);
    assert_eq!(c.converts.get(), 2);
    assert_eq!(c.finishes.get(), 2);
    assert_eq!((c.writes.get(), c.reads.get()), (1, 1));
    assert!(c.balanced());
    // The mapped-copy path is never taken.
    assert_eq!(rig.surfaces.calls.get(), 0);
}

#[test]
fn shared_upload_matches_copy_download() {
    let size = Resolution::new(8, 4);
    let rig = rig(size, 16);
    let frame = block_pattern(size);
    rig.ctx.upload(display(), &frame, SURFACE, size).unwrap();

    let copy = MockContext::with_copy(display(), rig.surfaces.clone());
    let out = copy.download(display(), SURFACE, size).unwrap();
    assert_close(&frame, &out, 4);
}

#[test]
fn backend_reports_device() {
    let rig = rig(Resolution::new(8, 4), 8);
    assert_eq!(rig.ctx.backend().name(), "shared");
    match rig.ctx.backend() {
        Backend::Shared(shared) => assert_eq!(shared.device_name(), "Intel(R) OpenCL Graphics"),
        Backend::Copy(_) => panic!("expected the shared backend"),
    }
}

#[test]
fn foreign_display_rejected_before_import() {
    let size = Resolution::new(8, 4);
    let rig = rig(size, 8);

    let err = rig
        .ctx
        .upload(other_display(), &block_pattern(size), SURFACE, size)
        .unwrap_err();
    assert!(matches!(err, InteropError::DisplayMismatch));
    let err = rig.ctx.download(other_display(), SURFACE, size).unwrap_err();
    assert!(matches!(err, InteropError::DisplayMismatch));
    assert_eq!(rig.counters.imports.get(), 0);
}

#[test]
fn precondition_failure_makes_no_sharing_call() {
    let rig = rig(Resolution::new(8, 4), 8);
    let frame = block_pattern(Resolution::new(8, 4));

    let err = rig
        .ctx
        .upload(display(), &frame, SURFACE, Resolution::new(8, 6))
        .unwrap_err();
    assert!(err.is_precondition());
    assert_eq!(rig.counters.imports.get(), 0);
    assert_eq!(rig.counters.buffers.get(), 0);
}

#[test]
fn kernel_failure_releases_planes() {
    let size = Resolution::new(8, 4);
    let rig = rig(size, 8);
    rig.counters.fault.set("clEnqueueNDRangeKernel");

    let err = rig.ctx.upload(display(), &block_pattern(size), SURFACE, size).unwrap_err();
    assert_eq!(err.failing_call(), Some("clEnqueueNDRangeKernel"));

    let c = &rig.counters;
    assert_eq!(c.acquires.get(), 2);
    assert_eq!(c.releases.get(), 2);
    assert_eq!(c.finishes.get(), 0);
    assert!(c.balanced());
}

#[test]
fn release_failure_is_reported_once() {
    let size = Resolution::new(8, 4);
    let rig = rig(size, 8);
    rig.counters.fault.set("clEnqueueReleaseVA_APIMediaSurfacesINTEL");

    let err = rig.ctx.download(display(), SURFACE, size).unwrap_err();
    assert_eq!(
        err.failing_call(),
        Some("clEnqueueReleaseVA_APIMediaSurfacesINTEL")
    );
    assert_eq!(rig.counters.releases.get(), 2);
    assert_eq!(rig.counters.reads.get(), 0);
    assert!(rig.counters.balanced());
}

#[test]
fn acquire_failure_releases_nothing() {
    let size = Resolution::new(8, 4);
    let rig = rig(size, 8);
    rig.counters.fault.set("clEnqueueAcquireVA_APIMediaSurfacesINTEL");

    rig.ctx.download(display(), SURFACE, size).unwrap_err();
    assert_eq!(rig.counters.acquires.get(), 0);
    assert_eq!(rig.counters.releases.get(), 0);
    assert!(rig.counters.balanced());
}

#[test]
fn import_failure_creates_nothing() {
    let size = Resolution::new(8, 4);
    let rig = rig(size, 8);
    rig.counters
        .fault
        .set("clCreateFromVA_APIMediaSurfaceINTEL");

    let err = rig.ctx.upload(display(), &block_pattern(size), SURFACE, size).unwrap_err();
    assert!(err.is_native());
    assert_eq!(rig.counters.imports.get(), 0);
    assert_eq!(rig.counters.buffers.get(), 0);
}

#[test]
fn concurrent_transfers_are_serialized() {
    let size = Resolution::new(8, 4);
    let rig = rig(size, 8);
    let frame = block_pattern(size);

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..8 {
                    rig.ctx.upload(display(), &frame, SURFACE, size).unwrap();
                    let out = rig.ctx.download(display(), SURFACE, size).unwrap();
                    assert_close(&frame, &out, 4);
                }
            });
        }
    });

    assert_eq!(rig.counters.finishes.get(), 64);
    assert!(rig.counters.balanced());
}
