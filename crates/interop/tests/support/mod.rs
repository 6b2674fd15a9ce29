//! Counting mock drivers for the integration tests.
//!
//! `MockSurfaces` backs one NV12 surface with host memory and counts every
//! derive/map/unmap/destroy. `MockSharing` imports planes of that same memory
//! and runs the host conversion where a device kernel would run, so both
//! backends can be checked against each other. Any call can be made to fail
//! by name through a [`Fault`].

#![allow(dead_code)]

use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use vacl_common::{
    Access, BufferId, ComputeRuntime, ConvertKernel, DisplayHandle, Frame, ImageDesc, ImageId,
    InteropError, InteropResult, MediaSharing, NativeApi, Plane, Resolution, SurfaceApi,
    SurfaceId,
};
use vacl_interop::convert::{bgra_to_nv12, nv12_to_bgra, Nv12Planes, Nv12PlanesMut};
use vacl_interop::InteropContext;

pub const FOURCC_NV12: u32 = u32::from_le_bytes(*b"NV12");

pub type MockContext = InteropContext<MockSurfaces, MockSharing>;

pub fn display() -> DisplayHandle {
    DisplayHandle::from_raw(0x1000 as *mut c_void)
}

pub fn other_display() -> DisplayHandle {
    DisplayHandle::from_raw(0x2000 as *mut c_void)
}

// ---------------------------------------------------------------------------
// Counters and fault injection
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Counter(AtomicUsize);

impl Counter {
    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn add(&self, n: usize) {
        self.0.fetch_add(n, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Makes the named native call fail.
#[derive(Debug, Default)]
pub struct Fault(Mutex<Option<&'static str>>);

impl Fault {
    pub fn set(&self, call: &'static str) {
        *self.0.lock() = Some(call);
    }

    pub fn clear(&self) {
        *self.0.lock() = None;
    }

    fn check(&self, api: NativeApi, call: &'static str) -> InteropResult<()> {
        if *self.0.lock() == Some(call) {
            Err(InteropError::native(api, call, -1, "injected failure"))
        } else {
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// VA side
// ---------------------------------------------------------------------------

pub struct MockSurfaces {
    pub desc: Mutex<ImageDesc>,
    memory: Mutex<Vec<u8>>,
    pub fault: Fault,
    /// Every method entry, successful or not.
    pub calls: Counter,
    pub syncs: Counter,
    pub derives: Counter,
    pub destroys: Counter,
    pub maps: Counter,
    pub unmaps: Counter,
}

impl MockSurfaces {
    /// An NV12 surface of `size` whose rows are `pitch` bytes apart.
    pub fn new(size: Resolution, pitch: u32) -> Arc<Self> {
        let luma_size = pitch * size.height;
        let data_size = luma_size + pitch * size.height / 2;
        let desc = ImageDesc {
            image_id: 7,
            buf: 11,
            fourcc: FOURCC_NV12,
            width: size.width,
            height: size.height,
            data_size,
            num_planes: 2,
            pitches: [pitch, pitch, 0],
            offsets: [0, luma_size, 0],
        };
        Arc::new(Self {
            desc: Mutex::new(desc),
            memory: Mutex::new(vec![0u8; data_size as usize]),
            fault: Fault::default(),
            calls: Counter::default(),
            syncs: Counter::default(),
            derives: Counter::default(),
            destroys: Counter::default(),
            maps: Counter::default(),
            unmaps: Counter::default(),
        })
    }

    pub fn memory(&self) -> Vec<u8> {
        self.memory.lock().clone()
    }

    pub fn fill(&self, byte: u8) {
        self.memory.lock().fill(byte);
    }

    /// Every derived image destroyed and every mapping unmapped.
    pub fn balanced(&self) -> bool {
        self.derives.get() == self.destroys.get() && self.maps.get() == self.unmaps.get()
    }

    fn with_planes<R>(&self, f: impl FnOnce(&Nv12Planes<'_>) -> R) -> R {
        let desc = *self.desc.lock();
        let memory = self.memory.lock();
        let (luma, chroma) = memory.split_at(desc.offsets[1] as usize);
        f(&Nv12Planes {
            luma,
            luma_pitch: desc.pitches[0] as usize,
            chroma,
            chroma_pitch: desc.pitches[1] as usize,
        })
    }

    fn with_planes_mut<R>(&self, f: impl FnOnce(&mut Nv12PlanesMut<'_>) -> R) -> R {
        let desc = *self.desc.lock();
        let mut memory = self.memory.lock();
        let (luma, chroma) = memory.split_at_mut(desc.offsets[1] as usize);
        f(&mut Nv12PlanesMut {
            luma,
            luma_pitch: desc.pitches[0] as usize,
            chroma,
            chroma_pitch: desc.pitches[1] as usize,
        })
    }
}

// SAFETY: the mapping points into `memory`, which is never resized, and tests
// do not touch `memory` while an image is mapped.
unsafe impl SurfaceApi for MockSurfaces {
    fn sync_surface(&self, _: DisplayHandle, _: SurfaceId) -> InteropResult<()> {
        self.calls.bump();
        self.fault.check(NativeApi::VaApi, "vaSyncSurface")?;
        self.syncs.bump();
        Ok(())
    }

    fn derive_image(&self, _: DisplayHandle, _: SurfaceId) -> InteropResult<ImageDesc> {
        self.calls.bump();
        self.fault.check(NativeApi::VaApi, "vaDeriveImage")?;
        self.derives.bump();
        Ok(*self.desc.lock())
    }

    fn map_buffer(&self, _: DisplayHandle, _: BufferId) -> InteropResult<NonNull<u8>> {
        self.calls.bump();
        self.fault.check(NativeApi::VaApi, "vaMapBuffer")?;
        self.maps.bump();
        let ptr = self.memory.lock().as_mut_ptr();
        Ok(NonNull::new(ptr).expect("surface memory is never empty"))
    }

    fn unmap_buffer(&self, _: DisplayHandle, _: BufferId) -> InteropResult<()> {
        self.calls.bump();
        self.unmaps.bump();
        self.fault.check(NativeApi::VaApi, "vaUnmapBuffer")
    }

    fn destroy_image(&self, _: DisplayHandle, _: ImageId) -> InteropResult<()> {
        self.calls.bump();
        self.destroys.bump();
        self.fault.check(NativeApi::VaApi, "vaDestroyImage")
    }
}

// ---------------------------------------------------------------------------
// OpenCL side
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct SharingCounters {
    pub fault: Fault,
    pub opened: Counter,
    pub closed: Counter,
    pub imports: Counter,
    pub plane_drops: Counter,
    pub acquires: Counter,
    pub releases: Counter,
    pub buffers: Counter,
    pub buffer_drops: Counter,
    pub writes: Counter,
    pub reads: Counter,
    pub converts: Counter,
    pub finishes: Counter,
}

impl SharingCounters {
    /// Every imported plane, acquisition and buffer has been released.
    pub fn balanced(&self) -> bool {
        self.imports.get() == self.plane_drops.get()
            && self.acquires.get() == self.releases.get()
            && self.buffers.get() == self.buffer_drops.get()
    }
}

pub struct MockPlane {
    plane: Plane,
    access: Access,
    acquired: AtomicBool,
    counters: Arc<SharingCounters>,
}

impl Drop for MockPlane {
    fn drop(&mut self) {
        self.counters.plane_drops.bump();
    }
}

pub struct MockBuffer {
    data: Mutex<Vec<u8>>,
    counters: Arc<SharingCounters>,
}

impl Drop for MockBuffer {
    fn drop(&mut self) {
        self.counters.buffer_drops.bump();
    }
}

pub struct MockSharing {
    display: DisplayHandle,
    device: String,
    surfaces: Arc<MockSurfaces>,
    counters: Arc<SharingCounters>,
}

impl MockSharing {
    pub fn new(
        display: DisplayHandle,
        device: &str,
        surfaces: Arc<MockSurfaces>,
        counters: Arc<SharingCounters>,
    ) -> Self {
        counters.opened.bump();
        Self {
            display,
            device: device.to_string(),
            surfaces,
            counters,
        }
    }

    fn check(&self, call: &'static str) -> InteropResult<()> {
        self.counters.fault.check(NativeApi::OpenCl, call)
    }
}

impl Drop for MockSharing {
    fn drop(&mut self) {
        self.counters.closed.bump();
    }
}

impl MediaSharing for MockSharing {
    type Plane = MockPlane;
    type Buffer = MockBuffer;

    fn display(&self) -> DisplayHandle {
        self.display
    }

    fn device_name(&self) -> &str {
        &self.device
    }

    fn import_plane(&self, _: SurfaceId, plane: Plane, access: Access) -> InteropResult<MockPlane> {
        self.check("clCreateFromVA_APIMediaSurfaceINTEL")?;
        self.counters.imports.bump();
        Ok(MockPlane {
            plane,
            access,
            acquired: AtomicBool::new(false),
            counters: self.counters.clone(),
        })
    }

    fn acquire_planes(&self, planes: &[&MockPlane]) -> InteropResult<()> {
        self.check("clEnqueueAcquireVA_APIMediaSurfacesINTEL")?;
        self.counters.acquires.add(planes.len());
        for plane in planes {
            assert!(!plane.acquired.swap(true, Ordering::SeqCst), "plane acquired twice");
        }
        Ok(())
    }

    fn release_planes(&self, planes: &[&MockPlane]) -> InteropResult<()> {
        self.counters.releases.add(planes.len());
        for plane in planes {
            assert!(plane.acquired.swap(false, Ordering::SeqCst), "plane released twice");
        }
        self.check("clEnqueueReleaseVA_APIMediaSurfacesINTEL")
    }

    fn create_buffer(&self, size: usize, _: Access) -> InteropResult<MockBuffer> {
        self.check("clCreateBuffer")?;
        self.counters.buffers.bump();
        Ok(MockBuffer {
            data: Mutex::new(vec![0u8; size]),
            counters: self.counters.clone(),
        })
    }

    fn write_buffer(&self, buffer: &MockBuffer, data: &[u8]) -> InteropResult<()> {
        self.check("clEnqueueWriteBuffer")?;
        self.counters.writes.bump();
        let mut dst = buffer.data.lock();
        assert_eq!(dst.len(), data.len(), "write must fill the whole buffer");
        dst.copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&self, buffer: &MockBuffer, dst: &mut [u8]) -> InteropResult<()> {
        self.check("clEnqueueReadBuffer")?;
        self.counters.reads.bump();
        let src = buffer.data.lock();
        assert_eq!(src.len(), dst.len(), "read must drain the whole buffer");
        dst.copy_from_slice(&src);
        Ok(())
    }

    fn enqueue_convert(
        &self,
        kernel: ConvertKernel,
        luma: &MockPlane,
        chroma: &MockPlane,
        buffer: &MockBuffer,
        step: usize,
        size: Resolution,
    ) -> InteropResult<()> {
        self.check("clEnqueueNDRangeKernel")?;
        assert_eq!(luma.plane, Plane::Luma);
        assert_eq!(chroma.plane, Plane::Chroma);
        for plane in [luma, chroma] {
            assert_eq!(plane.access, kernel.plane_access());
            if !plane.acquired.load(Ordering::SeqCst) {
                return Err(InteropError::native(
                    NativeApi::OpenCl,
                    "clEnqueueNDRangeKernel",
                    -59,
                    "plane not acquired",
                ));
            }
        }
        self.counters.converts.bump();

        let mut data = buffer.data.lock();
        match kernel {
            ConvertKernel::BgraToNv12 => self
                .surfaces
                .with_planes_mut(|planes| bgra_to_nv12(&data, step, size, planes)),
            ConvertKernel::Nv12ToBgra => self
                .surfaces
                .with_planes(|planes| nv12_to_bgra(planes, size, &mut data, step)),
        }
        Ok(())
    }

    fn finish(&self) -> InteropResult<()> {
        self.check("clFinish")?;
        self.counters.finishes.bump();
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct MockPlatform {
    pub name: &'static str,
    pub shares: bool,
}

pub fn platform(name: &'static str, shares: bool) -> MockPlatform {
    MockPlatform { name, shares }
}

pub struct MockRuntime {
    pub platforms: Vec<MockPlatform>,
    pub enumeration_fails: bool,
    pub build_fails: bool,
    pub surfaces: Arc<MockSurfaces>,
    pub counters: Arc<SharingCounters>,
    pub enumerations: Counter,
    pub open_attempts: Counter,
}

impl MockRuntime {
    pub fn new(
        surfaces: Arc<MockSurfaces>,
        counters: Arc<SharingCounters>,
        platforms: Vec<MockPlatform>,
    ) -> Self {
        Self {
            platforms,
            enumeration_fails: false,
            build_fails: false,
            surfaces,
            counters,
            enumerations: Counter::default(),
            open_attempts: Counter::default(),
        }
    }
}

impl ComputeRuntime for MockRuntime {
    type Platform = MockPlatform;
    type Sharing = MockSharing;

    fn platforms(&self) -> InteropResult<Vec<MockPlatform>> {
        self.enumerations.bump();
        if self.enumeration_fails {
            return Err(InteropError::Init {
                api: NativeApi::OpenCl,
                reason: "can't get number of platforms".to_string(),
            });
        }
        Ok(self.platforms.clone())
    }

    fn platform_name(&self, platform: &MockPlatform) -> String {
        platform.name.to_string()
    }

    fn open_sharing(
        &self,
        platform: &MockPlatform,
        display: DisplayHandle,
    ) -> InteropResult<Option<MockSharing>> {
        self.open_attempts.bump();
        if !platform.shares {
            return Ok(None);
        }
        if self.build_fails {
            return Err(InteropError::Kernel {
                kernel: "nv12_to_bgra".to_string(),
                reason: "build failed".to_string(),
            });
        }
        Ok(Some(MockSharing::new(
            display,
            platform.name,
            self.surfaces.clone(),
            self.counters.clone(),
        )))
    }
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// BGRA frame with one color per 2x2 block, so chroma subsampling is lossless.
pub fn block_pattern(size: Resolution) -> Frame {
    const COLORS: [[u8; 3]; 4] = [[10, 200, 40], [128, 128, 128], [240, 30, 90], [60, 60, 200]];
    let w = size.width as usize;
    let mut data = vec![0u8; w * size.height as usize * 4];
    for y in 0..size.height as usize {
        for x in 0..w {
            let [b, g, r] = COLORS[(x / 2 + y / 2) % COLORS.len()];
            let i = (y * w + x) * 4;
            data[i..i + 4].copy_from_slice(&[b, g, r, 255]);
        }
    }
    Frame::from_bgra(data, size).expect("pattern buffer matches its size")
}

pub fn assert_close(expected: &Frame, actual: &Frame, tolerance: i32) {
    assert_eq!(expected.resolution(), actual.resolution());
    for (i, (a, b)) in expected.as_bytes().iter().zip(actual.as_bytes()).enumerate() {
        assert!(
            (*a as i32 - *b as i32).abs() <= tolerance,
            "byte {i}: expected {a}, got {b}"
        );
    }
}
