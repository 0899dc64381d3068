// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Software stand-ins for the MVD service and for linear memory.
//!
//! [`FakeService`] decodes the command buffers it receives, records them, and answers the way the
//! service does, optionally stalling renders for a number of polls or returning scripted result
//! codes. [`FakeLinearMemory`] hands out addresses from the console's linear heap window and can
//! map host buffers to made-up physical addresses. Both are cheap handles over shared state, so a
//! test can keep a clone to inspect after moving the other into a [`Session`](crate::Session).

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use log::debug;

use crate::config::Config;
use crate::error::TransportError;
use crate::ipc::CommandBuffer;
use crate::ipc::CommandId;
use crate::ipc::Request;
use crate::ipc::Transport;
use crate::ipc::SERVICE_NAME;
use crate::memory::AddressTranslator;
use crate::memory::CtrMemoryMap;
use crate::memory::LinearAllocation;
use crate::memory::LinearAllocator;
use crate::memory::PhysAddr;
use crate::memory::VirtAddr;
use crate::status::ResultCode;

/// Result returned when connecting to a port that does not exist or is taken.
pub const PORT_NOT_FOUND: ResultCode = ResultCode(0xD880_07FA);

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Default)]
struct ServiceState {
    unavailable: bool,
    connected: bool,
    initialized: bool,
    requests: Vec<Request>,
    config: Option<Config>,
    render_busy_polls: u32,
    decoded_frames: u32,
    scripted: HashMap<u16, VecDeque<ResultCode>>,
}

impl ServiceState {
    fn reply_to(&mut self, request: &Request) -> ResultCode {
        use crate::ipc::Request::*;

        if let Some(code) = self
            .scripted
            .get_mut(&(request.command_id() as u16))
            .and_then(VecDeque::pop_front)
        {
            return code;
        }

        match request {
            Initialize { .. } => {
                self.initialized = true;
                ResultCode::SUCCESS
            }
            Shutdown => {
                self.initialized = false;
                self.config = None;
                ResultCode::SUCCESS
            }
            BeginColorConversion | EndColorConversion => ResultCode::SUCCESS,
            SetConfig(config) => {
                self.config = Some(*config);
                ResultCode::OK
            }
            ConvertImage => ResultCode::OK,
            ProcessNalUnit { .. } => {
                self.decoded_frames += 1;
                ResultCode::OK
            }
            RenderFrame => {
                if self.render_busy_polls > 0 {
                    self.render_busy_polls -= 1;
                    ResultCode::BUSY
                } else {
                    ResultCode::OK
                }
            }
        }
    }
}

/// Scriptable model of the `mvd:STD` service.
#[derive(Clone, Default)]
pub struct FakeService {
    state: Arc<Mutex<ServiceState>>,
}

impl FakeService {
    pub fn new() -> Self {
        Default::default()
    }

    /// Makes `connect` fail, as when the hardware is absent or the port is in use.
    pub fn set_unavailable(&self, unavailable: bool) {
        lock(&self.state).unavailable = unavailable;
    }

    /// The next `polls` render requests report `BUSY`.
    pub fn set_render_busy_polls(&self, polls: u32) {
        lock(&self.state).render_busy_polls = polls;
    }

    /// Answers the next `command` with `code` instead of the modeled reply.
    pub fn push_result(&self, command: CommandId, code: ResultCode) {
        lock(&self.state)
            .scripted
            .entry(command as u16)
            .or_default()
            .push_back(code);
    }

    /// Closes the connection from the service side. Later requests fail in the transport.
    pub fn drop_connection(&self) {
        lock(&self.state).connected = false;
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    pub fn is_initialized(&self) -> bool {
        lock(&self.state).initialized
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<Request> {
        lock(&self.state).requests.clone()
    }

    pub fn commands(&self) -> Vec<CommandId> {
        lock(&self.state)
            .requests
            .iter()
            .map(Request::command_id)
            .collect()
    }

    /// The configuration most recently set on the service.
    pub fn config(&self) -> Option<Config> {
        lock(&self.state).config
    }

    pub fn decoded_frames(&self) -> u32 {
        lock(&self.state).decoded_frames
    }
}

impl Transport for FakeService {
    fn connect(&mut self, service: &str) -> std::result::Result<(), TransportError> {
        let mut state = lock(&self.state);
        if state.unavailable || state.connected || service != SERVICE_NAME {
            return Err(TransportError::Connect(service.to_string(), PORT_NOT_FOUND));
        }
        state.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        lock(&self.state).connected = false;
    }

    fn send_sync_request(
        &mut self,
        cmd: &mut CommandBuffer,
        buffer: Option<&[u8]>,
    ) -> std::result::Result<(), TransportError> {
        let mut state = lock(&self.state);
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        let request = Request::decode(cmd, buffer)?;
        let code = state.reply_to(&request);
        debug!("fake mvd: {} -> {}", request, code);
        cmd.set_reply(request.command_id() as u16, code);
        state.requests.push(request);
        Ok(())
    }
}

// Window of the console's linear heap the fake allocates from.
const HEAP_START: usize = 0x1400_0000;
const HEAP_END: usize = 0x1C00_0000;
// Physical base for host buffers mapped with `register`. Outside every real window.
const HOST_PHYS_BASE: u32 = 0x4000_0000;

struct HostRegion {
    len: usize,
    phys: u32,
}

struct MemoryState {
    capacity: usize,
    next: usize,
    live: BTreeMap<usize, usize>,
    host: BTreeMap<usize, HostRegion>,
    next_host_phys: u32,
}

/// Linear memory model backed by address bookkeeping only. No bytes are allocated.
#[derive(Clone)]
pub struct FakeLinearMemory {
    state: Arc<Mutex<MemoryState>>,
}

impl Default for FakeLinearMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeLinearMemory {
    /// A heap spanning the whole linear window.
    pub fn new() -> Self {
        Self::with_capacity(HEAP_END - HEAP_START)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        FakeLinearMemory {
            state: Arc::new(Mutex::new(MemoryState {
                capacity: capacity.min(HEAP_END - HEAP_START),
                next: HEAP_START,
                live: BTreeMap::new(),
                host: BTreeMap::new(),
                next_host_phys: HOST_PHYS_BASE,
            })),
        }
    }

    /// Treats `buf` as DMA-visible and returns the physical address it now translates to.
    ///
    /// The buffer must not move while it is registered.
    pub fn register(&self, buf: &[u8]) -> PhysAddr {
        let mut state = lock(&self.state);
        let start = VirtAddr::of_slice(buf).offset();
        let phys = state.next_host_phys;
        // Keep regions 4 KiB apart in physical space.
        let span = ((buf.len().max(1) + 0xFFF) & !0xFFF) as u32;
        state.next_host_phys = state.next_host_phys.wrapping_add(span);
        state.host.insert(
            start,
            HostRegion {
                len: buf.len(),
                phys,
            },
        );
        PhysAddr::new(phys)
    }

    /// Forgets a buffer passed to `register`.
    pub fn unregister(&self, buf: &[u8]) {
        lock(&self.state)
            .host
            .remove(&VirtAddr::of_slice(buf).offset());
    }

    pub fn live_allocations(&self) -> usize {
        lock(&self.state).live.len()
    }
}

impl AddressTranslator for FakeLinearMemory {
    fn virt_to_phys(&self, vaddr: VirtAddr) -> Option<PhysAddr> {
        let state = lock(&self.state);
        let v = vaddr.offset();
        if let Some((start, region)) = state.host.range(..=v).next_back() {
            if v < start + region.len.max(1) {
                return region.phys.checked_add((v - start) as u32).map(PhysAddr::new);
            }
        }
        CtrMemoryMap.virt_to_phys(vaddr)
    }
}

impl LinearAllocator for FakeLinearMemory {
    fn allocate(&mut self, size: usize, align: usize) -> Option<LinearAllocation> {
        let mut state = lock(&self.state);
        let align = align.max(1);
        let start = state.next.checked_add(align - 1)? / align * align;
        let end = start.checked_add(size.max(1))?;
        if end > HEAP_START + state.capacity {
            return None;
        }
        state.next = end;
        state.live.insert(start, size);
        Some(LinearAllocation {
            addr: VirtAddr(start),
            size,
        })
    }

    fn free(&mut self, allocation: LinearAllocation) {
        let mut state = lock(&self.state);
        if state.live.remove(&allocation.addr.offset()).is_none() {
            debug!("fake linear memory: double free of {}", allocation.addr);
        }
        if state.live.is_empty() {
            state.next = HEAP_START;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::call;

    #[test]
    fn allocations_are_aligned_and_translated() {
        let mut memory = FakeLinearMemory::new();
        let a = memory.allocate(3, 0x40).unwrap();
        let b = memory.allocate(0x100, 0x40).unwrap();
        assert_eq!(a.addr, VirtAddr(HEAP_START));
        assert_eq!(b.addr.offset() % 0x40, 0);
        assert!(b.addr.offset() > a.addr.offset());
        assert_eq!(memory.virt_to_phys(a.addr), Some(PhysAddr::new(0x2000_0000)));
        assert_eq!(memory.live_allocations(), 2);
        memory.free(a);
        memory.free(b);
        assert_eq!(memory.live_allocations(), 0);
    }

    #[test]
    fn capacity_is_enforced() {
        let mut memory = FakeLinearMemory::with_capacity(0x100);
        assert!(memory.allocate(0x101, 1).is_none());
        assert!(memory.allocate(0x100, 1).is_some());
        assert!(memory.allocate(1, 1).is_none());
    }

    #[test]
    fn host_buffers() {
        let memory = FakeLinearMemory::new();
        let buf = vec![0u8; 0x20];
        let phys = memory.register(&buf);
        assert_eq!(memory.virt_to_phys(VirtAddr::of_slice(&buf)), Some(phys));
        assert_eq!(
            memory.virt_to_phys(VirtAddr::of_slice(&buf[0x10..])),
            Some(PhysAddr::new(phys.offset() + 0x10))
        );
        let past_end = VirtAddr(VirtAddr::of_slice(&buf).offset() + 0x20);
        assert_ne!(memory.virt_to_phys(past_end), Some(PhysAddr::new(phys.offset() + 0x20)));
        memory.unregister(&buf);
        assert_ne!(memory.virt_to_phys(VirtAddr::of_slice(&buf)), Some(phys));
    }

    #[test]
    fn service_requires_connection() {
        let mut service = FakeService::new();
        assert!(matches!(
            call(&mut service, &Request::ConvertImage),
            Err(TransportError::NotConnected)
        ));
        service.connect(SERVICE_NAME).unwrap();
        assert!(service.connect(SERVICE_NAME).is_err());
        assert_eq!(
            call(&mut service, &Request::ConvertImage).unwrap(),
            ResultCode::OK
        );
    }

    #[test]
    fn wrong_port_name() {
        let mut service = FakeService::new();
        match service.connect("mvd:xyz") {
            Err(TransportError::Connect(name, code)) => {
                assert_eq!(name, "mvd:xyz");
                assert_eq!(code, PORT_NOT_FOUND);
            }
            r => panic!("unexpected {:?}", r),
        }
    }

    #[test]
    fn scripted_results_take_precedence() {
        let mut service = FakeService::new();
        service.connect(SERVICE_NAME).unwrap();
        service.push_result(CommandId::ConvertImage, ResultCode(0xDEAD));
        assert_eq!(
            call(&mut service, &Request::ConvertImage).unwrap(),
            ResultCode(0xDEAD)
        );
        assert_eq!(
            call(&mut service, &Request::ConvertImage).unwrap(),
            ResultCode::OK
        );
    }

    #[test]
    fn busy_renders() {
        let mut service = FakeService::new();
        service.connect(SERVICE_NAME).unwrap();
        service.set_render_busy_polls(2);
        let codes: Vec<_> = (0..3)
            .map(|_| call(&mut service, &Request::RenderFrame).unwrap())
            .collect();
        assert_eq!(codes, [ResultCode::BUSY, ResultCode::BUSY, ResultCode::OK]);
    }
}
