// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Addresses and the linear-memory collaborator.
//!
//! The coprocessor reaches buffers through physical addresses only. A buffer handed to the service
//! must live in linear (DMA-visible) memory, and its address must be translated with
//! [`AddressTranslator::virt_to_phys`] before it is stored in a request or configuration record.

use std::cmp::Ordering;
use std::fmt;
use std::fmt::Debug;
use std::fmt::Display;

use zerocopy::byteorder::little_endian::U32;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

/// Little-endian `u32` as stored in records shared with the coprocessor.
pub type Le32 = U32;

/// A physical address as seen by the coprocessor.
///
/// This is an opaque number, never dereferenced by the CPU. Zero means "no buffer". It is stored
/// little-endian so that it can be embedded directly in wire records.
#[derive(Clone, Copy, Default, Eq, PartialEq, Hash, FromBytes, Immutable, IntoBytes, KnownLayout)]
#[repr(transparent)]
pub struct PhysAddr(Le32);

impl PhysAddr {
    pub const NULL: PhysAddr = PhysAddr(Le32::ZERO);

    pub fn new(addr: u32) -> Self {
        PhysAddr(Le32::new(addr))
    }

    pub fn offset(self) -> u32 {
        self.0.get()
    }

    pub fn is_null(self) -> bool {
        self.offset() == 0
    }

    /// Returns the result of the add or None if there is overflow.
    pub fn checked_add(self, other: u32) -> Option<PhysAddr> {
        self.offset().checked_add(other).map(PhysAddr::new)
    }
}

impl From<u32> for PhysAddr {
    fn from(addr: u32) -> Self {
        PhysAddr::new(addr)
    }
}

impl Ord for PhysAddr {
    fn cmp(&self, other: &Self) -> Ordering {
        self.offset().cmp(&other.offset())
    }
}

impl PartialOrd for PhysAddr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Debug for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PhysAddr({:#x})", self.offset())
    }
}

impl Display for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#010x}", self.offset())
    }
}

/// A virtual address in the calling process.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtAddr(pub usize);

impl VirtAddr {
    /// Address of the first byte of `buf`.
    pub fn of_slice(buf: &[u8]) -> Self {
        VirtAddr(buf.as_ptr() as usize)
    }

    pub fn offset(self) -> usize {
        self.0
    }

    pub fn checked_add(self, other: usize) -> Option<VirtAddr> {
        self.0.checked_add(other).map(VirtAddr)
    }
}

impl Display for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Translates virtual addresses of DMA-visible memory into physical addresses.
pub trait AddressTranslator {
    /// Returns `None` when `vaddr` is not backed by memory the coprocessor can reach.
    fn virt_to_phys(&self, vaddr: VirtAddr) -> Option<PhysAddr>;
}

/// A block handed out by a [`LinearAllocator`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LinearAllocation {
    pub addr: VirtAddr,
    pub size: usize,
}

/// Allocator for linear memory, used for the service's work buffer.
pub trait LinearAllocator: AddressTranslator {
    /// Allocates `size` bytes aligned to `align`. Returns `None` when the heap is exhausted.
    fn allocate(&mut self, size: usize, align: usize) -> Option<LinearAllocation>;

    /// Returns a block obtained from `allocate`.
    fn free(&mut self, allocation: LinearAllocation);
}

struct MemoryRegion {
    virt_start: usize,
    virt_end: usize,
    phys_start: u32,
}

// Fixed windows of the console's address space that map onto physical memory the coprocessor can
// access.
const CTR_REGIONS: &[MemoryRegion] = &[
    // Linear heap.
    MemoryRegion {
        virt_start: 0x1400_0000,
        virt_end: 0x1C00_0000,
        phys_start: 0x2000_0000,
    },
    // Linear heap as mapped on newer system versions.
    MemoryRegion {
        virt_start: 0x3000_0000,
        virt_end: 0x4000_0000,
        phys_start: 0x2000_0000,
    },
    // VRAM.
    MemoryRegion {
        virt_start: 0x1F00_0000,
        virt_end: 0x1F60_0000,
        phys_start: 0x1800_0000,
    },
    // DSP RAM.
    MemoryRegion {
        virt_start: 0x1FF0_0000,
        virt_end: 0x1FF8_0000,
        phys_start: 0x1FF0_0000,
    },
];

/// The console's fixed virtual-to-physical memory map.
#[derive(Clone, Copy, Debug, Default)]
pub struct CtrMemoryMap;

impl AddressTranslator for CtrMemoryMap {
    fn virt_to_phys(&self, vaddr: VirtAddr) -> Option<PhysAddr> {
        let v = vaddr.offset();
        CTR_REGIONS
            .iter()
            .find(|r| v >= r.virt_start && v < r.virt_end)
            .and_then(|r| {
                let delta = u32::try_from(v - r.virt_start).ok()?;
                r.phys_start.checked_add(delta).map(PhysAddr::new)
            })
    }
}

/// Translates `vaddr`, or yields `PhysAddr::NULL` when no buffer is given.
pub(crate) fn translate_optional<M: AddressTranslator + ?Sized>(
    memory: &M,
    vaddr: Option<VirtAddr>,
) -> std::result::Result<PhysAddr, VirtAddr> {
    match vaddr {
        None => Ok(PhysAddr::NULL),
        Some(v) => memory.virt_to_phys(v).ok_or(v),
    }
}
