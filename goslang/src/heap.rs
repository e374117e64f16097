use std::{
    cell::Cell,
    ptr::NonNull,
    sync::{
        Arc,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
};

use thiserror::Error;

use crate::{
    Address, Header, TypeTag,
    system::{map_memory, page_align, unmap_memory},
};

pub const WORD_SIZE: usize = 8;
/// byte offset of the size field inside a header word
pub const SIZE_OFFSET: usize = 6;
/// largest object the 16 bit size field can describe
pub const MAX_OBJECT_WORDS: usize = u16::MAX as usize;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeapError {
    #[error("out of memory: requested {requested} words, {available} available")]
    OutOfMemory { requested: usize, available: usize },
    #[error("heap access out of bounds at {address} (byte offset {offset})")]
    OutOfBounds { address: Address, offset: usize },
    #[error("object of {size} words exceeds the maximum object size")]
    ObjectTooLarge { size: usize },
    #[error("corrupt header at {address}: full type {full_type:#06x}")]
    CorruptHeader { address: Address, full_type: u16 },
    #[error("heap arena of {words} words could not be mapped")]
    MapFailed { words: usize },
}

#[derive(Debug, Clone)]
pub struct HeapCreateInfo {
    /// arena capacity in 8 byte words
    pub words: usize,
}

impl Default for HeapCreateInfo {
    fn default() -> Self {
        Self { words: 4 << 20 }
    }
}

/// Owner of the arena. Every execution unit talks to it through a
/// [`HeapProxy`].
#[derive(Debug)]
pub struct Heap {
    inner: Arc<HeapShared>,
}

#[derive(Debug)]
pub struct HeapShared {
    start: NonNull<AtomicU64>,
    capacity: usize,
    mapped_bytes: usize,
    free: AtomicUsize,
}

/// Per execution unit view of the shared arena.
#[derive(Debug)]
pub struct HeapProxy {
    heap: Arc<HeapShared>,
    allocated: Cell<usize>,
}

// SAFETY: the arena is only accessed through atomic words
unsafe impl Send for HeapShared {}
// SAFETY: the arena is only accessed through atomic words
unsafe impl Sync for HeapShared {}

impl Heap {
    pub fn new(info: HeapCreateInfo) -> Result<Self, HeapError> {
        let shared = HeapShared::new(info.words)?;
        log::debug!(
            "mapped heap arena: {} words ({} bytes)",
            shared.capacity,
            shared.mapped_bytes
        );
        Ok(Self {
            inner: Arc::new(shared),
        })
    }

    pub fn create_proxy(&self) -> HeapProxy {
        HeapProxy {
            heap: self.inner.clone(),
            allocated: Cell::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Current value of the bump pointer.
    pub fn allocated(&self) -> usize {
        self.inner.free.load(Ordering::Acquire)
    }
}

impl HeapShared {
    fn new(words: usize) -> Result<Self, HeapError> {
        // word 0 is reserved, so we need at least one more
        let capacity = words.max(2);
        let mapped_bytes = capacity
            .checked_mul(WORD_SIZE)
            .map(page_align)
            .ok_or(HeapError::MapFailed { words })?;
        let start = map_memory(mapped_bytes).ok_or(HeapError::MapFailed { words })?;
        Ok(Self {
            start: start.cast(),
            capacity,
            mapped_bytes,
            free: AtomicUsize::new(1),
        })
    }

    #[inline]
    fn slot(&self, address: Address, offset: usize) -> Result<&AtomicU64, HeapError> {
        let index = address.index();
        if index == 0 || index >= self.capacity {
            return Err(HeapError::OutOfBounds { address, offset });
        }
        // SAFETY: index is within the mapped arena; the mapping is zeroed and
        // AtomicU64 has the same layout as u64
        Ok(unsafe { &*self.start.as_ptr().add(index) })
    }
}

impl Drop for HeapShared {
    fn drop(&mut self) {
        unmap_memory(self.start.cast(), self.mapped_bytes);
    }
}

impl HeapProxy {
    pub fn create_proxy(&self) -> Self {
        Self {
            heap: self.heap.clone(),
            allocated: Cell::new(0),
        }
    }

    /// Words allocated through this proxy.
    pub fn allocated_here(&self) -> usize {
        self.allocated.get()
    }

    /// Current value of the shared bump pointer.
    pub fn allocated(&self) -> usize {
        self.heap.free.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.heap.capacity
    }

    /// Bump allocates `size` words and writes the header. The only
    /// synchronisation point between execution units.
    pub fn alloc(&self, tag: TypeTag, size: usize) -> Result<Address, HeapError> {
        debug_assert!(size >= 1, "objects have at least a header");
        if size > MAX_OBJECT_WORDS {
            return Err(HeapError::ObjectTooLarge { size });
        }
        let capacity = self.heap.capacity;
        let start = self
            .heap
            .free
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |free| {
                free.checked_add(size).filter(|end| *end <= capacity)
            })
            .map_err(|free| HeapError::OutOfMemory {
                requested: size,
                available: capacity.saturating_sub(free),
            })?;
        let address = Address::new(start);
        self.set_header(address, Header::new(tag.full_type(), size as u16))?;
        self.allocated.set(self.allocated.get() + size);
        Ok(address)
    }

    pub fn word(&self, address: Address) -> Result<u64, HeapError> {
        Ok(self.heap.slot(address, 0)?.load(Ordering::Relaxed))
    }

    pub fn set_word(&self, address: Address, value: u64) -> Result<(), HeapError> {
        self.heap.slot(address, 0)?.store(value, Ordering::Relaxed);
        Ok(())
    }

    pub fn header(&self, address: Address) -> Result<Header, HeapError> {
        self.word(address).map(Header::from_raw)
    }

    pub fn set_header(&self, address: Address, header: Header) -> Result<(), HeapError> {
        self.set_word(address, header.raw())
    }

    /// child index starts at 0, right after the header and payload words
    pub fn child(&self, address: Address, index: usize) -> Result<Address, HeapError> {
        let word = self.word(self.child_slot(address, index)?)?;
        Ok(Address::from_word(word))
    }

    pub fn set_child(
        &self,
        address: Address,
        index: usize,
        value: Address,
    ) -> Result<(), HeapError> {
        self.set_word(self.child_slot(address, index)?, value.to_word())
    }

    fn child_slot(&self, address: Address, index: usize) -> Result<Address, HeapError> {
        let header = self.header(address)?;
        let payload = header.tag().map_or(0, TypeTag::payload_words);
        if 1 + payload + index >= header.size().max(1) {
            return Err(HeapError::OutOfBounds {
                address,
                offset: (1 + payload + index) * WORD_SIZE,
            });
        }
        Ok(address.offset(1 + payload + index))
    }

    fn read_bits(&self, address: Address, offset: usize, bytes: usize) -> Result<u64, HeapError> {
        if offset + bytes > WORD_SIZE {
            return Err(HeapError::OutOfBounds { address, offset });
        }
        let shift = (WORD_SIZE - offset - bytes) * 8;
        let mask = u64::MAX >> (64 - bytes * 8);
        Ok((self.word(address)? >> shift) & mask)
    }

    fn write_bits(
        &self,
        address: Address,
        offset: usize,
        bytes: usize,
        value: u64,
    ) -> Result<(), HeapError> {
        if offset + bytes > WORD_SIZE {
            return Err(HeapError::OutOfBounds { address, offset });
        }
        let shift = (WORD_SIZE - offset - bytes) * 8;
        let mask = (u64::MAX >> (64 - bytes * 8)) << shift;
        let slot = self.heap.slot(address, offset)?;
        let old = slot.load(Ordering::Relaxed);
        slot.store((old & !mask) | ((value << shift) & mask), Ordering::Relaxed);
        Ok(())
    }

    pub fn byte_at(&self, address: Address, offset: usize) -> Result<u8, HeapError> {
        self.read_bits(address, offset, 1).map(|v| v as u8)
    }

    pub fn set_byte_at(&self, address: Address, offset: usize, value: u8) -> Result<(), HeapError> {
        self.write_bits(address, offset, 1, value as u64)
    }

    pub fn u16_at(&self, address: Address, offset: usize) -> Result<u16, HeapError> {
        self.read_bits(address, offset, 2).map(|v| v as u16)
    }

    pub fn set_u16_at(&self, address: Address, offset: usize, value: u16) -> Result<(), HeapError> {
        self.write_bits(address, offset, 2, value as u64)
    }

    pub fn u32_at(&self, address: Address, offset: usize) -> Result<u32, HeapError> {
        self.read_bits(address, offset, 4).map(|v| v as u32)
    }

    pub fn set_u32_at(&self, address: Address, offset: usize, value: u32) -> Result<(), HeapError> {
        self.write_bits(address, offset, 4, value as u64)
    }

    pub fn full_type(&self, address: Address) -> Result<u16, HeapError> {
        self.u16_at(address, 0)
    }

    pub fn major_type(&self, address: Address) -> Result<u8, HeapError> {
        self.byte_at(address, 0)
    }

    pub fn subtype(&self, address: Address) -> Result<u8, HeapError> {
        self.byte_at(address, 1)
    }

    pub fn size(&self, address: Address) -> Result<usize, HeapError> {
        self.u16_at(address, SIZE_OFFSET).map(usize::from)
    }

    pub fn type_tag(&self, address: Address) -> Result<TypeTag, HeapError> {
        let full_type = self.full_type(address)?;
        TypeTag::from_u16(full_type).ok_or(HeapError::CorruptHeader { address, full_type })
    }

    pub fn is(&self, address: Address, tag: TypeTag) -> Result<bool, HeapError> {
        Ok(self.full_type(address)? == tag.full_type())
    }

    pub fn child_count(&self, address: Address) -> Result<usize, HeapError> {
        let tag = self.type_tag(address)?;
        let size = self.size(address)?;
        Ok(size.saturating_sub(1 + tag.payload_words()))
    }
}
