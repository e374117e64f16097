//! Layouts of the composite and machine-internal kinds.
//!
//! ```text
//! builtin      [0x85 0x02 id id 0 0 | size]
//! function     [0x85 0x04 in out pc pc | size] [env]
//! block marker [0x82 0x00 0 0 0 0 | size] [env]
//! call marker  [0x83 0x00 pc pc pc pc | size] [env]
//! frame        [0x84 0x00 0 0 0 0 | size] [slot]*
//! environment  [0x86 0x00 0 0 0 0 | size] [frame]*
//! ```
use crate::{Address, HeapError, HeapProxy, LexicalAddress, TypeTag};

/// Process wide singletons, allocated once per VM and shared read-only by
/// every execution unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialObjects {
    pub nil: Address,
    pub unassigned: Address,
    pub true_obj: Address,
    pub false_obj: Address,
    pub empty_env: Address,
}

impl SpecialObjects {
    pub fn allocate(heap: &HeapProxy) -> Result<Self, HeapError> {
        let false_obj = heap.alloc(TypeTag::Bool, 1)?;
        heap.set_byte_at(false_obj, 2, 0)?;
        let true_obj = heap.alloc(TypeTag::Bool, 1)?;
        heap.set_byte_at(true_obj, 2, 1)?;
        let nil = heap.alloc(TypeTag::Nil, 1)?;
        let unassigned = heap.alloc(TypeTag::Unassigned, 1)?;
        let empty_env = heap.alloc_environment(0)?;
        Ok(Self {
            nil,
            unassigned,
            true_obj,
            false_obj,
            empty_env,
        })
    }

    pub fn boolean(&self, value: bool) -> Address {
        if value { self.true_obj } else { self.false_obj }
    }
}

impl HeapProxy {
    pub fn alloc_builtin(&self, id: u16) -> Result<Address, HeapError> {
        let address = self.alloc(TypeTag::Builtin, 1)?;
        self.set_u16_at(address, 2, id)?;
        Ok(address)
    }

    pub fn builtin_id(&self, address: Address) -> Result<u16, HeapError> {
        self.u16_at(address, 2)
    }

    pub fn alloc_function(
        &self,
        arity_in: u8,
        arity_out: u8,
        pc: u16,
        env: Address,
    ) -> Result<Address, HeapError> {
        let address = self.alloc(TypeTag::Function, 2)?;
        self.set_byte_at(address, 2, arity_in)?;
        self.set_byte_at(address, 3, arity_out)?;
        self.set_u16_at(address, 4, pc)?;
        self.set_child(address, 0, env)?;
        Ok(address)
    }

    pub fn function_arity_in(&self, address: Address) -> Result<u8, HeapError> {
        self.byte_at(address, 2)
    }

    pub fn function_arity_out(&self, address: Address) -> Result<u8, HeapError> {
        self.byte_at(address, 3)
    }

    pub fn function_pc(&self, address: Address) -> Result<usize, HeapError> {
        self.u16_at(address, 4).map(usize::from)
    }

    pub fn function_env(&self, address: Address) -> Result<Address, HeapError> {
        self.child(address, 0)
    }

    pub fn alloc_block_marker(&self, env: Address) -> Result<Address, HeapError> {
        let address = self.alloc(TypeTag::BlockMarker, 2)?;
        self.set_child(address, 0, env)?;
        Ok(address)
    }

    pub fn alloc_call_marker(&self, env: Address, pc: usize) -> Result<Address, HeapError> {
        let address = self.alloc(TypeTag::CallMarker, 2)?;
        let pc = u32::try_from(pc).map_err(|_| HeapError::OutOfBounds {
            address,
            offset: 2,
        })?;
        self.set_u32_at(address, 2, pc)?;
        self.set_child(address, 0, env)?;
        Ok(address)
    }

    /// saved environment of a block or call marker
    pub fn marker_env(&self, address: Address) -> Result<Address, HeapError> {
        self.child(address, 0)
    }

    pub fn call_marker_pc(&self, address: Address) -> Result<usize, HeapError> {
        self.u32_at(address, 2).map(|pc| pc as usize)
    }

    /// Allocates a frame with every slot set to `fill`.
    pub fn alloc_frame(&self, slots: usize, fill: Address) -> Result<Address, HeapError> {
        let address = self.alloc(TypeTag::Frame, slots + 1)?;
        for i in 0..slots {
            self.set_child(address, i, fill)?;
        }
        Ok(address)
    }

    pub fn alloc_environment(&self, frames: usize) -> Result<Address, HeapError> {
        self.alloc(TypeTag::Environment, frames + 1)
    }

    /// New environment holding the frames of `env` followed by `frame`.
    /// `env` itself is left untouched.
    pub fn env_extend(&self, env: Address, frame: Address) -> Result<Address, HeapError> {
        let frames = self.child_count(env)?;
        let extended = self.alloc_environment(frames + 1)?;
        for i in 0..frames {
            self.set_child(extended, i, self.child(env, i)?)?;
        }
        self.set_child(extended, frames, frame)?;
        Ok(extended)
    }

    pub fn env_get(&self, env: Address, at: LexicalAddress) -> Result<Address, HeapError> {
        let frame = self.child(env, at.frame)?;
        self.child(frame, at.slot)
    }

    pub fn env_set(
        &self,
        env: Address,
        at: LexicalAddress,
        value: Address,
    ) -> Result<(), HeapError> {
        let frame = self.child(env, at.frame)?;
        self.set_child(frame, at.slot, value)
    }
}
