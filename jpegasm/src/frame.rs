use std::marker::PhantomData;

use crate::error::{Error, Result};
use crate::sys::Module;
use tracing::trace;

const SLOT_SIZE: u32 = 4;

/// Slot kind for a heap address the codec hands over. Reading it transfers
/// the block to the frame.
pub(crate) enum Address {}

/// Slot kind for a plain number such as a length or a dimension.
pub(crate) enum Count {}

/// A zero-initialized 4-byte cell on the scratch stack that the codec writes
/// a result into. Its value means nothing until the call reports success.
pub(crate) struct OutputSlot<T> {
    addr: u32,
    kind: PhantomData<T>,
}

impl<T> OutputSlot<T> {
    fn at(addr: u32) -> Self {
        Self {
            addr,
            kind: PhantomData,
        }
    }

    pub(crate) fn addr(&self) -> u32 {
        self.addr
    }
}

/// Exclusive use of a module for one bridge call.
///
/// Every heap block the frame allocates or adopts is freed, and the scratch
/// stack popped back to where it was, when the frame drops. That covers every
/// exit: success, codec failure, and early `?` returns alike.
pub(crate) struct CallFrame<'m> {
    module: &'m mut Module,
    saved_sp: u32,
    owned: Vec<u32>,
}

impl<'m> CallFrame<'m> {
    pub(crate) fn enter(module: &'m mut Module) -> Self {
        let saved_sp = module.memory().stack_save();
        Self {
            module,
            saved_sp,
            owned: Vec::new(),
        }
    }

    pub(crate) fn module(&mut self) -> &mut Module {
        self.module
    }

    /// Copies `bytes` into a fresh heap block owned by this frame.
    pub(crate) fn copy_in(&mut self, bytes: &[u8]) -> Result<u32> {
        let requested = bytes.len();
        let size = u32::try_from(requested).map_err(|_| Error::OutOfMemory { requested })?;
        let mem = self.module.memory_mut();
        let addr = mem.malloc(size);
        if addr == 0 {
            return Err(Error::OutOfMemory { requested });
        }
        self.owned.push(addr);
        if !mem.write(addr, bytes) {
            return Err(Error::OutOfBounds {
                addr,
                len: requested,
            });
        }
        trace!(addr, size, "copied input into foreign heap");
        Ok(addr)
    }

    pub(crate) fn slot<T>(&mut self) -> Result<OutputSlot<T>> {
        let mem = self.module.memory_mut();
        let addr = mem.stack_alloc(SLOT_SIZE);
        if addr == 0 || !mem.set_u32(addr, 0) {
            return Err(Error::OutOfMemory {
                requested: SLOT_SIZE as usize,
            });
        }
        Ok(OutputSlot::at(addr))
    }

    pub(crate) fn count(&self, slot: OutputSlot<Count>) -> Result<u32> {
        self.load(slot.addr)
    }

    /// Reads the block address out of `slot` and takes ownership of it, so
    /// the block is freed with the frame whatever happens next. Address 0 is
    /// accepted and freeing it is a no-op.
    pub(crate) fn take(&mut self, slot: OutputSlot<Address>) -> Result<u32> {
        let addr = self.load(slot.addr)?;
        self.owned.push(addr);
        Ok(addr)
    }

    fn load(&self, addr: u32) -> Result<u32> {
        self.module
            .memory()
            .get_u32(addr)
            .ok_or(Error::OutOfBounds {
                addr,
                len: SLOT_SIZE as usize,
            })
    }

    pub(crate) fn copy_out(&self, addr: u32, len: usize) -> Result<Vec<u8>> {
        if len == 0 {
            return Ok(Vec::new());
        }
        if addr == 0 {
            return Err(Error::OutOfBounds { addr, len });
        }
        self.module
            .memory()
            .read(addr, len)
            .map(<[u8]>::to_vec)
            .ok_or(Error::OutOfBounds { addr, len })
    }

    pub(crate) fn message(&self, addr: u32) -> String {
        self.module.memory().utf8_to_string(addr)
    }
}

impl Drop for CallFrame<'_> {
    fn drop(&mut self) {
        let mem = self.module.memory_mut();
        for addr in self.owned.drain(..).rev() {
            mem.free(addr);
        }
        mem.stack_restore(self.saved_sp);
        trace!(live = mem.stats().live_allocations, "released call frame");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sys::{ModuleConfig, PAGE_SIZE};

    fn module(maximum_pages: u32) -> Module {
        Module::instantiate(ModuleConfig {
            initial_memory: 2 * PAGE_SIZE,
            maximum_memory: maximum_pages * PAGE_SIZE,
            stack_size: 4096,
        })
        .unwrap()
    }

    #[test]
    fn drop_frees_everything_and_pops_the_stack() {
        let mut m = module(4);
        let sp = m.memory().stack_save();
        {
            let mut frame = CallFrame::enter(&mut m);
            let input = frame.copy_in(b"pixels").unwrap();
            let len: OutputSlot<Count> = frame.slot().unwrap();
            let out: OutputSlot<Address> = frame.slot().unwrap();
            let empty: OutputSlot<Address> = frame.slot().unwrap();
            assert_eq!(frame.copy_out(input, 6).unwrap(), b"pixels");

            let produced = frame.module().memory_mut().alloc_string("diagnostic");
            assert!(frame.module().memory_mut().set_u32(out.addr(), produced));
            assert_eq!(frame.count(len).unwrap(), 0);
            assert_eq!(frame.take(out).unwrap(), produced);
            assert_eq!(frame.take(empty).unwrap(), 0);
            assert_eq!(frame.message(produced), "diagnostic");
            assert_eq!(frame.module().memory().stats().live_allocations, 2);
        }
        assert_eq!(m.memory().stats().live_allocations, 0);
        assert_eq!(m.memory().stack_save(), sp);
    }

    #[test]
    fn taken_blocks_are_freed_even_if_a_later_read_fails() {
        let mut m = module(2);
        let result = (|| {
            let mut frame = CallFrame::enter(&mut m);
            let out: OutputSlot<Address> = frame.slot()?;
            let produced = frame.module().memory_mut().malloc(256);
            frame.module().memory_mut().set_u32(out.addr(), produced);
            frame.take(out)?;
            frame.count(OutputSlot::at(2 * PAGE_SIZE))?;
            Ok::<_, Error>(())
        })();
        assert_eq!(
            result,
            Err(Error::OutOfBounds {
                addr: 2 * PAGE_SIZE,
                len: 4
            })
        );
        assert_eq!(m.memory().stats().live_allocations, 0);
    }

    #[test]
    fn failed_allocation_still_releases_earlier_blocks() {
        let mut m = module(2);
        let result = (|| {
            let mut frame = CallFrame::enter(&mut m);
            frame.copy_in(&[1; 1024])?;
            frame.copy_in(&vec![0; 2 * PAGE_SIZE as usize])?;
            Ok::<_, Error>(())
        })();
        assert_eq!(
            result,
            Err(Error::OutOfMemory {
                requested: 2 * PAGE_SIZE as usize
            })
        );
        assert_eq!(m.memory().stats().live_allocations, 0);
    }

    #[test]
    fn copy_out_rejects_null_and_out_of_range() {
        let mut m = module(2);
        let frame = CallFrame::enter(&mut m);
        assert!(frame.copy_out(0, 0).unwrap().is_empty());
        assert_eq!(
            frame.copy_out(0, 4),
            Err(Error::OutOfBounds { addr: 0, len: 4 })
        );
        let past_end = 2 * PAGE_SIZE - 2;
        assert!(frame.copy_out(past_end, 4).is_err());
    }
}
