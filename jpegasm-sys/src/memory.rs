//! Linear memory of the codec module.
//!
//! One flat byte region addressed by `u32`:
//!
//! ```text
//! 0        NULL_GUARD            stack_top   heap_base              brk        len
//! | guard  | scratch stack (grows down) |     | heap blocks (grow up) |  spare  |
//! ```
//!
//! Heap blocks carry an 8-byte header holding the block size right before the
//! address handed out, so [`LinearMemory::free`] only needs the address back.
//! Which blocks are live is tracked outside linear memory: the header is
//! ordinary bytes that any caller can overwrite.

use crate::config::ModuleConfig;
use std::collections::BTreeMap;

/// Growth granularity of linear memory.
pub const PAGE_SIZE: u32 = 64 * 1024;
/// Addresses below this are never handed out; address 0 is the null sentinel.
pub const NULL_GUARD: u32 = 16;

const HEADER_SIZE: u32 = 8;
const HEAP_ALIGN: u32 = 8;
const STACK_ALIGN: u32 = 16;

/// Snapshot of heap bookkeeping, mostly useful for leak checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Blocks returned by `malloc` and not yet freed.
    pub live_allocations: usize,
    /// Bytes held by live blocks, headers included.
    pub live_bytes: usize,
    /// Highest `live_bytes` ever observed.
    pub peak_bytes: usize,
    /// One past the highest heap address in use (the break).
    pub heap_top: u32,
    /// Current size of linear memory.
    pub memory_size: u32,
}

pub struct LinearMemory {
    bytes: Vec<u8>,
    maximum: u32,
    stack_base: u32,
    stack_top: u32,
    sp: u32,
    brk: u32,
    /// Free blocks below `brk`, keyed by header address, valued by block size.
    free_blocks: BTreeMap<u32, u32>,
    /// Blocks handed out by `malloc`, keyed the same way.
    live_blocks: BTreeMap<u32, u32>,
    live_allocations: usize,
    live_bytes: usize,
    peak_bytes: usize,
}

impl LinearMemory {
    /// Lays out memory for `config`. The caller is expected to have validated it.
    pub(crate) fn new(config: &ModuleConfig) -> Self {
        let stack_top = align_down(NULL_GUARD + config.stack_size, STACK_ALIGN);
        let heap_base = align_up(stack_top, HEAP_ALIGN).unwrap_or(stack_top);
        Self {
            bytes: vec![0; config.initial_memory as usize],
            maximum: config.maximum_memory,
            stack_base: NULL_GUARD,
            stack_top,
            sp: stack_top,
            brk: heap_base,
            free_blocks: BTreeMap::new(),
            live_blocks: BTreeMap::new(),
            live_allocations: 0,
            live_bytes: 0,
            peak_bytes: 0,
        }
    }

    pub fn size(&self) -> u32 {
        self.bytes.len() as u32
    }

    pub fn maximum(&self) -> u32 {
        self.maximum
    }

    /// Allocates `size` bytes on the heap, growing memory if needed.
    ///
    /// Returns 0 when the request cannot be satisfied. `malloc(0)` still
    /// yields a unique, freeable address.
    pub fn malloc(&mut self, size: u32) -> u32 {
        let Some(total) = align_up(size.max(1), HEAP_ALIGN).and_then(|p| p.checked_add(HEADER_SIZE))
        else {
            return 0;
        };

        let start = match self.take_free_block(total) {
            Some((start, block)) => {
                self.account_alloc(start, block);
                start
            }
            None => {
                let Some(end) = self.brk.checked_add(total) else {
                    return 0;
                };
                if !self.ensure_size(end) {
                    return 0;
                }
                let start = self.brk;
                self.brk = end;
                self.account_alloc(start, total);
                start
            }
        };
        start + HEADER_SIZE
    }

    /// Releases a block obtained from [`malloc`](Self::malloc).
    ///
    /// `free(0)` is a no-op, and so is freeing anything that is not a live block.
    pub fn free(&mut self, addr: u32) {
        let Some(start) = addr.checked_sub(HEADER_SIZE) else {
            return;
        };
        let Some(size) = self.live_blocks.remove(&start) else {
            return;
        };
        self.live_allocations -= 1;
        self.live_bytes -= size as usize;
        self.release_block(start, size);
    }

    /// Current scratch-stack pointer, to be handed back to [`stack_restore`](Self::stack_restore).
    pub fn stack_save(&self) -> u32 {
        self.sp
    }

    /// Pushes `size` bytes onto the scratch stack. Returns 0 on overflow.
    pub fn stack_alloc(&mut self, size: u32) -> u32 {
        let Some(lowered) = self.sp.checked_sub(size) else {
            return 0;
        };
        let next = align_down(lowered, STACK_ALIGN);
        if next < self.stack_base {
            return 0;
        }
        self.sp = next;
        next
    }

    /// Pops the scratch stack back to a pointer taken with [`stack_save`](Self::stack_save).
    pub fn stack_restore(&mut self, sp: u32) {
        if (self.stack_base..=self.stack_top).contains(&sp) {
            self.sp = sp;
        }
    }

    pub fn read(&self, addr: u32, len: usize) -> Option<&[u8]> {
        let start = addr as usize;
        let end = start.checked_add(len)?;
        self.bytes.get(start..end)
    }

    pub fn write(&mut self, addr: u32, data: &[u8]) -> bool {
        let start = addr as usize;
        let Some(end) = start.checked_add(data.len()) else {
            return false;
        };
        match self.bytes.get_mut(start..end) {
            Some(dst) => {
                dst.copy_from_slice(data);
                true
            }
            None => false,
        }
    }

    pub fn get_u32(&self, addr: u32) -> Option<u32> {
        let raw = self.read(addr, 4)?;
        Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    pub fn set_u32(&mut self, addr: u32, value: u32) -> bool {
        self.write(addr, &value.to_le_bytes())
    }

    pub fn get_i32(&self, addr: u32) -> Option<i32> {
        self.get_u32(addr).map(|v| v as i32)
    }

    pub fn set_i32(&mut self, addr: u32, value: i32) -> bool {
        self.set_u32(addr, value as u32)
    }

    /// Decodes the NUL-terminated string at `addr`. Address 0 reads as "".
    pub fn utf8_to_string(&self, addr: u32) -> String {
        if addr == 0 {
            return String::new();
        }
        let Some(tail) = self.bytes.get(addr as usize..) else {
            return String::new();
        };
        let end = memchr::memchr(0, tail).unwrap_or(tail.len());
        String::from_utf8_lossy(&tail[..end]).into_owned()
    }

    /// Copies `s` into a fresh heap block with a trailing NUL. Returns 0 on exhaustion.
    pub fn alloc_string(&mut self, s: &str) -> u32 {
        let Ok(len) = u32::try_from(s.len()) else {
            return 0;
        };
        let Some(size) = len.checked_add(1) else {
            return 0;
        };
        let addr = self.malloc(size);
        if addr != 0 {
            self.write(addr, s.as_bytes());
            self.write(addr + len, &[0]);
        }
        addr
    }

    pub fn stats(&self) -> HeapStats {
        HeapStats {
            live_allocations: self.live_allocations,
            live_bytes: self.live_bytes,
            peak_bytes: self.peak_bytes,
            heap_top: self.brk,
            memory_size: self.size(),
        }
    }

    fn take_free_block(&mut self, total: u32) -> Option<(u32, u32)> {
        let (&start, &size) = self.free_blocks.iter().find(|(_, size)| **size >= total)?;
        self.free_blocks.remove(&start);
        let rest = size - total;
        if rest >= HEADER_SIZE + HEAP_ALIGN {
            self.free_blocks.insert(start + total, rest);
            Some((start, total))
        } else {
            Some((start, size))
        }
    }

    fn release_block(&mut self, mut start: u32, mut size: u32) {
        let prev = self
            .free_blocks
            .range(..start)
            .next_back()
            .map(|(&addr, &len)| (addr, len));
        if let Some((prev, prev_size)) = prev {
            if prev + prev_size == start {
                self.free_blocks.remove(&prev);
                start = prev;
                size += prev_size;
            }
        }
        if let Some(next_size) = self.free_blocks.remove(&(start + size)) {
            size += next_size;
        }
        if start + size == self.brk {
            self.brk = start;
        } else {
            self.free_blocks.insert(start, size);
        }
    }

    fn ensure_size(&mut self, end: u32) -> bool {
        if end as usize <= self.bytes.len() {
            return true;
        }
        let Some(target) = align_up(end, PAGE_SIZE) else {
            return false;
        };
        if target > self.maximum {
            return false;
        }
        self.bytes.resize(target as usize, 0);
        true
    }

    fn account_alloc(&mut self, start: u32, size: u32) {
        self.set_u32(start, size);
        self.live_blocks.insert(start, size);
        self.live_allocations += 1;
        self.live_bytes += size as usize;
        self.peak_bytes = self.peak_bytes.max(self.live_bytes);
    }
}

fn align_up(value: u32, align: u32) -> Option<u32> {
    value.checked_add(align - 1).map(|v| v & !(align - 1))
}

fn align_down(value: u32, align: u32) -> u32 {
    value & !(align - 1)
}
