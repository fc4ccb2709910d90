//=====================================================
// File: task/memory.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Fixed-capacity memory regions owned by a single task
// Objective: Provide bounds-checked byte/word data segments, the operand
//            stack, and the three-word call frame stack
//=====================================================

use crate::error::Fault;

//=====================================================
// SECTION 1: Data Segment
//=====================================================

/// Zero-initialised byte memory, addressable per byte or per 32-bit word.
#[derive(Debug, Clone)]
pub struct DataSegment {
    bytes: Box<[u8]>,
}

impl DataSegment {
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0u8; size].into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn range(&self, start: i64, width: i64) -> Result<std::ops::Range<usize>, Fault> {
        let end = start.checked_add(width).unwrap_or(i64::MAX);
        if start < 0 || end > self.bytes.len() as i64 {
            return Err(Fault::MemoryFault { address: start });
        }
        Ok(start as usize..end as usize)
    }

    /// Read one byte, sign-extended.
    pub fn read_byte(&self, address: i32) -> Result<i32, Fault> {
        let range = self.range(i64::from(address), 1)?;
        Ok(i32::from(self.bytes[range.start] as i8))
    }

    /// Store the low byte of `value`.
    pub fn write_byte(&mut self, address: i32, value: i32) -> Result<(), Fault> {
        let range = self.range(i64::from(address), 1)?;
        self.bytes[range.start] = value as u8;
        Ok(())
    }

    pub fn read_word(&self, index: i32) -> Result<i32, Fault> {
        let range = self.range(i64::from(index) * 4, 4)?;
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.bytes[range]);
        Ok(i32::from_le_bytes(word))
    }

    pub fn write_word(&mut self, index: i32, value: i32) -> Result<(), Fault> {
        let range = self.range(i64::from(index) * 4, 4)?;
        self.bytes[range].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Copy raw bytes in at `offset`.
    pub fn write_bytes(&mut self, offset: usize, data: &[u8]) -> Result<(), Fault> {
        let range = self.range(offset as i64, data.len() as i64)?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }

    /// Read a NUL-terminated string. The segment end also terminates it.
    pub fn read_cstr(&self, address: i32) -> Result<String, Fault> {
        let start = self.range(i64::from(address), 1)?.start;
        let tail = &self.bytes[start..];
        let end = tail.iter().position(|byte| *byte == 0).unwrap_or(tail.len());
        Ok(String::from_utf8_lossy(&tail[..end]).into_owned())
    }

    /// Write `text` plus a terminating NUL. Faults when it does not fit.
    pub fn write_cstr(&mut self, address: i32, text: &str) -> Result<usize, Fault> {
        let range = self.range(i64::from(address), text.len() as i64 + 1)?;
        let (body, nul) = self.bytes[range].split_at_mut(text.len());
        body.copy_from_slice(text.as_bytes());
        nul[0] = 0;
        Ok(text.len())
    }

    /// Like [`write_cstr`](Self::write_cstr) but truncates to the available room.
    pub fn write_cstr_truncated(&mut self, address: i32, text: &str) -> Result<usize, Fault> {
        let start = self.range(i64::from(address), 1)?.start;
        let room = self.bytes.len() - start - 1;
        let length = text.len().min(room);
        self.bytes[start..start + length].copy_from_slice(&text.as_bytes()[..length]);
        self.bytes[start + length] = 0;
        Ok(length)
    }
}

//=====================================================
// SECTION 2: Operand Stack
//=====================================================

/// Upward-growing integer stack. `top` counts live slots; index 0 is the guard.
#[derive(Debug, Clone)]
pub struct OperandStack {
    slots: Box<[i32]>,
    top: usize,
}

impl OperandStack {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![0; capacity].into_boxed_slice(),
            top: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn top(&self) -> usize {
        self.top
    }

    pub fn live(&self) -> &[i32] {
        &self.slots[..self.top]
    }

    pub fn push(&mut self, value: i32) -> Result<(), Fault> {
        let slot = self.slots.get_mut(self.top).ok_or(Fault::StackOverflow)?;
        *slot = value;
        self.top += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<i32, Fault> {
        if self.top == 0 {
            return Err(Fault::StackUnderflow);
        }
        self.top -= 1;
        Ok(self.slots[self.top])
    }

    pub fn peek(&self) -> Result<i32, Fault> {
        self.top
            .checked_sub(1)
            .map(|index| self.slots[index])
            .ok_or(Fault::StackUnderflow)
    }

    /// Move the top index without touching slot values.
    pub fn set_top(&mut self, top: i64) -> Result<(), Fault> {
        if top < 0 {
            return Err(Fault::StackUnderflow);
        }
        if top > self.slots.len() as i64 {
            return Err(Fault::StackOverflow);
        }
        self.top = top as usize;
        Ok(())
    }

    pub fn slot(&self, index: i64) -> Result<i32, Fault> {
        usize::try_from(index)
            .ok()
            .and_then(|index| self.slots.get(index))
            .copied()
            .ok_or(Fault::MemoryFault { address: index })
    }

    pub fn set_slot(&mut self, index: i64, value: i32) -> Result<(), Fault> {
        let slot = usize::try_from(index)
            .ok()
            .and_then(|index| self.slots.get_mut(index))
            .ok_or(Fault::MemoryFault { address: index })?;
        *slot = value;
        Ok(())
    }
}

//=====================================================
// SECTION 3: Call Stack
//=====================================================

/// Saved state of one `CALL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub return_pc: usize,
    pub saved_fp: usize,
    pub saved_sp: usize,
}

const FRAME_WORDS: usize = 3;

/// Separate word array holding three words per active call.
#[derive(Debug, Clone)]
pub struct CallStack {
    words: Box<[usize]>,
    top: usize,
}

impl CallStack {
    pub fn new(depth: usize) -> Self {
        Self {
            words: vec![0; depth * FRAME_WORDS].into_boxed_slice(),
            top: 0,
        }
    }

    pub fn depth(&self) -> usize {
        self.top / FRAME_WORDS
    }

    pub fn capacity(&self) -> usize {
        self.words.len() / FRAME_WORDS
    }

    pub fn push(&mut self, frame: Frame) -> Result<(), Fault> {
        if self.top + FRAME_WORDS > self.words.len() {
            return Err(Fault::CallStackOverflow);
        }
        self.words[self.top] = frame.return_pc;
        self.words[self.top + 1] = frame.saved_fp;
        self.words[self.top + 2] = frame.saved_sp;
        self.top += FRAME_WORDS;
        Ok(())
    }

    /// Pops the three words in reverse order of how `push` stored them.
    pub fn pop(&mut self) -> Result<Frame, Fault> {
        if self.top < FRAME_WORDS {
            return Err(Fault::ReturnWithoutCall);
        }
        self.top -= 1;
        let saved_sp = self.words[self.top];
        self.top -= 1;
        let saved_fp = self.words[self.top];
        self.top -= 1;
        let return_pc = self.words[self.top];
        Ok(Frame {
            return_pc,
            saved_fp,
            saved_sp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_store_truncates_and_sign_extends() {
        let mut data = DataSegment::new(16);
        data.write_byte(3, 300).unwrap();
        assert_eq!(data.read_byte(3).unwrap(), 44);
        data.write_byte(4, 0xff).unwrap();
        assert_eq!(data.read_byte(4).unwrap(), -1);
    }

    #[test]
    fn words_overlay_bytes_little_endian() {
        let mut data = DataSegment::new(16);
        data.write_word(1, 0x0102_0304).unwrap();
        assert_eq!(data.read_word(1).unwrap(), 0x0102_0304);
        assert_eq!(data.read_byte(4).unwrap(), 4);
        assert_eq!(data.read_byte(7).unwrap(), 1);
    }

    #[test]
    fn out_of_range_access_faults() {
        let mut data = DataSegment::new(8);
        assert!(matches!(data.read_byte(8), Err(Fault::MemoryFault { address: 8 })));
        assert!(matches!(data.write_word(2, 1), Err(Fault::MemoryFault { .. })));
        assert!(matches!(data.read_byte(-1), Err(Fault::MemoryFault { .. })));
    }

    #[test]
    fn cstr_round_trip_and_truncation() {
        let mut data = DataSegment::new(8);
        assert_eq!(data.write_cstr(0, "abc").unwrap(), 3);
        assert_eq!(data.read_cstr(0).unwrap(), "abc");
        assert!(data.write_cstr(4, "toolong").is_err());
        assert_eq!(data.write_cstr_truncated(4, "toolong").unwrap(), 3);
        assert_eq!(data.read_cstr(4).unwrap(), "too");
    }

    #[test]
    fn stack_guards_both_ends() {
        let mut stack = OperandStack::new(2);
        assert!(matches!(stack.pop(), Err(Fault::StackUnderflow)));
        stack.push(1).unwrap();
        stack.push(2).unwrap();
        assert!(matches!(stack.push(3), Err(Fault::StackOverflow)));
        assert_eq!(stack.live(), &[1, 2]);
        assert!(matches!(stack.set_top(-1), Err(Fault::StackUnderflow)));
        assert!(matches!(stack.set_top(3), Err(Fault::StackOverflow)));
    }

    #[test]
    fn set_top_keeps_stale_values() {
        let mut stack = OperandStack::new(4);
        stack.push(9).unwrap();
        stack.pop().unwrap();
        stack.set_top(1).unwrap();
        assert_eq!(stack.peek().unwrap(), 9);
    }

    #[test]
    fn call_stack_restores_frames_in_order() {
        let mut frames = CallStack::new(2);
        let outer = Frame {
            return_pc: 4,
            saved_fp: 0,
            saved_sp: 1,
        };
        let inner = Frame {
            return_pc: 9,
            saved_fp: 1,
            saved_sp: 3,
        };
        frames.push(outer).unwrap();
        frames.push(inner).unwrap();
        assert!(matches!(frames.push(outer), Err(Fault::CallStackOverflow)));
        assert_eq!(frames.pop().unwrap(), inner);
        assert_eq!(frames.pop().unwrap(), outer);
        assert!(matches!(frames.pop(), Err(Fault::ReturnWithoutCall)));
    }
}
