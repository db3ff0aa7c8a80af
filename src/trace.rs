use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

pub const DEFAULT_TRACE_CAPACITY: usize = 64;

/// One decoded instruction as it was about to execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
    pub pc: u16,
    pub opcode: u8,
    pub prefixed: bool,
    pub disassembly: String,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prefixed {
            write!(f, "{:04X}: CB {:02X}  {}", self.pc, self.opcode, self.disassembly)
        } else {
            write!(f, "{:04X}: {:02X}     {}", self.pc, self.opcode, self.disassembly)
        }
    }
}

// Bounded history of the last N instructions. Oldest entries fall off the front.
#[derive(Debug, Clone)]
pub struct TraceLog {
    entries: VecDeque<TraceEntry>,
    capacity: usize,
}

impl Default for TraceLog {
    fn default() -> Self {
        TraceLog::with_capacity(DEFAULT_TRACE_CAPACITY)
    }
}

impl TraceLog {
    pub fn with_capacity(capacity: usize) -> Self {
        TraceLog {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, entry: TraceEntry) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&TraceEntry> {
        self.entries.back()
    }

    /// Oldest first.
    pub fn entries(&self) -> Vec<TraceEntry> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pc: u16) -> TraceEntry {
        TraceEntry {
            pc,
            opcode: 0x00,
            prefixed: false,
            disassembly: "NOP".to_string(),
        }
    }

    #[test]
    fn test_ring_drops_oldest() {
        let mut log = TraceLog::with_capacity(3);
        for pc in 0..5 {
            log.push(entry(pc));
        }
        assert_eq!(log.len(), 3);
        let pcs: Vec<u16> = log.entries().iter().map(|e| e.pc).collect();
        assert_eq!(pcs, vec![2, 3, 4]);
        assert_eq!(log.last().map(|e| e.pc), Some(4));
    }

    #[test]
    fn test_default_capacity_is_bounded() {
        let mut log = TraceLog::default();
        for pc in 0..1000 {
            log.push(entry(pc));
        }
        assert_eq!(log.len(), DEFAULT_TRACE_CAPACITY);
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut log = TraceLog::with_capacity(0);
        log.push(entry(1));
        assert!(log.is_empty());
    }

    #[test]
    fn test_entry_display() {
        let e = TraceEntry {
            pc: 0x0150,
            opcode: 0x37,
            prefixed: true,
            disassembly: "SWAP A".to_string(),
        };
        assert_eq!(e.to_string(), "0150: CB 37  SWAP A");
    }
}
