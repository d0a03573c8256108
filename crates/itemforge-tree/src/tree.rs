use bytes::{BufMut, Bytes, BytesMut};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Marker opening a node; the next payload byte is the node type.
pub const NODE_START: u8 = 0xFE;
/// Marker closing the innermost open node.
pub const NODE_END: u8 = 0xFF;
/// Prefix that makes the following byte literal regardless of value.
pub const ESCAPE: u8 = 0xFD;

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("unexpected end of file at offset {0}")]
    UnexpectedEndOfFile(usize),
    #[error("invalid node structure: {0}")]
    InvalidNodeStructure(String),
    #[error("node payload exhausted: needed {needed} bytes, {available} available")]
    PayloadExhausted { needed: usize, available: usize },
    #[error("string is not valid UTF-8")]
    InvalidString,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TreeResult<T> = Result<T, TreeError>;

struct NodeFrame {
    node_type: u8,
    payload: Bytes,
    read: usize,
}

/// Cursor over an escaped binary tree.
///
/// Entering a node materializes its escape-decoded attribute bytes (the
/// payload up to the first child or the closing marker) into an owned
/// buffer. Attribute parsers read from that buffer only, so a corrupt
/// attribute length inside one node can never desynchronize the outer
/// cursor.
pub struct TreeReader {
    data: Vec<u8>,
    pos: usize,
    stack: Vec<NodeFrame>,
}

impl TreeReader {
    pub fn open(path: &Path) -> TreeResult<Self> {
        Ok(Self::from_bytes(fs::read(path)?))
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            data,
            pos: 0,
            stack: Vec::new(),
        }
    }

    pub fn file_len(&self) -> usize {
        self.data.len()
    }

    /// Byte offset of the outer cursor, for progress reporting and error
    /// context.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Reads a raw little-endian u32 outside any node (the file prologue
    /// is not escape-coded).
    pub fn read_raw_u32(&mut self) -> TreeResult<u32> {
        if self.pos + 4 > self.data.len() {
            return Err(TreeError::UnexpectedEndOfFile(self.pos));
        }
        let bytes = [
            self.data[self.pos],
            self.data[self.pos + 1],
            self.data[self.pos + 2],
            self.data[self.pos + 3],
        ];
        self.pos += 4;
        Ok(u32::from_le_bytes(bytes))
    }

    /// True if the byte at the cursor opens a sibling node.
    pub fn has_next_node(&self) -> bool {
        self.data.get(self.pos) == Some(&NODE_START)
    }

    /// Advances past the next `NODE_START`, reads the type byte and
    /// isolates the node's attribute payload.
    pub fn enter_node(&mut self) -> TreeResult<()> {
        match self.data.get(self.pos) {
            Some(&NODE_START) => self.pos += 1,
            Some(&other) => {
                return Err(TreeError::InvalidNodeStructure(format!(
                    "expected node start at offset {}, found 0x{other:02X}",
                    self.pos
                )))
            }
            None => return Err(TreeError::UnexpectedEndOfFile(self.pos)),
        }
        let node_type = self.next_unescaped()?;
        let payload = self.decode_payload()?;
        self.stack.push(NodeFrame {
            node_type,
            payload,
            read: 0,
        });
        Ok(())
    }

    /// Pops the current node. If the cursor rests on the node's closing
    /// marker it is consumed; if child nodes follow they are left in place
    /// and iterated like siblings (this is how the root's item nodes are
    /// walked).
    pub fn leave_node(&mut self) -> TreeResult<()> {
        if self.stack.is_empty() {
            return Err(TreeError::InvalidNodeStructure(
                "leave_node with no node open".into(),
            ));
        }
        match self.data.get(self.pos) {
            Some(&NODE_END) => {
                self.pos += 1;
            }
            Some(&NODE_START) => {}
            Some(&other) => {
                return Err(TreeError::InvalidNodeStructure(format!(
                    "expected node boundary at offset {}, found 0x{other:02X}",
                    self.pos
                )))
            }
            None => return Err(TreeError::UnexpectedEndOfFile(self.pos)),
        }
        self.stack.pop();
        Ok(())
    }

    /// Type byte of the innermost open node.
    pub fn current_node_type(&self) -> Option<u8> {
        self.stack.last().map(|f| f.node_type)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Remaining attribute bytes of the current node. Reaching zero is the
    /// normal end-of-attributes signal, not an error.
    pub fn remaining(&self) -> usize {
        self.stack
            .last()
            .map(|f| f.payload.len() - f.read)
            .unwrap_or(0)
    }

    pub fn at_payload_end(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_u8(&mut self) -> TreeResult<u8> {
        let bytes = self.read_bytes(1)?;
        Ok(bytes[0])
    }

    pub fn read_u16(&mut self) -> TreeResult<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> TreeResult<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_u64(&mut self) -> TreeResult<u64> {
        let bytes = self.read_bytes(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes);
        Ok(u64::from_le_bytes(buf))
    }

    pub fn read_bytes(&mut self, count: usize) -> TreeResult<Bytes> {
        let frame = self.stack.last_mut().ok_or_else(|| {
            TreeError::InvalidNodeStructure("read outside any node".into())
        })?;
        let available = frame.payload.len() - frame.read;
        if count > available {
            return Err(TreeError::PayloadExhausted {
                needed: count,
                available,
            });
        }
        let bytes = frame.payload.slice(frame.read..frame.read + count);
        frame.read += count;
        Ok(bytes)
    }

    /// Reads `len` bytes as UTF-8. Tree strings carry no terminator; the
    /// length comes from a prefix or an attribute header.
    pub fn read_string(&mut self, len: usize) -> TreeResult<String> {
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| TreeError::InvalidString)
    }

    fn next_unescaped(&mut self) -> TreeResult<u8> {
        let byte = match self.data.get(self.pos) {
            Some(&b) => b,
            None => return Err(TreeError::UnexpectedEndOfFile(self.pos)),
        };
        self.pos += 1;
        if byte == ESCAPE {
            let literal = match self.data.get(self.pos) {
                Some(&b) => b,
                None => return Err(TreeError::UnexpectedEndOfFile(self.pos)),
            };
            self.pos += 1;
            Ok(literal)
        } else {
            Ok(byte)
        }
    }

    /// Decodes payload bytes up to the first unescaped marker, leaving the
    /// cursor on that marker.
    fn decode_payload(&mut self) -> TreeResult<Bytes> {
        let mut out = BytesMut::new();
        loop {
            let byte = match self.data.get(self.pos) {
                Some(&b) => b,
                None => return Err(TreeError::UnexpectedEndOfFile(self.pos)),
            };
            match byte {
                NODE_START | NODE_END => return Ok(out.freeze()),
                ESCAPE => {
                    self.pos += 1;
                    let literal = match self.data.get(self.pos) {
                        Some(&b) => b,
                        None => return Err(TreeError::UnexpectedEndOfFile(self.pos)),
                    };
                    out.put_u8(literal);
                    self.pos += 1;
                }
                _ => {
                    out.put_u8(byte);
                    self.pos += 1;
                }
            }
        }
    }
}

/// Builds an escaped binary tree in memory.
pub struct TreeWriter {
    buf: BytesMut,
    depth: usize,
}

impl Default for TreeWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeWriter {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
            depth: 0,
        }
    }

    /// Writes a raw little-endian u32 outside any node.
    pub fn write_raw_u32(&mut self, value: u32) {
        self.buf.put_slice(&value.to_le_bytes());
    }

    pub fn begin_node(&mut self, node_type: u8) {
        self.buf.put_u8(NODE_START);
        self.put_escaped(node_type);
        self.depth += 1;
    }

    pub fn end_node(&mut self) -> TreeResult<()> {
        if self.depth == 0 {
            return Err(TreeError::InvalidNodeStructure(
                "end_node with no node open".into(),
            ));
        }
        self.buf.put_u8(NODE_END);
        self.depth -= 1;
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) {
        self.put_escaped(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        for byte in value.to_le_bytes() {
            self.put_escaped(byte);
        }
    }

    pub fn write_u32(&mut self, value: u32) {
        for byte in value.to_le_bytes() {
            self.put_escaped(byte);
        }
    }

    pub fn write_u64(&mut self, value: u64) {
        for byte in value.to_le_bytes() {
            self.put_escaped(byte);
        }
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        for &byte in data {
            self.put_escaped(byte);
        }
    }

    pub fn write_string(&mut self, value: &str, with_length_prefix: bool) {
        let bytes = value.as_bytes();
        if with_length_prefix {
            self.write_u16(bytes.len() as u16);
        }
        self.write_bytes(bytes);
    }

    /// Writes an attribute record `<attr><len:u16><data>`, escape-coding
    /// every byte.
    pub fn write_prop(&mut self, attribute: u8, data: &[u8]) {
        self.write_u8(attribute);
        self.write_u16(data.len() as u16);
        self.write_bytes(data);
    }

    /// Finalizes the tree. Fails if any node is still open.
    pub fn finish(self) -> TreeResult<Bytes> {
        if self.depth != 0 {
            return Err(TreeError::InvalidNodeStructure(format!(
                "{} node(s) left open",
                self.depth
            )));
        }
        Ok(self.buf.freeze())
    }

    fn put_escaped(&mut self, byte: u8) {
        if byte == NODE_START || byte == NODE_END || byte == ESCAPE {
            self.buf.put_u8(ESCAPE);
        }
        self.buf.put_u8(byte);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn single_node(node_type: u8, payload: &[u8]) -> Vec<u8> {
        let mut writer = TreeWriter::new();
        writer.begin_node(node_type);
        writer.write_bytes(payload);
        writer.end_node().unwrap();
        writer.finish().unwrap().to_vec()
    }

    #[test]
    fn test_single_node_roundtrip() {
        let encoded = single_node(1, &[0x10, 0x20, 0x30]);
        let mut reader = TreeReader::from_bytes(encoded);
        reader.enter_node().unwrap();
        assert_eq!(reader.current_node_type(), Some(1));
        assert_eq!(reader.read_bytes(3).unwrap().as_ref(), &[0x10, 0x20, 0x30]);
        assert!(reader.at_payload_end());
        reader.leave_node().unwrap();
        assert!(!reader.has_next_node());
    }

    #[test]
    fn test_sentinel_bytes_are_escaped() {
        let payload = [0xFD, 0xFE, 0xFF, 0x41, 0xFF, 0xFE, 0xFD];
        let encoded = single_node(2, &payload);
        // Between the framing markers every sentinel must carry a prefix.
        let inner = &encoded[2..encoded.len() - 1];
        let mut i = 0;
        while i < inner.len() {
            if inner[i] == ESCAPE {
                i += 2;
                continue;
            }
            assert_ne!(inner[i], NODE_START, "unescaped start at {i}");
            assert_ne!(inner[i], NODE_END, "unescaped end at {i}");
            i += 1;
        }
        let mut reader = TreeReader::from_bytes(encoded);
        reader.enter_node().unwrap();
        assert_eq!(reader.read_bytes(7).unwrap().as_ref(), &payload);
    }

    #[test]
    fn test_nested_nodes() {
        let mut writer = TreeWriter::new();
        writer.begin_node(0);
        writer.write_u32(0xDEAD_BEEF);
        writer.begin_node(1);
        writer.write_u16(7);
        writer.end_node().unwrap();
        writer.begin_node(2);
        writer.write_u16(9);
        writer.end_node().unwrap();
        writer.end_node().unwrap();
        let encoded = writer.finish().unwrap().to_vec();

        let mut reader = TreeReader::from_bytes(encoded);
        reader.enter_node().unwrap();
        assert_eq!(reader.read_u32().unwrap(), 0xDEAD_BEEF);
        assert!(reader.at_payload_end());
        assert!(reader.has_next_node());

        reader.enter_node().unwrap();
        assert_eq!(reader.current_node_type(), Some(1));
        assert_eq!(reader.read_u16().unwrap(), 7);
        reader.leave_node().unwrap();

        assert!(reader.has_next_node());
        reader.enter_node().unwrap();
        assert_eq!(reader.current_node_type(), Some(2));
        assert_eq!(reader.read_u16().unwrap(), 9);
        reader.leave_node().unwrap();

        assert!(!reader.has_next_node());
        reader.leave_node().unwrap();
        assert_eq!(reader.depth(), 0);
    }

    #[test]
    fn test_root_children_iterate_after_leave() {
        // Mirrors the database layout: children live inside the root but
        // are walked as a flat sequence once the root is left.
        let mut writer = TreeWriter::new();
        writer.begin_node(0);
        writer.write_u32(0);
        for t in [1u8, 2, 5] {
            writer.begin_node(t);
            writer.write_bytes(&[0xFE, 0xFF, t]);
            writer.end_node().unwrap();
        }
        writer.end_node().unwrap();
        let encoded = writer.finish().unwrap().to_vec();

        let mut reader = TreeReader::from_bytes(encoded);
        reader.enter_node().unwrap();
        assert_eq!(reader.current_node_type(), Some(0));
        assert_eq!(reader.read_u32().unwrap(), 0);
        reader.leave_node().unwrap();

        let mut seen = Vec::new();
        while reader.has_next_node() {
            reader.enter_node().unwrap();
            let t = reader.current_node_type().unwrap();
            assert_eq!(reader.read_bytes(3).unwrap().as_ref(), &[0xFE, 0xFF, t]);
            seen.push(t);
            reader.leave_node().unwrap();
        }
        assert_eq!(seen, vec![1, 2, 5]);
    }

    #[test]
    fn test_payload_exhaustion_is_reported() {
        let encoded = single_node(1, &[0x01]);
        let mut reader = TreeReader::from_bytes(encoded);
        reader.enter_node().unwrap();
        let err = reader.read_u32().unwrap_err();
        assert!(matches!(
            err,
            TreeError::PayloadExhausted {
                needed: 4,
                available: 1
            }
        ));
    }

    #[test]
    fn test_truncated_escape_fails() {
        let data = vec![NODE_START, 0x01, 0x02, ESCAPE];
        let mut reader = TreeReader::from_bytes(data);
        let err = reader.enter_node().unwrap_err();
        assert!(matches!(err, TreeError::UnexpectedEndOfFile(_)));
    }

    #[test]
    fn test_enter_on_non_marker_fails() {
        let mut reader = TreeReader::from_bytes(vec![0x42]);
        let err = reader.enter_node().unwrap_err();
        assert!(matches!(err, TreeError::InvalidNodeStructure(_)));
    }

    #[test]
    fn test_unbalanced_writer_is_rejected() {
        let mut writer = TreeWriter::new();
        writer.begin_node(0);
        assert!(matches!(
            writer.finish(),
            Err(TreeError::InvalidNodeStructure(_))
        ));
    }

    #[test]
    fn test_prop_record_layout() {
        let mut writer = TreeWriter::new();
        writer.begin_node(1);
        writer.write_prop(0x10, &[0xAB, 0xCD]);
        writer.end_node().unwrap();
        let encoded = writer.finish().unwrap().to_vec();

        let mut reader = TreeReader::from_bytes(encoded);
        reader.enter_node().unwrap();
        assert_eq!(reader.read_u8().unwrap(), 0x10);
        assert_eq!(reader.read_u16().unwrap(), 2);
        assert_eq!(reader.read_bytes(2).unwrap().as_ref(), &[0xAB, 0xCD]);
        assert!(reader.at_payload_end());
    }

    proptest! {
        #[test]
        fn prop_escape_roundtrip(payload in proptest::collection::vec(any::<u8>(), 0..512)) {
            let encoded = single_node(1, &payload);
            let mut reader = TreeReader::from_bytes(encoded);
            reader.enter_node().unwrap();
            let decoded = reader.read_bytes(payload.len()).unwrap();
            prop_assert_eq!(decoded.as_ref(), payload.as_slice());
            prop_assert!(reader.at_payload_end());
            reader.leave_node().unwrap();
        }

        #[test]
        fn prop_sibling_forest_roundtrip(
            payloads in proptest::collection::vec(
                proptest::collection::vec(any::<u8>(), 0..64),
                1..8,
            )
        ) {
            let mut writer = TreeWriter::new();
            writer.begin_node(0);
            for payload in &payloads {
                writer.begin_node(1);
                writer.write_bytes(payload);
                writer.end_node().unwrap();
            }
            writer.end_node().unwrap();
            let encoded = writer.finish().unwrap().to_vec();

            let mut reader = TreeReader::from_bytes(encoded);
            reader.enter_node().unwrap();
            reader.leave_node().unwrap();
            for payload in &payloads {
                prop_assert!(reader.has_next_node());
                reader.enter_node().unwrap();
                let decoded = reader.read_bytes(payload.len()).unwrap();
                prop_assert_eq!(decoded.as_ref(), payload.as_slice());
                reader.leave_node().unwrap();
            }
            prop_assert!(!reader.has_next_node());
        }
    }
}
