use bytes::{Buf, BufMut, BytesMut};
use prost::encoding::{decode_varint, encode_varint, encoded_len_varint};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LogRecordType {
  Normal = 0,

  Tombstone = 1,

  TxnFinished = 2,
}

#[derive(Debug)]
pub struct LogRecord {
  pub(crate) key: Vec<u8>,
  pub(crate) value: Vec<u8>,
  pub(crate) rec_type: LogRecordType,
}

/// Position of a record on disk: the file it lives in, its offset, and its
/// encoded length (used for reclaim-size accounting).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct LogRecordPos {
  pub(crate) file_id: u32,
  pub(crate) offset: u64,
  pub(crate) size: u32,
}

#[derive(Debug)]
pub struct ReadLogRecord {
  pub(crate) record: LogRecord,
  pub(crate) size: usize,
}

pub struct TransactionRecord {
  pub(crate) record: LogRecord,
  pub(crate) pos: LogRecordPos,
}

/// Decoded record header, scanned off the front of a record before the
/// key/value bytes are read.
pub(crate) struct RecordHeader {
  pub(crate) crc: u32,
  pub(crate) rec_type: u8,
  pub(crate) key_size: usize,
  pub(crate) value_size: usize,
  pub(crate) header_size: usize,
}

fn zigzag_encode(value: i64) -> u64 {
  ((value << 1) ^ (value >> 63)) as u64
}

fn zigzag_decode(value: u64) -> i64 {
  ((value >> 1) as i64) ^ -((value & 1) as i64)
}

fn encode_svarint(value: i64, buf: &mut impl BufMut) {
  encode_varint(zigzag_encode(value), buf);
}

fn decode_svarint(buf: &mut impl Buf) -> i64 {
  zigzag_decode(decode_varint(buf).expect("malformed signed varint"))
}

fn svarint_len(value: i64) -> usize {
  encoded_len_varint(zigzag_encode(value))
}

impl LogRecord {
  /// Encode for log record, return its on-disk bytes.
  //
  //  offset  size  field
  //    0     4     crc32 (IEEE) over bytes [4..end]
  //    4     1     type
  //   ...    v1    key length, signed varint
  //   ...    v2    value length, signed varint
  //   ...    K     key bytes
  //   ...    V     value bytes
  pub fn encode(&self) -> Vec<u8> {
    let mut buf = BytesMut::new();
    buf.reserve(self.encoded_length());

    // reserve the crc slot, filled in once the rest of the buffer is known
    buf.put_u32_le(0);
    buf.put_u8(self.rec_type as u8);
    encode_svarint(self.key.len() as i64, &mut buf);
    encode_svarint(self.value.len() as i64, &mut buf);
    buf.extend_from_slice(&self.key);
    buf.extend_from_slice(&self.value);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&buf[4..]);
    let crc = hasher.finalize();
    buf[0..4].copy_from_slice(&crc.to_le_bytes());

    buf.to_vec()
  }

  fn encoded_length(&self) -> usize {
    4 + 1
      + svarint_len(self.key.len() as i64)
      + svarint_len(self.value.len() as i64)
      + self.key.len()
      + self.value.len()
  }
}

impl LogRecordPos {
  /// Encodes the position as used everywhere *except* hint records:
  /// signed varints of file_id, offset, size.
  pub fn encode(&self) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_svarint(self.file_id as i64, &mut buf);
    encode_svarint(self.offset as i64, &mut buf);
    encode_svarint(self.size as i64, &mut buf);
    buf.to_vec()
  }

  /// Hint-file encoding carries only `(file_id, offset)`; `size` is left
  /// unknown (0) for positions loaded this way — see spec Open Questions.
  pub fn encode_for_hint(&self) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_svarint(self.file_id as i64, &mut buf);
    encode_svarint(self.offset as i64, &mut buf);
    buf.to_vec()
  }
}

impl LogRecordType {
  pub fn from_u8(value: u8) -> Self {
    match value {
      0 => LogRecordType::Normal,
      1 => LogRecordType::Tombstone,
      2 => LogRecordType::TxnFinished,
      _ => panic!("unsupported log record type"),
    }
  }
}

/// Maximum possible header size: 4 (crc) + 1 (type) + 5 (key len) + 5 (value len).
pub fn max_log_record_header_size() -> usize {
  4 + 1 + 10
}

/// Parses the header out of a (possibly zero-padded, possibly short near
/// EOF) buffer. Returns `None` on a buffer too short to hold even the crc
/// and type, the same "not a record here" signal the all-zero sentinel
/// produces once the varints are decoded.
pub(crate) fn decode_header(buf: &[u8]) -> Option<RecordHeader> {
  if buf.len() <= 4 {
    return None;
  }
  let crc = u32::from_le_bytes(buf[0..4].try_into().unwrap());
  let rec_type = buf[4];

  let mut rest = &buf[5..];
  let before = rest.len();
  let key_size = decode_svarint(&mut rest) as usize;
  let after_key = rest.len();
  let value_size = decode_svarint(&mut rest) as usize;
  let after_value = rest.len();

  let header_size = 5 + (before - after_key) + (after_key - after_value);

  Some(RecordHeader {
    crc,
    rec_type,
    key_size,
    value_size,
    header_size,
  })
}

/// Computes the crc over the type byte, the length varints, and the
/// key/value tail, without needing the whole record re-assembled.
pub(crate) fn crc_of(rec_type: u8, header_tail: &[u8], key: &[u8], value: &[u8]) -> u32 {
  let mut hasher = crc32fast::Hasher::new();
  hasher.update(&[rec_type]);
  hasher.update(header_tail);
  hasher.update(key);
  hasher.update(value);
  hasher.finalize()
}

/// Decodes the position written into a non-hint record value: three
/// signed varints (file_id, offset, size).
pub fn decode_log_record_pos(pos: Vec<u8>) -> LogRecordPos {
  let mut buf = &pos[..];
  let file_id = decode_svarint(&mut buf);
  let offset = decode_svarint(&mut buf);
  let size = decode_svarint(&mut buf);
  LogRecordPos {
    file_id: file_id as u32,
    offset: offset as u64,
    size: size as u32,
  }
}

/// Decodes a hint record value: two signed varints (file_id, offset), with
/// `size` left at 0.
pub fn decode_log_record_pos_from_hint(pos: Vec<u8>) -> LogRecordPos {
  let mut buf = &pos[..];
  let file_id = decode_svarint(&mut buf);
  let offset = decode_svarint(&mut buf);
  LogRecordPos {
    file_id: file_id as u32,
    offset: offset as u64,
    size: 0,
  }
}
