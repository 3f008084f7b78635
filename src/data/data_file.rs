use parking_lot::RwLock;
use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use super::log_record::{decode_header, LogRecord, LogRecordPos, LogRecordType, ReadLogRecord};
use crate::{
  data::log_record::{crc_of, max_log_record_header_size},
  errors::{Errors, Result},
  fio::{new_io_manager, IOManager},
  option::IOManagerType,
};

pub const DATA_FILE_NAME_SUFFIX: &str = ".data";
pub const HINT_FILE_NAME: &str = "hint-index";
pub const MERGE_FINISHED_FILE_NAME: &str = "merge-finished";
pub const SEQ_NO_FILE_NAME: &str = "seq-no";

#[macro_export]
macro_rules! new_data_file {
  () => {
      pub fn new<P: AsRef<std::path::Path>>(dir_path: P, file_id: u32, io_type: IOManagerType) -> Result<Self> {
          let file_name = get_data_file_name(&dir_path, file_id);
          let io_manager = new_io_manager(&file_name, &io_type);
          Ok(Self {
              file_id: std::sync::Arc::new(parking_lot::RwLock::new(file_id)),
              write_off: std::sync::Arc::new(parking_lot::RwLock::new(0)),
              io_manager,
          })
      }
  };
  ($($name:ident, $file_id:expr, $io_type:expr, $file_name:expr);*;) => {
      $(
          pub fn $name<P: AsRef<std::path::Path>>(dir_path: P) -> Result<Self> {
              let file_name = $file_name.map_or_else(
                  || panic!("File name must be provided"),
                  |name| dir_path.as_ref().join(name),
              );
              let io_manager = new_io_manager(&file_name, &$io_type);
              Ok(Self {
                  file_id: std::sync::Arc::new(parking_lot::RwLock::new($file_id)),
                  write_off: std::sync::Arc::new(parking_lot::RwLock::new(0)),
                  io_manager,
              })
          }
      )*
  };
}

/// A single numbered append-only segment. Only the highest-numbered
/// segment in a running engine is ever written; older ones are immutable.
pub struct DataFile {
  file_id: Arc<RwLock<u32>>,
  write_off: Arc<RwLock<u64>>,
  io_manager: Box<dyn IOManager>,
}

impl DataFile {
  new_data_file!();

  new_data_file!(
    new_hint_file,
    0,
    IOManagerType::StandardFileIO,
    Some(HINT_FILE_NAME);
    new_merge_fin_file,
    0,
    IOManagerType::StandardFileIO,
    Some(MERGE_FINISHED_FILE_NAME);
    new_seq_no_file,
    0,
    IOManagerType::StandardFileIO,
    Some(SEQ_NO_FILE_NAME);
  );

  pub fn file_size(&self) -> u64 {
    self.io_manager.size()
  }

  pub fn get_write_off(&self) -> u64 {
    let read_guard = self.write_off.read();
    *read_guard
  }

  pub fn set_write_off(&self, offset: u64) {
    let mut write_guard = self.write_off.write();
    *write_guard = offset;
  }

  pub fn get_file_id(&self) -> u32 {
    let read_guard = self.file_id.read();
    *read_guard
  }

  /// Reads and decodes the record at `offset`.
  ///
  /// Scans the fixed-size header window first (zero-padded near the end of
  /// the file, which is what lets the all-zero sentinel fall out naturally
  /// instead of requiring a special EOF check), then reads exactly the
  /// key+value+nothing-else tail the header promises and verifies the crc.
  pub fn read_log_record(&self, offset: u64) -> Result<ReadLogRecord> {
    let mut header_buf = vec![0u8; max_log_record_header_size()];
    self.io_manager.read(&mut header_buf, offset)?;

    let header = match decode_header(&header_buf) {
      None => return Err(Errors::ReadDataFileEOF),
      Some(h) => h,
    };

    if header.crc == 0 && header.rec_type == 0 && header.key_size == 0 && header.value_size == 0 {
      return Err(Errors::ReadDataFileEOF);
    }

    let tail_len = header.key_size + header.value_size;
    let mut tail_buf = vec![0u8; tail_len];
    let n = self
      .io_manager
      .read(&mut tail_buf, offset + header.header_size as u64)?;
    if n < tail_len {
      // the record was truncated mid-write (e.g. a crash before an
      // in-flight append completed); treat the remainder of the segment
      // as unwritten rather than surfacing a spurious corruption error.
      return Err(Errors::ReadDataFileEOF);
    }

    let key = tail_buf[..header.key_size].to_vec();
    let value = tail_buf[header.key_size..].to_vec();

    let header_tail = &header_buf[5..header.header_size];
    let crc = crc_of(header.rec_type, header_tail, &key, &value);
    if crc != header.crc {
      return Err(Errors::InvalidLogRecordCrc);
    }

    let log_record = LogRecord {
      key,
      value,
      rec_type: LogRecordType::from_u8(header.rec_type),
    };

    Ok(ReadLogRecord {
      record: log_record,
      size: header.header_size + tail_len,
    })
  }

  pub fn write(&self, buf: &[u8]) -> Result<usize> {
    let n_bytes = self.io_manager.write(buf)?;

    let mut write_off = self.write_off.write();
    *write_off += n_bytes as u64;

    Ok(n_bytes)
  }

  /// Writes a hint record mapping `key` to `pos`, using the hint-only
  /// position encoding (no `size` field).
  pub fn write_hint_record(&self, key: Vec<u8>, pos: LogRecordPos) -> Result<()> {
    let hint_record = LogRecord {
      key,
      value: pos.encode_for_hint(),
      rec_type: LogRecordType::Normal,
    };
    let enc_record = hint_record.encode();
    self.write(&enc_record)?;
    Ok(())
  }

  pub fn sync(&self) -> Result<()> {
    self.io_manager.sync()
  }

  pub fn close(&self) -> Result<()> {
    self.io_manager.close()
  }

  pub fn set_io_manager<P>(&mut self, dir_path: P, io_type: IOManagerType)
  where
    P: AsRef<Path>,
  {
    self.io_manager = new_io_manager(&get_data_file_name(dir_path, self.get_file_id()), &io_type);
  }
}

pub fn get_data_file_name<P>(dir_path: P, file_id: u32) -> PathBuf
where
  P: AsRef<Path>,
{
  let name = format!("{file_id:09}") + DATA_FILE_NAME_SUFFIX;
  dir_path.as_ref().join(name)
}
