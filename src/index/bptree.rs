use std::path::Path;

use bytes::Bytes;
use jammdb::{Data, DB};

use crate::{
  data::log_record::{decode_log_record_pos, LogRecordPos},
  errors::{Errors, Result},
  option::IteratorOptions,
};

use super::{IndexIterator, Indexer};

const BPTREE_INDEX_FILE_NAME: &str = "bptree-index";
const INDEX_BUCKET_NAME: &str = "barrelkv-index";

/// Persistent B+-tree key directory backed by jammdb. Every put/delete
/// commits its own transaction, so unlike the in-memory variants this one
/// survives a restart without replaying data files (see db.rs's open path).
pub struct BPlusTree {
  tree: DB,
}

impl BPlusTree {
  pub fn new<P: AsRef<Path>>(dir_path: P) -> Result<Self> {
    let path = dir_path.as_ref().join(BPTREE_INDEX_FILE_NAME);
    let tree = DB::open(path).map_err(|_| Errors::IndexUpdateFailed)?;
    let tx = tree.tx(true).map_err(|_| Errors::IndexUpdateFailed)?;
    tx.get_or_create_bucket(INDEX_BUCKET_NAME)
      .map_err(|_| Errors::IndexUpdateFailed)?;
    tx.commit().map_err(|_| Errors::IndexUpdateFailed)?;
    Ok(Self { tree })
  }
}

fn kv_pos(data: Data) -> Option<LogRecordPos> {
  match data {
    Data::KeyValue(kv) => Some(decode_log_record_pos(kv.value().to_vec())),
    Data::Bucket(_) => None,
  }
}

impl Indexer for BPlusTree {
  fn put(&self, key: Vec<u8>, pos: LogRecordPos) -> Result<Option<LogRecordPos>> {
    let tx = self.tree.tx(true).map_err(|_| Errors::IndexUpdateFailed)?;
    let bucket = tx
      .get_bucket(INDEX_BUCKET_NAME)
      .map_err(|_| Errors::IndexUpdateFailed)?;
    let old_pos = bucket.get(&key).and_then(kv_pos);
    bucket
      .put(key, pos.encode())
      .map_err(|_| Errors::IndexUpdateFailed)?;
    tx.commit().map_err(|_| Errors::IndexUpdateFailed)?;
    Ok(old_pos)
  }

  fn get(&self, key: Vec<u8>) -> Result<Option<LogRecordPos>> {
    let tx = self.tree.tx(false).map_err(|_| Errors::IndexUpdateFailed)?;
    let bucket = tx
      .get_bucket(INDEX_BUCKET_NAME)
      .map_err(|_| Errors::IndexUpdateFailed)?;
    Ok(bucket.get(&key).and_then(kv_pos))
  }

  fn delete(&self, key: Vec<u8>) -> Result<(Option<LogRecordPos>, bool)> {
    let tx = self.tree.tx(true).map_err(|_| Errors::IndexUpdateFailed)?;
    let bucket = tx
      .get_bucket(INDEX_BUCKET_NAME)
      .map_err(|_| Errors::IndexUpdateFailed)?;
    let old_pos = bucket.get(&key).and_then(kv_pos);
    let mut removed = false;
    if old_pos.is_some() {
      bucket
        .delete(&key)
        .map_err(|_| Errors::IndexUpdateFailed)?;
      removed = true;
    }
    tx.commit().map_err(|_| Errors::IndexUpdateFailed)?;
    Ok((old_pos, removed))
  }

  fn list_keys(&self) -> Result<Vec<Bytes>> {
    let tx = self.tree.tx(false).map_err(|_| Errors::IndexUpdateFailed)?;
    let bucket = tx
      .get_bucket(INDEX_BUCKET_NAME)
      .map_err(|_| Errors::IndexUpdateFailed)?;
    let mut keys = Vec::new();
    for data in bucket.cursor() {
      if let Data::KeyValue(kv) = data {
        keys.push(Bytes::copy_from_slice(kv.key()));
      }
    }
    Ok(keys)
  }

  fn iterator(&self, options: IteratorOptions) -> Box<dyn IndexIterator> {
    // `IndexIterator` construction can't report an error through the shared
    // trait, so a tx/bucket failure here degrades to an empty iterator
    // rather than panicking the process.
    let mut items = Vec::new();
    match self.tree.tx(false) {
      Ok(tx) => match tx.get_bucket(INDEX_BUCKET_NAME) {
        Ok(bucket) => {
          for data in bucket.cursor() {
            if let Data::KeyValue(kv) = data {
              items.push((kv.key().to_vec(), decode_log_record_pos(kv.value().to_vec())));
            }
          }
        }
        Err(e) => log::error!("failed to open bptree index bucket: {e}"),
      },
      Err(e) => log::error!("failed to start bptree read tx: {e}"),
    }

    if options.reverse {
      items.reverse();
    }
    Box::new(BPlusTreeIterator {
      items,
      curr_index: 0,
      options,
    })
  }

  fn close(&self) -> Result<()> {
    // every write already commits its own transaction, so there is nothing
    // left to flush; the file handle closes when `self.tree` drops.
    Ok(())
  }
}

pub struct BPlusTreeIterator {
  items: Vec<(Vec<u8>, LogRecordPos)>,
  curr_index: usize,
  options: IteratorOptions,
}

impl BPlusTreeIterator {
  fn skip_to_prefix(&mut self) {
    while self.curr_index < self.items.len()
      && !self.items[self.curr_index].0.starts_with(&self.options.prefix)
    {
      self.curr_index += 1;
    }
  }
}

impl IndexIterator for BPlusTreeIterator {
  fn rewind(&mut self) {
    self.curr_index = 0;
    self.skip_to_prefix();
  }

  fn seek(&mut self, key: Vec<u8>) {
    self.curr_index = match self.options.reverse {
      false => self.items.partition_point(|(k, _)| k < &key),
      true => self.items.partition_point(|(k, _)| k > &key),
    };
    self.skip_to_prefix();
  }

  fn next(&mut self) -> Option<(&Vec<u8>, &LogRecordPos)> {
    self.skip_to_prefix();
    if self.curr_index >= self.items.len() {
      return None;
    }
    let item = &self.items[self.curr_index];
    self.curr_index += 1;
    Some((&item.0, &item.1))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn test_bptree_put_get_delete() {
    let dir = tempdir().unwrap();
    let bpt = BPlusTree::new(dir.path()).unwrap();

    assert!(bpt
      .put(
        b"key1".to_vec(),
        LogRecordPos {
          file_id: 1,
          offset: 10,
          size: 5,
        }
      )
      .unwrap()
      .is_none());

    let pos = bpt.get(b"key1".to_vec()).unwrap().unwrap();
    assert_eq!(pos.offset, 10);

    let old = bpt.put(
      b"key1".to_vec(),
      LogRecordPos {
        file_id: 1,
        offset: 30,
        size: 5,
      },
    );
    assert_eq!(old.unwrap().unwrap().offset, 10);

    let (old_pos, removed) = bpt.delete(b"key1".to_vec()).unwrap();
    assert!(old_pos.is_some());
    assert!(removed);
    assert!(bpt.get(b"key1".to_vec()).unwrap().is_none());

    let (old_pos, removed) = bpt.delete(b"key1".to_vec()).unwrap();
    assert!(old_pos.is_none());
    assert!(!removed);
  }

  #[test]
  fn test_bptree_iterator() {
    let dir = tempdir().unwrap();
    let bpt = BPlusTree::new(dir.path()).unwrap();
    for (k, off) in [("a", 1), ("b", 2), ("c", 3)] {
      bpt
        .put(
          k.as_bytes().to_vec(),
          LogRecordPos {
            file_id: 0,
            offset: off,
            size: 1,
          },
        )
        .unwrap();
    }

    let mut iter = bpt.iterator(IteratorOptions::default());
    iter.rewind();
    let (k1, _) = iter.next().unwrap();
    assert_eq!(k1, b"a");
  }
}
