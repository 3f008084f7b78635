use std::collections::BTreeMap;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::{data::log_record::LogRecordPos, errors::Result, option::IteratorOptions};

use super::{IndexIterator, Indexer};

/// Ordered in-memory key directory backed by the standard library's BTreeMap.
pub struct BTree {
  tree: RwLock<BTreeMap<Vec<u8>, LogRecordPos>>,
}

impl BTree {
  pub fn new() -> Self {
    Self {
      tree: RwLock::new(BTreeMap::new()),
    }
  }
}

impl Default for BTree {
  fn default() -> Self {
    Self::new()
  }
}

impl Indexer for BTree {
  fn put(&self, key: Vec<u8>, pos: LogRecordPos) -> Result<Option<LogRecordPos>> {
    let mut write_guard = self.tree.write();
    Ok(write_guard.insert(key, pos))
  }

  fn get(&self, key: Vec<u8>) -> Result<Option<LogRecordPos>> {
    let read_guard = self.tree.read();
    Ok(read_guard.get(&key).copied())
  }

  fn delete(&self, key: Vec<u8>) -> Result<(Option<LogRecordPos>, bool)> {
    let mut write_guard = self.tree.write();
    let old = write_guard.remove(&key);
    let removed = old.is_some();
    Ok((old, removed))
  }

  fn list_keys(&self) -> Result<Vec<Bytes>> {
    let read_guard = self.tree.read();
    let mut keys = Vec::with_capacity(read_guard.len());
    for key in read_guard.keys() {
      keys.push(Bytes::copy_from_slice(key));
    }
    Ok(keys)
  }

  fn iterator(&self, options: IteratorOptions) -> Box<dyn IndexIterator> {
    let read_guard = self.tree.read();
    let mut items = Vec::with_capacity(read_guard.len());
    for (key, pos) in read_guard.iter() {
      items.push((key.clone(), *pos));
    }
    if options.reverse {
      items.reverse();
    }
    Box::new(BTreeIterator {
      items,
      curr_index: 0,
      options,
    })
  }

  fn close(&self) -> Result<()> {
    Ok(())
  }
}

pub struct BTreeIterator {
  items: Vec<(Vec<u8>, LogRecordPos)>,
  curr_index: usize,
  options: IteratorOptions,
}

impl BTreeIterator {
  fn skip_to_prefix(&mut self) {
    while self.curr_index < self.items.len()
      && !self.items[self.curr_index].0.starts_with(&self.options.prefix)
    {
      self.curr_index += 1;
    }
  }
}

impl IndexIterator for BTreeIterator {
  fn rewind(&mut self) {
    self.curr_index = 0;
    self.skip_to_prefix();
  }

  fn seek(&mut self, key: Vec<u8>) {
    self.curr_index = match self.options.reverse {
      false => self.items.partition_point(|(k, _)| k < &key),
      true => {
        let pos = self.items.partition_point(|(k, _)| k > &key);
        pos
      }
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

  #[test]
  fn test_btree_put_get_delete() {
    let bt = BTree::new();
    assert!(bt
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

    let old = bt.put(
      b"key1".to_vec(),
      LogRecordPos {
        file_id: 1,
        offset: 20,
        size: 5,
      },
    );
    assert!(old.unwrap().is_some());

    let pos = bt.get(b"key1".to_vec()).unwrap().unwrap();
    assert_eq!(pos.offset, 20);

    let (old_pos, removed) = bt.delete(b"key1".to_vec()).unwrap();
    assert!(old_pos.is_some());
    assert!(removed);
    assert!(bt.get(b"key1".to_vec()).unwrap().is_none());

    let (old_pos, removed) = bt.delete(b"key1".to_vec()).unwrap();
    assert!(old_pos.is_none());
    assert!(!removed);
  }

  #[test]
  fn test_btree_iterator_order_and_prefix() {
    let bt = BTree::new();
    for (k, off) in [("apple", 1), ("apricot", 2), ("banana", 3)] {
      bt.put(
        k.as_bytes().to_vec(),
        LogRecordPos {
          file_id: 0,
          offset: off,
          size: 1,
        },
      )
      .unwrap();
    }

    let mut opts = IteratorOptions::default();
    opts.prefix = b"ap".to_vec();
    let mut iter = bt.iterator(opts);
    iter.rewind();

    let (k1, _) = iter.next().unwrap();
    assert_eq!(k1, b"apple");
    let (k2, _) = iter.next().unwrap();
    assert_eq!(k2, b"apricot");
    assert!(iter.next().is_none());
  }

  #[test]
  fn test_btree_list_keys() {
    let bt = BTree::new();
    bt.put(
      b"a".to_vec(),
      LogRecordPos {
        file_id: 0,
        offset: 0,
        size: 1,
      },
    )
    .unwrap();
    bt.put(
      b"b".to_vec(),
      LogRecordPos {
        file_id: 0,
        offset: 1,
        size: 1,
      },
    )
    .unwrap();
    let keys = bt.list_keys().unwrap();
    assert_eq!(keys.len(), 2);
  }
}
