use bytes::Bytes;
use crossbeam_skiplist::SkipMap;

use crate::{data::log_record::LogRecordPos, errors::Result, option::IteratorOptions};

use super::{IndexIterator, Indexer};

/// Lock-free ordered key directory backed by a skip list. Chosen as the
/// stand-in for an adaptive radix tree: same lexicographic ordering
/// guarantees, concurrent reads without a global lock.
pub struct SkipList {
  skl: SkipMap<Vec<u8>, LogRecordPos>,
}

impl SkipList {
  pub fn new() -> Self {
    Self {
      skl: SkipMap::new(),
    }
  }
}

impl Default for SkipList {
  fn default() -> Self {
    Self::new()
  }
}

impl Indexer for SkipList {
  fn put(&self, key: Vec<u8>, pos: LogRecordPos) -> Result<Option<LogRecordPos>> {
    let old = self.skl.get(&key).map(|e| *e.value());
    self.skl.insert(key, pos);
    Ok(old)
  }

  fn get(&self, key: Vec<u8>) -> Result<Option<LogRecordPos>> {
    Ok(self.skl.get(&key).map(|e| *e.value()))
  }

  fn delete(&self, key: Vec<u8>) -> Result<(Option<LogRecordPos>, bool)> {
    let old = self.skl.remove(&key).map(|e| *e.value());
    let removed = old.is_some();
    Ok((old, removed))
  }

  fn list_keys(&self) -> Result<Vec<Bytes>> {
    let mut keys = Vec::with_capacity(self.skl.len());
    for entry in self.skl.iter() {
      keys.push(Bytes::copy_from_slice(entry.key()));
    }
    Ok(keys)
  }

  fn iterator(&self, options: IteratorOptions) -> Box<dyn IndexIterator> {
    let mut items = Vec::with_capacity(self.skl.len());
    for entry in self.skl.iter() {
      items.push((entry.key().clone(), *entry.value()));
    }
    if options.reverse {
      items.reverse();
    }
    Box::new(SkipListIterator {
      items,
      curr_index: 0,
      options,
    })
  }

  fn close(&self) -> Result<()> {
    Ok(())
  }
}

pub struct SkipListIterator {
  items: Vec<(Vec<u8>, LogRecordPos)>,
  curr_index: usize,
  options: IteratorOptions,
}

impl SkipListIterator {
  fn skip_to_prefix(&mut self) {
    while self.curr_index < self.items.len()
      && !self.items[self.curr_index].0.starts_with(&self.options.prefix)
    {
      self.curr_index += 1;
    }
  }
}

impl IndexIterator for SkipListIterator {
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

  #[test]
  fn test_skiplist_put_get_delete() {
    let skl = SkipList::new();
    assert!(skl
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

    let old = skl.put(
      b"key1".to_vec(),
      LogRecordPos {
        file_id: 1,
        offset: 20,
        size: 5,
      },
    );
    assert!(old.unwrap().is_some());

    let pos = skl.get(b"key1".to_vec()).unwrap().unwrap();
    assert_eq!(pos.offset, 20);

    let (old_pos, removed) = skl.delete(b"key1".to_vec()).unwrap();
    assert!(old_pos.is_some());
    assert!(removed);
    assert!(skl.get(b"key1".to_vec()).unwrap().is_none());

    let (old_pos, removed) = skl.delete(b"key1".to_vec()).unwrap();
    assert!(old_pos.is_none());
    assert!(!removed);
  }

  #[test]
  fn test_skiplist_iterator_reverse() {
    let skl = SkipList::new();
    for (k, off) in [("a", 1), ("b", 2), ("c", 3)] {
      skl
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

    let mut opts = IteratorOptions::default();
    opts.reverse = true;
    let mut iter = skl.iterator(opts);
    iter.rewind();

    let (k1, _) = iter.next().unwrap();
    assert_eq!(k1, b"c");
    let (k2, _) = iter.next().unwrap();
    assert_eq!(k2, b"b");
    let (k3, _) = iter.next().unwrap();
    assert_eq!(k3, b"a");
  }
}
