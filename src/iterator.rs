use bytes::Bytes;
use parking_lot::Mutex;

use crate::{db::Engine, errors::Result, index::IndexIterator, option::IteratorOptions};

/// A point-in-time view over the engine's key directory.
///
/// The iterator owns a snapshot taken at construction time (see
/// `Indexer::iterator`), so later writes to the engine never change what it
/// yields; only value lookups for the keys already in the snapshot go back
/// through the engine, under its normal read path.
pub struct Iterator<'a> {
  index_iter: Mutex<Box<dyn IndexIterator>>,
  engine: &'a Engine,
}

impl Engine {
  /// Returns a snapshot iterator over the key directory.
  pub fn iterator(&self, options: IteratorOptions) -> Iterator {
    Iterator {
      index_iter: Mutex::new(self.index.iterator(options)),
      engine: self,
    }
  }

  /// Returns every key currently present, in index order.
  pub fn list_keys(&self) -> Result<Vec<Bytes>> {
    self.index.list_keys()
  }

  /// Visits every key/value pair in index order, stopping as soon as `f`
  /// returns `false`.
  pub fn fold<F>(&self, f: F) -> Result<()>
  where
    F: Fn(Bytes, Bytes) -> bool,
  {
    let mut index_iter = self.index.iterator(IteratorOptions::default());
    while let Some((key, pos)) = index_iter.next() {
      let value = self.get_value_by_position(pos)?;
      if !f(Bytes::copy_from_slice(key), value) {
        break;
      }
    }
    Ok(())
  }
}

impl Iterator<'_> {
  pub fn rewind(&self) {
    self.index_iter.lock().rewind();
  }

  pub fn seek(&self, key: Vec<u8>) {
    self.index_iter.lock().seek(key);
  }

  pub fn next(&self) -> Option<(Vec<u8>, Bytes)> {
    let mut index_iter = self.index_iter.lock();
    let (key, pos) = index_iter.next()?;
    let key = key.clone();
    let value = self.engine.get_value_by_position(pos).ok()?;
    Some((key, value))
  }
}

#[cfg(test)]
mod tests {
  use crate::option::Options;

  use super::*;

  fn open_test_engine(dir: &std::path::Path) -> Engine {
    let mut opts = Options::default();
    opts.dir_path = dir.to_path_buf();
    Engine::open(opts).unwrap()
  }

  #[test]
  fn test_iterator_seek_and_order() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open_test_engine(dir.path());

    engine
      .put(Bytes::from("apple"), Bytes::from("1"))
      .unwrap();
    engine
      .put(Bytes::from("apricot"), Bytes::from("2"))
      .unwrap();
    engine
      .put(Bytes::from("banana"), Bytes::from("3"))
      .unwrap();

    let iter = engine.iterator(IteratorOptions::default());
    iter.rewind();
    let (k, _) = iter.next().unwrap();
    assert_eq!(k, b"apple");

    iter.seek(b"banana".to_vec());
    let (k, v) = iter.next().unwrap();
    assert_eq!(k, b"banana");
    assert_eq!(v, Bytes::from("3"));
  }

  #[test]
  fn test_iterator_prefix_filter() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open_test_engine(dir.path());

    engine
      .put(Bytes::from("apple"), Bytes::from("1"))
      .unwrap();
    engine
      .put(Bytes::from("apricot"), Bytes::from("2"))
      .unwrap();
    engine
      .put(Bytes::from("banana"), Bytes::from("3"))
      .unwrap();

    let mut opts = IteratorOptions::default();
    opts.prefix = b"ap".to_vec();
    let iter = engine.iterator(opts);
    iter.rewind();

    let (k1, _) = iter.next().unwrap();
    assert_eq!(k1, b"apple");
    let (k2, _) = iter.next().unwrap();
    assert_eq!(k2, b"apricot");
    assert!(iter.next().is_none());
  }

  #[test]
  fn test_list_keys_and_fold() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open_test_engine(dir.path());

    engine.put(Bytes::from("a"), Bytes::from("1")).unwrap();
    engine.put(Bytes::from("b"), Bytes::from("2")).unwrap();

    let keys = engine.list_keys().unwrap();
    assert_eq!(keys.len(), 2);

    let seen = std::cell::Cell::new(0);
    engine
      .fold(|_k, _v| {
        seen.set(seen.get() + 1);
        true
      })
      .unwrap();
    assert_eq!(seen.get(), 2);
  }
}
