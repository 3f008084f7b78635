pub mod bptree;
pub mod btree;
pub mod skiplist;

use std::path::PathBuf;

use bytes::Bytes;

use crate::{
  data::log_record::LogRecordPos,
  errors::Result,
  option::{IndexType, IteratorOptions},
};

pub trait Indexer: Sync + Send {
  /// Inserts a key's position into the index, returning the position it
  /// replaced, if any. Fails only for the persistent variant, when the
  /// backing store itself can't be written to.
  fn put(&self, key: Vec<u8>, pos: LogRecordPos) -> Result<Option<LogRecordPos>>;

  /// Retrieves a key's position from the index.
  fn get(&self, key: Vec<u8>) -> Result<Option<LogRecordPos>>;

  /// Removes a key's position from the index. The first element of the
  /// returned tuple is the position that was removed, if the key was
  /// present; the second element reports whether the removal itself
  /// succeeded, so "key was absent" can be told apart from "key was
  /// present but the removal failed".
  fn delete(&self, key: Vec<u8>) -> Result<(Option<LogRecordPos>, bool)>;

  fn list_keys(&self) -> Result<Vec<Bytes>>;

  /// Creates an iterator for the index with the specified options.
  /// * `options` - Configuration options for the iterator
  fn iterator(&self, options: IteratorOptions) -> Box<dyn IndexIterator>;

  /// Releases any resources backing the index. A no-op for the in-memory
  /// variants; flushes and closes the on-disk tree for the persistent one.
  fn close(&self) -> Result<()>;
}

/// Creates a new indexer based on the specified index type and directory path.
///
/// Only the persistent B+-tree variant can fail here (opening or creating its
/// backing file); the in-memory variants are infallible.
pub fn new_indexer(index_type: &IndexType, dir_path: &PathBuf) -> Result<Box<dyn Indexer>> {
  let indexer: Box<dyn Indexer> = match *index_type {
    IndexType::BTree => Box::new(btree::BTree::new()),
    IndexType::SkipList => Box::new(skiplist::SkipList::new()),
    IndexType::BPlusTree => Box::new(bptree::BPlusTree::new(dir_path)?),
  };
  Ok(indexer)
}

/// Provides methods for iterating over key-value pairs in the index.
pub trait IndexIterator: Sync + Send {
  fn rewind(&mut self);

  fn seek(&mut self, key: Vec<u8>);

  fn next(&mut self) -> Option<(&Vec<u8>, &LogRecordPos)>;
}
