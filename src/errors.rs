use thiserror::Error;

pub type Result<T> = std::result::Result<T, Errors>;

#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum Errors {
  #[error("failed to read from data file")]
  FailedToReadFromDataFile,

  #[error("failed to write to data file")]
  FailedToWriteToDataFile,

  #[error("failed to sync data file")]
  FailedToSyncDataFile,

  #[error("failed to open data file")]
  FailedToOpenDataFile,

  #[error("the key is empty")]
  KeyIsEmpty,

  #[error("memory index failed to update")]
  IndexUpdateFailed,

  #[error("key not found in database")]
  KeyNotFound,

  #[error("data file is not found")]
  DataFileNotFound,

  #[error("database dir path can not be empty")]
  DirPathIsEmpty,

  #[error("database data file size must be greater than 0")]
  DataFileSizeTooSmall,

  #[error("failed to create the database directory")]
  FailedToCreateDatabaseDir,

  #[error("failed to read the database directory")]
  FailedToReadDatabaseDir,

  #[error("the database directory maybe corrupted")]
  DatabaseDirectoryCorrupted,

  #[error("read data file EOF")]
  ReadDataFileEOF,

  #[error("invalid crc value, log record maybe corrupted")]
  InvalidLogRecordCrc,

  #[error("exceed the max batch num")]
  ExceedMaxBatchNum,

  #[error("merge is in progress, try again later")]
  MergeInProgress,

  #[error("the database directory is used by another process")]
  DatabaseIsUsing,

  #[error("invalid merge ratio, must be between 0 and 1")]
  InvalidMergeThreshold,

  #[error("unreached the merge ratio threshold")]
  MergeThresholdUnreached,

  #[error("not enough disk space to perform merge")]
  MergeNoEnoughSpace,

  #[error("failed to copy the database directory")]
  FailedToCopyDirectory,

  #[error("unable to use write batch, sequence number file is missing")]
  UnableToUseWriteBatch,
}
