// Copyright 2026 TiKV Project Authors. Licensed under Apache-2.0.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown frame format {0:?}, expected one of compact, verbose, name, machine")]
    UnknownFormat(String),
}

pub type Result<T> = std::result::Result<T, Error>;
