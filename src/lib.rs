//! Working-tree status engine for interactive shell prompts.
//!
//! A long-running daemon answering "what is the VCS status of the working
//! tree at path P?" with sub-100ms latency on large repositories. Requests
//! arrive on stdin, one response per request goes to stdout; see
//! [`serve::serve`] for the loop and [`repo::Repo::index_stats`] for the
//! scan itself.
//!
//! The engine is built from three cooperating subsystems:
//!
//! - an indexed directory model ([`index_model`]) that proposes a bounded
//!   set of dirty candidates without walking the whole tree;
//! - a sharded diff driver ([`repo`], [`diff`], [`shard`]) that runs
//!   staged, unstaged, and untracked scans concurrently and short-circuits
//!   as soon as the configured caps are met;
//! - a packed-refs tag database ([`tag_db`]) with a statted mmap cache and
//!   a background-sorted peeled-tag table.
//!
//! The git object model itself comes from libgit2 via the `git2` crate,
//! wrapped in [`git`].

pub mod arena;
pub mod cli;
pub mod diff;
pub mod dir_list;
pub mod errors;
pub mod fstat;
pub mod git;
pub mod index_model;
pub mod probe;
pub mod repo;
pub mod repo_cache;
pub mod request;
pub mod response;
pub mod serve;
pub mod shard;
pub mod strcmp;
pub mod tag_db;
pub mod thread_pool;

pub use arena::{PathArena, PathRef};
pub use cli::{parse_args, Options};
pub use diff::{DeltaAction, DeltaKind, DeltaSink};
pub use errors::ScanError;
pub use index_model::{CandKind, Candidate, Index, IndexDir, Snapshot};
pub use repo::{IndexStats, Limits, Repo};
pub use repo_cache::RepoCache;
pub use request::{parse_request, Request, RequestReader, Sentinel};
pub use response::ResponseFields;
pub use shard::{chunk_by_shard, derive_shards, Shard};
pub use strcmp::PathOrder;
pub use tag_db::TagDb;
pub use thread_pool::ThreadPool;
