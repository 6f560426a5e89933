//! Pipeline stages for documentation assembly.
//!
//! Each submodule implements exactly one transformation step, so every stage
//! can be tested without the ones around it.
//!
//! ## Data Flow
//!
//! ```text
//! generate ──▶ fragments ──▶ headers ──▶ diagram ──▶ classify ──▶ merge
//! (black box)  (read .md)    (dedupe)    (mmdc)      (rank/sort)  (cover+html)
//! ```
//!
//! 1. [`generate`] : run the upstream generator, verify its output directory
//! 2. [`fragments`]: list and read fragment files; stage-typed fragment structs
//! 3. [`headers`]  : remove a repeated leading title
//! 4. [`diagram`]  : rasterise fenced diagram blocks, inline them via [`encode`]
//! 5. [`classify`] : title → rank, then total order by `(rank, filename)`
//! 6. [`merge`]    : cover block, concatenation, HTML styling envelope

pub mod classify;
pub mod diagram;
pub mod encode;
pub mod fragments;
pub mod generate;
pub mod headers;
pub mod merge;
