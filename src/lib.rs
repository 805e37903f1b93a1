#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod cell;
mod metadata;

pub mod extract;
pub mod hash_map;
pub mod hash_set;
pub mod hash_table;
pub mod hopscotch;
pub mod index;
pub mod sentinel;
pub mod storage;
pub mod strategy;

pub use hash_map::HashMap;
pub use hash_set::HashSet;
pub use hash_table::{HashTable, Options};
pub use hopscotch::Hopscotch;
pub use sentinel::Sentinel;
