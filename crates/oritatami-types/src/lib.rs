//! Shared identity and block types for oritatami.
//!
//! A pure leaf crate: typed IDs, block kinds, toggle state, and membership
//! tags. The engine crate builds hierarchy on top of these.
//!
//! # Key Types
//!
//! |-------------------|------------------------------------------------|
//! | Type              | Purpose                                        |
//! |-------------------|------------------------------------------------|
//! | [`BlockId`]       | Stable block identity (UUIDv7)                 |
//! | [`RootId`]        | Toggle root identity, written onto members     |
//! | [`Block`]         | A host block plus engine-written attributes    |
//! | [`MembershipTag`] | Parent link from a member to its toggle        |
//! | [`ToggleState`]   | Root ID and open/closed status of a root block |
//! | [`ToggleData`]    | Persisted `{ text, status, fk, items }`        |
//! |-------------------|------------------------------------------------|

pub mod block;
pub mod ids;

pub use block::{Block, BlockKind, MembershipTag, ToggleData, ToggleState, ToggleStatus};
pub use ids::{BlockId, IdError, RootId};
