/*!
 * Session Identity
 * Hierarchical process identifiers and their propagation across spawns
 */

mod allocator;
mod sid;

pub use allocator::SidAllocator;
pub use sid::{decode_from_environment, encode_for_environment, SessionId, SidParseError};
