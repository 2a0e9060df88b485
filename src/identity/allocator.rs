/*!
 * SID Allocator
 * Mints root segments and derives collision-free child segments
 */

use super::sid::{decode_from_environment, SessionId};
use std::sync::atomic::{AtomicU64, Ordering};
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

/// Allocates session identifiers for one process
///
/// The child sequence is the only shared state; it is bumped atomically so
/// concurrent `derive_child` calls from different threads never collide.
#[derive(Debug)]
pub struct SidAllocator {
    next_child: AtomicU64,
}

impl SidAllocator {
    pub fn new() -> Self {
        Self {
            next_child: AtomicU64::new(1),
        }
    }

    /// Mint a fresh top-level SID for this process
    ///
    /// Aborts the process if the system entropy source is unavailable.
    pub fn mint_root(&self) -> SessionId {
        let segment = format!(
            "{}-H{}-P{:08x}",
            timestamp_token(),
            entropy_token(),
            std::process::id()
        );
        SessionId::from_segment(segment)
    }

    /// Derive the SID of a child about to be spawned by this process
    pub fn derive_child(&self, parent: &SessionId) -> SessionId {
        let seq = self.next_child.fetch_add(1, Ordering::SeqCst);
        let segment = format!("{}-H{}-C{:04}", timestamp_token(), entropy_token(), seq);
        parent.child(segment)
    }

    /// Adopt an inherited SID, or mint a root when there is none
    pub fn resolve(&self, inherited: Option<&str>) -> SessionId {
        match decode_from_environment(inherited) {
            Some(sid) => {
                debug!(sid = %sid, depth = sid.depth(), "adopted inherited session id");
                sid
            }
            None => {
                let sid = self.mint_root();
                debug!(sid = %sid, "minted root session id");
                sid
            }
        }
    }

    /// Number of child SIDs derived so far
    pub fn derived(&self) -> u64 {
        self.next_child.load(Ordering::SeqCst) - 1
    }
}

impl Default for SidAllocator {
    fn default() -> Self {
        Self::new()
    }
}

fn timestamp_token() -> String {
    let format = format_description!("[year][month][day]T[hour][minute][second].[subsecond digits:6]Z");
    OffsetDateTime::now_utc()
        .format(&format)
        .unwrap_or_else(|_| String::from("00000000T000000.000000Z"))
}

fn entropy_token() -> String {
    let mut token = Uuid::new_v4().simple().to_string();
    token.truncate(8);
    token
}
