//! Best-effort CPU pinning for agent threads.
//!
//! Pinning failure is logged and does not abort agent startup (§8
//! boundary: "core pinning failure is logged and does not abort agent
//! startup").

/// Attempts to pin the calling thread to `core_id`. Logs a warning and
/// returns without error if pinning isn't supported or the core doesn't
/// exist — callers never need to branch on the result.
pub fn pin_current_thread(core_id: usize) {
    let cores = core_affinity::get_core_ids().unwrap_or_default();
    match cores.into_iter().find(|c| c.id == core_id) {
        Some(core) => {
            if !core_affinity::set_for_current(core) {
                log::warn!("failed to pin thread to core {core_id}");
            }
        }
        None => {
            log::warn!("core {core_id} not available for pinning, continuing unpinned");
        }
    }
}
