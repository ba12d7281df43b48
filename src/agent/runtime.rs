//! Agent runtime (§4.6): one OS thread per agent, running a cooperative
//! `doWork()` loop under a pluggable idle strategy, with optional best-effort
//! CPU pinning.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::core::affinity;
use crate::core::wait::{IdleStrategy, Idler};

/// Anything an agent thread can drive: one `doWork` call per loop
/// iteration, returning the number of events processed, plus a hook run
/// once after the loop exits.
pub trait Agent: Send + 'static {
    fn do_work(&mut self) -> usize;

    /// Invoked once, on the agent's own thread, after `running` flips to
    /// false and the in-flight `doWork` call returns (§4.6 "Shutdown").
    fn on_close(&mut self) {}

    fn name(&self) -> &str {
        "agent"
    }
}

/// A spawned agent thread. Dropping this without calling `stop()` does not
/// stop the thread — call `stop()` explicitly (mirrors the orchestrator's
/// explicit shutdown sequencing, §4.7).
pub struct AgentThread {
    name: String,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl AgentThread {
    /// Spawns `agent` on its own OS thread. The thread loops
    /// `while running.load() { let w = agent.do_work(); idler.idle(w); }`
    /// and calls `agent.on_close()` once after the loop exits.
    pub fn spawn<A: Agent>(mut agent: A, idle_strategy: IdleStrategy, core_id: Option<usize>) -> Self {
        let name = agent.name().to_string();
        let running = Arc::new(AtomicBool::new(true));
        let running_thread = running.clone();
        let thread_name = name.clone();

        let handle = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                if let Some(core_id) = core_id {
                    affinity::pin_current_thread(core_id);
                }
                let mut idler = Idler::new(idle_strategy);
                while running_thread.load(Ordering::Acquire) {
                    let work = agent.do_work();
                    idler.idle(work);
                }
                log::debug!("agent '{thread_name}' shutting down");
                agent.on_close();
            })
            .expect("failed to spawn agent thread");

        AgentThread {
            name,
            running,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Flips `running` to false. The loop exits after the in-flight
    /// `doWork` call returns; does not block.
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Requests stop and joins the thread, blocking until it exits.
    pub fn stop(mut self) {
        self.request_stop();
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.join() {
                log::error!("agent '{}' panicked: {:?}", self.name, err);
            }
        }
    }

    pub fn is_alive(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for AgentThread {
    fn drop(&mut self) {
        self.request_stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingAgent {
        counter: Arc<AtomicUsize>,
    }

    impl Agent for CountingAgent {
        fn do_work(&mut self) -> usize {
            self.counter.fetch_add(1, Ordering::SeqCst);
            0
        }

        fn name(&self) -> &str {
            "counting-agent"
        }
    }

    #[test]
    fn agent_loop_runs_until_stopped() {
        let counter = Arc::new(AtomicUsize::new(0));
        let agent = CountingAgent {
            counter: counter.clone(),
        };
        let thread = AgentThread::spawn(agent, IdleStrategy::BusySpin, None);
        std::thread::sleep(std::time::Duration::from_millis(20));
        thread.stop();
        assert!(counter.load(Ordering::SeqCst) > 0);
    }

    struct CloseTrackingAgent {
        closed: Arc<AtomicBool>,
    }

    impl Agent for CloseTrackingAgent {
        fn do_work(&mut self) -> usize {
            0
        }

        fn on_close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn on_close_runs_after_stop() {
        let closed = Arc::new(AtomicBool::new(false));
        let agent = CloseTrackingAgent {
            closed: closed.clone(),
        };
        let thread = AgentThread::spawn(agent, IdleStrategy::Yielding, None);
        thread.stop();
        assert!(closed.load(Ordering::SeqCst));
    }
}
