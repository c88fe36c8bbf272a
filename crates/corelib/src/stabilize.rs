//! Periodic stabilization (C5).
//!
//! One task per vnode, each on its own jittered timer seeded from that
//! vnode's private RNG so a whole ring doesn't stabilize in lockstep. A
//! round runs `check_predecessor`, `stabilize`, then `fix_fingers`, in that
//! order, exactly as dendrite's stabilizer does it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;

use crate::config::Config;
use crate::hooks::HookBus;
use crate::identifier::{between, power_offset, M_BITS};
use crate::transport::Transport;
use crate::vnode::LocalVnode;

/// Drive `local`'s stabilization rounds until `shutdown` fires. Spawned once
/// per vnode by [`crate::ring::Ring::init`].
pub async fn run(
    local: Arc<LocalVnode>,
    transport: Arc<dyn Transport>,
    config: Arc<Config>,
    stabilizations: Arc<AtomicU64>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let delay = jittered_delay(&local, &config);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => {}
        }
        if *shutdown.borrow() {
            return;
        }

        check_predecessor(&local, transport.as_ref()).await;
        stabilize(&local, transport.as_ref(), &config).await;
        fix_fingers(&local, transport.as_ref(), &config).await;

        {
            let mut state = local.state.write();
            state.stabilized += 1;
            state.last_stabilized = Some(std::time::Instant::now());
        }
        stabilizations.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("chord_stabilizations_total").increment(1);
        tracing::debug!(vnode = %local.id(), "stabilization round complete");
    }
}

fn jittered_delay(local: &LocalVnode, config: &Config) -> Duration {
    let min = config.stabilize_min.as_secs_f64();
    let max = config.stabilize_max.as_secs_f64();
    if max <= min {
        return config.stabilize_min;
    }
    let r: f64 = local.rng.lock().gen();
    Duration::from_secs_f64(min + r * (max - min))
}

/// Ping the current predecessor; drop it if it no longer answers. A vnode
/// with no predecessor yet has nothing to check.
async fn check_predecessor(local: &LocalVnode, transport: &dyn Transport) {
    let predecessor = local.state.read().predecessor.clone();
    let Some(predecessor) = predecessor else {
        return;
    };
    match transport.ping(&predecessor).await {
        Ok(true) => {}
        _ => {
            tracing::debug!(vnode = %local.id(), dead = %predecessor, "predecessor unreachable, dropping");
            local.state.write().predecessor = None;
        }
    }
}

/// Classic Chord stabilize: ask the immediate successor for its predecessor,
/// adopt it if it lies strictly between us and our successor, then notify
/// whichever node is now our immediate successor of our own existence,
/// merging its successor list into ours.
async fn stabilize(local: &LocalVnode, transport: &dyn Transport, config: &Config) {
    let successor = local.state.read().successors.first().cloned();
    let Some(successor) = successor else {
        return;
    };

    if let Ok(Some(candidate)) = transport.get_predecessor(&successor).await {
        // `between(n, n, candidate)` is the empty set by definition, which
        // would wrongly forbid a self-looped singleton from ever adopting
        // its first real peer; treat self-as-successor as "whole ring minus
        // self" instead, same as every other candidate != self.
        let is_candidate = candidate.id != local.id()
            && (successor.id == local.id() || between(&local.id(), &successor.id, &candidate.id, false));
        if is_candidate {
            let mut state = local.state.write();
            if state.successors.first().map(|s| s.id) == Some(successor.id) {
                let mut merged = vec![candidate];
                merged.extend(state.successors.iter().cloned());
                merged.dedup_by(|a, b| a.id == b.id);
                merged.truncate(config.num_successors);
                state.successors = merged;
            }
        }
    }

    let current_successor = local.state.read().successors.first().cloned();
    let Some(current_successor) = current_successor else {
        return;
    };

    match transport.notify(&current_successor, &local.handle()).await {
        Ok(remote_successors) => {
            let mut state = local.state.write();
            let mut merged = vec![current_successor.clone()];
            for s in remote_successors {
                if s.id == local.id() || merged.len() >= config.num_successors {
                    continue;
                }
                merged.push(s);
            }
            state.successors = merged;
        }
        Err(e) if e.is_liveness_failure() => {
            tracing::debug!(vnode = %local.id(), dead = %current_successor, "successor unreachable, promoting next");
            let mut state = local.state.write();
            if state.successors.first().map(|s| s.id) == Some(current_successor.id) {
                state.successors.remove(0);
            }
        }
        Err(e) => {
            tracing::debug!(vnode = %local.id(), error = %e, "notify failed");
        }
    }
}

/// Advance the round-robin finger cursor by one slot and refresh it.
async fn fix_fingers(local: &LocalVnode, transport: &dyn Transport, config: &Config) {
    let cursor = {
        let mut state = local.state.write();
        let cursor = state.fix_finger_cursor;
        state.fix_finger_cursor = (cursor + 1) % M_BITS;
        cursor
    };
    let target = power_offset(&local.id(), cursor as u32, M_BITS as u32);
    let start = local.handle();
    match transport
        .find_successors(&start, 1, target, config.hop_limit)
        .await
    {
        Ok(succs) if !succs.is_empty() => {
            local.state.write().finger[cursor] = Some(succs[0].clone());
        }
        Ok(_) => {}
        Err(e) => {
            tracing::debug!(vnode = %local.id(), slot = cursor, error = %e, "fix_fingers lookup failed");
        }
    }
}
